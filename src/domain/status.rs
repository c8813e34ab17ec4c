//! Order status state machine.
//!
//! The legal moves live in a single table (`TRANSITIONS`) and are checked by
//! membership, so the policy can be read and tested without a database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Processing stage of a laundry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Queued,
    Washing,
    Ironing,
    ReadyForPickup,
    Completed,
}

/// Current status -> statuses it may move to. Completed doubles as the
/// cancellation target, hence it is reachable from every other stage.
const TRANSITIONS: &[(TransactionStatus, &[TransactionStatus])] = &[
    (
        TransactionStatus::Queued,
        &[TransactionStatus::Washing, TransactionStatus::Completed],
    ),
    (
        TransactionStatus::Washing,
        &[TransactionStatus::Ironing, TransactionStatus::Completed],
    ),
    (
        TransactionStatus::Ironing,
        &[TransactionStatus::ReadyForPickup, TransactionStatus::Completed],
    ),
    (
        TransactionStatus::ReadyForPickup,
        &[TransactionStatus::Completed],
    ),
    (TransactionStatus::Completed, &[]),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition from {current} to {attempted}")]
pub struct TransitionError {
    pub current: TransactionStatus,
    pub attempted: TransactionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transaction status '{0}'")]
pub struct UnknownStatus(pub String);

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 5] = [
        TransactionStatus::Queued,
        TransactionStatus::Washing,
        TransactionStatus::Ironing,
        TransactionStatus::ReadyForPickup,
        TransactionStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Queued => "queued",
            TransactionStatus::Washing => "washing",
            TransactionStatus::Ironing => "ironing",
            TransactionStatus::ReadyForPickup => "ready_for_pickup",
            TransactionStatus::Completed => "completed",
        }
    }

    pub fn allowed_next(&self) -> &'static [TransactionStatus] {
        TRANSITIONS
            .iter()
            .find(|(from, _)| from == self)
            .map(|(_, next)| *next)
            .unwrap_or(&[])
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Returns `next` when the move is legal from `self`.
    pub fn transition_to(&self, next: TransactionStatus) -> Result<TransactionStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                current: *self,
                attempted: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
