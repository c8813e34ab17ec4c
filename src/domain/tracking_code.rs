//! Customer-facing tracking codes, `CHRN-YYYYMMDD-XXXXX`.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

pub const PREFIX: &str = "CHRN";
pub const SUFFIX_LEN: usize = 5;
const DATE_LEN: usize = 8;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a code stamped with today's (UTC) date.
pub fn generate_code() -> String {
    generate_code_for(Utc::now().date_naive())
}

pub fn generate_code_for(date: NaiveDate) -> String {
    format!("{}-{}-{}", PREFIX, date.format("%Y%m%d"), random_suffix())
}

/// Largest multiple of the charset size that fits in a byte. Bytes at or
/// above it are discarded so every character is equally likely.
const UNBIASED_LIMIT: u8 = (256 / CHARSET.len() * CHARSET.len()) as u8;

// Bytes 6 and 8 of a v4 UUID hold the version and variant bits.
const FIXED_UUID_BYTES: [usize; 2] = [6, 8];

fn random_suffix() -> String {
    let mut suffix = String::with_capacity(SUFFIX_LEN);
    while suffix.len() < SUFFIX_LEN {
        let uuid = Uuid::new_v4();
        let random_bytes = uuid
            .as_bytes()
            .iter()
            .enumerate()
            .filter(|(i, _)| !FIXED_UUID_BYTES.contains(i))
            .map(|(_, byte)| *byte);
        push_unbiased(&mut suffix, random_bytes);
    }
    suffix
}

/// Appends characters for the usable bytes until the suffix is full.
fn push_unbiased(suffix: &mut String, bytes: impl IntoIterator<Item = u8>) {
    for byte in bytes.into_iter().filter(|byte| *byte < UNBIASED_LIMIT) {
        if suffix.len() == SUFFIX_LEN {
            break;
        }
        suffix.push(CHARSET[byte as usize % CHARSET.len()] as char);
    }
}

/// Structural check only: prefix, segment count and segment lengths.
pub fn is_valid_format(code: &str) -> bool {
    let parts: Vec<&str> = code.split('-').collect();
    parts.len() == 3
        && parts[0] == PREFIX
        && parts[1].len() == DATE_LEN
        && parts[2].len() == SUFFIX_LEN
}
