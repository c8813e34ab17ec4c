use jsonwebtoken::{encode, EncodingKey, Header};
use laundry_ledger::adapters::MemoryStore;
use laundry_ledger::middleware::{AuthKeys, Claims};
use laundry_ledger::{create_app, AppState};
use reqwest::StatusCode;
use serde_json::{json, Value};

const SECRET: &[u8] = b"integration-test-secret";

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    token: String,
    store: MemoryStore,
}

impl TestApp {
    async fn spawn() -> Self {
        let store = MemoryStore::new();
        let state = AppState::in_memory(store.clone(), AuthKeys::from_secret(SECRET));
        let app = create_app(state);

        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
        let server = axum::Server::bind(&addr).serve(app.into_make_service());
        let actual_addr = server.local_addr();

        tokio::spawn(async move {
            server.await.unwrap();
        });

        Self {
            base_url: format!("http://{}", actual_addr),
            client: reqwest::Client::new(),
            token: operator_token(1, "kasir"),
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create(&self, payload: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/transactions"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .unwrap()
    }

    async fn set_status(&self, id: i64, status: &str) -> reqwest::Response {
        self.client
            .patch(self.url(&format!("/api/v1/transactions/{}/status", id)))
            .bearer_auth(&self.token)
            .json(&json!({ "new_status": status, "reason": "test" }))
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }
}

fn operator_token(id: i64, username: &str) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: id.to_string(),
            username: username.to_string(),
            exp,
        },
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn order_payload() -> Value {
    json!({
        "customer_name": "Siti Aminah",
        "customer_phone": "081234567890",
        "customer_address": "Jl. Kenanga 12",
        "pickup_date": "2025-12-03",
        "items": [
            { "service_type": "regular", "item_name": "shirt", "quantity": 2, "unit_price": 5000 },
            { "service_type": "express", "item_name": "blanket", "quantity": 1, "unit_price": 7000 }
        ]
    })
}

#[tokio::test]
async fn test_health_reports_in_memory_store() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["db"], "in_memory");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_create_transaction_flow() {
    let app = TestApp::spawn().await;

    let res = app.create(order_payload()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();

    assert_eq!(created["status"], "queued");
    assert_eq!(created["total"].as_str().map(|t| t.parse::<f64>().unwrap()), Some(17000.0));
    assert_eq!(created["items"].as_array().unwrap().len(), 2);
    assert_eq!(created["operator_id"], 1);
    assert_eq!(created["pickup_date"], "2025-12-03");
    assert!(created["tracking_code"].as_str().unwrap().starts_with("CHRN-"));

    let history = created["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0]["previous_status"].is_null());
    assert_eq!(history[0]["new_status"], "queued");
    assert_eq!(history[0]["changed_by"], "system");

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = app.get_json(&format!("/api/v1/transactions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["tracking_code"], created["tracking_code"]);
}

#[tokio::test]
async fn test_create_rejects_mismatched_total() {
    let app = TestApp::spawn().await;
    let mut payload = order_payload();
    payload["total"] = json!(20000);

    let res = app.create(payload).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("total"));
}

#[tokio::test]
async fn test_create_rejects_empty_items_and_bad_date() {
    let app = TestApp::spawn().await;

    let mut no_items = order_payload();
    no_items["items"] = json!([]);
    assert_eq!(app.create(no_items).await.status(), StatusCode::BAD_REQUEST);

    let mut bad_date = order_payload();
    bad_date["pickup_date"] = json!("03/12/2025");
    assert_eq!(app.create(bad_date).await.status(), StatusCode::BAD_REQUEST);

    let (_, page) = app.get_json("/api/v1/transactions").await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_operator_routes_require_token() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(app.url("/api/v1/transactions"))
        .json(&order_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .client
        .get(app.url("/api/v1/dashboard/stats"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_workflow() {
    let app = TestApp::spawn().await;
    let created: Value = app.create(order_payload()).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    let res = app.set_status(id, "ironing").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["current_status"], "queued");
    assert_eq!(body["attempted_status"], "ironing");

    let res = app.set_status(id, "washing").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "washing");
    assert_eq!(body["history_entry"]["changed_by"], "kasir");

    assert_eq!(app.set_status(id, "completed").await.status(), StatusCode::OK);
    assert_eq!(app.set_status(id, "washing").await.status(), StatusCode::CONFLICT);

    let (_, history) = app
        .get_json(&format!("/api/v1/transactions/{}/history", id))
        .await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1]["previous_status"], "queued");
    assert_eq!(history[1]["new_status"], "washing");
    assert_eq!(history[2]["previous_status"], "washing");
    assert_eq!(history[2]["new_status"], "completed");
}

#[tokio::test]
async fn test_unknown_status_and_missing_order() {
    let app = TestApp::spawn().await;
    let created: Value = app.create(order_payload()).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    assert_eq!(
        app.set_status(id, "cancelled").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.set_status(id + 100, "washing").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_public_tracking_hides_operator_data() {
    let app = TestApp::spawn().await;
    let created: Value = app.create(order_payload()).await.json().await.unwrap();
    let code = created["tracking_code"].as_str().unwrap();

    let res = app
        .client
        .get(app.url(&format!("/api/v1/track/{}", code)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: Value = res.json().await.unwrap();

    assert_eq!(view["tracking_code"], code);
    assert_eq!(view["customer_name"], "Siti Aminah");
    assert_eq!(view["items_count"], 2);
    assert!(view.get("id").is_none());
    assert!(view.get("operator_id").is_none());
    assert!(view.get("customer_phone").is_none());
    assert!(view["status_history"][0].get("changed_by").is_none());
}

#[tokio::test]
async fn test_tracking_malformed_code_is_not_found() {
    let app = TestApp::spawn().await;
    let res = app
        .client
        .get(app.url("/api/v1/track/ABC-123"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_fields_and_dashboard() {
    let app = TestApp::spawn().await;

    let mut ids = Vec::new();
    for (price, paid) in [(10000, true), (20000, true), (5000, false)] {
        let created: Value = app
            .create(json!({
                "customer_name": "Customer",
                "customer_phone": "0800",
                "items": [{ "service_type": "regular", "item_name": "pants", "quantity": 1, "unit_price": price }]
            }))
            .await
            .json()
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();
        if paid {
            let res = app
                .client
                .put(app.url(&format!("/api/v1/transactions/{}", id)))
                .bearer_auth(&app.token)
                .json(&json!({ "is_paid": true }))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        ids.push(id);
    }

    let (status, stats) = app.get_json("/api/v1/dashboard/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["queued"], 3);
    assert_eq!(
        stats["total_revenue"].as_str().unwrap().parse::<f64>().unwrap(),
        30000.0
    );
    assert_eq!(
        stats["unpaid_amount"].as_str().unwrap().parse::<f64>().unwrap(),
        5000.0
    );
}

#[tokio::test]
async fn test_update_cannot_change_status() {
    let app = TestApp::spawn().await;
    let created: Value = app.create(order_payload()).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    let res = app
        .client
        .put(app.url(&format!("/api/v1/transactions/{}", id)))
        .bearer_auth(&app.token)
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());

    let (_, fetched) = app.get_json(&format!("/api/v1/transactions/{}", id)).await;
    assert_eq!(fetched["status"], "queued");
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let app = TestApp::spawn().await;
    let first: Value = app.create(order_payload()).await.json().await.unwrap();
    app.create(order_payload()).await;
    app.set_status(first["id"].as_i64().unwrap(), "washing").await;

    let (_, all) = app.get_json("/api/v1/transactions?page=1&limit=1").await;
    assert_eq!(all["total"], 2);
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
    assert_eq!(all["total_pages"], 2);

    let (_, washing) = app.get_json("/api/v1/transactions?status=washing").await;
    assert_eq!(washing["total"], 1);
    assert_eq!(washing["data"][0]["id"], first["id"]);

    let (status, _) = app.get_json("/api/v1/transactions?status=drying").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_is_soft_and_hides_order() {
    let app = TestApp::spawn().await;
    let created: Value = app.create(order_payload()).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    let code = created["tracking_code"].as_str().unwrap().to_string();

    let res = app
        .client
        .delete(app.url(&format!("/api/v1/transactions/{}", id)))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, _) = app.get_json(&format!("/api/v1/transactions/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let res = app
        .client
        .get(app.url(&format!("/api/v1/track/{}", code)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let (_, stats) = app.get_json("/api/v1/dashboard/stats").await;
    assert_eq!(stats["total"], 0);

    let (_, page) = app.get_json("/api/v1/transactions").await;
    assert_eq!(page["total"], 0);

    // Deleting again finds nothing.
    let res = app
        .client
        .delete(app.url(&format!("/api/v1/transactions/{}", id)))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_history_write_keeps_status() {
    let app = TestApp::spawn().await;
    let created: Value = app.create(order_payload()).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    app.store.fail_history_writes(true);
    let res = app.set_status(id, "washing").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");

    app.store.fail_history_writes(false);
    let (_, fetched) = app.get_json(&format!("/api/v1/transactions/{}", id)).await;
    assert_eq!(fetched["status"], "queued");
    assert_eq!(fetched["status_history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_rejects_amounts_money_columns_cannot_hold() {
    let app = TestApp::spawn().await;

    for price in [json!("0.005"), json!("0.004"), json!("1000000000000")] {
        let res = app
            .create(json!({
                "customer_name": "Customer",
                "customer_phone": "0800",
                "items": [
                    { "service_type": "regular", "item_name": "sock", "quantity": 1, "unit_price": price },
                    { "service_type": "regular", "item_name": "sock", "quantity": 1, "unit_price": price }
                ]
            }))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "price {}", price);
        let body: Value = res.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("unit_price"));
    }

    let res = app
        .create(json!({
            "customer_name": "Customer",
            "customer_phone": "0800",
            "items": [{ "service_type": "regular", "item_name": "sock", "quantity": 3, "unit_price": "2500.50" }]
        }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(
        created["total"].as_str().unwrap().parse::<f64>().unwrap(),
        7501.5
    );

    let (_, page) = app.get_json("/api/v1/transactions").await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_list_pages_past_the_end() {
    let app = TestApp::spawn().await;
    for _ in 0..3 {
        app.create(order_payload()).await;
    }

    let (status, page) = app.get_json("/api/v1/transactions?page=2&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);

    let (status, page) = app.get_json("/api/v1/transactions?page=5&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page["data"].as_array().unwrap().is_empty());
    assert_eq!(page["total"], 3);

    let (status, page) = app
        .get_json(&format!("/api/v1/transactions?page={}", i64::MAX))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(page["data"].as_array().unwrap().is_empty());
    assert_eq!(page["total"], 3);
}
