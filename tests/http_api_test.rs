use anyhow::Result;
use ea_store::server::{router, AppState};
use ea_store::{InMemoryStore, RestStore, Store, StoreConfig};
use httpmock::prelude::*;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use uuid::Uuid;

const API_KEY: &str = "ea-verify-key";
const ADMIN_TOKEN: &str = "admin-token-0123456789";

const CONFIG: &str = r#"
[database]
backend = "memory"

[licensing]
api_key = "ea-verify-key"

[admin]
token = "admin-token-0123456789"
"#;

/// 在隨機埠啟動伺服器，回傳 base URL
async fn spawn_server(config: &str) -> Result<String> {
    spawn_with(InMemoryStore::new(), config).await
}

async fn spawn_with<S: Store + 'static>(store: S, config: &str) -> Result<String> {
    let config = StoreConfig::from_toml_str(config)?;
    let state = AppState::new(Arc::new(store), Arc::new(config));
    let app = router(state, true);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", address))
}

async fn verify(client: &Client, base: &str, key: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
    let mut request = client.post(format!("{}/api/verify-license", base)).json(&body);
    if let Some(key) = key {
        request = request.header("x-api-key", key);
    }
    let response = request.send().await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let base = spawn_server(CONFIG).await?;
    let body: Value = reqwest::get(format!("{}/health", base)).await?.json().await?;
    assert_eq!(body["status"], "healthy");
    Ok(())
}

/// 驗證端點：API key 與請求格式
#[tokio::test]
async fn test_verify_license_rejects_bad_requests() -> Result<()> {
    let base = spawn_server(CONFIG).await?;
    let client = Client::new();
    let product_id = Uuid::new_v4().to_string();
    let body = json!({ "account_number": "50123456", "product_id": product_id });

    let (status, json) = verify(&client, &base, None, body.clone()).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Invalid API key");

    let (status, _) = verify(&client, &base, Some("wrong"), body.clone()).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = verify(&client, &base, Some(API_KEY), json!({ "account_number": "50123456" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");

    let (status, _) = verify(
        &client,
        &base,
        Some(API_KEY),
        json!({ "account_number": "50123456", "product_id": "not-a-uuid" }),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/api/verify-license", base))
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, json) = verify(&client, &base, Some(API_KEY), body).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "invalid");
    assert_eq!(json["message"], "No license found for this account");

    let (status, json) = verify(
        &client,
        &base,
        Some(API_KEY),
        json!({ "account_number": "abc", "product_id": product_id }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Invalid account number");

    Ok(())
}

#[tokio::test]
async fn test_verify_is_open_without_configured_key() -> Result<()> {
    let base = spawn_server("[database]\nbackend = \"memory\"\n").await?;
    let client = Client::new();

    let (status, json) = verify(
        &client,
        &base,
        None,
        json!({ "account_number": "50123456", "product_id": Uuid::new_v4() }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "invalid");

    // 沒有 admin token 時後台 API 關閉
    let response = client
        .get(format!("{}/api/admin/stats", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

/// 從上架商品到 EA 驗證通過的完整 HTTP 流程
#[tokio::test]
async fn test_order_to_verified_license_over_http() -> Result<()> {
    let base = spawn_server(CONFIG).await?;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let response = client
        .post(format!("{}/api/admin/products", base))
        .json(&json!({ "name": "Gold Scalper", "price_cents": 9900, "duration_months": 3 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let product: Value = client
        .post(format!("{}/api/admin/products", base))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "name": "Gold Scalper", "price_cents": 9900, "duration_months": 3 }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let product_id = product["id"].as_str().unwrap_or_default().to_string();

    let catalog: Value = reqwest::get(format!("{}/api/products", base)).await?.json().await?;
    assert_eq!(catalog.as_array().map(Vec::len), Some(1));

    let response = client
        .post(format!("{}/api/orders", base))
        .json(&json!({ "product_id": product_id, "account_number": "50123456", "payment_method": "crypto" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{}/api/profiles", base))
        .header("x-user-id", user_id.to_string())
        .json(&json!({ "email": "alice@example.com", "full_name": "Alice" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/api/profiles", base))
        .header("x-user-id", user_id.to_string())
        .json(&json!({ "email": "alice@example.com" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/api/orders", base))
        .header("x-user-id", user_id.to_string())
        .json(&json!({ "product_id": product_id, "account_number": "50123456", "payment_method": "crypto" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await?;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["amount_cents"], 9900);
    let order_id = order["id"].as_str().unwrap_or_default().to_string();

    let pending: Value = client
        .get(format!("{}/api/admin/orders?status=pending", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(pending[0]["user_email"], "alice@example.com");

    let approval: Value = client
        .post(format!("{}/api/admin/orders/{}/approve", base, order_id))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(approval["order"]["status"], "completed");
    assert_eq!(approval["renewed"], false);

    let response = client
        .post(format!("{}/api/admin/orders/{}/reject", base, order_id))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "note": "too late" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/api/admin/orders/{}/approve", base, Uuid::new_v4()))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, json) = verify(
        &client,
        &base,
        Some(API_KEY),
        json!({ "account_number": "50123456", "product_id": product_id }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");
    assert_eq!(json["lifetime"], false);

    let mine: Value = client
        .get(format!("{}/api/me/licenses", base))
        .header("x-user-id", user_id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(mine[0]["product_name"], "Gold Scalper");
    assert_eq!(mine[0]["state"]["kind"], "active");

    let stats: Value = client
        .get(format!("{}/api/admin/stats", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stats["total_revenue_cents"], 9900);
    assert_eq!(stats["active_licenses"], 1);

    Ok(())
}

#[tokio::test]
async fn test_validation_errors_map_to_bad_request() -> Result<()> {
    let base = spawn_server(CONFIG).await?;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/admin/products", base))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "name": "  ", "price_cents": 100 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["error"].as_str().unwrap_or_default().contains("name"));

    let response = client
        .put(format!("{}/api/admin/affiliates/{}/rate", base, Uuid::new_v4()))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "commission_rate": 101.0 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

/// 資料 API 掛掉時，驗證端點仍回傳 EA 看得懂的錯誤格式
#[tokio::test]
async fn test_verify_reports_data_api_outage_as_error_status() -> Result<()> {
    let data_api = MockServer::start_async().await;
    let outage = data_api
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/licenses");
            then.status(503)
                .header("content-type", "application/json")
                .json_body(json!({ "message": "upstream unavailable" }));
        })
        .await;

    let store = RestStore::new(&data_api.base_url(), "service-key", Duration::from_secs(5))?;
    let base = spawn_with(store, CONFIG).await?;
    let client = Client::new();

    let (status, json) = verify(
        &client,
        &base,
        Some(API_KEY),
        json!({ "account_number": "50123456", "product_id": Uuid::new_v4().to_string() }),
    )
    .await?;

    outage.assert_async().await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Verification failed");
    Ok(())
}

/// 缺欄位、錯誤的 UUID 與查詢參數都回傳 JSON 錯誤
#[tokio::test]
async fn test_malformed_input_returns_json_error_body() -> Result<()> {
    let base = spawn_server(CONFIG).await?;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/orders", base))
        .header("x-user-id", Uuid::new_v4().to_string())
        .json(&json!({ "account_number": "50123456" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["error"].is_string());

    let response = client
        .post(format!("{}/api/orders", base))
        .header("x-user-id", Uuid::new_v4().to_string())
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["error"].is_string());

    let response = client
        .post(format!("{}/api/admin/orders/not-a-uuid/approve", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["error"].is_string());

    let response = client
        .get(format!("{}/api/admin/orders?status=bogus", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["error"].is_string());

    Ok(())
}
