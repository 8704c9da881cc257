use anyhow::Result;
use chrono::{TimeZone, Utc};
use ea_store::domain::model::{OrderStatus, Product};
use ea_store::{AppError, Query, RestStore, Store};
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

const KEY: &str = "service-role-key";

fn product_json(id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Gold Scalper",
        "description": null,
        "price_cents": 9900,
        "duration_months": 1,
        "is_active": true,
        "created_at": "2025-01-01T00:00:00Z"
    })
}

fn store(server: &MockServer) -> Result<RestStore> {
    Ok(RestStore::new(&server.base_url(), KEY, Duration::from_secs(5))?)
}

/// 查詢要帶 apikey / bearer 與 eq 過濾條件
#[tokio::test]
async fn test_select_sends_auth_headers_and_eq_filters() -> Result<()> {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/products")
                .header("apikey", KEY)
                .header("authorization", format!("Bearer {}", KEY))
                .query_param("select", "*")
                .query_param("is_active", "eq.true")
                .query_param("status", "eq.pending");
            then.status(200).json_body(json!([product_json(id)]));
        })
        .await;

    let products: Vec<Product> = store(&server)?
        .select(
            &Query::new()
                .eq("is_active", true)
                .eq("status", OrderStatus::Pending),
        )
        .await?;

    mock.assert_async().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, id);
    assert_eq!(products[0].duration_months, Some(1));
    Ok(())
}

#[tokio::test]
async fn test_insert_asks_for_representation() -> Result<()> {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/products")
                .header("prefer", "return=representation")
                .json_body_partial(json!({ "name": "Gold Scalper", "price_cents": 9900 }).to_string());
            then.status(201).json_body(json!([product_json(id)]));
        })
        .await;

    let product = Product {
        id,
        name: "Gold Scalper".to_string(),
        description: None,
        price_cents: 9_900,
        duration_months: Some(1),
        is_active: true,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    };
    let inserted = store(&server)?.insert(&product).await?;

    mock.assert_async().await;
    assert_eq!(inserted.id, id);
    Ok(())
}

#[tokio::test]
async fn test_update_with_no_rows_is_not_found() -> Result<()> {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();

    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/products")
                .query_param("id", format!("eq.{}", id));
            then.status(200).json_body(json!([]));
        })
        .await;

    let product: Product = serde_json::from_value(product_json(id))?;
    let result = store(&server)?.update(&product).await;

    mock.assert_async().await;
    assert!(matches!(result, Err(AppError::NotFound { .. })));
    Ok(())
}

/// API 錯誤要保留狀態碼與 message
#[tokio::test]
async fn test_error_response_maps_to_backend_error() -> Result<()> {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/products");
            then.status(401).json_body(json!({
                "code": "PGRST301",
                "message": "JWT expired"
            }));
        })
        .await;

    let result: ea_store::Result<Vec<Product>> = store(&server)?.list().await;

    match result {
        Err(AppError::Backend { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "JWT expired");
        }
        other => panic!("expected backend error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_delete_targets_row_by_id() -> Result<()> {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();

    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/products")
                .query_param("id", format!("eq.{}", id));
            then.status(204);
        })
        .await;

    store(&server)?.delete::<Product>(id).await?;
    mock.assert_async().await;
    Ok(())
}
