use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::storefront::ReferralSummary;
use crate::domain::model::{
    Broker, IbRequest, NewIbRequest, NewOrder, Order, PaymentSettings, Product, Profile,
};
use crate::domain::ports::Store;
use crate::domain::services::reporting::{LicenseView, OrderView};
use crate::server::auth::{secret_matches, CurrentUser, API_KEY_HEADER};
use crate::server::error::ApiError;
use crate::server::extract::ApiJson;
use crate::server::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub account_number: Option<String>,
    pub product_id: Option<String>,
}

fn verify_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

/// `POST /api/verify-license`, called by the EA itself.
pub async fn verify_license<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    if let Some(expected) = state.config.verify_api_key() {
        let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        if !secret_matches(provided, expected) {
            tracing::warn!("Verification rejected: bad or missing API key");
            return verify_error(StatusCode::UNAUTHORIZED, "Invalid API key");
        }
    }

    let Ok(Json(request)) = payload else {
        return verify_error(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    let (Some(account_number), Some(product_id)) = (request.account_number, request.product_id)
    else {
        return verify_error(
            StatusCode::BAD_REQUEST,
            "account_number and product_id are required",
        );
    };

    let Ok(product_id) = Uuid::parse_str(product_id.trim()) else {
        return verify_error(StatusCode::BAD_REQUEST, "product_id must be a UUID");
    };

    match state
        .verifier
        .verify(&account_number, product_id, Utc::now())
        .await
    {
        Ok(verification) => (StatusCode::OK, Json(verification)).into_response(),
        Err(e) => {
            tracing::error!("❌ License verification failed: {}", e);
            verify_error(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
        }
    }
}

pub async fn list_products<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Vec<Product>> {
    Ok(Json(state.storefront.catalog().await?))
}

pub async fn list_brokers<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Vec<Broker>> {
    Ok(Json(state.storefront.active_brokers().await?))
}

pub async fn payment_settings<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Option<PaymentSettings>> {
    Ok(Json(state.storefront.payment_settings().await?))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: Option<String>,
    pub referral_code: Option<String>,
}

pub async fn register<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let profile = state
        .storefront
        .register(
            user_id,
            &body.email,
            body.full_name,
            body.referral_code.as_deref(),
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn place_order<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.storefront.place_order(user_id, body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn request_ib<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<NewIbRequest>,
) -> Result<(StatusCode, Json<IbRequest>), ApiError> {
    let request = state.storefront.request_ib(user_id, body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn my_orders<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<OrderView>> {
    Ok(Json(state.storefront.my_orders(user_id).await?))
}

pub async fn my_licenses<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<LicenseView>> {
    Ok(Json(state.storefront.my_licenses(user_id, Utc::now()).await?))
}

pub async fn my_referrals<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<ReferralSummary> {
    Ok(Json(state.storefront.referral_summary(user_id).await?))
}
