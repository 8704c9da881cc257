//! Admin API. Every handler takes [`AdminAuth`] first so nothing runs without the token.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::back_office::{IbApproval, OrderApproval};
use crate::domain::model::{
    Broker, Commission, CommissionStatus, IbRequest, IbStatus, License, NewBroker, NewLicense,
    NewProduct, Order, PaymentDetails, PaymentSettings, Product, Profile,
};
use crate::domain::ports::Store;
use crate::domain::services::reporting::{
    DashboardStats, LicenseFilter, LicenseView, OrderFilter, OrderView,
};
use crate::server::auth::AdminAuth;
use crate::server::error::ApiError;
use crate::server::extract::{ApiJson, ApiPath, ApiQuery};
use crate::server::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;
type Shared<S> = State<Arc<AppState<S>>>;

#[derive(Debug, Default, Deserialize)]
pub struct NoteBody {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiryBody {
    /// `null` makes the license lifetime.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendBody {
    pub months: u32,
}

#[derive(Debug, Deserialize)]
pub struct RateBody {
    pub commission_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct IbFilter {
    pub status: Option<IbStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommissionFilter {
    pub status: Option<CommissionStatus>,
}

#[derive(Debug, Serialize)]
pub struct SweepResult {
    pub expired: usize,
}

pub async fn stats<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
) -> ApiResult<DashboardStats> {
    Ok(Json(state.back_office.dashboard(Utc::now()).await?))
}

// ---- orders ----

pub async fn list_orders<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> ApiResult<Vec<OrderView>> {
    Ok(Json(state.back_office.order_views(&filter).await?))
}

pub async fn approve_order<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<OrderApproval> {
    Ok(Json(state.back_office.approve_order(id, Utc::now()).await?))
}

pub async fn reject_order<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<NoteBody>>,
) -> ApiResult<Order> {
    let note = body.and_then(|ApiJson(b)| b.note);
    Ok(Json(state.back_office.reject_order(id, note, Utc::now()).await?))
}

// ---- licenses ----

pub async fn list_licenses<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiQuery(filter): ApiQuery<LicenseFilter>,
) -> ApiResult<Vec<LicenseView>> {
    Ok(Json(
        state.back_office.license_views(&filter, Utc::now()).await?,
    ))
}

pub async fn create_license<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiJson(body): ApiJson<NewLicense>,
) -> Result<(StatusCode, Json<License>), ApiError> {
    let license = state.back_office.create_license(body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(license)))
}

pub async fn set_license_expiry<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ExpiryBody>,
) -> ApiResult<License> {
    Ok(Json(
        state
            .back_office
            .set_license_expiry(id, body.expires_at, Utc::now())
            .await?,
    ))
}

pub async fn extend_license<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ExtendBody>,
) -> ApiResult<License> {
    Ok(Json(
        state
            .back_office
            .extend_license(id, body.months, Utc::now())
            .await?,
    ))
}

pub async fn revoke_license<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<License> {
    Ok(Json(state.back_office.revoke_license(id, Utc::now()).await?))
}

pub async fn sweep_licenses<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
) -> ApiResult<SweepResult> {
    let expired = state.back_office.sweep_expired(Utc::now()).await?;
    Ok(Json(SweepResult { expired }))
}

// ---- IB requests ----

pub async fn list_ib_requests<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiQuery(filter): ApiQuery<IbFilter>,
) -> ApiResult<Vec<IbRequest>> {
    Ok(Json(state.back_office.ib_requests(filter.status).await?))
}

pub async fn approve_ib_request<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<IbApproval> {
    Ok(Json(
        state.back_office.approve_ib_request(id, Utc::now()).await?,
    ))
}

pub async fn reject_ib_request<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<NoteBody>>,
) -> ApiResult<IbRequest> {
    let note = body.and_then(|ApiJson(b)| b.note);
    Ok(Json(
        state
            .back_office
            .reject_ib_request(id, note, Utc::now())
            .await?,
    ))
}

// ---- affiliates ----

pub async fn set_commission_rate<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RateBody>,
) -> ApiResult<Profile> {
    Ok(Json(
        state
            .back_office
            .set_commission_rate(id, body.commission_rate)
            .await?,
    ))
}

pub async fn list_commissions<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiQuery(filter): ApiQuery<CommissionFilter>,
) -> ApiResult<Vec<Commission>> {
    Ok(Json(state.back_office.commissions(filter.status).await?))
}

pub async fn pay_commission<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Commission> {
    Ok(Json(
        state.back_office.mark_commission_paid(id, Utc::now()).await?,
    ))
}

// ---- catalog ----

pub async fn create_product<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.back_office.create_product(body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewProduct>,
) -> ApiResult<Product> {
    Ok(Json(state.back_office.update_product(id, body).await?))
}

pub async fn create_broker<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiJson(body): ApiJson<NewBroker>,
) -> Result<(StatusCode, Json<Broker>), ApiError> {
    let broker = state.back_office.create_broker(body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(broker)))
}

pub async fn set_broker_active<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ActiveBody>,
) -> ApiResult<Broker> {
    Ok(Json(
        state
            .back_office
            .set_broker_active(id, body.is_active)
            .await?,
    ))
}

pub async fn update_payment_settings<S: Store + 'static>(
    _: AdminAuth,
    State(state): Shared<S>,
    ApiJson(body): ApiJson<PaymentDetails>,
) -> ApiResult<PaymentSettings> {
    Ok(Json(
        state
            .back_office
            .update_payment_settings(body, Utc::now())
            .await?,
    ))
}
