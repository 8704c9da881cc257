use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::utils::error::AppError;

/// HTTP face of [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Backend { .. } | AppError::ApiError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(
                "Request failed: {} (Category: {:?}, Severity: {:?})",
                self.0,
                self.0.category(),
                self.0.severity()
            );
            self.0.user_friendly_message()
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(AppError::validation("email", "bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(AppError::not_found("order", "x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(AppError::transition("order", "completed", "rejected")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(AppError::Backend { status: 500, message: "boom".into() }).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
