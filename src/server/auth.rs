//! Request identity. Sessions belong to the hosted auth provider; its gateway
//! forwards the verified user id in `x-user-id`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::ports::Store;
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares every byte so the time taken does not depend on where the first mismatch is.
pub fn secret_matches(provided: Option<&str>, expected: &str) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<St: Send + Sync> FromRequestParts<St> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(CurrentUser)
            .ok_or_else(|| {
                ApiError(AppError::Unauthorized {
                    message: "missing or malformed user id".to_string(),
                })
            })
    }
}

/// Present only when the bearer token matches the configured admin token.
pub struct AdminAuth;

#[async_trait]
impl<S: Store + 'static> FromRequestParts<Arc<AppState<S>>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token() else {
            return Err(ApiError(AppError::Unauthorized {
                message: "admin API is disabled".to_string(),
            }));
        };

        let provided = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        if !secret_matches(provided, expected) {
            tracing::warn!("Rejected admin request to {}", parts.uri.path());
            return Err(ApiError(AppError::Unauthorized {
                message: "invalid admin token".to_string(),
            }));
        }
        Ok(AdminAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches(Some("admin-token-0123456789"), "admin-token-0123456789"));
        assert!(!secret_matches(Some("admin-token-0123456780"), "admin-token-0123456789"));
        assert!(!secret_matches(Some("admin-token"), "admin-token-0123456789"));
        assert!(!secret_matches(Some(""), "admin-token-0123456789"));
        assert!(!secret_matches(None, "admin-token-0123456789"));
    }
}
