//! Lookups issued before an insert to keep account numbers unambiguous.

use uuid::Uuid;

use crate::domain::model::{IbRequest, IbStatus, License, LicenseStatus, Order, OrderStatus};
use crate::domain::ports::{Query, Store};
use crate::utils::error::{AppError, Result};

/// A trading account belongs to the first user holding a non-revoked license on it.
pub async fn ensure_account_available<S: Store>(
    store: &S,
    account_number: &str,
    user_id: Uuid,
) -> Result<()> {
    let licenses: Vec<License> = store
        .select(&Query::new().eq("account_number", account_number))
        .await?;

    let taken = licenses
        .iter()
        .any(|l| l.user_id != user_id && l.status != LicenseStatus::Revoked);
    if taken {
        tracing::warn!("Account {} is licensed to another user", account_number);
        return Err(AppError::conflict(format!(
            "Account {} is already registered to another user",
            account_number
        )));
    }
    Ok(())
}

/// Non-revoked license of `user_id` for this account and product, if any.
pub async fn existing_license<S: Store>(
    store: &S,
    user_id: Uuid,
    account_number: &str,
    product_id: Uuid,
) -> Result<Option<License>> {
    let licenses: Vec<License> = store
        .select(
            &Query::new()
                .eq("account_number", account_number)
                .eq("product_id", product_id)
                .eq("user_id", user_id),
        )
        .await?;

    Ok(licenses
        .into_iter()
        .filter(|l| l.status != LicenseStatus::Revoked)
        .max_by_key(|l| l.created_at))
}

pub async fn ensure_no_pending_order<S: Store>(
    store: &S,
    account_number: &str,
    product_id: Uuid,
) -> Result<()> {
    let pending: Vec<Order> = store
        .select(
            &Query::new()
                .eq("account_number", account_number)
                .eq("product_id", product_id)
                .eq("status", OrderStatus::Pending),
        )
        .await?;

    if !pending.is_empty() {
        return Err(AppError::conflict(
            "An order for this account is already awaiting approval",
        ));
    }
    Ok(())
}

pub async fn ensure_no_pending_ib_request<S: Store>(store: &S, account_number: &str) -> Result<()> {
    let pending: Vec<IbRequest> = store
        .select(
            &Query::new()
                .eq("account_number", account_number)
                .eq("status", IbStatus::Pending),
        )
        .await?;

    if !pending.is_empty() {
        return Err(AppError::conflict(
            "An IB request for this account is already awaiting approval",
        ));
    }
    Ok(())
}
