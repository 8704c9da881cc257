//! Expiry and renewal arithmetic shared by checkout approval, IB approval,
//! admin edits and the verification endpoint.
//!
//! `None` as an expiry always means a lifetime license.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use crate::domain::model::{License, LicenseStatus};

pub fn expiry_from(start: DateTime<Utc>, duration_months: Option<u32>) -> Option<DateTime<Utc>> {
    let months = duration_months?;
    Some(
        start
            .checked_add_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    )
}

/// New expiry when a license is bought again.
///
/// Time still left on the current license is kept: the extension starts from the
/// current expiry when that is in the future, from `now` otherwise.
pub fn renewal_expiry(
    current_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    duration_months: Option<u32>,
) -> Option<DateTime<Utc>> {
    let (Some(current), Some(_)) = (current_expiry, duration_months) else {
        return None;
    };

    let start = if current > now { current } else { now };
    expiry_from(start, duration_months)
}

pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

/// Whole days left, rounded up. Zero once expired.
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 86_399) / 86_400
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LicenseState {
    Active {
        expires_at: Option<DateTime<Utc>>,
        days_remaining: Option<i64>,
    },
    Expired {
        expired_at: DateTime<Utc>,
    },
    Revoked,
}

impl LicenseState {
    pub fn is_active(&self) -> bool {
        matches!(self, LicenseState::Active { .. })
    }
}

/// Effective state by date; the stored status may lag behind until a sweep runs.
pub fn evaluate(license: &License, now: DateTime<Utc>) -> LicenseState {
    if license.status == LicenseStatus::Revoked {
        return LicenseState::Revoked;
    }

    match license.expires_at {
        None => LicenseState::Active {
            expires_at: None,
            days_remaining: None,
        },
        Some(at) if at <= now => LicenseState::Expired { expired_at: at },
        Some(at) => LicenseState::Active {
            expires_at: Some(at),
            days_remaining: Some(days_remaining(at, now)),
        },
    }
}

/// Stored status a license should carry at `now`.
pub fn status_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> LicenseStatus {
    if is_expired(expires_at, now) {
        LicenseStatus::Expired
    } else {
        LicenseStatus::Active
    }
}
