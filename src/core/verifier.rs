use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::model::{License, LicenseStatus};
use crate::domain::ports::{Query, Store};
use crate::domain::services::account::normalize_account_number;
use crate::domain::services::license_dates::{evaluate, LicenseState};
use crate::utils::error::Result;

/// Answer of the license check an EA performs on start-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    Active {
        account_number: String,
        product_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        days_remaining: Option<i64>,
        lifetime: bool,
    },
    Expired {
        account_number: String,
        product_id: Uuid,
        expired_at: DateTime<Utc>,
        message: String,
    },
    Invalid {
        message: String,
    },
}

pub struct LicenseVerifier<S: Store> {
    store: Arc<S>,
}

/// Lifetime ranks above any dated expiry.
fn later_expiry(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

impl<S: Store> LicenseVerifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn verify(
        &self,
        account_number: &str,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Verification> {
        let Ok(account) = normalize_account_number(account_number) else {
            tracing::debug!("Rejecting malformed account number {:?}", account_number);
            return Ok(Verification::Invalid {
                message: "Invalid account number".to_string(),
            });
        };

        let licenses: Vec<License> = self
            .store
            .select(
                &Query::new()
                    .eq("account_number", &account)
                    .eq("product_id", product_id),
            )
            .await?;

        let live: Vec<License> = licenses
            .into_iter()
            .filter(|l| l.status != LicenseStatus::Revoked)
            .collect();

        if live.is_empty() {
            tracing::info!("🔍 No license for account {} / product {}", account, product_id);
            return Ok(Verification::Invalid {
                message: "No license found for this account".to_string(),
            });
        }

        self.write_back_lapsed(&live, now).await;

        let best_active = live
            .iter()
            .filter_map(|l| match evaluate(l, now) {
                LicenseState::Active {
                    expires_at,
                    days_remaining,
                } => Some((expires_at, days_remaining)),
                _ => None,
            })
            .max_by(|a, b| later_expiry(a.0, b.0));

        if let Some((expires_at, days_remaining)) = best_active {
            tracing::info!("✅ License active for account {} / product {}", account, product_id);
            return Ok(Verification::Active {
                account_number: account,
                product_id,
                expires_at,
                days_remaining,
                lifetime: expires_at.is_none(),
            });
        }

        // no live license is active by date, so every one carries an expiry
        let expired_at = live
            .iter()
            .filter_map(|l| l.expires_at)
            .max()
            .unwrap_or(now);

        tracing::info!("⌛ License expired for account {} / product {}", account, product_id);
        Ok(Verification::Expired {
            account_number: account,
            product_id,
            expired_at,
            message: "License expired".to_string(),
        })
    }

    /// Rows still stored as active past their expiry are flipped to expired.
    /// Failures are logged only; the answer does not depend on them.
    async fn write_back_lapsed(&self, licenses: &[License], now: DateTime<Utc>) {
        for license in licenses {
            if license.status != LicenseStatus::Active || evaluate(license, now).is_active() {
                continue;
            }

            let mut expired = license.clone();
            expired.status = LicenseStatus::Expired;
            expired.updated_at = now;
            if let Err(e) = self.store.update(&expired).await {
                tracing::warn!("Could not mark license {} expired: {}", license.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::model::LicenseSource;
    use chrono::Duration;

    fn license(product_id: Uuid, account: &str, status: LicenseStatus, expires_at: Option<DateTime<Utc>>) -> License {
        let created = Utc::now() - Duration::days(60);
        License {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id,
            account_number: account.to_string(),
            status,
            source: LicenseSource::Purchase,
            order_id: None,
            expires_at,
            created_at: created,
            updated_at: created,
        }
    }

    async fn verifier_with(licenses: Vec<License>) -> (LicenseVerifier<InMemoryStore>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        for l in &licenses {
            store.insert(l).await.unwrap();
        }
        (LicenseVerifier::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_active_license() {
        let now = Utc::now();
        let product = Uuid::new_v4();
        let expiry = now + Duration::days(10);
        let (verifier, _) =
            verifier_with(vec![license(product, "50123456", LicenseStatus::Active, Some(expiry))]).await;

        let result = verifier.verify(" 50123456 ", product, now).await.unwrap();
        assert_eq!(
            result,
            Verification::Active {
                account_number: "50123456".to_string(),
                product_id: product,
                expires_at: Some(expiry),
                days_remaining: Some(10),
                lifetime: false,
            }
        );
    }

    #[tokio::test]
    async fn test_lifetime_wins_over_dated_license() {
        let now = Utc::now();
        let product = Uuid::new_v4();
        let (verifier, _) = verifier_with(vec![
            license(product, "50123456", LicenseStatus::Active, Some(now + Duration::days(3))),
            license(product, "50123456", LicenseStatus::Active, None),
        ])
        .await;

        match verifier.verify("50123456", product, now).await.unwrap() {
            Verification::Active { lifetime, expires_at, .. } => {
                assert!(lifetime);
                assert_eq!(expires_at, None);
            }
            other => panic!("expected active, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_license_is_written_back() {
        let now = Utc::now();
        let product = Uuid::new_v4();
        let lapsed = license(product, "50123456", LicenseStatus::Active, Some(now - Duration::days(2)));
        let lapsed_id = lapsed.id;
        let (verifier, store) = verifier_with(vec![lapsed]).await;

        let result = verifier.verify("50123456", product, now).await.unwrap();
        assert!(matches!(result, Verification::Expired { .. }));

        let stored: License = store.fetch(lapsed_id).await.unwrap().unwrap();
        assert_eq!(stored.status, LicenseStatus::Expired);
    }

    #[tokio::test]
    async fn test_revoked_and_unknown_are_invalid() {
        let now = Utc::now();
        let product = Uuid::new_v4();
        let (verifier, _) =
            verifier_with(vec![license(product, "50123456", LicenseStatus::Revoked, None)]).await;

        assert!(matches!(
            verifier.verify("50123456", product, now).await.unwrap(),
            Verification::Invalid { .. }
        ));
        assert!(matches!(
            verifier.verify("50999999", product, now).await.unwrap(),
            Verification::Invalid { .. }
        ));
        assert!(matches!(
            verifier.verify("abc", product, now).await.unwrap(),
            Verification::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn test_other_product_does_not_match() {
        let now = Utc::now();
        let (verifier, _) = verifier_with(vec![license(
            Uuid::new_v4(),
            "50123456",
            LicenseStatus::Active,
            None,
        )])
        .await;

        let result = verifier.verify("50123456", Uuid::new_v4(), now).await.unwrap();
        assert!(matches!(result, Verification::Invalid { .. }));
    }
}
