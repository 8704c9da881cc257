use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::guards;
use crate::domain::model::{
    Broker, Commission, CommissionStatus, IbRequest, IbStatus, License, NewIbRequest, NewOrder,
    Order, OrderStatus, PaymentSettings, Product, Profile, Role,
};
use crate::domain::ports::{Query, Store};
use crate::domain::services::account::{
    normalize_account_number, normalize_email, normalize_referral_code, referral_code_for,
};
use crate::domain::services::license_dates::evaluate;
use crate::domain::services::reporting::{join_licenses, join_orders, LicenseView, OrderView};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::validate_url;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub commission_rate: f64,
    pub referred_users: usize,
    pub pending_cents: i64,
    pub paid_cents: i64,
}

/// User-facing actions. The caller's id comes from the hosted auth provider.
pub struct Storefront<S: Store> {
    store: Arc<S>,
    default_commission_rate: f64,
}

impl<S: Store> Storefront<S> {
    pub fn new(store: Arc<S>, default_commission_rate: f64) -> Self {
        Self {
            store,
            default_commission_rate,
        }
    }

    async fn profile(&self, user_id: Uuid) -> Result<Profile> {
        self.store
            .fetch::<Profile>(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("profile", user_id))
    }

    async fn available_product(&self, product_id: Uuid) -> Result<Product> {
        let product = self
            .store
            .fetch::<Product>(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("product", product_id))?;
        if !product.is_active {
            return Err(AppError::validation("product_id", "product is not available"));
        }
        Ok(product)
    }

    pub async fn register(
        &self,
        user_id: Uuid,
        email: &str,
        full_name: Option<String>,
        referral_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Profile> {
        if self.store.fetch::<Profile>(user_id).await?.is_some() {
            return Err(AppError::conflict("Profile already exists"));
        }

        let email = normalize_email(email)?;
        let same_email: Vec<Profile> = self.store.select(&Query::new().eq("email", &email)).await?;
        if !same_email.is_empty() {
            return Err(AppError::conflict("Email is already registered"));
        }

        let referred_by = match referral_code.map(normalize_referral_code) {
            Some(code) if !code.is_empty() => {
                let referrers: Vec<Profile> = self
                    .store
                    .select(&Query::new().eq("referral_code", &code))
                    .await?;
                let referrer = referrers
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::validation("referral_code", "unknown referral code"))?;
                Some(referrer.id)
            }
            _ => None,
        };

        let profile = Profile {
            id: user_id,
            email,
            full_name: full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            role: Role::User,
            referral_code: referral_code_for(user_id),
            referred_by,
            commission_rate: self.default_commission_rate,
            created_at: now,
        };

        let profile = self.store.insert(&profile).await?;
        tracing::info!("👤 Registered profile {} (referred: {})", profile.id, referred_by.is_some());
        Ok(profile)
    }

    pub async fn catalog(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self
            .store
            .select(&Query::new().eq("is_active", true))
            .await?;
        products.sort_by(|a, b| a.price_cents.cmp(&b.price_cents).then(a.name.cmp(&b.name)));
        Ok(products)
    }

    pub async fn active_brokers(&self) -> Result<Vec<Broker>> {
        let mut brokers: Vec<Broker> = self
            .store
            .select(&Query::new().eq("is_active", true))
            .await?;
        brokers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(brokers)
    }

    pub async fn payment_settings(&self) -> Result<Option<PaymentSettings>> {
        Ok(self.store.list::<PaymentSettings>().await?.into_iter().next())
    }

    pub async fn place_order(
        &self,
        user_id: Uuid,
        new_order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        self.profile(user_id).await?;
        let product = self.available_product(new_order.product_id).await?;
        let account = normalize_account_number(&new_order.account_number)?;

        let proof = new_order
            .payment_proof_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if let Some(url) = &proof {
            validate_url("payment_proof_url", url)
                .map_err(|_| AppError::validation("payment_proof_url", "must be an http(s) URL"))?;
        }

        guards::ensure_account_available(self.store.as_ref(), &account, user_id).await?;
        guards::ensure_no_pending_order(self.store.as_ref(), &account, product.id).await?;

        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            product_id: product.id,
            account_number: account,
            amount_cents: product.price_cents,
            payment_method: new_order.payment_method,
            payment_proof_url: proof,
            status: OrderStatus::Pending,
            admin_note: None,
            created_at: now,
            processed_at: None,
        };

        let order = self.store.insert(&order).await?;
        tracing::info!(
            "🛒 Order {} placed for {} on account {}",
            order.id,
            product.name,
            order.account_number
        );
        Ok(order)
    }

    pub async fn request_ib(
        &self,
        user_id: Uuid,
        request: NewIbRequest,
        now: DateTime<Utc>,
    ) -> Result<IbRequest> {
        self.profile(user_id).await?;

        let broker = self
            .store
            .fetch::<Broker>(request.broker_id)
            .await?
            .ok_or_else(|| AppError::not_found("broker", request.broker_id))?;
        if !broker.is_active {
            return Err(AppError::validation("broker_id", "broker is not accepting IB requests"));
        }

        let product = self.available_product(request.product_id).await?;
        let account = normalize_account_number(&request.account_number)?;

        guards::ensure_account_available(self.store.as_ref(), &account, user_id).await?;
        if let Some(existing) =
            guards::existing_license(self.store.as_ref(), user_id, &account, product.id).await?
        {
            if evaluate(&existing, now).is_active() {
                return Err(AppError::conflict(
                    "This account already has an active license for this product",
                ));
            }
        }
        guards::ensure_no_pending_ib_request(self.store.as_ref(), &account).await?;

        let ib_request = IbRequest {
            id: Uuid::new_v4(),
            user_id,
            broker_id: broker.id,
            product_id: product.id,
            account_number: account,
            status: IbStatus::Pending,
            admin_note: None,
            created_at: now,
            processed_at: None,
        };

        let ib_request = self.store.insert(&ib_request).await?;
        tracing::info!("🤝 IB request {} submitted under {}", ib_request.id, broker.name);
        Ok(ib_request)
    }

    pub async fn my_licenses(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<LicenseView>> {
        let profile = self.profile(user_id).await?;
        let mut licenses: Vec<License> = self
            .store
            .select(&Query::new().eq("user_id", user_id))
            .await?;
        licenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let products: Vec<Product> = self.store.list().await?;
        Ok(join_licenses(licenses, &[profile], &products, now))
    }

    pub async fn my_orders(&self, user_id: Uuid) -> Result<Vec<OrderView>> {
        let profile = self.profile(user_id).await?;
        let mut orders: Vec<Order> = self
            .store
            .select(&Query::new().eq("user_id", user_id))
            .await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let products: Vec<Product> = self.store.list().await?;
        Ok(join_orders(orders, &[profile], &products))
    }

    pub async fn referral_summary(&self, user_id: Uuid) -> Result<ReferralSummary> {
        let profile = self.profile(user_id).await?;
        let referred: Vec<Profile> = self
            .store
            .select(&Query::new().eq("referred_by", user_id))
            .await?;
        let commissions: Vec<Commission> = self
            .store
            .select(&Query::new().eq("affiliate_id", user_id))
            .await?;

        let sum = |status: CommissionStatus| -> i64 {
            commissions
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.amount_cents)
                .sum()
        };

        Ok(ReferralSummary {
            referral_code: profile.referral_code,
            commission_rate: profile.commission_rate,
            referred_users: referred.len(),
            pending_cents: sum(CommissionStatus::Pending),
            paid_cents: sum(CommissionStatus::Paid),
        })
    }
}
