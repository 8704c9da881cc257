use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::guards;
use crate::domain::model::{
    Broker, Commission, CommissionStatus, IbRequest, IbStatus, License, LicenseSource,
    LicenseStatus, NewBroker, NewLicense, NewProduct, Order, OrderStatus, PaymentDetails,
    PaymentSettings, Product, Profile,
};
use crate::domain::ports::{Query, Row, Store};
use crate::domain::services::account::normalize_account_number;
use crate::domain::services::commission::{commission_cents, validate_rate};
use crate::domain::services::license_dates::{expiry_from, renewal_expiry, status_at};
use crate::domain::services::reporting::{
    dashboard_stats, filter_licenses, filter_orders, join_licenses, join_orders, DashboardStats,
    LicenseFilter, LicenseView, OrderFilter, OrderView,
};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct OrderApproval {
    pub order: Order,
    pub license: License,
    pub commission: Option<Commission>,
    /// An existing license was extended instead of issuing a new one.
    pub renewed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IbApproval {
    pub request: IbRequest,
    pub license: License,
}

/// Admin actions over orders, IB requests, licenses, affiliates and the catalog.
pub struct BackOffice<S: Store> {
    store: Arc<S>,
}

impl<S: Store> BackOffice<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn get<T: Row>(&self, entity: &'static str, id: Uuid) -> Result<T> {
        self.store
            .fetch::<T>(id)
            .await?
            .ok_or_else(|| AppError::not_found(entity, id))
    }

    // ---- orders ----

    pub async fn approve_order(&self, order_id: Uuid, now: DateTime<Utc>) -> Result<OrderApproval> {
        let mut order: Order = self.get("order", order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::transition("order", order.status, OrderStatus::Completed));
        }
        let product: Product = self.get("product", order.product_id).await?;

        guards::ensure_account_available(self.store.as_ref(), &order.account_number, order.user_id)
            .await?;

        let existing = guards::existing_license(
            self.store.as_ref(),
            order.user_id,
            &order.account_number,
            product.id,
        )
        .await?;
        let renewed = existing.is_some();

        let license = match existing {
            Some(mut license) => {
                license.expires_at = renewal_expiry(license.expires_at, now, product.duration_months);
                license.status = status_at(license.expires_at, now);
                license.order_id = Some(order.id);
                license.updated_at = now;
                self.store.update(&license).await?
            }
            None => {
                let license = License {
                    id: Uuid::new_v4(),
                    user_id: order.user_id,
                    product_id: product.id,
                    account_number: order.account_number.clone(),
                    status: LicenseStatus::Active,
                    source: LicenseSource::Purchase,
                    order_id: Some(order.id),
                    expires_at: expiry_from(now, product.duration_months),
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert(&license).await?
            }
        };

        order.status = OrderStatus::Completed;
        order.processed_at = Some(now);
        let order = self.store.update(&order).await?;

        let commission = self.record_commission(&order, now).await?;

        tracing::info!(
            "✅ Order {} approved; license {} {} until {}",
            order.id,
            license.id,
            if renewed { "renewed" } else { "issued" },
            license
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "lifetime".to_string())
        );

        Ok(OrderApproval {
            order,
            license,
            commission,
            renewed,
        })
    }

    async fn record_commission(&self, order: &Order, now: DateTime<Utc>) -> Result<Option<Commission>> {
        let buyer: Profile = self.get("profile", order.user_id).await?;
        let Some(affiliate_id) = buyer.referred_by.filter(|id| *id != buyer.id) else {
            return Ok(None);
        };
        let Some(affiliate) = self.store.fetch::<Profile>(affiliate_id).await? else {
            tracing::warn!("Referrer {} of {} no longer exists", affiliate_id, buyer.id);
            return Ok(None);
        };

        let amount = commission_cents(order.amount_cents, affiliate.commission_rate);
        if amount <= 0 {
            return Ok(None);
        }

        let commission = Commission {
            id: Uuid::new_v4(),
            affiliate_id,
            order_id: order.id,
            referred_user_id: buyer.id,
            amount_cents: amount,
            rate_percent: affiliate.commission_rate,
            status: CommissionStatus::Pending,
            created_at: now,
            paid_at: None,
        };
        let commission = self.store.insert(&commission).await?;
        tracing::info!("💰 Commission {} cents for affiliate {}", amount, affiliate_id);
        Ok(Some(commission))
    }

    pub async fn reject_order(
        &self,
        order_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let mut order: Order = self.get("order", order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::transition("order", order.status, OrderStatus::Rejected));
        }

        order.status = OrderStatus::Rejected;
        order.admin_note = note;
        order.processed_at = Some(now);
        let order = self.store.update(&order).await?;
        tracing::info!("❌ Order {} rejected", order.id);
        Ok(order)
    }

    // ---- IB requests ----

    pub async fn approve_ib_request(&self, request_id: Uuid, now: DateTime<Utc>) -> Result<IbApproval> {
        let mut request: IbRequest = self.get("ib request", request_id).await?;
        if request.status != IbStatus::Pending {
            return Err(AppError::transition("ib request", request.status, IbStatus::Approved));
        }

        guards::ensure_account_available(self.store.as_ref(), &request.account_number, request.user_id)
            .await?;

        // IB accounts trade under a partnered broker, so usage is free and unbounded.
        let existing = guards::existing_license(
            self.store.as_ref(),
            request.user_id,
            &request.account_number,
            request.product_id,
        )
        .await?;
        let license = match existing {
            Some(mut license) => {
                license.expires_at = None;
                license.status = LicenseStatus::Active;
                license.source = LicenseSource::Ib;
                license.updated_at = now;
                self.store.update(&license).await?
            }
            None => {
                let license = License {
                    id: Uuid::new_v4(),
                    user_id: request.user_id,
                    product_id: request.product_id,
                    account_number: request.account_number.clone(),
                    status: LicenseStatus::Active,
                    source: LicenseSource::Ib,
                    order_id: None,
                    expires_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert(&license).await?
            }
        };

        request.status = IbStatus::Approved;
        request.processed_at = Some(now);
        let request = self.store.update(&request).await?;
        tracing::info!("🤝 IB request {} approved; license {}", request.id, license.id);

        Ok(IbApproval { request, license })
    }

    pub async fn reject_ib_request(
        &self,
        request_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<IbRequest> {
        let mut request: IbRequest = self.get("ib request", request_id).await?;
        if request.status != IbStatus::Pending {
            return Err(AppError::transition("ib request", request.status, IbStatus::Rejected));
        }

        request.status = IbStatus::Rejected;
        request.admin_note = note;
        request.processed_at = Some(now);
        let request = self.store.update(&request).await?;
        tracing::info!("IB request {} rejected", request.id);
        Ok(request)
    }

    pub async fn ib_requests(&self, status: Option<IbStatus>) -> Result<Vec<IbRequest>> {
        let query = match status {
            Some(s) => Query::new().eq("status", s),
            None => Query::new(),
        };
        let mut requests: Vec<IbRequest> = self.store.select(&query).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    // ---- affiliates ----

    pub async fn set_commission_rate(&self, profile_id: Uuid, rate_percent: f64) -> Result<Profile> {
        let rate = validate_rate(rate_percent)?;
        let mut profile: Profile = self.get("profile", profile_id).await?;
        profile.commission_rate = rate;
        let profile = self.store.update(&profile).await?;
        tracing::info!("Commission rate for {} set to {}%", profile.id, rate);
        Ok(profile)
    }

    pub async fn mark_commission_paid(&self, commission_id: Uuid, now: DateTime<Utc>) -> Result<Commission> {
        let mut commission: Commission = self.get("commission", commission_id).await?;
        if commission.status != CommissionStatus::Pending {
            return Err(AppError::transition(
                "commission",
                commission.status,
                CommissionStatus::Paid,
            ));
        }

        commission.status = CommissionStatus::Paid;
        commission.paid_at = Some(now);
        Ok(self.store.update(&commission).await?)
    }

    pub async fn commissions(&self, status: Option<CommissionStatus>) -> Result<Vec<Commission>> {
        let query = match status {
            Some(s) => Query::new().eq("status", s),
            None => Query::new(),
        };
        let mut commissions: Vec<Commission> = self.store.select(&query).await?;
        commissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(commissions)
    }

    // ---- licenses ----

    async fn editable_license(&self, license_id: Uuid) -> Result<License> {
        let license: License = self.get("license", license_id).await?;
        if license.status == LicenseStatus::Revoked {
            return Err(AppError::transition("license", LicenseStatus::Revoked, LicenseStatus::Active));
        }
        Ok(license)
    }

    /// `None` makes the license lifetime. The stored status follows the new date.
    pub async fn set_license_expiry(
        &self,
        license_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<License> {
        let mut license = self.editable_license(license_id).await?;
        license.expires_at = expires_at;
        license.status = status_at(expires_at, now);
        license.updated_at = now;
        let license = self.store.update(&license).await?;
        tracing::info!("License {} expiry set; now {}", license.id, license.status);
        Ok(license)
    }

    pub async fn extend_license(&self, license_id: Uuid, months: u32, now: DateTime<Utc>) -> Result<License> {
        if months == 0 {
            return Err(AppError::validation("months", "must be at least 1"));
        }
        let mut license = self.editable_license(license_id).await?;
        if license.expires_at.is_none() {
            return Err(AppError::validation("months", "license is already lifetime"));
        }

        license.expires_at = renewal_expiry(license.expires_at, now, Some(months));
        license.status = status_at(license.expires_at, now);
        license.updated_at = now;
        Ok(self.store.update(&license).await?)
    }

    pub async fn revoke_license(&self, license_id: Uuid, now: DateTime<Utc>) -> Result<License> {
        let mut license = self.editable_license(license_id).await?;
        license.status = LicenseStatus::Revoked;
        license.updated_at = now;
        let license = self.store.update(&license).await?;
        tracing::info!("🚫 License {} revoked", license.id);
        Ok(license)
    }

    pub async fn create_license(&self, new_license: NewLicense, now: DateTime<Utc>) -> Result<License> {
        let _: Profile = self.get("profile", new_license.user_id).await?;
        let product: Product = self.get("product", new_license.product_id).await?;
        let account = normalize_account_number(&new_license.account_number)?;

        guards::ensure_account_available(self.store.as_ref(), &account, new_license.user_id).await?;
        if guards::existing_license(self.store.as_ref(), new_license.user_id, &account, product.id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "This account already has a license for this product; edit it instead",
            ));
        }

        let license = License {
            id: Uuid::new_v4(),
            user_id: new_license.user_id,
            product_id: product.id,
            account_number: account,
            status: status_at(new_license.expires_at, now),
            source: LicenseSource::Manual,
            order_id: None,
            expires_at: new_license.expires_at,
            created_at: now,
            updated_at: now,
        };
        Ok(self.store.insert(&license).await?)
    }

    /// Flips every license still stored as active past its expiry. Returns how many changed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let active: Vec<License> = self
            .store
            .select(&Query::new().eq("status", LicenseStatus::Active))
            .await?;

        let mut count = 0;
        for mut license in active {
            if status_at(license.expires_at, now) != LicenseStatus::Expired {
                continue;
            }
            license.status = LicenseStatus::Expired;
            license.updated_at = now;
            self.store.update(&license).await?;
            count += 1;
        }

        tracing::info!("⌛ Sweep marked {} licenses expired", count);
        Ok(count)
    }

    // ---- catalog ----

    fn check_product(input: &NewProduct) -> Result<()> {
        if input.name.trim().is_empty() {
            return Err(AppError::validation("name", "cannot be empty"));
        }
        if input.price_cents < 0 {
            return Err(AppError::validation("price_cents", "cannot be negative"));
        }
        if input.duration_months == Some(0) {
            return Err(AppError::validation("duration_months", "must be at least 1, or omitted for lifetime"));
        }
        Ok(())
    }

    pub async fn create_product(&self, input: NewProduct, now: DateTime<Utc>) -> Result<Product> {
        Self::check_product(&input)?;
        let product = Product {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            price_cents: input.price_cents,
            duration_months: input.duration_months,
            is_active: input.is_active,
            created_at: now,
        };
        Ok(self.store.insert(&product).await?)
    }

    pub async fn update_product(&self, product_id: Uuid, input: NewProduct) -> Result<Product> {
        Self::check_product(&input)?;
        let mut product: Product = self.get("product", product_id).await?;
        product.name = input.name.trim().to_string();
        product.description = input.description;
        product.price_cents = input.price_cents;
        product.duration_months = input.duration_months;
        product.is_active = input.is_active;
        Ok(self.store.update(&product).await?)
    }

    pub async fn create_broker(&self, input: NewBroker, now: DateTime<Utc>) -> Result<Broker> {
        if input.name.trim().is_empty() {
            return Err(AppError::validation("name", "cannot be empty"));
        }
        let broker = Broker {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            referral_link: input.referral_link,
            is_active: true,
            created_at: now,
        };
        Ok(self.store.insert(&broker).await?)
    }

    pub async fn set_broker_active(&self, broker_id: Uuid, is_active: bool) -> Result<Broker> {
        let mut broker: Broker = self.get("broker", broker_id).await?;
        broker.is_active = is_active;
        Ok(self.store.update(&broker).await?)
    }

    /// There is a single settings row; the first save creates it.
    pub async fn update_payment_settings(
        &self,
        details: PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<PaymentSettings> {
        let existing = self.store.list::<PaymentSettings>().await?.into_iter().next();
        let settings = PaymentSettings {
            id: existing.as_ref().map(|s| s.id).unwrap_or_else(Uuid::new_v4),
            bank_name: details.bank_name,
            bank_account_name: details.bank_account_name,
            bank_account_number: details.bank_account_number,
            crypto_wallet: details.crypto_wallet,
            crypto_network: details.crypto_network,
            instructions: details.instructions,
            updated_at: Some(now),
        };

        match existing {
            Some(_) => self.store.update(&settings).await,
            None => self.store.insert(&settings).await,
        }
    }

    // ---- reporting ----

    pub async fn order_views(&self, filter: &OrderFilter) -> Result<Vec<OrderView>> {
        let orders: Vec<Order> = match filter.status {
            Some(s) => self.store.select(&Query::new().eq("status", s)).await?,
            None => self.store.list().await?,
        };
        let profiles: Vec<Profile> = self.store.list().await?;
        let products: Vec<Product> = self.store.list().await?;
        Ok(filter_orders(join_orders(orders, &profiles, &products), filter))
    }

    pub async fn license_views(&self, filter: &LicenseFilter, now: DateTime<Utc>) -> Result<Vec<LicenseView>> {
        let licenses: Vec<License> = self.store.list().await?;
        let profiles: Vec<Profile> = self.store.list().await?;
        let products: Vec<Product> = self.store.list().await?;
        Ok(filter_licenses(
            join_licenses(licenses, &profiles, &products, now),
            filter,
            now,
        ))
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardStats> {
        let orders: Vec<Order> = self.store.list().await?;
        let licenses: Vec<License> = self.store.list().await?;
        let ib_requests: Vec<IbRequest> = self.store.list().await?;
        let commissions: Vec<Commission> = self.store.list().await?;
        Ok(dashboard_stats(&orders, &licenses, &ib_requests, &commissions, now))
    }
}
