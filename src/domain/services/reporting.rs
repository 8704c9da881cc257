//! Admin table views: join already-fetched rows, then filter and sort in memory.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::model::{
    Commission, CommissionStatus, IbRequest, IbStatus, License, LicenseStatus, Order,
    OrderStatus, Product, Profile,
};
use crate::domain::services::license_dates::{evaluate, LicenseState};

/// Licenses expiring within this many days count as "expiring soon" on the dashboard.
pub const EXPIRING_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSortKey {
    #[default]
    CreatedAt,
    Amount,
    Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseSortKey {
    #[default]
    CreatedAt,
    ExpiresAt,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: OrderSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LicenseFilter {
    /// Matched against the state by date, not the stored status.
    pub status: Option<LicenseStatus>,
    pub search: Option<String>,
    pub expiring_within_days: Option<i64>,
    #[serde(default)]
    pub sort: LicenseSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseView {
    #[serde(flatten)]
    pub license: License,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub product_name: Option<String>,
    pub state: LicenseState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_revenue_cents: i64,
    pub completed_orders: usize,
    pub pending_orders: usize,
    pub rejected_orders: usize,
    pub active_licenses: usize,
    pub expired_licenses: usize,
    pub expiring_soon: usize,
    pub pending_ib_requests: usize,
    pub pending_commission_cents: i64,
    pub paid_commission_cents: i64,
}

struct Lookup<'a> {
    profiles: HashMap<Uuid, &'a Profile>,
    products: HashMap<Uuid, &'a Product>,
}

impl<'a> Lookup<'a> {
    fn new(profiles: &'a [Profile], products: &'a [Product]) -> Self {
        Self {
            profiles: profiles.iter().map(|p| (p.id, p)).collect(),
            products: products.iter().map(|p| (p.id, p)).collect(),
        }
    }

    fn user(&self, id: Uuid) -> (Option<String>, Option<String>) {
        match self.profiles.get(&id) {
            Some(p) => (Some(p.email.clone()), p.full_name.clone()),
            None => (None, None),
        }
    }

    fn product_name(&self, id: Uuid) -> Option<String> {
        self.products.get(&id).map(|p| p.name.clone())
    }
}

pub fn join_orders(orders: Vec<Order>, profiles: &[Profile], products: &[Product]) -> Vec<OrderView> {
    let lookup = Lookup::new(profiles, products);
    orders
        .into_iter()
        .map(|order| {
            let (user_email, user_name) = lookup.user(order.user_id);
            let product_name = lookup.product_name(order.product_id);
            OrderView {
                order,
                user_email,
                user_name,
                product_name,
            }
        })
        .collect()
}

pub fn join_licenses(
    licenses: Vec<License>,
    profiles: &[Profile],
    products: &[Product],
    now: DateTime<Utc>,
) -> Vec<LicenseView> {
    let lookup = Lookup::new(profiles, products);
    licenses
        .into_iter()
        .map(|license| {
            let (user_email, user_name) = lookup.user(license.user_id);
            let product_name = lookup.product_name(license.product_id);
            let state = evaluate(&license, now);
            LicenseView {
                license,
                user_email,
                user_name,
                product_name,
                state,
            }
        })
        .collect()
}

fn matches_search(needle: &Option<String>, haystacks: &[Option<&str>]) -> bool {
    let needle = match needle.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_lowercase(),
        _ => return true,
    };
    haystacks
        .iter()
        .flatten()
        .any(|h| h.to_lowercase().contains(&needle))
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

pub fn filter_orders(views: Vec<OrderView>, filter: &OrderFilter) -> Vec<OrderView> {
    let mut out: Vec<OrderView> = views
        .into_iter()
        .filter(|v| filter.status.map_or(true, |s| v.order.status == s))
        .filter(|v| {
            matches_search(
                &filter.search,
                &[
                    v.user_email.as_deref(),
                    v.user_name.as_deref(),
                    Some(v.order.account_number.as_str()),
                    v.product_name.as_deref(),
                ],
            )
        })
        .collect();

    out.sort_by(|a, b| {
        let ordering = match filter.sort {
            OrderSortKey::CreatedAt => a.order.created_at.cmp(&b.order.created_at),
            OrderSortKey::Amount => a.order.amount_cents.cmp(&b.order.amount_cents),
            OrderSortKey::Status => a.order.status.as_str().cmp(b.order.status.as_str()),
        };
        directed(ordering, filter.direction)
    });
    out
}

fn state_matches(state: &LicenseState, status: LicenseStatus) -> bool {
    matches!(
        (state, status),
        (LicenseState::Active { .. }, LicenseStatus::Active)
            | (LicenseState::Expired { .. }, LicenseStatus::Expired)
            | (LicenseState::Revoked, LicenseStatus::Revoked)
    )
}

fn expiring_within(state: &LicenseState, days: i64, now: DateTime<Utc>) -> bool {
    match state {
        LicenseState::Active {
            expires_at: Some(at),
            ..
        } => Duration::try_days(days)
            .and_then(|window| now.checked_add_signed(window))
            // 超出日期範圍時視為沒有上限
            .map_or(days > 0, |limit| *at <= limit),
        _ => false,
    }
}

pub fn filter_licenses(
    views: Vec<LicenseView>,
    filter: &LicenseFilter,
    now: DateTime<Utc>,
) -> Vec<LicenseView> {
    let mut out: Vec<LicenseView> = views
        .into_iter()
        .filter(|v| filter.status.map_or(true, |s| state_matches(&v.state, s)))
        .filter(|v| {
            filter
                .expiring_within_days
                .map_or(true, |days| expiring_within(&v.state, days, now))
        })
        .filter(|v| {
            matches_search(
                &filter.search,
                &[
                    v.user_email.as_deref(),
                    v.user_name.as_deref(),
                    Some(v.license.account_number.as_str()),
                    v.product_name.as_deref(),
                ],
            )
        })
        .collect();

    out.sort_by(|a, b| {
        let ordering = match filter.sort {
            LicenseSortKey::CreatedAt => a.license.created_at.cmp(&b.license.created_at),
            // lifetime sorts after every dated license
            LicenseSortKey::ExpiresAt => match (a.license.expires_at, b.license.expires_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        directed(ordering, filter.direction)
    });
    out
}

pub fn dashboard_stats(
    orders: &[Order],
    licenses: &[License],
    ib_requests: &[IbRequest],
    commissions: &[Commission],
    now: DateTime<Utc>,
) -> DashboardStats {
    let mut stats = DashboardStats::default();

    for order in orders {
        match order.status {
            OrderStatus::Completed => {
                stats.completed_orders += 1;
                stats.total_revenue_cents += order.amount_cents;
            }
            OrderStatus::Pending => stats.pending_orders += 1,
            OrderStatus::Rejected => stats.rejected_orders += 1,
        }
    }

    for license in licenses {
        let state = evaluate(license, now);
        match state {
            LicenseState::Active { .. } => {
                stats.active_licenses += 1;
                if expiring_within(&state, EXPIRING_SOON_DAYS, now) {
                    stats.expiring_soon += 1;
                }
            }
            LicenseState::Expired { .. } => stats.expired_licenses += 1,
            LicenseState::Revoked => {}
        }
    }

    stats.pending_ib_requests = ib_requests
        .iter()
        .filter(|r| r.status == IbStatus::Pending)
        .count();

    for commission in commissions {
        match commission.status {
            CommissionStatus::Pending => stats.pending_commission_cents += commission.amount_cents,
            CommissionStatus::Paid => stats.paid_commission_cents += commission.amount_cents,
        }
    }

    stats
}
