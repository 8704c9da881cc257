use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::ports::Row;

/// snake_case 字串狀態，與資料表欄位值一致
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

string_enum!(Role { User => "user", Admin => "admin" });
string_enum!(OrderStatus { Pending => "pending", Completed => "completed", Rejected => "rejected" });
string_enum!(IbStatus { Pending => "pending", Approved => "approved", Rejected => "rejected" });
string_enum!(LicenseStatus { Active => "active", Expired => "expired", Revoked => "revoked" });
string_enum!(LicenseSource { Purchase => "purchase", Ib => "ib", Manual => "manual" });
string_enum!(CommissionStatus { Pending => "pending", Paid => "paid" });
string_enum!(PaymentMethod { BankTransfer => "bank_transfer", Crypto => "crypto" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    /// 推薦佣金百分比 (0-100)
    pub commission_rate: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    /// `None` means a lifetime license.
    pub duration_months: Option<u32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub account_number: String,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_proof_url: Option<String>,
    pub status: OrderStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub account_number: String,
    pub status: LicenseStatus,
    pub source: LicenseSource,
    pub order_id: Option<Uuid>,
    /// `None` means lifetime.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broker {
    pub id: Uuid,
    pub name: String,
    pub referral_link: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IbRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub broker_id: Uuid,
    pub product_id: Uuid,
    pub account_number: String,
    pub status: IbStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub order_id: Uuid,
    pub referred_user_id: Uuid,
    pub amount_cents: i64,
    pub rate_percent: f64,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSettings {
    pub id: Uuid,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub crypto_wallet: Option<String>,
    pub crypto_network: Option<String>,
    pub instructions: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

macro_rules! impl_row {
    ($($ty:ty => $table:literal),+ $(,)?) => {
        $(
            impl Row for $ty {
                const TABLE: &'static str = $table;

                fn id(&self) -> Uuid {
                    self.id
                }
            }
        )+
    };
}

impl_row!(
    Profile => "profiles",
    Product => "products",
    Order => "orders",
    License => "licenses",
    Broker => "brokers",
    IbRequest => "ib_requests",
    Commission => "commissions",
    PaymentSettings => "payment_settings",
);

/// Storefront input for a new purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: Uuid,
    pub account_number: String,
    pub payment_method: PaymentMethod,
    pub payment_proof_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIbRequest {
    pub broker_id: Uuid,
    pub product_id: Uuid,
    pub account_number: String,
}

/// Admin input for a manually issued license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLicense {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub account_number: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_months: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBroker {
    pub name: String,
    pub referral_link: Option<String>,
}

/// Admin input for the single payment settings row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub crypto_wallet: Option<String>,
    pub crypto_network: Option<String>,
    pub instructions: Option<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_as_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
        assert_eq!(OrderStatus::Completed.to_string(), "completed");
        assert_eq!("rejected".parse::<IbStatus>().unwrap(), IbStatus::Rejected);
        assert!("unknown".parse::<LicenseStatus>().is_err());
    }

    #[test]
    fn test_row_tables() {
        assert_eq!(<License as Row>::TABLE, "licenses");
        assert_eq!(<PaymentSettings as Row>::TABLE, "payment_settings");
    }
}
