pub mod back_office;
pub mod export;
pub mod guards;
pub mod storefront;
pub mod verifier;

pub use crate::domain::model::*;
pub use crate::domain::ports::{ConfigProvider, Query, Row, Store};
pub use crate::utils::error::Result;
pub use back_office::{BackOffice, IbApproval, OrderApproval};
pub use storefront::{ReferralSummary, Storefront};
pub use verifier::{LicenseVerifier, Verification};
