pub mod account;
pub mod commission;
pub mod license_dates;
pub mod reporting;
