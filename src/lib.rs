pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::ServeArgs;
pub use config::{StoreBackend, StoreConfig};

pub use crate::adapters::{InMemoryStore, RestStore};
pub use crate::core::{BackOffice, LicenseVerifier, Storefront, Verification};
pub use domain::ports::{ConfigProvider, Query, Row, Store};
pub use utils::error::{AppError, Result};
