#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::ServeArgs;
pub use toml_config::{StoreBackend, StoreConfig};
