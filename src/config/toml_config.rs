use crate::domain::ports::ConfigProvider;
use crate::domain::services::commission::validate_rate;
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{
    is_unresolved_placeholder, validate_non_empty_string, validate_positive_number,
    validate_required_field, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_COMMISSION_RATE: f64 = 10.0;
const MIN_ADMIN_TOKEN_LEN: usize = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub licensing: Option<LicensingConfig>,
    pub affiliate: Option<AffiliateConfig>,
    pub admin: Option<AdminConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Rest,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: Option<StoreBackend>,
    pub url: Option<String>,
    pub service_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicensingConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffiliateConfig {
    pub default_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

/// 空字串或未替換的 `${VAR}` 都當作沒設定
fn secret(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !is_unresolved_placeholder(v))
}

impl StoreConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AppError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${SUPABASE_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AppError::ConfigError {
            message: format!("placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// In-memory backend with defaults everywhere else.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseConfig {
                backend: Some(StoreBackend::Memory),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn backend(&self) -> StoreBackend {
        self.database.backend.unwrap_or_default()
    }

    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.server.host.as_deref().unwrap_or("0.0.0.0"),
            self.server.port.unwrap_or(DEFAULT_PORT)
        )
    }

    pub fn cors_enabled(&self) -> bool {
        self.server.cors.unwrap_or(true)
    }

    pub fn database_url(&self) -> Option<&str> {
        secret(&self.database.url)
    }

    pub fn service_key(&self) -> Option<&str> {
        secret(&self.database.service_key)
    }

    /// Data API URL and service key. The memory backend has neither.
    pub fn rest_credentials(&self) -> Result<(&str, &str)> {
        if self.backend() == StoreBackend::Memory {
            return Err(AppError::ConfigValidationError {
                field: "database.backend".to_string(),
                message: "the memory backend lives inside the server process; \
                          set backend = \"rest\" to reach the hosted database"
                    .to_string(),
            });
        }
        let url = self.database_url().ok_or(AppError::MissingConfigError {
            field: "database.url".to_string(),
        })?;
        let key = self.service_key().ok_or(AppError::MissingConfigError {
            field: "database.service_key".to_string(),
        })?;
        Ok((url, key))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.database.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if self.backend() == StoreBackend::Rest {
            let url = validate_required_field("database.url", &self.database.url)?;
            validate_url("database.url", url)?;
            let key = validate_required_field("database.service_key", &self.database.service_key)?;
            validate_non_empty_string("database.service_key", key)?;
            if self.service_key().is_none() {
                return Err(AppError::MissingConfigError {
                    field: "database.service_key".to_string(),
                });
            }
        }

        if let Some(timeout) = self.database.timeout_seconds {
            validate_positive_number("database.timeout_seconds", timeout, 1)?;
        }

        if let Some(rate) = self.affiliate.as_ref().and_then(|a| a.default_rate) {
            validate_rate(rate).map_err(|e| AppError::ConfigValidationError {
                field: "affiliate.default_rate".to_string(),
                message: e.to_string(),
            })?;
        }

        if let Some(token) = self.admin.as_ref().and_then(|a| secret(&a.token)) {
            if token.len() < MIN_ADMIN_TOKEN_LEN {
                return Err(AppError::InvalidConfigValueError {
                    field: "admin.token".to_string(),
                    value: "<redacted>".to_string(),
                    reason: format!("Token must be at least {} characters", MIN_ADMIN_TOKEN_LEN),
                });
            }
        }

        if let Some(level) = self.log_level() {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level) {
                return Err(AppError::InvalidConfigValueError {
                    field: "monitoring.log_level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }
}

impl ConfigProvider for StoreConfig {
    fn verify_api_key(&self) -> Option<&str> {
        self.licensing.as_ref().and_then(|l| secret(&l.api_key))
    }

    fn admin_token(&self) -> Option<&str> {
        self.admin.as_ref().and_then(|a| secret(&a.token))
    }

    fn default_commission_rate(&self) -> f64 {
        self.affiliate
            .as_ref()
            .and_then(|a| a.default_rate)
            .unwrap_or(DEFAULT_COMMISSION_RATE)
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
