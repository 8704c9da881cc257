use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Database API returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error on '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Database,
    Validation,
    BusinessRule,
    Access,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }

    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        AppError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ApiError(_) => ErrorCategory::Network,
            AppError::Backend { .. } => ErrorCategory::Database,
            AppError::CsvError(_) | AppError::IoError(_) | AppError::SerializationError(_) => {
                ErrorCategory::System
            }
            AppError::ConfigError { .. }
            | AppError::ConfigValidationError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::MissingConfigError { .. } => ErrorCategory::Configuration,
            AppError::ValidationError { .. } => ErrorCategory::Validation,
            AppError::NotFound { .. }
            | AppError::Conflict { .. }
            | AppError::InvalidTransition { .. } => ErrorCategory::BusinessRule,
            AppError::Unauthorized { .. } => ErrorCategory::Access,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::BusinessRule => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Database => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Access => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給使用者看的訊息，不含內部細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::ApiError(_) => "Could not reach the database service".to_string(),
            AppError::Backend { status, .. } => {
                format!("The database service rejected the request (HTTP {})", status)
            }
            AppError::NotFound { entity, .. } => format!("The requested {} does not exist", entity),
            AppError::ValidationError { field, message } => format!("{}: {}", field, message),
            AppError::Conflict { message } => message.clone(),
            AppError::InvalidTransition { entity, from, .. } => {
                format!("This {} is already {}", entity, from)
            }
            AppError::Unauthorized { .. } => "You are not allowed to do that".to_string(),
            AppError::ConfigError { .. }
            | AppError::ConfigValidationError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::MissingConfigError { .. } => format!("Configuration problem: {}", self),
            AppError::CsvError(_) | AppError::IoError(_) | AppError::SerializationError(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the database URL, then retry",
            ErrorCategory::Database => "Check the service key and table permissions, then retry",
            ErrorCategory::Configuration => "Fix the configuration file or environment variables",
            ErrorCategory::Validation => "Correct the highlighted field and submit again",
            ErrorCategory::BusinessRule => "Refresh the list; the record may have changed",
            ErrorCategory::Access => "Check the API key or admin token",
            ErrorCategory::System => "Check disk space and file permissions",
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_low_severity() {
        let err = AppError::conflict("account already in use");
        assert_eq!(err.category(), ErrorCategory::BusinessRule);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.user_friendly_message(), "account already in use");
    }

    #[test]
    fn test_backend_error_message_hides_body() {
        let err = AppError::Backend {
            status: 503,
            message: "upstream connect error".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(!err.user_friendly_message().contains("upstream"));
    }

    #[test]
    fn test_transition_message() {
        let err = AppError::transition("order", "completed", "rejected");
        assert_eq!(err.to_string(), "Cannot move order from 'completed' to 'rejected'");
        assert_eq!(err.user_friendly_message(), "This order is already completed");
    }
}
