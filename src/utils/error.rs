use thiserror::Error;

#[derive(Error, Debug)]
pub enum FreightError {
    #[error("Rate request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Session error: {message}")]
    SessionError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Data,
    Config,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FreightError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FreightError::ApiError(_) => ErrorCategory::Network,
            FreightError::IoError(_) => ErrorCategory::Io,
            FreightError::SerializationError(_) | FreightError::ProcessingError { .. } => {
                ErrorCategory::Data
            }
            FreightError::TomlError(_)
            | FreightError::ConfigError { .. }
            | FreightError::InvalidConfigValueError { .. }
            | FreightError::ValidationError { .. } => ErrorCategory::Config,
            FreightError::SessionError { .. } => ErrorCategory::Session,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // Rate fetching is retried and falls back to cache, so a network
            // failure on its own never loses operator work.
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Session => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            FreightError::ApiError(_) => {
                "Check network connectivity and the rates endpoint; cached quotes are used when available".to_string()
            }
            FreightError::IoError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            FreightError::SerializationError(_) => {
                "Check that the transfer item file is valid JSON".to_string()
            }
            FreightError::TomlError(_) => "Check the config file syntax".to_string(),
            FreightError::ConfigError { .. } | FreightError::InvalidConfigValueError { .. } => {
                "Review the configuration values and correct the reported field".to_string()
            }
            FreightError::ProcessingError { .. } => {
                "Review the transfer items for malformed lines".to_string()
            }
            FreightError::ValidationError { .. } => {
                "Correct the reported fields and retry".to_string()
            }
            FreightError::SessionError { .. } => {
                "Check the session state; completed transfers cannot be edited".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Carrier rates are unavailable: {}", self),
            ErrorCategory::Io => format!("File access failed: {}", self),
            ErrorCategory::Data => format!("Transfer data could not be processed: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::Session => format!("Packing session problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, FreightError>;
