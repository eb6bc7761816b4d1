use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitCheckError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Deployment descriptor is invalid: {}", issues.join("; "))]
    DescriptorError { issues: Vec<String> },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Invalid document id: {value}")]
    InvalidIdError { value: String },

    #[error("{message}")]
    NotFoundError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Data,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FitCheckError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FitCheckError::ConfigError { .. }
            | FitCheckError::InvalidConfigValueError { .. }
            | FitCheckError::DescriptorError { .. }
            | FitCheckError::YamlError(_) => ErrorCategory::Configuration,
            FitCheckError::ApiError(_) => ErrorCategory::Network,
            FitCheckError::IoError(_) | FitCheckError::DatabaseError { .. } => {
                ErrorCategory::Storage
            }
            FitCheckError::CsvError(_)
            | FitCheckError::SerializationError(_)
            | FitCheckError::ValidationError { .. } => ErrorCategory::Data,
            FitCheckError::InvalidIdError { .. } | FitCheckError::NotFoundError { .. } => {
                ErrorCategory::Input
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            FitCheckError::ApiError(_) => {
                "Check network connectivity and the GOOGLE_API_KEY / GOOGLE_CX values".to_string()
            }
            FitCheckError::CsvError(_) => {
                "Make sure the upload is a UTF-8 CSV file with a header row".to_string()
            }
            FitCheckError::IoError(_) => {
                "Check that the file exists and the process can read it".to_string()
            }
            FitCheckError::YamlError(_) => {
                "Check the descriptor's YAML syntax and indentation".to_string()
            }
            FitCheckError::DescriptorError { .. } => {
                "Declare every referenced service and volume, and give each host port one owner"
                    .to_string()
            }
            FitCheckError::ConfigError { .. } | FitCheckError::InvalidConfigValueError { .. } => {
                "Review the command line flags and the env file".to_string()
            }
            FitCheckError::DatabaseError { .. } => {
                "Check that MongoDB is running and MONGO_URI points at it".to_string()
            }
            FitCheckError::SerializationError(_) | FitCheckError::ValidationError { .. } => {
                "Fix the offending input and retry".to_string()
            }
            FitCheckError::InvalidIdError { .. } => {
                "Ids are 24 hexadecimal characters".to_string()
            }
            FitCheckError::NotFoundError { .. } => "Nothing to do".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach an upstream service: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            ErrorCategory::Data => format!("Bad data: {}", self),
            ErrorCategory::Input => self.to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        FitCheckError::NotFoundError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        FitCheckError::ValidationError {
            message: message.into(),
        }
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        FitCheckError::DatabaseError {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FitCheckError>;
