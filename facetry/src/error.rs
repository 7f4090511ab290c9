use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("The field has not been found: {0}")]
    FieldNotFound(String),

    #[error("The field \"{field}\" does not support {capability}")]
    UnsupportedFieldUsage { field: String, capability: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid value for field \"{field}\": {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Facet aggregation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
}

impl Error {
    /// Errors caused by the caller's input. These are reported back as-is
    /// and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::FieldNotFound(_)
                | Error::UnsupportedFieldUsage { .. }
                | Error::InvalidValue { .. }
                | Error::InvalidQuery(_)
        )
    }

    pub(crate) fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
