#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Type mismatch for value {value} in field {field}")]
    TypeMismatch { field: String, value: String },
    #[error("Invalid operand for field {field}: {reason}")]
    InvalidOperand { field: String, reason: String },
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Entity has no key assigned")]
    MissingKey,
    #[error("Database engine '{0}' not supported")]
    UnsupportedEngine(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Corrupted data: {0}")]
    Corrupted(String),
    #[error("TiKV error: {0}")]
    TikvError(#[from] tikv_client::Error),
}

impl Error {
    pub(crate) fn type_mismatch(field: &str, value: &impl std::fmt::Display) -> Self {
        Error::TypeMismatch {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}
