/// Why a draft could not become a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("Invalid payload: {0}")]
    Malformed(String),

    /// Upstream-side uniqueness violation (e.g. a duplicate email).
    #[error("{0}")]
    Conflict(String),
}

impl ValidationError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            message: message.into(),
        }
    }
}
