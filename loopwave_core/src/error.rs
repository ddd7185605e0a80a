use thiserror::Error;

/// Errors raised while validating parameters or building a loop.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// A parameter value cannot produce a valid loop.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A JSON configuration could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl GeneratorError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
