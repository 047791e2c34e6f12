/// Errors crossing the foreign-function boundary.
///
/// Variants carry named fields so hosts can also raise them from callbacks.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SessionError {
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("invalid transit data: {reason}")]
    InvalidData { reason: String },

    #[error("lookup failed: {reason}")]
    Lookup { reason: String },

    #[error("runtime: {reason}")]
    Runtime { reason: String },

    #[error("session is closed")]
    Closed,

    #[error("callback failed: {reason}")]
    Callback { reason: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for SessionError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Callback {
            reason: error.reason,
        }
    }
}

impl From<shuttle_core::EngineError> for SessionError {
    fn from(error: shuttle_core::EngineError) -> Self {
        match error {
            shuttle_core::EngineError::Config(reason) => Self::Config { reason },
            other => Self::InvalidData {
                reason: other.to_string(),
            },
        }
    }
}
