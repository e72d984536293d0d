use thiserror::Error;

/// Core error type for building block operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlocksError {
    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error("No subscriber for message type: {0}")]
    NoSubscriber(String),

    #[error("Handler failed: {0}")]
    HandlerFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BlocksError {
    /// Whether the error was raised by caller input before any work began.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::UnknownJobType(_) | Self::NoSubscriber(_)
        )
    }
}

impl From<serde_json::Error> for BlocksError {
    fn from(e: serde_json::Error) -> Self {
        BlocksError::Serialization(e.to_string())
    }
}

/// Result type alias using BlocksError.
pub type Result<T> = std::result::Result<T, BlocksError>;
