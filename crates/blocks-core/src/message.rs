use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message dispatched by a queue to its subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message type used for routing.
    pub message_type: String,
    /// Caller supplied payload.
    pub payload: Value,
}

impl Message {
    /// Create a new message.
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }
}

/// Response returned by a service for a handled request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// HTTP-like status code.
    pub status: u16,
    /// Handler result (if successful).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message (if the handler failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceResponse {
    pub const OK: u16 = 200;
    pub const INTERNAL_ERROR: u16 = 500;

    /// Create a successful response.
    pub fn ok(data: Value) -> Self {
        Self {
            status: Self::OK,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Self::INTERNAL_ERROR,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Whether the handler succeeded.
    pub fn is_success(&self) -> bool {
        self.status == Self::OK
    }
}
