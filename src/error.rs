use thiserror::Error;

use crate::event::envelope::RequestId;

/// Failures surfaced to callers of the messenger.
///
/// Only transport-level problems live here. A response carrying
/// `success: false` is a normal outcome and resolves as a
/// [`ResponseEnvelope`](crate::event::envelope::ResponseEnvelope).
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Request timed out: {action} ({timeout_ms}ms)")]
    Timeout { action: String, timeout_ms: u64 },

    #[error("Message send failed: {message}")]
    SendFailed { message: String },

    #[error("Request cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Request id already registered: {0}")]
    DuplicateRequestId(RequestId),

    #[error("Response channel closed")]
    ChannelClosed,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to decode response data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type MessengerResult<T> = Result<T, MessengerError>;

impl MessengerError {
    pub fn send_failed<S: Into<String>>(message: S) -> Self {
        MessengerError::SendFailed {
            message: message.into(),
        }
    }

    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        MessengerError::Cancelled {
            reason: reason.into(),
        }
    }

    /// True for failures of the exchange itself: timeout, send failure and cancellation.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            MessengerError::Timeout { .. }
                | MessengerError::SendFailed { .. }
                | MessengerError::Cancelled { .. }
        )
    }
}
