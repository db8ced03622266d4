use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the REST endpoints (`{"error": "..."}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
#[error("api request failed with status {status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
    #[error("failed to encode client op: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("payload does not match {expected}: {source}")]
    Payload {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
