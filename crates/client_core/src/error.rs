use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no bearer credential available")]
    MissingCredential,
    #[error("invalid api base url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceSessionError {
    #[error("failed to request voice token: {0}")]
    TokenRequest(String),
    #[error("failed to connect livekit room: {0}")]
    Connect(String),
    #[error("failed to enable microphone: {0}")]
    Microphone(String),
    #[error("voice join was superseded by a newer join or leave")]
    Superseded,
}
