use thiserror::Error;

/// Failures reported by the media collaborators. Never fatal to a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("media capture failed: {0}")]
    Capture(String),

    #[error("connection to '{address}' failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("connection attempt timed out")]
    Timeout,

    #[error("no local media to send")]
    NoLocalMedia,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("signaling connection failed: {0}")]
    Signaling(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("session has already left the room")]
    Closed,

    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
