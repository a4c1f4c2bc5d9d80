use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The platform refused to start playback (autoplay policy, decode failure).
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// The receiving side of a one-way channel is gone.
    #[error("Channel disconnected: {0}")]
    Disconnected(String),

    #[error("Unknown media handle: {0}")]
    UnknownHandle(u64),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
