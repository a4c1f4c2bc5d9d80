//! # Playback Error Types
//!
//! Error taxonomy for the chunked playback engine.

use bridge_traits::{error::BridgeError, SessionGeneration};
use thiserror::Error;

/// Errors that can occur during playback operations.
///
/// None of these stop the engine: a failed command reports its error to the
/// caller and the operation loop carries on with the next one.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The platform refused to start playback (autoplay policy, decode error).
    /// The engine stays paused on the loaded chunk.
    #[error("Playback rejected for chunk {chunk_index}: {message}")]
    PlayRejected { chunk_index: usize, message: String },

    /// The platform could not accept the chunk bytes.
    #[error("Failed to load chunk {chunk_index}: {message}")]
    LoadFailed { chunk_index: usize, message: String },

    /// Speed outside the configured range, or not a finite number.
    #[error("Invalid playback speed: {speed} (must be between {min} and {max})")]
    InvalidSpeed { speed: f32, min: f32, max: f32 },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// A delivery or event belongs to a superseded session.
    #[error("Stale session {received} (current {current})")]
    StaleSession {
        received: SessionGeneration,
        current: SessionGeneration,
    },

    /// The engine task is gone; no more commands can be processed.
    #[error("Playback engine closed")]
    EngineClosed,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if repeating the command later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::PlayRejected { .. }
                | PlaybackError::Bridge(BridgeError::Disconnected(_))
                | PlaybackError::Bridge(BridgeError::PlaybackRejected(_))
        )
    }

    /// Returns `true` if the platform refused to start playback.
    pub fn is_playback_rejection(&self) -> bool {
        matches!(
            self,
            PlaybackError::PlayRejected { .. }
                | PlaybackError::Bridge(BridgeError::PlaybackRejected(_))
        )
    }

    /// Returns `true` if the error only means "this input was for an older
    /// session" and can be ignored.
    pub fn is_stale(&self) -> bool {
        matches!(self, PlaybackError::StaleSession { .. })
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let rejected = PlaybackError::PlayRejected {
            chunk_index: 0,
            message: "gesture required".into(),
        };
        assert!(rejected.is_transient());
        assert!(rejected.is_playback_rejection());
        assert!(!rejected.is_stale());

        let stale = PlaybackError::StaleSession {
            received: SessionGeneration::new(1),
            current: SessionGeneration::new(2),
        };
        assert!(stale.is_stale());
        assert!(!stale.is_transient());

        let bridge: PlaybackError = BridgeError::PlaybackRejected("policy".into()).into();
        assert!(bridge.is_playback_rejection());

        assert!(!PlaybackError::EngineClosed.is_transient());
    }

    #[test]
    fn test_display() {
        let err = PlaybackError::InvalidSpeed {
            speed: 8.0,
            min: 0.25,
            max: 4.0,
        };
        assert_eq!(
            err.to_string(),
            "Invalid playback speed: 8 (must be between 0.25 and 4)"
        );
        assert_eq!(
            PlaybackError::StaleSession {
                received: SessionGeneration::new(1),
                current: SessionGeneration::new(3),
            }
            .to_string(),
            "Stale session gen-1 (current gen-3)"
        );
    }
}
