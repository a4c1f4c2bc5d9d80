//! Driver states and the externally visible snapshot.

use crate::session::Session;
use bridge_traits::PlaybackState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverState {
    /// No chunk is playing; the queue may hold chunks.
    Idle,
    /// A chunk was loaded and play was requested; waiting for metadata.
    Starting,
    Playing,
    Paused,
    /// A seek target's chunk is not available locally yet.
    AwaitingSeekTarget,
    /// Every chunk has been played.
    Ended,
}

impl DriverState {
    /// States reported as "playing" to the UI. A pending seek counts because
    /// playback resumes as soon as the target chunk arrives.
    pub fn reports_playing(&self) -> bool {
        matches!(
            self,
            DriverState::Starting | DriverState::Playing | DriverState::AwaitingSeekTarget
        )
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Idle => "idle",
            DriverState::Starting => "starting",
            DriverState::Playing => "playing",
            DriverState::Paused => "paused",
            DriverState::AwaitingSeekTarget => "awaiting_seek_target",
            DriverState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Derives [`PlaybackState`] snapshots. Pure: same inputs, same snapshot.
pub struct StateReporter;

impl StateReporter {
    /// `position` is the chunk-local playback position of the current chunk.
    pub fn report(session: &Session, state: DriverState, position: f64) -> PlaybackState {
        let more_remaining = state != DriverState::Ended && session.has_more_after_current();
        let pending = session.pending_seek;

        let progress = match pending {
            Some(pending) => pending.target,
            None if session.current_chunk.is_some() => {
                session.elapsed_before + if position.is_finite() { position.max(0.0) } else { 0.0 }
            }
            None => session.elapsed_before,
        };

        PlaybackState {
            is_playing: state.reports_playing(),
            progress,
            duration: session.durations.total(),
            current_chunk_index: session.current_chunk,
            total_chunks: session.total_chunks,
            is_buffering: (session.queue.is_empty() && more_remaining) || pending.is_some(),
        }
    }
}
