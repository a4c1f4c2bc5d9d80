//! State egress bridge.

use crate::{error::Result, platform::PlatformSendSync, playback::PlaybackState};

/// One-way channel that carries [`PlaybackState`] snapshots to whoever renders
/// them (popup, floating player, content script).
///
/// Delivery is best-effort and at-most-once; ordering relative to other
/// channels is not guaranteed. Returning `Err` (for example when nobody is
/// listening) is not a failure of the engine.
pub trait StateTransport: PlatformSendSync {
    fn publish(&self, state: &PlaybackState) -> Result<()>;
}

/// Transport that discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl StateTransport for NullTransport {
    fn publish(&self, _state: &PlaybackState) -> Result<()> {
        Ok(())
    }
}
