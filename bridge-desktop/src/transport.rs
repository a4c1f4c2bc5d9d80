//! Watch-channel state transport.

use bridge_traits::{error::Result, PlaybackState, StateTransport};
use tokio::sync::watch;

/// [`StateTransport`] backed by `tokio::sync::watch`.
///
/// Subscribers only ever see the latest snapshot, which matches the
/// self-contained nature of [`PlaybackState`]. Publishing succeeds even when
/// nobody is subscribed.
#[derive(Debug)]
pub struct WatchStateTransport {
    sender: watch::Sender<PlaybackState>,
}

impl WatchStateTransport {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(PlaybackState::stopped());
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.sender.subscribe()
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> PlaybackState {
        self.sender.borrow().clone()
    }
}

impl Default for WatchStateTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTransport for WatchStateTransport {
    fn publish(&self, state: &PlaybackState) -> Result<()> {
        self.sender.send_replace(state.clone());
        Ok(())
    }
}
