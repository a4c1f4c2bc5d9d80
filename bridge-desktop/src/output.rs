//! Headless audio output.
//!
//! Nothing is decoded. Each handle has a duration decided at load time and a
//! position that only moves when the host calls [`SimulatedAudioOutput::advance`].
//! Useful for CLI front-ends that only need progress bookkeeping and for
//! exercising the engine deterministically.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    AudioOutput, MediaEvent, MediaEventKind, MediaHandleId, MediaListener, MediaSource,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type DurationFn = Arc<dyn Fn(&MediaSource) -> f64 + Send + Sync>;

struct SimHandle {
    listener: MediaListener,
    duration: f64,
    position: f64,
    rate: f32,
    playing: bool,
    metadata_sent: bool,
    seeks: Vec<f64>,
    bytes: usize,
}

/// [`AudioOutput`] driven entirely by its owner.
pub struct SimulatedAudioOutput {
    handles: Mutex<HashMap<MediaHandleId, SimHandle>>,
    loads: Mutex<Vec<(MediaHandleId, usize)>>,
    next_id: AtomicU64,
    duration_of: DurationFn,
    auto_metadata: AtomicBool,
    reject_play: AtomicBool,
}

impl SimulatedAudioOutput {
    /// Every handle lasts `duration` seconds.
    pub fn new(duration: f64) -> Self {
        Self::with_duration_fn(move |_| duration)
    }

    /// Duration decided per source, e.g. from the payload size.
    pub fn with_duration_fn<F>(duration_of: F) -> Self
    where
        F: Fn(&MediaSource) -> f64 + Send + Sync + 'static,
    {
        Self {
            handles: Mutex::new(HashMap::new()),
            loads: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            duration_of: Arc::new(duration_of),
            auto_metadata: AtomicBool::new(true),
            reject_play: AtomicBool::new(false),
        }
    }

    /// When enabled (the default) `MetadataLoaded` is reported during `load`.
    pub fn set_auto_metadata(&self, enabled: bool) {
        self.auto_metadata.store(enabled, Ordering::SeqCst);
    }

    /// Make subsequent `play` calls fail, like a browser autoplay policy.
    pub fn set_reject_play(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    /// Most recently loaded handle that has not been released.
    pub fn active_handle(&self) -> Option<MediaHandleId> {
        let handles = self.handles.lock();
        handles.keys().max().copied()
    }

    /// Every load so far as `(handle, payload bytes)`, oldest first.
    pub fn loads(&self) -> Vec<(MediaHandleId, usize)> {
        self.loads.lock().clone()
    }

    pub fn is_live(&self, handle: MediaHandleId) -> bool {
        self.handles.lock().contains_key(&handle)
    }

    pub fn is_playing(&self, handle: MediaHandleId) -> bool {
        self.handles
            .lock()
            .get(&handle)
            .map(|h| h.playing)
            .unwrap_or(false)
    }

    pub fn playback_rate(&self, handle: MediaHandleId) -> Option<f32> {
        self.handles.lock().get(&handle).map(|h| h.rate)
    }

    /// Seek positions applied to `handle`, in call order.
    pub fn seeks(&self, handle: MediaHandleId) -> Vec<f64> {
        self.handles
            .lock()
            .get(&handle)
            .map(|h| h.seeks.clone())
            .unwrap_or_default()
    }

    /// Report metadata for `handle` (no-op if already reported).
    pub fn emit_metadata(&self, handle: MediaHandleId) {
        let pending = {
            let mut handles = self.handles.lock();
            match handles.get_mut(&handle) {
                Some(h) if !h.metadata_sent => {
                    h.metadata_sent = true;
                    Some((Arc::clone(&h.listener), h.duration))
                }
                _ => None,
            }
        };

        if let Some((listener, duration)) = pending {
            listener(MediaEvent::new(
                handle,
                MediaEventKind::MetadataLoaded { duration },
            ));
        }
    }

    /// Move a playing handle forward by `seconds` of wall time, scaled by its
    /// rate. Emits a time update, then `Ended` once the end is reached.
    pub fn advance(&self, handle: MediaHandleId, seconds: f64) {
        let pending = {
            let mut handles = self.handles.lock();
            match handles.get_mut(&handle) {
                Some(h) if h.playing => {
                    h.position = (h.position + seconds * f64::from(h.rate)).min(h.duration);
                    let ended = h.position >= h.duration;
                    if ended {
                        h.playing = false;
                    }
                    Some((Arc::clone(&h.listener), h.position, ended))
                }
                _ => None,
            }
        };

        if let Some((listener, position, ended)) = pending {
            listener(MediaEvent::new(handle, MediaEventKind::TimeUpdate { position }));
            if ended {
                listener(MediaEvent::new(handle, MediaEventKind::Ended));
            }
        }
    }

    /// Jump to the end of `handle` and report `Ended`.
    pub fn finish(&self, handle: MediaHandleId) {
        let listener = {
            let mut handles = self.handles.lock();
            handles.get_mut(&handle).map(|h| {
                h.position = h.duration;
                h.playing = false;
                Arc::clone(&h.listener)
            })
        };

        if let Some(listener) = listener {
            listener(MediaEvent::new(handle, MediaEventKind::Ended));
        }
    }

    /// Report a decode failure for `handle`.
    pub fn fail(&self, handle: MediaHandleId, message: impl Into<String>) {
        let listener = self
            .handles
            .lock()
            .get(&handle)
            .map(|h| Arc::clone(&h.listener));

        if let Some(listener) = listener {
            listener(MediaEvent::new(
                handle,
                MediaEventKind::Error {
                    message: message.into(),
                },
            ));
        }
    }

    fn with_handle<T>(
        &self,
        handle: MediaHandleId,
        f: impl FnOnce(&mut SimHandle) -> T,
    ) -> Result<T> {
        let mut handles = self.handles.lock();
        handles
            .get_mut(&handle)
            .map(f)
            .ok_or(BridgeError::UnknownHandle(handle.value()))
    }
}

impl fmt::Debug for SimulatedAudioOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedAudioOutput")
            .field("live_handles", &self.handles.lock().len())
            .field("loads", &self.loads.lock().len())
            .finish()
    }
}

#[async_trait]
impl AudioOutput for SimulatedAudioOutput {
    fn load(&self, source: MediaSource, listener: MediaListener) -> Result<MediaHandleId> {
        let handle = MediaHandleId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let duration = (self.duration_of)(&source).max(0.0);
        let bytes = source.data.len();

        self.handles.lock().insert(
            handle,
            SimHandle {
                listener,
                duration,
                position: 0.0,
                rate: source.playback_rate,
                playing: false,
                metadata_sent: false,
                seeks: Vec::new(),
                bytes,
            },
        );
        self.loads.lock().push((handle, bytes));
        debug!(%handle, bytes, duration, "Simulated load");

        if self.auto_metadata.load(Ordering::SeqCst) {
            self.emit_metadata(handle);
        }

        Ok(handle)
    }

    async fn play(&self, handle: MediaHandleId) -> Result<()> {
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(BridgeError::PlaybackRejected(
                "play() requires a user gesture".to_string(),
            ));
        }
        self.with_handle(handle, |h| h.playing = true)
    }

    fn pause(&self, handle: MediaHandleId) -> Result<()> {
        self.with_handle(handle, |h| h.playing = false)
    }

    fn seek(&self, handle: MediaHandleId, position: f64) -> Result<()> {
        self.with_handle(handle, |h| {
            h.position = position.clamp(0.0, h.duration);
            h.seeks.push(position);
        })
    }

    fn set_playback_rate(&self, handle: MediaHandleId, rate: f32) -> Result<()> {
        self.with_handle(handle, |h| h.rate = rate)
    }

    fn position(&self, handle: MediaHandleId) -> Option<f64> {
        self.handles.lock().get(&handle).map(|h| h.position)
    }

    fn duration(&self, handle: MediaHandleId) -> Option<f64> {
        self.handles
            .lock()
            .get(&handle)
            .filter(|h| h.metadata_sent)
            .map(|h| h.duration)
    }

    fn release(&self, handle: MediaHandleId) {
        if let Some(h) = self.handles.lock().remove(&handle) {
            debug!(%handle, bytes = h.bytes, "Simulated release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn recording_listener() -> (MediaListener, Arc<Mutex<Vec<MediaEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: MediaListener = Arc::new(move |event| sink.lock().push(event));
        (listener, events)
    }

    fn source() -> MediaSource {
        MediaSource::new(Bytes::from_static(b"audio"), "audio/mpeg", 1.0)
    }

    #[tokio::test]
    async fn test_load_reports_metadata() {
        let output = SimulatedAudioOutput::new(10.0);
        let (listener, events) = recording_listener();

        let handle = output.load(source(), listener).unwrap();

        assert_eq!(output.duration(handle), Some(10.0));
        assert_eq!(
            events.lock().as_slice(),
            &[MediaEvent::new(
                handle,
                MediaEventKind::MetadataLoaded { duration: 10.0 }
            )]
        );
    }

    #[tokio::test]
    async fn test_advance_until_ended() {
        let output = SimulatedAudioOutput::new(4.0);
        let (listener, events) = recording_listener();
        let handle = output.load(source(), listener).unwrap();
        output.play(handle).await.unwrap();
        output.set_playback_rate(handle, 2.0).unwrap();

        output.advance(handle, 1.0);
        assert_eq!(output.position(handle), Some(2.0));

        output.advance(handle, 5.0);
        let events = events.lock();
        assert_eq!(events.last().map(|e| &e.kind), Some(&MediaEventKind::Ended));
        assert!(!output.is_playing(handle));
    }

    #[tokio::test]
    async fn test_rejected_play() {
        let output = SimulatedAudioOutput::new(4.0);
        output.set_reject_play(true);
        let (listener, _) = recording_listener();
        let handle = output.load(source(), listener).unwrap();

        let err = output.play(handle).await.unwrap_err();
        assert!(matches!(err, BridgeError::PlaybackRejected(_)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let output = SimulatedAudioOutput::new(4.0);
        let (listener, _) = recording_listener();
        let handle = output.load(source(), listener).unwrap();

        output.release(handle);
        output.release(handle);
        assert!(!output.is_live(handle));
        assert!(matches!(
            output.pause(handle),
            Err(BridgeError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_manual_metadata() {
        let output = SimulatedAudioOutput::new(4.0);
        output.set_auto_metadata(false);
        let (listener, events) = recording_listener();
        let handle = output.load(source(), listener).unwrap();

        assert_eq!(output.duration(handle), None);
        output.emit_metadata(handle);
        output.emit_metadata(handle);
        assert_eq!(events.lock().len(), 1);
    }
}
