//! # Playback Driver
//!
//! State machine that owns the single active decode/play handle.
//!
//! ## States
//!
//! ```text
//!            init / stop
//!   ┌──────────────────────────────────────────────┐
//!   ▼                                              │
//! Idle ──chunks available──> Starting ──metadata──> Playing ──ended──> Idle | Ended
//!   ▲                           │                    │  ▲
//!   │                           └──play rejected──>  Paused
//!   │
//!   └──target delivered── AwaitingSeekTarget <──seek (uncached)── any
//! ```
//!
//! Every transition publishes a fresh [`PlaybackState`] through the
//! [`StateTransport`]. Publishing is best-effort and never fails an operation.
//!
//! The driver is not thread-safe by itself; [`PlaybackEngine`] serializes all
//! access through its operation queue.
//!
//! [`PlaybackEngine`]: crate::engine::PlaybackEngine

use crate::cache::CacheStats;
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::prefetch::{PrefetchController, PrefetchPlan};
use crate::seek::{clamp_target, SeekResolver};
use crate::session::{PendingSeek, Session};
use crate::state::{DriverState, StateReporter};
use bridge_traits::{
    AudioOutput, Chunk, ChunkDelivery, ChunkProducer, ChunkRequest, MediaEvent, MediaEventKind,
    MediaHandleId, MediaListener, MediaSource, PlaybackState, SessionGeneration, StateTransport,
};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

/// Host collaborators the engine drives.
#[derive(Clone)]
pub struct EngineBridges {
    pub output: Arc<dyn AudioOutput>,
    pub producer: Arc<dyn ChunkProducer>,
    pub transport: Arc<dyn StateTransport>,
}

impl fmt::Debug for EngineBridges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBridges").finish_non_exhaustive()
    }
}

/// The handle currently loaded in the audio output.
#[derive(Debug, Clone, Copy)]
struct ActiveChunk {
    handle: MediaHandleId,
    index: usize,
    metadata_loaded: bool,
    progress_prefetched: bool,
}

impl ActiveChunk {
    fn new(handle: MediaHandleId, index: usize) -> Self {
        Self {
            handle,
            index,
            metadata_loaded: false,
            progress_prefetched: false,
        }
    }
}

pub struct PlaybackDriver {
    config: PlaybackConfig,
    output: Arc<dyn AudioOutput>,
    producer: Arc<dyn ChunkProducer>,
    transport: Arc<dyn StateTransport>,
    listener: MediaListener,
    prefetch: PrefetchController,
    event_bus: Option<EventBus>,
    session: Session,
    state: DriverState,
    active: Option<ActiveChunk>,
}

impl PlaybackDriver {
    /// `listener` is handed to the audio output with every load; it must route
    /// events back into [`handle_media_event`](Self::handle_media_event).
    pub fn new(config: PlaybackConfig, bridges: EngineBridges, listener: MediaListener) -> Self {
        let prefetch = PrefetchController::new(&config);
        let session = Session::empty(SessionGeneration::default(), config.default_speed);

        Self {
            config,
            output: bridges.output,
            producer: bridges.producer,
            transport: bridges.transport,
            listener,
            prefetch,
            event_bus: None,
            session,
            state: DriverState::Idle,
            active: None,
        }
    }

    pub fn set_event_bus(&mut self, bus: EventBus) {
        self.event_bus = Some(bus);
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn generation(&self) -> SessionGeneration {
        self.session.generation
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.session.cache.stats()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> PlaybackState {
        let position = self
            .active
            .and_then(|active| self.output.position(active.handle))
            .unwrap_or(self.session.chunk_position);
        StateReporter::report(&self.session, self.state, position)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start a new session, discarding the previous one.
    #[instrument(skip(self))]
    pub fn init(
        &mut self,
        total_chunks: usize,
        estimated_duration: f64,
        speed: f32,
    ) -> Result<SessionGeneration> {
        let generation = self.begin_session(total_chunks, estimated_duration, speed)?;
        self.maybe_prefetch();
        Ok(generation)
    }

    /// Accept a delivery. Returns the number of chunks taken.
    ///
    /// Deliveries tagged with another generation are rejected with
    /// [`PlaybackError::StaleSession`]; indices outside the session are
    /// ignored.
    #[instrument(skip(self, delivery), fields(chunks = delivery.chunks.len()))]
    pub async fn add_chunks(&mut self, delivery: ChunkDelivery) -> Result<usize> {
        if let Some(received) = delivery.generation {
            if received != self.session.generation {
                return Err(PlaybackError::StaleSession {
                    received,
                    current: self.session.generation,
                });
            }
        }

        let mut chunks = delivery.chunks;
        chunks.sort_by_key(|chunk| chunk.index);

        let mut accepted = 0;
        for chunk in chunks {
            if !self.session.accepts(chunk.index) {
                debug!(
                    chunk_index = chunk.index,
                    total_chunks = self.session.total_chunks,
                    "Ignoring chunk outside session"
                );
                continue;
            }
            self.session.cache.insert(chunk.index, chunk.data.clone());
            if self.is_ahead_of_playback(chunk.index) {
                self.session.queue.enqueue(chunk);
            } else {
                trace!(chunk_index = chunk.index, "Chunk cached but not queued");
            }
            accepted += 1;
        }

        if accepted == 0 {
            return Ok(0);
        }

        debug!(
            accepted,
            queue = ?self.session.queue.indices(),
            cached = self.session.cache.len(),
            "Chunks added"
        );

        let outcome = match self.state {
            DriverState::Idle if self.active.is_none() => self.advance().await,
            DriverState::AwaitingSeekTarget => self.advance_to_seek_target().await,
            _ => Ok(()),
        };

        self.maybe_prefetch();
        self.publish();
        outcome.map(|()| accepted)
    }

    /// Start or continue playback. After the narration ended this replays it
    /// from the beginning.
    pub async fn play(&mut self) -> Result<()> {
        if self.state == DriverState::Ended {
            info!("Replaying narration from the start");
            return self.seek(0.0).await;
        }
        self.resume().await
    }

    #[instrument(skip(self))]
    pub fn pause(&mut self) -> Result<()> {
        let active = match (self.state, self.active) {
            (DriverState::Playing | DriverState::Starting, Some(active)) => active,
            (state, _) => {
                debug!(%state, "Pause ignored");
                return Ok(());
            }
        };

        self.output.pause(active.handle)?;
        self.state = DriverState::Paused;
        let progress = self.snapshot().progress;
        self.emit(PlaybackEvent::Paused {
            generation: self.session.generation,
            progress,
        });
        self.publish();
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn resume(&mut self) -> Result<()> {
        match (self.state, self.active) {
            (DriverState::Paused, Some(active)) => {
                self.state = if active.metadata_loaded {
                    DriverState::Playing
                } else {
                    DriverState::Starting
                };
                let outcome = self.start_output().await;
                if outcome.is_ok() {
                    let progress = self.snapshot().progress;
                    self.emit(PlaybackEvent::Resumed {
                        generation: self.session.generation,
                        progress,
                    });
                }
                self.publish();
                outcome
            }
            (DriverState::Idle | DriverState::Paused, None) if !self.session.queue.is_empty() => {
                let outcome = self.advance().await;
                self.maybe_prefetch();
                self.publish();
                outcome
            }
            (state, _) => {
                debug!(%state, "Resume ignored");
                Ok(())
            }
        }
    }

    /// Tear everything down. Always succeeds.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        self.teardown_active();
        let stopped = self.session.generation;
        self.session = Session::empty(stopped.next(), self.session.speed);
        self.state = DriverState::Idle;

        info!(generation = %stopped, "Playback stopped");
        self.emit(PlaybackEvent::Stopped {
            generation: stopped,
        });
        self.publish();
    }

    /// Jump to `target` seconds of global narration time.
    #[instrument(skip(self))]
    pub async fn seek(&mut self, target: f64) -> Result<()> {
        if self.session.total_chunks == 0 {
            debug!("Seek ignored without a session");
            return Ok(());
        }

        let target = clamp_target(target, self.session.durations.total());
        let Some(resolved) = SeekResolver::new(&self.session.durations).resolve(target) else {
            return Ok(());
        };
        let index = resolved.chunk_index;

        // Same chunk: move within the loaded handle, queue untouched
        if let Some(active) = self.active.filter(|active| active.index == index) {
            self.emit_seek_requested(target, index, resolved.offset, true);

            match self.session.pending_seek.as_mut() {
                Some(pending) if pending.chunk_index == index => {
                    // Applied once metadata arrives
                    pending.target = target;
                }
                _ => {
                    let offset = match self.output.duration(active.handle) {
                        Some(duration) if duration.is_finite() => {
                            resolved.offset.clamp(0.0, duration.max(0.0))
                        }
                        _ => resolved.offset.max(0.0),
                    };
                    self.output.seek(active.handle, offset)?;
                    self.session.chunk_position = offset;
                    debug!(chunk_index = index, offset, "Seeked within current chunk");
                }
            }
            self.publish();
            return Ok(());
        }

        self.session.queue.clear();
        self.session.pending_seek = Some(PendingSeek {
            target,
            chunk_index: index,
        });

        if let Some(data) = self.session.cache.get(index) {
            info!(target, chunk_index = index, "Seeking into cached chunk");
            self.emit_seek_requested(target, index, resolved.offset, true);
            let outcome = self.start_chunk(index, data).await;
            self.maybe_prefetch();
            self.publish();
            return outcome;
        }

        info!(target, chunk_index = index, "Seek target not cached, requesting it");
        self.emit_seek_requested(target, index, resolved.offset, false);
        self.teardown_active();
        self.state = DriverState::AwaitingSeekTarget;
        self.send_request(ChunkRequest::seek(self.session.generation, index, target));
        self.publish();
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        let speed = self.config.check_speed(speed)?;
        self.session.speed = speed;

        if let Some(active) = self.active {
            self.output.set_playback_rate(active.handle, speed)?;
        }

        debug!(speed, "Playback speed changed");
        self.emit(PlaybackEvent::SpeedChanged {
            generation: self.session.generation,
            speed,
        });
        Ok(())
    }

    /// Play one complete audio blob as a single-chunk session. The duration
    /// is taken from the decoded metadata.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn play_single(&mut self, data: Bytes, speed: f32) -> Result<SessionGeneration> {
        let generation = self.begin_session(1, 0.0, speed)?;
        self.add_chunks(ChunkDelivery::tagged(generation, vec![Chunk::new(0, data)]))
            .await?;
        Ok(generation)
    }

    /// Release the active handle before the engine goes away.
    pub fn shutdown(&mut self) {
        self.teardown_active();
    }

    // ========================================================================
    // Media events
    // ========================================================================

    /// Apply a notification from the audio output. Events for any handle
    /// other than the active one are dropped.
    pub async fn handle_media_event(&mut self, event: MediaEvent) -> Result<()> {
        match self.active {
            Some(active) if active.handle == event.handle => {}
            _ => {
                trace!(handle = %event.handle, "Dropping event for inactive handle");
                return Ok(());
            }
        }

        match event.kind {
            MediaEventKind::MetadataLoaded { duration } => {
                self.on_metadata(duration);
                Ok(())
            }
            MediaEventKind::TimeUpdate { position } => {
                self.on_time_update(position);
                Ok(())
            }
            MediaEventKind::Ended => self.on_ended(true).await,
            MediaEventKind::Error { message } => {
                let index = self.active.map(|active| active.index);
                warn!(chunk_index = ?index, %message, "Chunk failed to play, skipping it");
                self.emit(PlaybackEvent::Error {
                    generation: Some(self.session.generation),
                    chunk_index: index,
                    message,
                    recoverable: true,
                });
                self.on_ended(false).await
            }
        }
    }

    fn on_metadata(&mut self, duration: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.metadata_loaded = true;
        let (handle, index) = (active.handle, active.index);

        if self.session.durations.record(index, duration) {
            debug!(chunk_index = index, duration, "Measured chunk duration");
        }

        if let Some(pending) = self
            .session
            .pending_seek
            .filter(|pending| pending.chunk_index == index)
        {
            let limit = if duration.is_finite() { duration.max(0.0) } else { f64::MAX };
            let offset = (pending.target - self.session.elapsed_before).clamp(0.0, limit);
            if let Err(err) = self.output.seek(handle, offset) {
                warn!(chunk_index = index, error = %err, "Failed to apply pending seek");
            }
            self.session.pending_seek = None;
            self.session.chunk_position = offset;
            debug!(chunk_index = index, offset, "Applied pending seek");
            self.emit(PlaybackEvent::SeekApplied {
                generation: self.session.generation,
                chunk_index: index,
                offset,
            });
        }

        if self.state == DriverState::Starting {
            self.state = DriverState::Playing;
        }
        self.publish();
    }

    fn on_time_update(&mut self, position: f64) {
        if position.is_finite() {
            self.session.chunk_position = position.max(0.0);
        }

        self.maybe_prefetch();
        self.maybe_prefetch_on_progress(position);
        self.publish();
    }

    /// The active chunk finished (or failed). Moves on to the next chunk or
    /// ends the narration.
    async fn on_ended(&mut self, record_duration: bool) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let index = active.index;

        if record_duration && self.session.durations.measured(index).is_none() {
            if let Some(duration) = self.output.duration(active.handle) {
                self.session.durations.record(index, duration);
            }
        }
        self.output.release(active.handle);

        let duration = self.session.durations.duration_of(index);
        self.session.chunk_position = duration;
        if record_duration {
            debug!(chunk_index = index, duration, "Chunk ended");
            self.emit(PlaybackEvent::ChunkCompleted {
                generation: self.session.generation,
                chunk_index: index,
                duration,
            });
        }

        if !self.session.queue.is_empty() || index + 1 < self.session.total_chunks {
            self.state = DriverState::Idle;
            let outcome = self.advance().await;
            self.maybe_prefetch();
            self.publish();
            return outcome;
        }

        info!(generation = %self.session.generation, "Narration complete");
        self.state = DriverState::Ended;
        self.session.current_chunk = None;
        self.session.elapsed_before = 0.0;
        self.session.chunk_position = 0.0;
        self.emit(PlaybackEvent::Completed {
            generation: self.session.generation,
        });
        self.publish();
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn begin_session(
        &mut self,
        total_chunks: usize,
        estimated_duration: f64,
        speed: f32,
    ) -> Result<SessionGeneration> {
        let speed = self.config.check_speed(speed)?;

        self.teardown_active();
        let generation = self.session.generation.next();
        self.session = Session::new(generation, total_chunks, estimated_duration, speed);
        self.state = DriverState::Idle;

        info!(
            %generation,
            total_chunks,
            estimated_duration,
            speed,
            "Playback session initialized"
        );
        self.emit(PlaybackEvent::SessionStarted {
            generation,
            total_chunks,
            estimated_duration: self.session.durations.total(),
        });
        self.publish();
        Ok(generation)
    }

    /// Start the chunk after the cursor from the cache when the queue does not
    /// continue from it, otherwise the lowest queued chunk, or wait for one.
    async fn advance(&mut self) -> Result<()> {
        if let Some(next) = self.cached_successor() {
            if let Some(data) = self.session.cache.get(next) {
                debug!(chunk_index = next, "Continuing from cache");
                return self.start_chunk(next, data).await;
            }
        }

        match self.session.queue.dequeue_next() {
            Some(chunk) => self.start_chunk(chunk.index, chunk.data).await,
            None => {
                self.state = DriverState::Idle;
                let next_index = self
                    .session
                    .current_chunk
                    .map_or(0, |index| index + 1);
                debug!(next_index, "Queue empty, waiting for more chunks");
                self.emit(PlaybackEvent::Buffering {
                    generation: self.session.generation,
                    next_index: (next_index < self.session.total_chunks).then_some(next_index),
                });
                Ok(())
            }
        }
    }

    /// While awaiting a seek target, start it as soon as it is queued. Lower
    /// indices from earlier read-ahead are discarded.
    async fn advance_to_seek_target(&mut self) -> Result<()> {
        let Some(pending) = self.session.pending_seek else {
            return self.advance().await;
        };

        let discarded = self.session.queue.discard_below(pending.chunk_index);
        if discarded > 0 {
            trace!(discarded, "Dropped queued chunks before seek target");
        }

        match self.session.queue.peek() {
            Some(chunk) if chunk.index == pending.chunk_index => self.advance().await,
            _ => Ok(()),
        }
    }

    /// The index right after the cursor, when it is cached but not at the
    /// front of the queue. Happens after seeking back into played material.
    fn cached_successor(&self) -> Option<usize> {
        if self.session.pending_seek.is_some() {
            return None;
        }
        let next = self.session.current_chunk? + 1;
        if next >= self.session.total_chunks || !self.session.cache.contains(next) {
            return None;
        }
        match self.session.queue.peek() {
            Some(chunk) if chunk.index == next => None,
            _ => Some(next),
        }
    }

    /// Whether a delivered chunk still has to be played. Re-deliveries of
    /// queued or already played indices only refresh the cache.
    fn is_ahead_of_playback(&self, index: usize) -> bool {
        if self.session.queue.contains(index) {
            return false;
        }
        if self.state == DriverState::AwaitingSeekTarget {
            return self
                .session
                .pending_seek
                .map_or(true, |pending| index >= pending.chunk_index);
        }
        match self.session.current_chunk {
            Some(current) => index > current,
            None => true,
        }
    }

    /// Load `data` as chunk `index` and begin playback.
    async fn start_chunk(&mut self, index: usize, data: Bytes) -> Result<()> {
        self.teardown_active();

        if !self.session.cache.contains(index) {
            self.session.cache.insert(index, data.clone());
        }
        self.session.current_chunk = Some(index);
        self.session.elapsed_before = self.session.durations.elapsed_before(index);
        self.session.chunk_position = 0.0;

        let source = MediaSource::new(data, self.config.mime_type.clone(), self.session.speed);
        let handle = match self.output.load(source, Arc::clone(&self.listener)) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(chunk_index = index, error = %err, "Failed to load chunk");
                self.state = DriverState::Idle;
                self.emit(PlaybackEvent::Error {
                    generation: Some(self.session.generation),
                    chunk_index: Some(index),
                    message: err.to_string(),
                    recoverable: true,
                });
                return Err(PlaybackError::LoadFailed {
                    chunk_index: index,
                    message: err.to_string(),
                });
            }
        };

        self.active = Some(ActiveChunk::new(handle, index));
        self.state = DriverState::Starting;

        debug!(
            chunk_index = index,
            total_chunks = self.session.total_chunks,
            elapsed_before = self.session.elapsed_before,
            %handle,
            "Starting chunk"
        );
        self.emit(PlaybackEvent::ChunkStarted {
            generation: self.session.generation,
            chunk_index: index,
            elapsed_before: self.session.elapsed_before,
        });

        self.start_output().await
    }

    /// Ask the output to play the active handle. A rejection leaves the
    /// handle loaded and the driver paused.
    async fn start_output(&mut self) -> Result<()> {
        let Some(active) = self.active else {
            return Ok(());
        };

        match self.output.play(active.handle).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(chunk_index = active.index, error = %err, "Playback rejected");
                self.state = DriverState::Paused;
                self.emit(PlaybackEvent::Error {
                    generation: Some(self.session.generation),
                    chunk_index: Some(active.index),
                    message: err.to_string(),
                    recoverable: true,
                });
                Err(PlaybackError::PlayRejected {
                    chunk_index: active.index,
                    message: err.to_string(),
                })
            }
        }
    }

    fn teardown_active(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(err) = self.output.pause(active.handle) {
                trace!(handle = %active.handle, error = %err, "Pause before release failed");
            }
            self.output.release(active.handle);
        }
    }

    fn prefetch_allowed(&self) -> bool {
        self.session.total_chunks > 0
            && !matches!(
                self.state,
                DriverState::AwaitingSeekTarget | DriverState::Ended
            )
    }

    fn maybe_prefetch(&mut self) {
        if !self.prefetch_allowed() {
            return;
        }

        let plan = self.prefetch.plan(
            self.session.current_chunk,
            self.session.queue.len(),
            self.session.total_chunks,
        );
        if let Some(plan) = plan {
            self.request_window(plan);
        }
    }

    /// At most once per chunk, regardless of queue depth.
    fn maybe_prefetch_on_progress(&mut self, position: f64) {
        if !self.prefetch_allowed() {
            return;
        }
        let Some(active) = self.active.filter(|active| !active.progress_prefetched) else {
            return;
        };

        let duration = self.session.durations.duration_of(active.index);
        let plan = self.prefetch.plan_on_progress(
            Some(active.index),
            self.session.queue.len(),
            self.session.total_chunks,
            position,
            duration,
        );

        if let Some(plan) = plan {
            if let Some(active) = self.active.as_mut() {
                active.progress_prefetched = true;
            }
            trace!(chunk_index = active.index, position, duration, "Progress read-ahead");
            self.request_window(plan);
        }
    }

    fn request_window(&mut self, plan: PrefetchPlan) {
        self.send_request(ChunkRequest::prefetch(
            self.session.generation,
            plan.start_index,
            plan.count,
        ));
    }

    fn send_request(&mut self, request: ChunkRequest) {
        debug!(
            generation = %request.generation,
            start_index = request.start_index,
            count = request.count,
            seek = request.is_seek(),
            "Requesting chunks"
        );
        self.emit(PlaybackEvent::ChunksRequested {
            generation: request.generation,
            start_index: request.start_index,
            count: request.count,
            seek: request.is_seek(),
        });

        if let Err(err) = self.producer.request_chunks(request) {
            warn!(error = %err, "Chunk request could not be handed to the producer");
        }
    }

    fn publish(&self) {
        let state = self.snapshot();
        if let Err(err) = self.transport.publish(&state) {
            trace!(error = %err, "State publish dropped");
        }
    }

    fn emit_seek_requested(&self, target: f64, chunk_index: usize, offset: f64, cached: bool) {
        self.emit(PlaybackEvent::SeekRequested {
            generation: self.session.generation,
            target,
            chunk_index,
            offset,
            cached,
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

impl fmt::Debug for PlaybackDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackDriver")
            .field("state", &self.state)
            .field("generation", &self.session.generation)
            .field("current_chunk", &self.session.current_chunk)
            .field("queue", &self.session.queue.len())
            .field("cached", &self.session.cache.len())
            .finish()
    }
}
