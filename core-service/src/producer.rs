//! Reference chunk producer backed by a [`Synthesizer`].
//!
//! Serves [`ChunkRequest`]s by synthesizing each requested index, keeping an
//! index to bytes cache so indices asked for twice are only synthesized once.
//! While an ordinary read-ahead batch is being generated, further ordinary
//! requests are skipped; seek requests are always served.

use crate::error::{CoreError, Result};
use bridge_traits::{
    error::Result as BridgeResult, platform::PlatformSendSync, Chunk, ChunkDelivery, ChunkRequest,
    SessionGeneration,
};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, ProducerEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Turns one chunk index of the current narration into encoded audio.
///
/// The host owns the text and its segmentation; the producer only asks for
/// indices.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait Synthesizer: PlatformSendSync {
    async fn synthesize(&self, chunk_index: usize) -> BridgeResult<Bytes>;
}

#[derive(Debug, Default)]
struct ProducerState {
    generation: SessionGeneration,
    total_chunks: usize,
    /// Length announced for the next session, adopted on its first request.
    next_total: usize,
    cache: HashMap<usize, Bytes>,
    in_flight: bool,
}

impl ProducerState {
    fn adopt(&mut self, generation: SessionGeneration, total_chunks: usize) {
        self.generation = generation;
        self.total_chunks = total_chunks;
        self.cache.clear();
        self.in_flight = false;
    }
}

/// Outcome of admitting a request.
enum Admission {
    Serve(Range<usize>),
    Skip(&'static str),
}

pub struct SynthesisProducer {
    synthesizer: Arc<dyn Synthesizer>,
    state: Mutex<ProducerState>,
    event_bus: Option<EventBus>,
}

impl SynthesisProducer {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            synthesizer,
            state: Mutex::new(ProducerState::default()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Announce the length of the session about to start. Its first request
    /// switches the producer over.
    pub fn prepare(&self, total_chunks: usize) {
        self.state.lock().next_total = total_chunks;
    }

    /// Switch to `generation` unless it is already current or outdated.
    pub fn reset(&self, generation: SessionGeneration, total_chunks: usize) {
        let mut state = self.state.lock();
        if generation > state.generation {
            state.adopt(generation, total_chunks);
        } else if generation == state.generation {
            state.total_chunks = total_chunks;
        }
    }

    /// Forget the current session; its remaining requests become out of range.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.total_chunks = 0;
        state.cache.clear();
    }

    pub fn generation(&self) -> SessionGeneration {
        self.state.lock().generation
    }

    pub fn cached_chunks(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Serve `request`. `Ok(None)` when it was skipped or produced nothing.
    ///
    /// Fails only if every requested index failed to synthesize.
    #[instrument(skip(self), fields(generation = %request.generation))]
    pub async fn handle_request(&self, request: ChunkRequest) -> Result<Option<ChunkDelivery>> {
        let indices = match self.admit(&request) {
            Admission::Serve(indices) => indices,
            Admission::Skip(reason) => {
                debug!(start_index = request.start_index, reason, "Skipping chunk request");
                self.emit(ProducerEvent::RequestSkipped {
                    generation: request.generation,
                    start_index: request.start_index,
                    reason: reason.to_string(),
                });
                return Ok(None);
            }
        };

        let outcome = self.synthesize_range(request.generation, indices).await;

        if !request.is_seek() {
            let mut state = self.state.lock();
            if state.generation == request.generation {
                state.in_flight = false;
            }
        }

        outcome
    }

    fn admit(&self, request: &ChunkRequest) -> Admission {
        let mut state = self.state.lock();

        if request.generation < state.generation {
            return Admission::Skip("stale session");
        }
        if request.generation > state.generation {
            let total = state.next_total;
            state.adopt(request.generation, total);
        }

        let indices = request.indices(state.total_chunks);
        if indices.is_empty() {
            return Admission::Skip("out of range");
        }

        if !request.is_seek() {
            if state.in_flight {
                return Admission::Skip("batch in flight");
            }
            state.in_flight = true;
        }

        Admission::Serve(indices)
    }

    async fn synthesize_range(
        &self,
        generation: SessionGeneration,
        indices: Range<usize>,
    ) -> Result<Option<ChunkDelivery>> {
        let mut chunks = Vec::with_capacity(indices.len());
        let mut last_failure = None;

        for index in indices {
            let cached = self.state.lock().cache.get(&index).cloned();
            if let Some(data) = cached {
                chunks.push(Chunk::new(index, data));
                continue;
            }

            match self.synthesizer.synthesize(index).await {
                Ok(data) => {
                    debug!(chunk_index = index, bytes = data.len(), "Chunk synthesized");
                    self.emit(ProducerEvent::ChunkSynthesized {
                        generation,
                        chunk_index: index,
                        bytes: data.len(),
                    });

                    {
                        let mut state = self.state.lock();
                        if state.generation == generation {
                            state.cache.entry(index).or_insert_with(|| data.clone());
                        }
                    }
                    chunks.push(Chunk::new(index, data));
                }
                Err(err) => {
                    warn!(chunk_index = index, error = %err, "Chunk synthesis failed");
                    self.emit(ProducerEvent::SynthesisFailed {
                        generation,
                        chunk_index: index,
                        message: err.to_string(),
                    });
                    last_failure = Some(CoreError::Synthesis {
                        chunk_index: index,
                        message: err.to_string(),
                    });
                }
            }
        }

        if chunks.is_empty() {
            return match last_failure {
                Some(err) => Err(err),
                None => Ok(None),
            };
        }
        Ok(Some(ChunkDelivery::tagged(generation, chunks)))
    }

    fn emit(&self, event: ProducerEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Producer(event));
        }
    }
}

impl fmt::Debug for SynthesisProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SynthesisProducer")
            .field("generation", &state.generation)
            .field("total_chunks", &state.total_chunks)
            .field("cached", &state.cache.len())
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use mockall::mock;

    mock! {
        pub Voice {}

        #[async_trait::async_trait]
        impl Synthesizer for Voice {
            async fn synthesize(&self, chunk_index: usize) -> BridgeResult<Bytes>;
        }
    }

    fn gen(n: u64) -> SessionGeneration {
        SessionGeneration::new(n)
    }

    fn echo_voice() -> MockVoice {
        let mut voice = MockVoice::new();
        voice
            .expect_synthesize()
            .returning(|index| Ok(Bytes::from(vec![index as u8; 3])));
        voice
    }

    #[tokio::test]
    async fn test_serves_requested_window() {
        let producer = SynthesisProducer::new(Arc::new(echo_voice()));
        producer.prepare(5);

        let delivery = producer
            .handle_request(ChunkRequest::prefetch(gen(1), 0, 2))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(delivery.generation, Some(gen(1)));
        let indices: Vec<_> = delivery.chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(producer.generation(), gen(1));
        assert_eq!(producer.cached_chunks(), 2);
    }

    #[tokio::test]
    async fn test_cached_indices_are_not_resynthesized() {
        let mut voice = MockVoice::new();
        voice
            .expect_synthesize()
            .times(2)
            .returning(|index| Ok(Bytes::from(vec![index as u8])));
        let producer = SynthesisProducer::new(Arc::new(voice));
        producer.reset(gen(1), 4);

        producer
            .handle_request(ChunkRequest::prefetch(gen(1), 0, 2))
            .await
            .unwrap();
        let again = producer
            .handle_request(ChunkRequest::seek(gen(1), 1, 12.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.chunks[0].index, 1);
    }

    #[tokio::test]
    async fn test_skips_stale_and_out_of_range() {
        let producer = SynthesisProducer::new(Arc::new(MockVoice::new()));
        producer.reset(gen(3), 2);

        let stale = producer
            .handle_request(ChunkRequest::prefetch(gen(2), 0, 2))
            .await
            .unwrap();
        assert!(stale.is_none());

        let beyond = producer
            .handle_request(ChunkRequest::prefetch(gen(3), 2, 2))
            .await
            .unwrap();
        assert!(beyond.is_none());
    }

    #[tokio::test]
    async fn test_window_is_clipped_to_total() {
        let producer = SynthesisProducer::new(Arc::new(echo_voice()));
        producer.reset(gen(1), 3);

        let delivery = producer
            .handle_request(ChunkRequest::prefetch(gen(1), 2, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.chunks.len(), 1);
        assert_eq!(delivery.chunks[0].index, 2);
    }

    #[tokio::test]
    async fn test_in_flight_batch_blocks_prefetch_not_seek() {
        let producer = SynthesisProducer::new(Arc::new(echo_voice()));
        producer.reset(gen(1), 6);
        producer.state.lock().in_flight = true;

        let skipped = producer
            .handle_request(ChunkRequest::prefetch(gen(1), 2, 2))
            .await
            .unwrap();
        assert!(skipped.is_none());

        let seek = producer
            .handle_request(ChunkRequest::seek(gen(1), 4, 40.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seek.chunks[0].index, 4);
        assert!(producer.state.lock().in_flight, "seek leaves the batch guard alone");
    }

    #[tokio::test]
    async fn test_guard_released_after_batch() {
        let producer = SynthesisProducer::new(Arc::new(echo_voice()));
        producer.reset(gen(1), 6);

        producer
            .handle_request(ChunkRequest::prefetch(gen(1), 0, 2))
            .await
            .unwrap();
        let next = producer
            .handle_request(ChunkRequest::prefetch(gen(1), 2, 2))
            .await
            .unwrap();
        assert!(next.is_some());
    }

    #[tokio::test]
    async fn test_failures_are_reported() {
        let mut voice = MockVoice::new();
        voice.expect_synthesize().returning(|index| {
            if index == 0 {
                Ok(Bytes::from_static(b"ok"))
            } else {
                Err(BridgeError::OperationFailed("voice unavailable".to_string()))
            }
        });
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let producer = SynthesisProducer::new(Arc::new(voice)).with_event_bus(bus);
        producer.reset(gen(1), 3);

        let partial = producer
            .handle_request(ChunkRequest::prefetch(gen(1), 0, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(partial.chunks.len(), 1);

        let err = producer
            .handle_request(ChunkRequest::seek(gen(1), 2, 25.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Synthesis { chunk_index: 2, .. }));

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Producer(ProducerEvent::ChunkSynthesized { chunk_index: 0, .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Producer(ProducerEvent::SynthesisFailed { chunk_index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_drops_session() {
        let producer = SynthesisProducer::new(Arc::new(echo_voice()));
        producer.reset(gen(1), 3);
        producer
            .handle_request(ChunkRequest::prefetch(gen(1), 0, 1))
            .await
            .unwrap();

        producer.clear();
        assert_eq!(producer.cached_chunks(), 0);
        let after = producer
            .handle_request(ChunkRequest::prefetch(gen(1), 1, 1))
            .await
            .unwrap();
        assert!(after.is_none());
    }
}
