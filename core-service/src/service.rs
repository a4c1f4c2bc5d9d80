//! Running narration service.

use crate::error::{CoreError, Result};
use crate::producer::{SynthesisProducer, Synthesizer};
use bridge_desktop::ChannelChunkProducer;
use bridge_traits::{ChunkRequest, PlaybackState, SessionGeneration};
use bytes::Bytes;
use core_playback::{EngineBridges, EngineHandle, EngineStatus, PlaybackConfig, PlaybackEngine};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Playback engine plus the producer that feeds it, each on its own task.
///
/// Must be started inside a Tokio runtime. Dropping the service stops the
/// request pump; the engine task then ends once its last handle is gone.
pub struct NarrationService {
    handle: EngineHandle,
    producer: Arc<SynthesisProducer>,
    event_bus: EventBus,
    engine_task: JoinHandle<()>,
    pump_task: JoinHandle<()>,
}

impl NarrationService {
    pub fn start(
        config: CoreConfig,
        playback: PlaybackConfig,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CoreError::InitializationFailed(
                "NarrationService must be started inside a Tokio runtime".to_string(),
            ));
        }
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let (requests_out, requests) = ChannelChunkProducer::new();

        let bridges = EngineBridges {
            output: Arc::clone(&config.audio_output),
            producer: Arc::new(requests_out),
            transport: Arc::clone(&config.state_transport),
        };
        let (engine, handle) = PlaybackEngine::new(playback, bridges)?;
        let engine = engine.with_event_bus(event_bus.clone());

        let producer =
            Arc::new(SynthesisProducer::new(synthesizer).with_event_bus(event_bus.clone()));

        let engine_task = engine.spawn();
        let pump_task = tokio::spawn(pump_requests(
            Arc::clone(&producer),
            requests,
            handle.clone(),
        ));

        info!(
            event_buffer_size = config.event_buffer_size,
            "Narration service started"
        );

        Ok(Self {
            handle,
            producer,
            event_bus,
            engine_task,
            pump_task,
        })
    }

    /// Start a narration of `total_chunks` chunks. Synthesis of the first
    /// window begins immediately.
    pub async fn load(
        &self,
        total_chunks: usize,
        estimated_duration: f64,
        speed: f32,
    ) -> Result<SessionGeneration> {
        self.producer.prepare(total_chunks);
        let generation = self
            .handle
            .init(total_chunks, estimated_duration, speed)
            .await?;
        self.producer.reset(generation, total_chunks);
        Ok(generation)
    }

    /// Play one complete audio blob, bypassing synthesis.
    pub async fn play_single(&self, data: impl Into<Bytes>, speed: f32) -> Result<SessionGeneration> {
        self.producer.clear();
        Ok(self.handle.play_single(data, speed).await?)
    }

    pub async fn play(&self) -> Result<()> {
        Ok(self.handle.play().await?)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.handle.pause().await?)
    }

    pub async fn resume(&self) -> Result<()> {
        Ok(self.handle.resume().await?)
    }

    pub async fn stop(&self) -> Result<()> {
        self.handle.stop().await?;
        self.producer.clear();
        Ok(())
    }

    pub async fn seek(&self, target: f64) -> Result<()> {
        Ok(self.handle.seek(target).await?)
    }

    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        Ok(self.handle.set_speed(speed).await?)
    }

    pub async fn state(&self) -> Result<PlaybackState> {
        Ok(self.handle.get_state().await?)
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(self.handle.status().await?)
    }

    /// Subscribe to engine and producer events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.handle
    }

    /// Stop both tasks and wait for the engine to release its audio.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.pump_task.abort();
        self.handle.shutdown().await?;
        if let Err(err) = (&mut self.engine_task).await {
            warn!(error = %err, "Engine task ended abnormally");
        }
        info!("Narration service shut down");
        Ok(())
    }
}

impl Drop for NarrationService {
    fn drop(&mut self) {
        self.pump_task.abort();
    }
}

/// Forward engine requests to the producer. Each request is served on its
/// own task so a seek is never stuck behind a read-ahead batch.
async fn pump_requests(
    producer: Arc<SynthesisProducer>,
    mut requests: mpsc::UnboundedReceiver<ChunkRequest>,
    handle: EngineHandle,
) {
    while let Some(request) = requests.recv().await {
        let producer = Arc::clone(&producer);
        let handle = handle.clone();

        tokio::spawn(async move {
            match producer.handle_request(request).await {
                Ok(Some(delivery)) => {
                    if handle.deliver(delivery).is_err() {
                        debug!("Engine closed before delivery");
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "Chunk request failed"),
            }
        });
    }

    debug!("Chunk request channel closed");
}
