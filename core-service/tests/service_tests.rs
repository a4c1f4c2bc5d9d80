//! Service-level tests: engine, request pump and synthesis producer together.

use async_trait::async_trait;
use bridge_desktop::SimulatedAudioOutput;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    PlaybackState,
};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, ProducerEvent};
use core_service::{
    CoreConfig, CoreError, NarrationService, PlaybackConfig, Synthesizer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Every chunk is ten bytes, i.e. ten seconds on the simulated output.
#[derive(Default)]
struct FakeVoice {
    calls: AtomicUsize,
    fail_index: Option<usize>,
}

#[async_trait]
impl Synthesizer for FakeVoice {
    async fn synthesize(&self, chunk_index: usize) -> BridgeResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_index == Some(chunk_index) {
            return Err(BridgeError::OperationFailed("voice crashed".to_string()));
        }
        Ok(Bytes::from(vec![chunk_index as u8; 10]))
    }
}

fn start(voice: Arc<FakeVoice>) -> (NarrationService, Arc<SimulatedAudioOutput>) {
    let output = Arc::new(SimulatedAudioOutput::with_duration_fn(|source| {
        source.data.len() as f64
    }));
    let config = CoreConfig::builder()
        .audio_output(output.clone())
        .build()
        .unwrap();
    let service = NarrationService::start(config, PlaybackConfig::default(), voice).unwrap();
    (service, output)
}

async fn wait_for<F>(service: &NarrationService, mut done: F) -> PlaybackState
where
    F: FnMut(&PlaybackState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let state = service.state().await.unwrap();
            if done(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("engine did not reach the expected state")
}

#[tokio::test]
async fn test_narration_plays_to_completion() {
    let voice = Arc::new(FakeVoice::default());
    let (service, output) = start(voice.clone());

    service.load(3, 30.0, 1.0).await.unwrap();
    wait_for(&service, |s| s.current_chunk_index == Some(0)).await;

    for index in 0..3 {
        wait_for(&service, |s| s.current_chunk_index == Some(index)).await;
        let handle = output.active_handle().unwrap();
        output.finish(handle);
    }

    let state = wait_for(&service, |s| !s.is_playing).await;
    assert_eq!(state.current_chunk_index, None);
    assert_eq!(state.duration, 30.0);
    assert_eq!(voice.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_seek_beyond_synthesized_region() {
    let voice = Arc::new(FakeVoice::default());
    let (service, _output) = start(voice);

    service.load(6, 60.0, 1.0).await.unwrap();
    wait_for(&service, |s| s.current_chunk_index == Some(0)).await;

    service.seek(45.0).await.unwrap();
    let state = wait_for(&service, |s| {
        s.current_chunk_index == Some(4) && s.progress == 45.0
    })
    .await;
    assert!(state.is_playing);
}

#[tokio::test]
async fn test_synthesis_failure_leaves_session_buffering() {
    let voice = Arc::new(FakeVoice {
        fail_index: Some(0),
        ..FakeVoice::default()
    });
    let (service, _output) = start(voice);
    let mut events = service.events().filter(|event| {
        matches!(event, CoreEvent::Producer(ProducerEvent::SynthesisFailed { .. }))
    });

    service.load(2, 20.0, 1.0).await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event,
        CoreEvent::Producer(ProducerEvent::SynthesisFailed { chunk_index: 0, .. })
    ));

    // Chunk 1 arrived but chunk 0 never will; playback starts from what is queued
    let state = wait_for(&service, |s| s.current_chunk_index.is_some()).await;
    assert_eq!(state.current_chunk_index, Some(1));
}

#[tokio::test]
async fn test_stop_and_reload() {
    let voice = Arc::new(FakeVoice::default());
    let (service, _output) = start(voice);

    let first = service.load(4, 40.0, 1.0).await.unwrap();
    wait_for(&service, |s| s.current_chunk_index == Some(0)).await;

    service.stop().await.unwrap();
    assert_eq!(service.state().await.unwrap(), PlaybackState::stopped());

    let second = service.load(2, 20.0, 1.5).await.unwrap();
    assert!(second > first);
    let state = wait_for(&service, |s| s.current_chunk_index == Some(0)).await;
    assert_eq!(state.total_chunks, 2);
}

#[tokio::test]
async fn test_play_single_and_speed() {
    let voice = Arc::new(FakeVoice::default());
    let (service, output) = start(voice.clone());

    service.play_single(vec![1u8; 12], 1.0).await.unwrap();
    let state = wait_for(&service, |s| s.duration == 12.0).await;
    assert_eq!(state.total_chunks, 1);

    service.set_speed(2.0).await.unwrap();
    let handle = output.active_handle().unwrap();
    assert_eq!(output.playback_rate(handle), Some(2.0));

    let err = service.set_speed(9.0).await.unwrap_err();
    assert!(matches!(err, CoreError::Playback(_)));
    assert_eq!(voice.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_closes_engine() {
    let (mut service, _output) = start(Arc::new(FakeVoice::default()));
    service.load(2, 20.0, 1.0).await.unwrap();

    service.shutdown().await.unwrap();
    assert!(service.engine().is_closed());
    assert!(service.state().await.is_err());
}

#[test]
fn test_missing_audio_output_is_reported() {
    let err = CoreConfig::builder().build().unwrap_err();
    let err: CoreError = err.into();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}

#[test]
fn test_start_requires_runtime() {
    let config = CoreConfig::builder()
        .audio_output(Arc::new(SimulatedAudioOutput::new(1.0)))
        .build()
        .unwrap();
    let result = NarrationService::start(
        config,
        PlaybackConfig::default(),
        Arc::new(FakeVoice::default()),
    );
    assert!(matches!(result, Err(CoreError::InitializationFailed(_))));
}
