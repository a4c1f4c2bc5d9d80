//! # Core Configuration Module
//!
//! Builder-based configuration carrying the host-provided bridges.
//!
//! ## Required Dependencies
//!
//! - `AudioOutput` - platform decode/play primitive
//! - `StateTransport` - where playback snapshots are published
//!
//! ## Optional Dependencies
//!
//! - `LoggerSink` - mirror core logs into the host logging pipeline
//!
//! When the `desktop-shims` feature is enabled, a `WatchStateTransport` is
//! injected if no transport was provided. There is no default audio output on
//! any platform; the builder fails fast without one.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .audio_output(Arc::new(MyAudioOutput::new()))
//!     .state_transport(Arc::new(MyPortTransport::new(port)))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioOutput, LoggerSink, StateTransport};
use std::fmt;
use std::sync::Arc;

/// Largest accepted event bus capacity.
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Fully resolved core configuration.
#[derive(Clone)]
pub struct CoreConfig {
    pub audio_output: Arc<dyn AudioOutput>,
    pub state_transport: Arc<dyn StateTransport>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Capacity of the [`EventBus`](crate::events::EventBus) channel.
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("audio_output", &"AudioOutput { ... }")
            .field("state_transport", &"StateTransport { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn audio_output_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioOutput".to_string(),
        message: "AudioOutput implementation is required to decode and play chunks. \
                 Web: inject an HTMLAudioElement-backed output. \
                 Desktop: inject a native audio sink."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn state_transport_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "StateTransport".to_string(),
        message: "StateTransport implementation is required to publish playback state. \
                 Desktop: enable the 'desktop-shims' feature to use the default WatchStateTransport. \
                 Web: inject a message-port transport."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_state_transport() -> Result<Arc<dyn StateTransport>> {
    use bridge_desktop::WatchStateTransport;

    let transport: Arc<dyn StateTransport> = Arc::new(WatchStateTransport::new());
    Ok(transport)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_state_transport() -> Result<Arc<dyn StateTransport>> {
    Err(state_transport_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    audio_output: Option<Arc<dyn AudioOutput>>,
    state_transport: Option<Arc<dyn StateTransport>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn state_transport(mut self, transport: Arc<dyn StateTransport>) -> Self {
        self.state_transport = Some(transport);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Resolve defaults and validate.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge has no
    ///   implementation and no platform default
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let audio_output = self.audio_output.ok_or_else(audio_output_missing_error)?;

        let state_transport = match self.state_transport {
            Some(transport) => transport,
            None => provide_default_state_transport()?,
        };

        let config = CoreConfig {
            audio_output,
            state_transport,
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{MediaHandleId, MediaListener, MediaSource, NullTransport};
    use mockall::mock;

    mock! {
        pub Output {}

        #[async_trait]
        impl AudioOutput for Output {
            fn load(&self, source: MediaSource, listener: MediaListener) -> BridgeResult<MediaHandleId>;
            async fn play(&self, handle: MediaHandleId) -> BridgeResult<()>;
            fn pause(&self, handle: MediaHandleId) -> BridgeResult<()>;
            fn seek(&self, handle: MediaHandleId, position: f64) -> BridgeResult<()>;
            fn set_playback_rate(&self, handle: MediaHandleId, rate: f32) -> BridgeResult<()>;
            fn position(&self, handle: MediaHandleId) -> Option<f64>;
            fn duration(&self, handle: MediaHandleId) -> Option<f64>;
            fn release(&self, handle: MediaHandleId);
        }
    }

    fn output() -> Arc<dyn AudioOutput> {
        Arc::new(MockOutput::new())
    }

    #[test]
    fn test_builder_requires_audio_output() {
        let result = CoreConfig::builder()
            .state_transport(Arc::new(NullTransport))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioOutput")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_state_transport() {
        let result = CoreConfig::builder().audio_output(output()).build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "StateTransport")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_transport() {
        let config = CoreConfig::builder()
            .audio_output(output())
            .build()
            .expect("desktop default transport");

        assert!(config
            .state_transport
            .publish(&bridge_traits::PlaybackState::stopped())
            .is_ok());
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = CoreConfig::builder()
            .audio_output(output())
            .state_transport(Arc::new(NullTransport))
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.logger_sink.is_none());
    }

    #[test]
    fn test_builder_with_custom_buffer_size() {
        let config = CoreConfig::builder()
            .audio_output(output())
            .state_transport(Arc::new(NullTransport))
            .event_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, 16);
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let result = CoreConfig::builder()
            .audio_output(output())
            .state_transport(Arc::new(NullTransport))
            .event_buffer_size(0)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_excessive_buffer() {
        let result = CoreConfig::builder()
            .audio_output(output())
            .state_transport(Arc::new(NullTransport))
            .event_buffer_size(MAX_EVENT_BUFFER_SIZE + 1)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = CoreConfig::builder()
            .audio_output(output())
            .state_transport(Arc::new(NullTransport))
            .build()
            .unwrap();

        let cloned = config.clone();
        assert!(Arc::ptr_eq(&config.audio_output, &cloned.audio_output));
        assert!(format!("{:?}", cloned).contains("event_buffer_size"));
    }
}
