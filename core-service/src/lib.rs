//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (audio output, state
//! transport, logger sink) and a [`Synthesizer`] into a running playback
//! engine. Desktop hosts typically keep the default `desktop-shims` feature,
//! which lets [`CoreConfig`] fall back to `bridge-desktop`'s
//! `WatchStateTransport` when no transport is injected.
//!
//! ```ignore
//! use core_service::{CoreConfig, NarrationService, PlaybackConfig};
//!
//! let config = CoreConfig::builder().audio_output(output).build()?;
//! let service = NarrationService::start(config, PlaybackConfig::default(), synthesizer)?;
//!
//! service.load(12, 95.0, 1.0).await?;
//! service.seek(30.0).await?;
//! ```

pub mod error;
pub mod producer;
#[cfg(not(target_arch = "wasm32"))]
pub mod service;

pub use error::{CoreError, Result};
pub use producer::{SynthesisProducer, Synthesizer};
#[cfg(not(target_arch = "wasm32"))]
pub use service::NarrationService;

pub use core_playback::PlaybackConfig;
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_runtime::logging::{LogFormat, LoggingConfig};

use std::sync::Arc;

/// Install the global tracing subscriber. When `config` carries a logger
/// sink it is attached so host logs receive the same events.
pub fn init_logging(config: &CoreConfig, logging: LoggingConfig) -> Result<()> {
    let logging = match &config.logger_sink {
        Some(sink) => logging.with_logger_sink(Arc::clone(sink)),
        None => logging,
    };
    core_runtime::logging::init_logging(logging)?;
    Ok(())
}
