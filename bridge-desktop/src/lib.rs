//! # Desktop Bridge Implementations
//!
//! Default implementations of the playback bridges for native hosts and
//! headless environments (CLI tools, CI).
//!
//! ## Overview
//!
//! - `ChannelChunkProducer`: forwards chunk requests onto a Tokio channel so a
//!   synthesis task can serve them
//! - `WatchStateTransport`: publishes playback snapshots through a
//!   `tokio::sync::watch` channel
//! - `SimulatedAudioOutput`: an `AudioOutput` that decodes nothing; the host
//!   (or a test) drives metadata, time updates and ends explicitly
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ChannelChunkProducer, WatchStateTransport};
//!
//! let (producer, mut requests) = ChannelChunkProducer::new();
//! let transport = WatchStateTransport::new();
//! let mut states = transport.subscribe();
//! ```

mod output;
mod producer;
mod transport;

pub use output::SimulatedAudioOutput;
pub use producer::ChannelChunkProducer;
pub use transport::WatchStateTransport;
