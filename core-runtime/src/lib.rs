//! # Core Runtime Module
//!
//! Shared runtime infrastructure for the narration playback core:
//! - Logging and tracing infrastructure
//! - Configuration management (bridge injection)
//! - Event bus system
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on this one for its logging
//! conventions, the [`events::EventBus`] used to observe the engine, and the
//! [`config::CoreConfig`] that carries the host-provided bridges.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
