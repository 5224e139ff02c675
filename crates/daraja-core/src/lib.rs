//! Daraja Core - Audio Pacing Engine
//!
//! This crate converts the irregular chunk stream of a text-to-speech
//! provider into the fixed-cadence, fixed-size chunk stream a telephony
//! transport requires.
//!
//! # Architecture
//!
//! - [`PcmBuffer`] accumulates inbound PCM bytes in arrival order
//! - [`PacingScheduler`] drains one chunk per interval and injects silence
//!   once the stream has ended, so the sink never starves
//! - [`AudioSource`] / [`AudioSink`] abstract the two network collaborators
//!
//! # Example
//!
//! ```ignore
//! use daraja_core::{BridgeConfig, PacingScheduler};
//!
//! let config = BridgeConfig::default();
//! let mut scheduler = PacingScheduler::new(config, source, sink)?;
//! scheduler.start("Hello, world!").await?;
//! scheduler.stream_ended().await;
//! scheduler.stop().await;
//! ```

pub mod adapter;
pub mod buffer;
pub mod config;
pub mod error;
pub mod scheduler;

pub use adapter::{AudioSink, AudioSource, SourceEvent};
pub use buffer::{BufferStats, PcmBuffer};
pub use config::{AudioConfig, BridgeConfig, TelephonyConfig, TtsConfig, BYTES_PER_SAMPLE};
pub use error::{Error, Result};
pub use scheduler::{PacingScheduler, SchedulerState, SchedulerStats};
