//! Configuration types for the daraja pacing bridge

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bytes per 16-bit linear PCM sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// TTS provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// WebSocket endpoint of the TTS provider
    #[serde(default = "default_tts_url")]
    pub websocket_url: String,

    /// API key sent during the handshake
    #[serde(default)]
    pub api_key: String,

    /// Voice id to synthesize with
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Model id requested from the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Output sample rate in Hz (8000 or 16000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            websocket_url: default_tts_url(),
            api_key: String::new(),
            voice: default_voice(),
            model: default_model(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Telephony sink connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// WebSocket endpoint of the telephony transport
    #[serde(default)]
    pub websocket_url: String,

    /// API key sent in the start frame
    #[serde(default)]
    pub api_key: String,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            websocket_url: String::new(),
            api_key: String::new(),
        }
    }
}

/// Pacing and buffering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Outbound chunk duration in milliseconds
    #[serde(default = "default_chunk_duration_ms")]
    pub chunk_duration_ms: u64,

    /// Timeout for each adapter connection attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Optional cap on buffered PCM bytes; None means unbounded
    #[serde(default)]
    pub max_buffer_bytes: Option<usize>,

    /// Zero-pad and send the final partial chunk instead of dropping it
    #[serde(default)]
    pub flush_partial_tail: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_duration_ms: default_chunk_duration_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_buffer_bytes: None,
            flush_partial_tail: false,
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub telephony: TelephonyConfig,

    #[serde(default)]
    pub audio: AudioConfig,
}

impl BridgeConfig {
    /// Outbound chunk size in bytes for the configured sample rate and cadence.
    pub fn chunk_bytes(&self) -> usize {
        self.tts.sample_rate as usize * self.audio.chunk_duration_ms as usize * BYTES_PER_SAMPLE
            / 1000
    }

    /// Validate field combinations that serde defaults cannot catch.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.tts.sample_rate, 8000 | 16000) {
            return Err(Error::Config(format!(
                "unsupported sample rate {} (expected 8000 or 16000)",
                self.tts.sample_rate
            )));
        }
        if self.audio.chunk_duration_ms == 0 {
            return Err(Error::Config("chunk_duration_ms must be non-zero".into()));
        }
        if let Some(max) = self.audio.max_buffer_bytes {
            if max < self.chunk_bytes() {
                return Err(Error::Config(format!(
                    "max_buffer_bytes {} is smaller than one chunk ({})",
                    max,
                    self.chunk_bytes()
                )));
            }
        }
        Ok(())
    }
}

fn default_tts_url() -> String {
    "wss://api.cartesia.ai/tts/websocket".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_model() -> String {
    "sonic-english".to_string()
}

fn default_sample_rate() -> u32 {
    8000
}

fn default_chunk_duration_ms() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    5000
}
