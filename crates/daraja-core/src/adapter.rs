//! Adapter traits for the TTS source and telephony sink
//!
//! The pacing scheduler is transport-agnostic: it drives anything that
//! implements [`AudioSource`] and [`AudioSink`]. The bridge binary provides
//! WebSocket implementations; tests provide in-memory ones.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// An event delivered by the TTS source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A raw PCM chunk of arbitrary length, in arrival order.
    Audio(Bytes),
    /// Terminal signal: the provider has finished synthesizing.
    Finished,
}

/// A streaming TTS provider delivering variable-length PCM chunks.
#[async_trait]
pub trait AudioSource: Send {
    /// Establish the connection to the provider.
    async fn connect(&mut self) -> Result<()>;

    /// Submit text for synthesis. Audio arrives via [`next_event`](Self::next_event).
    async fn submit_text(&mut self, text: &str) -> Result<()>;

    /// Wait for the next inbound event.
    ///
    /// Implementations return [`Error::MalformedMessage`](crate::Error::MalformedMessage)
    /// for a single unparseable frame; callers log it and keep reading.
    async fn next_event(&mut self) -> Result<SourceEvent>;

    /// Release the connection. Must be safe to call more than once.
    async fn close(&mut self);
}

/// A telephony transport accepting fixed-size PCM chunks.
#[async_trait]
pub trait AudioSink: Send {
    /// Establish the connection to the transport.
    async fn connect(&mut self) -> Result<()>;

    /// Send one outbound chunk. The payload length is always exactly the
    /// configured chunk size.
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<()>;

    /// Release the connection. Must be safe to call more than once.
    async fn close(&mut self);
}
