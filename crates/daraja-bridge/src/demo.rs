//! Simulated adapters for running the bridge without network endpoints
//!
//! The source replays the canonical variable-length chunk sequence (500,
//! 300, 700 and 200 bytes) with small gaps, then signals completion; the
//! sink logs each dispatch so the fixed cadence is visible on the console.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use daraja_core::{AudioSink, AudioSource, Result, SourceEvent};

/// Gap between simulated provider chunks.
const CHUNK_GAP: Duration = Duration::from_millis(50);

/// Replays a scripted chunk sequence as a TTS provider would deliver it.
pub struct SimulatedSource {
    pending: VecDeque<SourceEvent>,
}

impl SimulatedSource {
    /// The demo scenario: 1700 bytes across four uneven chunks.
    pub fn demo() -> Self {
        let sizes: [(usize, u8); 4] = [(500, 0xaa), (300, 0xbb), (700, 0xcc), (200, 0xdd)];
        let mut pending: VecDeque<SourceEvent> = sizes
            .iter()
            .map(|&(len, fill)| SourceEvent::Audio(Bytes::from(vec![fill; len])))
            .collect();
        pending.push_back(SourceEvent::Finished);
        Self { pending }
    }
}

#[async_trait]
impl AudioSource for SimulatedSource {
    async fn connect(&mut self) -> Result<()> {
        info!("Simulated TTS source connected");
        Ok(())
    }

    async fn submit_text(&mut self, text: &str) -> Result<()> {
        info!("Simulating synthesis of {:?}", text);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<SourceEvent> {
        match self.pending.pop_front() {
            Some(event) => {
                sleep(CHUNK_GAP).await;
                if let SourceEvent::Audio(chunk) = &event {
                    debug!("Simulated chunk of {} bytes", chunk.len());
                }
                Ok(event)
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        info!("Simulated TTS source closed");
    }
}

/// Logs each outbound chunk with its offset from the previous one.
pub struct SimulatedSink {
    chunks_received: Arc<AtomicU64>,
    last_dispatch: Option<Instant>,
}

impl SimulatedSink {
    pub fn new() -> Self {
        Self {
            chunks_received: Arc::new(AtomicU64::new(0)),
            last_dispatch: None,
        }
    }

    /// Shared counter of chunks the sink has accepted.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.chunks_received)
    }
}

impl Default for SimulatedSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for SimulatedSink {
    async fn connect(&mut self) -> Result<()> {
        info!("Simulated telephony sink connected");
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<()> {
        let now = Instant::now();
        let gap_ms = self
            .last_dispatch
            .map(|prev| now.duration_since(prev).as_millis())
            .unwrap_or(0);
        self.last_dispatch = Some(now);
        let n = self.chunks_received.fetch_add(1, Ordering::Relaxed) + 1;
        let silent = chunk.iter().all(|&b| b == 0);
        info!(
            "Chunk {} -> telephony: {} bytes ({}) +{}ms",
            n,
            chunk.len(),
            if silent { "silence" } else { "audio" },
            gap_ms
        );
        Ok(())
    }

    async fn close(&mut self) {
        info!(
            "Simulated telephony sink closed after {} chunks",
            self.chunks_received.load(Ordering::Relaxed)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn demo_source_replays_script_then_finishes() {
        let mut source = SimulatedSource::demo();
        source.connect().await.unwrap();

        let mut sizes = Vec::new();
        loop {
            match source.next_event().await.unwrap() {
                SourceEvent::Audio(chunk) => sizes.push(chunk.len()),
                SourceEvent::Finished => break,
            }
        }
        assert_eq!(sizes, vec![500, 300, 700, 200]);
    }

    #[tokio::test]
    async fn sink_counts_chunks() {
        let mut sink = SimulatedSink::new();
        let counter = sink.counter();
        sink.connect().await.unwrap();
        sink.send_chunk(Bytes::from(vec![0u8; 960])).await.unwrap();
        sink.send_chunk(Bytes::from(vec![1u8; 960])).await.unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
