//! Fixed-cadence pacing scheduler
//!
//! The scheduler bridges an irregular stream of TTS audio chunks to a
//! telephony sink that expects one fixed-size chunk per interval. It owns the
//! pending-audio buffer and three tasks:
//! - a source pump forwarding inbound chunks into the buffer,
//! - a tick task draining one chunk per interval,
//! - a writer task submitting drained chunks to the sink.
//!
//! The tick never awaits I/O: it moves bytes under the buffer lock and hands
//! the chunk to the writer through a bounded channel. When the source has
//! finished and the buffer cannot fill a chunk, silence is dispatched instead
//! so the downstream transport keeps receiving a steady cadence.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::adapter::{AudioSink, AudioSource, SourceEvent};
use crate::buffer::{BufferStats, PcmBuffer};
use crate::config::BridgeConfig;
use crate::error::{Error, Result};

/// Outbound chunks queued between the tick and the sink writer.
const DISPATCH_QUEUE_DEPTH: usize = 8;

/// Lifecycle state of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SchedulerState {
    /// Created, not yet started
    #[default]
    Idle,
    /// Adapter connections are being established
    Connecting,
    /// Timer active, buffer draining
    Streaming,
    /// Terminal: timer canceled, connections released
    Stopped,
}

/// Scheduler statistics snapshot.
#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub state: SchedulerState,
    /// True while the source is still producing audio
    pub streaming: bool,
    /// Full audio chunks dispatched
    pub chunks_sent: u64,
    /// Silence chunks dispatched after stream end
    pub silence_chunks_sent: u64,
    /// Ticks skipped because the buffer was under-filled mid-stream
    pub underruns: u64,
    /// Inbound chunks rejected by the buffer capacity bound
    pub chunks_dropped: u64,
    pub buffer: BufferStats,
}

struct Inner {
    state: SchedulerState,
    streaming: bool,
    buffer: PcmBuffer,
    chunks_sent: u64,
    silence_chunks_sent: u64,
    underruns: u64,
    chunks_dropped: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    stream_done: watch::Sender<bool>,
}

impl Shared {
    /// Inbound chunk from the source pump. Appends to the buffer tail; a
    /// chunk that would exceed the capacity bound is rejected whole.
    async fn ingest(&self, chunk: &[u8]) {
        let mut inner = self.inner.lock().await;
        if inner.state != SchedulerState::Streaming {
            return;
        }
        if let Err(e) = inner.buffer.append(chunk) {
            inner.chunks_dropped += 1;
            warn!("Dropping inbound chunk of {} bytes: {}", chunk.len(), e);
        }
    }

    async fn mark_stream_done(&self) {
        self.inner.lock().await.streaming = false;
        let _ = self.stream_done.send(true);
    }
}

/// Paces variable-length TTS audio into fixed-size chunks on a wall-clock
/// interval.
///
/// One instance drives one utterance: `Idle → Connecting → Streaming →
/// Stopped`. `Stopped` is terminal and reachable from every state.
pub struct PacingScheduler<S, K>
where
    S: AudioSource + 'static,
    K: AudioSink + 'static,
{
    config: BridgeConfig,
    chunk_bytes: usize,
    shared: Arc<Shared>,
    source: Option<S>,
    sink: Option<K>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<S, K> PacingScheduler<S, K>
where
    S: AudioSource + 'static,
    K: AudioSink + 'static,
{
    /// Create a scheduler over the given adapters. Connections are not
    /// opened until [`start`](Self::start).
    pub fn new(config: BridgeConfig, source: S, sink: K) -> Result<Self> {
        config.validate()?;
        let chunk_bytes = config.chunk_bytes();
        let buffer = PcmBuffer::with_capacity(config.tts.sample_rate, config.audio.max_buffer_bytes);
        let (stream_done, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            chunk_bytes,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SchedulerState::Idle,
                    streaming: false,
                    buffer,
                    chunks_sent: 0,
                    silence_chunks_sent: 0,
                    underruns: 0,
                    chunks_dropped: 0,
                }),
                stream_done,
            }),
            source: Some(source),
            sink: Some(sink),
            shutdown,
            tasks: Vec::new(),
        })
    }

    /// Connect both adapters, begin the drain timer and submit `text` for
    /// synthesis.
    ///
    /// On any failure the scheduler stops internally, releasing whatever was
    /// already acquired, and the error is returned; no buffered audio is ever
    /// dispatched after a failed start.
    pub async fn start(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != SchedulerState::Idle {
                return Err(Error::InvalidState(format!(
                    "start requires Idle, scheduler is {:?}",
                    inner.state
                )));
            }
            inner.state = SchedulerState::Connecting;
        }

        let mut source = match self.source.take() {
            Some(s) => s,
            None => return Err(Error::InvalidState("source adapter already consumed".into())),
        };
        let mut sink = match self.sink.take() {
            Some(s) => s,
            None => return Err(Error::InvalidState("sink adapter already consumed".into())),
        };

        if let Err(e) = self.connect_both(&mut source, &mut sink).await {
            error!("Failed to start pacing scheduler: {}", e);
            source.close().await;
            sink.close().await;
            self.stop().await;
            return Err(e);
        }

        {
            let mut inner = self.shared.inner.lock().await;
            inner.state = SchedulerState::Streaming;
            inner.streaming = true;
        }

        let (chunk_tx, chunk_rx) = mpsc::channel::<Bytes>(DISPATCH_QUEUE_DEPTH);
        self.tasks.push(tokio::spawn(writer_task(
            sink,
            chunk_rx,
            self.shutdown.subscribe(),
        )));
        self.tasks.push(tokio::spawn(tick_task(
            Arc::clone(&self.shared),
            chunk_tx,
            self.chunk_bytes,
            Duration::from_millis(self.config.audio.chunk_duration_ms),
            self.config.audio.flush_partial_tail,
            self.shutdown.subscribe(),
        )));

        if let Err(e) = source.submit_text(text).await {
            error!("Failed to submit text to TTS source: {}", e);
            source.close().await;
            self.stop().await;
            return Err(e);
        }

        self.tasks.push(tokio::spawn(pump_task(
            source,
            Arc::clone(&self.shared),
            self.shutdown.subscribe(),
        )));

        info!(
            "Pacing scheduler started ({} byte chunks every {}ms)",
            self.chunk_bytes, self.config.audio.chunk_duration_ms
        );
        Ok(())
    }

    async fn connect_both(&self, source: &mut S, sink: &mut K) -> Result<()> {
        let timeout_ms = self.config.audio.connect_timeout_ms;
        let limit = Duration::from_millis(timeout_ms);
        let (src, snk) = tokio::join!(
            timeout(limit, source.connect()),
            timeout(limit, sink.connect()),
        );
        src.map_err(|_| Error::ConnectTimeout {
            endpoint: self.config.tts.websocket_url.clone(),
            ms: timeout_ms,
        })??;
        snk.map_err(|_| Error::ConnectTimeout {
            endpoint: self.config.telephony.websocket_url.clone(),
            ms: timeout_ms,
        })??;
        Ok(())
    }

    /// Stop the scheduler. Idempotent and safe from any state.
    ///
    /// Cancels the drain timer, closes both adapter connections and clears
    /// the pending-audio buffer. No tick fires after this returns.
    pub async fn stop(&mut self) {
        {
            let mut inner = self.shared.inner.lock().await;
            inner.streaming = false;
            inner.buffer.clear();
            if inner.state == SchedulerState::Stopped {
                return;
            }
            inner.state = SchedulerState::Stopped;
        }
        let _ = self.shutdown.send(true);
        let _ = self.shared.stream_done.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Scheduler task panicked: {}", e);
                }
            }
        }
        // Adapters never handed to a task are released here.
        if let Some(mut source) = self.source.take() {
            source.close().await;
        }
        if let Some(mut sink) = self.sink.take() {
            sink.close().await;
        }
        info!("Pacing scheduler stopped");
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SchedulerState {
        self.shared.inner.lock().await.state
    }

    /// Statistics snapshot, including underrun and drop counters.
    pub async fn stats(&self) -> SchedulerStats {
        let inner = self.shared.inner.lock().await;
        SchedulerStats {
            state: inner.state,
            streaming: inner.streaming,
            chunks_sent: inner.chunks_sent,
            silence_chunks_sent: inner.silence_chunks_sent,
            underruns: inner.underruns,
            chunks_dropped: inner.chunks_dropped,
            buffer: inner.buffer.stats(),
        }
    }

    /// Wait until the source signals end of stream (or the scheduler stops).
    pub async fn stream_ended(&self) {
        let mut rx = self.shared.stream_done.subscribe();
        // Ignore a closed channel: the sender lives in self.shared.
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Forwards source events into the shared buffer until the stream finishes
/// or shutdown is signaled.
async fn pump_task<S: AudioSource>(
    mut source: S,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            event = source.next_event() => event,
            _ = shutdown.changed() => break,
        };
        match event {
            Ok(SourceEvent::Audio(chunk)) => {
                debug!("Received audio chunk of {} bytes", chunk.len());
                shared.ingest(&chunk).await;
            }
            Ok(SourceEvent::Finished) => {
                info!("TTS stream complete");
                shared.mark_stream_done().await;
                break;
            }
            // One bad frame must not abort an in-progress call.
            Err(Error::MalformedMessage(msg)) => {
                error!("Skipping malformed source message: {}", msg);
            }
            Err(e) => {
                error!("TTS source failed mid-stream: {}", e);
                shared.mark_stream_done().await;
                break;
            }
        }
    }
    source.close().await;
}

/// Drains one fixed-size chunk per interval, injecting silence after stream
/// end so the sink never starves.
async fn tick_task(
    shared: Arc<Shared>,
    chunk_tx: mpsc::Sender<Bytes>,
    chunk_bytes: usize,
    period: Duration,
    flush_partial_tail: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let silence = Bytes::from(vec![0u8; chunk_bytes]);
    // First fire one full period after start, like the interval the sink
    // expects between consecutive chunks.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        let outbound = {
            let mut inner = shared.inner.lock().await;
            if inner.state != SchedulerState::Streaming {
                break;
            }
            if inner.buffer.len() >= chunk_bytes {
                match inner.buffer.take_chunk(chunk_bytes) {
                    Ok(chunk) => {
                        inner.chunks_sent += 1;
                        Some(chunk)
                    }
                    Err(e) => {
                        // Unreachable: length is checked above.
                        error!("Buffer invariant violated: {}", e);
                        None
                    }
                }
            } else if !inner.streaming {
                let chunk = if flush_partial_tail && !inner.buffer.is_empty() {
                    inner.buffer.take_padded(chunk_bytes)
                } else {
                    silence.clone()
                };
                inner.silence_chunks_sent += 1;
                Some(chunk)
            } else {
                // Mid-stream underrun: tolerate and wait for more audio.
                inner.underruns += 1;
                debug!(
                    "Underrun: {} of {} bytes buffered",
                    inner.buffer.len(),
                    chunk_bytes
                );
                None
            }
        };
        if let Some(chunk) = outbound {
            // Fire and forget: the writer owns the actual sink I/O.
            if chunk_tx.try_send(chunk).is_err() {
                warn!("Dispatch queue full, dropping outbound chunk");
            }
        }
    }
}

/// Submits drained chunks to the sink and closes it on shutdown.
async fn writer_task<K: AudioSink>(
    mut sink: K,
    mut chunk_rx: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let chunk = tokio::select! {
            chunk = chunk_rx.recv() => chunk,
            _ = shutdown.changed() => break,
        };
        let Some(chunk) = chunk else { break };
        if let Err(e) = sink.send_chunk(chunk).await {
            error!("Failed to send chunk to telephony sink: {}", e);
        }
    }
    sink.close().await;
}
