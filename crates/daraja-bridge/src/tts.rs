//! Cartesia-style WebSocket TTS source
//!
//! Speaks the provider's JSON/text protocol: one synthesis request per
//! utterance, audio back as either raw binary frames or JSON `chunk` frames
//! carrying base64 PCM, terminated by a `done` frame.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use daraja_core::{AudioSource, Error, Result, SourceEvent, TtsConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// API version sent on the handshake query string.
const API_VERSION: &str = "2024-06-10";

/// Synthesis request frame.
#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    context_id: String,
    model_id: &'a str,
    transcript: &'a str,
    voice: VoiceSpec<'a>,
    output_format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct VoiceSpec<'a> {
    mode: &'static str,
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct OutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

/// Inbound JSON frame from the provider.
#[derive(Debug, Deserialize)]
struct ProviderMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// TTS source over a provider WebSocket.
pub struct CartesiaSource {
    config: TtsConfig,
    ws: Option<WsStream>,
}

impl CartesiaSource {
    pub fn new(config: TtsConfig) -> Self {
        Self { config, ws: None }
    }

    fn stream(&mut self) -> Result<&mut WsStream> {
        self.ws
            .as_mut()
            .ok_or_else(|| Error::Connection("TTS source is not connected".into()))
    }
}

#[async_trait]
impl AudioSource for CartesiaSource {
    async fn connect(&mut self) -> Result<()> {
        let url = format!(
            "{}?api_key={}&version={}",
            self.config.websocket_url, self.config.api_key, API_VERSION
        );
        let (ws, _) = connect_async(&url)
            .await
            .map_err(|e| Error::Connection(format!("TTS handshake failed: {}", e)))?;
        info!("Connected to TTS provider at {}", self.config.websocket_url);
        self.ws = Some(ws);
        Ok(())
    }

    async fn submit_text(&mut self, text: &str) -> Result<()> {
        let request = SynthesisRequest {
            context_id: Uuid::new_v4().to_string(),
            model_id: &self.config.model,
            transcript: text,
            voice: VoiceSpec {
                mode: "id",
                id: &self.config.voice,
            },
            output_format: OutputFormat {
                container: "raw",
                encoding: "pcm_s16le",
                sample_rate: self.config.sample_rate,
            },
        };
        let frame = serde_json::to_string(&request)?;
        debug!("Submitting transcript ({} chars)", text.len());
        self.stream()?
            .send(Message::Text(frame))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn next_event(&mut self) -> Result<SourceEvent> {
        loop {
            let frame = match self.stream()?.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
                // Socket closed after the audio: clean end of stream.
                None => return Ok(SourceEvent::Finished),
            };
            match frame {
                Message::Binary(pcm) => return Ok(SourceEvent::Audio(Bytes::from(pcm))),
                Message::Text(text) => {
                    if let Some(event) = parse_text_frame(&text)? {
                        return Ok(event);
                    }
                }
                Message::Close(_) => return Ok(SourceEvent::Finished),
                // Pongs are queued automatically by the transport.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!("TTS socket close: {}", e);
            }
        }
    }
}

/// Decode a provider text frame into a source event.
///
/// Returns `Ok(None)` for frame types the pacing path does not care about
/// (timestamps, flush acks). An unparseable frame or bad base64 payload is a
/// [`Error::MalformedMessage`]; the caller logs it and keeps reading.
fn parse_text_frame(text: &str) -> Result<Option<SourceEvent>> {
    let message: ProviderMessage = serde_json::from_str(text)
        .map_err(|e| Error::MalformedMessage(format!("unparseable frame: {}", e)))?;
    match message.kind.as_str() {
        "chunk" => {
            let data = message
                .data
                .ok_or_else(|| Error::MalformedMessage("chunk frame without data".into()))?;
            let pcm = base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map_err(|e| Error::MalformedMessage(format!("bad base64 payload: {}", e)))?;
            Ok(Some(SourceEvent::Audio(Bytes::from(pcm))))
        }
        "done" => Ok(Some(SourceEvent::Finished)),
        "error" => Err(Error::WebSocket(format!(
            "provider error: {}",
            message.error.unwrap_or_else(|| "unspecified".into())
        ))),
        other => {
            warn!("Ignoring provider frame of type {:?}", other);
            Ok(None)
        }
    }
}
