//! Telephony WebSocket sink
//!
//! Opens a socket to the telephony transport, announces the audio format in
//! a JSON start frame, then streams one binary frame per fixed-size chunk.

use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use daraja_core::{AudioSink, Error, Result, TelephonyConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start frame announcing stream parameters to the transport.
#[derive(Debug, Serialize)]
struct StartFrame<'a> {
    event: &'static str,
    api_key: &'a str,
    encoding: &'static str,
    sample_rate: u32,
}

pub struct TelephonySink {
    config: TelephonyConfig,
    sample_rate: u32,
    ws: Option<WsStream>,
}

impl TelephonySink {
    pub fn new(config: TelephonyConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            ws: None,
        }
    }

    fn stream(&mut self) -> Result<&mut WsStream> {
        self.ws
            .as_mut()
            .ok_or_else(|| Error::Connection("telephony sink is not connected".into()))
    }
}

#[async_trait]
impl AudioSink for TelephonySink {
    async fn connect(&mut self) -> Result<()> {
        let (ws, _) = connect_async(&self.config.websocket_url)
            .await
            .map_err(|e| Error::Connection(format!("telephony handshake failed: {}", e)))?;
        self.ws = Some(ws);

        let start = StartFrame {
            event: "start",
            api_key: &self.config.api_key,
            encoding: "pcm_s16le",
            sample_rate: self.sample_rate,
        };
        let frame = serde_json::to_string(&start)?;
        self.stream()?
            .send(Message::Text(frame))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        info!(
            "Connected to telephony transport at {}",
            self.config.websocket_url
        );
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.stream()?
            .send(Message::Binary(chunk.to_vec()))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!("Telephony socket close: {}", e);
            }
        }
    }
}
