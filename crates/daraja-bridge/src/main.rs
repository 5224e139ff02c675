//! Daraja bridge - streams TTS audio to a telephony endpoint at a fixed cadence
//!
//! ```text
//! daraja speak "hello world" [--config daraja.toml] [--voice alloy]
//! daraja demo
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod demo;
mod telephony;
mod tts;

use daraja_core::{AudioSink, AudioSource, BridgeConfig, PacingScheduler};
use demo::{SimulatedSink, SimulatedSource};
use telephony::TelephonySink;
use tts::CartesiaSource;

#[derive(Parser)]
#[command(
    name = "daraja",
    version,
    about = "Bridge streaming TTS output to a fixed-cadence telephony transport"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize text and stream it to the telephony endpoint
    Speak {
        /// Text to synthesize
        text: String,
        /// Voice id to synthesize with
        #[arg(long)]
        voice: Option<String>,
        /// PCM sample rate in Hz (8000 or 16000)
        #[arg(long)]
        sample_rate: Option<u32>,
        /// Outbound chunk duration in milliseconds
        #[arg(long)]
        chunk_ms: Option<u64>,
    },
    /// Replay a scripted utterance through simulated adapters
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daraja_bridge=debug,daraja_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Speak {
            text,
            voice,
            sample_rate,
            chunk_ms,
        } => {
            if let Some(voice) = voice {
                config.tts.voice = voice;
            }
            if let Some(rate) = sample_rate {
                config.tts.sample_rate = rate;
            }
            if let Some(ms) = chunk_ms {
                config.audio.chunk_duration_ms = ms;
            }
            let source = CartesiaSource::new(config.tts.clone());
            let sink = TelephonySink::new(config.telephony.clone(), config.tts.sample_rate);
            run(config, source, sink, &text).await
        }
        Command::Demo => {
            let text = "Hello, this is a demonstration of real-time audio pacing.";
            run(config, SimulatedSource::demo(), SimulatedSink::new(), text).await
        }
    }
}

/// Load layered configuration: TOML file, then DARAJA_* environment
/// overrides (e.g. DARAJA_TTS__API_KEY).
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BridgeConfig> {
    let mut builder = config::Config::builder();
    builder = match path {
        Some(path) => builder.add_source(config::File::from(path.as_path())),
        None => builder.add_source(config::File::with_name("daraja").required(false)),
    };
    builder = builder.add_source(config::Environment::with_prefix("DARAJA").separator("__"));
    let settings = builder.build().context("failed to load configuration")?;
    settings
        .try_deserialize::<BridgeConfig>()
        .context("invalid configuration")
}

async fn run<S, K>(config: BridgeConfig, source: S, sink: K, text: &str) -> anyhow::Result<()>
where
    S: AudioSource + 'static,
    K: AudioSink + 'static,
{
    let chunk_ms = config.audio.chunk_duration_ms;
    let mut scheduler = PacingScheduler::new(config, source, sink)?;
    scheduler.start(text).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received interrupt, stopping scheduler"),
        _ = drained(&scheduler, chunk_ms) => info!("Stream complete"),
    }
    scheduler.stop().await;

    let stats = scheduler.stats().await;
    info!(
        "Dispatched {} audio and {} silence chunks ({} underruns)",
        stats.chunks_sent, stats.silence_chunks_sent, stats.underruns
    );
    Ok(())
}

/// Resolves once the source has finished and the buffer has had time to
/// drain, plus a few ticks of trailing silence for a clean tail.
async fn drained<S, K>(scheduler: &PacingScheduler<S, K>, chunk_ms: u64)
where
    S: AudioSource + 'static,
    K: AudioSink + 'static,
{
    scheduler.stream_ended().await;
    let stats = scheduler.stats().await;
    let grace = stats.buffer.buffered_ms as u64 + chunk_ms * 4;
    tokio::time::sleep(Duration::from_millis(grace)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn empty_sources_yield_defaults() {
        let settings = config::Config::builder().build().unwrap();
        let bridge: BridgeConfig = settings.try_deserialize().unwrap();
        assert_eq!(bridge.tts.sample_rate, 8000);
        assert_eq!(bridge.audio.chunk_duration_ms, 60);
        assert_eq!(bridge.chunk_bytes(), 960);
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = r#"
            [tts]
            sample_rate = 16000
            voice = "nova"

            [audio]
            chunk_duration_ms = 20
            flush_partial_tail = true
        "#;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        let bridge: BridgeConfig = settings.try_deserialize().unwrap();
        assert_eq!(bridge.tts.sample_rate, 16000);
        assert_eq!(bridge.tts.voice, "nova");
        assert_eq!(bridge.audio.chunk_duration_ms, 20);
        assert!(bridge.audio.flush_partial_tail);
        assert_eq!(bridge.chunk_bytes(), 640);
    }

    #[test]
    fn cli_parses_speak_with_overrides() {
        let cli = Cli::parse_from([
            "daraja",
            "speak",
            "hello there",
            "--voice",
            "nova",
            "--chunk-ms",
            "20",
        ]);
        match cli.command {
            Command::Speak {
                text,
                voice,
                chunk_ms,
                ..
            } => {
                assert_eq!(text, "hello there");
                assert_eq!(voice.as_deref(), Some("nova"));
                assert_eq!(chunk_ms, Some(20));
            }
            Command::Demo => panic!("expected speak subcommand"),
        }
    }
}
