use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use exocortex_relay::api::{ApiState, RelayServer};
use exocortex_relay::{OllamaGenerator, RelayConfig, WhisperTranscriber, XttsSynthesizer};

/// ExoCortex - relay between a hardware trigger, companion clients, and a speech/LLM pipeline
#[derive(Parser)]
#[command(name = "exocortex", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "EXOCORTEX_PORT", default_value = "8010")]
    port: u16,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "EXOCORTEX_CONFIG")]
    config: Option<PathBuf>,

    /// OpenAI API key for Whisper transcription
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,exocortex_relay=info",
        1 => "info,exocortex_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RelayConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    let api_key = cli
        .openai_api_key
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required for transcription"))?;

    let transcriber = Arc::new(WhisperTranscriber::new(api_key, config.stt.model.clone())?);
    let generator = Arc::new(OllamaGenerator::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.preamble.clone(),
    ));
    let synthesizer = Arc::new(XttsSynthesizer::new(
        config.tts.base_url.clone(),
        config.tts.params.clone(),
    ));

    let state = Arc::new(ApiState::new(transcriber, generator, synthesizer));

    tracing::info!(
        port = cli.port,
        model = %config.llm.model,
        voice = %config.tts.params.speaker_wav,
        "starting exocortex relay"
    );

    RelayServer::new(state, cli.port).run().await?;

    Ok(())
}
