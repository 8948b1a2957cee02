// openrouter-proxy - local OpenAI-compatible proxy for OpenRouter
//
// Runs a small HTTP server on localhost that accepts OpenAI-style chat
// completion requests, authenticates them against the locally configured
// OpenRouter API key, and forwards them upstream. Responses come back either
// as buffered JSON or as a relayed SSE stream with strict OpenAI framing.
//
// Architecture:
// - Proxy server (axum): front-door routes and request handling
// - Translation: OpenAI request shape -> OpenRouter request shape
// - Upstream client (reqwest): the single outbound call path
// - Streaming: SSE relay with guaranteed [DONE] termination

mod cli;
mod config;
mod proxy;
mod settings;

use std::sync::Arc;

use anyhow::Result;
use config::{Config, LogRotation};
use proxy::upstream::OpenRouterClient;
use proxy::{ProxyServer, ProxyState};
use settings::{key_fingerprint, ConfigSettings, SettingsStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix for rotating log files
const LOG_FILE_PREFIX: &str = "openrouter-proxy.log";

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI subcommands (config management); exits early when one ran
    let Some(cli) = cli::handle_cli() else {
        return Ok(());
    };

    // Write a commented config template on first run so the options are
    // discoverable
    Config::ensure_config_exists();

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = Some(port);
    }

    // RUST_LOG takes precedence over the configured level
    let default_filter = format!("openrouter_proxy={}", config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // Set up file logging if enabled (non-blocking writer with rotation)
    // The guard must be kept alive for the duration of the program to ensure logs flush
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard> =
        if config.logging.file_enabled {
            match std::fs::create_dir_all(&config.logging.file_dir) {
                Err(e) => {
                    eprintln!(
                        "Warning: Could not create log directory {:?}: {}",
                        config.logging.file_dir, e
                    );
                    // Fall back to stdout-only logging
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(tracing_subscriber::fmt::layer())
                        .init();
                    None
                }
                Ok(()) => {
                    let file_appender = match config.logging.file_rotation {
                        LogRotation::Hourly => tracing_appender::rolling::hourly(
                            &config.logging.file_dir,
                            LOG_FILE_PREFIX,
                        ),
                        LogRotation::Daily => tracing_appender::rolling::daily(
                            &config.logging.file_dir,
                            LOG_FILE_PREFIX,
                        ),
                        LogRotation::Never => tracing_appender::rolling::never(
                            &config.logging.file_dir,
                            LOG_FILE_PREFIX,
                        ),
                    };

                    // Writes happen in a background thread; the file layer is
                    // JSON for structured log parsing
                    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                    tracing_subscriber::registry()
                        .with(filter)
                        .with(tracing_subscriber::fmt::layer())
                        .with(
                            tracing_subscriber::fmt::layer()
                                .json()
                                .with_writer(non_blocking)
                                .with_ansi(false),
                        )
                        .init();

                    Some(guard)
                }
            }
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        };

    tracing::info!("openrouter-proxy v{} starting", config::VERSION);

    let settings = Arc::new(ConfigSettings::from_config(&config));
    match settings.api_key() {
        Some(key) => {
            tracing::info!("API key configured ({})", key_fingerprint(&key));
        }
        None => {
            tracing::warn!(
                "No API key configured - requests will be rejected with 401. \
                 Set OPENROUTER_API_KEY or add api_key to the config file."
            );
        }
    }

    let upstream = OpenRouterClient::new(&config)?;
    let state = ProxyState::new(settings, upstream);

    let server = ProxyServer::new();
    let addr = server.start(&config, state).await?;

    println!("OpenRouter proxy listening on http://{}", addr);
    println!("Chat completions: http://{}/v1/chat/completions", addr);

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    server.stop().await;

    Ok(())
}
