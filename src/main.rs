mod config;
mod dispatch;
mod error;
mod job;
mod llm;
mod logging;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::llm::{CompletionSettings, LlmClient};
use crate::logging::Stage;
use crate::platform::telegram::TelegramSender;

/// Directory holding `.env`, `config.json` and `bot.log`.
fn base_dir() -> PathBuf {
    std::env::var_os("INSPIREBOT_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    let base_dir = base_dir();
    let _log_guard = logging::init(&base_dir.join("bot.log"));

    // Load configuration
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| base_dir.join("config.json"));
    let env_file = base_dir.join(".env");

    info!(stage = %Stage::Config, "Loading configuration from: {}", settings_path.display());
    let config = Config::load(&settings_path, &env_file)
        .inspect_err(|e| error!(stage = %Stage::Config, "Fatal configuration error: {}", e))
        .with_context(|| format!("Failed to load config from {}", settings_path.display()))?;

    info!(stage = %Stage::Config, "Configuration loaded successfully");
    info!(stage = %Stage::Config, "  Provider: {}", config.provider_base_url);
    info!(stage = %Stage::Config, "  Model: {}", config.model_id);
    info!(stage = %Stage::Config, "  Recipients: {:?}", config.recipient_ids);

    let generator = LlmClient::new(CompletionSettings::from(&config))?;
    let sender = TelegramSender::new(
        &config.bot_token,
        config.request_timeout,
        config.telegram_api_url.as_deref(),
    )?;
    let dispatcher = Dispatcher::new(Arc::new(sender), config.max_parallel_sends);

    let summary = job::run(&config, &generator, &dispatcher)
        .await
        .context("No message generated, nothing was sent")?;

    info!(
        stage = %Stage::Finish,
        "Run {} complete: {} of {} recipients reached with \"{}\"",
        summary.run_id,
        summary.delivered(),
        summary.reports.len(),
        summary.message
    );

    Ok(())
}
