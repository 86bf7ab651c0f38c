mod bot;
mod config;
mod quotes;
mod signal;
mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::bot::AppState;
use crate::config::{Config, Overrides};
use crate::quotes::QuoteBook;
use crate::telegram::TelegramClient;

/// Telegram quote bot webhook server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging for this crate
    #[arg(long)]
    debug: bool,

    /// Emit log lines as JSON
    #[arg(long)]
    json: bool,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Telegram bot token (overrides config file)
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// File with one quote per line (overrides config file)
    #[arg(long, env = "QUOTES_FILE_URI")]
    quotes_file: Option<PathBuf>,

    /// Listen address, `:PORT` binds all interfaces (overrides config file)
    #[arg(long, env = "LISTEN_PORT")]
    listen_addr: Option<String>,

    /// Bot API root (overrides config file)
    #[arg(long, env = "TELEGRAM_API_URL")]
    api_url: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            bot_token: self.bot_token.clone(),
            api_url: self.api_url.clone(),
            quotes_file: self.quotes_file.clone(),
            listen_addr: self.listen_addr.clone(),
        }
    }
}

fn init_logging(args: &Args) {
    let default_directives = if args.debug {
        "info,quotebot=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);
    if args.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    debug!("Debug logging enabled.");

    // Fails before anything is bound when BOT_TOKEN is missing
    let config = Config::load(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;
    debug!(
        token = config.redacted_token().as_str(),
        api = config.api_url.as_str(),
        "Variables"
    );
    debug!("quotes file location: {}", config.quotes_file.display());

    let quotes = QuoteBook::load(&config.quotes_file).await?;

    let sender = Arc::new(TelegramClient::new(config.send_message_url()));
    let state = Arc::new(AppState::new(quotes, sender));

    info!("Bot is starting...");
    bot::serve(state, &config.bind_addr()).await?;

    Ok(())
}
