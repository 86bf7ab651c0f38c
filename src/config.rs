use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bot_token: String,
    pub api_url: String,
    pub quotes_file: PathBuf,
    pub listen_addr: String,
}

/// Optional TOML overlay. Every field may be omitted.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    quotes_file: Option<PathBuf>,
    #[serde(default)]
    listen_addr: Option<String>,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_quotes_file() -> PathBuf {
    PathBuf::from("./samples.txt")
}

fn default_listen_addr() -> String {
    ":1323".to_string()
}

/// Values taken from command-line flags or their environment variables.
/// They win over the TOML file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bot_token: Option<String>,
    pub api_url: Option<String>,
    pub quotes_file: Option<PathBuf>,
    pub listen_addr: Option<String>,
}

impl Config {
    /// Load configuration from the optional TOML file, then apply overrides.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Some(content)
            }
            None => None,
        };
        Self::from_sources(file.as_deref(), overrides)
    }

    /// Merge defaults, TOML content and overrides, in increasing precedence.
    pub fn from_sources(toml_content: Option<&str>, overrides: Overrides) -> Result<Self> {
        let file: FileConfig = match toml_content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => FileConfig::default(),
        };

        // Empty values count as unset
        let non_empty = |v: Option<String>| v.filter(|v| !v.is_empty());

        let bot_token = non_empty(overrides.bot_token)
            .or(file.bot_token)
            .unwrap_or_default();
        if bot_token.is_empty() {
            anyhow::bail!("BOT_TOKEN cannot be empty!");
        }

        let api_url = non_empty(overrides.api_url)
            .or(file.api_url)
            .unwrap_or_else(default_api_url);

        Ok(Config {
            bot_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            quotes_file: overrides
                .quotes_file
                .filter(|p| !p.as_os_str().is_empty())
                .or(file.quotes_file)
                .unwrap_or_else(default_quotes_file),
            listen_addr: non_empty(overrides.listen_addr)
                .or(file.listen_addr)
                .unwrap_or_else(default_listen_addr),
        })
    }

    /// Bot API root for this bot, e.g. `https://api.telegram.org/bot<token>`.
    pub fn bot_url(&self) -> String {
        format!("{}/bot{}", self.api_url, self.bot_token)
    }

    pub fn send_message_url(&self) -> String {
        format!("{}/sendMessage", self.bot_url())
    }

    /// Socket address to bind. A bare `:PORT` listens on all interfaces.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }

    /// Token safe for logs: first four characters only.
    pub fn redacted_token(&self) -> String {
        let prefix: String = self.bot_token.chars().take(4).collect();
        format!("{prefix}…")
    }
}
