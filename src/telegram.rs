use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const START_COMMAND: &str = "/start";
pub const PUNCH_COMMAND: &str = "/doyouknow";
pub const BOT_TAG: &str = "@I_can_has_quote_bot";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("could not decode incoming update: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("error sending message to chat: {0}")]
    Send(#[source] reqwest::Error),
    #[error("error reading Telegram response: {0}")]
    Read(#[source] reqwest::Error),
}

/// The subset of a Telegram update this bot reads.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Message,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Message {
    /// Absent or null for non-text messages such as stickers
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

pub fn decode_update(body: &[u8]) -> Result<Update, TelegramError> {
    Ok(serde_json::from_slice(body)?)
}

/// Strip the known command prefixes and the bot mention, each at most once,
/// in that order.
pub fn sanitize(text: &str) -> &str {
    let text = text.strip_prefix(START_COMMAND).unwrap_or(text);
    let text = text.strip_prefix(PUNCH_COMMAND).unwrap_or(text);
    text.strip_prefix(BOT_TAG).unwrap_or(text)
}

/// Delivers a text reply to a chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Returns the raw response body.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<String, TelegramError>;
}

/// Bot API client posting `sendMessage` as a form.
pub struct TelegramClient {
    client: reqwest::Client,
    send_message_url: String,
}

impl TelegramClient {
    pub fn new(send_message_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            send_message_url,
        }
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<String, TelegramError> {
        debug!("Sending {:?} to chat_id: {}", text, chat_id);

        let response = self
            .client
            .post(&self.send_message_url)
            .form(&[("chat_id", chat_id.to_string()), ("text", text.to_string())])
            .send()
            .await
            .map_err(TelegramError::Send)?;

        // The body is returned whatever the status
        let status = response.status();
        let body = response.text().await.map_err(TelegramError::Read)?;
        if !status.is_success() {
            warn!(%status, response = body.as_str(), "Telegram rejected sendMessage");
        }
        debug!(response = body.as_str(), "telegram response");

        Ok(body)
    }
}
