use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use tracing::{debug, error, info, warn};

use crate::quotes::QuoteBook;
use crate::signal;
use crate::telegram::{self, MessageSender};

/// Shared application state
pub struct AppState {
    pub quotes: QuoteBook,
    pub sender: Arc<dyn MessageSender>,
}

impl AppState {
    pub fn new(quotes: QuoteBook, sender: Arc<dyn MessageSender>) -> Self {
        Self { quotes, sender }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(webhook))
        .with_state(state)
}

/// Telegram treats any response as an acknowledgement, so failures are
/// logged and the caller always gets 200 with an empty body.
async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    handle_update(&state, &body).await;
    StatusCode::OK
}

/// Reply to one update with a random quote. Never fails; nothing is retried.
pub async fn handle_update(state: &AppState, body: &[u8]) {
    let update = match telegram::decode_update(body) {
        Ok(update) => update,
        Err(e) => {
            warn!("error parsing update: {}", e);
            return;
        }
    };

    let chat_id = update.message.chat.id;
    let text = update.message.text.unwrap_or_default();
    let seed = telegram::sanitize(&text);
    debug!(update_id = update.update_id, chat_id, seed, "update received");

    let quote = state.quotes.pick(seed);

    match state.sender.send_text(chat_id, quote).await {
        Ok(_) => info!(chat_id, "response sent"),
        Err(e) => error!(chat_id, "got error while sending data to telegram: {}", e),
    }
}

/// Bind the listener and serve webhooks until Ctrl-C or SIGTERM.
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Server started on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            signal::shutdown_signal().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{TelegramClient, TelegramError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_text(&self, chat_id: i64, text: &str) -> Result<String, TelegramError> {
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(r#"{"ok":true}"#.to_string())
        }
    }

    /// Client aimed at a port nothing listens on, so every send fails in transport.
    async fn unreachable_client() -> TelegramClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        TelegramClient::new(format!("http://{addr}/bottest/sendMessage"))
    }

    fn state_with(sender: Arc<dyn MessageSender>) -> Arc<AppState> {
        let quotes = QuoteBook::with_seed(["first quote", "second quote"], 1).unwrap();
        Arc::new(AppState::new(quotes, sender))
    }

    fn post_root(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_gets_quote_reply() {
        let sender = Arc::new(RecordingSender::default());
        let app = router(state_with(sender.clone()));

        let response = app
            .oneshot(post_root(
                r#"{"update_id":1,"message":{"text":"/start hello","chat":{"id":42}}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert!(["first quote", "second quote"].contains(&sent[0].1.as_str()));
    }

    #[tokio::test]
    async fn test_malformed_body_is_dropped_silently() {
        let sender = Arc::new(RecordingSender::default());
        let app = router(state_with(sender.clone()));

        let response = app.oneshot(post_root("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_without_message_is_dropped() {
        let sender = Arc::new(RecordingSender::default());
        let app = router(state_with(sender.clone()));

        let response = app
            .oneshot(post_root(r#"{"update_id":7,"edited_message":{}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_still_acknowledged() {
        let client = Arc::new(unreachable_client().await);
        assert!(matches!(
            client.send_text(1, "hi").await,
            Err(TelegramError::Send(_))
        ));
        let app = router(state_with(client));

        let response = app
            .oneshot(post_root(
                r#"{"update_id":3,"message":{"text":"hi","chat":{"id":1}}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_null_text_still_gets_reply() {
        let sender = Arc::new(RecordingSender::default());
        let app = router(state_with(sender.clone()));

        let response = app
            .oneshot(post_root(
                r#"{"update_id":1,"message":{"text":null,"chat":{"id":42}}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
    }

    #[tokio::test]
    async fn test_only_post_is_routed() {
        let app = router(state_with(Arc::new(RecordingSender::default())));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_handle_update_replies_per_update() {
        let sender = Arc::new(RecordingSender::default());
        let state = state_with(sender.clone());

        for chat_id in [10, 20, 30] {
            let body = format!(
                r#"{{"update_id":{chat_id},"message":{{"text":"/doyouknow","chat":{{"id":{chat_id}}}}}}}"#
            );
            handle_update(&state, body.as_bytes()).await;
        }

        let sent = sender.sent.lock().await;
        let chats: Vec<i64> = sent.iter().map(|(id, _)| *id).collect();
        assert_eq!(chats, vec![10, 20, 30]);
    }
}
