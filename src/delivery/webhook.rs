use super::{DeliveryError, DeliveryMode, DeliveryOutcome, Notifier};
use crate::feed::FeedEntry;
use crate::util::validate_endpoint;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

/// Webhook `content` fields longer than this are rejected by the destination.
pub const MAX_CONTENT_CHARS: usize = 2000;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Renders the notification text for an entry.
pub fn format_message(entry: &FeedEntry) -> String {
    let message = format!(
        "📰 **From RSS Feed**\nTitle: {}\nLink: {}",
        entry.title,
        entry.display_link()
    );

    if message.chars().count() <= MAX_CONTENT_CHARS {
        return message;
    }

    let mut truncated: String = message.chars().take(MAX_CONTENT_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

/// Posts `{"content": ...}` to a webhook URL, or records previews in dry-run.
///
/// The destination URL embeds the webhook token, so it is kept as a secret and
/// never logged.
pub struct WebhookSink {
    client: reqwest::Client,
    destination: Option<SecretString>,
    timeout: Duration,
    previews: Mutex<Vec<FeedEntry>>,
}

impl WebhookSink {
    pub fn live(client: reqwest::Client, destination: SecretString) -> Self {
        Self {
            client,
            destination: Some(destination),
            timeout: DEFAULT_TIMEOUT,
            previews: Mutex::new(Vec::new()),
        }
    }

    /// A sink with no destination. Live deliveries fail permanently.
    pub fn preview_only() -> Self {
        Self {
            client: reqwest::Client::new(),
            destination: None,
            timeout: DEFAULT_TIMEOUT,
            previews: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Entries recorded while in dry-run mode, in delivery order.
    pub fn previews(&self) -> Vec<FeedEntry> {
        self.previews
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record_preview(&self, entry: &FeedEntry) {
        let mut previews = self
            .previews
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        previews.push(entry.clone());
    }

    async fn post(&self, entry: &FeedEntry) -> Result<(), DeliveryError> {
        let destination = self
            .destination
            .as_ref()
            .ok_or(DeliveryError::MissingDestination)?;

        let url = validate_endpoint(destination.expose_secret())
            .map_err(|e| DeliveryError::InvalidDestination(e.to_string()))?;

        let content = format_message(entry);
        let request = self
            .client
            .post(url)
            .json(&WebhookPayload { content: &content });

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| DeliveryError::Timeout)?
            .map_err(DeliveryError::Network)?;

        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field(
                "destination",
                &self.destination.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Notifier for WebhookSink {
    async fn deliver(&self, entry: &FeedEntry, mode: DeliveryMode) -> DeliveryOutcome {
        if mode == DeliveryMode::DryRun {
            tracing::info!(title = %entry.title, link = %entry.display_link(), "Dry run: not sending");
            self.record_preview(entry);
            return DeliveryOutcome::Delivered;
        }

        let outcome = DeliveryOutcome::from_result(self.post(entry).await);
        match &outcome {
            DeliveryOutcome::Delivered => {
                tracing::info!(id = %entry.id, title = %entry.title, "Delivered entry");
            }
            DeliveryOutcome::TransientFailure(e) => {
                tracing::warn!(id = %entry.id, error = %e, "Transient delivery failure");
            }
            DeliveryOutcome::PermanentFailure(e) => {
                tracing::error!(id = %entry.id, error = %e, "Permanent delivery failure");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(title: &str) -> FeedEntry {
        FeedEntry {
            id: "https://example.com/post".to_string(),
            title: title.to_string(),
            link: Some("https://example.com/post".to_string()),
            published_order: 0,
        }
    }

    fn sink_for(server: &MockServer) -> WebhookSink {
        WebhookSink::live(
            reqwest::Client::new(),
            SecretString::from(format!("{}/hook", server.uri())),
        )
    }

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message(&entry("Hello")),
            "📰 **From RSS Feed**\nTitle: Hello\nLink: https://example.com/post"
        );
    }

    #[test]
    fn test_format_message_truncates_long_titles() {
        let message = format_message(&entry(&"x".repeat(5000)));
        assert_eq!(message.chars().count(), MAX_CONTENT_CHARS);
        assert!(message.ends_with('…'));
    }

    #[tokio::test]
    async fn test_dry_run_records_and_sends_nothing() {
        let sink = WebhookSink::preview_only();
        let outcome = sink.deliver(&entry("Preview"), DeliveryMode::DryRun).await;
        assert!(outcome.is_delivered());
        assert_eq!(sink.previews().len(), 1);
        assert_eq!(sink.previews()[0].title, "Preview");
    }

    #[tokio::test]
    async fn test_dry_run_never_posts_even_with_destination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        let outcome = sink.deliver(&entry("Preview"), DeliveryMode::DryRun).await;
        assert!(outcome.is_delivered());
        assert_eq!(sink.previews().len(), 1);
    }

    #[tokio::test]
    async fn test_live_without_destination_is_permanent() {
        let outcome = WebhookSink::preview_only()
            .deliver(&entry("Hello"), DeliveryMode::Live)
            .await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::PermanentFailure(DeliveryError::MissingDestination)
        ));
    }

    #[tokio::test]
    async fn test_live_posts_content_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({
                "content": "📰 **From RSS Feed**\nTitle: Hello\nLink: https://example.com/post"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = sink_for(&server).deliver(&entry("Hello"), DeliveryMode::Live).await;
        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = sink_for(&server).deliver(&entry("Hello"), DeliveryMode::Live).await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::TransientFailure(DeliveryError::HttpStatus(503))
        ));
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = sink_for(&server).deliver(&entry("Hello"), DeliveryMode::Live).await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::PermanentFailure(DeliveryError::HttpStatus(404))
        ));
    }

    #[tokio::test]
    async fn test_malformed_destination_is_permanent() {
        let sink = WebhookSink::live(
            reqwest::Client::new(),
            SecretString::from("not a url".to_string()),
        );
        let outcome = sink.deliver(&entry("Hello"), DeliveryMode::Live).await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::PermanentFailure(DeliveryError::InvalidDestination(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_destination_times_out_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let sink = sink_for(&server).with_timeout(Duration::from_millis(100));
        let outcome = sink.deliver(&entry("Hello"), DeliveryMode::Live).await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::TransientFailure(DeliveryError::Timeout)
        ));
    }

    #[test]
    fn test_debug_redacts_destination() {
        let sink = WebhookSink::live(
            reqwest::Client::new(),
            SecretString::from("https://discord.com/api/webhooks/1/secret-token".to_string()),
        );
        let debug = format!("{:?}", sink);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
