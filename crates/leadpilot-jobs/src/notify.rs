//! Operator notifications via a Slack-compatible incoming webhook.

use std::time::Duration;

use async_trait::async_trait;
use leadpilot_core::config::NotifyConfig;
use leadpilot_core::traits::NotificationSink;

/// Posts `{"text": message}` to the configured webhook. Without a URL every
/// message is skipped. Send failures are logged, never returned.
pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            webhook_url: config
                .slack_webhook_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn notify(&self, message: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::debug!("Slack webhook not configured, skipping notification");
            return;
        };

        let result = self
            .client
            .post(url)
            .json(&serde_json::json!({ "text": message }))
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("✅ Slack notification sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!("⚠️ Slack webhook error {status}: {body}");
            }
            Err(e) => tracing::warn!("⚠️ Failed to send Slack notification: {e}"),
        }
    }
}
