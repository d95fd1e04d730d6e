//! Chat webhook sender (Slack/Mattermost/Discord-style incoming hooks)

use std::sync::Arc;

use async_trait::async_trait;

use crate::io::HttpClient;
use crate::sender::Sender;

/// POSTs `{"text": message}` to an incoming-webhook URL
pub struct WebhookSender {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for WebhookSender {
    // the URL usually embeds the hook secret
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSender").finish_non_exhaustive()
    }
}

impl WebhookSender {
    pub fn new(url: &str, http: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }
}

#[async_trait]
impl Sender for WebhookSender {
    fn type_name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &str) -> crate::Result<()> {
        let body = serde_json::json!({ "text": message });
        let response = self.http.post_json(&self.url, &body).await?;

        if !response.is_success() {
            return Err(crate::WatchError::Sender(format!(
                "webhook returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Webhook notification delivered");
        Ok(())
    }
}
