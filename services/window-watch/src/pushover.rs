//! Pushover sender

use std::sync::Arc;

use async_trait::async_trait;

use crate::io::HttpClient;
use crate::sender::Sender;

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Delivers messages through the Pushover API
pub struct PushoverSender {
    api_token: String,
    user_key: String,
    title: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for PushoverSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverSender")
            .field("title", &self.title)
            .finish()
    }
}

impl PushoverSender {
    pub fn new(api_token: &str, user_key: &str, title: &str, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created PushoverSender with title '{}'", title);

        Self {
            api_token: api_token.to_string(),
            user_key: user_key.to_string(),
            title: title.to_string(),
            http,
        }
    }
}

#[async_trait]
impl Sender for PushoverSender {
    fn type_name(&self) -> &str {
        "pushover"
    }

    async fn send(&self, message: &str) -> crate::Result<()> {
        let params = [
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", self.title.as_str()),
            ("message", message),
        ];

        tracing::debug!("Sending Pushover notification: title='{}'", self.title);

        let response = self.http.post_form(PUSHOVER_API_URL, &params).await?;

        if response.status != 200 {
            return Err(crate::WatchError::Sender(format!(
                "Pushover API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Pushover notification sent successfully");
        Ok(())
    }
}
