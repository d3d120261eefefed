//! REST client for the Discord HTTP API.
//!
//! Only message creation is needed: alerts are posted to a single
//! channel with `POST /channels/{id}/messages`.

use std::time::Duration;

use serde::Deserialize;

/// Versioned REST base URL.
pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// Discord rejects message content longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// HTTP request timeout for a single API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client authenticated as the bot.
pub struct DiscordApi {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

/// The subset of a created message the monitor logs.
#[derive(Debug, Deserialize)]
pub struct CreatedMessage {
    pub id: String,
}

/// Errors from the Discord REST layer.
#[derive(Debug, thiserror::Error)]
pub enum DiscordApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The channel does not exist or the bot cannot see it.
    #[error("Channel {0} not found")]
    ChannelNotFound(u64),

    /// Discord returned another non-2xx status code.
    #[error("Discord API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl DiscordApi {
    /// * `api_url` - base URL, e.g. [`DEFAULT_API_URL`].
    /// * `token`   - bot token used in the `Authorization` header.
    pub fn new(api_url: String, token: String) -> Result<Self, DiscordApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, api_url, token))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, token: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Post a text message to a channel.
    ///
    /// Content beyond [`MAX_MESSAGE_CHARS`] is cut off. Any 2xx counts as
    /// posted; the created message is `None` if its body cannot be decoded.
    pub async fn create_message(
        &self,
        channel_id: u64,
        content: &str,
    ) -> Result<Option<CreatedMessage>, DiscordApiError> {
        let body = serde_json::json!({ "content": truncate(content) });

        let response = self
            .client
            .post(format!("{}/channels/{channel_id}/messages", self.api_url))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DiscordApiError::ChannelNotFound(channel_id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscordApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<CreatedMessage>().await {
            Ok(created) => Ok(Some(created)),
            Err(e) => {
                tracing::debug!(
                    channel_id,
                    error = %e,
                    "Message posted but response body could not be decoded",
                );
                Ok(None)
            }
        }
    }
}

fn truncate(content: &str) -> String {
    content.chars().take(MAX_MESSAGE_CHARS).collect()
}
