//! Slack Web API client
//!
//! Only the two methods the bot needs: `chat.postMessage` and
//! `conversations.replies`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{Result, SlackError};

const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Upper bound on thread messages pulled in as context
const THREAD_HISTORY_LIMIT: u32 = 100;

/// One message of a thread
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
}

/// A `chat.postMessage` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub channel: String,
    /// Reply inside this thread; top level when `None`
    pub thread_ts: Option<String>,
    /// mrkdwn text
    pub text: String,
}

impl PostMessage {
    pub fn in_thread(
        channel: impl Into<String>,
        thread_ts: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: Some(thread_ts.into()),
            text: text.into(),
        }
    }
}

/// The Web API calls the event handler makes
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(&self, message: PostMessage) -> Result<()>;

    /// Parent and replies of the thread rooted at `thread_ts`, oldest first
    async fn thread_messages(&self, channel: &str, thread_ts: &str) -> Result<Vec<ThreadMessage>>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<ThreadMessage>,
}

/// Bot-token Web API client
pub struct SlackClient {
    client: Client,
    bot_token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            bot_token: bot_token.into(),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
        })
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Send a request and unwrap Slack's `{ok, error}` envelope
    async fn call<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.bot_token).send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(SlackError::RateLimited(retry_after));
        }

        let body: Value = response.error_for_status()?.json().await?;
        let envelope: Envelope = serde_json::from_value(body.clone())
            .map_err(|e| SlackError::Api(format!("{method}: unexpected response: {e}")))?;

        if !envelope.ok {
            let error = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(if error == "ratelimited" {
                SlackError::RateLimited(None)
            } else {
                SlackError::Api(format!("{method}: {error}"))
            });
        }

        serde_json::from_value(body)
            .map_err(|e| SlackError::Api(format!("{method}: unexpected response: {e}")))
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    #[instrument(skip(self, message), fields(channel = %message.channel, chars = message.text.len()))]
    async fn post_message(&self, message: PostMessage) -> Result<()> {
        let mut body = json!({"channel": message.channel, "text": message.text, "mrkdwn": true});
        if let Some(ts) = message.thread_ts {
            body["thread_ts"] = json!(ts);
        }

        let request = self.client.post(self.url("chat.postMessage")).json(&body);
        let _: Value = self.call("chat.postMessage", request).await?;
        debug!("Message posted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn thread_messages(&self, channel: &str, thread_ts: &str) -> Result<Vec<ThreadMessage>> {
        let limit = THREAD_HISTORY_LIMIT.to_string();
        let request = self.client.get(self.url("conversations.replies")).query(&[
            ("channel", channel),
            ("ts", thread_ts),
            ("inclusive", "true"),
            ("limit", limit.as_str()),
        ]);

        let replies: RepliesResponse = self.call("conversations.replies", request).await?;
        debug!(messages = replies.messages.len(), "Thread fetched");
        Ok(replies.messages)
    }
}
