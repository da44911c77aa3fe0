//! Event handling
//!
//! Each accepted event becomes its own task: build the prompt, ask the
//! [`QueryService`], post the answer (or an apology) back into the thread.

use relay_agent::{AgentError, QueryService};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::api::{PostMessage, SlackApi, ThreadMessage};
use crate::error::Result;
use crate::events::{MessageEvent, strip_mentions};
use crate::markdown::to_mrkdwn;

const THREAD_FETCH_APOLOGY: &str = ":warning: Sorry, I couldn't read this thread. Please try again.";

/// How the bot was addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Mention,
    Message,
}

pub struct EventHandler {
    service: Arc<dyn QueryService>,
    slack: Arc<dyn SlackApi>,
}

/// Reply text for a failed query
fn apology(err: &AgentError) -> String {
    if err.is_retryable() {
        ":warning: Sorry, I couldn't finish that just now. Please try again in a moment.".to_string()
    } else {
        format!(":warning: Sorry, something went wrong while answering: {err}")
    }
}

/// Thread as `user: text` lines followed by a metadata line
fn thread_prompt(messages: &[ThreadMessage], event: &MessageEvent) -> String {
    let lines: Vec<String> = messages
        .iter()
        .map(|message| {
            let author = message
                .user
                .as_deref()
                .or(message.bot_id.as_deref())
                .unwrap_or("unknown");
            format!("{author}: {}", strip_mentions(&message.text))
        })
        .collect();

    let metadata = json!({
        "channel": event.channel,
        "thread_ts": event.reply_thread_ts(),
        "user": event.user,
    });

    format!("{}\n\n{metadata}", lines.join("\n"))
}

impl EventHandler {
    pub fn new(service: Arc<dyn QueryService>, slack: Arc<dyn SlackApi>) -> Self {
        Self { service, slack }
    }

    /// Handle `event` on its own task
    pub fn spawn(self: &Arc<Self>, event: MessageEvent, trigger: Trigger) -> JoinHandle<()> {
        let handler = Arc::clone(self);
        let span = info_span!(
            "slack_event",
            channel = %event.channel,
            ts = %event.ts,
            trigger = ?trigger
        );

        tokio::spawn(
            async move {
                if let Err(e) = handler.handle(&event, trigger).await {
                    error!(error = %e, "Failed to reply to Slack event");
                }
            }
            .instrument(span),
        )
    }

    /// Answer one event in its thread
    pub async fn handle(&self, event: &MessageEvent, trigger: Trigger) -> Result<()> {
        let thread_ts = event.reply_thread_ts();
        let question = strip_mentions(&event.text);
        if question.is_empty() {
            info!("Ignoring event without a question");
            return Ok(());
        }

        let prompt = if trigger == Trigger::Mention && event.in_thread() {
            match self.slack.thread_messages(&event.channel, thread_ts).await {
                Ok(messages) => thread_prompt(&messages, event),
                Err(e) => {
                    warn!(error = %e, "Failed to fetch thread replies");
                    return self
                        .slack
                        .post_message(PostMessage::in_thread(
                            &event.channel,
                            thread_ts,
                            THREAD_FETCH_APOLOGY,
                        ))
                        .await;
                }
            }
        } else {
            question
        };

        let reply = match self.service.answer(&prompt).await {
            Ok(answer) => {
                info!(chars = answer.len(), "Query answered");
                to_mrkdwn(&answer)
            }
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "Query failed");
                apology(&e)
            }
        };

        self.slack
            .post_message(PostMessage::in_thread(&event.channel, thread_ts, reply))
            .await
    }
}
