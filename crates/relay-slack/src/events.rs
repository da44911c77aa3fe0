//! Events API payloads

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::{Result, SlackError};

static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"<@[A-Z0-9]+(?:\|[^>]*)?>[ \t]*").unwrap()
});

/// Outer envelope of an Events API request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Endpoint ownership check sent when the request URL is configured
    UrlVerification { challenge: String },

    EventCallback {
        event: Event,
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        team_id: Option<String>,
    },

    #[serde(other)]
    Unsupported,
}

impl EventPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| SlackError::Payload(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AppMention(MessageEvent),
    Message(MessageEvent),
    #[serde(other)]
    Other,
}

/// Fields shared by `app_mention` and `message` events
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    /// `im` for direct messages
    #[serde(default)]
    pub channel_type: Option<String>,
}

impl MessageEvent {
    /// Bot posts (our own replies included) and edits, joins and other
    /// subtyped messages are not questions
    pub fn is_actionable(&self) -> bool {
        self.bot_id.is_none() && self.subtype.is_none() && !self.channel.is_empty()
    }

    /// Thread the reply goes to
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    /// Channel messages that mention the bot also arrive as `app_mention`;
    /// plain `message` events are only answered in direct messages
    pub fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }

    pub fn in_thread(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|ts| ts != self.ts)
    }
}

/// Remove `<@U123>` mentions and surrounding whitespace
pub fn strip_mentions(text: &str) -> String {
    USER_MENTION.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_verification() {
        let payload = EventPayload::parse(
            br#"{"token": "t", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P", "type": "url_verification"}"#,
        )
        .unwrap();
        assert_eq!(
            payload,
            EventPayload::UrlVerification {
                challenge: "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P".into()
            }
        );
    }

    #[test]
    fn test_app_mention_in_thread() {
        let payload = EventPayload::parse(
            br#"{
                "type": "event_callback",
                "team_id": "T1",
                "event_id": "Ev1",
                "event": {
                    "type": "app_mention",
                    "user": "U1",
                    "text": "<@UBOT> what is on my calendar?",
                    "ts": "1700000001.000200",
                    "thread_ts": "1700000000.000100",
                    "channel": "C1",
                    "event_ts": "1700000001.000200"
                }
            }"#,
        )
        .unwrap();

        let EventPayload::EventCallback {
            event: Event::AppMention(event),
            event_id,
            ..
        } = payload
        else {
            panic!("expected app_mention");
        };
        assert_eq!(event_id.as_deref(), Some("Ev1"));
        assert!(event.is_actionable());
        assert!(event.in_thread());
        assert_eq!(event.reply_thread_ts(), "1700000000.000100");
        assert_eq!(strip_mentions(&event.text), "what is on my calendar?");
    }

    #[test]
    fn test_bot_and_subtype_messages_are_not_actionable() {
        let payload = EventPayload::parse(
            br#"{"type": "event_callback", "event": {"type": "message", "bot_id": "B1", "text": "hi", "channel": "C1", "ts": "1.0"}}"#,
        )
        .unwrap();
        let EventPayload::EventCallback {
            event: Event::Message(bot),
            ..
        } = payload
        else {
            panic!("expected message");
        };
        assert!(!bot.is_actionable());

        let edited = MessageEvent {
            subtype: Some("message_changed".into()),
            channel: "C1".into(),
            ..MessageEvent::default()
        };
        assert!(!edited.is_actionable());
    }

    #[test]
    fn test_direct_message() {
        let payload = EventPayload::parse(
            br#"{"type": "event_callback", "event": {"type": "message", "channel_type": "im", "user": "U1", "text": "hi", "channel": "D1", "ts": "1.0"}}"#,
        )
        .unwrap();
        let EventPayload::EventCallback {
            event: Event::Message(dm),
            ..
        } = payload
        else {
            panic!("expected message");
        };
        assert!(dm.is_actionable());
        assert!(dm.is_direct_message());
        assert!(!MessageEvent::default().is_direct_message());
    }

    #[test]
    fn test_top_level_message_replies_in_new_thread() {
        let event = MessageEvent {
            ts: "5.0".into(),
            channel: "C1".into(),
            ..MessageEvent::default()
        };
        assert!(!event.in_thread());
        assert_eq!(event.reply_thread_ts(), "5.0");
    }

    #[test]
    fn test_other_events_and_payloads() {
        let reaction = EventPayload::parse(
            br#"{"type": "event_callback", "event": {"type": "reaction_added", "user": "U1"}}"#,
        )
        .unwrap();
        assert!(matches!(
            reaction,
            EventPayload::EventCallback {
                event: Event::Other,
                ..
            }
        ));

        assert_eq!(
            EventPayload::parse(br#"{"type": "app_rate_limited"}"#).unwrap(),
            EventPayload::Unsupported
        );
        assert!(matches!(
            EventPayload::parse(b"not json"),
            Err(SlackError::Payload(_))
        ));
    }

    #[test]
    fn test_strip_mentions() {
        assert_eq!(strip_mentions("<@U123ABC>   hello <@U9|bob> there "), "hello there");
        assert_eq!(strip_mentions("<@U1>"), "");
        assert_eq!(strip_mentions("<@U1> line one\nline two"), "line one\nline two");
    }
}
