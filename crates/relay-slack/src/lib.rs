//! Slack front end for mcp-relay
//!
//! Receives Events API webhooks, answers mentions and direct messages
//! through a [`relay_agent::QueryService`] and replies in the thread.

pub mod api;
pub mod error;
pub mod events;
pub mod handler;
pub mod markdown;
pub mod server;
pub mod verification;

pub use api::{PostMessage, SlackApi, SlackClient, ThreadMessage};
pub use error::{Result, SlackError};
pub use events::{Event, EventPayload, MessageEvent, strip_mentions};
pub use handler::{EventHandler, Trigger};
pub use markdown::to_mrkdwn;
pub use server::{AppState, router, serve};
pub use verification::SignatureVerifier;
