//! Events API webhook
//!
//! `POST /slack/events` verifies the request signature, answers the
//! `url_verification` handshake and hands accepted events to the
//! [`EventHandler`] without waiting for the answer.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::events::{Event, EventPayload};
use crate::handler::{EventHandler, Trigger};
use crate::verification::SignatureVerifier;

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
/// Present on redeliveries of an event we were too slow to acknowledge
const RETRY_HEADER: &str = "x-slack-retry-num";

#[derive(Clone)]
pub struct AppState {
    verifier: SignatureVerifier,
    handler: Arc<EventHandler>,
}

impl AppState {
    pub fn new(verifier: SignatureVerifier, handler: Arc<EventHandler>) -> Self {
        Self { verifier, handler }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Listening for Slack events");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn root() -> Json<Value> {
    Json(json!({"status": "ok", "service": "relay-slack"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn ignored() -> Response {
    Json(json!({"status": "ignored"})).into_response()
}

async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (Some(timestamp), Some(signature)) = (
        header(&headers, TIMESTAMP_HEADER),
        header(&headers, SIGNATURE_HEADER),
    ) else {
        warn!("Slack request without signature headers");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing signature headers"})),
        )
            .into_response();
    };

    if let Err(e) = state.verifier.verify(timestamp, signature, &body) {
        warn!(error = %e, "Rejected Slack request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid signature"})),
        )
            .into_response();
    }

    let payload = match EventPayload::parse(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Unreadable Slack payload");
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response();
        }
    };

    match payload {
        EventPayload::UrlVerification { challenge } => {
            info!("Answering url_verification");
            Json(json!({"challenge": challenge})).into_response()
        }
        EventPayload::EventCallback {
            event, event_id, ..
        } => {
            if let Some(retry) = header(&headers, RETRY_HEADER) {
                debug!(retry, event_id = ?event_id, "Ignoring Slack retry");
                return ignored();
            }

            let (event, trigger) = match event {
                Event::AppMention(event) if event.is_actionable() => (event, Trigger::Mention),
                Event::Message(event) if event.is_actionable() && event.is_direct_message() => {
                    (event, Trigger::Message)
                }
                _ => return ignored(),
            };

            info!(event_id = ?event_id, channel = %event.channel, "Accepted Slack event");
            state.handler.spawn(event, trigger);
            Json(json!({"status": "accepted"})).into_response()
        }
        EventPayload::Unsupported => ignored(),
    }
}
