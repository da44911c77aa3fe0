//! Slack bot server
//!
//! Serves the Events API webhook and answers mentions with the tools of the
//! MCP servers listed in the config file.
//!
//! # Usage
//!
//! ```bash
//! export SLACK_BOT_TOKEN="xoxb-..."
//! export SLACK_SIGNING_SECRET="..."
//! export ANTHROPIC_API_KEY="..."
//!
//! cargo run --bin relay-slack -p relay-slack
//! ```

use anyhow::Context;
use relay_agent::{AdapterSettings, McpClient, create_agent};
use relay_mcp::ToolRegistry;
use relay_slack::{AppState, EventHandler, SignatureVerifier, SlackClient, router, serve};
use relay_utils::{Settings, init_tracing};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn adapter_settings(settings: &Settings) -> anyhow::Result<AdapterSettings> {
    let mut adapter = AdapterSettings::default().with_max_tokens(settings.max_tokens);
    if let Some(model) = &settings.model {
        adapter = adapter.with_model(model.clone());
    }
    if let Some(prompt) = settings.system_prompt()? {
        adapter = adapter.with_system_prompt(prompt);
    }
    Ok(adapter)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(false);

    let settings = Settings::from_env().context("Invalid settings")?;
    let (bot_token, signing_secret) = settings.slack.credentials()?;

    // Provider problems surface before any tool server is spawned
    let agent = create_agent(&settings.provider, adapter_settings(&settings)?)
        .context("Failed to create the model agent")?;

    let registry = ToolRegistry::from_file(&settings.mcp_config).with_context(|| {
        format!("Failed to load MCP config {}", settings.mcp_config.display())
    })?;
    let registry = Arc::new(registry);

    let summary = registry.connect_all().await;
    for (server, e) in &summary.failed {
        warn!(server = %server, error = %e, "MCP server unavailable");
    }

    let mut client = McpClient::new(Arc::clone(&registry), agent).with_max_rounds(settings.max_rounds);
    if let Some(timeout) = settings.query_timeout {
        client = client.with_timeout(timeout);
    }
    let client = Arc::new(client);

    let served = async {
        let slack = SlackClient::new(bot_token)?;
        let handler = Arc::new(EventHandler::new(client.clone(), Arc::new(slack)));
        let state = AppState::new(SignatureVerifier::new(signing_secret), handler);

        let listener = TcpListener::bind(&settings.slack.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", settings.slack.bind_addr))?;
        info!(provider = client.provider(), servers = summary.connected.len(), "Slack bot ready");

        serve(listener, router(state), shutdown_signal()).await?;
        anyhow::Ok(())
    }
    .await;

    if let Err(e) = client.shutdown().await {
        error!(error = %e, "Failed to shut down MCP servers");
    }
    served
}
