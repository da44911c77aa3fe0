//! Command-line interface for mcp-relay
//!
//! Chats with a model that can call the tools of the MCP servers listed in
//! the config file.

mod repl;

use anyhow::Context;
use clap::Parser;
use relay_agent::{AdapterSettings, KeywordRouter, McpClient, create_agent};
use relay_mcp::ToolRegistry;
use relay_utils::{Settings, init_tracing, read_prompt};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::repl::{Repl, describe_error, print_servers};

#[derive(Parser, Debug)]
#[command(name = "relay-cli")]
#[command(about = "Chat with an LLM that can use MCP tool servers", long_about = None)]
#[command(version)]
struct Args {
    /// Model provider: anthropic or gemini (default: LLM_PROVIDER or anthropic)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model name override
    #[arg(short, long)]
    model: Option<String>,

    /// File holding the system prompt
    #[arg(long, value_name = "FILE")]
    system_prompt: Option<PathBuf>,

    /// MCP server config file (default: MCP_CONFIG or config.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Answer one query and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// List connected servers and their tools, then exit
    #[arg(long)]
    list_servers: bool,

    /// Send each query to the server whose keywords match it best
    #[arg(long)]
    auto_route: bool,

    /// Model rounds per query (default: MAX_ROUNDS or 5)
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Per-query time limit in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Args {
    fn adapter_settings(&self, settings: &Settings) -> anyhow::Result<AdapterSettings> {
        let mut adapter = AdapterSettings::default().with_max_tokens(settings.max_tokens);
        if let Some(model) = self.model.as_ref().or(settings.model.as_ref()) {
            adapter = adapter.with_model(model.clone());
        }

        let prompt = match &self.system_prompt {
            Some(path) => Some(read_prompt(path)?),
            None => settings.system_prompt()?,
        };
        if let Some(prompt) = prompt {
            adapter = adapter.with_system_prompt(prompt);
        }
        Ok(adapter)
    }

    fn max_rounds(&self, settings: &Settings) -> usize {
        self.max_rounds.unwrap_or(settings.max_rounds).max(1)
    }

    fn timeout(&self, settings: &Settings) -> Option<Duration> {
        self.timeout_secs
            .map(Duration::from_secs)
            .or(settings.query_timeout)
    }
}

async fn run(args: &Args, repl: &Repl) -> anyhow::Result<ExitCode> {
    if args.list_servers {
        print_servers(repl.client().registry()).await;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(query) = &args.query {
        return Ok(match repl.ask(None, query).await {
            Ok(answer) => {
                println!("{answer}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", describe_error(&e));
                ExitCode::FAILURE
            }
        });
    }

    repl.run().await?;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let settings = Settings::from_env().context("Invalid settings")?;
    let provider = args.provider.clone().unwrap_or_else(|| settings.provider.clone());

    // Missing API keys fail here, before any tool server is spawned
    let agent = create_agent(&provider, args.adapter_settings(&settings)?)
        .with_context(|| format!("Cannot use provider '{provider}'"))?;

    let config = args.config.clone().unwrap_or_else(|| settings.mcp_config.clone());
    let registry = ToolRegistry::from_file(&config)
        .with_context(|| format!("Failed to load MCP config {}", config.display()))?;
    let registry = Arc::new(registry);

    let summary = registry.connect_all().await;
    for (server, e) in &summary.failed {
        warn!(server = %server, error = %e, "MCP server unavailable");
    }
    info!(provider = %provider, servers = summary.connected.len(), "Ready");

    let mut client = McpClient::new(Arc::clone(&registry), agent).with_max_rounds(args.max_rounds(&settings));
    if let Some(timeout) = args.timeout(&settings) {
        client = client.with_timeout(timeout);
    }

    let mut repl = Repl::new(client);
    if args.auto_route {
        repl = repl.with_router(KeywordRouter::from_sessions(&registry.connected_sessions()).await);
    }

    let outcome = run(&args, &repl).await;

    if let Err(e) = repl.client().shutdown().await {
        error!(error = %e, "Failed to shut down MCP servers");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "relay-cli",
            "--provider",
            "gemini",
            "--config",
            "servers.json",
            "--auto-route",
            "--max-rounds",
            "3",
            "--timeout-secs",
            "30",
            "-q",
            "hello",
        ])
        .unwrap();

        let settings = Settings::default();
        assert_eq!(args.provider.as_deref(), Some("gemini"));
        assert_eq!(args.config, Some(PathBuf::from("servers.json")));
        assert!(args.auto_route);
        assert_eq!(args.max_rounds(&settings), 3);
        assert_eq!(args.timeout(&settings), Some(Duration::from_secs(30)));
        assert_eq!(args.query.as_deref(), Some("hello"));
    }

    #[test]
    fn test_settings_fill_missing_flags() {
        let args = Args::try_parse_from(["relay-cli"]).unwrap();
        let settings = Settings {
            max_rounds: 4,
            query_timeout: Some(Duration::from_secs(90)),
            ..Settings::default()
        };

        assert_eq!(args.max_rounds(&settings), 4);
        assert_eq!(args.timeout(&settings), Some(Duration::from_secs(90)));
        assert!(!args.list_servers);

        let adapter = args.adapter_settings(&settings).unwrap();
        assert_eq!(adapter.max_tokens, 1000);
        assert_eq!(adapter.model, None);
    }

    #[test]
    fn test_zero_rounds_is_raised_to_one() {
        let args = Args::try_parse_from(["relay-cli", "--max-rounds", "0"]).unwrap();
        assert_eq!(args.max_rounds(&Settings::default()), 1);
    }

    #[test]
    fn test_system_prompt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "  Be brief.\n").unwrap();

        let args = Args::try_parse_from(["relay-cli", "--system-prompt", path.to_str().unwrap()]).unwrap();
        let adapter = args.adapter_settings(&Settings::default()).unwrap();
        assert_eq!(adapter.system_prompt.as_deref(), Some("Be brief."));
    }
}
