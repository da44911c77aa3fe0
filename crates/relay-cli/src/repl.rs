//! Interactive chat loop

use relay_agent::{AgentError, KeywordRouter, McpClient};
use relay_mcp::ToolRegistry;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Quit,
    Servers,
    Empty,
    /// `name: query` naming a configured server
    Targeted { server: &'a str, query: &'a str },
    Query(&'a str),
}

impl<'a> Command<'a> {
    /// A `prefix:` only targets a server when `servers` knows the name;
    /// otherwise the whole line is the query
    pub fn parse(line: &'a str, servers: &[&str]) -> Self {
        let line = line.trim();
        match line {
            "" => return Self::Empty,
            "quit" | "exit" => return Self::Quit,
            "servers" => return Self::Servers,
            _ => {}
        }

        if let Some((prefix, rest)) = line.split_once(':') {
            let prefix = prefix.trim();
            let query = rest.trim();
            if !query.is_empty() && servers.contains(&prefix) {
                return Self::Targeted {
                    server: prefix,
                    query,
                };
            }
        }
        Self::Query(line)
    }
}

/// User-facing line for a failed query
pub fn describe_error(err: &AgentError) -> String {
    if err.is_retryable() {
        format!("Error (temporary, try again): {err}")
    } else {
        format!("Error: {err}")
    }
}

/// Connected servers and their tool names
pub async fn print_servers(registry: &ToolRegistry) {
    if registry.is_empty() {
        println!("No MCP servers configured.");
        return;
    }

    for session in registry.sessions() {
        if !session.is_connected() {
            println!("  {} (not connected)", session.name());
            continue;
        }
        match session.list_tools().await {
            Ok(tools) => {
                let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
                println!("  {}: {}", session.name(), names.join(", "));
            }
            Err(e) => println!("  {} (tools unavailable: {e})", session.name()),
        }
    }
}

pub struct Repl {
    client: McpClient,
    router: Option<KeywordRouter>,
    /// One query at a time
    gate: Mutex<()>,
}

impl Repl {
    pub fn new(client: McpClient) -> Self {
        Self {
            client,
            router: None,
            gate: Mutex::new(()),
        }
    }

    /// Route untargeted queries to the best keyword match
    pub fn with_router(mut self, router: KeywordRouter) -> Self {
        self.router = Some(router);
        self
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    /// Answer a free-form or targeted query
    pub async fn ask(&self, server: Option<&str>, query: &str) -> relay_agent::Result<String> {
        let _turn = self.gate.lock().await;

        let routed = server.or_else(|| self.router.as_ref().and_then(|router| router.select(query)));
        match routed {
            Some(server) => {
                debug!(server, "Query targeted");
                self.client.answer_on(server, query).await
            }
            None => self.client.answer(query).await,
        }
    }

    /// Read queries until `quit`, end of input or Ctrl-C
    pub async fn run(&self) -> anyhow::Result<()> {
        let server_names: Vec<String> = self
            .client
            .registry()
            .sessions()
            .iter()
            .map(|session| session.name().to_string())
            .collect();
        let server_names: Vec<&str> = server_names.iter().map(String::as_str).collect();

        println!("Type a question, 'servers' to list tools, or 'quit' to leave.");
        println!("Prefix a question with 'name:' to use a single server.\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else {
                println!();
                break;
            };

            let (server, query) = match Command::parse(&line, &server_names) {
                Command::Quit => break,
                Command::Empty => continue,
                Command::Servers => {
                    print_servers(self.client.registry()).await;
                    continue;
                }
                Command::Targeted { server, query } => (Some(server), query),
                Command::Query(query) => (None, query),
            };

            tokio::select! {
                answer = self.ask(server, query) => match answer {
                    Ok(answer) => println!("\n{answer}\n"),
                    Err(e) => eprintln!("\n{}\n", describe_error(&e)),
                },
                _ = tokio::signal::ctrl_c() => {
                    println!("\nQuery interrupted.");
                    break;
                }
            }
        }

        info!("Leaving interactive mode");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_mcp::MCPError;

    const SERVERS: &[&str] = &["weather", "calendar"];

    #[test]
    fn test_keywords() {
        assert_eq!(Command::parse("quit", SERVERS), Command::Quit);
        assert_eq!(Command::parse("  exit ", SERVERS), Command::Quit);
        assert_eq!(Command::parse("servers", SERVERS), Command::Servers);
        assert_eq!(Command::parse("   ", SERVERS), Command::Empty);
    }

    #[test]
    fn test_targeted_query() {
        assert_eq!(
            Command::parse("weather: rain in Oslo?", SERVERS),
            Command::Targeted {
                server: "weather",
                query: "rain in Oslo?"
            }
        );
    }

    #[test]
    fn test_colon_without_known_server_is_a_query() {
        assert_eq!(
            Command::parse("note: buy milk", SERVERS),
            Command::Query("note: buy milk")
        );
        assert_eq!(
            Command::parse("meet at 10:30", SERVERS),
            Command::Query("meet at 10:30")
        );
        assert_eq!(Command::parse("weather:", SERVERS), Command::Query("weather:"));
    }

    #[test]
    fn test_describe_error() {
        let temporary = describe_error(&AgentError::from(MCPError::ConnectionFailed("pipe".into())));
        assert!(temporary.starts_with("Error (temporary"));

        let fatal = describe_error(&AgentError::UnknownServer("nope".into()));
        assert_eq!(fatal, "Error: Unknown server: nope");
    }
}
