//! Keyword pre-filter
//!
//! Picks the single server whose keywords best match a query. It sits in
//! front of the registry; the orchestration loop never sees it.

use regex::Regex;
use relay_mcp::ToolSession;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

const STOP_WORDS: &[&str] = &["the", "and", "for", "with", "this", "that", "from", "to"];

static CASE_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[a-z]+|[A-Z][a-z]*").unwrap()
});

/// Keywords of one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeywords {
    pub server: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordRouter {
    servers: Vec<ServerKeywords>,
}

/// Append `word` lowercased unless already present
fn push_keyword(keywords: &mut Vec<String>, word: &str) {
    let word = word.trim().to_lowercase();
    if !word.is_empty() && !keywords.contains(&word) {
        keywords.push(word);
    }
}

fn tool_name_keywords(keywords: &mut Vec<String>, name: &str) {
    push_keyword(keywords, name);
    for part in name.split(['_', '-']) {
        push_keyword(keywords, part);
        for piece in CASE_PARTS.find_iter(part) {
            push_keyword(keywords, piece.as_str());
        }
    }
}

fn description_keywords(keywords: &mut Vec<String>, description: &str) {
    for word in description.split(|c: char| !c.is_alphanumeric()) {
        let lower = word.to_lowercase();
        if lower.chars().count() > 3 && !STOP_WORDS.contains(&lower.as_str()) {
            push_keyword(keywords, &lower);
        }
    }
}

impl KeywordRouter {
    /// Derive keywords for every session, in the given order
    ///
    /// A server whose tool listing fails keeps its name and configured
    /// keywords.
    pub async fn from_sessions(sessions: &[Arc<ToolSession>]) -> Self {
        let mut servers = Vec::with_capacity(sessions.len());

        for session in sessions {
            let mut keywords = Vec::new();
            push_keyword(&mut keywords, session.name());

            match session.list_tools().await {
                Ok(tools) => {
                    for tool in &tools {
                        tool_name_keywords(&mut keywords, &tool.name);
                        description_keywords(&mut keywords, tool.description());
                    }
                }
                Err(e) => {
                    warn!(server = session.name(), error = %e, "Could not list tools for routing");
                }
            }

            for keyword in session.keywords() {
                push_keyword(&mut keywords, keyword);
            }

            debug!(server = session.name(), keywords = keywords.len(), "Routing keywords derived");
            servers.push(ServerKeywords {
                server: session.name().to_string(),
                keywords,
            });
        }

        Self { servers }
    }

    pub fn from_keywords(servers: Vec<ServerKeywords>) -> Self {
        Self { servers }
    }

    pub fn servers(&self) -> &[ServerKeywords] {
        &self.servers
    }

    /// Server with the most keyword hits in `query`
    ///
    /// Ties go to the earlier server. `None` when no keyword matches.
    pub fn select(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();
        let mut best: Option<(&str, usize)> = None;

        for entry in &self.servers {
            let hits = entry
                .keywords
                .iter()
                .filter(|keyword| query.contains(keyword.as_str()))
                .count();
            if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
                best = Some((&entry.server, hits));
            }
        }

        if let Some((server, hits)) = best {
            debug!(server, hits, "Query routed");
        }
        best.map(|(server, _)| server)
    }
}
