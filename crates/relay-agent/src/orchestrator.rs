//! The orchestration loop
//!
//! `prepare -> generate -> (done | dispatch tools -> generate)`, bounded by
//! a round limit. Each round pushes the assistant turn unchanged, dispatches
//! the extracted calls sequentially (first session exposing the tool wins)
//! and folds every result back before the next generation. The answer is
//! the text of all assistant turns joined with newlines; hitting the round
//! limit returns what has accumulated so far.

use relay_mcp::{ToolSession, find_tool_owner};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::adapter::AgentAdapter;
use crate::error::{AgentError, Result};

/// Default bound on generate/dispatch rounds per query
pub const MAX_DEPTH: usize = 5;

/// Per-query controls
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum number of rounds
    pub max_rounds: usize,
    /// Cancelling this token aborts the query at its next suspension point
    pub cancellation: CancellationToken,
    /// Point in time after which the query fails
    pub deadline: Option<Instant>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_rounds: MAX_DEPTH,
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }
}

impl QueryOptions {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Deadline `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Await `step` unless the query is cancelled or out of time first
    async fn guard<T, F>(&self, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(AgentError::Cancelled),
            () = deadline => Err(AgentError::DeadlineExceeded),
            result = step => result,
        }
    }
}

/// Answer `query` using `adapter` and the tools of `sessions`
pub async fn process_query<A>(
    adapter: &A,
    query: &str,
    sessions: &[Arc<ToolSession>],
    options: &QueryOptions,
) -> Result<String>
where
    A: AgentAdapter + ?Sized,
{
    let span = info_span!(
        "process_query",
        provider = adapter.provider(),
        query_id = %Uuid::new_v4()
    );

    run(adapter, query, sessions, options).instrument(span).await
}

async fn run<A>(
    adapter: &A,
    query: &str,
    sessions: &[Arc<ToolSession>],
    options: &QueryOptions,
) -> Result<String>
where
    A: AgentAdapter + ?Sized,
{
    let tools = options.guard(adapter.prepare_tools(sessions)).await?;
    info!(servers = sessions.len(), tools = tools.len(), "Processing query");

    let mut conversation = vec![adapter.user_message(query)];
    let mut texts: Vec<String> = Vec::new();
    let mut round = 0;

    while round < options.max_rounds {
        let generation = options
            .guard(adapter.generate(&conversation, &tools))
            .await?;

        texts.extend(
            generation
                .parts
                .iter()
                .filter_map(|part| adapter.part_text(part))
                .map(str::to_owned),
        );

        let calls = if generation.has_tool_call {
            adapter.extract_tool_calls(&generation.parts)
        } else {
            Vec::new()
        };
        conversation.push(adapter.assistant_message(generation.parts));

        if !generation.has_tool_call {
            debug!(round, "Model finished without tool calls");
            return Ok(texts.join("\n"));
        }

        if calls.is_empty() {
            warn!(round, "Response flagged a tool call but none could be extracted");
            return Ok(texts.join("\n"));
        }

        for call in &calls {
            let session = options
                .guard(async { Ok(find_tool_owner(sessions, &call.name).await) })
                .await?
                .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

            info!(tool = %call.name, server = session.name(), round, "Calling tool");
            let result = options
                .guard(async {
                    session
                        .call_tool(&call.name, call.args.clone())
                        .await
                        .map_err(AgentError::from)
                })
                .await?;

            if result.is_error() {
                warn!(tool = %call.name, "Tool reported an error result");
            }
            adapter.integrate_tool_result(&mut conversation, call, &result);
        }

        round += 1;
    }

    warn!(
        max_rounds = options.max_rounds,
        "Round limit reached, returning partial answer"
    );
    Ok(texts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Generation, ToolCall};
    use async_trait::async_trait;
    use relay_mcp::{MCPError, RetryPolicy, Tool, ToolResult, Transport};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted part of a fake assistant turn
    #[derive(Debug, Clone, PartialEq)]
    enum FakePart {
        Text(String),
        Call(String),
    }

    #[derive(Debug, Clone, PartialEq)]
    enum FakeMessage {
        User(String),
        Assistant(Vec<FakePart>),
        ToolResult { id: String, value: Value },
    }

    /// Adapter replaying one scripted response per round
    struct ScriptedAdapter {
        rounds: Mutex<Vec<(bool, Vec<FakePart>)>>,
        repeat_last: bool,
        generations: AtomicUsize,
        seen: Mutex<Vec<Vec<FakeMessage>>>,
        generate_delay: Option<Duration>,
    }

    impl ScriptedAdapter {
        fn new(rounds: Vec<(bool, Vec<FakePart>)>) -> Self {
            Self {
                rounds: Mutex::new(rounds.into_iter().rev().collect()),
                repeat_last: false,
                generations: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                generate_delay: None,
            }
        }

        /// Replays the same response forever
        fn forever(has_tool_call: bool, parts: Vec<FakePart>) -> Self {
            let mut adapter = Self::new(vec![(has_tool_call, parts)]);
            adapter.repeat_last = true;
            adapter
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.generate_delay = Some(delay);
            self
        }

        fn generations(&self) -> usize {
            self.generations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentAdapter for ScriptedAdapter {
        type Message = FakeMessage;
        type Tool = Tool;
        type Part = FakePart;
        type Response = ();

        fn provider(&self) -> &'static str {
            "scripted"
        }

        async fn prepare_tools(&self, sessions: &[Arc<ToolSession>]) -> Result<Vec<Tool>> {
            crate::adapter::collect_tools(sessions).await
        }

        fn user_message(&self, query: &str) -> FakeMessage {
            FakeMessage::User(query.to_string())
        }

        async fn generate(
            &self,
            conversation: &[FakeMessage],
            _tools: &[Tool],
        ) -> Result<Generation<(), FakePart>> {
            if let Some(delay) = self.generate_delay {
                tokio::time::sleep(delay).await;
            }
            self.generations.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(conversation.to_vec());

            let mut rounds = self.rounds.lock().unwrap();
            let (has_tool_call, parts) = if self.repeat_last {
                rounds.last().cloned().unwrap()
            } else {
                rounds.pop().unwrap_or((false, vec![]))
            };
            Ok(Generation {
                raw: (),
                has_tool_call,
                parts,
            })
        }

        fn assistant_message(&self, parts: Vec<FakePart>) -> FakeMessage {
            FakeMessage::Assistant(parts)
        }

        fn extract_tool_calls(&self, parts: &[FakePart]) -> Vec<ToolCall> {
            parts
                .iter()
                .filter_map(|part| match part {
                    FakePart::Call(name) => Some(ToolCall {
                        id: format!("id-{name}"),
                        name: name.clone(),
                        args: json!({}),
                    }),
                    FakePart::Text(_) => None,
                })
                .collect()
        }

        fn integrate_tool_result(
            &self,
            conversation: &mut Vec<FakeMessage>,
            call: &ToolCall,
            result: &ToolResult,
        ) {
            conversation.push(FakeMessage::ToolResult {
                id: call.id.clone(),
                value: result.normalized(),
            });
        }

        fn part_text<'a>(&self, part: &'a FakePart) -> Option<&'a str> {
            match part {
                FakePart::Text(text) => Some(text),
                FakePart::Call(_) => None,
            }
        }
    }

    /// Tool server fake that records calls
    struct FakeServer {
        tools: Vec<Tool>,
        calls: Mutex<Vec<String>>,
        failures_before_success: AtomicUsize,
    }

    impl FakeServer {
        fn new(tools: &[&str]) -> Self {
            Self {
                tools: tools
                    .iter()
                    .map(|t| Tool::new(*t, format!("{t} tool"), json!({"type": "object"})))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                failures_before_success: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeServer {
        async fn connect(&self) -> relay_mcp::Result<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        async fn close(&self) -> relay_mcp::Result<()> {
            Ok(())
        }
        async fn list_tools(&self) -> relay_mcp::Result<Vec<Tool>> {
            Ok(self.tools.clone())
        }
        async fn call_tool(&self, name: &str, _arguments: Value) -> relay_mcp::Result<ToolResult> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.failures_before_success.load(Ordering::SeqCst) > 0 {
                self.failures_before_success.fetch_sub(1, Ordering::SeqCst);
                return Err(MCPError::RequestFailed("transient".into()));
            }
            Ok(ToolResult::text(format!("{name} done")))
        }
    }

    async fn connected(name: &str, server: Arc<FakeServer>) -> Arc<ToolSession> {
        let session = Arc::new(
            ToolSession::with_transport(name, server)
                .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1))),
        );
        session.connect().await.unwrap();
        session
    }

    fn text(s: &str) -> FakePart {
        FakePart::Text(s.to_string())
    }

    fn call(s: &str) -> FakePart {
        FakePart::Call(s.to_string())
    }

    #[tokio::test]
    async fn test_no_tool_call_terminates_in_one_round() {
        let adapter = ScriptedAdapter::forever(false, vec![text("Just text.")]);

        let answer = process_query(&adapter, "hi", &[], &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(answer, "Just text.");
        assert_eq!(adapter.generations(), 1);
    }

    #[tokio::test]
    async fn test_round_bound_stops_after_max_depth() {
        let server = Arc::new(FakeServer::new(&["lookup"]));
        let sessions = vec![connected("a", Arc::clone(&server)).await];
        let adapter = ScriptedAdapter::forever(true, vec![text("again"), call("lookup")]);

        let answer = process_query(&adapter, "loop", &sessions, &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(adapter.generations(), MAX_DEPTH);
        assert_eq!(server.calls().len(), MAX_DEPTH);
        assert_eq!(answer, vec!["again"; MAX_DEPTH].join("\n"));
    }

    #[tokio::test]
    async fn test_malformed_directive_escape() {
        let server = Arc::new(FakeServer::new(&["lookup"]));
        let sessions = vec![connected("a", Arc::clone(&server)).await];
        // flagged as a tool call but carries no extractable directive
        let adapter = ScriptedAdapter::forever(true, vec![text("hmm")]);

        let answer = process_query(&adapter, "q", &sessions, &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(answer, "hmm");
        assert_eq!(adapter.generations(), 1);
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_resolution_dispatches_to_owner() {
        let a = Arc::new(FakeServer::new(&["search"]));
        let b = Arc::new(FakeServer::new(&["lookup"]));
        let sessions = vec![
            connected("a", Arc::clone(&a)).await,
            connected("b", Arc::clone(&b)).await,
        ];
        let adapter = ScriptedAdapter::new(vec![
            (true, vec![call("lookup")]),
            (false, vec![text("found it")]),
        ]);

        let answer = process_query(&adapter, "find", &sessions, &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(answer, "found it");
        assert!(a.calls().is_empty());
        assert_eq!(b.calls(), vec!["lookup"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let sessions = vec![connected("a", Arc::new(FakeServer::new(&["search"]))).await];
        let adapter = ScriptedAdapter::new(vec![(true, vec![call("missing")])]);

        let err = process_query(&adapter, "q", &sessions, &QueryOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ToolNotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_flatten_skips_structural_parts() {
        let sessions = vec![connected("a", Arc::new(FakeServer::new(&["lookup"]))).await];
        let adapter = ScriptedAdapter::new(vec![
            (true, vec![text("Hello"), call("lookup")]),
            (false, vec![text("World")]),
        ]);

        let answer = process_query(&adapter, "q", &sessions, &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(answer, "Hello\nWorld");
    }

    #[tokio::test]
    async fn test_conversation_order() {
        let sessions = vec![connected("a", Arc::new(FakeServer::new(&["one", "two"]))).await];
        let adapter = ScriptedAdapter::new(vec![
            (true, vec![call("one"), call("two")]),
            (false, vec![text("done")]),
        ]);

        process_query(&adapter, "q", &sessions, &QueryOptions::default())
            .await
            .unwrap();

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0], vec![FakeMessage::User("q".into())]);
        assert_eq!(
            seen[1],
            vec![
                FakeMessage::User("q".into()),
                FakeMessage::Assistant(vec![call("one"), call("two")]),
                FakeMessage::ToolResult {
                    id: "id-one".into(),
                    value: json!("one done")
                },
                FakeMessage::ToolResult {
                    id: "id-two".into(),
                    value: json!("two done")
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_transient_tool_failure_is_retried() {
        let server = Arc::new(FakeServer::new(&["lookup"]));
        server.failures_before_success.store(1, Ordering::SeqCst);
        let sessions = vec![connected("a", Arc::clone(&server)).await];
        let adapter = ScriptedAdapter::new(vec![
            (true, vec![call("lookup")]),
            (false, vec![text("ok")]),
        ]);

        let answer = process_query(&adapter, "q", &sessions, &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(answer, "ok");
        assert_eq!(server.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_exhaustion_is_fatal() {
        let server = Arc::new(FakeServer::new(&["lookup"]));
        server.failures_before_success.store(5, Ordering::SeqCst);
        let sessions = vec![connected("a", Arc::clone(&server)).await];
        let adapter = ScriptedAdapter::new(vec![(true, vec![call("lookup")])]);

        let err = process_query(&adapter, "q", &sessions, &QueryOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Mcp(MCPError::RequestFailed(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let adapter = ScriptedAdapter::forever(false, vec![text("never")]);
        let options = QueryOptions::default();
        options.cancellation.cancel();

        let err = process_query(&adapter, "q", &[], &options).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(adapter.generations(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_generation() {
        let adapter =
            ScriptedAdapter::forever(false, vec![text("late")]).with_delay(Duration::from_secs(30));
        let options = QueryOptions::default();
        let token = options.cancellation.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = process_query(&adapter, "q", &[], &options).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let adapter =
            ScriptedAdapter::forever(false, vec![text("late")]).with_delay(Duration::from_secs(30));
        let options = QueryOptions::default().with_timeout(Duration::from_millis(20));

        let err = process_query(&adapter, "q", &[], &options).await.unwrap_err();
        assert!(matches!(err, AgentError::DeadlineExceeded));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_custom_round_limit() {
        let sessions = vec![connected("a", Arc::new(FakeServer::new(&["lookup"]))).await];
        let adapter = ScriptedAdapter::forever(true, vec![call("lookup")]);
        let options = QueryOptions::default().with_max_rounds(2);

        let answer = process_query(&adapter, "q", &sessions, &options).await.unwrap();
        assert_eq!(answer, "");
        assert_eq!(adapter.generations(), 2);
    }
}
