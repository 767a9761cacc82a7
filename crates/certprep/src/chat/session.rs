//! The conversation loop: history, tool execution and the follow-up answer.

use std::{io::Write, time::Instant};

use certprep_runtime::{QuestionClient, TOOL_RANDOM_QUESTION, TOOL_SEARCH_QUESTION};
use console::style;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use super::completion::{ChatError, ChatMessage, CompletionClient, ToolCall};

pub const SYSTEM_PROMPT: &str = "You are an AI assistant helping users prepare for a tech certification. \
When a user asks for a practice question, use the 'get_random_question' tool. \
When a user asks a specific question, use the 'get_question_and_answer' tool to find relevant information. \
If you use 'get_random_question', present ONLY the question to the user first. \
Then, in subsequent turns, you can discuss the answer if the user asks or if it feels natural. \
If you use 'get_question_and_answer', use the retrieved information to answer the user's question comprehensively.";

/// Function definitions offered to the model.
pub fn tool_schema() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": TOOL_RANDOM_QUESTION,
                "description": "Get a random practice question and its answer from the certification question database.",
                "parameters": { "type": "object", "properties": {} }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": TOOL_SEARCH_QUESTION,
                "description": "Search for a question in the database based on input text and return the question and its answer.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": "The text to search for in the questions."
                        }
                    },
                    "required": ["text"]
                }
            }
        }),
    ]
}

/// True for the words that end the conversation.
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

/// A running conversation with the model.
pub struct ChatSession {
    completion: CompletionClient,
    tools: QuestionClient,
    schema: Vec<Value>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(completion: CompletionClient, tools: QuestionClient) -> Self {
        Self {
            completion,
            tools,
            schema: tool_schema(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Answers one user message, streaming text to `out`.
    ///
    /// If the model asks for tools, they are run and a second completion
    /// (without tools) produces the final answer. A failed turn leaves the
    /// history as it was before the turn.
    ///
    /// # Errors
    ///
    /// Returns the first [`ChatError`] from either completion. Tool failures
    /// are not errors; they are passed to the model as `{"error": ...}`.
    pub async fn turn<W: Write>(&mut self, input: &str, out: &mut W) -> Result<(), ChatError> {
        let checkpoint = self.messages.len();
        let result = self.exchange(input, out).await;
        if result.is_err() {
            self.messages.truncate(checkpoint);
        }
        result
    }

    async fn exchange<W: Write>(&mut self, input: &str, out: &mut W) -> Result<(), ChatError> {
        self.messages.push(ChatMessage::user(input));

        write!(out, "{} ", style("Assistant:").cyan().bold())?;
        out.flush()?;
        let reply = self
            .completion
            .stream(&self.messages, Some(self.schema.as_slice()), |text: &str| {
                out.write_all(text.as_bytes())?;
                out.flush()
            })
            .await?;
        writeln!(out)?;

        if reply.tool_calls.is_empty() {
            self.messages.push(ChatMessage::assistant(reply.content));
            return Ok(());
        }

        self.messages.push(ChatMessage::Assistant {
            content: reply.content,
            tool_calls: reply.tool_calls.clone(),
        });
        for call in &reply.tool_calls {
            let result = self.execute(call, out).await?;
            self.messages.push(ChatMessage::Tool {
                tool_call_id: call.id.clone(),
                name: call.function.name.clone(),
                content: result.to_string(),
            });
        }

        write!(out, "\n{} ", style("Assistant (after tools):").cyan().bold())?;
        out.flush()?;
        let follow_up = self
            .completion
            .stream(&self.messages, None, |text: &str| {
                out.write_all(text.as_bytes())?;
                out.flush()
            })
            .await?;
        writeln!(out)?;
        self.messages.push(ChatMessage::assistant(follow_up.content));
        Ok(())
    }

    /// Runs one tool call and returns the payload handed back to the model.
    async fn execute<W: Write>(&self, call: &ToolCall, out: &mut W) -> Result<Value, ChatError> {
        let name = call.function.name.as_str();
        let result = match parse_arguments(&call.function.arguments) {
            Err(message) => {
                warn!(tool = name, error = %message, "Unparsable tool arguments");
                json!({ "error": message })
            }
            Ok(args) => {
                writeln!(
                    out,
                    "{} Executing tool: {name} with args: {}",
                    style("[tool]").dim(),
                    Value::Object(args.clone())
                )?;
                self.dispatch(name, &args).await
            }
        };
        writeln!(out, "{} Tool {name} result: {result}", style("[tool]").dim())?;
        Ok(result)
    }

    async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> Value {
        let outcome = match name {
            TOOL_RANDOM_QUESTION => self.tools.random_question().await,
            TOOL_SEARCH_QUESTION => {
                let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
                self.tools.search_question(text).await
            }
            other => {
                warn!(tool = other, "Model requested unknown tool");
                return json!({ "error": format!("Unknown tool: {other}") });
            }
        };
        outcome.unwrap_or_else(|err| {
            warn!(tool = name, error = %err, "Tool call failed");
            json!({ "error": err.to_string() })
        })
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Invalid arguments: expected a JSON object".to_string()),
        Err(err) => Err(format!("Invalid arguments: {err}")),
    }
}

/// Reads user lines from `input` until `quit`, `exit` or end of input.
///
/// Turn failures are reported to `out` and the loop continues.
///
/// # Errors
///
/// Fails only when reading input or writing output fails.
pub async fn run_loop<R, W>(session: &mut ChatSession, input: R, out: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "\n{} ", style("User:").green().bold())?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out, "\nEnding conversation")?;
            break;
        };
        if is_exit_command(&line) {
            writeln!(out, "Ending conversation")?;
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let started = Instant::now();
        match session.turn(line.trim(), out).await {
            Ok(()) => {
                let elapsed = started.elapsed().as_secs_f64();
                info!(elapsed_secs = elapsed, "Chat turn finished");
                writeln!(out, "\n[Processing time: {elapsed:.2} seconds]")?;
            }
            Err(err) => {
                warn!(error = %err, "Chat turn failed");
                writeln!(out, "\n{} {err}", style("error:").red().bold())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use certprep_core::{Corpus, EmbedError, EmbedFuture, Embedder, QuestionBank, QuestionRecord};
    use certprep_runtime::McpService;
    use tokio::sync::oneshot;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    use super::*;
    use crate::chat::completion::FunctionCall;

    struct FixedEmbedder(HashMap<&'static str, Vec<f32>>);

    impl Embedder for FixedEmbedder {
        fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
            let result = self
                .0
                .get(text)
                .cloned()
                .ok_or_else(|| EmbedError::Transport("unknown text".to_string()));
            Box::pin(async move { result })
        }
    }

    async fn spawn_tool_server() -> (String, oneshot::Sender<()>) {
        let corpus = Corpus::from_records(vec![
            QuestionRecord::new(1, "What is a pod?", "The smallest deployable unit."),
            QuestionRecord::new(2, "What is kube-proxy?", "A per-node network proxy."),
        ])
        .expect("unique ids");
        let embedder = FixedEmbedder(HashMap::from([
            ("What is a pod?", vec![1.0, 0.0]),
            ("What is kube-proxy?", vec![0.0, 1.0]),
            ("explain pods", vec![0.9, 0.1]),
        ]));
        let (bank, _) = QuestionBank::build(corpus, Arc::new(embedder), 1).await;

        let service = McpService::new(Arc::new(bank)).streamable_http_service();
        let router = axum::Router::new().nest_service("/mcp", service);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        (format!("http://{addr}/mcp"), shutdown_tx)
    }

    /// Session whose tool server address has nothing listening.
    fn offline_session(server: &MockServer) -> ChatSession {
        ChatSession::new(completion(server), QuestionClient::new("http://127.0.0.1:9/mcp"))
    }

    fn sse(events: &[Value]) -> String {
        events
            .iter()
            .map(|event| format!("data: {event}\n\n"))
            .chain(std::iter::once("data: [DONE]\n\n".to_string()))
            .collect()
    }

    fn text_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({ "choices": [{ "delta": { "content": text } }] })]),
            "text/event-stream",
        )
    }

    fn tool_call_reply(name: &str, arguments: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({ "choices": [{ "delta": { "tool_calls": [{
                "index": 0, "id": "call_1", "type": "function",
                "function": { "name": name, "arguments": arguments }
            }] } }] })]),
            "text/event-stream",
        )
    }

    fn completion(server: &MockServer) -> CompletionClient {
        CompletionClient::new(&format!("{}/v1", server.uri()), "NA", "test-model")
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn test_exit_commands_are_case_insensitive() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("EXIT"));
        assert!(is_exit_command("  Quit "));
        assert!(!is_exit_command("quit now"));
    }

    #[test]
    fn test_tool_schema_names_both_tools() {
        let names: Vec<_> = tool_schema()
            .iter()
            .filter_map(|tool| tool["function"]["name"].as_str().map(ToString::to_string))
            .collect();
        assert_eq!(names, vec![TOOL_RANDOM_QUESTION, TOOL_SEARCH_QUESTION]);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(""), Ok(Map::new()));
        assert!(parse_arguments(r#"{"text":"pods"}"#).is_ok_and(|args| args["text"] == "pods"));
        assert!(parse_arguments("[1]").is_err());
        assert!(parse_arguments("{bad").is_err());
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_skip_server() {
        let server = MockServer::start().await;
        // Reaching the tool server would yield a connect error.
        let session = offline_session(&server);
        let mut out = Vec::new();

        let unknown = session
            .execute(&call("delete_everything", "{}"), &mut out)
            .await
            .expect("io");
        let bad = session
            .execute(&call(TOOL_SEARCH_QUESTION, "{\"text\":"), &mut out)
            .await
            .expect("io");

        assert_eq!(unknown, json!({ "error": "Unknown tool: delete_everything" }));
        assert!(bad["error"].as_str().is_some_and(|m| m.starts_with("Invalid arguments")));
    }

    #[tokio::test]
    async fn test_plain_reply_is_added_to_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(text_reply("Hi there."))
            .mount(&server)
            .await;
        let mut session = offline_session(&server);
        let mut out = Vec::new();

        session.turn("hello", &mut out).await.expect("turn");

        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2], ChatMessage::assistant("Hi there."));
        assert!(String::from_utf8_lossy(&out).contains("Hi there."));
    }

    #[tokio::test]
    async fn test_tool_turn_runs_tool_and_follows_up() {
        let (mcp_url, shutdown) = spawn_tool_server().await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({ "tool_choice": "auto" })))
            .respond_with(tool_call_reply(TOOL_SEARCH_QUESTION, r#"{"text":"explain pods"}"#))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(text_reply("A pod is the smallest deployable unit."))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = ChatSession::new(completion(&server), QuestionClient::new(mcp_url));
        let mut out = Vec::new();
        session.turn("explain pods", &mut out).await.expect("turn");

        let messages = session.messages();
        assert_eq!(messages.len(), 5);
        assert!(matches!(
            &messages[2],
            ChatMessage::Assistant { tool_calls, .. } if tool_calls.len() == 1
        ));
        let ChatMessage::Tool { tool_call_id, content, .. } = &messages[3] else {
            panic!("expected tool message, got {:?}", messages[3]);
        };
        assert_eq!(tool_call_id, "call_1");
        let payload: Value = serde_json::from_str(content).expect("tool content is JSON");
        assert_eq!(payload["question"], "What is a pod?");
        assert!(payload["similarity_score"].as_f64().is_some());
        assert_eq!(messages[4], ChatMessage::assistant("A pod is the smallest deployable unit."));

        let requests = server.received_requests().await.expect("recording enabled");
        let follow_up: Value = serde_json::from_slice(&requests[1].body).expect("json body");
        assert!(follow_up.get("tools").is_none());
        assert_eq!(follow_up["messages"][3]["role"], "tool");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn test_failed_turn_restores_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let mut session = offline_session(&server);
        let mut out = Vec::new();

        let result = session.turn("hello", &mut out).await;

        assert!(matches!(result, Err(ChatError::Status { .. })));
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_loop_reports_errors_and_stops_on_quit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        let mut session = offline_session(&server);
        let mut out = Vec::new();

        run_loop(&mut session, &b"hello\n\nQUIT\nnever sent\n"[..], &mut out)
            .await
            .expect("loop");

        let transcript = String::from_utf8_lossy(&out);
        assert!(transcript.contains("boom"));
        assert!(transcript.contains("Ending conversation"));
    }

    #[tokio::test]
    async fn test_loop_ends_at_end_of_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(text_reply("ok"))
            .expect(1)
            .mount(&server)
            .await;
        let mut session = offline_session(&server);
        let mut out = Vec::new();

        run_loop(&mut session, &b"hi"[..], &mut out).await.expect("loop");

        let transcript = String::from_utf8_lossy(&out);
        assert!(transcript.contains("[Processing time:"));
        assert!(transcript.contains("Ending conversation"));
    }
}
