//! HTTP-level tests for the protocol adapters against a local mock server.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use testsmith::error::AgentError;
use testsmith::provider::anthropic::AnthropicProvider;
use testsmith::provider::google::GoogleProvider;
use testsmith::provider::openai::OpenAiProvider;
use testsmith::provider::ChatProvider;
use testsmith::tools::ToolMethod;
use testsmith::types::{StreamHandler, ToolCall, Turn};

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Token,
    ToolCall,
    Complete,
}

#[derive(Default)]
struct Recorder {
    /// Callback order across the whole stream.
    seen: Vec<Seen>,
    tokens: Vec<String>,
    calls: Vec<ToolCall>,
    completed: Option<(String, usize)>,
    errors: usize,
}

impl StreamHandler for Recorder {
    fn on_token(&mut self, text: &str) {
        self.seen.push(Seen::Token);
        self.tokens.push(text.to_string());
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.seen.push(Seen::ToolCall);
        self.calls.push(call.clone());
    }

    fn on_complete(&mut self, text: &str, tool_calls: &[ToolCall]) {
        self.seen.push(Seen::Complete);
        self.completed = Some((text.to_string(), tool_calls.len()));
    }

    fn on_error(&mut self, _error: &AgentError) {
        self.errors += 1;
    }
}

fn sse(events: &[serde_json::Value], done: bool) -> String {
    let mut body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

fn turns() -> Vec<Turn> {
    vec![Turn::system("You write unit tests."), Turn::user("add two numbers")]
}

fn tools() -> Vec<testsmith::tools::ToolDescriptor> {
    vec![ToolMethod::new("add", "Add numbers")
        .integer("a", "First")
        .integer("b", "Second")
        .descriptor()]
}

// OpenAI

#[tokio::test]
async fn openai_chat_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "add", "arguments": "{\"a\":1,\"b\":2}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("gpt-4o", "test-key", Some(server.uri()));
    let turn = provider.chat(&turns(), &tools()).await.unwrap();

    assert_eq!(turn.text, "");
    assert_eq!(turn.tool_calls, vec![ToolCall::new("call_1", "add", json!({"a": 1, "b": 2}))]);
}

#[tokio::test]
async fn openai_stream_joins_argument_fragments() {
    let server = MockServer::start().await;
    let body = sse(
        &[
            json!({"choices": [{"delta": {"content": "Adding "}}]}),
            json!({"choices": [{"delta": {"content": "now."}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "call_7", "function": {"name": "add", "arguments": "{\"a\":1,"}}]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\"b\":2}"}}]}}]}),
            json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
        ],
        true,
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("gpt-4o", "test-key", Some(server.uri()));
    let mut recorder = Recorder::default();
    let turn = provider.chat_stream(&turns(), &tools(), &mut recorder).await.unwrap();

    assert_eq!(turn.text, "Adding now.");
    assert_eq!(recorder.tokens, vec!["Adding ", "now."]);
    assert_eq!(recorder.calls.len(), 1);
    assert_eq!(recorder.calls[0].id(), "call_7");
    assert_eq!(recorder.calls[0].arguments(), &json!({"a": 1, "b": 2}));
    assert_eq!(recorder.completed, Some(("Adding now.".to_string(), 1)));
    // The call fragments arrived after the text, but the call is only
    // surfaced once the stream has ended.
    assert_eq!(recorder.seen, vec![Seen::Token, Seen::Token, Seen::ToolCall, Seen::Complete]);
}

#[tokio::test]
async fn openai_tool_calls_surface_after_trailing_text() {
    let server = MockServer::start().await;
    let body = sse(
        &[
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "call_3", "function": {"name": "add", "arguments": "{\"a\":1,"}}]}}]}),
            json!({"choices": [{"delta": {"content": "thinking"}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\"b\":2}"}}]}}]}),
            json!({"choices": [{"delta": {"content": " more"}}]}),
        ],
        true,
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("gpt-4o", "test-key", Some(server.uri()));
    let mut recorder = Recorder::default();
    provider.chat_stream(&turns(), &tools(), &mut recorder).await.unwrap();

    let last_token = recorder.seen.iter().rposition(|s| *s == Seen::Token).unwrap();
    let first_call = recorder.seen.iter().position(|s| *s == Seen::ToolCall).unwrap();
    assert!(first_call > last_token, "{:?}", recorder.seen);
    assert_eq!(recorder.calls[0].arguments(), &json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn openai_truncated_fragment_yields_no_call() {
    let server = MockServer::start().await;
    let body = sse(
        &[json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "call_1", "function": {"name": "add", "arguments": "{\"a\":1,"}}]}}]})],
        false,
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("gpt-4o", "test-key", Some(server.uri()));
    let turn = provider.chat_stream(&turns(), &[], &mut Recorder::default()).await.unwrap();
    assert!(turn.tool_calls.is_empty());
}

#[tokio::test]
async fn openai_rate_limit_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "slow down", "retry_after": 2}})))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("gpt-4o", "test-key", Some(server.uri()));
    let err = provider.chat(&turns(), &[]).await.unwrap_err();
    match err {
        AgentError::Transport {
            status,
            body,
            retry_after_ms,
        } => {
            assert_eq!(status, 429);
            assert!(body.contains("slow down"));
            assert_eq!(retry_after_ms, Some(2000));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut recorder = Recorder::default();
    let err = provider.chat_stream(&turns(), &[], &mut recorder).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(recorder.errors, 1);
}

#[tokio::test]
async fn openai_malformed_body_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>oops</html>", "text/html"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("gpt-4o", "test-key", Some(server.uri()));
    let err = provider.chat(&turns(), &[]).await.unwrap_err();
    assert!(matches!(err, AgentError::Protocol(_)));
}

// Anthropic

#[tokio::test]
async fn anthropic_chat_sends_headers_and_parses_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"system": "You write unit tests."})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Let me add."},
                {"type": "tool_use", "id": "toolu_1", "name": "add", "input": {"a": 1, "b": 2}}
            ],
            "stop_reason": "tool_use"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("claude-sonnet-4-5", "test-key", Some(server.uri()));
    let turn = provider.chat(&turns(), &tools()).await.unwrap();

    assert_eq!(turn.text, "Let me add.");
    assert_eq!(turn.tool_calls, vec![ToolCall::new("toolu_1", "add", json!({"a": 1, "b": 2}))]);
}

#[tokio::test]
async fn anthropic_stream_reassembles_partial_json() {
    let server = MockServer::start().await;
    let body = sse(
        &[
            json!({"type": "message_start", "message": {"id": "msg_1"}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Sure."}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "add", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"a\":1,"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"b\":2}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}}),
            json!({"type": "message_stop"}),
        ],
        false,
    );
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("claude-sonnet-4-5", "test-key", Some(server.uri()));
    let mut recorder = Recorder::default();
    let turn = provider.chat_stream(&turns(), &tools(), &mut recorder).await.unwrap();

    assert_eq!(turn.text, "Sure.");
    assert_eq!(turn.tool_calls, vec![ToolCall::new("toolu_9", "add", json!({"a": 1, "b": 2}))]);
    assert_eq!(recorder.calls.len(), 1);
}

#[tokio::test]
async fn anthropic_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({"type": "error", "error": {"type": "overloaded_error"}})))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("claude-sonnet-4-5", "test-key", Some(server.uri()));
    let err = provider.chat(&turns(), &[]).await.unwrap_err();
    assert!(matches!(err, AgentError::Transport { status: 529, .. }));
    assert!(err.is_retryable());
}

// Google

#[tokio::test]
async fn google_chat_uses_key_query_and_generates_call_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({"systemInstruction": {"parts": [{"text": "You write unit tests."}]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"functionCall": {"name": "add", "args": {"a": 1, "b": 2}}}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("gemini-2.0-flash", "test-key", Some(server.uri()));
    let turn = provider.chat(&turns(), &tools()).await.unwrap();

    assert_eq!(turn.tool_calls.len(), 1);
    assert!(!turn.tool_calls[0].id().is_empty());
    assert_eq!(turn.tool_calls[0].name(), "add");
    assert_eq!(turn.tool_calls[0].arguments(), &json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn google_stream_emits_calls_at_the_end() {
    let server = MockServer::start().await;
    let body = sse(
        &[
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Calling "}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "add."}, {"functionCall": {"name": "add", "args": {"a": 1, "b": 2}}}]}, "finishReason": "STOP"}]}),
        ],
        false,
    );
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("gemini-2.0-flash", "test-key", Some(server.uri()));
    let mut recorder = Recorder::default();
    let turn = provider.chat_stream(&turns(), &tools(), &mut recorder).await.unwrap();

    assert_eq!(turn.text, "Calling add.");
    assert_eq!(recorder.calls.len(), 1);
    assert_eq!(recorder.calls[0].arguments(), &json!({"a": 1, "b": 2}));
    assert_eq!(recorder.completed, Some(("Calling add.".to_string(), 1)));
}

#[tokio::test]
async fn google_calls_without_args_match_between_chat_and_stream() {
    let server = MockServer::start().await;
    let candidate = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"functionCall": {"name": "list_files"}}]},
            "finishReason": "STOP"
        }]
    });
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate.clone()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&[candidate], false), "text/event-stream"))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("gemini-2.0-flash", "test-key", Some(server.uri()));
    let chat = provider.chat(&turns(), &[]).await.unwrap();
    let mut recorder = Recorder::default();
    let streamed = provider.chat_stream(&turns(), &[], &mut recorder).await.unwrap();

    assert_eq!(chat.tool_calls.len(), 1);
    assert_eq!(streamed.tool_calls.len(), 1);
    assert_eq!(streamed.tool_calls[0].name(), "list_files");
    assert_eq!(streamed.tool_calls[0].arguments(), &json!({}));
    assert_eq!(recorder.calls.len(), 1);
}

#[tokio::test]
async fn google_no_candidates_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("gemini-2.0-flash", "test-key", Some(server.uri()));
    let err = provider.chat(&turns(), &[]).await.unwrap_err();
    assert!(matches!(err, AgentError::Protocol(_)));
}
