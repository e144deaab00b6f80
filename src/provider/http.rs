//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::AgentError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// The client owns the connect and read timeouts; the agent loop adds none.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Return the response if it is 2xx, otherwise a transport error with the body.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_to_error(status.as_u16(), &body))
}

/// Map a non-2xx status and body to a transport error.
pub fn status_to_error(status: u16, body: &str) -> AgentError {
    AgentError::Transport {
        status,
        body: body.to_string(),
        retry_after_ms: if status == 429 { extract_retry_after(body) } else { None },
    }
}

/// Parse a JSON body, reporting failures as protocol errors.
pub fn parse_body<T: serde::de::DeserializeOwned>(provider: &str, body: &str) -> Result<T, AgentError> {
    serde_json::from_str(body)
        .map_err(|e| AgentError::protocol(format!("{provider}: malformed response body: {e}")))
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse retry-after from JSON error body
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Decode a streaming response body into SSE payloads.
pub fn sse_stream(resp: reqwest::Response) -> BoxStream<'static, Result<SseData, AgentError>> {
    let bytes = resp.bytes_stream();
    async_stream::stream! {
        let mut sse = SseBuffer::new();
        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for event in sse.push(&chunk) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(AgentError::Network(e));
                    return;
                }
            }
        }
        for event in sse.finish() {
            yield Ok(event);
        }
    }
    .boxed()
}

/// One complete server-sent event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental SSE decoder; chunk boundaries may fall anywhere.
#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            self.process_line(line, &mut events);
        }
        events
    }

    /// Flush an event left open when the stream ends without a blank line.
    pub fn finish(&mut self) -> Vec<SseData> {
        let mut events = Vec::new();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            self.process_line(&line, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseData>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data_lines.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseData>) {
        if self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        if data.trim() == "[DONE]" {
            events.push(SseData::Done);
        } else {
            events.push(SseData::Data(data));
        }
    }
}
