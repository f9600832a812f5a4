//! Backend HTTP API client
//!
//! Scenarios use this to set up state and to check the backend directly,
//! bypassing the UI. Responses are returned with their status instead of
//! failing on non-2xx, since several checks accept more than one status
//! from a live backend whose state the suite does not control.

use std::time::Duration;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Status and decoded body of one call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub endpoint: String,
    pub status: u16,
    /// JSON body, or the raw text as a JSON string when it is not JSON
    pub body: Value,
    pub elapsed_ms: u64,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail unless the status is one of `accepted`
    pub fn expect_status(&self, accepted: &[u16]) -> E2eResult<&Self> {
        if accepted.contains(&self.status) {
            Ok(self)
        } else {
            Err(E2eError::UnexpectedStatus {
                endpoint: self.endpoint.clone(),
                status: self.status,
                accepted: accepted.to_vec(),
            })
        }
    }

    /// List payload: a bare array, or an array under `data`, `items` or
    /// `data.items`
    pub fn items(&self) -> Vec<Value> {
        [
            Some(&self.body),
            self.body.get("data"),
            self.body.get("items"),
            self.body.get("data").and_then(|d| d.get("items")),
        ]
        .into_iter()
        .flatten()
        .find_map(|v| v.as_array().cloned())
        .unwrap_or_default()
    }

    /// `id` at the top level or under `data`, string or number
    pub fn id(&self) -> Option<String> {
        json_id(&self.body).or_else(|| self.body.get("data").and_then(json_id))
    }
}

/// `id` of a JSON object, string or number
pub fn json_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Agent as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub kind: String,
}

impl AgentDescriptor {
    /// Accepts camelCase or snake_case field names and numeric ids
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = json_id(value)?;
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| value.get(*k).and_then(Value::as_str))
                .map(str::to_string)
        };
        let name = text(&["name"]).unwrap_or_default();
        let display_name = text(&["displayName", "display_name"]).unwrap_or_else(|| name.clone());
        let kind = text(&["type", "agent_type", "agentType"]).unwrap_or_default();

        Some(Self {
            id,
            name,
            display_name,
            kind,
        })
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> E2eResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Same client, authenticating with `token`
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, endpoint: String, builder: RequestBuilder) -> E2eResult<ApiResponse> {
        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        debug!(%endpoint, status, elapsed_ms, "API call");
        Ok(ApiResponse {
            endpoint,
            status,
            body,
            elapsed_ms,
        })
    }

    pub async fn get(&self, path: &str) -> E2eResult<ApiResponse> {
        self.send(format!("GET {}", path), self.request(Method::GET, path)).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> E2eResult<ApiResponse> {
        self.send(format!("POST {}", path), self.request(Method::POST, path).json(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> E2eResult<ApiResponse> {
        self.send(format!("DELETE {}", path), self.request(Method::DELETE, path))
            .await
    }

    /// Raw login call, for checks on rejected credentials
    pub async fn login_response(&self, username: &str, password: &str) -> E2eResult<ApiResponse> {
        self.post_json(
            "/api/auth/login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Log in and return the bearer token
    pub async fn login(&self, username: &str, password: &str) -> E2eResult<String> {
        let response = self.login_response(username, password).await?;
        response.expect_status(&[200, 201])?;

        let body = &response.body;
        let token = [
            body.get("access_token"),
            body.get("token"),
            body.get("data").and_then(|d| d.get("token")),
            body.get("data").and_then(|d| d.get("access_token")),
        ]
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .ok_or_else(|| E2eError::AssertionFailed("login response carries no token".to_string()))?;

        info!(username, "API login succeeded");
        Ok(token.to_string())
    }

    /// Log in and return an authenticated client
    pub async fn sign_in(&self, username: &str, password: &str) -> E2eResult<Self> {
        let token = self.login(username, password).await?;
        Ok(self.with_token(token))
    }

    pub async fn list_sessions(&self) -> E2eResult<ApiResponse> {
        self.get("/api/sessions").await
    }

    pub async fn create_session(&self, title: &str) -> E2eResult<ApiResponse> {
        self.post_json("/api/sessions", &json!({ "title": title })).await
    }

    pub async fn session_messages(&self, session_id: &str) -> E2eResult<ApiResponse> {
        self.get(&format!("/api/sessions/{}/messages", session_id)).await
    }

    pub async fn delete_session(&self, session_id: &str) -> E2eResult<ApiResponse> {
        self.delete(&format!("/api/sessions/{}", session_id)).await
    }

    pub async fn list_agents(&self) -> E2eResult<Vec<AgentDescriptor>> {
        let response = self.get("/api/agents").await?;
        response.expect_status(&[200])?;
        Ok(response.items().iter().filter_map(AgentDescriptor::from_value).collect())
    }

    /// Chat with an agent and read its streamed reply to the end
    pub async fn agent_chat_stream(
        &self,
        agent_id: &str,
        message: &str,
        session_id: Option<&str>,
    ) -> E2eResult<SseTranscript> {
        let path = format!("/api/agents/{}/chat", agent_id);
        let start = Instant::now();

        let response = self
            .request(Method::POST, &path)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&json!({ "message": message, "session_id": session_id, "stream": true }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(E2eError::UnexpectedStatus {
                endpoint: format!("POST {}", path),
                status,
                accepted: vec![200],
            });
        }

        let mut transcript = SseTranscript::default();
        let mut parser = SseParser::default();
        let mut stream = response.bytes_stream();

        'read: while let Some(bytes) = stream.next().await {
            let bytes = bytes?;
            for event in parser.push(&bytes) {
                if transcript.observe(event, &start) {
                    break 'read;
                }
            }
        }
        if !transcript.done {
            if let Some(event) = parser.finish() {
                transcript.observe(event, &start);
            }
        }

        transcript.total_ms = start.elapsed().as_millis() as u64;
        info!(
            agent_id,
            chunks = transcript.chunks.len(),
            first_chunk_ms = ?transcript.first_chunk_ms,
            total_ms = transcript.total_ms,
            "Agent stream finished"
        );
        Ok(transcript)
    }

    pub async fn knowledge_groups(&self) -> E2eResult<ApiResponse> {
        self.get("/api/knowledge/groups").await
    }

    pub async fn knowledge_bases(&self) -> E2eResult<ApiResponse> {
        self.get("/api/knowledge/bases").await
    }

    pub async fn upload_document(&self, base_id: &str, file_name: &str, content: Vec<u8>) -> E2eResult<ApiResponse> {
        let path = format!("/api/knowledge/bases/{}/documents", base_id);
        let part = Part::bytes(content).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        self.send(format!("POST {}", path), self.request(Method::POST, &path).multipart(form))
            .await
    }

    pub async fn search_knowledge(&self, query: &str, base_id: Option<&str>) -> E2eResult<ApiResponse> {
        self.post_json(
            "/api/knowledge/search",
            &json!({ "query": query, "knowledge_base_id": base_id, "top_k": 5 }),
        )
        .await
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

/// Incremental `text/event-stream` decoder. Bytes may arrive split anywhere,
/// including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // comments, `event:`, `id:` and `retry:` carry nothing we check
        }
        events
    }

    /// Flush an event left open by a stream that ended without a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest);
            if let Some(value) = line.trim_end_matches('\r').strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        if data.trim() == "[DONE]" {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(data))
        }
    }
}

/// Everything read from one streamed reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SseTranscript {
    pub chunks: Vec<String>,
    pub done: bool,
    pub first_chunk_ms: Option<u64>,
    pub total_ms: u64,
}

impl SseTranscript {
    /// Returns true once the stream is finished
    fn observe(&mut self, event: SseEvent, start: &Instant) -> bool {
        match event {
            SseEvent::Done => {
                self.done = true;
                true
            }
            SseEvent::Data(data) => {
                if self.first_chunk_ms.is_none() {
                    self.first_chunk_ms = Some(start.elapsed().as_millis() as u64);
                }
                self.chunks.push(data);
                false
            }
        }
    }

    /// Concatenated reply text. JSON chunks contribute their `content`,
    /// `delta`, `text` or OpenAI-style `choices[0].delta.content`; other
    /// chunks contribute verbatim.
    pub fn text(&self) -> String {
        self.chunks.iter().map(|c| chunk_text(c)).collect()
    }
}

fn chunk_text(chunk: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(chunk) else {
        return chunk.to_string();
    };
    ["content", "delta", "text"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .or_else(|| value.pointer("/choices/0/delta/content").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}
