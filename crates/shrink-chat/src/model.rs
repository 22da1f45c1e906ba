//! Remote language model boundary.
//!
//! Provider failures are classified exactly once, here, into the four
//! classes the retry loop understands. Everything past this module only
//! sees [`RemoteCallError`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use shrink_core::config::ModelConfig;
use shrink_core::{ConversationMessage, Role};

// =============================================================================
// Request / response
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub input: String,
    pub history: Vec<ConversationMessage>,
}

impl ModelRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationMessage>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub output: String,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The provider refused the prompt or its answer on content grounds.
    SafetyBlock,
    /// Rate limit or quota exhaustion.
    Quota,
    Timeout,
    Other,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::SafetyBlock => write!(f, "safety_block"),
            ErrorClass::Quota => write!(f, "quota"),
            ErrorClass::Timeout => write!(f, "timeout"),
            ErrorClass::Other => write!(f, "other"),
        }
    }
}

/// A classified failure of one model invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct RemoteCallError {
    pub class: ErrorClass,
    pub message: String,
}

impl RemoteCallError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

// =============================================================================
// RemoteModel trait
// =============================================================================

#[async_trait]
pub trait RemoteModel: Send + Sync {
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, RemoteCallError>;

    fn name(&self) -> &str;
}

// =============================================================================
// Classification
// =============================================================================

const SAFETY_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Error body of a failed provider call: `{"error": {"code", "message", "status"}}`.
/// Blocked prompts may instead carry `promptFeedback`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ProviderError>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Class of a non-success HTTP response. The provider's status code name
/// decides when the body parses; otherwise the HTTP status does.
pub fn classify_http_failure(status: u16, body: &str) -> ErrorClass {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();

    if envelope
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .is_some()
    {
        return ErrorClass::SafetyBlock;
    }

    match envelope.error.and_then(|e| e.status).as_deref() {
        Some("RESOURCE_EXHAUSTED") => return ErrorClass::Quota,
        Some("DEADLINE_EXCEEDED") => return ErrorClass::Timeout,
        _ => {}
    }

    match status {
        429 => ErrorClass::Quota,
        408 | 504 => ErrorClass::Timeout,
        _ => ErrorClass::Other,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Extract the answer text from a successful HTTP response, classifying
/// blocked prompts and safety stops.
pub fn interpret_completion(response: GenerateResponse) -> Result<ModelResponse, RemoteCallError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(RemoteCallError::new(
            ErrorClass::SafetyBlock,
            format!("prompt blocked: {}", reason),
        ));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| RemoteCallError::new(ErrorClass::Other, "response had no candidates"))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if SAFETY_FINISH_REASONS.contains(&reason) {
            return Err(RemoteCallError::new(
                ErrorClass::SafetyBlock,
                format!("generation stopped: {}", reason),
            ));
        }
    }

    let output: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if output.trim().is_empty() {
        return Err(RemoteCallError::new(ErrorClass::Other, "empty model output"));
    }
    Ok(ModelResponse { output })
}

// =============================================================================
// HttpModel
// =============================================================================

/// Model adapter for a `generateContent`-style JSON endpoint.
pub struct HttpModel {
    client: reqwest::Client,
    endpoint: String,
    model_name: String,
    api_key: Option<String>,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

impl HttpModel {
    /// Build from configuration. Returns `None` when no endpoint is set.
    pub fn from_config(config: &ModelConfig) -> Result<Option<Self>, RemoteCallError> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteCallError::new(ErrorClass::Other, e.to_string()))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Some(Self {
            client,
            endpoint,
            model_name: config.model_name.clone(),
            api_key,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }))
    }

    fn body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = request
            .history
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None,
                };
                Some(json!({"role": role, "parts": [{"text": m.content}]}))
            })
            .collect();
        contents.push(json!({"role": "user", "parts": [{"text": request.input}]}));

        json!({
            "model": self.model_name,
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "topP": self.top_p,
                "topK": self.top_k,
            }
        })
    }
}

#[async_trait]
impl RemoteModel for HttpModel {
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, RemoteCallError> {
        let mut builder = self.client.post(&self.endpoint).json(&self.body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            let class = if e.is_timeout() {
                ErrorClass::Timeout
            } else {
                ErrorClass::Other
            };
            RemoteCallError::new(class, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let class = classify_http_failure(status.as_u16(), &body);
            warn!(status = %status, %class, "Model request failed");
            return Err(RemoteCallError::new(
                class,
                format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
            ));
        }

        let parsed = response.json::<GenerateResponse>().await.map_err(|e| {
            let class = if e.is_timeout() {
                ErrorClass::Timeout
            } else {
                ErrorClass::Other
            };
            RemoteCallError::new(class, format!("invalid response body: {}", e))
        })?;
        debug!(model = %self.model_name, "Model response received");
        interpret_completion(parsed)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
