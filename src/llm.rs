// Language model collaborator
// Conversation turns, tool declarations and a Gemini generateContent client

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse model response: {0}")]
    Parse(String),

    #[error("Model returned no candidates")]
    EmptyResponse,
}

impl ModelError {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Network(_) => "Network",
            ModelError::Timeout(_) => "Timeout",
            ModelError::Api { .. } => "Api",
            ModelError::Parse(_) => "Parse",
            ModelError::EmptyResponse => "EmptyResponse",
        }
    }
}

// Speaker vocabulary of the model API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    // Argument-less calls are replayed without an `args` key
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

// One part of a turn. Variant order matters for untagged matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelPart {
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
    Text {
        text: String,
    },
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    pub role: ModelRole,
    pub parts: Vec<ModelPart>,
}

impl ModelTurn {
    pub fn text(role: ModelRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ModelPart::Text { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(ModelRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::text(ModelRole::Model, text)
    }

    // The model's own tool request, replayed so the follow-up has full context
    pub fn function_calls(calls: &[FunctionCall]) -> Self {
        Self {
            role: ModelRole::Model,
            parts: calls
                .iter()
                .cloned()
                .map(|function_call| ModelPart::FunctionCall { function_call })
                .collect(),
        }
    }

    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self {
            role: ModelRole::User,
            parts: responses
                .into_iter()
                .map(|function_response| ModelPart::FunctionResponse { function_response })
                .collect(),
        }
    }

    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ModelPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub contents: Vec<ModelTurn>,
    pub tools: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            text: None,
            function_calls,
        }
    }

    pub fn from_parts(parts: Vec<ModelPart>) -> Self {
        let mut text = String::new();
        let mut function_calls = Vec::new();
        for part in parts {
            match part {
                ModelPart::Text { text: chunk } => text.push_str(&chunk),
                ModelPart::FunctionCall { function_call } => function_calls.push(function_call),
                ModelPart::FunctionResponse { .. } | ModelPart::Other(_) => {}
            }
        }

        Self {
            text: (!text.is_empty()).then_some(text),
            function_calls,
        }
    }

    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

// Black-box model capability: conversation plus tool schema in, text and/or tool calls out
#[async_trait]
pub trait ModelClient: Send + Sync + 'static {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }
}

// Wire structures for the generateContent endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [ModelTurn],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ModelPart>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn build_request_body<'a>(request: &'a ModelRequest) -> GenerateContentRequest<'a> {
    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolDeclarations {
            function_declarations: &request.tools,
        }]
    };
    GenerateContentRequest {
        contents: &request.contents,
        tools,
    }
}

fn parse_response_body(body: &str) -> Result<ModelResponse, ModelError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Parse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(ModelError::Api {
            status: 200,
            message: error.message,
        });
    }

    let parts = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .ok_or(ModelError::EmptyResponse)?;

    Ok(ModelResponse::from_parts(parts))
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<GenerateContentResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map_or_else(|| body.to_string(), |e| e.message)
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    #[instrument(skip(self, request), fields(model = %self.model, turns = request.contents.len()))]
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        debug!("Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&build_request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !status.is_success() {
            error!(status = %status, "Model API error");
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed = parse_response_body(&body)?;
        debug!(
            function_calls = parsed.function_calls.len(),
            has_text = parsed.text.is_some(),
            "Received model response"
        );
        Ok(parsed)
    }
}
