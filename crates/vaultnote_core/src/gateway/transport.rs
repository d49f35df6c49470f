//! Wire contract and HTTP transport for the text-inference service.
//!
//! # Responsibility
//! - Define the role-tagged request body and the nested completion response.
//! - Map transport-level outcomes (disabled key, HTTP 429, network/parse
//!   failures) into a small error set the gateway can retry on.
//!
//! # Invariants
//! - The completion text lives at `candidates[0].content.parts[0].text`.
//! - A rate-limit condition is distinguishable from generic failure.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "models/gemini-1.5-flash";

const API_KEY_ENV: &str = "VAULTNOTE_AI_API_KEY";
const BASE_URL_ENV: &str = "VAULTNOTE_AI_BASE_URL";
const MODEL_ENV: &str = "VAULTNOTE_AI_MODEL";

/// Remote endpoint configuration.
///
/// An empty API key disables the remote path entirely; every gateway
/// operation then falls back to its local degraded value.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Builds a configuration from process environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var(API_KEY_ENV).unwrap_or(defaults.api_key),
            base_url: std::env::var(BASE_URL_ENV).unwrap_or(defaults.base_url),
            model: std::env::var(MODEL_ENV).unwrap_or(defaults.model),
        }
    }
}

/// Request body: a single user turn with an instruction part followed by a
/// content part.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

impl GenerateRequest {
    /// Builds the canonical two-part request.
    pub fn with_instruction(instruction: &str, content: &str) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part {
                        text: instruction.to_string(),
                    },
                    Part {
                        text: content.to_string(),
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Extracts the single completion text, if present.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Transport-level failure observed by one send attempt.
#[derive(Debug)]
pub enum TransportError {
    /// No API key configured; the remote path is switched off.
    Disabled,
    /// The remote service signalled rate limiting.
    RateLimited,
    /// Network failure or non-success HTTP status.
    Http(String),
    /// The response body could not be decoded.
    Malformed(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "inference transport disabled"),
            Self::RateLimited => write!(f, "rate limited by inference service"),
            Self::Http(details) => write!(f, "inference request failed: {details}"),
            Self::Malformed(details) => write!(f, "malformed inference response: {details}"),
        }
    }
}

impl Error for TransportError {}

/// One-operation seam between the gateway and the wire.
///
/// Production uses [`HttpTransport`]; tests substitute scripted
/// implementations to drive retry and single-flight behavior.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(&self, request: &GenerateRequest) -> Result<GenerateResponse, TransportError>;
}

/// reqwest-backed transport posting to a `generateContent` endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpTransport {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn send(&self, request: &GenerateRequest) -> Result<GenerateResponse, TransportError> {
        if self.config.api_key.is_empty() {
            return Err(TransportError::Disabled);
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| TransportError::Http(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            return Err(TransportError::Http(format!("status {status}")));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|err| TransportError::Malformed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerateRequest, GenerateResponse};

    #[test]
    fn request_carries_instruction_then_content() {
        let request = GenerateRequest::with_instruction("instruct", "body");
        let json = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "instruct");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "body");
    }

    #[test]
    fn first_text_follows_nested_candidate_path() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "completion" } ] } }
            ]
        }"#;
        let response: GenerateResponse =
            serde_json::from_str(raw).expect("response should deserialize");
        assert_eq!(response.first_text(), Some("completion"));
    }

    #[test]
    fn first_text_tolerates_empty_candidates() {
        let response: GenerateResponse =
            serde_json::from_str("{}").expect("empty object should deserialize");
        assert_eq!(response.first_text(), None);
    }
}
