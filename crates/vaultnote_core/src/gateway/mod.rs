//! Throttled gateway to the rate-limited text-inference service.
//!
//! # Responsibility
//! - Funnel every network-backed operation through one `invoke` primitive
//!   with single-flight admission, retry and exponential backoff.
//! - Expose per-category caller-facing cooldown windows, separate from the
//!   internal retry schedule.
//! - Guarantee a usable degraded value for every operation when the remote
//!   service is unavailable.
//!
//! # Invariants
//! - At most one request is in flight per gateway instance; a caller that
//!   exhausts its bounded wait proceeds anyway instead of starving.
//! - Raw transport errors never leave this module; callers only ever see
//!   `Cooldown` or `Unavailable`.
//! - Blank input short-circuits locally without touching the network.

use log::{debug, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};

use crate::model::note::normalize_tags;

pub mod glossary;
pub mod transport;

use transport::{CompletionTransport, GenerateRequest, TransportError};

const MAX_RETRIES: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(1200);
const FLIGHT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_FLIGHT_WAIT_CYCLES: u32 = 10;

// Throttled outcomes wait longer than clean ones.
const COOLDOWN_AFTER_ATTEMPT: Duration = Duration::from_secs(30);
const COOLDOWN_AFTER_THROTTLE: Duration = Duration::from_secs(60);

const FALLBACK_TAGS: [&str; 2] = ["note", "document"];
const MAX_INSIGHTS: usize = 5;

const SUMMARIZE_INSTRUCTION: &str = "You are a helpful assistant that creates concise summaries. \
     Summarize the following text in 1-2 sentences.";
const TAGS_INSTRUCTION: &str = "Generate 3-5 relevant tags for the following content. \
     Return only the tags separated by commas, no other text.";
const GRAMMAR_INSTRUCTION: &str = "Find grammar/spelling issues in this text. Return a compact \
     JSON array of objects with fields: text (string), suggestion (string). No extra text.";
const INSIGHTS_INSTRUCTION: &str = "Extract 3-5 actionable insights or key points from the text. \
     Return each as a bullet sentence.";

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Caller-visible gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    /// The category's cooldown deadline has not passed yet. Transient.
    Cooldown { retry_in: Duration },
    /// Retries exhausted or the remote path is disabled. Transient.
    Unavailable,
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cooldown { retry_in } => {
                write!(f, "cooldown active, retry in {}s", retry_in.as_secs())
            }
            Self::Unavailable => write!(f, "inference service unavailable"),
        }
    }
}

impl Error for GatewayError {}

/// Logical operation category carrying its own cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    /// The summarize + generate-tags bundle.
    AiTools,
    /// Translation requests.
    Translate,
}

impl OpCategory {
    fn index(self) -> usize {
        match self {
            Self::AiTools => 0,
            Self::Translate => 1,
        }
    }
}

/// One grammar finding from the grammar-check operation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GrammarSuggestion {
    /// Offending fragment as it appears in the input.
    pub text: String,
    /// Proposed replacement.
    pub suggestion: String,
}

enum InvokeError {
    /// Exhausted with rate limiting observed.
    Throttled,
    /// Exhausted on other failures, or the remote path is disabled.
    Unavailable,
}

/// Mediator for all calls to the external text-inference service.
pub struct InferenceGateway<T: CompletionTransport> {
    transport: T,
    flight: Arc<Semaphore>,
    cooldowns: Mutex<[Option<Instant>; 2]>,
}

impl<T: CompletionTransport> InferenceGateway<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            flight: Arc::new(Semaphore::new(1)),
            cooldowns: Mutex::new([None, None]),
        }
    }

    /// Creates a concise 1-2 sentence summary of `content`.
    ///
    /// Blank input yields an empty summary without a network call.
    pub async fn summarize(&self, content: &str) -> GatewayResult<String> {
        if content.trim().is_empty() {
            return Ok(String::new());
        }
        match self
            .invoke(GenerateRequest::with_instruction(
                SUMMARIZE_INSTRUCTION,
                content,
            ))
            .await
        {
            Ok(text) => Ok(text.trim().to_string()),
            Err(_) => Err(GatewayError::Unavailable),
        }
    }

    /// Suggests tags for `content`.
    ///
    /// Never fails: unusable or unavailable completions degrade to a small
    /// fixed fallback tag set, blank input to no tags at all.
    pub async fn generate_tags(&self, content: &str) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }
        match self
            .invoke(GenerateRequest::with_instruction(TAGS_INSTRUCTION, content))
            .await
        {
            Ok(text) => {
                let tags = parse_tag_list(&text);
                if tags.is_empty() {
                    fallback_tags()
                } else {
                    tags
                }
            }
            Err(_) => fallback_tags(),
        }
    }

    /// Cooldown-gated summarize + generate-tags bundle.
    ///
    /// Rejects with [`GatewayError::Cooldown`] while the AI-tools deadline is
    /// active; every attempt re-arms the deadline, throttled outcomes for
    /// longer than clean ones.
    pub async fn summarize_and_tag(&self, content: &str) -> GatewayResult<(String, Vec<String>)> {
        if content.trim().is_empty() {
            return Ok((String::new(), Vec::new()));
        }
        self.ensure_ready(OpCategory::AiTools)?;

        let summary = self
            .invoke(GenerateRequest::with_instruction(
                SUMMARIZE_INSTRUCTION,
                content,
            ))
            .await;
        let tags = self
            .invoke(GenerateRequest::with_instruction(TAGS_INSTRUCTION, content))
            .await;

        let throttled = matches!(summary, Err(InvokeError::Throttled))
            || matches!(tags, Err(InvokeError::Throttled));
        self.stamp_cooldown(OpCategory::AiTools, throttled);

        match summary {
            Ok(summary_text) => {
                let tag_list = match tags {
                    Ok(text) => {
                        let parsed = parse_tag_list(&text);
                        if parsed.is_empty() {
                            fallback_tags()
                        } else {
                            parsed
                        }
                    }
                    Err(_) => fallback_tags(),
                };
                Ok((summary_text.trim().to_string(), tag_list))
            }
            Err(_) => Err(GatewayError::Unavailable),
        }
    }

    /// Cooldown-gated translation of `text` into `target_language`.
    pub async fn translate(&self, text: &str, target_language: &str) -> GatewayResult<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.ensure_ready(OpCategory::Translate)?;

        let instruction = format!(
            "Translate the following text to {target_language}. \
             Return only the translation, no other text."
        );
        let result = self
            .invoke(GenerateRequest::with_instruction(&instruction, text))
            .await;

        let throttled = matches!(result, Err(InvokeError::Throttled));
        self.stamp_cooldown(OpCategory::Translate, throttled);

        match result {
            Ok(translated) => Ok(translated.trim().to_string()),
            Err(_) => Err(GatewayError::Unavailable),
        }
    }

    /// Finds grammar/spelling issues in `text`.
    ///
    /// Degrades to a tiny local heuristic when the remote completion is
    /// unavailable or unparseable.
    pub async fn check_grammar(&self, text: &str) -> Vec<GrammarSuggestion> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        match self
            .invoke(GenerateRequest::with_instruction(GRAMMAR_INSTRUCTION, text))
            .await
        {
            Ok(raw) => parse_grammar_suggestions(&raw)
                .unwrap_or_else(|| local_grammar_fallback(text)),
            Err(_) => local_grammar_fallback(text),
        }
    }

    /// Extracts up to five key points from `text`. Empty when unavailable.
    pub async fn insights(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        match self
            .invoke(GenerateRequest::with_instruction(INSIGHTS_INSTRUCTION, text))
            .await
        {
            Ok(raw) => raw
                .lines()
                .map(|line| line.trim_start_matches(['-', '*', ' ']).trim())
                .filter(|line| !line.is_empty())
                .take(MAX_INSIGHTS)
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Remaining AI-tools bundle cooldown, if a deadline is active.
    pub fn ai_tools_cooldown(&self) -> Option<Duration> {
        self.cooldown_remaining(OpCategory::AiTools)
    }

    /// Remaining translate cooldown, if a deadline is active.
    pub fn translate_cooldown(&self) -> Option<Duration> {
        self.cooldown_remaining(OpCategory::Translate)
    }

    fn cooldown_remaining(&self, category: OpCategory) -> Option<Duration> {
        let deadline = self.cooldowns.lock()[category.index()]?;
        deadline.checked_duration_since(Instant::now())
    }

    fn ensure_ready(&self, category: OpCategory) -> GatewayResult<()> {
        if let Some(retry_in) = self.cooldown_remaining(category) {
            debug!(
                "event=gateway_cooldown module=gateway status=rejected category={:?} retry_in_ms={}",
                category,
                retry_in.as_millis()
            );
            return Err(GatewayError::Cooldown { retry_in });
        }
        Ok(())
    }

    fn stamp_cooldown(&self, category: OpCategory, throttled: bool) {
        let window = if throttled {
            COOLDOWN_AFTER_THROTTLE
        } else {
            COOLDOWN_AFTER_ATTEMPT
        };
        self.cooldowns.lock()[category.index()] = Some(Instant::now() + window);
    }

    /// Single network primitive: single-flight admission, then retry with
    /// exponential backoff until a completion text is extracted or the
    /// attempt budget is exhausted.
    async fn invoke(&self, request: GenerateRequest) -> Result<String, InvokeError> {
        let _permit = self.acquire_flight_slot().await;

        let mut delay = BASE_BACKOFF;
        let mut throttled = false;
        for attempt in 0..=MAX_RETRIES {
            let failure = match self.transport.send(&request).await {
                Ok(response) => match response.first_text() {
                    Some(text) => return Ok(text.to_string()),
                    None => "completion text missing".to_string(),
                },
                Err(TransportError::Disabled) => {
                    debug!("event=gateway_invoke module=gateway status=disabled");
                    return Err(InvokeError::Unavailable);
                }
                Err(TransportError::RateLimited) => {
                    throttled = true;
                    TransportError::RateLimited.to_string()
                }
                Err(err) => err.to_string(),
            };

            if attempt < MAX_RETRIES {
                debug!(
                    "event=gateway_invoke module=gateway status=retry attempt={} delay_ms={} error={}",
                    attempt + 1,
                    delay.as_millis(),
                    failure
                );
                sleep(delay).await;
                delay *= 2;
            } else {
                warn!(
                    "event=gateway_invoke module=gateway status=exhausted attempts={} throttled={} error={}",
                    MAX_RETRIES + 1,
                    throttled,
                    failure
                );
            }
        }

        Err(if throttled {
            InvokeError::Throttled
        } else {
            InvokeError::Unavailable
        })
    }

    /// Polls for the single-flight permit at a fixed interval for a bounded
    /// number of cycles, then proceeds without it rather than starve.
    async fn acquire_flight_slot(&self) -> Option<OwnedSemaphorePermit> {
        for _ in 0..MAX_FLIGHT_WAIT_CYCLES {
            match Arc::clone(&self.flight).try_acquire_owned() {
                Ok(permit) => return Some(permit),
                Err(_) => sleep(FLIGHT_POLL_INTERVAL).await,
            }
        }
        Arc::clone(&self.flight).try_acquire_owned().ok()
    }
}

fn fallback_tags() -> Vec<String> {
    FALLBACK_TAGS.iter().map(|tag| tag.to_string()).collect()
}

fn parse_tag_list(text: &str) -> Vec<String> {
    let raw: Vec<String> = text.split(',').map(str::to_string).collect();
    normalize_tags(&raw)
}

fn parse_grammar_suggestions(raw: &str) -> Option<Vec<GrammarSuggestion>> {
    let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| {
                let text = item.get("text")?.as_str()?;
                let suggestion = item.get("suggestion")?.as_str()?;
                if text.is_empty() || suggestion.is_empty() {
                    return None;
                }
                Some(GrammarSuggestion {
                    text: text.to_string(),
                    suggestion: suggestion.to_string(),
                })
            })
            .collect(),
    )
}

fn local_grammar_fallback(text: &str) -> Vec<GrammarSuggestion> {
    if text.contains("teh") {
        vec![GrammarSuggestion {
            text: "teh".to_string(),
            suggestion: "the".to_string(),
        }]
    } else {
        Vec::new()
    }
}
