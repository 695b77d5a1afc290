//! Gemini GenerateContent client used for resource copy.
//!
//! Only non-streaming, single-turn text generation is needed here: one prompt
//! in, one block of text out.

use rimport_types::{ApiKey, truncate_chars};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DEFAULT_REQUEST_TIMEOUT_SECS, http_client_with_timeout, read_capped_body};

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Longest tagline the resource manager accepts.
pub const TAG_LINE_MAX_CHARS: usize = 100;
/// Length the prompt asks the model to stay under.
const TAG_LINE_TARGET_CHARS: usize = 90;

// Thinking tokens count against maxOutputTokens, so both caps leave room for
// a short reasoning pass before the answer.
const TAG_LINE_MAX_OUTPUT_TOKENS: u32 = 2048;
const DESCRIPTION_MAX_OUTPUT_TOKENS: u32 = 8192;
const THINKING_LEVEL: &str = "low";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Gemini request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Gemini response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Gemini returned no text")]
    Empty,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "thinkingConfig")]
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingLevel")]
    thinking_level: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    /// Thought-summary parts are not part of the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(api_key, model, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        api_key: ApiKey,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: http_client_with_timeout(timeout_secs)?,
            api_key,
            model: model.into(),
            base_url: GEMINI_API_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (used by tests and gateways).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Run one prompt and return the trimmed answer text.
    pub async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, GenerateError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens,
                thinking_config: ThinkingConfig {
                    thinking_level: THINKING_LEVEL,
                },
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = read_capped_body(response).await;
        if !status.is_success() {
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)?;
        let Some(candidate) = parsed.candidates.into_iter().next() else {
            tracing::warn!(model = %self.model, "Gemini returned no candidates");
            return Err(GenerateError::Empty);
        };
        let finish_reason = candidate.finish_reason;
        let answer: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let answer = answer.trim();
        if answer.is_empty() {
            tracing::warn!(
                model = %self.model,
                finish_reason = finish_reason.as_deref().unwrap_or("unknown"),
                "Gemini returned no answer text"
            );
            return Err(GenerateError::Empty);
        }
        tracing::debug!(model = %self.model, chars = answer.chars().count(), "Gemini generated text");
        Ok(answer.to_string())
    }

    /// Catchy one-line tagline for a resource.
    pub async fn tag_line(&self, title: &str, description: &str) -> Result<String, GenerateError> {
        let raw = self.generate(&tag_line_prompt(title, description), TAG_LINE_MAX_OUTPUT_TOKENS).await?;
        let cleaned = clean_tag_line(&raw);
        if cleaned.is_empty() {
            return Err(GenerateError::Empty);
        }
        Ok(cleaned)
    }

    /// Rewrite a raw description as forum-ready BBCode/Markdown.
    pub async fn enhance_description(&self, raw_description: &str) -> Result<String, GenerateError> {
        self
            .generate(&description_prompt(raw_description), DESCRIPTION_MAX_OUTPUT_TOKENS).await
    }
}

#[must_use]
pub fn tag_line_prompt(title: &str, description: &str) -> String {
    format!(
        "You are an expert copywriter for a software forum.\n\
         Create a catchy, short \"Tag Line\" (max {TAG_LINE_TARGET_CHARS} characters) for a resource based on this info:\n\
         Title: {title}\n\
         Description: {description}\n\n\
         Return ONLY the tagline string. No quotes."
    )
}

#[must_use]
pub fn description_prompt(raw_description: &str) -> String {
    format!(
        "Format and improve the following resource description for a XenForo forum using BBCode or Markdown.\n\
         Make it sound professional and exciting. Keep the core information intact.\n\n\
         Raw Description:\n{raw_description}"
    )
}

/// First line, surrounding quotes removed, capped at the forum limit.
fn clean_tag_line(raw: &str) -> String {
    let first_line = raw.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    let unquoted = first_line
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim();
    truncate_chars(unquoted, TAG_LINE_MAX_CHARS).trim_end().to_string()
}
