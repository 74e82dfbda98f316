//! Remote model client: structural analysis and per-section note generation.
//!
//! Defines the [`NotesModel`] trait used by the session and the
//! [`GeminiClient`] implementation that calls the Gemini `generateContent`
//! REST endpoint.
//!
//! # Calls
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | [`analyze`](NotesModel::analyze) | document + fixed prompt + JSON schema | `[{title, summary}]` |
//! | [`generate_notes`](NotesModel::generate_notes) | document + prompt naming one section | freeform markdown |
//!
//! Each operation is exactly one HTTP request. There is no retry: a failure is
//! classified (see [`crate::error::classify`]) and returned to the caller.
//!
//! The API key is read from the environment variable named by
//! `ai.api_key_env`. When it is missing, both calls fail with
//! [`NoteError::Configuration`] before anything is sent.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::{AiFailure, NoteError};
use crate::models::{Section, UploadedFile};

/// Returned by note generation when the model sends back no text.
pub const EMPTY_NOTES_FALLBACK: &str = "No notes could be generated for this section.";

const ANALYZE_PROMPT: &str = "Analyze this document. Identify the logical chapters, headings, or major sections.
For each section, provide a title and a very brief one-sentence summary of what it covers.
Return the output as a JSON array of objects with \"title\" and \"summary\" fields.";

/// Instruction for generating notes about one section.
pub fn notes_prompt(section_title: &str) -> String {
    format!(
        "You are a professional educational assistant.
Generate clear, concise, and structured notes for the section titled \"{}\" from the provided document.

Requirements:
1. Use simple, easy-to-understand language.
2. Use bullet points for key details.
3. Highlight key concepts using bold text.
4. Ensure it's informative but avoids unnecessary repetition.
5. If the section contains technical data or steps, list them clearly.
6. Return only the Markdown formatted notes.",
        section_title
    )
}

/// A generative model that can split a document into sections and write
/// notes for one of them.
#[async_trait]
pub trait NotesModel: Send + Sync {
    /// Model identifier, used in logs and error messages.
    fn model_name(&self) -> &str;

    /// Identify the document's sections. All-or-nothing: any failure yields
    /// no sections.
    async fn analyze(&self, file: &UploadedFile) -> Result<Vec<Section>, NoteError>;

    /// Write markdown study notes for `section`.
    async fn generate_notes(
        &self,
        file: &UploadedFile,
        section: &Section,
    ) -> Result<String, NoteError>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Build a client from config, reading the key from the environment.
    ///
    /// A missing key is not an error yet; it is reported on the first call.
    pub fn from_config(config: &AiConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit key (or none).
    pub fn with_api_key(config: &AiConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn credential(&self) -> Result<&str, NoteError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| NoteError::Configuration(self.api_key_env.clone()))
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, NoteError> {
        let api_key = self.credential()?;
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            self.base_url,
            model = self.model,
            api_key = api_key
        );

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| self.fail(transport_failure(err)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(self.fail(http_failure(status.as_u16(), &body_text)));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|err| {
            self.fail(AiFailure::new(format!(
                "Failed to parse Gemini response: {}",
                err.without_url()
            )))
        })?;

        extract_text(parsed).map_err(|f| self.fail(f))
    }

    fn fail(&self, failure: AiFailure) -> NoteError {
        tracing::warn!(
            model = %self.model,
            code = ?failure.code,
            status = %failure.status,
            message = %failure.message,
            "model call failed"
        );
        NoteError::from_failure(&failure, &self.model)
    }
}

#[async_trait]
impl NotesModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, file: &UploadedFile) -> Result<Vec<Section>, NoteError> {
        self.credential()?;
        let started = Instant::now();
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::inline(file),
                Part::Text {
                    text: ANALYZE_PROMPT.to_string(),
                },
            ])],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: section_schema(),
            }),
        };

        let text = self.generate(&request).await?;
        let sections = parse_sections(&text).map_err(|f| self.fail(f))?;
        tracing::info!(
            model = %self.model,
            file = %file.name,
            mime = %file.mime_type,
            sections = sections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(sections)
    }

    async fn generate_notes(
        &self,
        file: &UploadedFile,
        section: &Section,
    ) -> Result<String, NoteError> {
        self.credential()?;
        let started = Instant::now();
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::inline(file),
                Part::Text {
                    text: notes_prompt(&section.title),
                },
            ])],
            generation_config: None,
        };

        let text = self.generate(&request).await?;
        tracing::info!(
            model = %self.model,
            section = %section.id,
            title = %section.title,
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "notes generated"
        );
        if text.is_empty() {
            Ok(EMPTY_NOTES_FALLBACK.to_string())
        } else {
            Ok(text)
        }
    }
}

/// Turn the analysis response text into sections with positional ids.
///
/// Empty text is treated as an empty array. Anything that is not an array of
/// objects with string `title` and `summary` fields is a failure.
pub fn parse_sections(text: &str) -> Result<Vec<Section>, AiFailure> {
    let text = if text.trim().is_empty() { "[]" } else { text };
    let raw: Vec<RawSection> = serde_json::from_str(text)
        .map_err(|e| AiFailure::new(format!("Malformed analysis response: {}", e)))?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, item)| Section {
            id: Section::id_for_index(index),
            title: item.title,
            summary: item.summary,
        })
        .collect())
}

#[derive(Deserialize)]
struct RawSection {
    title: String,
    summary: String,
}

fn section_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "summary": { "type": "STRING" }
            },
            "required": ["title", "summary"]
        }
    })
}

fn transport_failure(err: reqwest::Error) -> AiFailure {
    // The URL carries the API key.
    let unreachable = err.is_connect() || err.is_timeout();
    let failure = AiFailure::new(format!(
        "Gemini API request failed: {}",
        err.without_url()
    ));
    if unreachable {
        failure.transport()
    } else {
        failure
    }
}

/// Build a failure from a non-2xx response, preferring the fields of the
/// Gemini error body over the bare HTTP status.
fn http_failure(http_status: u16, body_text: &str) -> AiFailure {
    match serde_json::from_str::<ErrorWrapper>(body_text) {
        Ok(wrapper) => {
            let body = wrapper.error;
            AiFailure::new(
                body.message
                    .unwrap_or_else(|| format!("HTTP {}", http_status)),
            )
            .with_code(body.code.unwrap_or(http_status))
            .with_status(body.status.unwrap_or_default())
        }
        Err(_) => {
            let message = if body_text.trim().is_empty() {
                format!("HTTP {}", http_status)
            } else {
                body_text.to_string()
            };
            AiFailure::new(message).with_code(http_status)
        }
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A prompt blocked before generation, or a candidate stopped for safety
/// with no text, is a failure carrying the block reason.
fn extract_text(response: GenerateContentResponse) -> Result<String, AiFailure> {
    let candidate = response.candidates.and_then(|c| c.into_iter().next());

    let Some(candidate) = candidate else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AiFailure::new(format!("Prompt blocked: {}", reason)));
        }
        return Ok(String::new());
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(AiFailure::new("Response blocked: SAFETY"));
    }
    Ok(text)
}

// ============ Wire types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
    Text {
        text: String,
    },
}

impl Part {
    fn inline(file: &UploadedFile) -> Self {
        Part::InlineData {
            inline_data: InlineDataPayload {
                mime_type: file.mime_type.as_str().to_string(),
                data: file.payload().to_string(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
}
