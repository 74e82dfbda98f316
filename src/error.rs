//! Error taxonomy for intake, the AI client, and the session.
//!
//! Every failure a user can see is a [`NoteError`]. None of them are fatal:
//! the [`Session`](crate::session::Session) catches them at its boundary and
//! turns them into a single dismissible message via [`NoteError::user_message`].
//!
//! Remote failures are first captured as a structured [`AiFailure`]
//! descriptor (numeric code, status string, message) and then mapped to a
//! closed set of [`AiErrorKind`]s by the pure function [`classify`].

use thiserror::Error;

/// Maximum number of characters of an unclassified remote message shown to
/// the user before it is cut off with `...`.
pub const MAX_DISPLAY_MESSAGE_CHARS: usize = 100;

/// A failure reported by the remote model service or the transport under it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiFailure {
    /// HTTP status or the `error.code` field of the response body.
    pub code: Option<u16>,
    /// The `error.status` field (e.g. `RESOURCE_EXHAUSTED`), empty if absent.
    pub status: String,
    /// Human-readable message from the body or the transport error.
    pub message: String,
    /// Set when the request never reached the service (connect/timeout).
    pub transport: bool,
}

impl AiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn transport(mut self) -> Self {
        self.transport = true;
        self
    }
}

/// Classified remote failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiErrorKind {
    QuotaExceeded,
    AccessDenied,
    ModelNotFound,
    UnsupportedFile,
    SafetyBlock,
    Network,
    /// Anything not matched above. Holds the raw message.
    Other(String),
}

/// Map a failure descriptor to its kind. First match wins; the order is
/// quota, access, model, file type, safety, network, then the catch-all.
pub fn classify(failure: &AiFailure) -> AiErrorKind {
    let msg = failure.message.as_str();
    let code = failure.code;

    if code == Some(429)
        || failure.status == "RESOURCE_EXHAUSTED"
        || msg.contains("429")
        || msg.contains("quota")
    {
        AiErrorKind::QuotaExceeded
    } else if code == Some(403) || msg.contains("403") {
        AiErrorKind::AccessDenied
    } else if code == Some(404) || msg.contains("404") {
        AiErrorKind::ModelNotFound
    } else if msg.contains("file_type") || msg.contains("mimeType") {
        AiErrorKind::UnsupportedFile
    } else if msg.contains("SAFETY") {
        AiErrorKind::SafetyBlock
    } else if failure.transport || msg.contains("NetworkError") || msg.contains("Failed to fetch")
    {
        AiErrorKind::Network
    } else {
        AiErrorKind::Other(failure.message.clone())
    }
}

/// Shorten `message` to [`MAX_DISPLAY_MESSAGE_CHARS`] characters, appending
/// `...` when anything was cut.
pub fn truncate_for_display(message: &str) -> String {
    if message.chars().count() > MAX_DISPLAY_MESSAGE_CHARS {
        let head: String = message.chars().take(MAX_DISPLAY_MESSAGE_CHARS).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}

/// Every user-visible failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NoteError {
    /// The upload's MIME type is not pdf, jpeg or png.
    #[error("unsupported upload type: {0}")]
    Validation(String),

    /// The local file could not be read into memory.
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The model credential is not configured.
    #[error("missing credential: environment variable {0} is not set")]
    Configuration(String),

    /// The remote model call failed.
    #[error("model call failed ({model}): {kind:?}")]
    Ai { kind: AiErrorKind, model: String },
}

impl NoteError {
    /// Build an [`NoteError::Ai`] by classifying a raw failure.
    pub fn from_failure(failure: &AiFailure, model: &str) -> Self {
        NoteError::Ai {
            kind: classify(failure),
            model: model.to_string(),
        }
    }

    /// The fixed message shown in the error banner for this failure.
    pub fn user_message(&self) -> String {
        match self {
            NoteError::Validation(_) => {
                "Invalid file type. Please upload a PDF, JPG, or PNG image.".to_string()
            }
            NoteError::Read { .. } => "Failed to read the file. Please try again.".to_string(),
            NoteError::Configuration(_) => {
                "API Key is missing. Please check your environment configuration.".to_string()
            }
            NoteError::Ai { kind, model } => match kind {
                AiErrorKind::QuotaExceeded => "API Quota Exceeded: You've reached the limit for the free tier. \
                     Please wait a minute before trying again, or check your Gemini API billing settings at ai.google.dev."
                    .to_string(),
                AiErrorKind::AccessDenied => format!(
                    "Access Denied: Your API key does not have permission for this model. \
                     Ensure the '{}' model is enabled in your project.",
                    model
                ),
                AiErrorKind::ModelNotFound => "Model Not Found: The requested AI model might be deprecated \
                     or unavailable in your region."
                    .to_string(),
                AiErrorKind::UnsupportedFile => "Unsupported File: The document format is not recognized. \
                     Please use standard PDF, JPG, or PNG files."
                    .to_string(),
                AiErrorKind::SafetyBlock => "Safety Block: The document contains content that was flagged \
                     by the AI's safety filters."
                    .to_string(),
                AiErrorKind::Network => {
                    "Network Error: Please check your internet connection and try again."
                        .to_string()
                }
                AiErrorKind::Other(raw) => format!("System Error: {}", truncate_for_display(raw)),
            },
        }
    }
}
