//! Core data models used throughout NoteOrbit.
//!
//! These types describe the uploaded document, the sections the model found
//! in it, the per-section notes cache, and the session snapshot that is
//! persisted between runs. Field names on the wire match the persisted
//! snapshot layout (`type`, `base64`, `selectedSectionId`, `isDarkMode`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NoteError;

/// The only document types the model is asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl MimeType {
    pub const ALL: [MimeType; 3] = [MimeType::Pdf, MimeType::Jpeg, MimeType::Png];

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Pdf => "application/pdf",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
        }
    }

    /// Parse a declared MIME type. Anything outside the accepted set is a
    /// [`NoteError::Validation`].
    pub fn parse(declared: &str) -> Result<Self, NoteError> {
        let normalized = declared.trim().to_ascii_lowercase();
        MimeType::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| NoteError::Validation(declared.to_string()))
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document held in memory as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: MimeType,
    #[serde(rename = "base64")]
    pub encoded_content: String,
}

/// One logical section of the document, as reported by analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// `section-<index>` in analysis response order.
    pub id: String,
    pub title: String,
    pub summary: String,
}

impl Section {
    pub fn id_for_index(index: usize) -> String {
        format!("section-{}", index)
    }
}

/// Generated markdown keyed by section id.
pub type NotesCache = BTreeMap<String, String>;

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub file: Option<UploadedFile>,
    pub sections: Vec<Section>,
    pub selected_section_id: Option<String>,
    pub notes: NotesCache,
    pub is_dark_mode: bool,
}

impl SessionState {
    /// A state with no document loaded.
    pub fn fresh(is_dark_mode: bool) -> Self {
        Self {
            file: None,
            sections: Vec::new(),
            selected_section_id: None,
            notes: NotesCache::new(),
            is_dark_mode,
        }
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn selected_section(&self) -> Option<&Section> {
        self.selected_section_id
            .as_deref()
            .and_then(|id| self.section(id))
    }

    /// Notes for the selected section, if they have been generated.
    pub fn selected_notes(&self) -> Option<&str> {
        self.selected_section_id
            .as_deref()
            .and_then(|id| self.notes.get(id))
            .map(String::as_str)
    }
}

/// What the session is waiting on. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingState {
    Idle,
    Analyzing,
    GeneratingNotes,
}
