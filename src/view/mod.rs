//! Presentation: pure functions from session state to what the user sees.
//!
//! Nothing here mutates the session. The two search boxes (index filter and
//! find-in-notes) live in [`UiFilters`], which is supplied per render and
//! never persisted.
//!
//! - [`build_screen`] picks the upload prompt or the two-pane workspace.
//! - [`filter_sections`] narrows the section index.
//! - [`highlight_segments`] / [`render_notes_html`] mark find-in-notes hits.
//! - [`html`] and [`terminal`] turn a [`Screen`] into a page or CLI text.

pub mod html;
pub mod terminal;

use pulldown_cmark::{html as md_html, Event, Options, Parser};
use regex::RegexBuilder;
use serde::Serialize;

use crate::models::{LoadingState, Section, SessionState};

/// Title of the note viewer when no section is selected.
pub const DEFAULT_VIEWER_TITLE: &str = "Study Session";

/// Ephemeral, per-render UI inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiFilters {
    pub index_search: String,
    pub note_find: String,
}

/// One row of the section index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// 1-based position in the full (unfiltered) section list.
    pub position: usize,
    pub id: String,
    pub title: String,
    pub summary: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexPane {
    /// Analysis is running; show placeholders.
    Skeleton,
    Entries { entries: Vec<IndexEntry> },
    Empty { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteBody {
    /// Generation is running; show placeholders and a progress bar.
    Skeleton,
    Notes { markdown: String },
    /// Nothing selected yet, or nothing generated for the selection.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteViewer {
    pub title: String,
    pub generating: bool,
    pub body: NoteBody,
    pub can_copy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Upload { busy: bool },
    Workspace { index: IndexPane, viewer: NoteViewer },
}

/// Sections whose title or summary contains `term`, case-insensitively.
/// A blank term keeps everything. Order and positions are preserved.
pub fn filter_sections<'a>(sections: &'a [Section], term: &str) -> Vec<(usize, &'a Section)> {
    let needle = term.trim().to_lowercase();
    sections
        .iter()
        .enumerate()
        .map(|(i, s)| (i + 1, s))
        .filter(|(_, s)| {
            needle.is_empty()
                || s.title.to_lowercase().contains(&needle)
                || s.summary.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Decide what to show for `state` given what is loading.
pub fn build_screen(state: &SessionState, loading: LoadingState, filters: &UiFilters) -> Screen {
    if state.file.is_none() {
        return Screen::Upload {
            busy: loading == LoadingState::Analyzing,
        };
    }

    let index = if loading == LoadingState::Analyzing {
        IndexPane::Skeleton
    } else {
        let selected = state.selected_section_id.as_deref();
        let entries: Vec<IndexEntry> = filter_sections(&state.sections, &filters.index_search)
            .into_iter()
            .map(|(position, s)| IndexEntry {
                position,
                id: s.id.clone(),
                title: s.title.clone(),
                summary: s.summary.clone(),
                selected: selected == Some(s.id.as_str()),
            })
            .collect();
        if entries.is_empty() {
            let message = if filters.index_search.trim().is_empty() {
                "Upload a document to see the index".to_string()
            } else {
                format!("No results for \"{}\"", filters.index_search)
            };
            IndexPane::Empty { message }
        } else {
            IndexPane::Entries { entries }
        }
    };

    let generating = loading == LoadingState::GeneratingNotes;
    let notes = state.selected_notes().unwrap_or("");
    let body = if generating {
        NoteBody::Skeleton
    } else if notes.is_empty() {
        NoteBody::Empty
    } else {
        NoteBody::Notes {
            markdown: notes.to_string(),
        }
    };

    let viewer = NoteViewer {
        title: state
            .selected_section()
            .map(|s| s.title.clone())
            .unwrap_or_else(|| DEFAULT_VIEWER_TITLE.to_string()),
        generating,
        can_copy: !notes.is_empty() && !generating,
        body,
    };

    Screen::Workspace { index, viewer }
}

/// A piece of text, either as-is or matching the find term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    Match(&'a str),
}

/// Split `text` around case-insensitive literal matches of `term`.
/// A blank term yields the whole text as one plain segment.
pub fn highlight_segments<'a>(text: &'a str, term: &str) -> Vec<Segment<'a>> {
    if term.trim().is_empty() || text.is_empty() {
        return vec![Segment::Plain(text)];
    }
    let Ok(re) = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    else {
        return vec![Segment::Plain(text)];
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Plain(&text[last..m.start()]));
        }
        segments.push(Segment::Match(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Plain(&text[last..]));
    }
    segments
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn mark_html(text: &str, term: &str) -> String {
    highlight_segments(text, term)
        .into_iter()
        .map(|seg| match seg {
            Segment::Plain(s) => escape_html(s),
            Segment::Match(s) => format!("<mark>{}</mark>", escape_html(s)),
        })
        .collect()
}

/// Render notes markdown to HTML, wrapping find-term hits in `<mark>`.
///
/// Raw HTML in the notes is shown as text. Only text and inline code are
/// searched; the notes themselves are not modified.
pub fn render_notes_html(markdown: &str, find: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Text(text) | Event::Html(text) => Event::Html(mark_html(&text, find).into()),
        Event::Code(code) => {
            Event::Html(format!("<code>{}</code>", mark_html(&code, find)).into())
        }
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 2);
    md_html::push_html(&mut out, events);
    out
}
