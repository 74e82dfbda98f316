//! Plain-text rendering for the `orbit` CLI.

use super::{highlight_segments, IndexPane, NoteBody, NoteViewer, Segment};

const MARK_ON: &str = "\x1b[7m";
const MARK_OFF: &str = "\x1b[0m";

/// Section index, one entry per line. The selected entry is marked with `>`.
pub fn render_index(index: &IndexPane) -> String {
    match index {
        IndexPane::Skeleton => "Analyzing document structure...\n".to_string(),
        IndexPane::Empty { message } => format!("{}\n", message),
        IndexPane::Entries { entries } => {
            let mut out = String::new();
            for e in entries {
                let marker = if e.selected { '>' } else { ' ' };
                out.push_str(&format!(
                    "{} {:>2}. [{}] {}\n",
                    marker, e.position, e.id, e.title
                ));
                if !e.summary.is_empty() {
                    out.push_str(&format!("        {}\n", e.summary));
                }
            }
            out
        }
    }
}

/// Highlight `term` in `text`. With `ansi` set, matches are shown in
/// reverse video; otherwise they are wrapped in `[[` `]]`.
pub fn highlight(text: &str, term: &str, ansi: bool) -> String {
    let (on, off) = if ansi { (MARK_ON, MARK_OFF) } else { ("[[", "]]") };
    highlight_segments(text, term)
        .into_iter()
        .map(|seg| match seg {
            Segment::Plain(s) => s.to_string(),
            Segment::Match(s) => format!("{}{}{}", on, s, off),
        })
        .collect()
}

/// Title line plus the notes (markdown source) for the viewer.
pub fn render_viewer(viewer: &NoteViewer, find: &str, ansi: bool) -> String {
    let mut out = format!("# {}\n\n", viewer.title);
    match &viewer.body {
        NoteBody::Skeleton => out.push_str("Synthesizing...\n"),
        NoteBody::Empty => {
            out.push_str("Select a section from the index to generate smart notes\n")
        }
        NoteBody::Notes { markdown } => {
            out.push_str(&highlight(markdown, find, ansi));
            if !markdown.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out
}
