//! Server-rendered HTML for the browser UI.
//!
//! The page is plain HTML forms; every action posts to the server and is
//! redirected back to `/`. The two search boxes travel as the `q` (index
//! filter) and `find` (note highlight) query parameters. While the session
//! is analyzing or generating, the page refreshes itself every two seconds.

use std::fmt::Write;

use super::{escape_html, render_notes_html, IndexPane, NoteBody, NoteViewer, Screen, UiFilters};
use crate::intake::ACCEPT_ATTR;
use crate::models::{LoadingState, SessionState};

/// Everything one page render needs.
pub struct PageContext<'a> {
    pub state: &'a SessionState,
    pub screen: &'a Screen,
    pub filters: &'a UiFilters,
    pub loading: LoadingState,
    pub error: Option<&'a str>,
    pub model_name: &'a str,
}

/// `?q=..&find=..` for the current filters, or an empty string.
pub fn filter_query(filters: &UiFilters) -> String {
    let mut pairs = Vec::new();
    if !filters.index_search.is_empty() {
        pairs.push(format!("q={}", urlencoding::encode(&filters.index_search)));
    }
    if !filters.note_find.is_empty() {
        pairs.push(format!("find={}", urlencoding::encode(&filters.note_find)));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

pub fn render_page(ctx: &PageContext<'_>) -> String {
    let mut out = String::with_capacity(8 * 1024);
    let theme = if ctx.state.is_dark_mode { "dark" } else { "light" };

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\" class=\"");
    out.push_str(theme);
    out.push_str("\">\n<head>\n<meta charset=\"utf-8\">\n");
    if ctx.loading != LoadingState::Idle {
        out.push_str("<meta http-equiv=\"refresh\" content=\"2\">\n");
    }
    out.push_str("<title>NoteOrbit</title>\n<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n</head>\n<body>\n");

    render_header(&mut out, ctx);
    if let Some(message) = ctx.error {
        render_error(&mut out, message, ctx.filters);
    }

    match ctx.screen {
        Screen::Upload { busy } => render_upload(&mut out, *busy, ctx.model_name),
        Screen::Workspace { index, viewer } => {
            out.push_str("<div class=\"workspace\">\n");
            render_index(&mut out, index, ctx.filters);
            render_viewer(&mut out, viewer, ctx.filters);
            out.push_str("</div>\n");
        }
    }

    out.push_str(COPY_SCRIPT);
    out.push_str("</body>\n</html>\n");
    out
}

fn render_header(out: &mut String, ctx: &PageContext<'_>) {
    let query = escape_html(&filter_query(ctx.filters));
    out.push_str("<header>\n");
    out.push_str(
        "<form method=\"post\" action=\"/reset\"><button class=\"brand\" type=\"submit\">\
         <span class=\"logo\">N</span> NoteOrbit</button></form>\n",
    );
    if let Some(file) = &ctx.state.file {
        let _ = write!(
            out,
            "<div class=\"file-chip\"><span class=\"file-name\">{}</span>\
             <a href=\"/download\" title=\"Download original file\">download</a>\
             <form method=\"post\" action=\"/reset\"><button type=\"submit\" title=\"Close document\">close</button></form>\
             </div>\n",
            escape_html(&file.name)
        );
    }
    let _ = write!(
        out,
        "<form method=\"post\" action=\"/theme{}\"><button type=\"submit\" aria-label=\"Toggle Theme\">{}</button></form>\n",
        query,
        if ctx.state.is_dark_mode { "light mode" } else { "dark mode" }
    );
    out.push_str("</header>\n");
}

fn render_error(out: &mut String, message: &str, filters: &UiFilters) {
    let _ = write!(
        out,
        "<div class=\"toast\" role=\"alert\"><h3>Analysis Failed</h3><p>{}</p>\
         <form method=\"post\" action=\"/error/dismiss{}\"><button type=\"submit\">dismiss</button></form></div>\n",
        escape_html(message),
        escape_html(&filter_query(filters))
    );
}

fn render_upload(out: &mut String, busy: bool, model_name: &str) {
    let label = if busy {
        "Processing Document..."
    } else {
        "Select Document (PDF/Image)"
    };
    let disabled = if busy { " disabled" } else { "" };
    let _ = write!(
        out,
        "<main class=\"upload\">\n<h2>Smart Notes, <span class=\"accent\">Zero Effort.</span></h2>\n\
         <p>Upload textbooks or research papers. The model maps the structure and writes study guides section by section.</p>\n\
         <form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\n\
         <label>{label}<input type=\"file\" name=\"file\" accept=\"{accept}\" required{disabled}></label>\n\
         <button type=\"submit\"{disabled}>Upload</button>\n\
         <p class=\"hint\">Max 20MB &bull; PDF, JPG, PNG</p>\n</form>\n\
         <p class=\"engine\">Engine: {model}</p>\n</main>\n",
        label = label,
        accept = ACCEPT_ATTR,
        disabled = disabled,
        model = escape_html(model_name),
    );
}

fn render_index(out: &mut String, index: &IndexPane, filters: &UiFilters) {
    out.push_str("<aside class=\"index\">\n<h2>Index</h2>\n");
    let _ = write!(
        out,
        "<form method=\"get\" action=\"/\"><input type=\"text\" name=\"q\" placeholder=\"Search sections...\" value=\"{}\">\
         <input type=\"hidden\" name=\"find\" value=\"{}\"></form>\n",
        escape_html(&filters.index_search),
        escape_html(&filters.note_find)
    );

    match index {
        IndexPane::Skeleton => {
            out.push_str("<div class=\"skeleton\">");
            for _ in 0..5 {
                out.push_str("<div class=\"bar\"></div>");
            }
            out.push_str("<p class=\"pulse\">Analyzing Document Structure...</p></div>\n");
        }
        IndexPane::Empty { message } => {
            let _ = writeln!(out, "<p class=\"empty\">{}</p>", escape_html(message));
        }
        IndexPane::Entries { entries } => {
            let query = escape_html(&filter_query(filters));
            out.push_str("<ol class=\"sections\">\n");
            for entry in entries {
                let _ = write!(
                    out,
                    "<li{cls}><form method=\"post\" action=\"/sections/{id}/select{query}\">\
                     <button type=\"submit\" aria-pressed=\"{pressed}\"><span class=\"pos\">{pos}</span>\
                     <strong>{title}</strong><small>{summary}</small></button></form></li>\n",
                    cls = if entry.selected { " class=\"selected\"" } else { "" },
                    id = urlencoding::encode(&entry.id),
                    query = query,
                    pressed = entry.selected,
                    pos = entry.position,
                    title = escape_html(&entry.title),
                    summary = escape_html(&entry.summary),
                );
            }
            out.push_str("</ol>\n");
        }
    }
    out.push_str("</aside>\n");
}

fn render_viewer(out: &mut String, viewer: &NoteViewer, filters: &UiFilters) {
    out.push_str("<main class=\"viewer\">\n<div class=\"viewer-head\">");
    let _ = write!(
        out,
        "<div><h1>{}</h1><p class=\"tag\">AI Study Assistant</p></div>",
        escape_html(&viewer.title)
    );
    if viewer.generating {
        out.push_str("<span class=\"pulse\">Synthesizing...</span><div class=\"progress\"></div>");
    }
    let _ = write!(
        out,
        "<form method=\"get\" action=\"/\"><input type=\"hidden\" name=\"q\" value=\"{}\">\
         <input type=\"text\" name=\"find\" placeholder=\"Find in notes...\" value=\"{}\"></form>\
         <button type=\"button\" id=\"copy\" title=\"Copy notes to clipboard\"{}>Copy</button>",
        escape_html(&filters.index_search),
        escape_html(&filters.note_find),
        if viewer.can_copy { "" } else { " disabled" }
    );
    out.push_str("</div>\n<div class=\"notes\">\n");

    match &viewer.body {
        NoteBody::Skeleton => {
            out.push_str("<div class=\"skeleton\">");
            for _ in 0..7 {
                out.push_str("<div class=\"bar\"></div>");
            }
            out.push_str("</div>\n");
        }
        NoteBody::Empty => {
            out.push_str(
                "<div class=\"empty\"><p><strong>Workspace Ready</strong></p>\
                 <p>Select a section from the index to generate smart notes</p></div>\n",
            );
        }
        NoteBody::Notes { markdown } => {
            out.push_str("<article>\n");
            out.push_str(&render_notes_html(markdown, &filters.note_find));
            out.push_str("</article>\n");
            let _ = writeln!(
                out,
                "<textarea id=\"raw-notes\" hidden>{}</textarea>",
                escape_html(markdown)
            );
        }
    }
    out.push_str("</div>\n</main>\n");
}

const STYLE: &str = "
body{margin:0;font-family:system-ui,sans-serif;background:#f9fafb;color:#1f2937}
.dark body{background:#030712;color:#e5e7eb}
header{display:flex;gap:1rem;align-items:center;justify-content:space-between;padding:.75rem 1.5rem;border-bottom:1px solid #e5e7eb}
header form{display:inline}
.brand{font-weight:900;font-size:1.25rem;background:none;border:0;color:inherit;cursor:pointer}
.logo{background:#2563eb;color:#fff;border-radius:.5rem;padding:0 .5rem}
.file-chip{display:flex;gap:.5rem;align-items:center;font-size:.8rem}
.toast{position:fixed;top:5rem;right:1.5rem;max-width:28rem;border-left:4px solid #ef4444;background:#fff;padding:1rem;border-radius:1rem}
.dark .toast{background:#1f2937}
.upload{max-width:36rem;margin:4rem auto;text-align:center}
.accent{color:#2563eb}
.hint{font-size:.65rem;text-transform:uppercase;letter-spacing:.1em;color:#9ca3af}
.workspace{display:flex;height:calc(100vh - 4rem)}
.index{width:20rem;overflow-y:auto;padding:1rem;border-right:1px solid #e5e7eb}
.sections{list-style:none;padding:0}
.sections button{width:100%;text-align:left;padding:.75rem;margin-bottom:.5rem;border-radius:.75rem;border:1px solid #e5e7eb;background:#fff;cursor:pointer}
.sections small{display:block;opacity:.7}
.selected button{background:#2563eb;color:#fff}
.pos{font-weight:700;margin-right:.5rem}
.viewer{flex:1;display:flex;flex-direction:column}
.viewer-head{display:flex;gap:1rem;align-items:center;justify-content:space-between;padding:1rem 1.5rem;border-bottom:1px solid #e5e7eb;position:relative}
.tag{font-size:.6rem;color:#2563eb;text-transform:uppercase;letter-spacing:.2em}
.progress{position:absolute;left:0;bottom:0;height:2px;width:100%;background:#2563eb;animation:slide 1.5s infinite linear}
@keyframes slide{from{transform:translateX(-100%)}to{transform:translateX(100%)}}
.notes{flex:1;overflow-y:auto;padding:2rem}
article{max-width:48rem;margin:0 auto;line-height:1.6}
mark{background:#fde68a;border-radius:2px;padding:0 2px}
.skeleton .bar{height:1rem;margin:.75rem 0;background:#e5e7eb;border-radius:.5rem;animation:pulse 1.5s infinite}
@keyframes pulse{50%{opacity:.4}}
.pulse{font-size:.7rem;font-weight:700;color:#2563eb;text-transform:uppercase}
.empty{text-align:center;color:#9ca3af;padding:2.5rem 0}
";

const COPY_SCRIPT: &str = "<script>
(function(){var b=document.getElementById('copy'),r=document.getElementById('raw-notes');
if(!b||!r)return;b.addEventListener('click',function(){navigator.clipboard.writeText(r.value).then(function(){
b.textContent='Copied!';setTimeout(function(){b.textContent='Copy';},2000);});});})();
</script>
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MimeType, Section, UploadedFile};
    use crate::view::build_screen;

    fn render(state: &SessionState, loading: LoadingState, filters: &UiFilters, error: Option<&str>) -> String {
        let screen = build_screen(state, loading, filters);
        render_page(&PageContext {
            state,
            screen: &screen,
            filters,
            loading,
            error,
            model_name: "gemini-test",
        })
    }

    fn loaded() -> SessionState {
        let mut state = SessionState::fresh(true);
        state.file = Some(UploadedFile::from_bytes("<r>.pdf", MimeType::Pdf, b"x"));
        state.sections = vec![Section {
            id: "section-0".into(),
            title: "Intro & Scope".into(),
            summary: "First part.".into(),
        }];
        state
    }

    #[test]
    fn query_encodes_filters() {
        let filters = UiFilters {
            index_search: "a b".into(),
            note_find: "x&y".into(),
        };
        assert_eq!(filter_query(&filters), "?q=a%20b&find=x%26y");
        assert_eq!(filter_query(&UiFilters::default()), "");
    }

    #[test]
    fn upload_page_disables_input_while_busy() {
        let state = SessionState::fresh(false);
        let html = render(&state, LoadingState::Analyzing, &UiFilters::default(), None);
        assert!(html.contains("Processing Document..."));
        assert!(html.contains("required disabled"));
        assert!(html.contains("http-equiv=\"refresh\""));
        assert!(html.contains("class=\"light\""));
    }

    #[test]
    fn workspace_page_escapes_user_content() {
        let html = render(&loaded(), LoadingState::Idle, &UiFilters::default(), Some("Boom <b>"));
        assert!(html.contains("&lt;r&gt;.pdf"));
        assert!(html.contains("Intro &amp; Scope"));
        assert!(html.contains("Boom &lt;b&gt;"));
        assert!(html.contains("action=\"/sections/section-0/select\""));
        assert!(html.contains("Workspace Ready"));
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn notes_are_rendered_with_highlight() {
        let mut state = loaded();
        state.selected_section_id = Some("section-0".into());
        state.notes.insert("section-0".into(), "Key **idea**".into());
        let filters = UiFilters {
            index_search: String::new(),
            note_find: "idea".into(),
        };
        let html = render(&state, LoadingState::Idle, &filters, None);
        assert!(html.contains("<strong><mark>idea</mark></strong>"));
        assert!(html.contains("<h1>Intro &amp; Scope</h1>"));
        assert!(html.contains("/select?find=idea"));
    }
}
