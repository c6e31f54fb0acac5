//! Markdown rendering for feedback documents.
//!
//! The whole accumulated document is re-rendered on every update; each
//! render is a full replace, never an incremental patch. Raw HTML in
//! the source is escaped rather than passed through, so the output
//! contains only markup generated from markdown itself.

use crate::display::{FeedbackSink, SessionState};
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::sync::Mutex;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use tracing::debug;

pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let theme_set = ThemeSet::load_defaults();
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme: theme_set.themes["InspiredGitHub"].clone(),
        }
    }

    /// Convert markdown to sanitized HTML. Pure: identical input yields
    /// identical output.
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut events = Vec::new();
        let mut code_lang: Option<String> = None;
        let mut code_buf = String::new();
        let mut in_code_block = false;

        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_buf.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let highlighted = self.highlight(code_lang.take().as_deref(), &code_buf);
                    events.push(Event::Html(highlighted.into()));
                    code_buf.clear();
                }
                Event::Text(text) if in_code_block => code_buf.push_str(&text),
                // Raw HTML is demoted to text, which escapes it on output
                Event::Html(raw) => events.push(Event::Text(raw)),
                Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn highlight(&self, lang: Option<&str>, code: &str) -> String {
        let syntax = lang
            .and_then(|token| self.syntax_set.find_syntax_by_token(token))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        match highlighted_html_for_string(code, &self.syntax_set, syntax, &self.theme) {
            Ok(html) => html,
            Err(e) => {
                debug!(error = %e, "syntax highlighting failed, emitting plain code block");
                let mut out = String::from("<pre><code>");
                for c in code.chars() {
                    match c {
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        '&' => out.push_str("&amp;"),
                        _ => out.push(c),
                    }
                }
                out.push_str("</code></pre>");
                out
            }
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that keeps a rendered HTML view of the document, re-rendered
/// from scratch on every content update.
pub struct HtmlDocumentSink {
    renderer: MarkdownRenderer,
    html: Mutex<String>,
    status: Mutex<String>,
}

impl HtmlDocumentSink {
    pub fn new() -> Self {
        Self {
            renderer: MarkdownRenderer::new(),
            html: Mutex::new(String::new()),
            status: Mutex::new(String::new()),
        }
    }

    /// The most recent full render
    pub fn latest_html(&self) -> String {
        self.html.lock().expect("render lock poisoned").clone()
    }

    pub fn latest_status(&self) -> String {
        self.status.lock().expect("render lock poisoned").clone()
    }
}

impl Default for HtmlDocumentSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSink for HtmlDocumentSink {
    fn on_content(&self, _delta: &str, document: &str) {
        let rendered = self.renderer.render(document);
        *self.html.lock().expect("render lock poisoned") = rendered;
    }

    fn on_status(&self, status: &str) {
        *self.status.lock().expect("render lock poisoned") = status.to_string();
    }

    fn on_state_change(&self, state: SessionState) {
        tracing::debug!(%state, "session state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_text() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("## Strengths\n\nClear argument.");
        assert!(html.contains("<h2>Strengths</h2>"));
        assert!(html.contains("<p>Clear argument.</p>"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let renderer = MarkdownRenderer::new();
        let source = "# Intro\n\nSome *emphasis* and `code`.\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(renderer.render(source), renderer.render(source));
    }

    #[test]
    fn script_tags_are_escaped() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("hello <script>alert(1)</script> world");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn inline_event_handlers_are_escaped() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("<img src=x onerror=alert(1)>");
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn fenced_code_is_highlighted() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nlet x = 1;\n```\n");
        // syntect output carries inline styling; the raw code must survive
        assert!(html.contains("<pre"));
        assert!(html.contains("let"));
    }

    #[test]
    fn html_document_sink_tracks_latest_render() {
        let sink = HtmlDocumentSink::new();
        sink.on_content("# Intro\n", "# Intro\n");
        assert!(sink.latest_html().contains("<h1>Intro</h1>"));
        sink.on_content("more", "# Intro\nmore text");
        assert!(sink.latest_html().contains("more text"));
    }
}
