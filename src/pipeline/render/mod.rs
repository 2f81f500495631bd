//! Bot text → sanitized HTML.
//!
//! Re-run on the whole buffer after every streamed chunk, so everything
//! here is a single pass over the text with no per-call setup.

pub mod basic;
pub mod sentinel;

use pulldown_cmark::{html, Options, Parser};

use crate::config::{RenderMode, WidgetConfig};

pub use basic::{escape_html, render_basic};
pub use sentinel::Sentinel;

/// GitHub-flavored markdown to HTML, then sanitized.
///
/// Soft line breaks stay soft: paragraphs need a blank line.
pub fn render_markdown(text: &str) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(text, options);
    let mut raw_html = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut raw_html, parser);
    ammonia::clean(&raw_html)
}

#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    mode: RenderMode,
    sentinel: Option<Sentinel>,
}

impl MarkdownRenderer {
    pub fn new(mode: RenderMode, sentinel: Option<Sentinel>) -> Self {
        Self { mode, sentinel }
    }

    pub fn from_config(config: &WidgetConfig) -> Self {
        let sentinel = config
            .strip_sentinel
            .then(|| Sentinel::new(&config.sentinel_key));
        Self::new(config.render_mode, sentinel)
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// The part of `raw` the patient should see.
    pub fn visible_text<'a>(&self, raw: &'a str) -> &'a str {
        match &self.sentinel {
            Some(sentinel) => sentinel.strip(raw),
            None => raw,
        }
    }

    pub fn render(&self, raw: &str) -> String {
        let visible = self.visible_text(raw);
        if visible.trim().is_empty() {
            return String::new();
        }
        match self.mode {
            RenderMode::Markdown => render_markdown(visible),
            RenderMode::Basic => render_basic(visible),
        }
    }
}
