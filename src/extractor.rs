//! HTML-to-text extraction feeding the embedding and anchor stages.

use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::debug;

/// Subtrees that carry boilerplate rather than page content.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "head", "noscript", "template",
];

/// Errors surfaced while extracting content from a page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The HTML input was empty.
    #[error("HTML must be a non-empty string")]
    EmptyHtml,
    /// The document yielded no visible text.
    #[error("no content extracted from HTML")]
    EmptyText,
}

/// Plain-text view of one fetched page.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Document title, empty when the page has none.
    pub title: String,
    /// Whitespace-collapsed visible text.
    pub text: String,
    /// Word count of `text`.
    pub word_count: usize,
}

/// Stateless HTML content extraction service.
#[derive(Clone)]
pub struct Extractor {
    title: Selector,
}

impl Extractor {
    /// Builds a new extractor instance.
    pub fn new() -> Self {
        Self {
            title: Selector::parse("title").expect("title selector"),
        }
    }

    /// Extracts title and visible text, dropping boilerplate subtrees.
    pub fn extract(&self, html: &str) -> Result<ExtractedContent, ExtractError> {
        if html.trim().is_empty() {
            return Err(ExtractError::EmptyHtml);
        }

        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let mut raw = String::new();
        collect_text(document.root_element(), &mut raw);
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.is_empty() {
            return Err(ExtractError::EmptyText);
        }

        let word_count = text.split_whitespace().count();
        debug!(chars = text.len(), word_count, "extracted page content");

        Ok(ExtractedContent {
            title,
            text,
            word_count,
        })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            Node::Element(el) => {
                if EXCLUDED_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}
