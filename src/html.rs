//! Reduction of an HTML document to prompt-ready plain text.

use itertools::Itertools;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

/// Upper bound for page text sent to the model.
pub const DEFAULT_MAX_LENGTH: usize = 5000;

/// Elements whose text a reader never sees.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "noscript", "template"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedText {
    pub content: String,
    /// Set when `content` was cut to the requested maximum.
    pub truncated: bool,
}

/// Flatten the visible text of `html` in reading order.
///
/// A document without a body yields empty text. The result never exceeds
/// `max_length` characters.
pub fn extract(html: &str, max_length: usize) -> ExtractedText {
    let document = Html::parse_document(html);

    let body = document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "body");

    let content = body.map(element_text).unwrap_or_default();
    truncate(content, max_length)
}

fn element_text(element: ElementRef<'_>) -> String {
    let joined = element
        .children()
        .map(|child| match child.value() {
            Node::Text(text) => text.trim().to_string(),
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => String::new(),
            Node::Element(_) => ElementRef::wrap(child).map(element_text).unwrap_or_default(),
            _ => String::new(),
        })
        .join(" ");
    collapse_whitespace(&joined)
}

/// Collapse whitespace runs to one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

fn truncate(content: String, max_length: usize) -> ExtractedText {
    match content.char_indices().nth(max_length) {
        Some((cut, _)) => {
            debug!(
                total_chars = content.chars().count(),
                max_length, "truncating extracted text"
            );
            ExtractedText {
                content: content[..cut].to_string(),
                truncated: true,
            }
        }
        None => ExtractedText {
            content,
            truncated: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_inline_elements() {
        let text = extract("<body>  Hello <b>World</b>  </body>", 100);
        assert_eq!(text.content, "Hello World");
        assert!(!text.truncated);
    }

    #[test]
    fn test_truncation() {
        let text = extract("Hello World", 5);
        assert_eq!(text.content, "Hello");
        assert_eq!(text.content.chars().count(), 5);
        assert!(text.truncated);
    }

    #[test]
    fn test_truncation_counts_characters() {
        let text = extract("<p>Crème brûlée</p>", 8);
        assert_eq!(text.content, "Crème br");
        assert!(text.truncated);
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        let input = "  Mix the flour\n\n and\tsugar.  Bake 20 min. ";
        let once = extract(input, 1000);
        let twice = extract(&once.content, 1000);
        assert_eq!(once, twice);
        assert_eq!(once.content, "Mix the flour and sugar. Bake 20 min.");
    }

    #[test]
    fn test_skips_invisible_elements() {
        let html = r#"<html><head><title>Title</title><style>p { color: red }</style></head>
            <body><script>var x = 1;</script><h1>Pancakes</h1>
            <noscript>Enable JS</noscript><ul><li>2 eggs</li><li>1 cup milk</li></ul>
            <!-- comment --></body></html>"#;
        assert_eq!(extract(html, 1000).content, "Pancakes 2 eggs 1 cup milk");
    }

    #[test]
    fn test_reading_order_across_blocks() {
        let html = "<body><div><p>Step 1:\n   whisk</p><p>Step 2: fry</p></div></body>";
        assert_eq!(extract(html, 1000).content, "Step 1: whisk Step 2: fry");
    }

    #[test]
    fn test_empty_document() {
        let text = extract("", 100);
        assert_eq!(text.content, "");
        assert!(!text.truncated);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
    }
}
