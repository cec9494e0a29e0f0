use html2text::render::text_renderer::TrivialDecorator;

use crate::feed::BodyKind;
use crate::util::{normalize_whitespace, strip_control_chars};

/// Wide enough that html2text never wraps a paragraph.
const RENDER_WIDTH: usize = 10_000;

/// Turns entry markup into the plain text stored on an update.
pub trait TextExtractor: Send + Sync {
    fn extract_plain_text(&self, markup: &str) -> String;

    /// Extracts only when the body is markup, then sanitizes either way.
    fn body_text(&self, body: &str, kind: BodyKind) -> String {
        let text = match kind {
            BodyKind::Markup => self.extract_plain_text(body),
            BodyKind::PlainText => body.to_string(),
        };
        normalize_whitespace(&strip_control_chars(&text))
    }
}

/// `html2text`-based extractor with no decoration (no `*emphasis*`, no link
/// footnotes).
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTextExtractor;

impl TextExtractor for HtmlTextExtractor {
    fn extract_plain_text(&self, markup: &str) -> String {
        match html2text::config::with_decorator(TrivialDecorator::new())
            .string_from_read(markup.as_bytes(), RENDER_WIDTH)
        {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "HTML extraction failed, stripping tags instead");
                strip_tags(markup)
            }
        }
    }
}

/// Drops everything between `<` and `>`, honouring quoted attribute values.
/// An unterminated tag is dropped to the end of input.
fn strip_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    let mut quote: Option<char> = None;

    for c in markup.chars() {
        match (in_tag, quote, c) {
            (false, _, '<') => in_tag = true,
            (false, _, _) => out.push(c),
            (true, Some(q), _) if c == q => quote = None,
            (true, Some(_), _) => {}
            (true, None, '"' | '\'') => quote = Some(c),
            (true, None, '>') => in_tag = false,
            (true, None, _) => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags() {
        let text = HtmlTextExtractor.body_text("<p>Hello <b>world</b></p>", BodyKind::Markup);
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn test_decodes_entities() {
        let text = HtmlTextExtractor.body_text("<p>fish &amp; chips</p>", BodyKind::Markup);
        assert_eq!(text, "fish & chips");
    }

    #[test]
    fn test_plain_text_not_parsed_as_html() {
        let text = HtmlTextExtractor.body_text("a <b> is not bold", BodyKind::PlainText);
        assert_eq!(text, "a <b> is not bold");
    }

    #[test]
    fn test_control_chars_removed_after_extraction() {
        let text = HtmlTextExtractor.body_text("<p>hi\x1b[31mred</p>", BodyKind::Markup);
        assert!(!text.contains('\x1b'));
        assert!(text.contains("hi"));
    }

    #[test]
    fn test_custom_extractor() {
        struct Upper;
        impl TextExtractor for Upper {
            fn extract_plain_text(&self, markup: &str) -> String {
                markup.to_uppercase()
            }
        }
        assert_eq!(Upper.body_text("abc", BodyKind::Markup), "ABC");
        assert_eq!(Upper.body_text("abc", BodyKind::PlainText), "abc");
    }

    #[test]
    fn test_strip_tags_fallback_leaves_no_markup() {
        assert_eq!(strip_tags("<p>a <b>bold</b></p>"), "a bold");
        assert_eq!(strip_tags(r#"<a title="x > y" href='/'>link</a>"#), "link");
        assert_eq!(strip_tags("tail <img src="), "tail ");
        assert_eq!(strip_tags("no tags"), "no tags");
    }
}
