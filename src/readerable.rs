//! Cheap pre-flight check: is a full extraction likely to succeed?
//!
//! Scans paragraph-like nodes and accumulates a score from their text
//! lengths, without any of the scoring, cleaning, or retry machinery.
//! Useful to filter documents in bulk before paying for [`Distiller::parse`].
//!
//! [`Distiller::parse`]: crate::Distiller::parse

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::constants::REGEXPS;

static CONTENT_NODE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, pre, article, div > br").unwrap());

/// Thresholds for [`is_probably_readerable`].
#[derive(Debug, Clone)]
pub struct ReaderableOptions {
    /// Paragraphs shorter than this are ignored.
    ///
    /// Default: `140`
    pub min_content_length: usize,

    /// Accumulated score needed to call the document readerable.
    ///
    /// Default: `20.0`
    pub min_score: f64,
}

impl Default for ReaderableOptions {
    fn default() -> Self {
        Self {
            min_content_length: 140,
            min_score: 20.0,
        }
    }
}

/// Quickly estimate whether the document carries extractable article
/// content.
///
/// ## Example
///
/// ```rust
/// use distiller::{is_probably_readerable, ReaderableOptions};
///
/// let page = r#"<html><body><article>
///     <p>A long paragraph of narrative prose, the kind of sustained text
///     that articles are made of and navigation chrome is not, easily
///     clearing the minimum length bar for a single content node.</p>
/// </article></body></html>"#;
///
/// let relaxed = ReaderableOptions { min_content_length: 100, min_score: 5.0 };
/// assert!(is_probably_readerable(page, Some(relaxed)));
///
/// assert!(!is_probably_readerable("<p>Short.</p>", None));
/// ```
pub fn is_probably_readerable(html: &str, options: Option<ReaderableOptions>) -> bool {
    let options = options.unwrap_or_default();
    let document = Html::parse_document(html);

    let mut score = 0.0;

    for node in document.select(&CONTENT_NODE_SELECTOR) {
        // a br hit stands in for its unwrapped parent div
        let node = if node.value().name() == "br" {
            match node.parent().and_then(ElementRef::wrap) {
                Some(parent) => parent,
                None => continue,
            }
        } else {
            node
        };

        if !looks_visible(&node) {
            continue;
        }

        let match_string = format!(
            "{} {}",
            node.value().attr("class").unwrap_or(""),
            node.value().attr("id").unwrap_or("")
        );
        let unlikely = REGEXPS
            .unlikely_candidates
            .iter()
            .all(|pattern| pattern.is_match(&match_string))
            && !REGEXPS.maybe_candidate.is_match(&match_string);
        if unlikely {
            continue;
        }

        let text = node.text().collect::<String>();
        let text_length = text.trim().chars().count();
        if text_length < options.min_content_length {
            continue;
        }

        score += ((text_length - options.min_content_length) as f64).sqrt();
        if score > options.min_score {
            return true;
        }
    }

    false
}

fn looks_visible(node: &ElementRef) -> bool {
    if let Some(style) = node.value().attr("style") {
        if REGEXPS.display_none.is_match(style) {
            return false;
        }
    }
    if node.value().attr("hidden").is_some() {
        return false;
    }
    if node.value().attr("aria-hidden") == Some("true") {
        let class = node.value().attr("class").unwrap_or("");
        if !class.contains("fallback-image") {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAGRAPH: &str = "This paragraph carries enough narrative text to clear the \
        minimum content length used by the quick check, which looks for sustained prose \
        rather than short navigation labels. It keeps going for several more clauses, \
        because the scoring takes the square root of the surplus length, and a pair of \
        genuinely substantial paragraphs should comfortably push the accumulated total \
        past the default acceptance threshold.";

    #[test]
    fn article_page_is_readerable() {
        let html = format!(
            "<html><body><article><p>{PARAGRAPH}</p><p>{PARAGRAPH}</p></article></body></html>"
        );
        assert!(is_probably_readerable(&html, None));
    }

    #[test]
    fn sparse_page_is_not_readerable() {
        let html = "<html><body><p>Short note.</p></body></html>";
        assert!(!is_probably_readerable(html, None));
    }

    #[test]
    fn hidden_content_does_not_count() {
        let html = format!(
            "<html><body><div style='display:none'><p>{PARAGRAPH}</p>\
             <p>{PARAGRAPH}</p></div></body></html>"
        );
        // paragraphs themselves are visible, but nothing else on the page is;
        // the check only inspects the paragraph nodes, so hide those directly
        let direct = format!(
            "<html><body><p style='display:none'>{PARAGRAPH}</p>\
             <p hidden>{PARAGRAPH}</p></body></html>"
        );
        assert!(is_probably_readerable(&html, None));
        assert!(!is_probably_readerable(&direct, None));
    }

    #[test]
    fn stricter_thresholds_reject_borderline_pages() {
        let html = format!("<html><body><p>{PARAGRAPH}</p><p>{PARAGRAPH}</p></body></html>");
        assert!(is_probably_readerable(&html, None));
        let strict = ReaderableOptions {
            min_content_length: 140,
            min_score: 50.0,
        };
        assert!(!is_probably_readerable(&html, Some(strict)));
    }
}
