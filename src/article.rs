//! The extraction result record.

use serde::{Deserialize, Serialize};

/// A successfully extracted article.
///
/// Holds the cleaned article markup together with the metadata gathered
/// along the way. Every field except `length` is optional because real
/// pages routinely omit most metadata.
///
/// The struct serializes with serde, so results can be persisted as JSON
/// directly:
///
/// ```rust,no_run
/// use distiller::Distiller;
/// # let html = "<html></html>";
/// let article = Distiller::new(html, None, None)?.parse()?;
/// let json = serde_json::to_string_pretty(&article)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Article title, resolved from JSON-LD, meta tags, or the `<title>`
    /// element heuristics.
    pub title: Option<String>,

    /// Cleaned article markup (the final container's inner HTML).
    pub content: Option<String>,

    /// Flattened text of the article content.
    pub text_content: Option<String>,

    /// Character count of `text_content`.
    pub length: usize,

    /// Short description: metadata excerpt, or the first paragraph's text.
    pub excerpt: Option<String>,

    /// Author name(s), comma-separated when there are several.
    pub byline: Option<String>,

    /// Text direction (`ltr`/`rtl`), from the nearest ancestor of the
    /// chosen container carrying a `dir` attribute.
    pub dir: Option<String>,

    /// Name of the publishing site, from `og:site_name` or the JSON-LD
    /// publisher.
    pub site_name: Option<String>,

    /// Content language, from the root element's `lang` attribute.
    pub lang: Option<String>,

    /// Publication timestamp as found in metadata, usually ISO 8601.
    pub published_time: Option<String>,
}

impl Article {
    pub fn new() -> Self {
        Self::default()
    }
}
