//! The orchestrator tying the pipeline stages together.

use kuchikikiki::traits::TendrilSink;
use kuchikikiki::{parse_html, NodeRef};
use scraper::Html;
use url::Url;

use crate::article::Article;
use crate::dom;
use crate::error::{DistillError, Result};
use crate::extract;
use crate::metadata::{self, Metadata};
use crate::options::DistillOptions;
use crate::postprocess;
use crate::preprocess;

/// The main extraction engine.
///
/// One instance handles one document: construct it with the raw HTML and
/// an optional document URL, then call [`parse`](Distiller::parse) to run
/// the pipeline and obtain an [`Article`].
///
/// ## Example
///
/// ```rust,no_run
/// use distiller::{Distiller, DistillOptions};
///
/// let html = std::fs::read_to_string("article.html")?;
///
/// let options = DistillOptions::builder().char_threshold(300).build();
/// let distiller = Distiller::new(&html, Some("https://example.com/post/1"), Some(options))?;
///
/// let article = distiller.parse()?;
/// println!("{}: {} chars", article.title.as_deref().unwrap_or("untitled"), article.length);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Distiller {
    /// Raw document markup; the working tree is parsed from this.
    html: String,

    /// Read-only parse used by the metadata pass.
    document: Html,

    /// Base for resolving relative links in the output.
    base_url: Option<Url>,

    options: DistillOptions,
}

impl Distiller {
    /// Create an engine for one document.
    ///
    /// `url` is validated eagerly; a malformed URL is the only
    /// constructor-time error.
    pub fn new(html: &str, url: Option<&str>, options: Option<DistillOptions>) -> Result<Self> {
        let base_url = url
            .map(|u| Url::parse(u).map_err(|_| DistillError::InvalidUrl(u.to_string())))
            .transpose()?;

        Ok(Self {
            html: html.to_string(),
            document: Html::parse_document(html),
            base_url,
            options: options.unwrap_or_default(),
        })
    }

    /// Run the full pipeline: metadata, preprocessing, the scoring and
    /// retry loop, and output post-processing.
    pub fn parse(self) -> Result<Article> {
        let tree = parse_html().one(self.html.as_str());

        if self.options.max_elements_to_parse > 0 {
            let element_count = tree.descendants().filter(dom::is_element).count();
            if element_count > self.options.max_elements_to_parse {
                return Err(DistillError::TooManyElements(element_count));
            }
        }

        // metadata reads the untouched parse, including scripts
        let document_title = metadata::document_title(&self.document);
        let json_ld = if self.options.disable_json_ld {
            Metadata::default()
        } else {
            metadata::json_ld_metadata(&self.document, &document_title)
        };
        let meta = metadata::resolve_metadata(&self.document, json_ld);

        preprocess::unwrap_noscript_images(&tree);
        preprocess::remove_scripts(&tree);
        preprocess::prep_document(&tree);
        let prepped_html = tree.to_string();

        let title = meta.title.clone().unwrap_or_default();
        let extraction = extract::extract_content(&prepped_html, &title, &self.options)?;

        postprocess::postprocess_content(
            &extraction.content,
            self.base_url.as_ref(),
            &self.options,
        );

        let text_content = extraction.content.text_contents();
        let length = text_content.chars().count();

        let excerpt = meta
            .excerpt
            .clone()
            .or_else(|| first_paragraph_text(&extraction.content));

        Ok(Article {
            title: meta.title,
            content: Some(dom::inner_html(&extraction.content)),
            text_content: Some(text_content),
            length,
            excerpt,
            byline: meta.byline.or(extraction.byline),
            dir: extraction.dir,
            site_name: meta.site_name,
            lang: meta.lang.or(extraction.lang),
            published_time: meta.published_time,
        })
    }
}

fn first_paragraph_text(content: &NodeRef) -> Option<String> {
    dom::descendants_with_tags(content, &["p"])
        .into_iter()
        .map(|paragraph| paragraph.text_contents().trim().to_string())
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_accepts_valid_url() {
        let result = Distiller::new("<html></html>", Some("https://example.com/a"), None);
        assert!(result.is_ok());
    }

    #[test]
    fn constructor_rejects_invalid_url() {
        let result = Distiller::new("<html></html>", Some("not a url"), None);
        assert!(matches!(result, Err(DistillError::InvalidUrl(_))));
    }

    #[test]
    fn element_ceiling_aborts_up_front() {
        let options = DistillOptions::builder().max_elements_to_parse(3).build();
        let html = "<html><body><div><p>one</p><p>two</p><p>three</p></div></body></html>";
        let result = Distiller::new(html, None, Some(options)).unwrap().parse();
        assert!(matches!(result, Err(DistillError::TooManyElements(_))));
    }

    #[test]
    fn zero_ceiling_means_unlimited() {
        let html = "<html><body><div><p>Some ordinary text, short but present.</p></div></body></html>";
        let result = Distiller::new(html, None, None).unwrap().parse();
        // short content resolves via the fallback attempt, not the ceiling
        assert!(result.is_ok());
    }
}
