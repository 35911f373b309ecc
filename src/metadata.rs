//! Metadata extraction from structured data and meta tags.
//!
//! This runs before the content pipeline on a read-only parse of the raw
//! document; the resolved title also feeds the extractor's duplicate
//! header suppression. Sources are consulted in priority order: JSON-LD,
//! then `property`/`name` meta tags, then the `<title>` heuristics.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;

use crate::constants::REGEXPS;
use crate::text;

/// Metadata gathered ahead of content extraction.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<String>,
    pub lang: Option<String>,
}

static JSON_LD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type='application/ld+json']").unwrap());
static META_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2").unwrap());
static HTML_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("html").unwrap());

static META_PROPERTY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(article|dc|dcterm|og|twitter)\s*:\s*(author|creator|description|published_time|title|site_name)\s*")
        .unwrap()
});
static META_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:(?:article|dc|dcterm|og|twitter|parsely|weibo:(?:article|webpage))\s*[-\.:]\s*)?(author|author_name|creator|pub-date|description|title|site_name)\s*$")
        .unwrap()
});

/// Parse `application/ld+json` blocks for schema.org article metadata.
pub fn json_ld_metadata(document: &Html, document_title: &str) -> Metadata {
    let mut metadata = Metadata::default();

    for script in document.select(&JSON_LD_SELECTOR) {
        let raw = script.text().collect::<String>();
        let raw = raw
            .trim()
            .trim_start_matches("<![CDATA[")
            .trim_end_matches("]]>")
            .trim();

        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            // malformed blocks are skipped, never fatal
            Err(_) => continue,
        };

        let parsed = match resolve_article_object(parsed) {
            Some(object) => object,
            None => continue,
        };

        if metadata.title.is_none() {
            metadata.title = json_ld_title(&parsed, document_title);
        }
        if metadata.byline.is_none() {
            metadata.byline = json_ld_byline(&parsed);
        }
        if metadata.excerpt.is_none() {
            metadata.excerpt = parsed
                .get("description")
                .and_then(Value::as_str)
                .map(|description| description.trim().to_string());
        }
        if metadata.site_name.is_none() {
            metadata.site_name = parsed
                .get("publisher")
                .and_then(|publisher| publisher.get("name"))
                .and_then(Value::as_str)
                .map(|name| name.trim().to_string());
        }
        if metadata.published_time.is_none() {
            metadata.published_time = parsed
                .get("datePublished")
                .and_then(Value::as_str)
                .map(|date| date.trim().to_string());
        }
    }

    metadata
}

/// Locate the schema.org article object in a JSON-LD payload, looking
/// through top-level arrays and `@graph` collections.
fn resolve_article_object(parsed: Value) -> Option<Value> {
    let is_article_type = |value: &Value| {
        value
            .get("@type")
            .and_then(Value::as_str)
            .map(|type_name| REGEXPS.json_ld_article_types.is_match(type_name))
            .unwrap_or(false)
    };

    let parsed = match parsed {
        Value::Array(items) => items.into_iter().find(|item| is_article_type(item))?,
        other => other,
    };

    let has_schema_context = match parsed.get("@context") {
        Some(Value::String(context)) => REGEXPS.schema_org.is_match(context),
        Some(Value::Object(context)) => context
            .get("@vocab")
            .and_then(Value::as_str)
            .map(|vocab| REGEXPS.schema_org.is_match(vocab))
            .unwrap_or(false),
        _ => false,
    };
    if !has_schema_context {
        return None;
    }

    let parsed = if parsed.get("@type").is_none() {
        parsed
            .get("@graph")
            .and_then(Value::as_array)
            .and_then(|graph| graph.iter().find(|item| is_article_type(item)))
            .cloned()?
    } else {
        parsed
    };

    is_article_type(&parsed).then_some(parsed)
}

/// Prefer `name`, falling back to `headline` — unless only `headline`
/// resembles the page's own title, which marks `name` as something else
/// (often the publisher).
fn json_ld_title(parsed: &Value, document_title: &str) -> Option<String> {
    let name = parsed.get("name").and_then(Value::as_str);
    let headline = parsed.get("headline").and_then(Value::as_str);

    match (name, headline) {
        (Some(name), Some(headline)) if name != headline => {
            let name_matches = text::similarity(name, document_title) > 0.75;
            let headline_matches = text::similarity(headline, document_title) > 0.75;
            if headline_matches && !name_matches {
                Some(headline.trim().to_string())
            } else {
                Some(name.trim().to_string())
            }
        }
        (Some(name), _) => Some(name.trim().to_string()),
        (None, Some(headline)) => Some(headline.trim().to_string()),
        (None, None) => None,
    }
}

fn json_ld_byline(parsed: &Value) -> Option<String> {
    let author = parsed.get("author")?;

    if let Some(name) = author.get("name").and_then(Value::as_str) {
        return Some(name.trim().to_string());
    }

    if let Some(authors) = author.as_array() {
        let names: Vec<String> = authors
            .iter()
            .filter_map(|author| author.get("name").and_then(Value::as_str))
            .map(|name| name.trim().to_string())
            .collect();
        if !names.is_empty() {
            return Some(names.join(", "));
        }
    }

    None
}

/// Resolve the final metadata from JSON-LD plus meta tags, with the
/// document heuristics as last resort.
pub fn resolve_metadata(document: &Html, json_ld: Metadata) -> Metadata {
    let values = collect_meta_values(document);
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| values.get(*key))
            .cloned()
    };

    let mut metadata = Metadata::default();

    metadata.title = json_ld.title.or_else(|| {
        pick(&[
            "dc:title",
            "dcterm:title",
            "og:title",
            "weibo:article:title",
            "weibo:webpage:title",
            "title",
            "twitter:title",
            "parsely-title",
        ])
    });
    if metadata.title.is_none() {
        let heuristic = document_title(document);
        if !heuristic.is_empty() {
            metadata.title = Some(heuristic);
        }
    }

    metadata.byline = json_ld.byline.or_else(|| {
        pick(&[
            "dc:creator",
            "dcterm:creator",
            "author",
            "parsely-author",
            "article:author",
        ])
    });

    metadata.excerpt = json_ld.excerpt.or_else(|| {
        pick(&[
            "dc:description",
            "dcterm:description",
            "og:description",
            "weibo:article:description",
            "weibo:webpage:description",
            "description",
            "twitter:description",
        ])
    });

    metadata.site_name = json_ld.site_name.or_else(|| pick(&["og:site_name"]));

    metadata.published_time = json_ld
        .published_time
        .or_else(|| pick(&["article:published_time", "parsely-pub-date"]));

    metadata.lang = document_language(document);

    metadata.title = metadata
        .title
        .map(|title| text::unescape_html_entities(&title));
    metadata.byline = metadata
        .byline
        .map(|byline| text::unescape_html_entities(&byline))
        .filter(|byline| !byline.trim().is_empty());
    metadata.excerpt = metadata
        .excerpt
        .map(|excerpt| text::unescape_html_entities(&excerpt))
        .filter(|excerpt| !excerpt.trim().is_empty());
    metadata.site_name = metadata
        .site_name
        .map(|site_name| text::unescape_html_entities(&site_name));

    metadata
}

/// Gather `<meta>` values keyed by their normalized property/name.
fn collect_meta_values(document: &Html) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for meta in document.select(&META_SELECTOR) {
        let content = match meta.value().attr("content") {
            Some(content) if !content.is_empty() => content,
            _ => continue,
        };

        let mut property_matched = false;
        if let Some(property) = meta.value().attr("property") {
            // properties can be space-separated lists
            for candidate in property.split_whitespace() {
                if let Some(matched) = META_PROPERTY_PATTERN.find(candidate) {
                    let key = matched
                        .as_str()
                        .to_lowercase()
                        .replace(char::is_whitespace, "");
                    values.insert(key, content.trim().to_string());
                    property_matched = true;
                }
            }
        }

        if !property_matched {
            if let Some(name) = meta.value().attr("name") {
                if META_NAME_PATTERN.is_match(name) {
                    let key = name
                        .to_lowercase()
                        .replace(char::is_whitespace, "")
                        .replace('.', ":");
                    values.insert(key, content.trim().to_string());
                }
            }
        }
    }

    values
}

/// Title from the `<title>` element, refined: hierarchical separators
/// and site-name colons are cut away, and a lone `<h1>` substitutes for
/// degenerate titles.
pub fn document_title(document: &Html) -> String {
    let orig_title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut cur_title = orig_title.clone();
    let mut had_hierarchical_separators = false;

    if REGEXPS.title_separators.is_match(&cur_title) {
        had_hierarchical_separators = true;
        cur_title = REGEXPS
            .title_before_separator
            .replace(&orig_title, "$1")
            .into_owned();
        if text::word_count(&cur_title) < 3 {
            cur_title = REGEXPS
                .title_after_separator
                .replace(&orig_title, "$1")
                .into_owned();
        }
    } else if cur_title.contains(": ") {
        let heading_matches = document.select(&HEADING_SELECTOR).any(|heading| {
            heading.text().collect::<String>().trim() == cur_title.trim()
        });
        if !heading_matches {
            cur_title = orig_title
                .rfind(':')
                .map(|index| orig_title[index + 1..].to_string())
                .unwrap_or_else(|| orig_title.clone());
            if text::word_count(&cur_title) < 3 {
                cur_title = orig_title
                    .find(':')
                    .map(|index| orig_title[index + 1..].to_string())
                    .unwrap_or_else(|| orig_title.clone());
            } else if let Some(index) = orig_title.find(':') {
                if text::word_count(&orig_title[..index]) > 5 {
                    cur_title = orig_title.clone();
                }
            }
        }
    } else if cur_title.chars().count() > 150 || cur_title.chars().count() < 15 {
        let h1s: Vec<ElementRef> = document.select(&H1_SELECTOR).collect();
        if h1s.len() == 1 {
            cur_title = h1s[0].text().collect::<String>().trim().to_string();
        }
    }

    cur_title = text::normalize_whitespace(&cur_title);

    // a refinement that shaved the title down to almost nothing was
    // probably wrong; fall back to the original
    let cur_word_count = text::word_count(&cur_title);
    if cur_word_count <= 4 {
        let separator_stripped = orig_title
            .chars()
            .filter(|c| !matches!(c, '|' | '-' | '\\' | '/' | '>' | '»'))
            .collect::<String>();
        if !had_hierarchical_separators
            || cur_word_count != text::word_count(&separator_stripped).saturating_sub(1)
        {
            cur_title = orig_title;
        }
    }

    cur_title
}

fn document_language(document: &Html) -> Option<String> {
    document
        .select(&HTML_SELECTOR)
        .next()
        .and_then(|html| html.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(html: &str) -> Metadata {
        let document = Html::parse_document(html);
        let title = document_title(&document);
        let json_ld = json_ld_metadata(&document, &title);
        resolve_metadata(&document, json_ld)
    }

    #[test]
    fn og_tags_fill_the_record() {
        let metadata = resolve(
            r#"<html><head>
            <meta property="og:title" content="Widget Teardown">
            <meta property="og:description" content="What is inside a widget.">
            <meta property="og:site_name" content="Widget Weekly">
            <meta name="author" content="Grace Hopper">
            </head><body></body></html>"#,
        );
        assert_eq!(metadata.title.as_deref(), Some("Widget Teardown"));
        assert_eq!(metadata.excerpt.as_deref(), Some("What is inside a widget."));
        assert_eq!(metadata.site_name.as_deref(), Some("Widget Weekly"));
        assert_eq!(metadata.byline.as_deref(), Some("Grace Hopper"));
    }

    #[test]
    fn json_ld_wins_over_meta_tags() {
        let metadata = resolve(
            r#"<html><head>
            <script type="application/ld+json">
            {"@context": "https://schema.org", "@type": "NewsArticle",
             "name": "Structured Title",
             "author": {"name": "Alan Turing"},
             "datePublished": "2021-04-01T10:00:00Z"}
            </script>
            <meta property="og:title" content="Meta Title">
            </head><body></body></html>"#,
        );
        assert_eq!(metadata.title.as_deref(), Some("Structured Title"));
        assert_eq!(metadata.byline.as_deref(), Some("Alan Turing"));
        assert_eq!(
            metadata.published_time.as_deref(),
            Some("2021-04-01T10:00:00Z")
        );
    }

    #[test]
    fn json_ld_without_schema_context_is_ignored() {
        let metadata = resolve(
            r#"<html><head>
            <script type="application/ld+json">
            {"@type": "NewsArticle", "name": "Not Schema"}
            </script>
            <meta property="og:title" content="Meta Title">
            </head><body></body></html>"#,
        );
        assert_eq!(metadata.title.as_deref(), Some("Meta Title"));
    }

    #[test]
    fn headline_disambiguates_against_document_title() {
        // "name" holds the publisher, only "headline" matches the title
        let metadata = resolve(
            r#"<html><head>
            <title>How Compilers Inline Functions</title>
            <script type="application/ld+json">
            {"@context": "https://schema.org", "@type": "Article",
             "name": "Systems Press",
             "headline": "How Compilers Inline Functions"}
            </script>
            </head><body></body></html>"#,
        );
        assert_eq!(
            metadata.title.as_deref(),
            Some("How Compilers Inline Functions")
        );
    }

    #[test]
    fn json_ld_graph_is_searched() {
        let metadata = resolve(
            r#"<html><head>
            <script type="application/ld+json">
            {"@context": "https://schema.org",
             "@graph": [
               {"@type": "WebSite", "name": "Ignored"},
               {"@type": "BlogPosting", "name": "Graph Title"}
             ]}
            </script>
            </head><body></body></html>"#,
        );
        assert_eq!(metadata.title.as_deref(), Some("Graph Title"));
    }

    #[test]
    fn multiple_json_ld_authors_join() {
        let metadata = resolve(
            r#"<html><head>
            <script type="application/ld+json">
            {"@context": "https://schema.org", "@type": "Article",
             "name": "Pair Programming",
             "author": [{"name": "Ada Lovelace"}, {"name": "Charles Babbage"}]}
            </script>
            </head><body></body></html>"#,
        );
        assert_eq!(
            metadata.byline.as_deref(),
            Some("Ada Lovelace, Charles Babbage")
        );
    }

    #[test]
    fn title_separator_refinement() {
        let document = Html::parse_document(
            "<html><head><title>A Deep Dive Into Memory Allocators | Systems Blog</title></head>\
             <body></body></html>",
        );
        assert_eq!(document_title(&document), "A Deep Dive Into Memory Allocators");
    }

    #[test]
    fn short_title_falls_back_to_single_h1() {
        let document = Html::parse_document(
            "<html><head><title>Blog</title></head>\
             <body><h1>A Much More Descriptive Headline</h1></body></html>",
        );
        assert_eq!(document_title(&document), "A Much More Descriptive Headline");
    }

    #[test]
    fn entities_are_unescaped() {
        let metadata = resolve(
            r#"<html><head>
            <meta property="og:title" content="Fish &amp; Chips">
            </head><body></body></html>"#,
        );
        assert_eq!(metadata.title.as_deref(), Some("Fish & Chips"));
    }

    #[test]
    fn language_comes_from_root() {
        let metadata = resolve("<html lang='fr'><head></head><body></body></html>");
        assert_eq!(metadata.lang.as_deref(), Some("fr"));
    }
}
