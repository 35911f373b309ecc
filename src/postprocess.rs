//! Final fixups applied to the extracted container before serialization.

use kuchikikiki::NodeRef;
use url::Url;

use crate::constants::REGEXPS;
use crate::dom;
use crate::options::DistillOptions;

/// Absolutize URIs, flatten redundant nesting, and strip classes.
pub fn postprocess_content(
    article: &NodeRef,
    base_url: Option<&Url>,
    options: &DistillOptions,
) {
    if let Some(base) = base_url {
        fix_relative_uris(article, base);
    }

    simplify_nested_elements(article);

    if !options.keep_classes {
        clean_classes(article, &options.preserved_classes);
    }
}

fn to_absolute(uri: &str, base: &Url) -> Option<String> {
    // in-page fragments stay as they are
    if uri.starts_with('#') {
        return None;
    }
    base.join(uri).ok().map(|joined| joined.into())
}

/// Rewrite `href`/`src`/`poster`/`srcset` against the base URL. Anchors
/// with `javascript:` hrefs are unwrapped into plain text or a neutral
/// span.
fn fix_relative_uris(article: &NodeRef, base: &Url) {
    for link in dom::descendants_with_tags(article, &["a"]) {
        let href = match dom::attr(&link, "href") {
            Some(href) => href,
            None => continue,
        };

        if href.starts_with("javascript:") {
            let children: Vec<NodeRef> = link.children().collect();
            if children.len() == 1 && children[0].as_text().is_some() {
                let text = NodeRef::new_text(link.text_contents());
                link.insert_before(text);
            } else {
                let container = dom::new_element("span");
                for child in children {
                    container.append(child);
                }
                link.insert_before(container);
            }
            link.detach();
        } else if let Some(absolute) = to_absolute(&href, base) {
            dom::set_attr(&link, "href", &absolute);
        }
    }

    for media in dom::descendants_with_tags(
        article,
        &["img", "picture", "figure", "video", "audio", "source"],
    ) {
        for attribute in ["src", "poster"] {
            if let Some(value) = dom::attr(&media, attribute) {
                if let Some(absolute) = to_absolute(&value, base) {
                    dom::set_attr(&media, attribute, &absolute);
                }
            }
        }

        if let Some(srcset) = dom::attr(&media, "srcset") {
            let rewritten = REGEXPS
                .srcset_url
                .replace_all(&srcset, |captures: &regex::Captures| {
                    let url = &captures[1];
                    let descriptor = captures.get(2).map(|m| m.as_str()).unwrap_or("");
                    let trailer = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                    let absolute = to_absolute(url, base).unwrap_or_else(|| url.to_string());
                    format!("{}{}{}", absolute, descriptor, trailer)
                })
                .into_owned();
            dom::set_attr(&media, "srcset", &rewritten);
        }
    }
}

/// Collapse chains of single-child `div`/`section` wrappers and drop the
/// ones holding no content at all.
fn simplify_nested_elements(article: &NodeRef) {
    let mut node = Some(article.clone());
    while let Some(current) = node {
        let is_wrapper = matches!(dom::element_name(&current), Some("div") | Some("section"))
            && !dom::attr(&current, "id")
                .map(|id| id.starts_with("readability"))
                .unwrap_or(false);

        if is_wrapper && current.parent().is_some() && !dom::same_node(&current, article) {
            if dom::is_element_without_content(&current) {
                node = dom::remove_and_get_next(&current);
                continue;
            }
            if dom::has_single_tag_inside(&current, "div")
                || dom::has_single_tag_inside(&current, "section")
            {
                if let Some(child) = dom::first_element_child(&current) {
                    copy_attributes(&current, &child);
                    current.insert_before(child.clone());
                    current.detach();
                    node = Some(child);
                    continue;
                }
            }
        }

        node = dom::next_element(&current, false);
    }
}

fn copy_attributes(from: &NodeRef, to: &NodeRef) {
    if let (Some(source), Some(target)) = (from.as_element(), to.as_element()) {
        let source_attrs = source.attributes.borrow();
        let mut target_attrs = target.attributes.borrow_mut();
        for (name, attribute) in &source_attrs.map {
            target_attrs.map.insert(name.clone(), attribute.clone());
        }
    }
}

/// Strip class attributes except the configured preserved ones.
fn clean_classes(node: &NodeRef, preserved: &[String]) {
    if let Some(class) = dom::attr(node, "class") {
        let kept: Vec<&str> = class
            .split_whitespace()
            .filter(|candidate| preserved.iter().any(|keep| keep == candidate))
            .collect();
        if kept.is_empty() {
            dom::remove_attr(node, "class");
        } else {
            dom::set_attr(node, "class", &kept.join(" "));
        }
    }

    let mut child = dom::first_element_child(node);
    while let Some(current) = child {
        clean_classes(&current, preserved);
        child = dom::next_element_sibling(&current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchikikiki::parse_html;
    use kuchikikiki::traits::TendrilSink;

    fn processed(html: &str, base: &str, options: &DistillOptions) -> NodeRef {
        let doc = parse_html().one(html);
        let body = doc.select_first("body").unwrap().as_node().clone();
        let base = Url::parse(base).ok();
        postprocess_content(&body, base.as_ref(), options);
        body
    }

    #[test]
    fn relative_urls_become_absolute() {
        let options = DistillOptions::default();
        let body = processed(
            "<body><a href='/story/2'>next</a><img src='pics/photo.jpg'></body>",
            "https://example.com/story/1",
            &options,
        );
        let a = body.select_first("a").unwrap();
        assert_eq!(
            a.attributes.borrow().get("href"),
            Some("https://example.com/story/2")
        );
        let img = body.select_first("img").unwrap();
        assert_eq!(
            img.attributes.borrow().get("src"),
            Some("https://example.com/story/pics/photo.jpg")
        );
    }

    #[test]
    fn fragment_links_are_untouched() {
        let options = DistillOptions::default();
        let body = processed(
            "<body><a href='#footnote-1'>note</a></body>",
            "https://example.com/page",
            &options,
        );
        let a = body.select_first("a").unwrap();
        assert_eq!(a.attributes.borrow().get("href"), Some("#footnote-1"));
    }

    #[test]
    fn javascript_links_are_unwrapped() {
        let options = DistillOptions::default();
        let body = processed(
            "<body><p><a href='javascript:void(0)'>plain text</a></p>\
             <p><a href='javascript:open()'><em>rich</em> content</a></p></body>",
            "https://example.com/",
            &options,
        );
        assert!(body.select("a").unwrap().next().is_none());
        assert!(body.text_contents().contains("plain text"));
        assert!(body.select("span em").unwrap().next().is_some());
    }

    #[test]
    fn srcset_urls_are_rewritten() {
        let options = DistillOptions::default();
        let body = processed(
            "<body><img srcset='small.jpg 1x, large.jpg 2x'></body>",
            "https://cdn.example.com/a/",
            &options,
        );
        let img = body.select_first("img").unwrap();
        let srcset = img.attributes.borrow().get("srcset").unwrap().to_string();
        assert!(srcset.contains("https://cdn.example.com/a/small.jpg 1x"));
        assert!(srcset.contains("https://cdn.example.com/a/large.jpg 2x"));
    }

    #[test]
    fn single_child_wrappers_collapse() {
        let options = DistillOptions::default();
        let body = processed(
            "<body><div id='outer'><div id='inner'><p>content</p></div></div></body>",
            "https://example.com/",
            &options,
        );
        // outer div merges into inner, inheriting nothing it needs here
        let divs = dom::descendants_with_tags(&body, &["div"]);
        assert_eq!(divs.len(), 1);
        assert!(body.select("p").unwrap().next().is_some());
    }

    #[test]
    fn classes_are_stripped_except_preserved() {
        let options = DistillOptions::default();
        let body = processed(
            "<body><div class='page'><p class='lede highlight'>text</p></div></body>",
            "https://example.com/",
            &options,
        );
        let div = dom::first_element_child(&body).unwrap();
        assert_eq!(dom::attr(&div, "class").as_deref(), Some("page"));
        let p = body.select_first("p").unwrap();
        assert!(p.attributes.borrow().get("class").is_none());
    }

    #[test]
    fn keep_classes_disables_stripping() {
        let options = DistillOptions::builder().keep_classes(true).build();
        let body = processed(
            "<body><p class='lede'>text</p></body>",
            "https://example.com/",
            &options,
        );
        let p = body.select_first("p").unwrap();
        assert_eq!(p.attributes.borrow().get("class"), Some("lede"));
    }
}
