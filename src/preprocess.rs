//! Document preparation ahead of the extraction loop.
//!
//! Runs once per document, before the first scoring attempt: legacy markup
//! is normalized (`font` wrappers, `<br><br>` paragraph breaks), style and
//! script elements are dropped, and lazy-image fallbacks hidden inside
//! `noscript` are promoted so the cleaner can see them.

use kuchikikiki::traits::TendrilSink;
use kuchikikiki::{parse_html, NodeRef};

use crate::constants::REGEXPS;
use crate::dom;

/// Normalize the document in place: drop `style` elements, convert
/// `<br>` runs into paragraphs, and retag `font` to `span`.
pub fn prep_document(doc: &NodeRef) {
    for style in dom::descendants_with_tags(doc, &["style"]) {
        style.detach();
    }

    if let Ok(body) = doc.select_first("body") {
        replace_br_runs(body.as_node());
    }

    for font in dom::descendants_with_tags(doc, &["font"]) {
        dom::set_node_tag(&font, "span");
    }
}

/// Remove `script` and `noscript` elements.
pub fn remove_scripts(doc: &NodeRef) {
    for script in dom::descendants_with_tags(doc, &["script", "noscript"]) {
        script.detach();
    }
}

/// Convert runs of two or more `br` elements (possibly separated by
/// whitespace) into paragraph boundaries: the content following the run
/// is moved into a fresh `<p>` until the next run or non-phrasing node.
fn replace_br_runs(root: &NodeRef) {
    for br in dom::descendants_with_tags(root, &["br"]) {
        // already removed as part of an earlier run
        if br.parent().is_none() {
            continue;
        }

        let mut next = br.next_sibling();
        let mut replaced = false;

        // swallow the rest of the run
        while let Some(sibling) = dom::next_non_whitespace(next.clone()) {
            if !dom::is_tag(&sibling, "br") {
                break;
            }
            replaced = true;
            next = sibling.next_sibling();
            sibling.detach();
        }

        if !replaced {
            continue;
        }

        let paragraph = dom::new_element("p");
        br.insert_before(paragraph.clone());
        br.detach();

        let mut follower = paragraph.next_sibling();
        while let Some(node) = follower {
            // a fresh double-br ends the paragraph
            if dom::is_tag(&node, "br") {
                if let Some(after) = dom::next_non_whitespace(node.next_sibling()) {
                    if dom::is_tag(&after, "br") {
                        break;
                    }
                }
            }
            if !dom::is_phrasing_content(&node) {
                break;
            }
            let sibling = node.next_sibling();
            paragraph.append(node);
            follower = sibling;
        }

        while let Some(last) = paragraph.last_child() {
            if !dom::is_whitespace(&last) {
                break;
            }
            last.detach();
        }

        if let Some(parent) = paragraph.parent() {
            if dom::is_tag(&parent, "p") {
                dom::set_node_tag(&parent, "div");
            }
        }
    }
}

/// Promote images hidden in `noscript` lazy-loading fallbacks.
///
/// Placeholder `img` elements with no usable source attribute are dropped.
/// When a `noscript` holds a single image and directly follows another
/// single image, the fallback replaces the placeholder, inheriting any
/// attribute of the placeholder that looks like an image source under a
/// `data-old-` prefix when it would collide.
pub fn unwrap_noscript_images(doc: &NodeRef) {
    for img in dom::descendants_with_tags(doc, &["img"]) {
        let has_source = img
            .as_element()
            .map(|data| {
                data.attributes.borrow().map.iter().any(|(name, attribute)| {
                    matches!(
                        name.local.as_ref(),
                        "src" | "srcset" | "data-src" | "data-srcset"
                    ) || REGEXPS.image_ext.is_match(&attribute.value)
                })
            })
            .unwrap_or(false);
        if !has_source {
            img.detach();
        }
    }

    for noscript in dom::descendants_with_tags(doc, &["noscript"]) {
        let (new_img, replacement) = match single_image_inside(&noscript) {
            Some(found) => found,
            None => continue,
        };
        let prev = match dom::previous_element_sibling(&noscript) {
            Some(prev) => prev,
            None => continue,
        };
        let prev_img = match single_image(&prev) {
            Some(img) => img,
            None => continue,
        };

        carry_over_image_attributes(&prev_img, &new_img);

        replacement.detach();
        prev.insert_before(replacement);
        prev.detach();
    }
}

/// The image when `node` is an `img` or a chain of single-child wrappers
/// ending in one.
fn single_image(node: &NodeRef) -> Option<NodeRef> {
    if dom::is_tag(node, "img") {
        return Some(node.clone());
    }
    let children: Vec<NodeRef> = node.children().filter(dom::is_element).collect();
    if children.len() != 1 || !node.text_contents().trim().is_empty() {
        return None;
    }
    single_image(&children[0])
}

/// The single image inside a `noscript`, together with the subtree that
/// should replace the placeholder. A scripting-enabled parse leaves the
/// `noscript` contents as raw text, so that case is re-parsed first.
fn single_image_inside(noscript: &NodeRef) -> Option<(NodeRef, NodeRef)> {
    if let Some(child) = dom::first_element_child(noscript) {
        let extra_elements = noscript.children().filter(dom::is_element).count() != 1;
        if extra_elements || !noscript.text_contents().trim().is_empty() {
            return None;
        }
        return single_image(&child).map(|img| (img, child));
    }

    let markup = noscript.text_contents();
    if markup.trim().is_empty() {
        return None;
    }
    let parsed = parse_html().one(markup);
    let body = parsed.select_first("body").ok()?;
    let children: Vec<NodeRef> = body.as_node().children().filter(dom::is_element).collect();
    if children.len() != 1 || !body.as_node().text_contents().trim().is_empty() {
        return None;
    }
    single_image(&children[0]).map(|img| (img, children[0].clone()))
}

fn carry_over_image_attributes(prev_img: &NodeRef, new_img: &NodeRef) {
    let attributes: Vec<(String, String)> = prev_img
        .as_element()
        .map(|data| {
            data.attributes
                .borrow()
                .map
                .iter()
                .map(|(name, attribute)| (name.local.as_ref().to_string(), attribute.value.clone()))
                .collect()
        })
        .unwrap_or_default();

    for (name, value) in attributes {
        if value.is_empty() {
            continue;
        }
        let is_source =
            name == "src" || name == "srcset" || REGEXPS.image_ext.is_match(&value);
        if !is_source {
            continue;
        }
        if dom::attr(new_img, &name).as_deref() == Some(value.as_str()) {
            continue;
        }

        let mut target = name.clone();
        if dom::attr(new_img, &name).is_some() {
            target = format!("data-old-{}", name);
        }
        dom::set_attr(new_img, &target, &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchikikiki::parse_html;
    use kuchikikiki::traits::TendrilSink;

    fn prepped(html: &str) -> NodeRef {
        let doc = parse_html().one(html);
        prep_document(&doc);
        doc.select_first("body").unwrap().as_node().clone()
    }

    #[test]
    fn styles_are_removed_and_fonts_retagged() {
        let body = prepped("<style>p{}</style><font size='2'>kept text</font>");
        assert!(body.select("style").unwrap().next().is_none());
        assert!(body.select("font").unwrap().next().is_none());
        let span = body.select_first("span").unwrap();
        assert_eq!(span.as_node().text_contents(), "kept text");
    }

    #[test]
    fn double_br_becomes_paragraph() {
        let body = prepped("<div>first line<br> <br>second line</div>");
        let div = dom::first_element_child(&body).unwrap();
        let paragraphs = dom::descendants_with_tags(&div, &["p"]);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(dom::inner_text(&paragraphs[0], true), "second line");
        assert!(dom::descendants_with_tags(&div, &["br"]).is_empty());
    }

    #[test]
    fn single_br_is_left_alone() {
        let body = prepped("<div>one<br>two</div>");
        let div = dom::first_element_child(&body).unwrap();
        assert_eq!(dom::descendants_with_tags(&div, &["br"]).len(), 1);
        assert!(dom::descendants_with_tags(&div, &["p"]).is_empty());
    }

    #[test]
    fn paragraph_parent_is_retagged_to_div() {
        let body = prepped("<p>lead<br><br>tail</p>");
        assert!(body.select("div > p").is_ok());
        let outer = dom::first_element_child(&body).unwrap();
        assert_eq!(dom::element_name(&outer), Some("div"));
    }

    #[test]
    fn placeholder_images_without_sources_are_dropped() {
        let doc = parse_html().one(
            "<body><img id='junk' class='lazy'><img id='ok' src='a.jpg'></body>",
        );
        unwrap_noscript_images(&doc);
        assert!(doc.select("#junk").unwrap().next().is_none());
        assert!(doc.select("#ok").unwrap().next().is_some());
    }

    #[test]
    fn noscript_image_replaces_placeholder() {
        let doc = parse_html().one(
            "<body><div><img src='data:image/gif;base64,xx' data-thing='1'>\
             </div><noscript><img src='real.jpg'></noscript></body>",
        );
        unwrap_noscript_images(&doc);
        let imgs = dom::descendants_with_tags(
            &doc.select_first("body").unwrap().as_node().clone(),
            &["img"],
        );
        assert_eq!(imgs.len(), 1);
        assert_eq!(dom::attr(&imgs[0], "src").as_deref(), Some("real.jpg"));
        assert_eq!(
            dom::attr(&imgs[0], "data-old-src").as_deref(),
            Some("data:image/gif;base64,xx")
        );
    }
}
