//! Tree-walk utilities over the mutable DOM.
//!
//! The pipeline removes and re-parents nodes while it walks, so every
//! traversal here computes its successor before a node can be detached
//! (first element child, then next element sibling, then the nearest
//! ancestor's next element sibling) instead of iterating a live
//! collection.

use html5ever::{namespace_url, ns, LocalName, QualName};
use kuchikikiki::{Attribute, ExpandedName, NodeRef};
use std::rc::Rc;

use crate::constants::{BLOCK_CHILD_TAGS, PHRASING_TAGS, REGEXPS};

/// Stable identity for a node within a run, used to key side-tables.
pub fn node_id(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

/// Pointer identity comparison.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::ptr_eq(&a.0, &b.0)
}

/// Lower-cased local tag name, or `None` for non-elements.
pub fn element_name(node: &NodeRef) -> Option<&str> {
    node.as_element().map(|data| data.name.local.as_ref())
}

pub fn is_element(node: &NodeRef) -> bool {
    node.as_element().is_some()
}

pub fn is_tag(node: &NodeRef, tag: &str) -> bool {
    element_name(node) == Some(tag)
}

/// Copy of an attribute value, or `None` when absent or not an element.
pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|data| data.attributes.borrow().get(name).map(str::to_string))
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(data) = node.as_element() {
        data.attributes.borrow_mut().insert(name, value.to_string());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(data) = node.as_element() {
        data.attributes.borrow_mut().remove(name);
    }
}

/// The `class + " " + id` string the pattern heuristics match against.
pub fn match_string(node: &NodeRef) -> String {
    format!(
        "{} {}",
        attr(node, "class").unwrap_or_default(),
        attr(node, "id").unwrap_or_default()
    )
}

/// Create a detached HTML element.
pub fn new_element(tag: &str) -> NodeRef {
    NodeRef::new_element(
        QualName::new(None, ns!(html), LocalName::from(tag)),
        Vec::<(ExpandedName, Attribute)>::new(),
    )
}

/// Replace `node` with an element of a different tag, keeping attributes
/// and children. Returns the replacement, which sits where `node` was.
pub fn set_node_tag(node: &NodeRef, tag: &str) -> NodeRef {
    let replacement = new_element(tag);

    if let (Some(old), Some(new)) = (node.as_element(), replacement.as_element()) {
        let old_attrs = old.attributes.borrow();
        let mut new_attrs = new.attributes.borrow_mut();
        for (name, attribute) in &old_attrs.map {
            new_attrs.map.insert(name.clone(), attribute.clone());
        }
    }

    while let Some(child) = node.first_child() {
        replacement.append(child);
    }

    node.insert_before(replacement.clone());
    node.detach();
    replacement
}

pub fn first_element_child(node: &NodeRef) -> Option<NodeRef> {
    node.children().find(is_element)
}

pub fn next_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut sibling = node.next_sibling();
    while let Some(current) = sibling {
        if is_element(&current) {
            return Some(current);
        }
        sibling = current.next_sibling();
    }
    None
}

pub fn previous_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut sibling = node.previous_sibling();
    while let Some(current) = sibling {
        if is_element(&current) {
            return Some(current);
        }
        sibling = current.previous_sibling();
    }
    None
}

/// Pre-order successor among elements. With `ignore_self_and_kids` the
/// subtree below `node` is skipped, which is what removal wants.
pub fn next_element(node: &NodeRef, ignore_self_and_kids: bool) -> Option<NodeRef> {
    if !ignore_self_and_kids {
        if let Some(child) = first_element_child(node) {
            return Some(child);
        }
    }
    if let Some(sibling) = next_element_sibling(node) {
        return Some(sibling);
    }
    let mut ancestor = node.parent();
    while let Some(current) = ancestor {
        if let Some(sibling) = next_element_sibling(&current) {
            return Some(sibling);
        }
        ancestor = current.parent();
    }
    None
}

/// Detach `node` and return the element the walk should continue from,
/// as though the subtree had been skipped entirely.
pub fn remove_and_get_next(node: &NodeRef) -> Option<NodeRef> {
    let next = next_element(node, true);
    node.detach();
    next
}

/// Skip whitespace-only text nodes, returning the first substantial node
/// at or after `node`.
pub fn next_non_whitespace(mut node: Option<NodeRef>) -> Option<NodeRef> {
    while let Some(current) = node {
        if is_element(&current) {
            return Some(current);
        }
        let is_blank_text = current
            .as_text()
            .map(|text| text.borrow().trim().is_empty())
            .unwrap_or(false);
        if !is_blank_text {
            return Some(current);
        }
        node = current.next_sibling();
    }
    None
}

/// Element ancestors of `node`, nearest first, up to `max_depth`
/// (`0` = unbounded). Stops at the first non-element parent.
pub fn element_ancestors(node: &NodeRef, max_depth: usize) -> Vec<NodeRef> {
    let mut ancestors = Vec::new();
    let mut current = node.parent();
    while let Some(parent) = current {
        if !is_element(&parent) {
            break;
        }
        ancestors.push(parent.clone());
        if max_depth > 0 && ancestors.len() == max_depth {
            break;
        }
        current = parent.parent();
    }
    ancestors
}

/// True when an ancestor within `max_depth` levels (`0` = unbounded)
/// carries the given tag.
pub fn has_ancestor_tag(node: &NodeRef, tag: &str, max_depth: usize) -> bool {
    let mut depth = 0;
    let mut current = node.parent();
    while let Some(parent) = current {
        if max_depth > 0 && depth > max_depth {
            return false;
        }
        if is_tag(&parent, tag) {
            return true;
        }
        depth += 1;
        current = parent.parent();
    }
    false
}

/// All descendant elements with any of the given tags, collected up front
/// so callers can mutate freely.
pub fn descendants_with_tags(root: &NodeRef, tags: &[&str]) -> Vec<NodeRef> {
    root.descendants()
        .filter(|node| element_name(node).map(|name| tags.contains(&name)).unwrap_or(false))
        .collect()
}

/// Trimmed text content, optionally whitespace-normalized.
pub fn inner_text(node: &NodeRef, normalize: bool) -> String {
    let text = node.text_contents();
    let trimmed = text.trim();
    if normalize {
        REGEXPS.normalize.replace_all(trimmed, " ").into_owned()
    } else {
        trimmed.to_string()
    }
}

/// Serialized markup of the node's children.
pub fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| child.to_string()).collect()
}

/// Number of `separator` occurrences in the node's normalized text.
pub fn char_count(node: &NodeRef, separator: char) -> usize {
    inner_text(node, true).matches(separator).count()
}

/// Fraction of the node's text length contributed by anchor descendants.
/// Anchors pointing at in-page fragments are discounted to 0.3.
pub fn link_density(node: &NodeRef) -> f64 {
    let text_length = inner_text(node, true).chars().count();
    if text_length == 0 {
        return 0.0;
    }

    let mut link_length = 0.0;
    for anchor in descendants_with_tags(node, &["a"]) {
        let coefficient = match attr(&anchor, "href") {
            Some(href) if REGEXPS.hash_url.is_match(&href) => 0.3,
            _ => 1.0,
        };
        link_length += inner_text(&anchor, true).chars().count() as f64 * coefficient;
    }

    link_length / text_length as f64
}

/// Ratio of text inside descendants with the given tags to the node's
/// whole text.
pub fn text_density(node: &NodeRef, tags: &[&str]) -> f64 {
    let text_length = inner_text(node, true).chars().count();
    if text_length == 0 {
        return 0.0;
    }
    let children_length: usize = descendants_with_tags(node, tags)
        .iter()
        .map(|child| inner_text(child, true).chars().count())
        .sum();
    children_length as f64 / text_length as f64
}

/// Whitespace-only text node, or a `br` element.
pub fn is_whitespace(node: &NodeRef) -> bool {
    if let Some(text) = node.as_text() {
        return text.borrow().trim().is_empty();
    }
    is_tag(node, "br")
}

/// Phrasing content per the HTML spec; `a`/`del`/`ins` only count when
/// everything inside them does.
pub fn is_phrasing_content(node: &NodeRef) -> bool {
    if node.as_text().is_some() {
        return true;
    }
    match element_name(node) {
        Some(name) if PHRASING_TAGS.contains(&name) => true,
        Some("a") | Some("del") | Some("ins") => node.children().all(|c| is_phrasing_content(&c)),
        _ => false,
    }
}

/// Element with no text and nothing but `br`/`hr` element children.
pub fn is_element_without_content(node: &NodeRef) -> bool {
    if !is_element(node) || !node.text_contents().trim().is_empty() {
        return false;
    }
    let element_children = node.children().filter(is_element).count();
    element_children == 0
        || element_children == descendants_with_tags(node, &["br", "hr"]).len()
}

/// Exactly one element child with the given tag and no substantial text
/// children.
pub fn has_single_tag_inside(node: &NodeRef, tag: &str) -> bool {
    let children: Vec<NodeRef> = node.children().filter(is_element).collect();
    if children.len() != 1 || !is_tag(&children[0], tag) {
        return false;
    }
    !node.children().any(|child| {
        child
            .as_text()
            .map(|text| REGEXPS.has_content.is_match(&text.borrow()))
            .unwrap_or(false)
    })
}

/// Any block-level descendant anywhere below this element.
pub fn has_child_block_element(node: &NodeRef) -> bool {
    node.children().any(|child| {
        element_name(&child)
            .map(|name| BLOCK_CHILD_TAGS.contains(&name))
            .unwrap_or(false)
            || has_child_block_element(&child)
    })
}

/// Row and column counts of a table, honoring rowspan/colspan.
pub fn row_and_column_count(table: &NodeRef) -> (usize, usize) {
    let mut rows = 0;
    let mut columns = 0;
    for tr in descendants_with_tags(table, &["tr"]) {
        let rowspan = attr(&tr, "rowspan")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
        rows += rowspan;

        let mut row_columns = 0;
        for td in descendants_with_tags(&tr, &["td"]) {
            let colspan = attr(&td, "colspan")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            row_columns += colspan;
        }
        columns = columns.max(row_columns);
    }
    (rows, columns)
}

/// Hidden via inline style, the `hidden` attribute, or `aria-hidden`
/// (unless the class marks it as a fallback image).
pub fn is_probably_visible(node: &NodeRef) -> bool {
    if let Some(style) = attr(node, "style") {
        if REGEXPS.display_none.is_match(&style) {
            return false;
        }
    }
    if node
        .as_element()
        .map(|data| data.attributes.borrow().contains("hidden"))
        .unwrap_or(false)
    {
        return false;
    }
    if attr(node, "aria-hidden").as_deref() == Some("true") {
        let is_fallback_image = attr(node, "class")
            .map(|class| class.contains("fallback-image"))
            .unwrap_or(false);
        if !is_fallback_image {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchikikiki::parse_html;
    use kuchikikiki::traits::TendrilSink;

    fn body_of(html: &str) -> NodeRef {
        let doc = parse_html().one(html);
        doc.select_first("body").unwrap().as_node().clone()
    }

    #[test]
    fn next_element_walks_preorder() {
        let body = body_of("<div id='a'><p id='b'></p></div><span id='c'></span>");
        let a = next_element(&body, false).unwrap();
        assert_eq!(attr(&a, "id").as_deref(), Some("a"));
        let b = next_element(&a, false).unwrap();
        assert_eq!(attr(&b, "id").as_deref(), Some("b"));
        let c = next_element(&b, false).unwrap();
        assert_eq!(attr(&c, "id").as_deref(), Some("c"));
        assert!(next_element(&c, false).is_none());
    }

    #[test]
    fn remove_and_get_next_skips_subtree() {
        let body = body_of("<div id='a'><p id='kid'></p></div><span id='c'></span>");
        let a = first_element_child(&body).unwrap();
        let next = remove_and_get_next(&a).unwrap();
        assert_eq!(attr(&next, "id").as_deref(), Some("c"));
        assert!(body.select("#kid").unwrap().next().is_none());
    }

    #[test]
    fn set_node_tag_keeps_attributes_and_children() {
        let body = body_of("<font color='red' class='x'>hello <b>bold</b></font>");
        let font = first_element_child(&body).unwrap();
        let span = set_node_tag(&font, "span");
        assert_eq!(element_name(&span), Some("span"));
        assert_eq!(attr(&span, "color").as_deref(), Some("red"));
        assert_eq!(attr(&span, "class").as_deref(), Some("x"));
        assert_eq!(inner_text(&span, true), "hello bold");
        assert!(same_node(&first_element_child(&body).unwrap(), &span));
    }

    #[test]
    fn link_density_discounts_fragment_anchors() {
        let body = body_of("<p><a href='#s1'>anchor</a>anchor</p>");
        let p = first_element_child(&body).unwrap();
        // 6 chars of anchor text at 0.3 weight, 12 chars total
        let density = link_density(&p);
        assert!((density - 0.15).abs() < 0.01);
    }

    #[test]
    fn link_density_of_pure_navigation_is_high() {
        let body = body_of("<nav><a href='/a'>one</a> <a href='/b'>two</a></nav>");
        let nav = first_element_child(&body).unwrap();
        assert!(link_density(&nav) > 0.5);
    }

    #[test]
    fn empty_container_detection() {
        let body = body_of("<div id='e'><br><hr></div><div id='f'>text</div>");
        let e = first_element_child(&body).unwrap();
        assert!(is_element_without_content(&e));
        let f = next_element_sibling(&e).unwrap();
        assert!(!is_element_without_content(&f));
    }

    #[test]
    fn single_tag_inside_rejects_substantial_text() {
        let body = body_of("<div><p>only</p></div>");
        assert!(has_single_tag_inside(
            &first_element_child(&body).unwrap(),
            "p"
        ));
        let body = body_of("<div>stray text<p>only</p></div>");
        assert!(!has_single_tag_inside(
            &first_element_child(&body).unwrap(),
            "p"
        ));
    }

    #[test]
    fn phrasing_content_includes_nested_anchors() {
        let body = body_of("<p><a href='x'><em>fine</em></a><a><div>no</div></a></p>");
        let p = first_element_child(&body).unwrap();
        let mut anchors = p.children().filter(|c| is_tag(c, "a"));
        assert!(is_phrasing_content(&anchors.next().unwrap()));
        assert!(!is_phrasing_content(&anchors.next().unwrap()));
    }

    #[test]
    fn visibility_checks() {
        let body = body_of(
            "<div id='a' style='display: none'></div>\
             <div id='b' hidden></div>\
             <div id='c' aria-hidden='true'></div>\
             <div id='d' aria-hidden='true' class='math fallback-image'></div>\
             <div id='e'></div>",
        );
        let nodes: Vec<NodeRef> = body.children().filter(is_element).collect();
        assert!(!is_probably_visible(&nodes[0]));
        assert!(!is_probably_visible(&nodes[1]));
        assert!(!is_probably_visible(&nodes[2]));
        assert!(is_probably_visible(&nodes[3]));
        assert!(is_probably_visible(&nodes[4]));
    }

    #[test]
    fn table_dimensions() {
        let body = body_of(
            "<table><tr><td colspan='2'></td><td></td></tr><tr rowspan='3'><td></td></tr></table>",
        );
        let table = first_element_child(&body).unwrap();
        let (rows, columns) = row_and_column_count(&table);
        assert_eq!(rows, 4);
        assert_eq!(columns, 3);
    }
}
