//! Secondary structural cleanup of the aggregated article container.
//!
//! Runs after sibling aggregation, before the length check. The passes
//! execute in a fixed order; conditional passes honor the
//! `CLEAN_CONDITIONALLY` flag so the retry controller can relax them.

use kuchikikiki::NodeRef;
use std::collections::HashSet;

use crate::constants::{
    Flags, DATA_TABLE_DESCENDANTS, DEPRECATED_SIZE_ATTRIBUTE_ELEMS, PRESENTATIONAL_ATTRIBUTES,
    REGEXPS,
};
use crate::dom;
use crate::options::DistillOptions;
use crate::scoring;

/// Minimum text length that spares a share widget from removal.
const SHARE_ELEMENT_THRESHOLD: usize = 500;

pub struct Cleaner<'a> {
    options: &'a DistillOptions,
    flags: Flags,
    data_tables: HashSet<usize>,
}

impl<'a> Cleaner<'a> {
    pub fn new(options: &'a DistillOptions, flags: Flags) -> Self {
        Self {
            options,
            flags,
            data_tables: HashSet::new(),
        }
    }

    /// Run every cleanup pass over the aggregated container.
    pub fn prep_article(&mut self, article: &NodeRef) {
        self.clean_styles(article);

        self.mark_data_tables(article);
        self.fix_lazy_images(article);

        self.clean_conditionally(article, "form");
        self.clean_conditionally(article, "fieldset");
        self.clean(article, "object");
        self.clean(article, "embed");
        self.clean(article, "footer");
        self.clean(article, "link");
        self.clean(article, "aside");

        let top_level: Vec<NodeRef> = article.children().filter(dom::is_element).collect();
        for child in top_level {
            self.clean_matched_nodes(&child, |node, match_string| {
                REGEXPS.share_elements.is_match(match_string)
                    && node.text_contents().chars().count() < SHARE_ELEMENT_THRESHOLD
            });
        }

        self.clean(article, "iframe");
        self.clean(article, "input");
        self.clean(article, "textarea");
        self.clean(article, "select");
        self.clean(article, "button");
        self.clean_headers(article);

        self.clean_conditionally(article, "table");
        self.clean_conditionally(article, "ul");
        self.clean_conditionally(article, "div");

        for h1 in dom::descendants_with_tags(article, &["h1"]) {
            dom::set_node_tag(&h1, "h2");
        }

        self.remove_empty_paragraphs(article);

        for br in dom::descendants_with_tags(article, &["br"]) {
            if let Some(next) = dom::next_non_whitespace(br.next_sibling()) {
                if dom::is_tag(&next, "p") {
                    br.detach();
                }
            }
        }

        self.collapse_single_cell_tables(article);
    }

    /// Strip presentational attributes and deprecated sizing, recursively.
    /// Entire `svg` subtrees are left as they are.
    fn clean_styles(&self, node: &NodeRef) {
        if dom::is_tag(node, "svg") {
            return;
        }

        for attribute in PRESENTATIONAL_ATTRIBUTES {
            dom::remove_attr(node, attribute);
        }
        if dom::element_name(node)
            .map(|name| DEPRECATED_SIZE_ATTRIBUTE_ELEMS.contains(&name))
            .unwrap_or(false)
        {
            dom::remove_attr(node, "width");
            dom::remove_attr(node, "height");
        }

        let mut child = dom::first_element_child(node);
        while let Some(current) = child {
            self.clean_styles(&current);
            child = dom::next_element_sibling(&current);
        }
    }

    /// Classify each table as data or layout. Data tables (and anything
    /// inside one) survive conditional cleaning.
    fn mark_data_tables(&mut self, root: &NodeRef) {
        for table in dom::descendants_with_tags(root, &["table"]) {
            if self.is_data_table(&table) {
                self.data_tables.insert(dom::node_id(&table));
            }
        }
    }

    fn is_data_table(&self, table: &NodeRef) -> bool {
        if dom::attr(table, "role").as_deref() == Some("presentation") {
            return false;
        }
        if dom::attr(table, "datatable").as_deref() == Some("0") {
            return false;
        }
        if dom::attr(table, "summary").is_some() {
            return true;
        }
        if let Some(caption) = dom::descendants_with_tags(table, &["caption"]).first() {
            if caption.first_child().is_some() {
                return true;
            }
        }
        if !dom::descendants_with_tags(table, &DATA_TABLE_DESCENDANTS).is_empty() {
            return true;
        }
        // nested tables mean layout
        if !dom::descendants_with_tags(table, &["table"]).is_empty() {
            return false;
        }

        let (rows, columns) = dom::row_and_column_count(table);
        if rows >= 10 || columns > 4 {
            return true;
        }
        rows * columns > 10
    }

    fn is_inside_data_table(&self, node: &NodeRef) -> bool {
        node.ancestors()
            .any(|ancestor| self.data_tables.contains(&dom::node_id(&ancestor)))
    }

    /// Recover lazy-loaded images: promote an attribute holding an image
    /// URL into `src`/`srcset`, and drop tiny base64 placeholders when a
    /// real source exists.
    fn fix_lazy_images(&self, root: &NodeRef) {
        for element in dom::descendants_with_tags(root, &["img", "picture", "figure"]) {
            self.fix_base64_placeholder(&element);
            self.promote_lazy_source(&element);
        }
    }

    fn fix_base64_placeholder(&self, element: &NodeRef) {
        let src = match dom::attr(element, "src") {
            Some(src) => src,
            None => return,
        };
        let captures = match REGEXPS.b64_data_url.captures(&src) {
            Some(captures) => captures,
            None => return,
        };
        // inline svg can be a legitimate image, not a placeholder
        if captures.get(1).map(|m| m.as_str()) == Some("image/svg+xml") {
            return;
        }

        let has_real_source = element
            .as_element()
            .map(|data| {
                data.attributes.borrow().map.iter().any(|(name, attribute)| {
                    name.local.as_ref() != "src" && REGEXPS.image_ext.is_match(&attribute.value)
                })
            })
            .unwrap_or(false);

        if has_real_source {
            if let Some(b64_start) = src.to_lowercase().find("base64") {
                let payload_length = src.len() - (b64_start + 7);
                if payload_length < 133 {
                    dom::remove_attr(element, "src");
                }
            }
        }
    }

    fn promote_lazy_source(&self, element: &NodeRef) {
        let src = dom::attr(element, "src");
        let srcset = dom::attr(element, "srcset");
        let class = dom::attr(element, "class").unwrap_or_default();
        let has_source =
            src.is_some() || srcset.as_deref().map(|s| s != "null").unwrap_or(false);
        if has_source && !class.to_lowercase().contains("lazy") {
            return;
        }

        let attributes: Vec<(String, String)> = element
            .as_element()
            .map(|data| {
                data.attributes
                    .borrow()
                    .map
                    .iter()
                    .map(|(name, attribute)| {
                        (name.local.as_ref().to_string(), attribute.value.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (name, value) in attributes {
            if name == "src" || name == "srcset" || name == "alt" {
                continue;
            }

            let copy_to = if REGEXPS.image_ext_srcset.is_match(&value) {
                Some("srcset")
            } else if REGEXPS.image_ext_src.is_match(&value) {
                Some("src")
            } else {
                None
            };

            let copy_to = match copy_to {
                Some(target) => target,
                None => continue,
            };

            match dom::element_name(element) {
                Some("img") | Some("picture") => dom::set_attr(element, copy_to, &value),
                Some("figure") => {
                    if dom::descendants_with_tags(element, &["img", "picture"]).is_empty() {
                        let img = dom::new_element("img");
                        dom::set_attr(&img, copy_to, &value);
                        element.append(img);
                    }
                }
                _ => {}
            }
        }
    }

    fn allowed_video(&self, value: &str) -> bool {
        match &self.options.allowed_video_regex {
            Some(regex) => regex.is_match(value),
            None => REGEXPS.videos.is_match(value),
        }
    }

    fn is_allowed_embed(&self, element: &NodeRef) -> bool {
        let attribute_match = element
            .as_element()
            .map(|data| {
                data.attributes
                    .borrow()
                    .map
                    .values()
                    .any(|attribute| self.allowed_video(&attribute.value))
            })
            .unwrap_or(false);
        if attribute_match {
            return true;
        }
        dom::is_tag(element, "object") && self.allowed_video(&dom::inner_html(element))
    }

    /// Remove every element with the given tag; embed-like elements
    /// pointing at an allowed video host are spared.
    fn clean(&self, root: &NodeRef, tag: &str) {
        let is_embed = matches!(tag, "object" | "embed" | "iframe");
        for element in dom::descendants_with_tags(root, &[tag]) {
            if is_embed && self.is_allowed_embed(&element) {
                continue;
            }
            element.detach();
        }
    }

    /// Composite low-quality heuristic for `table`/`ul`/`div` (and the
    /// form-ish tags). Clauses short-circuit in a fixed order; a node
    /// with ten or more comma-separated segments is always kept.
    fn clean_conditionally(&self, root: &NodeRef, tag: &str) {
        if !self.flags.contains(Flags::CLEAN_CONDITIONALLY) {
            return;
        }

        for node in dom::descendants_with_tags(root, &[tag]) {
            if node.parent().is_none() {
                continue;
            }
            if tag == "table" && self.data_tables.contains(&dom::node_id(&node)) {
                continue;
            }
            if self.is_inside_data_table(&node) {
                continue;
            }

            if self.should_remove_conditionally(&node, tag) {
                node.detach();
            }
        }
    }

    fn should_remove_conditionally(&self, node: &NodeRef, tag: &str) -> bool {
        let weight = scoring::class_weight(node, self.flags);
        if weight < 0.0 {
            return true;
        }

        if dom::char_count(node, ',') >= 10 {
            return false;
        }

        let p_count = dom::descendants_with_tags(node, &["p"]).len() as f64;
        let img_count = dom::descendants_with_tags(node, &["img"]).len() as f64;
        let li_count = dom::descendants_with_tags(node, &["li"]).len() as f64 - 100.0;
        let input_count = dom::descendants_with_tags(node, &["input"]).len() as f64;
        let heading_density =
            dom::text_density(node, &["h1", "h2", "h3", "h4", "h5", "h6"]);

        let mut embed_count = 0.0;
        for embed in dom::descendants_with_tags(node, &["object", "embed", "iframe"]) {
            if self.is_allowed_embed(&embed) {
                // a legitimate video keeps the whole node
                return false;
            }
            embed_count += 1.0;
        }

        let link_density = dom::link_density(node);
        let content_length = dom::inner_text(node, true).chars().count();
        let is_list = self.is_list_node(node, tag);
        let inside_figure = dom::has_ancestor_tag(node, "figure", 3);

        (img_count > 1.0 && p_count / img_count < 0.5 && !inside_figure)
            || (!is_list && li_count > p_count)
            || input_count > (p_count / 3.0).floor()
            || (!is_list
                && heading_density < 0.9
                && content_length < 25
                && (img_count == 0.0 || img_count > 2.0)
                && !inside_figure)
            || (!is_list && weight < 25.0 && link_density > 0.2)
            || (weight >= 25.0 && link_density > 0.5)
            || ((embed_count == 1.0 && content_length < 75) || embed_count > 1.0)
    }

    fn is_list_node(&self, node: &NodeRef, tag: &str) -> bool {
        if tag == "ul" || tag == "ol" {
            return true;
        }
        let total_length = dom::inner_text(node, true).chars().count();
        if total_length == 0 {
            return false;
        }
        let list_length: usize = dom::descendants_with_tags(node, &["ul", "ol"])
            .iter()
            .map(|list| dom::inner_text(list, true).chars().count())
            .sum();
        list_length as f64 / total_length as f64 > 0.9
    }

    /// Walk the subtree below `root` removing nodes the filter matches,
    /// with the walk-safe successor computation.
    fn clean_matched_nodes<F>(&self, root: &NodeRef, filter: F)
    where
        F: Fn(&NodeRef, &str) -> bool,
    {
        let end = dom::next_element(root, true);
        let mut next = dom::next_element(root, false);
        while let Some(node) = next {
            if end.as_ref().map(|e| dom::same_node(e, &node)).unwrap_or(false) {
                break;
            }
            if filter(&node, &dom::match_string(&node)) {
                next = dom::remove_and_get_next(&node);
            } else {
                next = dom::next_element(&node, false);
            }
        }
    }

    /// Headings that the class weight marks as boilerplate.
    fn clean_headers(&self, root: &NodeRef) {
        for heading in dom::descendants_with_tags(root, &["h1", "h2"]) {
            if scoring::class_weight(&heading, self.flags) < 0.0 {
                heading.detach();
            }
        }
    }

    fn remove_empty_paragraphs(&self, root: &NodeRef) {
        for paragraph in dom::descendants_with_tags(root, &["p"]) {
            let media = dom::descendants_with_tags(
                &paragraph,
                &["img", "embed", "object", "iframe"],
            );
            if media.is_empty() && dom::inner_text(&paragraph, false).is_empty() {
                paragraph.detach();
            }
        }
    }

    /// Replace a table holding a single cell with the cell's content.
    fn collapse_single_cell_tables(&self, root: &NodeRef) {
        for table in dom::descendants_with_tags(root, &["table"]) {
            let tbody = if dom::has_single_tag_inside(&table, "tbody") {
                dom::first_element_child(&table).unwrap_or_else(|| table.clone())
            } else {
                table.clone()
            };
            if !dom::has_single_tag_inside(&tbody, "tr") {
                continue;
            }
            let row = match dom::first_element_child(&tbody) {
                Some(row) => row,
                None => continue,
            };
            if !dom::has_single_tag_inside(&row, "td") {
                continue;
            }
            let cell = match dom::first_element_child(&row) {
                Some(cell) => cell,
                None => continue,
            };

            let all_phrasing = cell.children().all(|child| dom::is_phrasing_content(&child));
            let cell = dom::set_node_tag(&cell, if all_phrasing { "p" } else { "div" });
            cell.detach();
            table.insert_before(cell);
            table.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchikikiki::parse_html;
    use kuchikikiki::traits::TendrilSink;

    fn clean_article(html: &str) -> NodeRef {
        let options = DistillOptions::default();
        let doc = parse_html().one(html);
        let body = doc.select_first("body").unwrap().as_node().clone();
        let mut cleaner = Cleaner::new(&options, Flags::all());
        cleaner.prep_article(&body);
        body
    }

    const PROSE: &str = "Paragraph text that is long enough to count as real content, \
        with a sentence structure, some commas, and a full stop at the end.";

    #[test]
    fn forms_and_widgets_are_removed() {
        let body = clean_article(&format!(
            "<body><p>{PROSE}</p>\
             <form><input type='text'></form>\
             <button>Subscribe</button><select><option>x</option></select>\
             <iframe src='https://ads.example.com/frame'></iframe></body>"
        ));
        assert!(body.select("form, button, select, iframe, input").unwrap().next().is_none());
        assert!(body.select("p").unwrap().next().is_some());
    }

    #[test]
    fn video_iframes_survive() {
        let body = clean_article(&format!(
            "<body><p>{PROSE}</p>\
             <iframe src='https://www.youtube.com/embed/abc'></iframe></body>"
        ));
        assert!(body.select("iframe").unwrap().next().is_some());
    }

    #[test]
    fn presentational_attributes_are_stripped() {
        let body = clean_article(&format!(
            "<body><div align='center' bgcolor='red' style='color: blue'><p>{PROSE}</p>\
             <table width='400' summary='data'><tr><td>a</td><td>b</td></tr></table></div></body>"
        ));
        let div = dom::first_element_child(&body).unwrap();
        assert!(dom::attr(&div, "align").is_none());
        assert!(dom::attr(&div, "bgcolor").is_none());
        assert!(dom::attr(&div, "style").is_none());
        let table = dom::descendants_with_tags(&body, &["table"])
            .into_iter()
            .next()
            .unwrap();
        assert!(dom::attr(&table, "width").is_none());
    }

    #[test]
    fn data_tables_survive_conditional_cleaning() {
        let body = clean_article(&format!(
            "<body><p>{PROSE}</p>\
             <table summary='quarterly results'>\
             <tr><td><a href='/a'>x</a></td><td><a href='/b'>y</a></td></tr>\
             </table></body>"
        ));
        assert!(body.select("table").unwrap().next().is_some());
    }

    #[test]
    fn link_heavy_layout_divs_are_removed() {
        let body = clean_article(&format!(
            "<body><p>{PROSE}</p>\
             <div id='linkfarm'><a href='/1'>one</a> <a href='/2'>two</a> \
             <a href='/3'>three</a> short</div></body>"
        ));
        assert!(body.select("#linkfarm").unwrap().next().is_none());
    }

    #[test]
    fn stray_h1_is_demoted() {
        let body = clean_article(&format!(
            "<body><h1>Headline</h1><p>{PROSE}</p></body>"
        ));
        assert!(body.select("h1").unwrap().next().is_none());
        assert!(body.select("h2").unwrap().next().is_some());
    }

    #[test]
    fn negative_weight_headings_are_removed() {
        let body = clean_article(&format!(
            "<body><h2 class='share-footer'>Share this</h2><h2>Real heading</h2>\
             <p>{PROSE}</p></body>"
        ));
        let headings = dom::descendants_with_tags(&body, &["h2"]);
        assert_eq!(headings.len(), 1);
        assert_eq!(dom::inner_text(&headings[0], true), "Real heading");
    }

    #[test]
    fn empty_paragraphs_are_removed_but_media_kept() {
        let body = clean_article(
            "<body><p id='empty'>   </p><p id='pic'><img src='a.jpg'></p></body>",
        );
        assert!(body.select("#empty").unwrap().next().is_none());
        assert!(body.select("#pic").unwrap().next().is_some());
    }

    #[test]
    fn single_cell_table_collapses_to_paragraph() {
        let body = clean_article(&format!(
            "<body><table><tbody><tr><td>{PROSE}</td></tr></tbody></table></body>"
        ));
        assert!(body.select("table").unwrap().next().is_none());
        let p = body.select_first("p").unwrap();
        assert!(p.as_node().text_contents().contains("Paragraph text"));
    }

    #[test]
    fn lazy_image_source_is_promoted() {
        let body = clean_article(
            "<body><figure><img class='lazy' data-src='https://cdn.example.com/photo.jpg'>\
             </figure></body>",
        );
        let img = body.select_first("img").unwrap();
        assert_eq!(
            img.attributes.borrow().get("src"),
            Some("https://cdn.example.com/photo.jpg")
        );
    }

    #[test]
    fn share_widgets_inside_content_are_removed() {
        let body = clean_article(&format!(
            "<body><div><p>{PROSE}</p><div class='share-buttons'>Share on X</div></div></body>"
        ));
        assert!(body.select(".share-buttons").unwrap().next().is_none());
    }

    #[test]
    fn cleaning_is_idempotent() {
        let options = DistillOptions::default();
        let doc = parse_html().one(format!(
            "<body><div><p>{PROSE}</p><ul><li><a href='/x'>x</a></li>\
             <li><a href='/y'>y</a></li></ul><form><input></form></div></body>"
        ));
        let body = doc.select_first("body").unwrap().as_node().clone();

        let mut first = Cleaner::new(&options, Flags::all());
        first.prep_article(&body);
        let after_once = body.to_string();

        let mut second = Cleaner::new(&options, Flags::all());
        second.prep_article(&body);
        assert_eq!(body.to_string(), after_once);
    }
}
