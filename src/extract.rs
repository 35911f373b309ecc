//! The extraction core.
//!
//! One attempt = a destructive filter walk over a pristine parse, a
//! scoring pass over the surviving elements, top-candidate resolution,
//! sibling aggregation, and the structural cleanup. The retry controller
//! wraps attempts, relaxing one heuristic flag at a time until the length
//! threshold is met or every flag is spent.

use kuchikikiki::traits::TendrilSink;
use kuchikikiki::{parse_html, NodeRef};

use crate::cleaner::Cleaner;
use crate::constants::{Flags, KEEP_SIBLING_TAGS, REGEXPS, SCORABLE_TAGS, UNLIKELY_ROLES};
use crate::dom;
use crate::error::{DistillError, Result};
use crate::options::DistillOptions;
use crate::scoring::{ScoreStore, TopCandidates};
use crate::text;

/// Alternates that must agree on an ancestor before the resolver climbs
/// to it.
const MINIMUM_TOP_CANDIDATES: usize = 3;

/// What the core hands back to the orchestrator.
pub struct Extraction {
    /// The aggregated, cleaned article container.
    pub content: NodeRef,
    /// Byline captured by the filter walk, if any.
    pub byline: Option<String>,
    /// Direction from the candidate's ancestor chain.
    pub dir: Option<String>,
    /// Root element language.
    pub lang: Option<String>,
}

/// One full pipeline run's output, kept for fallback comparison.
struct Attempt {
    content: NodeRef,
    text_length: usize,
    dir: Option<String>,
}

/// Run the extraction loop against the preprocessed document markup.
///
/// Each attempt starts from a fresh parse of `prepped_html`, which is the
/// rollback mechanism: flags only ever relax, so restoring the pristine
/// tree and re-running is equivalent to snapshotting before mutation.
pub fn extract_content(
    prepped_html: &str,
    title: &str,
    options: &DistillOptions,
) -> Result<Extraction> {
    let mut run = Run::new(options);

    loop {
        let doc = parse_html().one(prepped_html);
        let body = doc
            .select_first("body")
            .map_err(|()| DistillError::NoBody)?
            .as_node()
            .clone();

        let (article, dir) = run.attempt(&doc, &body, title);
        let text_length = dom::inner_text(&article, true).chars().count();

        if text_length >= options.char_threshold {
            run.log(&format!("accepted attempt with {} chars", text_length));
            return Ok(Extraction {
                content: article,
                byline: run.byline,
                dir,
                lang: run.lang,
            });
        }

        run.log(&format!(
            "attempt produced {} chars, below threshold {}",
            text_length, options.char_threshold
        ));
        run.attempts.push(Attempt {
            content: article,
            text_length,
            dir,
        });

        if !run.relax() {
            // exhausted: fall back to the longest attempt
            run.attempts
                .sort_by(|a, b| b.text_length.cmp(&a.text_length));
            let best = match run.attempts.into_iter().next() {
                Some(attempt) if attempt.text_length > 0 => attempt,
                _ => return Err(DistillError::NoArticleFound),
            };
            return Ok(Extraction {
                content: best.content,
                byline: run.byline,
                dir: best.dir,
                lang: run.lang,
            });
        }
    }
}

/// Mutable state threaded through one document's attempts.
struct Run<'a> {
    options: &'a DistillOptions,
    flags: Flags,
    byline: Option<String>,
    lang: Option<String>,
    attempts: Vec<Attempt>,
}

impl<'a> Run<'a> {
    fn new(options: &'a DistillOptions) -> Self {
        Self {
            options,
            flags: Flags::all(),
            byline: None,
            lang: None,
            attempts: Vec::new(),
        }
    }

    fn log(&self, message: &str) {
        if self.options.debug_logging {
            eprintln!("distiller: {}", message);
        }
    }

    /// Clear the highest-priority flag still set. Returns `false` once
    /// every flag is gone, which ends the retry loop.
    fn relax(&mut self) -> bool {
        for flag in [
            Flags::STRIP_UNLIKELYS,
            Flags::WEIGHT_CLASSES,
            Flags::CLEAN_CONDITIONALLY,
        ] {
            if self.flags.contains(flag) {
                self.flags.remove(flag);
                return true;
            }
        }
        false
    }

    /// One full pipeline pass. Returns the aggregated container and the
    /// direction found on the candidate's ancestor chain.
    fn attempt(&mut self, doc: &NodeRef, body: &NodeRef, title: &str) -> (NodeRef, Option<String>) {
        let elements_to_score = self.filter_walk(doc, title);
        let (mut store, top) = self.score_elements(elements_to_score);
        let (top_candidate, created) = self.select_top_candidate(body, &top, &mut store);

        // the candidate moves into the article container below, so its
        // original chain has to be captured now
        let parent_of_top = top_candidate.parent();
        let dir = find_direction(parent_of_top.as_ref(), &top_candidate);

        let article = self.aggregate_siblings(&top_candidate, parent_of_top.as_ref(), &store);

        Cleaner::new(self.options, self.flags).prep_article(&article);

        if created {
            dom::set_attr(&top_candidate, "id", "readability-page-1");
            dom::set_attr(&top_candidate, "class", "page");
        } else {
            let page = dom::new_element("div");
            dom::set_attr(&page, "id", "readability-page-1");
            dom::set_attr(&page, "class", "page");
            let children: Vec<NodeRef> = article.children().collect();
            for child in children {
                page.append(child);
            }
            article.append(page);
        }

        (article, dir)
    }

    /// The single destructive walk: drop hidden, byline, duplicate-title
    /// and unlikely nodes, flatten stray inline runs, and queue scorable
    /// elements. Successors are computed before any removal.
    fn filter_walk(&mut self, doc: &NodeRef, title: &str) -> Vec<NodeRef> {
        let mut elements_to_score = Vec::new();
        let mut should_remove_title_header = true;

        let mut node = doc
            .select_first("html")
            .ok()
            .map(|html| html.as_node().clone())
            .or_else(|| dom::first_element_child(doc));

        while let Some(current) = node {
            if dom::is_tag(&current, "html") && self.lang.is_none() {
                self.lang = dom::attr(&current, "lang").filter(|lang| !lang.is_empty());
            }

            let match_string = dom::match_string(&current);

            if !dom::is_probably_visible(&current) {
                self.log(&format!("removing hidden node - {}", match_string.trim()));
                node = dom::remove_and_get_next(&current);
                continue;
            }

            if self.check_byline(&current, &match_string) {
                node = dom::remove_and_get_next(&current);
                continue;
            }

            if should_remove_title_header && header_duplicates_title(&current, title) {
                should_remove_title_header = false;
                node = dom::remove_and_get_next(&current);
                continue;
            }

            if self.flags.contains(Flags::STRIP_UNLIKELYS) {
                let unlikely = REGEXPS
                    .unlikely_candidates
                    .iter()
                    .all(|pattern| pattern.is_match(&match_string))
                    && !REGEXPS.maybe_candidate.is_match(&match_string)
                    && !dom::has_ancestor_tag(&current, "table", 3)
                    && !dom::has_ancestor_tag(&current, "code", 3)
                    && !dom::is_tag(&current, "body")
                    && !dom::is_tag(&current, "a");
                if unlikely {
                    self.log(&format!("removing unlikely candidate - {}", match_string.trim()));
                    node = dom::remove_and_get_next(&current);
                    continue;
                }

                if let Some(role) = dom::attr(&current, "role") {
                    if UNLIKELY_ROLES.contains(&role.as_str()) {
                        self.log(&format!("removing node with role {}", role));
                        node = dom::remove_and_get_next(&current);
                        continue;
                    }
                }
            }

            let tag = dom::element_name(&current).unwrap_or("").to_string();

            let empty_block = matches!(
                tag.as_str(),
                "div" | "section" | "header" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            ) && dom::is_element_without_content(&current);
            if empty_block {
                node = dom::remove_and_get_next(&current);
                continue;
            }

            if SCORABLE_TAGS.contains(&tag.as_str()) {
                elements_to_score.push(current.clone());
            }

            if tag == "div" {
                wrap_phrasing_runs(&current);

                if dom::has_single_tag_inside(&current, "p") && dom::link_density(&current) < 0.25
                {
                    if let Some(paragraph) = dom::first_element_child(&current) {
                        current.insert_before(paragraph.clone());
                        current.detach();
                        elements_to_score.push(paragraph.clone());
                        node = dom::next_element(&paragraph, false);
                        continue;
                    }
                } else if !dom::has_child_block_element(&current) {
                    let paragraph = dom::set_node_tag(&current, "p");
                    elements_to_score.push(paragraph.clone());
                    node = dom::next_element(&paragraph, false);
                    continue;
                }
            }

            node = dom::next_element(&current, false);
        }

        elements_to_score
    }

    /// Capture a byline the first time a marker element with plausible
    /// text shows up; the element itself is removed by the caller.
    fn check_byline(&mut self, node: &NodeRef, match_string: &str) -> bool {
        if self.byline.is_some() {
            return false;
        }

        let rel = dom::attr(node, "rel").unwrap_or_default();
        let itemprop = dom::attr(node, "itemprop").unwrap_or_default();
        let marker = rel == "author"
            || itemprop.contains("author")
            || REGEXPS.byline.is_match(match_string);
        if !marker {
            return false;
        }

        let candidate = node.text_contents().trim().to_string();
        if !candidate.is_empty() && candidate.chars().count() < 100 {
            self.byline = Some(candidate);
            return true;
        }
        false
    }

    /// Score queued elements and propagate weighted shares to up to five
    /// ancestors, then adjust every candidate by its link density and
    /// rank the best into the bounded shortlist.
    fn score_elements(&self, elements: Vec<NodeRef>) -> (ScoreStore, TopCandidates) {
        let mut store = ScoreStore::new();

        for element in &elements {
            let parent_is_element = element
                .parent()
                .map(|parent| dom::is_element(&parent))
                .unwrap_or(false);
            if !parent_is_element {
                continue;
            }

            let inner = dom::inner_text(element, true);
            if inner.chars().count() < 25 {
                continue;
            }

            let ancestors = dom::element_ancestors(element, 5);
            if ancestors.is_empty() {
                continue;
            }

            let mut content_score = 1.0;
            content_score += inner.split(',').count() as f64;
            content_score += (inner.chars().count() / 100).min(3) as f64;

            for (level, ancestor) in ancestors.iter().enumerate() {
                let grandparent_is_element = ancestor
                    .parent()
                    .map(|parent| dom::is_element(&parent))
                    .unwrap_or(false);
                if !grandparent_is_element {
                    continue;
                }

                store.initialize(ancestor, self.flags);

                let divider = match level {
                    0 => 1.0,
                    1 => 2.0,
                    _ => (level * 3) as f64,
                };
                store.add(ancestor, content_score / divider);
            }
        }

        let mut top = TopCandidates::new(self.options.candidate_count);
        let scored: Vec<NodeRef> = store.scored_nodes().to_vec();
        for candidate in scored {
            let raw = store.get(&candidate).unwrap_or(0.0);
            let adjusted = raw
                * (1.0 - dom::link_density(&candidate) + self.options.link_density_modifier);
            store.set(&candidate, adjusted);
            self.log(&format!(
                "candidate {} scored {:.2}",
                dom::element_name(&candidate).unwrap_or("?"),
                adjusted
            ));
            top.insert(candidate, adjusted);
        }

        (store, top)
    }

    /// Pick the final article root: synthesize a wrapper when nothing
    /// usable scored, otherwise climb to consensus/parent candidates and
    /// collapse single-child chains.
    fn select_top_candidate(
        &self,
        body: &NodeRef,
        top: &TopCandidates,
        store: &mut ScoreStore,
    ) -> (NodeRef, bool) {
        let best = top.best();
        let needs_wrapper = match best {
            None => true,
            Some(candidate) => dom::is_tag(&candidate.node, "body"),
        };

        if needs_wrapper {
            self.log("no usable candidate, wrapping body content");
            let wrapper = dom::new_element("div");
            let children: Vec<NodeRef> = body.children().collect();
            for child in children {
                wrapper.append(child);
            }
            body.append(wrapper.clone());
            store.initialize(&wrapper, self.flags);
            return (wrapper, true);
        }

        let mut top_candidate = best.map(|candidate| candidate.node.clone()).unwrap_or_else(|| body.clone());
        let best_score = store.get(&top_candidate).unwrap_or(0.0);

        // consensus climb: when several strong alternates share an
        // ancestor, that ancestor is more likely the real article root
        if best_score > 0.0 {
            let alternative_ancestors: Vec<Vec<NodeRef>> = top
                .iter()
                .skip(1)
                .filter(|candidate| candidate.score / best_score >= 0.75)
                .map(|candidate| dom::element_ancestors(&candidate.node, 0))
                .collect();

            if alternative_ancestors.len() >= MINIMUM_TOP_CANDIDATES {
                let mut parent = top_candidate.parent();
                'climb: while let Some(current) = parent {
                    if !dom::is_element(&current) || dom::is_tag(&current, "body") {
                        break;
                    }
                    let mut lists_containing = 0;
                    for ancestors in &alternative_ancestors {
                        if ancestors
                            .iter()
                            .any(|ancestor| dom::same_node(ancestor, &current))
                        {
                            lists_containing += 1;
                        }
                        if lists_containing >= MINIMUM_TOP_CANDIDATES {
                            top_candidate = current.clone();
                            break 'climb;
                        }
                    }
                    parent = current.parent();
                }
            }
        }
        store.initialize(&top_candidate, self.flags);

        // parent-score climb: a parent accumulating score from many
        // children can beat the locally best child
        let mut last_score = store.get(&top_candidate).unwrap_or(0.0);
        let score_threshold = last_score / 3.0;
        let mut parent = top_candidate.parent();
        while let Some(current) = parent {
            if !dom::is_element(&current) || dom::is_tag(&current, "body") {
                break;
            }
            let parent_score = match store.get(&current) {
                Some(score) => score,
                None => {
                    parent = current.parent();
                    continue;
                }
            };
            if parent_score < score_threshold {
                break;
            }
            if parent_score > last_score {
                top_candidate = current;
                break;
            }
            last_score = parent_score;
            parent = current.parent();
        }

        // an only child tells us nothing; hoist to the lone parent
        let mut parent = top_candidate.parent();
        while let Some(current) = parent {
            if !dom::is_element(&current) || dom::is_tag(&current, "body") {
                break;
            }
            if current.children().filter(dom::is_element).count() != 1 {
                break;
            }
            top_candidate = current.clone();
            parent = top_candidate.parent();
        }

        store.initialize(&top_candidate, self.flags);
        (top_candidate, false)
    }

    /// Build the article container from the candidate and any siblings
    /// passing the secondary score/density checks.
    fn aggregate_siblings(
        &self,
        top_candidate: &NodeRef,
        parent_of_top: Option<&NodeRef>,
        store: &ScoreStore,
    ) -> NodeRef {
        let article = dom::new_element("div");

        let top_score = store.get(top_candidate).unwrap_or(0.0);
        let sibling_threshold = (top_score * 0.2).max(10.0);
        let top_class = dom::attr(top_candidate, "class").unwrap_or_default();

        let siblings: Vec<NodeRef> = match parent_of_top {
            Some(parent) => parent.children().filter(dom::is_element).collect(),
            None => vec![top_candidate.clone()],
        };

        for sibling in siblings {
            let mut append = dom::same_node(&sibling, top_candidate);

            if !append {
                let mut bonus = 0.0;
                if !top_class.is_empty()
                    && dom::attr(&sibling, "class").unwrap_or_default() == top_class
                {
                    bonus = top_score * 0.2;
                }

                if let Some(score) = store.get(&sibling) {
                    if score + bonus >= sibling_threshold {
                        append = true;
                    }
                } else if dom::is_tag(&sibling, "p") {
                    let density = dom::link_density(&sibling);
                    let content = dom::inner_text(&sibling, true);
                    let length = content.chars().count();

                    if (length > 80 && density < 0.25)
                        || (length > 0
                            && length < 80
                            && density == 0.0
                            && REGEXPS.sentence_end.is_match(&content))
                    {
                        append = true;
                    }
                }
            }

            if append {
                let keep_tag = dom::element_name(&sibling)
                    .map(|name| KEEP_SIBLING_TAGS.contains(&name))
                    .unwrap_or(false);
                let node = if keep_tag {
                    sibling
                } else {
                    // keep the content but neutralize the tag so the
                    // container stays uniform
                    dom::set_node_tag(&sibling, "div")
                };
                article.append(node);
            }
        }

        article
    }
}

/// Merge runs of phrasing children into synthetic paragraphs, closing a
/// run at the first non-phrasing sibling and trimming trailing
/// whitespace.
fn wrap_phrasing_runs(container: &NodeRef) {
    let mut paragraph: Option<NodeRef> = None;
    let mut child = container.first_child();

    while let Some(current) = child {
        let next_sibling = current.next_sibling();

        if dom::is_phrasing_content(&current) {
            if let Some(open) = &paragraph {
                open.append(current);
            } else if !dom::is_whitespace(&current) {
                let open = dom::new_element("p");
                current.insert_before(open.clone());
                open.append(current);
                paragraph = Some(open);
            }
        } else if let Some(open) = paragraph.take() {
            while let Some(last) = open.last_child() {
                if !dom::is_whitespace(&last) {
                    break;
                }
                last.detach();
            }
        }

        child = next_sibling;
    }

    if let Some(open) = paragraph {
        while let Some(last) = open.last_child() {
            if !dom::is_whitespace(&last) {
                break;
            }
            last.detach();
        }
    }
}

/// `h1`/`h2` whose text mostly repeats the page title.
fn header_duplicates_title(node: &NodeRef, title: &str) -> bool {
    if !dom::is_tag(node, "h1") && !dom::is_tag(node, "h2") {
        return false;
    }
    if title.trim().is_empty() {
        return false;
    }
    let heading = dom::inner_text(node, false);
    text::similarity(title, &heading) > 0.75
}

/// First `dir` attribute on the candidate, its original parent, or that
/// parent's ancestors.
fn find_direction(parent: Option<&NodeRef>, top_candidate: &NodeRef) -> Option<String> {
    let mut chain: Vec<NodeRef> = Vec::new();
    if let Some(parent) = parent {
        chain.push(parent.clone());
    }
    chain.push(top_candidate.clone());
    if let Some(parent) = parent {
        chain.extend(dom::element_ancestors(parent, 0));
    }

    chain
        .iter()
        .find_map(|node| dom::attr(node, "dir").filter(|dir| !dir.is_empty()))
}
