//! Content-score bookkeeping.
//!
//! Scores live in a side-table keyed by node identity rather than on the
//! nodes themselves, so "has been scored" is an explicit presence test
//! and the tree type stays untouched. The store keeps a reference to each
//! scored node, which both anchors the key (no pointer reuse within a
//! run) and doubles as the candidate list.

use kuchikikiki::NodeRef;
use std::collections::HashMap;

use crate::constants::{Flags, REGEXPS};
use crate::dom;

/// Lazily populated map from node identity to mutable content score.
///
/// An entry, once created, is never removed for the lifetime of the run;
/// a missing entry means "not yet scored", which is distinct from a zero
/// score.
#[derive(Default)]
pub struct ScoreStore {
    scores: HashMap<usize, f64>,
    nodes: Vec<NodeRef>,
}

impl ScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scored(&self, node: &NodeRef) -> bool {
        self.scores.contains_key(&dom::node_id(node))
    }

    pub fn get(&self, node: &NodeRef) -> Option<f64> {
        self.scores.get(&dom::node_id(node)).copied()
    }

    pub fn set(&mut self, node: &NodeRef, score: f64) {
        debug_assert!(self.is_scored(node));
        self.scores.insert(dom::node_id(node), score);
    }

    pub fn add(&mut self, node: &NodeRef, delta: f64) {
        if let Some(score) = self.scores.get_mut(&dom::node_id(node)) {
            *score += delta;
        }
    }

    /// Attach the initial score: a tag-based base value plus the class/id
    /// weight. Does nothing when the node is already scored.
    pub fn initialize(&mut self, node: &NodeRef, flags: Flags) {
        let id = dom::node_id(node);
        if self.scores.contains_key(&id) {
            return;
        }

        let base = match dom::element_name(node) {
            Some("div") => 5.0,
            Some("pre") | Some("td") | Some("blockquote") => 3.0,
            Some("address") | Some("ol") | Some("ul") | Some("dl") | Some("dd")
            | Some("dt") | Some("li") | Some("form") => -3.0,
            Some("h1") | Some("h2") | Some("h3") | Some("h4") | Some("h5") | Some("h6")
            | Some("th") => -5.0,
            _ => 0.0,
        };

        self.scores.insert(id, base + class_weight(node, flags));
        self.nodes.push(node.clone());
    }

    /// Every node initialized so far, in initialization order.
    pub fn scored_nodes(&self) -> &[NodeRef] {
        &self.nodes
    }
}

/// ±25 for positive/negative class and id keyword matches; zero when the
/// weight-by-class heuristic has been relaxed away.
pub fn class_weight(node: &NodeRef, flags: Flags) -> f64 {
    if !flags.contains(Flags::WEIGHT_CLASSES) {
        return 0.0;
    }

    let mut weight = 0.0;

    if let Some(class) = dom::attr(node, "class") {
        if !class.is_empty() {
            if REGEXPS.negative.is_match(&class) {
                weight -= 25.0;
            }
            if REGEXPS.positive.is_match(&class) {
                weight += 25.0;
            }
        }
    }

    if let Some(id) = dom::attr(node, "id") {
        if !id.is_empty() {
            if REGEXPS.negative.is_match(&id) {
                weight -= 25.0;
            }
            if REGEXPS.positive.is_match(&id) {
                weight += 25.0;
            }
        }
    }

    weight
}

/// A candidate with its density-adjusted score.
#[derive(Clone)]
pub struct Candidate {
    pub node: NodeRef,
    pub score: f64,
}

/// Bounded, descending-ordered shortlist of the best candidates.
///
/// Insertion replaces an entry only on strictly greater score, so of two
/// equal candidates the first one encountered keeps its slot.
pub struct TopCandidates {
    capacity: usize,
    entries: Vec<Candidate>,
}

impl TopCandidates {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, node: NodeRef, score: f64) {
        for slot in 0..self.capacity {
            let beats_slot = match self.entries.get(slot) {
                Some(existing) => score > existing.score,
                None => true,
            };
            if beats_slot {
                self.entries.insert(slot, Candidate { node, score });
                if self.entries.len() > self.capacity {
                    self.entries.pop();
                }
                return;
            }
        }
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter()
    }
}
