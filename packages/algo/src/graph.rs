//! Prerequisite Graph
//!
//! Adjacency mapping from a concept to its prerequisites. Nodes are plain
//! identifiers, so cycles need no special ownership handling; traversal
//! simply skips an edge that leads back into the node stack.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::types::ConceptInfo;

#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    /// Keys in insertion order, so traversal is deterministic
    nodes: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl PrerequisiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from concept snapshots, one node per concept.
    pub fn from_concepts<'a, I>(concepts: I) -> Self
    where
        I: IntoIterator<Item = &'a ConceptInfo>,
    {
        let mut graph = Self::new();
        for concept in concepts {
            graph.insert(concept.id.clone(), concept.prerequisite_ids.iter().cloned());
        }
        graph
    }

    /// Add or replace the prerequisite list for `concept_id`.
    pub fn insert<I>(&mut self, concept_id: String, prerequisites: I)
    where
        I: IntoIterator<Item = String>,
    {
        let prerequisites: Vec<String> = prerequisites.into_iter().collect();
        if !self.edges.contains_key(&concept_id) {
            self.nodes.push(concept_id.clone());
        }
        self.edges.insert(concept_id, prerequisites);
    }

    pub fn contains(&self, concept_id: &str) -> bool {
        self.edges.contains_key(concept_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declared prerequisites, including ones that are not graph nodes
    pub fn prerequisites(&self, concept_id: &str) -> &[String] {
        self.edges
            .get(concept_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Depth-first post-order over all nodes: prerequisites precede their
    /// dependents. Back-edges (cycles) and dangling references are skipped,
    /// so the result is a best-effort order on cyclic input.
    pub fn topological_order(&self) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for root in &self.nodes {
            if visited.contains(root.as_str()) {
                continue;
            }

            // (node, index of the next prerequisite to inspect)
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            visiting.insert(root.as_str());

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = (frame.0, &mut frame.1);
                let neighbours = self.prerequisites(node);

                let mut descend = None;
                while *cursor < neighbours.len() {
                    let next = neighbours[*cursor].as_str();
                    *cursor += 1;

                    if !self.contains(next) || visited.contains(next) {
                        continue;
                    }
                    if visiting.contains(next) {
                        debug!(from = node, to = next, "skipping cyclic prerequisite edge");
                        continue;
                    }
                    descend = Some(next);
                    break;
                }

                match descend {
                    Some(next) => {
                        visiting.insert(next);
                        stack.push((next, 0));
                    }
                    None => {
                        stack.pop();
                        visiting.remove(node);
                        visited.insert(node);
                        order.push(node.to_string());
                    }
                }
            }
        }

        order
    }

    /// Order `requested` so prerequisites come first where both are present.
    ///
    /// The full topological order is filtered down to requested ids (keeping
    /// every occurrence of a repeated id); requested ids without a graph node
    /// are appended in input order. If the result is not a permutation of the
    /// input, the input order is returned unchanged.
    pub fn order_requested(&self, requested: &[String]) -> Vec<String> {
        let mut remaining: HashMap<&str, usize> = HashMap::new();
        for id in requested {
            *remaining.entry(id.as_str()).or_default() += 1;
        }

        let mut sequence = Vec::with_capacity(requested.len());
        for node in self.topological_order() {
            if let Some(count) = remaining.remove(node.as_str()) {
                sequence.extend(std::iter::repeat(node).take(count));
            }
        }

        for id in requested {
            if remaining.contains_key(id.as_str()) {
                sequence.push(id.clone());
            }
        }

        if !is_permutation(&sequence, requested) {
            warn!(
                requested = requested.len(),
                produced = sequence.len(),
                "prerequisite ordering inconsistent, falling back to input order"
            );
            return requested.to_vec();
        }

        sequence
    }
}

fn is_permutation(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for id in a {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    for id in b {
        *counts.entry(id.as_str()).or_default() -= 1;
    }
    counts.values().all(|&c| c == 0)
}
