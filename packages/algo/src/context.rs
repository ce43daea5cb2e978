//! Planning context: the concept and mastery snapshots one planning run reads.
//!
//! Lookups never fail. A concept the content store did not return plans with
//! [`DEFAULT_DIFFICULTY`], no prerequisites and a synthesized name; a concept
//! without a mastery record counts as unmastered.

use std::collections::HashMap;

use crate::graph::PrerequisiteGraph;
use crate::sanitize::{sanitize_difficulty, sanitize_mastery};
use crate::types::{ConceptInfo, MasteryRecord, MasterySnapshot, DEFAULT_DIFFICULTY, DEFAULT_MASTERY};

#[derive(Debug, Clone, Default)]
pub struct PlanningContext {
    concepts: HashMap<String, ConceptInfo>,
    mastery: MasterySnapshot,
}

impl PlanningContext {
    pub fn new(concepts: HashMap<String, ConceptInfo>, mastery: MasterySnapshot) -> Self {
        Self { concepts, mastery }
    }

    pub fn from_concepts<I>(concepts: I) -> Self
    where
        I: IntoIterator<Item = ConceptInfo>,
    {
        Self {
            concepts: concepts.into_iter().map(|c| (c.id.clone(), c)).collect(),
            mastery: MasterySnapshot::new(),
        }
    }

    pub fn with_mastery_records(mut self, records: &[MasteryRecord]) -> Self {
        self.mastery.extend(crate::mastery::snapshot(records));
        self
    }

    pub fn set_mastery(&mut self, concept_id: impl Into<String>, level: f64) {
        self.mastery.insert(concept_id.into(), level);
    }

    pub fn concept(&self, concept_id: &str) -> Option<&ConceptInfo> {
        self.concepts.get(concept_id)
    }

    pub fn name(&self, concept_id: &str) -> String {
        self.concepts
            .get(concept_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Concept {concept_id}"))
    }

    pub fn difficulty(&self, concept_id: &str) -> f64 {
        self.concepts
            .get(concept_id)
            .map(|c| sanitize_difficulty(c.difficulty))
            .unwrap_or(DEFAULT_DIFFICULTY)
    }

    pub fn mastery(&self, concept_id: &str) -> f64 {
        self.mastery
            .get(concept_id)
            .map(|&level| sanitize_mastery(level))
            .unwrap_or(DEFAULT_MASTERY)
    }

    /// Raw difficulty discounted by current mastery
    pub fn effective_difficulty(&self, concept_id: &str) -> f64 {
        self.difficulty(concept_id) * (1.0 - self.mastery(concept_id))
    }

    /// Graph over the requested concepts the store knows about, in request order.
    pub fn dependency_graph(&self, requested: &[String]) -> PrerequisiteGraph {
        let mut graph = PrerequisiteGraph::new();
        for id in requested {
            if graph.contains(id) {
                continue;
            }
            if let Some(concept) = self.concepts.get(id) {
                graph.insert(id.clone(), concept.prerequisite_ids.iter().cloned());
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_concept_defaults() {
        let ctx = PlanningContext::default();
        assert_eq!(ctx.difficulty("nope"), 0.5);
        assert_eq!(ctx.mastery("nope"), 0.0);
        assert_eq!(ctx.name("nope"), "Concept nope");
        assert_eq!(ctx.effective_difficulty("nope"), 0.5);
    }

    #[test]
    fn test_graph_only_holds_known_requested_concepts() {
        let ctx = PlanningContext::from_concepts(vec![
            ConceptInfo::new("a", "A", 0.2),
            ConceptInfo::new("b", "B", 0.4).with_prerequisites(["a"]),
            ConceptInfo::new("c", "C", 0.4),
        ]);
        let graph = ctx.dependency_graph(&["b".to_string(), "a".to_string(), "x".to_string()]);
        assert_eq!(graph.len(), 2);
        assert!(!graph.contains("c"));
        assert!(!graph.contains("x"));
        assert_eq!(graph.prerequisites("b"), &["a".to_string()]);
    }

    #[test]
    fn test_effective_difficulty() {
        let mut ctx = PlanningContext::from_concepts(vec![ConceptInfo::new("a", "A", 0.8)]);
        ctx.set_mastery("a", 0.5);
        assert!((ctx.effective_difficulty("a") - 0.4).abs() < 1e-12);
    }
}
