//! Difficulty Pacing
//!
//! Reorders a prerequisite-respecting base sequence according to a
//! [`DifficultyCurve`]. Every strategy is a pure function of the sequence,
//! the concept snapshot and the mastery snapshot.
//!
//! Gradual and adaptive pacing pick the next concept by a sort key but only
//! among concepts whose requested prerequisites are already placed. Without
//! prerequisite constraints this is exactly a stable sort by that key.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::context::PlanningContext;
use crate::graph::PrerequisiteGraph;
use crate::types::{DifficultyCurve, LOW_BAND_UPPER, MEDIUM_BAND_UPPER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DifficultyBand {
    Low,
    Medium,
    High,
}

impl DifficultyBand {
    pub fn classify(effective_difficulty: f64) -> Self {
        if effective_difficulty < LOW_BAND_UPPER {
            Self::Low
        } else if effective_difficulty < MEDIUM_BAND_UPPER {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl DifficultyCurve {
    /// Apply this pacing to `base`, which must already respect prerequisites.
    pub fn apply(
        &self,
        base: &[String],
        ctx: &PlanningContext,
        graph: &PrerequisiteGraph,
    ) -> Vec<String> {
        match self {
            Self::Gradual => gradual(base, ctx, graph),
            Self::Challenging => challenging(base, ctx, graph),
            Self::Adaptive => adaptive(base, ctx, graph),
        }
    }
}

/// Ascending effective difficulty.
pub fn gradual(base: &[String], ctx: &PlanningContext, graph: &PrerequisiteGraph) -> Vec<String> {
    let keys: Vec<f64> = base.iter().map(|id| ctx.effective_difficulty(id)).collect();
    constrained_order(base, graph, |a, b| keys[a].total_cmp(&keys[b]))
}

/// Low, medium, then high effective-difficulty band; base order inside a band.
pub fn adaptive(base: &[String], ctx: &PlanningContext, graph: &PrerequisiteGraph) -> Vec<String> {
    let bands: Vec<DifficultyBand> = base
        .iter()
        .map(|id| DifficultyBand::classify(ctx.effective_difficulty(id)))
        .collect();
    constrained_order(base, graph, |a, b| bands[a].cmp(&bands[b]))
}

/// Prerequisite levels, each sorted by raw difficulty descending.
///
/// A level holds every remaining concept none of whose prerequisites is still
/// remaining. When no concept qualifies (a cycle), all remaining concepts form
/// the final level.
pub fn challenging(
    base: &[String],
    ctx: &PlanningContext,
    graph: &PrerequisiteGraph,
) -> Vec<String> {
    let deps = dependency_positions(base, graph);
    let mut remaining: Vec<usize> = (0..base.len()).collect();
    let mut sequence = Vec::with_capacity(base.len());

    while !remaining.is_empty() {
        let pending: HashSet<usize> = remaining.iter().copied().collect();
        let (mut level, rest): (Vec<usize>, Vec<usize>) = remaining
            .iter()
            .copied()
            .partition(|&i| deps[i].iter().all(|d| !pending.contains(d)));

        if level.is_empty() {
            level = rest;
            remaining = Vec::new();
        } else {
            remaining = rest;
        }

        level.sort_by(|&a, &b| {
            ctx.difficulty(&base[b]).total_cmp(&ctx.difficulty(&base[a]))
        });
        sequence.extend(level.into_iter().map(|i| base[i].clone()));
    }

    sequence
}

/// For each position in `base`, the positions holding its prerequisites.
fn dependency_positions(base: &[String], graph: &PrerequisiteGraph) -> Vec<Vec<usize>> {
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, id) in base.iter().enumerate() {
        positions.entry(id.as_str()).or_default().push(i);
    }

    base.iter()
        .map(|id| {
            graph
                .prerequisites(id)
                .iter()
                .filter(|p| p.as_str() != id.as_str())
                .filter_map(|p| positions.get(p.as_str()))
                .flatten()
                .copied()
                .collect()
        })
        .collect()
}

/// Repeatedly take the smallest (by `cmp`, then base position) concept whose
/// prerequisites are placed; on a stall, take the smallest unplaced concept.
fn constrained_order<F>(base: &[String], graph: &PrerequisiteGraph, cmp: F) -> Vec<String>
where
    F: Fn(usize, usize) -> Ordering,
{
    let deps = dependency_positions(base, graph);
    let mut placed = vec![false; base.len()];
    let mut sequence = Vec::with_capacity(base.len());

    let better = |a: usize, b: usize| cmp(a, b).then(a.cmp(&b)) == Ordering::Less;

    for _ in 0..base.len() {
        let mut ready: Option<usize> = None;
        let mut fallback: Option<usize> = None;

        for i in (0..base.len()).filter(|&i| !placed[i]) {
            if fallback.map_or(true, |f| better(i, f)) {
                fallback = Some(i);
            }
            let unlocked = deps[i].iter().all(|&d| placed[d]);
            if unlocked && ready.map_or(true, |r| better(i, r)) {
                ready = Some(i);
            }
        }

        let Some(next) = ready.or(fallback) else {
            break;
        };
        placed[next] = true;
        sequence.push(base[next].clone());
    }

    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConceptInfo;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn ctx(concepts: Vec<ConceptInfo>, mastery: &[(&str, f64)]) -> PlanningContext {
        let mut ctx = PlanningContext::from_concepts(concepts);
        for (id, level) in mastery {
            ctx.set_mastery(*id, *level);
        }
        ctx
    }

    #[test]
    fn test_gradual_sorts_by_effective_difficulty() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("C1", "one", 0.2),
                ConceptInfo::new("C2", "two", 0.5),
                ConceptInfo::new("C3", "three", 0.8),
                ConceptInfo::new("C4", "four", 0.3),
            ],
            &[],
        );
        let base = ids(&["C1", "C2", "C3", "C4"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(gradual(&base, &ctx, &graph), ids(&["C1", "C4", "C2", "C3"]));
    }

    #[test]
    fn test_gradual_discounts_mastered_concepts() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("easy", "easy", 0.3),
                ConceptInfo::new("hard", "hard", 0.9),
            ],
            &[("hard", 0.9)],
        );
        let base = ids(&["easy", "hard"]);
        let graph = ctx.dependency_graph(&base);
        // 0.9 * 0.1 = 0.09 < 0.3
        assert_eq!(gradual(&base, &ctx, &graph), ids(&["hard", "easy"]));
    }

    #[test]
    fn test_gradual_keeps_prerequisite_before_easier_dependent() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("A", "a", 0.9),
                ConceptInfo::new("B", "b", 0.1).with_prerequisites(["A"]),
            ],
            &[],
        );
        let base = ids(&["A", "B"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(gradual(&base, &ctx, &graph), ids(&["A", "B"]));
    }

    #[test]
    fn test_gradual_missing_concept_defaults_to_half() {
        let ctx = ctx(vec![ConceptInfo::new("known", "k", 0.6)], &[]);
        let base = ids(&["known", "unknown"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(gradual(&base, &ctx, &graph), ids(&["unknown", "known"]));
    }

    #[test]
    fn test_challenging_levels() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("A", "a", 0.9),
                ConceptInfo::new("B", "b", 0.2).with_prerequisites(["A"]),
            ],
            &[],
        );
        let base = ids(&["A", "B"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(challenging(&base, &ctx, &graph), ids(&["A", "B"]));
    }

    #[test]
    fn test_challenging_hardest_first_within_level() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("root", "r", 0.1),
                ConceptInfo::new("x", "x", 0.4).with_prerequisites(["root"]),
                ConceptInfo::new("y", "y", 0.7).with_prerequisites(["root"]),
                ConceptInfo::new("z", "z", 0.5),
            ],
            &[],
        );
        let base = ids(&["root", "z", "x", "y"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(
            challenging(&base, &ctx, &graph),
            ids(&["z", "root", "y", "x"])
        );
    }

    #[test]
    fn test_challenging_cycle_dumps_remaining() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("A", "a", 0.3).with_prerequisites(["B"]),
                ConceptInfo::new("B", "b", 0.6).with_prerequisites(["A"]),
                ConceptInfo::new("C", "c", 0.1),
            ],
            &[],
        );
        let base = ids(&["A", "B", "C"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(challenging(&base, &ctx, &graph), ids(&["C", "B", "A"]));
    }

    #[test]
    fn test_adaptive_bands_preserve_base_order() {
        let ctx = ctx(
            vec![
                ConceptInfo::new("h1", "h1", 0.9),
                ConceptInfo::new("l1", "l1", 0.1),
                ConceptInfo::new("m1", "m1", 0.5),
                ConceptInfo::new("l2", "l2", 0.25),
                ConceptInfo::new("h2", "h2", 0.75),
            ],
            &[],
        );
        let base = ids(&["h1", "l1", "m1", "l2", "h2"]);
        let graph = ctx.dependency_graph(&base);
        assert_eq!(
            adaptive(&base, &ctx, &graph),
            ids(&["l1", "l2", "m1", "h1", "h2"])
        );
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(DifficultyBand::classify(0.29), DifficultyBand::Low);
        assert_eq!(DifficultyBand::classify(0.3), DifficultyBand::Medium);
        assert_eq!(DifficultyBand::classify(0.69), DifficultyBand::Medium);
        assert_eq!(DifficultyBand::classify(0.7), DifficultyBand::High);
    }
}
