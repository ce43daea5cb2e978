//! # pathway-algo - adaptive learning-path core
//!
//! Pure Rust planning algorithms with no I/O:
//!
//! - **Mastery Model** - confidence-weighted exponential belief update
//! - **Prerequisite Graph** - cycle-tolerant topological ordering
//! - **Difficulty Pacing** - gradual / challenging / adaptive curves
//! - **Session Packer** - bounded sessions with spaced-repetition reviews
//! - **Plan Assembler** - the final learning-plan document
//!
//! ## Module layout
//!
//! - [`mastery`] - evidence weighting and record updates
//! - [`graph`] - adjacency-map prerequisite graph
//! - [`context`] - concept and mastery snapshots with defaults
//! - [`pacing`] - difficulty curves
//! - [`session`] - session chunking, activities and reviews
//! - [`planner`] - plan assembly and parameter validation
//! - [`sanitize`] - range clamping for stored values
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use pathway_algo::{optimize_learning_path, ConceptInfo, PathParams, PlanningContext};
//!
//! let ctx = PlanningContext::from_concepts(vec![
//!     ConceptInfo::new("sets", "Sets", 0.4),
//!     ConceptInfo::new("functions", "Functions", 0.6).with_prerequisites(["sets"]),
//! ]);
//! let ids = vec!["functions".to_string(), "sets".to_string()];
//! let plan = optimize_learning_path("learner-1", &ids, &ctx, &PathParams::default());
//!
//! assert_eq!(plan.ordered_concepts(), vec!["sets", "functions"]);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod context;
pub mod graph;
pub mod mastery;
pub mod pacing;
pub mod planner;
pub mod sanitize;
pub mod session;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use context::PlanningContext;
pub use graph::PrerequisiteGraph;
pub use mastery::Evidence;
pub use pacing::DifficultyBand;
pub use planner::{optimize_learning_path, optimized_sequence, validate_concept_ids, PlanError};
pub use session::{pack_sessions, PackingOptions};
