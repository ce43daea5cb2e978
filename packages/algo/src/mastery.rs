//! Mastery Model
//!
//! Confidence-weighted exponential moving average over assessment evidence.
//! The first observation for a (user, concept) pair is taken at face value;
//! later observations blend into the prior with a weight that grows with the
//! evidence confidence but never exceeds [`WEIGHT_CAP`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::clamp_unit;
use crate::types::{MasteryRecord, MasterySnapshot};

pub const WEIGHT_BASE: f64 = 0.3;
pub const WEIGHT_SLOPE: f64 = 0.5;
pub const WEIGHT_CAP: f64 = 0.8;

/// One piece of assessment evidence for a (user, concept) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub user_id: String,
    pub concept_id: String,
    pub score: f64,
    pub confidence: f64,
    pub observed_at: DateTime<Utc>,
}

impl Evidence {
    pub fn new(
        user_id: impl Into<String>,
        concept_id: impl Into<String>,
        score: f64,
        confidence: f64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            concept_id: concept_id.into(),
            score,
            confidence,
            observed_at: Utc::now(),
        }
    }

    pub fn at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }
}

/// Blend weight for evidence of the given confidence
pub fn evidence_weight(confidence: f64) -> f64 {
    (clamp_unit(confidence) * WEIGHT_SLOPE + WEIGHT_BASE).min(WEIGHT_CAP)
}

/// Fold `evidence` into `current`, producing the record to persist.
///
/// Identity fields come from the evidence; a prior record for a different
/// pair is ignored and the evidence is treated as a cold start.
pub fn update(current: Option<MasteryRecord>, evidence: &Evidence) -> MasteryRecord {
    let score = clamp_unit(evidence.score);
    let confidence = clamp_unit(evidence.confidence);

    let prior = current.filter(|record| {
        record.user_id == evidence.user_id && record.concept_id == evidence.concept_id
    });

    let (mastery_level, confidence) = match prior {
        None => (score, confidence),
        Some(prior) => {
            let weight = evidence_weight(confidence);
            let level = clamp_unit(prior.mastery_level) * (1.0 - weight) + score * weight;
            let conf = clamp_unit(prior.confidence) * (1.0 - weight) + confidence * weight;
            (clamp_unit(level), clamp_unit(conf))
        }
    };

    MasteryRecord {
        user_id: evidence.user_id.clone(),
        concept_id: evidence.concept_id.clone(),
        mastery_level,
        confidence,
        last_assessed_at: evidence.observed_at,
    }
}

/// Collapse a user's records into concept -> level.
pub fn snapshot(records: &[MasteryRecord]) -> MasterySnapshot {
    records
        .iter()
        .map(|r| (r.concept_id.clone(), clamp_unit(r.mastery_level)))
        .collect()
}
