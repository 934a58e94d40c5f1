//! Badge trigger evaluation
//!
//! Runs only against a just-committed wrap-up and returns zero or more
//! `(child_id, badge_id)` candidates. Persisting awards (and notifying
//! anyone) is the badge service's job, not this engine's. Rules are
//! trait objects on the evaluator, so new triggers never change the
//! wrap-up workflow's contract.

use serde::Serialize;
use sprout_common::types::{Artifact, ReviewDecision, SessionWrapUp};
use std::collections::HashMap;
use uuid::Uuid;

/// One badge-award candidate derived from a committed wrap-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeCandidate {
    pub child_id: Uuid,
    pub badge_id: String,
}

/// A single badge trigger rule
pub trait BadgeRule: Send + Sync {
    /// Rule name for logs
    fn name(&self) -> &str;

    /// Candidates this rule derives from the committed wrap-up.
    /// `artifacts` holds the artifacts referenced by the wrap-up's
    /// review decisions.
    fn evaluate(&self, wrap_up: &SessionWrapUp, artifacts: &[Artifact]) -> Vec<BadgeCandidate>;
}

/// Award a badge to each student with at least `threshold` artifacts
/// approved in this wrap-up
///
/// Needs-revision and skipped artifacts never count toward the
/// threshold; skipped decisions are not even present in the committed
/// wrap-up.
pub struct ApprovedArtifactThreshold {
    pub threshold: usize,
    pub badge_id: String,
}

impl Default for ApprovedArtifactThreshold {
    fn default() -> Self {
        Self {
            threshold: 2,
            badge_id: "debug-detective".to_string(),
        }
    }
}

impl BadgeRule for ApprovedArtifactThreshold {
    fn name(&self) -> &str {
        "approved-artifact-threshold"
    }

    fn evaluate(&self, wrap_up: &SessionWrapUp, artifacts: &[Artifact]) -> Vec<BadgeCandidate> {
        let mut approved_per_child: HashMap<Uuid, usize> = HashMap::new();

        for review in &wrap_up.artifact_reviews {
            if review.decision != ReviewDecision::Approved {
                continue;
            }
            let Some(artifact) = artifacts.iter().find(|a| a.id == review.artifact_id) else {
                continue;
            };
            *approved_per_child.entry(artifact.child_id).or_default() += 1;
        }

        let mut candidates: Vec<BadgeCandidate> = approved_per_child
            .into_iter()
            .filter(|(_, count)| *count >= self.threshold)
            .map(|(child_id, _)| BadgeCandidate {
                child_id,
                badge_id: self.badge_id.clone(),
            })
            .collect();
        candidates.sort_by_key(|c| c.child_id);
        candidates
    }
}

/// Pluggable rule list evaluated after every finalize
pub struct BadgeEvaluator {
    rules: Vec<Box<dyn BadgeRule>>,
}

impl BadgeEvaluator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The shipped rule set
    pub fn standard() -> Self {
        Self::new().with_rule(Box::new(ApprovedArtifactThreshold::default()))
    }

    pub fn with_rule(mut self, rule: Box<dyn BadgeRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluate every rule, deduplicating identical (child, badge) pairs
    pub fn evaluate(&self, wrap_up: &SessionWrapUp, artifacts: &[Artifact]) -> Vec<BadgeCandidate> {
        let mut candidates: Vec<BadgeCandidate> = Vec::new();
        for rule in &self.rules {
            for candidate in rule.evaluate(wrap_up, artifacts) {
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }
}

impl Default for BadgeEvaluator {
    fn default() -> Self {
        Self::standard()
    }
}
