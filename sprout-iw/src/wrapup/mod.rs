//! Post-session wrap-up workflow
//!
//! A single-instructor, single-session saga with four ordered steps:
//! attendance, artifact review, observations, summary. All step data
//! accumulates in an in-memory [`WrapUpDraft`]; nothing is visible to
//! other collaborators until [`finalize`](finalize::finalize) commits the
//! whole aggregate in one transaction.

pub mod draft;
pub mod finalize;

pub use draft::{StepCompleteness, WrapUpDraft, MIN_SUMMARY_CHARS};
pub use finalize::{finalize, FinalizeOutcome};

use serde::{Deserialize, Serialize};

/// The four wrap-up steps, in workflow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapUpStep {
    Attendance,
    Artifacts,
    Observations,
    Summary,
}

impl WrapUpStep {
    /// Workflow order; a step is enterable only when every earlier step
    /// is complete
    pub const ORDER: [WrapUpStep; 4] = [
        WrapUpStep::Attendance,
        WrapUpStep::Artifacts,
        WrapUpStep::Observations,
        WrapUpStep::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WrapUpStep::Attendance => "attendance",
            WrapUpStep::Artifacts => "artifacts",
            WrapUpStep::Observations => "observations",
            WrapUpStep::Summary => "summary",
        }
    }

    /// Steps strictly before this one
    pub fn predecessors(&self) -> &'static [WrapUpStep] {
        const ALL: &[WrapUpStep] = &WrapUpStep::ORDER;
        let idx = ALL.iter().position(|s| s == self).unwrap_or(0);
        &ALL[..idx]
    }
}

impl std::fmt::Display for WrapUpStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
