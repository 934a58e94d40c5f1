//! In-memory wrap-up draft buffer
//!
//! One accumulating draft per session+instructor pair. Each record
//! operation validates its own step; completeness predicates gate step
//! entry and finalization. The draft converts into the committed
//! [`SessionWrapUp`] only at finalize time; abandoning it discards
//! everything and leaves the session `wrap-up-pending`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sprout_common::types::{
    Artifact, ArtifactReview, ArtifactStatus, AttendanceStatus, Capacity, CapacityObservation,
    ObservationLevel, ReviewDecision, Session, SessionWrapUp, StudentAttendance,
    StudentObservations, WrapUpStatus,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::WrapUpStep;
use crate::{Error, Result};

/// Minimum summary length to pass step 4
pub const MIN_SUMMARY_CHARS: usize = 10;

/// Roster entry kept for validation and error messages
#[derive(Debug, Clone)]
struct RosterStudent {
    child_id: Uuid,
    first_name: String,
}

/// Per-step completeness flags exposed for UI progress indication
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepCompleteness {
    pub attendance: bool,
    pub artifacts: bool,
    pub observations: bool,
    pub summary: bool,
}

/// Working buffer for one wrap-up workflow
#[derive(Debug, Clone)]
pub struct WrapUpDraft {
    pub session_id: Uuid,
    pub instructor_id: Uuid,
    pub started_at: DateTime<Utc>,

    roster: Vec<RosterStudent>,
    /// Artifact ids eligible for review in step 2, in submission order
    review_queue: Vec<Uuid>,

    attendance: HashMap<Uuid, StudentAttendance>,
    reviews: HashMap<Uuid, ArtifactReview>,
    observations: HashMap<Uuid, StudentObservations>,
    summary: String,
}

impl WrapUpDraft {
    /// Open a draft for a session
    ///
    /// Attendance defaults to `attended` for the whole roster; the
    /// instructor overrides per student. The review queue keeps only
    /// submitted artifacts belonging to roster students that are tied to
    /// this session or not yet tied to any.
    pub fn open(
        session: &Session,
        instructor_id: Uuid,
        pending_artifacts: &[Artifact],
        now: DateTime<Utc>,
    ) -> Self {
        let roster: Vec<RosterStudent> = session
            .roster
            .iter()
            .map(|s| RosterStudent {
                child_id: s.child_id,
                first_name: s.first_name.clone(),
            })
            .collect();

        let attendance = roster
            .iter()
            .map(|s| {
                (
                    s.child_id,
                    StudentAttendance {
                        child_id: s.child_id,
                        status: AttendanceStatus::Attended,
                        left_early_at: None,
                        notes: None,
                    },
                )
            })
            .collect();

        let review_queue = pending_artifacts
            .iter()
            .filter(|a| a.status == ArtifactStatus::Submitted)
            .filter(|a| roster.iter().any(|s| s.child_id == a.child_id))
            .filter(|a| a.session_id.is_none() || a.session_id == Some(session.id))
            .map(|a| a.id)
            .collect();

        Self {
            session_id: session.id,
            instructor_id,
            started_at: now,
            roster,
            review_queue,
            attendance,
            reviews: HashMap::new(),
            observations: HashMap::new(),
            summary: String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Step 1: Attendance
    // ------------------------------------------------------------------

    /// Record (or override) one student's attendance
    pub fn record_attendance(&mut self, mut record: StudentAttendance) -> Result<()> {
        self.ensure_roster_student(record.child_id)?;

        // Departure time only makes sense for left-early
        if record.status != AttendanceStatus::LeftEarly {
            record.left_early_at = None;
        }

        // A no-show student has no observation requirement; drop any set
        // recorded before the attendance change
        if record.status == AttendanceStatus::NoShow {
            self.observations.remove(&record.child_id);
        }

        self.attendance.insert(record.child_id, record);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Step 2: Artifact review
    // ------------------------------------------------------------------

    /// Record the instructor's decision on one queued artifact
    ///
    /// `needs-revision` without feedback text is rejected here, at the
    /// decision point, not deferred to finalization.
    pub fn review_artifact(
        &mut self,
        artifact_id: Uuid,
        decision: ReviewDecision,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_enterable(WrapUpStep::Artifacts)?;

        if !self.review_queue.contains(&artifact_id) {
            return Err(Error::NotFound(format!(
                "Artifact {} is not in this wrap-up's review queue",
                artifact_id
            )));
        }

        let feedback = feedback.filter(|f| !f.trim().is_empty());
        if decision == ReviewDecision::NeedsRevision && feedback.is_none() {
            return Err(Error::MissingFeedback { artifact_id });
        }

        self.reviews.insert(
            artifact_id,
            ArtifactReview {
                artifact_id,
                decision,
                feedback,
                reviewed_at: now,
            },
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Step 3: Observations
    // ------------------------------------------------------------------

    /// Record one student's six-capacity observation set
    ///
    /// Capacities left out default to `not-observed`; duplicates are
    /// rejected. Students marked no-show in step 1 are excluded from
    /// this step entirely.
    pub fn record_observations(
        &mut self,
        child_id: Uuid,
        observations: Vec<CapacityObservation>,
        additional_notes: Option<String>,
    ) -> Result<()> {
        self.ensure_enterable(WrapUpStep::Observations)?;
        self.ensure_roster_student(child_id)?;

        match self.attendance.get(&child_id).map(|a| a.status) {
            Some(AttendanceStatus::NoShow) => {
                return Err(Error::InvalidInput(format!(
                    "Student {} is marked no-show; no observations are recorded for them",
                    self.student_name(child_id)
                )));
            }
            Some(_) => {}
            None => {
                return Err(Error::IncompleteStep {
                    step: WrapUpStep::Attendance,
                    missing: format!("attendance for student {}", self.student_name(child_id)),
                });
            }
        }

        let mut set = StudentObservations {
            child_id,
            capacity_observations: observations,
            additional_notes: additional_notes.filter(|n| !n.trim().is_empty()),
        };

        let duplicates = set.duplicate_capacities();
        if !duplicates.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Duplicate capacity observations: {}",
                duplicates
                    .iter()
                    .map(Capacity::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        // Fill unset capacities with the not-observed default
        for capacity in set.missing_capacities() {
            set.capacity_observations.push(CapacityObservation {
                capacity,
                level: ObservationLevel::NotObserved,
            });
        }

        self.observations.insert(child_id, set);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Step 4: Summary
    // ------------------------------------------------------------------

    /// Set the parent-facing narrative summary
    pub fn set_summary(&mut self, text: String) -> Result<()> {
        self.ensure_enterable(WrapUpStep::Summary)?;
        self.summary = text;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Completeness
    // ------------------------------------------------------------------

    /// Students requiring observations: attended or left-early
    pub fn observed_students(&self) -> Vec<Uuid> {
        self.roster
            .iter()
            .filter(|s| {
                matches!(
                    self.attendance.get(&s.child_id).map(|a| a.status),
                    Some(AttendanceStatus::Attended) | Some(AttendanceStatus::LeftEarly)
                )
            })
            .map(|s| s.child_id)
            .collect()
    }

    /// Step completeness predicate
    pub fn step_complete(&self, step: WrapUpStep) -> bool {
        match step {
            WrapUpStep::Attendance => self
                .roster
                .iter()
                .all(|s| self.attendance.contains_key(&s.child_id)),
            // Skipping artifacts is valid; the step never blocks
            WrapUpStep::Artifacts => true,
            WrapUpStep::Observations => self.observed_students().iter().all(|id| {
                self.observations
                    .get(id)
                    .map(StudentObservations::is_complete)
                    .unwrap_or(false)
            }),
            WrapUpStep::Summary => self.summary.trim().chars().count() >= MIN_SUMMARY_CHARS,
        }
    }

    /// All four flags, for UI progress indication
    pub fn completeness(&self) -> StepCompleteness {
        StepCompleteness {
            attendance: self.step_complete(WrapUpStep::Attendance),
            artifacts: self.step_complete(WrapUpStep::Artifacts),
            observations: self.step_complete(WrapUpStep::Observations),
            summary: self.step_complete(WrapUpStep::Summary),
        }
    }

    /// Reject entering a step while an earlier one is incomplete
    pub fn ensure_enterable(&self, step: WrapUpStep) -> Result<()> {
        for earlier in step.predecessors() {
            if !self.step_complete(*earlier) {
                return Err(Error::IncompleteStep {
                    step: *earlier,
                    missing: self.incomplete_detail(*earlier),
                });
            }
        }
        Ok(())
    }

    /// Reject finalization while any step is incomplete
    pub fn ensure_finalizable(&self) -> Result<()> {
        for step in WrapUpStep::ORDER {
            if !self.step_complete(step) {
                return Err(Error::IncompleteStep {
                    step,
                    missing: self.incomplete_detail(step),
                });
            }
        }
        Ok(())
    }

    /// Which student/field is still missing for a step
    fn incomplete_detail(&self, step: WrapUpStep) -> String {
        match step {
            WrapUpStep::Attendance => {
                let missing: Vec<&str> = self
                    .roster
                    .iter()
                    .filter(|s| !self.attendance.contains_key(&s.child_id))
                    .map(|s| s.first_name.as_str())
                    .collect();
                format!("attendance for {}", missing.join(", "))
            }
            WrapUpStep::Artifacts => String::new(),
            WrapUpStep::Observations => {
                let missing: Vec<String> = self
                    .observed_students()
                    .iter()
                    .filter(|id| {
                        !self
                            .observations
                            .get(id)
                            .map(StudentObservations::is_complete)
                            .unwrap_or(false)
                    })
                    .map(|id| self.student_name(*id))
                    .collect();
                format!("observations for {}", missing.join(", "))
            }
            WrapUpStep::Summary => format!("summary of at least {} characters", MIN_SUMMARY_CHARS),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Artifact ids queued for review in step 2
    pub fn review_queue(&self) -> &[Uuid] {
        &self.review_queue
    }

    /// Reviews that advance an artifact's status (skipped excluded)
    pub fn decided_reviews(&self) -> Vec<&ArtifactReview> {
        self.review_queue
            .iter()
            .filter_map(|id| self.reviews.get(id))
            .filter(|r| r.decision != ReviewDecision::Skipped)
            .collect()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    fn ensure_roster_student(&self, child_id: Uuid) -> Result<()> {
        if self.roster.iter().any(|s| s.child_id == child_id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "Student {} is not on this session's roster",
                child_id
            )))
        }
    }

    fn student_name(&self, child_id: Uuid) -> String {
        self.roster
            .iter()
            .find(|s| s.child_id == child_id)
            .map(|s| s.first_name.clone())
            .unwrap_or_else(|| child_id.to_string())
    }

    // ------------------------------------------------------------------
    // Commit conversion
    // ------------------------------------------------------------------

    /// Convert the draft into the committed aggregate
    ///
    /// Attendance and observations come out in roster order; only decided
    /// artifact reviews are included; skipped artifacts stay `submitted`
    /// for a later review queue.
    pub fn into_wrap_up(self, completed_at: DateTime<Utc>) -> SessionWrapUp {
        let attendance = self
            .roster
            .iter()
            .filter_map(|s| self.attendance.get(&s.child_id).cloned())
            .collect();

        let observed = self.observed_students();
        let observations = self
            .roster
            .iter()
            .filter(|s| observed.contains(&s.child_id))
            .filter_map(|s| self.observations.get(&s.child_id).cloned())
            .collect();

        let artifact_reviews = self
            .review_queue
            .iter()
            .filter_map(|id| self.reviews.get(id).cloned())
            .filter(|r| r.decision != ReviewDecision::Skipped)
            .collect();

        SessionWrapUp {
            session_id: self.session_id,
            instructor_id: self.instructor_id,
            attendance,
            artifact_reviews,
            observations,
            summary: self.summary,
            status: WrapUpStatus::Completed,
            started_at: self.started_at,
            completed_at: Some(completed_at),
        }
    }
}

#[cfg(test)]
#[path = "draft_tests.rs"]
mod draft_tests;
