//! Unit tests for the wrap-up draft buffer
//!
//! Covers step ordering, per-step validation, the no-show exclusion
//! rule, and the draft-to-committed-aggregate conversion.

use super::*;
use chrono::TimeZone;
use sprout_common::types::{
    ArtifactFile, ArtifactType, SessionDelivery, SessionFormat, SessionStatus, StudentContext,
    SubmittedBy,
};

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 3, 16, 5, 0).unwrap()
}

fn student(first_name: &str) -> StudentContext {
    StudentContext {
        child_id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: "Thompson".to_string(),
        age: 10,
        enrollment_id: "enroll-001".to_string(),
        recent_capacities: Vec::new(),
        previous_session_summary: None,
        parent_notes: None,
    }
}

fn session_with_roster(roster: Vec<StudentContext>) -> Session {
    Session {
        id: Uuid::new_v4(),
        course_id: "course-001".into(),
        course_name: "Python Basics".into(),
        scheduled_at: Utc.with_ymd_and_hms(2024, 12, 3, 15, 0, 0).unwrap(),
        duration_minutes: 60,
        wrap_up_minutes: 10,
        format: SessionFormat::Group,
        delivery: SessionDelivery::Online,
        session_number: 4,
        total_sessions: 12,
        status: SessionStatus::WrapUpPending,
        instructor_id: Some(Uuid::new_v4()),
        assigned_at: None,
        confirmed_at: None,
        online: None,
        location: None,
        roster,
    }
}

fn artifact(child_id: Uuid, session_id: Option<Uuid>, status: ArtifactStatus) -> Artifact {
    Artifact {
        id: Uuid::new_v4(),
        child_id,
        child_first_name: "Jamie".into(),
        course_id: "course-001".into(),
        course_name: "Python Basics".into(),
        session_id,
        session_number: Some(4),
        kind: ArtifactType::Code,
        title: "loop_pattern.py".into(),
        description: None,
        files: vec![ArtifactFile {
            id: Uuid::new_v4(),
            filename: "loop_pattern.py".into(),
            url: "/uploads/artifacts/loop_pattern.py".into(),
            mime_type: "text/x-python".into(),
            size_bytes: 1234,
        }],
        submitted_at: ts(),
        submitted_by: SubmittedBy::Student,
        status,
        reviewed_at: None,
        reviewed_by: None,
        instructor_feedback: None,
        contributes_to_badges: vec!["debug-detective".into()],
    }
}

fn full_observations() -> Vec<CapacityObservation> {
    Capacity::ALL
        .iter()
        .map(|c| CapacityObservation {
            capacity: *c,
            level: ObservationLevel::Developing,
        })
        .collect()
}

// ============================================================================
// Opening the draft
// ============================================================================

#[test]
fn test_open_prefills_attendance_as_attended() {
    let session = session_with_roster(vec![student("Jamie"), student("Riley")]);
    let draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    assert!(draft.step_complete(WrapUpStep::Attendance));
    let wrap_up = draft.into_wrap_up(ts());
    assert_eq!(wrap_up.attendance.len(), 2);
    assert!(wrap_up
        .attendance
        .iter()
        .all(|a| a.status == AttendanceStatus::Attended));
}

#[test]
fn test_review_queue_keeps_only_eligible_artifacts() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);

    let eligible_tied = artifact(jamie_id, Some(session.id), ArtifactStatus::Submitted);
    let eligible_untied = artifact(jamie_id, None, ArtifactStatus::Submitted);
    let wrong_session = artifact(jamie_id, Some(Uuid::new_v4()), ArtifactStatus::Submitted);
    let already_reviewed = artifact(jamie_id, Some(session.id), ArtifactStatus::Approved);
    let other_child = artifact(Uuid::new_v4(), Some(session.id), ArtifactStatus::Submitted);

    let artifacts = vec![
        eligible_tied.clone(),
        eligible_untied.clone(),
        wrong_session,
        already_reviewed,
        other_child,
    ];
    let draft = WrapUpDraft::open(&session, Uuid::new_v4(), &artifacts, ts());

    assert_eq!(draft.review_queue(), &[eligible_tied.id, eligible_untied.id]);
}

// ============================================================================
// Step 1: Attendance
// ============================================================================

#[test]
fn test_attendance_override_and_departure_time_handling() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    draft
        .record_attendance(StudentAttendance {
            child_id: jamie_id,
            status: AttendanceStatus::LeftEarly,
            left_early_at: Some(ts()),
            notes: None,
        })
        .unwrap();

    // Overriding back to attended drops the stale departure time
    draft
        .record_attendance(StudentAttendance {
            child_id: jamie_id,
            status: AttendanceStatus::Attended,
            left_early_at: Some(ts()),
            notes: None,
        })
        .unwrap();

    let wrap_up = draft.into_wrap_up(ts());
    assert_eq!(wrap_up.attendance[0].status, AttendanceStatus::Attended);
    assert!(wrap_up.attendance[0].left_early_at.is_none());
}

#[test]
fn test_attendance_rejects_non_roster_student() {
    let session = session_with_roster(vec![student("Jamie")]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    let result = draft.record_attendance(StudentAttendance {
        child_id: Uuid::new_v4(),
        status: AttendanceStatus::Attended,
        left_early_at: None,
        notes: None,
    });
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_marking_no_show_discards_prior_observations() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    draft
        .record_observations(jamie_id, full_observations(), None)
        .unwrap();
    assert!(draft.step_complete(WrapUpStep::Observations));

    draft
        .record_attendance(StudentAttendance {
            child_id: jamie_id,
            status: AttendanceStatus::NoShow,
            left_early_at: None,
            notes: None,
        })
        .unwrap();

    // No observed students left; step stays complete but the set is gone
    assert!(draft.step_complete(WrapUpStep::Observations));
    let wrap_up = draft.into_wrap_up(ts());
    assert!(wrap_up.observations.is_empty());
}

// ============================================================================
// Step 2: Artifact review
// ============================================================================

#[test]
fn test_needs_revision_requires_feedback() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let art = artifact(jamie_id, Some(session.id), ArtifactStatus::Submitted);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[art.clone()], ts());

    let result = draft.review_artifact(art.id, ReviewDecision::NeedsRevision, None, ts());
    assert!(matches!(result, Err(Error::MissingFeedback { .. })));

    // Whitespace does not count as feedback
    let result = draft.review_artifact(
        art.id,
        ReviewDecision::NeedsRevision,
        Some("   ".into()),
        ts(),
    );
    assert!(matches!(result, Err(Error::MissingFeedback { .. })));

    draft
        .review_artifact(
            art.id,
            ReviewDecision::NeedsRevision,
            Some("Please add comments to your code.".into()),
            ts(),
        )
        .unwrap();
}

#[test]
fn test_review_rejects_artifact_outside_queue() {
    let session = session_with_roster(vec![student("Jamie")]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    let result = draft.review_artifact(Uuid::new_v4(), ReviewDecision::Approved, None, ts());
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_skipped_artifacts_are_not_decided() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let approved = artifact(jamie_id, Some(session.id), ArtifactStatus::Submitted);
    let skipped = artifact(jamie_id, Some(session.id), ArtifactStatus::Submitted);
    let mut draft = WrapUpDraft::open(
        &session,
        Uuid::new_v4(),
        &[approved.clone(), skipped.clone()],
        ts(),
    );

    draft
        .review_artifact(approved.id, ReviewDecision::Approved, None, ts())
        .unwrap();
    draft
        .review_artifact(skipped.id, ReviewDecision::Skipped, None, ts())
        .unwrap();

    assert_eq!(draft.decided_reviews().len(), 1);
    let wrap_up = draft.into_wrap_up(ts());
    assert_eq!(wrap_up.artifact_reviews.len(), 1);
    assert_eq!(wrap_up.artifact_reviews[0].artifact_id, approved.id);
}

#[test]
fn test_artifacts_step_is_complete_with_empty_queue() {
    let session = session_with_roster(vec![student("Jamie")]);
    let draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());
    assert!(draft.step_complete(WrapUpStep::Artifacts));
}

// ============================================================================
// Step 3: Observations
// ============================================================================

#[test]
fn test_observations_rejected_for_no_show_student() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    draft
        .record_attendance(StudentAttendance {
            child_id: jamie_id,
            status: AttendanceStatus::NoShow,
            left_early_at: None,
            notes: None,
        })
        .unwrap();

    let result = draft.record_observations(jamie_id, full_observations(), None);
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_left_early_students_still_require_observations() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    draft
        .record_attendance(StudentAttendance {
            child_id: jamie_id,
            status: AttendanceStatus::LeftEarly,
            left_early_at: Some(ts()),
            notes: None,
        })
        .unwrap();

    assert_eq!(draft.observed_students(), vec![jamie_id]);
    assert!(!draft.step_complete(WrapUpStep::Observations));

    draft
        .record_observations(jamie_id, full_observations(), None)
        .unwrap();
    assert!(draft.step_complete(WrapUpStep::Observations));
}

#[test]
fn test_partial_observation_set_defaults_to_not_observed() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    draft
        .record_observations(
            jamie_id,
            vec![CapacityObservation {
                capacity: Capacity::Reasoning,
                level: ObservationLevel::Strong,
            }],
            None,
        )
        .unwrap();

    assert!(draft.step_complete(WrapUpStep::Observations));
    let wrap_up = draft.into_wrap_up(ts());
    let set = &wrap_up.observations[0];
    assert_eq!(set.capacity_observations.len(), 6);
    assert!(set.is_complete());

    let reasoning = set
        .capacity_observations
        .iter()
        .find(|o| o.capacity == Capacity::Reasoning)
        .unwrap();
    assert_eq!(reasoning.level, ObservationLevel::Strong);
    let focus = set
        .capacity_observations
        .iter()
        .find(|o| o.capacity == Capacity::Focus)
        .unwrap();
    assert_eq!(focus.level, ObservationLevel::NotObserved);
}

#[test]
fn test_duplicate_capacities_rejected() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    let result = draft.record_observations(
        jamie_id,
        vec![
            CapacityObservation {
                capacity: Capacity::Focus,
                level: ObservationLevel::Strong,
            },
            CapacityObservation {
                capacity: Capacity::Focus,
                level: ObservationLevel::Developing,
            },
        ],
        None,
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

// ============================================================================
// Step 4 + ordering
// ============================================================================

#[test]
fn test_summary_blocked_while_observations_incomplete() {
    let session = session_with_roster(vec![student("Jamie")]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    let result = draft.set_summary("Great session today, everyone!".into());
    assert!(matches!(
        result,
        Err(Error::IncompleteStep {
            step: WrapUpStep::Observations,
            ..
        })
    ));
}

#[test]
fn test_summary_length_gate() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());
    draft
        .record_observations(jamie_id, full_observations(), None)
        .unwrap();

    draft.set_summary("Too short".into()).unwrap();
    assert!(!draft.step_complete(WrapUpStep::Summary));

    draft
        .set_summary("Jamie made great progress with loops today.".into())
        .unwrap();
    assert!(draft.step_complete(WrapUpStep::Summary));
}

#[test]
fn test_finalizable_requires_every_step() {
    let jamie = student("Jamie");
    let jamie_id = jamie.child_id;
    let session = session_with_roster(vec![jamie]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    // Observations missing: rejected regardless of summary length
    draft.summary = "A perfectly long enough summary.".into();
    let result = draft.ensure_finalizable();
    assert!(matches!(
        result,
        Err(Error::IncompleteStep {
            step: WrapUpStep::Observations,
            ..
        })
    ));

    draft
        .record_observations(jamie_id, full_observations(), None)
        .unwrap();
    draft.ensure_finalizable().unwrap();
}

#[test]
fn test_no_show_student_does_not_block_finalization() {
    let jamie = student("Jamie");
    let riley = student("Riley");
    let jamie_id = jamie.child_id;
    let riley_id = riley.child_id;
    let session = session_with_roster(vec![jamie, riley]);
    let mut draft = WrapUpDraft::open(&session, Uuid::new_v4(), &[], ts());

    draft
        .record_attendance(StudentAttendance {
            child_id: riley_id,
            status: AttendanceStatus::NoShow,
            left_early_at: None,
            notes: None,
        })
        .unwrap();

    // Only Jamie needs observations
    assert_eq!(draft.observed_students(), vec![jamie_id]);
    draft
        .record_observations(jamie_id, full_observations(), None)
        .unwrap();
    draft
        .set_summary("Jamie worked through the spiral project.".into())
        .unwrap();

    draft.ensure_finalizable().unwrap();

    let wrap_up = draft.into_wrap_up(ts());
    assert_eq!(wrap_up.attendance.len(), 2);
    assert_eq!(wrap_up.observations.len(), 1);
    assert_eq!(wrap_up.observations[0].child_id, jamie_id);
}
