//! Wrap-up workflow HTTP handlers
//!
//! The draft lives in shared state; these handlers validate each step at
//! the call that records it and surface completeness flags for the
//! dashboard's progress stepper. Only the finalize handler touches the
//! database.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprout_common::events::PortalEvent;
use sprout_common::time;
use sprout_common::types::{
    Artifact, AttendanceStatus, CapacityObservation, EarningsEntry, PayPeriod, ReviewDecision,
    Session, SessionStatus, SessionWrapUp, StudentAttendance,
};
use uuid::Uuid;

use crate::api::server::AppContext;
use crate::badges::BadgeCandidate;
use crate::db;
use crate::session::effective_status;
use crate::wrapup::{self, StepCompleteness, WrapUpDraft};
use crate::{Error, Result};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub instructor_id: Uuid,
}

/// Progress view of an in-flight draft
#[derive(Debug, Serialize)]
pub struct DraftView {
    pub session_id: Uuid,
    pub instructor_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub steps: StepCompleteness,
    /// Artifact ids queued for step 2
    pub review_queue: Vec<Uuid>,
    pub summary_chars: usize,
}

impl DraftView {
    fn build(draft: &WrapUpDraft) -> Self {
        Self {
            session_id: draft.session_id,
            instructor_id: draft.instructor_id,
            started_at: draft.started_at,
            steps: draft.completeness(),
            review_queue: draft.review_queue().to_vec(),
            summary_chars: draft.summary().chars().count(),
        }
    }
}

/// GET response: either the live draft or the committed aggregate
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WrapUpView {
    Draft(DraftView),
    Committed(SessionWrapUp),
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub child_id: Uuid,
    pub status: AttendanceStatus,
    pub left_early_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObservationsRequest {
    pub child_id: Uuid,
    pub observations: Vec<CapacityObservation>,
    pub additional_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub session: Session,
    pub wrap_up: SessionWrapUp,
    pub earnings: EarningsEntry,
    pub pay_period: PayPeriod,
    pub badge_candidates: Vec<BadgeCandidate>,
}

#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub artifacts: Vec<Artifact>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/:id/wrapup: open (or resume) the draft
pub async fn start(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<StartRequest>,
) -> Result<Json<DraftView>> {
    let now = time::now();
    let session = db::sessions::get_session(&ctx.db_pool, id).await?;

    match effective_status(&session, now) {
        SessionStatus::WrapUpPending => {}
        other => {
            return Err(Error::FinalizeConflict(format!(
                "Session {} is {}, not wrap-up-pending",
                id, other
            )));
        }
    }

    if session.instructor_id != Some(request.instructor_id) {
        return Err(Error::InvalidInput(format!(
            "Instructor {} is not assigned to session {}",
            request.instructor_id, id
        )));
    }

    let roster_ids: Vec<Uuid> = session.roster.iter().map(|s| s.child_id).collect();
    let pending = db::artifacts::list_submitted_for_children(&ctx.db_pool, &roster_ids).await?;

    let draft = WrapUpDraft::open(&session, request.instructor_id, &pending, now);
    let draft = ctx.state.open_draft(draft).await?;

    ctx.state.broadcast_event(PortalEvent::WrapUpStarted {
        session_id: id,
        instructor_id: request.instructor_id,
        timestamp: now,
    });

    Ok(Json(DraftView::build(&draft)))
}

/// GET /sessions/:id/wrapup: draft progress, or the committed wrap-up
pub async fn get_wrap_up(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<WrapUpView>> {
    if let Ok(draft) = ctx.state.get_draft(id).await {
        return Ok(Json(WrapUpView::Draft(DraftView::build(&draft))));
    }

    match db::wrapups::get_wrap_up(&ctx.db_pool, id).await? {
        Some(wrap_up) => Ok(Json(WrapUpView::Committed(wrap_up))),
        None => Err(Error::NotFound(format!(
            "No wrap-up in progress or committed for session {}",
            id
        ))),
    }
}

/// DELETE /sessions/:id/wrapup: abandon the draft
///
/// Discards the working buffer with no persisted effects; the session
/// stays wrap-up-pending and may be re-entered from step 1.
pub async fn abandon(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    ctx.state
        .remove_draft(id)
        .await
        .ok_or_else(|| Error::NotFound(format!("No wrap-up in progress for session {}", id)))?;

    ctx.state.broadcast_event(PortalEvent::WrapUpAbandoned {
        session_id: id,
        timestamp: time::now(),
    });

    Ok(Json(serde_json::json!({ "status": "abandoned" })))
}

/// PUT /sessions/:id/wrapup/attendance
pub async fn record_attendance(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Json<DraftView>> {
    ctx.state
        .with_draft(id, |draft| {
            draft.record_attendance(StudentAttendance {
                child_id: request.child_id,
                status: request.status,
                left_early_at: request.left_early_at,
                notes: request.notes.clone(),
            })
        })
        .await?;

    let draft = ctx.state.get_draft(id).await?;
    Ok(Json(DraftView::build(&draft)))
}

/// PUT /sessions/:id/wrapup/artifacts/:artifact_id
pub async fn review_artifact(
    State(ctx): State<AppContext>,
    Path((id, artifact_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<DraftView>> {
    let now = time::now();
    ctx.state
        .with_draft(id, |draft| {
            draft.review_artifact(artifact_id, request.decision, request.feedback.clone(), now)
        })
        .await?;

    let draft = ctx.state.get_draft(id).await?;
    Ok(Json(DraftView::build(&draft)))
}

/// PUT /sessions/:id/wrapup/observations
pub async fn record_observations(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ObservationsRequest>,
) -> Result<Json<DraftView>> {
    ctx.state
        .with_draft(id, |draft| {
            draft.record_observations(
                request.child_id,
                request.observations.clone(),
                request.additional_notes.clone(),
            )
        })
        .await?;

    let draft = ctx.state.get_draft(id).await?;
    Ok(Json(DraftView::build(&draft)))
}

/// PUT /sessions/:id/wrapup/summary
pub async fn set_summary(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<DraftView>> {
    ctx.state
        .with_draft(id, |draft| draft.set_summary(request.summary.clone()))
        .await?;

    let draft = ctx.state.get_draft(id).await?;
    Ok(Json(DraftView::build(&draft)))
}

/// POST /sessions/:id/wrapup/finalize: atomic commit
pub async fn finalize(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinalizeResponse>> {
    let outcome = wrapup::finalize(
        &ctx.db_pool,
        &ctx.state,
        id,
        &ctx.rates,
        &ctx.badges,
        time::now(),
    )
    .await?;

    Ok(Json(FinalizeResponse {
        session: outcome.session,
        wrap_up: outcome.wrap_up,
        earnings: outcome.earnings,
        pay_period: outcome.pay_period,
        badge_candidates: outcome.badge_candidates,
    }))
}

/// GET /artifacts: the submitted-artifact review queue
pub async fn review_queue(State(ctx): State<AppContext>) -> Result<Json<ReviewQueueResponse>> {
    let artifacts = db::artifacts::list_submitted(&ctx.db_pool).await?;
    Ok(Json(ReviewQueueResponse { artifacts }))
}
