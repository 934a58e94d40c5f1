//! Session lifecycle HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprout_common::events::PortalEvent;
use sprout_common::time;
use sprout_common::types::{Session, SessionStatus, StudentContext};
use uuid::Uuid;

use crate::api::server::AppContext;
use crate::db;
use crate::session::{effective_status, join_window};
use crate::Result;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Session plus its clock-derived view fields
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    /// Status with the wrap-up-pending promotion applied
    pub effective_status: SessionStatus,
    /// Whether the online room may be entered right now
    pub joinable: bool,
    pub joinable_from: Option<DateTime<Utc>>,
}

impl SessionView {
    pub fn build(session: Session, now: DateTime<Utc>, lead_minutes: i64) -> Self {
        let effective = effective_status(&session, now);
        let joinable = join_window::is_joinable(&session, now, lead_minutes);
        let joinable_from = join_window::joinable_from(&session, lead_minutes);
        Self {
            session,
            effective_status: effective,
            joinable,
            joinable_from,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub instructor_id: Uuid,
    /// Required on a first claim; ignored for coverage pickups, which
    /// keep the roster they already have
    #[serde(default)]
    pub roster: Vec<StudentContext>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// "cancelled" or "no-show"
    pub terminal_status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /sessions?instructor_id=
pub async fn list_sessions(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<SessionListResponse>> {
    let now = time::now();

    // Lazy promotion keeps stored status fresh for dashboard queries
    db::sessions::promote_elapsed_sessions(&ctx.db_pool, now).await?;

    let sessions = db::sessions::list_sessions(&ctx.db_pool, query.instructor_id).await?;
    let views = sessions
        .into_iter()
        .map(|s| SessionView::build(s, now, ctx.join_lead_minutes))
        .collect();

    Ok(Json(SessionListResponse { sessions: views }))
}

/// GET /sessions/:id
pub async fn get_session(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let session = db::sessions::get_session(&ctx.db_pool, id).await?;
    Ok(Json(SessionView::build(
        session,
        time::now(),
        ctx.join_lead_minutes,
    )))
}

/// POST /sessions/:id/claim
pub async fn claim(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<SessionView>> {
    let now = time::now();
    let session = db::sessions::claim_session(
        &ctx.db_pool,
        id,
        request.instructor_id,
        &request.roster,
        now,
    )
    .await?;

    ctx.state.broadcast_event(PortalEvent::SessionClaimed {
        session_id: id,
        instructor_id: request.instructor_id,
        timestamp: now,
    });

    Ok(Json(SessionView::build(session, now, ctx.join_lead_minutes)))
}

/// POST /sessions/:id/confirm
pub async fn confirm(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let now = time::now();
    let session = db::sessions::confirm_session(&ctx.db_pool, id, now).await?;

    if let Some(instructor_id) = session.instructor_id {
        ctx.state.broadcast_event(PortalEvent::SessionConfirmed {
            session_id: id,
            instructor_id,
            timestamp: now,
        });
    }

    Ok(Json(SessionView::build(session, now, ctx.join_lead_minutes)))
}

/// POST /sessions/:id/coverage
pub async fn request_coverage(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let now = time::now();
    let session = db::sessions::request_coverage(&ctx.db_pool, id, now).await?;

    ctx.state.broadcast_event(PortalEvent::CoverageRequested {
        session_id: id,
        timestamp: now,
    });

    Ok(Json(SessionView::build(session, now, ctx.join_lead_minutes)))
}

/// POST /sessions/:id/cancel
pub async fn cancel(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<SessionView>> {
    let now = time::now();
    let session =
        db::sessions::cancel_session(&ctx.db_pool, id, request.terminal_status, now).await?;

    ctx.state.broadcast_event(PortalEvent::SessionCancelled {
        session_id: id,
        terminal_status: request.terminal_status.as_str().to_string(),
        timestamp: now,
    });

    Ok(Json(SessionView::build(session, now, ctx.join_lead_minutes)))
}
