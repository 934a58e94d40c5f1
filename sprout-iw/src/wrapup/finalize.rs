//! Atomic wrap-up finalization
//!
//! The serialization point for `wrap-up-pending -> completed`. Everything
//! commits together or nothing does: the session status change, the
//! wrap-up aggregate, the artifact review decisions, and the earnings
//! entry ride one transaction; badge candidates are derived from the
//! committed aggregate afterwards (pure, nothing persisted here).

use chrono::{DateTime, Utc};
use sprout_common::events::PortalEvent;
use sprout_common::types::{
    Artifact, EarningsEntry, PayPeriod, Session, SessionStatus, SessionWrapUp,
};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::badges::{BadgeCandidate, BadgeEvaluator};
use crate::db;
use crate::earnings::{self, RateTable};
use crate::session::effective_status;
use crate::state::SharedState;
use crate::{Error, Result};

/// Everything a successful finalize produced
#[derive(Debug)]
pub struct FinalizeOutcome {
    pub session: Session,
    pub wrap_up: SessionWrapUp,
    pub earnings: EarningsEntry,
    pub pay_period: PayPeriod,
    pub badge_candidates: Vec<BadgeCandidate>,
}

/// Commit a session's wrap-up draft
///
/// Fails with no side effects when any step is incomplete, the session
/// is not wrap-up-pending (including: already completed), the rate table
/// has no entry for the session, or the instructor has no open pay
/// period. Safe to re-attempt after a transient failure; a repeat after
/// success is a conflict, never a second earnings entry.
pub async fn finalize(
    db: &SqlitePool,
    state: &SharedState,
    session_id: Uuid,
    rates: &RateTable,
    badges: &BadgeEvaluator,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome> {
    // Single writer per session across this process
    let lock = state.finalize_lock(session_id).await;
    let _guard = lock.lock().await;

    let draft = state.get_draft(session_id).await?;
    let session = db::sessions::get_session(db, session_id).await?;

    match effective_status(&session, now) {
        SessionStatus::WrapUpPending => {}
        SessionStatus::Completed => {
            return Err(Error::FinalizeConflict(format!(
                "Session {} already has a completed wrap-up",
                session_id
            )));
        }
        other => {
            return Err(Error::FinalizeConflict(format!(
                "Session {} is {}, not wrap-up-pending",
                session_id, other
            )));
        }
    }

    draft.ensure_finalizable()?;

    // Fatal configuration checks happen before the transaction opens
    let rate = rates.resolve(session.format, session.delivery)?.clone();
    let period = db::earnings::open_pay_period(db, draft.instructor_id).await?;

    let wrap_up = draft.clone().into_wrap_up(now);

    // Artifacts referenced by the decided reviews, for applying decisions
    // and for badge evaluation
    let mut artifacts: Vec<Artifact> = Vec::with_capacity(wrap_up.artifact_reviews.len());
    for review in &wrap_up.artifact_reviews {
        artifacts.push(db::artifacts::get_artifact(db, review.artifact_id).await?);
    }

    let mut tx = db.begin().await?;

    if !db::sessions::complete_session_tx(&mut tx, session_id, now).await? {
        return Err(Error::FinalizeConflict(format!(
            "Session {} was completed by a concurrent wrap-up",
            session_id
        )));
    }

    db::wrapups::insert_completed_tx(&mut tx, &wrap_up).await?;

    for review in &wrap_up.artifact_reviews {
        let applied =
            db::artifacts::apply_review_tx(&mut tx, review, wrap_up.instructor_id, session_id, now)
                .await?;
        if !applied {
            return Err(Error::FinalizeConflict(format!(
                "Artifact {} was reviewed outside this wrap-up",
                review.artifact_id
            )));
        }
    }

    let entry = earnings::post_session_earnings_tx(&mut tx, &session, &rate, &period, now).await?;

    tx.commit().await?;

    info!(
        "Session {} wrap-up committed; posted {} {} to pay period {}",
        session_id, entry.amount_cents, entry.currency, period.id
    );

    // Derived from the committed aggregate; persistence is the badge
    // service's job
    let badge_candidates = badges.evaluate(&wrap_up, &artifacts);

    state.remove_draft(session_id).await;

    state.broadcast_event(PortalEvent::WrapUpCompleted {
        session_id,
        instructor_id: wrap_up.instructor_id,
        timestamp: now,
    });
    state.broadcast_event(PortalEvent::EarningsPosted {
        session_id,
        entry_id: entry.id,
        activity: entry.activity,
        amount_cents: entry.amount_cents,
        pay_period_id: period.id,
        timestamp: now,
    });
    for candidate in &badge_candidates {
        state.broadcast_event(PortalEvent::BadgeCandidate {
            session_id,
            child_id: candidate.child_id,
            badge_id: candidate.badge_id.clone(),
            timestamp: now,
        });
    }

    let session = db::sessions::get_session(db, session_id).await?;
    let pay_period = db::earnings::get_pay_period(db, period.id).await?;

    Ok(FinalizeOutcome {
        session,
        wrap_up,
        earnings: entry,
        pay_period,
        badge_candidates,
    })
}
