//! Session lifecycle state machine
//!
//! Owns every status change a session can undergo. `wrap-up-pending` is a
//! function of the wall clock and the `assigned` status, never a value a
//! caller can set directly: readers go through [`effective_status`], and
//! the periodic [`promote`](crate::db::sessions::promote_elapsed_sessions)
//! sweep persists the same computation for dashboard queries.

pub mod join_window;

use chrono::{DateTime, Utc};
use sprout_common::types::{Session, SessionStatus};

use crate::{Error, Result};

/// Check whether a status change is allowed by the lifecycle graph
///
/// Returns `InvalidTransition` (state unchanged) for anything else,
/// including every transition out of a terminal state.
pub fn check_transition(from: SessionStatus, to: SessionStatus) -> Result<()> {
    use SessionStatus::*;

    if from.is_terminal() {
        return Err(Error::InvalidTransition { from, to });
    }

    let allowed = match (from, to) {
        // Instructor claim; coverage-needed has available semantics
        (Available, Assigned) | (CoverageNeeded, Assigned) => true,
        // Instructor confirms an unconfirmed assignment
        (Pending, Assigned) => true,
        // Assigned instructor cannot attend; roster is kept
        (Assigned, CoverageNeeded) | (Pending, CoverageNeeded) => true,
        // Scheduled time fully elapsed (clock-derived, see effective_status)
        (Assigned, WrapUpPending) => true,
        // Only the wrap-up finalizer takes this edge
        (WrapUpPending, Completed) => true,
        // External cancellation from any pre-completion state
        (_, Cancelled) | (_, NoShow) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// Status with the clock-derived promotion applied
///
/// An `assigned` session whose full scheduled window has elapsed reads as
/// `wrap-up-pending` regardless of what is stored.
pub fn effective_status(session: &Session, now: DateTime<Utc>) -> SessionStatus {
    if session.status == SessionStatus::Assigned && now > session.scheduled_end() {
        SessionStatus::WrapUpPending
    } else {
        session.status
    }
}

/// True when the session, as of `now`, is ready for its wrap-up workflow
pub fn is_wrap_up_pending(session: &Session, now: DateTime<Utc>) -> bool {
    effective_status(session, now) == SessionStatus::WrapUpPending
}
