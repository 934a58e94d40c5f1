//! Event types for the Sprout portal event system
//!
//! Events are broadcast by the services after the corresponding state
//! change commits, and forwarded to dashboard clients over SSE.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::PayableActivity;

/// Portal event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PortalEvent {
    /// Instructor claimed an available or coverage-needed session
    SessionClaimed {
        session_id: Uuid,
        instructor_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Instructor confirmed a pending assignment
    SessionConfirmed {
        session_id: Uuid,
        instructor_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Assigned instructor requested coverage
    CoverageRequested {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session cancelled or marked no-show by the scheduling system
    SessionCancelled {
        session_id: Uuid,
        terminal_status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Instructor opened a wrap-up draft
    WrapUpStarted {
        session_id: Uuid,
        instructor_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Instructor abandoned a wrap-up draft (no effects persisted)
    WrapUpAbandoned {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Wrap-up committed; session is now completed
    WrapUpCompleted {
        session_id: Uuid,
        instructor_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One earnings entry posted to the open pay period
    EarningsPosted {
        session_id: Uuid,
        entry_id: Uuid,
        activity: PayableActivity,
        amount_cents: i64,
        pay_period_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Badge-award candidate derived from a committed wrap-up
    BadgeCandidate {
        session_id: Uuid,
        child_id: Uuid,
        badge_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PortalEvent {
    /// Event type string used as the SSE event name
    pub fn type_str(&self) -> &'static str {
        match self {
            PortalEvent::SessionClaimed { .. } => "SessionClaimed",
            PortalEvent::SessionConfirmed { .. } => "SessionConfirmed",
            PortalEvent::CoverageRequested { .. } => "CoverageRequested",
            PortalEvent::SessionCancelled { .. } => "SessionCancelled",
            PortalEvent::WrapUpStarted { .. } => "WrapUpStarted",
            PortalEvent::WrapUpAbandoned { .. } => "WrapUpAbandoned",
            PortalEvent::WrapUpCompleted { .. } => "WrapUpCompleted",
            PortalEvent::EarningsPosted { .. } => "EarningsPosted",
            PortalEvent::BadgeCandidate { .. } => "BadgeCandidate",
        }
    }
}
