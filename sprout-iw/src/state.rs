//! Shared service state
//!
//! Holds the in-memory wrap-up drafts (one per session, lock-on-entry),
//! the per-session finalize locks, and the event broadcaster feeding the
//! SSE endpoint. Drafts live only in memory: abandoning one loses
//! nothing durable, because nothing is persisted before finalize.

use sprout_common::events::PortalEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::wrapup::WrapUpDraft;
use crate::{Error, Result};

/// Shared state accessible by all handlers
pub struct SharedState {
    /// In-progress wrap-up drafts keyed by session id
    drafts: RwLock<HashMap<Uuid, WrapUpDraft>>,

    /// Per-session finalize serialization points
    finalize_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,

    /// Event broadcaster for SSE events
    event_tx: broadcast::Sender<PortalEvent>,
}

impl SharedState {
    /// Create new shared state
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            drafts: RwLock::new(HashMap::new()),
            finalize_locks: Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: PortalEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<PortalEvent> {
        self.event_tx.subscribe()
    }

    /// Register a new draft, or resume the caller's existing one
    ///
    /// Lock-on-entry: one draft per session. The owning instructor gets
    /// their draft back; anyone else gets a conflict.
    pub async fn open_draft(&self, draft: WrapUpDraft) -> Result<WrapUpDraft> {
        let mut drafts = self.drafts.write().await;
        match drafts.get(&draft.session_id) {
            Some(existing) if existing.instructor_id == draft.instructor_id => {
                Ok(existing.clone())
            }
            Some(existing) => Err(Error::DraftConflict {
                session_id: existing.session_id,
            }),
            None => {
                drafts.insert(draft.session_id, draft.clone());
                Ok(draft)
            }
        }
    }

    /// Snapshot of a session's draft
    pub async fn get_draft(&self, session_id: Uuid) -> Result<WrapUpDraft> {
        self.drafts
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No wrap-up in progress for session {}", session_id)))
    }

    /// Mutate a session's draft under the write lock
    pub async fn with_draft<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut WrapUpDraft) -> Result<T>,
    ) -> Result<T> {
        let mut drafts = self.drafts.write().await;
        let draft = drafts.get_mut(&session_id).ok_or_else(|| {
            Error::NotFound(format!("No wrap-up in progress for session {}", session_id))
        })?;
        f(draft)
    }

    /// Discard a session's draft (abandon, or cleanup after finalize)
    pub async fn remove_draft(&self, session_id: Uuid) -> Option<WrapUpDraft> {
        self.drafts.write().await.remove(&session_id)
    }

    /// The finalize lock for one session
    ///
    /// Concurrent finalization attempts for the same session serialize
    /// here; the conditional status update inside the transaction then
    /// rejects the loser.
    pub async fn finalize_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.finalize_locks
            .lock()
            .await
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sprout_common::types::{
        Session, SessionDelivery, SessionFormat, SessionStatus, StudentContext,
    };

    fn draft_for(session_id: Uuid, instructor_id: Uuid) -> WrapUpDraft {
        let session = Session {
            id: session_id,
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
            instructor_id: Some(instructor_id),
            assigned_at: None,
            confirmed_at: None,
            online: None,
            location: None,
            roster: vec![StudentContext {
                child_id: Uuid::new_v4(),
                first_name: "Jamie".into(),
                last_name: "Thompson".into(),
                age: 10,
                enrollment_id: "enroll-001".into(),
                recent_capacities: Vec::new(),
                previous_session_summary: None,
                parent_notes: None,
            }],
        };
        WrapUpDraft::open(&session, instructor_id, &[], Utc::now())
    }

    #[tokio::test]
    async fn test_same_instructor_resumes_existing_draft() {
        let state = SharedState::new();
        let session_id = Uuid::new_v4();
        let instructor = Uuid::new_v4();

        state
            .open_draft(draft_for(session_id, instructor))
            .await
            .unwrap();
        // Second open by the same instructor resumes, not resets
        let resumed = state
            .open_draft(draft_for(session_id, instructor))
            .await
            .unwrap();
        assert_eq!(resumed.session_id, session_id);
    }

    #[tokio::test]
    async fn test_other_instructor_gets_conflict() {
        let state = SharedState::new();
        let session_id = Uuid::new_v4();

        state
            .open_draft(draft_for(session_id, Uuid::new_v4()))
            .await
            .unwrap();
        let result = state.open_draft(draft_for(session_id, Uuid::new_v4())).await;
        assert!(matches!(result, Err(Error::DraftConflict { .. })));
    }

    #[tokio::test]
    async fn test_abandon_discards_and_allows_reentry() {
        let state = SharedState::new();
        let session_id = Uuid::new_v4();
        let instructor = Uuid::new_v4();

        state
            .open_draft(draft_for(session_id, instructor))
            .await
            .unwrap();
        assert!(state.remove_draft(session_id).await.is_some());
        assert!(state.get_draft(session_id).await.is_err());

        // A different instructor can now enter from step 1
        state
            .open_draft(draft_for(session_id, Uuid::new_v4()))
            .await
            .unwrap();
    }
}
