//! Join-window gate for online sessions
//!
//! Pure predicate over (session, now); evaluated on every render tick by
//! the dashboard, so it must stay cheap, side-effect-free, and consistent.

use chrono::{DateTime, Duration, Utc};
use sprout_common::types::{Session, SessionDelivery};

/// Minutes before the scheduled start at which the room opens
pub const DEFAULT_JOIN_LEAD_MINUTES: i64 = 10;

/// When the online room opens, or None for in-person sessions
pub fn joinable_from(session: &Session, lead_minutes: i64) -> Option<DateTime<Utc>> {
    match session.delivery {
        SessionDelivery::Online => Some(session.scheduled_at - Duration::minutes(lead_minutes)),
        SessionDelivery::InPerson => None,
    }
}

/// Whether the session's room may be entered right now
///
/// Online sessions are joinable inside the closed interval
/// `[scheduled_at - lead, scheduled_at + duration]` while the session is
/// not in a terminal state. In-person sessions are never "joinable" here;
/// showing up is physical, not computed.
pub fn is_joinable(session: &Session, now: DateTime<Utc>, lead_minutes: i64) -> bool {
    if session.status.is_terminal() {
        return false;
    }

    match joinable_from(session, lead_minutes) {
        Some(opens_at) => now >= opens_at && now <= session.scheduled_end(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sprout_common::types::{SessionFormat, SessionStatus};
    use uuid::Uuid;

    fn online_session(status: SessionStatus) -> Session {
        Session {
            id: Uuid::new_v4(),
            course_id: "course-001".into(),
            course_name: "Python Basics".into(),
            // T = 2024-12-03 15:00 UTC, 45 minutes
            scheduled_at: Utc.with_ymd_and_hms(2024, 12, 3, 15, 0, 0).unwrap(),
            duration_minutes: 45,
            wrap_up_minutes: 10,
            format: SessionFormat::OneOnOne,
            delivery: SessionDelivery::Online,
            session_number: 4,
            total_sessions: 12,
            status,
            instructor_id: Some(Uuid::new_v4()),
            assigned_at: None,
            confirmed_at: None,
            online: None,
            location: None,
            roster: Vec::new(),
        }
    }

    #[test]
    fn test_window_is_lead_before_start_through_scheduled_end() {
        // One-on-one online at T, 45 min, 10 min lead: window [T-10m, T+45m]
        let s = online_session(SessionStatus::Assigned);
        let t = s.scheduled_at;

        let opens = t - Duration::minutes(10);
        let closes = t + Duration::minutes(45);

        assert_eq!(joinable_from(&s, 10), Some(opens));

        // Boundary-inclusive on both ends
        assert!(is_joinable(&s, opens, 10));
        assert!(is_joinable(&s, t, 10));
        assert!(is_joinable(&s, closes, 10));

        // Outside on either side
        assert!(!is_joinable(&s, opens - Duration::seconds(1), 10));
        assert!(!is_joinable(&s, closes + Duration::seconds(1), 10));
    }

    #[test]
    fn test_in_person_sessions_are_never_joinable() {
        let mut s = online_session(SessionStatus::Assigned);
        s.delivery = SessionDelivery::InPerson;

        assert_eq!(joinable_from(&s, 10), None);
        assert!(!is_joinable(&s, s.scheduled_at, 10));
    }

    #[test]
    fn test_terminal_status_blocks_joining_inside_window() {
        for status in [
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::NoShow,
        ] {
            let s = online_session(status);
            assert!(!is_joinable(&s, s.scheduled_at, 10));
        }
    }

    #[test]
    fn test_gate_is_repeatable() {
        let s = online_session(SessionStatus::Assigned);
        let now = s.scheduled_at;
        let first = is_joinable(&s, now, DEFAULT_JOIN_LEAD_MINUTES);
        for _ in 0..100 {
            assert_eq!(is_joinable(&s, now, DEFAULT_JOIN_LEAD_MINUTES), first);
        }
    }
}
