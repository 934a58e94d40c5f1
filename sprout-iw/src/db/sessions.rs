//! Session database queries
//!
//! Load, list, and transition scheduled sessions. Transitions are applied
//! with conditional updates on the expected current status; a lost race
//! surfaces as an invalid-transition error, never a silent overwrite.

use chrono::{DateTime, Utc};
use sprout_common::time::{from_db, from_db_opt, to_db};
use sprout_common::types::{
    OnlineRoom, Session, SessionLocation, SessionStatus, StudentContext,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::session::check_transition;
use crate::{Error, Result};

/// Profile-service context stored as one JSON column on the roster row
#[derive(serde::Serialize, serde::Deserialize, Default)]
struct ProfileContext {
    #[serde(default)]
    recent_capacities: Vec<sprout_common::types::CapacitySnapshot>,
    previous_session_summary: Option<String>,
    parent_notes: Option<String>,
}

/// Insert a session as delivered by the scheduling catalog
pub async fn insert_session(db: &SqlitePool, session: &Session) -> Result<()> {
    let now = to_db(chrono::Utc::now());
    sqlx::query(
        r#"
        INSERT INTO sessions (
            id, course_id, course_name, scheduled_at, duration_minutes,
            wrap_up_minutes, format, delivery, session_number, total_sessions,
            status, instructor_id, assigned_at, confirmed_at,
            host_room_url, participant_room_url,
            center_id, center_name, address, room,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(&session.course_id)
    .bind(&session.course_name)
    .bind(to_db(session.scheduled_at))
    .bind(session.duration_minutes)
    .bind(session.wrap_up_minutes)
    .bind(session.format.as_str())
    .bind(session.delivery.as_str())
    .bind(session.session_number)
    .bind(session.total_sessions)
    .bind(session.status.as_str())
    .bind(session.instructor_id.map(|id| id.to_string()))
    .bind(session.assigned_at.map(to_db))
    .bind(session.confirmed_at.map(to_db))
    .bind(session.online.as_ref().map(|o| o.host_room_url.clone()))
    .bind(session.online.as_ref().map(|o| o.participant_room_url.clone()))
    .bind(session.location.as_ref().map(|l| l.center_id.clone()))
    .bind(session.location.as_ref().map(|l| l.center_name.clone()))
    .bind(session.location.as_ref().map(|l| l.address.clone()))
    .bind(session.location.as_ref().and_then(|l| l.room.clone()))
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    if !session.roster.is_empty() {
        let mut tx = db.begin().await?;
        insert_roster(&mut tx, session.id, &session.roster).await?;
        tx.commit().await?;
    }

    Ok(())
}

async fn insert_roster(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: Uuid,
    roster: &[StudentContext],
) -> Result<()> {
    for (position, student) in roster.iter().enumerate() {
        let context = serde_json::to_string(&ProfileContext {
            recent_capacities: student.recent_capacities.clone(),
            previous_session_summary: student.previous_session_summary.clone(),
            parent_notes: student.parent_notes.clone(),
        })
        .map_err(|e| Error::Internal(format!("Failed to encode profile context: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO session_roster (
                session_id, child_id, position, first_name, last_name,
                age, enrollment_id, profile_context
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id.to_string())
        .bind(student.child_id.to_string())
        .bind(position as i64)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(student.age)
        .bind(&student.enrollment_id)
        .bind(context)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn roster_for(db: &SqlitePool, session_id: Uuid) -> Result<Vec<StudentContext>> {
    let rows = sqlx::query(
        r#"
        SELECT child_id, first_name, last_name, age, enrollment_id, profile_context
        FROM session_roster
        WHERE session_id = ?
        ORDER BY position ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(db)
    .await?;

    let mut roster = Vec::with_capacity(rows.len());
    for row in rows {
        let context: ProfileContext = row
            .get::<Option<String>, _>("profile_context")
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| Error::Internal(format!("Corrupt profile context: {}", e)))?
            .unwrap_or_default();

        roster.push(StudentContext {
            child_id: parse_uuid(&row.get::<String, _>("child_id"))?,
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            age: row.get("age"),
            enrollment_id: row.get("enrollment_id"),
            recent_capacities: context.recent_capacities,
            previous_session_summary: context.previous_session_summary,
            parent_notes: context.parent_notes,
        });
    }
    Ok(roster)
}

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let online = match (
        row.get::<Option<String>, _>("host_room_url"),
        row.get::<Option<String>, _>("participant_room_url"),
    ) {
        (Some(host), Some(participant)) => Some(OnlineRoom {
            host_room_url: host,
            participant_room_url: participant,
        }),
        _ => None,
    };

    let location = match (
        row.get::<Option<String>, _>("center_id"),
        row.get::<Option<String>, _>("center_name"),
        row.get::<Option<String>, _>("address"),
    ) {
        (Some(center_id), Some(center_name), Some(address)) => Some(SessionLocation {
            center_id,
            center_name,
            address,
            room: row.get("room"),
        }),
        _ => None,
    };

    Ok(Session {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        course_id: row.get("course_id"),
        course_name: row.get("course_name"),
        scheduled_at: from_db(&row.get::<String, _>("scheduled_at"))?,
        duration_minutes: row.get("duration_minutes"),
        wrap_up_minutes: row.get("wrap_up_minutes"),
        format: row.get::<String, _>("format").parse()?,
        delivery: row.get::<String, _>("delivery").parse()?,
        session_number: row.get("session_number"),
        total_sessions: row.get("total_sessions"),
        status: row.get::<String, _>("status").parse()?,
        instructor_id: row
            .get::<Option<String>, _>("instructor_id")
            .map(|s| parse_uuid(&s))
            .transpose()?,
        assigned_at: from_db_opt(row.get::<Option<String>, _>("assigned_at").as_deref())?,
        confirmed_at: from_db_opt(row.get::<Option<String>, _>("confirmed_at").as_deref())?,
        online,
        location,
        roster: Vec::new(),
    })
}

/// Get one session with its roster
pub async fn get_session(db: &SqlitePool, id: Uuid) -> Result<Session> {
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {}", id)))?;

    let mut session = map_session_row(&row)?;
    session.roster = roster_for(db, session.id).await?;
    Ok(session)
}

/// List sessions, optionally filtered to one instructor
pub async fn list_sessions(db: &SqlitePool, instructor_id: Option<Uuid>) -> Result<Vec<Session>> {
    let rows = match instructor_id {
        Some(instructor) => {
            sqlx::query(
                "SELECT * FROM sessions WHERE instructor_id = ? ORDER BY scheduled_at ASC",
            )
            .bind(instructor.to_string())
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM sessions ORDER BY scheduled_at ASC")
                .fetch_all(db)
                .await?
        }
    };

    let mut sessions = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut session = map_session_row(row)?;
        session.roster = roster_for(db, session.id).await?;
        sessions.push(session);
    }
    Ok(sessions)
}

/// Instructor claims an available (or coverage-needed) session
///
/// For a first claim the roster is attached in the same transaction as
/// the status change; there is never an `assigned` session with an empty
/// roster. Coverage pickups keep the existing roster.
pub async fn claim_session(
    db: &SqlitePool,
    id: Uuid,
    instructor_id: Uuid,
    roster: &[StudentContext],
    now: DateTime<Utc>,
) -> Result<Session> {
    let mut tx = db.begin().await?;

    let current: SessionStatus = sqlx::query("SELECT status FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {}", id)))?
        .get::<String, _>("status")
        .parse()?;

    check_transition(current, SessionStatus::Assigned)?;

    if current == SessionStatus::Available && roster.is_empty() {
        return Err(Error::InvalidInput(
            "Claiming an available session requires a roster".to_string(),
        ));
    }

    let updated = sqlx::query(
        r#"
        UPDATE sessions
        SET status = 'assigned', instructor_id = ?, assigned_at = ?,
            confirmed_at = ?, updated_at = ?
        WHERE id = ? AND status IN ('available', 'coverage-needed')
        "#,
    )
    .bind(instructor_id.to_string())
    .bind(to_db(now))
    .bind(to_db(now))
    .bind(to_db(now))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::InvalidTransition {
            from: current,
            to: SessionStatus::Assigned,
        });
    }

    if current == SessionStatus::Available {
        insert_roster(&mut tx, id, roster).await?;
    }

    tx.commit().await?;
    info!("Session {} claimed by instructor {}", id, instructor_id);

    get_session(db, id).await
}

/// Instructor confirms a pending assignment
pub async fn confirm_session(db: &SqlitePool, id: Uuid, now: DateTime<Utc>) -> Result<Session> {
    let current: SessionStatus = sqlx::query("SELECT status FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {}", id)))?
        .get::<String, _>("status")
        .parse()?;

    check_transition(current, SessionStatus::Assigned)?;

    let updated = sqlx::query(
        r#"
        UPDATE sessions SET status = 'assigned', confirmed_at = ?, updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(to_db(now))
    .bind(to_db(now))
    .bind(id.to_string())
    .execute(db)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::InvalidTransition {
            from: current,
            to: SessionStatus::Assigned,
        });
    }

    info!("Session {} confirmed", id);
    get_session(db, id).await
}

/// Assigned instructor requests coverage; the roster is kept
pub async fn request_coverage(db: &SqlitePool, id: Uuid, now: DateTime<Utc>) -> Result<Session> {
    transition(
        db,
        id,
        SessionStatus::CoverageNeeded,
        &["assigned", "pending"],
        now,
    )
    .await
}

/// Apply an externally-originated cancellation
pub async fn cancel_session(
    db: &SqlitePool,
    id: Uuid,
    terminal: SessionStatus,
    now: DateTime<Utc>,
) -> Result<Session> {
    if !matches!(terminal, SessionStatus::Cancelled | SessionStatus::NoShow) {
        return Err(Error::InvalidInput(format!(
            "'{}' is not a cancellation status",
            terminal
        )));
    }

    transition(
        db,
        id,
        terminal,
        &[
            "available",
            "pending",
            "assigned",
            "coverage-needed",
            "wrap-up-pending",
        ],
        now,
    )
    .await
}

/// Generic conditional transition helper
async fn transition(
    db: &SqlitePool,
    id: Uuid,
    to: SessionStatus,
    allowed_from: &[&str],
    now: DateTime<Utc>,
) -> Result<Session> {
    let current: SessionStatus = sqlx::query("SELECT status FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {}", id)))?
        .get::<String, _>("status")
        .parse()?;

    check_transition(current, to)?;

    let placeholders = vec!["?"; allowed_from.len()].join(", ");
    let sql = format!(
        "UPDATE sessions SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(to.as_str()).bind(to_db(now)).bind(id.to_string());
    for from in allowed_from {
        query = query.bind(*from);
    }

    if query.execute(db).await?.rows_affected() == 0 {
        return Err(Error::InvalidTransition { from: current, to });
    }

    info!("Session {} transitioned {} -> {}", id, current, to);
    get_session(db, id).await
}

/// Idempotent sweep: persist the clock-derived promotion for `assigned`
/// sessions whose full scheduled window has elapsed
///
/// Readers never depend on this having run; `effective_status` applies
/// the same computation on read, but dashboards querying by stored
/// status see promoted rows.
pub async fn promote_elapsed_sessions(db: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let rows = sqlx::query(
        "SELECT id, scheduled_at, duration_minutes FROM sessions WHERE status = 'assigned'",
    )
    .fetch_all(db)
    .await?;

    let mut promoted = 0;
    for row in rows {
        let scheduled_at = from_db(&row.get::<String, _>("scheduled_at"))?;
        let duration_minutes: i64 = row.get("duration_minutes");
        if now <= scheduled_at + chrono::Duration::minutes(duration_minutes) {
            continue;
        }

        promoted += sqlx::query(
            "UPDATE sessions SET status = 'wrap-up-pending', updated_at = ? WHERE id = ? AND status = 'assigned'",
        )
        .bind(to_db(now))
        .bind(row.get::<String, _>("id"))
        .execute(db)
        .await?
        .rows_affected();
    }

    if promoted > 0 {
        info!("Promoted {} elapsed sessions to wrap-up-pending", promoted);
    }
    Ok(promoted)
}

/// Conditionally complete a session inside the finalize transaction
///
/// The stored status may still read `assigned` when the promotion sweep
/// has not run; the caller has already verified the schedule elapsed.
/// Returns false when the row was not in a completable state (lost race
/// or repeat finalize).
pub(crate) async fn complete_session_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool> {
    let updated = sqlx::query(
        r#"
        UPDATE sessions SET status = 'completed', updated_at = ?
        WHERE id = ? AND status IN ('assigned', 'wrap-up-pending')
        "#,
    )
    .bind(to_db(now))
    .bind(id.to_string())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt UUID '{}': {}", s, e)))
}
