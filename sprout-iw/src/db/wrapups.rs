//! Wrap-up database queries
//!
//! The committed aggregate is written exactly once, inside the finalize
//! transaction. The `session_id` primary key enforces at most one
//! wrap-up per session at the storage layer.

use sprout_common::time::{from_db, from_db_opt, to_db};
use sprout_common::types::{SessionWrapUp, WrapUpStatus};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::{Error, Result};

/// Insert a completed wrap-up inside the finalize transaction
pub(crate) async fn insert_completed_tx(
    tx: &mut Transaction<'_, Sqlite>,
    wrap_up: &SessionWrapUp,
) -> Result<()> {
    let attendance = serde_json::to_string(&wrap_up.attendance)
        .map_err(|e| Error::Internal(format!("Failed to encode attendance: {}", e)))?;
    let reviews = serde_json::to_string(&wrap_up.artifact_reviews)
        .map_err(|e| Error::Internal(format!("Failed to encode reviews: {}", e)))?;
    let observations = serde_json::to_string(&wrap_up.observations)
        .map_err(|e| Error::Internal(format!("Failed to encode observations: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO wrap_ups (
            session_id, instructor_id, attendance, artifact_reviews,
            observations, summary, status, started_at, completed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(wrap_up.session_id.to_string())
    .bind(wrap_up.instructor_id.to_string())
    .bind(attendance)
    .bind(reviews)
    .bind(observations)
    .bind(&wrap_up.summary)
    .bind(wrap_up.status.as_str())
    .bind(to_db(wrap_up.started_at))
    .bind(wrap_up.completed_at.map(to_db))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Load a session's committed wrap-up, if any
pub async fn get_wrap_up(db: &SqlitePool, session_id: Uuid) -> Result<Option<SessionWrapUp>> {
    let row = sqlx::query("SELECT * FROM wrap_ups WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(db)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let attendance = serde_json::from_str(&row.get::<String, _>("attendance"))
        .map_err(|e| Error::Internal(format!("Corrupt attendance: {}", e)))?;
    let artifact_reviews = serde_json::from_str(&row.get::<String, _>("artifact_reviews"))
        .map_err(|e| Error::Internal(format!("Corrupt reviews: {}", e)))?;
    let observations = serde_json::from_str(&row.get::<String, _>("observations"))
        .map_err(|e| Error::Internal(format!("Corrupt observations: {}", e)))?;

    Ok(Some(SessionWrapUp {
        session_id,
        instructor_id: Uuid::parse_str(&row.get::<String, _>("instructor_id"))
            .map_err(|e| Error::Internal(format!("Corrupt UUID: {}", e)))?,
        attendance,
        artifact_reviews,
        observations,
        summary: row.get("summary"),
        status: row.get::<String, _>("status").parse::<WrapUpStatus>()?,
        started_at: from_db(&row.get::<String, _>("started_at"))?,
        completed_at: from_db_opt(row.get::<Option<String>, _>("completed_at").as_deref())?,
    }))
}
