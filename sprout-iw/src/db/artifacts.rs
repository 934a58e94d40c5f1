//! Artifact database queries
//!
//! Artifacts arrive from the submission inlet in `submitted` status; this
//! service only ever advances them through a wrap-up review decision.
//! Review fields are write-once: the conditional update refuses to touch
//! a row that is no longer `submitted`.

use chrono::{DateTime, Utc};
use sprout_common::time::{from_db, from_db_opt, to_db};
use sprout_common::types::{Artifact, ArtifactFile, ArtifactReview, ReviewDecision};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::{Error, Result};

/// Insert an artifact as delivered by the submission inlet
pub async fn insert_artifact(db: &SqlitePool, artifact: &Artifact) -> Result<()> {
    let files = serde_json::to_string(&artifact.files)
        .map_err(|e| Error::Internal(format!("Failed to encode artifact files: {}", e)))?;
    let badges = serde_json::to_string(&artifact.contributes_to_badges)
        .map_err(|e| Error::Internal(format!("Failed to encode badge list: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO artifacts (
            id, child_id, child_first_name, course_id, course_name,
            session_id, session_number, kind, title, description, files,
            submitted_at, submitted_by, status, reviewed_at, reviewed_by,
            instructor_feedback, contributes_to_badges
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(artifact.id.to_string())
    .bind(artifact.child_id.to_string())
    .bind(&artifact.child_first_name)
    .bind(&artifact.course_id)
    .bind(&artifact.course_name)
    .bind(artifact.session_id.map(|id| id.to_string()))
    .bind(artifact.session_number)
    .bind(artifact.kind.as_str())
    .bind(&artifact.title)
    .bind(&artifact.description)
    .bind(files)
    .bind(to_db(artifact.submitted_at))
    .bind(submitted_by_str(artifact))
    .bind(artifact.status.as_str())
    .bind(artifact.reviewed_at.map(to_db))
    .bind(artifact.reviewed_by.map(|id| id.to_string()))
    .bind(&artifact.instructor_feedback)
    .bind(badges)
    .execute(db)
    .await?;

    Ok(())
}

fn submitted_by_str(artifact: &Artifact) -> &'static str {
    use sprout_common::types::SubmittedBy;
    match artifact.submitted_by {
        SubmittedBy::Student => "student",
        SubmittedBy::Parent => "parent",
        SubmittedBy::Instructor => "instructor",
    }
}

fn map_artifact_row(row: &sqlx::sqlite::SqliteRow) -> Result<Artifact> {
    use sprout_common::types::SubmittedBy;

    let files: Vec<ArtifactFile> = serde_json::from_str(&row.get::<String, _>("files"))
        .map_err(|e| Error::Internal(format!("Corrupt artifact files: {}", e)))?;
    let badges: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("contributes_to_badges"))
            .map_err(|e| Error::Internal(format!("Corrupt badge list: {}", e)))?;

    let submitted_by = match row.get::<String, _>("submitted_by").as_str() {
        "parent" => SubmittedBy::Parent,
        "instructor" => SubmittedBy::Instructor,
        _ => SubmittedBy::Student,
    };

    Ok(Artifact {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        child_id: parse_uuid(&row.get::<String, _>("child_id"))?,
        child_first_name: row.get("child_first_name"),
        course_id: row.get("course_id"),
        course_name: row.get("course_name"),
        session_id: row
            .get::<Option<String>, _>("session_id")
            .map(|s| parse_uuid(&s))
            .transpose()?,
        session_number: row.get("session_number"),
        kind: row.get::<String, _>("kind").parse()?,
        title: row.get("title"),
        description: row.get("description"),
        files,
        submitted_at: from_db(&row.get::<String, _>("submitted_at"))?,
        submitted_by,
        status: row.get::<String, _>("status").parse()?,
        reviewed_at: from_db_opt(row.get::<Option<String>, _>("reviewed_at").as_deref())?,
        reviewed_by: row
            .get::<Option<String>, _>("reviewed_by")
            .map(|s| parse_uuid(&s))
            .transpose()?,
        instructor_feedback: row.get("instructor_feedback"),
        contributes_to_badges: badges,
    })
}

/// Get one artifact
pub async fn get_artifact(db: &SqlitePool, id: Uuid) -> Result<Artifact> {
    let row = sqlx::query("SELECT * FROM artifacts WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Artifact {}", id)))?;
    map_artifact_row(&row)
}

/// All artifacts still awaiting review, oldest first
pub async fn list_submitted(db: &SqlitePool) -> Result<Vec<Artifact>> {
    let rows =
        sqlx::query("SELECT * FROM artifacts WHERE status = 'submitted' ORDER BY submitted_at ASC")
            .fetch_all(db)
            .await?;
    rows.iter().map(map_artifact_row).collect()
}

/// Submitted artifacts belonging to any of the given students
pub async fn list_submitted_for_children(
    db: &SqlitePool,
    child_ids: &[Uuid],
) -> Result<Vec<Artifact>> {
    let all = list_submitted(db).await?;
    Ok(all
        .into_iter()
        .filter(|a| child_ids.contains(&a.child_id))
        .collect())
}

/// Apply one decided review inside the finalize transaction
///
/// Returns false when the artifact was no longer `submitted` (reviewed
/// through some other path since the draft opened); the caller rolls
/// the whole wrap-up back rather than overwrite a review.
pub(crate) async fn apply_review_tx(
    tx: &mut Transaction<'_, Sqlite>,
    review: &ArtifactReview,
    reviewer: Uuid,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool> {
    let status = match review.decision {
        ReviewDecision::Approved => "approved",
        ReviewDecision::NeedsRevision => "needs-revision",
        // Skipped artifacts stay submitted for a later queue
        ReviewDecision::Skipped => return Ok(true),
    };

    let updated = sqlx::query(
        r#"
        UPDATE artifacts
        SET status = ?, reviewed_at = ?, reviewed_by = ?,
            instructor_feedback = ?, session_id = COALESCE(session_id, ?)
        WHERE id = ? AND status = 'submitted'
        "#,
    )
    .bind(status)
    .bind(to_db(now))
    .bind(reviewer.to_string())
    .bind(&review.feedback)
    .bind(session_id.to_string())
    .bind(review.artifact_id.to_string())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt UUID '{}': {}", s, e)))
}
