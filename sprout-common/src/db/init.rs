//! Database initialization
//!
//! Creates the database file on first run and brings the schema up
//! idempotently. Every create function is safe to call repeatedly.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests
pub async fn init_memory_database() -> Result<SqlitePool> {
    // Single connection: each sqlite :memory: connection is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    configure_connection(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

/// Run all table creations (idempotent - safe to call multiple times)
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_sessions_table(pool).await?;
    create_session_roster_table(pool).await?;
    create_artifacts_table(pool).await?;
    create_wrap_ups_table(pool).await?;
    create_pay_periods_table(pool).await?;
    create_earnings_entries_table(pool).await?;
    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            course_name TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            wrap_up_minutes INTEGER NOT NULL DEFAULT 0,
            format TEXT NOT NULL,
            delivery TEXT NOT NULL,
            session_number INTEGER NOT NULL,
            total_sessions INTEGER NOT NULL,
            status TEXT NOT NULL,
            instructor_id TEXT,
            assigned_at TEXT,
            confirmed_at TEXT,
            host_room_url TEXT,
            participant_room_url TEXT,
            center_id TEXT,
            center_name TEXT,
            address TEXT,
            room TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_instructor ON sessions(instructor_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_session_roster_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_roster (
            session_id TEXT NOT NULL REFERENCES sessions(id),
            child_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            enrollment_id TEXT NOT NULL,
            profile_context TEXT,
            PRIMARY KEY (session_id, child_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_artifacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            id TEXT PRIMARY KEY,
            child_id TEXT NOT NULL,
            child_first_name TEXT NOT NULL,
            course_id TEXT NOT NULL,
            course_name TEXT NOT NULL,
            session_id TEXT,
            session_number INTEGER,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            files TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            submitted_by TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'submitted',
            reviewed_at TEXT,
            reviewed_by TEXT,
            instructor_feedback TEXT,
            contributes_to_badges TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_status ON artifacts(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_child ON artifacts(child_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_wrap_ups_table(pool: &SqlitePool) -> Result<()> {
    // session_id primary key: at most one wrap-up per session
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wrap_ups (
            session_id TEXT PRIMARY KEY REFERENCES sessions(id),
            instructor_id TEXT NOT NULL,
            attendance TEXT NOT NULL,
            artifact_reviews TEXT NOT NULL,
            observations TEXT NOT NULL,
            summary TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pay_periods_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pay_periods (
            id TEXT PRIMARY KEY,
            instructor_id TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            status TEXT NOT NULL,
            total_earned_cents INTEGER NOT NULL DEFAULT 0,
            session_count INTEGER NOT NULL DEFAULT 0,
            paid_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pay_periods_instructor ON pay_periods(instructor_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_earnings_entries_table(pool: &SqlitePool) -> Result<()> {
    // session_id unique: exactly one entry per completed wrap-up
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS earnings_entries (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id),
            activity TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            earned_at TEXT NOT NULL,
            status TEXT NOT NULL,
            pay_period_id TEXT NOT NULL REFERENCES pay_periods(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_earnings_pay_period ON earnings_entries(pay_period_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
