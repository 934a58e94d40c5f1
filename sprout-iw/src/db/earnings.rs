//! Pay period and earnings entry queries
//!
//! Pay periods are created and advanced by the external payroll process;
//! this service only locates the open one and appends entries to it.

use sprout_common::time::{from_db, from_db_opt, to_db};
use sprout_common::types::{EarningsEntry, PayPeriod, PayPeriodStatus};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::{Error, Result};

/// Insert a pay period (payroll collaborator / test seeding)
pub async fn insert_pay_period(db: &SqlitePool, period: &PayPeriod) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pay_periods (
            id, instructor_id, start_date, end_date, status,
            total_earned_cents, session_count, paid_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(period.id.to_string())
    .bind(period.instructor_id.to_string())
    .bind(to_db(period.start_date))
    .bind(to_db(period.end_date))
    .bind(period.status.as_str())
    .bind(period.total_earned_cents)
    .bind(period.session_count)
    .bind(period.paid_at.map(to_db))
    .execute(db)
    .await?;
    Ok(())
}

fn map_period_row(row: &sqlx::sqlite::SqliteRow) -> Result<PayPeriod> {
    Ok(PayPeriod {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        instructor_id: parse_uuid(&row.get::<String, _>("instructor_id"))?,
        start_date: from_db(&row.get::<String, _>("start_date"))?,
        end_date: from_db(&row.get::<String, _>("end_date"))?,
        status: row.get::<String, _>("status").parse::<PayPeriodStatus>()?,
        total_earned_cents: row.get("total_earned_cents"),
        session_count: row.get("session_count"),
        paid_at: from_db_opt(row.get::<Option<String>, _>("paid_at").as_deref())?,
    })
}

/// The instructor's single open pay period
///
/// Zero open periods is a fatal configuration error for posting; more
/// than one means payroll state is corrupt, also fatal.
pub async fn open_pay_period(db: &SqlitePool, instructor_id: Uuid) -> Result<PayPeriod> {
    let rows = sqlx::query(
        "SELECT * FROM pay_periods WHERE instructor_id = ? AND status = 'open'",
    )
    .bind(instructor_id.to_string())
    .fetch_all(db)
    .await?;

    match rows.as_slice() {
        [] => Err(Error::NoOpenPayPeriod { instructor_id }),
        [row] => map_period_row(row),
        _ => Err(Error::Config(format!(
            "Instructor {} has {} open pay periods; expected exactly one",
            instructor_id,
            rows.len()
        ))),
    }
}

/// Load one pay period
pub async fn get_pay_period(db: &SqlitePool, id: Uuid) -> Result<PayPeriod> {
    let row = sqlx::query("SELECT * FROM pay_periods WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Pay period {}", id)))?;
    map_period_row(&row)
}

/// Insert one earnings entry inside the finalize transaction
///
/// The UNIQUE constraint on session_id backstops the one-entry-per-
/// completed-wrap-up invariant.
pub(crate) async fn insert_entry_tx(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &EarningsEntry,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO earnings_entries (
            id, session_id, activity, amount_cents, currency,
            earned_at, status, pay_period_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.session_id.to_string())
    .bind(entry.activity.as_str())
    .bind(entry.amount_cents)
    .bind(&entry.currency)
    .bind(to_db(entry.earned_at))
    .bind(entry.status.as_str())
    .bind(entry.pay_period_id.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Bump the open period's running totals inside the finalize transaction
pub(crate) async fn bump_period_totals_tx(
    tx: &mut Transaction<'_, Sqlite>,
    period_id: Uuid,
    amount_cents: i64,
) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE pay_periods
        SET total_earned_cents = total_earned_cents + ?,
            session_count = session_count + 1
        WHERE id = ? AND status = 'open'
        "#,
    )
    .bind(amount_cents)
    .bind(period_id.to_string())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        // Period advanced out from under us mid-transaction
        return Err(Error::FinalizeConflict(format!(
            "Pay period {} is no longer open",
            period_id
        )));
    }
    Ok(())
}

fn map_entry_row(row: &sqlx::sqlite::SqliteRow) -> Result<EarningsEntry> {
    Ok(EarningsEntry {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        session_id: parse_uuid(&row.get::<String, _>("session_id"))?,
        activity: row.get::<String, _>("activity").parse()?,
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        earned_at: from_db(&row.get::<String, _>("earned_at"))?,
        status: row.get::<String, _>("status").parse()?,
        pay_period_id: parse_uuid(&row.get::<String, _>("pay_period_id"))?,
    })
}

/// Entries posted to one pay period, oldest first
pub async fn list_entries(db: &SqlitePool, period_id: Uuid) -> Result<Vec<EarningsEntry>> {
    let rows = sqlx::query(
        "SELECT * FROM earnings_entries WHERE pay_period_id = ? ORDER BY earned_at ASC",
    )
    .bind(period_id.to_string())
    .fetch_all(db)
    .await?;
    rows.iter().map(map_entry_row).collect()
}

/// The entry posted for one session, if any
pub async fn entry_for_session(db: &SqlitePool, session_id: Uuid) -> Result<Option<EarningsEntry>> {
    let row = sqlx::query("SELECT * FROM earnings_entries WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(map_entry_row).transpose()
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt UUID '{}': {}", s, e)))
}
