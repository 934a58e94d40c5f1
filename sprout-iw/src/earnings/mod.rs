//! Earnings posting
//!
//! Converts a completed wrap-up into exactly one pending earnings entry
//! on the instructor's open pay period. Runs inside the finalize
//! transaction so a failure here rolls the whole wrap-up back.

pub mod rates;

pub use rates::{activity_for, RateTable};

use chrono::{DateTime, Utc};
use sprout_common::types::{ActivityRate, EarningsEntry, EarningsStatus, PayPeriod, Session};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::db;
use crate::Result;

/// Build and insert the entry for a completed session
///
/// The rate has already been resolved (a lookup miss aborts finalization
/// before any transaction opens); the open pay period has already been
/// located. Bumps the period's running totals in the same transaction.
pub(crate) async fn post_session_earnings_tx(
    tx: &mut Transaction<'_, Sqlite>,
    session: &Session,
    rate: &ActivityRate,
    period: &PayPeriod,
    now: DateTime<Utc>,
) -> Result<EarningsEntry> {
    let entry = EarningsEntry {
        id: Uuid::new_v4(),
        session_id: session.id,
        activity: rate.activity,
        amount_cents: rate.base_rate_cents,
        currency: rate.currency.clone(),
        earned_at: now,
        status: EarningsStatus::Pending,
        pay_period_id: period.id,
    };

    db::earnings::insert_entry_tx(tx, &entry).await?;
    db::earnings::bump_period_totals_tx(tx, period.id, entry.amount_cents).await?;

    Ok(entry)
}
