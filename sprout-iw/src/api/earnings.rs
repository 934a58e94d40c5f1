//! Earnings HTTP handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sprout_common::types::{EarningsEntry, PayPeriod};
use uuid::Uuid;

use crate::api::server::AppContext;
use crate::db;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct PayPeriodQuery {
    pub instructor_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PayPeriodResponse {
    pub pay_period: PayPeriod,
    pub entries: Vec<EarningsEntry>,
}

/// GET /earnings/pay-period?instructor_id=
///
/// The instructor's currently open pay period with its posted entries.
pub async fn current_pay_period(
    State(ctx): State<AppContext>,
    Query(query): Query<PayPeriodQuery>,
) -> Result<Json<PayPeriodResponse>> {
    let pay_period = db::earnings::open_pay_period(&ctx.db_pool, query.instructor_id).await?;
    let entries = db::earnings::list_entries(&ctx.db_pool, pay_period.id).await?;

    Ok(Json(PayPeriodResponse {
        pay_period,
        entries,
    }))
}
