//! Activity rate resolution
//!
//! The rate table is injected, versioned configuration: constructed once
//! at startup (or by tests) and passed by reference. A lookup miss is a
//! fatal configuration error, never a silent default; a default here
//! would mispay instructors.

use sprout_common::types::{ActivityRate, PayableActivity, SessionDelivery, SessionFormat};
use std::collections::HashMap;

use crate::{Error, Result};

/// Injected rate configuration keyed by activity code
#[derive(Debug, Clone)]
pub struct RateTable {
    entries: HashMap<PayableActivity, ActivityRate>,
}

/// Derive the activity code for a teaching session
pub fn activity_for(format: SessionFormat, delivery: SessionDelivery) -> PayableActivity {
    match (format, delivery) {
        (SessionFormat::Group, SessionDelivery::Online) => PayableActivity::GroupSessionOnline,
        (SessionFormat::Group, SessionDelivery::InPerson) => PayableActivity::GroupSessionInperson,
        (SessionFormat::OneOnOne, SessionDelivery::Online) => PayableActivity::OneOnOneOnline,
        (SessionFormat::OneOnOne, SessionDelivery::InPerson) => {
            PayableActivity::OneOnOneInperson
        }
    }
}

impl RateTable {
    /// Build a table from configuration entries
    pub fn from_entries(entries: Vec<ActivityRate>) -> Self {
        Self {
            entries: entries.into_iter().map(|r| (r.activity, r)).collect(),
        }
    }

    /// The standard published rates
    pub fn standard() -> Self {
        fn rate(
            activity: PayableActivity,
            base_rate_cents: i64,
            duration_minutes: i64,
            includes_wrap_up: bool,
        ) -> ActivityRate {
            ActivityRate {
                activity,
                base_rate_cents,
                currency: "USD".to_string(),
                duration_minutes,
                includes_wrap_up,
            }
        }

        Self::from_entries(vec![
            rate(PayableActivity::GroupSessionOnline, 3500, 60, true),
            rate(PayableActivity::GroupSessionInperson, 4000, 60, true),
            rate(PayableActivity::OneOnOneOnline, 2500, 45, true),
            rate(PayableActivity::OneOnOneInperson, 3000, 45, true),
            rate(PayableActivity::CoverageBonus, 500, 0, false),
            rate(PayableActivity::TrainingSession, 2000, 60, false),
        ])
    }

    /// Resolve the rate for a session's (format, delivery) pair
    pub fn resolve(
        &self,
        format: SessionFormat,
        delivery: SessionDelivery,
    ) -> Result<&ActivityRate> {
        let activity = activity_for(format, delivery);
        self.entries
            .get(&activity)
            .ok_or(Error::RateLookupMiss { format, delivery })
    }

    /// Look up a sentinel (non-session) activity such as a coverage bonus
    pub fn lookup(&self, activity: PayableActivity) -> Result<&ActivityRate> {
        self.entries.get(&activity).ok_or_else(|| {
            Error::Config(format!("No rate configured for activity '{}'", activity))
        })
    }
}
