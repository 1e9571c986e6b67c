use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::is_weekend;
use crate::model::{SchedulingProblem, ShiftType};

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Failure of an external estimator (demand or fatigue model).
///
/// The optimizer never aborts on these: it logs and falls back to a
/// deterministic default.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Forecast types
// ---------------------------------------------------------------------------

/// Required nurses per shift type on one date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyDemand {
    pub morning: u32,
    pub afternoon: u32,
    pub night: u32,
}

impl DailyDemand {
    pub fn as_map(&self) -> BTreeMap<ShiftType, u32> {
        BTreeMap::from([
            (ShiftType::Morning, self.morning),
            (ShiftType::Afternoon, self.afternoon),
            (ShiftType::Night, self.night),
        ])
    }
}

pub type DemandForecast = BTreeMap<NaiveDate, DailyDemand>;

pub trait DemandForecaster: Send + Sync {
    /// Demand for each of `days` dates starting at `start`.
    fn forecast(&self, start: NaiveDate, days: u32) -> Result<DemandForecast, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Weekday heuristic
// ---------------------------------------------------------------------------

/// Fallback used when no trained model is available: weekends and public
/// holidays run a reduced base staffing of 3, other days 5.
#[derive(Debug, Clone, Default)]
pub struct WeekdayForecaster {
    pub holidays: BTreeSet<NaiveDate>,
}

impl WeekdayForecaster {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn demand_on(&self, date: NaiveDate) -> DailyDemand {
        let base: u32 = if is_weekend(date) || self.holidays.contains(&date) {
            3
        } else {
            5
        };
        DailyDemand {
            morning: base + 1,
            afternoon: base,
            night: base.saturating_sub(1).max(1),
        }
    }
}

impl DemandForecaster for WeekdayForecaster {
    fn forecast(&self, start: NaiveDate, days: u32) -> Result<DemandForecast, CollaboratorError> {
        Ok((0..u64::from(days))
            .map_while(|d| start.checked_add_days(Days::new(d)))
            .map(|date| (date, self.demand_on(date)))
            .collect())
    }
}

/// Writes the forecast into the problem as per-date demand overrides.
///
/// Only shift types the problem actually schedules are written; dates outside
/// the horizon are ignored.
pub fn apply_forecast(problem: &mut SchedulingProblem, forecast: &DemandForecast) {
    let start = problem.start_date;
    let end = problem.end_date();
    for (&date, demand) in forecast.range(start..end) {
        let entry = problem.demand_overrides.entry(date).or_default();
        for (shift_type, count) in demand.as_map() {
            if problem.shifts_per_day.contains(&shift_type) {
                entry.insert(shift_type, count);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
