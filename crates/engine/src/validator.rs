use std::collections::HashSet;

use serde::Serialize;

use chrono::Days;

use crate::model::{SchedulingProblem, ShiftType, MAX_HORIZON_DAYS};

// ---------------------------------------------------------------------------
// Validation result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validate implementation
// ---------------------------------------------------------------------------

/// Validate a problem definition, returning errors (block optimization) and
/// warnings (advisory).
pub fn validate(problem: &SchedulingProblem) -> ValidationResult {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let scheduled: Vec<ShiftType> = problem
        .shifts_per_day
        .iter()
        .copied()
        .filter(|t| *t != ShiftType::Rest)
        .collect();

    // -----------------------------------------------------------------------
    // Horizon and shift types
    // -----------------------------------------------------------------------
    let days = problem.planning_horizon_days;
    if days == 0 {
        errors.push("Planning horizon is 0 days -- nothing to schedule".to_string());
    } else if days > MAX_HORIZON_DAYS {
        errors.push(format!(
            "Planning horizon is {} days -- at most {} are supported",
            days, MAX_HORIZON_DAYS
        ));
    } else if problem
        .start_date
        .checked_add_days(Days::new(days.into()))
        .is_none()
    {
        errors.push(format!(
            "Planning horizon of {} days from {} runs past the last supported date",
            days, problem.start_date
        ));
    }
    // Date-by-date checks only run over a horizon that passed the checks above.
    let horizon_ok = errors.is_empty();
    if scheduled.is_empty() {
        errors.push(
            "No working shift types per day -- add at least one of Morning, Afternoon, Night, Extended"
                .to_string(),
        );
    }
    if let Some(window) = problem.ramadan {
        if window.end < window.start {
            errors.push(format!(
                "Ramadan window ends ({}) before it starts ({})",
                window.end, window.start
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Error: duplicate nurse IDs
    // -----------------------------------------------------------------------
    {
        let mut seen: HashSet<&str> = HashSet::new();
        for nurse in &problem.nurses {
            if !seen.insert(nurse.id.as_str()) {
                errors.push(format!(
                    "Duplicate nurse ID '{}' -- each nurse must have a unique ID",
                    nurse.id
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-nurse checks
    // -----------------------------------------------------------------------
    for nurse in &problem.nurses {
        if nurse.max_hours_per_week.is_nan() || nurse.max_hours_per_week <= 0.0 {
            errors.push(format!(
                "Nurse '{}' has a weekly hour cap of {} -- it must be positive",
                nurse.id, nurse.max_hours_per_week
            ));
        }
        if nurse.max_consecutive_days == 0 {
            errors.push(format!(
                "Nurse '{}' has a consecutive-day limit of 0 -- it must be positive",
                nurse.id
            ));
        }
        if nurse.min_hours_between_shifts < 0.0 {
            errors.push(format!(
                "Nurse '{}' has negative minimum rest ({}h)",
                nurse.id, nurse.min_hours_between_shifts
            ));
        }
        if !(0.0..=1.0).contains(&nurse.fatigue_score) {
            errors.push(format!(
                "Nurse '{}' has fatigue score {} outside [0, 1]",
                nurse.id, nurse.fatigue_score
            ));
        }

        let prefs = &nurse.preferences;
        for t in &prefs.preferred_shifts {
            if prefs.avoided_shifts.contains(t) {
                warnings.push(format!(
                    "Nurse '{}' both prefers and avoids {} shifts -- avoidance wins",
                    nurse.id,
                    t.as_str()
                ));
            }
        }
        if !scheduled.is_empty() && scheduled.iter().all(|t| !nurse.can_work_shift(*t)) {
            warnings.push(format!(
                "Nurse '{}' avoids every scheduled shift type -- they will never be rostered",
                nurse.id
            ));
        }
        if horizon_ok && problem.dates().all(|d| !nurse.is_available(d)) {
            warnings.push(format!(
                "Nurse '{}' is unavailable for the whole horizon",
                nurse.id
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Demand warnings
    // -----------------------------------------------------------------------
    if problem.nurses.is_empty() {
        warnings.push("No nurses defined -- every shift will be understaffed".to_string());
    }
    for t in &scheduled {
        if !problem.daily_demand.contains_key(t) {
            warnings.push(format!(
                "No demand set for {} shifts -- defaulting to 1 nurse",
                t.as_str()
            ));
        }
    }
    let roster = problem.nurses.len() as u32;
    for date in problem.dates().take_while(|_| horizon_ok) {
        for t in &scheduled {
            let demand = problem.demand_for(date, *t);
            if demand > roster {
                warnings.push(format!(
                    "{} {} needs {} nurses but only {} are on the roster",
                    date,
                    t.as_str(),
                    demand,
                    roster
                ));
            }
        }
    }

    ValidationResult { errors, warnings }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateWindow, Nurse};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn make_problem(nurses: Vec<Nurse>) -> SchedulingProblem {
        let mut p = SchedulingProblem::new(nurses, d(2), 3);
        p.shifts_per_day = vec![ShiftType::Morning];
        p.daily_demand.insert(ShiftType::Morning, 1);
        p
    }

    #[test]
    fn test_valid_problem_is_clean() {
        let result = validate(&make_problem(vec![Nurse::new("a", "A")]));
        assert!(result.is_ok());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_duplicate_ids_and_bad_caps() {
        let mut b = Nurse::new("a", "B");
        b.max_hours_per_week = 0.0;
        b.fatigue_score = 1.5;
        let result = validate(&make_problem(vec![Nurse::new("a", "A"), b]));
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("Duplicate nurse ID 'a'")));
        assert!(result.errors.iter().any(|e| e.contains("weekly hour cap")));
        assert!(result.errors.iter().any(|e| e.contains("fatigue score")));
    }

    #[test]
    fn test_zero_horizon_and_no_shift_types() {
        let mut p = make_problem(vec![Nurse::new("a", "A")]);
        p.planning_horizon_days = 0;
        p.shifts_per_day = vec![ShiftType::Rest];
        let result = validate(&p);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_oversized_horizon_is_an_error() {
        let mut p = make_problem(vec![Nurse::new("a", "A")]);
        p.planning_horizon_days = u32::MAX;
        let result = validate(&p);
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert!(result.errors[0].contains("at most 366"));
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        p.planning_horizon_days = MAX_HORIZON_DAYS;
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn test_horizon_past_last_date_is_an_error() {
        let mut p = make_problem(vec![Nurse::new("a", "A")]);
        p.start_date = NaiveDate::MAX;
        p.planning_horizon_days = 2;
        let result = validate(&p);
        assert!(result.errors.iter().any(|e| e.contains("last supported date")));
    }

    #[test]
    fn test_inverted_ramadan_window() {
        let mut p = make_problem(vec![Nurse::new("a", "A")]);
        p.ramadan = Some(DateWindow { start: d(10), end: d(5) });
        assert!(!validate(&p).is_ok());
    }

    #[test]
    fn test_warnings() {
        let mut picky = Nurse::new("p", "P");
        picky.preferences.preferred_shifts = vec![ShiftType::Morning];
        picky.preferences.avoided_shifts = vec![ShiftType::Morning];
        let mut away = Nurse::new("v", "V");
        away.vacation_dates.extend([d(2), d(3), d(4)]);

        let mut p = make_problem(vec![picky, away]);
        p.shifts_per_day.push(ShiftType::Night);
        p.daily_demand.insert(ShiftType::Morning, 3);

        let result = validate(&p);
        assert!(result.is_ok());
        let w = result.warnings.join("\n");
        assert!(w.contains("both prefers and avoids"));
        assert!(!w.contains("avoids every scheduled shift type"));
        assert!(w.contains("unavailable for the whole horizon"));
        assert!(w.contains("No demand set for night"));
        assert!(w.contains("needs 3 nurses but only 2"));
    }
}
