use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::calendar::is_friday;
use crate::config::ConstraintSettings;
use crate::model::{nurse_lookup, DateWindow, Schedule, Shift, ShiftType};

// ---------------------------------------------------------------------------
// Constraint interface
// ---------------------------------------------------------------------------

/// A scheduling rule scored over a complete or partial schedule.
///
/// `evaluate` returns a non-negative violation amount which is exactly 0 when
/// the rule holds. Soft constraints only ever contribute penalty.
pub trait Constraint: Send + Sync {
    fn name(&self) -> &str;

    fn weight(&self) -> f64;

    fn is_hard(&self) -> bool;

    fn evaluate(&self, schedule: &Schedule) -> f64;

    fn is_satisfied(&self, schedule: &Schedule) -> bool {
        !self.is_hard() || self.evaluate(schedule) == 0.0
    }

    fn penalty(&self, schedule: &Schedule) -> f64 {
        self.weight() * self.evaluate(schedule)
    }
}

/// Shifts of every nurse, indexed like `schedule.nurses`, in rotation order.
fn shifts_per_nurse(schedule: &Schedule) -> Vec<Vec<&Shift>> {
    let mut per_nurse: Vec<Vec<&Shift>> = vec![Vec::new(); schedule.nurses.len()];
    for rotation in &schedule.rotations {
        // Rotations pointing at unknown nurses are skipped.
        if let Some(list) = per_nurse.get_mut(rotation.nurse) {
            list.extend(rotation.resolve(&schedule.shifts));
        }
    }
    per_nurse
}

fn iso_week(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

// ---------------------------------------------------------------------------
// Hard constraints
// ---------------------------------------------------------------------------

/// Longest run of calendar-consecutive working dates per nurse.
#[derive(Debug, Clone)]
pub struct MaxConsecutiveDays {
    pub max_days: u32,
    pub weight: f64,
}

impl MaxConsecutiveDays {
    pub fn longest_run(shifts: &[&Shift]) -> u32 {
        let dates: BTreeSet<NaiveDate> = shifts.iter().map(|s| s.date).collect();
        let mut longest = 0;
        let mut run = 0;
        let mut prev: Option<NaiveDate> = None;
        for date in dates {
            run = match prev {
                Some(p) if (date - p).num_days() == 1 => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            prev = Some(date);
        }
        longest
    }
}

impl Constraint for MaxConsecutiveDays {
    fn name(&self) -> &str {
        "MaxConsecutiveDays"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        true
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        shifts_per_nurse(schedule)
            .iter()
            .map(|shifts| Self::longest_run(shifts).saturating_sub(self.max_days) as f64)
            .sum()
    }
}

/// Minimum rest between the end of one shift and the start of the next.
///
/// Only the configured `min_hours` is enforced. The nurse's own
/// `min_hours_between_shifts` is profile data and does not tighten the rule.
#[derive(Debug, Clone)]
pub struct MinRestPeriod {
    pub min_hours: f64,
    pub weight: f64,
}

impl MinRestPeriod {
    /// Hours between `first` ending and `second` starting, never negative.
    pub fn rest_hours(first: &Shift, second: &Shift) -> f64 {
        let gap = (second.starts_at() - first.ends_at()).num_minutes() as f64 / 60.0;
        gap.max(0.0)
    }
}

impl Constraint for MinRestPeriod {
    fn name(&self) -> &str {
        "MinRestPeriod"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        true
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        let mut violation = 0.0;
        for mut shifts in shifts_per_nurse(schedule) {
            shifts.sort_by_key(|s| s.date);
            for pair in shifts.windows(2) {
                let rest = Self::rest_hours(pair[0], pair[1]);
                if rest < self.min_hours {
                    violation += self.min_hours - rest;
                }
            }
        }
        violation
    }
}

/// Hours per ISO week against the stricter of this cap and the nurse's own.
#[derive(Debug, Clone)]
pub struct MaxWeeklyHours {
    pub max_hours: f64,
    pub weight: f64,
}

impl Constraint for MaxWeeklyHours {
    fn name(&self) -> &str {
        "MaxWeeklyHours"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        true
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        let mut violation = 0.0;
        for (nurse, shifts) in schedule.nurses.iter().zip(shifts_per_nurse(schedule)) {
            let cap = self.max_hours.min(nurse.max_hours_per_week);
            let mut weeks: BTreeMap<(i32, u32), f64> = BTreeMap::new();
            for shift in shifts {
                *weeks.entry(iso_week(shift.date)).or_default() += shift.duration_hours();
            }
            violation += weeks.values().map(|h| (h - cap).max(0.0)).sum::<f64>();
        }
        violation
    }
}

/// Every non-rest shift staffed to its requirement, weighted by complexity.
#[derive(Debug, Clone)]
pub struct ShiftCoverage {
    pub weight: f64,
}

impl Constraint for ShiftCoverage {
    fn name(&self) -> &str {
        "ShiftCoverage"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        true
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        schedule
            .shifts
            .iter()
            .filter(|s| s.shift_type != ShiftType::Rest)
            .map(|s| s.shortage() as f64 * s.complexity)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Soft constraints
// ---------------------------------------------------------------------------

/// One point per required skill level or specialization missing from a shift.
#[derive(Debug, Clone)]
pub struct SkillMix {
    pub weight: f64,
}

impl Constraint for SkillMix {
    fn name(&self) -> &str {
        "SkillMix"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        false
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        let nurses = nurse_lookup(&schedule.nurses);
        let mut violation = 0.0;
        for shift in &schedule.shifts {
            if shift.shift_type == ShiftType::Rest
                || (shift.required_skills.is_empty() && shift.required_specializations.is_empty())
            {
                continue;
            }
            let assigned: Vec<_> = shift
                .assigned_nurses
                .iter()
                .filter_map(|id| nurses.get(id.as_str()))
                .collect();
            for skill in &shift.required_skills {
                if !assigned.iter().any(|n| n.skill_level == *skill) {
                    violation += 1.0;
                }
            }
            for spec in &shift.required_specializations {
                if !assigned.iter().any(|n| n.specializations.contains(spec)) {
                    violation += 1.0;
                }
            }
        }
        violation
    }
}

/// Avoided (+3) and non-preferred (+1) shifts, plus night shifts beyond the
/// nurse's weekly cap.
#[derive(Debug, Clone)]
pub struct Preference {
    pub weight: f64,
}

impl Constraint for Preference {
    fn name(&self) -> &str {
        "Preference"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        false
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        let mut violation = 0.0;
        for (nurse, shifts) in schedule.nurses.iter().zip(shifts_per_nurse(schedule)) {
            let prefs = &nurse.preferences;
            let mut nights: BTreeMap<(i32, u32), u32> = BTreeMap::new();
            for shift in shifts {
                if prefs.avoided_shifts.contains(&shift.shift_type) {
                    violation += 3.0;
                }
                if !prefs.preferred_shifts.is_empty()
                    && !prefs.preferred_shifts.contains(&shift.shift_type)
                {
                    violation += 1.0;
                }
                if shift.shift_type == ShiftType::Night {
                    *nights.entry(iso_week(shift.date)).or_default() += 1;
                }
            }
            violation += nights
                .values()
                .map(|&n| n.saturating_sub(prefs.max_night_shifts_per_week) as f64)
                .sum::<f64>();
        }
        violation
    }
}

/// Friday shifts worked by nurses who asked for Fridays off.
#[derive(Debug, Clone)]
pub struct FridayOff {
    pub weight: f64,
}

impl Constraint for FridayOff {
    fn name(&self) -> &str {
        "FridayOff"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        false
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        schedule
            .nurses
            .iter()
            .zip(shifts_per_nurse(schedule))
            .filter(|(nurse, _)| nurse.preferences.prefer_friday_off)
            .map(|(_, shifts)| shifts.iter().filter(|s| is_friday(s.date)).count() as f64)
            .sum()
    }
}

/// Night shifts and long shifts inside the Ramadan window for nurses who
/// asked to avoid them.
#[derive(Debug, Clone)]
pub struct Ramadan {
    pub window: DateWindow,
    pub weight: f64,
}

impl Constraint for Ramadan {
    fn name(&self) -> &str {
        "Ramadan"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        false
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        let mut violation = 0.0;
        for (nurse, shifts) in schedule.nurses.iter().zip(shifts_per_nurse(schedule)) {
            let prefs = &nurse.preferences;
            for shift in shifts.iter().filter(|s| self.window.contains(s.date)) {
                if prefs.avoid_night_shifts_ramadan && shift.shift_type == ShiftType::Night {
                    violation += 2.0;
                }
                if prefs.ramadan_reduced_hours && shift.duration_hours() > 6.0 {
                    violation += 1.0;
                }
            }
        }
        violation
    }
}

/// Coefficient of variation of per-nurse hours, in percent.
#[derive(Debug, Clone)]
pub struct Fairness {
    pub weight: f64,
}

impl Constraint for Fairness {
    fn name(&self) -> &str {
        "Fairness"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn is_hard(&self) -> bool {
        false
    }

    fn evaluate(&self, schedule: &Schedule) -> f64 {
        let hours: Vec<f64> = (0..schedule.nurses.len())
            .map(|i| schedule.nurse_hours(i))
            .collect();
        if hours.is_empty() {
            return 0.0;
        }
        let min = hours.iter().copied().fold(f64::INFINITY, f64::min);
        let max = hours.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min < 1e-9 {
            return 0.0;
        }
        let n = hours.len() as f64;
        let mean = hours.iter().sum::<f64>() / n;
        let variance = hours.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt() / (mean + 1e-6) * 100.0
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Feasibility and penalty snapshot of one schedule.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintMetrics {
    pub is_feasible: bool,
    pub hard_penalty: f64,
    pub soft_penalty: f64,
    pub total_penalty: f64,
    /// Weighted penalty per constraint name, only for positive penalties.
    pub violations: BTreeMap<String, f64>,
}

/// Registry of hard and soft constraints.
///
/// New rules are added with `add`; existing constraints are never touched.
#[derive(Default)]
pub struct ConstraintEngine {
    hard: Vec<Box<dyn Constraint>>,
    soft: Vec<Box<dyn Constraint>>,
}

impl ConstraintEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The labor-law and preference rules, minus any disabled in `settings`.
    /// The Ramadan rule is registered only when a window is known.
    pub fn standard(settings: &ConstraintSettings, ramadan: Option<DateWindow>) -> Self {
        let mut engine = Self::new();
        let s = settings;
        if s.max_consecutive_days.enabled {
            engine.add(MaxConsecutiveDays {
                max_days: s.max_consecutive_days.limit.max(0.0) as u32,
                weight: s.max_consecutive_days.weight,
            });
        }
        if s.min_rest_period.enabled {
            engine.add(MinRestPeriod {
                min_hours: s.min_rest_period.limit,
                weight: s.min_rest_period.weight,
            });
        }
        if s.max_weekly_hours.enabled {
            engine.add(MaxWeeklyHours {
                max_hours: s.max_weekly_hours.limit,
                weight: s.max_weekly_hours.weight,
            });
        }
        if s.shift_coverage.enabled {
            engine.add(ShiftCoverage {
                weight: s.shift_coverage.weight,
            });
        }
        if s.preference.enabled {
            engine.add(Preference {
                weight: s.preference.weight,
            });
        }
        if s.friday_off.enabled {
            engine.add(FridayOff {
                weight: s.friday_off.weight,
            });
        }
        if s.fairness.enabled {
            engine.add(Fairness {
                weight: s.fairness.weight,
            });
        }
        if s.skill_mix.enabled {
            engine.add(SkillMix {
                weight: s.skill_mix.weight,
            });
        }
        if let (true, Some(window)) = (s.ramadan.enabled, ramadan) {
            engine.add(Ramadan {
                window,
                weight: s.ramadan.weight,
            });
        }
        engine
    }

    pub fn add<C: Constraint + 'static>(&mut self, constraint: C) {
        self.add_boxed(Box::new(constraint));
    }

    pub fn add_boxed(&mut self, constraint: Box<dyn Constraint>) {
        if constraint.is_hard() {
            self.hard.push(constraint);
        } else {
            self.soft.push(constraint);
        }
    }

    pub fn len(&self) -> usize {
        self.hard.len() + self.soft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> impl Iterator<Item = &Box<dyn Constraint>> {
        self.hard.iter().chain(self.soft.iter())
    }

    pub fn is_feasible(&self, schedule: &Schedule) -> bool {
        self.hard.iter().all(|c| c.is_satisfied(schedule))
    }

    pub fn hard_penalty(&self, schedule: &Schedule) -> f64 {
        self.hard.iter().map(|c| c.penalty(schedule)).sum()
    }

    pub fn soft_penalty(&self, schedule: &Schedule) -> f64 {
        self.soft.iter().map(|c| c.penalty(schedule)).sum()
    }

    pub fn total_penalty(&self, schedule: &Schedule) -> f64 {
        self.hard_penalty(schedule) + self.soft_penalty(schedule)
    }

    pub fn violations(&self, schedule: &Schedule) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for constraint in self.all() {
            let penalty = constraint.penalty(schedule);
            if penalty > 0.0 {
                *out.entry(constraint.name().to_string()).or_insert(0.0) += penalty;
            }
        }
        out
    }

    pub fn metrics(&self, schedule: &Schedule) -> ConstraintMetrics {
        let hard_penalty = self.hard_penalty(schedule);
        let soft_penalty = self.soft_penalty(schedule);
        ConstraintMetrics {
            is_feasible: self.is_feasible(schedule),
            hard_penalty,
            soft_penalty,
            total_penalty: hard_penalty + soft_penalty,
            violations: self.violations(schedule),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
