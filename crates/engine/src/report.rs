use std::collections::BTreeMap;

use serde::Serialize;

use crate::constraints::{ConstraintEngine, ConstraintMetrics};
use crate::model::{CostWeights, Schedule};
use crate::solver::SolveStats;

/// Snapshot handed to report consumers. The engine renders nothing itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReport {
    pub metrics: ConstraintMetrics,
    /// Rotation costs plus understaffing penalties.
    pub total_cost: f64,
    pub satisfaction: BTreeMap<String, f64>,
    pub mean_satisfaction: f64,
    pub hours_per_nurse: BTreeMap<String, f64>,
    pub average_hours_per_nurse: f64,
    pub nurse_count: usize,
    pub shift_count: usize,
    pub rotation_count: usize,
    /// Ids of shifts with fewer assigned nurses than required.
    pub understaffed_shifts: Vec<String>,
    /// Ids of shifts that no candidate rotation could cover.
    pub unreachable_shifts: Vec<String>,
    /// Ids of shifts the best relaxation left short of staff.
    pub short_shifts: Vec<String>,
    /// Nurse id -> ids of assigned shifts, in date order.
    pub assignments: BTreeMap<String, Vec<String>>,
    /// Absent for evaluated (not optimized) schedules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SolveStats>,
}

impl ScheduleReport {
    pub fn build(
        schedule: &Schedule,
        engine: &ConstraintEngine,
        weights: &CostWeights,
        unreachable: &[usize],
        short: &[usize],
        stats: Option<SolveStats>,
    ) -> Self {
        let shift_ids = |indices: &[usize]| -> Vec<String> {
            indices
                .iter()
                .filter_map(|&i| schedule.shifts.get(i))
                .map(|s| s.id.clone())
                .collect()
        };
        let satisfaction = schedule.nurse_satisfaction();
        let mean_satisfaction = if satisfaction.is_empty() {
            1.0
        } else {
            satisfaction.values().sum::<f64>() / satisfaction.len() as f64
        };

        let hours_per_nurse = schedule
            .nurses
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), schedule.nurse_hours(i)))
            .collect();

        let assignments = schedule
            .nurses
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut worked = schedule.nurse_shifts(i);
                worked.sort_by_key(|s| s.starts_at());
                (n.id.clone(), worked.into_iter().map(|s| s.id.clone()).collect())
            })
            .collect();

        Self {
            metrics: engine.metrics(schedule),
            total_cost: schedule.total_cost(weights),
            satisfaction,
            mean_satisfaction,
            hours_per_nurse,
            average_hours_per_nurse: schedule.average_hours_per_nurse(),
            nurse_count: schedule.nurses.len(),
            shift_count: schedule.shifts.len(),
            rotation_count: schedule.rotations.len(),
            understaffed_shifts: schedule.understaffed_shifts().map(|s| s.id.clone()).collect(),
            unreachable_shifts: shift_ids(unreachable),
            short_shifts: shift_ids(short),
            assignments,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConstraintSettings;
    use crate::model::{Nurse, Rotation, Shift, ShiftType};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn make_schedule() -> Schedule {
        let shifts = vec![
            Shift::new(ShiftType::Morning, d(2), 1),
            Shift::new(ShiftType::Morning, d(3), 1),
            Shift::new(ShiftType::Morning, d(4), 2),
        ];
        let nurses = vec![Nurse::new("a", "A"), Nurse::new("b", "B")];
        let mut schedule = Schedule::new(d(2), d(5), nurses, shifts);
        schedule.add_rotation(Rotation::new(0, vec![0, 1, 2])).unwrap();
        schedule
    }

    #[test]
    fn test_report_counts_and_assignments() {
        let schedule = make_schedule();
        let engine = ConstraintEngine::standard(&ConstraintSettings::default(), None);
        let report = ScheduleReport::build(&schedule, &engine, &CostWeights::default(), &[2], &[1], None);

        assert_eq!(report.nurse_count, 2);
        assert_eq!(report.shift_count, 3);
        assert_eq!(report.rotation_count, 1);
        assert_eq!(report.understaffed_shifts, vec!["2025-06-04_morning".to_string()]);
        assert_eq!(report.unreachable_shifts, vec!["2025-06-04_morning".to_string()]);
        assert_eq!(report.short_shifts, vec!["2025-06-03_morning".to_string()]);
        assert_eq!(report.assignments["a"].len(), 3);
        assert!(report.assignments["b"].is_empty());
        assert_eq!(report.hours_per_nurse["a"], 24.0);
        assert_eq!(report.average_hours_per_nurse, 12.0);
        assert_eq!(report.mean_satisfaction, 1.0);
        assert!(!report.metrics.is_feasible);
        // One missing nurse at complexity 1.0.
        assert_eq!(report.total_cost, 100.0);
    }

    #[test]
    fn test_report_serializes_camel_case_without_stats() {
        let schedule = make_schedule();
        let engine = ConstraintEngine::new();
        let report = ScheduleReport::build(&schedule, &engine, &CostWeights::default(), &[], &[], None);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("meanSatisfaction").is_some());
        assert!(json.get("understaffedShifts").is_some());
        assert!(json.get("shortShifts").is_some());
        assert!(json.get("stats").is_none());
    }
}
