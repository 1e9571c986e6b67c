use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calendar::{Calendar, EgyptianCalendar};
use crate::config::{FatigueModel, OptimizerConfig};
use crate::constraints::ConstraintEngine;
use crate::fatigue::{FatigueEstimator, NeutralFatigue, WorkloadFatigue};
use crate::forecast::{apply_forecast, DemandForecaster, WeekdayForecaster};
use crate::generator::{seed_pool, HeuristicPricer, Pricer, PricingContext};
use crate::master::{LpSolver, MasterError, MasterProblem, MasterSolution, MinilpSolver};
use crate::model::{
    DateWindow, Nurse, Rotation, Schedule, ScheduleError, SchedulingProblem, Shift, ShiftType,
};
use crate::report::ScheduleReport;
use crate::validator;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),
    #[error("Master relaxation stayed infeasible after {iterations} iterations and no new rotations could be generated")]
    InfeasibleRelaxation { iterations: u32 },
    #[error("LP solver unavailable: {0}")]
    SolverUnavailable(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Phase {
    Init,
    Forecasting,
    GeneratingShifts,
    FatigueScoring,
    ColumnGeneration,
    Rounding,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum StopReason {
    /// Objective moved less than the tolerance against the previous best.
    Converged,
    /// Pricing produced no rotation that was not already pooled.
    Exhausted,
    MaxIterations,
    TimeLimit,
}

/// Structured event emitted by the controller.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    PhaseStarted { phase: Phase },
    PoolSeeded { rotations: usize },
    MasterSolved { iteration: u32, objective: f64, pool_size: usize },
    MasterInfeasible { iteration: u32, pool_size: usize },
    ColumnsAdded { iteration: u32, added: usize, pool_size: usize },
    Stopped { reason: StopReason, iterations: u32 },
}

pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseStarted { phase } => debug!(?phase, "phase started"),
            ProgressEvent::PoolSeeded { rotations } => info!(rotations, "rotation pool seeded"),
            ProgressEvent::MasterSolved {
                iteration,
                objective,
                pool_size,
            } => info!(iteration, objective, pool_size, "master solved"),
            ProgressEvent::MasterInfeasible {
                iteration,
                pool_size,
            } => warn!(iteration, pool_size, "master relaxation infeasible, pricing more columns"),
            ProgressEvent::ColumnsAdded {
                iteration,
                added,
                pool_size,
            } => debug!(iteration, added, pool_size, "columns added"),
            ProgressEvent::Stopped { reason, iterations } => {
                info!(?reason, iterations, "column generation stopped")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveStats {
    pub iterations: u32,
    pub wall_time_secs: f64,
    /// Lowest master objective seen; `None` if no relaxation was solved.
    pub best_objective: Option<f64>,
    /// Master objective per solved iteration.
    pub objective_history: Vec<f64>,
    pub initial_pool: usize,
    pub final_pool: usize,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationOutcome {
    pub schedule: Schedule,
    pub report: ScheduleReport,
}

/// Problem with collaborator output applied: Ramadan resolved, demand
/// forecast, shifts materialized, fatigue scored.
struct Prepared {
    problem: SchedulingProblem,
    nurses: Vec<Nurse>,
    shifts: Vec<Shift>,
}

struct LoopResult {
    best: Option<MasterSolution>,
    pool: Vec<Rotation>,
    unreachable: Vec<usize>,
    short: Vec<usize>,
    stats: SolveStats,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Column-generation controller.
///
/// Runs INIT -> FORECASTING -> GENERATING_SHIFTS -> FATIGUE_SCORING ->
/// COLUMN_GENERATION -> ROUNDING -> DONE. Each collaborator can be replaced;
/// the defaults are the minilp LP backend, the heuristic pricer, the weekday
/// demand heuristic, and the estimator named by `config.fatigue_model`.
pub struct Optimizer {
    config: OptimizerConfig,
    lp_solver: Box<dyn LpSolver>,
    pricer: Box<dyn Pricer>,
    forecaster: Option<Box<dyn DemandForecaster>>,
    fatigue: Option<Box<dyn FatigueEstimator>>,
    calendar: Box<dyn Calendar>,
    observer: Box<dyn ProgressObserver>,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let pricer = HeuristicPricer {
            columns_per_nurse: config.columns_per_nurse,
        };
        Self {
            config,
            lp_solver: Box::new(MinilpSolver),
            pricer: Box::new(pricer),
            forecaster: None,
            fatigue: None,
            calendar: Box::new(EgyptianCalendar),
            observer: Box::new(TracingObserver),
        }
    }

    pub fn with_lp_solver(mut self, solver: impl LpSolver + 'static) -> Self {
        self.lp_solver = Box::new(solver);
        self
    }

    pub fn with_pricer(mut self, pricer: impl Pricer + 'static) -> Self {
        self.pricer = Box::new(pricer);
        self
    }

    pub fn with_forecaster(mut self, forecaster: impl DemandForecaster + 'static) -> Self {
        self.forecaster = Some(Box::new(forecaster));
        self
    }

    pub fn with_fatigue_estimator(mut self, estimator: impl FatigueEstimator + 'static) -> Self {
        self.fatigue = Some(Box::new(estimator));
        self
    }

    pub fn with_calendar(mut self, calendar: impl Calendar + 'static) -> Self {
        self.calendar = Box::new(calendar);
        self
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        self.observer.on_event(&event);
    }

    fn phase(&self, phase: Phase) {
        self.emit(ProgressEvent::PhaseStarted { phase });
    }

    /// Run column generation and commit the rounded schedule.
    ///
    /// Stopping on the time limit is not an error: the best schedule found so
    /// far is returned, which may have no rotations at all.
    pub fn optimize(&self, problem: &SchedulingProblem) -> Result<OptimizationOutcome, OptimizeError> {
        let started = Instant::now();
        let prepared = self.prepare(problem)?;

        self.phase(Phase::ColumnGeneration);
        let result = self.column_generation(&prepared, started)?;

        self.phase(Phase::Rounding);
        let threshold = self.config.rounding_threshold;
        let selected: Vec<Rotation> = result
            .best
            .iter()
            .flat_map(|sol| sol.values.iter())
            .filter(|(_, &v)| v > threshold)
            .filter_map(|(&j, _)| result.pool.get(j).cloned())
            .collect();
        debug!(selected = selected.len(), "rotations rounded in");

        let Prepared {
            problem,
            nurses,
            shifts,
        } = prepared;
        let mut schedule = Schedule::new(problem.start_date, problem.end_date(), nurses, shifts);
        schedule.hospital_id = problem.hospital_id.clone();
        schedule.department = problem.department.clone();
        for rotation in selected {
            schedule.add_rotation(rotation)?;
        }

        self.phase(Phase::Done);
        let engine = ConstraintEngine::standard(&self.config.constraints, problem.ramadan);
        let mut stats = result.stats;
        stats.wall_time_secs = started.elapsed().as_secs_f64();
        let report = ScheduleReport::build(
            &schedule,
            &engine,
            &self.config.cost_weights,
            &result.unreachable,
            &result.short,
            Some(stats),
        );
        if !report.metrics.is_feasible {
            warn!(
                hard_penalty = report.metrics.hard_penalty,
                "rounded schedule violates hard constraints"
            );
        }
        Ok(OptimizationOutcome { schedule, report })
    }

    /// Score a caller-supplied assignment (nurse id -> shift ids) without
    /// optimizing. Each nurse's shifts are split into date-contiguous
    /// rotations.
    pub fn evaluate(
        &self,
        problem: &SchedulingProblem,
        assignments: &BTreeMap<String, Vec<String>>,
    ) -> Result<ScheduleReport, OptimizeError> {
        let Prepared {
            problem,
            nurses,
            shifts,
        } = self.prepare(problem)?;

        let shift_index: BTreeMap<&str, usize> = shifts
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        let mut rotations = Vec::new();
        for (nurse_id, shift_ids) in assignments {
            let nurse = nurses
                .iter()
                .position(|n| &n.id == nurse_id)
                .ok_or_else(|| OptimizeError::InvalidProblem(format!("Unknown nurse '{}'", nurse_id)))?;
            let mut idx = shift_ids
                .iter()
                .map(|id| {
                    shift_index.get(id.as_str()).copied().ok_or_else(|| {
                        OptimizeError::InvalidProblem(format!(
                            "Nurse '{}' is assigned unknown shift '{}'",
                            nurse_id, id
                        ))
                    })
                })
                .collect::<Result<Vec<usize>, _>>()?;
            idx.sort_by_key(|&i| (shifts[i].date, shifts[i].start_time));
            rotations.extend(contiguous_runs(nurse, &idx, &shifts));
        }

        let mut schedule = Schedule::new(problem.start_date, problem.end_date(), nurses, shifts);
        schedule.hospital_id = problem.hospital_id.clone();
        schedule.department = problem.department.clone();
        for rotation in rotations {
            schedule.add_rotation(rotation)?;
        }

        let engine = ConstraintEngine::standard(&self.config.constraints, problem.ramadan);
        Ok(ScheduleReport::build(
            &schedule,
            &engine,
            &self.config.cost_weights,
            &[],
            &[],
            None,
        ))
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn prepare(&self, problem: &SchedulingProblem) -> Result<Prepared, OptimizeError> {
        self.phase(Phase::Init);
        let validation = validator::validate(problem);
        if !validation.is_ok() {
            return Err(OptimizeError::InvalidProblem(validation.errors.join("; ")));
        }
        for w in &validation.warnings {
            debug!(warning = %w, "problem validation");
        }

        let mut problem = problem.clone();
        if problem.ramadan.is_none() && problem.auto_ramadan {
            problem.ramadan = self.ramadan_for(&problem);
            if let Some(window) = problem.ramadan {
                info!(start = %window.start, end = %window.end, "Ramadan window from calendar");
            }
        }

        if self.config.use_forecast {
            self.phase(Phase::Forecasting);
            self.forecast(&mut problem);
        }

        self.phase(Phase::GeneratingShifts);
        let shifts = problem.generate_shifts(self.config.ramadan_complexity);
        info!(shifts = shifts.len(), nurses = problem.nurses.len(), "shifts generated");

        let mut nurses = problem.nurses.clone();
        if self.config.use_fatigue {
            self.phase(Phase::FatigueScoring);
            self.score_fatigue(&mut nurses);
        }

        Ok(Prepared {
            problem,
            nurses,
            shifts,
        })
    }

    /// First calendar Ramadan window overlapping the horizon.
    fn ramadan_for(&self, problem: &SchedulingProblem) -> Option<DateWindow> {
        let start = problem.start_date;
        let last = problem.dates().last().unwrap_or(start);
        (start.year()..=last.year())
            .filter_map(|y| self.calendar.ramadan(y))
            .find(|w| w.start <= last && start <= w.end)
    }

    fn holidays_for(&self, problem: &SchedulingProblem) -> BTreeSet<NaiveDate> {
        let start = problem.start_date;
        let last = problem.dates().last().unwrap_or(start);
        let mut holidays: BTreeSet<_> = problem.public_holidays.iter().copied().collect();
        for year in start.year()..=last.year() {
            holidays.extend(self.calendar.public_holidays(year));
        }
        holidays
    }

    fn forecast(&self, problem: &mut SchedulingProblem) {
        let fallback = WeekdayForecaster::new(self.holidays_for(problem));
        let days = problem.planning_horizon_days;
        let forecast = match &self.forecaster {
            Some(f) => f.forecast(problem.start_date, days).or_else(|e| {
                warn!(error = %e, "demand forecaster failed, using weekday heuristic");
                fallback.forecast(problem.start_date, days)
            }),
            None => fallback.forecast(problem.start_date, days),
        };
        match forecast {
            Ok(fc) => apply_forecast(problem, &fc),
            Err(e) => warn!(error = %e, "no demand forecast, keeping configured demand"),
        }
    }

    fn score_fatigue(&self, nurses: &mut [Nurse]) {
        let default: Box<dyn FatigueEstimator> = match self.config.fatigue_model {
            FatigueModel::Neutral => Box::new(NeutralFatigue),
            FatigueModel::Workload => Box::new(WorkloadFatigue),
        };
        let estimator = self.fatigue.as_deref().unwrap_or(&*default);
        for nurse in nurses.iter_mut() {
            let score = match estimator.estimate(nurse) {
                Ok(est) => est.overall,
                Err(e) => {
                    warn!(nurse = %nurse.id, error = %e, "fatigue estimate failed, using neutral score");
                    NeutralFatigue::SCORE
                }
            };
            nurse.set_fatigue_score(score);
        }
    }

    fn column_generation(&self, prepared: &Prepared, started: Instant) -> Result<LoopResult, OptimizeError> {
        let cfg = &self.config;
        let time_limit = cfg.time_limit();
        let nurses = &prepared.nurses;
        let shifts = &prepared.shifts;

        let mut pool = seed_pool(nurses, shifts, cfg.seed_rotations_per_nurse);
        let initial_pool = pool.len();
        self.emit(ProgressEvent::PoolSeeded { rotations: initial_pool });

        let mut best: Option<MasterSolution> = None;
        let mut last: Option<MasterSolution> = None;
        let mut history: Vec<f64> = Vec::new();
        let mut unreachable: Vec<usize> = Vec::new();
        let mut iterations: u32 = 0;

        let stop_reason = loop {
            if iterations >= cfg.max_iterations {
                break StopReason::MaxIterations;
            }
            if started.elapsed() >= time_limit {
                break StopReason::TimeLimit;
            }
            iterations += 1;

            let master = MasterProblem::build(nurses, shifts, &pool, &cfg.cost_weights);
            unreachable = master.unreachable_shifts.clone();
            match master.solve(self.lp_solver.as_ref()) {
                Ok(solution) => {
                    self.emit(ProgressEvent::MasterSolved {
                        iteration: iterations,
                        objective: solution.objective,
                        pool_size: pool.len(),
                    });
                    history.push(solution.objective);
                    let previous_best = best.as_ref().map(|b| b.objective);
                    let converged = previous_best
                        .is_some_and(|b| (solution.objective - b).abs() < cfg.convergence_tolerance);
                    if previous_best.map_or(true, |b| solution.objective <= b) {
                        best = Some(solution.clone());
                    }
                    last = Some(solution);
                    if converged {
                        break StopReason::Converged;
                    }
                }
                Err(MasterError::InfeasibleRelaxation) => {
                    self.emit(ProgressEvent::MasterInfeasible {
                        iteration: iterations,
                        pool_size: pool.len(),
                    });
                }
                Err(MasterError::SolverUnavailable(msg)) => {
                    return Err(OptimizeError::SolverUnavailable(msg))
                }
                Err(e @ MasterError::Unbounded) => {
                    return Err(OptimizeError::SolverUnavailable(e.to_string()))
                }
            }

            let ctx = PricingContext {
                nurses,
                shifts,
                pool: &pool,
                last_solution: last.as_ref(),
            };
            let fresh = self.pricer.price(&ctx);
            let added = pool.extend(fresh);
            self.emit(ProgressEvent::ColumnsAdded {
                iteration: iterations,
                added,
                pool_size: pool.len(),
            });
            if added == 0 {
                break StopReason::Exhausted;
            }
        };
        self.emit(ProgressEvent::Stopped {
            reason: stop_reason,
            iterations,
        });

        if best.is_none() && iterations > 0 && stop_reason != StopReason::TimeLimit {
            return Err(OptimizeError::InfeasibleRelaxation { iterations });
        }

        let short: Vec<usize> = best
            .as_ref()
            .map(|b| b.shortfall.keys().copied().collect())
            .unwrap_or_default();
        Ok(LoopResult {
            stats: SolveStats {
                iterations,
                wall_time_secs: started.elapsed().as_secs_f64(),
                best_objective: best.as_ref().map(|b| b.objective),
                objective_history: history,
                initial_pool,
                final_pool: pool.len(),
                stop_reason,
            },
            best,
            pool: pool.as_slice().to_vec(),
            unreachable,
            short,
        })
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

/// Splits date-sorted shift indices into rotations of consecutive dates.
/// Rest shifts are dropped.
fn contiguous_runs(nurse: usize, sorted: &[usize], shifts: &[Shift]) -> Vec<Rotation> {
    let mut runs: Vec<Rotation> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for &i in sorted {
        if shifts[i].shift_type == ShiftType::Rest {
            continue;
        }
        let breaks = current
            .last()
            .is_some_and(|&prev| (shifts[i].date - shifts[prev].date).num_days() != 1);
        if breaks {
            runs.push(Rotation::new(nurse, std::mem::take(&mut current)));
        }
        current.push(i);
    }
    if !current.is_empty() {
        runs.push(Rotation::new(nurse, current));
    }
    runs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{CollaboratorError, DemandForecast};
    use crate::master::{LinearProgram, LpError, LpSolution};
    use std::sync::{Arc, Mutex};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    /// Mornings only, demand 1, starting Monday 2025-06-02.
    fn make_problem(nurses: Vec<Nurse>, days: u32) -> SchedulingProblem {
        let mut p = SchedulingProblem::new(nurses, d(2), days);
        p.shifts_per_day = vec![ShiftType::Morning];
        p.daily_demand.insert(ShiftType::Morning, 1);
        p
    }

    fn two_nurses() -> Vec<Nurse> {
        let mut tired = Nurse::new("n2", "Nurse 2");
        tired.fatigue_score = 0.5;
        vec![Nurse::new("n1", "Nurse 1"), tired]
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<ProgressEvent>>>);

    impl ProgressObserver for Recorder {
        fn on_event(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_two_nurses_three_days_converges_feasible() {
        let problem = make_problem(two_nurses(), 3);
        let out = Optimizer::default().optimize(&problem).unwrap();
        let stats = out.report.stats.clone().unwrap();

        assert!(stats.iterations <= 2);
        assert!(matches!(
            stats.stop_reason,
            StopReason::Converged | StopReason::Exhausted
        ));
        assert!(out.report.metrics.is_feasible, "{:?}", out.report.metrics);
        for shift in &out.schedule.shifts {
            assert_eq!(shift.assigned_nurses.len(), 1, "{}", shift.id);
        }
        // The rested nurse takes the whole stint at zero cost.
        assert_eq!(out.report.assignments["n1"].len(), 3);
        assert!(stats.best_objective.unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_unavailable_nurse_is_never_rostered() {
        let mut away = Nurse::new("away", "Away");
        away.unavailable_dates.extend([d(2), d(3), d(4)]);
        let mut problem = make_problem(vec![away, Nurse::new("n1", "N1")], 3);
        problem.daily_demand.insert(ShiftType::Morning, 2);

        // Demand 2 with one usable nurse: every shift is one nurse short.
        let out = Optimizer::default().optimize(&problem).unwrap();
        assert!(out.report.assignments["away"].is_empty());
        assert_eq!(out.report.assignments["n1"].len(), 3);
        assert_eq!(out.report.understaffed_shifts.len(), 3);
        assert_eq!(out.report.short_shifts.len(), 3);
        assert!(out.report.unreachable_shifts.is_empty());
        assert!(!out.report.metrics.is_feasible);

        // With demand 1 the other nurse covers everything alone.
        problem.daily_demand.insert(ShiftType::Morning, 1);
        let out = Optimizer::default().optimize(&problem).unwrap();
        assert!(out.report.assignments["away"].is_empty());
        assert!(out.report.short_shifts.is_empty());
        assert!(out.schedule.rotations.iter().all(|r| r.nurse != 0));
    }

    #[test]
    fn test_shift_only_unavailable_nurse_could_cover_is_understaffed() {
        let mut only = Nurse::new("only", "Only");
        only.unavailable_dates.extend([d(2), d(3)]);
        let problem = make_problem(vec![only], 2);

        let out = Optimizer::default().optimize(&problem).unwrap();
        assert!(out.schedule.rotations.is_empty());
        assert_eq!(out.report.understaffed_shifts.len(), 2);
        assert_eq!(out.report.unreachable_shifts.len(), 2);
        assert!(!out.report.metrics.is_feasible);
    }

    #[test]
    fn test_zero_time_limit_returns_empty_schedule() {
        let config = OptimizerConfig {
            time_limit_secs: 0.0,
            ..OptimizerConfig::default()
        };
        let out = Optimizer::new(config)
            .optimize(&make_problem(two_nurses(), 3))
            .unwrap();
        let stats = out.report.stats.unwrap();
        assert_eq!(stats.stop_reason, StopReason::TimeLimit);
        assert_eq!(stats.iterations, 0);
        assert!(out.schedule.rotations.is_empty());
    }

    #[test]
    fn test_max_iterations_stops_loop() {
        let config = OptimizerConfig {
            max_iterations: 1,
            seed_rotations_per_nurse: 1,
            ..OptimizerConfig::default()
        };
        let out = Optimizer::new(config)
            .optimize(&make_problem(two_nurses(), 3))
            .unwrap();
        let stats = out.report.stats.unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.stop_reason, StopReason::MaxIterations);
        assert!(stats.final_pool > stats.initial_pool);
    }

    struct Offline;

    impl LpSolver for Offline {
        fn solve(&self, _lp: &LinearProgram) -> Result<LpSolution, LpError> {
            Err(LpError::Backend("connection refused".into()))
        }
    }

    struct NoFeasiblePoint;

    impl LpSolver for NoFeasiblePoint {
        fn solve(&self, _lp: &LinearProgram) -> Result<LpSolution, LpError> {
            Err(LpError::Infeasible)
        }
    }

    #[test]
    fn test_backend_reporting_infeasible_fails_after_exhaustion() {
        let recorder = Recorder::default();
        let result = Optimizer::default()
            .with_lp_solver(NoFeasiblePoint)
            .with_observer(recorder.clone())
            .optimize(&make_problem(vec![Nurse::new("a", "A")], 1));
        assert!(matches!(
            result,
            Err(OptimizeError::InfeasibleRelaxation { .. })
        ));
        assert!(recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, ProgressEvent::MasterInfeasible { .. })));
    }

    #[test]
    fn test_solver_unavailable_aborts() {
        let result = Optimizer::default()
            .with_lp_solver(Offline)
            .optimize(&make_problem(two_nurses(), 3));
        assert!(matches!(result, Err(OptimizeError::SolverUnavailable(_))));
    }

    #[test]
    fn test_invalid_problem_is_rejected() {
        let problem = make_problem(vec![Nurse::new("a", "A"), Nurse::new("a", "B")], 3);
        let result = Optimizer::default().optimize(&problem);
        assert!(matches!(result, Err(OptimizeError::InvalidProblem(_))));
    }

    #[test]
    fn test_oversized_horizon_is_rejected() {
        let problem = make_problem(two_nurses(), u32::MAX);
        let result = Optimizer::default().optimize(&problem);
        assert!(matches!(result, Err(OptimizeError::InvalidProblem(msg)) if msg.contains("at most")));

        let result = Optimizer::default().evaluate(&problem, &BTreeMap::new());
        assert!(matches!(result, Err(OptimizeError::InvalidProblem(_))));
    }

    #[test]
    fn test_progress_events_follow_phases() {
        let recorder = Recorder::default();
        let config = OptimizerConfig {
            use_forecast: true,
            use_fatigue: true,
            ..OptimizerConfig::default()
        };
        let mut problem = make_problem(vec![Nurse::new("a", "A")], 1);
        problem.shifts_per_day = vec![ShiftType::Night];
        // Forecast night demand exceeds the roster of one.
        let out = Optimizer::new(config)
            .with_observer(recorder.clone())
            .optimize(&problem)
            .unwrap();
        assert_eq!(out.report.short_shifts.len(), 1);

        let events = recorder.0.lock().unwrap();
        let phases: Vec<Phase> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::PhaseStarted { phase } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                Phase::Init,
                Phase::Forecasting,
                Phase::GeneratingShifts,
                Phase::FatigueScoring,
                Phase::ColumnGeneration,
                Phase::Rounding,
                Phase::Done,
            ]
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::MasterSolved { iteration: 1, .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ProgressEvent::MasterInfeasible { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::Stopped {
                reason: StopReason::Exhausted,
                ..
            }
        )));
    }

    struct BrokenForecast;

    impl DemandForecaster for BrokenForecast {
        fn forecast(&self, _: NaiveDate, _: u32) -> Result<DemandForecast, CollaboratorError> {
            Err(CollaboratorError::Unavailable("model not trained".into()))
        }
    }

    struct BrokenFatigue;

    impl FatigueEstimator for BrokenFatigue {
        fn estimate(&self, _: &Nurse) -> Result<crate::fatigue::FatigueEstimate, CollaboratorError> {
            Err(CollaboratorError::Unavailable("model not loaded".into()))
        }
    }

    #[test]
    fn test_collaborator_failures_fall_back() {
        let config = OptimizerConfig {
            use_forecast: true,
            use_fatigue: true,
            ..OptimizerConfig::default()
        };
        let optimizer = Optimizer::new(config)
            .with_forecaster(BrokenForecast)
            .with_fatigue_estimator(BrokenFatigue);
        let nurses: Vec<Nurse> = (0..8).map(|i| Nurse::new(format!("n{i}"), "N")).collect();
        let problem = make_problem(nurses, 1);

        let prepared = optimizer.prepare(&problem).unwrap();
        // Monday weekday heuristic: morning 6.
        assert_eq!(prepared.shifts[0].required_nurses, 6);
        assert!(prepared.nurses.iter().all(|n| n.fatigue_score == 0.5));
    }

    #[test]
    fn test_auto_ramadan_raises_complexity() {
        let mut problem = make_problem(two_nurses(), 2);
        problem.start_date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        problem.auto_ramadan = true;
        let prepared = Optimizer::default().prepare(&problem).unwrap();
        assert!(prepared.problem.ramadan.is_some());
        assert!(prepared.shifts.iter().all(|s| s.complexity == 1.2));
    }

    struct FixedCalendar;

    impl Calendar for FixedCalendar {
        fn ramadan(&self, year: i32) -> Option<DateWindow> {
            (year == 2025).then(|| DateWindow { start: d(3), end: d(20) })
        }

        fn public_holidays(&self, _year: i32) -> Vec<NaiveDate> {
            Vec::new()
        }
    }

    #[test]
    fn test_calendar_can_be_replaced() {
        let mut problem = make_problem(two_nurses(), 2);
        problem.auto_ramadan = true;
        let prepared = Optimizer::default()
            .with_calendar(FixedCalendar)
            .prepare(&problem)
            .unwrap();
        assert_eq!(prepared.problem.ramadan.map(|w| w.start), Some(d(3)));
        assert_eq!(prepared.shifts[0].complexity, 1.0);
        assert_eq!(prepared.shifts[1].complexity, 1.2);
    }

    struct IdlePricer;

    impl Pricer for IdlePricer {
        fn price(&self, _ctx: &PricingContext<'_>) -> Vec<Rotation> {
            Vec::new()
        }
    }

    #[test]
    fn test_pricer_can_be_replaced() {
        let out = Optimizer::default()
            .with_pricer(IdlePricer)
            .optimize(&make_problem(two_nurses(), 3))
            .unwrap();
        let stats = out.report.stats.unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.stop_reason, StopReason::Exhausted);
        assert_eq!(stats.final_pool, stats.initial_pool);
    }

    #[test]
    fn test_evaluate_scores_given_assignment() {
        let problem = make_problem(two_nurses(), 3);
        let assignments = BTreeMap::from([
            (
                "n1".to_string(),
                vec!["2025-06-02_morning".to_string(), "2025-06-04_morning".to_string()],
            ),
            ("n2".to_string(), vec!["2025-06-03_morning".to_string()]),
        ]);
        let report = Optimizer::default().evaluate(&problem, &assignments).unwrap();
        assert!(report.metrics.is_feasible);
        assert_eq!(report.rotation_count, 3);
        assert!(report.understaffed_shifts.is_empty());
        assert!(report.stats.is_none());
    }

    #[test]
    fn test_evaluate_rejects_unknown_ids() {
        let problem = make_problem(two_nurses(), 3);
        let bad_nurse = BTreeMap::from([("ghost".to_string(), vec![])]);
        assert!(matches!(
            Optimizer::default().evaluate(&problem, &bad_nurse),
            Err(OptimizeError::InvalidProblem(_))
        ));
        let bad_shift = BTreeMap::from([("n1".to_string(), vec!["2030-01-01_morning".to_string()])]);
        assert!(matches!(
            Optimizer::default().evaluate(&problem, &bad_shift),
            Err(OptimizeError::InvalidProblem(_))
        ));
    }

    #[test]
    fn test_contiguous_runs_split_on_gaps() {
        let shifts: Vec<Shift> = [2, 3, 5]
            .iter()
            .map(|&day| Shift::new(ShiftType::Morning, d(day), 1))
            .collect();
        let runs = contiguous_runs(0, &[0, 1, 2], &shifts);
        assert_eq!(runs, vec![Rotation::new(0, vec![0, 1]), Rotation::new(0, vec![2])]);
    }
}
