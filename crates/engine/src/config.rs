use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::CostWeights;

// ---------------------------------------------------------------------------
// Constraint settings
// ---------------------------------------------------------------------------

/// Weight and on/off switch for a constraint without a numeric limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Weighted {
    pub enabled: bool,
    pub weight: f64,
}

impl Weighted {
    pub fn new(weight: f64) -> Self {
        Self { enabled: true, weight }
    }
}

/// Weight, on/off switch and limit for a constraint with a threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Limited {
    pub enabled: bool,
    pub weight: f64,
    pub limit: f64,
}

impl Limited {
    pub fn new(limit: f64, weight: f64) -> Self {
        Self {
            enabled: true,
            weight,
            limit,
        }
    }
}

/// Labor-law limits and penalty weights of the standard constraint set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstraintSettings {
    /// Days.
    pub max_consecutive_days: Limited,
    /// Hours.
    pub min_rest_period: Limited,
    /// Hours per ISO week.
    pub max_weekly_hours: Limited,
    pub shift_coverage: Weighted,
    pub preference: Weighted,
    pub friday_off: Weighted,
    pub fairness: Weighted,
    pub skill_mix: Weighted,
    pub ramadan: Weighted,
}

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self {
            max_consecutive_days: Limited::new(6.0, 100.0),
            min_rest_period: Limited::new(11.0, 200.0),
            max_weekly_hours: Limited::new(48.0, 50.0),
            shift_coverage: Weighted::new(500.0),
            preference: Weighted::new(10.0),
            friday_off: Weighted::new(20.0),
            fairness: Weighted::new(25.0),
            skill_mix: Weighted::new(100.0),
            ramadan: Weighted::new(15.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Optimizer configuration
// ---------------------------------------------------------------------------

/// Fatigue estimator used when no custom one is injected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FatigueModel {
    /// Fixed 0.5 for every nurse.
    #[default]
    Neutral,
    /// Derived from each nurse's recent work history.
    Workload,
}

/// Options of one optimization run. Every field has a default so callers may
/// send a partial object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
    /// Wall-clock budget, checked before each column-generation iteration.
    pub time_limit_secs: f64,
    /// Rotations per nurse in the initial pool.
    pub seed_rotations_per_nurse: usize,
    /// New rotations per nurse added by each pricing round.
    pub columns_per_nurse: usize,
    pub use_forecast: bool,
    pub use_fatigue: bool,
    pub fatigue_model: FatigueModel,
    /// Fractional values strictly above this are committed.
    pub rounding_threshold: f64,
    /// Objective delta below which the loop is considered converged.
    pub convergence_tolerance: f64,
    /// Complexity multiplier applied to shifts inside the Ramadan window.
    pub ramadan_complexity: f64,
    pub cost_weights: CostWeights,
    pub constraints: ConstraintSettings,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            time_limit_secs: 300.0,
            seed_rotations_per_nurse: 20,
            columns_per_nurse: 5,
            use_forecast: false,
            use_fatigue: false,
            fatigue_model: FatigueModel::Neutral,
            rounding_threshold: 0.5,
            convergence_tolerance: 1.0,
            ramadan_complexity: 1.2,
            cost_weights: CostWeights::default(),
            constraints: ConstraintSettings::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: OptimizerConfig =
            serde_json::from_str(r#"{"maxIterations": 3, "constraints": {"fairness": {"enabled": false, "weight": 1.0}}}"#)
                .unwrap();
        assert_eq!(cfg.max_iterations, 3);
        assert_eq!(cfg.seed_rotations_per_nurse, 20);
        assert!(!cfg.constraints.fairness.enabled);
        assert_eq!(cfg.constraints.min_rest_period.limit, 11.0);
        assert_eq!(cfg.cost_weights.overtime_per_hour, 50.0);
        assert_eq!(cfg.fatigue_model, FatigueModel::Neutral);
    }

    #[test]
    fn test_time_limit_saturates() {
        let cfg = OptimizerConfig {
            time_limit_secs: f64::INFINITY,
            ..OptimizerConfig::default()
        };
        assert_eq!(cfg.time_limit(), Duration::MAX);
    }
}
