use serde::{Deserialize, Serialize};

use crate::forecast::CollaboratorError;
use crate::model::Nurse;

/// Physical and emotional fatigue, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FatigueEstimate {
    pub physical: f64,
    pub emotional: f64,
    pub overall: f64,
}

impl FatigueEstimate {
    pub const PHYSICAL_WEIGHT: f64 = 0.6;
    pub const EMOTIONAL_WEIGHT: f64 = 0.4;

    /// Clamps both components and derives the weighted overall score.
    pub fn combine(physical: f64, emotional: f64) -> Self {
        let physical = clamp_unit(physical);
        let emotional = clamp_unit(emotional);
        Self {
            physical,
            emotional,
            overall: clamp_unit(
                Self::PHYSICAL_WEIGHT * physical + Self::EMOTIONAL_WEIGHT * emotional,
            ),
        }
    }
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

pub trait FatigueEstimator: Send + Sync {
    fn estimate(&self, nurse: &Nurse) -> Result<FatigueEstimate, CollaboratorError>;
}

/// Used when no model is loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralFatigue;

impl NeutralFatigue {
    pub const SCORE: f64 = 0.5;
}

impl FatigueEstimator for NeutralFatigue {
    fn estimate(&self, _nurse: &Nurse) -> Result<FatigueEstimate, CollaboratorError> {
        Ok(FatigueEstimate::combine(Self::SCORE, Self::SCORE))
    }
}

/// Deterministic estimate from the nurse's recent work history.
///
/// Physical load grows with last week's hours (60h saturates), the current
/// consecutive-day streak (7 saturates) and night shifts (4 saturate).
/// Emotional load grows with preference mismatch and hours against the
/// nurse's own weekly cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadFatigue;

impl FatigueEstimator for WorkloadFatigue {
    fn estimate(&self, nurse: &Nurse) -> Result<FatigueEstimate, CollaboratorError> {
        let h = &nurse.history;
        let hours = (h.hours_last_week / 60.0).min(1.0);
        let streak = (h.consecutive_days_worked as f64 / 7.0).min(1.0);
        let nights = (h.night_shifts_last_week as f64 / 4.0).min(1.0);
        let physical = (0.3 * hours + 0.3 * streak + 0.2 * nights) / 0.8;

        let mismatch = 1.0 - clamp_unit(h.preference_match);
        let load = if nurse.max_hours_per_week > 0.0 {
            (h.hours_last_week / nurse.max_hours_per_week).min(1.0)
        } else {
            1.0
        };
        let emotional = (0.4 * mismatch + 0.3 * load) / 0.7;

        Ok(FatigueEstimate::combine(physical, emotional))
    }
}
