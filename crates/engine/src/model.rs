use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Shift types worked in the ward. `Rest` is a day off and never carries hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShiftType {
    /// 07:00 - 15:00
    Morning,
    /// 15:00 - 23:00
    Afternoon,
    /// 23:00 - 07:00, crosses midnight.
    Night,
    /// 07:00 - 19:00
    Extended,
    Rest,
}

impl ShiftType {
    /// Standard start/end times of this shift type. `None` for `Rest`.
    pub fn standard_times(self) -> Option<(NaiveTime, NaiveTime)> {
        let (start, end) = match self {
            ShiftType::Morning => (7, 15),
            ShiftType::Afternoon => (15, 23),
            ShiftType::Night => (23, 7),
            ShiftType::Extended => (7, 19),
            ShiftType::Rest => return None,
        };
        Some((
            NaiveTime::from_hms_opt(start, 0, 0)?,
            NaiveTime::from_hms_opt(end, 0, 0)?,
        ))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShiftType::Morning => "morning",
            ShiftType::Afternoon => "afternoon",
            ShiftType::Night => "night",
            ShiftType::Extended => "extended",
            ShiftType::Rest => "rest",
        }
    }
}

/// Nurse seniority. Declaration order is the ordering: junior is lowest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkillLevel {
    Junior,
    Intermediate,
    Senior,
    Specialist,
    HeadNurse,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContractType {
    FullTime,
    PartTime,
    Temporary,
    OnCall,
}

// ---------------------------------------------------------------------------
// Nurse
// ---------------------------------------------------------------------------

/// Scheduling preferences declared by a nurse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NursePreferences {
    pub preferred_shifts: Vec<ShiftType>,
    /// Shift types the nurse will not be rostered on by the generator.
    pub avoided_shifts: Vec<ShiftType>,
    /// Weekday numbers, 0 = Monday .. 6 = Sunday.
    pub preferred_days_off: Vec<u32>,
    /// Friday off for Jumu'ah prayer.
    pub prefer_friday_off: bool,
    pub ramadan_reduced_hours: bool,
    pub avoid_night_shifts_ramadan: bool,
    pub max_night_shifts_per_week: u32,
}

impl Default for NursePreferences {
    fn default() -> Self {
        Self {
            preferred_shifts: Vec::new(),
            avoided_shifts: Vec::new(),
            preferred_days_off: Vec::new(),
            prefer_friday_off: true,
            ramadan_reduced_hours: true,
            avoid_night_shifts_ramadan: false,
            max_night_shifts_per_week: 3,
        }
    }
}

/// Recent work history, fed to the fatigue collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkHistory {
    pub hours_last_week: f64,
    pub consecutive_days_worked: u32,
    pub night_shifts_last_week: u32,
    /// Fraction of recent shifts that matched the nurse's preferences (0..1).
    pub preference_match: f64,
}

impl Default for WorkHistory {
    fn default() -> Self {
        Self {
            hours_last_week: 0.0,
            consecutive_days_worked: 0,
            night_shifts_last_week: 0,
            preference_match: 1.0,
        }
    }
}

fn default_max_hours_per_week() -> f64 {
    48.0
}

fn default_max_consecutive_days() -> u32 {
    6
}

fn default_min_hours_between_shifts() -> f64 {
    11.0
}

fn default_skill_level() -> SkillLevel {
    SkillLevel::Intermediate
}

fn default_contract_type() -> ContractType {
    ContractType::FullTime
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Nurse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default = "default_skill_level")]
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default = "default_contract_type")]
    pub contract_type: ContractType,
    /// Weekly hour cap. Must be > 0.
    #[serde(default = "default_max_hours_per_week")]
    pub max_hours_per_week: f64,
    /// Must be > 0.
    #[serde(default = "default_max_consecutive_days")]
    pub max_consecutive_days: u32,
    #[serde(default = "default_min_hours_between_shifts")]
    pub min_hours_between_shifts: f64,
    #[serde(default)]
    pub preferences: NursePreferences,
    /// Current fatigue in [0, 1]. Written between optimization steps only.
    #[serde(default)]
    pub fatigue_score: f64,
    #[serde(default)]
    pub unavailable_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub vacation_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub history: WorkHistory,
}

impl Nurse {
    /// A nurse with default contract values and preferences.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            name_ar: None,
            skill_level: default_skill_level(),
            specializations: Vec::new(),
            contract_type: default_contract_type(),
            max_hours_per_week: default_max_hours_per_week(),
            max_consecutive_days: default_max_consecutive_days(),
            min_hours_between_shifts: default_min_hours_between_shifts(),
            preferences: NursePreferences::default(),
            fatigue_score: 0.0,
            unavailable_dates: BTreeSet::new(),
            vacation_dates: BTreeSet::new(),
            history: WorkHistory::default(),
        }
    }

    pub fn is_available(&self, date: NaiveDate) -> bool {
        !self.unavailable_dates.contains(&date) && !self.vacation_dates.contains(&date)
    }

    /// Whether the nurse is willing to work this shift type at all.
    pub fn can_work_shift(&self, shift_type: ShiftType) -> bool {
        !self.preferences.avoided_shifts.contains(&shift_type)
    }

    /// Store a fatigue score, clamped into [0, 1].
    pub fn set_fatigue_score(&mut self, score: f64) {
        self.fatigue_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    }
}

// ---------------------------------------------------------------------------
// Shift
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    /// `"{date}_{type}"`, unique within a horizon.
    pub id: String,
    pub shift_type: ShiftType,
    pub start_time: NaiveTime,
    /// May be earlier than `start_time`: the shift then ends the next day.
    pub end_time: NaiveTime,
    pub date: NaiveDate,
    pub required_nurses: u32,
    #[serde(default)]
    pub required_skills: Vec<SkillLevel>,
    #[serde(default)]
    pub required_specializations: Vec<String>,
    /// Workload multiplier, >= 1.0. Raised during Ramadan.
    pub complexity: f64,
    /// Nurse ids, no duplicates.
    #[serde(default)]
    pub assigned_nurses: Vec<String>,
}

impl Shift {
    /// A shift of the given type at its standard times.
    pub fn new(shift_type: ShiftType, date: NaiveDate, required_nurses: u32) -> Self {
        let (start_time, end_time) = shift_type
            .standard_times()
            .unwrap_or_default();
        Self {
            id: format!("{}_{}", date, shift_type.as_str()),
            shift_type,
            start_time,
            end_time,
            date,
            required_nurses,
            required_skills: Vec::new(),
            required_specializations: Vec::new(),
            complexity: 1.0,
            assigned_nurses: Vec::new(),
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end_time < self.start_time
    }

    /// Length in hours; 0 for rest shifts.
    pub fn duration_hours(&self) -> f64 {
        if self.shift_type == ShiftType::Rest {
            return 0.0;
        }
        let mut mins = (self.end_time - self.start_time).num_minutes();
        if self.crosses_midnight() {
            mins += 24 * 60;
        }
        mins as f64 / 60.0
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// End instant; the 24h correction for midnight-crossing shifts is applied here only.
    pub fn ends_at(&self) -> NaiveDateTime {
        let end = self.date.and_time(self.end_time);
        if self.crosses_midnight() {
            end + Duration::days(1)
        } else {
            end
        }
    }

    pub fn is_fully_staffed(&self) -> bool {
        self.assigned_nurses.len() as u32 >= self.required_nurses
    }

    pub fn shortage(&self) -> u32 {
        self.required_nurses
            .saturating_sub(self.assigned_nurses.len() as u32)
    }

    /// Understaffing cost used in the schedule's total cost.
    pub fn understaffing_penalty(&self, weights: &CostWeights) -> f64 {
        self.shortage() as f64 * self.complexity * weights.understaffing
    }

    /// Adds a nurse id unless already present. Returns whether it was added.
    pub fn assign(&mut self, nurse_id: &str) -> bool {
        if self.assigned_nurses.iter().any(|n| n == nurse_id) {
            return false;
        }
        self.assigned_nurses.push(nurse_id.to_string());
        true
    }
}

// ---------------------------------------------------------------------------
// Rotation cost weights
// ---------------------------------------------------------------------------

/// Named weights of `Rotation::cost` and the schedule's total cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CostWeights {
    /// Per hour above the nurse's weekly cap.
    pub overtime_per_hour: f64,
    /// Flat, when the rotation is longer than the nurse's consecutive-day limit.
    pub consecutive_days: f64,
    pub avoided_shift: f64,
    pub not_preferred_shift: f64,
    /// Per night shift beyond the nurse's weekly night cap.
    pub excess_night_shift: f64,
    /// Multiplied by rotation hours and the nurse's fatigue score.
    pub fatigue_per_hour: f64,
    /// Per missing nurse, multiplied by shift complexity.
    pub understaffing: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            overtime_per_hour: 50.0,
            consecutive_days: 200.0,
            avoided_shift: 30.0,
            not_preferred_shift: 10.0,
            excess_night_shift: 40.0,
            fatigue_per_hour: 10.0,
            understaffing: 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// A date-contiguous work stint of one nurse: the column of the master problem.
///
/// Holds indices into the nurse roster and the shift arena rather than the
/// objects themselves, so shifts can later be mutated with assignments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    /// Index into the roster.
    pub nurse: usize,
    /// Indices into the shift arena, in date order.
    pub shifts: Vec<usize>,
}

impl Rotation {
    pub fn new(nurse: usize, shifts: Vec<usize>) -> Self {
        Self { nurse, shifts }
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Days covered; equal to the shift count for a contiguous rotation.
    pub fn duration_days(&self) -> usize {
        self.shifts.len()
    }

    pub fn violates_max_consecutive(&self, max_days: u32) -> bool {
        self.duration_days() > max_days as usize
    }

    /// Resolves the shift indices against the arena, skipping any out of range.
    pub fn resolve<'a>(&'a self, shifts: &'a [Shift]) -> impl Iterator<Item = &'a Shift> + 'a {
        self.shifts.iter().filter_map(move |&i| shifts.get(i))
    }

    pub fn total_hours(&self, shifts: &[Shift]) -> f64 {
        self.resolve(shifts).map(Shift::duration_hours).sum()
    }

    /// Every adjacent pair of shifts is exactly one calendar day apart.
    pub fn is_contiguous(&self, shifts: &[Shift]) -> bool {
        let dates: Vec<NaiveDate> = self.resolve(shifts).map(|s| s.date).collect();
        dates.len() == self.shifts.len() && dates.windows(2).all(|w| (w[1] - w[0]).num_days() == 1)
    }

    /// Cost of this rotation for its nurse: overtime, consecutive-day excess,
    /// preference mismatches, excess nights and fatigue.
    pub fn cost(&self, nurse: &Nurse, shifts: &[Shift], weights: &CostWeights) -> f64 {
        let mut cost = 0.0;
        let total_hours = self.total_hours(shifts);

        let overtime = total_hours - nurse.max_hours_per_week;
        if overtime > 0.0 {
            cost += overtime * weights.overtime_per_hour;
        }

        if self.violates_max_consecutive(nurse.max_consecutive_days) {
            cost += weights.consecutive_days;
        }

        let prefs = &nurse.preferences;
        let mut nights = 0u32;
        for shift in self.resolve(shifts) {
            if prefs.avoided_shifts.contains(&shift.shift_type) {
                cost += weights.avoided_shift;
            }
            if !prefs.preferred_shifts.is_empty()
                && !prefs.preferred_shifts.contains(&shift.shift_type)
            {
                cost += weights.not_preferred_shift;
            }
            if shift.shift_type == ShiftType::Night {
                nights += 1;
            }
        }
        let excess_nights = nights.saturating_sub(prefs.max_night_shifts_per_week);
        cost += excess_nights as f64 * weights.excess_night_shift;

        cost += total_hours * nurse.fatigue_score * weights.fatigue_per_hour;
        cost
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScheduleError {
    #[error("Rotation references unknown nurse index {0}")]
    UnknownNurse(usize),
    #[error("Rotation for nurse '{0}' references unknown shift index {1}")]
    UnknownShift(String, usize),
    #[error("Nurse '{0}' is already rostered on {1}")]
    DoubleBooked(String, NaiveDate),
}

/// The committed roster for a planning horizon.
///
/// Rotations are only ever appended; every derived value is computed from
/// (nurses, shifts, rotations).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_date: NaiveDate,
    /// Exclusive.
    pub end_date: NaiveDate,
    pub nurses: Vec<Nurse>,
    pub shifts: Vec<Shift>,
    pub rotations: Vec<Rotation>,
    #[serde(default)]
    pub hospital_id: String,
    #[serde(default)]
    pub department: String,
}

impl Schedule {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        nurses: Vec<Nurse>,
        shifts: Vec<Shift>,
    ) -> Self {
        Self {
            start_date,
            end_date,
            nurses,
            shifts,
            rotations: Vec::new(),
            hospital_id: String::new(),
            department: String::new(),
        }
    }

    /// Appends a rotation and records its nurse on every covered shift.
    ///
    /// Rejects rotations that would roster a nurse twice on the same date.
    pub fn add_rotation(&mut self, rotation: Rotation) -> Result<(), ScheduleError> {
        let nurse_id = self
            .nurses
            .get(rotation.nurse)
            .map(|n| n.id.clone())
            .ok_or(ScheduleError::UnknownNurse(rotation.nurse))?;

        let mut booked: BTreeSet<NaiveDate> = self
            .rotations
            .iter()
            .filter(|r| r.nurse == rotation.nurse)
            .flat_map(|r| r.resolve(&self.shifts).map(|s| s.date))
            .collect();
        for &idx in &rotation.shifts {
            let shift = self
                .shifts
                .get(idx)
                .ok_or_else(|| ScheduleError::UnknownShift(nurse_id.clone(), idx))?;
            if !booked.insert(shift.date) {
                return Err(ScheduleError::DoubleBooked(nurse_id, shift.date));
            }
        }

        for &idx in &rotation.shifts {
            self.shifts[idx].assign(&nurse_id);
        }
        self.rotations.push(rotation);
        Ok(())
    }

    /// All shifts worked by a nurse, in rotation order.
    pub fn nurse_shifts(&self, nurse: usize) -> Vec<&Shift> {
        self.rotations
            .iter()
            .filter(|r| r.nurse == nurse)
            .flat_map(|r| r.resolve(&self.shifts))
            .collect()
    }

    pub fn nurse_hours(&self, nurse: usize) -> f64 {
        self.rotations
            .iter()
            .filter(|r| r.nurse == nurse)
            .map(|r| r.total_hours(&self.shifts))
            .sum()
    }

    /// Rotation costs plus understaffing penalties.
    pub fn total_cost(&self, weights: &CostWeights) -> f64 {
        let rotation_cost: f64 = self
            .rotations
            .iter()
            .filter_map(|r| {
                self.nurses
                    .get(r.nurse)
                    .map(|n| r.cost(n, &self.shifts, weights))
            })
            .sum();
        let understaffing: f64 = self
            .shifts
            .iter()
            .filter(|s| s.shift_type != ShiftType::Rest)
            .map(|s| s.understaffing_penalty(weights))
            .sum();
        rotation_cost + understaffing
    }

    /// Fraction of each nurse's shifts that fall in their preferred set.
    ///
    /// 1.0 for nurses without shifts or without stated preferences.
    pub fn nurse_satisfaction(&self) -> BTreeMap<String, f64> {
        self.nurses
            .iter()
            .enumerate()
            .map(|(i, nurse)| {
                let worked = self.nurse_shifts(i);
                let preferred = &nurse.preferences.preferred_shifts;
                let score = if worked.is_empty() || preferred.is_empty() {
                    1.0
                } else {
                    let matches = worked
                        .iter()
                        .filter(|s| preferred.contains(&s.shift_type))
                        .count();
                    matches as f64 / worked.len() as f64
                };
                (nurse.id.clone(), score)
            })
            .collect()
    }

    pub fn average_hours_per_nurse(&self) -> f64 {
        if self.nurses.is_empty() {
            return 0.0;
        }
        let total: f64 = (0..self.nurses.len()).map(|i| self.nurse_hours(i)).sum();
        total / self.nurses.len() as f64
    }

    pub fn understaffed_shifts(&self) -> impl Iterator<Item = &Shift> {
        self.shifts
            .iter()
            .filter(|s| s.shift_type != ShiftType::Rest && !s.is_fully_staffed())
    }
}

// ---------------------------------------------------------------------------
// Problem definition
// ---------------------------------------------------------------------------

/// Inclusive date range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn default_true() -> bool {
    true
}

fn default_shifts_per_day() -> Vec<ShiftType> {
    vec![ShiftType::Morning, ShiftType::Afternoon, ShiftType::Night]
}

/// Longest planning horizon a problem may declare.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Everything needed to build and solve one horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingProblem {
    pub nurses: Vec<Nurse>,
    pub start_date: NaiveDate,
    pub planning_horizon_days: u32,
    #[serde(default = "default_shifts_per_day")]
    pub shifts_per_day: Vec<ShiftType>,
    /// Required nurses per shift type; missing types default to 1.
    #[serde(default)]
    pub daily_demand: BTreeMap<ShiftType, u32>,
    /// Per-date demand that replaces `daily_demand` on that date.
    #[serde(default)]
    pub demand_overrides: BTreeMap<NaiveDate, BTreeMap<ShiftType, u32>>,
    #[serde(default)]
    pub required_skills: BTreeMap<ShiftType, Vec<SkillLevel>>,
    #[serde(default)]
    pub required_specializations: BTreeMap<ShiftType, Vec<String>>,
    #[serde(default)]
    pub ramadan: Option<DateWindow>,
    /// Look the Ramadan window up from the calendar when `ramadan` is unset.
    #[serde(default = "default_true")]
    pub auto_ramadan: bool,
    #[serde(default)]
    pub public_holidays: Vec<NaiveDate>,
    #[serde(default)]
    pub hospital_id: String,
    #[serde(default)]
    pub department: String,
}

impl SchedulingProblem {
    pub fn new(nurses: Vec<Nurse>, start_date: NaiveDate, planning_horizon_days: u32) -> Self {
        Self {
            nurses,
            start_date,
            planning_horizon_days,
            shifts_per_day: default_shifts_per_day(),
            daily_demand: BTreeMap::new(),
            demand_overrides: BTreeMap::new(),
            required_skills: BTreeMap::new(),
            required_specializations: BTreeMap::new(),
            ramadan: None,
            auto_ramadan: false,
            public_holidays: Vec::new(),
            hospital_id: String::new(),
            department: String::new(),
        }
    }

    /// Exclusive end of the horizon, saturating at `NaiveDate::MAX`.
    pub fn end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(self.planning_horizon_days.into()))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Horizon dates in order. Stops early at the last representable date.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start_date;
        (0..u64::from(self.planning_horizon_days))
            .map_while(move |d| start.checked_add_days(Days::new(d)))
    }

    pub fn demand_for(&self, date: NaiveDate, shift_type: ShiftType) -> u32 {
        self.demand_overrides
            .get(&date)
            .and_then(|m| m.get(&shift_type))
            .or_else(|| self.daily_demand.get(&shift_type))
            .copied()
            .unwrap_or(1)
    }

    /// One shift per date and non-rest shift type, with Ramadan dates raised
    /// to `ramadan_complexity`.
    pub fn generate_shifts(&self, ramadan_complexity: f64) -> Vec<Shift> {
        let mut shifts = Vec::with_capacity(
            (self.planning_horizon_days.min(MAX_HORIZON_DAYS) as usize) * self.shifts_per_day.len(),
        );
        for date in self.dates() {
            for &shift_type in &self.shifts_per_day {
                if shift_type == ShiftType::Rest {
                    continue;
                }
                let mut shift = Shift::new(shift_type, date, self.demand_for(date, shift_type));
                if let Some(skills) = self.required_skills.get(&shift_type) {
                    shift.required_skills = skills.clone();
                }
                if let Some(specs) = self.required_specializations.get(&shift_type) {
                    shift.required_specializations = specs.clone();
                }
                if self.ramadan.is_some_and(|w| w.contains(date)) {
                    shift.complexity = ramadan_complexity.max(1.0);
                }
                shifts.push(shift);
            }
        }
        shifts
    }
}

/// Index nurses by id for lookups that start from a shift's assignment list.
pub(crate) fn nurse_lookup(nurses: &[Nurse]) -> HashMap<&str, &Nurse> {
    nurses.iter().map(|n| (n.id.as_str(), n)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn shifts_for(types: &[(ShiftType, u32)]) -> Vec<Shift> {
        types.iter().map(|&(t, day)| Shift::new(t, d(day), 1)).collect()
    }

    #[test]
    fn test_duration_handles_midnight() {
        assert_eq!(Shift::new(ShiftType::Morning, d(2), 1).duration_hours(), 8.0);
        assert_eq!(Shift::new(ShiftType::Night, d(2), 1).duration_hours(), 8.0);
        assert_eq!(Shift::new(ShiftType::Extended, d(2), 1).duration_hours(), 12.0);
        assert_eq!(Shift::new(ShiftType::Rest, d(2), 1).duration_hours(), 0.0);
    }

    #[test]
    fn test_night_shift_ends_next_day() {
        let night = Shift::new(ShiftType::Night, d(2), 1);
        assert_eq!(night.ends_at(), d(3).and_hms_opt(7, 0, 0).unwrap());
    }

    #[test]
    fn test_assign_ignores_duplicates() {
        let mut shift = Shift::new(ShiftType::Morning, d(2), 2);
        assert!(shift.assign("n1"));
        assert!(!shift.assign("n1"));
        assert_eq!(shift.shortage(), 1);
        assert!(shift.assign("n2"));
        assert!(shift.is_fully_staffed());
    }

    #[test]
    fn test_rotation_contiguity() {
        let shifts = shifts_for(&[
            (ShiftType::Morning, 2),
            (ShiftType::Morning, 3),
            (ShiftType::Morning, 5),
        ]);
        assert!(Rotation::new(0, vec![0, 1]).is_contiguous(&shifts));
        assert!(!Rotation::new(0, vec![1, 2]).is_contiguous(&shifts));
        assert!(!Rotation::new(0, vec![0, 9]).is_contiguous(&shifts));
    }

    #[test]
    fn test_rotation_cost_components() {
        let shifts = shifts_for(&[
            (ShiftType::Night, 2),
            (ShiftType::Night, 3),
            (ShiftType::Night, 4),
        ]);
        let mut nurse = Nurse::new("n1", "Nurse 1");
        nurse.max_hours_per_week = 20.0;
        nurse.max_consecutive_days = 2;
        nurse.preferences.preferred_shifts = vec![ShiftType::Morning];
        nurse.preferences.max_night_shifts_per_week = 1;
        nurse.fatigue_score = 0.5;

        let rotation = Rotation::new(0, vec![0, 1, 2]);
        let w = CostWeights::default();
        // overtime 4h*50 + consecutive 200 + 3 not-preferred*10 + 2 excess nights*40 + 24h*0.5*10
        let expected = 200.0 + 200.0 + 30.0 + 80.0 + 120.0;
        assert!((rotation.cost(&nurse, &shifts, &w) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_avoided_shift_costs_more_than_not_preferred() {
        let shifts = shifts_for(&[(ShiftType::Night, 2)]);
        let mut avoider = Nurse::new("a", "A");
        avoider.preferences.avoided_shifts = vec![ShiftType::Night];
        let mut picky = Nurse::new("b", "B");
        picky.preferences.preferred_shifts = vec![ShiftType::Morning];

        let rotation = Rotation::new(0, vec![0]);
        let w = CostWeights::default();
        assert!(rotation.cost(&avoider, &shifts, &w) > rotation.cost(&picky, &shifts, &w));
    }

    #[test]
    fn test_schedule_rejects_double_booking() {
        let shifts = shifts_for(&[(ShiftType::Morning, 2), (ShiftType::Night, 2)]);
        let mut schedule = Schedule::new(d(2), d(3), vec![Nurse::new("n1", "N")], shifts);
        schedule.add_rotation(Rotation::new(0, vec![0])).unwrap();
        let err = schedule.add_rotation(Rotation::new(0, vec![1])).unwrap_err();
        assert_eq!(err, ScheduleError::DoubleBooked("n1".into(), d(2)));
        assert_eq!(schedule.shifts[0].assigned_nurses, vec!["n1".to_string()]);
        assert!(schedule.shifts[1].assigned_nurses.is_empty());
    }

    #[test]
    fn test_generate_shifts_applies_demand_and_ramadan() {
        let mut problem = SchedulingProblem::new(vec![], d(2), 2);
        problem.shifts_per_day = vec![ShiftType::Morning, ShiftType::Rest, ShiftType::Night];
        problem.daily_demand.insert(ShiftType::Morning, 4);
        problem
            .demand_overrides
            .insert(d(3), BTreeMap::from([(ShiftType::Morning, 6)]));
        problem.ramadan = Some(DateWindow { start: d(3), end: d(30) });

        let shifts = problem.generate_shifts(1.2);
        assert_eq!(shifts.len(), 4);
        assert_eq!(shifts[0].id, "2025-06-02_morning");
        assert_eq!(shifts[0].required_nurses, 4);
        assert_eq!(shifts[1].required_nurses, 1);
        assert_eq!(shifts[2].required_nurses, 6);
        assert_eq!(shifts[0].complexity, 1.0);
        assert_eq!(shifts[2].complexity, 1.2);
    }

    #[test]
    fn test_horizon_dates_stop_at_last_representable_day() {
        let last = NaiveDate::MAX;
        let problem = SchedulingProblem::new(vec![], last.pred_opt().unwrap(), u32::MAX);
        assert_eq!(problem.end_date(), NaiveDate::MAX);
        assert_eq!(problem.dates().count(), 2);

        let problem = SchedulingProblem::new(vec![], d(2), 3);
        assert_eq!(problem.end_date(), d(5));
        assert_eq!(problem.dates().last(), Some(d(4)));
    }

    #[test]
    fn test_satisfaction_defaults_to_one() {
        let shifts = shifts_for(&[(ShiftType::Morning, 2), (ShiftType::Night, 3)]);
        let mut picky = Nurse::new("p", "P");
        picky.preferences.preferred_shifts = vec![ShiftType::Morning];
        let idle = Nurse::new("i", "I");
        let mut schedule = Schedule::new(d(2), d(4), vec![picky, idle], shifts);
        schedule.add_rotation(Rotation::new(0, vec![0, 1])).unwrap();

        let sat = schedule.nurse_satisfaction();
        assert_eq!(sat["p"], 0.5);
        assert_eq!(sat["i"], 1.0);
    }
}
