use std::collections::HashSet;

use rayon::prelude::*;

use crate::master::MasterSolution;
use crate::model::{Nurse, Rotation, Shift, ShiftType};

/// Longest rotation the generator enumerates: short stints are 1-3 days,
/// medium stints 4-6.
pub const MAX_ROTATION_DAYS: usize = 6;

// ---------------------------------------------------------------------------
// Rotation enumeration
// ---------------------------------------------------------------------------

/// Indices of the shifts a nurse is available for and willing to work,
/// stably sorted by date.
fn workable_shifts(nurse: &Nurse, shifts: &[Shift]) -> Vec<usize> {
    let mut idx: Vec<usize> = shifts
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.shift_type != ShiftType::Rest
                && nurse.is_available(s.date)
                && nurse.can_work_shift(s.shift_type)
        })
        .map(|(i, _)| i)
        .collect();
    idx.sort_by_key(|&i| shifts[i].date);
    idx
}

/// Lazily enumerates every date-contiguous rotation of 1..=6 shifts for a
/// nurse, start-index-major then length-ascending. Rotations longer than the
/// nurse's consecutive-day limit are never produced.
pub fn enumerate_rotations<'a>(
    nurse_idx: usize,
    nurse: &'a Nurse,
    shifts: &'a [Shift],
) -> impl Iterator<Item = Rotation> + 'a {
    let available = workable_shifts(nurse, shifts);
    let max_len = MAX_ROTATION_DAYS.min(nurse.max_consecutive_days as usize);
    (0..available.len()).flat_map(move |start| {
        let mut out = Vec::new();
        for len in 1..=max_len.min(available.len() - start) {
            let end = start + len;
            if len > 1 {
                let prev = shifts[available[end - 2]].date;
                let next = shifts[available[end - 1]].date;
                // Any longer candidate shares this broken pair.
                if (next - prev).num_days() != 1 {
                    break;
                }
            }
            out.push(Rotation::new(nurse_idx, available[start..end].to_vec()));
        }
        out
    })
}

/// The first `max_rotations` rotations of `enumerate_rotations`.
///
/// A nurse with no workable shifts yields an empty list.
pub fn generate_rotations(
    nurse_idx: usize,
    nurse: &Nurse,
    shifts: &[Shift],
    max_rotations: usize,
) -> Vec<Rotation> {
    enumerate_rotations(nurse_idx, nurse, shifts)
        .take(max_rotations)
        .collect()
}

// ---------------------------------------------------------------------------
// Column pool
// ---------------------------------------------------------------------------

/// Candidate rotations in insertion order, de-duplicated by nurse and shift
/// sequence. Index positions are the master problem's variable indices.
#[derive(Debug, Default, Clone)]
pub struct RotationPool {
    rotations: Vec<Rotation>,
    seen: HashSet<Rotation>,
}

impl RotationPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rotation unless it is empty or already pooled.
    pub fn insert(&mut self, rotation: Rotation) -> bool {
        if rotation.is_empty() || self.seen.contains(&rotation) {
            return false;
        }
        self.seen.insert(rotation.clone());
        self.rotations.push(rotation);
        true
    }

    /// Inserts all, returning how many were new.
    pub fn extend(&mut self, rotations: impl IntoIterator<Item = Rotation>) -> usize {
        rotations
            .into_iter()
            .map(|r| self.insert(r))
            .filter(|&added| added)
            .count()
    }

    pub fn contains(&self, rotation: &Rotation) -> bool {
        self.seen.contains(rotation)
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    pub fn as_slice(&self) -> &[Rotation] {
        &self.rotations
    }
}

/// Initial pool: up to `per_nurse` rotations for every nurse, merged in
/// roster order.
pub fn seed_pool(nurses: &[Nurse], shifts: &[Shift], per_nurse: usize) -> RotationPool {
    let per_nurse_rotations: Vec<Vec<Rotation>> = nurses
        .par_iter()
        .enumerate()
        .map(|(i, nurse)| generate_rotations(i, nurse, shifts, per_nurse))
        .collect();
    let mut pool = RotationPool::new();
    pool.extend(per_nurse_rotations.into_iter().flatten());
    pool
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// What a pricing step can see.
pub struct PricingContext<'a> {
    pub nurses: &'a [Nurse],
    pub shifts: &'a [Shift],
    pub pool: &'a RotationPool,
    /// Latest solved relaxation, if any.
    pub last_solution: Option<&'a MasterSolution>,
}

/// Produces new candidate columns for the master problem.
///
/// Implementations must be deterministic: the same context yields the same
/// rotations in the same order.
pub trait Pricer: Send + Sync {
    fn price(&self, ctx: &PricingContext<'_>) -> Vec<Rotation>;
}

/// Bounded enumeration without reduced costs: each nurse contributes the
/// first `columns_per_nurse` enumerated rotations that are not pooled yet.
#[derive(Debug, Clone)]
pub struct HeuristicPricer {
    pub columns_per_nurse: usize,
}

impl Pricer for HeuristicPricer {
    fn price(&self, ctx: &PricingContext<'_>) -> Vec<Rotation> {
        // Rayon's indexed collect keeps roster order regardless of scheduling.
        let per_nurse: Vec<Vec<Rotation>> = ctx
            .nurses
            .par_iter()
            .enumerate()
            .map(|(i, nurse)| {
                enumerate_rotations(i, nurse, ctx.shifts)
                    .filter(|r| !ctx.pool.contains(r))
                    .take(self.columns_per_nurse)
                    .collect()
            })
            .collect();
        per_nurse.into_iter().flatten().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
