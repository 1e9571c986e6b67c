use std::collections::BTreeMap;

use good_lp::solvers::minilp::minilp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use crate::generator::RotationPool;
use crate::model::{CostWeights, Nurse, Shift, ShiftType};

/// Fractional values at or below this are dropped from a master solution.
pub const VALUE_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// Linear program model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    AtLeast,
    AtMost,
}

/// `sum(coef * x[var]) (>= | <=) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub terms: Vec<(usize, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

/// A minimisation LP over continuous variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearProgram {
    pub bounds: Vec<Bounds>,
    pub objective: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
}

impl LinearProgram {
    pub fn add_variable(&mut self, bounds: Bounds, cost: f64) -> usize {
        self.bounds.push(bounds);
        self.objective.push(cost);
        self.bounds.len() - 1
    }

    pub fn num_variables(&self) -> usize {
        self.bounds.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    /// One value per variable, in declaration order.
    pub values: Vec<f64>,
    pub objective: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LpError {
    #[error("linear program is infeasible")]
    Infeasible,
    #[error("linear program is unbounded")]
    Unbounded,
    #[error("LP backend failed: {0}")]
    Backend(String),
}

/// Solves the continuous relaxation of a linear program.
///
/// The controller calls this at most once at a time; implementations need
/// not be reentrant.
pub trait LpSolver {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError>;
}

/// In-process simplex through `good_lp`'s pure-Rust minilp backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinilpSolver;

fn linear_expression(vars: &[Variable], terms: impl Iterator<Item = (usize, f64)>) -> Expression {
    terms.fold(Expression::from(0.0), |acc, (j, coef)| match vars.get(j) {
        Some(&var) => acc + var * coef,
        None => acc,
    })
}

impl LpSolver for MinilpSolver {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        let mut problem_vars = ProblemVariables::new();
        let vars: Vec<Variable> = lp
            .bounds
            .iter()
            .map(|b| problem_vars.add(variable().min(b.lower).max(b.upper)))
            .collect();

        let objective = linear_expression(&vars, lp.objective.iter().copied().enumerate());
        let mut model = problem_vars.minimise(objective).using(minilp);
        for row in &lp.constraints {
            let lhs = linear_expression(&vars, row.terms.iter().copied());
            let rhs = row.rhs;
            model = match row.sense {
                Sense::AtLeast => model.with(constraint!(lhs >= rhs)),
                Sense::AtMost => model.with(constraint!(lhs <= rhs)),
            };
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => LpError::Infeasible,
            ResolutionError::Unbounded => LpError::Unbounded,
            other => LpError::Backend(other.to_string()),
        })?;

        let values: Vec<f64> = vars.iter().map(|&v| solution.value(v)).collect();
        let objective = values.iter().zip(&lp.objective).map(|(v, c)| v * c).sum();
        Ok(LpSolution { values, objective })
    }
}

// ---------------------------------------------------------------------------
// Master problem
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MasterError {
    #[error("master relaxation has no feasible solution with the current rotations")]
    InfeasibleRelaxation,
    #[error("master relaxation is unbounded")]
    Unbounded,
    #[error("LP solver unavailable: {0}")]
    SolverUnavailable(String),
}

impl From<LpError> for MasterError {
    fn from(e: LpError) -> Self {
        match e {
            LpError::Infeasible => MasterError::InfeasibleRelaxation,
            LpError::Unbounded => MasterError::Unbounded,
            LpError::Backend(msg) => MasterError::SolverUnavailable(msg),
        }
    }
}

/// Fractional rotation selection from one master solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterSolution {
    /// Pool index -> value, for values above `VALUE_EPSILON`.
    pub values: BTreeMap<usize, f64>,
    /// Shift index -> nurses missing in the relaxation, above `VALUE_EPSILON`.
    pub shortfall: BTreeMap<usize, f64>,
    pub objective: f64,
}

/// Set-covering relaxation over the current rotation pool.
///
/// Variable `j` is pool rotation `j`, bounded to [0, 1] and priced at the
/// rotation's cost for its nurse. Each non-rest shift with candidate columns
/// gets a coverage row `>= required_nurses` with its own understaffing slack,
/// bounded to [0, required_nurses] and priced at `understaffing * complexity`
/// per missing nurse, so the relaxation stays feasible when the roster is too
/// small. Each nurse with columns gets a convexity row `<= 1`.
#[derive(Debug, Clone)]
pub struct MasterProblem {
    pub lp: LinearProgram,
    /// Shifts that need staff but no pooled rotation covers. They get no
    /// coverage row.
    pub unreachable_shifts: Vec<usize>,
    /// (shift index, slack variable) for every coverage row.
    pub slack: Vec<(usize, usize)>,
    rotation_count: usize,
}

impl MasterProblem {
    pub fn build(
        nurses: &[Nurse],
        shifts: &[Shift],
        pool: &RotationPool,
        weights: &CostWeights,
    ) -> Self {
        let mut lp = LinearProgram::default();
        let mut covering: Vec<Vec<usize>> = vec![Vec::new(); shifts.len()];
        let mut per_nurse: Vec<Vec<usize>> = vec![Vec::new(); nurses.len()];

        for rotation in pool.as_slice() {
            let cost = nurses
                .get(rotation.nurse)
                .map_or(0.0, |n| rotation.cost(n, shifts, weights));
            let j = lp.add_variable(Bounds { lower: 0.0, upper: 1.0 }, cost);
            for &s in &rotation.shifts {
                if let Some(list) = covering.get_mut(s) {
                    list.push(j);
                }
            }
            if let Some(list) = per_nurse.get_mut(rotation.nurse) {
                list.push(j);
            }
        }

        let rotation_count = lp.num_variables();
        let mut unreachable_shifts = Vec::new();
        let mut slack = Vec::new();
        for (s, shift) in shifts.iter().enumerate() {
            if shift.shift_type == ShiftType::Rest || shift.required_nurses == 0 {
                continue;
            }
            if covering[s].is_empty() {
                unreachable_shifts.push(s);
                continue;
            }
            let required = shift.required_nurses as f64;
            let short = lp.add_variable(
                Bounds {
                    lower: 0.0,
                    upper: required,
                },
                weights.understaffing * shift.complexity,
            );
            slack.push((s, short));
            let mut terms: Vec<(usize, f64)> = covering[s].iter().map(|&j| (j, 1.0)).collect();
            terms.push((short, 1.0));
            lp.constraints.push(LinearConstraint {
                terms,
                sense: Sense::AtLeast,
                rhs: required,
            });
        }

        for vars in per_nurse.iter().filter(|v| !v.is_empty()) {
            lp.constraints.push(LinearConstraint {
                terms: vars.iter().map(|&j| (j, 1.0)).collect(),
                sense: Sense::AtMost,
                rhs: 1.0,
            });
        }

        Self {
            lp,
            unreachable_shifts,
            slack,
            rotation_count,
        }
    }

    pub fn solve(&self, solver: &dyn LpSolver) -> Result<MasterSolution, MasterError> {
        if self.lp.num_variables() == 0 {
            return Ok(MasterSolution::default());
        }
        let solution = solver.solve(&self.lp)?;
        let values = solution
            .values
            .iter()
            .take(self.rotation_count)
            .enumerate()
            .filter(|(_, &v)| v > VALUE_EPSILON)
            .map(|(j, &v)| (j, v))
            .collect();
        let shortfall = self
            .slack
            .iter()
            .filter_map(|&(s, var)| {
                let missing = solution.values.get(var).copied().unwrap_or(0.0);
                (missing > VALUE_EPSILON).then_some((s, missing))
            })
            .collect();
        Ok(MasterSolution {
            values,
            shortfall,
            objective: solution.objective,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
