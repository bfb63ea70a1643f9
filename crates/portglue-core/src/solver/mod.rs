//! One-way constraint solver.
//!
//! Variables carry a strength. Every constraint is solved for its weakest
//! variable; when a variable is set from outside it moves to the back of its
//! constraints' weakest lists, so the solver adjusts the other variables
//! instead of undoing the edit.
//!
//! A solve pass handles each marked constraint at most once. Constraints
//! marked by changes made during the pass are appended and handled in the
//! same pass, which keeps propagation finite even for cyclic networks.

mod constraint;

pub use constraint::{equals, Constraint, EquationFn, EPSILON, EQUATION_ITERATION_LIMIT};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Solver errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("Unknown variable: {0:?}")]
    UnknownVariable(VarId),
    #[error("Unknown constraint: {0:?}")]
    UnknownConstraint(ConstraintId),
    #[error("Constraint has no variables")]
    NoVariables,
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Variable strength; weaker variables give way first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Strength(pub i32);

impl Strength {
    pub const VERY_WEAK: Strength = Strength(0);
    pub const WEAK: Strength = Strength(10);
    pub const NORMAL: Strength = Strength(20);
    pub const STRONG: Strength = Strength(30);
    pub const VERY_STRONG: Strength = Strength(40);
    pub const REQUIRED: Strength = Strength(100);
}

impl Default for Strength {
    fn default() -> Self {
        Strength::NORMAL
    }
}

/// A numeric value managed by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub value: f64,
    pub strength: Strength,
}

impl Variable {
    pub fn new(value: f64, strength: Strength) -> Self {
        Self { value, strength }
    }
}

/// Index of a variable in its solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

/// Index of a constraint in its solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(usize);

#[derive(Debug, Clone)]
struct Entry {
    constraint: Constraint,
    variables: Vec<VarId>,
    /// Variables of the lowest strength; the first one is solved for.
    weakest: Vec<VarId>,
}

impl Entry {
    fn new(constraint: Constraint, vars: &[Variable]) -> Self {
        let variables = constraint.variables();
        let min = variables
            .iter()
            .map(|v| vars[v.0].strength)
            .min()
            .unwrap_or_default();
        let weakest = variables
            .iter()
            .copied()
            .filter(|v| vars[v.0].strength == min)
            .collect();
        Self {
            constraint,
            variables,
            weakest,
        }
    }

    /// A variable that was just set goes to the back of the weakest list.
    fn mark_dirty(&mut self, var: VarId) {
        if self.weakest.first() == Some(&var) {
            self.weakest.remove(0);
            self.weakest.push(var);
        }
    }
}

/// Constraint solver.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    variables: Vec<Variable>,
    constraints: Vec<Option<Entry>>,
    marked: Vec<ConstraintId>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a variable.
    pub fn add_variable(&mut self, value: f64, strength: Strength) -> VarId {
        self.variables.push(Variable::new(value, strength));
        VarId(self.variables.len() - 1)
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    pub fn value(&self, id: VarId) -> Option<f64> {
        self.variable(id).map(|v| v.value)
    }

    /// Set a variable from outside and mark the constraints that hold it.
    pub fn set_value(&mut self, id: VarId, value: f64) -> SolverResult<()> {
        let var = self
            .variables
            .get_mut(id.0)
            .ok_or(SolverError::UnknownVariable(id))?;
        var.value = value;
        self.notify(id);
        Ok(())
    }

    /// Add a constraint; it is marked for the next solve.
    pub fn add_constraint(&mut self, mut constraint: Constraint) -> SolverResult<ConstraintId> {
        let count = self.prepare(&mut constraint)?;
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Some(Entry::new(constraint, &self.variables)));
        self.request_resolve(id);
        log::debug!("Added constraint {:?} over {} variable(s)", id, count);
        Ok(id)
    }

    /// Swap a live constraint for another, keeping its id. The new
    /// constraint is marked for the next solve.
    pub fn replace_constraint(&mut self, id: ConstraintId, mut constraint: Constraint) -> SolverResult<()> {
        if self.entry(id).is_none() {
            return Err(SolverError::UnknownConstraint(id));
        }
        self.prepare(&mut constraint)?;
        self.constraints[id.0] = Some(Entry::new(constraint, &self.variables));
        self.request_resolve(id);
        Ok(())
    }

    /// Check a constraint's variables and fill in derived state.
    fn prepare(&self, constraint: &mut Constraint) -> SolverResult<usize> {
        let variables = constraint.variables();
        if variables.is_empty() {
            return Err(SolverError::NoVariables);
        }
        if let Some(&missing) = variables.iter().find(|v| v.0 >= self.variables.len()) {
            return Err(SolverError::UnknownVariable(missing));
        }
        constraint.init_state(&self.variables);
        Ok(variables.len())
    }

    /// Remove a constraint, returning it.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Constraint> {
        let entry = self.constraints.get_mut(id.0)?.take()?;
        self.marked.retain(|&c| c != id);
        Some(entry.constraint)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.entry(id).map(|e| &e.constraint)
    }

    /// Number of live constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.iter().flatten().count()
    }

    /// Constraints that hold `var`.
    pub fn constraints_with_variable(&self, var: VarId) -> impl Iterator<Item = ConstraintId> + '_ {
        self.constraints
            .iter()
            .enumerate()
            .filter_map(move |(i, e)| {
                e.as_ref()
                    .filter(|e| e.variables.contains(&var))
                    .map(|_| ConstraintId(i))
            })
    }

    /// The variable the constraint will be solved for next.
    pub fn weakest(&self, id: ConstraintId) -> Option<VarId> {
        self.entry(id).and_then(|e| e.weakest.first().copied())
    }

    /// Recompute a balance/line constraint's stored proportions from the
    /// current values.
    pub fn refresh_constraint(&mut self, id: ConstraintId) -> SolverResult<()> {
        let entry = self
            .constraints
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SolverError::UnknownConstraint(id))?;
        entry.constraint.refresh_state(&self.variables);
        Ok(())
    }

    /// Mark a constraint for the next solve.
    pub fn request_resolve(&mut self, id: ConstraintId) {
        if !self.marked.contains(&id) {
            self.marked.push(id);
        }
    }

    /// Whether any constraint is waiting to be solved.
    pub fn needs_solve(&self) -> bool {
        !self.marked.is_empty()
    }

    /// Solve all marked constraints. Returns how many were solved.
    pub fn solve(&mut self) -> usize {
        let mut n = 0;
        while n < self.marked.len() {
            let id = self.marked[n];
            n += 1;

            let Some(entry) = self.constraints.get(id.0).and_then(Option::as_ref) else {
                continue;
            };
            let Some(&weakest) = entry.weakest.first() else {
                continue;
            };
            let changed = entry.constraint.solve_for(weakest, &mut self.variables);
            for var in changed {
                self.notify(var);
            }
        }
        self.marked.clear();
        n
    }

    fn entry(&self, id: ConstraintId) -> Option<&Entry> {
        self.constraints.get(id.0).and_then(Option::as_ref)
    }

    /// A variable changed: update weakest lists and mark its constraints.
    fn notify(&mut self, var: VarId) {
        let ids: Vec<ConstraintId> = self.constraints_with_variable(var).collect();
        for id in ids {
            if let Some(entry) = self.constraints[id.0].as_mut() {
                entry.mark_dirty(var);
            }
            self.request_resolve(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equals_solves_weakest() {
        let mut solver = Solver::new();
        let a = solver.add_variable(1.0, Strength::STRONG);
        let b = solver.add_variable(2.0, Strength::WEAK);
        let c = solver.add_constraint(Constraint::equals(a, b)).unwrap();
        assert_eq!(solver.weakest(c), Some(b));

        solver.solve();
        assert_eq!(solver.value(a), Some(1.0));
        assert_eq!(solver.value(b), Some(1.0));

        // The strong variable always wins, even when the weak one was edited.
        solver.set_value(b, 5.0).unwrap();
        solver.solve();
        assert_eq!(solver.value(a), Some(1.0));
        assert_eq!(solver.value(b), Some(1.0));
    }

    #[test]
    fn test_edited_variable_is_kept() {
        let mut solver = Solver::new();
        let a = solver.add_variable(1.0, Strength::NORMAL);
        let b = solver.add_variable(2.0, Strength::NORMAL);
        solver.add_constraint(Constraint::equals(a, b)).unwrap();
        solver.solve();
        assert_eq!(solver.value(a), Some(2.0));

        solver.set_value(a, 7.0).unwrap();
        solver.solve();
        assert_eq!(solver.value(a), Some(7.0));
        assert_eq!(solver.value(b), Some(7.0));

        solver.set_value(b, 3.0).unwrap();
        solver.solve();
        assert_eq!(solver.value(a), Some(3.0));
        assert_eq!(solver.value(b), Some(3.0));
    }

    #[test]
    fn test_propagation_through_chain() {
        let mut solver = Solver::new();
        let a = solver.add_variable(0.0, Strength::STRONG);
        let b = solver.add_variable(0.0, Strength::NORMAL);
        let c = solver.add_variable(0.0, Strength::WEAK);
        solver.add_constraint(Constraint::equals(a, b)).unwrap();
        solver.add_constraint(Constraint::equals(b, c)).unwrap();
        solver.solve();

        solver.set_value(a, 4.0).unwrap();
        solver.solve();
        assert_eq!(solver.value(b), Some(4.0));
        assert_eq!(solver.value(c), Some(4.0));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut solver = Solver::new();
        let a = solver.add_variable(1.0, Strength::NORMAL);
        let b = solver.add_variable(2.0, Strength::NORMAL);
        let c = solver.add_variable(3.0, Strength::NORMAL);
        solver.add_constraint(Constraint::equals(a, b)).unwrap();
        solver.add_constraint(Constraint::equals(b, c)).unwrap();
        solver.add_constraint(Constraint::equals(c, a)).unwrap();
        assert_eq!(solver.solve(), 3);
        assert!(!solver.needs_solve());
    }

    #[test]
    fn test_less_than_pushes_other_side() {
        // `right` is weakest, so dragging it too far pushes `left` along.
        let mut solver = Solver::new();
        let left = solver.add_variable(0.0, Strength::STRONG);
        let right = solver.add_variable(100.0, Strength::NORMAL);
        let c = solver.add_constraint(Constraint::less_than(left, right, 10.0)).unwrap();
        assert_eq!(solver.weakest(c), Some(right));
        solver.solve();
        assert_eq!(solver.value(left), Some(0.0));

        solver.set_value(right, 4.0).unwrap();
        solver.solve();
        assert_eq!(solver.value(left), Some(-6.0));
        assert_eq!(solver.value(right), Some(4.0));
    }

    #[test]
    fn test_line_constraint_in_solver() {
        let mut solver = Solver::new();
        let sx = solver.add_variable(0.0, Strength::STRONG);
        let sy = solver.add_variable(0.0, Strength::STRONG);
        let ex = solver.add_variable(30.0, Strength::STRONG);
        let ey = solver.add_variable(20.0, Strength::STRONG);
        let px = solver.add_variable(15.0, Strength::WEAK);
        let py = solver.add_variable(4.0, Strength::WEAK);
        solver
            .add_constraint(Constraint::line((sx, sy), (ex, ey), (px, py)))
            .unwrap();
        solver.solve();

        solver.set_value(ex, 40.0).unwrap();
        solver.set_value(ey, 30.0).unwrap();
        solver.solve();
        assert!((solver.value(px).unwrap() - 20.0).abs() < EPSILON);
        assert!((solver.value(py).unwrap() - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_refresh_constraint() {
        let mut solver = Solver::new();
        let b1 = solver.add_variable(0.0, Strength::STRONG);
        let b2 = solver.add_variable(10.0, Strength::STRONG);
        let v = solver.add_variable(2.0, Strength::WEAK);
        let c = solver.add_constraint(Constraint::balance((b1, b2), v)).unwrap();
        solver.solve();

        solver.set_value(b2, 20.0).unwrap();
        solver.solve();
        assert!((solver.value(v).unwrap() - 4.0).abs() < EPSILON);

        // Re-base the balance at the current position, then move the band.
        solver.set_value(v, 10.0).unwrap();
        solver.refresh_constraint(c).unwrap();
        solver.set_value(b2, 40.0).unwrap();
        solver.solve();
        assert!((solver.value(v).unwrap() - 20.0).abs() < EPSILON);
    }

    #[test]
    fn test_remove_constraint() {
        let mut solver = Solver::new();
        let a = solver.add_variable(1.0, Strength::NORMAL);
        let b = solver.add_variable(2.0, Strength::NORMAL);
        let c = solver.add_constraint(Constraint::equals(a, b)).unwrap();
        assert_eq!(solver.constraint_count(), 1);
        assert_eq!(solver.constraints_with_variable(a).collect::<Vec<_>>(), vec![c]);

        assert!(solver.remove_constraint(c).is_some());
        assert_eq!(solver.constraint_count(), 0);
        assert_eq!(solver.constraints_with_variable(a).count(), 0);
        assert_eq!(solver.solve(), 0);
        assert_eq!(solver.value(a), Some(1.0));
        assert!(solver.remove_constraint(c).is_none());
    }

    #[test]
    fn test_replace_constraint_keeps_id() {
        let mut solver = Solver::new();
        let a = solver.add_variable(1.0, Strength::STRONG);
        let b = solver.add_variable(2.0, Strength::STRONG);
        let c = solver.add_variable(0.0, Strength::WEAK);
        let id = solver.add_constraint(Constraint::equals(a, c)).unwrap();
        solver.solve();
        assert_eq!(solver.value(c), Some(1.0));

        solver.replace_constraint(id, Constraint::equals(b, c)).unwrap();
        assert_eq!(solver.constraint_count(), 1);
        solver.solve();
        assert_eq!(solver.value(c), Some(2.0));
        assert_eq!(solver.constraints_with_variable(a).count(), 0);

        solver.remove_constraint(id);
        assert_eq!(
            solver.replace_constraint(id, Constraint::equals(a, c)),
            Err(SolverError::UnknownConstraint(id))
        );
    }

    #[test]
    fn test_add_constraint_errors() {
        let mut solver = Solver::new();
        let a = solver.add_variable(1.0, Strength::NORMAL);
        let ghost = VarId(42);
        assert_eq!(
            solver.add_constraint(Constraint::equals(a, ghost)).unwrap_err(),
            SolverError::UnknownVariable(ghost)
        );
        assert_eq!(
            solver.add_constraint(Constraint::equation(|_| 0.0, vec![])).unwrap_err(),
            SolverError::NoVariables
        );
        assert_eq!(solver.set_value(ghost, 1.0), Err(SolverError::UnknownVariable(ghost)));
    }
}
