//! Constraint kinds.
//!
//! Each constraint is solved *for* one variable: that variable is updated so
//! the constraint holds again, the others are left alone.

use super::{VarId, Variable};
use std::fmt;
use std::sync::Arc;

/// Values closer than this are considered equal.
pub const EPSILON: f64 = 1e-6;

/// Iteration limit for the equation solver.
pub const EQUATION_ITERATION_LIMIT: usize = 1000;

/// Extra passes once the equation solver is within `EPSILON`.
const EQUATION_CLOSE_RUNS: usize = 10;

pub fn equals(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Function for an [`Constraint::Equation`]; receives argument values in order.
#[derive(Clone)]
pub struct EquationFn(Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>);

impl EquationFn {
    pub fn new(f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[f64]) -> f64 {
        (self.0)(args)
    }
}

impl fmt::Debug for EquationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EquationFn")
    }
}

/// A constraint between solver variables.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `a == b`.
    Equals { a: VarId, b: VarId },
    /// `center == (a + b) / 2`.
    Center { a: VarId, b: VarId, center: VarId },
    /// `smaller <= bigger - delta`. The variable solved for is the one moved
    /// last, so the *other* one is adjusted.
    LessThan { smaller: VarId, bigger: VarId, delta: f64 },
    /// `f(args) == 0`.
    Equation { f: EquationFn, args: Vec<VarId> },
    /// `v` keeps its relative position inside `band`.
    Balance {
        band: (VarId, VarId),
        v: VarId,
        /// Computed from current values when the constraint is added, if unset.
        balance: Option<f64>,
    },
    /// A point keeps its x/y ratios along a line.
    Line {
        start: (VarId, VarId),
        end: (VarId, VarId),
        point: (VarId, VarId),
        /// Computed from current values when the constraint is added, if unset.
        ratio: Option<(f64, f64)>,
    },
}

impl Constraint {
    pub fn equals(a: VarId, b: VarId) -> Self {
        Constraint::Equals { a, b }
    }

    pub fn center(a: VarId, b: VarId, center: VarId) -> Self {
        Constraint::Center { a, b, center }
    }

    pub fn less_than(smaller: VarId, bigger: VarId, delta: f64) -> Self {
        Constraint::LessThan { smaller, bigger, delta }
    }

    pub fn equation(f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static, args: Vec<VarId>) -> Self {
        Constraint::Equation {
            f: EquationFn::new(f),
            args,
        }
    }

    pub fn balance(band: (VarId, VarId), v: VarId) -> Self {
        Constraint::Balance { band, v, balance: None }
    }

    pub fn line(start: (VarId, VarId), end: (VarId, VarId), point: (VarId, VarId)) -> Self {
        Constraint::Line {
            start,
            end,
            point,
            ratio: None,
        }
    }

    /// Line constraint with fixed x/y ratios instead of ratios taken from
    /// the current values.
    pub fn line_at(start: (VarId, VarId), end: (VarId, VarId), point: (VarId, VarId), ratio: (f64, f64)) -> Self {
        Constraint::Line {
            start,
            end,
            point,
            ratio: Some(ratio),
        }
    }

    /// All variables held by this constraint, in declaration order.
    pub fn variables(&self) -> Vec<VarId> {
        match self {
            Constraint::Equals { a, b } => vec![*a, *b],
            Constraint::Center { a, b, center } => vec![*a, *b, *center],
            Constraint::LessThan { smaller, bigger, .. } => vec![*smaller, *bigger],
            Constraint::Equation { args, .. } => args.clone(),
            Constraint::Balance { band, v, .. } => vec![band.0, band.1, *v],
            Constraint::Line { start, end, point, .. } => {
                vec![start.0, start.1, end.0, end.1, point.0, point.1]
            }
        }
    }

    /// Compute balance/ratio state that was left unset.
    pub(crate) fn init_state(&mut self, vars: &[Variable]) {
        match self {
            Constraint::Balance { band, v, balance } if balance.is_none() => {
                *balance = Some(balance_of(vars, *band, *v));
            }
            Constraint::Line { start, end, point, ratio } if ratio.is_none() => {
                *ratio = Some(ratio_of(vars, *start, *end, *point));
            }
            _ => {}
        }
    }

    /// Recompute balance/ratio state from the current values.
    pub(crate) fn refresh_state(&mut self, vars: &[Variable]) {
        match self {
            Constraint::Balance { band, v, balance } => {
                *balance = Some(balance_of(vars, *band, *v));
            }
            Constraint::Line { start, end, point, ratio } => {
                *ratio = Some(ratio_of(vars, *start, *end, *point));
            }
            _ => {}
        }
    }

    /// Solve for `var`, updating `vars`. Returns the variables that changed.
    pub(crate) fn solve_for(&self, var: VarId, vars: &mut [Variable]) -> Vec<VarId> {
        let mut changed = Vec::new();

        match self {
            Constraint::Equals { a, b } => {
                let (va, vb) = (vars[a.0].value, vars[b.0].value);
                if !equals(va, vb) {
                    if var == *a {
                        assign(vars, &mut changed, *a, vb);
                    } else if var == *b {
                        assign(vars, &mut changed, *b, va);
                    }
                }
            }
            Constraint::Center { a, b, center } => {
                let v = (vars[a.0].value + vars[b.0].value) / 2.0;
                if !equals(vars[center.0].value, v) {
                    assign(vars, &mut changed, *center, v);
                }
            }
            Constraint::LessThan { smaller, bigger, delta } => {
                let (vs, vb) = (vars[smaller.0].value, vars[bigger.0].value);
                if vs > vb - delta {
                    if var == *smaller {
                        assign(vars, &mut changed, *bigger, vs + delta);
                    } else if var == *bigger {
                        assign(vars, &mut changed, *smaller, vb - delta);
                    }
                }
            }
            Constraint::Equation { f, args } => {
                if let Some(index) = args.iter().position(|a| *a == var) {
                    let mut values: Vec<f64> = args.iter().map(|a| vars[a.0].value).collect();
                    let solved = solve_equation(f, &mut values, index);
                    if vars[var.0].value != solved {
                        assign(vars, &mut changed, var, solved);
                    }
                }
            }
            Constraint::Balance { band, balance, .. } => {
                let (b1, b2) = (vars[band.0 .0].value, vars[band.1 .0].value);
                let value = b1 + (b2 - b1) * balance.unwrap_or(0.0);
                if !equals(vars[var.0].value, value) {
                    assign(vars, &mut changed, var, value);
                }
            }
            Constraint::Line { start, end, point, ratio } => {
                let (rx, ry) = ratio.unwrap_or((0.0, 0.0));
                let (sx, sy) = (vars[start.0 .0].value, vars[start.1 .0].value);
                let (ex, ey) = (vars[end.0 .0].value, vars[end.1 .0].value);
                let x = sx + (ex - sx) * rx;
                let y = sy + (ey - sy) * ry;
                if !equals(vars[point.0 .0].value, x) {
                    assign(vars, &mut changed, point.0, x);
                }
                if !equals(vars[point.1 .0].value, y) {
                    assign(vars, &mut changed, point.1, y);
                }
            }
        }

        changed
    }
}

fn assign(vars: &mut [Variable], changed: &mut Vec<VarId>, id: VarId, value: f64) {
    vars[id.0].value = value;
    changed.push(id);
}

fn balance_of(vars: &[Variable], band: (VarId, VarId), v: VarId) -> f64 {
    let (b1, b2) = (vars[band.0 .0].value, vars[band.1 .0].value);
    let w = b2 - b1;
    if w != 0.0 {
        (vars[v.0].value - b1) / w
    } else {
        0.0
    }
}

fn ratio_of(vars: &[Variable], start: (VarId, VarId), end: (VarId, VarId), point: (VarId, VarId)) -> (f64, f64) {
    let ratio = |s: VarId, e: VarId, p: VarId| {
        let w = vars[e.0].value - vars[s.0].value;
        if w != 0.0 {
            (vars[p.0].value - vars[s.0].value) / w
        } else {
            0.0
        }
    };
    (ratio(start.0, end.0, point.0), ratio(start.1, end.1, point.1))
}

/// Secant-method solve of `f(values) == 0` for `values[index]`.
///
/// Returns the current value unchanged when the iteration leaves the finite
/// range.
fn solve_equation(f: &EquationFn, values: &mut [f64], index: usize) -> f64 {
    let original = values[index];
    let mut x0 = if values[index] != 0.0 { values[index] } else { 1.0 };
    let mut x1 = x0 * 1.1;
    let mut eval = |x: f64| {
        values[index] = x;
        f.call(values)
    };

    let mut fx0 = eval(x0);
    let mut close_runs = EQUATION_CLOSE_RUNS;
    let mut n = 0;
    loop {
        let fx1 = eval(x1);
        if !fx0.is_finite() || !fx1.is_finite() {
            log::warn!("Equation diverged after {} iterations", n);
            return original;
        }
        if fx1 == 0.0 || x1 == x0 {
            break;
        }
        let close = (fx1 - fx0).abs() < EPSILON;
        if close {
            if close_runs == 0 {
                break;
            }
            close_runs -= 1;
        }
        if n > EQUATION_ITERATION_LIMIT {
            log::warn!("Equation failed to converge after {} iterations", n);
            break;
        }
        let slope = (fx1 - fx0) / (x1 - x0);
        if slope == 0.0 {
            if !close {
                log::warn!("Equation has zero slope and is not close to a solution");
            }
            break;
        }
        let x2 = x0 - fx0 / slope;
        fx0 = fx1;
        x0 = x1;
        x1 = x2;
        n += 1;
    }
    if x1.is_finite() { x1 } else { original }
}
