use nalgebra::{Dyn, OVector};

use crate::core::base::RealField;

/// Mutable state of one optimization run.
///
/// This is the single source of truth for the best point found so far. It is
/// mutated exclusively by the engine and its algorithm components, once per
/// accepted step, which preserves two invariants for the whole run: the
/// objective value never increases and the point stays feasible (or is the
/// caller-supplied feasible starting point before the first accepted step).
#[derive(Debug, Clone)]
pub struct IterationState<T: RealField + Copy> {
    /// Current point.
    pub x: OVector<T, Dyn>,
    /// Objective value in the current point.
    pub y: T,
    /// Number of ticks performed so far.
    pub iter: usize,
}

impl<T: RealField + Copy> IterationState<T> {
    /// Creates the state from an initial point and its objective value.
    pub fn new(x: OVector<T, Dyn>, y: T) -> Self {
        Self { x, y, iter: 0 }
    }

    /// Gets the number of variables.
    pub fn dim(&self) -> usize {
        self.x.nrows()
    }
}
