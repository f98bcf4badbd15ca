//! Opportunistic Newton acceleration.
//!
//! When the oracle can supply gradient and Hessian information, a full
//! second-order step often reaches the neighborhood of a minimum in a
//! fraction of the iterations the coordinate search needs. The accelerator
//! attempts such a step on the engine's schedule: solve `H * d = -g`, try the
//! full step, and fall back to a backtracking line search along `d` when the
//! full step is infeasible or not improving.
//!
//! The attempt is never mandatory and never blocking. A Hessian that is not
//! positive definite, a singular solve or a failed line search are all
//! ordinary outcomes that simply hand the tick back to the coordinate search.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, DimName, Dyn, OMatrix, OVector, U1};

use crate::core::{IterationState, Oracle, RealField};

/// Options for the [`NewtonAccelerator`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct NewtonOptions<T: RealField + Copy> {
    /// Smallest fraction of the full Newton step that the line search is
    /// allowed to try. Default: `1e-10`.
    fraction_min: T,
    /// Relative improvement below which the line search gives up refining
    /// further. Default: `0.01`.
    improvement_floor: T,
}

impl<T: RealField + Copy> Default for NewtonOptions<T> {
    fn default() -> Self {
        Self {
            fraction_min: convert(1e-10),
            improvement_floor: convert(0.01),
        }
    }
}

/// Newton step accelerator.
///
/// See [module](self) documentation for more details.
pub struct NewtonAccelerator<T: RealField + Copy> {
    options: NewtonOptions<T>,
    g: OVector<T, Dyn>,
    h: OMatrix<T, Dyn, Dyn>,
}

impl<T: RealField + Copy> NewtonAccelerator<T> {
    /// Initializes the accelerator with default options.
    pub fn new(dim: usize) -> Self {
        Self::with_options(dim, NewtonOptions::default())
    }

    /// Initializes the accelerator with given options.
    pub fn with_options(dim: usize, options: NewtonOptions<T>) -> Self {
        let dim = Dyn(dim);

        Self {
            options,
            g: OVector::zeros_generic(dim, U1::name()),
            h: OMatrix::zeros_generic(dim, dim),
        }
    }

    /// Attempts one Newton step, committing it to `state` when accepted.
    ///
    /// Returns false when the Hessian is not positive definite or no feasible
    /// improving fraction of the step exists. Both are normal "Newton not
    /// applicable here" outcomes; the caller falls back to the ordinary
    /// sweep.
    ///
    /// The caller is responsible for checking
    /// [`has_second_order`](Oracle::has_second_order) beforehand.
    pub fn try_step<O>(&mut self, oracle: &O, state: &mut IterationState<T>) -> bool
    where
        O: Oracle<Field = T>,
    {
        if state.dim() == 0 {
            return false;
        }

        oracle.gradient(&state.x, &mut self.g);
        oracle.hessian(&state.x, &mut self.h);

        let d = match oracle.solve_positive_definite(&self.h, &self.g) {
            Some(d) => d,
            None => {
                debug!("failed to solve the Newton step");
                return false;
            }
        };

        // Try the full step first.
        let x2 = &state.x + &d;
        let y2 = oracle.evaluate(&x2);

        if y2 < state.y && oracle.is_feasible(&x2) {
            debug!("full Newton step accepted, fx = {}", y2);
            state.x = x2;
            state.y = y2;
            return true;
        }

        // The full step was already tried, so backtrack from one half.
        let half: T = convert(0.5);

        match oracle.line_search(
            &state.x,
            &d,
            true,
            self.options.fraction_min,
            half,
            self.options.improvement_floor,
            state.y,
        ) {
            Some((fraction, value)) => {
                debug!(
                    "fractional Newton step accepted, fraction = {}, fx = {}",
                    fraction, value
                );
                state.x.axpy(fraction, &d, T::one());
                state.y = value;
                true
            }
            None => {
                debug!("no improving fraction of the Newton step");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DVector;

    use crate::testing::{ExactParaboloid, SaddleSurface};

    fn state_for<O: Oracle<Field = f64>>(oracle: &O, x: Vec<f64>) -> IterationState<f64> {
        let x = DVector::from_vec(x);
        let y = oracle.evaluate(&x);
        IterationState::new(x, y)
    }

    #[test]
    fn quadratic_is_solved_in_one_step() {
        let f = ExactParaboloid::new(vec![3.0, -1.0]);
        let mut newton = NewtonAccelerator::new(2);
        let mut state = state_for(&f, vec![0.0, 0.0]);

        assert!(newton.try_step(&f, &mut state));
        assert_relative_eq!(state.x[0], 3.0, max_relative = 1e-9);
        assert_relative_eq!(state.x[1], -1.0, max_relative = 1e-9);
        assert!(state.y < 1e-12);
    }

    #[test]
    fn indefinite_hessian_is_a_non_event() {
        let f = SaddleSurface::new();
        let mut newton = NewtonAccelerator::new(2);
        let mut state = state_for(&f, vec![1.0, 1.0]);
        let x0 = state.x.clone();
        let y0 = state.y;

        assert!(!newton.try_step(&f, &mut state));
        assert_eq!(state.x, x0);
        assert_eq!(state.y, y0);
    }

    #[test]
    fn infeasible_full_step_backtracks_to_the_boundary() {
        let f = ExactParaboloid::new(vec![3.0, 0.0]).with_bounds(vec![-5.0, -5.0], vec![1.5, 5.0]);
        let mut newton = NewtonAccelerator::new(2);
        let mut state = state_for(&f, vec![0.0, 0.0]);

        // The full Newton step lands on (3, 0), outside the bounds; half of
        // it lands on the boundary.
        assert!(newton.try_step(&f, &mut state));
        assert_relative_eq!(state.x[0], 1.5, max_relative = 1e-9);
        assert_eq!(state.x[1], 0.0);
        assert!(f.is_feasible(&state.x));
    }
}
