//! Rosenbrock rotating coordinate search.
//!
//! The [rotating coordinate
//! method](https://en.wikipedia.org/wiki/Rosenbrock_methods#Rosenbrock_search)
//! is a derivative-free optimization technique. It maintains a set of *n*
//! orthonormal search directions and, in each iteration, performs one
//! exploratory sweep: every direction is probed with an adaptive step size
//! that grows while probes succeed and shrinks and reverses when they fail.
//! After a sweep that made progress, the direction set is rotated so that the
//! first direction points along the accumulated displacement, which lets the
//! search follow curved valleys.
//!
//! # References
//!
//! \[1\] [An Automatic Method for Finding the Greatest or Least Value of a
//! Function](https://doi.org/10.1093/comjnl/3.3.175)
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, DimName, Dyn, OMatrix, OVector, U1};

use crate::core::{IterationState, Oracle, ProblemSpec, RealField};

/// Exploration progress of one axis within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisFlag {
    /// No probe along this axis succeeded yet.
    Unstarted,
    /// At least one probe succeeded and the step size is growing.
    Expanding,
    /// A probe failed after the axis had been expanding.
    Exhausted,
}

/// Options for the [`DirectionSet`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct DirectionSetOptions<T: RealField + Copy> {
    /// Growth factor applied to a step size after a successful probe.
    /// Default: `3`.
    growth: T,
    /// Shrink-and-reverse factor applied to a step size after a failed probe.
    /// Default: `-0.5`.
    shrink: T,
    /// Scale applied to the per-variable magnitude estimate to obtain the
    /// initial step sizes. Default: `0.1`.
    step_scale: T,
}

impl<T: RealField + Copy> Default for DirectionSetOptions<T> {
    fn default() -> Self {
        Self {
            growth: convert(3.0),
            shrink: convert(-0.5),
            step_scale: convert(0.1),
        }
    }
}

/// The set of search directions used by the exploratory sweep.
///
/// Owns the n×n matrix of direction vectors (rows), the per-direction step
/// sizes and the per-axis exploration flags. The set starts as the identity
/// basis and is rotated in place after every productive sweep; the engine
/// periodically [resets](DirectionSet::reset) it to counter numerical drift.
///
/// See [module](self) documentation for more details.
pub struct DirectionSet<T: RealField + Copy> {
    options: DirectionSetOptions<T>,
    dirs: OMatrix<T, Dyn, Dyn>,
    steps: OVector<T, Dyn>,
    flags: Vec<AxisFlag>,
    x2: OVector<T, Dyn>,
    dx: OVector<T, Dyn>,
    accum: OMatrix<T, Dyn, Dyn>,
    partial: OVector<T, Dyn>,
}

impl<T: RealField + Copy> DirectionSet<T> {
    /// Initializes the direction set with default options.
    pub fn new(spec: &ProblemSpec<T>) -> Self {
        Self::with_options(spec, DirectionSetOptions::default())
    }

    /// Initializes the direction set with given options.
    ///
    /// The basis starts as the identity and the initial step sizes are
    /// derived from the per-variable magnitude estimates of the problem.
    pub fn with_options(spec: &ProblemSpec<T>, options: DirectionSetOptions<T>) -> Self {
        let n = spec.dim();
        let dim = Dyn(n);

        let mut steps = spec.magnitudes();
        steps *= options.step_scale;

        Self {
            options,
            dirs: OMatrix::identity_generic(dim, dim),
            steps,
            flags: vec![AxisFlag::Unstarted; n],
            x2: OVector::zeros_generic(dim, U1::name()),
            dx: OVector::zeros_generic(dim, U1::name()),
            accum: OMatrix::zeros_generic(dim, dim),
            partial: OVector::zeros_generic(dim, U1::name()),
        }
    }

    /// Gets the number of directions.
    pub fn dim(&self) -> usize {
        self.steps.nrows()
    }

    /// Gets the matrix whose rows are the current search directions.
    pub fn directions(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.dirs
    }

    /// Gets the current per-direction step sizes.
    pub fn steps(&self) -> &OVector<T, Dyn> {
        &self.steps
    }

    /// Restores the identity basis, preserving the step sizes.
    pub fn reset(&mut self) {
        self.dirs.fill_with_identity();
    }

    /// Performs one exploratory sweep over all directions, committing every
    /// feasible strictly-improving candidate to `state`.
    ///
    /// Returns true when at least one probe strictly improved the objective,
    /// in which case the basis has been rotated towards the accumulated
    /// displacement.
    ///
    /// The sweep keeps cycling over the axes until every axis is exhausted or
    /// a safety cap of `n * mantissa bits` probes is hit. The cap guards
    /// against a non-deterministic objective that never lets the axes settle;
    /// hitting it ends the sweep early with whatever partial improvement
    /// occurred.
    pub fn sweep<O>(&mut self, oracle: &O, state: &mut IterationState<T>) -> bool
    where
        O: Oracle<Field = T>,
    {
        let n = self.dim();

        if n == 0 {
            return false;
        }

        let cap = n * T::MANTISSA_DIGITS as usize;
        let mut probes = 0;
        let mut exhausted = 0;
        let mut improved = false;
        let mut y = state.y;

        self.flags.fill(AxisFlag::Unstarted);
        self.dx.fill(T::zero());

        'sweep: while exhausted < n {
            for i in 0..n {
                if self.flags[i] == AxisFlag::Exhausted {
                    continue;
                }

                if probes >= cap {
                    debug!("safety cap of {} probes hit, ending sweep early", cap);
                    break 'sweep;
                }
                probes += 1;

                self.x2.copy_from(&state.x);
                for j in 0..n {
                    self.x2[j] += self.steps[i] * self.dirs[(i, j)];
                }

                // NaN compares false and lands in the failure branch.
                let y2 = oracle.evaluate(&self.x2);

                if y2 <= y && oracle.is_feasible(&self.x2) {
                    if y2 < y {
                        improved = true;
                        self.dx[i] += self.steps[i];
                        y = y2;
                        state.x.copy_from(&self.x2);
                    }

                    if self.flags[i] == AxisFlag::Unstarted {
                        self.flags[i] = AxisFlag::Expanding;
                    }

                    self.steps[i] *= self.options.growth;
                } else {
                    match self.flags[i] {
                        AxisFlag::Expanding => {
                            self.flags[i] = AxisFlag::Exhausted;
                            exhausted += 1;
                            self.steps[i] *= self.options.shrink;
                        }
                        AxisFlag::Unstarted => {
                            // Reverse the direction, still exploring.
                            self.steps[i] *= self.options.shrink;
                        }
                        AxisFlag::Exhausted => {
                            // Fine-tune a settled axis without flipping the
                            // sign.
                            self.steps[i] *= convert(0.5);
                        }
                    }
                }
            }
        }

        debug!(
            "sweep finished after {} probes, fx = {} -> {}",
            probes, state.y, y
        );

        state.y = y;

        if improved {
            self.rotate();
        }

        improved
    }

    /// Rotates the basis so that the first direction points along the net
    /// displacement of the last sweep.
    ///
    /// Uses the triangular Rosenbrock recurrence. Every division is guarded
    /// by a degenerate-denominator check; a guarded row is left unchanged
    /// rather than letting NaN or infinity propagate into the basis.
    fn rotate(&mut self) {
        let n = self.dim();

        // accum[j] = accum[j + 1] + dx[j] * dirs[j], accumulated backwards.
        for j in (0..n).rev() {
            for k in 0..n {
                let below = if j + 1 < n {
                    self.accum[(j + 1, k)]
                } else {
                    T::zero()
                };
                self.accum[(j, k)] = below + self.dx[j] * self.dirs[(j, k)];
            }
        }

        // partial[i] = sum of dx[k]^2 for k >= i.
        let mut sum = T::zero();
        for i in (0..n).rev() {
            sum += self.dx[i] * self.dx[i];
            self.partial[i] = sum;
        }

        for i in (1..n).rev() {
            let div = (self.partial[i - 1] * self.partial[i]).sqrt();

            if div.is_finite() && div != T::zero() {
                for k in 0..n {
                    self.dirs[(i, k)] = (self.dx[i - 1] * self.accum[(i, k)]
                        - self.dirs[(i - 1, k)] * self.partial[i])
                        / div;
                }
            } else {
                debug!("degenerate denominator, keeping direction {}", i);
            }
        }

        let norm = self.partial[0].sqrt();

        if norm.is_finite() && norm != T::zero() {
            for k in 0..n {
                self.dirs[(0, k)] = self.accum[(0, k)] / norm;
            }
        } else {
            debug!("degenerate displacement, keeping direction 0");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::{dvector, DVector};

    use crate::testing::{Counting, Paraboloid, Plateau};

    fn state_for<O: Oracle<Field = f64>>(oracle: &O, x: Vec<f64>) -> IterationState<f64> {
        let x = DVector::from_vec(x);
        let y = oracle.evaluate(&x);
        IterationState::new(x, y)
    }

    #[test]
    fn sweep_improves_quadratic() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut dirs = DirectionSet::new(&spec);
        let mut state = state_for(&f, vec![0.0, 0.0]);
        let y0 = state.y;

        assert!(dirs.sweep(&f, &mut state));
        assert!(state.y < y0);
    }

    #[test]
    fn rotation_rows_are_unit_norm() {
        let f = Paraboloid::new(vec![3.0, -1.0, 0.5]);
        let spec = f.spec();
        let mut dirs = DirectionSet::new(&spec);
        let mut state = state_for(&f, vec![0.0, 0.0, 0.0]);

        assert!(dirs.sweep(&f, &mut state));

        for i in 0..3 {
            let norm = dirs.directions().row(i).norm();
            assert_relative_eq!(norm, 1.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn noop_sweep_terminates_within_cap_and_keeps_state() {
        let f = Counting::new(Plateau::new(7.0));
        let spec = ProblemSpec::unconstrained(2);
        let mut dirs = DirectionSet::new(&spec);
        let mut state = state_for(&f, vec![1.0, 2.0]);

        let evaluations_before = f.evaluations();
        let improved = dirs.sweep(&f, &mut state);

        assert!(!improved);
        assert_eq!(state.x, dvector![1.0, 2.0]);
        assert_eq!(state.y, 7.0);
        assert!(f.evaluations() - evaluations_before <= 2 * f64::MANTISSA_DIGITS as usize);
    }

    #[test]
    fn worsening_neighbors_terminate_within_cap() {
        // Start exactly in the minimum: every probe fails.
        let f = Counting::new(Paraboloid::new(vec![1.0, 1.0]));
        let spec = ProblemSpec::unconstrained(2);
        let mut dirs = DirectionSet::new(&spec);
        let mut state = state_for(&f, vec![1.0, 1.0]);

        let improved = dirs.sweep(&f, &mut state);

        assert!(!improved);
        assert_eq!(state.x, dvector![1.0, 1.0]);
        assert!(f.evaluations() <= 1 + 2 * f64::MANTISSA_DIGITS as usize);
    }

    #[test]
    fn empty_problem_is_noop() {
        let f = Plateau::new(0.0);
        let spec = ProblemSpec::unconstrained(0);
        let mut dirs = DirectionSet::new(&spec);
        let mut state = IterationState::new(dvector![], 0.0);

        assert!(!dirs.sweep(&f, &mut state));
    }

    #[test]
    fn reset_preserves_step_sizes() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut dirs = DirectionSet::new(&spec);
        let mut state = state_for(&f, vec![0.0, 0.0]);

        dirs.sweep(&f, &mut state);
        let steps = dirs.steps().clone();

        dirs.reset();

        assert_eq!(dirs.steps(), &steps);
        assert!(dirs.directions().is_identity(0.0));
    }
}
