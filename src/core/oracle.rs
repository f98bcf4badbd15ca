//! The capability interface between the engine and the objective function.

use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    Cholesky, ComplexField as _, Dyn, IsContiguous, OMatrix, OVector, Vector,
};
use num_traits::Zero;

use crate::core::base::RealField;

/// Black-box evaluator of the objective function.
///
/// The oracle is the only channel through which the engine sees the problem:
/// it returns the (sign-adjusted-for-minimization) objective value, tests
/// feasibility and optionally supplies derivative information. The engine
/// never knows where the values come from.
///
/// Only [`evaluate`](Oracle::evaluate) and [`is_feasible`](Oracle::is_feasible)
/// are required. Derivatives default to forward finite differences of the
/// objective, the positive-definite solve defaults to a Cholesky
/// decomposition and the line search defaults to a backtracking loop that
/// halves the step fraction. Implementations with cheaper or exact
/// alternatives can override any of them.
pub trait Oracle {
    /// Type of the scalar, usually f64 or f32.
    type Field: RealField + Copy;

    /// Calculates the objective value in given point.
    ///
    /// The value must be sign-adjusted so that the engine always minimizes:
    /// an oracle for a maximization problem returns the negated objective.
    /// NaN is allowed and is treated as "no improvement".
    fn evaluate<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;

    /// Tests bound and inequality constraint feasibility of given point.
    fn is_feasible<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;

    /// Reports whether gradient and Hessian information is worth computing
    /// for this objective.
    ///
    /// When false, the engine never calls [`gradient`](Oracle::gradient) or
    /// [`hessian`](Oracle::hessian) and relies purely on the coordinate
    /// search.
    fn has_second_order(&self) -> bool {
        false
    }

    /// Computes the gradient of the objective in given point.
    ///
    /// The default implementation uses forward differences with a relative
    /// step of [`EPSILON_FD`](RealField::EPSILON_FD).
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        let eps = Self::Field::EPSILON_FD;
        let y0 = self.evaluate(x);
        let mut x2 = x.clone_owned();

        for i in 0..x.nrows() {
            let xi = x2[i];
            let dx = if xi == Self::Field::zero() {
                eps
            } else {
                xi.abs() * eps
            };

            x2[i] = xi + dx;
            let y1 = self.evaluate(&x2);
            g[i] = (y1 - y0) / dx;
            x2[i] = xi;
        }
    }

    /// Computes the Hessian matrix of the objective in given point.
    ///
    /// The default implementation takes forward differences of
    /// [`gradient`](Oracle::gradient), row by row, with the wider
    /// second-order step [`EPSILON_CBRT`](RealField::EPSILON_CBRT). The
    /// result is not exactly symmetric; consumers that require symmetry
    /// should read one triangle.
    fn hessian<Sx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        h: &mut OMatrix<Self::Field, Dyn, Dyn>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let eps = Self::Field::EPSILON_CBRT;
        let mut x2 = x.clone_owned();
        let mut g0 = x.clone_owned();
        let mut gi = x.clone_owned();

        self.gradient(x, &mut g0);

        for i in 0..x.nrows() {
            let xi = x2[i];
            let dx = if xi == Self::Field::zero() {
                eps
            } else {
                xi.abs() * eps
            };

            x2[i] = xi + dx;
            self.gradient(&x2, &mut gi);
            x2[i] = xi;

            for j in 0..x.nrows() {
                h[(i, j)] = (gi[j] - g0[j]) / dx;
            }
        }
    }

    /// Solves `H * d = -g` for a symmetric positive-definite `H`.
    ///
    /// Returns `None` when the matrix is not positive definite. That is a
    /// normal "Newton not applicable here" outcome, not an error.
    fn solve_positive_definite(
        &self,
        h: &OMatrix<Self::Field, Dyn, Dyn>,
        g: &OVector<Self::Field, Dyn>,
    ) -> Option<OVector<Self::Field, Dyn>> {
        let cholesky = Cholesky::new(h.clone())?;

        let mut rhs = g.clone_owned();
        rhs.neg_mut();

        Some(cholesky.solve(&rhs))
    }

    /// Backtracking line search along `direction` from `x`, whose objective
    /// value is `y`.
    ///
    /// The fraction of the full step is halved from `fraction_max` down
    /// towards `fraction_min`. A candidate is recorded when it strictly
    /// improves on the best value seen so far and, if `feasibility_required`,
    /// satisfies the constraints. A recorded fraction above 3/4 ends the
    /// search immediately (a near-full step is preferred over further
    /// probing); a relative improvement below `improvement_floor` makes the
    /// search give up refining further.
    ///
    /// Returns the best `(fraction, value)` found, or `None` when no
    /// fraction improved.
    fn line_search<Sx, Sd>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        direction: &Vector<Self::Field, Dyn, Sd>,
        feasibility_required: bool,
        fraction_min: Self::Field,
        fraction_max: Self::Field,
        improvement_floor: Self::Field,
        y: Self::Field,
    ) -> Option<(Self::Field, Self::Field)>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sd: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let half: Self::Field = convert(0.5);
        let near_full: Self::Field = convert(0.75);

        let mut x2 = x.clone_owned();
        let mut best = None;
        let mut y_best = y;
        let mut fraction = fraction_max;

        while fraction > fraction_min {
            x2.copy_from(direction);
            x2 *= fraction;
            x2 += x;

            let y2 = self.evaluate(&x2);

            if y2 < y_best && (!feasibility_required || self.is_feasible(&x2)) {
                let improvement = y_best - y2;
                best = Some((fraction, y2));

                if fraction > near_full || improvement <= improvement_floor * y_best.abs() {
                    break;
                }

                y_best = y2;
            }

            fraction *= half;
        }

        best
    }
}
