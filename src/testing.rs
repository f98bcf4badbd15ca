//! Testing objectives and utilities useful for benchmarking, debugging and
//! smoke testing.
//!
//! [`Paraboloid`] is recommended for first tests. Others exercise specific
//! conditions (indefinite Hessian, total absence of improvement).
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use std::cell::Cell;

use nalgebra::{
    storage::{Storage, StorageMut},
    DVector, Dyn, IsContiguous, OMatrix, Vector,
};

use crate::core::{Oracle, ProblemSpec};

/// Shifted sphere function \[1\]: the sum of squared distances from a center.
///
/// Smooth, convex and separable, with the global minimum 0 in the center.
/// Derivatives are left at their finite-difference defaults so this objective
/// also exercises the default [`Oracle`] machinery.
#[derive(Debug, Clone)]
pub struct Paraboloid {
    center: Vec<f64>,
    bounds: Option<(Vec<f64>, Vec<f64>)>,
}

impl Paraboloid {
    /// Initializes the objective with given center.
    pub fn new(center: Vec<f64>) -> Self {
        Self {
            center,
            bounds: None,
        }
    }

    /// Adds rectangular bounds enforced by [`Oracle::is_feasible`].
    pub fn with_bounds(mut self, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), self.center.len());
        assert_eq!(upper.len(), self.center.len());
        self.bounds = Some((lower, upper));
        self
    }

    /// Builds the problem specification matching the bounds of the objective.
    pub fn spec(&self) -> ProblemSpec<f64> {
        match &self.bounds {
            Some((lower, upper)) => ProblemSpec::rect(
                DVector::from_column_slice(lower),
                DVector::from_column_slice(upper),
            ),
            None => ProblemSpec::unconstrained(self.center.len()),
        }
    }
}

impl Oracle for Paraboloid {
    type Field = f64;

    fn evaluate<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x.iter()
            .zip(self.center.iter())
            .map(|(xi, ci)| (xi - ci).powi(2))
            .sum()
    }

    fn is_feasible<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        match &self.bounds {
            Some((lower, upper)) => x
                .iter()
                .zip(lower.iter().zip(upper.iter()))
                .all(|(xi, (li, ui))| *li <= *xi && *xi <= *ui),
            None => true,
        }
    }
}

/// [`Paraboloid`] with exact analytic derivatives.
///
/// Because the objective is quadratic, one full Newton step from any point
/// lands exactly on the minimum, which makes this objective convenient for
/// testing second-order paths in isolation.
#[derive(Debug, Clone)]
pub struct ExactParaboloid {
    inner: Paraboloid,
}

impl ExactParaboloid {
    /// Initializes the objective with given center.
    pub fn new(center: Vec<f64>) -> Self {
        Self {
            inner: Paraboloid::new(center),
        }
    }

    /// Adds rectangular bounds enforced by [`Oracle::is_feasible`].
    pub fn with_bounds(mut self, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        self.inner = self.inner.with_bounds(lower, upper);
        self
    }

    /// Builds the problem specification matching the bounds of the objective.
    pub fn spec(&self) -> ProblemSpec<f64> {
        self.inner.spec()
    }
}

impl Oracle for ExactParaboloid {
    type Field = f64;

    fn evaluate<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.inner.evaluate(x)
    }

    fn is_feasible<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.inner.is_feasible(x)
    }

    fn has_second_order(&self) -> bool {
        true
    }

    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        for (i, ci) in self.inner.center.iter().enumerate() {
            g[i] = 2.0 * (x[i] - ci);
        }
    }

    fn hessian<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h.fill(0.0);
        h.fill_diagonal(2.0);
    }
}

/// The saddle surface `x1^2 - x2^2` with exact derivatives.
///
/// The Hessian is indefinite everywhere, so the positive-definite solve must
/// always decline it.
#[derive(Debug, Clone, Copy)]
pub struct SaddleSurface;

impl SaddleSurface {
    /// Initializes the objective.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Oracle for SaddleSurface {
    type Field = f64;

    fn evaluate<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x[0].powi(2) - x[1].powi(2)
    }

    fn is_feasible<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        true
    }

    fn has_second_order(&self) -> bool {
        true
    }

    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        g[0] = 2.0 * x[0];
        g[1] = -2.0 * x[1];
    }

    fn hessian<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h.fill(0.0);
        h[(0, 0)] = 2.0;
        h[(1, 1)] = -2.0;
    }
}

/// A constant objective.
///
/// No probe can ever improve, which makes this objective useful for testing
/// that no-progress paths terminate and leave the state untouched.
#[derive(Debug, Clone, Copy)]
pub struct Plateau {
    value: f64,
}

impl Plateau {
    /// Initializes the objective with given constant value.
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Oracle for Plateau {
    type Field = f64;

    fn evaluate<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.value
    }

    fn is_feasible<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        true
    }
}

/// Wrapper that counts objective evaluations of the inner oracle.
pub struct Counting<O> {
    inner: O,
    evaluations: Cell<usize>,
}

impl<O> Counting<O> {
    /// Wraps the oracle with an evaluation counter starting at zero.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            evaluations: Cell::new(0),
        }
    }

    /// Gets the number of [`Oracle::evaluate`] calls made so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }
}

impl<O: Oracle> Oracle for Counting<O> {
    type Field = O::Field;

    fn evaluate<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.evaluations.set(self.evaluations.get() + 1);
        self.inner.evaluate(x)
    }

    fn is_feasible<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.inner.is_feasible(x)
    }

    fn has_second_order(&self) -> bool {
        self.inner.has_second_order()
    }
}

/// Wrapper that reports no second-order capability and panics if derivatives
/// are requested anyway.
///
/// Useful for asserting that the engine respects
/// [`has_second_order`](Oracle::has_second_order).
pub struct NoDerivatives<O> {
    inner: O,
}

impl<O> NoDerivatives<O> {
    /// Wraps the oracle.
    pub fn new(inner: O) -> Self {
        Self { inner }
    }
}

impl<O: Oracle> Oracle for NoDerivatives<O> {
    type Field = O::Field;

    fn evaluate<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.inner.evaluate(x)
    }

    fn is_feasible<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.inner.is_feasible(x)
    }

    fn has_second_order(&self) -> bool {
        false
    }

    fn gradient<Sx, Sg>(
        &self,
        _x: &Vector<Self::Field, Dyn, Sx>,
        _g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        panic!("gradient requested from an oracle without second-order capability");
    }

    fn hessian<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>, _h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        panic!("hessian requested from an oracle without second-order capability");
    }
}
