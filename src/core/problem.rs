//! Problem description: bounds, constraints and the optimization goal.

use std::iter::FromIterator;

use nalgebra as na;
use nalgebra::{storage::Storage, Dyn, IsContiguous, OVector, Vector};
use thiserror::Error;

use crate::core::base::RealField;

/// Error reported when a problem configuration cannot be handled by the
/// engine.
///
/// All variants are detected once, before the first tick, and are never
/// retried automatically.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The problem marks at least one variable as discrete. The engine
    /// assumes a continuous objective.
    #[error("discrete variables are not supported")]
    DiscreteVariables,
    /// The problem contains an equality constraint. Only bound and inequality
    /// constraints are handled.
    #[error("equality constraints are not supported")]
    EqualityConstraints,
    /// The initial point does not satisfy the constraints.
    #[error("the initial values do not satisfy the constraints")]
    InfeasibleStart,
    /// The number of initial values does not match the number of variables.
    #[error("invalid dimensionality")]
    InvalidDimensionality,
}

/// Direction of the optimization.
///
/// The engine itself always minimizes; an oracle for a maximization problem
/// is expected to flip the sign of the objective value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Goal {
    /// Minimize the objective.
    #[default]
    Minimize,
    /// Maximize the objective (the oracle negates the value).
    Maximize,
}

/// Relational operator of a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Left-hand side must be less than or equal to the right-hand side.
    Le,
    /// Left-hand side must be greater than or equal to the right-hand side.
    Ge,
    /// Left-hand side must be equal to the right-hand side. Rejected by
    /// [`ProblemSpec::validate`]; carried only so that callers can describe
    /// the configuration they were given.
    Eq,
}

/// A single constraint: an affine combination of variables compared to a
/// constant.
#[derive(Debug, Clone)]
pub struct Constraint<T: RealField + Copy> {
    terms: Vec<(usize, T)>,
    op: ConstraintOp,
    rhs: T,
}

impl<T: RealField + Copy> Constraint<T> {
    /// Creates a constraint `sum(coeff * x[index]) op rhs`.
    pub fn new(terms: Vec<(usize, T)>, op: ConstraintOp, rhs: T) -> Self {
        Self { terms, op, rhs }
    }

    /// Gets the relational operator.
    pub fn op(&self) -> ConstraintOp {
        self.op
    }

    /// Evaluates the left-hand side in given point.
    pub fn lhs<Sx>(&self, x: &Vector<T, Dyn, Sx>) -> T
    where
        Sx: Storage<T, Dyn> + IsContiguous,
    {
        self.terms
            .iter()
            .fold(T::zero(), |acc, &(i, c)| acc + c * x[i])
    }

    /// Tests whether the constraint holds in given point.
    pub fn is_satisfied<Sx>(&self, x: &Vector<T, Dyn, Sx>) -> bool
    where
        Sx: Storage<T, Dyn> + IsContiguous,
    {
        let lhs = self.lhs(x);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs,
            ConstraintOp::Ge => lhs >= self.rhs,
            ConstraintOp::Eq => lhs == self.rhs,
        }
    }
}

/// Specification of one optimization problem.
///
/// The specification is immutable for the life of an optimization run and is
/// owned by the caller; the engine holds only a read-only reference.
pub struct ProblemSpec<T: RealField + Copy> {
    lower: OVector<T, Dyn>,
    upper: OVector<T, Dyn>,
    discrete: Vec<bool>,
    constraints: Vec<Constraint<T>>,
    goal: Goal,
}

impl<T: RealField + Copy> ProblemSpec<T> {
    /// Creates an unconstrained specification with given number of variables.
    pub fn unconstrained(dim: usize) -> Self {
        let inf = T::from_subset(&f64::INFINITY);
        let n = Dyn(dim);
        let one = na::Const::<1>;

        Self {
            lower: OVector::from_iterator_generic(n, one, (0..dim).map(|_| -inf)),
            upper: OVector::from_iterator_generic(n, one, (0..dim).map(|_| inf)),
            discrete: vec![false; dim],
            constraints: Vec::new(),
            goal: Goal::Minimize,
        }
    }

    /// Creates a specification with rectangular bounds.
    ///
    /// Positive and negative infinity can be used to indicate a variable
    /// unbounded in that direction.
    pub fn rect(lower: OVector<T, Dyn>, upper: OVector<T, Dyn>) -> Self {
        assert!(
            lower.nrows() == upper.nrows(),
            "lower and upper have different size"
        );

        let dim = lower.nrows();

        Self {
            lower,
            upper,
            discrete: vec![false; dim],
            constraints: Vec::new(),
            goal: Goal::Minimize,
        }
    }

    /// Adds an inequality (or, for rejection purposes, equality) constraint.
    pub fn with_constraint(mut self, constraint: Constraint<T>) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Sets per-variable discreteness flags.
    pub fn with_discrete(mut self, discrete: Vec<bool>) -> Self {
        assert!(
            discrete.len() == self.dim(),
            "discrete flags have invalid dimension"
        );
        self.discrete = discrete;
        self
    }

    /// Sets the optimization goal.
    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goal = goal;
        self
    }

    /// Gets the number of variables.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Gets the optimization goal.
    pub fn goal(&self) -> Goal {
        self.goal
    }

    /// Gets the constraints.
    pub fn constraints(&self) -> &[Constraint<T>] {
        &self.constraints
    }

    /// Checks that the engine can handle this configuration.
    ///
    /// Discrete variables and equality constraints are rejected here, before
    /// the first tick. They are configuration errors, not algorithmic
    /// capabilities that degrade.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discrete.iter().any(|&d| d) {
            return Err(ConfigError::DiscreteVariables);
        }

        if self
            .constraints
            .iter()
            .any(|c| c.op() == ConstraintOp::Eq)
        {
            return Err(ConfigError::EqualityConstraints);
        }

        Ok(())
    }

    /// Tests whether given point lies within the bounds.
    pub fn contains<Sx>(&self, x: &Vector<T, Dyn, Sx>) -> bool
    where
        Sx: Storage<T, Dyn> + IsContiguous,
    {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .zip(x.iter())
            .all(|((li, ui), xi)| xi >= li && xi <= ui)
    }

    /// Tests whether given point satisfies the bounds and all constraints.
    pub fn is_feasible<Sx>(&self, x: &Vector<T, Dyn, Sx>) -> bool
    where
        Sx: Storage<T, Dyn> + IsContiguous,
    {
        self.contains(x) && self.constraints.iter().all(|c| c.is_satisfied(x))
    }

    /// Estimates the magnitude of each variable from its bounds.
    ///
    /// Used to derive initial step sizes for the coordinate search. For
    /// unbounded variables the magnitude defaults to one.
    pub fn magnitudes(&self) -> OVector<T, Dyn> {
        let n = Dyn(self.dim());
        let iter = self
            .lower
            .iter()
            .zip(self.upper.iter())
            .map(|(&l, &u)| estimate_magnitude_from_bounds(l, u));

        OVector::from_iterator_generic(n, na::Const::<1>, iter)
    }
}

impl<T: RealField + Copy> FromIterator<(T, T)> for ProblemSpec<T> {
    fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
        let (lower, upper): (Vec<_>, Vec<_>) = iter.into_iter().unzip();

        let n = Dyn(lower.len());
        let one = na::Const::<1>;

        let lower = OVector::from_vec_generic(n, one, lower);
        let upper = OVector::from_vec_generic(n, one, upper);

        Self::rect(lower, upper)
    }
}

/// Estimates magnitude of a variable given its lower and upper bounds.
pub fn estimate_magnitude_from_bounds<T: RealField + Copy>(lower: T, upper: T) -> T {
    let ten = T::from_subset(&10.0);
    let half = T::from_subset(&0.5);

    let avg = half * (lower.abs() + upper.abs());
    let magnitude = ten.powf(avg.abs().log10().trunc());

    // For unbounded or [0, 0] ranges the computed magnitude is undefined.
    if magnitude.is_finite() && magnitude > T::zero() {
        magnitude
    } else {
        T::one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::dvector;

    #[test]
    fn magnitude_estimation() {
        assert_eq!(estimate_magnitude_from_bounds(-1e10f64, 1e10).log10(), 10.0);
        assert_eq!(estimate_magnitude_from_bounds(-1e4f64, -1e2).log10(), 3.0);
        assert_eq!(estimate_magnitude_from_bounds(0.0f64, 0.0), 1.0);
        assert_eq!(
            estimate_magnitude_from_bounds(f64::NEG_INFINITY, f64::INFINITY),
            1.0
        );
    }

    #[test]
    fn rejects_discrete_variables() {
        let spec = ProblemSpec::<f64>::unconstrained(2).with_discrete(vec![false, true]);

        assert!(matches!(
            spec.validate(),
            Err(ConfigError::DiscreteVariables)
        ));
    }

    #[test]
    fn rejects_equality_constraints() {
        let spec = ProblemSpec::unconstrained(2).with_constraint(Constraint::new(
            vec![(0, 1.0), (1, 1.0)],
            ConstraintOp::Eq,
            1.0,
        ));

        assert!(matches!(
            spec.validate(),
            Err(ConfigError::EqualityConstraints)
        ));
    }

    #[test]
    fn accepts_inequality_constraints() {
        let spec = ProblemSpec::unconstrained(2).with_constraint(Constraint::new(
            vec![(0, 1.0), (1, 2.0)],
            ConstraintOp::Le,
            4.0,
        ));

        assert!(spec.validate().is_ok());
        assert!(spec.is_feasible(&dvector![1.0, 1.0]));
        assert!(!spec.is_feasible(&dvector![1.0, 2.0]));
    }

    #[test]
    fn bounds_feasibility() {
        let spec: ProblemSpec<f64> = [(0.0, 1.0), (-1.0, 1.0)].into_iter().collect();

        assert!(spec.contains(&dvector![0.5, 0.0]));
        assert!(!spec.contains(&dvector![1.5, 0.0]));
        assert!(spec.contains(&dvector![0.0, -1.0]));
    }
}
