//! High-level engine driving the optimization one tick at a time.
//!
//! The [`Engine`] glues the [coordinate search](crate::algo::rosenbrock) and
//! the [Newton accelerator](crate::algo::newton) into a single
//! [`advance`](Engine::advance) operation, the unit of cooperative
//! scheduling. A host application calls `advance` repeatedly from its own
//! loop, free to interleave redraws, timeouts and cancellation checks between
//! ticks; no single tick is unbounded.
//!
//! The simplest way of using the engine is to build it with the defaults:
//!
//! ```rust
//! # use nlprog::nalgebra as na;
//! # use na::{Dyn, IsContiguous};
//! # use nlprog::Oracle;
//! use nlprog::{Engine, ProblemSpec, TickOutcome};
//! #
//! # struct Paraboloid;
//! #
//! # impl Oracle for Paraboloid {
//! #     type Field = f64;
//! #
//! #     fn evaluate<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2)
//! #     }
//! #
//! #     fn is_feasible<Sx>(&self, _x: &na::Vector<Self::Field, Dyn, Sx>) -> bool
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         true
//! #     }
//! # }
//!
//! let f = Paraboloid;
//! let spec = ProblemSpec::unconstrained(2);
//!
//! let mut engine = Engine::builder(&f, &spec)
//!     .with_initial(vec![0.0, 0.0])
//!     .build()
//!     .expect("valid configuration");
//!
//! while engine.iteration() < 100 {
//!     if engine.advance() == TickOutcome::Unchanged && engine.stagnation() > 10 {
//!         break;
//!     }
//! }
//! ```
//!
//! There is deliberately no built-in stopping predicate: deciding when the
//! run has converged, timed out or failed belongs to the caller. The engine
//! only exposes the signals ([`TickOutcome`], [`Engine::stagnation`],
//! [`Engine::solution`]) and honors [`Engine::cancel`].

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, ComplexField as _, DimName, Dyn, OVector, U1};
use num_traits::Zero;

use crate::algo::newton::{NewtonAccelerator, NewtonOptions};
use crate::algo::rosenbrock::{DirectionSet, DirectionSetOptions};
use crate::core::{ConfigError, IterationState, Oracle, ProblemSpec, RealField};

/// Status of an engine run.
///
/// Cancellation is the only terminal transition the engine performs itself.
/// Classifying a run as converged or failed is the caller's decision, made
/// between ticks; the engine carries no stopping predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Built and validated, no tick performed yet.
    Ready,
    /// At least one tick performed.
    Running,
    /// Cooperatively cancelled; subsequent ticks perform no work.
    Cancelled,
}

/// Outcome of one engine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// At least one improving step was committed during the tick.
    Improved,
    /// The tick made no net progress.
    Unchanged,
}

/// Options for the [`Engine`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct EngineOptions<T: RealField + Copy> {
    /// Number of iterations between resets of the direction set to the
    /// identity basis, countering numerical drift from repeated rotations.
    /// Default: `20`.
    reset_interval: usize,
    /// Newton steps are attempted on every iteration below this count.
    /// Default: `20`.
    newton_warmup: usize,
    /// Past the warmup, Newton steps are attempted on every iteration
    /// divisible by this. Default: `100`.
    newton_period: usize,
    /// Relative objective improvement below which a tick counts as stagnant.
    /// Default: `0.01`.
    big_step_threshold: T,
    /// Options forwarded to the direction set.
    #[getset(skip)]
    direction: DirectionSetOptions<T>,
    /// Options forwarded to the Newton accelerator.
    #[getset(skip)]
    newton: NewtonOptions<T>,
}

impl<T: RealField + Copy> EngineOptions<T> {
    /// Gets the direction set options.
    pub fn direction(&self) -> &DirectionSetOptions<T> {
        &self.direction
    }

    /// Sets the direction set options.
    pub fn set_direction(&mut self, direction: DirectionSetOptions<T>) -> &mut Self {
        self.direction = direction;
        self
    }

    /// Gets the Newton accelerator options.
    pub fn newton(&self) -> &NewtonOptions<T> {
        &self.newton
    }

    /// Sets the Newton accelerator options.
    pub fn set_newton(&mut self, newton: NewtonOptions<T>) -> &mut Self {
        self.newton = newton;
        self
    }
}

impl<T: RealField + Copy> Default for EngineOptions<T> {
    fn default() -> Self {
        Self {
            reset_interval: 20,
            newton_warmup: 20,
            newton_period: 100,
            big_step_threshold: convert(0.01),
            direction: DirectionSetOptions::default(),
            newton: NewtonOptions::default(),
        }
    }
}

/// Builder for the [`Engine`].
pub struct EngineBuilder<'a, O: Oracle> {
    oracle: &'a O,
    spec: &'a ProblemSpec<O::Field>,
    options: EngineOptions<O::Field>,
    x0: Vec<O::Field>,
}

impl<'a, O: Oracle> EngineBuilder<'a, O> {
    /// Sets the initial point from which the run starts.
    ///
    /// Defaults to the origin.
    pub fn with_initial(mut self, x0: Vec<O::Field>) -> Self {
        self.x0 = x0;
        self
    }

    /// Sets the engine options.
    pub fn with_options(mut self, options: EngineOptions<O::Field>) -> Self {
        self.options = options;
        self
    }

    /// Validates the configuration and builds the [`Engine`].
    ///
    /// Discrete variables, equality constraints, an initial point of wrong
    /// dimension and an infeasible initial point are all rejected here, once,
    /// before the first tick.
    pub fn build(self) -> Result<Engine<'a, O>, ConfigError> {
        let Self {
            oracle,
            spec,
            options,
            x0,
        } = self;

        spec.validate()?;

        if x0.len() != spec.dim() {
            return Err(ConfigError::InvalidDimensionality);
        }

        let x0 = OVector::from_vec_generic(Dyn(spec.dim()), U1::name(), x0);

        if !oracle.is_feasible(&x0) {
            return Err(ConfigError::InfeasibleStart);
        }

        let y0 = oracle.evaluate(&x0);
        debug!("initial objective value {}", y0);

        let directions = DirectionSet::with_options(spec, options.direction.clone());
        let newton = NewtonAccelerator::with_options(spec.dim(), options.newton.clone());

        Ok(Engine {
            oracle,
            spec,
            options,
            status: Status::Ready,
            state: IterationState::new(x0, y0),
            directions,
            newton,
            tentative: None,
            stagnation: 0,
        })
    }
}

/// Snapshot taken when a tentative move begins.
struct TentativeMove<T: RealField + Copy> {
    x: OVector<T, Dyn>,
    y: T,
    countdown: usize,
}

/// The nonlinear-programming iteration engine.
///
/// For construction, use [`Engine::builder`]. For the usage of the engine,
/// see [module](self) documentation.
pub struct Engine<'a, O: Oracle> {
    oracle: &'a O,
    spec: &'a ProblemSpec<O::Field>,
    options: EngineOptions<O::Field>,
    status: Status,
    state: IterationState<O::Field>,
    directions: DirectionSet<O::Field>,
    newton: NewtonAccelerator<O::Field>,
    tentative: Option<TentativeMove<O::Field>>,
    stagnation: usize,
}

impl<'a, O: Oracle> Engine<'a, O> {
    /// Returns the builder for the engine.
    pub fn builder(oracle: &'a O, spec: &'a ProblemSpec<O::Field>) -> EngineBuilder<'a, O> {
        EngineBuilder {
            oracle,
            spec,
            options: EngineOptions::default(),
            x0: vec![O::Field::zero(); spec.dim()],
        }
    }

    /// Gets the current best point and its objective value.
    pub fn solution(&self) -> (&[O::Field], O::Field) {
        (self.state.x.as_slice(), self.state.y)
    }

    /// Gets the number of ticks performed so far.
    pub fn iteration(&self) -> usize {
        self.state.iter
    }

    /// Gets the problem specification of the run.
    pub fn spec(&self) -> &ProblemSpec<O::Field> {
        self.spec
    }

    /// Gets the number of consecutive ticks whose relative improvement
    /// stayed below the big-step threshold.
    ///
    /// The engine maintains this counter as an observable signal only;
    /// nothing inside the engine consumes it.
    pub fn stagnation(&self) -> usize {
        self.stagnation
    }

    /// Gets the status of the run.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Tests whether a tentative move is outstanding.
    pub fn has_tentative(&self) -> bool {
        self.tentative.is_some()
    }

    /// Gets the direction set of the run.
    pub fn direction_set(&self) -> &DirectionSet<O::Field> {
        &self.directions
    }

    /// Cooperatively cancels the run. Subsequent calls to
    /// [`advance`](Engine::advance) perform no work.
    pub fn cancel(&mut self) {
        debug!("run cancelled after {} iterations", self.state.iter);
        self.status = Status::Cancelled;
    }

    /// Marks the current position as provisional.
    ///
    /// The snapshot of the current point is kept until either the objective
    /// drops below the snapshotted value (the move is accepted and the
    /// snapshot discarded) or `countdown` further ticks pass without such an
    /// improvement (the snapshot is restored). There is no automatic trigger
    /// for tentative moves; this is a hook for the caller.
    pub fn begin_tentative(&mut self, countdown: usize) {
        assert!(countdown > 0, "countdown must be positive");

        debug!("tentative move begins, countdown {}", countdown);
        self.tentative = Some(TentativeMove {
            x: self.state.x.clone(),
            y: self.state.y,
            countdown,
        });
    }

    /// Terminates an outstanding tentative move explicitly.
    ///
    /// Accepting keeps the current position; rejecting restores the
    /// snapshot. No-op when no tentative move is outstanding.
    pub fn end_tentative(&mut self, accept: bool) {
        if let Some(tentative) = self.tentative.take() {
            if accept {
                debug!("tentative move accepted");
            } else {
                debug!("tentative move rejected");
                self.state.x = tentative.x;
                self.state.y = tentative.y;
            }
        }
    }

    /// Advances the run by one tick.
    ///
    /// A tick attempts a Newton step when the schedule and the oracle allow
    /// it and otherwise performs one exploratory sweep; see [module](self)
    /// documentation for the full sequence. Returns whether the tick
    /// committed an improving step. No work is performed once the run is
    /// cancelled.
    pub fn advance(&mut self) -> TickOutcome {
        if self.status == Status::Cancelled {
            return TickOutcome::Unchanged;
        }

        if self.status == Status::Ready {
            self.status = Status::Running;
        }

        // An expiring tentative move rolls the state back before any new
        // work happens this tick.
        self.tick_tentative();

        let iter = self.state.iter;
        let y_before = self.state.y;

        let newton_scheduled = iter < self.options.newton_warmup
            || (self.options.newton_period > 0 && iter % self.options.newton_period == 0);

        let newton_accepted = newton_scheduled
            && self.oracle.has_second_order()
            && self.newton.try_step(self.oracle, &mut self.state);

        let improved = if newton_accepted {
            true
        } else {
            self.directions.sweep(self.oracle, &mut self.state)
        };

        let y = self.state.y;

        // The counter observes relative improvement; only a big step resets
        // it.
        if (y_before - y).abs() > y.abs() * self.options.big_step_threshold {
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }

        if let Some(tentative) = &self.tentative {
            if y < tentative.y {
                debug!("tentative move accepted");
                self.tentative = None;
            }
        }

        self.state.iter += 1;

        if self.options.reset_interval > 0 && self.state.iter % self.options.reset_interval == 0 {
            debug!("resetting direction set to the identity basis");
            self.directions.reset();
        }

        if improved {
            TickOutcome::Improved
        } else {
            TickOutcome::Unchanged
        }
    }

    fn tick_tentative(&mut self) {
        let expired = match self.tentative.as_mut() {
            Some(tentative) => {
                tentative.countdown -= 1;
                tentative.countdown == 0
            }
            None => false,
        };

        if expired {
            debug!("tentative move expired, rolling back");
            if let Some(tentative) = self.tentative.take() {
                self.state.x = tentative.x;
                self.state.y = tentative.y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::core::{Constraint, ConstraintOp};
    use crate::testing::{ExactParaboloid, NoDerivatives, Paraboloid, Plateau};

    #[test]
    fn paraboloid_is_minimized_monotonically() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        let mut y_prev = engine.solution().1;

        for _ in 0..500 {
            engine.advance();
            let y = engine.solution().1;
            assert!(y <= y_prev);
            y_prev = y;
        }

        let (x, y) = engine.solution();
        assert_relative_eq!(x[0], 3.0, max_relative = 1e-3);
        assert_relative_eq!(x[1], -1.0, max_relative = 1e-3);
        assert!(y < 1e-6);
    }

    #[test]
    fn bounded_problem_converges_to_the_boundary() {
        // The unconstrained optimum (3, -1) lies outside the bounds.
        let f = Paraboloid::new(vec![3.0, -1.0]).with_bounds(vec![-5.0, -5.0], vec![1.5, 5.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        for _ in 0..500 {
            engine.advance();
            assert!(f.is_feasible(&nalgebra::DVector::from_column_slice(
                engine.solution().0
            )));
        }

        let (x, _) = engine.solution();
        assert!(x[0] <= 1.5);
        assert_relative_eq!(x[0], 1.5, max_relative = 1e-3);
        assert_relative_eq!(x[1], -1.0, max_relative = 1e-3);
    }

    #[test]
    fn direction_set_resets_periodically() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        for tick in 1..=60 {
            engine.advance();

            if tick % 20 == 0 {
                assert!(engine.direction_set().directions().is_identity(0.0));
            }
        }
    }

    #[test]
    fn disabled_second_order_never_touches_derivatives() {
        let plain = Paraboloid::new(vec![3.0, -1.0]);
        let guarded = NoDerivatives::new(Paraboloid::new(vec![3.0, -1.0]));
        let spec = plain.spec();

        let mut a = Engine::builder(&plain, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();
        let mut b = Engine::builder(&guarded, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        for _ in 0..50 {
            assert_eq!(a.advance(), b.advance());
            assert_eq!(a.solution().0, b.solution().0);
            assert_eq!(a.solution().1, b.solution().1);
        }
    }

    #[test]
    fn exact_second_order_solves_quadratic_on_the_first_tick() {
        let f = ExactParaboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        assert_eq!(engine.advance(), TickOutcome::Improved);

        let (x, y) = engine.solution();
        assert_relative_eq!(x[0], 3.0, max_relative = 1e-9);
        assert_relative_eq!(x[1], -1.0, max_relative = 1e-9);
        assert!(y < 1e-12);
    }

    #[test]
    fn cancellation_stops_all_work() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        engine.advance();
        engine.cancel();

        let solution_before = (engine.solution().0.to_vec(), engine.solution().1);
        let iter_before = engine.iteration();

        assert_eq!(engine.advance(), TickOutcome::Unchanged);
        assert_eq!(engine.status(), Status::Cancelled);
        assert_eq!(engine.iteration(), iter_before);
        assert_eq!(engine.solution().0, solution_before.0.as_slice());
        assert_eq!(engine.solution().1, solution_before.1);
    }

    #[test]
    fn default_initial_point_is_the_origin() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let engine = Engine::builder(&f, &spec).build().unwrap();

        assert_eq!(engine.solution().0, &[0.0, 0.0]);
        assert_eq!(engine.solution().1, 10.0);
    }

    #[test]
    fn rejects_infeasible_start() {
        let f = Paraboloid::new(vec![0.0, 0.0]).with_bounds(vec![1.0, 1.0], vec![2.0, 2.0]);
        let spec = f.spec();

        let result = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build();

        assert!(matches!(result, Err(ConfigError::InfeasibleStart)));
    }

    #[test]
    fn rejects_wrong_dimension() {
        let f = Paraboloid::new(vec![0.0, 0.0]);
        let spec = f.spec();

        let result = Engine::builder(&f, &spec).with_initial(vec![0.0]).build();

        assert!(matches!(result, Err(ConfigError::InvalidDimensionality)));
    }

    #[test]
    fn rejects_equality_constrained_problem() {
        let f = Paraboloid::new(vec![0.0, 0.0]);
        let spec = ProblemSpec::unconstrained(2).with_constraint(Constraint::new(
            vec![(0, 1.0)],
            ConstraintOp::Eq,
            1.0,
        ));

        let result = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build();

        assert!(matches!(result, Err(ConfigError::EqualityConstraints)));
    }

    #[test]
    fn tentative_move_rolls_back_on_expiry() {
        let f = Plateau::new(5.0);
        let spec = ProblemSpec::unconstrained(2);
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![1.0, 2.0])
            .build()
            .unwrap();

        engine.begin_tentative(3);
        assert!(engine.has_tentative());

        engine.advance();
        engine.advance();
        assert!(engine.has_tentative());

        engine.advance();
        assert!(!engine.has_tentative());
        assert_eq!(engine.solution().0, &[1.0, 2.0]);
        assert_eq!(engine.solution().1, 5.0);
    }

    #[test]
    fn tentative_move_is_accepted_on_improvement() {
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        engine.begin_tentative(100);
        let y0 = engine.solution().1;

        engine.advance();

        assert!(!engine.has_tentative());
        assert!(engine.solution().1 < y0);
    }

    #[test]
    fn explicit_tentative_rejection_restores_the_snapshot() {
        let f = Plateau::new(5.0);
        let spec = ProblemSpec::unconstrained(2);
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![1.0, 2.0])
            .build()
            .unwrap();

        engine.begin_tentative(100);
        engine.advance();
        engine.end_tentative(false);

        assert!(!engine.has_tentative());
        assert_eq!(engine.solution().0, &[1.0, 2.0]);
    }

    #[test]
    fn stagnation_counts_small_steps() {
        let f = Plateau::new(5.0);
        let spec = ProblemSpec::unconstrained(2);
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        assert_eq!(engine.stagnation(), 0);
        engine.advance();
        engine.advance();
        assert_eq!(engine.stagnation(), 2);

        // A big improvement resets the counter.
        let f = Paraboloid::new(vec![3.0, -1.0]);
        let spec = f.spec();
        let mut engine = Engine::builder(&f, &spec)
            .with_initial(vec![0.0, 0.0])
            .build()
            .unwrap();

        engine.advance();
        assert_eq!(engine.stagnation(), 0);
    }
}
