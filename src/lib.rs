#![allow(clippy::many_single_char_names)]
#![warn(missing_docs)]

//! # nlprog
//!
//! A pure Rust iteration engine for bound-constrained nonlinear programming:
//! minimization of a black-box scalar objective of several real variables,
//! subject to bound and inequality constraints.
//!
//! The engine alternates two complementary mechanisms:
//!
//! * A derivative-free [rotating coordinate search](algo::rosenbrock) in the
//!   style of Rosenbrock's method. One exploratory sweep per iteration probes
//!   every search direction with an adaptive step size and, after a
//!   productive sweep, rotates the direction basis towards the accumulated
//!   progress.
//! * An opportunistic [Newton step](algo::newton) attempted on a schedule
//!   whenever the objective can supply second-order information. The Newton
//!   step is never mandatory; when the Hessian is not positive definite or
//!   the line search fails, the engine falls back to the ordinary sweep.
//!
//! ## Problem
//!
//! The problem is described by a [`ProblemSpec`] (bounds, constraints, goal)
//! and evaluated through the [`Oracle`] trait, which abstracts the objective
//! value, feasibility testing and optional derivative information. The engine
//! never learns where the numbers come from, which makes it suitable for host
//! applications whose objective is expensive or opaque (the archetype being a
//! spreadsheet cell recalculated on demand).
//!
//! ```rust
//! use nlprog::nalgebra as na;
//! use na::{Dyn, IsContiguous};
//! use nlprog::Oracle;
//!
//! // An oracle is represented by a type.
//! struct Paraboloid;
//!
//! impl Oracle for Paraboloid {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // Objective value, already sign-adjusted for minimization.
//!     fn evaluate<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2)
//!     }
//!
//!     // Bound and inequality constraint check.
//!     fn is_feasible<Sx>(&self, _x: &na::Vector<Self::Field, Dyn, Sx>) -> bool
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         true
//!     }
//! }
//! ```
//!
//! ## Driving the engine
//!
//! The engine is advanced one discrete tick at a time by an external
//! scheduler. There is no built-in stopping predicate: the caller decides
//! when to stop ticking, which lets a host interleave redraws, timeouts and
//! cancellation checks between ticks.
//!
//! ```rust
//! # use nlprog::nalgebra as na;
//! # use na::{Dyn, IsContiguous};
//! # use nlprog::Oracle;
//! use nlprog::{Engine, ProblemSpec};
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
//! for _ in 0..200 {
//!     engine.advance();
//! }
//!
//! let (_, y) = engine.solution();
//! assert!(y < 1e-6);
//! ```
//!
//! ## Scope
//!
//! The engine handles continuous, generally non-convex objectives. Discrete
//! variables and equality constraints are rejected up front as configuration
//! errors; linear and integer programming are out of scope. Everything is
//! single-threaded and synchronous; no tick blocks and no tick is unbounded,
//! even against a non-deterministic oracle.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
pub mod core;
pub mod driver;

pub use core::*;
pub use driver::{Engine, EngineBuilder, EngineOptions, Status, TickOutcome};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
