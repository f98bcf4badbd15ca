//! Core abstractions and types for nlprog.
//!
//! *Users* describe their problem with a [`ProblemSpec`] and implement the
//! [`Oracle`] trait for their objective.
//!
//! The engine itself lives in the [driver](crate::driver) module and the
//! algorithm components in the [algo](crate::algo) module.

mod base;
mod oracle;
mod problem;
mod state;

pub use base::*;
pub use oracle::*;
pub use problem::*;
pub use state::*;
