//! The collection of algorithm components used by the engine.

pub mod newton;
pub mod rosenbrock;

pub use newton::NewtonAccelerator;
pub use rosenbrock::DirectionSet;
