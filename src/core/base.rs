use nalgebra::RealField;
use thiserror::Error;

use super::domain::Domain;

/// The base trait for [`Function`](super::function::Function).
pub trait Problem {
    /// Type of the field, usually f64 or f32.
    type Field: RealField + Copy;

    /// Gets the domain of the problem.
    ///
    /// The domain determines the number of variables and optional bounds on
    /// them. Finite bounds are treated as additional inequality constraints by
    /// the optimizer.
    fn domain(&self) -> Domain<Self::Field>;

    /// Returns the number of inequality constraints of the problem. If not
    /// overridden, the problem has no constraints besides the bounds in its
    /// domain.
    fn constraint_count(&self) -> usize {
        0
    }
}

/// Error encountered while evaluating the function and constraints.
#[derive(Debug, Error)]
pub enum ProblemError {
    /// The number of variables does not match the dimensionality of the
    /// problem.
    #[error("invalid dimensionality")]
    InvalidDimensionality,
    /// An invalid value (NaN, positive or negative infinity) of the function
    /// or a constraint occurred.
    #[error("invalid value encountered")]
    InvalidValue,
    /// The function requested the process to stop. The optimizer reports this
    /// the same way as an exhausted evaluation budget.
    #[error("evaluation halted")]
    Halt,
    /// A custom error specific to the problem.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}
