//! Core abstractions and types for cobyla.
//!
//! *Users* are mainly interested in implementing the [`Function`] trait,
//! optionally specifying the [domain](Domain) with bounds.
//!
//! Algorithms *developers* are interested in implementing the [`Optimizer`]
//! trait.

mod base;
mod domain;
mod function;
mod optimizer;

pub use base::*;
pub use domain::*;
pub use function::*;
pub use optimizer::*;
