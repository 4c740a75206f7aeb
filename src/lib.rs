#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Cobyla
//!
//! A pure Rust implementation of Powell's COBYLA method (Constrained
//! Optimization BY Linear Approximations) for derivative-free minimization of
//! a function subject to nonlinear inequality constraints.
//!
//! The method needs only the values of the objective and the constraints, no
//! gradients. It is well suited for problems with a modest number of variables
//! whose functions are expensive to evaluate or not differentiable in a usable
//! way. Bound constraints of the variables are supported first-class and are
//! treated as additional inequality constraints.
//!
//! ## Problem
//!
//! Mathematically, the problem is formulated as
//!
//! ```text
//! minimize f(x)
//!
//! subject to c_k(x) >= 0 for k = 1, ..., m
//! and x = { x1, ..., xn }
//! ```
//!
//! Moreover, it is possible to add bound constraints to the variables. That is:
//!
//! ```text
//! Li <= xi <= Ui for some bounds [L, U] for every i
//! ```
//!
//! The bounds can be negative/positive infinity, effectively making the
//! variable unconstrained. An equality constraint is expressed by a pair of
//! inequalities.
//!
//! When it comes to code, the problem is any type that implements the
//! [`Function`] and [`Problem`] traits.
//!
//! ```rust
//! // Cobyla is based on `nalgebra` crate.
//! use cobyla::nalgebra as na;
//! use cobyla::{Domain, Function, Problem, ProblemError};
//! use na::{Dyn, IsContiguous};
//!
//! // A problem is represented by a type.
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl Problem for Rosenbrock {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // Specification for the domain. At the very least, the dimension
//!     // must be known.
//!     fn domain(&self) -> Domain<Self::Field> {
//!         Domain::unconstrained(2)
//!     }
//!
//!     // Number of inequality constraints.
//!     fn constraint_count(&self) -> usize {
//!         1
//!     }
//! }
//!
//! impl Function for Rosenbrock {
//!     // Evaluate the objective and the constraints in trial values of
//!     // variables.
//!     fn apply<Sx, Scx>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         cx: &mut na::Vector<Self::Field, Dyn, Scx>,
//!     ) -> Result<Self::Field, ProblemError>
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!         Scx: na::storage::StorageMut<Self::Field, Dyn> + IsContiguous,
//!     {
//!         // Stay inside the disk of radius 1.5.
//!         cx[0] = 2.25 - x[0].powi(2) - x[1].powi(2);
//!
//!         Ok((self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2))
//!     }
//! }
//! ```
//!
//! The previous example used unconstrained variables, but it is also possible
//! to specify bounds.
//!
//! ```rust
//! # use cobyla::nalgebra as na;
//! # use cobyla::*;
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! impl Problem for Rosenbrock {
//! #     type Field = f64;
//!     // ...
//!
//!     fn domain(&self) -> Domain<Self::Field> {
//!         [(-10.0, 10.0), (-10.0, 10.0)].into_iter().collect()
//!     }
//! }
//! ```
//!
//! For quick experiments, a closure can be wrapped by [`FnFunction`] or passed
//! directly to [`solve`].
//!
//! ## Optimizing
//!
//! When you have your function available, you can use the [`OptimizerDriver`]
//! to run the iteration process until it finishes.
//!
//! ```rust
//! use cobyla::{OptimizerDriver, Status};
//! # use cobyla::nalgebra as na;
//! # use cobyla::{Domain, Function, Problem, ProblemError};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::unconstrained(2)
//! #     }
//! #
//! #     fn constraint_count(&self) -> usize {
//! #         1
//! #     }
//! # }
//! #
//! # impl Function for Rosenbrock {
//! #     fn apply<Sx, Scx>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         cx: &mut na::Vector<Self::Field, Dyn, Scx>,
//! #     ) -> Result<Self::Field, ProblemError>
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #         Scx: na::storage::StorageMut<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         cx[0] = 2.25 - x[0].powi(2) - x[1].powi(2);
//! #         Ok((self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2))
//! #     }
//! # }
//!
//! let f = Rosenbrock { a: 1.0, b: 100.0 };
//! let mut optimizer = OptimizerDriver::builder(&f)
//!     .with_initial(vec![-1.0, 1.0])
//!     .build();
//!
//! let status = optimizer
//!     .run()
//!     .expect("optimizer encountered an error");
//!
//! if status == Status::Normal {
//!     println!("solved: x = {:?}, f(x) = {}", optimizer.x(), optimizer.fx());
//! } else {
//!     println!("finished with {:?}", status);
//! }
//! ```
//!
//! ## Logging
//!
//! The optimizer reports its progress through the [`log`](https://docs.rs/log)
//! facade. The amount of output is controlled by the
//! [verbosity](algo::cobyla::Verbosity) option, internal steps are logged at
//! the `debug` level.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
mod core;
pub mod driver;

pub use core::*;
pub use driver::{solve, OptimizerDriver, Report};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
