use std::marker::PhantomData;

use nalgebra::{
    storage::{Storage, StorageMut},
    Dyn, IsContiguous, RealField, Vector,
};

use super::{
    base::{Problem, ProblemError},
    domain::Domain,
};

/// Definition of an objective function together with its inequality
/// constraints.
///
/// ## Defining a function
///
/// A function is any type that implements [`Function`] and [`Problem`] traits.
/// Constraints follow the convention that a point is feasible if and only if
/// all constraint values are nonnegative. A constraint `g(x) <= b` is thus
/// written as `b - g(x) >= 0` and an equality constraint must be expressed as a
/// pair of inequalities.
///
/// ```rust
/// use cobyla::nalgebra as na;
/// use cobyla::{Domain, Function, Problem, ProblemError};
/// use na::{Dyn, IsContiguous};
///
/// // Minimize x^2 + y^2 subject to x + y >= 1.
/// struct Distance;
///
/// impl Problem for Distance {
///     type Field = f64;
///
///     fn domain(&self) -> Domain<Self::Field> {
///         Domain::unconstrained(2)
///     }
///
///     fn constraint_count(&self) -> usize {
///         1
///     }
/// }
///
/// impl Function for Distance {
///     fn apply<Sx, Scx>(
///         &self,
///         x: &na::Vector<Self::Field, Dyn, Sx>,
///         cx: &mut na::Vector<Self::Field, Dyn, Scx>,
///     ) -> Result<Self::Field, ProblemError>
///     where
///         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
///         Scx: na::storage::StorageMut<Self::Field, Dyn> + IsContiguous,
///     {
///         cx[0] = x[0] + x[1] - 1.0;
///         Ok(x[0].powi(2) + x[1].powi(2))
///     }
/// }
/// ```
pub trait Function: Problem {
    /// Calculates the function value in given point and writes the values of
    /// the constraints into `cx`, whose length is
    /// [`constraint_count`](Problem::constraint_count).
    ///
    /// The function is expected to be deterministic for a fixed `x`.
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous;
}

/// A [`Function`] defined by a closure.
///
/// The closure takes the variables and a mutable slice for the constraint
/// values and returns the objective value.
///
/// ```rust
/// use cobyla::FnFunction;
///
/// // Minimize (x - 1)^2 + (y - 2)^2 without constraints.
/// let f = FnFunction::new(2, 0, |x: &[f64], _: &mut [f64]| {
///     (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
/// });
/// ```
pub struct FnFunction<T, E> {
    dim: usize,
    constraints: usize,
    eval: E,
    field: PhantomData<T>,
}

impl<T, E> FnFunction<T, E>
where
    T: RealField + Copy,
    E: Fn(&[T], &mut [T]) -> T,
{
    /// Wraps the closure as a function of `dim` variables with `constraints`
    /// inequality constraints.
    pub fn new(dim: usize, constraints: usize, eval: E) -> Self {
        assert!(dim > 0, "empty domain");

        Self {
            dim,
            constraints,
            eval,
            field: PhantomData,
        }
    }
}

impl<T, E> Problem for FnFunction<T, E>
where
    T: RealField + Copy,
    E: Fn(&[T], &mut [T]) -> T,
{
    type Field = T;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.dim)
    }

    fn constraint_count(&self) -> usize {
        self.constraints
    }
}

impl<T, E> Function for FnFunction<T, E>
where
    T: RealField + Copy,
    E: Fn(&[T], &mut [T]) -> T,
{
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        if x.nrows() != self.dim || cx.nrows() != self.constraints {
            return Err(ProblemError::InvalidDimensionality);
        }

        Ok((self.eval)(x.as_slice(), cx.as_mut_slice()))
    }
}
