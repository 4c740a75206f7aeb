//! Testing problems and utilities useful for benchmarking, debugging and smoke
//! testing.
//!
//! [`ShiftedParaboloid`] and [`HalfPlane`] are recommended for first tests.
//! [`RosenSuzuki`] and [`HockSchittkowski100`] are classic problems with
//! nonlinear constraints that are active in the optimum.
//!
//! # References
//!
//! \[1\] [Test Examples for Nonlinear Programming
//! Codes](https://link.springer.com/book/10.1007/978-3-642-48320-2)
//!
//! \[2\] [A Direct Search Optimization Method That Models the Objective and
//! Constraint Functions by Linear
//! Interpolation](https://link.springer.com/chapter/10.1007/978-94-015-8330-5_4)

#![allow(unused)]

use std::error::Error as StdError;

use nalgebra::{
    dvector,
    storage::{Storage, StorageMut},
    DVector, Dyn, IsContiguous, OVector, Vector,
};
use thiserror::Error;

use crate::core::{Domain, Function, Optimizer, Problem, ProblemError, Status};

/// Extension of the [`Function`] trait that provides additional information
/// that is useful for testing optimizers.
pub trait TestProblem: Function {
    /// Standard initial values for the problem. Using the same initial values
    /// is essential for fair comparison of methods.
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>>;

    /// A set of optima (if known). This is mostly just for information, for
    /// example to know how close an optimizer got even if it failed.
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        Vec::new()
    }

    /// Test if given point is an optimum of the problem, given the tolerance
    /// `eps` on the distance.
    fn is_optimum<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.optima()
            .iter()
            .any(|optimum| (optimum - x).norm() <= eps)
    }
}

/// [Sphere function](https://en.wikipedia.org/wiki/Test_functions_for_optimization)
/// without constraints.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Initializes the problem with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Sphere {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.n)
    }
}

impl Function for Sphere {
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        _cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        Ok(x.iter().map(|xi| xi.powi(2)).sum())
    }
}

impl TestProblem for Sphere {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }),
        );

        vec![init]
    }

    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 0.0)]
    }
}

/// Paraboloid `(x - 1)^2 + (y - 2)^2` with optional bounds.
#[derive(Debug, Clone)]
pub struct ShiftedParaboloid {
    dom: Domain<f64>,
}

impl ShiftedParaboloid {
    /// Initializes the unconstrained problem.
    pub fn new() -> Self {
        Self::with_domain(Domain::unconstrained(2))
    }

    /// Initializes the problem with given two-dimensional domain.
    pub fn with_domain(dom: Domain<f64>) -> Self {
        assert_eq!(dom.dim(), 2, "domain must be two-dimensional");
        Self { dom }
    }
}

impl Default for ShiftedParaboloid {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for ShiftedParaboloid {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        self.dom.clone()
    }
}

impl Function for ShiftedParaboloid {
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        _cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
    }
}

impl TestProblem for ShiftedParaboloid {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![0.0, 0.0]]
    }

    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let mut optimum = dvector![1.0, 2.0];
        self.dom.project(&mut optimum);
        vec![optimum]
    }
}

/// Sphere function restricted to the half-plane `x + y >= 1`.
///
/// The constraint is active in the optimum `(0.5, 0.5)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfPlane;

impl HalfPlane {
    /// Initializes the problem.
    pub fn new() -> Self {
        Self
    }
}

impl Problem for HalfPlane {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(2)
    }

    fn constraint_count(&self) -> usize {
        1
    }
}

impl Function for HalfPlane {
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        cx[0] = x[0] + x[1] - 1.0;
        Ok(x[0].powi(2) + x[1].powi(2))
    }
}

impl TestProblem for HalfPlane {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![2.0, 2.0], dvector![-1.0, 0.0]]
    }

    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![0.5, 0.5]]
    }
}

/// Linear function `x + y` on the unit disk.
///
/// The only constraint is nonlinear and active in the optimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitDisk;

impl UnitDisk {
    /// Initializes the problem.
    pub fn new() -> Self {
        Self
    }
}

impl Problem for UnitDisk {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(2)
    }

    fn constraint_count(&self) -> usize {
        1
    }
}

impl Function for UnitDisk {
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        cx[0] = 1.0 - x[0].powi(2) - x[1].powi(2);
        Ok(x[0] + x[1])
    }
}

impl TestProblem for UnitDisk {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![1.0, 1.0]]
    }

    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let t = -std::f64::consts::FRAC_1_SQRT_2;
        vec![dvector![t, t]]
    }
}

/// Rosen-Suzuki problem \[1\].
///
/// Quadratic objective of four variables with three quadratic constraints,
/// two of which are active in the optimum `(0, 1, 2, -1)` with value `-44`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RosenSuzuki;

impl RosenSuzuki {
    /// Initializes the problem.
    pub fn new() -> Self {
        Self
    }
}

impl Problem for RosenSuzuki {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(4)
    }

    fn constraint_count(&self) -> usize {
        3
    }
}

impl Function for RosenSuzuki {
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        let (x1, x2, x3, x4) = (x[0], x[1], x[2], x[3]);

        cx[0] = 8.0 - x1 * x1 - x2 * x2 - x3 * x3 - x4 * x4 - x1 + x2 - x3 + x4;
        cx[1] = 10.0 - x1 * x1 - 2.0 * x2 * x2 - x3 * x3 - 2.0 * x4 * x4 + x1 + x4;
        cx[2] = 5.0 - 2.0 * x1 * x1 - x2 * x2 - x3 * x3 - 2.0 * x1 + x2 + x4;

        Ok(x1 * x1 + x2 * x2 + 2.0 * x3 * x3 + x4 * x4 - 5.0 * x1 - 5.0 * x2 - 21.0 * x3
            + 7.0 * x4)
    }
}

impl TestProblem for RosenSuzuki {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![1.0, 1.0, 1.0, 1.0]]
    }

    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![0.0, 1.0, 2.0, -1.0]]
    }
}

/// Problem 100 from the collection of Hock and Schittkowski \[1\].
///
/// Seven variables and four nonlinear constraints, the objective value in the
/// optimum is approximately `680.630`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HockSchittkowski100;

impl HockSchittkowski100 {
    /// Initializes the problem.
    pub fn new() -> Self {
        Self
    }
}

impl Problem for HockSchittkowski100 {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(7)
    }

    fn constraint_count(&self) -> usize {
        4
    }
}

impl Function for HockSchittkowski100 {
    fn apply<Sx, Scx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        cx: &mut Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        let x = x.as_slice();

        cx[0] = 127.0
            - 2.0 * x[0].powi(2)
            - 3.0 * x[1].powi(4)
            - x[2]
            - 4.0 * x[3].powi(2)
            - 5.0 * x[4];
        cx[1] = 282.0 - 7.0 * x[0] - 3.0 * x[1] - 10.0 * x[2].powi(2) - x[3] + x[4];
        cx[2] = 196.0 - 23.0 * x[0] - x[1].powi(2) - 6.0 * x[5].powi(2) + 8.0 * x[6];
        cx[3] = -4.0 * x[0].powi(2) - x[1].powi(2) + 3.0 * x[0] * x[1] - 2.0 * x[2].powi(2)
            - 5.0 * x[5]
            + 11.0 * x[6];

        Ok((x[0] - 10.0).powi(2)
            + 5.0 * (x[1] - 12.0).powi(2)
            + x[2].powi(4)
            + 3.0 * (x[3] - 11.0).powi(2)
            + 10.0 * x[4].powi(6)
            + 7.0 * x[5].powi(2)
            + x[6].powi(4)
            - 4.0 * x[5] * x[6]
            - 10.0 * x[5]
            - 8.0 * x[6])
    }
}

impl TestProblem for HockSchittkowski100 {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![1.0, 2.0, 0.0, 4.0, 0.0, 1.0, 1.0]]
    }

    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![
            2.330499, 1.951372, -0.4775414, 4.365726, -0.6244870, 1.038131, 1.594227
        ]]
    }
}

/// Optimization error of the testing optimizer driver (see [`minimize`]).
#[derive(Debug, Error)]
pub enum TestingError<E: StdError + 'static> {
    /// Error of the optimizer used.
    #[error("{0}")]
    Inner(#[from] E),
    /// Optimizer did not terminate.
    #[error("optimizer did not terminate")]
    Termination,
}

/// A simple optimizer driver that can be used in tests.
///
/// Runs the optimizer until it finishes or `max_iters` steps are made.
pub fn minimize<F: Function, O: Optimizer<F>>(
    f: &F,
    dom: &Domain<F::Field>,
    mut optimizer: O,
    mut x: OVector<F::Field, Dyn>,
    max_iters: usize,
) -> Result<(OVector<F::Field, Dyn>, Status), TestingError<O::Error>>
where
    O::Error: StdError + 'static,
{
    for _ in 0..max_iters {
        if let Some(status) = optimizer.opt_next(f, dom, &mut x)? {
            return Ok((x, status));
        }
    }

    Err(TestingError::Termination)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    fn value<F: Function>(f: &F, x: &OVector<F::Field, Dyn>) -> (F::Field, DVector<F::Field>) {
        let mut cx = DVector::zeros(f.constraint_count());
        let fx = f.apply(x, &mut cx).unwrap();
        (fx, cx)
    }

    #[test]
    fn known_optima_are_feasible() {
        fn check<F: TestProblem<Field = f64>>(f: &F) {
            for optimum in f.optima() {
                let (_, cx) = value(f, &optimum);
                assert!(cx.iter().all(|c| *c >= -1e-5), "{:?}", cx);
                assert!(f.is_optimum(&optimum, 1e-12));
            }
        }

        check(&Sphere::new(3));
        check(&ShiftedParaboloid::new());
        check(&HalfPlane::new());
        check(&UnitDisk::new());
        check(&RosenSuzuki::new());
        check(&HockSchittkowski100::new());
    }

    #[test]
    fn optimal_values() {
        let (fx, cx) = value(&RosenSuzuki::new(), &RosenSuzuki::new().optima()[0]);
        assert_abs_diff_eq!(fx, -44.0);
        assert_abs_diff_eq!(cx[0], 0.0);
        assert_abs_diff_eq!(cx[2], 0.0);

        let f = HockSchittkowski100::new();
        let (fx, _) = value(&f, &f.optima()[0]);
        assert_abs_diff_eq!(fx, 680.6300573, epsilon = 1e-3);
    }

    #[test]
    fn bounded_optimum_is_projected() {
        let f = ShiftedParaboloid::with_domain(Domain::rect(vec![0.0, 0.0], vec![0.5, 3.0]));
        assert_eq!(f.optima()[0], dvector![0.5, 2.0]);
    }
}
