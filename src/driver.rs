//! High-level API for optimization.
//!
//! This module contains the driver that encapsulates all internal state and
//! provides a simple API to run the iterative process of optimization.
//!
//! The simplest way of using the driver is to initialize it with the defaults:
//!
//! ```rust
//! use cobyla::OptimizerDriver;
//! # use cobyla::FnFunction;
//!
//! let f = FnFunction::new(2, 0, |x: &[f64], _: &mut [f64]| {
//!     (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
//! });
//!
//! let mut optimizer = OptimizerDriver::new(&f);
//! ```
//!
//! If you need to specify additional settings, use the builder:
//!
//! ```rust
//! use cobyla::{algo::cobyla::CobylaOptions, OptimizerDriver};
//! # use cobyla::FnFunction;
//! #
//! # let f = FnFunction::new(2, 0, |x: &[f64], _: &mut [f64]| {
//! #     (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
//! # });
//!
//! let mut options = CobylaOptions::default();
//! options.set_rho_begin(1.0).set_rho_end(1e-8);
//!
//! let mut optimizer = OptimizerDriver::builder(&f)
//!     .with_initial(vec![10.0, -10.0])
//!     .with_options(options)
//!     .build();
//! ```
//!
//! Once you have the optimizer, you can run it until it finishes:
//!
//! ```rust
//! # use cobyla::{FnFunction, OptimizerDriver};
//! #
//! # let f = FnFunction::new(2, 0, |x: &[f64], _: &mut [f64]| {
//! #     (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
//! # });
//! #
//! # let mut optimizer = OptimizerDriver::new(&f);
//! #
//! let status = optimizer.run().expect("optimizer error");
//! ```
//!
//! or stop it earlier by your own criterion:
//!
//! ```rust
//! # use cobyla::{FnFunction, OptimizerDriver};
//! #
//! # let f = FnFunction::new(2, 0, |x: &[f64], _: &mut [f64]| {
//! #     (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
//! # });
//! #
//! # let mut optimizer = OptimizerDriver::new(&f);
//! #
//! let status = optimizer
//!     .find(|state| state.fx() <= 1e-6 || state.evaluations() >= 50)
//!     .expect("optimizer error");
//! ```
//!
//! If you need more control over the iteration process, you can do the
//! iterations manually. Each iteration evaluates the function at most once:
//!
//! ```rust
//! # use cobyla::{FnFunction, OptimizerDriver};
//! #
//! # let f = FnFunction::new(2, 0, |x: &[f64], _: &mut [f64]| {
//! #     (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
//! # });
//! #
//! # let mut optimizer = OptimizerDriver::new(&f);
//! #
//! loop {
//!     if let Some(status) = optimizer.next().expect("optimizer error") {
//!         println!("finished with {:?} at {:?}", status, optimizer.x());
//!         break;
//!     }
//! }
//! ```

use nalgebra::{
    storage::{Storage, StorageMut},
    DVector, Dyn, IsContiguous, OVector, Vector,
};

use crate::{
    algo::cobyla::{Cobyla, CobylaError, CobylaOptions, RoundingCheck, Verbosity},
    Domain, Function, Optimizer, Problem, ProblemError, Status,
};

/// Builder for the [`OptimizerDriver`].
pub struct OptimizerBuilder<'a, F: Problem, A> {
    f: &'a F,
    dom: Domain<F::Field>,
    algo: A,
    x0: OVector<F::Field, Dyn>,
}

impl<'a, F: Function> OptimizerBuilder<'a, F, Cobyla<F>> {
    fn new(f: &'a F) -> Self {
        let dom = f.domain();
        let algo = Cobyla::new(f, &dom);
        let x0 = DVector::zeros(dom.dim());

        Self { f, dom, algo, x0 }
    }

    /// Sets the options of the default algorithm.
    pub fn with_options(mut self, options: CobylaOptions<F>) -> Self {
        self.algo = Cobyla::with_options(self.f, &self.dom, options);
        self
    }
}

impl<'a, F: Problem, A> OptimizerBuilder<'a, F, A> {
    /// Sets the initial point from which the iterative process starts.
    pub fn with_initial(mut self, x0: Vec<F::Field>) -> Self {
        self.x0 = DVector::from_vec(x0);
        self
    }

    /// Sets specific algorithm to be used.
    ///
    /// This builder method accepts a closure that takes the reference to the
    /// problem and its domain. You can simply pass the `new` constructor
    /// directly (e.g., `Cobyla::new`).
    pub fn with_algo<A2, FA>(self, factory: FA) -> OptimizerBuilder<'a, F, A2>
    where
        FA: FnOnce(&F, &Domain<F::Field>) -> A2,
    {
        let algo = factory(self.f, &self.dom);

        OptimizerBuilder {
            f: self.f,
            dom: self.dom,
            algo,
            x0: self.x0,
        }
    }

    /// Builds the [`OptimizerDriver`].
    ///
    /// The initial point is projected into the bounds of the domain, if it is
    /// of the right dimension.
    pub fn build(self) -> OptimizerDriver<'a, F, A> {
        let OptimizerBuilder {
            f,
            dom,
            algo,
            mut x0,
        } = self;

        if x0.nrows() == dom.dim() {
            dom.project(&mut x0);
        }

        OptimizerDriver {
            f,
            dom,
            algo,
            x: x0,
            status: None,
            iter: 0,
        }
    }
}

/// The driver for the process of optimization.
///
/// For default settings, use [`OptimizerDriver::new`]. For more flexibility,
/// use [`OptimizerDriver::builder`]. For the usage of the driver, see
/// [module](self) documentation.
pub struct OptimizerDriver<'a, F: Problem, A> {
    f: &'a F,
    dom: Domain<F::Field>,
    algo: A,
    x: OVector<F::Field, Dyn>,
    status: Option<Status>,
    iter: usize,
}

impl<'a, F: Function> OptimizerDriver<'a, F, Cobyla<F>> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(f: &'a F) -> OptimizerBuilder<'a, F, Cobyla<F>> {
        OptimizerBuilder::new(f)
    }

    /// Initializes the driver with the default settings.
    pub fn new(f: &'a F) -> Self {
        OptimizerDriver::builder(f).build()
    }

    /// Returns the function value in the current point.
    pub fn fx(&self) -> F::Field {
        self.algo.fx()
    }

    /// Returns the greatest constraint violation in the current point.
    pub fn resmax(&self) -> F::Field {
        self.algo.resmax()
    }

    /// Returns the current trust region radius.
    pub fn rho(&self) -> F::Field {
        self.algo.rho()
    }

    /// Returns the number of function evaluations.
    pub fn evaluations(&self) -> usize {
        self.algo.evaluations()
    }
}

impl<'a, F: Problem, A> OptimizerDriver<'a, F, A> {
    /// Returns reference to the current point.
    pub fn x(&self) -> &[F::Field] {
        self.x.as_slice()
    }

    /// Returns the final status if the process finished.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// Returns reference to the used algorithm.
    pub fn algo(&self) -> &A {
        &self.algo
    }
}

impl<'a, F: Function, A: Optimizer<F>> OptimizerDriver<'a, F, A> {
    /// Does one iteration of the process, returning the final status once the
    /// process finished.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Status>, A::Error> {
        let status = self.algo.opt_next(self.f, &self.dom, &mut self.x)?;
        self.status = status;
        self.iter += 1;
        Ok(status)
    }

    /// Runs the iterative process until the process finishes or given stopping
    /// criterion is satisfied. Returns `None` in the latter case.
    pub fn find<C>(&mut self, stop: C) -> Result<Option<Status>, A::Error>
    where
        C: Fn(OptimizerIterState<'_, F, A>) -> bool,
    {
        loop {
            let status = self.next()?;

            if status.is_some() {
                return Ok(status);
            }

            let state = OptimizerIterState {
                x: &self.x,
                algo: &self.algo,
                iter: self.iter - 1,
            };

            if stop(state) {
                return Ok(None);
            }
        }
    }

    /// Runs the iterative process until it finishes.
    pub fn run(&mut self) -> Result<Status, A::Error> {
        loop {
            if let Some(status) = self.next()? {
                return Ok(status);
            }
        }
    }

    /// Returns the name of the used optimizer.
    pub fn name(&self) -> &str {
        A::NAME
    }
}

/// State of the current iteration.
pub struct OptimizerIterState<'a, F: Problem, A> {
    x: &'a OVector<F::Field, Dyn>,
    algo: &'a A,
    iter: usize,
}

impl<'a, F: Problem, A> OptimizerIterState<'a, F, A> {
    /// Returns reference to the current point.
    pub fn x(&self) -> &[F::Field] {
        self.x.as_slice()
    }

    /// Returns the current iteration number.
    pub fn iter(&self) -> usize {
        self.iter
    }

    /// Returns reference to the used algorithm.
    pub fn algo(&self) -> &A {
        self.algo
    }
}

impl<'a, F: Function> OptimizerIterState<'a, F, Cobyla<F>> {
    /// Returns the function value in the current point.
    pub fn fx(&self) -> F::Field {
        self.algo.fx()
    }

    /// Returns the greatest constraint violation in the current point.
    pub fn resmax(&self) -> F::Field {
        self.algo.resmax()
    }

    /// Returns the current trust region radius.
    pub fn rho(&self) -> F::Field {
        self.algo.rho()
    }

    /// Returns the number of function evaluations.
    pub fn evaluations(&self) -> usize {
        self.algo.evaluations()
    }
}

/// Outcome of [`solve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    /// Reason for which the process finished.
    pub status: Status,
    /// Function value in the final point.
    pub fx: f64,
    /// Greatest constraint violation in the final point.
    pub resmax: f64,
    /// Number of function evaluations.
    pub evaluations: usize,
}

/// Minimizes a function of `n` variables subject to `m` inequality
/// constraints.
///
/// The closure takes the variables and writes the values of the constraints
/// into its second argument, a point being feasible if all of them are
/// nonnegative. It returns the function value, or [`ProblemError::Halt`] to
/// stop the process, which is then reported as
/// [`Status::MaxIterationsReached`].
///
/// The starting point `x` is overwritten by the final point. `rhobeg` and
/// `rhoend` are the initial and final radii of the trust region, `maxfun`
/// limits the number of function evaluations and `iprint` (0 to 3) controls
/// the diagnostic output written to the log. If `strict` is set, the process
/// ends with [`Status::DivergingRoundingErrors`] when rounding errors damage
/// the internal state.
///
/// ```rust
/// use cobyla::{solve, Status};
///
/// // Minimize x^2 + y^2 subject to x + y >= 1.
/// let mut x = [2.0, 2.0];
/// let report = solve(2, 1, &mut x, 0.5, 1e-7, 1000, 0, false, |x, c| {
///     c[0] = x[0] + x[1] - 1.0;
///     Ok(x[0].powi(2) + x[1].powi(2))
/// })
/// .unwrap();
///
/// assert_eq!(report.status, Status::Normal);
/// assert!((x[0] - 0.5).abs() < 1e-4 && (x[1] - 0.5).abs() < 1e-4);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn solve<E>(
    n: usize,
    m: usize,
    x: &mut [f64],
    rhobeg: f64,
    rhoend: f64,
    maxfun: usize,
    iprint: u8,
    strict: bool,
    evaluate: E,
) -> Result<Report, CobylaError>
where
    E: Fn(&[f64], &mut [f64]) -> Result<f64, ProblemError>,
{
    if n == 0 {
        return Err(CobylaError::InvalidDimension);
    }

    if x.len() != n {
        return Err(CobylaError::InvalidInitial);
    }

    let f = Evaluate { n, m, evaluate };
    let dom = f.domain();

    let mut options = CobylaOptions::default();
    options
        .set_rho_begin(rhobeg)
        .set_rho_end(rhoend)
        .set_max_evals(maxfun)
        .set_verbosity(match iprint {
            0 => Verbosity::Silent,
            1 => Verbosity::Final,
            2 => Verbosity::Rho,
            _ => Verbosity::Evaluations,
        })
        .set_rounding_check(if strict {
            RoundingCheck::Abort
        } else {
            RoundingCheck::Off
        });

    let mut algo = Cobyla::with_options(&f, &dom, options);
    let mut xv = DVector::from_column_slice(x);

    let status = loop {
        if let Some(status) = algo.opt_next(&f, &dom, &mut xv)? {
            break status;
        }
    };

    x.copy_from_slice(xv.as_slice());

    Ok(Report {
        status,
        fx: algo.fx(),
        resmax: algo.resmax(),
        evaluations: algo.evaluations(),
    })
}

/// Function given by a fallible closure.
struct Evaluate<E> {
    n: usize,
    m: usize,
    evaluate: E,
}

impl<E> Problem for Evaluate<E> {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.n)
    }

    fn constraint_count(&self) -> usize {
        self.m
    }
}

impl<E> Function for Evaluate<E>
where
    E: Fn(&[f64], &mut [f64]) -> Result<f64, ProblemError>,
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
        (self.evaluate)(x.as_slice(), cx.as_mut_slice())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use approx::assert_abs_diff_eq;

    use crate::{
        algo::Cobyla,
        testing::{HalfPlane, RosenSuzuki, ShiftedParaboloid, Sphere},
    };

    use super::*;

    struct WithDomain(pub Domain<f64>);

    impl Problem for WithDomain {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            self.0.clone()
        }
    }

    impl Function for WithDomain {
        fn apply<Sx, Scx>(
            &self,
            x: &Vector<Self::Field, Dyn, Sx>,
            _cx: &mut Vector<Self::Field, Dyn, Scx>,
        ) -> Result<Self::Field, ProblemError>
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
            Scx: StorageMut<Self::Field, Dyn> + IsContiguous,
        {
            Ok(x.norm_squared())
        }
    }

    #[test]
    fn basic_use_case() {
        let f = Sphere::new(4);
        let mut optimizer = OptimizerDriver::builder(&f)
            // Zeros are the optimum for sphere, there would be no point is
            // such test.
            .with_initial(vec![2.0; 4])
            .build();

        let status = optimizer.run().unwrap();

        assert_eq!(status, Status::Normal);
        assert_eq!(optimizer.status(), Some(Status::Normal));
        assert!(optimizer.fx() <= 1e-6);
        assert_eq!(optimizer.name(), "COBYLA");
    }

    #[test]
    fn custom_options() {
        let f = HalfPlane::new();

        let mut options = CobylaOptions::default();
        options.set_rho_begin(0.5).set_rho_end(1e-7);

        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![2.0, 2.0])
            .with_options(options)
            .build();

        assert_eq!(optimizer.run().unwrap(), Status::Normal);
        assert_abs_diff_eq!(optimizer.x()[0], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(optimizer.x()[1], 0.5, epsilon = 1e-4);
        assert!(optimizer.resmax() <= 1e-6);
    }

    #[test]
    fn custom_algo() {
        let f = ShiftedParaboloid::new();
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_algo(|f, dom| {
                let mut options = CobylaOptions::default();
                options.set_max_evals(5);
                Cobyla::with_options(f, dom, options)
            })
            .build();

        assert_eq!(optimizer.run().unwrap(), Status::MaxIterationsReached);
        assert_eq!(optimizer.algo().evaluations(), 5);
    }

    #[test]
    fn stopping_criterion() {
        let f = RosenSuzuki::new();
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![1.0; 4])
            .build();

        let status = optimizer
            .find(|state| state.evaluations() >= 20 || state.rho() < 1e-3)
            .unwrap();

        assert_eq!(status, None);
        assert!(optimizer.evaluations() >= 20 || optimizer.rho() < 1e-3);
    }

    #[test]
    fn initial() {
        let x0 = vec![10.0; 4];

        let f = Sphere::new(4);
        let optimizer = OptimizerDriver::builder(&f)
            .with_initial(x0.clone())
            .build();

        assert_eq!(optimizer.x(), &x0);
    }

    #[test]
    fn initial_in_domain() {
        let f = WithDomain(Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0]));
        let optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![10.0, -10.0])
            .build();

        assert_eq!(optimizer.x(), &[1.0, 0.0]);
    }

    #[test]
    fn solve_unconstrained() {
        let mut x = [0.0, 0.0];
        let report = solve(2, 0, &mut x, 0.5, 1e-7, 1000, 0, false, |x, _| {
            Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
        })
        .unwrap();

        assert_eq!(report.status, Status::Normal);
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-4);
        assert!(report.evaluations <= 1000);
    }

    #[test]
    fn solve_constrained() {
        let mut x = [2.0, 2.0];
        let report = solve(2, 1, &mut x, 0.5, 1e-7, 1000, 0, true, |x, c| {
            c[0] = x[0] + x[1] - 1.0;
            Ok(x[0].powi(2) + x[1].powi(2))
        })
        .unwrap();

        assert_eq!(report.status, Status::Normal);
        assert_abs_diff_eq!(x[0], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(report.fx, 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(x[0] + x[1] - 1.0, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn solve_nonlinear_constraint() {
        // Minimize x + y in the unit disk, starting outside of it.
        let mut x = [1.0, 1.0];
        let report = solve(2, 1, &mut x, 0.5, 1e-8, 2000, 0, false, |x, c| {
            c[0] = 1.0 - x[0].powi(2) - x[1].powi(2);
            Ok(x[0] + x[1])
        })
        .unwrap();

        let t = -std::f64::consts::FRAC_1_SQRT_2;

        assert_eq!(report.status, Status::Normal);
        assert_abs_diff_eq!(x[0], t, epsilon = 1e-5);
        assert_abs_diff_eq!(x[1], t, epsilon = 1e-5);
        assert!(report.resmax <= 1e-6);
        assert_eq!(report.evaluations, 87);
    }

    #[test]
    fn solve_budget() {
        let calls = Cell::new(0);
        let mut x = [1.0, 1.0, 1.0];
        let report = solve(3, 0, &mut x, 0.5, 1e-6, 4, 0, false, |x, _| {
            calls.set(calls.get() + 1);
            Ok(x.iter().map(|xi| xi * xi).sum())
        })
        .unwrap();

        assert_eq!(report.status, Status::MaxIterationsReached);
        assert_eq!(report.evaluations, 4);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn solve_halt() {
        let calls = Cell::new(0);
        let mut x = [3.0, 3.0];
        let report = solve(2, 0, &mut x, 0.5, 1e-6, 1000, 0, false, |x, _| {
            calls.set(calls.get() + 1);
            if calls.get() > 10 {
                Err(ProblemError::Halt)
            } else {
                Ok(x[0].powi(2) + x[1].powi(2))
            }
        })
        .unwrap();

        assert_eq!(report.status, Status::MaxIterationsReached);
        assert_eq!(report.evaluations, 11);
        assert!(report.fx < 18.0);
    }

    #[test]
    fn solve_preconditions() {
        let never = |_: &[f64], _: &mut [f64]| -> Result<f64, ProblemError> {
            panic!("function must not be evaluated")
        };

        let mut x = [0.0, 0.0];

        assert!(matches!(
            solve(0, 0, &mut [], 0.5, 1e-6, 10, 0, false, never),
            Err(CobylaError::InvalidDimension)
        ));
        assert!(matches!(
            solve(3, 0, &mut x, 0.5, 1e-6, 10, 0, false, never),
            Err(CobylaError::InvalidInitial)
        ));
        assert!(matches!(
            solve(2, 0, &mut x, 1e-6, 0.5, 10, 0, false, never),
            Err(CobylaError::InvalidRadius)
        ));
        assert!(matches!(
            solve(2, 0, &mut x, 0.5, 1e-6, 2, 0, false, never),
            Err(CobylaError::InvalidBudget)
        ));
    }

    #[test]
    fn solve_custom_error() {
        let mut x = [0.0];
        let result = solve(1, 0, &mut x, 0.5, 1e-6, 10, 0, false, |_, _| {
            Err(ProblemError::InvalidValue)
        });

        assert!(matches!(
            result,
            Err(CobylaError::Problem(ProblemError::InvalidValue))
        ));
    }
}
