//! Constrained optimization by linear approximation.
//!
//! [COBYLA](https://en.wikipedia.org/wiki/COBYLA) is a derivative-free method
//! for minimizing a function subject to inequality constraints `c_k(x) >= 0`.
//! It maintains a simplex of `n + 1` points from which linear approximations of
//! the objective and the constraints are interpolated. Each iteration solves
//! the linear program of the approximations restricted to a trust region of
//! radius `rho`, and the radius is reduced whenever the approximations can no
//! longer make progress. Infeasibility is penalized in the merit function
//! `f(x) + parmu * max(0, -c_k(x))` by a penalty parameter that is adjusted
//! automatically.
//!
//! Finite bounds in the domain of the problem are handled as additional
//! constraints. Equality constraints must be expressed as a pair of
//! inequalities.
//!
//! The method is local and converges in the sense that the final radius
//! `rho_end` is reached. Small values of `rho_end` require more function
//! evaluations.
//!
//! # References
//!
//! \[1\] [A Direct Search Optimization Method That Models the Objective and
//! Constraint Functions by Linear
//! Interpolation](https://link.springer.com/chapter/10.1007/978-94-015-8330-5_4)

mod dense;
mod evaluator;
mod model;
mod simplex;
mod subproblem;

use getset::{CopyGetters, Setters};
use log::{debug, info, warn};
use nalgebra::{
    convert, storage::StorageMut, ComplexField, Dyn, IsContiguous, RealField, Vector,
};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::core::{Domain, Function, Optimizer, Problem, ProblemError, Status};

use dense::{dot, Column};
use evaluator::Evaluator;
use model::LinearModel;
use simplex::{shape, Simplex};
use subproblem::Subproblem;

/// Amount of diagnostic output written to the `info` level of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No output.
    #[default]
    Silent,
    /// The final result.
    Final,
    /// Additionally every change of the trust region radius and the penalty
    /// parameter.
    Rho,
    /// Additionally every function evaluation.
    Evaluations,
}

/// Treatment of the self-check of the inverse of the simplex, which detects
/// accumulation of rounding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingCheck {
    /// The check is not performed.
    #[default]
    Off,
    /// A failed check is logged as a warning and the process continues.
    Warn,
    /// A failed check ends the process with
    /// [`Status::DivergingRoundingErrors`].
    Abort,
}

/// Options for [`Cobyla`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct CobylaOptions<P: Problem> {
    /// Initial trust region radius, a reasonable size of the initial changes
    /// of the variables. Default: `0.5`.
    rho_begin: P::Field,
    /// Final trust region radius, the required accuracy in the variables.
    /// Default: `1e-6`.
    rho_end: P::Field,
    /// Maximum number of function evaluations. Default: `1000`.
    max_evals: usize,
    /// Diagnostic output. Default: [`Verbosity::Silent`].
    verbosity: Verbosity,
    /// Self-check of rounding errors. Default: [`RoundingCheck::Off`].
    rounding_check: RoundingCheck,
}

impl<P: Problem> Default for CobylaOptions<P> {
    fn default() -> Self {
        Self {
            rho_begin: convert(0.5),
            rho_end: convert(1e-6),
            max_evals: 1000,
            verbosity: Verbosity::Silent,
            rounding_check: RoundingCheck::Off,
        }
    }
}

/// Error returned from [`Cobyla`] optimizer.
#[derive(Debug, Error)]
pub enum CobylaError {
    /// The problem has no variables.
    #[error("number of variables must be positive")]
    InvalidDimension,
    /// The radii do not satisfy `rho_begin > rho_end > 0`.
    #[error("initial radius must be greater than final radius and both must be positive")]
    InvalidRadius,
    /// The budget does not allow to build the initial simplex.
    #[error("maximum number of evaluations must be at least the number of variables plus one")]
    InvalidBudget,
    /// The initial point has wrong dimension or contains non-finite values.
    #[error("invalid initial point")]
    InvalidInitial,
    /// Evaluation of the function failed.
    #[error("{0}")]
    Problem(#[from] ProblemError),
}

/// What the pending evaluation is for.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    /// A vertex of the simplex, either while the initial simplex is being
    /// built or when its geometry is improved.
    Vertex(usize),
    /// The point given by the trust region step.
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Init,
    Evaluate(Pending),
    Iterate,
    Reduce,
    Done(Status),
}

/// COBYLA optimizer.
///
/// See [module](self) documentation for more details.
pub struct Cobyla<F: Function> {
    options: CobylaOptions<F>,
    evaluator: Evaluator<F::Field>,
    simplex: Simplex<F::Field>,
    model: LinearModel<F::Field>,
    subproblem: Subproblem<F::Field>,
    values: Column<F::Field>,
    trial: Column<F::Field>,
    dx: Column<F::Field>,
    sigbar: Column<F::Field>,
    best: Column<F::Field>,
    phase: Phase,
    rho: F::Field,
    parmu: F::Field,
    parsig: F::Field,
    pareta: F::Field,
    prerec: F::Field,
    prerem: F::Field,
    acceptable: bool,
    branched: bool,
}

impl<F: Function> Cobyla<F> {
    /// Initializes COBYLA optimizer with default options.
    pub fn new(f: &F, dom: &Domain<F::Field>) -> Self {
        Self::with_options(f, dom, CobylaOptions::default())
    }

    /// Initializes COBYLA optimizer with given options.
    pub fn with_options(f: &F, dom: &Domain<F::Field>, options: CobylaOptions<F>) -> Self {
        let n = dom.dim();
        let evaluator = Evaluator::new(f.constraint_count(), dom.bound_count(), options.max_evals);
        let m = evaluator.constraint_count();

        Self {
            evaluator,
            simplex: Simplex::new(&Column::zeros(n), F::Field::one(), m),
            model: LinearModel::new(n, m),
            subproblem: Subproblem::new(n, m),
            values: Column::zeros(m + 2),
            trial: Column::zeros(n),
            dx: Column::zeros(n),
            sigbar: Column::zeros(n),
            best: Column::zeros(n),
            phase: Phase::Init,
            rho: options.rho_begin,
            parmu: F::Field::zero(),
            parsig: F::Field::zero(),
            pareta: F::Field::zero(),
            prerec: F::Field::zero(),
            prerem: F::Field::zero(),
            acceptable: false,
            branched: false,
            options,
        }
    }

    /// Resets the internal state of the optimizer. The next step starts from
    /// the point given to it.
    pub fn reset(&mut self) {
        self.evaluator.restart();
        self.phase = Phase::Init;
        self.rho = self.options.rho_begin;
        self.parmu = F::Field::zero();
        self.acceptable = false;
        self.branched = false;
    }

    /// Returns the best point found so far.
    pub fn x(&self) -> &[F::Field] {
        self.best.as_slice()
    }

    /// Returns the function value in the best point.
    pub fn fx(&self) -> F::Field {
        self.simplex.fx(self.simplex.pole())
    }

    /// Returns the greatest constraint violation in the best point.
    pub fn resmax(&self) -> F::Field {
        self.simplex.resmax(self.simplex.pole())
    }

    /// Returns the current trust region radius.
    pub fn rho(&self) -> F::Field {
        self.rho
    }

    /// Returns the current penalty parameter.
    pub fn parmu(&self) -> F::Field {
        self.parmu
    }

    /// Returns the number of function evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluator.evaluations()
    }

    /// Returns the final status if the process finished.
    pub fn status(&self) -> Option<Status> {
        match self.phase {
            Phase::Done(status) => Some(status),
            _ => None,
        }
    }

    fn validate<Sx>(&self, x: &Vector<F::Field, Dyn, Sx>) -> Result<(), CobylaError>
    where
        Sx: StorageMut<F::Field, Dyn>,
    {
        let n = self.trial.nrows();
        let CobylaOptions {
            rho_begin,
            rho_end,
            max_evals,
            ..
        } = self.options;

        if n == 0 {
            return Err(CobylaError::InvalidDimension);
        }

        if x.nrows() != n || x.iter().any(|xi| !xi.is_finite()) {
            return Err(CobylaError::InvalidInitial);
        }

        if !(rho_end > F::Field::zero() && rho_begin > rho_end && rho_begin.is_finite()) {
            return Err(CobylaError::InvalidRadius);
        }

        if max_evals < n + 1 {
            return Err(CobylaError::InvalidBudget);
        }

        Ok(())
    }

    fn start(&mut self) -> Phase {
        let m = self.evaluator.constraint_count();

        self.rho = self.options.rho_begin;
        self.parmu = F::Field::zero();
        self.branched = false;
        self.simplex = Simplex::new(&self.trial, self.rho, m);

        if self.options.verbosity >= Verbosity::Rho {
            info!(
                "the initial value of rho is {} and parmu is set to zero",
                self.rho
            );
        }

        Phase::Evaluate(Pending::Vertex(self.simplex.pole()))
    }

    /// Incorporates the evaluation of a vertex.
    fn vertex_evaluated(&mut self, jdrop: usize) -> Phase {
        let n = self.simplex.dim();
        let evaluations = self.evaluator.evaluations();

        if evaluations <= n + 1 && jdrop < n {
            self.simplex
                .insert_initial(jdrop, &self.values, &mut self.trial, self.rho);
        } else {
            self.simplex.set_values(jdrop, &self.values);
        }

        if evaluations <= n {
            let j = evaluations - 1;
            self.trial[j] += self.rho;
            return Phase::Evaluate(Pending::Vertex(j));
        }

        self.branched = true;
        Phase::Iterate
    }

    /// Switches the best vertex into the pole, rebuilds the linear models and
    /// either improves the geometry of the simplex or computes the trust
    /// region step.
    fn iterate(&mut self) -> Phase {
        let n = self.simplex.dim();
        let pole = self.simplex.pole();

        if let Some(nbest) = self.simplex.select_pole(self.parmu) {
            debug!(
                "vertex {} becomes the pole,\tfx = {}, resmax = {}",
                nbest,
                self.simplex.fx(pole),
                self.simplex.resmax(pole)
            );
        }

        if self.options.rounding_check != RoundingCheck::Off {
            let error = self.simplex.rounding_error();
            if error > convert(0.1) {
                if self.options.rounding_check == RoundingCheck::Abort {
                    return Phase::Done(Status::DivergingRoundingErrors);
                }

                warn!("inverse of the simplex is inaccurate, error = {}", error);
            }
        }

        self.model.build(&self.simplex);

        self.parsig = convert::<f64, F::Field>(shape::ALPHA) * self.rho;
        self.pareta = convert::<f64, F::Field>(shape::BETA) * self.rho;
        self.acceptable = self.simplex.assess(self.parsig, self.pareta);

        if !self.branched && !self.acceptable {
            if let Some(jdrop) = self.simplex.worst_vertex(self.pareta) {
                return self.improve_geometry(jdrop);
            }
        }

        let full = self.subproblem.solve(&self.model, self.rho, &mut self.dx);

        if !full {
            let length = dot(self.dx.iter(), self.dx.iter());
            if length < convert::<f64, F::Field>(0.25) * self.rho * self.rho {
                debug!("step is too short, length = {}", length.sqrt());
                self.branched = true;
                return Phase::Reduce;
            }
        }

        let (resnew, total) = self.model.predict(&self.dx);

        self.prerec = self.simplex.resmax(pole) - resnew;
        let barmu = if self.prerec > F::Field::zero() {
            total / self.prerec
        } else {
            F::Field::zero()
        };

        if self.parmu < convert::<f64, F::Field>(1.5) * barmu {
            self.parmu = convert::<f64, F::Field>(2.0) * barmu;

            if self.options.verbosity >= Verbosity::Rho {
                info!("increase in parmu to {}", self.parmu);
            }

            if self.simplex.pole_dethroned(self.parmu) {
                return Phase::Iterate;
            }
        }

        self.prerem = self.parmu * self.prerec - total;

        for (i, xi) in self.trial.iter_mut().enumerate() {
            *xi = self.simplex.displacements()[(i, n)] + self.dx[i];
        }

        debug!(
            "trust region step of length {}, full = {}, predicted reduction = {}",
            self.dx.norm(),
            full,
            self.prerem
        );

        self.branched = true;
        Phase::Evaluate(Pending::Trial)
    }

    /// Replaces vertex `jdrop` by a point that improves the shape of the
    /// simplex.
    fn improve_geometry(&mut self, jdrop: usize) -> Phase {
        let n = self.simplex.dim();
        let m = self.simplex.constraint_count();
        let pole = self.simplex.pole();

        let temp = convert::<f64, F::Field>(shape::GAMMA) * self.rho * self.simplex.vsig(jdrop);
        for (dxk, simi) in self.dx.iter_mut().zip(self.simplex.inverse_row(jdrop)) {
            *dxk = temp * *simi;
        }

        // Choose the sign that is more favorable for the greatest linearized
        // constraint violation.
        let mut cvmaxp = F::Field::zero();
        let mut cvmaxm = F::Field::zero();
        let mut total = F::Field::zero();

        for k in 0..=m {
            total = self.model.slope(k, &self.dx);
            if k < m {
                let temp = self.simplex.values()[(k, pole)];
                cvmaxp = cvmaxp.max(-total - temp);
                cvmaxm = cvmaxm.max(total - temp);
            }
        }

        let dxsign = if self.parmu * (cvmaxp - cvmaxm) > convert::<f64, F::Field>(2.0) * total {
            -F::Field::one()
        } else {
            F::Field::one()
        };

        self.dx *= dxsign;
        self.simplex.replace_displacement(jdrop, &self.dx);

        for i in 0..n {
            self.trial[i] = self.simplex.displacements()[(i, n)] + self.dx[i];
        }

        debug!(
            "improving geometry by replacing vertex {}, step = {:?}",
            jdrop,
            self.dx.as_slice()
        );

        Phase::Evaluate(Pending::Vertex(jdrop))
    }

    /// Decides whether the trial point replaces a vertex of the simplex.
    fn trial_evaluated(&mut self) -> Phase {
        let n = self.simplex.dim();
        let m = self.simplex.constraint_count();
        let pole = self.simplex.pole();
        let zero = F::Field::zero();

        let fx = self.values[m];
        let resmax = self.values[m + 1];

        let vmold = self.simplex.merit(pole, self.parmu);
        let vmnew = fx + self.parmu * resmax;
        let mut trured = vmold - vmnew;

        if self.parmu == zero && fx == self.simplex.fx(pole) {
            self.prerem = self.prerec;
            trured = self.simplex.resmax(pole) - resmax;
        }

        // The vertex to be replaced, which is mandatory if the merit function
        // decreased.
        let mut ratio = if trured <= zero {
            F::Field::one()
        } else {
            zero
        };
        let mut jdrop = None;

        for j in 0..n {
            let temp = dot(self.simplex.inverse_row(j), self.dx.iter()).abs();
            if temp > ratio {
                jdrop = Some(j);
                ratio = temp;
            }
            self.sigbar[j] = temp * self.simplex.vsig(j);
        }

        let mut edgmax = convert::<f64, F::Field>(shape::DELTA) * self.rho;
        let mut far = None;

        for j in 0..n {
            if self.sigbar[j] >= self.parsig || self.sigbar[j] >= self.simplex.vsig(j) {
                let temp = if trured > zero {
                    self.dx
                        .iter()
                        .zip(self.simplex.displacement(j))
                        .fold(zero, |sum, (dxk, simk)| sum + (*dxk - *simk) * (*dxk - *simk))
                        .sqrt()
                } else {
                    self.simplex.veta(j)
                };

                if temp > edgmax {
                    far = Some(j);
                    edgmax = temp;
                }
            }
        }

        if far.is_some() {
            jdrop = far;
        }

        debug!(
            "trial point,\tfx = {}, resmax = {}, reduction = {} (predicted {})",
            fx, resmax, trured, self.prerem
        );

        if let Some(jdrop) = jdrop {
            self.simplex.replace_vertex(jdrop, &self.dx, &self.values);
            debug!("trial point replaces vertex {}", jdrop);

            if trured > zero && trured >= convert::<f64, F::Field>(0.1) * self.prerem {
                return Phase::Iterate;
            }
        }

        Phase::Reduce
    }

    /// Reduces the trust region radius if the simplex is acceptable.
    fn reduce(&mut self) -> Phase {
        if !self.acceptable {
            self.branched = false;
            return Phase::Iterate;
        }

        let rho_end = self.options.rho_end;

        if self.rho <= rho_end {
            return Phase::Done(Status::Normal);
        }

        self.rho *= convert::<f64, F::Field>(0.5);
        if self.rho <= convert::<f64, F::Field>(1.5) * rho_end {
            self.rho = rho_end;
        }

        if self.parmu > F::Field::zero() {
            self.parmu = self.simplex.revised_parmu(self.parmu);
        }

        debug!("reduction in rho to {} and parmu = {}", self.rho, self.parmu);

        if self.options.verbosity >= Verbosity::Rho {
            info!("reduction in rho to {} and parmu = {}", self.rho, self.parmu);
        }

        if self.options.verbosity == Verbosity::Rho {
            let pole = self.simplex.pole();
            self.report(
                self.simplex.fx(pole),
                self.simplex.resmax(pole),
                self.simplex.pole_x().copied().collect(),
            );
        }

        Phase::Iterate
    }

    fn report(&self, fx: F::Field, resmax: F::Field, x: Vec<F::Field>) {
        info!(
            "evaluations = {}, f = {}, maxcv = {}",
            self.evaluator.evaluations(),
            fx,
            resmax
        );
        info!("x = {:?}", x);
    }

    fn finish(&mut self, status: Status) {
        self.publish();
        self.phase = Phase::Done(status);

        if self.options.verbosity >= Verbosity::Final {
            match status {
                Status::Normal => info!("normal return from COBYLA"),
                Status::MaxIterationsReached => {
                    info!("return from COBYLA because the limit of evaluations has been reached")
                }
                Status::DivergingRoundingErrors => {
                    info!("return from COBYLA because rounding errors are becoming damaging")
                }
            }

            info!(
                "evaluations = {}, f = {}, maxcv = {}",
                self.evaluator.evaluations(),
                self.fx(),
                self.resmax()
            );
        }

        if self.options.verbosity >= Verbosity::Rho {
            info!("x = {:?}", self.best.as_slice());
        }
    }

    fn publish(&mut self) {
        for (b, x) in self.best.iter_mut().zip(self.simplex.pole_x()) {
            *b = *x;
        }
    }
}

impl<F: Function> Optimizer<F> for Cobyla<F> {
    const NAME: &'static str = "COBYLA";

    type Error = CobylaError;

    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        x: &mut Vector<F::Field, Dyn, Sx>,
    ) -> Result<Option<Status>, Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
    {
        loop {
            self.phase = match self.phase {
                Phase::Init => {
                    self.validate(x)?;
                    self.trial.copy_from(x);
                    self.start()
                }
                Phase::Iterate => self.iterate(),
                Phase::Reduce => self.reduce(),
                Phase::Evaluate(pending) => {
                    let evaluated =
                        match self
                            .evaluator
                            .evaluate(f, dom, &self.trial, &mut self.values)
                        {
                            Ok(evaluated) => evaluated,
                            Err(ProblemError::Halt) => {
                                debug!("evaluation halted by the function");
                                false
                            }
                            Err(error) => return Err(error.into()),
                        };

                    if !evaluated {
                        self.finish(Status::MaxIterationsReached);
                        x.copy_from(&self.best);
                        return Ok(Some(Status::MaxIterationsReached));
                    }

                    let verbosity = self.options.verbosity;
                    if verbosity == Verbosity::Evaluations
                        || (verbosity == Verbosity::Rho && self.evaluator.evaluations() == 1)
                    {
                        let m = self.simplex.constraint_count();
                        self.report(
                            self.values[m],
                            self.values[m + 1],
                            self.trial.iter().copied().collect(),
                        );
                    }

                    let next = match pending {
                        Pending::Vertex(jdrop) => self.vertex_evaluated(jdrop),
                        Pending::Trial => self.trial_evaluated(),
                    };

                    self.phase = next;
                    self.publish();
                    x.copy_from(&self.best);

                    return Ok(None);
                }
                Phase::Done(status) => {
                    x.copy_from(&self.best);
                    return Ok(Some(status));
                }
            };

            if let Phase::Done(status) = self.phase {
                self.finish(status);
                x.copy_from(&self.best);
                return Ok(Some(status));
            }
        }
    }
}
