use nalgebra::{storage::StorageMut, Dyn, IsContiguous, Vector};

use super::{domain::Domain, function::Function};

/// Reason for which an optimizer finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The final accuracy was reached.
    Normal,
    /// The budget of function evaluations was exhausted or the function
    /// requested the process to stop.
    MaxIterationsReached,
    /// Rounding errors became damaging for the internal state of the
    /// optimizer.
    DivergingRoundingErrors,
}

/// Interface of an optimizer.
///
/// An optimizer is an iterative algorithm which takes a point _x_ and computes
/// the next step in the optimization process. Repeated calls to the next step
/// eventually reach a terminal state which is reported by [`Status`].
///
/// The unit of work of one step is up to and including one evaluation of the
/// function, so that the caller can observe and stop the process between any
/// two evaluations.
pub trait Optimizer<F: Function> {
    /// Name of the optimizer.
    const NAME: &'static str;

    /// Error while computing the next step.
    type Error;

    /// Computes the next step in the optimization process.
    ///
    /// On the first call, `x` is the starting point. After the method returns,
    /// `x` holds the best point found so far. The return value is `None` while
    /// the process is running and the final [`Status`] once it finished.
    /// Calling the method after the process finished returns the same status
    /// again without evaluating the function.
    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        x: &mut Vector<F::Field, Dyn, Sx>,
    ) -> Result<Option<Status>, Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous;
}
