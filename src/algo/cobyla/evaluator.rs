//! Evaluation of the objective and constraints with the evaluation budget.

use nalgebra::RealField;

use crate::core::{Domain, Function, ProblemError};

use super::dense::Column;

/// Calls the function, appends the bound residuals to the user constraints and
/// keeps track of the number of evaluations.
///
/// The values of one evaluation are laid out as the constraint values, then
/// the objective value and finally the greatest constraint violation. This is
/// the same layout as a vertex column of the simplex value table.
pub(crate) struct Evaluator<T: RealField + Copy> {
    cx: Column<T>,
    bounds: usize,
    evaluations: usize,
    max_evals: usize,
}

impl<T: RealField + Copy> Evaluator<T> {
    pub fn new(constraints: usize, bounds: usize, max_evals: usize) -> Self {
        Self {
            cx: Column::zeros(constraints),
            bounds,
            evaluations: 0,
            max_evals,
        }
    }

    /// Total number of inequality constraints seen by the algorithm.
    pub fn constraint_count(&self) -> usize {
        self.cx.nrows() + self.bounds
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn restart(&mut self) {
        self.evaluations = 0;
    }

    /// Evaluates the function in `x` and stores the results into `values`.
    ///
    /// Returns `false` without calling the function if doing so would exceed
    /// the budget.
    pub fn evaluate<F>(
        &mut self,
        f: &F,
        dom: &Domain<T>,
        x: &Column<T>,
        values: &mut Column<T>,
    ) -> Result<bool, ProblemError>
    where
        F: Function<Field = T>,
    {
        if self.evaluations >= self.max_evals {
            return Ok(false);
        }

        self.evaluations += 1;

        let user = self.cx.nrows();
        let m = self.constraint_count();

        let fx = f.apply(x, &mut self.cx)?;

        values.rows_mut(0, user).copy_from(&self.cx);
        dom.bound_residuals(x.as_slice(), &mut values.as_mut_slice()[user..m]);

        let resmax = values
            .rows(0, m)
            .iter()
            .fold(T::zero(), |resmax, c| resmax.max(-*c));

        values[m] = fx;
        values[m + 1] = resmax;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::dvector;

    use crate::core::{FnFunction, Problem};

    #[test]
    fn layout_and_violation() {
        let f = FnFunction::new(2, 1, |x: &[f64], cx: &mut [f64]| {
            cx[0] = x[0] + x[1] - 1.0;
            x[0] * x[1]
        });
        let dom = Domain::rect(vec![0.0, f64::NEG_INFINITY], vec![1.0, f64::INFINITY]);

        let mut evaluator = Evaluator::new(1, dom.bound_count(), 10);
        assert_eq!(evaluator.constraint_count(), 3);

        let mut values = Column::zeros(5);
        let x = dvector![2.0, -3.0];
        assert!(evaluator.evaluate(&f, &dom, &x, &mut values).unwrap());

        // x + y - 1, x - 0, 1 - x, objective, violation.
        assert_eq!(values.as_slice(), &[-2.0, 2.0, -1.0, -6.0, 2.0]);
        assert_eq!(evaluator.evaluations(), 1);
    }

    #[test]
    fn budget() {
        let f = FnFunction::new(1, 0, |x: &[f64], _: &mut [f64]| x[0]);
        let dom = f.domain();

        let mut evaluator = Evaluator::new(0, 0, 2);
        let mut values = Column::zeros(2);
        let x = dvector![1.0];

        assert!(evaluator.evaluate(&f, &dom, &x, &mut values).unwrap());
        assert!(evaluator.evaluate(&f, &dom, &x, &mut values).unwrap());
        assert!(!evaluator.evaluate(&f, &dom, &x, &mut values).unwrap());
        assert_eq!(evaluator.evaluations(), 2);
    }
}
