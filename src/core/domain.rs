//! Problem domain definition such as bound constraints for variables.

use std::iter::FromIterator;

use nalgebra::{storage::StorageMut, DVector, Dyn, OVector, RealField, Vector};

/// Domain for a problem.
#[derive(Debug, Clone)]
pub struct Domain<T: RealField + Copy> {
    lower: OVector<T, Dyn>,
    upper: OVector<T, Dyn>,
}

impl<T: RealField + Copy> Domain<T> {
    /// Creates unconstrained domain with given dimension.
    pub fn unconstrained(dim: usize) -> Self {
        assert!(dim > 0, "empty domain");

        let inf = T::from_subset(&f64::INFINITY);

        Self {
            lower: DVector::from_element(dim, -inf),
            upper: DVector::from_element(dim, inf),
        }
    }

    /// Creates rectangular domain with given bounds.
    ///
    /// Positive and negative infinity can be used to indicate value unbounded
    /// in that dimension and direction. If the entire domain is unconstrained,
    /// use [`Domain::unconstrained`] instead.
    pub fn rect(lower: Vec<T>, upper: Vec<T>) -> Self {
        assert!(
            lower.len() == upper.len(),
            "lower and upper have different size"
        );

        let dim = lower.len();
        assert!(dim > 0, "empty domain");
        assert!(
            lower.iter().zip(upper.iter()).all(|(l, u)| l <= u),
            "lower bound greater than upper bound"
        );

        Self {
            lower: DVector::from_vec(lower),
            upper: DVector::from_vec(upper),
        }
    }

    /// Gets the dimension of the domain.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Gets the lower bounds.
    pub fn lower(&self) -> &[T] {
        self.lower.as_slice()
    }

    /// Gets the upper bounds.
    pub fn upper(&self) -> &[T] {
        self.upper.as_slice()
    }

    /// Returns the number of finite bounds. Each of them is an inequality
    /// constraint for the optimizer.
    pub fn bound_count(&self) -> usize {
        self.lower
            .iter()
            .chain(self.upper.iter())
            .filter(|b| b.is_finite())
            .count()
    }

    /// Writes the residuals of finite bounds at given point into `out`.
    ///
    /// The residuals of lower bounds (`x[i] - lower[i]`) come first, followed
    /// by the residuals of upper bounds (`upper[i] - x[i]`). A residual is
    /// nonnegative if and only if the bound is satisfied. The length of `out`
    /// must be equal to [`Domain::bound_count`].
    pub fn bound_residuals(&self, x: &[T], out: &mut [T]) {
        let lower = self
            .lower
            .iter()
            .zip(x.iter())
            .filter(|(li, _)| li.is_finite())
            .map(|(li, xi)| *xi - *li);

        let upper = self
            .upper
            .iter()
            .zip(x.iter())
            .filter(|(ui, _)| ui.is_finite())
            .map(|(ui, xi)| *ui - *xi);

        out.iter_mut()
            .zip(lower.chain(upper))
            .for_each(|(o, r)| *o = r);
    }

    /// Projects given point into the domain.
    pub fn project<Sx>(&self, x: &mut Vector<T, Dyn, Sx>) -> bool
    where
        Sx: StorageMut<T, Dyn>,
    {
        let mut not_feasible = false;

        self.lower
            .iter()
            .zip(self.upper.iter())
            .zip(x.iter_mut())
            .for_each(|((li, ui), xi)| {
                if &*xi < li {
                    *xi = *li;
                    not_feasible = true;
                } else if &*xi > ui {
                    *xi = *ui;
                    not_feasible = true;
                }
            });

        not_feasible
    }
}

impl<T: RealField + Copy> FromIterator<(T, T)> for Domain<T> {
    fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
        let (lower, upper): (Vec<_>, Vec<_>) = iter.into_iter().unzip();
        Self::rect(lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::dvector;

    #[test]
    fn unconstrained_has_no_bounds() {
        let dom = Domain::<f64>::unconstrained(3);
        assert_eq!(dom.dim(), 3);
        assert_eq!(dom.bound_count(), 0);
    }

    #[test]
    fn bound_residuals_order() {
        let dom: Domain<f64> = [(0.0, f64::INFINITY), (-1.0, 2.0), (f64::NEG_INFINITY, 5.0)]
            .into_iter()
            .collect();

        assert_eq!(dom.bound_count(), 4);

        let mut out = [0.0; 4];
        dom.bound_residuals(&[1.0, 3.0, 4.0], &mut out);

        // Lower bounds of x0 and x1, then upper bounds of x1 and x2.
        assert_eq!(out, [1.0, 4.0, -1.0, 1.0]);
    }

    #[test]
    fn projection() {
        let dom = Domain::rect(vec![0.0, 0.0], vec![1.0, 1.0]);

        let mut x = dvector![0.5, 0.5];
        assert!(!dom.project(&mut x));

        let mut x = dvector![10.0, -10.0];
        assert!(dom.project(&mut x));
        assert_eq!(x.as_slice(), &[1.0, 0.0]);
    }
}
