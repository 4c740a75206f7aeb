//! Dense storage shared by the components of the algorithm.

use nalgebra::{DMatrix, DVector, RealField};

pub(crate) type Matrix<T> = DMatrix<T>;
pub(crate) type Column<T> = DVector<T>;

/// Inner product of two sequences of equal length.
///
/// The sequences can be vectors, rows or columns of a matrix. The terms are
/// accumulated strictly from left to right starting from zero, which makes the
/// result reproducible to the last bit regardless of the kind of the view.
pub(crate) fn dot<'a, T, A, B>(lhs: A, rhs: B) -> T
where
    T: RealField + Copy + 'a,
    A: IntoIterator<Item = &'a T>,
    B: IntoIterator<Item = &'a T>,
{
    lhs.into_iter()
        .zip(rhs)
        .fold(T::zero(), |acc, (l, r)| acc + *l * *r)
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::{dmatrix, dvector};

    #[test]
    fn views() {
        let m = dmatrix![1.0, 2.0; 3.0, 4.0];
        let v = dvector![1.0, -1.0];

        assert_eq!(dot(m.row(0).iter(), v.iter()), -1.0);
        assert_eq!(dot(m.column(1).iter(), v.iter()), -2.0);
        assert_eq!(dot(m.row(1).iter(), m.column(0).iter()), 3.0 + 12.0);
    }

    #[test]
    fn left_to_right_accumulation() {
        // Reassociation would yield 1.0.
        let lhs = [1e16, 1.0, -1e16];
        let rhs = [1.0, 1.0, 1.0];
        assert_eq!(dot(lhs.iter(), rhs.iter()), 0.0);
    }
}
