//! Linear approximations of the objective and the constraints built by
//! interpolation in the vertices of the simplex.

use nalgebra::RealField;

use super::{
    dense::{dot, Column, Matrix},
    simplex::Simplex,
};

pub(crate) struct LinearModel<T: RealField + Copy> {
    /// Gradients of the constraints in columns `0..m` and the negated gradient
    /// of the objective in column `m`.
    a: Matrix<T>,
    /// Negated values of the constraints and the objective in the pole.
    b: Column<T>,
    w: Column<T>,
}

impl<T: RealField + Copy> LinearModel<T> {
    pub fn new(dim: usize, constraints: usize) -> Self {
        Self {
            a: Matrix::zeros(dim, constraints + 1),
            b: Column::zeros(constraints + 1),
            w: Column::zeros(dim),
        }
    }

    /// Recomputes the coefficients from the current simplex.
    pub fn build(&mut self, simplex: &Simplex<T>) {
        let n = simplex.dim();
        let m = simplex.constraint_count();
        let pole = simplex.pole();
        let values = simplex.values();
        let simi = simplex.inverse();

        for k in 0..=m {
            self.b[k] = -values[(k, pole)];

            for j in 0..n {
                self.w[j] = values[(k, j)] + self.b[k];
            }

            for i in 0..n {
                let temp = dot(self.w.iter(), simi.column(i).iter());
                self.a[(i, k)] = if k == m { -temp } else { temp };
            }
        }
    }

    pub fn gradients(&self) -> &Matrix<T> {
        &self.a
    }

    pub fn rhs(&self) -> &Column<T> {
        &self.b
    }

    /// Linearized change of constraint or negated objective `k` along `dx`.
    pub fn slope(&self, k: usize, dx: &Column<T>) -> T {
        dot(dx.iter(), self.a.column(k).iter())
    }

    /// Predicted greatest constraint violation and predicted increase of the
    /// objective after the step `dx` from the pole.
    pub fn predict(&self, dx: &Column<T>) -> (T, T) {
        let m = self.b.nrows() - 1;
        let mut resnew = T::zero();

        for k in 0..m {
            resnew = resnew.max(self.b[k] - self.slope(k, dx));
        }

        // The objective value of the pole is not a part of the prediction.
        let total = T::zero() - self.slope(m, dx);

        (resnew, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    fn sample<G>(simplex: &mut Simplex<f64>, g: G)
    where
        G: Fn(&[f64]) -> (f64, f64),
    {
        let n = simplex.dim();
        let pole: Vec<f64> = simplex.pole_x().copied().collect();

        for j in 0..=n {
            let mut x = pole.clone();
            if j < n {
                for (xi, di) in x.iter_mut().zip(simplex.displacement(j)) {
                    *xi += di;
                }
            }

            let (fx, c) = g(&x);
            simplex.set_values(j, &dvector![c, fx, (-c).max(0.0)]);
        }
    }

    #[test]
    fn linear_functions_are_reproduced() {
        let x0 = dvector![0.3, -0.7];
        let mut simplex = Simplex::new(&x0, 0.25, 1);
        simplex.replace_displacement(0, &dvector![0.1, 0.2]);

        sample(&mut simplex, |x| {
            (2.0 * x[0] - 3.0 * x[1] + 1.0, -x[0] + 0.5 * x[1] - 4.0)
        });

        let mut model = LinearModel::new(2, 1);
        model.build(&simplex);

        let a = model.gradients();
        assert_abs_diff_eq!(a[(0, 0)], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a[(1, 0)], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(a[(0, 1)], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a[(1, 1)], 3.0, epsilon = 1e-12);

        let b = model.rhs();
        assert_abs_diff_eq!(b[0], -(-0.3 - 0.35 - 4.0), epsilon = 1e-12);
        assert_abs_diff_eq!(b[1], -(0.6 + 2.1 + 1.0), epsilon = 1e-12);
    }

    #[test]
    fn quadratic_gradient_is_approximated() {
        let h = 1e-4;
        let x0 = dvector![1.0, -2.0];
        let mut simplex = Simplex::new(&x0, h, 1);

        sample(&mut simplex, |x| {
            (x[0] * x[0] + 3.0 * x[1] * x[1], x[0] * x[1])
        });

        let mut model = LinearModel::new(2, 1);
        model.build(&simplex);

        let a = model.gradients();
        // Gradient of the objective is (2, -12), of the constraint (-2, 1).
        assert_abs_diff_eq!(a[(0, 1)], -2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(a[(1, 1)], 12.0, epsilon = 1e-3);
        assert_abs_diff_eq!(a[(0, 0)], -2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(a[(1, 0)], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn prediction() {
        let x0 = dvector![0.0, 0.0];
        let mut simplex = Simplex::new(&x0, 1.0, 1);

        // Objective x + y, constraint x - 1.
        sample(&mut simplex, |x| (x[0] + x[1], x[0] - 1.0));

        let mut model = LinearModel::new(2, 1);
        model.build(&simplex);

        let (resnew, total) = model.predict(&dvector![0.5, -1.0]);
        assert_abs_diff_eq!(resnew, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(total, -0.5, epsilon = 1e-12);
    }
}
