//! Simplex of interpolation points and the table of function values at its
//! vertices.
//!
//! The last column of the simplex holds the optimal vertex (the *pole*) and
//! the other `n` columns hold the displacements from the pole to the remaining
//! vertices. The inverse of the matrix of displacements is maintained
//! incrementally by rank-one updates.

use nalgebra::{convert, RealField};

use super::dense::{dot, Column, Matrix};

pub(crate) struct Simplex<T: RealField + Copy> {
    /// Displacements in columns `0..n`, the pole in column `n`.
    sim: Matrix<T>,
    /// Inverse of the leading `n` by `n` block of `sim`.
    simi: Matrix<T>,
    /// For each vertex, the constraint values, the objective value and the
    /// greatest constraint violation.
    datmat: Matrix<T>,
    /// Reciprocal lengths of the rows of `simi`.
    vsig: Column<T>,
    /// Lengths of the displacements.
    veta: Column<T>,
}

impl<T: RealField + Copy> Simplex<T> {
    /// Creates the axis-aligned simplex with the pole in `x0` and edges of
    /// length `rho`.
    pub fn new(x0: &Column<T>, rho: T, constraints: usize) -> Self {
        let n = x0.nrows();

        let mut sim = Matrix::zeros(n, n + 1);
        let mut simi = Matrix::zeros(n, n);
        let temp = T::one() / rho;

        for i in 0..n {
            sim[(i, n)] = x0[i];
            sim[(i, i)] = rho;
            simi[(i, i)] = temp;
        }

        Self {
            sim,
            simi,
            datmat: Matrix::zeros(constraints + 2, n + 1),
            vsig: Column::zeros(n),
            veta: Column::zeros(n),
        }
    }

    pub fn dim(&self) -> usize {
        self.simi.nrows()
    }

    /// Index of the pole column.
    pub fn pole(&self) -> usize {
        self.dim()
    }

    /// Number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.datmat.nrows() - 2
    }

    pub fn pole_x(&self) -> impl Iterator<Item = &T> + '_ {
        self.displacement(self.pole())
    }

    pub fn displacement(&self, j: usize) -> impl Iterator<Item = &T> + '_ {
        let n = self.dim();
        self.sim.as_slice()[j * n..(j + 1) * n].iter()
    }

    pub fn displacements(&self) -> &Matrix<T> {
        &self.sim
    }

    pub fn inverse(&self) -> &Matrix<T> {
        &self.simi
    }

    pub fn inverse_row(&self, j: usize) -> impl Iterator<Item = &T> + '_ {
        (0..self.dim()).map(move |k| &self.simi[(j, k)])
    }

    pub fn values(&self) -> &Matrix<T> {
        &self.datmat
    }

    /// Function value at vertex `j`.
    pub fn fx(&self, j: usize) -> T {
        self.datmat[(self.constraint_count(), j)]
    }

    /// Greatest constraint violation at vertex `j`.
    pub fn resmax(&self, j: usize) -> T {
        self.datmat[(self.constraint_count() + 1, j)]
    }

    pub fn merit(&self, j: usize, parmu: T) -> T {
        self.fx(j) + parmu * self.resmax(j)
    }

    pub fn vsig(&self, j: usize) -> T {
        self.vsig[j]
    }

    pub fn veta(&self, j: usize) -> T {
        self.veta[j]
    }

    pub fn set_values(&mut self, j: usize, values: &Column<T>) {
        self.datmat.set_column(j, values);
    }

    /// Incorporates an evaluation made while the initial simplex is being
    /// built.
    ///
    /// `x` is the point that was evaluated. It differs from the pole by `rho`
    /// in coordinate `j`. If it is better than the pole, it becomes the new
    /// pole and the displacement is reversed. Otherwise `x` is moved back to
    /// the pole.
    pub fn insert_initial(&mut self, j: usize, values: &Column<T>, x: &mut Column<T>, rho: T) {
        let pole = self.pole();
        let objective = self.constraint_count();

        self.datmat.set_column(j, values);

        if self.datmat[(objective, pole)] <= values[objective] {
            x[j] = self.sim[(j, pole)];
        } else {
            self.sim[(j, pole)] = x[j];
            self.datmat.swap_columns(j, pole);

            for k in 0..=j {
                self.sim[(j, k)] = -rho;

                let mut temp = T::zero();
                for i in k..=j {
                    temp -= self.simi[(i, k)];
                }
                self.simi[(j, k)] = temp;
            }
        }
    }

    /// Finds the vertex with the least merit function value and switches it
    /// into the pole position. Returns the index of the vertex that became the
    /// pole, if any.
    ///
    /// Ties are broken in favor of the smaller constraint violation when the
    /// penalty parameter is zero.
    pub fn select_pole(&mut self, parmu: T) -> Option<usize> {
        let n = self.dim();
        let pole = self.pole();

        let mut phimin = self.merit(pole, parmu);
        let mut nbest = pole;

        for j in 0..n {
            let temp = self.merit(j, parmu);
            if temp < phimin {
                nbest = j;
                phimin = temp;
            } else if temp == phimin && parmu == T::zero() && self.resmax(j) < self.resmax(nbest)
            {
                nbest = j;
            }
        }

        if nbest == pole {
            return None;
        }

        self.datmat.swap_columns(nbest, pole);

        for i in 0..n {
            let temp = self.sim[(i, nbest)];
            self.sim[(i, nbest)] = T::zero();
            self.sim[(i, pole)] += temp;

            let mut tempa = T::zero();
            for k in 0..n {
                self.sim[(i, k)] -= temp;
                tempa -= self.simi[(k, i)];
            }
            self.simi[(nbest, i)] = tempa;
        }

        Some(nbest)
    }

    /// Whether a vertex other than the pole would be preferred under the
    /// penalty parameter `parmu`.
    pub fn pole_dethroned(&self, parmu: T) -> bool {
        let pole = self.pole();
        let phi = self.merit(pole, parmu);

        (0..self.dim()).any(|j| {
            let temp = self.merit(j, parmu);
            temp < phi
                || (temp == phi && parmu == T::zero() && self.resmax(j) < self.resmax(pole))
        })
    }

    /// Greatest deviation of `simi * displacements` from the identity.
    pub fn rounding_error(&self) -> T {
        let n = self.dim();
        let mut error = T::zero();

        for i in 0..n {
            for j in 0..n {
                let identity = if i == j { T::one() } else { T::zero() };
                let temp = dot(self.simi.row(i).iter(), self.sim.column(j).iter()) - identity;
                error = error.max(temp.abs());
            }
        }

        error
    }

    #[cfg(test)]
    pub fn scale_inverse(&mut self, factor: T) {
        self.simi *= factor;
    }

    /// Computes the lengths that characterize the shape of the simplex and
    /// returns whether the shape is acceptable for given thresholds.
    ///
    /// The simplex is acceptable if no displacement is longer than `pareta`
    /// and no vertex is closer than `parsig` to the opposite face.
    pub fn assess(&mut self, parsig: T, pareta: T) -> bool {
        let n = self.dim();
        let mut acceptable = true;

        for j in 0..n {
            let mut wsig = T::zero();
            let mut weta = T::zero();
            for k in 0..n {
                wsig += self.simi[(j, k)] * self.simi[(j, k)];
                weta += self.sim[(k, j)] * self.sim[(k, j)];
            }

            self.vsig[j] = T::one() / wsig.sqrt();
            self.veta[j] = weta.sqrt();

            if self.vsig[j] < parsig || self.veta[j] > pareta {
                acceptable = false;
            }
        }

        acceptable
    }

    /// Chooses the vertex to be replaced when the shape of the simplex is not
    /// acceptable. The longest edge above `pareta` is preferred, otherwise the
    /// vertex closest to the opposite face. Only `None` for a simplex whose
    /// every `vsig` exceeds `pareta`, which is never the case for an
    /// unacceptable one.
    pub fn worst_vertex(&self, pareta: T) -> Option<usize> {
        let n = self.dim();
        let mut jdrop = None;
        let mut temp = pareta;

        for j in 0..n {
            if self.veta[j] > temp {
                jdrop = Some(j);
                temp = self.veta[j];
            }
        }

        if jdrop.is_none() {
            for j in 0..n {
                if self.vsig[j] < temp {
                    jdrop = Some(j);
                    temp = self.vsig[j];
                }
            }
        }

        jdrop
    }

    /// Replaces displacement `j` by `dx` and updates the inverse
    /// accordingly.
    pub fn replace_displacement(&mut self, j: usize, dx: &Column<T>) {
        let n = self.dim();

        let mut temp = T::zero();
        for i in 0..n {
            self.sim[(i, j)] = dx[i];
            temp += self.simi[(j, i)] * dx[i];
        }

        for k in 0..n {
            self.simi[(j, k)] /= temp;
        }

        for i in 0..n {
            if i != j {
                let temp = dot(self.simi.row(i).iter(), dx.iter());
                for k in 0..n {
                    let pivot = self.simi[(j, k)];
                    self.simi[(i, k)] -= temp * pivot;
                }
            }
        }
    }

    /// Replaces vertex `j` by the point `pole + dx` with given values.
    pub fn replace_vertex(&mut self, j: usize, dx: &Column<T>, values: &Column<T>) {
        self.replace_displacement(j, dx);
        self.set_values(j, values);
    }

    /// Spread of the values across the simplex used for revising the penalty
    /// parameter after a reduction of the trust region radius.
    ///
    /// Returns the new penalty parameter.
    pub fn revised_parmu(&self, parmu: T) -> T {
        let n = self.dim();
        let m = self.constraint_count();
        let pole = self.pole();
        let half: T = convert(0.5);

        let mut denom = T::zero();
        let mut cmin = T::zero();
        let mut cmax = T::zero();

        for k in 0..=m {
            cmin = self.datmat[(k, pole)];
            cmax = cmin;
            for i in 0..n {
                cmin = cmin.min(self.datmat[(k, i)]);
                cmax = cmax.max(self.datmat[(k, i)]);
            }

            if k < m && cmin < half * cmax {
                let temp = cmax.max(T::zero()) - cmin;
                denom = if denom <= T::zero() {
                    temp
                } else {
                    denom.min(temp)
                };
            }
        }

        if denom == T::zero() {
            T::zero()
        } else if cmax - cmin < parmu * denom {
            (cmax - cmin) / denom
        } else {
            parmu
        }
    }
}

/// Geometric constants of the simplex management.
pub(crate) mod shape {
    /// Lower threshold on the distance of a vertex from the opposite face,
    /// relative to the radius.
    pub const ALPHA: f64 = 0.25;
    /// Upper threshold on the length of an edge, relative to the radius.
    pub const BETA: f64 = 2.1;
    /// Length of the step that improves the geometry, relative to the radius.
    pub const GAMMA: f64 = 0.5;
    /// Threshold on the distance of a vertex from the trial point for it to be
    /// dropped, relative to the radius.
    pub const DELTA: f64 = 1.1;
}

impl<T: RealField + Copy> std::fmt::Debug for Simplex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simplex")
            .field("sim", &self.sim)
            .field("simi", &self.simi)
            .field("datmat", &self.datmat)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn inverse_of_displacements(simplex: &Simplex<f64>) -> Matrix<f64> {
        let n = simplex.dim();
        simplex
            .displacements()
            .columns(0, n)
            .clone_owned()
            .try_inverse()
            .unwrap()
    }

    fn values(fx: f64, resmax: f64) -> Column<f64> {
        dvector![fx, resmax]
    }

    #[test]
    fn initial_simplex_is_axis_aligned() {
        let x0 = dvector![1.0, 2.0, 3.0];
        let simplex = Simplex::new(&x0, 0.5, 0);

        assert_eq!(simplex.pole_x().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(
            simplex.inverse().clone(),
            inverse_of_displacements(&simplex),
            epsilon = 1e-12
        );
        assert_eq!(simplex.rounding_error(), 0.0);
    }

    #[test]
    fn better_initial_vertex_becomes_pole() {
        let rho = 0.5;
        let mut x = dvector![0.0, 0.0];
        let mut simplex = Simplex::new(&x, rho, 0);
        simplex.set_values(2, &values(10.0, 0.0));

        // Better point in the first coordinate.
        x[0] += rho;
        simplex.insert_initial(0, &values(5.0, 0.0), &mut x, rho);
        assert_eq!(simplex.pole_x().copied().collect::<Vec<_>>(), vec![0.5, 0.0]);
        assert_eq!(simplex.fx(simplex.pole()), 5.0);
        assert_eq!(simplex.fx(0), 10.0);
        assert_eq!(x.as_slice(), &[0.5, 0.0]);

        // Worse point in the second coordinate.
        x[1] += rho;
        simplex.insert_initial(1, &values(7.0, 0.0), &mut x, rho);
        assert_eq!(simplex.pole_x().copied().collect::<Vec<_>>(), vec![0.5, 0.0]);
        assert_eq!(x.as_slice(), &[0.5, 0.0]);

        assert_abs_diff_eq!(
            simplex.inverse().clone(),
            inverse_of_displacements(&simplex),
            epsilon = 1e-12
        );
    }

    #[test]
    fn pole_selection_keeps_inverse() {
        let x0 = dvector![0.0, 0.0];
        let mut simplex = Simplex::new(&x0, 1.0, 0);
        simplex.set_values(0, &values(3.0, 0.0));
        simplex.set_values(1, &values(1.0, 0.0));
        simplex.set_values(2, &values(2.0, 0.0));

        assert_eq!(simplex.select_pole(0.0), Some(1));
        assert_eq!(simplex.fx(simplex.pole()), 1.0);
        assert_eq!(simplex.pole_x().copied().collect::<Vec<_>>(), vec![0.0, 1.0]);
        assert!(simplex.select_pole(0.0).is_none());

        assert_abs_diff_eq!(
            simplex.inverse().clone(),
            inverse_of_displacements(&simplex),
            epsilon = 1e-12
        );
    }

    #[test]
    fn pole_selection_tie_break() {
        let x0 = dvector![0.0];
        let mut simplex = Simplex::new(&x0, 1.0, 0);
        simplex.set_values(0, &values(1.0, 0.0));
        simplex.set_values(1, &values(1.0, 2.0));

        // Equal objective, the vertex with smaller violation wins.
        assert_eq!(simplex.select_pole(0.0), Some(0));
        assert_eq!(simplex.resmax(simplex.pole()), 0.0);
    }

    #[test]
    fn dethroned_pole() {
        let x0 = dvector![0.0];
        let mut simplex = Simplex::new(&x0, 1.0, 0);
        simplex.set_values(0, &values(2.0, 0.0));
        simplex.set_values(1, &values(1.0, 1.0));

        assert!(!simplex.pole_dethroned(0.5));
        assert!(simplex.pole_dethroned(2.0));
    }

    #[test]
    fn rank_one_updates_match_direct_inversion() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 5;

        let x0 = Column::from_fn(n, |_, _| rng.gen_range(-1.0..1.0));
        let mut simplex = Simplex::new(&x0, 0.3, 0);

        for iter in 0..50 {
            let j = iter % n;
            let dx = Column::from_fn(n, |_, _| rng.gen_range(-1.0..1.0));

            simplex.replace_vertex(j, &dx, &values(iter as f64, 0.0));

            assert_abs_diff_eq!(
                simplex.inverse().clone(),
                inverse_of_displacements(&simplex),
                epsilon = 1e-6
            );
            assert!(simplex.rounding_error() < 1e-6);
        }

        simplex.scale_inverse(2.0);
        assert!(simplex.rounding_error() > 0.1);
    }

    #[test]
    fn acceptability() {
        let x0 = dvector![0.0, 0.0];
        let rho = 1.0;
        let mut simplex = Simplex::new(&x0, rho, 0);

        let parsig = shape::ALPHA * rho;
        let pareta = shape::BETA * rho;
        assert!(simplex.assess(parsig, pareta));
        // Without a long edge, the vertex nearest to the opposite face is
        // chosen, the first one on ties.
        assert_eq!(simplex.worst_vertex(pareta), Some(0));

        // Too long edge.
        simplex.replace_displacement(1, &dvector![0.0, 3.0]);
        assert!(!simplex.assess(parsig, pareta));
        assert_eq!(simplex.worst_vertex(pareta), Some(1));
        assert_abs_diff_eq!(simplex.veta(1), 3.0);

        // Nearly degenerate simplex.
        simplex.replace_displacement(1, &dvector![1.0, 0.1]);
        assert!(!simplex.assess(parsig, pareta));
        assert_eq!(simplex.worst_vertex(pareta), Some(0));
        assert!(simplex.vsig(0) < parsig);
    }

    #[test]
    fn parmu_revision() {
        let x0 = dvector![0.0];
        let mut simplex = Simplex::new(&x0, 1.0, 1);

        // Constraint values 1.0 and -1.0, objective values 0.0 and 1.0.
        simplex.set_values(0, &dvector![1.0, 0.0, 0.0]);
        simplex.set_values(1, &dvector![-1.0, 1.0, 1.0]);

        // denom = max(1, 0) - (-1) = 2, objective spread is 1.
        assert_eq!(simplex.revised_parmu(10.0), 0.5);
        assert_eq!(simplex.revised_parmu(0.1), 0.1);

        // No constraint with a spread, the parameter is reset.
        simplex.set_values(0, &dvector![1.0, 0.0, 0.0]);
        simplex.set_values(1, &dvector![1.0, 1.0, 0.0]);
        assert_eq!(simplex.revised_parmu(10.0), 0.0);
    }
}
