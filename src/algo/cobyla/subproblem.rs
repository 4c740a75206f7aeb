//! Trust region subproblem of the linear models.
//!
//! The step is computed in two stages. In the first stage, the step is the
//! shortest vector that minimizes the greatest violation of the linearized
//! constraints
//!
//! ```text
//! a_k^T dx >= b_k,  k = 0, ..., m - 1
//! ```
//!
//! subject to `|dx| <= rho`. If its length is strictly less than `rho`, the
//! resultant freedom is used in the second stage to minimize the linearized
//! objective `-a_m^T dx` subject to no increase in any greatest constraint
//! violation. The gradient of the objective is thus regarded as the gradient
//! of one more constraint, and the two stages differ only in whether this
//! constraint takes part.
//!
//! The method is of active set type. The first `nact` columns of the
//! orthogonal matrix `z` are the result of Gram-Schmidt orthogonalization
//! applied to the gradients of the active constraints, and `zdota[j]` is the
//! scalar product of column `j` of `z` with the gradient of the `j`-th active
//! constraint. The active set is revised by Givens rotations. Scalar products
//! that could be zero within the rounding errors are set to zero, with the
//! tolerance estimated from the magnitudes of their terms.

use log::debug;
use nalgebra::{convert, RealField};

use super::{
    dense::{dot, Column, Matrix},
    model::LinearModel,
};

/// Number of consecutive iterations without progress that end a stage.
const PATIENCE: usize = 3;

enum Exit {
    /// The iteration ended in a point. `full` is true if the point lies on the
    /// boundary of the trust region.
    Finished { full: bool },
    /// No further progress can be made in the current stage.
    Stalled,
}

pub(crate) struct Subproblem<T: RealField + Copy> {
    z: Matrix<T>,
    zdota: Column<T>,
    /// Lagrange multipliers of the active constraints followed by the
    /// residuals of the inactive constraints, in the order given by `iact`.
    vmultc: Column<T>,
    vmultd: Column<T>,
    sdirn: Column<T>,
    dxnew: Column<T>,
    /// Indices of the active constraints followed by a permutation of the
    /// indices of the inactive constraints.
    iact: Vec<usize>,
    nact: usize,
    /// Number of constraints that take part in the current stage.
    mcon: usize,
    icon: usize,
    resmax: T,
}

impl<T: RealField + Copy> Subproblem<T> {
    pub fn new(dim: usize, constraints: usize) -> Self {
        Self {
            z: Matrix::zeros(dim, dim),
            zdota: Column::zeros(constraints + 1),
            vmultc: Column::zeros(constraints + 1),
            vmultd: Column::zeros(constraints + 1),
            sdirn: Column::zeros(dim),
            dxnew: Column::zeros(dim),
            iact: vec![0; constraints + 1],
            nact: 0,
            mcon: constraints,
            icon: 0,
            resmax: T::zero(),
        }
    }

    fn constraint_count(&self) -> usize {
        self.iact.len() - 1
    }

    /// Computes the step `dx` for the model within the trust region of radius
    /// `rho`.
    ///
    /// Returns `true` if the step reaches the boundary of the trust region. A
    /// shorter step is a sign of a degeneracy.
    pub fn solve(&mut self, model: &LinearModel<T>, rho: T, dx: &mut Column<T>) -> bool {
        let m = self.constraint_count();
        let b = model.rhs();

        self.z.fill_with_identity();
        self.sdirn.fill(T::zero());
        dx.fill(T::zero());

        self.nact = 0;
        self.mcon = m;
        self.icon = 0;
        self.resmax = T::zero();

        for k in 0..m {
            if b[k] > self.resmax {
                self.resmax = b[k];
                self.icon = k;
            }
        }

        for k in 0..m {
            self.iact[k] = k;
            self.vmultc[k] = self.resmax - b[k];
        }

        let mut first = true;

        loop {
            if !first || self.resmax == T::zero() {
                // Switch to the second stage.
                self.mcon = m + 1;
                self.icon = m;
                self.iact[m] = m;
                self.vmultc[m] = T::zero();
            }
            first = false;

            match self.iterate(model, rho, dx) {
                Exit::Finished { full: true } => return true,
                Exit::Finished { full: false } => {}
                Exit::Stalled if self.mcon == m => {}
                Exit::Stalled => {
                    debug!("subproblem stalled with {} active constraints", self.nact);
                    return false;
                }
            }
        }
    }

    fn iterate(&mut self, model: &LinearModel<T>, rho: T, dx: &mut Column<T>) -> Exit {
        let n = dx.nrows();
        let m = self.constraint_count();
        let a = model.gradients();
        let b = model.rhs();

        let tiny: T = convert(1e-6);
        let tenth: T = convert(0.1);
        let fifth: T = convert(0.2);

        let mut optold = T::zero();
        let mut nactx = 0;
        let mut icount = 0;

        loop {
            let optnew = if self.mcon == m {
                self.resmax
            } else {
                -dot(dx.iter(), a.column(m).iter())
            };

            if icount == 0 || optnew < optold {
                optold = optnew;
                nactx = self.nact;
                icount = PATIENCE;
            } else if self.nact > nactx {
                nactx = self.nact;
                icount = PATIENCE;
            } else {
                icount -= 1;
            }

            if icount == 0 {
                return Exit::Stalled;
            }

            let revised = if self.icon < self.nact {
                self.deactivate(a)
            } else {
                self.activate(a)
            };

            if !revised {
                return Exit::Stalled;
            }

            // Step to the boundary of the trust region, or the step that
            // reduces the greatest violation to zero in the first stage.
            let mut dd = rho * rho;
            let mut sd = T::zero();
            let mut ss = T::zero();

            for i in 0..n {
                if dx[i].abs() >= tiny * rho {
                    dd -= dx[i] * dx[i];
                }
                sd += dx[i] * self.sdirn[i];
                ss += self.sdirn[i] * self.sdirn[i];
            }

            if dd <= T::zero() {
                return Exit::Stalled;
            }

            let mut temp = (ss * dd).sqrt();
            if sd.abs() >= tiny * temp {
                temp = (ss * dd + sd * sd).sqrt();
            }

            let stpful = dd / (temp + sd);
            let mut step = stpful;

            if self.mcon == m {
                let acca = step + tenth * self.resmax;
                let accb = step + fifth * self.resmax;
                if step >= acca || acca >= accb {
                    return Exit::Finished { full: true };
                }
                step = step.min(self.resmax);
            }

            self.advance(dx, step);

            let resold = self.resmax;
            if self.mcon == m {
                self.resmax = T::zero();
                for k in 0..self.nact {
                    let kk = self.iact[k];
                    let temp = b[kk] - dot(self.dxnew.iter(), a.column(kk).iter());
                    self.resmax = self.resmax.max(temp);
                }
            }

            // Multipliers that would occur if the step was taken.
            for k in (0..self.nact).rev() {
                let (mut zdotw, zdwabs) = self.z_dot(k, &self.dxnew);
                if !significant(zdwabs, zdotw) {
                    zdotw = T::zero();
                }

                self.vmultd[k] = zdotw / self.zdota[k];

                if k >= 1 {
                    let kk = self.iact[k];
                    let mult = self.vmultd[k];
                    for i in 0..n {
                        self.dxnew[i] -= mult * a[(i, kk)];
                    }
                }
            }

            if self.mcon > m && self.nact > 0 {
                let last = self.nact - 1;
                self.vmultd[last] = self.vmultd[last].max(T::zero());
            }

            // Residuals of the inactive constraints.
            self.advance(dx, step);

            for k in self.nact..self.mcon {
                let kk = self.iact[k];
                let mut total = self.resmax - b[kk];
                let mut sumabs = self.resmax + b[kk].abs();

                for i in 0..n {
                    let temp = a[(i, kk)] * self.dxnew[i];
                    total += temp;
                    sumabs += temp.abs();
                }

                if !significant(sumabs, total) {
                    total = T::zero();
                }

                self.vmultd[k] = total;
            }

            // Fraction of the step that keeps the multipliers nonnegative.
            let mut ratio = T::one();
            let mut icon = None;

            for k in 0..self.mcon {
                if self.vmultd[k] < T::zero() {
                    let temp = self.vmultc[k] / (self.vmultc[k] - self.vmultd[k]);
                    if temp < ratio {
                        ratio = temp;
                        icon = Some(k);
                    }
                }
            }

            let temp = T::one() - ratio;
            for k in 0..n {
                dx[k] = temp * dx[k] + ratio * self.dxnew[k];
            }
            for k in 0..self.mcon {
                self.vmultc[k] = (temp * self.vmultc[k] + ratio * self.vmultd[k]).max(T::zero());
            }
            if self.mcon == m {
                self.resmax = resold + ratio * (self.resmax - resold);
            }

            match icon {
                Some(icon) => self.icon = icon,
                None => return Exit::Finished { full: step == stpful },
            }
        }
    }

    /// Removes the constraint with index `iact[icon]` from the active set.
    fn deactivate(&mut self, a: &Matrix<T>) -> bool {
        let m = self.constraint_count();

        if self.icon + 1 < self.nact {
            let isave = self.iact[self.icon];
            let vsave = self.vmultc[self.icon];

            let mut k = self.icon;
            loop {
                let kp = k + 1;
                let kk = self.iact[kp];
                self.rotate_out(a, k, kp, kk);
                self.iact[k] = kk;
                self.vmultc[k] = self.vmultc[kp];
                k = kp;

                if k + 1 >= self.nact {
                    break;
                }
            }

            self.iact[k] = isave;
            self.vmultc[k] = vsave;
        }

        self.nact -= 1;

        if self.mcon > m {
            let last = match self.nact.checked_sub(1) {
                Some(last) => last,
                None => return false,
            };
            self.stage_two_direction(last);
        } else {
            let nact = self.nact;
            let temp = dot(self.sdirn.iter(), self.z.column(nact).iter());
            for k in 0..self.sdirn.nrows() {
                self.sdirn[k] -= temp * self.z[(k, nact)];
            }
        }

        true
    }

    /// Adds the constraint with index `iact[icon]` to the active set, making
    /// room for it by a deletion if its gradient depends linearly on the
    /// gradients of the active constraints.
    fn activate(&mut self, a: &Matrix<T>) -> bool {
        let n = self.z.nrows();
        let m = self.constraint_count();

        let kk = self.iact[self.icon];
        self.dxnew.copy_from(&a.column(kk));

        // Rotate the trailing columns of z so that they become orthogonal to
        // the new gradient.
        let mut tot = T::zero();

        for k in (self.nact..n).rev() {
            let (mut sp, spabs) = self.z_dot(k, &self.dxnew);
            if !significant(spabs, sp) {
                sp = T::zero();
            }

            if tot == T::zero() {
                tot = sp;
            } else {
                let kp = k + 1;
                let temp = (sp * sp + tot * tot).sqrt();
                let alpha = sp / temp;
                let beta = tot / temp;
                tot = temp;

                for i in 0..n {
                    let temp = alpha * self.z[(i, k)] + beta * self.z[(i, kp)];
                    self.z[(i, kp)] = alpha * self.z[(i, kp)] - beta * self.z[(i, k)];
                    self.z[(i, k)] = temp;
                }
            }
        }

        if tot == T::zero() {
            // The new gradient is a linear combination of the active ones.
            // Find the multipliers of the combination and the active
            // constraint to be dropped.
            let mut ratio = -T::one();

            for k in (0..self.nact).rev() {
                let (zdotv, zdvabs) = self.z_dot(k, &self.dxnew);

                if significant(zdvabs, zdotv) {
                    let temp = zdotv / self.zdota[k];
                    if temp > T::zero() && self.iact[k] < m {
                        let tempa = self.vmultc[k] / temp;
                        if ratio < T::zero() || tempa < ratio {
                            ratio = tempa;
                        }
                    }

                    if k >= 1 {
                        let kw = self.iact[k];
                        for i in 0..n {
                            self.dxnew[i] -= temp * a[(i, kw)];
                        }
                    }

                    self.vmultd[k] = temp;
                } else {
                    self.vmultd[k] = T::zero();
                }
            }

            if ratio < T::zero() {
                return false;
            }

            for k in 0..self.nact {
                self.vmultc[k] = (self.vmultc[k] - ratio * self.vmultd[k]).max(T::zero());
            }

            let last = self.nact - 1;
            let temp = dot(self.z.column(last).iter(), a.column(kk).iter());
            if temp == T::zero() {
                return false;
            }

            self.zdota[last] = temp;
            self.vmultc[self.icon] = T::zero();
            self.vmultc[last] = ratio;
        } else {
            self.nact += 1;
            let last = self.nact - 1;
            self.zdota[last] = tot;
            self.vmultc[self.icon] = self.vmultc[last];
            self.vmultc[last] = T::zero();
        }

        let last = self.nact - 1;
        self.iact[self.icon] = self.iact[last];
        self.iact[last] = kk;

        // The objective stays the last active constraint in the second stage.
        if self.mcon > m && kk != m {
            if let Some(k) = last.checked_sub(1) {
                self.rotate_out(a, k, last, kk);
                self.iact[last] = self.iact[k];
                self.iact[k] = kk;
                self.vmultc.swap_rows(k, last);
            }
        }

        if self.mcon > m {
            self.stage_two_direction(last);
        } else {
            let kk = self.iact[last];
            let temp = (dot(self.sdirn.iter(), a.column(kk).iter()) - T::one()) / self.zdota[last];
            for k in 0..n {
                self.sdirn[k] -= temp * self.z[(k, last)];
            }
        }

        true
    }

    /// Givens rotation of columns `k` and `kp` of `z` that exchanges the
    /// order of the two active constraints, the gradient of the one now at
    /// `kp` being `a[:, kk]`.
    fn rotate_out(&mut self, a: &Matrix<T>, k: usize, kp: usize, kk: usize) {
        let n = self.z.nrows();

        let sp = dot(self.z.column(k).iter(), a.column(kk).iter());
        let temp = (sp * sp + self.zdota[kp] * self.zdota[kp]).sqrt();
        let alpha = self.zdota[kp] / temp;
        let beta = sp / temp;
        self.zdota[kp] = alpha * self.zdota[k];
        self.zdota[k] = temp;

        for i in 0..n {
            let temp = alpha * self.z[(i, kp)] + beta * self.z[(i, k)];
            self.z[(i, kp)] = alpha * self.z[(i, k)] - beta * self.z[(i, kp)];
            self.z[(i, k)] = temp;
        }
    }

    fn stage_two_direction(&mut self, last: usize) {
        let temp = T::one() / self.zdota[last];
        for k in 0..self.sdirn.nrows() {
            self.sdirn[k] = temp * self.z[(k, last)];
        }
    }

    /// Sets `dxnew` to the point `dx + step * sdirn`.
    fn advance(&mut self, dx: &Column<T>, step: T) {
        for k in 0..dx.nrows() {
            self.dxnew[k] = dx[k] + step * self.sdirn[k];
        }
    }

    /// Scalar product of column `k` of `z` with `v` together with the sum of
    /// magnitudes of its terms.
    fn z_dot(&self, k: usize, v: &Column<T>) -> (T, T) {
        self.z
            .column(k)
            .iter()
            .zip(v.iter())
            .fold((T::zero(), T::zero()), |(sum, sumabs), (zi, vi)| {
                let temp = *zi * *vi;
                (sum + temp, sumabs + temp.abs())
            })
    }
}

/// Whether a scalar product with given sum of magnitudes of its terms is
/// distinguishable from zero in the presence of rounding errors.
fn significant<T: RealField + Copy>(sumabs: T, value: T) -> bool {
    let acca = sumabs + convert::<f64, T>(0.1) * value.abs();
    let accb = sumabs + convert::<f64, T>(0.2) * value.abs();
    sumabs < acca && acca < accb
}
