//! Bounded Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! We minimize `Σ r_i(x)^2` subject to box constraints `lo_j <= x_j <= hi_j`.
//!
//! Implementation choices:
//! - Each damped step solves the augmented linear system
//!   `[J; sqrt(λ D)] δ = [-r; 0]` with `D = diag(JᵀJ)` (Marquardt scaling),
//!   via SVD so tall and near-singular Jacobians are handled robustly.
//! - Variables sitting on a bound whose gradient or step points out of the
//!   box are held fixed; the damped step is solved over the remaining free
//!   columns only. Trial points are then projected onto the box.
//! - Parameter dimension is tiny (2 for every decay model), so SVD cost is
//!   irrelevant next to the number of resampled fits.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Smallest column scale used in the Marquardt diagonal.
const DIAG_FLOOR: f64 = 1e-12;

/// Damping above this means no step can reduce the cost any more.
const MAX_DAMPING: f64 = 1e16;

/// A least-squares objective with an analytic Jacobian.
pub trait LeastSquaresProblem {
    /// Residual vector `r(x)`.
    fn residuals(&self, x: &[f64]) -> DVector<f64>;
    /// Jacobian `∂r_i/∂x_j` (rows = residuals, columns = parameters).
    fn jacobian(&self, x: &[f64]) -> DMatrix<f64>;
}

/// Stopping criteria.
#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Absolute tolerance on the projected gradient (inf-norm).
    pub gtol: f64,
    pub initial_damping: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1e-12,
            ftol: 1e-14,
            gtol: 1e-14,
            initial_damping: 1e-3,
        }
    }
}

/// Converged optimum.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub x: Vec<f64>,
    /// Sum of squared residuals at `x`.
    pub sse: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LmError {
    #[error("objective is not finite at the starting point")]
    NonFinite,
    #[error("damped step system could not be solved")]
    Singular,
    #[error("no convergence after {0} iterations")]
    MaxIterations(usize),
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser rank cutoffs before giving up.
    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Minimize the problem from `x0` inside `bounds`.
pub fn minimize<P: LeastSquaresProblem>(
    problem: &P,
    x0: &[f64],
    bounds: &[(f64, f64)],
    opts: &LmOptions,
) -> Result<LmSolution, LmError> {
    let p = x0.len();
    let mut x = project(x0, bounds);
    let mut r = problem.residuals(&x);
    if !r.iter().all(|v| v.is_finite()) {
        return Err(LmError::NonFinite);
    }
    let mut cost = r.norm_squared();
    let mut lambda = opts.initial_damping;

    for iter in 0..opts.max_iterations {
        let done = |x: Vec<f64>, sse: f64| LmSolution { x, sse, iterations: iter + 1 };
        if cost == 0.0 {
            return Ok(done(x, cost));
        }

        let jac = problem.jacobian(&x);
        if !jac.iter().all(|v| v.is_finite()) {
            return Err(LmError::NonFinite);
        }
        let grad = jac.transpose() * &r;
        let free = free_variables(&x, &grad, bounds);
        if projected_grad_norm(&grad, &free) <= opts.gtol {
            return Ok(done(x, cost));
        }

        let diag: Vec<f64> = (0..p)
            .map(|j| jac.column(j).norm_squared().max(DIAG_FLOOR))
            .collect();

        loop {
            let step = bounded_step(&jac, &r, &diag, lambda, &x, bounds, &free)?;
            let trial: Vec<f64> = project(
                &x.iter().zip(step.iter()).map(|(a, b)| a + b).collect::<Vec<_>>(),
                bounds,
            );

            let moved = dist(&trial, &x);
            if moved <= opts.xtol * (norm(&x) + opts.xtol) {
                return Ok(done(x, cost));
            }

            let r_trial = problem.residuals(&trial);
            let cost_trial = r_trial.norm_squared();
            if cost_trial.is_finite() && cost_trial < cost {
                let reduction = (cost - cost_trial) / cost;
                x = trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda / 10.0).max(1e-15);
                if reduction <= opts.ftol {
                    return Ok(done(x, cost));
                }
                break;
            }

            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                return Ok(done(x, cost));
            }
        }
    }

    Err(LmError::MaxIterations(opts.max_iterations))
}

/// Damped step over the free variables.
///
/// A free variable on a bound whose step component points outward is fixed
/// and the step re-solved, so the other components never compensate for a
/// move the projection would undo.
fn bounded_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    diag: &[f64],
    lambda: f64,
    x: &[f64],
    bounds: &[(f64, f64)],
    free: &[bool],
) -> Result<Vec<f64>, LmError> {
    let mut free = free.to_vec();
    loop {
        let step = damped_step(jac, r, diag, lambda, &free).ok_or(LmError::Singular)?;
        let mut blocked = false;
        for (j, &(lo, hi)) in bounds.iter().enumerate() {
            if free[j] && ((x[j] <= lo && step[j] < 0.0) || (x[j] >= hi && step[j] > 0.0)) {
                free[j] = false;
                blocked = true;
            }
        }
        if !blocked {
            return Ok(step);
        }
    }
}

/// Solve `[J_F; sqrt(λ D_F)] δ_F = [-r; 0]` over the free columns `F`; fixed
/// components of the returned step are zero.
fn damped_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    diag: &[f64],
    lambda: f64,
    free: &[bool],
) -> Option<Vec<f64>> {
    let (n, p) = jac.shape();
    let cols: Vec<usize> = (0..p).filter(|&j| free[j]).collect();
    let mut step = vec![0.0; p];
    if cols.is_empty() {
        return Some(step);
    }

    let k = cols.len();
    let mut a = DMatrix::<f64>::zeros(n + k, k);
    let mut b = DVector::<f64>::zeros(n + k);
    for (c, &j) in cols.iter().enumerate() {
        for i in 0..n {
            a[(i, c)] = jac[(i, j)];
        }
        a[(n + c, c)] = (lambda * diag[j]).sqrt();
    }
    for i in 0..n {
        b[i] = -r[i];
    }
    let delta = solve_least_squares(&a, &b)?;
    for (c, &j) in cols.iter().enumerate() {
        step[j] = delta[c];
    }
    Some(step)
}

fn project(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds.iter())
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

/// Variables not held on a bound by a gradient pointing out of the box.
fn free_variables(x: &[f64], grad: &DVector<f64>, bounds: &[(f64, f64)]) -> Vec<bool> {
    x.iter()
        .zip(bounds.iter())
        .zip(grad.iter())
        .map(|((&v, &(lo, hi)), &g)| !((v <= lo && g > 0.0) || (v >= hi && g < 0.0)))
        .collect()
}

fn projected_grad_norm(grad: &DVector<f64>, free: &[bool]) -> f64 {
    grad.iter()
        .zip(free.iter())
        .filter(|&(_, &f)| f)
        .map(|(g, _)| g.abs())
        .fold(0.0, f64::max)
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = a * exp(-b t)` on a fixed grid.
    struct ExpDecay {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn residuals(&self, x: &[f64]) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t.iter().zip(self.y.iter()).map(|(&t, &y)| x[0] * (-x[1] * t).exp() - y),
            )
        }

        fn jacobian(&self, x: &[f64]) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.t.len(), 2);
            for (i, &t) in self.t.iter().enumerate() {
                let e = (-x[1] * t).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = -x[0] * t * e;
            }
            j
        }
    }

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn recovers_exact_parameters() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = t.iter().map(|&t| 2.5 * (-0.3 * t).exp()).collect();
        let problem = ExpDecay { t, y };
        let sol = minimize(&problem, &[1.0, 1.0], &[(0.0, 10.0), (0.0, 10.0)], &LmOptions::default()).unwrap();
        assert!((sol.x[0] - 2.5).abs() < 1e-9);
        assert!((sol.x[1] - 0.3).abs() < 1e-9);
        assert!(sol.sse < 1e-18);
    }

    #[test]
    fn respects_bounds() {
        // Unconstrained optimum has a = 2.5; cap it at 2.
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = t.iter().map(|&t| 2.5 * (-0.3 * t).exp()).collect();
        let problem = ExpDecay { t, y };
        let sol = minimize(&problem, &[1.0, 1.0], &[(0.0, 2.0), (0.0, 10.0)], &LmOptions::default()).unwrap();
        assert!(sol.x[0] <= 2.0);
        assert!((sol.x[0] - 2.0).abs() < 1e-9);
        assert!(sol.x[1] >= 0.0);
        assert!(sol.iterations < 30, "{} iterations", sol.iterations);
    }

    #[test]
    fn reports_iteration_budget_exhaustion() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = t.iter().map(|&t| 2.5 * (-0.3 * t).exp()).collect();
        let problem = ExpDecay { t, y };
        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let err = minimize(&problem, &[0.1, 5.0], &[(0.0, 10.0), (0.0, 10.0)], &opts).unwrap_err();
        assert_eq!(err, LmError::MaxIterations(1));
    }
}
