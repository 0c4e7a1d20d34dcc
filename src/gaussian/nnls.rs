//! Non-negative least squares for the Gaussian amplitudes.
//!
//! Lawson–Hanson active-set method, warm-started from a small positive point:
//!
//! 1. Seed every coefficient at `1e-3 · max|y|` and mark all columns passive.
//! 2. Solve the unconstrained least-squares problem on the passive columns
//!    with an SVD pseudo-inverse, which gives the minimum-norm solution when
//!    the passive columns are linearly dependent.
//! 3. If some passive coefficient comes out non-positive, move from the
//!    current point toward that solution until the first coefficient hits
//!    zero, release it to the active set and go back to 2.
//! 4. Otherwise accept the solution and look at the dual w = Dᵀ(y - Dx). If
//!    no active column has w_j above the tolerance (or the residual stopped
//!    improving) the point is optimal; else the column with the largest w_j
//!    becomes passive and the loop continues at 2.
//!
//! Each least-squares solve counts as one iteration.

use nalgebra::{DMatrix, DVector, SVD};

use crate::error::RetrievalError;
use crate::gaussian::basis::DesignMatrix;
use crate::spectrum::Spectrum;

/// Seed coefficient as a fraction of the largest target value.
const SEED_FRACTION: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Relative stopping tolerance on the dual and on residual improvement.
    pub tolerance: f64,
    /// Upper bound on least-squares solves.
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NnlsSolution {
    pub x: DVector<f64>,
    pub residual_norm: f64,
    pub converged: bool,
    pub iterations: usize,
    pub rank_deficient: bool,
}

/// Solves min ||A x - b|| subject to x >= 0.
///
/// Only malformed input is an error. Hitting the iteration limit returns the
/// last feasible point with `converged = false`.
pub fn nnls(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    options: &FitOptions,
) -> Result<NnlsSolution, RetrievalError> {
    let (m, n) = a.shape();
    if n == 0 || m == 0 {
        return Err(RetrievalError::Fit("empty design matrix".to_string()));
    }
    if b.len() != m {
        return Err(RetrievalError::Fit(format!(
            "design matrix has {m} rows but target has {} values",
            b.len()
        )));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(RetrievalError::Fit("non-finite design matrix".to_string()));
    }
    if b.iter().any(|v| !v.is_finite()) {
        return Err(RetrievalError::Fit("non-finite target".to_string()));
    }

    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok(NnlsSolution {
            x: DVector::zeros(n),
            residual_norm: 0.0,
            converged: true,
            iterations: 0,
            rank_deficient: false,
        });
    }

    let dual_tol = options.tolerance * a.tr_mul(b).amax();

    let mut x = DVector::from_element(n, SEED_FRACTION * b.amax());
    let mut passive = vec![true; n];
    let mut iterations = 0;
    let mut rank_deficient = false;
    let mut previous_residual = (b - a * &x).norm();

    loop {
        loop {
            if iterations >= options.max_iterations {
                return Ok(solution(a, b, x, false, iterations, rank_deficient));
            }
            iterations += 1;

            let (z, deficient) = solve_passive(a, b, &passive)?;
            rank_deficient |= deficient;

            let blocking: Vec<usize> = (0..n).filter(|&j| passive[j] && z[j] <= 0.0).collect();
            if blocking.is_empty() {
                x = z;
                break;
            }

            // Largest step that keeps every passive coefficient non-negative
            let (first_zero, alpha) = blocking
                .iter()
                .map(|&j| {
                    let denom = x[j] - z[j];
                    (j, if denom > 0.0 { x[j] / denom } else { 0.0 })
                })
                .fold((blocking[0], f64::INFINITY), |best, candidate| {
                    if candidate.1 < best.1 { candidate } else { best }
                });

            for j in (0..n).filter(|&j| passive[j]) {
                x[j] += alpha * (z[j] - x[j]);
            }
            x[first_zero] = 0.0;
            for j in 0..n {
                if passive[j] && x[j] <= 0.0 {
                    passive[j] = false;
                    x[j] = 0.0;
                }
            }
        }

        let residual = b - a * &x;
        let residual_norm = residual.norm();
        let dual = a.tr_mul(&residual);

        let candidate = (0..n)
            .filter(|&j| !passive[j])
            .max_by(|&i, &j| dual[i].total_cmp(&dual[j]));

        let Some(entering) = candidate else {
            return Ok(solution(a, b, x, true, iterations, rank_deficient));
        };
        if dual[entering] <= dual_tol
            || previous_residual - residual_norm <= options.tolerance * b_norm
        {
            return Ok(solution(a, b, x, true, iterations, rank_deficient));
        }

        previous_residual = residual_norm;
        passive[entering] = true;
    }
}

fn solution(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    x: DVector<f64>,
    converged: bool,
    iterations: usize,
    rank_deficient: bool,
) -> NnlsSolution {
    let residual_norm = (b - a * &x).norm();
    NnlsSolution {
        x,
        residual_norm,
        converged,
        iterations,
        rank_deficient,
    }
}

/// Minimum-norm least squares restricted to the passive columns; the other
/// coefficients are zero. Also reports whether those columns were rank deficient.
fn solve_passive(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    passive: &[bool],
) -> Result<(DVector<f64>, bool), RetrievalError> {
    let columns: Vec<usize> = (0..passive.len()).filter(|&j| passive[j]).collect();
    let mut z = DVector::zeros(passive.len());
    if columns.is_empty() {
        return Ok((z, false));
    }

    let sub = a.select_columns(columns.iter());
    let (m, k) = sub.shape();
    let svd = SVD::try_new(sub, true, true, f64::EPSILON, 0)
        .ok_or_else(|| RetrievalError::Fit("SVD did not converge".to_string()))?;

    // Same cutoff as a numpy-style pseudo-inverse
    let cutoff = svd.singular_values.max() * (m.max(k) as f64) * f64::EPSILON;
    let rank = svd.singular_values.iter().filter(|&&s| s > cutoff).count();

    let solved = svd
        .solve(b, cutoff)
        .map_err(|e| RetrievalError::Fit(e.to_string()))?;
    for (value, &j) in solved.iter().zip(&columns) {
        z[j] = *value;
    }

    Ok((z, rank < k))
}

/// Fitted amplitudes for one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// One non-negative amplitude per band, basis order [m^-1]
    pub amplitudes: Vec<f64>,
    /// Baseline amplitude when the design matrix has a baseline column
    pub baseline: Option<f64>,
    /// ||D a - y||, unweighted [m^-1]
    pub residual_norm: f64,
    pub converged: bool,
    pub iterations: usize,
    pub rank_deficient: bool,
}

/// Fits a design matrix to absorption spectra, weighting by 1/σ when the
/// spectrum carries an uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstrainedFitter {
    options: FitOptions,
}

impl ConstrainedFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn fit(
        &self,
        design: &DesignMatrix,
        target: &Spectrum,
    ) -> Result<FitResult, RetrievalError> {
        if target.wavelengths() != design.wavelengths() {
            return Err(RetrievalError::Fit(format!(
                "target has {} wavelengths, design matrix {}",
                target.len(),
                design.wavelengths().len()
            )));
        }

        let d = design.matrix();
        let y = DVector::from_column_slice(target.values());

        let solved = match target.uncertainty() {
            Some(sigma) => {
                if sigma.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                    return Err(RetrievalError::Fit(
                        "uncertainty must be finite and positive".to_string(),
                    ));
                }
                let weights: Vec<f64> = sigma.iter().map(|s| s.recip()).collect();
                let weighted = DMatrix::from_fn(d.nrows(), d.ncols(), |r, c| d[(r, c)] * weights[r]);
                let weighted_y = DVector::from_fn(y.len(), |r, _| y[r] * weights[r]);
                nnls(&weighted, &weighted_y, &self.options)?
            }
            None => nnls(d, &y, &self.options)?,
        };

        let residual_norm = (&y - d * &solved.x).norm();
        let n_bands = design.n_bands();
        let baseline = design.has_baseline().then(|| solved.x[n_bands]);

        Ok(FitResult {
            amplitudes: solved.x.iter().take(n_bands).copied().collect(),
            baseline,
            residual_norm,
            converged: solved.converged,
            iterations: solved.iterations,
            rank_deficient: solved.rank_deficient,
        })
    }
}
