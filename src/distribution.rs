//! Maximum-likelihood fits of the per-phase size and shape models.
//!
//! - Size: lognormal with location fixed at 0. The MLE is closed form:
//!   `μ = mean(ln x)`, `σ = sqrt(mean((ln x − μ)²))`.
//! - Shape: beta on [0, 1]. The MLE solves
//!   `ψ(α) − ψ(α+β) = mean(ln x)` and `ψ(β) − ψ(α+β) = mean(ln(1−x))`
//!   by Newton iterations started from the method-of-moments estimate. The
//!   log-likelihood is concave in (α, β), so the only failure modes are
//!   degenerate samples and an exhausted iteration budget; both are reported
//!   as `FitDivergence` rather than returning non-finite parameters.
use crate::error::{CharacterizationError, Result};
use crate::special::trigamma;
use crate::types::{BetaParams, FittedDistribution, LognormalParams, PhaseDistribution};
use log::debug;
use serde::Deserialize;
use statrs::function::gamma::digamma;

/// Smallest sample count accepted by either fit.
pub const MIN_SAMPLES: usize = 2;

/// Iteration controls for the beta likelihood solver.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative step size below which the solver stops.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

fn check_count(samples: &[f64]) -> Result<()> {
    if samples.len() < MIN_SAMPLES {
        return Err(CharacterizationError::InsufficientData {
            phase: None,
            found: samples.len(),
            minimum: MIN_SAMPLES,
        });
    }
    Ok(())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n as f64
}

/// Lognormal MLE with zero location. Returns `(μ, σ)` with `μ = ln(scale)`.
pub fn fit_lognormal(samples: &[f64]) -> Result<LognormalParams> {
    check_count(samples)?;
    if let Some(&bad) = samples.iter().find(|x| !(x.is_finite() && **x > 0.0)) {
        return Err(CharacterizationError::InvalidParameters {
            what: "lognormal sample",
            value: bad,
        });
    }
    let mu = mean(samples.iter().map(|x| x.ln()));
    let sigma = mean(samples.iter().map(|x| (x.ln() - mu).powi(2))).sqrt();
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(CharacterizationError::FitDivergence {
            model: "lognormal",
            iterations: 0,
            reason: "samples have no spread in log space",
        });
    }
    Ok(LognormalParams { mu, sigma })
}

/// Beta MLE on [0, 1]. Samples must lie strictly inside (0, 1).
pub fn fit_beta(samples: &[f64], options: &FitOptions) -> Result<BetaParams> {
    check_count(samples)?;
    if let Some(&bad) = samples
        .iter()
        .find(|x| !(x.is_finite() && **x > 0.0 && **x < 1.0))
    {
        return Err(CharacterizationError::InvalidParameters {
            what: "beta sample",
            value: bad,
        });
    }

    let g1 = mean(samples.iter().map(|x| x.ln()));
    let g2 = mean(samples.iter().map(|x| (1.0 - x).ln()));

    let m = mean(samples.iter().copied());
    let v = mean(samples.iter().map(|x| (x - m).powi(2)));
    if !(v > 0.0) {
        return Err(CharacterizationError::FitDivergence {
            model: "beta",
            iterations: 0,
            reason: "samples have no spread",
        });
    }
    let common = m * (1.0 - m) / v - 1.0;
    let (mut a, mut b) = if common > 0.0 {
        (m * common, (1.0 - m) * common)
    } else {
        (1.0, 1.0)
    };

    for iter in 1..=options.max_iterations {
        let psi_ab = digamma(a + b);
        let f1 = digamma(a) - psi_ab - g1;
        let f2 = digamma(b) - psi_ab - g2;

        let t = trigamma(a + b);
        let j11 = trigamma(a) - t;
        let j22 = trigamma(b) - t;
        let det = j11 * j22 - t * t;
        if !(det.is_finite() && det > 0.0) {
            return Err(CharacterizationError::FitDivergence {
                model: "beta",
                iterations: iter,
                reason: "singular Jacobian",
            });
        }
        let da = (j22 * f1 + t * f2) / det;
        let db = (j11 * f2 + t * f1) / det;

        // Halve the step until both shape parameters stay positive.
        let mut step = 1.0;
        while a - step * da <= 0.0 || b - step * db <= 0.0 {
            step *= 0.5;
            if step < 1e-12 {
                return Err(CharacterizationError::FitDivergence {
                    model: "beta",
                    iterations: iter,
                    reason: "step collapsed at the domain boundary",
                });
            }
        }
        a -= step * da;
        b -= step * db;
        if !(a.is_finite() && b.is_finite()) {
            return Err(CharacterizationError::FitDivergence {
                model: "beta",
                iterations: iter,
                reason: "non-finite parameters",
            });
        }

        if (step * da).abs() <= options.tolerance * a && (step * db).abs() <= options.tolerance * b
        {
            debug!("fit_beta: converged after {iter} iterations (alpha={a:.4}, beta={b:.4})");
            return Ok(BetaParams { alpha: a, beta: b });
        }
    }

    Err(CharacterizationError::FitDivergence {
        model: "beta",
        iterations: options.max_iterations,
        reason: "iteration budget exhausted",
    })
}

/// Fits both models of one phase.
pub fn fit_phase(dist: &PhaseDistribution, options: &FitOptions) -> Result<FittedDistribution> {
    Ok(FittedDistribution {
        size: fit_lognormal(&dist.sizes)?,
        shape: fit_beta(&dist.shapes, options)?,
    })
}
