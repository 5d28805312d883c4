//! Closed-form Hellinger distances and the per-candidate score.
//!
//! All distances lie in [0, 1]. Rounding can push `1 − BC` (BC the
//! Bhattacharyya coefficient) marginally below zero for identical
//! distributions, so it is clamped before the square root.
use crate::error::{CharacterizationError, Result};
use crate::types::{FittedDistribution, ScoreReport};
use serde::{Deserialize, Serialize};
use statrs::function::beta::ln_beta;

/// How per-phase size/shape distances are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightingMode {
    /// Every configured phase weighs `1/N`.
    Uniform,
    /// Phases weigh proportionally to the configured weights (reference
    /// fractions unless explicit weights are given).
    #[default]
    ByFraction,
}

/// Distances of one phase and the normalised weight it contributed with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PhaseDistance {
    pub weight: f64,
    pub size: f64,
    pub shape: f64,
}

/// Score of one candidate together with its per-slot breakdown. Slots with
/// zero weight carry `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub report: ScoreReport,
    pub phases: Vec<Option<PhaseDistance>>,
}

fn from_coefficient(bc: f64) -> f64 {
    (1.0 - bc).clamp(0.0, 1.0).sqrt()
}

fn require_positive(what: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CharacterizationError::InvalidParameters { what, value })
    }
}

/// Hellinger distance between `LogN(μ1, σ1)` and `LogN(μ2, σ2)`.
pub fn hellinger_lognormal(mu1: f64, sigma1: f64, mu2: f64, sigma2: f64) -> Result<f64> {
    require_positive("sigma", sigma1)?;
    require_positive("sigma", sigma2)?;
    let var_sum = sigma1 * sigma1 + sigma2 * sigma2;
    let bc = (2.0 * sigma1 * sigma2 / var_sum).sqrt()
        * (-(mu1 - mu2).powi(2) / (4.0 * var_sum)).exp();
    Ok(from_coefficient(bc))
}

/// Hellinger distance between `Beta(α1, β1)` and `Beta(α2, β2)`.
pub fn hellinger_beta(alpha1: f64, beta1: f64, alpha2: f64, beta2: f64) -> Result<f64> {
    require_positive("alpha", alpha1)?;
    require_positive("beta", beta1)?;
    require_positive("alpha", alpha2)?;
    require_positive("beta", beta2)?;
    let ln_bc = ln_beta(0.5 * (alpha1 + alpha2), 0.5 * (beta1 + beta2))
        - 0.5 * (ln_beta(alpha1, beta1) + ln_beta(alpha2, beta2));
    Ok(from_coefficient(ln_bc.exp()))
}

/// Hellinger distance between two discrete distributions of equal length.
/// Inputs are normalised to sum 1 first.
pub fn hellinger_discrete(p: &[f64], q: &[f64]) -> Result<f64> {
    if p.len() != q.len() || p.is_empty() {
        return Err(CharacterizationError::InvalidParameters {
            what: "discrete vector length",
            value: q.len() as f64,
        });
    }
    if let Some(&bad) = p.iter().chain(q).find(|v| !(v.is_finite() && **v >= 0.0)) {
        return Err(CharacterizationError::InvalidParameters {
            what: "probability",
            value: bad,
        });
    }
    let sp: f64 = p.iter().sum();
    let sq: f64 = q.iter().sum();
    require_positive("probability mass", sp)?;
    require_positive("probability mass", sq)?;
    let bc: f64 = p
        .iter()
        .zip(q)
        .map(|(a, b)| (a / sp * b / sq).sqrt())
        .sum();
    Ok(from_coefficient(bc))
}

/// Unnormalised per-phase weights for `mode`.
///
/// `Uniform` yields ones; `ByFraction` yields `explicit` when given,
/// otherwise the reference fractions. `score` normalises them.
pub fn phase_weights(
    mode: WeightingMode,
    reference_fraction: &[f64],
    explicit: Option<&[f64]>,
) -> Vec<f64> {
    match mode {
        WeightingMode::Uniform => vec![1.0; reference_fraction.len()],
        WeightingMode::ByFraction => explicit.unwrap_or(reference_fraction).to_vec(),
    }
}

/// Combines per-phase distances into a [`ScoreReport`].
///
/// - size/shape errors: weighted mean of per-phase distances, weights
///   normalised to sum 1. Slots with zero weight are ignored and may be
///   `None` in `fitted`; a positively weighted slot without a fit fails with
///   `InsufficientData`.
/// - fraction error: discrete Hellinger distance of the fraction vectors.
/// - overall: mean of size, shape and fraction errors, or of size and shape
///   only when `include_fraction` is false.
pub fn score(
    fitted: &[Option<FittedDistribution>],
    reference: &[FittedDistribution],
    observed_fraction: &[f64],
    reference_fraction: &[f64],
    phase_weights: &[f64],
    include_fraction: bool,
) -> Result<ScoreBreakdown> {
    let n = reference.len();
    for len in [
        fitted.len(),
        observed_fraction.len(),
        reference_fraction.len(),
        phase_weights.len(),
    ] {
        if len != n {
            return Err(CharacterizationError::InvalidParameters {
                what: "phase vector length",
                value: len as f64,
            });
        }
    }
    if let Some(&bad) = phase_weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
        return Err(CharacterizationError::InvalidParameters {
            what: "phase weight",
            value: bad,
        });
    }
    let total_weight: f64 = phase_weights.iter().sum();
    require_positive("total phase weight", total_weight)?;

    let mut size_error = 0.0;
    let mut shape_error = 0.0;
    let mut phases = Vec::with_capacity(n);
    for slot in 0..n {
        let weight = phase_weights[slot] / total_weight;
        if weight == 0.0 {
            phases.push(None);
            continue;
        }
        let Some(fit) = fitted[slot] else {
            return Err(CharacterizationError::InsufficientData {
                phase: None,
                found: 0,
                minimum: crate::distribution::MIN_SAMPLES,
            });
        };
        let target = &reference[slot];
        let size = hellinger_lognormal(
            fit.size.mu,
            fit.size.sigma,
            target.size.mu,
            target.size.sigma,
        )?;
        let shape = hellinger_beta(
            fit.shape.alpha,
            fit.shape.beta,
            target.shape.alpha,
            target.shape.beta,
        )?;
        size_error += weight * size;
        shape_error += weight * shape;
        phases.push(Some(PhaseDistance {
            weight,
            size,
            shape,
        }));
    }

    let fraction_error = hellinger_discrete(observed_fraction, reference_fraction)?;
    let overall_error = if include_fraction {
        (size_error + shape_error + fraction_error) / 3.0
    } else {
        (size_error + shape_error) / 2.0
    };

    Ok(ScoreBreakdown {
        report: ScoreReport {
            size_error,
            shape_error,
            fraction_error,
            overall_error,
        },
        phases,
    })
}
