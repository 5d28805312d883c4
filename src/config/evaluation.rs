use crate::distribution::FitOptions;
use crate::hellinger::{phase_weights, WeightingMode};
use crate::types::{BetaParams, FittedDistribution, LognormalParams, PhaseTable};
use serde::Deserialize;

/// Reference statistics of one phase as written in the config file.
#[derive(Clone, Debug, Deserialize)]
pub struct PhaseConfig {
    pub label: u32,
    /// Lognormal location of the equivalent diameter, `ln(scale)`.
    pub mu: f64,
    pub sigma: f64,
    /// Beta shape parameters of the aspect ratio.
    pub alpha: f64,
    pub beta: f64,
    /// Reference phase fraction. Need not sum to 1 across phases.
    pub fraction: f64,
}

/// What the selector does when a candidate cannot be scored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Report the failure and keep evaluating the remaining candidates.
    #[default]
    Skip,
    /// Stop at the first failed candidate.
    Abort,
}

/// Raw evaluation settings as deserialised from JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct EvaluationConfig {
    /// Physical edge length of one voxel.
    pub resolution: f64,
    pub phases: Vec<PhaseConfig>,
    #[serde(default)]
    pub weighting: WeightingMode,
    /// Explicit per-phase weights for `by-fraction` weighting, in `phases`
    /// order. Defaults to the reference fractions.
    #[serde(default)]
    pub phase_weights: Option<Vec<f64>>,
    /// Whether the fraction error takes part in the overall error.
    #[serde(default)]
    pub include_fraction: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_sphericity_tolerance")]
    pub sphericity_tolerance: f64,
    #[serde(default)]
    pub fit: FitOptions,
}

fn default_sphericity_tolerance() -> f64 {
    1e-9
}

/// Reference distributions and fractions, one slot per configured phase.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceTarget {
    pub phases: PhaseTable,
    pub distributions: Vec<FittedDistribution>,
    pub fraction: Vec<f64>,
}

/// Validated, immutable settings for one evaluation run.
#[derive(Clone, Debug)]
pub struct EvaluationSettings {
    pub reference: ReferenceTarget,
    pub resolution: f64,
    pub weighting: WeightingMode,
    /// Unnormalised per-slot weights resolved from `weighting`.
    pub weights: Vec<f64>,
    pub include_fraction: bool,
    pub failure_policy: FailurePolicy,
    pub sphericity_tolerance: f64,
    pub fit: FitOptions,
}

impl EvaluationSettings {
    /// Settings with default policies: fraction weighting, skip on failure,
    /// fraction error excluded from the overall error.
    pub fn new(reference: ReferenceTarget, resolution: f64) -> Self {
        let weighting = WeightingMode::default();
        let weights = phase_weights(weighting, &reference.fraction, None);
        Self {
            reference,
            resolution,
            weighting,
            weights,
            include_fraction: false,
            failure_policy: FailurePolicy::default(),
            sphericity_tolerance: default_sphericity_tolerance(),
            fit: FitOptions::default(),
        }
    }

    pub fn with_weighting(mut self, weighting: WeightingMode) -> Self {
        self.weighting = weighting;
        self.weights = phase_weights(weighting, &self.reference.fraction, None);
        self
    }

    pub fn with_fraction_error(mut self, include: bool) -> Self {
        self.include_fraction = include;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

fn positive(what: &str, label: u32, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("phase {label}: {what} must be positive, got {value}"))
    }
}

impl EvaluationConfig {
    /// Checks every field once and maps phase labels to slots.
    pub fn validate(&self) -> Result<EvaluationSettings, String> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(format!(
                "resolution must be positive, got {}",
                self.resolution
            ));
        }
        let table = PhaseTable::new(self.phases.iter().map(|p| p.label).collect())?;

        let mut distributions = Vec::with_capacity(self.phases.len());
        let mut fraction = Vec::with_capacity(self.phases.len());
        for p in &self.phases {
            if !p.mu.is_finite() {
                return Err(format!("phase {}: mu must be finite", p.label));
            }
            positive("sigma", p.label, p.sigma)?;
            positive("alpha", p.label, p.alpha)?;
            positive("beta", p.label, p.beta)?;
            if !(p.fraction.is_finite() && p.fraction >= 0.0) {
                return Err(format!(
                    "phase {}: fraction must be non-negative, got {}",
                    p.label, p.fraction
                ));
            }
            distributions.push(FittedDistribution {
                size: LognormalParams {
                    mu: p.mu,
                    sigma: p.sigma,
                },
                shape: BetaParams {
                    alpha: p.alpha,
                    beta: p.beta,
                },
            });
            fraction.push(p.fraction);
        }
        if fraction.iter().sum::<f64>() <= 0.0 {
            return Err("reference fractions must not all be zero".to_string());
        }

        if let Some(w) = &self.phase_weights {
            if w.len() != table.len() {
                return Err(format!(
                    "phase_weights has {} entries, expected {}",
                    w.len(),
                    table.len()
                ));
            }
            if w.iter().any(|v| !(v.is_finite() && *v >= 0.0)) || w.iter().sum::<f64>() <= 0.0 {
                return Err("phase_weights must be non-negative and not all zero".to_string());
            }
        }
        let weights = phase_weights(self.weighting, &fraction, self.phase_weights.as_deref());

        if !(0.0..1.0).contains(&self.sphericity_tolerance) {
            return Err(format!(
                "sphericity_tolerance must lie in [0, 1), got {}",
                self.sphericity_tolerance
            ));
        }
        if self.fit.max_iterations == 0 {
            return Err("fit.max_iterations must be at least 1".to_string());
        }

        Ok(EvaluationSettings {
            reference: ReferenceTarget {
                phases: table,
                distributions,
                fraction,
            },
            resolution: self.resolution,
            weighting: self.weighting,
            weights,
            include_fraction: self.include_fraction,
            failure_policy: self.failure_policy,
            sphericity_tolerance: self.sphericity_tolerance,
            fit: self.fit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "resolution": 1.0,
        "phases": [
            {"label": 1, "mu": 0.50, "sigma": 0.75, "alpha": 3.82, "beta": 2.99, "fraction": 0.09},
            {"label": 2, "mu": 0.91, "sigma": 0.57, "alpha": 3.54, "beta": 2.85, "fraction": 0.08},
            {"label": 3, "mu": -0.3, "sigma": 0.79, "alpha": 3.72, "beta": 3.24, "fraction": 0.23},
            {"label": 4, "mu": 0.81, "sigma": 0.80, "alpha": 3.08, "beta": 3.13, "fraction": 0.45}
        ]
    }"#;

    fn parse(text: &str) -> EvaluationConfig {
        serde_json::from_str(text).expect("config parses")
    }

    #[test]
    fn defaults_follow_fraction_weighting() {
        let settings = parse(CONFIG).validate().expect("valid");
        assert_eq!(settings.reference.phases.labels(), &[1, 2, 3, 4]);
        assert_eq!(settings.weighting, WeightingMode::ByFraction);
        assert_eq!(settings.weights, vec![0.09, 0.08, 0.23, 0.45]);
        assert!(!settings.include_fraction);
        assert_eq!(settings.failure_policy, FailurePolicy::Skip);
        assert_eq!(settings.fit.max_iterations, 200);
        assert!((settings.reference.distributions[2].size.mu + 0.3).abs() < 1e-15);
    }

    #[test]
    fn uniform_weighting_and_options_parse() {
        let mut cfg = parse(CONFIG);
        cfg.weighting = WeightingMode::Uniform;
        let settings = cfg.validate().expect("valid");
        assert_eq!(settings.weights, vec![1.0; 4]);

        let text = CONFIG.replacen(
            "\"resolution\": 1.0,",
            "\"resolution\": 0.5, \"weighting\": \"uniform\", \"include_fraction\": true, \"failure_policy\": \"abort\",",
            1,
        );
        let settings = parse(&text).validate().expect("valid");
        assert_eq!(settings.weighting, WeightingMode::Uniform);
        assert!(settings.include_fraction);
        assert_eq!(settings.failure_policy, FailurePolicy::Abort);
        assert_eq!(settings.resolution, 0.5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = parse(CONFIG);
        cfg.resolution = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = parse(CONFIG);
        cfg.phases[1].sigma = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = parse(CONFIG);
        cfg.phases[3].label = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = parse(CONFIG);
        cfg.phase_weights = Some(vec![1.0, 1.0]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn explicit_weights_override_fractions() {
        let mut cfg = parse(CONFIG);
        cfg.phase_weights = Some(vec![0.0, 1.0, 1.0, 2.0]);
        let settings = cfg.validate().expect("valid");
        assert_eq!(settings.weights, vec![0.0, 1.0, 1.0, 2.0]);
    }
}
