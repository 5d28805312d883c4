use serde::{Deserialize, Serialize};

/// Ordered set of phase labels. A label's position is its slot in every
/// per-phase vector (samples, fractions, weights, reference parameters).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PhaseTable {
    labels: Vec<u32>,
}

impl PhaseTable {
    /// Builds a table from distinct, non-zero labels.
    pub fn new(labels: Vec<u32>) -> Result<Self, String> {
        if labels.is_empty() {
            return Err("at least one phase must be configured".to_string());
        }
        for (i, &label) in labels.iter().enumerate() {
            if label == 0 {
                return Err("phase label 0 is reserved".to_string());
            }
            if labels[..i].contains(&label) {
                return Err(format!("duplicate phase label {label}"));
            }
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn label(&self, slot: usize) -> u32 {
        self.labels[slot]
    }

    pub fn slot(&self, label: u32) -> Option<usize> {
        self.labels.iter().position(|&l| l == label)
    }
}

/// Size and shape samples contributed by the retained grains of one phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PhaseDistribution {
    /// Equivalent diameters in physical units.
    pub sizes: Vec<f64>,
    /// Aspect ratios `min(L)/max(L)`.
    pub shapes: Vec<f64>,
}

impl PhaseDistribution {
    pub fn push(&mut self, size: f64, shape: f64) {
        self.sizes.push(size);
        self.shapes.push(shape);
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    fn append(&mut self, other: &mut PhaseDistribution) {
        self.sizes.append(&mut other.sizes);
        self.shapes.append(&mut other.shapes);
    }
}

/// Per-slot sample collections for one RVE.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PhaseSamples {
    pub phases: Vec<PhaseDistribution>,
}

impl PhaseSamples {
    pub fn with_slots(n: usize) -> Self {
        Self {
            phases: vec![PhaseDistribution::default(); n],
        }
    }

    /// Moves every sample of `other` into `self`, slot by slot.
    pub fn merge(mut self, mut other: PhaseSamples) -> Self {
        if self.phases.len() < other.phases.len() {
            self.phases
                .resize(other.phases.len(), PhaseDistribution::default());
        }
        for (dst, src) in self.phases.iter_mut().zip(other.phases.iter_mut()) {
            dst.append(src);
        }
        self
    }

    pub fn slot(&self, slot: usize) -> &PhaseDistribution {
        &self.phases[slot]
    }
}

/// Lognormal size model with location fixed at zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LognormalParams {
    pub mu: f64,
    pub sigma: f64,
}

/// Beta shape model supported on [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BetaParams {
    pub alpha: f64,
    pub beta: f64,
}

/// Fitted size and shape models of one phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FittedDistribution {
    pub size: LognormalParams,
    pub shape: BetaParams,
}

/// Errors of one candidate against the reference. All fields are ≥ 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub size_error: f64,
    pub shape_error: f64,
    pub fraction_error: f64,
    pub overall_error: f64,
}
