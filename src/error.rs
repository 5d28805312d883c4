//! Failure taxonomy shared by the fitting and scoring stages.

use serde::Serialize;

/// Coarse classification of a [`CharacterizationError`], used by serialized
/// reports so a failed candidate stays distinguishable from a low score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    DegenerateGeometry,
    InsufficientData,
    FitDivergence,
    InvalidParameters,
    Source,
}

/// Reasons why a grain, a phase fit or a whole candidate cannot be scored.
#[derive(Clone, Debug, PartialEq)]
pub enum CharacterizationError {
    /// The vertex cloud of a grain does not span three dimensions.
    DegenerateGeometry {
        grain_id: Option<u32>,
        eigenvalues: [f64; 3],
    },
    /// Fewer samples than a distribution fit needs.
    InsufficientData {
        phase: Option<u32>,
        found: usize,
        minimum: usize,
    },
    /// Iterative likelihood maximisation did not settle.
    FitDivergence {
        model: &'static str,
        iterations: usize,
        reason: &'static str,
    },
    /// A parameter or sample lies outside the domain of a formula.
    InvalidParameters { what: &'static str, value: f64 },
    /// The grain collaborator failed to produce an index.
    Source { message: String },
}

impl CharacterizationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DegenerateGeometry { .. } => ErrorKind::DegenerateGeometry,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::FitDivergence { .. } => ErrorKind::FitDivergence,
            Self::InvalidParameters { .. } => ErrorKind::InvalidParameters,
            Self::Source { .. } => ErrorKind::Source,
        }
    }

    /// Attach the phase label to an `InsufficientData` raised by a bare fit.
    pub(crate) fn for_phase(self, label: u32) -> Self {
        match self {
            Self::InsufficientData { found, minimum, .. } => Self::InsufficientData {
                phase: Some(label),
                found,
                minimum,
            },
            other => other,
        }
    }

    pub(crate) fn for_grain(self, id: u32) -> Self {
        match self {
            Self::DegenerateGeometry { eigenvalues, .. } => Self::DegenerateGeometry {
                grain_id: Some(id),
                eigenvalues,
            },
            other => other,
        }
    }
}

impl std::fmt::Display for CharacterizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateGeometry {
                grain_id,
                eigenvalues,
            } => {
                if let Some(id) = grain_id {
                    write!(f, "grain {id}: ")?;
                }
                write!(
                    f,
                    "degenerate geometry (eigenvalues [{:.3e}, {:.3e}, {:.3e}])",
                    eigenvalues[0], eigenvalues[1], eigenvalues[2]
                )
            }
            Self::InsufficientData {
                phase,
                found,
                minimum,
            } => {
                if let Some(label) = phase {
                    write!(f, "phase {label}: ")?;
                }
                write!(f, "insufficient data ({found} < {minimum} samples)")
            }
            Self::FitDivergence {
                model,
                iterations,
                reason,
            } => write!(
                f,
                "{model} fit diverged after {iterations} iterations: {reason}"
            ),
            Self::InvalidParameters { what, value } => {
                write!(f, "invalid parameter {what} = {value}")
            }
            Self::Source { message } => write!(f, "grain source failed: {message}"),
        }
    }
}

impl std::error::Error for CharacterizationError {}

pub type Result<T> = std::result::Result<T, CharacterizationError>;
