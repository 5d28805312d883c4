#![doc = include_str!("../README.md")]

// Pipeline stages
pub mod aggregate;
pub mod distribution;
pub mod ellipsoid;
pub mod hellinger;
pub mod selector;

// Data model, configuration and reporting
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;
pub mod voxel;

// Numeric helpers
pub mod special;

// --- High-level re-exports -------------------------------------------------

pub use crate::config::{EvaluationConfig, EvaluationSettings, ReferenceTarget};
pub use crate::error::{CharacterizationError, ErrorKind};
pub use crate::selector::{select_best, CandidateOutcome, Selection};
pub use crate::types::{FittedDistribution, ScoreReport};
pub use crate::voxel::{GrainIndex, GrainSource};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use rve_selector::prelude::*;
/// use std::path::Path;
///
/// # fn main() -> Result<(), String> {
/// let run = rve_selector::config::load_config(Path::new("run.json"))?;
/// let settings = run.evaluation.validate()?;
/// let selection = select_best(&run.candidates, &settings).map_err(|e| e.to_string())?;
/// if let Some(best) = selection.best {
///     println!("best=#{} overall={:.4}", best.index + 1, best.report.overall_error);
/// }
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::config::{EvaluationSettings, ReferenceTarget};
    pub use crate::voxel::{GrainIndex, GrainSource};
    pub use crate::{select_best, ScoreReport, Selection};
}
