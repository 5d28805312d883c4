//! JSON configuration for evaluation runs.
//!
//! - `evaluation`: reference statistics and scoring policies, validated once
//!   into [`EvaluationSettings`].
//! - `run`: the CLI run file listing candidate voxel files.

pub mod evaluation;
pub mod run;

pub use evaluation::{
    EvaluationConfig, EvaluationSettings, FailurePolicy, PhaseConfig, ReferenceTarget,
};
pub use run::{load_config, OutputConfig, RunConfig};
