//! Serializable run report handed to reporting and plotting tools.
//!
//! `SelectionReport` bundles the settings that were used, every candidate's
//! outcome (with per-stage timings for scored candidates) and the wall-clock
//! time of the whole run. `write_json_file` pretty-prints any serializable
//! value to disk.
use crate::config::{EvaluationSettings, FailurePolicy};
use crate::hellinger::WeightingMode;
use crate::selector::Selection;
use crate::types::FittedDistribution;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Pipeline stage of one candidate evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Load,
    Aggregate,
    Fit,
    Score,
}

/// Wall-clock time spent in one stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(stage: Stage, elapsed_ms: f64) -> Self {
        Self { stage, elapsed_ms }
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Reference statistics of one phase, echoed into the report.
#[derive(Clone, Debug, Serialize)]
pub struct ReferencePhase {
    pub label: u32,
    pub fraction: f64,
    pub weight: f64,
    pub reference: FittedDistribution,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    pub resolution: f64,
    pub weighting: WeightingMode,
    pub include_fraction: bool,
    pub failure_policy: &'static str,
    pub phases: Vec<ReferencePhase>,
}

impl From<&EvaluationSettings> for SettingsSummary {
    fn from(s: &EvaluationSettings) -> Self {
        let total: f64 = s.weights.iter().sum();
        let reference = &s.reference;
        let phases = (0..reference.phases.len())
            .map(|slot| ReferencePhase {
                label: reference.phases.label(slot),
                fraction: reference.fraction[slot],
                weight: if total > 0.0 {
                    s.weights.get(slot).copied().unwrap_or(0.0) / total
                } else {
                    0.0
                },
                reference: reference.distributions[slot],
            })
            .collect();
        Self {
            resolution: s.resolution,
            weighting: s.weighting,
            include_fraction: s.include_fraction,
            failure_policy: match s.failure_policy {
                FailurePolicy::Skip => "skip",
                FailurePolicy::Abort => "abort",
            },
            phases,
        }
    }
}

/// Complete output of one selection run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionReport {
    pub settings: SettingsSummary,
    pub selection: Selection,
    pub total_ms: f64,
}

impl SelectionReport {
    pub fn new(settings: &EvaluationSettings, selection: Selection, total_ms: f64) -> Self {
        Self {
            settings: settings.into(),
            selection,
            total_ms,
        }
    }
}

/// Pretty-prints `value` as JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON: {e}"))?;
    fs::write(path, json).map_err(|e| format!("Failed to write {}: {e}", path.display()))
}
