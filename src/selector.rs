//! Candidate evaluation and best-RVE selection.
//!
//! Each candidate runs the full pipeline independently:
//! grain source → [`aggregate`] → per-phase likelihood fits → [`score`].
//! Candidates are evaluated in parallel with the `parallel` feature; the
//! winner is then picked by an index-ordered fold so the result does not
//! depend on completion order. Ties keep the lowest index.
//!
//! A candidate that fails (`InsufficientData`, `FitDivergence`, ...) is kept
//! in the report with its error and excluded from the ranking, unless the
//! settings ask to abort on the first failure.
use crate::aggregate::{aggregate, phase_fraction, AggregateStats};
use crate::config::{EvaluationSettings, FailurePolicy};
use crate::diagnostics::{elapsed_ms, Stage, StageTiming};
use crate::distribution::fit_phase;
use crate::error::{CharacterizationError, ErrorKind, Result};
use crate::hellinger::{score, PhaseDistance};
use crate::types::{FittedDistribution, PhaseSamples, ScoreReport};
use crate::voxel::GrainSource;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Instant;

/// Fit and distances of one phase of a scored candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhaseEvaluation {
    pub label: u32,
    pub samples: usize,
    pub observed_fraction: f64,
    /// `None` for phases with zero weight, which are not fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitted: Option<FittedDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<PhaseDistance>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub report: ScoreReport,
    pub phases: Vec<PhaseEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grains: Option<AggregateStats>,
    pub timings: Vec<StageTiming>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip)]
    pub error: CharacterizationError,
}

impl From<CharacterizationError> for CandidateFailure {
    fn from(error: CharacterizationError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            error,
        }
    }
}

/// Either a score or the reason there is none. A failure never collapses
/// into a zero score.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CandidateOutcome {
    Scored(CandidateScore),
    Failed(CandidateFailure),
}

impl CandidateOutcome {
    pub fn report(&self) -> Option<&ScoreReport> {
        match self {
            Self::Scored(s) => Some(&s.report),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    /// Zero-based position in the candidate list.
    pub index: usize,
    pub source: String,
    pub elapsed_ms: f64,
    pub outcome: CandidateOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestCandidate {
    pub index: usize,
    pub report: ScoreReport,
}

/// Result of ranking a candidate list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// `None` when every candidate failed.
    pub best: Option<BestCandidate>,
    pub candidates: Vec<CandidateReport>,
}

/// Fits and scores already aggregated per-phase samples.
///
/// Phases with zero weight are neither fitted nor scored; every other phase
/// must carry at least two samples.
pub fn score_samples(
    samples: &PhaseSamples,
    observed_fraction: &[f64],
    settings: &EvaluationSettings,
) -> Result<CandidateScore> {
    let reference = &settings.reference;
    let table = &reference.phases;
    if samples.phases.len() != table.len() || observed_fraction.len() != table.len() {
        return Err(CharacterizationError::InvalidParameters {
            what: "phase slot count",
            value: samples.phases.len() as f64,
        });
    }
    if settings.weights.len() != table.len() {
        return Err(CharacterizationError::InvalidParameters {
            what: "phase weight count",
            value: settings.weights.len() as f64,
        });
    }

    let start = Instant::now();
    let mut fitted = Vec::with_capacity(table.len());
    for (slot, dist) in samples.phases.iter().enumerate() {
        if settings.weights[slot] == 0.0 {
            fitted.push(None);
            continue;
        }
        let fit = fit_phase(dist, &settings.fit).map_err(|e| e.for_phase(table.label(slot)))?;
        debug!(
            "phase {}: n={} mu={:.4} sigma={:.4} alpha={:.4} beta={:.4}",
            table.label(slot),
            dist.len(),
            fit.size.mu,
            fit.size.sigma,
            fit.shape.alpha,
            fit.shape.beta
        );
        fitted.push(Some(fit));
    }
    let fit_ms = elapsed_ms(start);

    let start = Instant::now();
    let breakdown = score(
        &fitted,
        &reference.distributions,
        observed_fraction,
        &reference.fraction,
        &settings.weights,
        settings.include_fraction,
    )?;
    let score_ms = elapsed_ms(start);

    let phases = (0..table.len())
        .map(|slot| PhaseEvaluation {
            label: table.label(slot),
            samples: samples.phases[slot].len(),
            observed_fraction: observed_fraction[slot],
            fitted: fitted[slot],
            distance: breakdown.phases[slot],
        })
        .collect();

    Ok(CandidateScore {
        report: breakdown.report,
        phases,
        grains: None,
        timings: vec![
            StageTiming::new(Stage::Fit, fit_ms),
            StageTiming::new(Stage::Score, score_ms),
        ],
    })
}

/// Runs the whole pipeline for one candidate.
pub fn evaluate_candidate<S>(source: &S, settings: &EvaluationSettings) -> Result<CandidateScore>
where
    S: GrainSource + ?Sized,
{
    let start = Instant::now();
    let index = source.load()?;
    let load_ms = elapsed_ms(start);

    let start = Instant::now();
    let phases = &settings.reference.phases;
    let agg = aggregate(
        &index,
        phases,
        settings.resolution,
        settings.sphericity_tolerance,
    );
    let fraction = phase_fraction(&index, phases);
    let aggregate_ms = elapsed_ms(start);

    let mut scored = score_samples(&agg.samples, &fraction, settings)?;
    scored.grains = Some(agg.stats);
    let mut timings = vec![
        StageTiming::new(Stage::Load, load_ms),
        StageTiming::new(Stage::Aggregate, aggregate_ms),
    ];
    timings.append(&mut scored.timings);
    scored.timings = timings;
    Ok(scored)
}

fn evaluate_indexed<S: GrainSource>(
    index: usize,
    source: &S,
    settings: &EvaluationSettings,
) -> CandidateReport {
    let start = Instant::now();
    let outcome = match evaluate_candidate(source, settings) {
        Ok(scored) => {
            let r = scored.report;
            info!(
                "candidate #{index} ({}): size={:.4} shape={:.4} fraction={:.4} overall={:.4}",
                source.describe(),
                r.size_error,
                r.shape_error,
                r.fraction_error,
                r.overall_error
            );
            CandidateOutcome::Scored(scored)
        }
        Err(err) => {
            warn!("candidate #{index} ({}) failed: {err}", source.describe());
            CandidateOutcome::Failed(err.into())
        }
    };
    CandidateReport {
        index,
        source: source.describe(),
        elapsed_ms: elapsed_ms(start),
        outcome,
    }
}

#[cfg(feature = "parallel")]
fn evaluate_all<S: GrainSource>(
    candidates: &[S],
    settings: &EvaluationSettings,
) -> Vec<CandidateReport> {
    use rayon::prelude::*;

    candidates
        .par_iter()
        .enumerate()
        .map(|(i, source)| evaluate_indexed(i, source, settings))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate_all<S: GrainSource>(
    candidates: &[S],
    settings: &EvaluationSettings,
) -> Vec<CandidateReport> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, source)| evaluate_indexed(i, source, settings))
        .collect()
}

/// Minimum `overall_error` over scored candidates; ties keep the lowest index.
pub fn pick_best(reports: &[CandidateReport]) -> Option<BestCandidate> {
    reports.iter().fold(None, |best: Option<BestCandidate>, c| {
        let Some(report) = c.outcome.report() else {
            return best;
        };
        match best {
            Some(b) if b.report.overall_error <= report.overall_error => Some(b),
            _ => Some(BestCandidate {
                index: c.index,
                report: *report,
            }),
        }
    })
}

/// Evaluates every candidate against the reference and picks the best one.
///
/// Returns an error only under [`FailurePolicy::Abort`], carrying the failure
/// of the lowest-index failed candidate.
pub fn select_best<S: GrainSource>(
    candidates: &[S],
    settings: &EvaluationSettings,
) -> Result<Selection> {
    let reports = evaluate_all(candidates, settings);

    if settings.failure_policy == FailurePolicy::Abort {
        if let Some(failure) = reports.iter().find_map(|c| match &c.outcome {
            CandidateOutcome::Failed(f) => Some(f.error.clone()),
            CandidateOutcome::Scored(_) => None,
        }) {
            return Err(failure);
        }
    }

    let best = pick_best(&reports);
    match &best {
        Some(b) => info!(
            "best candidate #{} with overall error {:.4}",
            b.index, b.report.overall_error
        ),
        None => warn!("no candidate could be scored"),
    }
    Ok(Selection {
        best,
        candidates: reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferenceTarget;
    use crate::types::{BetaParams, LognormalParams, PhaseTable};

    fn scored(index: usize, overall: f64) -> CandidateReport {
        CandidateReport {
            index,
            source: format!("c{index}"),
            elapsed_ms: 0.0,
            outcome: CandidateOutcome::Scored(CandidateScore {
                report: ScoreReport {
                    size_error: overall,
                    shape_error: overall,
                    fraction_error: 0.0,
                    overall_error: overall,
                },
                phases: Vec::new(),
                grains: None,
                timings: Vec::new(),
            }),
        }
    }

    fn failed(index: usize) -> CandidateReport {
        CandidateReport {
            index,
            source: format!("c{index}"),
            elapsed_ms: 0.0,
            outcome: CandidateOutcome::Failed(
                CharacterizationError::InsufficientData {
                    phase: Some(1),
                    found: 0,
                    minimum: 2,
                }
                .into(),
            ),
        }
    }

    #[test]
    fn pick_best_prefers_lowest_error() {
        let reports = vec![scored(0, 0.3), scored(1, 0.1), scored(2, 0.2)];
        assert_eq!(pick_best(&reports).map(|b| b.index), Some(1));
    }

    #[test]
    fn pick_best_ties_keep_first() {
        let reports = vec![scored(0, 0.4), scored(1, 0.2), scored(2, 0.2)];
        assert_eq!(pick_best(&reports).map(|b| b.index), Some(1));
    }

    #[test]
    fn pick_best_ignores_failures() {
        let reports = vec![failed(0), scored(1, 0.5), failed(2)];
        assert_eq!(pick_best(&reports).map(|b| b.index), Some(1));
        assert_eq!(pick_best(&[failed(0)]), None);
    }

    #[test]
    fn failure_serializes_with_kind() {
        let json = serde_json::to_value(&failed(3)).expect("json");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["kind"], "insufficientData");
        assert!(json["outcome"]["message"]
            .as_str()
            .expect("message")
            .contains("phase 1"));
    }

    fn two_phase_settings() -> EvaluationSettings {
        let d = FittedDistribution {
            size: LognormalParams {
                mu: 0.5,
                sigma: 0.75,
            },
            shape: BetaParams {
                alpha: 3.82,
                beta: 2.99,
            },
        };
        EvaluationSettings::new(
            ReferenceTarget {
                phases: PhaseTable::new(vec![1, 2]).expect("table"),
                distributions: vec![d, d],
                fraction: vec![0.5, 0.5],
            },
            1.0,
        )
    }

    fn two_phase_samples() -> PhaseSamples {
        let mut samples = PhaseSamples::with_slots(2);
        for (size, shape) in [(1.0, 0.4), (2.0, 0.6), (1.5, 0.5)] {
            samples.phases[0].push(size, shape);
            samples.phases[1].push(size, shape);
        }
        samples
    }

    #[test]
    fn short_weight_vector_is_rejected() {
        let mut settings = two_phase_settings();
        settings.weights = vec![1.0];
        let err = score_samples(&two_phase_samples(), &[0.5, 0.5], &settings).unwrap_err();
        assert_eq!(
            err,
            CharacterizationError::InvalidParameters {
                what: "phase weight count",
                value: 1.0,
            }
        );
    }

    #[test]
    fn scored_samples_time_fit_and_score() {
        let scored = score_samples(&two_phase_samples(), &[0.5, 0.5], &two_phase_settings())
            .expect("scored");
        let stages: Vec<Stage> = scored.timings.iter().map(|t| t.stage).collect();
        assert_eq!(stages, vec![Stage::Fit, Stage::Score]);
        assert!(scored.timings.iter().all(|t| t.elapsed_ms >= 0.0));
    }
}
