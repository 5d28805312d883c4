//! Per-phase aggregation of grain-level size and shape metrics.
//!
//! Every grain is fitted with an ellipsoid and reduced to an equivalent
//! diameter and an aspect ratio, which are appended to the slot of the
//! grain's phase. Grains are skipped (and counted) when
//! - the fit is effectively spherical (`min(L)/max(L) ≥ 1 − tol`),
//! - the vertex cloud is degenerate,
//! - the phase label is not part of the configured phase table.
//!
//! With the `parallel` feature grains are processed by rayon workers, each
//! filling a local [`PhaseAggregate`] that is merged in a single reduce step.
use crate::ellipsoid::fit_ellipsoid;
use crate::types::{PhaseSamples, PhaseTable};
use crate::voxel::{Grain, GrainIndex};
use log::{debug, warn};
use serde::Serialize;

/// Grain bookkeeping of one aggregation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub grains: usize,
    pub retained: usize,
    pub spherical: usize,
    pub degenerate: usize,
    pub unknown_phase: usize,
}

impl AggregateStats {
    fn merge(self, other: Self) -> Self {
        Self {
            grains: self.grains + other.grains,
            retained: self.retained + other.retained,
            spherical: self.spherical + other.spherical,
            degenerate: self.degenerate + other.degenerate,
            unknown_phase: self.unknown_phase + other.unknown_phase,
        }
    }
}

/// Samples grouped by phase slot plus the grain bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PhaseAggregate {
    pub samples: PhaseSamples,
    pub stats: AggregateStats,
}

struct AggregateParams<'a> {
    phases: &'a PhaseTable,
    resolution: f64,
    sphericity_tolerance: f64,
}

impl PhaseAggregate {
    fn empty(slots: usize) -> Self {
        Self {
            samples: PhaseSamples::with_slots(slots),
            stats: AggregateStats::default(),
        }
    }

    fn add(&mut self, grain: &Grain, params: &AggregateParams<'_>) {
        self.stats.grains += 1;
        let Some(slot) = params.phases.slot(grain.phase) else {
            self.stats.unknown_phase += 1;
            return;
        };
        let ellipsoid = match fit_ellipsoid(&grain.vertices, grain.voxel_count) {
            Ok(e) => e,
            Err(err) => {
                debug!("aggregate: skipping {}", err.for_grain(grain.id));
                self.stats.degenerate += 1;
                return;
            }
        };
        if ellipsoid.is_spherical(params.sphericity_tolerance) {
            self.stats.spherical += 1;
            return;
        }
        self.samples.phases[slot].push(
            ellipsoid.equivalent_diameter(params.resolution),
            ellipsoid.aspect_ratio(),
        );
        self.stats.retained += 1;
    }

    fn merge(self, other: Self) -> Self {
        Self {
            samples: self.samples.merge(other.samples),
            stats: self.stats.merge(other.stats),
        }
    }
}

/// Fits every grain and collects equivalent diameters (scaled by
/// `resolution`) and aspect ratios per phase slot.
pub fn aggregate(
    index: &GrainIndex,
    phases: &PhaseTable,
    resolution: f64,
    sphericity_tolerance: f64,
) -> PhaseAggregate {
    let params = AggregateParams {
        phases,
        resolution,
        sphericity_tolerance,
    };
    let result = accumulate(&index.grains, &params);
    let stats = result.stats;
    if stats.degenerate > 0 || stats.unknown_phase > 0 {
        warn!(
            "aggregate: skipped {} degenerate and {} unknown-phase grains out of {}",
            stats.degenerate, stats.unknown_phase, stats.grains
        );
    }
    debug!(
        "aggregate: retained {}/{} grains ({} spherical)",
        stats.retained, stats.grains, stats.spherical
    );
    result
}

#[cfg(feature = "parallel")]
fn accumulate(grains: &[Grain], params: &AggregateParams<'_>) -> PhaseAggregate {
    use rayon::prelude::*;

    let slots = params.phases.len();
    grains
        .par_iter()
        .fold(
            || PhaseAggregate::empty(slots),
            |mut acc, grain| {
                acc.add(grain, params);
                acc
            },
        )
        .reduce(|| PhaseAggregate::empty(slots), PhaseAggregate::merge)
}

#[cfg(not(feature = "parallel"))]
fn accumulate(grains: &[Grain], params: &AggregateParams<'_>) -> PhaseAggregate {
    grains
        .iter()
        .fold(PhaseAggregate::empty(params.phases.len()), |mut acc, grain| {
            acc.add(grain, params);
            acc
        })
}

/// Share of grains per phase slot: grains of that phase divided by the total
/// grain count. Phases absent from the RVE get 0.
pub fn phase_fraction(index: &GrainIndex, phases: &PhaseTable) -> Vec<f64> {
    let mut counts = vec![0usize; phases.len()];
    for grain in &index.grains {
        if let Some(slot) = phases.slot(grain.phase) {
            counts[slot] += 1;
        }
    }
    let total = index.len();
    if total == 0 {
        return vec![0.0; phases.len()];
    }
    counts
        .into_iter()
        .map(|c| c as f64 / total as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn box_grain(id: u32, phase: u32, dims: [f64; 3], voxel_count: u64) -> Grain {
        let mut vertices = Vec::new();
        for &x in &[0.0, dims[0]] {
            for &y in &[0.0, dims[1]] {
                for &z in &[0.0, dims[2]] {
                    vertices.push(Point3::new(x, y, z));
                }
            }
        }
        Grain {
            id,
            phase,
            voxel_count,
            vertices,
        }
    }

    fn table() -> PhaseTable {
        PhaseTable::new(vec![1, 2]).expect("table")
    }

    #[test]
    fn groups_samples_by_phase() {
        let index = GrainIndex::new(vec![
            box_grain(1, 1, [4.0, 2.0, 1.0], 8),
            box_grain(2, 2, [2.0, 1.0, 1.0], 2),
            box_grain(3, 1, [3.0, 3.0, 1.0], 9),
        ]);
        let agg = aggregate(&index, &table(), 0.5, 1e-9);
        assert_eq!(agg.stats.retained, 3);
        assert_eq!(agg.samples.slot(0).len(), 2);
        assert_eq!(agg.samples.slot(1).len(), 1);

        let mut shapes = agg.samples.slot(0).shapes.clone();
        shapes.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
        assert!((shapes[0] - 0.25).abs() < 1e-9);
        assert!((shapes[1] - 1.0 / 3.0).abs() < 1e-9);

        // Equivalent diameter only depends on the voxel count.
        let d = agg.samples.slot(1).sizes[0];
        let expected = 2.0 * 0.5 * (3.0 * 2.0 / (4.0 * std::f64::consts::PI)).cbrt();
        assert!((d - expected).abs() < 1e-9);
    }

    #[test]
    fn skips_spherical_degenerate_and_unknown_grains() {
        let flat = Grain {
            id: 4,
            phase: 1,
            voxel_count: 3,
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
        };
        let index = GrainIndex::new(vec![
            box_grain(1, 1, [2.0, 2.0, 2.0], 8),
            box_grain(2, 9, [4.0, 2.0, 1.0], 8),
            box_grain(3, 2, [4.0, 2.0, 1.0], 8),
            flat,
        ]);
        let agg = aggregate(&index, &table(), 1.0, 1e-9);
        assert_eq!(
            agg.stats,
            AggregateStats {
                grains: 4,
                retained: 1,
                spherical: 1,
                degenerate: 1,
                unknown_phase: 1,
            }
        );
        assert!(agg.samples.slot(0).is_empty());
        assert_eq!(agg.samples.slot(1).len(), 1);
    }

    #[test]
    fn fraction_counts_absent_phases_as_zero() {
        let index = GrainIndex::new(vec![
            box_grain(1, 1, [4.0, 2.0, 1.0], 8),
            box_grain(2, 1, [4.0, 2.0, 1.0], 8),
            box_grain(3, 1, [4.0, 2.0, 1.0], 8),
            box_grain(4, 1, [4.0, 2.0, 1.0], 8),
        ]);
        let table = PhaseTable::new(vec![1, 2, 3]).expect("table");
        assert_eq!(phase_fraction(&index, &table), vec![1.0, 0.0, 0.0]);
        assert_eq!(
            phase_fraction(&GrainIndex::default(), &table),
            vec![0.0, 0.0, 0.0]
        );
    }
}
