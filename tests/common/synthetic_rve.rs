//! Synthetic grains with prescribed equivalent diameter and aspect ratio.
#![allow(dead_code)]

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand_distr::{Beta, Distribution, LogNormal};
use rve_selector::config::ReferenceTarget;
use rve_selector::types::{BetaParams, FittedDistribution, LognormalParams, PhaseTable};
use rve_selector::voxel::{Grain, GrainIndex};
use rve_selector::EvaluationSettings;

pub const LABELS: [u32; 4] = [1, 2, 3, 4];
pub const MU: [f64; 4] = [0.50, 0.91, -0.3, 0.81];
pub const SIGMA: [f64; 4] = [0.75, 0.57, 0.79, 0.80];
pub const ALPHA: [f64; 4] = [3.82, 3.54, 3.72, 3.08];
pub const BETA: [f64; 4] = [2.99, 2.85, 3.24, 3.13];
pub const FRACTION: [f64; 4] = [0.09, 0.08, 0.23, 0.45];

pub fn reference_distribution(slot: usize) -> FittedDistribution {
    FittedDistribution {
        size: LognormalParams {
            mu: MU[slot],
            sigma: SIGMA[slot],
        },
        shape: BetaParams {
            alpha: ALPHA[slot],
            beta: BETA[slot],
        },
    }
}

pub fn reference_target() -> ReferenceTarget {
    ReferenceTarget {
        phases: PhaseTable::new(LABELS.to_vec()).expect("phase table"),
        distributions: (0..4).map(reference_distribution).collect(),
        fraction: FRACTION.to_vec(),
    }
}

pub fn reference_settings(resolution: f64) -> EvaluationSettings {
    EvaluationSettings::new(reference_target(), resolution)
}

/// Grain whose fitted ellipsoid has equivalent diameter `diameter` (in units
/// of `resolution`) and aspect ratio `aspect`. The vertex cloud is the six
/// points `±s_k e_k` with `s = (1, (1+aspect)/2, aspect)`; the voxel count
/// fixes the volume and therefore the diameter.
pub fn grain_with(id: u32, phase: u32, diameter: f64, aspect: f64, resolution: f64) -> Grain {
    let s = [1.0, 0.5 * (1.0 + aspect), aspect];
    let mut vertices = Vec::with_capacity(6);
    for k in 0..3 {
        let mut p = [0.0; 3];
        p[k] = s[k];
        vertices.push(Point3::new(p[0], p[1], p[2]));
        p[k] = -s[k];
        vertices.push(Point3::new(p[0], p[1], p[2]));
    }
    let voxels = std::f64::consts::PI / 6.0 * (diameter / resolution).powi(3);
    Grain {
        id,
        phase,
        voxel_count: (voxels.round() as u64).max(1),
        vertices,
    }
}

/// Draws `counts[slot]` grains per phase from the given models.
pub fn sample_rve(
    rng: &mut StdRng,
    models: &[FittedDistribution],
    counts: &[usize],
    resolution: f64,
) -> GrainIndex {
    let mut grains = Vec::new();
    let mut id = 1u32;
    for (slot, (model, &count)) in models.iter().zip(counts).enumerate() {
        let size = LogNormal::new(model.size.mu, model.size.sigma).expect("lognormal");
        let shape = Beta::new(model.shape.alpha, model.shape.beta).expect("beta");
        for _ in 0..count {
            let d = size.sample(rng);
            let a = shape.sample(rng);
            grains.push(grain_with(id, LABELS[slot], d, a, resolution));
            id += 1;
        }
    }
    GrainIndex::new(grains)
}

/// Grain counts proportional to the reference fractions.
pub fn counts_for(total: usize) -> Vec<usize> {
    let sum: f64 = FRACTION.iter().sum();
    FRACTION
        .iter()
        .map(|f| ((f / sum) * total as f64).round() as usize)
        .collect()
}
