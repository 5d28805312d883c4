//! Moment-matching ellipsoid fit of a single grain.
//!
//! The grain's vertex cloud is summarised by its mean (center) and its 3×3
//! sample covariance (dispersion). The eigenvectors of the dispersion give the
//! principal axes and the square roots of the eigenvalues give raw semi-axis
//! magnitudes, which are then rescaled so the ellipsoid volume matches the
//! grain's voxel count.
//!
//! Orientation convention: `rotation` stores the principal axes as **rows**,
//! ordered by decreasing eigenvalue. Local ellipsoid coordinates map to world
//! coordinates through `rotation.transpose()`.
use crate::error::{CharacterizationError, Result};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use std::f64::consts::PI;

/// Eigenvalues below this fraction of the largest one are treated as zero.
const REL_EIG_EPS: f64 = 1e-12;

/// Best-fit ellipsoid of one grain. Computed per grain and reduced right away
/// to an equivalent diameter and an aspect ratio.
#[derive(Clone, Debug, PartialEq)]
pub struct Ellipsoid {
    pub center: Point3<f64>,
    /// Sample covariance of the vertex coordinates.
    pub dispersion: Matrix3<f64>,
    /// Volume-normalised semi-axis lengths, largest first.
    pub semi_axes: Vector3<f64>,
    /// Principal axes as rows, matching `semi_axes` order.
    pub rotation: Matrix3<f64>,
}

impl Ellipsoid {
    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * PI * self.semi_axes.product()
    }

    /// Diameter of the sphere with the same volume, in physical units.
    pub fn equivalent_diameter(&self, resolution: f64) -> f64 {
        2.0 * resolution * self.semi_axes.product().cbrt()
    }

    /// `min(L) / max(L)`; 1 for a sphere.
    pub fn aspect_ratio(&self) -> f64 {
        self.semi_axes.min() / self.semi_axes.max()
    }

    pub fn is_spherical(&self, tolerance: f64) -> bool {
        self.aspect_ratio() >= 1.0 - tolerance
    }

    /// Point on the surface hit by `direction` expressed in the ellipsoid's
    /// local frame, i.e. `center + Rᵀ · (L ∘ û)`.
    pub fn surface_point(&self, direction: &Vector3<f64>) -> Option<Point3<f64>> {
        let norm = direction.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return None;
        }
        let local = (direction / norm).component_mul(&self.semi_axes);
        Some(self.center + self.rotation.transpose() * local)
    }
}

/// Fits an ellipsoid to a grain's vertices by second-moment matching.
///
/// Fails with `DegenerateGeometry` when the vertices do not span three
/// independent directions, and with `InvalidParameters` for an empty grain.
pub fn fit_ellipsoid(vertices: &[Point3<f64>], voxel_count: u64) -> Result<Ellipsoid> {
    if voxel_count == 0 {
        return Err(CharacterizationError::InvalidParameters {
            what: "voxel_count",
            value: 0.0,
        });
    }
    if vertices.len() < 4 {
        return Err(CharacterizationError::DegenerateGeometry {
            grain_id: None,
            eigenvalues: [0.0; 3],
        });
    }

    let n = vertices.len() as f64;
    let sum = vertices
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    let center = Point3::from(sum / n);

    let mut dispersion = Matrix3::zeros();
    for p in vertices {
        let d = p - center;
        dispersion += d * d.transpose();
    }
    dispersion /= n - 1.0;

    let eig = SymmetricEigen::new(dispersion);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let lambda = Vector3::new(
        eig.eigenvalues[order[0]],
        eig.eigenvalues[order[1]],
        eig.eigenvalues[order[2]],
    );
    let degenerate = !lambda.iter().all(|l| l.is_finite())
        || lambda[0] <= 0.0
        || lambda[2] <= REL_EIG_EPS * lambda[0];
    if degenerate {
        return Err(CharacterizationError::DegenerateGeometry {
            grain_id: None,
            eigenvalues: [lambda[0], lambda[1], lambda[2]],
        });
    }

    let rotation = Matrix3::from_rows(&[
        eig.eigenvectors.column(order[0]).transpose(),
        eig.eigenvectors.column(order[1]).transpose(),
        eig.eigenvectors.column(order[2]).transpose(),
    ]);

    let scale = (3.0 * voxel_count as f64 / (4.0 * PI * lambda.product().sqrt())).cbrt();
    let semi_axes = lambda.map(|l| l.sqrt() * scale);

    Ok(Ellipsoid {
        center,
        dispersion,
        semi_axes,
        rotation,
    })
}
