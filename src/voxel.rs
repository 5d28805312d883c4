//! Voxel → grain index collaborator.
//!
//! - `VoxelRecord` / `parse_voxel_line`: one line of a voxel dump, where
//!   fields 3..=5 hold the integer voxel coordinates and the last two fields
//!   hold the grain identifier and the phase label.
//! - `GrainIndex::from_voxels`: groups voxels by grain, counts them and
//!   collects the distinct corner vertices bounding each grain.
//! - `GrainSource`: the seam the selector consumes; implemented by in-memory
//!   indices and by voxel files on disk.
use crate::error::{CharacterizationError, Result};
use log::debug;
use nalgebra::Point3;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One labelled voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelRecord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub grain_id: u32,
    pub phase: u32,
}

/// A grain reduced to what the ellipsoid fit consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct Grain {
    pub id: u32,
    pub phase: u32,
    /// Number of voxels, used as the grain volume.
    pub voxel_count: u64,
    /// Distinct corner coordinates of the grain's voxels.
    pub vertices: Vec<Point3<f64>>,
}

/// Grains of one RVE, sorted by grain identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GrainIndex {
    pub grains: Vec<Grain>,
}

// A voxel at (x, y, z) spans the unit cube whose far corner is (x, y, z).
const CORNER_OFFSETS: [[i64; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 1, 0],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

#[derive(Default)]
struct GrainAccumulator {
    phase: Option<u32>,
    voxel_count: u64,
    corners: BTreeSet<[i64; 3]>,
}

impl GrainIndex {
    pub fn new(mut grains: Vec<Grain>) -> Self {
        grains.sort_by_key(|g| g.id);
        Self { grains }
    }

    /// Groups voxels by grain. A grain's phase is taken from its first voxel.
    pub fn from_voxels<I>(voxels: I) -> Self
    where
        I: IntoIterator<Item = VoxelRecord>,
    {
        let mut by_grain: BTreeMap<u32, GrainAccumulator> = BTreeMap::new();
        for v in voxels {
            let acc = by_grain.entry(v.grain_id).or_default();
            acc.phase.get_or_insert(v.phase);
            acc.voxel_count += 1;
            for off in CORNER_OFFSETS {
                acc.corners.insert([v.x - off[0], v.y - off[1], v.z - off[2]]);
            }
        }
        let grains = by_grain
            .into_iter()
            .map(|(id, acc)| Grain {
                id,
                phase: acc.phase.unwrap_or_default(),
                voxel_count: acc.voxel_count,
                vertices: acc
                    .corners
                    .into_iter()
                    .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64))
                    .collect(),
            })
            .collect();
        Self { grains }
    }

    pub fn len(&self) -> usize {
        self.grains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grains.is_empty()
    }
}

/// Parses one whitespace-separated voxel line. Returns `Ok(None)` for blank
/// lines and `#` comments.
pub fn parse_voxel_line(line: &str) -> std::result::Result<Option<VoxelRecord>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() < 8 {
        return Err(format!(
            "expected at least 8 fields, found {}",
            fields.len()
        ));
    }
    let int = |idx: usize| -> std::result::Result<i64, String> {
        fields[idx]
            .parse::<i64>()
            .map_err(|e| format!("field {idx} ({:?}): {e}", fields[idx]))
    };
    let label = |idx: usize| -> std::result::Result<u32, String> {
        fields[idx]
            .parse::<u32>()
            .map_err(|e| format!("field {idx} ({:?}): {e}", fields[idx]))
    };
    let n = fields.len();
    Ok(Some(VoxelRecord {
        x: int(3)?,
        y: int(4)?,
        z: int(5)?,
        grain_id: label(n - 2)?,
        phase: label(n - 1)?,
    }))
}

/// Reads a voxel dump from disk into a grain index.
pub fn load_voxel_file(path: &Path) -> std::result::Result<GrainIndex, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read voxel file {}: {e}", path.display()))?;
    let mut voxels = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        match parse_voxel_line(line) {
            Ok(Some(v)) => voxels.push(v),
            Ok(None) => {}
            Err(e) => {
                return Err(format!(
                    "Failed to parse {} line {}: {e}",
                    path.display(),
                    lineno + 1
                ))
            }
        }
    }
    let index = GrainIndex::from_voxels(voxels.iter().copied());
    debug!(
        "load_voxel_file: {} voxels, {} grains from {}",
        voxels.len(),
        index.len(),
        path.display()
    );
    Ok(index)
}

/// Anything that can produce the grain index of one candidate RVE.
pub trait GrainSource: Sync {
    /// Human-readable name used in logs and reports.
    fn describe(&self) -> String;

    fn load(&self) -> Result<Cow<'_, GrainIndex>>;
}

impl GrainSource for GrainIndex {
    fn describe(&self) -> String {
        format!("in-memory RVE ({} grains)", self.len())
    }

    fn load(&self) -> Result<Cow<'_, GrainIndex>> {
        Ok(Cow::Borrowed(self))
    }
}

impl GrainSource for PathBuf {
    fn describe(&self) -> String {
        self.display().to_string()
    }

    fn load(&self) -> Result<Cow<'_, GrainIndex>> {
        load_voxel_file(self)
            .map(Cow::Owned)
            .map_err(|message| CharacterizationError::Source { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voxel(x: i64, y: i64, z: i64, grain_id: u32, phase: u32) -> VoxelRecord {
        VoxelRecord {
            x,
            y,
            z,
            grain_id,
            phase,
        }
    }

    #[test]
    fn single_voxel_has_eight_corners() {
        let index = GrainIndex::from_voxels([voxel(1, 1, 1, 7, 2)]);
        assert_eq!(index.len(), 1);
        let g = &index.grains[0];
        assert_eq!(g.id, 7);
        assert_eq!(g.phase, 2);
        assert_eq!(g.voxel_count, 1);
        assert_eq!(g.vertices.len(), 8);
        assert!(g.vertices.contains(&Point3::new(0.0, 0.0, 0.0)));
        assert!(g.vertices.contains(&Point3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn adjacent_voxels_share_corners() {
        let index = GrainIndex::from_voxels([voxel(1, 1, 1, 3, 1), voxel(2, 1, 1, 3, 4)]);
        let g = &index.grains[0];
        assert_eq!(g.voxel_count, 2);
        assert_eq!(g.vertices.len(), 12);
        assert_eq!(g.phase, 1, "phase comes from the first voxel");
    }

    #[test]
    fn grains_are_sorted_by_id() {
        let index = GrainIndex::from_voxels([voxel(1, 1, 1, 9, 1), voxel(5, 5, 5, 2, 1)]);
        let ids: Vec<u32> = index.grains.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[test]
    fn parses_voxel_line_layout() {
        let rec = parse_voxel_line("0.1 0.2 0.3 4 5 6 1 12 3")
            .expect("parse")
            .expect("record");
        assert_eq!(rec, voxel(4, 5, 6, 12, 3));
        assert_eq!(parse_voxel_line("   ").expect("blank"), None);
        assert!(parse_voxel_line("1 2 3").is_err());
        assert!(parse_voxel_line("a b c x 5 6 1 12 3").is_err());
    }
}
