//! Grid coordinates and axis-aligned work regions.

use crate::error::FleetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer position in the voxel grid.
///
/// Equality and hashing are by value. Parses from and displays as `x,y,z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Coord {
    /// East/west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North/south axis.
    pub z: i32,
}

impl Coord {
    /// Creates a coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(&self, other: &Coord) -> u64 {
        u64::from(self.x.abs_diff(other.x))
            + u64::from(self.y.abs_diff(other.y))
            + u64::from(self.z.abs_diff(other.z))
    }

    /// The six face-adjacent cells, in +x, -x, +y, -y, +z, -z order.
    pub fn neighbors(&self) -> [Coord; 6] {
        let Coord { x, y, z } = *self;
        [
            Coord::new(x.saturating_add(1), y, z),
            Coord::new(x.saturating_sub(1), y, z),
            Coord::new(x, y.saturating_add(1), z),
            Coord::new(x, y.saturating_sub(1), z),
            Coord::new(x, y, z.saturating_add(1)),
            Coord::new(x, y, z.saturating_sub(1)),
        ]
    }

    /// Whether `other` differs by exactly one unit along exactly one axis.
    pub fn is_adjacent(&self, other: &Coord) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl FromStr for Coord {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let &[x, y, z] = parts.as_slice() else {
            return Err(FleetError::InvalidCoordinate(format!(
                "expected x,y,z but got '{s}'"
            )));
        };
        let parse = |v: &str| {
            v.parse::<i32>()
                .map_err(|e| FleetError::InvalidCoordinate(format!("'{v}' in '{s}': {e}")))
        };
        Ok(Coord::new(parse(x)?, parse(y)?, parse(z)?))
    }
}

/// Axis-aligned box given by two corners.
///
/// The corners need not be ordered; each axis is normalized independently
/// when the region is flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// First corner.
    pub start: Coord,
    /// Opposite corner.
    pub end: Coord,
}

impl Region {
    /// Creates a region from two corners in any order.
    pub const fn new(start: Coord, end: Coord) -> Self {
        Self { start, end }
    }

    /// Minimum corner after per-axis normalization.
    pub fn min(&self) -> Coord {
        Coord::new(
            self.start.x.min(self.end.x),
            self.start.y.min(self.end.y),
            self.start.z.min(self.end.z),
        )
    }

    /// Maximum corner after per-axis normalization.
    pub fn max(&self) -> Coord {
        Coord::new(
            self.start.x.max(self.end.x),
            self.start.y.max(self.end.y),
            self.start.z.max(self.end.z),
        )
    }

    /// Number of cells contained in the region, saturating at `u64::MAX`.
    pub fn volume(&self) -> u64 {
        let (lo, hi) = (self.min(), self.max());
        (u64::from(lo.x.abs_diff(hi.x)) + 1)
            .saturating_mul(u64::from(lo.y.abs_diff(hi.y)) + 1)
            .saturating_mul(u64::from(lo.z.abs_diff(hi.z)) + 1)
    }

    /// Whether `cell` lies inside the region, bounds included.
    pub fn contains(&self, cell: &Coord) -> bool {
        let (lo, hi) = (self.min(), self.max());
        (lo.x..=hi.x).contains(&cell.x)
            && (lo.y..=hi.y).contains(&cell.y)
            && (lo.z..=hi.z).contains(&cell.z)
    }

    /// Every contained cell, x outermost and z innermost.
    pub fn blocks(&self) -> impl Iterator<Item = Coord> {
        let (lo, hi) = (self.min(), self.max());
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| Coord::new(x, y, z)))
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((start, end)) = s.split_once(':') else {
            return Err(FleetError::InvalidCoordinate(format!(
                "expected x1,y1,z1:x2,y2,z2 but got '{s}'"
            )));
        };
        Ok(Region::new(start.parse()?, end.parse()?))
    }
}
