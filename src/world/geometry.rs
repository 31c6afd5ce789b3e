//! Cartesian positions and workspace bounds

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point or extent in the arm's frame, in metres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Same point raised by `dz`
    #[must_use]
    pub fn above(&self, dz: f64) -> Self {
        Self::new(self.x, self.y, self.z + dz)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Reachable box: `|x| <= limits.x`, `|y| <= limits.y`, `0 <= z <= limits.z`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub limits: Vec3,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            limits: Vec3::new(0.5, 0.5, 0.5),
        }
    }
}

impl Workspace {
    /// Whether `pos` is finite and inside the box
    #[must_use]
    pub fn contains(&self, pos: &Vec3) -> bool {
        pos.is_finite()
            && pos.x.abs() <= self.limits.x
            && pos.y.abs() <= self.limits.y
            && (0.0..=self.limits.z).contains(&pos.z)
    }
}
