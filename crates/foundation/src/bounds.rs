use serde::{Deserialize, Serialize};

/// Axis-aligned box in geographic coordinates: `[x_min, y_min]` to `[x_max, y_max]`.
///
/// `x` is longitude and `y` is latitude, both in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn from_ranges(x: (f64, f64), y: (f64, f64)) -> Self {
        Aabb2 {
            min: [x.0.min(x.1), y.0.min(y.1)],
            max: [x.0.max(x.1), y.0.max(y.1)],
        }
    }

    pub fn x_min(&self) -> f64 {
        self.min[0]
    }

    pub fn x_max(&self) -> f64 {
        self.max[0]
    }

    pub fn y_min(&self) -> f64 {
        self.min[1]
    }

    pub fn y_max(&self) -> f64 {
        self.max[1]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    /// Closed-interval overlap test; boxes sharing only an edge intersect.
    pub fn intersects(&self, other: &Aabb2) -> bool {
        self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min[0] && x <= self.max[0] && y >= self.min[1] && y <= self.max[1]
    }
}
