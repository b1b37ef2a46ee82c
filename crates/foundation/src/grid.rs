use serde::{Deserialize, Serialize};

use crate::bounds::Aabb2;

/// Canonical horizontal axis name expected by the rasterizer.
pub const LON: &str = "lon";
/// Canonical vertical axis name expected by the rasterizer.
pub const LAT: &str = "lat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<f64>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Spacing between the first two samples.
    ///
    /// Assumes a uniform axis; irregular axes are not detected.
    pub fn resolution(&self) -> Result<f64, GridError> {
        let (Some(a), Some(b)) = (self.values.first(), self.values.get(1)) else {
            return Err(GridError::TooFewSamples {
                axis: self.name.clone(),
                count: self.values.len(),
            });
        };
        let res = (b - a).abs();
        if res == 0.0 || !res.is_finite() {
            return Err(GridError::DegenerateResolution {
                axis: self.name.clone(),
            });
        }
        Ok(res)
    }

    /// `(min, max)` of the samples.
    pub fn range(&self) -> Result<(f64, f64), GridError> {
        let Some(first) = self.values.first().copied() else {
            return Err(GridError::TooFewSamples {
                axis: self.name.clone(),
                count: 0,
            });
        };
        Ok(
            self.values
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }

    /// Indices of samples inside the half-open interval `[lo, hi)`.
    fn indices_within(&self, lo: f64, hi: f64) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= lo && **v < hi)
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of the sample closest to `v`.
    pub fn nearest(&self, v: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, s) in self.values.iter().enumerate() {
            let d = (s - v).abs();
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("grid has {found} values but its axes describe {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("axis `{axis}` has {count} sample(s); at least two are needed to derive a resolution")]
    TooFewSamples { axis: String, count: usize },

    #[error("axis `{axis}` has a zero or non-finite resolution")]
    DegenerateResolution { axis: String },
}

/// Native cell size of a grid, per axis.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResolution {
    pub x: f64,
    pub y: f64,
}

/// Dense 2-D field of `f64` samples, stored row-major (`y` outer, `x` inner).
///
/// Missing samples are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub name: String,
    pub x: Axis,
    pub y: Axis,
    values: Vec<f64>,
}

impl Grid {
    pub fn new(name: impl Into<String>, x: Axis, y: Axis, values: Vec<f64>) -> Result<Self, GridError> {
        let expected = x.len() * y.len();
        if values.len() != expected {
            return Err(GridError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            x,
            y,
            values,
        })
    }

    /// Builds a grid by evaluating `f(x, y)` at every coordinate pair.
    pub fn from_fn(name: impl Into<String>, x: Axis, y: Axis, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut values = Vec::with_capacity(x.len() * y.len());
        for yv in &y.values {
            for xv in &x.values {
                values.push(f(*xv, *yv));
            }
        }
        Self {
            name: name.into(),
            x,
            y,
            values,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, xi: usize, yi: usize) -> Option<f64> {
        if xi >= self.x.len() {
            return None;
        }
        self.values.get(yi * self.x.len() + xi).copied()
    }

    /// Bounding box of the coordinate samples, `None` for an empty grid.
    pub fn extent(&self) -> Option<Aabb2> {
        Some(Aabb2::from_ranges(self.x.range().ok()?, self.y.range().ok()?))
    }

    pub fn resolution(&self) -> Result<GridResolution, GridError> {
        Ok(GridResolution {
            x: self.x.resolution()?,
            y: self.y.resolution()?,
        })
    }

    /// Sub-grid of the samples whose coordinates fall inside the half-open window
    /// `[min, max)` on both axes. Sample order is preserved.
    pub fn select(&self, window: &Aabb2) -> Grid {
        let xs = self.x.indices_within(window.x_min(), window.x_max());
        let ys = self.y.indices_within(window.y_min(), window.y_max());
        let nx = self.x.len();

        let mut values = Vec::with_capacity(xs.len() * ys.len());
        for &yi in &ys {
            for &xi in &xs {
                values.push(self.values[yi * nx + xi]);
            }
        }

        Grid {
            name: self.name.clone(),
            x: Axis::new(self.x.name.clone(), xs.iter().map(|&i| self.x.values[i]).collect()),
            y: Axis::new(self.y.name.clone(), ys.iter().map(|&i| self.y.values[i]).collect()),
            values,
        }
    }

    pub fn rename_axes(mut self, x_name: &str, y_name: &str) -> Self {
        self.x.name = x_name.to_string();
        self.y.name = y_name.to_string();
        self
    }

    pub fn map(mut self, f: impl Fn(f64) -> f64) -> Self {
        for v in &mut self.values {
            *v = f(*v);
        }
        self
    }

    /// Combines two grids of identical shape sample by sample.
    pub fn zip_with(mut self, other: &Grid, f: impl Fn(f64, f64) -> f64) -> Result<Self, GridError> {
        if other.values.len() != self.values.len() {
            return Err(GridError::ShapeMismatch {
                expected: self.values.len(),
                found: other.values.len(),
            });
        }
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a = f(*a, *b);
        }
        Ok(self)
    }
}
