use serde::{Deserialize, Serialize};

pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f64,
    pub color: Rgba,
}

impl ColorStop {
    pub const fn new(value: f64, color: Rgba) -> Self {
        Self { value, color }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbologyError {
    #[error("a colour map needs at least one stop")]
    NoStops,

    #[error("colour stop values must be finite")]
    NonFiniteStop,
}

/// Classification colour map: ordered stops with linear interpolation between
/// neighbours. Values below the first stop or above the last take the end
/// colours; `NaN` is transparent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawColorMap")]
pub struct ColorMap {
    stops: Vec<ColorStop>,
}

#[derive(Deserialize)]
struct RawColorMap {
    stops: Vec<ColorStop>,
}

impl TryFrom<RawColorMap> for ColorMap {
    type Error = SymbologyError;

    fn try_from(raw: RawColorMap) -> Result<Self, Self::Error> {
        ColorMap::new(raw.stops)
    }
}

impl ColorMap {
    pub fn new(mut stops: Vec<ColorStop>) -> Result<Self, SymbologyError> {
        if stops.is_empty() {
            return Err(SymbologyError::NoStops);
        }
        if stops.iter().any(|s| !s.value.is_finite()) {
            return Err(SymbologyError::NonFiniteStop);
        }
        stops.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ok(Self { stops })
    }

    /// Precipitation-style ramp over `[0, 1]`: pale blue through green and
    /// yellow to red.
    pub fn precipitation() -> Self {
        Self {
            stops: vec![
                ColorStop::new(0.0, [170, 210, 255, 200]),
                ColorStop::new(0.25, [50, 130, 255, 255]),
                ColorStop::new(0.5, [0, 200, 100, 255]),
                ColorStop::new(0.75, [255, 255, 0, 255]),
                ColorStop::new(1.0, [255, 50, 0, 255]),
            ],
        }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn range(&self) -> (f64, f64) {
        let first = self.stops[0].value;
        let last = self.stops[self.stops.len() - 1].value;
        (first, last)
    }

    /// Linearly rescales the stop values onto `[min, max]`, keeping colours.
    pub fn fit_to(&self, min: f64, max: f64) -> Self {
        let (lo, hi) = self.range();
        let span = hi - lo;
        let stops = self
            .stops
            .iter()
            .map(|s| {
                let t = if span > 0.0 { (s.value - lo) / span } else { 0.0 };
                ColorStop::new(min + t * (max - min), s.color)
            })
            .collect();
        Self { stops }
    }

    pub fn color(&self, v: f64) -> Rgba {
        if v.is_nan() {
            return TRANSPARENT;
        }
        let first = self.stops[0];
        if v <= first.value {
            return first.color;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if v <= b.value {
                let t = (v - a.value) / (b.value - a.value);
                return lerp(a.color, b.color, t);
            }
        }
        self.stops[self.stops.len() - 1].color
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::precipitation()
    }
}

fn lerp(a: Rgba, b: Rgba, t: f64) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for i in 0..4 {
        let v = a[i] as f64 + (b[i] as f64 - a[i] as f64) * t;
        out[i] = v.round() as u8;
    }
    out
}

/// Drawing parameters of a raster layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub color_map: ColorMap,
    /// Multiplies the alpha channel of every pixel.
    pub opacity: f32,
}

impl LayerStyle {
    pub fn new(color_map: ColorMap) -> Self {
        Self {
            color_map,
            opacity: 1.0,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn pixel(&self, v: f64) -> Rgba {
        let mut c = self.color_map.color(v);
        c[3] = (c[3] as f32 * self.opacity).round() as u8;
        c
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self::new(ColorMap::default())
    }
}
