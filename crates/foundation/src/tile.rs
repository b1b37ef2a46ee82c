use serde::{Deserialize, Serialize};

use crate::bounds::Aabb2;

/// Tile coordinate in ZXY scheme. Row `y` grows southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at zoom `z`.
    pub fn tiles_per_axis(z: u8) -> u64 {
        1u64 << z
    }

    pub fn is_valid(&self) -> bool {
        self.z < 32 && (self.x as u64) < Self::tiles_per_axis(self.z)
            && (self.y as u64) < Self::tiles_per_axis(self.z)
    }
}

/// How tile indices map onto longitude/latitude.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileScheme {
    /// Equirectangular: the single z=0 tile spans `[-180, 180] x [-90, 90]`.
    #[default]
    Geographic,
    /// Spherical Web Mercator (latitudes clipped near +-85.05).
    WebMercator,
}

impl TileScheme {
    /// Longitude of the left edge of column `x` at zoom `z`.
    pub fn tile_left(self, x: u32, z: u8) -> f64 {
        let n = TileCoord::tiles_per_axis(z) as f64;
        (x as f64 / n) * 360.0 - 180.0
    }

    /// Latitude of the top edge of row `y` at zoom `z`.
    pub fn tile_top(self, y: u32, z: u8) -> f64 {
        let n = TileCoord::tiles_per_axis(z) as f64;
        match self {
            TileScheme::Geographic => 90.0 - (y as f64 / n) * 180.0,
            TileScheme::WebMercator => {
                let t = std::f64::consts::PI - 2.0 * std::f64::consts::PI * (y as f64) / n;
                t.sinh().atan().to_degrees()
            }
        }
    }

    /// Latitude at a fractional position `v` in `[0, 1]` down a tile whose
    /// top edge is `top` and bottom edge is `bottom`.
    ///
    /// Mercator tiles are not linear in latitude, so pixel rows must be
    /// interpolated in projected space.
    pub fn lat_between(self, top: f64, bottom: f64, v: f64) -> f64 {
        match self {
            TileScheme::Geographic => top + (bottom - top) * v,
            TileScheme::WebMercator => {
                let my_top = mercator_y(top);
                let my_bottom = mercator_y(bottom);
                inverse_mercator_y(my_top + (my_bottom - my_top) * v)
            }
        }
    }

    /// Geographic box of a tile: `x_min = tile_left(x)`, `x_max = tile_left(x + 1)`,
    /// `y_max = tile_top(y)`, `y_min = tile_top(y + 1)`.
    pub fn bounds(self, coord: TileCoord) -> Aabb2 {
        let x_min = self.tile_left(coord.x, coord.z);
        let x_max = self.tile_left(coord.x + 1, coord.z);
        let y_max = self.tile_top(coord.y, coord.z);
        let y_min = self.tile_top(coord.y + 1, coord.z);
        Aabb2::new([x_min, y_min], [x_max, y_max])
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "geographic" | "epsg:4326" => Some(TileScheme::Geographic),
            "web-mercator" | "mercator" | "epsg:3857" => Some(TileScheme::WebMercator),
            _ => None,
        }
    }
}

fn mercator_y(lat_deg: f64) -> f64 {
    let phi = lat_deg.to_radians();
    (std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln()
}

fn inverse_mercator_y(y: f64) -> f64 {
    y.sinh().atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::{TileCoord, TileScheme};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn geographic_root_tile_covers_globe() {
        let b = TileScheme::Geographic.bounds(TileCoord::new(0, 0, 0));
        assert_eq!(b.min, [-180.0, -90.0]);
        assert_eq!(b.max, [180.0, 90.0]);
    }

    #[test]
    fn rows_flip_latitude() {
        let top = TileScheme::Geographic.bounds(TileCoord::new(1, 0, 0));
        let bottom = TileScheme::Geographic.bounds(TileCoord::new(1, 0, 1));
        assert_eq!(top.y_max(), 90.0);
        assert_eq!(top.y_min(), 0.0);
        assert_eq!(bottom.y_max(), 0.0);
        assert_eq!(bottom.y_min(), -90.0);
    }

    #[test]
    fn mercator_root_tile_is_clipped() {
        let b = TileScheme::WebMercator.bounds(TileCoord::new(0, 0, 0));
        assert_close(b.y_max(), 85.051_128_78, 1e-6);
        assert_close(b.y_min(), -85.051_128_78, 1e-6);
        assert_eq!(b.x_min(), -180.0);
    }

    #[test]
    fn mercator_interpolation_hits_equator_midway() {
        let lat = TileScheme::WebMercator.lat_between(85.051_128_78, -85.051_128_78, 0.5);
        assert_close(lat, 0.0, 1e-9);
    }

    #[test]
    fn validity_checks_range() {
        assert!(TileCoord::new(2, 3, 3).is_valid());
        assert!(!TileCoord::new(2, 4, 0).is_valid());
    }

    #[test]
    fn parse_scheme_names() {
        assert_eq!(TileScheme::parse("EPSG:3857"), Some(TileScheme::WebMercator));
        assert_eq!(TileScheme::parse("geographic"), Some(TileScheme::Geographic));
        assert_eq!(TileScheme::parse("polar"), None);
    }
}
