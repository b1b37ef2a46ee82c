use std::io::Cursor;

use foundation::grid::{Axis, Grid, GridResolution};
use foundation::tile::{TileCoord, TileScheme};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::symbology::{LayerStyle, TRANSPARENT};

pub const DEFAULT_TILE_SIZE: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Turns a lon/lat grid into fixed-size tile images.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rasterizer {
    pub size: u32,
    pub scheme: TileScheme,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self {
            size: DEFAULT_TILE_SIZE,
            scheme: TileScheme::Geographic,
        }
    }
}

impl Rasterizer {
    pub fn new(size: u32, scheme: TileScheme) -> Self {
        Self {
            size: size.max(1),
            scheme,
        }
    }

    pub fn empty(&self) -> RgbaImage {
        RgbaImage::from_pixel(self.size, self.size, Rgba(TRANSPARENT))
    }

    /// Samples `grid` at every pixel centre of tile `coord`.
    ///
    /// Each pixel takes the nearest grid cell when the pixel centre lies within
    /// half a cell (`cell`) of it on both axes; otherwise it stays transparent.
    pub fn render(&self, grid: &Grid, coord: TileCoord, cell: GridResolution, style: &LayerStyle) -> RgbaImage {
        let mut img = self.empty();
        if grid.x.is_empty() || grid.y.is_empty() {
            return img;
        }

        let bounds = self.scheme.bounds(coord);
        let size = self.size as f64;

        let columns: Vec<Option<usize>> = (0..self.size)
            .map(|px| {
                let u = (px as f64 + 0.5) / size;
                let lon = bounds.x_min() + u * bounds.width();
                snap(&grid.x, lon, cell.x)
            })
            .collect();
        let rows: Vec<Option<usize>> = (0..self.size)
            .map(|py| {
                let v = (py as f64 + 0.5) / size;
                let lat = self.scheme.lat_between(bounds.y_max(), bounds.y_min(), v);
                snap(&grid.y, lat, cell.y)
            })
            .collect();

        for (py, yi) in rows.iter().enumerate() {
            let Some(yi) = yi else { continue };
            for (px, xi) in columns.iter().enumerate() {
                let Some(xi) = xi else { continue };
                let v = grid.get(*xi, *yi).unwrap_or(f64::NAN);
                img.put_pixel(px as u32, py as u32, Rgba(style.pixel(v)));
            }
        }
        img
    }
}

fn snap(axis: &Axis, v: f64, cell: f64) -> Option<usize> {
    let i = axis.nearest(v)?;
    ((axis.values[i] - v).abs() <= cell / 2.0).then_some(i)
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RasterError> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_TILE_SIZE, Rasterizer, encode_png};
    use crate::symbology::{ColorMap, ColorStop, LayerStyle, TRANSPARENT};
    use foundation::grid::{Axis, Grid, GridResolution};
    use foundation::tile::{TileCoord, TileScheme};

    fn style() -> LayerStyle {
        LayerStyle::new(
            ColorMap::new(vec![
                ColorStop::new(0.0, [0, 0, 255, 255]),
                ColorStop::new(1.0, [255, 0, 0, 255]),
            ])
            .unwrap(),
        )
    }

    fn quadrant_grid() -> Grid {
        // Four 90-degree-wide columns by two 90-degree-high rows; centres at
        // lon -135..135, lat -45 and 45.
        Grid::from_fn(
            "q",
            Axis::new("lon", vec![-135.0, -45.0, 45.0, 135.0]),
            Axis::new("lat", vec![45.0, -45.0]),
            |x, y| if x > 0.0 && y > 0.0 { 1.0 } else { 0.0 },
        )
    }

    #[test]
    fn root_tile_covers_whole_grid() {
        let r = Rasterizer::new(8, TileScheme::Geographic);
        let img = r.render(
            &quadrant_grid(),
            TileCoord::new(0, 0, 0),
            GridResolution { x: 90.0, y: 90.0 },
            &style(),
        );
        // North-east quadrant is red, everything else blue.
        assert_eq!(img.get_pixel(7, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(7, 7).0, [0, 0, 255, 255]);
    }

    #[test]
    fn pixels_away_from_any_cell_are_transparent() {
        let g = Grid::from_fn(
            "dot",
            Axis::new("lon", vec![0.0, 1.0]),
            Axis::new("lat", vec![0.0, 1.0]),
            |_, _| 1.0,
        );
        let r = Rasterizer::new(16, TileScheme::Geographic);
        let img = r.render(&g, TileCoord::new(0, 0, 0), GridResolution { x: 1.0, y: 1.0 }, &style());
        assert_eq!(img.get_pixel(0, 0).0, TRANSPARENT);
        assert_eq!(img.get_pixel(15, 15).0, TRANSPARENT);
    }

    #[test]
    fn empty_grid_renders_empty_tile() {
        let g = quadrant_grid().select(&foundation::bounds::Aabb2::new([500.0, 500.0], [600.0, 600.0]));
        let r = Rasterizer::default();
        let img = r.render(&g, TileCoord::new(0, 0, 0), GridResolution { x: 90.0, y: 90.0 }, &style());
        assert_eq!(img.dimensions(), (DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE));
        assert!(img.pixels().all(|p| p.0 == TRANSPARENT));
    }

    #[test]
    fn png_has_signature() {
        let bytes = encode_png(&Rasterizer::new(4, TileScheme::Geographic).empty()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
