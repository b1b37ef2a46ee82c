use std::f64::consts::PI;
use std::sync::Arc;

use compute::analysis::statistics::Statistics;
use compute::dataset::{Dataset, GridFileDataset, InMemoryDataset};
use compute::pipeline::TilePipeline;
use foundation::bounds::Aabb2;
use foundation::grid::{Axis, Grid};
use foundation::value::{LatLng, Value};
use layers::raster::Rasterizer;
use maproom::controls::{MONTHS, NumberRange};
use maproom::dashboard::Dashboard;
use maproom::error::DeclarationError;
use maproom::session::Session;
use runtime::function::{ComputeError, ComputeFunction, DATA_PARAM, TileFunction};

use crate::config::Config;

pub const DATA_ID: &str = "precip";

/// Builds the monthly climatology dashboard.
pub fn monthly_climatology(config: &Config) -> Result<Dashboard, DeclarationError> {
    let dataset: Arc<dyn Dataset> = match &config.data {
        Some(path) => Arc::new(
            GridFileDataset::open(path).map_err(|source| DeclarationError::FatalDatasetConfig {
                id: DATA_ID.into(),
                source,
            })?,
        ),
        None => Arc::new(InMemoryDataset::new(synthetic_precip(2.0))),
    };

    let mut s = Session::new("Monthly Climatology", config.prefix.clone());

    let mut controls = s.controls();
    controls.group("First Group")?;
    controls.month("m0", "jan")?;
    controls.label("foo")?;
    controls.month("m1", "jan")?;
    controls.text("t1", "")?;

    controls.group("Second Group")?;
    controls.select("s0", &["ABC", "XYZ"], Some("XYZ"))?;
    controls.number("num0", NumberRange::between(0.0, 100.0).with_default(50.0))?;

    let hider = ComputeFunction::new(["num0"], |i| Ok(Value::Bool(i.number("num0")? >= 50.0)));
    controls.group_shown_when("Third Group", hider)?;
    controls.label("Hello, World!")?;

    controls.group("Map")?;
    controls.month("mon1", "January")?;

    s.marker("pin", LatLng::new(0.0, 20.0))?;
    s.data(DATA_ID, dataset.clone())?;

    let mut plots = s.plots();
    plots.group("First Tab")?;
    plots.output(
        "Out1",
        ComputeFunction::new(["s0", "m0", "m1"], |i| {
            Ok(Value::from(format!("{}{}{}", i.text("s0")?, i.text("m0")?, i.text("m1")?)))
        }),
    )?;
    plots.output(
        "Out2",
        ComputeFunction::new(["m0", "m1"], |i| Ok(Value::from(format!("{}{}", i.text("m0")?, i.text("m1")?)))),
    )?;
    let at_pin = dataset.clone();
    plots.output(
        "Precipitation at marker",
        ComputeFunction::new(["pin", "mon1"], move |i| {
            let pin = i.position("pin")?;
            let factor = seasonal_factor(i.text("mon1")?)?;
            let around = Aabb2::new([pin.lng - 2.0, pin.lat - 2.0], [pin.lng + 2.0, pin.lat + 2.0]);
            let window = at_pin
                .read_window(&around)
                .map_err(|e| ComputeError::failed(e.to_string()))?;
            match Statistics::mean(window.values()) {
                Some(mean) => Ok(Value::from(format!("{:.1} mm/month", mean * factor))),
                None => Ok(Value::from("no data")),
            }
        }),
    )?;
    plots.group("Second Tab")?;

    s.layer(
        "Monthly Climatology",
        DATA_ID,
        TileFunction::new([DATA_PARAM, "mon1"], |data: Grid, i| {
            let factor = seasonal_factor(i.text("mon1")?)?;
            Ok(data.map(|v| v * factor))
        }),
    )?;

    let pipeline = TilePipeline::new(Rasterizer::new(config.tile_size, config.tile_scheme));
    Ok(s.freeze(pipeline))
}

/// Multiplier applied to the annual field for a month: wetter mid-year.
fn seasonal_factor(month: &str) -> Result<f64, ComputeError> {
    let index = MONTHS
        .iter()
        .position(|(_, abbr)| *abbr == month)
        .ok_or_else(|| ComputeError::failed(format!("`{month}` is not a month")))?;
    Ok(1.0 - 0.5 * (2.0 * PI * index as f64 / 12.0).cos())
}

/// Global annual-mean precipitation field on a regular `res`-degree grid:
/// a wet equatorial band plus two storm-track bands.
pub fn synthetic_precip(res: f64) -> Grid {
    let n_lon = (360.0 / res) as usize;
    let n_lat = (180.0 / res) as usize;
    let lons = (0..n_lon).map(|i| -180.0 + res / 2.0 + i as f64 * res).collect();
    let lats = (0..n_lat).map(|j| 90.0 - res / 2.0 - j as f64 * res).collect();
    Grid::from_fn("precip", Axis::new("X", lons), Axis::new("Y", lats), |lon, lat| {
        let tropics = 250.0 * (-(lat / 12.0).powi(2)).exp();
        let storm_tracks = 90.0 * (-((lat.abs() - 50.0) / 10.0).powi(2)).exp();
        let waves = 20.0 * (lon.to_radians() * 3.0).sin().abs();
        tropics + storm_tracks + waves
    })
}

#[cfg(test)]
mod tests {
    use super::{monthly_climatology, seasonal_factor, synthetic_precip};
    use crate::config::Config;

    #[test]
    fn demo_declares_cleanly() {
        let d = monthly_climatology(&Config::default()).unwrap();
        assert_eq!(d.prefix(), "monthly");
        assert_eq!(d.layers().len(), 1);
        assert_eq!(d.controls().len(), 4);
        assert_eq!(d.plots().len(), 2);
        // hider + three plot outputs
        assert_eq!(d.callbacks().len(), 4);
    }

    #[test]
    fn synthetic_grid_is_regular() {
        let g = synthetic_precip(2.0);
        assert_eq!(g.shape(), (90, 180));
        let res = g.resolution().unwrap();
        assert_eq!((res.x, res.y), (2.0, 2.0));
    }

    #[test]
    fn july_is_wetter_than_january() {
        assert!(seasonal_factor("jul").unwrap() > seasonal_factor("jan").unwrap());
        assert!(seasonal_factor("xyz").is_err());
    }
}
