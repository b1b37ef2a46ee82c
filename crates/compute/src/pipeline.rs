use std::sync::Arc;

use foundation::bounds::Aabb2;
use foundation::grid::{GridResolution, LAT, LON};
use foundation::tile::TileCoord;
use image::RgbaImage;
use layers::layer::TileLayer;
use layers::raster::{RasterError, Rasterizer, encode_png};
use runtime::function::{ComputeError, Inputs};
use tracing::debug;

use crate::align::align_window;
use crate::dataset::{Dataset, DatasetError};

/// A dataset prepared for tiling: extent and native resolution are resolved
/// once, when the source is opened.
#[derive(Debug, Clone)]
pub struct TileSource {
    dataset: Arc<dyn Dataset>,
    extent: Aabb2,
    resolution: GridResolution,
}

impl TileSource {
    /// Fails with `FatalDatasetConfig` when either axis has fewer than two
    /// samples or a degenerate spacing.
    pub fn open(dataset: Arc<dyn Dataset>) -> Result<Self, DatasetError> {
        let (x, y) = dataset.axes()?;
        let resolution = GridResolution {
            x: x.resolution()?,
            y: y.resolution()?,
        };
        let extent = Aabb2::from_ranges(x.range()?, y.range()?);
        Ok(Self {
            dataset,
            extent,
            resolution,
        })
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.dataset
    }

    pub fn extent(&self) -> Aabb2 {
        self.extent
    }

    pub fn resolution(&self) -> GridResolution {
        self.resolution
    }

    /// Aligned read window for a tile box, or `None` when the box misses the
    /// dataset entirely.
    pub fn window(&self, bounds: &Aabb2) -> Option<Aabb2> {
        if !bounds.intersects(&self.extent) {
            return None;
        }
        Some(align_window(bounds, self.resolution))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("tile {z}/{x}/{y} is outside the tile grid")]
    InvalidTile { z: u8, x: u32, y: u32 },

    #[error("dataset read failed: {0}")]
    Dataset(#[from] DatasetError),

    #[error("tile function failed: {0}")]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tile {
    /// The tile box does not touch the dataset.
    Empty,
    Image(RgbaImage),
}

impl Tile {
    pub fn is_empty(&self) -> bool {
        matches!(self, Tile::Empty)
    }
}

/// Renders tiles of one layer: window, compute, rename, rasterize.
#[derive(Debug, Copy, Clone, Default)]
pub struct TilePipeline {
    rasterizer: Rasterizer,
}

impl TilePipeline {
    pub fn new(rasterizer: Rasterizer) -> Self {
        Self { rasterizer }
    }

    pub fn rasterizer(&self) -> Rasterizer {
        self.rasterizer
    }

    /// `inputs` must hold a value for every parameter of the layer's tile
    /// function after `data`; other entries are ignored.
    pub fn render(&self, source: &TileSource, layer: &TileLayer, coord: TileCoord, inputs: &Inputs) -> Result<Tile, TileError> {
        if !coord.is_valid() {
            return Err(TileError::InvalidTile {
                z: coord.z,
                x: coord.x,
                y: coord.y,
            });
        }
        let bounds = self.rasterizer.scheme.bounds(coord);
        let Some(window) = source.window(&bounds) else {
            return Ok(Tile::Empty);
        };

        let params = inputs.subset(layer.params().iter().map(|p| &p.id))?;
        let data = source.dataset.read_window(&window)?;
        debug!(
            layer = layer.id().0,
            z = coord.z,
            x = coord.x,
            y = coord.y,
            cells = data.values().len(),
            "tile window read"
        );

        let result = layer.function().call(data, &params)?.rename_axes(LON, LAT);
        // A function may resample the window; snap pixels to its own cells.
        let cell = result.resolution().unwrap_or(source.resolution);
        Ok(Tile::Image(self.rasterizer.render(&result, coord, cell, &layer.style)))
    }

    pub fn encode(&self, tile: &Tile) -> Result<Vec<u8>, TileError> {
        match tile {
            Tile::Empty => Ok(encode_png(&self.rasterizer.empty())?),
            Tile::Image(img) => Ok(encode_png(img)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Tile, TileError, TilePipeline, TileSource};
    use crate::dataset::{Dataset, DatasetError, InMemoryDataset};
    use foundation::bounds::Aabb2;
    use foundation::grid::{Axis, Grid, GridError};
    use foundation::ids::{IdKind, IdRegistry};
    use foundation::tile::{TileCoord, TileScheme};
    use layers::layer::{LayerId, TileLayer};
    use layers::raster::Rasterizer;
    use runtime::function::{ComputeError, DATA_PARAM, Inputs, TileFunction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct CountingDataset {
        inner: InMemoryDataset,
        reads: AtomicUsize,
    }

    impl Dataset for CountingDataset {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn axes(&self) -> Result<(Axis, Axis), DatasetError> {
            self.inner.axes()
        }

        fn read_window(&self, window: &Aabb2) -> Result<Grid, DatasetError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_window(window)
        }
    }

    fn four_by_four() -> Grid {
        Grid::from_fn(
            "t",
            Axis::new("X", vec![0.0, 1.0, 2.0, 3.0]),
            Axis::new("Y", vec![0.0, 1.0, 2.0, 3.0]),
            |x, y| x * y,
        )
    }

    fn ids() -> IdRegistry {
        let mut ids = IdRegistry::new();
        ids.register("t", IdKind::Data).unwrap();
        ids.register("scale", IdKind::Control).unwrap();
        ids
    }

    fn counting() -> Arc<CountingDataset> {
        Arc::new(CountingDataset {
            inner: InMemoryDataset::new(four_by_four()),
            reads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn out_of_extent_tile_is_empty_without_reading() {
        let ds = counting();
        let source = TileSource::open(ds.clone()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let layer = TileLayer::bind(
            &ids(),
            LayerId(0),
            "t",
            "t",
            TileFunction::new([DATA_PARAM], move |g, _| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                Ok(g)
            }),
        )
        .unwrap();

        // z=2, x=0, y=0 covers lon [-180,-90] x lat [45,90]; the data sits at 0..3.
        let tile = TilePipeline::default()
            .render(&source, &layer, TileCoord::new(2, 0, 0), &Inputs::new())
            .unwrap();
        assert_eq!(tile, Tile::Empty);
        assert_eq!(ds.reads.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn root_tile_hands_whole_dataset_to_function() {
        let ds = counting();
        let source = TileSource::open(ds.clone()).unwrap();
        assert_eq!(source.extent(), Aabb2::new([0.0, 0.0], [3.0, 3.0]));

        let bounds = TileScheme::Geographic.bounds(TileCoord::new(0, 0, 0));
        assert_eq!(source.window(&bounds).unwrap(), Aabb2::new([-180.0, -90.0], [181.0, 91.0]));

        let seen = Arc::new(Mutex::new(None));
        let seen_in = seen.clone();
        let layer = TileLayer::bind(
            &ids(),
            LayerId(0),
            "t",
            "t",
            TileFunction::new([DATA_PARAM], move |g, _| {
                *seen_in.lock().unwrap() = Some(g.clone());
                Ok(g)
            }),
        )
        .unwrap();

        let pipeline = TilePipeline::new(Rasterizer::new(16, TileScheme::Geographic));
        let tile = pipeline
            .render(&source, &layer, TileCoord::new(0, 0, 0), &Inputs::new())
            .unwrap();
        assert!(!tile.is_empty());
        assert_eq!(ds.reads.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&four_by_four()));
    }

    #[test]
    fn tile_function_sees_only_its_params() {
        let source = TileSource::open(counting()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let layer = TileLayer::bind(
            &ids(),
            LayerId(0),
            "t",
            "t",
            TileFunction::new([DATA_PARAM, "scale"], move |g, inputs| {
                let s = inputs.number("scale")?;
                seen_in.lock().unwrap().push(inputs.len());
                Ok(g.map(|v| v * s))
            }),
        )
        .unwrap();

        let inputs = Inputs::new().with("scale", 2.0).with("unrelated", 1.0);
        TilePipeline::default()
            .render(&source, &layer, TileCoord::new(0, 0, 0), &inputs)
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn missing_param_and_compute_failures_surface() {
        let source = TileSource::open(counting()).unwrap();
        let layer = TileLayer::bind(
            &ids(),
            LayerId(0),
            "t",
            "t",
            TileFunction::new([DATA_PARAM, "scale"], |_, _| Err(ComputeError::failed("bad"))),
        )
        .unwrap();
        let pipeline = TilePipeline::default();
        let root = TileCoord::new(0, 0, 0);

        let err = pipeline.render(&source, &layer, root, &Inputs::new()).unwrap_err();
        assert!(matches!(err, TileError::Compute(ComputeError::MissingInput(_))));

        let err = pipeline
            .render(&source, &layer, root, &Inputs::new().with("scale", 1.0))
            .unwrap_err();
        assert!(matches!(err, TileError::Compute(ComputeError::Failed(_))));

        let err = pipeline
            .render(&source, &layer, TileCoord::new(1, 5, 0), &Inputs::new())
            .unwrap_err();
        assert!(matches!(err, TileError::InvalidTile { z: 1, x: 5, .. }));
    }

    #[test]
    fn single_sample_axis_is_fatal_at_open() {
        let grid = Grid::from_fn("one", Axis::new("X", vec![0.0]), Axis::new("Y", vec![0.0, 1.0]), |_, _| 0.0);
        let err = TileSource::open(Arc::new(InMemoryDataset::new(grid))).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::FatalDatasetConfig(GridError::TooFewSamples { count: 1, .. })
        ));
    }

    #[test]
    fn empty_tile_encodes_as_png() {
        let bytes = TilePipeline::default().encode(&Tile::Empty).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn resampled_result_renders_with_its_own_cell_size() {
        let source = TileSource::open(counting()).unwrap();
        let layer = TileLayer::bind(
            &ids(),
            LayerId(0),
            "t",
            "t",
            TileFunction::new([DATA_PARAM], |_, _| {
                Ok(Grid::from_fn(
                    "coarse",
                    Axis::new("X", vec![-90.0, 90.0]),
                    Axis::new("Y", vec![45.0, -45.0]),
                    |_, _| 1.0,
                ))
            }),
        )
        .unwrap();

        let pipeline = TilePipeline::new(Rasterizer::new(8, TileScheme::Geographic));
        let Tile::Image(img) = pipeline
            .render(&source, &layer, TileCoord::new(0, 0, 0), &Inputs::new())
            .unwrap()
        else {
            panic!("expected an image tile");
        };
        assert!(img.pixels().all(|p| p.0[3] > 0));
    }
}
