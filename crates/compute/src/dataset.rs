use std::fmt;
use std::path::{Path, PathBuf};

use formats::grid_file::{GridFile, GridFileError};
use foundation::bounds::Aabb2;
use foundation::grid::{Axis, Grid, GridError};

use crate::analysis::statistics::Statistics;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// The dataset's axes cannot describe a grid; raised at declaration.
    #[error("fatal dataset configuration: {0}")]
    FatalDatasetConfig(#[from] GridError),

    #[error(transparent)]
    File(#[from] GridFileError),
}

/// Read access to a gridded dataset.
///
/// Implementations must tolerate concurrent independent reads; every tile
/// request reads its own window.
pub trait Dataset: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Coordinate axes `(x, y)`.
    fn axes(&self) -> Result<(Axis, Axis), DatasetError>;

    /// Materializes the samples inside the half-open `window`.
    fn read_window(&self, window: &Aabb2) -> Result<Grid, DatasetError>;

    /// Value range used to fit a colour map, when known.
    fn value_range(&self) -> Option<(f64, f64)> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    grid: Grid,
}

impl InMemoryDataset {
    pub fn new(grid: Grid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl Dataset for InMemoryDataset {
    fn name(&self) -> &str {
        &self.grid.name
    }

    fn axes(&self) -> Result<(Axis, Axis), DatasetError> {
        Ok((self.grid.x.clone(), self.grid.y.clone()))
    }

    fn read_window(&self, window: &Aabb2) -> Result<Grid, DatasetError> {
        Ok(self.grid.select(window))
    }

    fn value_range(&self) -> Option<(f64, f64)> {
        Statistics::min_max(self.grid.values())
    }
}

/// A dataset stored as a JSON grid file. The file is re-read on every
/// window request; nothing is cached between requests.
#[derive(Debug, Clone)]
pub struct GridFileDataset {
    path: PathBuf,
    name: String,
    value_range: Option<(f64, f64)>,
}

impl GridFileDataset {
    /// Opens the file once to check that it parses and that its values fill
    /// its axes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        let file = GridFile::read(&path)?;
        let name = file.name.clone();
        let value_range = file.value_range.map(|[lo, hi]| (lo, hi));
        file.into_grid()?;
        Ok(Self {
            path,
            name,
            value_range,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Dataset for GridFileDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn axes(&self) -> Result<(Axis, Axis), DatasetError> {
        let file = GridFile::read(&self.path)?;
        Ok((file.x, file.y))
    }

    fn read_window(&self, window: &Aabb2) -> Result<Grid, DatasetError> {
        let grid = GridFile::read(&self.path)?.into_grid()?;
        Ok(grid.select(window))
    }

    fn value_range(&self) -> Option<(f64, f64)> {
        self.value_range
    }
}
