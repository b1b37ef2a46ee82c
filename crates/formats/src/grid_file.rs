use std::fs;
use std::path::{Path, PathBuf};

use foundation::grid::{Axis, Grid, GridError};
use serde::{Deserialize, Serialize};

pub const GRID_FILE_VERSION: &str = "1.0";

/// On-disk gridded dataset: two coordinate axes and row-major samples.
///
/// Missing samples are written as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridFile {
    pub version: String,
    pub name: String,
    pub x: Axis,
    pub y: Axis,
    pub values: Vec<Option<f64>>,
    /// Optional colour range hint: `[min, max]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<[f64; 2]>,
}

#[derive(Debug, thiserror::Error)]
pub enum GridFileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported grid file version `{0}`")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Shape(#[from] GridError),
}

impl GridFile {
    pub fn from_grid(grid: &Grid) -> Self {
        Self {
            version: GRID_FILE_VERSION.to_string(),
            name: grid.name.clone(),
            x: grid.x.clone(),
            y: grid.y.clone(),
            values: grid
                .values()
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
            value_range: None,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, GridFileError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| GridFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: GridFile = serde_json::from_str(&raw).map_err(|source| GridFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if file.version != GRID_FILE_VERSION {
            return Err(GridFileError::UnsupportedVersion(file.version));
        }
        Ok(file)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), GridFileError> {
        let path = path.as_ref();
        let body = serde_json::to_string(self).map_err(|source| GridFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body).map_err(|source| GridFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_grid(self) -> Result<Grid, GridFileError> {
        let values = self
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        Ok(Grid::new(self.name, self.x, self.y, values)?)
    }
}
