use compute::dataset::DatasetError;
use compute::pipeline::TileError;
use foundation::ids::{ElementId, IdError};
use runtime::callback::BindError;

use crate::groups::GroupKind;

/// Declaration-time failure. Any of these means the dashboard definition is
/// wrong; the server refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("invalid default for `{id}`: {reason}")]
    InvalidDefault { id: ElementId, reason: String },

    #[error("number `{id}`: max {max} is lower than min {min}")]
    InvalidRange { id: ElementId, min: f64, max: f64 },

    #[error("no {0} group has been created yet")]
    NoActiveGroup(GroupKind),

    #[error("dataset `{id}`: {source}")]
    FatalDatasetConfig {
        id: ElementId,
        #[source]
        source: DatasetError,
    },

    #[error("no layer with index {0}")]
    UnknownLayer(usize),
}

impl DeclarationError {
    pub(crate) fn invalid_default(id: &ElementId, reason: impl Into<String>) -> Self {
        DeclarationError::InvalidDefault {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

/// Request-time failure while applying an input value or decoding tile
/// parameters.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error("value for `{id}` rejected: {reason}")]
    Rejected { id: ElementId, reason: String },

    #[error("no layer with index {0}")]
    UnknownLayer(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum TileRequestError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Tile(#[from] TileError),
}
