use foundation::ids::{ElementId, IdKind, IdRegistry};
use runtime::callback::{BindError, InputBinding, resolve_tile_params};
use runtime::function::TileFunction;
use serde::{Deserialize, Serialize};

use crate::symbology::LayerStyle;

/// Position of a tile layer in declaration order; the `<i>` of `tile-<i>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub usize);

/// A raster map layer: a dataset reference plus the tile function that
/// transforms each dataset window before it is drawn.
#[derive(Debug, Clone)]
pub struct TileLayer {
    id: LayerId,
    pub label: String,
    data: ElementId,
    function: TileFunction,
    params: Vec<InputBinding>,
    pub style: LayerStyle,
}

impl TileLayer {
    /// Validates `data` (kind `data`) and the tile function's parameters.
    pub fn bind(
        ids: &IdRegistry,
        id: LayerId,
        label: impl Into<String>,
        data: impl Into<ElementId>,
        function: TileFunction,
    ) -> Result<Self, BindError> {
        let data = data.into();
        ids.require_kind(data.as_str(), &[IdKind::Data])?;
        let params = resolve_tile_params(ids, &function)?;
        Ok(Self {
            id,
            label: label.into(),
            data,
            function,
            params,
            style: LayerStyle::default(),
        })
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn data(&self) -> &ElementId {
        &self.data
    }

    pub fn function(&self) -> &TileFunction {
        &self.function
    }

    /// Inputs after `data`, in declaration order; these become the tile
    /// URL query parameters.
    pub fn params(&self) -> &[InputBinding] {
        &self.params
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.params.iter().any(|p| p.id.as_str() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerId, TileLayer};
    use foundation::ids::{IdError, IdKind, IdRegistry};
    use runtime::callback::BindError;
    use runtime::function::{DATA_PARAM, TileFunction};

    fn ids() -> IdRegistry {
        let mut ids = IdRegistry::new();
        ids.register("precip", IdKind::Data).unwrap();
        ids.register("mon1", IdKind::Control).unwrap();
        ids.register("pin", IdKind::Marker).unwrap();
        ids
    }

    #[test]
    fn binds_params_after_data() {
        let layer = TileLayer::bind(
            &ids(),
            LayerId(0),
            "Precip",
            "precip",
            TileFunction::new([DATA_PARAM, "mon1", "pin"], |g, _| Ok(g)),
        )
        .unwrap();
        let names: Vec<_> = layer.params().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(names, vec!["mon1", "pin"]);
        assert!(layer.depends_on("mon1"));
        assert!(!layer.depends_on("precip"));
    }

    #[test]
    fn data_reference_must_be_data_kind() {
        let err = TileLayer::bind(&ids(), LayerId(0), "x", "mon1", TileFunction::identity()).unwrap_err();
        assert!(matches!(
            err,
            BindError::Id(IdError::KindMismatch { found: IdKind::Control, .. })
        ));
    }

    #[test]
    fn first_param_must_be_data() {
        let err = TileLayer::bind(
            &ids(),
            LayerId(0),
            "x",
            "precip",
            TileFunction::new(["mon1"], |g, _| Ok(g)),
        )
        .unwrap_err();
        assert!(matches!(err, BindError::InvalidComputeFunction(_)));
    }
}
