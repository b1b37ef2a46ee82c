use std::collections::BTreeMap;

use compute::pipeline::{Tile, TileError, TilePipeline, TileSource};
use foundation::ids::{ElementId, IdError, IdKind, IdRegistry};
use foundation::tile::TileCoord;
use foundation::value::{LatLng, Value};
use layers::layer::{LayerId, TileLayer};
use runtime::callback::{BindingDescriptor, CallbackRegistry};
use runtime::dispatch::{Dispatch, LiveState};
use runtime::function::Inputs;
use serde::Serialize;
use tracing::debug;

use crate::controls::Control;
use crate::error::{InputError, TileRequestError};
use crate::groups::{Content, Groups};
use crate::layout::Layout;
use crate::session::{Marker, Session};

/// Current source URL of a tile layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerUrl {
    pub layer: LayerId,
    pub url: String,
}

/// Everything one input event changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputChange {
    #[serde(flatten)]
    pub dispatch: Dispatch,
    pub layers: Vec<LayerUrl>,
}

/// A frozen, read-only dashboard ready to serve views and tiles.
///
/// Shared between requests; per-view state lives in [`LiveState`].
#[derive(Debug)]
pub struct Dashboard {
    title: String,
    prefix: String,
    ids: IdRegistry,
    callbacks: CallbackRegistry,
    controls: Groups,
    plots: Groups,
    markers: Vec<Marker>,
    data: BTreeMap<ElementId, TileSource>,
    layers: Vec<TileLayer>,
    inputs: BTreeMap<ElementId, Control>,
    defaults: Inputs,
    pipeline: TilePipeline,
}

impl Dashboard {
    pub(crate) fn from_session(session: Session, pipeline: TilePipeline) -> Self {
        let mut inputs = BTreeMap::new();
        let mut defaults = Inputs::new();
        for group in session.controls.iter() {
            for content in &group.contents {
                if let Content::Control(control) = content {
                    defaults.insert(control.id.clone(), control.default_value());
                    inputs.insert(control.id.clone(), control.clone());
                }
            }
        }
        for marker in &session.markers {
            defaults.insert(marker.id.clone(), Value::Position(marker.position));
        }

        Self {
            title: session.title,
            prefix: session.prefix,
            ids: session.ids,
            callbacks: session.callbacks,
            controls: session.controls,
            plots: session.plots,
            markers: session.markers,
            data: session.data,
            layers: session.layers,
            inputs,
            defaults,
            pipeline,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn ids(&self) -> &IdRegistry {
        &self.ids
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn controls(&self) -> &Groups {
        &self.controls
    }

    pub fn plots(&self) -> &Groups {
        &self.plots
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn pipeline(&self) -> TilePipeline {
        self.pipeline
    }

    /// Initial value of every control and marker.
    pub fn defaults(&self) -> &Inputs {
        &self.defaults
    }

    pub fn layer(&self, index: usize) -> Result<&TileLayer, InputError> {
        self.layers.get(index).ok_or(InputError::UnknownLayer(index))
    }

    /// Starts a view at the defaults and runs every callback once.
    pub fn open_view(&self) -> (LiveState, Dispatch) {
        let mut state = LiveState::new(self.defaults.clone());
        let dispatch = self.callbacks.fire_all(&mut state);
        (state, dispatch)
    }

    /// Validates `value` for input `id` and returns it in canonical form.
    pub fn coerce_input(&self, id: &str, value: Value) -> Result<Value, InputError> {
        let kind = self.ids.require_kind(id, IdKind::INPUTS)?;
        let rejected = |reason: String| InputError::Rejected {
            id: ElementId::from(id),
            reason,
        };
        match kind {
            IdKind::Marker => match value {
                Value::Position(p) if p.is_valid() => Ok(value),
                Value::Position(p) => Err(rejected(format!("`{p}` is not a valid position"))),
                Value::Text(raw) => LatLng::parse(&raw)
                    .map(Value::Position)
                    .ok_or_else(|| rejected(format!("`{raw}` is not a `lat,lng` position"))),
                other => Err(rejected(format!("expected a position, got {}", other.type_name()))),
            },
            _ => {
                let control = self
                    .inputs
                    .get(id)
                    .ok_or_else(|| IdError::UnknownIdentifier(ElementId::from(id)))?;
                control.coerce(value).map_err(rejected)
            }
        }
    }

    /// Applies one input event to a view: re-runs the dependent callbacks and
    /// rebuilds the URLs of layers reading `id`.
    pub fn set_input(&self, state: &mut LiveState, id: &str, value: Value) -> Result<InputChange, InputError> {
        let value = self.coerce_input(id, value)?;
        let dispatch = self.callbacks.apply_input(state, id, value);
        let layers = self
            .layers
            .iter()
            .filter(|l| l.depends_on(id))
            .map(|l| LayerUrl {
                layer: l.id(),
                url: self.tile_url(l, state.inputs()),
            })
            .collect();
        Ok(InputChange { dispatch, layers })
    }

    /// `/<prefix>/tile-<i>/{z}/{x}/{y}?<param>=<value>&...` with the current
    /// values of the layer's parameters, URL-encoded.
    pub fn tile_url(&self, layer: &TileLayer, inputs: &Inputs) -> String {
        let mut url = String::new();
        if !self.prefix.is_empty() {
            url.push('/');
            url.push_str(&self.prefix);
        }
        url.push_str(&format!("/tile-{}/{{z}}/{{x}}/{{y}}", layer.id().0));

        let query: Vec<String> = layer
            .params()
            .iter()
            .map(|p| {
                let value = inputs
                    .get(p.id.as_str())
                    .map(Value::to_query_string)
                    .unwrap_or_default();
                format!(
                    "{}={}",
                    urlencoding::encode(p.id.as_str()),
                    urlencoding::encode(&value)
                )
            })
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    pub fn layer_urls(&self, inputs: &Inputs) -> Vec<LayerUrl> {
        self.layers
            .iter()
            .map(|l| LayerUrl {
                layer: l.id(),
                url: self.tile_url(l, inputs),
            })
            .collect()
    }

    /// Decoded tile query parameters of layer `index`. Parameters absent from
    /// `query` take their default; unknown query keys are ignored.
    pub fn tile_inputs(&self, index: usize, query: &BTreeMap<String, String>) -> Result<Inputs, InputError> {
        let layer = self.layer(index)?;
        let mut inputs = Inputs::new();
        for param in layer.params() {
            let id = param.id.as_str();
            let value = match query.get(id) {
                Some(raw) => self.coerce_input(id, Value::from(raw.as_str()))?,
                None => self.defaults.get(id).cloned().unwrap_or(Value::Null),
            };
            inputs.insert(param.id.clone(), value);
        }
        Ok(inputs)
    }

    pub fn render_tile(
        &self,
        index: usize,
        coord: TileCoord,
        query: &BTreeMap<String, String>,
    ) -> Result<Tile, TileRequestError> {
        let layer = self.layer(index)?;
        let inputs = self.tile_inputs(index, query)?;
        let source = self
            .data
            .get(layer.data())
            .ok_or_else(|| InputError::from(IdError::UnknownIdentifier(layer.data().clone())))?;
        let tile = self.pipeline.render(source, layer, coord, &inputs)?;
        debug!(layer = index, z = coord.z, x = coord.x, y = coord.y, empty = tile.is_empty(), "tile rendered");
        Ok(tile)
    }

    pub fn encode_tile(&self, tile: &Tile) -> Result<Vec<u8>, TileError> {
        self.pipeline.encode(tile)
    }

    pub fn bindings(&self) -> Vec<BindingDescriptor> {
        self.callbacks.descriptors()
    }

    pub fn layout(&self) -> Layout {
        Layout::describe(self)
    }
}
