use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use compute::dataset::{Dataset, GridFileDataset};
use compute::pipeline::{TilePipeline, TileSource};
use foundation::ids::{ElementId, IdKind, IdRegistry};
use foundation::value::LatLng;
use layers::layer::{LayerId, TileLayer};
use layers::symbology::{ColorMap, LayerStyle};
use runtime::callback::{CallbackId, CallbackRegistry, OutputProperty};
use runtime::function::{ComputeFunction, TileFunction};
use tracing::debug;
use uuid::Uuid;

use crate::controls::{Control, NumberRange};
use crate::dashboard::Dashboard;
use crate::error::DeclarationError;
use crate::groups::{Content, GroupKind, Groups, PlotOutput};

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: ElementId,
    pub position: LatLng,
}

/// Mutable declaration context for one dashboard.
///
/// Every declaration is validated immediately; the first error should abort
/// startup. `freeze` turns the session into an immutable [`Dashboard`].
#[derive(Debug)]
pub struct Session {
    pub(crate) title: String,
    pub(crate) prefix: String,
    pub(crate) ids: IdRegistry,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) controls: Groups,
    pub(crate) plots: Groups,
    pub(crate) markers: Vec<Marker>,
    pub(crate) data: BTreeMap<ElementId, TileSource>,
    pub(crate) layers: Vec<TileLayer>,
}

impl Session {
    pub fn new(title: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            ids: IdRegistry::new(),
            callbacks: CallbackRegistry::new(),
            controls: Groups::new(GroupKind::Block),
            plots: Groups::new(GroupKind::Tab),
            markers: Vec::new(),
            data: BTreeMap::new(),
            layers: Vec::new(),
        }
    }

    pub fn ids(&self) -> &IdRegistry {
        &self.ids
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn controls(&mut self) -> Controls<'_> {
        Controls { session: self }
    }

    pub fn plots(&mut self) -> Plots<'_> {
        Plots { session: self }
    }

    /// Binds `function` to any output-capable element.
    pub fn bind(
        &mut self,
        function: ComputeFunction,
        output_id: impl Into<ElementId>,
        property: impl Into<OutputProperty>,
    ) -> Result<CallbackId, DeclarationError> {
        Ok(self.callbacks.bind(&self.ids, function, output_id, property)?)
    }

    pub fn marker(&mut self, id: impl Into<ElementId>, position: LatLng) -> Result<(), DeclarationError> {
        let id = id.into();
        self.ids.register(id.clone(), IdKind::Marker)?;
        self.markers.push(Marker { id, position });
        Ok(())
    }

    /// Registers a dataset. Its extent and resolution are resolved here.
    pub fn data(&mut self, id: impl Into<ElementId>, dataset: Arc<dyn Dataset>) -> Result<(), DeclarationError> {
        let id = id.into();
        let source = TileSource::open(dataset).map_err(|source| DeclarationError::FatalDatasetConfig {
            id: id.clone(),
            source,
        })?;
        self.ids.register(id.clone(), IdKind::Data)?;
        debug!(data = %id, extent = ?source.extent(), resolution = ?source.resolution(), "dataset registered");
        self.data.insert(id, source);
        Ok(())
    }

    pub fn data_file(&mut self, id: impl Into<ElementId>, path: impl AsRef<Path>) -> Result<(), DeclarationError> {
        let id = id.into();
        let dataset = GridFileDataset::open(path).map_err(|source| DeclarationError::FatalDatasetConfig {
            id: id.clone(),
            source,
        })?;
        self.data(id, Arc::new(dataset))
    }

    /// Adds a raster layer over dataset `data`. The colour map is fitted to
    /// the dataset's value range when one is known.
    pub fn layer(
        &mut self,
        label: impl Into<String>,
        data: impl Into<ElementId>,
        function: TileFunction,
    ) -> Result<LayerId, DeclarationError> {
        let id = LayerId(self.layers.len());
        let mut layer = TileLayer::bind(&self.ids, id, label, data, function)?;
        let range = self
            .data
            .get(layer.data())
            .and_then(|source| source.dataset().value_range());
        if let Some((lo, hi)) = range {
            layer = layer.with_style(LayerStyle::new(ColorMap::default().fit_to(lo, hi)));
        }
        self.layers.push(layer);
        Ok(id)
    }

    pub fn style_layer(&mut self, id: LayerId, style: LayerStyle) -> Result<(), DeclarationError> {
        let layer = self
            .layers
            .get_mut(id.0)
            .ok_or(DeclarationError::UnknownLayer(id.0))?;
        layer.style = style;
        Ok(())
    }

    pub fn freeze(self, pipeline: TilePipeline) -> Dashboard {
        Dashboard::from_session(self, pipeline)
    }
}

/// Declares control groups and the controls inside them.
pub struct Controls<'a> {
    session: &'a mut Session,
}

impl Controls<'_> {
    pub fn group(&mut self, title: impl Into<String>) -> Result<ElementId, DeclarationError> {
        let s = &mut *self.session;
        s.controls.open(&mut s.ids, title, None)
    }

    pub fn group_with_id(&mut self, id: impl Into<ElementId>, title: impl Into<String>) -> Result<ElementId, DeclarationError> {
        let s = &mut *self.session;
        s.controls.open(&mut s.ids, title, Some(id.into()))
    }

    /// Opens a group that is shown only while `display` returns `true`.
    pub fn group_shown_when(
        &mut self,
        title: impl Into<String>,
        display: ComputeFunction,
    ) -> Result<ElementId, DeclarationError> {
        let s = &mut *self.session;
        CallbackRegistry::validate(&s.ids, &display)?;
        let id = s.controls.open(&mut s.ids, title, None)?;
        let callback = s.callbacks.bind(&s.ids, display, id.clone(), OutputProperty::Hidden)?;
        s.controls.active_mut()?.visibility = Some(callback);
        Ok(id)
    }

    fn add(&mut self, control: Control) -> Result<(), DeclarationError> {
        let s = &mut *self.session;
        s.controls.require_active()?;
        s.ids.register(control.id.clone(), IdKind::Control)?;
        s.controls.push(Content::Control(control))
    }

    pub fn month(&mut self, id: impl Into<ElementId>, default: &str) -> Result<(), DeclarationError> {
        self.add(Control::month(id, default)?)
    }

    pub fn select(&mut self, id: impl Into<ElementId>, options: &[&str], default: Option<&str>) -> Result<(), DeclarationError> {
        let options = options.iter().map(|o| o.to_string()).collect();
        self.add(Control::select(id, options, default)?)
    }

    pub fn number(&mut self, id: impl Into<ElementId>, range: NumberRange) -> Result<(), DeclarationError> {
        self.add(Control::number(id, range)?)
    }

    pub fn text(&mut self, id: impl Into<ElementId>, default: &str) -> Result<(), DeclarationError> {
        self.add(Control::text(id, default))
    }

    pub fn label(&mut self, text: impl Into<String>) -> Result<(), DeclarationError> {
        self.session.controls.push(Content::Static(text.into()))
    }
}

/// Declares plot tabs and the outputs inside them.
pub struct Plots<'a> {
    session: &'a mut Session,
}

impl Plots<'_> {
    pub fn group(&mut self, title: impl Into<String>) -> Result<ElementId, DeclarationError> {
        let s = &mut *self.session;
        s.plots.open(&mut s.ids, title, None)
    }

    pub fn group_with_id(&mut self, id: impl Into<ElementId>, title: impl Into<String>) -> Result<ElementId, DeclarationError> {
        let s = &mut *self.session;
        s.plots.open(&mut s.ids, title, Some(id.into()))
    }

    /// Adds a titled output whose text is `function`'s result.
    pub fn output(&mut self, title: impl Into<String>, function: ComputeFunction) -> Result<ElementId, DeclarationError> {
        let s = &mut *self.session;
        CallbackRegistry::validate(&s.ids, &function)?;
        s.plots.require_active()?;

        let id = ElementId::new(Uuid::new_v4().to_string());
        s.ids.register(id.clone(), IdKind::PlotOutput)?;
        let callback = s.callbacks.bind(&s.ids, function, id.clone(), OutputProperty::Children)?;
        s.plots.push(Content::Output(PlotOutput {
            id: id.clone(),
            title: title.into(),
            callback,
        }))?;
        Ok(id)
    }

    pub fn label(&mut self, text: impl Into<String>) -> Result<(), DeclarationError> {
        self.session.plots.push(Content::Static(text.into()))
    }
}
