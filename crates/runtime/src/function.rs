use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use foundation::grid::Grid;
use foundation::ids::{ElementId, IdKind};
use foundation::value::{LatLng, Value};

/// Name of the mandatory first parameter of a tile function.
pub const DATA_PARAM: &str = "data";

/// Failure raised while a user compute function runs.
///
/// These are request-time errors: they are reported and recovered from,
/// never propagated to the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
    #[error("{0}")]
    Failed(String),

    #[error("input `{0}` was not supplied")]
    MissingInput(ElementId),

    #[error("input `{id}` is {found}, expected {expected}")]
    WrongInputType {
        id: ElementId,
        found: &'static str,
        expected: &'static str,
    },

    #[error("visibility function returned {0}, expected a bool")]
    NotBoolean(&'static str),

    #[error("compute function panicked: {0}")]
    Panicked(String),
}

impl ComputeError {
    pub fn failed(message: impl Into<String>) -> Self {
        ComputeError::Failed(message.into())
    }
}

/// Current values of a compute function's inputs, passed by name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Inputs {
    values: BTreeMap<ElementId, Value>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<ElementId>, value: impl Into<Value>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<ElementId>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(id.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, &Value)> {
        self.values.iter()
    }

    pub fn get(&self, id: &str) -> Result<&Value, ComputeError> {
        self.values
            .get(id)
            .ok_or_else(|| ComputeError::MissingInput(ElementId::from(id)))
    }

    pub fn number(&self, id: &str) -> Result<f64, ComputeError> {
        let v = self.get(id)?;
        v.as_f64().ok_or_else(|| wrong_type(id, v, "number"))
    }

    pub fn text(&self, id: &str) -> Result<&str, ComputeError> {
        let v = self.get(id)?;
        v.as_str().ok_or_else(|| wrong_type(id, v, "text"))
    }

    pub fn position(&self, id: &str) -> Result<LatLng, ComputeError> {
        let v = self.get(id)?;
        v.as_position().ok_or_else(|| wrong_type(id, v, "position"))
    }

    /// Copies out the values of `ids`, failing on the first one that is absent.
    pub fn subset<'a>(&self, ids: impl IntoIterator<Item = &'a ElementId>) -> Result<Inputs, ComputeError> {
        let mut out = Inputs::new();
        for id in ids {
            out.insert(id.clone(), self.get(id.as_str())?.clone());
        }
        Ok(out)
    }
}

fn wrong_type(id: &str, found: &Value, expected: &'static str) -> ComputeError {
    ComputeError::WrongInputType {
        id: ElementId::from(id),
        found: found.type_name(),
        expected,
    }
}

/// One declared parameter of a compute function.
///
/// `accepts` narrows the identifier kinds the parameter may name; when unset,
/// the binding context decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: ElementId,
    pub accepts: Option<Vec<IdKind>>,
}

impl Param {
    pub fn new(name: impl Into<ElementId>) -> Self {
        Self {
            name: name.into(),
            accepts: None,
        }
    }

    pub fn with_kinds(name: impl Into<ElementId>, kinds: &[IdKind]) -> Self {
        Self {
            name: name.into(),
            accepts: Some(kinds.to_vec()),
        }
    }
}

type ValueFn = dyn Fn(&Inputs) -> Result<Value, ComputeError> + Send + Sync;
type GridFn = dyn Fn(Grid, &Inputs) -> Result<Grid, ComputeError> + Send + Sync;

/// A value-producing compute function together with its parameter descriptor.
///
/// The parameter names are the identifiers the function depends on.
#[derive(Clone)]
pub struct ComputeFunction {
    params: Vec<Param>,
    func: Arc<ValueFn>,
}

impl ComputeFunction {
    pub fn new<I, S, F>(params: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ElementId>,
        F: Fn(&Inputs) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        Self {
            params: params.into_iter().map(Param::new).collect(),
            func: Arc::new(func),
        }
    }

    pub fn from_params<F>(params: Vec<Param>, func: F) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        Self {
            params,
            func: Arc::new(func),
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn call(&self, inputs: &Inputs) -> Result<Value, ComputeError> {
        guard(|| (self.func)(inputs))
    }
}

impl fmt::Debug for ComputeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeFunction")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A raster compute function: receives the windowed dataset first, then the
/// current values of its remaining parameters.
#[derive(Clone)]
pub struct TileFunction {
    params: Vec<Param>,
    func: Arc<GridFn>,
}

impl TileFunction {
    pub fn new<I, S, F>(params: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ElementId>,
        F: Fn(Grid, &Inputs) -> Result<Grid, ComputeError> + Send + Sync + 'static,
    {
        Self {
            params: params.into_iter().map(Param::new).collect(),
            func: Arc::new(func),
        }
    }

    /// A tile function that returns the window unchanged.
    pub fn identity() -> Self {
        Self::new([DATA_PARAM], |grid, _| Ok(grid))
    }

    /// All declared parameters, including the leading `data`.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Parameters after `data`.
    pub fn input_params(&self) -> &[Param] {
        self.params.get(1..).unwrap_or(&[])
    }

    pub fn call(&self, data: Grid, inputs: &Inputs) -> Result<Grid, ComputeError> {
        guard(|| (self.func)(data, inputs))
    }
}

impl fmt::Debug for TileFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileFunction")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn guard<T>(f: impl FnOnce() -> Result<T, ComputeError>) -> Result<T, ComputeError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ComputeError::Panicked(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ComputeError, ComputeFunction, DATA_PARAM, Inputs, TileFunction};
    use foundation::ids::ElementId;
    use foundation::value::Value;

    #[test]
    fn typed_accessors() {
        let inputs = Inputs::new().with("num0", 50.0).with("m0", "jan");
        assert_eq!(inputs.number("num0").unwrap(), 50.0);
        assert_eq!(inputs.text("m0").unwrap(), "jan");
        assert_eq!(
            inputs.number("m0").unwrap_err(),
            ComputeError::WrongInputType {
                id: ElementId::from("m0"),
                found: "text",
                expected: "number",
            }
        );
        assert_eq!(
            inputs.get("nope").unwrap_err(),
            ComputeError::MissingInput(ElementId::from("nope"))
        );
    }

    #[test]
    fn subset_keeps_only_requested() {
        let inputs = Inputs::new().with("a", 1.0).with("b", 2.0);
        let ids = [ElementId::from("b")];
        let sub = inputs.subset(ids.iter()).unwrap();
        assert_eq!(sub.len(), 1);
        assert!(sub.contains("b"));
    }

    #[test]
    fn panics_become_compute_errors() {
        let f = ComputeFunction::new(["x"], |_| panic!("boom"));
        let err = f.call(&Inputs::new()).unwrap_err();
        assert_eq!(err, ComputeError::Panicked("boom".to_string()));
    }

    #[test]
    fn call_passes_inputs_by_name() {
        let f = ComputeFunction::new(["s0", "m0"], |inputs| {
            Ok(Value::from(format!("{}{}", inputs.text("s0")?, inputs.text("m0")?)))
        });
        let out = f.call(&Inputs::new().with("s0", "XYZ").with("m0", "jan")).unwrap();
        assert_eq!(out, Value::from("XYZjan"));
    }

    #[test]
    fn tile_function_splits_data_param() {
        let f = TileFunction::new([DATA_PARAM, "mon1"], |g, _| Ok(g));
        assert_eq!(f.params().len(), 2);
        assert_eq!(f.input_params().len(), 1);
        assert_eq!(f.input_params()[0].name.as_str(), "mon1");
        assert!(TileFunction::identity().input_params().is_empty());
    }
}
