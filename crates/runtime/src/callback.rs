use std::collections::BTreeSet;
use std::fmt;

use foundation::ids::{ElementId, IdError, IdKind, IdRegistry};
use foundation::value::Value;
use serde::{Deserialize, Serialize};

use crate::function::{ComputeError, ComputeFunction, DATA_PARAM, Inputs, Param, TileFunction};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error("invalid compute function: {0}")]
    InvalidComputeFunction(String),
}

/// Property of an output element that a callback writes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputProperty {
    /// Text content of a plot output.
    Children,
    /// Hidden flag of a group; the bound function answers "should show".
    Hidden,
    Other(String),
}

impl OutputProperty {
    pub fn as_str(&self) -> &str {
        match self {
            OutputProperty::Children => "children",
            OutputProperty::Hidden => "hidden",
            OutputProperty::Other(s) => s,
        }
    }
}

impl fmt::Display for OutputProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OutputProperty {
    fn from(s: String) -> Self {
        match s.as_str() {
            "children" => OutputProperty::Children,
            "hidden" => OutputProperty::Hidden,
            _ => OutputProperty::Other(s),
        }
    }
}

impl From<&str> for OutputProperty {
    fn from(s: &str) -> Self {
        OutputProperty::from(s.to_string())
    }
}

impl From<OutputProperty> for String {
    fn from(p: OutputProperty) -> Self {
        p.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputTarget {
    pub id: ElementId,
    pub property: OutputProperty,
}

impl OutputTarget {
    pub fn new(id: impl Into<ElementId>, property: impl Into<OutputProperty>) -> Self {
        Self {
            id: id.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.property)
    }
}

/// Which attribute of an input element carries its value to the client.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputChannel {
    Value,
    Position,
}

impl InputChannel {
    pub fn for_kind(kind: IdKind) -> Self {
        match kind {
            IdKind::Marker => InputChannel::Position,
            _ => InputChannel::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    pub id: ElementId,
    pub kind: IdKind,
    pub channel: InputChannel,
}

/// Validates a parameter list against the registry, in declared order.
///
/// Parameters without an explicit kind set are checked against `context_kinds`.
pub fn resolve_params(
    ids: &IdRegistry,
    params: &[Param],
    context_kinds: &[IdKind],
) -> Result<Vec<InputBinding>, BindError> {
    let mut seen = BTreeSet::new();
    let mut bindings = Vec::with_capacity(params.len());
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(BindError::InvalidComputeFunction(format!(
                "parameter `{}` is declared twice",
                param.name
            )));
        }
        let accepted = match &param.accepts {
            Some(kinds) if kinds.is_empty() => {
                return Err(BindError::InvalidComputeFunction(format!(
                    "parameter `{}` accepts no identifier kinds",
                    param.name
                )));
            }
            Some(kinds) => kinds.as_slice(),
            None => context_kinds,
        };
        let kind = ids.require_kind(param.name.as_str(), accepted)?;
        bindings.push(InputBinding {
            id: param.name.clone(),
            kind,
            channel: InputChannel::for_kind(kind),
        });
    }
    Ok(bindings)
}

/// Validates a tile function: `data` first, then control or marker parameters.
pub fn resolve_tile_params(ids: &IdRegistry, function: &TileFunction) -> Result<Vec<InputBinding>, BindError> {
    match function.params().first() {
        Some(first) if first.name.as_str() == DATA_PARAM => {}
        Some(first) => {
            return Err(BindError::InvalidComputeFunction(format!(
                "first parameter of a tile function must be `{DATA_PARAM}`, found `{}`",
                first.name
            )));
        }
        None => {
            return Err(BindError::InvalidComputeFunction(format!(
                "tile function must take `{DATA_PARAM}` as its first parameter"
            )));
        }
    }
    resolve_params(ids, function.input_params(), IdKind::INPUTS)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallbackId(pub usize);

/// A validated binding from input identifiers to one output property.
#[derive(Debug, Clone)]
pub struct CallbackRecord {
    id: CallbackId,
    function: ComputeFunction,
    target: OutputTarget,
    inputs: Vec<InputBinding>,
}

impl CallbackRecord {
    pub fn id(&self) -> CallbackId {
        self.id
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn inputs(&self) -> &[InputBinding] {
        &self.inputs
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.inputs.iter().any(|b| b.id.as_str() == id)
    }

    /// Runs the function with the current values of its inputs and returns the
    /// value to write to the target.
    ///
    /// For `hidden` targets the function's boolean is inverted here, once.
    pub fn invoke(&self, current: &Inputs) -> Result<Value, ComputeError> {
        let args = current.subset(self.inputs.iter().map(|b| &b.id))?;
        let out = self.function.call(&args)?;
        match self.target.property {
            OutputProperty::Hidden => {
                let shown = out
                    .as_bool()
                    .ok_or_else(|| ComputeError::NotBoolean(out.type_name()))?;
                Ok(Value::Bool(!shown))
            }
            _ => Ok(out),
        }
    }

    pub fn descriptor(&self) -> BindingDescriptor {
        BindingDescriptor {
            callback: self.id,
            output_id: self.target.id.clone(),
            output_property: self.target.property.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|b| InputDescriptor {
                    id: b.id.clone(),
                    channel: b.channel,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub id: ElementId,
    pub channel: InputChannel,
}

/// What the presentation layer needs to wire one callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDescriptor {
    pub callback: CallbackId,
    pub output_id: ElementId,
    pub output_property: OutputProperty,
    pub inputs: Vec<InputDescriptor>,
}

/// Ordered list of callback records.
#[derive(Debug, Default, Clone)]
pub struct CallbackRegistry {
    records: Vec<CallbackRecord>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validates `function`'s parameters (controls or markers) and the output
    /// target, then appends a record. Nothing is appended on failure.
    pub fn bind(
        &mut self,
        ids: &IdRegistry,
        function: ComputeFunction,
        output_id: impl Into<ElementId>,
        property: impl Into<OutputProperty>,
    ) -> Result<CallbackId, BindError> {
        let inputs = Self::validate(ids, &function)?;
        let target = OutputTarget::new(output_id, property);
        ids.require_kind(target.id.as_str(), IdKind::OUTPUTS)?;

        let id = CallbackId(self.records.len());
        self.records.push(CallbackRecord {
            id,
            function,
            target,
            inputs,
        });
        Ok(id)
    }

    /// Checks a function's parameters without binding it.
    pub fn validate(ids: &IdRegistry, function: &ComputeFunction) -> Result<Vec<InputBinding>, BindError> {
        if function.params().is_empty() {
            return Err(BindError::InvalidComputeFunction(
                "a bound function must take at least one parameter".to_string(),
            ));
        }
        resolve_params(ids, function.params(), IdKind::INPUTS)
    }

    pub fn get(&self, id: CallbackId) -> Option<&CallbackRecord> {
        self.records.get(id.0)
    }

    pub fn records(&self) -> &[CallbackRecord] {
        &self.records
    }

    /// Records that read `id`, in declaration order.
    pub fn dependents<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a CallbackRecord> + 'a {
        self.records.iter().filter(move |r| r.depends_on(id))
    }

    pub fn descriptors(&self) -> Vec<BindingDescriptor> {
        self.records.iter().map(CallbackRecord::descriptor).collect()
    }
}
