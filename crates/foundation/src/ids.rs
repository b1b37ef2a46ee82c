use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a dashboard element (control, marker, dataset, output, group).
///
/// Identifiers share a single namespace per session regardless of their kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdKind {
    Control,
    Marker,
    Data,
    PlotOutput,
    Block,
    Tab,
}

impl IdKind {
    /// Kinds whose current value can feed a compute function.
    pub const INPUTS: &'static [IdKind] = &[IdKind::Control, IdKind::Marker];

    /// Kinds that can be the target of a callback.
    pub const OUTPUTS: &'static [IdKind] = &[IdKind::PlotOutput, IdKind::Block, IdKind::Tab];

    pub fn as_str(self) -> &'static str {
        match self {
            IdKind::Control => "control",
            IdKind::Marker => "marker",
            IdKind::Data => "data",
            IdKind::PlotOutput => "plot-output",
            IdKind::Block => "block",
            IdKind::Tab => "tab",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("identifier `{0}` is already in use")]
    DuplicateIdentifier(ElementId),

    #[error("there is no identifier `{0}`")]
    UnknownIdentifier(ElementId),

    #[error("identifier `{id}` is a {found}, expected one of [{}]", display_kinds(.expected))]
    KindMismatch {
        id: ElementId,
        found: IdKind,
        expected: Vec<IdKind>,
    },
}

fn display_kinds(kinds: &[IdKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Namespace of element identifiers, each tagged with an immutable kind.
///
/// The registry only grows; there is no removal.
#[derive(Debug, Default, Clone)]
pub struct IdRegistry {
    entries: BTreeMap<ElementId, IdKind>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn register(&mut self, id: impl Into<ElementId>, kind: IdKind) -> Result<(), IdError> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(IdError::DuplicateIdentifier(id));
        }
        self.entries.insert(id, kind);
        Ok(())
    }

    pub fn kind_of(&self, id: &str) -> Result<IdKind, IdError> {
        self.entries
            .get(id)
            .copied()
            .ok_or_else(|| IdError::UnknownIdentifier(ElementId::from(id)))
    }

    /// Checks that `id` exists and that its kind is one of `accepted`.
    pub fn require_kind(&self, id: &str, accepted: &[IdKind]) -> Result<IdKind, IdError> {
        let found = self.kind_of(id)?;
        if !accepted.contains(&found) {
            return Err(IdError::KindMismatch {
                id: ElementId::from(id),
                found,
                expected: accepted.to_vec(),
            });
        }
        Ok(found)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, IdKind)> {
        self.entries.iter().map(|(id, kind)| (id, *kind))
    }
}
