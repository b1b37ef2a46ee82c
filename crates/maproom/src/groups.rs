use std::fmt;

use foundation::ids::{ElementId, IdKind, IdRegistry};
use runtime::callback::CallbackId;
use serde::Serialize;
use uuid::Uuid;

use crate::controls::Control;
use crate::error::DeclarationError;

/// Control groups render as cards in the side panel, plot groups as tabs
/// under the map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    Block,
    Tab,
}

impl GroupKind {
    pub fn id_kind(self) -> IdKind {
        match self {
            GroupKind::Block => IdKind::Block,
            GroupKind::Tab => IdKind::Tab,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Block => f.write_str("control"),
            GroupKind::Tab => f.write_str("plot"),
        }
    }
}

/// A text panel whose content is written by a callback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOutput {
    pub id: ElementId,
    pub title: String,
    pub callback: CallbackId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Control(Control),
    Output(PlotOutput),
    /// Passed through to the page unchanged.
    Static(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: ElementId,
    pub title: String,
    pub contents: Vec<Content>,
    /// Callback driving the group's `hidden` property, if any.
    pub visibility: Option<CallbackId>,
}

/// Groups of one kind, in declaration order. New content always goes to the
/// most recently opened group.
#[derive(Debug, Clone)]
pub struct Groups {
    kind: GroupKind,
    groups: Vec<Group>,
}

impl Groups {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            groups: Vec::new(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id.as_str() == id)
    }

    /// Registers the group id (generated when `None`) and makes the group
    /// active.
    pub fn open(
        &mut self,
        ids: &mut IdRegistry,
        title: impl Into<String>,
        id: Option<ElementId>,
    ) -> Result<ElementId, DeclarationError> {
        let id = id.unwrap_or_else(|| ElementId::new(Uuid::new_v4().to_string()));
        ids.register(id.clone(), self.kind.id_kind())?;
        self.groups.push(Group {
            id: id.clone(),
            title: title.into(),
            contents: Vec::new(),
            visibility: None,
        });
        Ok(id)
    }

    pub fn active_mut(&mut self) -> Result<&mut Group, DeclarationError> {
        let kind = self.kind;
        self.groups.last_mut().ok_or(DeclarationError::NoActiveGroup(kind))
    }

    /// Fails like `push` would, without changing anything.
    pub fn require_active(&self) -> Result<(), DeclarationError> {
        if self.groups.is_empty() {
            return Err(DeclarationError::NoActiveGroup(self.kind));
        }
        Ok(())
    }

    pub fn push(&mut self, content: Content) -> Result<(), DeclarationError> {
        self.active_mut()?.contents.push(content);
        Ok(())
    }
}
