//! Error types for spark-vdom.

use thiserror::Error;

use crate::types::{InstanceId, NodeId};

/// A hook or setter was used outside the context it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A hook was declared while the instance was not rendering.
    #[error("hook declared outside of a rendering instance (instance: {instance:?})")]
    NotRendering {
        /// Instance the caller claimed to render for, if any.
        instance: Option<InstanceId>,
    },

    /// The state slot behind a setter no longer exists.
    #[error("state slot is detached from its instance")]
    Detached,
}

/// A props value does not fit the reserved meaning of its name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropError {
    /// `on*` names only accept listeners.
    #[error("prop `{name}` is an event prop and requires a listener")]
    ExpectedListener { name: String },

    /// Listeners only live under `on*` names.
    #[error("listener given for non-event prop `{name}`")]
    UnexpectedListener { name: String },

    /// `style` only accepts a style map.
    #[error("prop `style` requires a style map")]
    ExpectedStyle,

    /// A style map under a name other than `style`.
    #[error("style map given for prop `{name}`")]
    UnexpectedStyle { name: String },

    /// `key` only accepts strings and integers.
    #[error("prop `key` requires a string or integer")]
    InvalidKey,
}

/// Failure reported by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("invalid tag name `{0}`")]
    InvalidTag(String),

    #[error("invalid attribute or property name `{0}`")]
    InvalidName(String),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("cannot insert {child} under {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}

/// Failure of a render function. Abandons the commit it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Prop(#[from] PropError),

    #[error("{0}")]
    Message(String),
}

impl RenderError {
    /// Create a free-form render error.
    pub fn msg(message: impl Into<String>) -> Self {
        RenderError::Message(message.into())
    }
}

/// Failure of a mount or unmount call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
}
