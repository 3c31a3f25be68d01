//! Patch operations produced by the reconciler.

use super::props::PropValue;
use super::vnode::Node;
use crate::types::InstanceId;

/// One mutation of a live node.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Materialize a node where none existed.
    Create(Node),
    /// Detach the live node.
    Remove,
    /// Materialize a node and swap it in for the live one.
    Replace(Node),
    UpdateProps(Vec<PropPatch>),
    UpdateChildren(Vec<ChildPatch>),
}

/// Change to a single prop of a live element.
#[derive(Debug, Clone, PartialEq)]
pub enum PropPatch {
    Set(String, PropValue),
    Remove(String),
}

/// Patches for the live child at `index`, indexed against the children as
/// they were before this patch list started applying.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildPatch {
    pub index: usize,
    pub patches: Vec<Patch>,
}

/// Hook-state work the reconciler asks the instance manager to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceIntent {
    /// Drop all hook state of the instance.
    Cleanup(InstanceId),
    /// Move hook state to a new instance id.
    Remap { from: InstanceId, to: InstanceId },
}
