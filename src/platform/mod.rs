//! Platform boundary - the live document the patch applier mutates.
//!
//! The runtime never touches a document directly. Everything it needs is one
//! of the primitive capabilities on [`Platform`]: create elements and text,
//! get/set/remove attributes and listeners, set style properties, and
//! insert/remove/replace children.
//!
//! [`MemoryDocument`] is an in-process implementation used by tests and by
//! embeddings that render into their own node arena.

mod memory;

pub use memory::MemoryDocument;

use crate::error::PlatformError;
use crate::node::Listener;
use crate::types::NodeId;

/// Event delivered to a [`Listener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Lowercase event type (`click`, `input`, ...).
    pub event_type: String,
    /// Node the event was dispatched at.
    pub target: NodeId,
}

impl Event {
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
        }
    }
}

/// Primitive element API of a host document.
pub trait Platform {
    /// Default mount target.
    fn root(&self) -> NodeId;

    /// Create a detached element. Fails for tags the host does not accept.
    fn create_element(&mut self, tag: &str) -> Result<NodeId, PlatformError>;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeId;

    fn is_element(&self, node: NodeId) -> Result<bool, PlatformError>;

    fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<(), PlatformError>;

    /// Remove an attribute. Removing `style` clears every style property.
    fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<(), PlatformError>;

    fn set_style(&mut self, element: NodeId, property: &str, value: &str) -> Result<(), PlatformError>;

    fn add_listener(&mut self, element: NodeId, event_type: &str, listener: Listener) -> Result<(), PlatformError>;

    fn remove_listener(
        &mut self,
        element: NodeId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<(), PlatformError>;

    /// Listeners currently registered for `event_type` on `element`.
    fn listeners(&self, element: NodeId, event_type: &str) -> Vec<Listener>;

    /// Append `child`, detaching it from any previous parent first.
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlatformError>;

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlatformError>;

    /// Put `new_child` where `old_child` is and detach `old_child`.
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<(), PlatformError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Children in document order. Empty for unknown nodes and text.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// The runtime is done with the detached subtree at `node` and will not
    /// use its handles again. Hosts that own node storage may free it.
    fn release(&mut self, node: NodeId) {
        let _ = node;
    }
}
