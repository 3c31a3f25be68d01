//! In-memory document.
//!
//! Nodes live in a map keyed by [`NodeId`]. Ids come from a counter and are
//! never reused, so a stale handle fails with `UnknownNode` instead of
//! aliasing a newer node. Detached subtrees are freed when the runtime
//! releases them; until then they keep resolving as parentless nodes.

use std::collections::{BTreeMap, HashMap};

use crate::error::PlatformError;
use crate::node::Listener;
use crate::types::NodeId;

use super::{Event, Platform};

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        style: BTreeMap<String, String>,
        listeners: Vec<(String, Listener)>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Map-backed [`Platform`] with inspection helpers.
#[derive(Debug)]
pub struct MemoryDocument {
    nodes: HashMap<NodeId, MemoryNode>,
    next_id: u32,
    root: NodeId,
    mutations: u64,
}

impl MemoryDocument {
    /// New document whose root is a `body` element.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: HashMap::new(),
            next_id: 0,
            root: NodeId(0),
            mutations: 0,
        };
        doc.root = doc.push(NodeData::Element {
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            listeners: Vec::new(),
        });
        doc
    }

    /// Create an element and append it to the root.
    pub fn create_container(&mut self, tag: &str) -> Result<NodeId, PlatformError> {
        let element = self.create_element(tag)?;
        let root = self.root;
        self.append_child(root, element)?;
        Ok(element)
    }

    /// Tag of an element, `None` for text and unknown nodes.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).ok()?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Data of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).ok()?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Ok(n) = self.node(node) else { return };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for &child in &n.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        match &self.node(element).ok()?.data {
            NodeData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn style_property(&self, element: NodeId, property: &str) -> Option<&str> {
        match &self.node(element).ok()?.data {
            NodeData::Element { style, .. } => style.get(property).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    /// Total listeners registered on `element`, across event types.
    pub fn listener_count(&self, element: NodeId) -> usize {
        match self.node(element).map(|n| &n.data) {
            Ok(NodeData::Element { listeners, .. }) => listeners.len(),
            _ => 0,
        }
    }

    /// Call every listener for `event_type` on `target`. Returns how many ran.
    ///
    /// Listeners are cloned out first, so handlers that need the document must
    /// go through [`Runtime::dispatch_event`](crate::Runtime::dispatch_event).
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> usize {
        let listeners = self.listeners(target, event_type);
        let event = Event::new(event_type, target);
        for listener in &listeners {
            listener.call(&event);
        }
        listeners.len()
    }

    /// Number of mutating calls made so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Nodes currently held: attached ones plus detached ones not yet
    /// released.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Compact markup of a subtree, for assertions: `<div id="a"><p>1</p></div>`.
    ///
    /// Attributes print in name order; style and listeners are omitted.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let Ok(n) = self.node(node) else { return };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { tag, attributes, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for &child in &n.children {
                    self.write_markup(child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Arena access
    // -------------------------------------------------------------------------

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, MemoryNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&MemoryNode, PlatformError> {
        self.nodes.get(&id).ok_or(PlatformError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, PlatformError> {
        self.nodes.get_mut(&id).ok_or(PlatformError::UnknownNode(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut NodeData, PlatformError> {
        let node = self.node_mut(id)?;
        match node.data {
            NodeData::Element { .. } => Ok(&mut node.data),
            NodeData::Text(_) => Err(PlatformError::NotAnElement(id)),
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = None;
        }
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), PlatformError> {
        self.node(child)?;
        if !self.is_element(parent)? || self.is_ancestor(child, parent) {
            return Err(PlatformError::HierarchyRequest { parent, child });
        }
        Ok(())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Name Validation
// =============================================================================

fn valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '\'' | '>' | '/' | '='))
}

fn valid_style_property(property: &str) -> bool {
    !property.is_empty() && property.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// =============================================================================
// Platform
// =============================================================================

impl Platform for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId, PlatformError> {
        if !valid_tag(tag) {
            return Err(PlatformError::InvalidTag(tag.to_string()));
        }
        self.mutations += 1;
        Ok(self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            listeners: Vec::new(),
        }))
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.mutations += 1;
        self.push(NodeData::Text(text.to_string()))
    }

    fn is_element(&self, node: NodeId) -> Result<bool, PlatformError> {
        Ok(matches!(self.node(node)?.data, NodeData::Element { .. }))
    }

    fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<(), PlatformError> {
        if !valid_attribute_name(name) {
            return Err(PlatformError::InvalidName(name.to_string()));
        }
        if let NodeData::Element { attributes, .. } = self.element_mut(element)? {
            attributes.insert(name.to_string(), value.to_string());
        }
        self.mutations += 1;
        Ok(())
    }

    fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<(), PlatformError> {
        if let NodeData::Element { attributes, style, .. } = self.element_mut(element)? {
            attributes.remove(name);
            if name == "style" {
                style.clear();
            }
        }
        self.mutations += 1;
        Ok(())
    }

    fn set_style(&mut self, element: NodeId, property: &str, value: &str) -> Result<(), PlatformError> {
        if !valid_style_property(property) {
            return Err(PlatformError::InvalidName(property.to_string()));
        }
        if let NodeData::Element { style, .. } = self.element_mut(element)? {
            style.insert(property.to_string(), value.to_string());
        }
        self.mutations += 1;
        Ok(())
    }

    fn add_listener(&mut self, element: NodeId, event_type: &str, listener: Listener) -> Result<(), PlatformError> {
        if let NodeData::Element { listeners, .. } = self.element_mut(element)? {
            listeners.push((event_type.to_string(), listener));
        }
        self.mutations += 1;
        Ok(())
    }

    fn remove_listener(
        &mut self,
        element: NodeId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<(), PlatformError> {
        if let NodeData::Element { listeners, .. } = self.element_mut(element)? {
            listeners.retain(|(ty, l)| !(ty == event_type && l.ptr_eq(listener)));
        }
        self.mutations += 1;
        Ok(())
    }

    fn listeners(&self, element: NodeId, event_type: &str) -> Vec<Listener> {
        match self.node(element).map(|n| &n.data) {
            Ok(NodeData::Element { listeners, .. }) => listeners
                .iter()
                .filter(|(ty, _)| ty == event_type)
                .map(|(_, l)| l.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlatformError> {
        self.check_insert(parent, child)?;
        self.detach(child);
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.mutations += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlatformError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(PlatformError::NotAChild { parent, child });
        }
        self.detach(child);
        self.mutations += 1;
        Ok(())
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<(), PlatformError> {
        if self.node(old_child)?.parent != Some(parent) {
            return Err(PlatformError::NotAChild { parent, child: old_child });
        }
        if new_child == old_child {
            return Ok(());
        }
        self.check_insert(parent, new_child)?;
        self.detach(new_child);

        let position = self
            .node(parent)?
            .children
            .iter()
            .position(|&c| c == old_child)
            .ok_or(PlatformError::NotAChild { parent, child: old_child })?;
        self.node_mut(parent)?.children[position] = new_child;
        self.node_mut(new_child)?.parent = Some(parent);
        self.node_mut(old_child)?.parent = None;
        self.mutations += 1;
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Free a detached subtree. Attached nodes and the root are kept.
    fn release(&mut self, node: NodeId) {
        if node == self.root || self.parent(node).is_some() {
            tracing::trace!(%node, "release of an attached node, keeping it");
            return;
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(freed) = self.nodes.remove(&id) {
                stack.extend(freed.children);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
