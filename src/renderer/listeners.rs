//! Listener side table.
//!
//! Tracks the one listener the runtime registered per `(element, event type)`
//! so it can be removed precisely when a prop changes, and so every entry of
//! a detached subtree can be dropped when that subtree leaves the document.

use std::collections::HashMap;

use crate::node::Listener;
use crate::platform::Platform;
use crate::types::NodeId;

#[derive(Debug, Default)]
pub struct ListenerTable {
    entries: HashMap<NodeId, HashMap<String, Listener>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `listener`, returning the one it displaces.
    pub fn register(&mut self, element: NodeId, event_type: &str, listener: Listener) -> Option<Listener> {
        self.entries
            .entry(element)
            .or_default()
            .insert(event_type.to_string(), listener)
    }

    /// Stop tracking the listener for `event_type`, returning it.
    pub fn deregister(&mut self, element: NodeId, event_type: &str) -> Option<Listener> {
        let per_element = self.entries.get_mut(&element)?;
        let listener = per_element.remove(event_type);
        if per_element.is_empty() {
            self.entries.remove(&element);
        }
        listener
    }

    pub fn get(&self, element: NodeId, event_type: &str) -> Option<&Listener> {
        self.entries.get(&element)?.get(event_type)
    }

    /// Drop every entry for `root` and its descendants. Returns how many
    /// listeners were dropped.
    pub fn forget_subtree<P: Platform + ?Sized>(&mut self, platform: &P, root: NodeId) -> usize {
        let mut dropped = 0;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(per_element) = self.entries.remove(&node) {
                dropped += per_element.len();
            }
            stack.extend(platform.children(node));
        }
        dropped
    }

    /// Total tracked listeners.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryDocument;

    #[test]
    fn test_register_replaces_per_event_type() {
        let mut table = ListenerTable::new();
        let first = Listener::new(|_| {});
        let second = Listener::new(|_| {});

        assert!(table.register(NodeId(1), "click", first.clone()).is_none());
        let displaced = table.register(NodeId(1), "click", second.clone());
        assert!(displaced.is_some_and(|l| l.ptr_eq(&first)));
        table.register(NodeId(1), "input", first);

        assert_eq!(table.len(), 2);
        assert!(table.get(NodeId(1), "click").is_some_and(|l| l.ptr_eq(&second)));

        table.deregister(NodeId(1), "click");
        table.deregister(NodeId(1), "input");
        assert!(table.is_empty());
    }

    #[test]
    fn test_forget_subtree() {
        let mut doc = MemoryDocument::new();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("button").unwrap();
        let other = doc.create_element("button").unwrap();
        doc.append_child(outer, inner).unwrap();

        let mut table = ListenerTable::new();
        table.register(outer, "click", Listener::new(|_| {}));
        table.register(inner, "click", Listener::new(|_| {}));
        table.register(inner, "focus", Listener::new(|_| {}));
        table.register(other, "click", Listener::new(|_| {}));

        assert_eq!(table.forget_subtree(&doc, outer), 3);
        assert_eq!(table.len(), 1);
        assert!(table.get(other, "click").is_some());
    }
}
