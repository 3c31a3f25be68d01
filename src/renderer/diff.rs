//! Reconciler - computes the patches that turn one tree into another.
//!
//! The diff is pure: it reads two trees and returns patches plus the
//! hook-state intents the instance manager must carry out. Nothing here
//! touches a live document.
//!
//! # Precedence
//!
//! For `diff(old, new)`:
//!
//! 1. `old` absent: `[Create(new)]`
//! 2. `new` absent: `[Remove]`
//! 3. either side is text: `[Replace(new)]` if unequal, else `[]`
//! 4. tags differ: `[Replace(new)]`
//! 5. keys differ: `[Replace(new)]`
//! 6. otherwise prop patches then child patches
//!
//! Children are matched by position. A keyed child that exists in the old
//! list at another position is replaced, never moved.

use std::collections::HashMap;

use crate::node::{ChildPatch, InstanceIntent, Node, Patch, PropPatch, Props, VNode};
use crate::types::Key;

/// Patches and instance intents for one diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub patches: Vec<Patch>,
    pub intents: Vec<InstanceIntent>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.intents.is_empty()
    }
}

/// Diff two optional nodes, collecting intents for discarded instance roots.
pub fn reconcile(old: Option<&Node>, new: Option<&Node>) -> Reconciliation {
    let mut intents = Vec::new();
    let patches = diff_node(old, new, &mut intents);
    Reconciliation { patches, intents }
}

/// Patches only. See [`reconcile`] for the intents.
pub fn diff(old: Option<&Node>, new: Option<&Node>) -> Vec<Patch> {
    reconcile(old, new).patches
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Copy)]
enum Discard {
    Removed,
    TagChanged,
    KeyChanged,
    TextSwap,
}

fn diff_node(old: Option<&Node>, new: Option<&Node>, intents: &mut Vec<InstanceIntent>) -> Vec<Patch> {
    let (old, new) = match (old, new) {
        (None, None) => return Vec::new(),
        (None, Some(new)) => return vec![Patch::Create(new.clone())],
        (Some(old), None) => {
            discard(old, None, Discard::Removed, intents);
            return vec![Patch::Remove];
        }
        (Some(old), Some(new)) => (old, new),
    };

    let (old_el, new_el) = match (old, new) {
        (Node::Element(o), Node::Element(n)) => (o, n),
        _ if old == new => return Vec::new(),
        _ => {
            discard(old, Some(new), Discard::TextSwap, intents);
            return vec![Patch::Replace(new.clone())];
        }
    };

    if old_el.tag != new_el.tag {
        discard(old, Some(new), Discard::TagChanged, intents);
        return vec![Patch::Replace(new.clone())];
    }
    if old_el.key != new_el.key {
        discard(old, Some(new), Discard::KeyChanged, intents);
        return vec![Patch::Replace(new.clone())];
    }

    let mut patches = Vec::new();
    let props = diff_props(&old_el.props, &new_el.props);
    if !props.is_empty() {
        patches.push(Patch::UpdateProps(props));
    }
    let children = diff_children(old_el, new_el, intents);
    if !children.is_empty() {
        patches.push(Patch::UpdateChildren(children));
    }
    patches
}

/// Record what happens to the hook state of an instance root that is being
/// removed or replaced.
///
/// A root whose replacement carries the same instance id keeps its state. A
/// tag change onto another instance id moves the state there; every other
/// case drops it.
fn discard(old: &Node, new: Option<&Node>, why: Discard, intents: &mut Vec<InstanceIntent>) {
    let Some(from) = old.instance_id() else {
        return;
    };
    match (why, new.and_then(Node::instance_id)) {
        (_, Some(to)) if to == from => {}
        (Discard::TagChanged, Some(to)) => intents.push(InstanceIntent::Remap {
            from: from.clone(),
            to: to.clone(),
        }),
        _ => intents.push(InstanceIntent::Cleanup(from.clone())),
    }
}

// =============================================================================
// Props
// =============================================================================

/// Prop patches over the union of both name sets, in name order.
pub fn diff_props(old: &Props, new: &Props) -> Vec<PropPatch> {
    let mut patches = Vec::new();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    // Both iterators are sorted by name; walk them as a merge.
    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(&(name, _)), None) => {
                patches.push(PropPatch::Remove(name.to_string()));
                old_iter.next();
            }
            (None, Some(&(name, value))) => {
                patches.push(PropPatch::Set(name.to_string(), value.clone()));
                new_iter.next();
            }
            (Some(&(old_name, old_value)), Some(&(new_name, new_value))) => {
                if old_name < new_name {
                    patches.push(PropPatch::Remove(old_name.to_string()));
                    old_iter.next();
                } else if new_name < old_name {
                    patches.push(PropPatch::Set(new_name.to_string(), new_value.clone()));
                    new_iter.next();
                } else {
                    if old_value != new_value {
                        patches.push(PropPatch::Set(new_name.to_string(), new_value.clone()));
                    }
                    old_iter.next();
                    new_iter.next();
                }
            }
        }
    }
    patches
}

// =============================================================================
// Children
// =============================================================================

fn diff_children(old: &VNode, new: &VNode, intents: &mut Vec<InstanceIntent>) -> Vec<ChildPatch> {
    let old_keys: HashMap<&Key, usize> = old
        .children
        .iter()
        .enumerate()
        .filter_map(|(i, child)| child.key().map(|key| (key, i)))
        .collect();

    let len = old.children.len().max(new.children.len());
    let mut patches = Vec::new();

    for index in 0..len {
        let old_child = old.children.get(index);
        let new_child = new.children.get(index);

        let moved = new_child
            .and_then(Node::key)
            .and_then(|key| old_keys.get(key))
            .is_some_and(|&from| from != index);

        let child_patches = match (moved, old_child, new_child) {
            (true, Some(old_child), Some(new_child)) => {
                discard(old_child, Some(new_child), Discard::KeyChanged, intents);
                vec![Patch::Replace(new_child.clone())]
            }
            (true, None, Some(new_child)) => vec![Patch::Create(new_child.clone())],
            _ => diff_node(old_child, new_child, intents),
        };

        if !child_patches.is_empty() {
            patches.push(ChildPatch {
                index,
                patches: child_patches,
            });
        }
    }
    patches
}

// =============================================================================
// Tests
// =============================================================================
