//! Patch applier - executes reconciler output against a live document.
//!
//! Application is two-phase. [`PatchApplier::prepare`] builds every subtree a
//! `Create` or `Replace` needs while the live tree is left alone, and
//! [`PatchApplier::apply_prepared`] then splices them in. A tag the platform
//! refuses therefore fails the commit before anything visible changes.
//!
//! Prop application never aborts a patch: a failing attribute, style property
//! or listener is logged and skipped.

use std::collections::VecDeque;

use crate::error::PlatformError;
use crate::node::{AttrValue, Listener, Node, Patch, PropPatch, PropValue, Style, VNode, event_type};
use crate::platform::Platform;
use crate::types::NodeId;

use super::listeners::ListenerTable;

/// Detached subtrees built for one patch list, in the order it consumes them.
#[derive(Debug, Default)]
pub struct Prepared {
    subtrees: VecDeque<NodeId>,
}

impl Prepared {
    pub fn len(&self) -> usize {
        self.subtrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtrees.is_empty()
    }
}

/// Borrowed platform plus listener table for one commit.
pub struct PatchApplier<'a, P: Platform + ?Sized> {
    platform: &'a mut P,
    listeners: &'a mut ListenerTable,
}

impl<'a, P: Platform + ?Sized> PatchApplier<'a, P> {
    pub fn new(platform: &'a mut P, listeners: &'a mut ListenerTable) -> Self {
        Self { platform, listeners }
    }

    // =========================================================================
    // Patches
    // =========================================================================

    /// Apply `patches` to `node`, a child of `parent` (or the slot after its
    /// last child when `node` is `None`).
    ///
    /// Returns the live node the patches leave in that slot. On error the
    /// live tree is unchanged unless the failure came from splicing.
    pub fn apply(
        &mut self,
        parent: NodeId,
        node: Option<NodeId>,
        patches: &[Patch],
    ) -> Result<Option<NodeId>, PlatformError> {
        let prepared = self.prepare(node, patches)?;
        self.apply_prepared(parent, node, patches, prepared)
    }

    /// Build every new subtree `patches` needs without touching the live tree.
    ///
    /// On error, whatever was built is forgotten and released.
    pub fn prepare(&mut self, node: Option<NodeId>, patches: &[Patch]) -> Result<Prepared, PlatformError> {
        let mut prepared = Prepared::default();
        if let Err(err) = self.build(node, patches, &mut prepared) {
            self.discard(prepared);
            return Err(err);
        }
        Ok(prepared)
    }

    /// Walks `patches` the same way [`attach`](Self::attach) will.
    fn build(&mut self, node: Option<NodeId>, patches: &[Patch], prepared: &mut Prepared) -> Result<(), PlatformError> {
        let mut current = node;

        for patch in patches {
            match patch {
                Patch::Create(vnode) | Patch::Replace(vnode) => {
                    let created = self.materialize(vnode)?;
                    prepared.subtrees.push_back(created);
                    current = Some(created);
                }
                Patch::Remove => current = None,
                Patch::UpdateProps(_) => {}
                Patch::UpdateChildren(children) => {
                    let Some(live) = current else { continue };
                    let snapshot = self.platform.children(live);
                    for child in children {
                        match snapshot.get(child.index) {
                            Some(&existing) => self.build(Some(existing), &child.patches, prepared)?,
                            None => {
                                for patch in child.patches.iter().filter(|p| matches!(p, Patch::Create(_))) {
                                    self.build(None, std::slice::from_ref(patch), prepared)?;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Splice `prepared` into the live tree and apply the in-place patches.
    ///
    /// Subtrees left over (after an error) are forgotten and released.
    pub fn apply_prepared(
        &mut self,
        parent: NodeId,
        node: Option<NodeId>,
        patches: &[Patch],
        mut prepared: Prepared,
    ) -> Result<Option<NodeId>, PlatformError> {
        let result = self.attach(parent, node, patches, &mut prepared);
        self.discard(prepared);
        result
    }

    fn attach(
        &mut self,
        parent: NodeId,
        node: Option<NodeId>,
        patches: &[Patch],
        prepared: &mut Prepared,
    ) -> Result<Option<NodeId>, PlatformError> {
        let mut current = node;

        for patch in patches {
            match patch {
                Patch::Create(vnode) => {
                    let created = self.take_prepared(prepared, vnode)?;
                    if let Err(err) = self.platform.append_child(parent, created) {
                        self.discard_subtree(created);
                        return Err(err);
                    }
                    current = Some(created);
                }
                Patch::Remove => {
                    if let Some(live) = current.take() {
                        self.detach(parent, live)?;
                    }
                }
                Patch::Replace(vnode) => {
                    let created = self.take_prepared(prepared, vnode)?;
                    let spliced = match current {
                        Some(live) => self.platform.replace_child(parent, created, live).map(|()| Some(live)),
                        None => self.platform.append_child(parent, created).map(|()| None),
                    };
                    match spliced {
                        Ok(Some(old)) => self.discard_subtree(old),
                        Ok(None) => {}
                        Err(err) => {
                            self.discard_subtree(created);
                            return Err(err);
                        }
                    }
                    current = Some(created);
                }
                Patch::UpdateProps(props) => {
                    let Some(live) = current else {
                        tracing::warn!(%parent, "prop update without a live node, skipping");
                        continue;
                    };
                    for prop in props {
                        match prop {
                            PropPatch::Set(name, value) => self.set_prop(live, name, value),
                            PropPatch::Remove(name) => self.remove_prop(live, name),
                        }
                    }
                }
                Patch::UpdateChildren(children) => {
                    let Some(live) = current else {
                        tracing::warn!(%parent, "child update without a live node, skipping");
                        continue;
                    };
                    // Indices refer to the children as they were before any
                    // of these child patches ran.
                    let snapshot = self.platform.children(live);
                    for child in children {
                        match snapshot.get(child.index) {
                            Some(&existing) => {
                                self.attach(live, Some(existing), &child.patches, prepared)?;
                            }
                            None => {
                                for patch in &child.patches {
                                    if matches!(patch, Patch::Create(_)) {
                                        self.attach(live, None, std::slice::from_ref(patch), prepared)?;
                                    } else {
                                        tracing::trace!(index = child.index, "no live child at index, only creates apply");
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(current)
    }

    fn take_prepared(&mut self, prepared: &mut Prepared, node: &Node) -> Result<NodeId, PlatformError> {
        match prepared.subtrees.pop_front() {
            Some(built) => Ok(built),
            None => self.materialize(node),
        }
    }

    /// Build a detached live subtree for `node`.
    ///
    /// A failure anywhere below leaves nothing behind: the partial subtree is
    /// forgotten and released before the error is returned.
    pub fn materialize(&mut self, node: &Node) -> Result<NodeId, PlatformError> {
        let vnode = match node {
            Node::Text(text) => return Ok(self.platform.create_text(text)),
            Node::Element(vnode) => vnode,
        };

        let element = self.platform.create_element(&vnode.tag)?;
        if let Err(err) = self.fill(element, vnode) {
            self.discard_subtree(element);
            return Err(err);
        }
        Ok(element)
    }

    fn fill(&mut self, element: NodeId, vnode: &VNode) -> Result<(), PlatformError> {
        for (name, value) in vnode.props.iter() {
            self.set_prop(element, name, value);
        }
        for child in &vnode.children {
            let live = self.materialize(child)?;
            if let Err(err) = self.platform.append_child(element, live) {
                self.discard_subtree(live);
                return Err(err);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Detach every child of `parent`, logging the ones that refuse.
    pub fn clear_children(&mut self, parent: NodeId) {
        for child in self.platform.children(parent) {
            if let Err(err) = self.detach(parent, child) {
                tracing::warn!(%parent, %child, error = %err, "failed to detach child");
            }
        }
    }

    /// Remove `child` from `parent` and discard it.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlatformError> {
        self.platform.remove_child(parent, child)?;
        self.discard_subtree(child);
        Ok(())
    }

    /// Drop tracked listeners under a detached `root` and release it.
    pub fn discard_subtree(&mut self, root: NodeId) {
        let dropped = self.listeners.forget_subtree(&*self.platform, root);
        if dropped > 0 {
            tracing::trace!(%root, dropped, "forgot listeners of detached subtree");
        }
        self.platform.release(root);
    }

    fn discard(&mut self, prepared: Prepared) {
        for root in prepared.subtrees {
            self.discard_subtree(root);
        }
    }

    // =========================================================================
    // Props
    // =========================================================================

    fn set_prop(&mut self, element: NodeId, name: &str, value: &PropValue) {
        match value {
            PropValue::Attr(attr) => self.set_attr(element, name, attr),
            PropValue::Style(style) => self.set_style(element, style),
            PropValue::Event(listener) => match event_type(name) {
                Some(ty) => self.set_listener(element, &ty, listener),
                None => tracing::warn!(%element, prop = name, "listener under a non-event name, skipping"),
            },
        }
    }

    /// Every value is stringified, booleans included (`"true"`/`"false"`).
    fn set_attr(&mut self, element: NodeId, name: &str, value: &AttrValue) {
        if let Err(err) = self.platform.set_attribute(element, name, &value.to_string()) {
            tracing::warn!(%element, attribute = name, error = %err, "failed to set attribute");
        }
    }

    /// Replace the element's whole style with `style`.
    fn set_style(&mut self, element: NodeId, style: &Style) {
        if let Err(err) = self.platform.remove_attribute(element, "style") {
            tracing::warn!(%element, error = %err, "failed to clear style");
        }
        for (property, value) in style {
            if let Err(err) = self.platform.set_style(element, property, &value.to_string()) {
                tracing::warn!(%element, property = property.as_str(), error = %err, "failed to set style property");
            }
        }
    }

    fn set_listener(&mut self, element: NodeId, event_type: &str, listener: &Listener) {
        if let Some(previous) = self.listeners.deregister(element, event_type) {
            if let Err(err) = self.platform.remove_listener(element, event_type, &previous) {
                tracing::warn!(%element, event_type, error = %err, "failed to remove listener");
            }
        }
        match self.platform.add_listener(element, event_type, listener.clone()) {
            Ok(()) => {
                self.listeners.register(element, event_type, listener.clone());
            }
            Err(err) => tracing::warn!(%element, event_type, error = %err, "failed to add listener"),
        }
    }

    fn remove_prop(&mut self, element: NodeId, name: &str) {
        // A tracked listener wins over an attribute of the same name.
        let tracked = event_type(name)
            .and_then(|ty| self.listeners.deregister(element, &ty).map(|previous| (ty, previous)));
        if let Some((ty, previous)) = tracked {
            if let Err(err) = self.platform.remove_listener(element, &ty, &previous) {
                tracing::warn!(%element, event_type = ty.as_str(), error = %err, "failed to remove listener");
            }
            return;
        }
        if let Err(err) = self.platform.remove_attribute(element, name) {
            tracing::warn!(%element, attribute = name, error = %err, "failed to remove attribute");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
