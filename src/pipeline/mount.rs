//! Mount API - instance lifecycle and the commit cycle.
//!
//! [`Runtime`] is the explicit context object every operation goes through.
//! It owns the platform, the hook store, the scheduler, the instance registry
//! and the listener table; nothing lives in globals.
//!
//! # Example
//!
//! ```ignore
//! use spark_vdom::{Component, MemoryDocument, Props, Runtime, h};
//!
//! let runtime = Runtime::new(MemoryDocument::new());
//! let counter = Component::new(|cx| {
//!     let (count, set_count) = cx.use_state(0)?;
//!     Ok(h!("button",
//!         Props::new().on("click", move |_| set_count.set(count + 1)),
//!         count.to_string(),
//!     ))
//! });
//!
//! let container = runtime.mount(&counter, None)?;
//! runtime.run_until_idle();
//! ```
//!
//! # Commit cycle
//!
//! ```text
//! setter ─▶ microtask ─▶ update callback ─▶ RenderGate ─▶ frame ─▶ commit
//!                                                                   │
//!        render ─▶ reconcile ─▶ intents ─▶ PatchApplier ─▶ effects ◀┘
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::RuntimeConfig;
use crate::engine::{Component, Instance, InstanceRegistry};
use crate::error::{MountError, PlatformError};
use crate::node::{InstanceIntent, Node};
use crate::platform::{Event, Platform};
use crate::renderer::{ListenerTable, PatchApplier, reconcile};
use crate::state::{HookStore, RenderContext, Subscriber};
use crate::types::{InstanceId, NodeId};

use super::scheduler::{RenderGate, Scheduler};

// =============================================================================
// Runtime
// =============================================================================

struct RuntimeInner<P: Platform> {
    config: RuntimeConfig,
    platform: RefCell<P>,
    hooks: HookStore,
    scheduler: Scheduler,
    registry: RefCell<InstanceRegistry>,
    listeners: RefCell<ListenerTable>,
}

/// Shared handle to one rendering runtime.
pub struct Runtime<P: Platform + 'static> {
    inner: Rc<RuntimeInner<P>>,
}

impl<P: Platform + 'static> Clone for Runtime<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Platform + 'static> Runtime<P> {
    pub fn new(platform: P) -> Self {
        Self::with_config(platform, RuntimeConfig::default())
    }

    pub fn with_config(platform: P, config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                platform: RefCell::new(platform),
                hooks: HookStore::new(),
                scheduler: Scheduler::new(),
                registry: RefCell::new(InstanceRegistry::new()),
                listeners: RefCell::new(ListenerTable::new()),
            }),
        }
    }

    fn downgrade(&self) -> Weak<RuntimeInner<P>> {
        Rc::downgrade(&self.inner)
    }

    // -------------------------------------------------------------------------
    // Mount / Unmount
    // -------------------------------------------------------------------------

    /// Mount `component` on `container` (default: the platform root).
    ///
    /// The first render happens on the next frame. Mounting the same
    /// component again is a no-op; mounting a different one tears the current
    /// instance down first.
    pub fn mount(&self, component: &Component, container: Option<NodeId>) -> Result<NodeId, MountError> {
        let container = container.unwrap_or_else(|| self.inner.platform.borrow().root());
        if !self.inner.platform.borrow().is_element(container)? {
            return Err(PlatformError::NotAnElement(container).into());
        }

        let previous = {
            let mut registry = self.inner.registry.borrow_mut();
            if registry
                .get(container)
                .is_some_and(|instance| instance.component.same(component))
            {
                tracing::debug!(%container, component = component.name(), "already mounted");
                return Ok(container);
            }
            registry.remove(container)
        };
        if let Some(previous) = previous {
            tracing::debug!(%container, instance = %previous.id, "replacing mounted instance");
            self.inner.hooks.cleanup_instance(&previous.id);
            if let Some(root) = previous.live_root {
                let mut platform = self.inner.platform.borrow_mut();
                let mut listeners = self.inner.listeners.borrow_mut();
                let parent = platform.parent(root);
                let mut applier = PatchApplier::new(&mut *platform, &mut listeners);
                match parent {
                    Some(parent) if parent == container => applier.detach(container, root)?,
                    Some(_) => tracing::warn!(%container, %root, "previous root moved out of its container, leaving it"),
                    None => applier.discard_subtree(root),
                }
            }
        }

        let id = self.inner.registry.borrow_mut().next_id();
        let update = {
            let runtime = self.downgrade();
            let target = id.clone();
            Subscriber::new(id.clone(), move || {
                if let Some(inner) = runtime.upgrade() {
                    Runtime { inner }.request_update(container, &target);
                }
            })
        };

        self.inner.registry.borrow_mut().insert(Instance {
            id: id.clone(),
            component: component.clone(),
            container,
            last_tree: None,
            live_root: None,
            update,
            gate: RenderGate::new(),
            commits: 0,
        });
        tracing::debug!(%container, instance = %id, component = component.name(), "mounted");

        self.request_update(container, &id);
        Ok(container)
    }

    /// Tear down the instance at `container` and empty the container.
    ///
    /// Returns whether an instance was mounted there.
    pub fn unmount(&self, container: NodeId) -> Result<bool, MountError> {
        let Some(instance) = self.inner.registry.borrow_mut().remove(container) else {
            return Ok(false);
        };
        self.inner.hooks.cleanup_instance(&instance.id);

        let mut platform = self.inner.platform.borrow_mut();
        let mut listeners = self.inner.listeners.borrow_mut();
        let children = platform.children(container);
        let mut applier = PatchApplier::new(&mut *platform, &mut listeners);
        for child in children {
            applier.detach(container, child)?;
        }
        tracing::debug!(%container, instance = %instance.id, commits = instance.commits, "unmounted");
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Ask for a commit of the instance `id` at `container` on the next frame.
    ///
    /// Dropped when the instance is gone, already scheduled, or over its
    /// burst cap.
    pub fn request_update(&self, container: NodeId, id: &InstanceId) {
        let admitted = {
            let mut registry = self.inner.registry.borrow_mut();
            let Some(instance) = registry.get_live(container, id) else {
                tracing::trace!(%container, instance = %id, "update for an instance that is gone");
                return;
            };
            instance.gate.try_schedule(self.inner.config.render_burst_cap, id)
        };
        if !admitted {
            return;
        }

        let runtime = self.downgrade();
        let id = id.clone();
        self.inner.scheduler.request_frame(move || {
            if let Some(inner) = runtime.upgrade() {
                Runtime { inner }.commit(container, &id);
            }
        });
    }

    /// Render, reconcile and patch one instance.
    fn commit(&self, container: NodeId, id: &InstanceId) {
        let (component, last_tree, live_root, update) = {
            let mut registry = self.inner.registry.borrow_mut();
            let Some(instance) = registry.get_live(container, id) else {
                tracing::trace!(%container, instance = %id, "commit for an instance that is gone");
                return;
            };
            instance.gate.begin_render();
            (
                instance.component.clone(),
                instance.last_tree.clone(),
                instance.live_root,
                instance.update.clone(),
            )
        };

        // Render
        let hooks = &self.inner.hooks;
        hooks.begin_render(update);
        hooks.reset_cursor(id);
        let rendered = {
            let mut cx = RenderContext::new(id, hooks, &self.inner.scheduler);
            component.render(&mut cx)
        };
        hooks.end_render();

        let mut vnode = match rendered {
            Ok(vnode) => vnode,
            Err(err) => {
                tracing::error!(%container, instance = %id, component = component.name(), error = %err, "render failed, keeping previous tree");
                hooks.take_effects(id);
                self.finish(container, id, |instance| instance.gate.finish(false));
                return;
            }
        };
        vnode.instance_id = Some(id.clone());
        let tree = Node::Element(vnode);

        // Reconcile
        let reconciliation = reconcile(last_tree.as_ref(), Some(&tree));
        for intent in &reconciliation.intents {
            match intent {
                InstanceIntent::Cleanup(stale) => hooks.cleanup_instance(stale),
                InstanceIntent::Remap { from, to } => hooks.remap_instance(from, to),
            }
        }

        // Patch. New subtrees are built before the live tree is touched, so
        // a refused tag abandons the commit with the document as it was.
        let applied = {
            let mut platform = self.inner.platform.borrow_mut();
            let mut listeners = self.inner.listeners.borrow_mut();
            let mut applier = PatchApplier::new(&mut *platform, &mut listeners);
            match applier.prepare(live_root, &reconciliation.patches) {
                Err(err) => Err(PatchFailure::Prepare(err)),
                Ok(prepared) => {
                    if last_tree.is_none() && self.inner.config.clear_container_on_first_render {
                        applier.clear_children(container);
                    }
                    applier
                        .apply_prepared(container, live_root, &reconciliation.patches, prepared)
                        .map_err(PatchFailure::Apply)
                }
            }
        };

        match applied {
            Ok(root) => {
                tracing::debug!(%container, instance = %id, patches = reconciliation.patches.len(), "committed");
                self.finish(container, id, |instance| {
                    instance.last_tree = Some(tree);
                    instance.live_root = root;
                    instance.commits += 1;
                    instance.gate.finish(true);
                });
                for effect in hooks.take_effects(id) {
                    self.inner.scheduler.queue_microtask(effect);
                }
            }
            Err(PatchFailure::Prepare(err)) => {
                tracing::error!(%container, instance = %id, error = %err, "patch failed, keeping previous tree");
                hooks.take_effects(id);
                self.finish(container, id, |instance| instance.gate.finish(false));
            }
            Err(PatchFailure::Apply(err)) => {
                // The live tree is partly patched and no longer matches the
                // cached one. Drop both so the next commit rebuilds.
                tracing::error!(%container, instance = %id, error = %err, "patch failed mid-splice, dropping live tree");
                hooks.take_effects(id);
                if let Some(root) = live_root {
                    let mut platform = self.inner.platform.borrow_mut();
                    let mut listeners = self.inner.listeners.borrow_mut();
                    if let Err(err) = PatchApplier::new(&mut *platform, &mut listeners).detach(container, root) {
                        tracing::warn!(%container, error = %err, "failed to detach live root");
                    }
                }
                self.finish(container, id, |instance| {
                    instance.last_tree = None;
                    instance.live_root = None;
                    instance.gate.finish(false);
                });
            }
        }

        let runtime = self.downgrade();
        let id = id.clone();
        self.inner.scheduler.request_frame(move || {
            if let Some(inner) = runtime.upgrade() {
                let mut registry = inner.registry.borrow_mut();
                if let Some(instance) = registry.get_live(container, &id) {
                    instance.gate.reset_burst_if_idle();
                }
            }
        });
    }

    fn finish(&self, container: NodeId, id: &InstanceId, f: impl FnOnce(&mut Instance)) {
        if let Some(instance) = self.inner.registry.borrow_mut().get_live(container, id) {
            f(instance);
        }
    }

    // -------------------------------------------------------------------------
    // Event loop
    // -------------------------------------------------------------------------

    pub fn flush_microtasks(&self) -> usize {
        self.inner.scheduler.flush_microtasks()
    }

    /// Run one frame. Returns how many frame tasks ran.
    pub fn tick(&self) -> usize {
        self.inner.scheduler.tick()
    }

    /// Run frames until nothing is queued. Returns how many frames ran.
    pub fn run_until_idle(&self) -> usize {
        self.inner.scheduler.run_until_idle()
    }

    /// Call the listeners for `event_type` on `target`, then drain microtasks.
    ///
    /// No runtime borrow is held while handlers run. Returns how many ran.
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> usize {
        let listeners = self.inner.platform.borrow().listeners(target, event_type);
        let event = Event::new(event_type, target);
        for listener in &listeners {
            listener.call(&event);
        }
        self.flush_microtasks();
        listeners.len()
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn hooks(&self) -> &HookStore {
        &self.inner.hooks
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn with_platform<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.inner.platform.borrow())
    }

    pub fn with_platform_mut<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.inner.platform.borrow_mut())
    }

    pub fn instance_id(&self, container: NodeId) -> Option<InstanceId> {
        self.inner.registry.borrow().get(container).map(|i| i.id.clone())
    }

    pub fn instance_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Successful commits of the instance at `container`.
    pub fn commit_count(&self, container: NodeId) -> Option<u64> {
        self.inner.registry.borrow().get(container).map(|i| i.commits)
    }

    /// Tree of the last successful commit at `container`.
    pub fn last_tree(&self, container: NodeId) -> Option<Node> {
        self.inner
            .registry
            .borrow()
            .get(container)
            .and_then(|i| i.last_tree.clone())
    }

    /// Live node the instance at `container` rendered into.
    pub fn live_root(&self, container: NodeId) -> Option<NodeId> {
        self.inner.registry.borrow().get(container).and_then(|i| i.live_root)
    }

    /// Listeners currently tracked across all instances.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

/// Where a commit's patch application stopped.
enum PatchFailure {
    /// Building new subtrees; the live tree is untouched.
    Prepare(PlatformError),
    /// Splicing into the live tree.
    Apply(PlatformError),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::h;
    use crate::node::{Props, VNode};
    use crate::platform::MemoryDocument;
    use std::cell::Cell;

    fn static_component(text: &'static str) -> Component {
        Component::new(move |_| Ok(h!("p", text)))
    }

    #[test]
    fn test_first_render_waits_for_frame() {
        let runtime = Runtime::new(MemoryDocument::new());
        let root = runtime.mount(&static_component("hi"), None).unwrap();

        assert_eq!(runtime.commit_count(root), Some(0));
        runtime.tick();
        assert_eq!(runtime.commit_count(root), Some(1));
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body><p>hi</p></body>");
    }

    #[test]
    fn test_first_render_clears_container() {
        let runtime = Runtime::new(MemoryDocument::new());
        let root = runtime.with_platform_mut(|doc| {
            let stale = doc.create_text("loading");
            let root = doc.root();
            doc.append_child(root, stale).unwrap();
            root
        });

        runtime.mount(&static_component("ready"), Some(root)).unwrap();
        runtime.run_until_idle();
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body><p>ready</p></body>");
    }

    #[test]
    fn test_keep_container_contents_when_configured() {
        let config = RuntimeConfig::default().with_clear_container_on_first_render(false);
        let runtime = Runtime::with_config(MemoryDocument::new(), config);
        let root = runtime.with_platform_mut(|doc| {
            let stale = doc.create_text("header");
            let root = doc.root();
            doc.append_child(root, stale).unwrap();
            root
        });

        runtime.mount(&static_component("body"), Some(root)).unwrap();
        runtime.run_until_idle();
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body>header<p>body</p></body>");
    }

    #[test]
    fn test_mount_on_text_node_fails() {
        let runtime = Runtime::new(MemoryDocument::new());
        let text = runtime.with_platform_mut(|doc| doc.create_text("x"));
        let result = runtime.mount(&static_component("a"), Some(text));
        assert_eq!(result, Err(MountError::Platform(PlatformError::NotAnElement(text))));
    }

    #[test]
    fn test_same_component_remount_is_noop() {
        let runtime = Runtime::new(MemoryDocument::new());
        let component = static_component("a");
        let root = runtime.mount(&component, None).unwrap();
        let id = runtime.instance_id(root);

        runtime.mount(&component, None).unwrap();
        assert_eq!(runtime.instance_id(root), id);
        assert_eq!(runtime.instance_count(), 1);
    }

    #[test]
    fn test_effects_run_after_commit() {
        let runtime = Runtime::new(MemoryDocument::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        let component = Component::new(move |cx| {
            let s = s.clone();
            cx.use_effect(move || s.borrow_mut().push("effect"), ["deps"]);
            Ok(VNode::element("div"))
        });
        let root = runtime.mount(&component, None).unwrap();

        runtime.run_until_idle();
        assert_eq!(*seen.borrow(), vec!["effect"]);
        assert_eq!(runtime.commit_count(root), Some(1));
    }

    #[test]
    fn test_failed_render_discards_effects() {
        let runtime = Runtime::new(MemoryDocument::new());
        let ran = Rc::new(Cell::new(false));

        let r = ran.clone();
        let component = Component::new(move |cx| {
            let r = r.clone();
            cx.use_effect(move || r.set(true), ());
            Err(RenderError::msg("boom"))
        });
        let root = runtime.mount(&component, None).unwrap();

        runtime.run_until_idle();
        assert!(!ran.get());
        assert_eq!(runtime.commit_count(root), Some(0));
        assert!(runtime.last_tree(root).is_none());
    }

    #[test]
    fn test_patch_failure_keeps_live_tree() {
        let runtime = Runtime::new(MemoryDocument::new());
        let tag = Rc::new(Cell::new("span"));

        let t = tag.clone();
        let component = Component::new(move |_| Ok(h!("div", h!(t.get()))));
        let root = runtime.mount(&component, None).unwrap();
        runtime.run_until_idle();
        let live = runtime.live_root(root);
        let tree = runtime.last_tree(root);

        tag.set("no tag");
        let id = runtime.instance_id(root).unwrap();
        runtime.request_update(root, &id);
        runtime.run_until_idle();
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body><div><span></span></div></body>");
        assert_eq!(runtime.live_root(root), live);
        assert_eq!(runtime.last_tree(root), tree);
        assert_eq!(runtime.commit_count(root), Some(1));

        tag.set("em");
        runtime.request_update(root, &id);
        runtime.run_until_idle();
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body><div><em></em></div></body>");
        assert_eq!(runtime.live_root(root), live);
        assert_eq!(runtime.commit_count(root), Some(2));
    }

    #[test]
    fn test_failed_first_render_keeps_container_and_listeners_clean() {
        let runtime = Runtime::new(MemoryDocument::new());
        let root = runtime.with_platform_mut(|doc| {
            let stale = doc.create_text("loading");
            let root = doc.root();
            doc.append_child(root, stale).unwrap();
            root
        });
        let component = Component::new(|_| {
            Ok(h!("div", Props::new().on("click", |_| {}), h!("no tag")))
        });

        runtime.mount(&component, Some(root)).unwrap();
        runtime.run_until_idle();
        assert_eq!(runtime.listener_count(), 0);
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body>loading</body>");
        assert_eq!(runtime.with_platform(|doc| doc.node_count()), 2);
        assert!(runtime.last_tree(root).is_none());
    }

    #[test]
    fn test_replacement_detaches_previous_root_without_clearing() {
        let config = RuntimeConfig::default().with_clear_container_on_first_render(false);
        let runtime = Runtime::with_config(MemoryDocument::new(), config);
        let first = Component::new(|_| Ok(h!("button", Props::new().on("click", |_| {}), "A")));
        let second = Component::new(|_| Ok(h!("p", "B")));

        let root = runtime.mount(&first, None).unwrap();
        runtime.run_until_idle();
        assert_eq!(runtime.listener_count(), 1);

        runtime.mount(&second, Some(root)).unwrap();
        assert_eq!(runtime.listener_count(), 0);
        runtime.run_until_idle();
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body><p>B</p></body>");
        assert_eq!(runtime.listener_count(), 0);
    }

    #[test]
    fn test_unmount_clears_everything() {
        let runtime = Runtime::new(MemoryDocument::new());
        let component = Component::new(|cx| {
            let (_, _set) = cx.use_state(0)?;
            Ok(h!("button", Props::new().on("click", |_| {}), "x"))
        });
        let root = runtime.mount(&component, None).unwrap();
        runtime.run_until_idle();
        let id = runtime.instance_id(root).unwrap();
        assert_eq!(runtime.listener_count(), 1);

        assert_eq!(runtime.unmount(root), Ok(true));
        assert_eq!(runtime.unmount(root), Ok(false));
        assert_eq!(runtime.listener_count(), 0);
        assert!(!runtime.hooks().has_instance(&id));
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body></body>");
    }

    #[test]
    fn test_stale_update_after_unmount_is_ignored() {
        let runtime = Runtime::new(MemoryDocument::new());
        let root = runtime.mount(&static_component("a"), None).unwrap();
        let id = runtime.instance_id(root).unwrap();
        runtime.unmount(root).unwrap();

        // The first render was still queued.
        runtime.run_until_idle();
        runtime.request_update(root, &id);
        assert!(runtime.scheduler().is_idle());
        assert_eq!(runtime.with_platform(|doc| doc.to_markup(root)), "<body></body>");
    }
}
