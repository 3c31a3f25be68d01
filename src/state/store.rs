//! Hook State Store - ordered state slots per instance.
//!
//! Each instance owns a [`ComponentState`]: a list of slots and a cursor. The
//! cursor resets to 0 before every render and advances on every hook
//! declaration, so the N-th `declare_state` call of a render always binds to
//! slot N. Render functions must therefore declare hooks in the same order on
//! every render; the store can only notice a violation when the stored value
//! has a different type, in which case the slot is re-initialized.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::error::ContextError;
use crate::pipeline::scheduler::{Scheduler, Task};
use crate::types::InstanceId;

// =============================================================================
// Subscriber
// =============================================================================

/// Update callback of one instance, registered on the slots it reads.
#[derive(Clone)]
pub struct Subscriber {
    instance: InstanceId,
    callback: Rc<dyn Fn()>,
}

impl Subscriber {
    pub fn new(instance: InstanceId, callback: impl Fn() + 'static) -> Self {
        Self {
            instance,
            callback: Rc::new(callback),
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn notify(&self) {
        (self.callback)()
    }

    fn same(&self, other: &Subscriber) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Slots
// =============================================================================

/// One hook slot.
pub(crate) struct StateEntry {
    value: Box<dyn Any>,
    subscribers: Vec<Subscriber>,
    owner: InstanceId,
}

type Slot = Rc<RefCell<StateEntry>>;

/// Read-only view of a slot, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub owner: InstanceId,
    pub subscribers: usize,
}

/// Slots and cursor of one instance.
#[derive(Default)]
pub struct ComponentState {
    slots: Vec<Slot>,
    cursor: usize,
    effects: Vec<Task>,
}

impl ComponentState {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct StoreInner {
    states: HashMap<InstanceId, ComponentState>,
    /// Instance currently inside its render function, with its update callback.
    rendering: Option<Subscriber>,
    /// Instances with a notification pass queued.
    in_flight: HashSet<InstanceId>,
}

/// Shared handle to every instance's hook state.
#[derive(Clone, Default)]
pub struct HookStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the render of `update`'s instance: reset its cursor and make
    /// `update` the subscriber registered by hook declarations.
    pub fn begin_render(&self, update: Subscriber) {
        let instance = update.instance().clone();
        let mut inner = self.inner.borrow_mut();
        inner.rendering = Some(update);
        inner.states.entry(instance).or_default().cursor = 0;
    }

    /// Leave the active render.
    pub fn end_render(&self) {
        self.inner.borrow_mut().rendering = None;
    }

    /// Instance whose render function is running, if any.
    pub fn rendering(&self) -> Option<InstanceId> {
        self.inner
            .borrow()
            .rendering
            .as_ref()
            .map(|s| s.instance().clone())
    }

    pub fn is_rendering(&self, instance: &InstanceId) -> bool {
        self.inner
            .borrow()
            .rendering
            .as_ref()
            .is_some_and(|s| s.instance() == instance)
    }

    /// Bind the next slot of `instance` and return its value with a setter.
    ///
    /// Fails with [`ContextError::NotRendering`] unless `instance` is the
    /// active render. The slot is (re)initialized to `initial` when it is new
    /// or holds a value of another type.
    pub fn declare_state<T>(
        &self,
        instance: &InstanceId,
        scheduler: &Scheduler,
        initial: T,
    ) -> Result<(T, StateSetter<T>), ContextError>
    where
        T: Clone + PartialEq + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let update = match &inner.rendering {
            Some(update) if update.instance() == instance => update.clone(),
            _ => {
                return Err(ContextError::NotRendering {
                    instance: Some(instance.clone()),
                });
            }
        };

        let state = inner.states.entry(instance.clone()).or_default();
        let index = state.cursor;
        state.cursor += 1;

        let reusable = state
            .slots
            .get(index)
            .is_some_and(|slot| slot.borrow().value.is::<T>());
        if !reusable {
            if index < state.slots.len() {
                tracing::debug!(%instance, index, "hook slot changed type, re-initializing");
            }
            let slot = Rc::new(RefCell::new(StateEntry {
                value: Box::new(initial),
                subscribers: Vec::new(),
                owner: instance.clone(),
            }));
            if index < state.slots.len() {
                state.slots[index] = slot;
            } else {
                state.slots.push(slot);
            }
        }

        let slot = state.slots[index].clone();
        drop(inner);

        let mut entry = slot.borrow_mut();
        if update.instance() == &entry.owner && !entry.subscribers.iter().any(|s| s.same(&update)) {
            entry.subscribers.push(update);
        }
        let value = entry
            .value
            .downcast_ref::<T>()
            .cloned()
            .ok_or(ContextError::Detached)?;
        drop(entry);

        let setter = StateSetter {
            slot: Rc::downgrade(&slot),
            store: Rc::downgrade(&self.inner),
            scheduler: scheduler.clone(),
            _marker: PhantomData,
        };
        Ok((value, setter))
    }

    /// Queue `effect` to run after the next commit of `instance`.
    ///
    /// Outside of that instance's render this logs and does nothing.
    pub fn declare_effect(&self, instance: &InstanceId, effect: Task) {
        let mut inner = self.inner.borrow_mut();
        if !inner.rendering.as_ref().is_some_and(|s| s.instance() == instance) {
            tracing::warn!(%instance, "effect declared outside of a rendering instance, ignoring");
            return;
        }
        inner.states.entry(instance.clone()).or_default().effects.push(effect);
    }

    /// Take the effects declared by the last render of `instance`.
    pub fn take_effects(&self, instance: &InstanceId) -> Vec<Task> {
        self.inner
            .borrow_mut()
            .states
            .get_mut(instance)
            .map(|state| std::mem::take(&mut state.effects))
            .unwrap_or_default()
    }

    /// Reset the cursor of `instance` to slot 0.
    pub fn reset_cursor(&self, instance: &InstanceId) {
        if let Some(state) = self.inner.borrow_mut().states.get_mut(instance) {
            state.cursor = 0;
        }
    }

    /// Drop all hook state of `instance`, clearing subscribers first so no
    /// queued notification can reach it.
    pub fn cleanup_instance(&self, instance: &InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(state) = inner.states.remove(instance) {
            for slot in &state.slots {
                slot.borrow_mut().subscribers.clear();
            }
            tracing::debug!(%instance, slots = state.slots.len(), "hook state cleaned up");
        }
        inner.in_flight.remove(instance);
    }

    /// Move the hook state of `from` to `to`, rewriting slot ownership.
    ///
    /// Any state already held by `to` is replaced.
    pub fn remap_instance(&self, from: &InstanceId, to: &InstanceId) {
        if from == to {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        let Some(state) = inner.states.remove(from) else {
            return;
        };
        for slot in &state.slots {
            let mut entry = slot.borrow_mut();
            if &entry.owner == from {
                entry.owner = to.clone();
            }
            entry.subscribers.retain(|s| s.instance() != from);
        }
        inner.states.insert(to.clone(), state);
        tracing::debug!(%from, %to, "hook state remapped");
    }

    pub fn has_instance(&self, instance: &InstanceId) -> bool {
        self.inner.borrow().states.contains_key(instance)
    }

    /// Number of slots of `instance`, 0 if it has no state.
    pub fn slot_count(&self, instance: &InstanceId) -> usize {
        self.inner
            .borrow()
            .states
            .get(instance)
            .map_or(0, ComponentState::len)
    }

    /// Owner and subscriber count of one slot.
    pub fn slot_info(&self, instance: &InstanceId, index: usize) -> Option<SlotInfo> {
        let inner = self.inner.borrow();
        let slot = inner.states.get(instance)?.slots.get(index)?;
        let entry = slot.borrow();
        Some(SlotInfo {
            owner: entry.owner.clone(),
            subscribers: entry.subscribers.len(),
        })
    }

    #[cfg(test)]
    fn slot(&self, instance: &InstanceId, index: usize) -> Option<Slot> {
        self.inner.borrow().states.get(instance)?.slots.get(index).cloned()
    }
}

// =============================================================================
// Setter
// =============================================================================

/// Writes one hook slot and schedules its subscribers.
///
/// The setter holds the slot weakly: once the owning instance is cleaned up
/// (or the slot is re-initialized), it reports [`ContextError::Detached`].
pub struct StateSetter<T> {
    slot: Weak<RefCell<StateEntry>>,
    store: Weak<RefCell<StoreInner>>,
    scheduler: Scheduler,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            store: self.store.clone(),
            scheduler: self.scheduler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("attached", &(self.slot.strong_count() > 0))
            .finish()
    }
}

impl<T: PartialEq + 'static> StateSetter<T> {
    /// Store `value` and schedule a re-render. Detached setters only log.
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            tracing::debug!(error = %err, "state update dropped");
        }
    }

    /// Store `value` and schedule a re-render.
    ///
    /// Returns `Ok(false)` when `value` equals the stored value (nothing is
    /// stored or scheduled). The value is stored immediately; if the owner
    /// already has a notification pass queued, no second one is queued since
    /// the pending pass will render the latest value.
    pub fn try_set(&self, value: T) -> Result<bool, ContextError> {
        let slot = self.slot.upgrade().ok_or(ContextError::Detached)?;
        let store = self.store.upgrade().ok_or(ContextError::Detached)?;

        let owner = {
            let mut entry = slot.borrow_mut();
            if entry.value.downcast_ref::<T>() == Some(&value) {
                return Ok(false);
            }
            entry.value = Box::new(value);
            entry.owner.clone()
        };

        if !store.borrow_mut().in_flight.insert(owner.clone()) {
            tracing::trace!(instance = %owner, "update already in flight, coalesced");
            return Ok(true);
        }

        let slot = self.slot.clone();
        let store = self.store.clone();
        self.scheduler.queue_microtask(move || {
            let subscribers = slot
                .upgrade()
                .map(|slot| slot.borrow().subscribers.clone())
                .unwrap_or_default();
            for subscriber in &subscribers {
                subscriber.notify();
            }
            if let Some(store) = store.upgrade() {
                store.borrow_mut().in_flight.remove(&owner);
            }
        });
        Ok(true)
    }

    /// Current value of the slot, if still attached.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        let slot = self.slot.upgrade()?;
        let entry = slot.borrow();
        entry.value.downcast_ref::<T>().cloned()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.strong_count() > 0
    }
}

// =============================================================================
// Tests
// =============================================================================
