//! RenderContext - the hook surface handed to render functions.
//!
//! A context exists only for the duration of one render call and borrows the
//! runtime's hook store, so hooks cannot be called from outside a render.

use std::fmt::Debug;

use super::effect::{EffectOutput, run_effect};
use super::store::{HookStore, StateSetter};
use crate::error::ContextError;
use crate::pipeline::scheduler::Scheduler;
use crate::types::InstanceId;

/// Active render of one instance.
pub struct RenderContext<'a> {
    instance: &'a InstanceId,
    hooks: &'a HookStore,
    scheduler: &'a Scheduler,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(instance: &'a InstanceId, hooks: &'a HookStore, scheduler: &'a Scheduler) -> Self {
        Self {
            instance,
            hooks,
            scheduler,
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        self.instance
    }

    /// Declare the next state slot.
    ///
    /// ```ignore
    /// let (count, set_count) = cx.use_state(0)?;
    /// let on_click = move |_: &Event| set_count.set(count + 1);
    /// ```
    pub fn use_state<T>(&mut self, initial: T) -> Result<(T, StateSetter<T>), ContextError>
    where
        T: Clone + PartialEq + 'static,
    {
        self.hooks.declare_state(self.instance, self.scheduler, initial)
    }

    /// Run `effect` after this render is committed.
    ///
    /// `deps` is recorded in the trace log only; the effect runs on every commit.
    pub fn use_effect<F, O>(&mut self, effect: F, deps: impl Debug)
    where
        F: FnOnce() -> O + 'static,
        O: EffectOutput,
    {
        tracing::trace!(instance = %self.instance, ?deps, "effect declared");
        self.hooks
            .declare_effect(self.instance, Box::new(move || run_effect(effect)));
    }
}
