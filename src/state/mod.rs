//! Hook state - per-instance ordered state slots and effects.
//!
//! - [`store`] - slots, cursors, subscribers and setters
//! - [`context`] - the [`RenderContext`] render functions declare hooks on
//! - [`effect`] - post-commit callbacks

pub mod context;
pub mod effect;
pub mod store;

pub use context::RenderContext;
pub use effect::EffectOutput;
pub use store::{ComponentState, HookStore, SlotInfo, StateSetter, Subscriber};
