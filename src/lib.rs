//! # spark-vdom
//!
//! Hook-based state and virtual tree reconciliation for declarative UI.
//!
//! ## Architecture
//!
//! Render functions describe a tree of [`VNode`]s on every render. The runtime
//! keeps the previous tree per mount container, diffs the two, and patches the
//! live document through a [`Platform`]. State lives in ordered hook slots per
//! instance; setters batch through a microtask queue and commits run on
//! frames.
//!
//! ```text
//! render fn → VNode tree → reconcile(old, new) → patches → PatchApplier → document
//!     ▲                                                                        │
//!     └──── frame ◀── RenderGate ◀── update callback ◀── microtask ◀── setter ◀┘
//! ```
//!
//! Everything is single-threaded and deterministic: nothing runs until the
//! embedder drives the loop with [`Runtime::tick`] or
//! [`Runtime::run_until_idle`].
//!
//! ## Modules
//!
//! - [`types`] - node handles, instance ids, keys
//! - [`node`] - VNode, props, patches, [`create`] and [`h!`]
//! - [`state`] - hook store, setters, render context, effects
//! - [`pipeline`] - scheduler and the [`Runtime`]
//! - [`renderer`] - reconciler, patch applier, listener table
//! - [`engine`] - instance registry
//! - [`platform`] - host document boundary and [`MemoryDocument`]

pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod pipeline;
pub mod platform;
pub mod renderer;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::RuntimeConfig;

pub use error::{ContextError, MountError, PlatformError, PropError, RenderError};

pub use node::{
    AttrValue, Child, ChildPatch, InstanceIntent, Listener, Node, Patch, PropPatch, PropValue,
    Props, Style, VNode, create,
};

pub use state::{EffectOutput, HookStore, RenderContext, StateSetter};

pub use pipeline::{Runtime, Scheduler};

pub use renderer::{Reconciliation, diff, reconcile};

pub use engine::Component;

pub use platform::{Event, MemoryDocument, Platform};
