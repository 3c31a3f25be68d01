//! Renderer - reconciliation and patch application.
//!
//! ```text
//! old tree ─┐
//!           ├─▶ diff ─▶ patches + intents ─▶ PatchApplier ─▶ live document
//! new tree ─┘
//! ```
//!
//! - [`diff`] - pure tree comparison
//! - [`patch`] - applies patches through the [`Platform`](crate::platform::Platform)
//! - [`listeners`] - per-element listener bookkeeping

pub mod diff;
pub mod listeners;
pub mod patch;

pub use diff::{Reconciliation, diff, diff_props, reconcile};
pub use listeners::ListenerTable;
pub use patch::{PatchApplier, Prepared};
