//! Engine - instance bookkeeping.
//!
//! The registry maps each mount container to exactly one live [`Instance`]:
//! its component, last committed tree, update callback and render gate.

mod registry;

pub use registry::*;
