//! Pipeline - scheduling and the mount/commit cycle.
//!
//! ```text
//! setter → microtask → update callback → frame → render → diff → patch → effects
//! ```
//!
//! - [`scheduler`] - microtask and frame queues, per-instance render gate
//! - [`mount`] - the [`Runtime`] that mounts components and runs commits

pub mod mount;
pub mod scheduler;

pub use mount::Runtime;
pub use scheduler::{InstanceFlags, RenderGate, Scheduler, Task};
