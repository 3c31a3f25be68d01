//! Node Model - trees, props and patches.
//!
//! - [`VNode`] / [`Node`] - declarative tree produced by a render pass
//! - [`Props`] - validated prop bag ([`PropValue`] is attribute, style or event)
//! - [`Patch`] - mutations computed by the reconciler
//!
//! ```ignore
//! use spark_vdom::{h, node::Props};
//!
//! let tree = h!("ul",
//!     Props::new().attr("class", "list"),
//!     h!("li", Props::new().key(1), "one"),
//!     h!("li", Props::new().key(2), "two"),
//! );
//! ```

mod patch;
mod props;
mod vnode;

pub use patch::*;
pub use props::*;
pub use vnode::*;
