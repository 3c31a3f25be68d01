//! Core types for spark-vdom.
//!
//! Handles and identities shared by every layer: live node handles issued by
//! the platform, instance ids issued by the registry, and reconciliation keys.

use std::fmt;

// =============================================================================
// Node Handle
// =============================================================================

/// Handle to a live node owned by a [`Platform`](crate::platform::Platform).
///
/// Handles are plain integers so side tables (listeners, cached trees) can be
/// keyed by them without borrowing the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Raw index of this handle.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Instance Identity
// =============================================================================

/// Identity of one mounted render function at one container.
///
/// Unique for the lifetime of a [`Runtime`](crate::Runtime); never reused
/// after unmount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an explicit id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Reconciliation Key
// =============================================================================

/// Reconciliation identity of a node among its siblings.
///
/// Never applied to the live element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value as i64)
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

// =============================================================================
// Tests
// =============================================================================
