//! Props - the typed property bag of a [`VNode`](super::VNode).
//!
//! Each prop name has one reserved meaning, checked when the prop is inserted:
//!
//! | Name | Value | Applied as |
//! |------|-------|------------|
//! | `key` | string / integer | reconciliation identity, never applied |
//! | `on*` | [`Listener`] | event listener for the lowercased suffix |
//! | `style` | [`Style`] | style properties, key by key |
//! | anything else | [`AttrValue`] | generic attribute |
//!
//! Camel-cased `on` names (`onClick`) must carry a listener. Lowercase ones
//! (`open`, `onload`) may carry either, since plain attributes share the prefix.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::PropError;
use crate::platform::Event;
use crate::types::Key;

// =============================================================================
// Listener
// =============================================================================

/// Event callback attached through an `on*` prop.
///
/// Equality is identity: two listeners are equal only if they share the same
/// allocation, so a freshly created closure always counts as a change.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    /// Invoke the callback.
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    /// True if both listeners share one allocation.
    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Attribute Values
// =============================================================================

/// Scalar value of an attribute or style property.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(n) => write!(f, "{n}"),
            AttrValue::Float(n) => write!(f, "{n}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Style property name to value.
pub type Style = BTreeMap<String, AttrValue>;

// =============================================================================
// Prop Value
// =============================================================================

/// One prop, tagged by how it is applied to the live element.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Attr(AttrValue),
    Style(Style),
    Event(Listener),
}

impl PropValue {
    fn kind(&self) -> &'static str {
        match self {
            PropValue::Attr(_) => "attr",
            PropValue::Style(_) => "style",
            PropValue::Event(_) => "event",
        }
    }
}

/// Event type registered by an `on*` prop name: `onClick` -> `click`.
pub fn event_type(name: &str) -> Option<String> {
    name.strip_prefix("on")
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.to_ascii_lowercase())
}

/// True for names that can only mean an event (`onClick`, `onMouseDown`).
fn is_camel_event_name(name: &str) -> bool {
    name.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

// =============================================================================
// Props
// =============================================================================

/// Validated property bag.
///
/// Entries are kept sorted by name so prop patches come out in a stable order.
///
/// ```ignore
/// let props = Props::new()
///     .attr("class", "row")
///     .style("color", "red")
///     .on("click", |_| println!("clicked"))
///     .key("row-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: BTreeMap<String, PropValue>,
    key: Option<Key>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a prop, checking the value against the reserved meaning of its name.
    ///
    /// `key` is routed to [`Props::get_key`] and never stored as an entry.
    pub fn try_insert(&mut self, name: impl Into<String>, value: PropValue) -> Result<(), PropError> {
        let name = name.into();

        if name == "key" {
            self.key = Some(match value {
                PropValue::Attr(AttrValue::Str(s)) => Key::Str(s),
                PropValue::Attr(AttrValue::Int(n)) => Key::Int(n),
                _ => return Err(PropError::InvalidKey),
            });
            return Ok(());
        }

        match &value {
            PropValue::Event(_) if event_type(&name).is_none() => {
                return Err(PropError::UnexpectedListener { name });
            }
            PropValue::Style(_) if name != "style" => {
                return Err(PropError::UnexpectedStyle { name });
            }
            PropValue::Attr(_) if name == "style" => return Err(PropError::ExpectedStyle),
            PropValue::Attr(_) if is_camel_event_name(&name) => {
                return Err(PropError::ExpectedListener { name });
            }
            _ => {}
        }

        self.entries.insert(name, value);
        Ok(())
    }

    /// Builder form of [`Props::try_insert`] for attributes.
    ///
    /// Values that do not fit the name are dropped with a warning.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let name = name.into();
        if let Err(err) = self.try_insert(name.clone(), PropValue::Attr(value.into())) {
            tracing::warn!(prop = %name, error = %err, "dropping attribute");
        }
        self
    }

    /// Set one style property, merging into any existing `style` map.
    pub fn style(mut self, property: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let entry = self
            .entries
            .entry("style".to_string())
            .or_insert_with(|| PropValue::Style(Style::new()));
        if let PropValue::Style(style) = entry {
            style.insert(property.into(), value.into());
        }
        self
    }

    /// Register a listener for `event` (stored under `on{event}`).
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.entries
            .insert(format!("on{event}"), PropValue::Event(Listener::new(handler)));
        self
    }

    /// Set the reconciliation key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Merge `other` into `self`; names present in `other` win.
    pub fn merge(&mut self, other: Props) {
        self.entries.extend(other.entries);
        if other.key.is_some() {
            self.key = other.key;
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn get_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Iterate entries in name order. `key` is not included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Attr(value) => write!(f, "{value}"),
            other => f.write_str(other.kind()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
