//! VNode - one declarative node of a render pass.

use super::props::Props;
use crate::types::{InstanceId, Key};

/// A child slot in a tree: an element or a text run.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(VNode),
    Text(String),
}

impl Node {
    /// Reconciliation key, if this is a keyed element.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Node::Element(vnode) => vnode.key.as_ref(),
            Node::Text(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&VNode> {
        match self {
            Node::Element(vnode) => Some(vnode),
            Node::Text(_) => None,
        }
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.as_element().and_then(|vnode| vnode.instance_id.as_ref())
    }
}

impl From<VNode> for Node {
    fn from(value: VNode) -> Self {
        Node::Element(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

/// Immutable description of one element.
///
/// A render pass builds a fresh tree every time; the previous tree is kept
/// only as the baseline for the next diff.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    pub tag: String,
    pub props: Props,
    pub children: Vec<Node>,
    pub key: Option<Key>,
    /// Set on the root of a tree committed by a mounted instance.
    pub instance_id: Option<InstanceId>,
}

impl VNode {
    /// An element with no props and no children.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            props: Props::default(),
            children: Vec::new(),
            key: None,
            instance_id: None,
        }
    }
}

// =============================================================================
// create
// =============================================================================

/// One argument to [`create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(Node),
    Props(Props),
}

impl From<Node> for Child {
    fn from(value: Node) -> Self {
        Child::Node(value)
    }
}

impl From<VNode> for Child {
    fn from(value: VNode) -> Self {
        Child::Node(Node::Element(value))
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Node(Node::Text(value.to_string()))
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Node(Node::Text(value))
    }
}

impl From<&String> for Child {
    fn from(value: &String) -> Self {
        Child::Node(Node::Text(value.clone()))
    }
}

impl From<Props> for Child {
    fn from(value: Props) -> Self {
        Child::Props(value)
    }
}

/// Build a [`VNode`].
///
/// Every [`Child::Props`] is merged left to right into one [`Props`] (later
/// names overwrite earlier ones); every node is appended to the children in
/// argument order. The node's key comes from the merged props.
///
/// The tag is not validated here; the platform rejects it on commit.
pub fn create(tag: impl Into<String>, children: impl IntoIterator<Item = Child>) -> VNode {
    let mut props = Props::default();
    let mut nodes = Vec::new();

    for child in children {
        match child {
            Child::Node(node) => nodes.push(node),
            Child::Props(p) => props.merge(p),
        }
    }

    let key = props.get_key().cloned();
    VNode {
        tag: tag.into(),
        props,
        children: nodes,
        key,
        instance_id: None,
    }
}

/// Variadic form of [`create`]: `h!("ul", props, h!("li", "one"), "text")`.
#[macro_export]
macro_rules! h {
    ($tag:expr $(, $child:expr)* $(,)?) => {{
        let children: ::std::vec::Vec<$crate::node::Child> =
            ::std::vec![$($crate::node::Child::from($child)),*];
        $crate::node::create($tag, children)
    }};
}
