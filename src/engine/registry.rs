//! Instance Registry - one live instance per mount container.
//!
//! Maps container handles to the [`Instance`] mounted there:
//! - render function identity ([`Component`])
//! - last committed tree and its live root
//! - update callback and render gate
//! - instance id generation

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::RenderError;
use crate::node::{Node, VNode};
use crate::pipeline::scheduler::RenderGate;
use crate::state::{RenderContext, Subscriber};
use crate::types::{InstanceId, NodeId};

// =============================================================================
// Component
// =============================================================================

/// Signature of a render function.
pub type RenderFn = dyn Fn(&mut RenderContext<'_>) -> Result<VNode, RenderError>;

/// A render function with a stable identity.
///
/// Two components are the same when they are clones of one another; two
/// separately constructed components never are, even from the same closure.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new(render: impl Fn(&mut RenderContext<'_>) -> Result<VNode, RenderError> + 'static) -> Self {
        Self::named("anonymous", render)
    }

    /// Component with a name for log output.
    pub fn named(
        name: &str,
        render: impl Fn(&mut RenderContext<'_>) -> Result<VNode, RenderError> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, cx: &mut RenderContext<'_>) -> Result<VNode, RenderError> {
        (self.render)(cx)
    }

    /// Identity comparison.
    pub fn same(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish_non_exhaustive()
    }
}

// =============================================================================
// Instance
// =============================================================================

/// Live identity of one mounted component.
#[derive(Debug)]
pub struct Instance {
    pub id: InstanceId,
    pub component: Component,
    pub container: NodeId,
    /// Tree of the last successful commit.
    pub last_tree: Option<Node>,
    /// Live node the last commit left in the container.
    pub live_root: Option<NodeId>,
    pub update: Subscriber,
    pub gate: RenderGate,
    pub commits: u64,
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<NodeId, Instance>,
    id_counter: u64,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh instance id.
    pub fn next_id(&mut self) -> InstanceId {
        let id = InstanceId::new(format!("i{}", self.id_counter));
        self.id_counter += 1;
        id
    }

    /// Register `instance` at its container, returning the one it displaces.
    pub fn insert(&mut self, instance: Instance) -> Option<Instance> {
        self.instances.insert(instance.container, instance)
    }

    pub fn remove(&mut self, container: NodeId) -> Option<Instance> {
        self.instances.remove(&container)
    }

    pub fn get(&self, container: NodeId) -> Option<&Instance> {
        self.instances.get(&container)
    }

    pub fn get_mut(&mut self, container: NodeId) -> Option<&mut Instance> {
        self.instances.get_mut(&container)
    }

    /// The instance at `container`, if its id is `id`.
    pub fn get_live(&mut self, container: NodeId, id: &InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&container).filter(|instance| &instance.id == id)
    }

    /// Container hosting the instance `id`.
    pub fn find(&self, id: &InstanceId) -> Option<NodeId> {
        self.instances
            .values()
            .find(|instance| &instance.id == id)
            .map(|instance| instance.container)
    }

    pub fn containers(&self) -> Vec<NodeId> {
        let mut containers: Vec<NodeId> = self.instances.keys().copied().collect();
        containers.sort();
        containers
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(registry: &mut InstanceRegistry, container: NodeId, component: &Component) -> Instance {
        let id = registry.next_id();
        Instance {
            update: Subscriber::new(id.clone(), || {}),
            id,
            component: component.clone(),
            container,
            last_tree: None,
            live_root: None,
            gate: RenderGate::new(),
            commits: 0,
        }
    }

    #[test]
    fn test_component_identity() {
        let a = Component::new(|_| Ok(VNode::element("div")));
        let b = Component::new(|_| Ok(VNode::element("div")));
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(Component::named("Counter", |_| Ok(VNode::element("p"))).name(), "Counter");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = InstanceRegistry::new();
        assert_eq!(registry.next_id().as_str(), "i0");
        assert_eq!(registry.next_id().as_str(), "i1");
    }

    #[test]
    fn test_one_instance_per_container() {
        let mut registry = InstanceRegistry::new();
        let component = Component::new(|_| Ok(VNode::element("div")));

        let first = instance(&mut registry, NodeId(1), &component);
        let first_id = first.id.clone();
        assert!(registry.insert(first).is_none());

        let second = instance(&mut registry, NodeId(1), &component);
        let second_id = second.id.clone();
        let displaced = registry.insert(second);
        assert_eq!(displaced.map(|i| i.id), Some(first_id.clone()));

        assert_eq!(registry.len(), 1);
        assert!(registry.get_live(NodeId(1), &first_id).is_none());
        assert!(registry.get_live(NodeId(1), &second_id).is_some());
        assert_eq!(registry.find(&second_id), Some(NodeId(1)));

        let other = instance(&mut registry, NodeId(4), &component);
        registry.insert(other);
        assert_eq!(registry.containers(), vec![NodeId(1), NodeId(4)]);

        assert!(registry.remove(NodeId(1)).is_some());
        assert!(registry.get(NodeId(1)).is_none());
    }
}
