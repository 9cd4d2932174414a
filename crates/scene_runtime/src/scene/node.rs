//! Scene graph node
//!
//! A node is a vertex in the scene's object graph: a name, an active flag,
//! an ordered list of children, an optional spatial cache and an ordered list
//! of components. Nodes live in the scene's arena and refer to each other by
//! [`NodeId`]. The child list is the only ownership edge; the parent link is a
//! validated handle, so a node can never own its own ancestor.

use std::cell::Cell;

use crate::foundation::collections::{ComponentId, NodeId};
use crate::scene::spatial::SpatialCache;

/// A vertex in the scene graph
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) active: bool,
    pub(crate) destroy_pending: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) spatial: Option<SpatialCache>,
    pub(crate) components: Vec<ComponentId>,
    /// `None` when an ancestor (or this node) changed since the last read
    pub(crate) active_in_hierarchy: Cell<Option<bool>>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            destroy_pending: false,
            parent: None,
            children: Vec::new(),
            spatial: None,
            components: Vec::new(),
            active_in_hierarchy: Cell::new(None),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local active flag, ignoring ancestors
    pub fn is_active_self(&self) -> bool {
        self.active
    }

    /// Whether the node is queued for destruction.
    ///
    /// Set by [`Scene::destroy`](crate::scene::Scene::destroy) on the node
    /// itself. Descendants are marked once
    /// [`Scene::process_destroyed`](crate::scene::Scene::process_destroyed)
    /// expands the subtree.
    pub fn is_destroy_pending(&self) -> bool {
        self.destroy_pending
    }

    /// Parent node, `None` for roots
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Component handles in insertion order
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.components
    }

    /// Spatial cache, if this node opted into spatial behaviour
    pub fn spatial(&self) -> Option<&SpatialCache> {
        self.spatial.as_ref()
    }

    pub(crate) fn invalidate_active_cache(&self) {
        self.active_in_hierarchy.set(None);
    }
}
