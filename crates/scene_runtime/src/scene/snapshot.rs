//! Serializable view of the scene graph
//!
//! Roots, children and components are listed in insertion order, so the same
//! scene always produces the same document.

use serde::{Deserialize, Serialize};

use crate::foundation::collections::NodeId;
use crate::foundation::math::AffineTransform;
use crate::scene::Scene;

/// One node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Display name
    pub name: String,
    /// Local active flag
    pub active: bool,
    /// Local transform, if the node is spatial
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<AffineTransform>,
    /// Concrete component type names
    #[serde(default)]
    pub components: Vec<String>,
    /// Children in order
    #[serde(default)]
    pub children: Vec<NodeSnapshot>,
}

impl Scene {
    /// Depth-first snapshot of every root
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.roots.iter().filter_map(|root| self.snapshot_node(*root)).collect()
    }

    /// Depth-first snapshot of one subtree
    pub fn snapshot_node(&self, id: NodeId) -> Option<NodeSnapshot> {
        let node = self.nodes.get(id)?;
        Some(NodeSnapshot {
            name: node.name.clone(),
            active: node.active,
            transform: self.local_transform(id),
            components: self
                .component_type_names(id)
                .into_iter()
                .map(str::to_string)
                .collect(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.snapshot_node(*child))
                .collect(),
        })
    }
}
