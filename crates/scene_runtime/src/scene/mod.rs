//! Scene graph runtime
//!
//! A [`Scene`] owns a forest of [`Node`]s in a generational arena, the
//! components attached to them and the coroutines they run. Everything is
//! addressed by handle; see [`crate::foundation::collections`].

pub mod backend;
pub mod component;
mod graph;
mod hierarchy;
mod lifecycle;
pub mod node;
pub mod snapshot;
pub mod spatial;
pub mod stats;

#[cfg(test)]
mod tests;

pub use backend::{BodyPose, PhysicsBackend, RenderBackend};
pub use component::{Component, ComponentContext, ComponentFlags, ComponentInfo, ComponentState};
pub use graph::Scene;
pub use node::Node;
pub use snapshot::NodeSnapshot;
pub use spatial::SpatialCache;
pub use stats::SceneStats;

use thiserror::Error;

use crate::foundation::collections::NodeId;

/// Errors returned by scene operations that can fail loudly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The node handle is stale or belongs to another scene
    #[error("Node {0:?} not found")]
    NodeNotFound(NodeId),

    /// The node already holds a component of this type
    #[error("Node {node:?} already has a component of type {type_name}")]
    DuplicateComponent {
        /// Target node
        node: NodeId,
        /// Concrete component type
        type_name: &'static str,
    },
}
