//! Narrow interfaces to the renderer and the physics engine
//!
//! The scene never renders or simulates anything itself. It hands fully
//! resolved world matrices to a [`RenderBackend`] and accepts authoritative
//! poses from a [`PhysicsBackend`], which it writes back through the
//! world-space setters.

use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Quat, Vec3};
use crate::scene::component::{ComponentFlags, ComponentState};
use crate::scene::Scene;

/// Consumer of per-frame world matrices
pub trait RenderBackend {
    /// Called once before the first submission of a frame
    fn begin_frame(&mut self) {}

    /// Receive one visible node's world matrix
    fn submit(&mut self, node: NodeId, world: &Mat4);

    /// Called once after the last submission of a frame
    fn end_frame(&mut self) {}
}

/// World-space pose reported by the physics engine for one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    /// Node driven by the body
    pub node: NodeId,
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: Quat,
}

/// Source of authoritative body poses
pub trait PhysicsBackend {
    /// Advance the simulation by `fixed_dt` seconds and report the bodies that moved.
    ///
    /// The scene is read-only here; poses are applied after the step returns.
    fn step(&mut self, scene: &Scene, fixed_dt: f32) -> Vec<BodyPose>;
}

impl Scene {
    /// Write physics results back into the graph through the world-space setters
    pub fn apply_body_poses(&mut self, poses: &[BodyPose]) -> usize {
        let mut applied = 0;
        for pose in poses {
            if !self.has_spatial(pose.node) {
                log::debug!("dropping body pose for non-spatial node {:?}", pose.node);
                continue;
            }
            self.set_global_position(pose.node, pose.position);
            self.set_global_rotation(pose.node, pose.rotation);
            applied += 1;
        }
        applied
    }

    /// Resolve every transform, then submit each visible renderable node.
    ///
    /// A node is submitted when it is active in hierarchy, has a spatial cache
    /// and carries an enabled, attached component flagged
    /// [`ComponentFlags::RENDERABLE`]. Returns the number of submissions.
    pub fn render(&self, backend: &mut dyn RenderBackend) -> usize {
        self.resolve_transforms();

        backend.begin_frame();
        let mut submitted = 0;
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.active {
                continue;
            }
            if self.is_renderable(id) {
                if let Some(global) = self.global_transform(id) {
                    backend.submit(id, &global.to_matrix());
                    submitted += 1;
                }
            }
            stack.extend(node.children.iter().rev().copied());
        }
        backend.end_frame();
        submitted
    }

    fn is_renderable(&self, id: NodeId) -> bool {
        self.nodes[id].components.iter().any(|cid| {
            self.components.get(*cid).is_some_and(|slot| {
                slot.enabled
                    && slot.state == ComponentState::Live
                    && slot.flags.contains(ComponentFlags::RENDERABLE)
            })
        })
    }
}
