//! Parent/child structure and activation
//!
//! Every node has exactly one owner: its parent's child list or the scene's
//! root list. Reparenting moves the handle from one list to the other.

use crate::foundation::collections::{ComponentId, NodeId};
use crate::foundation::math::AffineTransform;
use crate::scene::component::ComponentState;
use crate::scene::Scene;

impl Scene {
    /// Move `child` under `parent`, appending it to the child list.
    ///
    /// With `keep_world_transform` the child's world position, rotation and
    /// scale are preserved by rewriting its local transform under the new
    /// parent. Returns `false` without changing anything when either node is
    /// missing, when `child == parent`, when `child` is already a child of
    /// `parent`, or when `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, keep_world_transform: bool) -> bool {
        if parent == child || !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            log::debug!("add_child({:?}, {:?}) rejected: invalid nodes", parent, child);
            return false;
        }
        if self.nodes[child].parent == Some(parent) {
            return false;
        }
        if self.is_ancestor_of(child, parent) {
            log::debug!("add_child({:?}, {:?}) rejected: would create a cycle", parent, child);
            return false;
        }
        self.relink(child, Some(parent), keep_world_transform);
        true
    }

    /// Detach `child` from `parent` and make it a root.
    ///
    /// Returns `false` if `child` is not currently a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId, keep_world_transform: bool) -> bool {
        if self.parent(child) != Some(parent) {
            log::debug!("remove_child({:?}, {:?}) ignored: not a child", parent, child);
            return false;
        }
        self.relink(child, None, keep_world_transform);
        true
    }

    /// Reparent `child` under `parent`, or make it a root with `None`
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>, keep_world_transform: bool) -> bool {
        match (parent, self.parent(child)) {
            (Some(parent), _) => self.add_child(parent, child, keep_world_transform),
            (None, Some(current)) => self.remove_child(current, child, keep_world_transform),
            (None, None) => false,
        }
    }

    /// Whether `ancestor` appears on the parent chain of `node` (or is `node`)
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    fn relink(&mut self, child: NodeId, parent: Option<NodeId>, keep_world_transform: bool) {
        let was_active = self.is_active_in_hierarchy(child);
        let world = if keep_world_transform {
            self.global_transform(child)
        } else {
            None
        };

        self.unlink(child);
        match parent {
            Some(parent) => self.nodes[parent].children.push(child),
            None => self.roots.push(child),
        }
        self.nodes[child].parent = parent;

        self.invalidate_active_subtree(child);
        self.on_hierarchy_changed(child);
        if let Some(world) = world {
            self.restore_world(child, &world);
        }

        let is_active = self.is_active_in_hierarchy(child);
        if was_active != is_active {
            self.notify_activation(child, is_active);
        }
    }

    fn restore_world(&mut self, id: NodeId, world: &AffineTransform) {
        self.set_global_position(id, world.position);
        self.set_global_rotation(id, world.rotation);
        self.set_global_scale(id, world.scale);
    }

    /// Remove `id` from whichever list currently owns it
    pub(crate) fn unlink(&mut self, id: NodeId) {
        match self.nodes.get(id).and_then(|node| node.parent) {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = None;
        }
    }

    /// Set the node's local active flag.
    ///
    /// Every component whose effective state flips as a result receives
    /// `on_enable` or `on_disable`. Returns `false` for a missing node.
    pub fn set_active(&mut self, id: NodeId, active: bool) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if node.active == active {
            return true;
        }

        let was_active = self.is_active_in_hierarchy(id);
        self.nodes[id].active = active;
        self.invalidate_active_subtree(id);

        let is_active = self.is_active_in_hierarchy(id);
        if was_active != is_active {
            self.notify_activation(id, is_active);
        }
        true
    }

    /// Local active flag; `false` for a missing node
    pub fn is_active_self(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.active)
    }

    /// Whether the node and all of its ancestors are active.
    ///
    /// Cached per node and recomputed lazily after any change above it.
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut chain = Vec::new();
        let mut inherited = true;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            if let Some(cached) = node.active_in_hierarchy.get() {
                inherited = cached;
                break;
            }
            chain.push(current);
            cursor = node.parent;
        }

        if !self.nodes.contains_key(id) {
            return false;
        }
        for current in chain.iter().rev() {
            let node = &self.nodes[*current];
            inherited = inherited && node.active;
            node.active_in_hierarchy.set(Some(inherited));
        }
        inherited
    }

    pub(crate) fn invalidate_active_subtree(&self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                node.invalidate_active_cache();
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Fire `on_enable`/`on_disable` for the subtree rooted at `root` whose
    /// effective state just became `active`.
    ///
    /// Subtrees under a locally inactive child were inactive before and after,
    /// so they are skipped.
    fn notify_activation(&mut self, root: NodeId, active: bool) {
        let mut targets: Vec<ComponentId> = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if id != root && !node.active {
                continue;
            }
            targets.extend(node.components.iter().copied().filter(|cid| {
                self.components
                    .get(*cid)
                    .is_some_and(|slot| slot.state == ComponentState::Live && slot.enabled)
            }));
            stack.extend(node.children.iter().rev().copied());
        }

        log::trace!(
            "{} {} component(s) under {:?}",
            if active { "enabling" } else { "disabling" },
            targets.len(),
            root
        );
        for cid in targets {
            if active {
                self.invoke(cid, 0.0, |component, ctx| component.on_enable(ctx));
            } else {
                self.invoke(cid, 0.0, |component, ctx| component.on_disable(ctx));
            }
        }
    }

    /// Pre-order walk of the subtree rooted at `root`, children in order
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                order.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }
}
