//! Lazy hierarchical transforms
//!
//! Writes fan out downward as dirty flags; reads recompute lazily up the
//! parent chain. Between two dirtying events each node recomputes its global
//! transform at most once, no matter how often it is read.
//!
//! The spatial parent of a node is its nearest ancestor that has a
//! [`SpatialCache`]. Nodes without one act as identity in the chain.

use std::cell::Cell;

use crate::foundation::collections::NodeId;
use crate::foundation::math::{AffineTransform, Quat, Vec3};
use crate::scene::Scene;

/// Per-node local transform plus a lazily recomputed global transform
#[derive(Debug)]
pub struct SpatialCache {
    local: AffineTransform,
    global: Cell<AffineTransform>,
    dirty: Cell<bool>,
    version: u64,
    cached_version: Cell<u64>,
    recomputes: Cell<u64>,
}

impl SpatialCache {
    /// Create a cache that will compute its global transform on first read
    pub fn new(local: AffineTransform) -> Self {
        Self {
            local,
            global: Cell::new(local),
            dirty: Cell::new(true),
            version: 1,
            cached_version: Cell::new(0),
            recomputes: Cell::new(0),
        }
    }

    /// Local transform relative to the spatial parent
    pub fn local(&self) -> &AffineTransform {
        &self.local
    }

    /// Whether the cached global transform is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Incremented every time this cache is dirtied
    pub fn hierarchy_version(&self) -> u64 {
        self.version
    }

    /// Value of [`hierarchy_version`](Self::hierarchy_version) at the last recompute
    pub fn cached_version(&self) -> u64 {
        self.cached_version.get()
    }

    /// Number of times the global transform has been recomputed
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.get()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty.set(true);
        self.version += 1;
    }

    fn store_global(&self, global: AffineTransform) {
        self.global.set(global);
        self.dirty.set(false);
        self.cached_version.set(self.version);
        self.recomputes.set(self.recomputes.get() + 1);
    }

    fn cached_global(&self) -> Option<AffineTransform> {
        (!self.dirty.get()).then(|| self.global.get())
    }
}

impl Scene {
    /// Give a node spatial behaviour with the given local transform.
    ///
    /// Returns `false` if the node is missing or already spatial.
    pub fn add_spatial(&mut self, id: NodeId, local: AffineTransform) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.spatial.is_some() {
            return false;
        }
        node.spatial = Some(SpatialCache::new(local));
        // Descendants may have just gained a new spatial parent.
        self.dirty_subtree(id);
        true
    }

    /// Drop a node's spatial cache, returning its last local transform
    pub fn remove_spatial(&mut self, id: NodeId) -> Option<AffineTransform> {
        let cache = self.nodes.get_mut(id)?.spatial.take()?;
        self.dirty_subtree(id);
        Some(cache.local)
    }

    /// Whether the node exists and has a spatial cache
    pub fn has_spatial(&self, id: NodeId) -> bool {
        self.spatial(id).is_some()
    }

    /// Borrow a node's spatial cache
    pub fn spatial(&self, id: NodeId) -> Option<&SpatialCache> {
        self.nodes.get(id)?.spatial.as_ref()
    }

    /// Local transform of a spatial node
    pub fn local_transform(&self, id: NodeId) -> Option<AffineTransform> {
        self.spatial(id).map(|cache| cache.local)
    }

    /// Set the local position. Returns whether anything changed.
    pub fn set_local_position(&mut self, id: NodeId, position: Vec3) -> bool {
        self.write_local(id, |local| {
            let changed = local.position != position;
            local.position = position;
            changed
        })
    }

    /// Set the local rotation. Returns whether anything changed.
    pub fn set_local_rotation(&mut self, id: NodeId, rotation: Quat) -> bool {
        self.write_local(id, |local| {
            let changed = local.rotation != rotation;
            local.rotation = rotation;
            changed
        })
    }

    /// Set the local scale. Returns whether anything changed.
    pub fn set_local_scale(&mut self, id: NodeId, scale: Vec3) -> bool {
        self.write_local(id, |local| {
            let changed = local.scale != scale;
            local.scale = scale;
            changed
        })
    }

    /// Replace the whole local transform. Returns whether anything changed.
    pub fn set_local_transform(&mut self, id: NodeId, transform: AffineTransform) -> bool {
        self.write_local(id, |local| {
            let changed = *local != transform;
            *local = transform;
            changed
        })
    }

    fn write_local(&mut self, id: NodeId, write: impl FnOnce(&mut AffineTransform) -> bool) -> bool {
        let Some(cache) = self.nodes.get_mut(id).and_then(|node| node.spatial.as_mut()) else {
            log::trace!("ignoring transform write on non-spatial node {:?}", id);
            return false;
        };
        if !write(&mut cache.local) {
            return false;
        }
        self.dirty_subtree(id);
        true
    }

    /// World-space transform of a spatial node, recomputing it if stale.
    ///
    /// `None` if the node is missing or has no spatial cache.
    pub fn global_transform(&self, id: NodeId) -> Option<AffineTransform> {
        let cache = self.spatial(id)?;
        if let Some(global) = cache.cached_global() {
            return Some(global);
        }

        // Walk up until a clean spatial ancestor (or the top) and resolve back down.
        let mut chain = vec![id];
        let mut base = AffineTransform::identity();
        let mut cursor = self.spatial_parent(id);
        while let Some(parent) = cursor {
            let Some(parent_cache) = self.spatial(parent) else {
                break;
            };
            if let Some(global) = parent_cache.cached_global() {
                base = global;
                break;
            }
            chain.push(parent);
            cursor = self.spatial_parent(parent);
        }

        for node in chain.iter().rev() {
            if let Some(cache) = self.spatial(*node) {
                let global = AffineTransform::combine(&base, &cache.local);
                cache.store_global(global);
                base = global;
            }
        }
        Some(base)
    }

    /// Global transform of the node's spatial parent, identity at the top
    pub fn parent_global_transform(&self, id: NodeId) -> AffineTransform {
        self.spatial_parent(id)
            .and_then(|parent| self.global_transform(parent))
            .unwrap_or_default()
    }

    /// Move a spatial node so its world position becomes `position`
    pub fn set_global_position(&mut self, id: NodeId, position: Vec3) -> bool {
        let local = self.parent_global_transform(id).inverse_transform_point(position);
        self.set_local_position(id, local)
    }

    /// Rotate a spatial node so its world rotation becomes `rotation`
    pub fn set_global_rotation(&mut self, id: NodeId, rotation: Quat) -> bool {
        let local = self.parent_global_transform(id).inverse_transform_rotation(rotation);
        self.set_local_rotation(id, local)
    }

    /// Scale a spatial node so its world scale becomes `scale`
    pub fn set_global_scale(&mut self, id: NodeId, scale: Vec3) -> bool {
        let local = self.parent_global_transform(id).inverse_transform_scale(scale);
        self.set_local_scale(id, local)
    }

    /// Force the node's cache (and every cache below it) dirty because its
    /// ancestor chain changed, even though no local value did
    pub fn on_hierarchy_changed(&mut self, id: NodeId) {
        self.dirty_subtree(id);
    }

    /// Resolve every stale global transform in the scene
    pub fn resolve_transforms(&self) -> usize {
        let mut resolved = 0;
        for (id, node) in &self.nodes {
            if node.spatial.as_ref().is_some_and(SpatialCache::is_dirty) {
                self.global_transform(id);
                resolved += 1;
            }
        }
        resolved
    }

    /// Nearest ancestor with a spatial cache
    pub(crate) fn spatial_parent(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = self.nodes.get(id)?.parent;
        while let Some(parent) = cursor {
            let node = self.nodes.get(parent)?;
            if node.spatial.is_some() {
                return Some(parent);
            }
            cursor = node.parent;
        }
        None
    }

    /// Dirty `root` and every spatial cache below it.
    ///
    /// A dirty cache always has a fully dirty subtree, so the walk stops at
    /// descendants that are already dirty.
    pub(crate) fn dirty_subtree(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if let Some(cache) = node.spatial.as_mut() {
                if id != root && cache.is_dirty() {
                    continue;
                }
                cache.mark_dirty();
            }
            stack.extend(node.children.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn spatial_node(scene: &mut Scene, name: &str, position: Vec3) -> NodeId {
        let id = scene.create_node(name);
        scene.add_spatial(id, AffineTransform::from_position(position));
        id
    }

    #[test]
    fn test_root_global_equals_local() {
        let mut scene = Scene::new("spatial");
        let root = spatial_node(&mut scene, "root", Vec3::new(1.0, 2.0, 3.0));

        let global = scene.global_transform(root).unwrap();
        assert_relative_eq!(global.position, Vec3::new(1.0, 2.0, 3.0), epsilon = EPSILON);
    }

    #[test]
    fn test_child_composes_with_parent() {
        let mut scene = Scene::new("spatial");
        let root = spatial_node(&mut scene, "root", Vec3::new(5.0, 0.0, 0.0));
        let child = spatial_node(&mut scene, "child", Vec3::new(1.0, 0.0, 0.0));
        scene.add_child(root, child, false);

        let global = scene.global_transform(child).unwrap();
        assert_relative_eq!(global.position, Vec3::new(6.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_reads_do_not_recompute_twice() {
        let mut scene = Scene::new("spatial");
        let root = spatial_node(&mut scene, "root", Vec3::zeros());
        let child = spatial_node(&mut scene, "child", Vec3::new(0.0, 1.0, 0.0));
        scene.add_child(root, child, false);

        scene.global_transform(child);
        scene.global_transform(child);
        scene.global_transform(root);

        assert_eq!(scene.spatial(child).unwrap().recompute_count(), 1);
        assert_eq!(scene.spatial(root).unwrap().recompute_count(), 1);
    }

    #[test]
    fn test_parent_write_dirties_every_descendant() {
        let mut scene = Scene::new("spatial");
        let a = spatial_node(&mut scene, "a", Vec3::zeros());
        let b = spatial_node(&mut scene, "b", Vec3::new(1.0, 0.0, 0.0));
        let c = spatial_node(&mut scene, "c", Vec3::new(1.0, 0.0, 0.0));
        scene.add_child(a, b, false);
        scene.add_child(b, c, false);
        scene.resolve_transforms();
        let before = scene.spatial(c).unwrap().recompute_count();

        assert!(scene.set_local_position(a, Vec3::new(10.0, 0.0, 0.0)));
        assert!(scene.spatial(b).unwrap().is_dirty());
        assert!(scene.spatial(c).unwrap().is_dirty());

        let global = scene.global_transform(c).unwrap();
        assert_relative_eq!(global.position, Vec3::new(12.0, 0.0, 0.0), epsilon = EPSILON);
        assert_eq!(scene.spatial(c).unwrap().recompute_count(), before + 1);
    }

    #[test]
    fn test_unchanged_write_keeps_cache_clean() {
        let mut scene = Scene::new("spatial");
        let a = spatial_node(&mut scene, "a", Vec3::new(1.0, 0.0, 0.0));
        scene.global_transform(a);
        let version = scene.spatial(a).unwrap().hierarchy_version();

        assert!(!scene.set_local_position(a, Vec3::new(1.0, 0.0, 0.0)));
        assert!(!scene.spatial(a).unwrap().is_dirty());
        assert_eq!(scene.spatial(a).unwrap().hierarchy_version(), version);
    }

    #[test]
    fn test_child_write_does_not_dirty_parent() {
        let mut scene = Scene::new("spatial");
        let a = spatial_node(&mut scene, "a", Vec3::zeros());
        let b = spatial_node(&mut scene, "b", Vec3::zeros());
        scene.add_child(a, b, false);
        scene.resolve_transforms();

        scene.set_local_position(b, Vec3::new(0.0, 3.0, 0.0));
        assert!(!scene.spatial(a).unwrap().is_dirty());
        assert!(scene.spatial(b).unwrap().is_dirty());
    }

    #[test]
    fn test_recompute_syncs_cached_version() {
        let mut scene = Scene::new("spatial");
        let a = spatial_node(&mut scene, "a", Vec3::zeros());
        scene.set_local_position(a, Vec3::new(0.0, 0.0, 1.0));
        let cache = scene.spatial(a).unwrap();
        assert_ne!(cache.cached_version(), cache.hierarchy_version());

        scene.global_transform(a);
        let cache = scene.spatial(a).unwrap();
        assert_eq!(cache.cached_version(), cache.hierarchy_version());
    }

    #[test]
    fn test_non_spatial_ancestor_acts_as_identity() {
        let mut scene = Scene::new("spatial");
        let top = spatial_node(&mut scene, "top", Vec3::new(2.0, 0.0, 0.0));
        let group = scene.create_node("group");
        let leaf = spatial_node(&mut scene, "leaf", Vec3::new(0.0, 1.0, 0.0));
        scene.add_child(top, group, false);
        scene.add_child(group, leaf, false);

        assert_eq!(scene.spatial_parent(leaf), Some(top));
        let global = scene.global_transform(leaf).unwrap();
        assert_relative_eq!(global.position, Vec3::new(2.0, 1.0, 0.0), epsilon = EPSILON);

        scene.set_local_position(top, Vec3::new(4.0, 0.0, 0.0));
        let global = scene.global_transform(leaf).unwrap();
        assert_relative_eq!(global.position, Vec3::new(4.0, 1.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_set_global_position_under_rotated_scaled_parent() {
        let mut scene = Scene::new("spatial");
        let parent = scene.create_node("parent");
        scene.add_spatial(
            parent,
            AffineTransform::new(
                Vec3::new(1.0, 2.0, 3.0),
                Quat::from_axis_angle(&Vec3::z_axis(), HALF_PI),
                Vec3::new(2.0, 2.0, 2.0),
            ),
        );
        let child = spatial_node(&mut scene, "child", Vec3::zeros());
        scene.add_child(parent, child, false);

        let target = Vec3::new(-4.0, 0.5, 9.0);
        scene.set_global_position(child, target);

        let global = scene.global_transform(child).unwrap();
        assert_relative_eq!(global.position, target, epsilon = 1e-4);
    }

    #[test]
    fn test_set_global_rotation_and_scale() {
        let mut scene = Scene::new("spatial");
        let parent = scene.create_node("parent");
        scene.add_spatial(
            parent,
            AffineTransform::new(
                Vec3::zeros(),
                Quat::from_axis_angle(&Vec3::y_axis(), 0.4),
                Vec3::new(2.0, 4.0, 1.0),
            ),
        );
        let child = spatial_node(&mut scene, "child", Vec3::zeros());
        scene.add_child(parent, child, false);

        let rotation = Quat::from_axis_angle(&Vec3::x_axis(), 1.1);
        scene.set_global_rotation(child, rotation);
        scene.set_global_scale(child, Vec3::new(1.0, 1.0, 1.0));

        let global = scene.global_transform(child).unwrap();
        assert_relative_eq!(global.rotation, rotation, epsilon = EPSILON);
        assert_relative_eq!(global.scale, Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(
            scene.local_transform(child).unwrap().scale,
            Vec3::new(0.5, 0.25, 1.0),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_hierarchy_change_forces_dirty() {
        let mut scene = Scene::new("spatial");
        let a = spatial_node(&mut scene, "a", Vec3::zeros());
        scene.global_transform(a);
        let version = scene.spatial(a).unwrap().hierarchy_version();

        scene.on_hierarchy_changed(a);

        assert!(scene.spatial(a).unwrap().is_dirty());
        assert!(scene.spatial(a).unwrap().hierarchy_version() > version);
    }

    #[test]
    fn test_adding_spatial_mid_chain_dirties_below() {
        let mut scene = Scene::new("spatial");
        let group = scene.create_node("group");
        let leaf = spatial_node(&mut scene, "leaf", Vec3::new(1.0, 0.0, 0.0));
        scene.add_child(group, leaf, false);
        scene.resolve_transforms();

        scene.add_spatial(group, AffineTransform::from_position(Vec3::new(0.0, 0.0, 5.0)));

        let global = scene.global_transform(leaf).unwrap();
        assert_relative_eq!(global.position, Vec3::new(1.0, 0.0, 5.0), epsilon = EPSILON);

        scene.remove_spatial(group);
        let global = scene.global_transform(leaf).unwrap();
        assert_relative_eq!(global.position, Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_transform_writes_on_plain_node_are_ignored() {
        let mut scene = Scene::new("spatial");
        let plain = scene.create_node("plain");

        assert!(!scene.set_local_position(plain, Vec3::new(1.0, 0.0, 0.0)));
        assert!(scene.global_transform(plain).is_none());
        assert_eq!(scene.resolve_transforms(), 0);
    }
}
