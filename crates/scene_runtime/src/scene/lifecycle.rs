//! Component lifecycle: attach, per-frame phases and destruction
//!
//! A component moves through `Queued -> Live -> Destroyed` and is then
//! purged together with its storage. Node destruction is deferred: `destroy`
//! only marks and queues, and `process_destroyed` runs every `on_destroy`
//! handler of the marked set before it unlinks or frees anything.

use std::any::TypeId;
use std::collections::HashSet;

use crate::foundation::collections::{ComponentId, NodeId};
use crate::scene::component::{
    Callback, Component, ComponentContext, ComponentFlags, ComponentInfo, ComponentSlot,
    ComponentState,
};
use crate::scene::{Scene, SceneError};

impl Scene {
    /// Attach a component to a node.
    ///
    /// The component is queued and stays inert until the next
    /// [`process_attach_queue`](Self::process_attach_queue). A node holds at
    /// most one component of each concrete type.
    pub fn add_component<T: Component>(&mut self, node: NodeId, component: T) -> Result<ComponentId, SceneError> {
        if !self.nodes.contains_key(node) {
            return Err(SceneError::NodeNotFound(node));
        }
        if self.component_id::<T>(node).is_some() {
            let type_name = std::any::type_name::<T>();
            log::warn!("{:?} already has a {} component", node, type_name);
            return Err(SceneError::DuplicateComponent { node, type_name });
        }

        let id = self.components.insert(ComponentSlot::new(node, component));
        self.nodes[node].components.push(id);
        self.attach_queue.push_back(id);
        log::trace!("queued {} on {:?}", self.components[id].type_name, node);
        Ok(id)
    }

    /// Handle of the node's component of type `T`
    pub fn component_id<T: Component>(&self, node: NodeId) -> Option<ComponentId> {
        let type_id = TypeId::of::<T>();
        self.nodes
            .get(node)?
            .components
            .iter()
            .copied()
            .find(|id| self.components.get(*id).is_some_and(|slot| slot.type_id == type_id))
    }

    /// Borrow the node's component of type `T`.
    ///
    /// `None` while that component's own callback is running.
    pub fn get_component<T: Component>(&self, node: NodeId) -> Option<&T> {
        let id = self.component_id::<T>(node)?;
        self.components.get(id)?.downcast_ref::<T>()
    }

    /// Mutably borrow the node's component of type `T`
    pub fn get_component_mut<T: Component>(&mut self, node: NodeId) -> Option<&mut T> {
        let id = self.component_id::<T>(node)?;
        self.components.get_mut(id)?.downcast_mut::<T>()
    }

    /// Whether the node has a component of type `T`
    pub fn has_component<T: Component>(&self, node: NodeId) -> bool {
        self.component_id::<T>(node).is_some()
    }

    /// Node a component belongs to
    pub fn component_node(&self, id: ComponentId) -> Option<NodeId> {
        self.components.get(id).map(|slot| slot.node)
    }

    /// Lifecycle state of a component; `None` once purged
    pub fn component_state(&self, id: ComponentId) -> Option<ComponentState> {
        self.components.get(id).map(|slot| slot.state)
    }

    /// All components of a node in insertion order
    pub fn components(&self, node: NodeId) -> Vec<ComponentInfo> {
        self.nodes.get(node).map_or_else(Vec::new, |n| {
            n.components
                .iter()
                .filter_map(|id| self.components.get(*id).map(|slot| slot.info(*id)))
                .collect()
        })
    }

    /// Concrete type names of a node's components in insertion order
    pub fn component_type_names(&self, node: NodeId) -> Vec<&'static str> {
        self.components(node).into_iter().map(|info| info.type_name).collect()
    }

    /// Remove the node's component of type `T`, calling its `on_destroy` if it
    /// was attached
    pub fn remove_component<T: Component>(&mut self, node: NodeId) -> bool {
        match self.component_id::<T>(node) {
            Some(id) => self.remove_component_by_id(id),
            None => {
                log::debug!("{:?} has no {} to remove", node, std::any::type_name::<T>());
                false
            }
        }
    }

    /// Remove a component by handle.
    ///
    /// A component may remove itself from inside one of its callbacks; the
    /// removal then completes as soon as that callback returns.
    pub fn remove_component_by_id(&mut self, id: ComponentId) -> bool {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        if slot.instance.is_none() {
            slot.remove_requested = true;
            return true;
        }
        if slot.state == ComponentState::Live {
            slot.state = ComponentState::Destroyed;
            self.invoke(id, 0.0, |component, ctx| component.on_destroy(ctx));
        }

        if let Some(slot) = self.components.remove(id) {
            if let Some(node) = self.nodes.get_mut(slot.node) {
                node.components.retain(|c| *c != id);
            }
        }
        true
    }

    /// Enable or disable the node's component of type `T`
    pub fn set_component_enabled<T: Component>(&mut self, node: NodeId, enabled: bool) -> bool {
        self.component_id::<T>(node)
            .is_some_and(|id| self.set_component_enabled_by_id(id, enabled))
    }

    /// Enable or disable a component by handle.
    ///
    /// A live component on an active node receives `on_enable`/`on_disable`
    /// when the flag actually changes.
    pub fn set_component_enabled_by_id(&mut self, id: ComponentId, enabled: bool) -> bool {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        if slot.enabled == enabled {
            return true;
        }
        slot.enabled = enabled;
        let (node, state) = (slot.node, slot.state);

        if state == ComponentState::Live && self.is_active_in_hierarchy(node) {
            if enabled {
                self.invoke(id, 0.0, |component, ctx| component.on_enable(ctx));
            } else {
                self.invoke(id, 0.0, |component, ctx| component.on_disable(ctx));
            }
        }
        true
    }

    /// Whether the node's component of type `T` is enabled
    pub fn is_component_enabled<T: Component>(&self, node: NodeId) -> bool {
        self.component_id::<T>(node)
            .and_then(|id| self.components.get(id))
            .is_some_and(|slot| slot.enabled)
    }

    /// Run one callback on one component.
    ///
    /// The instance is taken out of its slot for the duration of the call so the
    /// callback can hold `&mut Scene`. Returns `false` if the component is gone
    /// or already running.
    pub(crate) fn invoke(&mut self, id: ComponentId, delta_time: f32, callback: Callback) -> bool {
        let Some(slot) = self.components.get_mut(id) else {
            return false;
        };
        let Some(mut instance) = slot.instance.take() else {
            log::trace!("{:?} re-entered while running, skipping", id);
            return false;
        };
        let node = slot.node;

        let mut ctx = ComponentContext {
            scene: self,
            node,
            component: id,
            delta_time,
        };
        callback(&mut *instance, &mut ctx);

        // The slot is gone if the node was purged from inside the callback.
        let Some(slot) = self.components.get_mut(id) else {
            return true;
        };
        slot.instance = Some(instance);
        if std::mem::take(&mut slot.remove_requested) {
            self.remove_component_by_id(id);
        }
        true
    }

    /// Attach every queued component in FIFO order.
    ///
    /// Each one receives `on_attach`, joins the live registry, and then gets
    /// `on_enable` if it is enabled on a node active in hierarchy. Components
    /// queued by those callbacks are attached in the same call.
    pub fn process_attach_queue(&mut self) -> usize {
        let mut attached = 0;
        while let Some(id) = self.attach_queue.pop_front() {
            if self.component_state(id) != Some(ComponentState::Queued) {
                continue;
            }
            self.invoke(id, 0.0, |component, ctx| component.on_attach(ctx));

            let Some(slot) = self.components.get_mut(id) else {
                continue;
            };
            slot.state = ComponentState::Live;
            let (node, enabled) = (slot.node, slot.enabled);
            self.live.push(id);
            attached += 1;

            if enabled && self.is_active_in_hierarchy(node) {
                self.invoke(id, 0.0, |component, ctx| component.on_enable(ctx));
            }
        }
        if attached > 0 {
            log::trace!("attached {} component(s)", attached);
        }
        attached
    }

    /// Run `on_fixed_update` on every eligible live component
    pub fn fixed_update(&mut self, delta_time: f32) -> usize {
        self.run_phase(ComponentFlags::FIXED_UPDATE, delta_time, |component, ctx| {
            component.on_fixed_update(ctx);
        })
    }

    /// Run `on_update` on every eligible live component
    pub fn update(&mut self, delta_time: f32) -> usize {
        self.run_phase(ComponentFlags::UPDATE, delta_time, |component, ctx| {
            component.on_update(ctx);
        })
    }

    /// Run `on_late_update` on every eligible live component
    pub fn late_update(&mut self, delta_time: f32) -> usize {
        self.run_phase(ComponentFlags::LATE_UPDATE, delta_time, |component, ctx| {
            component.on_late_update(ctx);
        })
    }

    fn run_phase(&mut self, phase: ComponentFlags, delta_time: f32, callback: Callback) -> usize {
        // Components attached mid-phase wait for the next frame.
        let count = self.live.len();
        let mut invoked = 0;
        for index in 0..count {
            let Some(id) = self.live.get(index).copied() else {
                break;
            };
            if self.is_eligible(id, phase) && self.invoke(id, delta_time, callback) {
                invoked += 1;
            }
        }
        self.prune_live();
        invoked
    }

    /// Drop registry entries whose component slot is gone
    fn prune_live(&mut self) {
        let components = &self.components;
        self.live.retain(|id| components.contains_key(*id));
    }

    fn is_eligible(&self, id: ComponentId, phase: ComponentFlags) -> bool {
        self.components.get(id).is_some_and(|slot| {
            slot.state == ComponentState::Live
                && slot.enabled
                && slot.flags.contains(phase)
                && self.is_active_in_hierarchy(slot.node)
        })
    }

    /// Request destruction of a node and its whole subtree.
    ///
    /// Nothing is released until [`process_destroyed`](Self::process_destroyed).
    /// Returns `false` for a missing node or one already pending.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            log::debug!("destroy({:?}) ignored: no such node", id);
            return false;
        };
        if node.destroy_pending {
            return false;
        }
        node.destroy_pending = true;
        self.destroy_queue.push_back(id);
        true
    }

    /// Whether the node has been purged (or never existed in this scene)
    pub fn is_destroyed(&self, id: NodeId) -> bool {
        !self.nodes.contains_key(id)
    }

    /// Whether the node is marked for destruction but not yet purged
    pub fn is_destroy_pending(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.destroy_pending)
    }

    /// Destroy everything queued by [`destroy`](Self::destroy).
    ///
    /// Runs in two passes over the full marked set. The notify pass calls
    /// `on_destroy` on every attached component and stops the node's
    /// coroutines while the graph is still intact. The purge pass then unlinks
    /// the nodes and frees their storage. Destroy requests made by handlers
    /// are handled by another round before returning. Returns the number of
    /// nodes purged.
    pub fn process_destroyed(&mut self) -> usize {
        let mut purged = 0;
        while !self.destroy_queue.is_empty() {
            let marked = self.collect_marked();

            for &id in &marked {
                self.notify_destroy(id);
            }

            for &id in &marked {
                if self.purge_node(id, &marked) {
                    purged += 1;
                }
            }

            self.prune_live();
            let components = &self.components;
            self.attach_queue.retain(|id| components.contains_key(*id));
        }
        if purged > 0 {
            log::debug!("purged {} node(s)", purged);
        }
        purged
    }

    /// Drain the destroy queue into the full marked set, pre-order per subtree
    fn collect_marked(&mut self) -> MarkedSet {
        let mut marked = MarkedSet::default();
        while let Some(root) = self.destroy_queue.pop_front() {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                if marked.contains(id) {
                    continue;
                }
                let Some(node) = self.nodes.get_mut(id) else {
                    continue;
                };
                node.destroy_pending = true;
                marked.insert(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        marked
    }

    fn notify_destroy(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        for cid in node.components.clone() {
            let Some(slot) = self.components.get_mut(cid) else {
                continue;
            };
            let was_live = slot.state == ComponentState::Live;
            slot.state = ComponentState::Destroyed;
            if was_live {
                self.invoke(cid, 0.0, |component, ctx| component.on_destroy(ctx));
            }
        }
        self.scheduler.stop_all(id);
    }

    fn purge_node(&mut self, id: NodeId, marked: &MarkedSet) -> bool {
        let parent = match self.nodes.get(id) {
            Some(node) => node.parent,
            None => return false,
        };
        match parent {
            Some(parent) if marked.contains(parent) => {}
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        let Some(node) = self.nodes.remove(id) else {
            return false;
        };
        for child in node.children {
            // Attached by a handler during the notify pass; destroyed next round.
            if marked.contains(child) {
                continue;
            }
            let Some(stray) = self.nodes.get_mut(child) else {
                continue;
            };
            stray.parent = None;
            stray.destroy_pending = true;
            self.roots.push(child);
            self.destroy_queue.push_back(child);
            self.invalidate_active_subtree(child);
            self.on_hierarchy_changed(child);
        }
        for cid in node.components {
            self.components.remove(cid);
        }
        self.scheduler.stop_all(id);
        true
    }
}

/// Marked nodes in visit order with constant-time membership
#[derive(Default)]
struct MarkedSet {
    order: Vec<NodeId>,
    members: HashSet<NodeId>,
}

impl MarkedSet {
    fn insert(&mut self, id: NodeId) {
        if self.members.insert(id) {
            self.order.push(id);
        }
    }

    fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }
}

impl<'a> IntoIterator for &'a MarkedSet {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}
