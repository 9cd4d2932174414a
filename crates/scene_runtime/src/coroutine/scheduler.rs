//! Per-node coroutine scheduling
//!
//! Coroutines are keyed by generational [`NodeId`], so liveness is a lookup
//! in the scene's arena rather than a dereference. The destroy pass also
//! stops every coroutine of a node before that node's storage is released.

use crate::foundation::collections::{CoroutineId, NodeId, SecondaryMap, SlotMap};
use crate::scene::Scene;

use super::task::{Coroutine, CoroutineBody, CoroutineContext, CoroutineHandle};

/// Owns every coroutine of a scene, grouped by node in start order
#[derive(Default)]
pub struct CoroutineScheduler {
    coroutines: SlotMap<CoroutineId, Coroutine>,
    by_node: SecondaryMap<NodeId, Vec<CoroutineId>>,
    completed: u64,
}

impl CoroutineScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled coroutines
    pub fn len(&self) -> usize {
        self.coroutines.len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.coroutines.is_empty()
    }

    /// Coroutines that ran to completion since the scheduler was created
    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    /// Whether the handle still refers to a scheduled coroutine
    pub fn contains(&self, handle: CoroutineHandle) -> bool {
        self.coroutines.contains_key(handle.id)
    }

    /// Number of coroutines scheduled on a node
    pub fn count_for(&self, node: NodeId) -> usize {
        self.by_node.get(node).map_or(0, Vec::len)
    }

    pub(crate) fn start(&mut self, node: NodeId, body: Box<dyn CoroutineBody>) -> CoroutineHandle {
        let id = self.coroutines.insert(Coroutine::new(node, body));
        match self.by_node.get_mut(node) {
            Some(list) => list.push(id),
            None => {
                self.by_node.insert(node, vec![id]);
            }
        }
        CoroutineHandle { id, node }
    }

    pub(crate) fn stop(&mut self, handle: CoroutineHandle) -> bool {
        let Some(coroutine) = self.coroutines.remove(handle.id) else {
            return false;
        };
        if let Some(list) = self.by_node.get_mut(coroutine.node) {
            list.retain(|id| *id != handle.id);
        }
        true
    }

    pub(crate) fn stop_all(&mut self, node: NodeId) -> usize {
        let Some(list) = self.by_node.remove(node) else {
            return 0;
        };
        list.into_iter()
            .filter(|id| self.coroutines.remove(*id).is_some())
            .count()
    }

    /// Every coroutine in node order, then start order
    fn schedule(&self) -> Vec<(NodeId, CoroutineId)> {
        self.by_node
            .iter()
            .flat_map(|(node, list)| list.iter().map(move |id| (node, *id)))
            .collect()
    }
}

impl Scene {
    /// Start a coroutine on a node.
    ///
    /// Returns `None`, scheduling nothing, if the node is missing, pending
    /// destruction or not active in hierarchy. A coroutine started during a
    /// tick first runs on the next tick.
    pub fn start_coroutine(&mut self, node: NodeId, body: impl CoroutineBody + 'static) -> Option<CoroutineHandle> {
        if !self.can_run_coroutines(node) {
            log::debug!("start_coroutine rejected: {:?} is not active", node);
            return None;
        }
        Some(self.scheduler.start(node, Box::new(body)))
    }

    /// Stop one coroutine. Safe to call from inside the coroutine itself.
    pub fn stop_coroutine(&mut self, handle: CoroutineHandle) -> bool {
        self.scheduler.stop(handle)
    }

    /// Stop every coroutine on a node, returning how many were stopped
    pub fn stop_all_coroutines(&mut self, node: NodeId) -> usize {
        self.scheduler.stop_all(node)
    }

    /// Whether the coroutine is still scheduled
    pub fn is_coroutine_running(&self, handle: CoroutineHandle) -> bool {
        self.scheduler.contains(handle)
    }

    /// The scene's scheduler
    pub fn coroutines(&self) -> &CoroutineScheduler {
        &self.scheduler
    }

    fn can_run_coroutines(&self, node: NodeId) -> bool {
        !self.is_destroy_pending(node) && self.is_active_in_hierarchy(node)
    }

    /// Advance every coroutine by one tick.
    ///
    /// Nodes that were destroyed, marked for destruction or deactivated lose
    /// their coroutines first. Each remaining coroutine then evaluates its
    /// current wait once and, if the wait has elapsed, resumes to its next
    /// suspension point. Returns the number of bodies resumed.
    pub fn update_coroutines(&mut self, delta_time: f32) -> usize {
        self.sweep_coroutines();

        let mut resumed = 0;
        let mut finished = Vec::new();
        for (node, id) in self.scheduler.schedule() {
            if !self.can_run_coroutines(node) {
                continue;
            }
            let Some(coroutine) = self.scheduler.coroutines.get_mut(id) else {
                continue;
            };
            if let Some(wait) = coroutine.current.as_mut() {
                if wait.still_waiting(delta_time) {
                    continue;
                }
                coroutine.current = None;
            }
            let Some(mut body) = coroutine.body.take() else {
                continue;
            };

            let handle = CoroutineHandle { id, node };
            let mut ctx = CoroutineContext {
                scene: self,
                node,
                handle,
                delta_time,
            };
            let next = body.resume(&mut ctx);
            resumed += 1;

            // Gone if the body stopped itself.
            let Some(coroutine) = self.scheduler.coroutines.get_mut(id) else {
                continue;
            };
            coroutine.body = Some(body);
            match next {
                Some(mut wait) => {
                    // The yielding tick counts as the first evaluation.
                    wait.still_waiting(0.0);
                    coroutine.current = Some(wait);
                }
                None => finished.push(handle),
            }
        }

        for handle in finished {
            if self.scheduler.stop(handle) {
                self.scheduler.completed += 1;
            }
        }
        resumed
    }

    fn sweep_coroutines(&mut self) {
        let dead: Vec<NodeId> = self
            .scheduler
            .by_node
            .iter()
            .filter(|(node, list)| list.is_empty() || !self.can_run_coroutines(*node))
            .map(|(node, _)| node)
            .collect();
        for node in dead {
            let stopped = self.scheduler.stop_all(node);
            if stopped > 0 {
                log::trace!("dropped {} coroutine(s) of inactive node {:?}", stopped, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{from_fn, from_waits, WaitCondition};
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting(steps: Rc<Cell<u32>>, waits: Vec<WaitCondition>) -> impl CoroutineBody {
        let mut waits = waits.into_iter();
        from_fn(move |_ctx| {
            steps.set(steps.get() + 1);
            waits.next()
        })
    }

    #[test]
    fn test_frames_three_completes_on_third_tick() {
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let handle = scene
            .start_coroutine(node, from_waits([WaitCondition::frames(3)]))
            .unwrap();

        scene.update_coroutines(0.016);
        assert!(scene.is_coroutine_running(handle));
        scene.update_coroutines(0.016);
        assert!(scene.is_coroutine_running(handle));
        scene.update_coroutines(0.016);
        assert!(!scene.is_coroutine_running(handle));
        assert_eq!(scene.coroutines().completed_count(), 1);

        assert_eq!(scene.update_coroutines(0.016), 0);
        assert!(scene.coroutines().is_empty());
    }

    #[test]
    fn test_stop_releases_the_node_entry() {
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let first = scene.start_coroutine(node, from_waits([WaitCondition::forever()])).unwrap();
        let second = scene.start_coroutine(node, from_waits([WaitCondition::forever()])).unwrap();
        assert_eq!(first.node(), node);
        assert_eq!(scene.coroutines().count_for(node), 2);

        assert!(scene.stop_coroutine(first));
        assert!(!scene.stop_coroutine(first));
        assert_eq!(scene.coroutines().count_for(node), 1);
        assert!(scene.is_coroutine_running(second));

        assert_eq!(scene.update_coroutines(0.016), 1);
        assert_eq!(scene.coroutines().len(), 1);
    }

    #[test]
    fn test_inactive_node_gets_no_handle() {
        let mut scene = Scene::new("coroutines");
        let parent = scene.create_node("parent");
        let child = scene.create_child(parent, "child").unwrap();
        scene.set_active(parent, false);

        assert!(scene.start_coroutine(child, from_waits([WaitCondition::frames(3)])).is_none());
        assert!(scene.coroutines().is_empty());

        scene.destroy(parent);
        scene.set_active(parent, true);
        assert!(scene.start_coroutine(parent, from_waits([WaitCondition::next_frame()])).is_none());
    }

    #[test]
    fn test_one_step_per_tick() {
        let steps = Rc::new(Cell::new(0));
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        scene.start_coroutine(
            node,
            counting(
                Rc::clone(&steps),
                vec![WaitCondition::next_frame(), WaitCondition::next_frame()],
            ),
        );

        for expected in 1..=3 {
            scene.update_coroutines(0.016);
            assert_eq!(steps.get(), expected);
        }
        assert!(scene.coroutines().is_empty());
    }

    #[test]
    fn test_seconds_wait_uses_delta_time() {
        let steps = Rc::new(Cell::new(0));
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        scene.start_coroutine(
            node,
            counting(Rc::clone(&steps), vec![WaitCondition::seconds(0.5)]),
        );

        scene.update_coroutines(0.25);
        assert_eq!(steps.get(), 1);
        scene.update_coroutines(0.25);
        assert_eq!(steps.get(), 1);
        scene.update_coroutines(0.25);
        assert_eq!(steps.get(), 2);
    }

    #[test]
    fn test_forever_runs_until_stopped() {
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let handle = scene
            .start_coroutine(node, from_waits([WaitCondition::forever()]))
            .unwrap();

        for _ in 0..10 {
            scene.update_coroutines(1.0);
        }
        assert!(scene.is_coroutine_running(handle));
        assert!(scene.stop_coroutine(handle));
        assert!(!scene.stop_coroutine(handle));
        assert_eq!(scene.stop_all_coroutines(node), 0);
    }

    #[test]
    fn test_deactivating_node_drops_its_coroutines() {
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let other = scene.create_node("other");
        let handle = scene.start_coroutine(node, from_waits([WaitCondition::forever()])).unwrap();
        let kept = scene.start_coroutine(other, from_waits([WaitCondition::forever()])).unwrap();

        scene.set_active(node, false);
        scene.update_coroutines(0.016);

        assert!(!scene.is_coroutine_running(handle));
        assert!(scene.is_coroutine_running(kept));
        assert_eq!(scene.coroutines().count_for(node), 0);
    }

    #[test]
    fn test_destroyed_node_coroutines_stop_before_purge() {
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let handle = scene.start_coroutine(node, from_waits([WaitCondition::forever()])).unwrap();

        scene.destroy(node);
        scene.process_destroyed();

        assert!(!scene.is_coroutine_running(handle));
        assert!(scene.coroutines().is_empty());
    }

    #[test]
    fn test_body_can_stop_itself() {
        let steps = Rc::new(Cell::new(0));
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let counter = Rc::clone(&steps);
        scene.start_coroutine(
            node,
            from_fn(move |ctx| {
                counter.set(counter.get() + 1);
                ctx.scene.stop_coroutine(ctx.handle);
                Some(WaitCondition::next_frame())
            }),
        );

        scene.update_coroutines(0.016);
        scene.update_coroutines(0.016);
        assert_eq!(steps.get(), 1);
        assert_eq!(scene.coroutines().completed_count(), 0);
    }

    #[test]
    fn test_coroutine_started_mid_tick_waits_for_next_tick() {
        let steps = Rc::new(Cell::new(0));
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("node");
        let spawned = Rc::clone(&steps);
        scene.start_coroutine(
            node,
            from_fn(move |ctx| {
                let inner = Rc::clone(&spawned);
                ctx.scene.start_coroutine(
                    ctx.node,
                    from_fn(move |_| {
                        inner.set(inner.get() + 1);
                        None
                    }),
                );
                None
            }),
        );

        scene.update_coroutines(0.016);
        assert_eq!(steps.get(), 0);
        scene.update_coroutines(0.016);
        assert_eq!(steps.get(), 1);
    }

    #[test]
    fn test_body_sees_scene_and_delta_time() {
        let mut scene = Scene::new("coroutines");
        let node = scene.create_node("mover");
        let mut elapsed = 0.0;
        scene.start_coroutine(
            node,
            from_fn(move |ctx| {
                elapsed += ctx.delta_time;
                ctx.scene.set_name(ctx.node, format!("mover {elapsed:.1}"));
                (elapsed < 0.25).then(WaitCondition::next_frame)
            }),
        );

        for _ in 0..5 {
            scene.update_coroutines(0.1);
        }
        assert_eq!(scene.name(node), Some("mover 0.3"));
    }
}
