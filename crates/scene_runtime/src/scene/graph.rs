//! The scene: node arena, component registry and frame loop

use std::collections::VecDeque;

use crate::config::RuntimeConfig;
use crate::coroutine::CoroutineScheduler;
use crate::foundation::collections::{ComponentId, NodeId, SlotMap};
use crate::foundation::time::FrameTime;
use crate::scene::backend::{PhysicsBackend, RenderBackend};
use crate::scene::component::ComponentSlot;
use crate::scene::node::Node;
use crate::scene::stats::SceneStats;

/// Owner of a live object graph.
///
/// Scenes are ordinary values; any number can exist side by side and each is
/// driven by whoever holds it. All operations take node handles, and a handle
/// to a purged node is simply ignored.
pub struct Scene {
    name: String,
    config: RuntimeConfig,
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) components: SlotMap<ComponentId, ComponentSlot>,
    /// Attached components in attach order; may hold stale ids until the next purge
    pub(crate) live: Vec<ComponentId>,
    pub(crate) attach_queue: VecDeque<ComponentId>,
    pub(crate) destroy_queue: VecDeque<NodeId>,
    pub(crate) scheduler: CoroutineScheduler,
    fixed_accumulator: f32,
    stats: SceneStats,
}

impl Scene {
    /// Create an empty scene with the default [`RuntimeConfig`]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, RuntimeConfig::default())
    }

    /// Create an empty scene with a custom configuration
    pub fn with_config(name: impl Into<String>, config: RuntimeConfig) -> Self {
        let name = name.into();
        let config = config.sanitized();
        log::info!(
            "Created scene '{}' (fixed step {:.4}s, max {} steps/frame)",
            name,
            config.fixed_timestep,
            config.max_fixed_steps_per_frame
        );
        Self {
            name,
            config,
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            components: SlotMap::with_key(),
            live: Vec::new(),
            attach_queue: VecDeque::new(),
            destroy_queue: VecDeque::new(),
            scheduler: CoroutineScheduler::new(),
            fixed_accumulator: 0.0,
            stats: SceneStats::default(),
        }
    }

    /// Scene name
    pub fn scene_name(&self) -> &str {
        &self.name
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Statistics from the most recent [`run_frame`](Self::run_frame)
    pub fn stats(&self) -> &SceneStats {
        &self.stats
    }

    /// Create a new root node
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.nodes.insert(Node::new(name));
        self.roots.push(id);
        id
    }

    /// Create a new node as the last child of `parent`
    pub fn create_child(&mut self, parent: NodeId, name: impl Into<String>) -> Option<NodeId> {
        if !self.nodes.contains_key(parent) {
            log::debug!("create_child ignored: parent {:?} does not exist", parent);
            return None;
        }
        let mut node = Node::new(name);
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        self.nodes[parent].children.push(id);
        Some(id)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether the handle refers to a node in this scene
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Root nodes in insertion order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of a node in order; empty for a missing node
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Parent of a node; `None` for roots and missing nodes
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    /// Display name of a node
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|node| node.name.as_str())
    }

    /// Rename a node
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.name = name.into();
                true
            }
            None => false,
        }
    }

    /// First node with the given name in depth-first order
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(id)?;
            if node.name == name {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Number of nodes, including those pending destruction
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of components in the live registry
    pub fn live_component_count(&self) -> usize {
        let components = &self.components;
        self.live.iter().filter(|id| components.contains_key(**id)).count()
    }

    /// Number of components waiting for [`process_attach_queue`](Self::process_attach_queue)
    pub fn pending_attach_count(&self) -> usize {
        self.attach_queue.len()
    }

    /// Destroy every root (and so every node) and purge immediately
    pub fn clear(&mut self) -> usize {
        for root in self.roots.clone() {
            self.destroy(root);
        }
        let purged = self.process_destroyed();
        log::debug!("cleared scene '{}' ({} nodes)", self.name, purged);
        purged
    }

    /// Run one frame without external backends
    pub fn run_frame(&mut self, time: &FrameTime) -> &SceneStats {
        self.run_frame_with(time, None, None)
    }

    /// Run one frame.
    ///
    /// Order: attach, fixed steps (with the physics backend), update,
    /// coroutines, late update, transform resolution and render submission,
    /// destroy processing. Statistics for the frame are returned.
    pub fn run_frame_with(
        &mut self,
        time: &FrameTime,
        mut physics: Option<&mut dyn PhysicsBackend>,
        render: Option<&mut dyn RenderBackend>,
    ) -> &SceneStats {
        let dt = time.delta_seconds.max(0.0);

        let attached = self.process_attach_queue();
        let fixed_steps = self.run_fixed_steps(dt, &mut physics);
        self.update(dt);
        self.update_coroutines(dt);
        self.late_update(dt);

        let render_submissions = match render {
            Some(backend) => self.render(backend),
            None => {
                self.resolve_transforms();
                0
            }
        };
        let nodes_purged = self.process_destroyed();

        if self.config.enable_stats {
            self.stats = SceneStats {
                frame: self.stats.frame + 1,
                node_count: self.nodes.len(),
                live_components: self.live_component_count(),
                running_coroutines: self.scheduler.len(),
                fixed_steps,
                attached,
                nodes_purged,
                render_submissions,
            };
        } else {
            self.stats.frame += 1;
        }
        log::trace!("frame {} of '{}': {:?}", time.frame, self.name, self.stats);
        &self.stats
    }

    fn run_fixed_steps(&mut self, dt: f32, physics: &mut Option<&mut dyn PhysicsBackend>) -> u32 {
        let step = self.config.fixed_timestep;
        let max_steps = self.config.max_fixed_steps_per_frame;
        self.fixed_accumulator += dt;

        let mut steps = 0;
        while self.fixed_accumulator >= step && steps < max_steps {
            self.fixed_update(step);
            if let Some(backend) = physics.as_deref_mut() {
                let poses = backend.step(self, step);
                self.apply_body_poses(&poses);
            }
            self.fixed_accumulator -= step;
            steps += 1;
        }

        if self.fixed_accumulator >= step {
            log::debug!(
                "fixed step backlog of {:.3}s dropped after {} steps",
                self.fixed_accumulator,
                steps
            );
            self.fixed_accumulator = self.fixed_accumulator.rem_euclid(step);
        }
        steps
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots.len())
            .field("components", &self.components.len())
            .field("coroutines", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}
