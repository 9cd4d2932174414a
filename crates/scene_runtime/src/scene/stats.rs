//! Per-frame scene statistics

/// Counters gathered by [`Scene::run_frame`](crate::scene::Scene::run_frame)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    /// Frames run so far
    pub frame: u64,

    /// Nodes alive at the end of the frame
    pub node_count: usize,

    /// Components in the live registry
    pub live_components: usize,

    /// Coroutines still scheduled
    pub running_coroutines: usize,

    /// Fixed steps run this frame
    pub fixed_steps: u32,

    /// Components attached this frame
    pub attached: usize,

    /// Nodes purged this frame
    pub nodes_purged: usize,

    /// Nodes handed to the render backend this frame
    pub render_submissions: usize,
}

impl SceneStats {
    /// Whether the frame changed the shape of the scene
    pub fn had_structural_changes(&self) -> bool {
        self.attached > 0 || self.nodes_purged > 0
    }

    /// Whether the fixed loop hit its per-frame cap
    pub fn is_fixed_step_saturated(&self, max_steps: u32) -> bool {
        self.fixed_steps >= max_steps
    }
}
