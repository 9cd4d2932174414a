//! Headless asteroid field demo
//!
//! Drives a scene for a fixed number of frames: a spawner coroutine scatters
//! asteroids, each asteroid spins and expires on its own, a toy physics
//! backend pulls everything toward the origin and a logging render backend
//! counts what would have been drawn.
//!
//! The simulation advances by a fixed 1/60 s per frame so every run is
//! reproducible. The wall-clock [`Timer`] only measures throughput for the
//! closing fps report.
//!
//! Usage: `asteroid_field [frames] [config.toml|config.ron]`

use rand::Rng;
use scene_runtime::config::{Config, RuntimeConfig};
use scene_runtime::coroutine::{from_fn, WaitCondition};
use scene_runtime::foundation::collections::NodeId;
use scene_runtime::foundation::logging;
use scene_runtime::foundation::math::{AffineTransform, Mat4, Quat, Unit, Vec3};
use scene_runtime::foundation::time::{FrameTime, Timer};
use scene_runtime::scene::{
    BodyPose, Component, ComponentContext, ComponentFlags, PhysicsBackend, RenderBackend, Scene,
};
use thiserror::Error;

const DEFAULT_FRAMES: u64 = 600;
const FRAME_DT: f32 = 1.0 / 60.0;
const MAX_ASTEROIDS: usize = 40;

#[derive(Error, Debug)]
enum DemoError {
    #[error("invalid frame count '{0}'")]
    InvalidFrameCount(String),

    #[error("configuration error: {0}")]
    Config(#[from] scene_runtime::config::ConfigError),

    #[error("scene error: {0}")]
    Scene(#[from] scene_runtime::scene::SceneError),
}

/// Spins its node around a fixed axis
struct Spinner {
    axis: Unit<Vec3>,
    speed: f32,
}

impl Component for Spinner {
    fn on_update(&mut self, ctx: &mut ComponentContext<'_>) {
        let Some(local) = ctx.scene.local_transform(ctx.node) else {
            return;
        };
        let step = Quat::from_axis_angle(&self.axis, self.speed * ctx.delta_time);
        ctx.scene.set_local_rotation(ctx.node, step * local.rotation);
    }
}

/// Destroys its node after a number of seconds
struct Lifetime {
    remaining: f32,
}

impl Component for Lifetime {
    fn on_update(&mut self, ctx: &mut ComponentContext<'_>) {
        self.remaining -= ctx.delta_time;
        if self.remaining <= 0.0 {
            ctx.scene.destroy(ctx.node);
        }
    }

    fn on_destroy(&mut self, ctx: &mut ComponentContext<'_>) {
        log::debug!("{} expired", ctx.scene.name(ctx.node).unwrap_or("?"));
    }
}

/// Marks a node as drawable
struct MeshRenderer;

impl Component for MeshRenderer {
    fn flags(&self) -> ComponentFlags {
        ComponentFlags::RENDERABLE
    }
}

/// Pulls every asteroid toward the origin
struct Attractor {
    field: NodeId,
    strength: f32,
}

impl PhysicsBackend for Attractor {
    fn step(&mut self, scene: &Scene, fixed_dt: f32) -> Vec<BodyPose> {
        scene
            .children(self.field)
            .iter()
            .filter_map(|&node| {
                let world = scene.global_transform(node)?;
                Some(BodyPose {
                    node,
                    position: world.position - world.position * (self.strength * fixed_dt),
                    rotation: world.rotation,
                })
            })
            .collect()
    }
}

/// Counts submissions instead of drawing them
#[derive(Default)]
struct LoggingRenderer {
    frames: u64,
    submissions: u64,
    farthest: f32,
}

impl RenderBackend for LoggingRenderer {
    fn begin_frame(&mut self) {
        self.frames += 1;
    }

    fn submit(&mut self, _node: NodeId, world: &Mat4) {
        self.submissions += 1;
        let distance = Vec3::new(world.m14, world.m24, world.m34).magnitude();
        self.farthest = self.farthest.max(distance);
    }
}

fn spawn_asteroid(scene: &mut Scene, field: NodeId, index: u32) -> Result<NodeId, DemoError> {
    let mut rng = rand::thread_rng();
    let Some(node) = scene.create_child(field, format!("asteroid_{index}")) else {
        return Err(DemoError::Scene(scene_runtime::scene::SceneError::NodeNotFound(field)));
    };
    let position = Vec3::new(
        rng.gen_range(-20.0..20.0),
        rng.gen_range(-20.0..20.0),
        rng.gen_range(-5.0..5.0),
    );
    scene.add_spatial(
        node,
        AffineTransform::new(position, Quat::identity(), Vec3::repeat(rng.gen_range(0.5..2.0))),
    );
    scene.add_component(
        node,
        Spinner {
            axis: Unit::new_normalize(Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.1..1.0),
            )),
            speed: rng.gen_range(0.5..3.0),
        },
    )?;
    scene.add_component(node, Lifetime { remaining: rng.gen_range(2.0..6.0) })?;
    scene.add_component(node, MeshRenderer)?;
    Ok(node)
}

fn build_scene(config: RuntimeConfig) -> Scene {
    let mut scene = Scene::with_config("asteroid_field", config);
    let field = scene.create_node("field");
    scene.add_spatial(field, AffineTransform::identity());

    let mut spawned = 0;
    let spawner = from_fn(move |ctx| {
        if ctx.scene.children(field).len() < MAX_ASTEROIDS {
            match spawn_asteroid(ctx.scene, field, spawned) {
                Ok(_) => spawned += 1,
                Err(e) => log::warn!("spawn failed: {}", e),
            }
        }
        Some(WaitCondition::seconds(0.1))
    });
    if scene.start_coroutine(field, spawner).is_none() {
        log::warn!("field is inactive, nothing will spawn");
    }
    scene
}

fn run() -> Result<(), DemoError> {
    let mut args = std::env::args().skip(1);
    let frames = match args.next() {
        Some(arg) => arg.parse::<u64>().map_err(|_| DemoError::InvalidFrameCount(arg))?,
        None => DEFAULT_FRAMES,
    };
    let config = match args.next() {
        Some(path) => RuntimeConfig::load_or_default(path)?,
        None => RuntimeConfig::default(),
    };
    logging::init_with_level(&config.log_level);
    log::info!("Starting asteroid field demo for {} frames", frames);

    let mut scene = build_scene(config);
    let Some(field) = scene.find_by_name("field") else {
        return Ok(());
    };
    let mut physics = Attractor { field, strength: 0.2 };
    let mut renderer = LoggingRenderer::default();
    let mut timer = Timer::new();

    for frame in 0..frames {
        timer.tick();
        let stats = *scene.run_frame_with(&FrameTime::new(FRAME_DT, frame), Some(&mut physics), Some(&mut renderer));
        if frame % 120 == 0 {
            log::info!(
                "frame {}: {} nodes, {} live components, {} coroutines, {} drawn, {} purged",
                stats.frame,
                stats.node_count,
                stats.live_components,
                stats.running_coroutines,
                stats.render_submissions,
                stats.nodes_purged
            );
        }
    }

    log::info!(
        "Finished: {} render frames, {} submissions, farthest object {:.1} units, {:.0} fps",
        renderer.frames,
        renderer.submissions,
        renderer.farthest,
        timer.average_fps()
    );
    match ron::to_string(&scene.snapshot()) {
        Ok(document) => log::debug!("final scene: {}", document),
        Err(e) => log::warn!("could not serialize scene: {}", e),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    run().map_err(|e| {
        log::error!("Asteroid field demo failed: {}", e);
        e.into()
    })
}
