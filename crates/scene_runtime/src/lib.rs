//! # Scene Runtime
//!
//! The live object graph of a running simulation: a forest of nodes with
//! lazily resolved hierarchical transforms, components with a deferred
//! attach/destroy lifecycle, and per-node coroutines advanced once per frame.
//!
//! ## Features
//!
//! - **Handle-based graph**: nodes, components and coroutines live in
//!   generational arenas, so stale handles are detected instead of dangling
//! - **Lazy transforms**: writes only set dirty flags; reads recompute each
//!   node at most once between changes
//! - **Safe destruction**: every `on_destroy` in a destroyed subtree runs
//!   before anything is unlinked
//! - **Coroutines**: step functions suspended on frame, time or indefinite waits
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_runtime::prelude::*;
//!
//! let mut scene = Scene::new("main");
//! let ship = scene.create_node("ship");
//! scene.add_spatial(ship, AffineTransform::from_position(Vec3::new(5.0, 0.0, 0.0)));
//! let turret = scene.create_child(ship, "turret").unwrap();
//! scene.add_spatial(turret, AffineTransform::from_position(Vec3::new(1.0, 0.0, 0.0)));
//!
//! scene.start_coroutine(turret, from_waits([WaitCondition::frames(3)]));
//! scene.run_frame(&FrameTime::new(1.0 / 60.0, 0));
//!
//! let world = scene.global_transform(turret).unwrap();
//! assert!((world.position.x - 6.0).abs() < 1e-5);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::must_use_candidate)]

pub mod config;
pub mod coroutine;
pub mod foundation;
pub mod scene;

/// Common imports for runtime users
pub mod prelude {
    pub use crate::config::{Config, RuntimeConfig};
    pub use crate::coroutine::{from_fn, from_waits, CoroutineContext, CoroutineHandle, WaitCondition};
    pub use crate::foundation::collections::{ComponentId, CoroutineId, NodeId};
    pub use crate::foundation::math::{AffineTransform, Mat4, Quat, Vec3};
    pub use crate::foundation::time::{FrameTime, Timer};
    pub use crate::scene::{
        BodyPose, Component, ComponentContext, ComponentFlags, PhysicsBackend, RenderBackend, Scene,
        SceneError,
    };
}
