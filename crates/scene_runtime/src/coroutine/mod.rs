//! Coroutines: per-node work that suspends across frames
//!
//! A coroutine belongs to a node and is advanced once per frame by
//! [`Scene::update_coroutines`](crate::scene::Scene::update_coroutines).
//! Each advance runs the body to exactly one suspension point.

mod scheduler;
mod task;
mod wait;

pub use scheduler::CoroutineScheduler;
pub use task::{from_fn, from_waits, CoroutineBody, CoroutineContext, CoroutineHandle, FnBody, WaitSequence};
pub use wait::WaitCondition;
