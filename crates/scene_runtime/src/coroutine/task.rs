//! Coroutine bodies and handles
//!
//! A body is a step function. Each time the scheduler resumes it, it runs
//! until its next suspension point and returns the [`WaitCondition`] to
//! suspend on, or `None` when it has finished.

use crate::foundation::collections::{CoroutineId, NodeId};
use crate::scene::Scene;

use super::wait::WaitCondition;

/// Identifies one running coroutine and the node it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoroutineHandle {
    pub(crate) id: CoroutineId,
    pub(crate) node: NodeId,
}

impl CoroutineHandle {
    /// Node the coroutine runs on
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// What a body can reach while it runs
pub struct CoroutineContext<'a> {
    /// The scene that owns the coroutine
    pub scene: &'a mut Scene,

    /// Node the coroutine runs on
    pub node: NodeId,

    /// The coroutine's own handle, e.g. for stopping itself
    pub handle: CoroutineHandle,

    /// Seconds covered by the current tick
    pub delta_time: f32,
}

/// A resumable coroutine body
pub trait CoroutineBody {
    /// Run to the next suspension point
    fn resume(&mut self, ctx: &mut CoroutineContext<'_>) -> Option<WaitCondition>;
}

/// Body backed by a closure; see [`from_fn`]
pub struct FnBody<F>(F);

impl<F> CoroutineBody for FnBody<F>
where
    F: FnMut(&mut CoroutineContext<'_>) -> Option<WaitCondition>,
{
    fn resume(&mut self, ctx: &mut CoroutineContext<'_>) -> Option<WaitCondition> {
        (self.0)(ctx)
    }
}

/// Wrap a step closure as a coroutine body.
///
/// The closure keeps whatever state it needs between steps in its captures.
pub fn from_fn<F>(step: F) -> FnBody<F>
where
    F: FnMut(&mut CoroutineContext<'_>) -> Option<WaitCondition>,
{
    FnBody(step)
}

/// Body that suspends on each wait of an iterator in turn; see [`from_waits`]
pub struct WaitSequence<I>(I);

impl<I> CoroutineBody for WaitSequence<I>
where
    I: Iterator<Item = WaitCondition>,
{
    fn resume(&mut self, _ctx: &mut CoroutineContext<'_>) -> Option<WaitCondition> {
        self.0.next()
    }
}

/// Coroutine that only waits, finishing after the last wait elapses
pub fn from_waits<I>(waits: I) -> WaitSequence<I::IntoIter>
where
    I: IntoIterator<Item = WaitCondition>,
{
    WaitSequence(waits.into_iter())
}

pub(crate) struct Coroutine {
    pub node: NodeId,
    /// `None` while the body itself is running
    pub body: Option<Box<dyn CoroutineBody>>,
    pub current: Option<WaitCondition>,
}

impl Coroutine {
    pub fn new(node: NodeId, body: Box<dyn CoroutineBody>) -> Self {
        Self {
            node,
            body: Some(body),
            current: None,
        }
    }
}
