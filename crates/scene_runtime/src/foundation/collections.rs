//! Handle types and arenas
//!
//! Everything in the scene graph is addressed by generational keys, so a
//! handle to a purged node or a finished coroutine is detected instead of
//! dangling.

pub use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Handle to a node in a [`Scene`](crate::scene::Scene)
    pub struct NodeId;

    /// Handle to a component instance owned by a node
    pub struct ComponentId;

    /// Handle to a coroutine owned by the scheduler
    pub struct CoroutineId;
}
