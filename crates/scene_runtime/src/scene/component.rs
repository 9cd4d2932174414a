//! Component trait and per-instance bookkeeping
//!
//! Components are behaviour attached to a node. A scene stores each one as a
//! boxed trait object in its component arena, together with the lifecycle state
//! the scene tracks for it. The callback set is closed: everything a component
//! can react to is a method on [`Component`].

use std::any::{Any, TypeId};

use bitflags::bitflags;

use crate::foundation::collections::{ComponentId, NodeId};
use crate::scene::Scene;

bitflags! {
    /// Which per-frame phases a component takes part in.
    ///
    /// Read once when the component is attached, so the update loops never
    /// have to ask the component again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComponentFlags: u8 {
        /// Receives [`Component::on_fixed_update`] (physics-rate work)
        const FIXED_UPDATE = 1 << 0;
        /// Receives [`Component::on_update`]
        const UPDATE = 1 << 1;
        /// Receives [`Component::on_late_update`]
        const LATE_UPDATE = 1 << 2;
        /// Owning node is submitted to the render backend
        const RENDERABLE = 1 << 3;
    }
}

impl Default for ComponentFlags {
    fn default() -> Self {
        Self::UPDATE
    }
}

/// Downcasting support for component trait objects.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    /// Borrow as [`Any`]
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as [`Any`]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Everything a callback can reach while it runs.
///
/// The component being called is temporarily out of the scene, so looking
/// itself up through `scene` yields `None`; it already has `&mut self`.
pub struct ComponentContext<'a> {
    /// The scene that owns the component
    pub scene: &'a mut Scene,

    /// Node the component is attached to
    pub node: NodeId,

    /// The component's own handle
    pub component: ComponentId,

    /// Seconds covered by the current phase (zero outside update phases)
    pub delta_time: f32,
}

/// Behaviour attached to a node.
///
/// All callbacks default to doing nothing. A node holds at most one component
/// of each concrete type.
pub trait Component: AsAny {
    /// Phases this component participates in
    fn flags(&self) -> ComponentFlags {
        ComponentFlags::default()
    }

    /// Called once when the scene drains its attach queue
    fn on_attach(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called when the component becomes effectively active
    fn on_enable(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called when the component stops being effectively active
    fn on_disable(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Fixed-timestep update
    fn on_fixed_update(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Variable-timestep update
    fn on_update(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs after coroutines, e.g. camera or listener sync
    fn on_late_update(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called before the owning node (or the component alone) is removed.
    ///
    /// When a whole subtree is destroyed, every handler in it runs before any
    /// node is unlinked, so parent and children can still be inspected here.
    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) {}
}

/// Where a component is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    /// Added to a node, waiting for the attach queue to drain
    Queued,
    /// Attached and registered for updates
    Live,
    /// Destruction has been notified; storage is released at purge
    Destroyed,
}

/// Read-only description of a component, in node order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Component handle
    pub id: ComponentId,
    /// Concrete type name
    pub type_name: &'static str,
    /// Lifecycle state
    pub state: ComponentState,
    /// Local enabled flag
    pub enabled: bool,
}

pub(crate) type Callback = fn(&mut dyn Component, &mut ComponentContext<'_>);

pub(crate) struct ComponentSlot {
    pub node: NodeId,
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// `None` while one of the component's own callbacks is running
    pub instance: Option<Box<dyn Component>>,
    pub flags: ComponentFlags,
    pub enabled: bool,
    pub state: ComponentState,
    pub remove_requested: bool,
}

impl ComponentSlot {
    pub fn new<T: Component>(node: NodeId, component: T) -> Self {
        Self {
            node,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            flags: component.flags(),
            instance: Some(Box::new(component)),
            enabled: true,
            state: ComponentState::Queued,
            remove_requested: false,
        }
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        let instance: &dyn Component = self.instance.as_deref()?;
        instance.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        let instance: &mut dyn Component = self.instance.as_deref_mut()?;
        instance.as_any_mut().downcast_mut::<T>()
    }

    pub fn info(&self, id: ComponentId) -> ComponentInfo {
        ComponentInfo {
            id,
            type_name: self.type_name,
            state: self.state,
            enabled: self.enabled,
        }
    }
}
