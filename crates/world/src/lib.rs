//! Capability interface between the avatar control core and the world engine.
//!
//! The engine itself (protocol, physics, pathfinding) lives outside this
//! workspace; [`engine::World`] is the only surface the core sees.
//! [`sim::SimWorld`] is an in-memory engine for tests and offline runs.

pub mod engine;
pub mod sim;

pub use engine::{
    Block, BlockPos, CapabilityError, EntityId, EntityKind, Entity, EquipSlot, Goal, ItemStack,
    Vec3, World, WorldEvent,
};
