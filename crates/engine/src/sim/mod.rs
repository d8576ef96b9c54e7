mod actor;
mod camera;
mod entity;
mod geometry;
mod npc;
mod render;
mod world;

pub use actor::{Actor, FrameSet, Locomotion, WALK_CYCLE_FRAMES};
pub use camera::{AxisScroll, AxisView, CameraRig, ScrollZone};
pub use entity::{
    sort_by_depth, Body, Entity, EntityId, EntityIdAllocator, EntityKind, Neighbor, TickContext,
};
pub use geometry::{Axis, Facing, Rect, Vec2};
pub use npc::{Counter, Counters, MoveScript, Npc, IDLE_TICKS_AFTER_WALK, WALK_TICKS};
pub use render::{DrawCommand, DrawList, RenderSink, SolidTexture, SolidTextureError, Tint};
pub use world::{
    BoxSize, Cast, LoadError, NpcSpawn, PlayerSpawn, World, WorldConfig, TILE_SIZE,
};
