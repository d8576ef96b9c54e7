use std::cmp::Ordering;

use super::actor::Actor;
use super::geometry::{Rect, Vec2};
use super::npc::Npc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Position plus collision box. The box top-left is always `floor(position)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    position: Vec2,
    bounds: Rect,
    pub ran_into_obstacle: bool,
}

impl Body {
    pub fn new(position: Vec2, width: i32, height: i32) -> Self {
        let mut body = Self {
            position,
            bounds: Rect::new(0, 0, width.max(0), height.max(0)),
            ran_into_obstacle: false,
        };
        body.set_position(position);
        body
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        let top_left = position.floor();
        self.position = position;
        self.bounds.x = top_left.x as i32;
        self.bounds.y = top_left.y as i32;
    }

    pub fn move_by(&mut self, dx: f32, dy: f32) {
        self.set_position(Vec2::new(self.position.x + dx, self.position.y + dy));
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn size(&self) -> (i32, i32) {
        (self.bounds.width, self.bounds.height)
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.bounds.width = width.max(0);
        self.bounds.height = height.max(0);
    }

    pub fn top_edge(&self) -> f32 {
        self.position.y
    }

    pub fn bottom_edge(&self) -> f32 {
        self.position.y + self.bounds.height as f32
    }

    pub fn left_edge(&self) -> f32 {
        self.position.x
    }

    pub fn right_edge(&self) -> f32 {
        self.position.x + self.bounds.width as f32
    }

    pub fn place_right_of(&mut self, other: &Rect) {
        self.set_position(Vec2::new(other.right() as f32, self.position.y));
    }

    pub fn place_left_of(&mut self, other: &Rect) {
        let x = other.left() as f32 - self.bounds.width as f32;
        self.set_position(Vec2::new(x, self.position.y));
    }

    pub fn place_top_of(&mut self, other: &Rect) {
        let y = other.top() as f32 - self.bounds.height as f32;
        self.set_position(Vec2::new(self.position.x, y));
    }

    pub fn place_bottom_of(&mut self, other: &Rect) {
        self.set_position(Vec2::new(self.position.x, other.bottom() as f32));
    }

    /// Keeps the whole box inside `[0, extent]` on both axes. Returns true when
    /// the position had to be corrected.
    pub fn clamp_within(&mut self, extent: Vec2) -> bool {
        let max_x = (extent.x - self.bounds.width as f32).max(0.0);
        let max_y = (extent.y - self.bounds.height as f32).max(0.0);
        let clamped = Vec2::new(
            self.position.x.clamp(0.0, max_x),
            self.position.y.clamp(0.0, max_y),
        );
        self.settle_at(clamped)
    }

    /// Keeps the position itself inside `[0, extent]`; the box may hang past the
    /// far edges. Returns true when the position had to be corrected.
    pub fn clamp_position_within(&mut self, extent: Vec2) -> bool {
        let clamped = Vec2::new(
            self.position.x.clamp(0.0, extent.x.max(0.0)),
            self.position.y.clamp(0.0, extent.y.max(0.0)),
        );
        self.settle_at(clamped)
    }

    fn settle_at(&mut self, clamped: Vec2) -> bool {
        if clamped == self.position {
            return false;
        }
        self.set_position(clamped);
        true
    }
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Obstacle,
    Player(Actor),
    Npc(Npc),
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: Option<String>,
    pub body: Body,
    pub kind: EntityKind,
}

/// Another entity's box as it stood when the update pass began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub id: EntityId,
    pub bounds: Rect,
}

/// Read-only view of the world handed to every entity during one update pass.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub world_size: Vec2,
    pub npc_step: f32,
    pub neighbors: &'a [Neighbor],
}

impl TickContext<'_> {
    pub fn overlaps_other(&self, id: EntityId, bounds: &Rect) -> bool {
        self.neighbors
            .iter()
            .any(|neighbor| neighbor.id != id && neighbor.bounds.intersects(bounds))
    }
}

impl Entity {
    pub fn obstacle(id: EntityId, name: impl Into<String>, bounds: Rect) -> Self {
        let position = Vec2::new(bounds.x as f32, bounds.y as f32);
        Self {
            id,
            name: Some(name.into()),
            body: Body::new(position, bounds.width, bounds.height),
            kind: EntityKind::Obstacle,
        }
    }

    pub fn player(id: EntityId, name: impl Into<String>, position: Vec2, actor: Actor) -> Self {
        let (width, height) = actor.frames().body_size();
        Self {
            id,
            name: Some(name.into()),
            body: Body::new(position, width, height),
            kind: EntityKind::Player(actor),
        }
    }

    pub fn npc(id: EntityId, name: impl Into<String>, position: Vec2, npc: Npc) -> Self {
        let (width, height) = npc.actor().frames().body_size();
        Self {
            id,
            name: Some(name.into()),
            body: Body::new(position, width, height),
            kind: EntityKind::Npc(npc),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_obstacle(&self) -> bool {
        matches!(self.kind, EntityKind::Obstacle)
    }

    pub fn actor(&self) -> Option<&Actor> {
        match &self.kind {
            EntityKind::Obstacle => None,
            EntityKind::Player(actor) => Some(actor),
            EntityKind::Npc(npc) => Some(npc.actor()),
        }
    }

    pub fn as_npc(&self) -> Option<&Npc> {
        match &self.kind {
            EntityKind::Npc(npc) => Some(npc),
            _ => None,
        }
    }

    pub(crate) fn actor_parts_mut(&mut self) -> Option<(&mut Body, &mut Actor)> {
        match &mut self.kind {
            EntityKind::Obstacle => None,
            EntityKind::Player(actor) => Some((&mut self.body, actor)),
            EntityKind::Npc(npc) => Some((&mut self.body, npc.actor_mut())),
        }
    }

    pub fn neighbor(&self) -> Neighbor {
        Neighbor {
            id: self.id,
            bounds: self.body.bounds(),
        }
    }

    pub fn collides_with(&self, other: &Entity) -> bool {
        self.id != other.id && self.body.bounds().intersects(&other.body.bounds())
    }

    pub fn compare_by_depth(&self, other: &Entity) -> Ordering {
        self.body.bottom_edge().total_cmp(&other.body.bottom_edge())
    }

    /// This entity one tick later. `self` is left untouched.
    pub fn advanced(&self, context: &TickContext<'_>) -> Entity {
        let mut next = self.clone();
        match &mut next.kind {
            EntityKind::Obstacle => {}
            EntityKind::Player(actor) => actor.animate(),
            EntityKind::Npc(npc) => npc.step(self.id, &mut next.body, context),
        }
        next
    }
}

/// Painter's order: ascending bottom edge, equal edges keep their relative order.
pub fn sort_by_depth(entities: &mut [Entity]) {
    entities.sort_by(Entity::compare_by_depth);
}
