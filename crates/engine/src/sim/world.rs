use std::ops::Range;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::{InputAction, InputSnapshot};
use crate::map::{LayerRole, MapData, MapLoadError, MapSource, TileLayer, TileLookup, COLLISION_GROUP};
use crate::TextureKey;

use super::actor::{Actor, FrameSet, Locomotion};
use super::camera::CameraRig;
use super::entity::{sort_by_depth, Entity, EntityId, EntityIdAllocator, EntityKind, Neighbor, TickContext};
use super::geometry::{Axis, Facing, Rect, Vec2};
use super::npc::{MoveScript, Npc};
use super::render::{RenderSink, SolidTexture, Tint};

pub const TILE_SIZE: u32 = 32;

/// First held direction in this order wins the tick.
const DIRECTION_PRIORITY: [(InputAction, Facing); 4] = [
    (InputAction::Up, Facing::North),
    (InputAction::Down, Facing::South),
    (InputAction::Left, Facing::West),
    (InputAction::Right, Facing::East),
];
const BOUNDARY_OVERLAY_TINT: Tint = Tint::rgba(255, 32, 32, 96);

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Where the avatar sits on screen while the map scrolls under it.
    pub avatar_anchor: Vec2,
    pub avatar_step: f32,
    pub npc_step: f32,
    pub collision_group: String,
    pub show_boundaries: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            viewport_width: 640,
            viewport_height: 480,
            avatar_anchor: Vec2::new(304.0, 216.0),
            avatar_step: 5.0,
            npc_step: 2.0,
            collision_group: COLLISION_GROUP.to_string(),
            show_boundaries: false,
        }
    }
}

impl WorldConfig {
    fn viewport(&self) -> Vec2 {
        Vec2::new(self.viewport_width as f32, self.viewport_height as f32)
    }
}

fn default_player_speed() -> u32 {
    10
}

fn default_npc_speed() -> u32 {
    9
}

fn default_facing() -> Facing {
    Facing::South
}

fn avatar_frames() -> FrameSet {
    FrameSet::Avatar
}

fn townsfolk_frames() -> FrameSet {
    FrameSet::Townsfolk
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerSpawn {
    pub name: String,
    pub texture: TextureKey,
    pub position: Vec2,
    #[serde(default = "avatar_frames")]
    pub frames: FrameSet,
    #[serde(default = "default_facing")]
    pub facing: Facing,
    #[serde(default = "default_player_speed")]
    pub speed: u32,
    #[serde(default)]
    pub tint: Tint,
}

impl PlayerSpawn {
    fn spawn(&self, id: EntityId) -> Entity {
        let actor = Actor::new(self.texture.clone(), self.frames, self.facing, self.speed)
            .with_tint(self.tint);
        Entity::player(id, self.name.clone(), self.position, actor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NpcSpawn {
    pub name: String,
    pub texture: TextureKey,
    pub position: Vec2,
    #[serde(default = "townsfolk_frames")]
    pub frames: FrameSet,
    #[serde(default = "default_facing")]
    pub facing: Facing,
    #[serde(default = "default_npc_speed")]
    pub speed: u32,
    #[serde(default)]
    pub script: MoveScript,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Overrides the collision box the sprite sheet implies.
    #[serde(default)]
    pub bounding_box: Option<BoxSize>,
    #[serde(default)]
    pub tint: Tint,
}

impl NpcSpawn {
    fn spawn(&self, id: EntityId) -> Entity {
        let actor = Actor::new(self.texture.clone(), self.frames, self.facing, self.speed)
            .with_tint(self.tint);
        let npc = Npc::new(actor, self.script, self.seed);
        let mut entity = Entity::npc(id, self.name.clone(), self.position, npc);
        if let Some(size) = self.bounding_box {
            entity.body.resize(size.width, size.height);
        }
        entity
    }
}

/// Everyone spawned on top of a map's own obstacles.
#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    pub player: PlayerSpawn,
    pub npcs: Vec<NpcSpawn>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load map '{map_id}': {source}")]
    Map {
        map_id: String,
        #[source]
        source: MapLoadError,
    },
    #[error("map '{map_id}' has no area ({width}x{height} tiles)")]
    EmptyMap {
        map_id: String,
        width: u32,
        height: u32,
    },
    #[error("map '{map_id}' uses {width}x{height} tiles; only {}px tiles are supported", TILE_SIZE)]
    TileSize {
        map_id: String,
        width: u32,
        height: u32,
    },
    #[error("map '{map_id}' layer '{layer}' has {actual} tiles, expected {expected}")]
    LayerSize {
        map_id: String,
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("map '{map_id}' tileset '{tileset}' contains no whole tiles")]
    EmptyTileset { map_id: String, tileset: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Steering {
    Idle,
    Turned,
    Moved(Axis),
}

#[derive(Debug)]
struct BoundaryOverlay {
    bounds: Rect,
    texture: SolidTexture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TileRange {
    columns: Range<u32>,
    rows: Range<u32>,
}

/// Everything that exists only while a map is loaded.
#[derive(Debug)]
struct Stage {
    map_id: String,
    columns: u32,
    rows: u32,
    map_size: Vec2,
    background: Vec<TileLayer>,
    foreground: Vec<TileLayer>,
    tileset_texture: TextureKey,
    lookup: TileLookup,
    entities: Vec<Entity>,
    player: EntityId,
    camera: CameraRig,
    offset: Vec2,
    previous_avatar: Vec2,
    previous_offset: Vec2,
    boundary_overlays: Vec<BoundaryOverlay>,
}

/// Owns the loaded map and everything on it. Update and draw do nothing until a
/// load succeeds.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    show_boundaries: bool,
    stage: Option<Stage>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            show_boundaries: config.show_boundaries,
            config,
            stage: None,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.stage.is_some()
    }

    /// Replaces whatever was loaded. On failure the world is left unloaded.
    pub fn load(
        &mut self,
        source: &dyn MapSource,
        map_id: &str,
        cast: &Cast,
    ) -> Result<(), LoadError> {
        self.unload();
        let result = source
            .load_map(map_id)
            .map_err(|source| LoadError::Map {
                map_id: map_id.to_string(),
                source,
            })
            .and_then(|data| Stage::build(&self.config, map_id, data, cast));

        match result {
            Ok(mut stage) => {
                if self.show_boundaries {
                    stage.build_boundary_overlays();
                }
                info!(
                    map_id,
                    columns = stage.columns,
                    rows = stage.rows,
                    background_layers = stage.background.len(),
                    foreground_layers = stage.foreground.len(),
                    entity_count = stage.entities.len(),
                    "map_loaded"
                );
                self.stage = Some(stage);
                Ok(())
            }
            Err(error) => {
                warn!(map_id, error = %error, "map_load_failed");
                Err(error)
            }
        }
    }

    pub fn unload(&mut self) {
        if let Some(stage) = self.stage.take() {
            info!(map_id = %stage.map_id, "map_unloaded");
        }
    }

    pub fn show_boundaries(&self) -> bool {
        self.show_boundaries
    }

    pub fn set_show_boundaries(&mut self, show: bool) {
        self.show_boundaries = show;
        if let Some(stage) = self.stage.as_mut() {
            if show && stage.boundary_overlays.is_empty() {
                stage.build_boundary_overlays();
            }
        }
    }

    pub fn map_id(&self) -> Option<&str> {
        self.stage.as_ref().map(|stage| stage.map_id.as_str())
    }

    pub fn map_pixel_size(&self) -> Option<Vec2> {
        self.stage.as_ref().map(|stage| stage.map_size)
    }

    pub fn entities(&self) -> &[Entity] {
        self.stage
            .as_ref()
            .map(|stage| stage.entities.as_slice())
            .unwrap_or_default()
    }

    pub fn player(&self) -> Option<&Entity> {
        let stage = self.stage.as_ref()?;
        stage.entities.iter().find(|entity| entity.id() == stage.player)
    }

    pub fn camera_offset(&self) -> Vec2 {
        self.stage
            .as_ref()
            .map(|stage| stage.offset)
            .unwrap_or(Vec2::ZERO)
    }

    /// Avatar and camera as they were before the most recent update.
    pub fn previous_frame(&self) -> Option<(Vec2, Vec2)> {
        self.stage
            .as_ref()
            .map(|stage| (stage.previous_avatar, stage.previous_offset))
    }

    pub fn debug_line(&self) -> Option<String> {
        let player = self.player()?;
        let position = player.body.position();
        let screen = player.actor()?.screen_position();
        Some(format!(
            "X: {} Y: {} SX: {} SY: {}",
            position.x, position.y, screen.x, screen.y
        ))
    }

    pub fn update(&mut self, input: &InputSnapshot) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        stage.update(&self.config, input);
    }

    pub fn draw(&self, sink: &mut dyn RenderSink) {
        let Some(stage) = self.stage.as_ref() else {
            return;
        };
        stage.draw(self.config.viewport(), self.show_boundaries, sink);
    }
}

impl Stage {
    fn build(
        config: &WorldConfig,
        map_id: &str,
        data: MapData,
        cast: &Cast,
    ) -> Result<Self, LoadError> {
        if data.width == 0 || data.height == 0 {
            return Err(LoadError::EmptyMap {
                map_id: map_id.to_string(),
                width: data.width,
                height: data.height,
            });
        }
        if data.tile_width != TILE_SIZE || data.tile_height != TILE_SIZE {
            return Err(LoadError::TileSize {
                map_id: map_id.to_string(),
                width: data.tile_width,
                height: data.tile_height,
            });
        }
        let cell_count = data.width as usize * data.height as usize;
        if let Some(layer) = data.layers.iter().find(|layer| layer.gids.len() != cell_count) {
            return Err(LoadError::LayerSize {
                map_id: map_id.to_string(),
                layer: layer.name.clone(),
                expected: cell_count,
                actual: layer.gids.len(),
            });
        }
        let lookup = TileLookup::from_tileset(&data.tileset);
        if lookup.tile_count() == 0 {
            return Err(LoadError::EmptyTileset {
                map_id: map_id.to_string(),
                tileset: data.tileset.name.clone(),
            });
        }

        let mut ids = EntityIdAllocator::default();
        let mut entities = Vec::new();
        match data.object_group(&config.collision_group) {
            Some(group) => {
                for (index, object) in group.objects.iter().enumerate() {
                    entities.push(Entity::obstacle(
                        ids.allocate(),
                        format!("{}{index}", group.name),
                        object.rect(),
                    ));
                }
            }
            None => debug!(map_id, group = %config.collision_group, "collision_group_missing"),
        }
        let player = ids.allocate();
        entities.push(cast.player.spawn(player));
        for npc in &cast.npcs {
            entities.push(npc.spawn(ids.allocate()));
        }
        sort_by_depth(&mut entities);

        let (pixel_width, pixel_height) = data.pixel_size();
        let map_size = Vec2::new(pixel_width as f32, pixel_height as f32);
        let mut background = Vec::new();
        let mut foreground = Vec::new();
        for layer in data.layers {
            match layer.role() {
                LayerRole::Background => background.push(layer),
                LayerRole::Foreground => foreground.push(layer),
                LayerRole::Unassigned => {
                    debug!(map_id, layer = %layer.name, "tile_layer_unassigned");
                }
            }
        }

        let mut stage = Self {
            map_id: map_id.to_string(),
            columns: data.width,
            rows: data.height,
            map_size,
            background,
            foreground,
            tileset_texture: data.tileset.texture,
            lookup,
            entities,
            player,
            camera: CameraRig::new(map_size, config.viewport(), config.avatar_anchor),
            offset: Vec2::ZERO,
            previous_avatar: cast.player.position,
            previous_offset: Vec2::ZERO,
            boundary_overlays: Vec::new(),
        };
        stage.frame_avatar();
        stage.previous_offset = stage.offset;
        Ok(stage)
    }

    fn player_index(&self) -> Option<usize> {
        self.entities
            .iter()
            .position(|entity| entity.id() == self.player)
    }

    fn neighbors(&self) -> Vec<Neighbor> {
        self.entities.iter().map(Entity::neighbor).collect()
    }

    fn update(&mut self, config: &WorldConfig, input: &InputSnapshot) {
        let Some(index) = self.player_index() else {
            return;
        };
        self.previous_avatar = self.entities[index].body.position();
        self.previous_offset = self.offset;

        let neighbors = self.neighbors();
        let steering = steer_avatar(
            &mut self.entities[index],
            input,
            &neighbors,
            config.avatar_step,
            self.map_size,
        );
        match steering {
            Steering::Idle => self.frame_avatar(),
            Steering::Moved(axis) => self.follow_avatar(axis),
            Steering::Turned => {}
        }

        let neighbors = self.neighbors();
        let context = TickContext {
            world_size: self.map_size,
            npc_step: config.npc_step,
            neighbors: &neighbors,
        };
        self.entities = self
            .entities
            .iter()
            .map(|entity| entity.advanced(&context))
            .collect();
        sort_by_depth(&mut self.entities);
    }

    /// Recomputes the camera on both axes.
    fn frame_avatar(&mut self) {
        let Some(index) = self.player_index() else {
            return;
        };
        let avatar = &mut self.entities[index];
        let (offset, screen) = self.camera.follow(avatar.body.position());
        if let Some((_, actor)) = avatar.actor_parts_mut() {
            self.offset = offset;
            actor.set_screen_position(screen);
        }
    }

    /// Recomputes the camera only along the axis the avatar moved on.
    fn follow_avatar(&mut self, axis: Axis) {
        let Some(index) = self.player_index() else {
            return;
        };
        let avatar = &mut self.entities[index];
        let world = avatar.body.position();
        let Some((_, actor)) = avatar.actor_parts_mut() else {
            return;
        };
        let view = self.camera.axis(axis).view(world.along(axis));
        self.offset = self.offset.with_axis(axis, view.offset);
        actor.set_screen_position(actor.screen_position().with_axis(axis, view.screen));
    }

    fn build_boundary_overlays(&mut self) {
        self.boundary_overlays = self
            .entities
            .iter()
            .filter(|entity| entity.is_obstacle())
            .map(|entity| {
                let bounds = entity.body.bounds();
                BoundaryOverlay {
                    bounds,
                    texture: SolidTexture::filled(bounds.width, bounds.height, BOUNDARY_OVERLAY_TINT),
                }
            })
            .collect();
    }

    fn draw(&self, viewport: Vec2, show_boundaries: bool, sink: &mut dyn RenderSink) {
        let tiles = visible_tiles(self.offset, viewport, self.columns, self.rows);
        for layer in &self.background {
            self.draw_layer(layer, &tiles, sink);
        }
        for entity in &self.entities {
            draw_entity(entity, self.offset, sink);
        }
        for layer in &self.foreground {
            self.draw_layer(layer, &tiles, sink);
        }
        if show_boundaries {
            let (ox, oy) = pixel_offset(self.offset);
            for overlay in &self.boundary_overlays {
                sink.draw_solid(&overlay.texture, (overlay.bounds.x - ox, overlay.bounds.y - oy));
            }
        }
    }

    fn draw_layer(&self, layer: &TileLayer, tiles: &TileRange, sink: &mut dyn RenderSink) {
        let (ox, oy) = pixel_offset(self.offset);
        let tile = TILE_SIZE as i32;
        for row in tiles.rows.clone() {
            for column in tiles.columns.clone() {
                let index = row as usize * self.columns as usize + column as usize;
                let Some(source) = layer
                    .gids
                    .get(index)
                    .and_then(|gid| self.lookup.source_rect(*gid))
                else {
                    continue;
                };
                let dest = Rect::new(
                    column as i32 * tile - ox,
                    row as i32 * tile - oy,
                    tile,
                    tile,
                );
                sink.draw_sprite(&self.tileset_texture, dest, source, Tint::WHITE);
            }
        }
    }
}

fn steer_avatar(
    avatar: &mut Entity,
    input: &InputSnapshot,
    neighbors: &[Neighbor],
    step: f32,
    map_size: Vec2,
) -> Steering {
    let id = avatar.id();
    let Some((body, actor)) = avatar.actor_parts_mut() else {
        return Steering::Idle;
    };
    let Some(facing) = DIRECTION_PRIORITY
        .iter()
        .find(|(action, _)| input.is_active(*action))
        .map(|(_, facing)| *facing)
    else {
        actor.set_locomotion(Locomotion::Standing);
        return Steering::Idle;
    };

    actor.set_locomotion(Locomotion::Walking);
    if actor.facing() != facing {
        actor.set_facing(facing);
        return Steering::Turned;
    }

    let delta = facing.unit() * step;
    body.move_by(delta.x, delta.y);
    if body.clamp_position_within(map_size) {
        actor.set_locomotion(Locomotion::Standing);
    }
    for neighbor in neighbors.iter().filter(|neighbor| neighbor.id != id) {
        if !body.bounds().intersects(&neighbor.bounds) {
            continue;
        }
        match facing {
            Facing::North => body.place_bottom_of(&neighbor.bounds),
            Facing::South => body.place_top_of(&neighbor.bounds),
            Facing::West => body.place_right_of(&neighbor.bounds),
            Facing::East => body.place_left_of(&neighbor.bounds),
        }
        actor.set_locomotion(Locomotion::Standing);
    }
    Steering::Moved(facing.axis())
}

fn draw_entity(entity: &Entity, offset: Vec2, sink: &mut dyn RenderSink) {
    match &entity.kind {
        EntityKind::Obstacle => {}
        EntityKind::Player(actor) => draw_actor(actor, actor.screen_position(), sink),
        EntityKind::Npc(npc) => draw_actor(npc.actor(), entity.body.position() - offset, sink),
    }
}

fn draw_actor(actor: &Actor, at: Vec2, sink: &mut dyn RenderSink) {
    let source = actor.source_rect();
    let at = at.floor();
    let dest = Rect::new(at.x as i32, at.y as i32, source.width, source.height);
    sink.draw_sprite(actor.texture(), dest, source, actor.tint());
}

fn pixel_offset(offset: Vec2) -> (i32, i32) {
    let offset = offset.floor();
    (offset.x as i32, offset.y as i32)
}

/// Tiles overlapping the viewport plus one tile of margin on every side.
fn visible_tiles(offset: Vec2, viewport: Vec2, columns: u32, rows: u32) -> TileRange {
    let tile = TILE_SIZE as f32;
    let span = |start: f32, extent: f32, count: u32| {
        let first = ((start / tile).floor() as i64 - 1).clamp(0, count as i64);
        let end = (((start + extent) / tile).ceil() as i64 + 1).clamp(0, count as i64);
        first as u32..end as u32
    };
    TileRange {
        columns: span(offset.x, viewport.x, columns),
        rows: span(offset.y, viewport.y, rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MapObject, ObjectGroup, StaticMapSource, TilesetInfo};
    use crate::sim::npc::Counter;
    use crate::sim::render::{DrawCommand, DrawList};

    const MAP_ID: &str = "test";

    fn key(raw: &str) -> TextureKey {
        TextureKey::new(raw).expect("texture key")
    }

    fn map(columns: u32, rows: u32, obstacles: &[Rect]) -> MapData {
        let cells = (columns * rows) as usize;
        MapData {
            width: columns,
            height: rows,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            layers: vec![
                TileLayer {
                    name: "Background".to_string(),
                    gids: vec![1; cells],
                },
                TileLayer {
                    name: "Foreground".to_string(),
                    gids: vec![0; cells],
                },
            ],
            object_groups: vec![ObjectGroup {
                name: COLLISION_GROUP.to_string(),
                objects: obstacles
                    .iter()
                    .map(|rect| MapObject {
                        name: None,
                        x: rect.x as f32,
                        y: rect.y as f32,
                        width: rect.width as f32,
                        height: rect.height as f32,
                    })
                    .collect(),
            }],
            tileset: TilesetInfo {
                name: "test".to_string(),
                texture: key("tilesets/test"),
                first_gid: 1,
                tile_width: TILE_SIZE,
                tile_height: TILE_SIZE,
                image_width: 64,
                image_height: 64,
            },
        }
    }

    fn player_at(position: Vec2, facing: Facing) -> PlayerSpawn {
        PlayerSpawn {
            name: "Albert".to_string(),
            texture: key("actors/albert"),
            position,
            frames: FrameSet::Avatar,
            facing,
            speed: 10,
            tint: Tint::WHITE,
        }
    }

    fn npc_at(name: &str, position: Vec2, script: MoveScript, seed: u64) -> NpcSpawn {
        NpcSpawn {
            name: name.to_string(),
            texture: key("actors/brunette00"),
            position,
            frames: FrameSet::Townsfolk,
            facing: Facing::South,
            speed: 9,
            script,
            seed: Some(seed),
            bounding_box: None,
            tint: Tint::WHITE,
        }
    }

    fn solo(position: Vec2, facing: Facing) -> Cast {
        Cast {
            player: player_at(position, facing),
            npcs: Vec::new(),
        }
    }

    fn loaded_with(config: WorldConfig, data: MapData, cast: &Cast) -> World {
        let source = StaticMapSource::new().with_map(MAP_ID, data);
        let mut world = World::new(config);
        world.load(&source, MAP_ID, cast).expect("load");
        world
    }

    fn loaded(data: MapData, cast: &Cast) -> World {
        loaded_with(WorldConfig::default(), data, cast)
    }

    fn held(actions: &[InputAction]) -> InputSnapshot {
        actions
            .iter()
            .fold(InputSnapshot::empty(), |snapshot, action| {
                snapshot.with_action_held(*action)
            })
    }

    fn avatar(world: &World) -> (Vec2, Facing, Locomotion) {
        let player = world.player().expect("player");
        let actor = player.actor().expect("actor");
        (player.body.position(), actor.facing(), actor.locomotion())
    }

    #[test]
    fn walking_east_into_obstacle_snaps_flush_and_stops() {
        for step in [5.0, 7.0, 13.0] {
            let config = WorldConfig {
                avatar_step: step,
                ..WorldConfig::default()
            };
            let wall = Rect::new(100, 190, 40, 40);
            let mut world = loaded_with(
                config,
                map(20, 15, &[wall]),
                &solo(Vec2::new(60.0, 200.0), Facing::East),
            );

            for _ in 0..10 {
                world.update(&held(&[InputAction::Right]));
            }

            let (position, _, locomotion) = avatar(&world);
            assert_eq!(position.x, 69.0, "step={step}");
            assert_eq!(locomotion, Locomotion::Standing, "step={step}");
        }
    }

    #[test]
    fn turning_costs_one_tick_without_moving() {
        let start = Vec2::new(100.0, 100.0);
        let mut world = loaded(map(20, 15, &[]), &solo(start, Facing::East));

        world.update(&held(&[InputAction::Up]));
        let (position, facing, locomotion) = avatar(&world);
        assert_eq!(position, start);
        assert_eq!(facing, Facing::North);
        assert_eq!(locomotion, Locomotion::Walking);

        world.update(&held(&[InputAction::Up]));
        assert_eq!(avatar(&world).0, Vec2::new(100.0, 95.0));
    }

    #[test]
    fn only_highest_priority_direction_is_acted_on() {
        let start = Vec2::new(200.0, 200.0);
        let mut world = loaded(map(20, 15, &[]), &solo(start, Facing::North));
        world.update(&held(&[
            InputAction::Right,
            InputAction::Left,
            InputAction::Down,
            InputAction::Up,
        ]));
        assert_eq!(avatar(&world).0, Vec2::new(200.0, 195.0));

        let mut world = loaded(map(20, 15, &[]), &solo(start, Facing::West));
        world.update(&held(&[InputAction::Right, InputAction::Left]));
        assert_eq!(avatar(&world).0, Vec2::new(195.0, 200.0));
    }

    #[test]
    fn releasing_all_directions_stands_still() {
        let mut world = loaded(map(20, 15, &[]), &solo(Vec2::new(100.0, 100.0), Facing::East));
        world.update(&held(&[InputAction::Right]));
        assert_eq!(avatar(&world).2, Locomotion::Walking);

        world.update(&InputSnapshot::empty());
        let (position, _, locomotion) = avatar(&world);
        assert_eq!(position, Vec2::new(105.0, 100.0));
        assert_eq!(locomotion, Locomotion::Standing);
    }

    #[test]
    fn map_edge_clamps_and_stops_the_avatar() {
        let mut world = loaded(map(20, 15, &[]), &solo(Vec2::new(2.0, 100.0), Facing::West));
        world.update(&held(&[InputAction::Left]));

        let (position, _, locomotion) = avatar(&world);
        assert_eq!(position, Vec2::new(0.0, 100.0));
        assert_eq!(locomotion, Locomotion::Standing);
    }

    #[test]
    fn avatar_position_stops_at_the_far_map_edges() {
        let mut world = loaded(map(20, 15, &[]), &solo(Vec2::new(600.0, 100.0), Facing::East));
        for _ in 0..8 {
            world.update(&held(&[InputAction::Right]));
        }
        let (position, _, locomotion) = avatar(&world);
        assert_eq!(position.x, 640.0);
        assert_eq!(locomotion, Locomotion::Walking, "landing exactly on the edge is no clamp");

        for _ in 0..12 {
            world.update(&held(&[InputAction::Right]));
        }
        let (position, _, locomotion) = avatar(&world);
        assert_eq!(position, Vec2::new(640.0, 100.0));
        assert_eq!(locomotion, Locomotion::Standing);

        for _ in 0..100 {
            world.update(&held(&[InputAction::Down]));
        }
        let (position, facing, locomotion) = avatar(&world);
        assert_eq!(position, Vec2::new(640.0, 480.0));
        assert_eq!(facing, Facing::South);
        assert_eq!(locomotion, Locomotion::Standing);
    }

    #[test]
    fn avatar_is_stopped_by_npcs_too() {
        let cast = Cast {
            player: player_at(Vec2::new(100.0, 100.0), Facing::South),
            npcs: vec![npc_at("npc1", Vec2::new(100.0, 150.0), MoveScript::Stand, 1)],
        };
        let mut world = loaded(map(20, 15, &[]), &cast);
        for _ in 0..20 {
            world.update(&held(&[InputAction::Down]));
        }
        let (position, _, locomotion) = avatar(&world);
        assert_eq!(position.y, 150.0 - 22.0);
        assert_eq!(locomotion, Locomotion::Standing);
    }

    #[test]
    fn camera_tracks_avatar_with_exact_accounting() {
        let mut world = loaded(
            map(63, 32, &[]),
            &solo(Vec2::new(0.0, 300.0), Facing::East),
        );
        let map_size = world.map_pixel_size().expect("loaded");
        assert_eq!(map_size, Vec2::new(2016.0, 1024.0));

        for _ in 0..450 {
            world.update(&held(&[InputAction::Right]));
            let player = world.player().expect("player");
            let world_x = player.body.position().x;
            let screen_x = player.actor().expect("actor").screen_position().x;
            let offset = world.camera_offset();

            assert!((0.0..=map_size.x - 640.0).contains(&offset.x));
            assert_eq!(screen_x + offset.x, world_x);
            if (304.0..=map_size.x - 336.0).contains(&world_x) {
                assert_eq!(screen_x, 304.0);
            }
        }
        assert_eq!(world.camera_offset().x, 2016.0 - 640.0);
    }

    #[test]
    fn camera_starts_centered_on_spawn() {
        let world = loaded(map(63, 32, &[]), &solo(Vec2::new(1000.0, 500.0), Facing::East));
        assert_eq!(world.camera_offset(), Vec2::new(696.0, 284.0));
        let debug = world.debug_line().expect("debug line");
        assert_eq!(debug, "X: 1000 Y: 500 SX: 304 SY: 216");
    }

    #[test]
    fn small_map_never_scrolls() {
        let mut world = loaded(map(10, 8, &[]), &solo(Vec2::new(50.0, 50.0), Facing::East));
        for _ in 0..100 {
            world.update(&held(&[InputAction::Right]));
            assert_eq!(world.camera_offset(), Vec2::ZERO);
        }
    }

    #[test]
    fn previous_frame_snapshot_lags_one_update() {
        let mut world = loaded(map(20, 15, &[]), &solo(Vec2::new(100.0, 100.0), Facing::East));
        world.update(&held(&[InputAction::Right]));
        world.update(&held(&[InputAction::Right]));

        let (previous_avatar, _) = world.previous_frame().expect("loaded");
        assert_eq!(previous_avatar, Vec2::new(105.0, 100.0));
    }

    #[test]
    fn entities_stay_depth_sorted_after_updates() {
        let cast = Cast {
            player: player_at(Vec2::new(300.0, 300.0), Facing::North),
            npcs: vec![
                npc_at("npc1", Vec2::new(400.0, 200.0), MoveScript::Wander, 1),
                npc_at("npc2", Vec2::new(300.0, 100.0), MoveScript::Wander, 2),
                npc_at("npc3", Vec2::new(100.0, 350.0), MoveScript::Patrol, 3),
            ],
        };
        let mut world = loaded(map(40, 30, &[Rect::new(0, 0, 1280, 8)]), &cast);
        for tick in 0..300 {
            let input = if tick % 40 < 20 {
                held(&[InputAction::Up])
            } else {
                InputSnapshot::empty()
            };
            world.update(&input);
            let bottoms: Vec<f32> = world
                .entities()
                .iter()
                .map(|entity| entity.body.bottom_edge())
                .collect();
            assert!(bottoms.windows(2).all(|pair| pair[0] <= pair[1]), "tick={tick}");
        }
    }

    #[test]
    fn idle_npc_never_moves_inside_the_world() {
        let cast = Cast {
            player: player_at(Vec2::new(100.0, 100.0), Facing::East),
            npcs: vec![npc_at("npc1", Vec2::new(400.0, 200.0), MoveScript::Stand, 9)],
        };
        let mut world = loaded(map(20, 15, &[]), &cast);
        for _ in 0..500 {
            world.update(&held(&[InputAction::Right]));
        }
        let npc = world
            .entities()
            .iter()
            .find(|entity| entity.name() == Some("npc1"))
            .expect("npc");
        assert_eq!(npc.body.position(), Vec2::new(400.0, 200.0));
        assert_eq!(npc.actor().expect("actor").facing(), Facing::South);
    }

    #[test]
    fn seeded_worlds_replay_identically() {
        use Facing::{East, South, West};
        use Locomotion::{Standing, Walking};

        let cast = Cast {
            player: player_at(Vec2::new(76.0, 200.0), Facing::East),
            npcs: vec![
                npc_at("npc1", Vec2::new(400.0, 200.0), MoveScript::Wander, 11),
                npc_at("npc2", Vec2::new(300.0, 300.0), MoveScript::Wander, 12),
            ],
        };
        let npc_state = |world: &World, name: &str| {
            let entity = world
                .entities()
                .iter()
                .find(|entity| entity.name() == Some(name))
                .expect("npc");
            let npc = entity.as_npc().expect("npc kind");
            (
                npc.actor().facing(),
                npc.actor().locomotion(),
                npc.counters().get(Counter::IdleTicks),
                entity.body.position(),
            )
        };
        let run = || {
            let mut world = loaded(map(30, 20, &[Rect::new(200, 0, 32, 320)]), &cast);
            (0..600)
                .map(|_| {
                    world.update(&InputSnapshot::empty());
                    (npc_state(&world, "npc1"), npc_state(&world, "npc2"))
                })
                .collect::<Vec<_>>()
        };
        let trace = run();
        assert_eq!(trace, run());

        let expected = [
            (
                1,
                (South, Walking, 0, Vec2::new(400.0, 200.0)),
                (East, Walking, 0, Vec2::new(300.0, 300.0)),
            ),
            (
                100,
                (East, Walking, 0, Vec2::new(524.0, 270.0)),
                (South, Walking, 0, Vec2::new(370.0, 424.0)),
            ),
            (
                300,
                (East, Standing, 56, Vec2::new(914.0, 270.0)),
                (West, Walking, 0, Vec2::new(160.0, 608.0)),
            ),
            (
                500,
                (West, Walking, 0, Vec2::new(628.0, 270.0)),
                (East, Standing, 10, Vec2::new(134.0, 608.0)),
            ),
            (
                600,
                (West, Walking, 0, Vec2::new(428.0, 270.0)),
                (East, Standing, 51, Vec2::new(292.0, 608.0)),
            ),
        ];
        for (tick, npc1, npc2) in expected {
            assert_eq!(trace[tick - 1], (npc1, npc2), "tick={tick}");
        }
    }

    #[test]
    fn npc_box_override_is_applied() {
        let mut spawn = npc_at("npc1", Vec2::new(400.0, 200.0), MoveScript::Stand, 1);
        spawn.bounding_box = Some(BoxSize {
            width: 20,
            height: 10,
        });
        let cast = Cast {
            player: player_at(Vec2::new(0.0, 0.0), Facing::East),
            npcs: vec![spawn],
        };
        let world = loaded(map(20, 15, &[]), &cast);
        let npc = world
            .entities()
            .iter()
            .find(|entity| entity.as_npc().is_some())
            .expect("npc");
        assert_eq!(npc.body.size(), (20, 10));
    }

    #[test]
    fn obstacles_are_named_after_their_group() {
        let world = loaded(
            map(20, 15, &[Rect::new(0, 0, 10, 10), Rect::new(50, 50, 10, 10)]),
            &solo(Vec2::new(300.0, 300.0), Facing::East),
        );
        let mut names: Vec<&str> = world
            .entities()
            .iter()
            .filter(|entity| entity.is_obstacle())
            .filter_map(Entity::name)
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["objectlayer0", "objectlayer1"]);
    }

    #[test]
    fn draw_order_is_background_entities_foreground() {
        let mut data = map(20, 15, &[]);
        data.layers[1].gids[0] = 2;
        let cast = Cast {
            player: player_at(Vec2::new(100.0, 100.0), Facing::East),
            npcs: vec![
                npc_at("low", Vec2::new(300.0, 300.0), MoveScript::Stand, 1),
                npc_at("high", Vec2::new(300.0, 50.0), MoveScript::Stand, 2),
            ],
        };
        let world = loaded(data, &cast);
        let mut sink = DrawList::new();
        world.draw(&mut sink);

        let textures: Vec<&str> = sink.sprites().map(|(texture, _, _)| texture.as_str()).collect();
        let tiles_per_layer = 20 * 15;
        assert_eq!(textures.len(), tiles_per_layer + 3 + 1);
        assert!(textures[..tiles_per_layer]
            .iter()
            .all(|texture| *texture == "tilesets/test"));
        assert_eq!(
            &textures[tiles_per_layer..tiles_per_layer + 3],
            &["actors/brunette00", "actors/albert", "actors/brunette00"]
        );
        assert_eq!(textures[tiles_per_layer + 3], "tilesets/test");

        let npc_dests: Vec<Rect> = sink
            .sprites()
            .filter(|(texture, _, _)| texture.as_str() == "actors/brunette00")
            .map(|(_, dest, _)| dest)
            .collect();
        assert_eq!((npc_dests[0].x, npc_dests[0].y), (300, 50));
        assert_eq!((npc_dests[1].x, npc_dests[1].y), (300, 300));
    }

    #[test]
    fn entities_draw_relative_to_camera() {
        let cast = Cast {
            player: player_at(Vec2::new(1000.0, 500.0), Facing::East),
            npcs: vec![npc_at("npc1", Vec2::new(1100.0, 520.0), MoveScript::Stand, 1)],
        };
        let world = loaded(map(63, 32, &[]), &cast);
        let mut sink = DrawList::new();
        world.draw(&mut sink);

        let actor_dests: Vec<(&str, Rect)> = sink
            .sprites()
            .filter(|(texture, _, _)| texture.as_str().starts_with("actors/"))
            .map(|(texture, dest, _)| (texture.as_str(), dest))
            .collect();
        assert_eq!(actor_dests.len(), 2);
        let (_, avatar_dest) = actor_dests[0];
        assert_eq!((avatar_dest.x, avatar_dest.y), (304, 216));
        let (_, npc_dest) = actor_dests[1];
        assert_eq!((npc_dest.x, npc_dest.y), (1100 - 696, 520 - 284));
    }

    #[test]
    fn out_of_range_gids_are_skipped() {
        let mut data = map(4, 4, &[]);
        data.layers[0].gids = vec![1, 2, 3, 4, 5, 99, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        let world = loaded(data, &solo(Vec2::new(10.0, 10.0), Facing::East));
        let mut sink = DrawList::new();
        world.draw(&mut sink);

        let tile_draws = sink
            .sprites()
            .filter(|(texture, _, _)| texture.as_str() == "tilesets/test")
            .count();
        assert_eq!(tile_draws, 16 - 3);
    }

    #[test]
    fn culling_keeps_every_visible_tile_and_little_else() {
        let mut world = loaded(map(80, 60, &[]), &solo(Vec2::new(900.0, 700.0), Facing::East));
        for _ in 0..7 {
            world.update(&held(&[InputAction::Right]));
        }
        let offset = world.camera_offset();
        assert!(offset.x > 0.0 && offset.y > 0.0);

        let mut sink = DrawList::new();
        world.draw(&mut sink);
        let drawn: Vec<Rect> = sink
            .sprites()
            .filter(|(texture, _, _)| texture.as_str() == "tilesets/test")
            .map(|(_, dest, _)| dest)
            .collect();

        let viewport = Rect::new(0, 0, 640, 480);
        let expected_visible = (0..80)
            .flat_map(|column| (0..60).map(move |row| (column, row)))
            .filter(|(column, row)| {
                let dest = Rect::new(
                    column * 32 - offset.x as i32,
                    row * 32 - offset.y as i32,
                    32,
                    32,
                );
                dest.intersects(&viewport)
            })
            .count();
        let drawn_visible = drawn.iter().filter(|dest| dest.intersects(&viewport)).count();
        assert_eq!(drawn_visible, expected_visible);

        let margin = Rect::new(-64, -64, 640 + 128, 480 + 128);
        assert!(drawn.iter().all(|dest| dest.intersects(&margin)));
    }

    #[test]
    fn visible_tiles_clamp_to_the_grid() {
        let tiles = visible_tiles(Vec2::ZERO, Vec2::new(640.0, 480.0), 10, 8);
        assert_eq!(tiles.columns, 0..10);
        assert_eq!(tiles.rows, 0..8);

        let tiles = visible_tiles(Vec2::new(100.0, 40.0), Vec2::new(640.0, 480.0), 100, 100);
        assert_eq!(tiles.columns, 2..25);
        assert_eq!(tiles.rows, 0..18);
    }

    #[test]
    fn unloaded_world_ignores_update_and_draw() {
        let mut world = World::new(WorldConfig::default());
        world.update(&held(&[InputAction::Right]));
        let mut sink = DrawList::new();
        world.draw(&mut sink);

        assert!(!world.is_loaded());
        assert!(sink.commands().is_empty());
        assert!(world.entities().is_empty());
        assert!(world.debug_line().is_none());
    }

    #[test]
    fn failed_load_leaves_world_unloaded() {
        let source = StaticMapSource::new().with_map(MAP_ID, map(20, 15, &[]));
        let cast = solo(Vec2::new(10.0, 10.0), Facing::East);
        let mut world = World::new(WorldConfig::default());
        world.load(&source, MAP_ID, &cast).expect("first load");
        assert!(world.is_loaded());

        let error = world
            .load(&source, "missing", &cast)
            .expect_err("unknown map");
        assert!(matches!(error, LoadError::Map { .. }));
        assert!(!world.is_loaded());

        world.update(&held(&[InputAction::Right]));
        let mut sink = DrawList::new();
        world.draw(&mut sink);
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn inconsistent_map_data_is_rejected() {
        let cast = solo(Vec2::new(10.0, 10.0), Facing::East);
        let mut short_layer = map(4, 4, &[]);
        short_layer.layers[0].gids.pop();
        let mut tiny_tileset = map(4, 4, &[]);
        tiny_tileset.tileset.image_width = 16;
        let empty = map(0, 4, &[]);

        for (data, label) in [
            (short_layer, "short layer"),
            (tiny_tileset, "tiny tileset"),
            (empty, "empty map"),
        ] {
            let source = StaticMapSource::new().with_map(MAP_ID, data);
            let mut world = World::new(WorldConfig::default());
            assert!(world.load(&source, MAP_ID, &cast).is_err(), "{label}");
            assert!(!world.is_loaded(), "{label}");
        }
    }

    #[test]
    fn boundary_overlay_draws_after_foreground() {
        let wall = Rect::new(64, 64, 32, 16);
        let mut world = loaded(
            map(20, 15, &[wall, Rect::new(0, 0, 0, 0)]),
            &solo(Vec2::new(300.0, 300.0), Facing::East),
        );
        world.set_show_boundaries(true);
        let mut sink = DrawList::new();
        world.draw(&mut sink);

        let solids: Vec<&DrawCommand> = sink
            .commands()
            .iter()
            .filter(|command| matches!(command, DrawCommand::Solid { .. }))
            .collect();
        assert_eq!(solids.len(), 2);
        assert!(solids.contains(&&DrawCommand::Solid {
            width: 32,
            height: 16,
            position: (64, 64),
        }));
        assert!(solids.contains(&&DrawCommand::Solid {
            width: 0,
            height: 0,
            position: (0, 0),
        }));
        assert!(matches!(
            sink.commands().last(),
            Some(DrawCommand::Solid { .. })
        ));

        world.set_show_boundaries(false);
        let mut sink = DrawList::new();
        world.draw(&mut sink);
        assert!(!sink
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::Solid { .. })));
    }

    #[test]
    fn frozen_movement_keeps_avatar_still() {
        let mut world = loaded(map(20, 15, &[]), &solo(Vec2::new(100.0, 100.0), Facing::East));
        let input = held(&[InputAction::Right]).with_movement_frozen();
        for _ in 0..10 {
            world.update(&input);
        }
        let (position, _, locomotion) = avatar(&world);
        assert_eq!(position, Vec2::new(100.0, 100.0));
        assert_eq!(locomotion, Locomotion::Standing);
    }

    #[test]
    fn spawn_records_fill_in_defaults() {
        let npc: NpcSpawn = serde_json::from_str(
            r#"{ "name": "npc1", "texture": "actors/brunette00", "position": { "x": 400, "y": 200 } }"#,
        )
        .expect("npc spawn");
        assert_eq!(npc.frames, FrameSet::Townsfolk);
        assert_eq!(npc.facing, Facing::South);
        assert_eq!(npc.speed, 9);
        assert_eq!(npc.script, MoveScript::Stand);
        assert_eq!(npc.seed, None);
        assert_eq!(npc.tint, Tint::WHITE);

        let player: PlayerSpawn = serde_json::from_str(
            r#"{ "name": "Albert", "texture": "actors/albert", "position": { "x": 76, "y": 200 }, "facing": "east" }"#,
        )
        .expect("player spawn");
        assert_eq!(player.frames, FrameSet::Avatar);
        assert_eq!(player.speed, 10);

        assert!(serde_json::from_str::<NpcSpawn>(
            r#"{ "name": "x", "texture": "Actors/Up", "position": { "x": 0, "y": 0 } }"#
        )
        .is_err());
    }
}
