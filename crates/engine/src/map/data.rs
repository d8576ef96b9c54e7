use crate::sim::Rect;
use crate::TextureKey;

/// Object group whose rectangles become collision obstacles.
pub const COLLISION_GROUP: &str = "objectlayer";

/// Tiled stores horizontal/vertical/diagonal flip flags in the top three gid bits.
const GID_FLIP_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Clone, PartialEq)]
pub struct MapData {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TileLayer>,
    pub object_groups: Vec<ObjectGroup>,
    pub tileset: TilesetInfo,
}

impl MapData {
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.saturating_mul(self.tile_width),
            self.height.saturating_mul(self.tile_height),
        )
    }

    pub fn object_group(&self, name: &str) -> Option<&ObjectGroup> {
        self.object_groups.iter().find(|group| group.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Background,
    Foreground,
    Unassigned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayer {
    pub name: String,
    pub gids: Vec<u32>,
}

impl TileLayer {
    pub fn role(&self) -> LayerRole {
        let name = self.name.to_ascii_lowercase();
        if name.contains("background") {
            LayerRole::Background
        } else if name.contains("foreground") {
            LayerRole::Foreground
        } else {
            LayerRole::Unassigned
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub name: String,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub name: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MapObject {
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.width as i32,
            self.height as i32,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetInfo {
    pub name: String,
    pub texture: TextureKey,
    pub first_gid: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub image_width: u32,
    pub image_height: u32,
}

/// Gid to source rectangle table for one tileset image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLookup {
    first_gid: u32,
    rects: Vec<Rect>,
}

impl TileLookup {
    /// Slot 0 is the empty tile; slot `n` is the `n`th tile of the image in
    /// row-major order.
    pub fn from_tileset(tileset: &TilesetInfo) -> Self {
        let columns = tileset
            .image_width
            .checked_div(tileset.tile_width)
            .unwrap_or(0);
        let rows = tileset
            .image_height
            .checked_div(tileset.tile_height)
            .unwrap_or(0);
        let tile_count = columns.saturating_mul(rows);

        let mut rects = Vec::with_capacity(tile_count as usize + 1);
        rects.push(Rect::EMPTY);
        for index in 0..tile_count {
            rects.push(Rect::new(
                ((index % columns) * tileset.tile_width) as i32,
                ((index / columns) * tileset.tile_height) as i32,
                tileset.tile_width as i32,
                tileset.tile_height as i32,
            ));
        }

        Self {
            first_gid: tileset.first_gid.max(1),
            rects,
        }
    }

    pub fn tile_count(&self) -> usize {
        self.rects.len() - 1
    }

    /// `None` for the empty gid and for gids the tileset does not cover.
    pub fn source_rect(&self, gid: u32) -> Option<Rect> {
        let gid = gid & GID_FLIP_MASK;
        if gid == 0 || gid < self.first_gid {
            return None;
        }
        let slot = (gid - self.first_gid) as usize + 1;
        self.rects.get(slot).copied()
    }
}
