use std::collections::HashMap;

mod data;
mod error;
mod tmx;

pub use data::{
    LayerRole, MapData, MapObject, ObjectGroup, TileLayer, TileLookup, TilesetInfo,
    COLLISION_GROUP,
};
pub use error::{MapLoadError, SourceLocation};
pub use tmx::{parse_tmx, TmxMapSource};

/// Anything that can turn a map id into parsed map data.
pub trait MapSource {
    fn load_map(&self, map_id: &str) -> Result<MapData, MapLoadError>;
}

/// Maps held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StaticMapSource {
    maps: HashMap<String, MapData>,
}

impl StaticMapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(mut self, map_id: impl Into<String>, map: MapData) -> Self {
        self.maps.insert(map_id.into(), map);
        self
    }
}

impl MapSource for StaticMapSource {
    fn load_map(&self, map_id: &str) -> Result<MapData, MapLoadError> {
        self.maps
            .get(map_id)
            .cloned()
            .ok_or_else(|| MapLoadError::UnknownMap {
                map_id: map_id.to_string(),
            })
    }
}
