use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::sim::{Cast, NpcSpawn, PlayerSpawn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const BUILTIN_SETTINGS: &str = r#"{
    "map_id": "test1",
    "show_boundaries": false,
    "player": {
        "name": "Albert",
        "texture": "actors/albert",
        "position": { "x": 76, "y": 200 },
        "facing": "east",
        "speed": 10
    },
    "npcs": [
        {
            "name": "npc1",
            "texture": "actors/brunette00",
            "position": { "x": 400, "y": 200 },
            "facing": "south",
            "speed": 9,
            "script": "wander"
        },
        {
            "name": "npc2",
            "texture": "actors/siriusboss",
            "position": { "x": 300, "y": 300 },
            "speed": 9,
            "script": "wander"
        }
    ]
}"#;

const BUILTIN_ORIGIN: &str = "<built-in settings>";

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings in {origin} at '{field}': {source}")]
    Parse {
        origin: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GameSettings {
    pub(crate) map_id: String,
    pub(crate) show_boundaries: bool,
    pub(crate) cast: Cast,
}

/// On-disk shape. Anything left out keeps the built-in value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    map_id: Option<String>,
    #[serde(default)]
    show_boundaries: Option<bool>,
    #[serde(default)]
    player: Option<PlayerSpawn>,
    #[serde(default)]
    npcs: Option<Vec<NpcSpawn>>,
}

impl GameSettings {
    pub(crate) fn builtin() -> Result<Self, SettingsError> {
        let file: SettingsFile = parse_json(BUILTIN_ORIGIN, BUILTIN_SETTINGS)?;
        let field = |name: &str| SettingsError::Parse {
            origin: BUILTIN_ORIGIN.to_string(),
            field: name.to_string(),
            source: serde::de::Error::missing_field("built-in default"),
        };
        Ok(Self {
            map_id: file.map_id.ok_or_else(|| field("map_id"))?,
            show_boundaries: file.show_boundaries.unwrap_or_default(),
            cast: Cast {
                player: file.player.ok_or_else(|| field("player"))?,
                npcs: file.npcs.unwrap_or_default(),
            },
        })
    }

    fn overlaid_with(mut self, file: SettingsFile) -> Self {
        if let Some(map_id) = file.map_id {
            self.map_id = map_id;
        }
        if let Some(show_boundaries) = file.show_boundaries {
            self.show_boundaries = show_boundaries;
        }
        if let Some(player) = file.player {
            self.cast.player = player;
        }
        if let Some(npcs) = file.npcs {
            self.cast.npcs = npcs;
        }
        self
    }
}

/// A missing file means built-in settings; an unreadable or malformed one is an error.
pub(crate) fn load_settings(path: &Path) -> Result<GameSettings, SettingsError> {
    let defaults = GameSettings::builtin()?;
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "settings_file_missing_using_defaults");
            return Ok(defaults);
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: SettingsFile = parse_json(&path.display().to_string(), &raw)?;
    let settings = defaults.overlaid_with(file);
    info!(
        path = %path.display(),
        map_id = settings.map_id.as_str(),
        npc_count = settings.cast.npcs.len(),
        "settings_loaded"
    );
    Ok(settings)
}

fn parse_json<T: DeserializeOwned>(origin: &str, raw: &str) -> Result<T, SettingsError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        SettingsError::Parse {
            origin: origin.to_string(),
            field,
            source: error.into_inner(),
        }
    })
}
