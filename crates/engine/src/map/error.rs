use std::path::PathBuf;

use thiserror::Error;

use crate::TextureKeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("invalid map id '{map_id}': {source}")]
    InvalidMapId {
        map_id: String,
        #[source]
        source: TextureKeyError,
    },
    #[error("unknown map '{map_id}'")]
    UnknownMap { map_id: String },
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{}:{}: malformed XML: {message}", path.display(), location.line, location.column)]
    XmlMalformed {
        path: PathBuf,
        location: SourceLocation,
        message: String,
    },
    #[error("{}:{}:{}: {message}", path.display(), location.line, location.column)]
    Invalid {
        path: PathBuf,
        location: SourceLocation,
        message: String,
    },
    #[error("{}: tile size {width}x{height} is not supported; maps must use {expected}x{expected} tiles", path.display())]
    UnsupportedTileSize {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("{}: layer '{layer}' uses unsupported data encoding '{encoding}'", path.display())]
    UnsupportedEncoding {
        path: PathBuf,
        layer: String,
        encoding: String,
    },
    #[error("{}: layer '{layer}' has {actual} tiles, expected {expected}", path.display())]
    TileCountMismatch {
        path: PathBuf,
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("{}: map declares no tileset", path.display())]
    MissingTileset { path: PathBuf },
    #[error("{}: tileset image '{image}' does not yield a valid texture key: {source}", path.display())]
    InvalidTextureKey {
        path: PathBuf,
        image: String,
        #[source]
        source: TextureKeyError,
    },
}
