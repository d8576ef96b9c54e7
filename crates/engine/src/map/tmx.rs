use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::sim::TILE_SIZE;
use crate::texture_keys::validate_asset_key;
use crate::TextureKey;

use super::data::{MapData, MapObject, ObjectGroup, TileLayer, TilesetInfo};
use super::error::{MapLoadError, SourceLocation};
use super::MapSource;

const TILESET_TEXTURE_PREFIX: &str = "tilesets";

/// Reads Tiled `.tmx` maps from a directory, one file per map id.
#[derive(Debug, Clone)]
pub struct TmxMapSource {
    maps_dir: PathBuf,
}

impl TmxMapSource {
    pub fn new(maps_dir: impl Into<PathBuf>) -> Self {
        Self {
            maps_dir: maps_dir.into(),
        }
    }

    pub fn map_path(&self, map_id: &str) -> PathBuf {
        self.maps_dir.join(format!("{map_id}.tmx"))
    }
}

impl MapSource for TmxMapSource {
    fn load_map(&self, map_id: &str) -> Result<MapData, MapLoadError> {
        validate_asset_key(map_id).map_err(|source| MapLoadError::InvalidMapId {
            map_id: map_id.to_string(),
            source,
        })?;
        let path = self.map_path(map_id);
        let raw = read_file(&path)?;
        parse_tmx(&path, &raw)
    }
}

/// Parses a TMX document. External tilesets are resolved relative to `path`.
pub fn parse_tmx(path: &Path, raw: &str) -> Result<MapData, MapLoadError> {
    let doc = parse_document(path, raw)?;
    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(invalid(path, &doc, root, "root element must be <map>"));
    }
    if let Some(orientation) = root.attribute("orientation") {
        if orientation != "orthogonal" {
            return Err(invalid(
                path,
                &doc,
                root,
                format!("orientation '{orientation}' is not supported; expected 'orthogonal'"),
            ));
        }
    }

    let width: u32 = required_number(path, &doc, root, "width")?;
    let height: u32 = required_number(path, &doc, root, "height")?;
    let tile_width: u32 = required_number(path, &doc, root, "tilewidth")?;
    let tile_height: u32 = required_number(path, &doc, root, "tileheight")?;
    if tile_width != TILE_SIZE || tile_height != TILE_SIZE {
        return Err(MapLoadError::UnsupportedTileSize {
            path: path.to_path_buf(),
            width: tile_width,
            height: tile_height,
            expected: TILE_SIZE,
        });
    }

    let cell_count = width as usize * height as usize;
    let mut tileset: Option<TilesetInfo> = None;
    let mut layers = Vec::new();
    let mut object_groups = Vec::new();

    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "tileset" => {
                if tileset.is_some() {
                    warn!(path = %path.display(), "tmx_extra_tileset_ignored");
                    continue;
                }
                tileset = Some(parse_tileset_reference(path, &doc, child)?);
            }
            "layer" => layers.push(parse_layer(path, &doc, child, cell_count)?),
            "objectgroup" => object_groups.push(parse_object_group(path, &doc, child)?),
            other => debug!(path = %path.display(), element = other, "tmx_element_skipped"),
        }
    }

    let tileset = tileset.ok_or_else(|| MapLoadError::MissingTileset {
        path: path.to_path_buf(),
    })?;

    Ok(MapData {
        width,
        height,
        tile_width,
        tile_height,
        layers,
        object_groups,
        tileset,
    })
}

fn parse_tileset_reference(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<TilesetInfo, MapLoadError> {
    let first_gid: u32 = required_number(path, doc, node, "firstgid")?;
    let Some(source) = node.attribute("source") else {
        return parse_tileset_body(path, doc, node, first_gid);
    };

    let tsx_path = path
        .parent()
        .map(|dir| dir.join(source))
        .unwrap_or_else(|| PathBuf::from(source));
    let raw = read_file(&tsx_path)?;
    let tsx = parse_document(&tsx_path, &raw)?;
    let root = tsx.root_element();
    if root.tag_name().name() != "tileset" {
        return Err(invalid(
            &tsx_path,
            &tsx,
            root,
            "root element must be <tileset>",
        ));
    }
    parse_tileset_body(&tsx_path, &tsx, root, first_gid)
}

fn parse_tileset_body(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    first_gid: u32,
) -> Result<TilesetInfo, MapLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let tile_width: u32 = required_number(path, doc, node, "tilewidth")?;
    let tile_height: u32 = required_number(path, doc, node, "tileheight")?;
    if tile_width != TILE_SIZE || tile_height != TILE_SIZE {
        return Err(MapLoadError::UnsupportedTileSize {
            path: path.to_path_buf(),
            width: tile_width,
            height: tile_height,
            expected: TILE_SIZE,
        });
    }

    let Some(image) = node
        .children()
        .find(|child| child.is_element() && child.tag_name().name() == "image")
    else {
        return Err(invalid(path, doc, node, "tileset is missing its <image>"));
    };
    let image_source = required_attribute(path, doc, image, "source")?;
    let image_width: u32 = required_number(path, doc, image, "width")?;
    let image_height: u32 = required_number(path, doc, image, "height")?;

    Ok(TilesetInfo {
        name,
        texture: tileset_texture_key(path, image_source)?,
        first_gid,
        tile_width,
        tile_height,
        image_width,
        image_height,
    })
}

/// `../textures/Outdoor.png` becomes `tilesets/outdoor`.
fn tileset_texture_key(path: &Path, image_source: &str) -> Result<TextureKey, MapLoadError> {
    let stem = Path::new(image_source)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    TextureKey::new(format!("{TILESET_TEXTURE_PREFIX}/{stem}")).map_err(|source| {
        MapLoadError::InvalidTextureKey {
            path: path.to_path_buf(),
            image: image_source.to_string(),
            source,
        }
    })
}

fn parse_layer(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    cell_count: usize,
) -> Result<TileLayer, MapLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let Some(data) = node
        .children()
        .find(|child| child.is_element() && child.tag_name().name() == "data")
    else {
        return Err(invalid(
            path,
            doc,
            node,
            format!("layer '{name}' is missing its <data>"),
        ));
    };
    if let Some(compression) = data.attribute("compression") {
        return Err(MapLoadError::UnsupportedEncoding {
            path: path.to_path_buf(),
            layer: name,
            encoding: compression.to_string(),
        });
    }

    let gids = match data.attribute("encoding") {
        Some("csv") => parse_csv_gids(path, doc, data)?,
        None => data
            .children()
            .filter(|child| child.is_element() && child.tag_name().name() == "tile")
            .map(|tile| optional_number(path, doc, tile, "gid").map(Option::unwrap_or_default))
            .collect::<Result<Vec<u32>, _>>()?,
        Some(other) => {
            return Err(MapLoadError::UnsupportedEncoding {
                path: path.to_path_buf(),
                layer: name,
                encoding: other.to_string(),
            })
        }
    };

    if gids.len() != cell_count {
        return Err(MapLoadError::TileCountMismatch {
            path: path.to_path_buf(),
            layer: name,
            expected: cell_count,
            actual: gids.len(),
        });
    }

    Ok(TileLayer { name, gids })
}

fn parse_csv_gids(
    path: &Path,
    doc: &Document<'_>,
    data: Node<'_, '_>,
) -> Result<Vec<u32>, MapLoadError> {
    let text = data.text().unwrap_or_default();
    text.split(',')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            cell.parse::<u32>().map_err(|_| {
                invalid(
                    path,
                    doc,
                    data,
                    format!("tile gid '{cell}' is not a valid number"),
                )
            })
        })
        .collect()
}

fn parse_object_group(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ObjectGroup, MapLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let mut objects = Vec::new();
    for object in node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "object")
    {
        objects.push(MapObject {
            name: object.attribute("name").map(ToString::to_string),
            x: optional_number(path, doc, object, "x")?.unwrap_or(0.0),
            y: optional_number(path, doc, object, "y")?.unwrap_or(0.0),
            width: optional_number(path, doc, object, "width")?.unwrap_or(0.0),
            height: optional_number(path, doc, object, "height")?.unwrap_or(0.0),
        });
    }
    Ok(ObjectGroup { name, objects })
}

fn read_file(path: &Path) -> Result<String, MapLoadError> {
    fs::read_to_string(path).map_err(|source| MapLoadError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_document<'input>(path: &Path, raw: &'input str) -> Result<Document<'input>, MapLoadError> {
    Document::parse(raw).map_err(|error| MapLoadError::XmlMalformed {
        path: path.to_path_buf(),
        location: SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        },
        message: error.to_string(),
    })
}

fn required_attribute<'a>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'a, '_>,
    attribute: &str,
) -> Result<&'a str, MapLoadError> {
    node.attribute(attribute).ok_or_else(|| {
        invalid(
            path,
            doc,
            node,
            format!(
                "<{}> is missing required attribute '{attribute}'",
                node.tag_name().name()
            ),
        )
    })
}

fn required_number<T: FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &str,
) -> Result<T, MapLoadError> {
    let raw = required_attribute(path, doc, node, attribute)?;
    parse_number(path, doc, node, attribute, raw)
}

fn optional_number<T: FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &str,
) -> Result<Option<T>, MapLoadError> {
    node.attribute(attribute)
        .map(|raw| parse_number(path, doc, node, attribute, raw))
        .transpose()
}

fn parse_number<T: FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &str,
    raw: &str,
) -> Result<T, MapLoadError> {
    raw.trim().parse::<T>().map_err(|_| {
        invalid(
            path,
            doc,
            node,
            format!("attribute '{attribute}' value '{raw}' is not a valid number"),
        )
    })
}

fn invalid(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    message: impl Into<String>,
) -> MapLoadError {
    let pos = doc.text_pos_at(node.range().start);
    MapLoadError::Invalid {
        path: path.to_path_buf(),
        location: SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        },
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::LayerRole;
    use tempfile::TempDir;

    const EMBEDDED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="3" height="2" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="Outdoor" tilewidth="32" tileheight="32" tilecount="6" columns="3">
  <image source="../textures/Outdoor.png" width="96" height="64"/>
 </tileset>
 <layer id="1" name="Background" width="3" height="2">
  <data encoding="csv">
1,2,3,
4,5,6
</data>
 </layer>
 <layer id="2" name="Foreground trees" width="3" height="2">
  <data>
   <tile gid="0"/><tile/><tile gid="2"/>
   <tile/><tile gid="7"/><tile/>
  </data>
 </layer>
 <objectgroup id="3" name="objectlayer">
  <object id="1" x="0" y="0" width="96" height="8"/>
  <object id="2" name="well" x="40.5" y="33.9" width="20" height="12.6"/>
 </objectgroup>
</map>
"#;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    #[test]
    fn parses_embedded_tileset_layers_and_objects() {
        let map = parse_tmx(Path::new("inline.tmx"), EMBEDDED).expect("parse");

        assert_eq!((map.width, map.height), (3, 2));
        assert_eq!(map.pixel_size(), (96, 64));
        assert_eq!(map.tileset.texture.as_str(), "tilesets/outdoor");
        assert_eq!((map.tileset.image_width, map.tileset.image_height), (96, 64));

        assert_eq!(map.layers.len(), 2);
        assert_eq!(map.layers[0].gids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(map.layers[0].role(), LayerRole::Background);
        assert_eq!(map.layers[1].gids, vec![0, 0, 2, 0, 7, 0]);
        assert_eq!(map.layers[1].role(), LayerRole::Foreground);

        let group = map.object_group("objectlayer").expect("collision group");
        assert_eq!(group.objects.len(), 2);
        assert_eq!(group.objects[1].name.as_deref(), Some("well"));
        assert_eq!(group.objects[1].rect(), crate::sim::Rect::new(40, 33, 20, 12));
    }

    #[test]
    fn loads_map_with_external_tileset_from_directory() {
        let dir = TempDir::new().expect("temp");
        write(
            &dir,
            "town.tsx",
            r#"<tileset name="town" tilewidth="32" tileheight="32">
  <image source="town_tiles.png" width="64" height="64"/>
</tileset>"#,
        );
        write(
            &dir,
            "test1.tmx",
            r#"<map orientation="orthogonal" width="2" height="1" tilewidth="32" tileheight="32">
 <tileset firstgid="1" source="town.tsx"/>
 <layer name="background"><data encoding="csv">1,4</data></layer>
</map>"#,
        );

        let map = TmxMapSource::new(dir.path())
            .load_map("test1")
            .expect("load");

        assert_eq!(map.tileset.name, "town");
        assert_eq!(map.tileset.texture.as_str(), "tilesets/town_tiles");
        assert_eq!(map.layers[0].gids, vec![1, 4]);
    }

    #[test]
    fn missing_map_file_is_a_read_error() {
        let dir = TempDir::new().expect("temp");
        let error = TmxMapSource::new(dir.path())
            .load_map("nowhere")
            .expect_err("missing file");
        assert!(matches!(error, MapLoadError::ReadFile { .. }));
    }

    #[test]
    fn map_id_cannot_escape_maps_directory() {
        let error = TmxMapSource::new("maps")
            .load_map("../secrets")
            .expect_err("traversal");
        assert!(matches!(error, MapLoadError::InvalidMapId { .. }));
    }

    #[test]
    fn malformed_xml_reports_location() {
        let error = parse_tmx(Path::new("bad.tmx"), "<map width=\"1\">\n<layer></map>")
            .expect_err("malformed");
        match error {
            MapLoadError::XmlMalformed { location, .. } => assert_eq!(location.line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tile_count_must_match_grid() {
        let raw = EMBEDDED.replace("4,5,6", "4,5");
        let error = parse_tmx(Path::new("short.tmx"), &raw).expect_err("short layer");
        assert!(matches!(
            error,
            MapLoadError::TileCountMismatch {
                expected: 6,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn base64_layers_are_rejected() {
        let raw = EMBEDDED.replace(r#"<data encoding="csv">"#, r#"<data encoding="base64">"#);
        let error = parse_tmx(Path::new("b64.tmx"), &raw).expect_err("base64");
        assert!(matches!(error, MapLoadError::UnsupportedEncoding { .. }));
    }

    #[test]
    fn non_32px_tiles_are_rejected() {
        let raw = EMBEDDED.replacen(r#"tilewidth="32" tileheight="32""#, r#"tilewidth="16" tileheight="16""#, 1);
        let error = parse_tmx(Path::new("small.tmx"), &raw).expect_err("tile size");
        assert!(matches!(
            error,
            MapLoadError::UnsupportedTileSize { width: 16, .. }
        ));
    }

    #[test]
    fn map_without_tileset_fails() {
        let raw = r#"<map width="1" height="1" tilewidth="32" tileheight="32">
 <layer name="background"><data encoding="csv">0</data></layer>
</map>"#;
        let error = parse_tmx(Path::new("bare.tmx"), raw).expect_err("no tileset");
        assert!(matches!(error, MapLoadError::MissingTileset { .. }));
    }

    #[test]
    fn bad_number_names_the_attribute() {
        let raw = EMBEDDED.replacen(r#"width="3""#, r#"width="three""#, 1);
        let error = parse_tmx(Path::new("nan.tmx"), &raw).expect_err("bad width");
        assert!(error.to_string().contains("'width'"), "{error}");
    }
}
