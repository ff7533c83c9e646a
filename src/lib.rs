#![warn(missing_docs)]
#![warn(clippy::pedantic, clippy::perf, clippy::cargo)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc, // slice ranges always come from the parsed source text
    clippy::too_many_lines
)]

/*!
Compacts a [Tiled](https://www.mapeditor.org) map's tileset down to the tiles
the map actually uses, rewriting the map, the tileset, and the atlas image.

```rust
# use tilecrush::{crush, MapDocument, OutputNames, TilesetDocument};
# fn main() -> Result<(), tilecrush::CrushError> {
let map = MapDocument::parse(r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" width="2" height="1" tilewidth="8" tileheight="8">
 <tileset firstgid="1" source="tiles.tsx"/>
 <layer id="1" name="ground" width="2" height="1">
  <data encoding="csv">
2,5
  </data>
 </layer>
</map>"#)?;
let tileset = TilesetDocument::parse(r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset name="tiles" tilewidth="8" tileheight="8" tilecount="6" columns="3">
 <image source="tiles.png" width="24" height="16"/>
</tileset>"#)?;
let atlas = image::RgbaImage::new(24, 16);

let names = OutputNames {
    tileset_source: "tiles-crushed.tsx".to_string(),
    image_source: "tiles-crushed.png".to_string(),
};
let crushed = crush(map, tileset, &atlas, &names)?;

assert_eq!(crushed.used, 2);
assert!(crushed.map.to_tmx().contains("1,2"));
assert!(crushed.tileset.to_tsx().contains(r#"tilecount="2""#));
# Ok(())
# }
```
 */

use image::RgbaImage;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

mod atlas;
mod data;
mod formatting;
mod gid;
mod tmx;

pub use atlas::{build_atlas, TilesetGeometry};
pub use gid::Gid;

/// A reason why crushing a map failed.
pub enum CrushError {
    /// IO error.
    IoError(io::Error),
    /// A document was not well-formed XML.
    XmlError(roxmltree::Error),
    /// A document was well-formed but not a usable map or tileset.
    InvalidDocument(String),
    /// A layer declared an encoding or compression this tool does not know.
    /// Carries the layer name and the declared format.
    UnsupportedFormat(String, String),
    /// A layer's payload did not match its declared encoding.
    /// Carries the layer name and what was wrong.
    MalformedLayerData(String, String),
    /// The map contains a structure outside this tool's scope.
    UnsupportedFeature(String),
    /// A tile index was missing from the remap table.
    /// This indicates a bug in the usage scan, not bad input.
    UnknownTile(u32),
}

impl From<io::Error> for CrushError {
    fn from(err: io::Error) -> Self {
        CrushError::IoError(err)
    }
}

impl From<roxmltree::Error> for CrushError {
    fn from(err: roxmltree::Error) -> Self {
        CrushError::XmlError(err)
    }
}

impl std::fmt::Debug for CrushError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CrushError::IoError(err) => write!(f, "{err}"),
            CrushError::XmlError(err) => write!(f, "{err}"),
            CrushError::InvalidDocument(what) => write!(f, "{what}"),
            CrushError::UnsupportedFormat(layer, format) => {
                write!(f, "layer \"{layer}\" uses an unsupported data format: {format}")
            }
            CrushError::MalformedLayerData(layer, what) => {
                write!(f, "layer \"{layer}\" has malformed data: {what}")
            }
            CrushError::UnsupportedFeature(what) => {
                write!(f, "this tool does not support {what}")
            }
            CrushError::UnknownTile(index) => {
                write!(f, "tile {index} was never assigned a compacted index")
            }
        }
    }
}

impl Display for CrushError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for CrushError {}

/// How a tile layer's payload text is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Comma-separated decimal tile ids.
    Csv,
    /// Base-64 wrapped little-endian 32-bit tile ids.
    Base64,
}

impl Encoding {
    /// The attribute value naming this encoding.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::Csv => "csv",
            Encoding::Base64 => "base64",
        }
    }
}

/// The compression container around a base-64 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    /// No compression.
    #[default]
    None,
    /// A zlib-wrapped deflate stream.
    Zlib,
    /// A gzip stream.
    Gzip,
    /// A zstd frame.
    Zstd,
}

impl Compression {
    /// The attribute value naming this compression, or `None` when
    /// the payload is uncompressed and the attribute is absent.
    #[inline]
    #[must_use]
    pub const fn as_attr(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Zlib => Some("zlib"),
            Compression::Gzip => Some("gzip"),
            Compression::Zstd => Some("zstd"),
        }
    }
}

/// A parsed map document.
///
/// The original text is kept alongside the parsed fields; serialization
/// re-emits only the elements this tool rewrites and copies every other
/// byte through verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct MapDocument {
    pub(crate) src: String,
    /// Width of one grid cell, in pixels.
    pub tile_width: u32,
    /// Height of one grid cell, in pixels.
    pub tile_height: u32,
    pub(crate) tilesets: Vec<TilesetRef>,
    /// Every layer of the map in document order, with layers inside
    /// groups flattened into the list.
    pub layers: Vec<Layer>,
}

impl MapDocument {
    /// Returns the source path of the map's single external tileset.
    ///
    /// # Errors
    /// Fails with [`CrushError::InvalidDocument`] if the map has no
    /// tileset, and with [`CrushError::UnsupportedFeature`] if it has
    /// more than one, an embedded one, or one not starting at gid 1.
    pub fn tileset_source(&self) -> Result<&str, CrushError> {
        match self.tilesets.as_slice() {
            [] => Err(CrushError::InvalidDocument("map has no tileset".to_string())),
            [tileset] => {
                if tileset.first_gid != 1 {
                    return Err(CrushError::UnsupportedFeature(format!(
                        "a tileset starting at gid {} (expected 1)",
                        tileset.first_gid
                    )));
                }
                tileset.source.as_deref().ok_or_else(|| {
                    CrushError::UnsupportedFeature(
                        "an embedded tileset (no source attribute)".to_string(),
                    )
                })
            }
            more => Err(CrushError::UnsupportedFeature(format!(
                "{} tilesets in one map",
                more.len()
            ))),
        }
    }

    /// Renumbers every tile layer through the remap table and repoints
    /// the tileset reference at the new tileset file.
    ///
    /// Flip flags are preserved, empty references stay empty, and each
    /// layer is re-encoded with the encoding and compression it already
    /// declared.
    ///
    /// # Errors
    /// Fails if a layer cannot be decoded or if a nonzero index is
    /// missing from the remap table.
    pub fn rewrite(mut self, remap: &RemapTable, names: &OutputNames) -> Result<Self, CrushError> {
        for layer in &mut self.layers {
            let Layer::Tiles(layer) = layer else { continue };
            let tiles = layer.decode_data()?;
            let mut remapped = Vec::with_capacity(tiles.len());
            for tile in tiles {
                remapped.push(if tile.is_empty() {
                    Gid::EMPTY
                } else {
                    let (flip_h, flip_v, flip_d, index) = tile.split();
                    Gid::compose(flip_h, flip_v, flip_d, remap.lookup(index)?)
                });
            }
            layer.encode_data(&remapped)?;
        }
        if let Some(tileset) = self.tilesets.first_mut() {
            tileset.set_source(&names.tileset_source);
        }
        Ok(self)
    }
}

/// A `<tileset>` reference inside a map.
#[derive(Clone, PartialEq, Eq)]
pub struct TilesetRef {
    /// The gid the tileset's first tile maps to.
    pub first_gid: u32,
    /// Path of the external tileset file, if the reference is external.
    pub source: Option<String>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) range: Range<usize>,
}

impl TilesetRef {
    pub(crate) fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
        set_attr(&mut self.attributes, "source", source.to_string());
    }
}

/// One layer of a map.
#[derive(Clone, PartialEq, Eq)]
pub enum Layer {
    /// A tile layer, subject to renumbering.
    Tiles(TileLayer),
    /// Any other layer kind, passed through untouched.
    Other(OtherLayer),
}

/// A tile layer and its encoded payload.
#[derive(Clone, PartialEq, Eq)]
pub struct TileLayer {
    /// The layer's name attribute.
    pub name: String,
    /// Width of the layer, in tiles.
    pub width: u32,
    /// Height of the layer, in tiles.
    pub height: u32,
    /// How the payload text encodes the tile ids.
    pub encoding: Encoding,
    /// The compression container around a base-64 payload.
    pub compression: Compression,
    /// The payload text between the data tags, trimmed.
    pub data: String,
    pub(crate) data_range: Range<usize>,
}

impl TileLayer {
    /// Constructs a detached layer, mainly useful for feeding the codec.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        encoding: Encoding,
        compression: Compression,
    ) -> Self {
        TileLayer {
            name: name.into(),
            width,
            height,
            encoding,
            compression,
            data: String::new(),
            data_range: 0..0,
        }
    }

    /// Decodes the payload into one tile reference per grid cell.
    ///
    /// # Errors
    /// Fails with [`CrushError::MalformedLayerData`] if the payload does
    /// not decode, or decodes to anything but width times height tiles.
    pub fn decode_data(&self) -> Result<Vec<Gid>, CrushError> {
        let tiles = data::decode(&self.data, self.encoding, self.compression, &self.name)?;
        let expected = self.width as usize * self.height as usize;
        if tiles.len() != expected {
            return Err(CrushError::MalformedLayerData(
                self.name.clone(),
                format!(
                    "expected {expected} tiles ({}x{}), found {}",
                    self.width,
                    self.height,
                    tiles.len()
                ),
            ));
        }
        Ok(tiles)
    }

    /// Encodes tile references into the payload, using the layer's own
    /// encoding and compression. Callers pass width times height tiles.
    ///
    /// # Errors
    /// Fails if a compressor reports an IO error.
    pub fn encode_data(&mut self, tiles: &[Gid]) -> Result<(), CrushError> {
        self.data = data::encode(tiles, self.encoding, self.compression, self.width)?;
        Ok(())
    }
}

/// A non-tile layer, kept byte-for-byte.
#[derive(Clone, PartialEq, Eq)]
pub struct OtherLayer {
    /// The element name, e.g. `objectgroup` or `imagelayer`.
    pub kind: String,
    /// The layer's name attribute.
    pub name: String,
    pub(crate) range: Range<usize>,
}

/// A parsed external tileset document.
#[derive(Clone, PartialEq, Eq)]
pub struct TilesetDocument {
    pub(crate) src: String,
    /// The tileset's name attribute.
    pub name: String,
    /// Width of one tile, in pixels.
    pub tile_width: u32,
    /// Height of one tile, in pixels.
    pub tile_height: u32,
    /// Pixels between adjacent cells.
    pub spacing: u32,
    /// Pixels around the outside of the grid.
    pub margin: u32,
    /// The declared tile count, if any.
    pub tile_count: Option<u32>,
    /// The declared column count, if any.
    pub columns: Option<u32>,
    /// The atlas image reference.
    pub image: ImageRef,
    pub(crate) root_attrs: Vec<(String, String)>,
    pub(crate) children: Vec<TsxChild>,
    pub(crate) root_range: Range<usize>,
}

impl TilesetDocument {
    /// Builds the tileset's grid geometry against the actual atlas image.
    ///
    /// Declared column and tile counts win over the derived ones; both
    /// fall back to the derivation from the image dimensions.
    ///
    /// # Errors
    /// Fails with [`CrushError::InvalidDocument`] if the tileset declares
    /// image dimensions that contradict the actual image, or if the grid
    /// comes out with no columns.
    pub fn geometry(
        &self,
        image_width: u32,
        image_height: u32,
    ) -> Result<TilesetGeometry, CrushError> {
        if let (Some(width), Some(height)) = (self.image.width, self.image.height) {
            if (width, height) != (image_width, image_height) {
                return Err(CrushError::InvalidDocument(format!(
                    "tileset image is {image_width}x{image_height} but \"{}\" declares {width}x{height}",
                    self.name
                )));
            }
        }
        let mut geometry = TilesetGeometry::derive(
            self.tile_width,
            self.tile_height,
            self.margin,
            self.spacing,
            image_width,
            image_height,
        );
        if let Some(columns) = self.columns {
            geometry.columns = columns;
        }
        if let Some(count) = self.tile_count {
            geometry.tile_count = count;
        }
        if geometry.columns == 0 {
            return Err(CrushError::InvalidDocument(format!(
                "tileset \"{}\" has no columns (image smaller than one tile?)",
                self.name
            )));
        }
        Ok(geometry)
    }

    /// Rewrites the tileset metadata for the compacted atlas.
    ///
    /// The name takes the output file's stem, counts and the image
    /// reference follow the new geometry, per-tile entries are filtered
    /// to the used set and renumbered, and terrain and wang blocks are
    /// dropped since renumbering invalidates their tile references.
    #[must_use]
    pub fn rewrite(
        mut self,
        remap: &RemapTable,
        geometry: &TilesetGeometry,
        names: &OutputNames,
    ) -> Self {
        self.name = stem(&names.tileset_source).to_string();
        self.tile_count = Some(remap.len() as u32);
        self.columns = Some(geometry.columns);
        self.image.update(&names.image_source, geometry.image_width, geometry.image_height);
        let mut kept = Vec::with_capacity(self.children.len());
        for child in std::mem::take(&mut self.children) {
            match child {
                TsxChild::Tile(mut tile) => {
                    // Per-tile entries carry 0-based ids.
                    let renumbered = tile.id.checked_add(1).and_then(|raw| remap.get(raw));
                    let Some(compact) = renumbered else { continue };
                    tile.id = compact - 1;
                    tile.attributes
                        .retain(|(name, _)| name != "terrain" && name != "probability");
                    kept.push(TsxChild::Tile(tile));
                }
                TsxChild::Opaque { ref name, .. }
                    if name == "terraintypes" || name == "wangsets" => {}
                other => kept.push(other),
            }
        }
        self.children = kept;
        self
    }
}

/// The `<image>` reference of a tileset.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ImageRef {
    /// Path of the image file.
    pub source: String,
    /// Declared image width, if any.
    pub width: Option<u32>,
    /// Declared image height, if any.
    pub height: Option<u32>,
    pub(crate) attributes: Vec<(String, String)>,
}

impl ImageRef {
    pub(crate) fn update(&mut self, source: &str, width: u32, height: u32) {
        self.source = source.to_string();
        self.width = Some(width);
        self.height = Some(height);
        set_attr(&mut self.attributes, "source", source.to_string());
        set_attr(&mut self.attributes, "width", width.to_string());
        set_attr(&mut self.attributes, "height", height.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TsxChild {
    Image,
    Tile(TileEntry),
    Opaque { name: String, range: Range<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TileEntry {
    pub(crate) id: u32,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) children: Vec<Range<usize>>,
}

/// The deterministic mapping from used raw indices to compacted ones.
///
/// Used indices are sorted ascending and assigned 1, 2, 3, and so on,
/// so the same input always packs the same way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemapTable {
    forward: BTreeMap<u32, u32>,
}

impl RemapTable {
    /// Builds the table from the set of used raw indices.
    #[must_use]
    pub fn build(used: &BTreeSet<u32>) -> Self {
        let forward = used
            .iter()
            .enumerate()
            .map(|(slot, &raw)| (raw, slot as u32 + 1))
            .collect();
        RemapTable { forward }
    }

    /// Returns the compacted index for a raw index, if it was used.
    #[must_use]
    pub fn get(&self, raw: u32) -> Option<u32> {
        self.forward.get(&raw).copied()
    }

    /// Returns the compacted index for a raw index.
    ///
    /// # Errors
    /// Fails with [`CrushError::UnknownTile`] if the index was never in
    /// the used set.
    pub fn lookup(&self, raw: u32) -> Result<u32, CrushError> {
        self.get(raw).ok_or(CrushError::UnknownTile(raw))
    }

    /// Returns the number of mapped tiles.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns whether the table is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterates `(raw, compacted)` pairs in ascending raw order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.forward.iter().map(|(&raw, &compact)| (raw, compact))
    }
}

/// Collects the raw indices of every tile the map actually places.
///
/// Non-tile layers are skipped entirely; flip bits are stripped and
/// empty references contribute nothing.
///
/// # Errors
/// Fails if any tile layer's payload cannot be decoded.
pub fn used_tiles(map: &MapDocument) -> Result<BTreeSet<u32>, CrushError> {
    let mut used = BTreeSet::new();
    for layer in &map.layers {
        let Layer::Tiles(layer) = layer else { continue };
        for tile in layer.decode_data()? {
            if !tile.is_empty() {
                used.insert(tile.index());
            }
        }
    }
    Ok(used)
}

/// File names the rewritten documents point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    /// File name the map's tileset reference is repointed to.
    pub tileset_source: String,
    /// File name the tileset's image reference is repointed to.
    pub image_source: String,
}

/// Everything a successful run produces.
pub struct Crushed {
    /// The rewritten map document.
    pub map: MapDocument,
    /// The rewritten tileset document.
    pub tileset: TilesetDocument,
    /// The freshly packed atlas image.
    pub atlas: RgbaImage,
    /// How many tiles the map uses.
    pub used: u32,
    /// How many tiles the source tileset held.
    pub total: u32,
}

/// Runs the whole pipeline: scan usage, build the remap table, pack the
/// atlas, and rewrite both documents.
///
/// Nothing is written anywhere; the caller decides what to do with the
/// returned documents and image.
///
/// # Errors
/// Fails without producing any output if the map is outside this tool's
/// scope (several tilesets, an embedded tileset, a gid base other than 1,
/// no used tiles), if any layer fails to decode, or if the map references
/// tiles the tileset does not hold.
pub fn crush(
    map: MapDocument,
    tileset: TilesetDocument,
    source_atlas: &RgbaImage,
    names: &OutputNames,
) -> Result<Crushed, CrushError> {
    map.tileset_source()?;
    let (image_width, image_height) = source_atlas.dimensions();
    let geometry = tileset.geometry(image_width, image_height)?;
    let used = used_tiles(&map)?;
    if used.is_empty() {
        return Err(CrushError::UnsupportedFeature(
            "a map that references no tiles at all".to_string(),
        ));
    }
    if let Some(&highest) = used.last() {
        if highest > geometry.tile_count {
            return Err(CrushError::InvalidDocument(format!(
                "map references tile {highest} but the tileset holds {} tiles",
                geometry.tile_count
            )));
        }
    }
    let remap = RemapTable::build(&used);
    let (atlas, new_geometry) = build_atlas(source_atlas, &geometry, &remap)?;
    let map = map.rewrite(&remap, names)?;
    let tileset = tileset.rewrite(&remap, &new_geometry, names);
    Ok(Crushed {
        map,
        tileset,
        atlas,
        used: remap.len() as u32,
        total: geometry.tile_count,
    })
}

/// Derives an output file name by inserting a suffix before the extension.
///
/// Non-UTF-8 stems and extensions are replaced lossily.
#[must_use]
pub fn crushed_filename(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(OsStr::to_string_lossy)
        .unwrap_or_default();
    let mut name = format!("{stem}{suffix}");
    if let Some(extension) = path.extension() {
        name.push('.');
        name.push_str(&extension.to_string_lossy());
    }
    path.with_file_name(name)
}

fn stem(filename: &str) -> &str {
    filename.rsplit_once('.').map_or(filename, |(stem, _)| stem)
}

fn set_attr(attributes: &mut Vec<(String, String)>, name: &str, value: String) {
    if let Some(attr) = attributes.iter_mut().find(|(n, _)| n == name) {
        attr.1 = value;
    } else {
        attributes.push((name.to_string(), value));
    }
}
