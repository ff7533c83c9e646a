//! XML parsing and re-serialization for map and tileset documents.
//!
//! Parsing pulls out the handful of elements this tool rewrites and
//! remembers their byte ranges in the source text. Serialization then
//! splices replacements into those ranges, so everything the tool does
//! not touch survives byte-for-byte.

use roxmltree::{Document, Node};
use std::ops::Range;

use crate::{
    Compression, CrushError, Encoding, ImageRef, Layer, MapDocument, OtherLayer, TileEntry,
    TileLayer, TilesetDocument, TilesetRef, TsxChild,
};

impl MapDocument {
    /// Parses a map document from its XML text.
    ///
    /// # Errors
    /// Fails with [`CrushError::XmlError`] on malformed XML, with
    /// [`CrushError::InvalidDocument`] when the root is not a `<map>` or
    /// required attributes are missing, with [`CrushError::UnsupportedFormat`]
    /// when a layer declares a format this tool does not read, and with
    /// [`CrushError::UnsupportedFeature`] on chunked layer data.
    pub fn parse(text: &str) -> Result<Self, CrushError> {
        let doc = Document::parse(text)?;
        let root = doc.root_element();
        if root.tag_name().name() != "map" {
            return Err(CrushError::InvalidDocument(format!(
                "expected a <map> document, found <{}>",
                root.tag_name().name()
            )));
        }
        let tile_width = parse_attr_u32(root, "tilewidth")?;
        let tile_height = parse_attr_u32(root, "tileheight")?;
        let mut tilesets = Vec::new();
        let mut layers = Vec::new();
        collect_map_children(root, &mut tilesets, &mut layers)?;
        Ok(MapDocument {
            src: text.to_string(),
            tile_width,
            tile_height,
            tilesets,
            layers,
        })
    }

    /// Serializes the map back to TMX text.
    ///
    /// Only tileset references and tile layer payloads are re-emitted;
    /// every other byte of the original text is copied through.
    #[must_use]
    pub fn to_tmx(&self) -> String {
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for tileset in &self.tilesets {
            if tileset.source.is_some() {
                edits.push((tileset.range.clone(), tileset.to_element()));
            }
        }
        for layer in &self.layers {
            if let Layer::Tiles(layer) = layer {
                edits.push((layer.data_range.clone(), layer.data_element()));
            }
        }
        edits.sort_by_key(|(range, _)| range.start);
        let mut out = String::with_capacity(self.src.len());
        let mut cursor = 0;
        for (range, replacement) in edits {
            out.push_str(&self.src[cursor..range.start]);
            out.push_str(&replacement);
            cursor = range.end;
        }
        out.push_str(&self.src[cursor..]);
        out
    }
}

impl TilesetRef {
    fn to_element(&self) -> String {
        let mut out = String::from("<tileset");
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push_str("/>");
        out
    }
}

impl TileLayer {
    fn data_element(&self) -> String {
        let mut out = String::from("<data encoding=\"");
        out.push_str(self.encoding.as_str());
        out.push('"');
        if let Some(compression) = self.compression.as_attr() {
            out.push_str(" compression=\"");
            out.push_str(compression);
            out.push('"');
        }
        out.push_str(">\n");
        out.push_str(&self.data);
        out.push_str("\n</data>");
        out
    }
}

impl TilesetDocument {
    /// Parses a tileset document from its TSX text.
    ///
    /// # Errors
    /// Fails with [`CrushError::XmlError`] on malformed XML, with
    /// [`CrushError::InvalidDocument`] when the root is not a `<tileset>`
    /// or required attributes are missing or zero, and with
    /// [`CrushError::UnsupportedFeature`] on an image collection tileset.
    pub fn parse(text: &str) -> Result<Self, CrushError> {
        let doc = Document::parse(text)?;
        let root = doc.root_element();
        if root.tag_name().name() != "tileset" {
            return Err(CrushError::InvalidDocument(format!(
                "expected a <tileset> document, found <{}>",
                root.tag_name().name()
            )));
        }
        let name = require_attr(root, "name")?.to_string();
        let tile_width = parse_attr_u32(root, "tilewidth")?;
        let tile_height = parse_attr_u32(root, "tileheight")?;
        if tile_width == 0 || tile_height == 0 {
            return Err(CrushError::InvalidDocument(format!(
                "tileset \"{name}\" declares zero-size tiles"
            )));
        }
        let spacing = opt_attr_u32(root, "spacing")?.unwrap_or(0);
        let margin = opt_attr_u32(root, "margin")?.unwrap_or(0);
        let tile_count = opt_attr_u32(root, "tilecount")?;
        let columns = opt_attr_u32(root, "columns")?;
        let root_attrs = root
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();
        let mut image = None;
        let mut children = Vec::new();
        for child in root.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "image" => {
                    if image.is_some() {
                        return Err(CrushError::InvalidDocument(format!(
                            "tileset \"{name}\" has more than one <image>"
                        )));
                    }
                    image = Some(ImageRef {
                        source: require_attr(child, "source")?.to_string(),
                        width: opt_attr_u32(child, "width")?,
                        height: opt_attr_u32(child, "height")?,
                        attributes: child
                            .attributes()
                            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                            .collect(),
                    });
                    children.push(TsxChild::Image);
                }
                "tile" => children.push(TsxChild::Tile(parse_tile_entry(child)?)),
                other => children.push(TsxChild::Opaque {
                    name: other.to_string(),
                    range: child.range(),
                }),
            }
        }
        let Some(image) = image else {
            return Err(CrushError::UnsupportedFeature(
                "an image collection tileset (no <image> element)".to_string(),
            ));
        };
        Ok(TilesetDocument {
            src: text.to_string(),
            name,
            tile_width,
            tile_height,
            spacing,
            margin,
            tile_count,
            columns,
            image,
            root_attrs,
            children,
            root_range: root.range(),
        })
    }

    /// Serializes the tileset back to TSX text.
    ///
    /// The root element and its direct children are re-emitted; the
    /// prolog, any trailing text, and the interiors of elements this tool
    /// does not model are copied through from the original text.
    #[must_use]
    pub fn to_tsx(&self) -> String {
        let mut out = String::with_capacity(self.src.len());
        out.push_str(&self.src[..self.root_range.start]);
        out.push_str("<tileset");
        let mut wrote_tilecount = false;
        let mut wrote_columns = false;
        for (name, value) in &self.root_attrs {
            let value = match name.as_str() {
                "name" => self.name.clone(),
                "tilecount" => {
                    wrote_tilecount = true;
                    self.tile_count.map_or_else(|| value.clone(), |n| n.to_string())
                }
                "columns" => {
                    wrote_columns = true;
                    self.columns.map_or_else(|| value.clone(), |n| n.to_string())
                }
                _ => value.clone(),
            };
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(&value));
            out.push('"');
        }
        if !wrote_tilecount {
            if let Some(count) = self.tile_count {
                out.push_str(&format!(" tilecount=\"{count}\""));
            }
        }
        if !wrote_columns {
            if let Some(columns) = self.columns {
                out.push_str(&format!(" columns=\"{columns}\""));
            }
        }
        out.push('>');
        for child in &self.children {
            out.push_str("\n ");
            match child {
                TsxChild::Image => out.push_str(&self.image_element()),
                TsxChild::Tile(tile) => out.push_str(&self.tile_element(tile)),
                TsxChild::Opaque { range, .. } => out.push_str(&self.src[range.clone()]),
            }
        }
        out.push_str("\n</tileset>");
        out.push_str(&self.src[self.root_range.end..]);
        out
    }

    fn image_element(&self) -> String {
        let mut out = String::from("<image");
        for (name, value) in &self.image.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push_str("/>");
        out
    }

    fn tile_element(&self, tile: &TileEntry) -> String {
        let mut out = format!("<tile id=\"{}\"", tile.id);
        for (name, value) in &tile.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        if tile.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            for range in &tile.children {
                out.push_str("\n  ");
                out.push_str(&self.src[range.clone()]);
            }
            out.push_str("\n </tile>");
        }
        out
    }
}

fn collect_map_children(
    node: Node<'_, '_>,
    tilesets: &mut Vec<TilesetRef>,
    layers: &mut Vec<Layer>,
) -> Result<(), CrushError> {
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "tileset" => tilesets.push(parse_tileset_ref(child)?),
            "layer" => layers.push(Layer::Tiles(parse_tile_layer(child)?)),
            "objectgroup" | "imagelayer" => layers.push(Layer::Other(OtherLayer {
                kind: child.tag_name().name().to_string(),
                name: child.attribute("name").unwrap_or_default().to_string(),
                range: child.range(),
            })),
            "group" => collect_map_children(child, tilesets, layers)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_tileset_ref(node: Node<'_, '_>) -> Result<TilesetRef, CrushError> {
    let first_gid = parse_attr_u32(node, "firstgid")?;
    let attributes = node
        .attributes()
        .map(|attr| (attr.name().to_string(), attr.value().to_string()))
        .collect();
    Ok(TilesetRef {
        first_gid,
        source: node.attribute("source").map(str::to_string),
        attributes,
        range: node.range(),
    })
}

fn parse_tile_layer(node: Node<'_, '_>) -> Result<TileLayer, CrushError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let width = parse_attr_u32(node, "width")?;
    let height = parse_attr_u32(node, "height")?;
    let Some(data) = node.children().find(|child| child.has_tag_name("data")) else {
        return Err(CrushError::InvalidDocument(format!(
            "layer \"{name}\" has no <data> element"
        )));
    };
    if data.children().any(|child| child.has_tag_name("chunk")) {
        return Err(CrushError::UnsupportedFeature(
            "chunked layer data (infinite maps)".to_string(),
        ));
    }
    let encoding = match data.attribute("encoding") {
        Some("csv") => Encoding::Csv,
        Some("base64") => Encoding::Base64,
        Some(other) => {
            return Err(CrushError::UnsupportedFormat(
                name,
                format!("encoding \"{other}\""),
            ));
        }
        None => {
            return Err(CrushError::UnsupportedFormat(
                name,
                "plain xml tile elements".to_string(),
            ));
        }
    };
    let compression = match (encoding, data.attribute("compression")) {
        (_, None) => Compression::None,
        (Encoding::Csv, Some(value)) => {
            return Err(CrushError::UnsupportedFormat(
                name,
                format!("csv with compression \"{value}\""),
            ));
        }
        (Encoding::Base64, Some("zlib")) => Compression::Zlib,
        (Encoding::Base64, Some("gzip")) => Compression::Gzip,
        (Encoding::Base64, Some("zstd")) => Compression::Zstd,
        (Encoding::Base64, Some(other)) => {
            return Err(CrushError::UnsupportedFormat(
                name,
                format!("compression \"{other}\""),
            ));
        }
    };
    Ok(TileLayer {
        name,
        width,
        height,
        encoding,
        compression,
        data: data.text().unwrap_or_default().trim().to_string(),
        data_range: data.range(),
    })
}

fn parse_tile_entry(node: Node<'_, '_>) -> Result<TileEntry, CrushError> {
    let id = parse_attr_u32(node, "id")?;
    let attributes = node
        .attributes()
        .filter(|attr| attr.name() != "id")
        .map(|attr| (attr.name().to_string(), attr.value().to_string()))
        .collect();
    let children = node
        .children()
        .filter(Node::is_element)
        .map(|child| child.range())
        .collect();
    Ok(TileEntry {
        id,
        attributes,
        children,
    })
}

fn require_attr<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<&'a str, CrushError> {
    node.attribute(name).ok_or_else(|| {
        CrushError::InvalidDocument(format!(
            "<{}> element is missing its {name} attribute",
            node.tag_name().name()
        ))
    })
}

fn parse_attr_u32(node: Node<'_, '_>, name: &str) -> Result<u32, CrushError> {
    let value = require_attr(node, name)?;
    parse_u32(node, name, value)
}

fn opt_attr_u32(node: Node<'_, '_>, name: &str) -> Result<Option<u32>, CrushError> {
    node.attribute(name)
        .map(|value| parse_u32(node, name, value))
        .transpose()
}

fn parse_u32(node: Node<'_, '_>, name: &str, value: &str) -> Result<u32, CrushError> {
    value.parse().map_err(|_| {
        CrushError::InvalidDocument(format!(
            "<{}> has a non-numeric {name} attribute: \"{value}\"",
            node.tag_name().name()
        ))
    })
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
