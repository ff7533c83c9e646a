use crate::{
    Crushed, Gid, ImageRef, Layer, MapDocument, OtherLayer, TileLayer, TilesetDocument, TilesetRef,
    TsxChild,
};
use std::fmt;
use std::fmt::{Debug, Display, Formatter, Write};

impl Display for Gid {
    // CSV cells are the raw gid word, flip bits included.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for Gid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            // Write only the raw word in pretty print
            return write!(f, "0x{:08X}", self.0);
        }
        if self.is_empty() {
            return f.write_str("Gid(empty)");
        }
        write!(f, "Gid({}", self.index())?;
        if self.flip_h() || self.flip_v() || self.flip_d() {
            f.write_str(", ")?;
            if self.flip_h() {
                f.write_str("H")?;
            }
            if self.flip_v() {
                f.write_str("V")?;
            }
            if self.flip_d() {
                f.write_str("D")?;
            }
        }
        f.write_str(")")
    }
}

impl Debug for MapDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "MapDocument {{")?;
        let mut buf = String::new();
        writeln!(buf, "tile_width: {},", self.tile_width)?;
        writeln!(buf, "tile_height: {},", self.tile_height)?;
        writeln!(buf, "tilesets: {:#?},", self.tilesets)?;
        writeln!(buf, "layers: {:#?}", self.layers)?;
        // Pad lines
        for line in buf.lines() {
            writeln!(f, "    {line}")?;
        }
        write!(f, "}}")
    }
}

impl Debug for TilesetRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TilesetRef {{ first_gid: {}, source: {:?} }}",
            self.first_gid, self.source
        )
    }
}

impl Debug for ImageRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImageRef {{ source: {:?}, width: {:?}, height: {:?} }}",
            self.source, self.width, self.height
        )
    }
}

impl Debug for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Tiles(layer) => layer.fmt(f),
            Layer::Other(layer) => layer.fmt(f),
        }
    }
}

impl Debug for TileLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "TileLayer {{")?;
            let mut buf = String::new();
            writeln!(buf, "name: {:?},", self.name)?;
            writeln!(buf, "width: {},", self.width)?;
            writeln!(buf, "height: {},", self.height)?;
            writeln!(buf, "encoding: {:?},", self.encoding)?;
            writeln!(buf, "compression: {:?},", self.compression)?;
            writeln!(buf, "data: {:?}", Payload(&self.data))?;
            // Pad lines
            for line in buf.lines() {
                writeln!(f, "    {line}")?;
            }
            write!(f, "}}")
        } else {
            write!(
                f,
                "TileLayer {{ name: {:?}, width: {}, height: {}, encoding: {:?}, compression: {:?}, data: {:?} }}",
                self.name,
                self.width,
                self.height,
                self.encoding,
                self.compression,
                Payload(&self.data)
            )
        }
    }
}

impl Debug for OtherLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OtherLayer {{ kind: {:?}, name: {:?} }}",
            self.kind, self.name
        )
    }
}

impl Debug for TilesetDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let entries = self
            .children
            .iter()
            .filter(|child| matches!(child, TsxChild::Tile(_)))
            .count();
        writeln!(f, "TilesetDocument {{")?;
        let mut buf = String::new();
        writeln!(buf, "name: {:?},", self.name)?;
        writeln!(buf, "tile_width: {},", self.tile_width)?;
        writeln!(buf, "tile_height: {},", self.tile_height)?;
        writeln!(buf, "spacing: {},", self.spacing)?;
        writeln!(buf, "margin: {},", self.margin)?;
        writeln!(buf, "tile_count: {:?},", self.tile_count)?;
        writeln!(buf, "columns: {:?},", self.columns)?;
        writeln!(buf, "image: {:?},", self.image)?;
        writeln!(buf, "tile_entries: {entries}")?;
        // Pad lines
        for line in buf.lines() {
            writeln!(f, "    {line}")?;
        }
        write!(f, "}}")
    }
}

impl Debug for Crushed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (width, height) = self.atlas.dimensions();
        writeln!(f, "Crushed {{")?;
        let mut buf = String::new();
        writeln!(buf, "map: {:?},", self.map)?;
        writeln!(buf, "tileset: {:?},", self.tileset)?;
        writeln!(buf, "atlas: {width}x{height},")?;
        writeln!(buf, "used: {},", self.used)?;
        writeln!(buf, "total: {}", self.total)?;
        // Pad lines
        for line in buf.lines() {
            writeln!(f, "    {line}")?;
        }
        write!(f, "}}")
    }
}

// Payload text can run to megabytes; show only the head.
struct Payload<'a>(&'a str);

impl Debug for Payload<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const LIMIT: usize = 64;
        if self.0.len() <= LIMIT {
            write!(f, "{:?}", self.0)
        } else {
            let mut end = LIMIT;
            while !self.0.is_char_boundary(end) {
                end -= 1;
            }
            write!(f, "{:?}... ({} bytes)", &self.0[..end], self.0.len())
        }
    }
}
