use const_str::concat;
use image::RgbaImage;
use std::collections::BTreeSet;
use tilecrush::{
    crush, CrushError, MapDocument, OutputNames, RemapTable, TilesetDocument,
};

const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const MAP_OPEN: &str =
    "<map version=\"1.10\" width=\"2\" height=\"1\" tilewidth=\"16\" tileheight=\"16\">\n";
const ONE_TILESET: &str = " <tileset firstgid=\"1\" source=\"tiles.tsx\"/>\n";
const LAYER_OPEN: &str = " <layer id=\"1\" name=\"ground\" width=\"2\" height=\"1\">\n";

const NOT_XML: &str = "these are not the tiles you are looking for";

const NOT_A_MAP: &str = concat!(
    PROLOG,
    "<tileset name=\"tiles\" tilewidth=\"16\" tileheight=\"16\"/>\n",
);

const MISSING_TILE_SIZE: &str = concat!(
    PROLOG,
    "<map version=\"1.10\" width=\"2\" height=\"1\">\n", // No tilewidth or tileheight
    ONE_TILESET,
    "</map>\n",
);

const BAD_ENCODING: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    "  <data encoding=\"base85\">foo</data>\n",
    " </layer>\n</map>\n",
);

const COMPRESSED_CSV: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    "  <data encoding=\"csv\" compression=\"zlib\">1,2</data>\n",
    " </layer>\n</map>\n",
);

const NO_ENCODING: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    "  <data>\n   <tile gid=\"1\"/>\n   <tile gid=\"2\"/>\n  </data>\n",
    " </layer>\n</map>\n",
);

const CHUNKED: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    "  <data encoding=\"csv\">\n",
    "   <chunk x=\"0\" y=\"0\" width=\"16\" height=\"16\">1,2</chunk>\n",
    "  </data>\n",
    " </layer>\n</map>\n",
);

const NO_DATA: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    " </layer>\n</map>\n",
);

const TWO_TILESETS: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    " <tileset firstgid=\"101\" source=\"more-tiles.tsx\"/>\n",
    LAYER_OPEN,
    "  <data encoding=\"csv\">1,2</data>\n",
    " </layer>\n</map>\n",
);

const EMBEDDED_TILESET: &str = concat!(
    PROLOG,
    MAP_OPEN,
    " <tileset firstgid=\"1\" name=\"inline\" tilewidth=\"16\" tileheight=\"16\" ",
    "tilecount=\"4\" columns=\"2\">\n",
    "  <image source=\"tiles.png\" width=\"32\" height=\"32\"/>\n",
    " </tileset>\n",
    "</map>\n",
);

const OFFSET_FIRSTGID: &str = concat!(
    PROLOG,
    MAP_OPEN,
    " <tileset firstgid=\"9\" source=\"tiles.tsx\"/>\n",
    "</map>\n",
);

const NO_TILESET: &str = concat!(
    PROLOG,
    MAP_OPEN,
    LAYER_OPEN,
    "  <data encoding=\"csv\">1,2</data>\n",
    " </layer>\n</map>\n",
);

const NOT_A_TILESET: &str = concat!(PROLOG, MAP_OPEN, "</map>\n");

const IMAGE_COLLECTION: &str = concat!(
    PROLOG,
    "<tileset name=\"scraps\" tilewidth=\"16\" tileheight=\"16\" tilecount=\"1\">\n",
    " <tile id=\"0\">\n",
    "  <image source=\"scrap0.png\" width=\"16\" height=\"16\"/>\n",
    " </tile>\n",
    "</tileset>\n",
);

const ZERO_TILE_SIZE: &str = concat!(
    PROLOG,
    "<tileset name=\"tiles\" tilewidth=\"0\" tileheight=\"16\">\n",
    " <image source=\"tiles.png\" width=\"160\" height=\"160\"/>\n",
    "</tileset>\n",
);

const SIMPLE_TILESET: &str = concat!(
    PROLOG,
    "<tileset name=\"tiles\" tilewidth=\"16\" tileheight=\"16\" tilecount=\"100\" columns=\"10\">\n",
    " <image source=\"tiles.png\" width=\"160\" height=\"160\"/>\n",
    "</tileset>\n",
);

// Declares image dimensions that contradict the actual 160x160 atlas.
const LYING_TILESET: &str = concat!(
    PROLOG,
    "<tileset name=\"tiles\" tilewidth=\"16\" tileheight=\"16\" tilecount=\"200\" columns=\"20\">\n",
    " <image source=\"tiles.png\" width=\"320\" height=\"160\"/>\n",
    "</tileset>\n",
);

const OUT_OF_RANGE_MAP: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    "  <data encoding=\"csv\">400,1</data>\n",
    " </layer>\n</map>\n",
);

const EMPTY_MAP: &str = concat!(
    PROLOG,
    MAP_OPEN,
    ONE_TILESET,
    LAYER_OPEN,
    "  <data encoding=\"csv\">0,0</data>\n",
    " </layer>\n</map>\n",
);

fn names() -> OutputNames {
    OutputNames {
        tileset_source: "out.tsx".to_string(),
        image_source: "out.png".to_string(),
    }
}

#[test]
fn invalid_documents() {
    assert!(matches!(
        dbg!(MapDocument::parse(NOT_XML)).unwrap_err(),
        CrushError::XmlError(_)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(NOT_A_MAP)).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(MISSING_TILE_SIZE)).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(NO_DATA)).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    assert!(matches!(
        dbg!(TilesetDocument::parse(NOT_A_TILESET)).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    assert!(matches!(
        dbg!(TilesetDocument::parse(ZERO_TILE_SIZE)).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    assert!(matches!(
        dbg!(TilesetDocument::parse(IMAGE_COLLECTION)).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));
}

#[test]
fn unsupported_layer_formats() {
    assert!(matches!(
        dbg!(MapDocument::parse(BAD_ENCODING)).unwrap_err(),
        CrushError::UnsupportedFormat(..)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(COMPRESSED_CSV)).unwrap_err(),
        CrushError::UnsupportedFormat(..)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(NO_ENCODING)).unwrap_err(),
        CrushError::UnsupportedFormat(..)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(CHUNKED)).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));
}

#[test]
fn unsupported_map_shapes() -> Result<(), CrushError> {
    assert!(matches!(
        dbg!(MapDocument::parse(TWO_TILESETS)?.tileset_source()).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(EMBEDDED_TILESET)?.tileset_source()).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(OFFSET_FIRSTGID)?.tileset_source()).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));
    assert!(matches!(
        dbg!(MapDocument::parse(NO_TILESET)?.tileset_source()).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    Ok(())
}

#[test]
fn crush_rejects_bad_references() -> Result<(), CrushError> {
    let atlas = RgbaImage::new(160, 160);

    let map = MapDocument::parse(TWO_TILESETS)?;
    let tileset = TilesetDocument::parse(SIMPLE_TILESET)?;
    assert!(matches!(
        crush(map, tileset, &atlas, &names()).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));

    let map = MapDocument::parse(EMPTY_MAP)?;
    let tileset = TilesetDocument::parse(SIMPLE_TILESET)?;
    assert!(matches!(
        crush(map, tileset, &atlas, &names()).unwrap_err(),
        CrushError::UnsupportedFeature(_)
    ));

    let map = MapDocument::parse(OUT_OF_RANGE_MAP)?;
    let tileset = TilesetDocument::parse(SIMPLE_TILESET)?;
    assert!(matches!(
        crush(map, tileset, &atlas, &names()).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));

    let map = MapDocument::parse(EMPTY_MAP)?;
    let tileset = TilesetDocument::parse(LYING_TILESET)?;
    assert!(matches!(
        crush(map, tileset, &atlas, &names()).unwrap_err(),
        CrushError::InvalidDocument(_)
    ));
    Ok(())
}

#[test]
fn remap_reports_unknown_tiles() {
    let used = [3_u32, 7].into_iter().collect::<BTreeSet<_>>();
    let remap = RemapTable::build(&used);
    assert_eq!(remap.len(), 2);
    assert_eq!(remap.get(3), Some(1));
    assert_eq!(remap.get(7), Some(2));
    assert_eq!(remap.get(9), None);
    assert!(matches!(
        dbg!(remap.lookup(9)).unwrap_err(),
        CrushError::UnknownTile(9)
    ));
}
