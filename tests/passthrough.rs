use const_str::concat;
use image::RgbaImage;
use std::collections::BTreeSet;
use std::path::Path;
use tilecrush::{
    crush, crushed_filename, Compression, CrushError, Encoding, Gid, Layer, MapDocument,
    OutputNames, RemapTable, TileLayer, TilesetDocument,
};

const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

const SIMPLE_TILESET: &str = concat!(
    PROLOG,
    "<tileset name=\"tiles\" tilewidth=\"16\" tileheight=\"16\" tilecount=\"100\" columns=\"10\">\n",
    " <image source=\"tiles.png\" width=\"160\" height=\"160\"/>\n",
    "</tileset>\n",
);

const OBJECTS: &str = concat!(
    " <objectgroup id=\"3\" name=\"triggers\">\n",
    "  <object id=\"1\" name=\"spawn  point\" x=\"24.5\" y=\"8\">\n",
    "   <point/>\n",
    "  </object>\n",
    " </objectgroup>\n",
);

const RICH_MAP: &str = concat!(
    PROLOG,
    "<!-- hand tuned; do not regenerate -->\n",
    "<map version=\"1.10\" width=\"2\" height=\"2\" tilewidth=\"16\" tileheight=\"16\">\n",
    " <properties>\n",
    "  <property name=\"music\" value=\"caves.ogg\"/>\n",
    " </properties>\n",
    " <tileset firstgid=\"1\" source=\"tiles.tsx\"/>\n",
    OBJECTS,
    " <group id=\"4\" name=\"parallax\">\n",
    "  <layer id=\"5\" name=\"back\" width=\"2\" height=\"2\">\n",
    "   <data encoding=\"csv\">\n",
    "9,0,\n",
    "9,3\n",
    "</data>\n",
    "  </layer>\n",
    " </group>\n",
    " <imagelayer id=\"6\" name=\"sky\">\n",
    "  <image source=\"sky.png\" width=\"256\" height=\"64\"/>\n",
    " </imagelayer>\n",
    "</map>\n",
);

fn names() -> OutputNames {
    OutputNames {
        tileset_source: "out.tsx".to_string(),
        image_source: "out.png".to_string(),
    }
}

#[test]
fn untouched_elements_survive_byte_for_byte() -> Result<(), CrushError> {
    let map = MapDocument::parse(RICH_MAP)?;
    assert_eq!(map.layers.len(), 3);

    let tileset = TilesetDocument::parse(SIMPLE_TILESET)?;
    let crushed = crush(map, tileset, &RgbaImage::new(160, 160), &names())?;
    let out = crushed.map.to_tmx();

    assert!(out.starts_with(concat!(PROLOG, "<!-- hand tuned; do not regenerate -->\n")));
    assert!(out.contains(" <properties>\n  <property name=\"music\" value=\"caves.ogg\"/>\n </properties>\n"));
    assert!(out.contains(OBJECTS));
    assert!(out.contains(" <group id=\"4\" name=\"parallax\">\n"));
    assert!(out.contains(" <imagelayer id=\"6\" name=\"sky\">\n  <image source=\"sky.png\" width=\"256\" height=\"64\"/>\n </imagelayer>\n"));
    assert!(out.contains("source=\"out.tsx\""));
    // The grouped layer itself is renumbered: 3 -> 1, 9 -> 2.
    assert!(out.contains("2,0,\n2,1"));
    Ok(())
}

#[test]
fn layers_keep_their_encodings() -> Result<(), Box<dyn std::error::Error>> {
    let mut seed = TileLayer::new("deco", 4, 1, Encoding::Base64, Compression::Zlib);
    seed.encode_data(&[Gid(3), Gid(3), Gid(7), Gid(50)])?;
    let map_text = [
        PROLOG,
        "<map version=\"1.10\" width=\"4\" height=\"1\" tilewidth=\"16\" tileheight=\"16\">\n",
        " <tileset firstgid=\"1\" source=\"tiles.tsx\"/>\n",
        " <layer id=\"1\" name=\"ground\" width=\"4\" height=\"1\">\n",
        "  <data encoding=\"csv\">\n3,3,7,50\n</data>\n",
        " </layer>\n",
        " <layer id=\"2\" name=\"deco\" width=\"4\" height=\"1\">\n",
        "  <data encoding=\"base64\" compression=\"zlib\">\n",
        &seed.data,
        "\n</data>\n",
        " </layer>\n",
        "</map>\n",
    ]
    .concat();

    let map = MapDocument::parse(&map_text)?;
    let tileset = TilesetDocument::parse(SIMPLE_TILESET)?;
    let crushed = crush(map, tileset, &RgbaImage::new(160, 160), &names())?;
    let out = crushed.map.to_tmx();

    assert!(out.contains("<data encoding=\"csv\">"));
    assert!(out.contains("<data encoding=\"base64\" compression=\"zlib\">"));

    // Both layers decode to the same renumbered tiles.
    let reparsed = MapDocument::parse(&out)?;
    for layer in &reparsed.layers {
        let Layer::Tiles(layer) = layer else { panic!("lost a tile layer") };
        assert_eq!(layer.decode_data()?, [Gid(1), Gid(1), Gid(2), Gid(3)]);
    }
    Ok(())
}

const FANCY_TILESET: &str = concat!(
    PROLOG,
    "<tileset version=\"1.10\" name=\"tiles\" tilewidth=\"16\" tileheight=\"16\" ",
    "spacing=\"1\" margin=\"2\" tilecount=\"100\" columns=\"10\">\n",
    " <image source=\"tiles.png\" trans=\"ff00ff\" width=\"173\" height=\"173\"/>\n",
    " <properties>\n",
    "  <property name=\"author\" value=\"sam\"/>\n",
    " </properties>\n",
    " <tile id=\"2\" terrain=\"0,0,1,1\" probability=\"0.5\">\n",
    "  <properties>\n",
    "   <property name=\"kind\" value=\"grass\"/>\n",
    "  </properties>\n",
    " </tile>\n",
    " <tile id=\"6\" type=\"hazard\"/>\n",
    " <tile id=\"49\">\n",
    "  <animation>\n",
    "   <frame tileid=\"49\" duration=\"100\"/>\n",
    "  </animation>\n",
    " </tile>\n",
    " <terraintypes>\n",
    "  <terrain name=\"dirt\" tile=\"0\"/>\n",
    " </terraintypes>\n",
    " <wangsets>\n",
    "  <wangset name=\"paths\" type=\"corner\" tile=\"-1\"/>\n",
    " </wangsets>\n",
    "</tileset>\n",
);

#[test]
fn tileset_entries_are_renumbered_and_pruned() -> Result<(), CrushError> {
    let tileset = TilesetDocument::parse(FANCY_TILESET)?;
    let geometry = tileset.geometry(173, 173)?;
    assert_eq!((geometry.columns, geometry.tile_count), (10, 100));

    // Tiles 3 and 7 survive; the animated tile 50 does not.
    let used = [3_u32, 7].into_iter().collect::<BTreeSet<_>>();
    let remap = RemapTable::build(&used);
    let rewritten = tileset.rewrite(&remap, &geometry.compact(2), &names());
    let out = rewritten.to_tsx();

    assert!(out.contains("name=\"out\""));
    assert!(out.contains("tilecount=\"2\""));
    assert!(out.contains("columns=\"2\""));
    // Only source and size change on the image; trans rides along.
    assert!(out.contains("<image source=\"out.png\" trans=\"ff00ff\" width=\"37\" height=\"20\"/>"));

    // Entry ids are 0-based: raw 3 becomes compacted 1, entry id 0.
    assert!(out.contains("<tile id=\"0\">"));
    assert!(out.contains("value=\"grass\""));
    assert!(out.contains("<tile id=\"1\" type=\"hazard\"/>"));
    assert!(!out.contains("id=\"49\""));
    assert!(!out.contains("<animation>"));

    // Renumbering invalidates terrain and wang references, so both go.
    assert!(!out.contains("terrain=\"0,0,1,1\""));
    assert!(!out.contains("probability"));
    assert!(!out.contains("<terraintypes>"));
    assert!(!out.contains("<wangsets>"));

    // The tileset's own properties are untouched.
    assert!(out.contains(" <properties>\n  <property name=\"author\" value=\"sam\"/>\n </properties>"));
    Ok(())
}

#[test]
fn output_names_insert_the_suffix() {
    assert_eq!(
        crushed_filename(Path::new("maps/level.tmx"), "-crushed"),
        Path::new("maps/level-crushed.tmx")
    );
    assert_eq!(
        crushed_filename(Path::new("level.backup.tmx"), "-crushed"),
        Path::new("level.backup-crushed.tmx")
    );
    assert_eq!(
        crushed_filename(Path::new("level"), "-min"),
        Path::new("level-min")
    );
}
