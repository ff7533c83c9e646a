use clap::Parser;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use tilecrush::{crush, crushed_filename, MapDocument, OutputNames, TilesetDocument};

/// Shrinks a Tiled map's tileset and atlas image down to the tiles the
/// map actually uses.
///
/// Reads the map, its single external tileset, and the tileset's atlas
/// image, then writes a crushed copy of all three next to the map. The
/// input files are never touched; existing outputs are renamed to .bak
/// before being replaced.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The map to crush.
    map: PathBuf,
    /// Where to write the crushed map. The tileset and image are written
    /// next to it with .tsx and .png extensions.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Suffix inserted before the extension when deriving output names.
    #[arg(long, default_value = "-crushed")]
    suffix: String,
    /// Run pngcrush over the atlas image after writing it.
    #[arg(long)]
    pngcrush: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let map_text = fs::read_to_string(&args.map)?;
    let map = MapDocument::parse(&map_text)?;

    let map_dir = args.map.parent().unwrap_or(Path::new(""));
    let tsx_path = map_dir.join(map.tileset_source()?);
    let tsx_text = fs::read_to_string(&tsx_path)?;
    let tileset = TilesetDocument::parse(&tsx_text)?;

    let tsx_dir = tsx_path.parent().unwrap_or(Path::new(""));
    let image_path = tsx_dir.join(&tileset.image.source);
    let atlas = image::open(&image_path)?.into_rgba8();

    let out_map = args
        .out
        .clone()
        .unwrap_or_else(|| crushed_filename(&args.map, &args.suffix));
    let out_tsx = out_map.with_extension("tsx");
    let out_png = out_map.with_extension("png");
    let names = OutputNames {
        tileset_source: file_name(&out_tsx),
        image_source: file_name(&out_png),
    };

    let crushed = crush(map, tileset, &atlas, &names)?;
    println!(
        "{} of {} tiles used ({}%)",
        crushed.used,
        crushed.total,
        crushed.used * 100 / crushed.total
    );

    back_up(&out_png)?;
    crushed.atlas.save(&out_png)?;
    if args.pngcrush {
        run_pngcrush(&out_png);
    }
    println!("wrote {}", out_png.display());

    back_up(&out_tsx)?;
    fs::write(&out_tsx, crushed.tileset.to_tsx())?;
    println!("wrote {}", out_tsx.display());

    back_up(&out_map)?;
    fs::write(&out_map, crushed.map.to_tmx())?;
    println!("wrote {}", out_map.display());

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn back_up(path: &Path) -> io::Result<()> {
    if path.exists() {
        let mut backup = path.as_os_str().to_os_string();
        backup.push(".bak");
        fs::rename(path, &backup)?;
        println!("backed up {} to {}", path.display(), Path::new(&backup).display());
    }
    Ok(())
}

// pngcrush is optional; a missing or failing binary only costs the size win.
fn run_pngcrush(path: &Path) {
    let crushed = path.with_extension("png.pc");
    let status = Command::new("pngcrush")
        .arg("-q")
        .arg(path)
        .arg(&crushed)
        .status();
    match status {
        Ok(status) if status.success() => {
            let smaller = match (fs::metadata(&crushed), fs::metadata(path)) {
                (Ok(new), Ok(old)) => new.len() < old.len(),
                _ => false,
            };
            if smaller {
                if let Err(err) = fs::rename(&crushed, path) {
                    eprintln!(
                        "warning: could not replace {} with the pngcrush output: {err}",
                        path.display()
                    );
                }
            } else {
                let _ = fs::remove_file(&crushed);
            }
        }
        Ok(status) => {
            eprintln!("warning: pngcrush exited with {status}");
            let _ = fs::remove_file(&crushed);
        }
        Err(err) => eprintln!("warning: could not run pngcrush: {err}"),
    }
}
