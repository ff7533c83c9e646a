use crate::{CrushError, RemapTable};
use image::RgbaImage;

/// The grid a tileset's indices map onto inside its atlas image.
///
/// Index 1 sits in the top-left cell; indices walk the grid row by row.
/// The cell for index `i` is column `(i-1) % columns`, row `(i-1) / columns`,
/// and its top-left pixel is offset by the margin plus one tile-plus-spacing
/// stride per column/row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilesetGeometry {
    /// Width of one tile, in pixels.
    pub tile_width: u32,
    /// Height of one tile, in pixels.
    pub tile_height: u32,
    /// Pixels around the outside of the grid.
    pub margin: u32,
    /// Pixels between adjacent cells.
    pub spacing: u32,
    /// Width of the atlas image.
    pub image_width: u32,
    /// Height of the atlas image.
    pub image_height: u32,
    /// Number of cells per row.
    pub columns: u32,
    /// Total number of cells.
    pub tile_count: u32,
}

impl TilesetGeometry {
    /// Derives the column and tile counts from the image dimensions.
    #[must_use]
    pub fn derive(
        tile_width: u32,
        tile_height: u32,
        margin: u32,
        spacing: u32,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let columns = grid_cells(image_width, tile_width, margin, spacing);
        let rows = grid_cells(image_height, tile_height, margin, spacing);
        TilesetGeometry {
            tile_width,
            tile_height,
            margin,
            spacing,
            image_width,
            image_height,
            columns,
            tile_count: columns * rows,
        }
    }

    /// Returns the top-left pixel of the cell holding a 1-based tile index.
    ///
    /// The index must be at least 1; index 0 is the empty reference, not
    /// a cell. Indices past the tile count are not checked and yield
    /// coordinates past the grid.
    #[must_use]
    pub fn cell_origin(&self, index: u32) -> (u32, u32) {
        let column = (index - 1) % self.columns.max(1);
        let row = (index - 1) / self.columns.max(1);
        (
            self.margin + column * (self.tile_width + self.spacing),
            self.margin + row * (self.tile_height + self.spacing),
        )
    }

    /// Returns the number of rows in the grid.
    #[must_use]
    pub fn rows(&self) -> u32 {
        if self.columns == 0 {
            0
        } else {
            self.tile_count.div_ceil(self.columns)
        }
    }

    /// Computes the geometry of a fresh atlas holding `tile_count` tiles.
    ///
    /// Columns are chosen as the ceiling of the square root of the tile
    /// count, keeping the atlas close to square. Margin and spacing carry
    /// over, and the image dimensions are the smallest that hold the grid.
    #[must_use]
    pub fn compact(&self, tile_count: u32) -> Self {
        let columns = (f64::from(tile_count).sqrt().ceil()) as u32;
        let rows = if columns == 0 { 0 } else { tile_count.div_ceil(columns) };
        TilesetGeometry {
            image_width: span(columns, self.tile_width, self.margin, self.spacing),
            image_height: span(rows, self.tile_height, self.margin, self.spacing),
            columns,
            tile_count,
            ..*self
        }
    }
}

// Cells that fit along one axis: margin on both ends, spacing only between.
fn grid_cells(image_span: u32, tile_span: u32, margin: u32, spacing: u32) -> u32 {
    let usable = image_span.saturating_sub(2 * margin).saturating_add(spacing);
    usable / (tile_span + spacing)
}

// Inverse of grid_cells: the smallest span holding `cells`.
fn span(cells: u32, tile_span: u32, margin: u32, spacing: u32) -> u32 {
    if cells == 0 {
        return 2 * margin;
    }
    2 * margin + cells * tile_span + (cells - 1) * spacing
}

/// Packs every remapped tile into a fresh atlas image.
///
/// Each used tile's pixel block is copied verbatim from its old cell to the
/// cell of its compacted index; cells past the last tile stay transparent.
///
/// # Errors
/// Fails with [`CrushError::InvalidDocument`] if a used tile's source
/// rectangle falls outside the source image.
pub fn build_atlas(
    source: &RgbaImage,
    geometry: &TilesetGeometry,
    remap: &RemapTable,
) -> Result<(RgbaImage, TilesetGeometry), CrushError> {
    let new_geometry = geometry.compact(remap.len() as u32);
    let mut atlas = RgbaImage::new(new_geometry.image_width, new_geometry.image_height);
    let (source_width, source_height) = source.dimensions();
    for (raw, compact) in remap.iter() {
        let (sx, sy) = geometry.cell_origin(raw);
        if sx + geometry.tile_width > source_width || sy + geometry.tile_height > source_height {
            return Err(CrushError::InvalidDocument(format!(
                "tile {raw} does not fit the {source_width}x{source_height} tileset image"
            )));
        }
        let (dx, dy) = new_geometry.cell_origin(compact);
        copy_tile(source, sx, sy, &mut atlas, dx, dy, geometry.tile_width, geometry.tile_height);
    }
    Ok((atlas, new_geometry))
}

fn copy_tile(
    source: &RgbaImage,
    sx: u32,
    sy: u32,
    target: &mut RgbaImage,
    dx: u32,
    dy: u32,
    width: u32,
    height: u32,
) {
    for y in 0..height {
        for x in 0..width {
            target.put_pixel(dx + x, dy + y, *source.get_pixel(sx + x, sy + y));
        }
    }
}
