// THEORY:
// The `raster` module holds the "dumb" data containers that every other layer
// passes around. Nothing in here knows about colors targets, thresholds or
// groups; it only knows how to store a rectangular grid and hand back cells.
//
// Key architectural principles:
// 1.  **Flat Storage**: Both grids are stored as one row-major `Vec`, indexed by
//     `y * width + x`. This keeps a whole frame in a single allocation and keeps
//     neighbor lookups cache friendly during the flood fill.
// 2.  **Valid by Construction**: A `Raster` or `BinaryRaster` can only be built
//     through a checked constructor. Once one exists it is non-empty and
//     rectangular, so downstream layers never re-validate.
// 3.  **Packed Color**: A pixel is a 24-bit `0xRRGGBB` value. Alpha and any
//     higher bits are masked away at the boundary.

use crate::core_modules::error::StructureError;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Mask selecting the 24 color bits of a packed pixel.
pub const RGB_MASK: u32 = 0x00FF_FFFF;
/// Packed pure white, used for foreground cells when visualizing a mask.
pub const WHITE: u32 = 0x00FF_FFFF;
/// Packed pure black, used for background cells when visualizing a mask.
pub const BLACK: u32 = 0x0000_0000;

/// A position on a grid. `x` grows rightward, `y` grows downward and the
/// top-left cell is `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

impl Coordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Packs 8-bit channels into a `0xRRGGBB` value.
pub fn pack_rgb(red: u8, green: u8, blue: u8) -> u32 {
    ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
}

/// Splits a packed color into its `(red, green, blue)` channels, ignoring any
/// bits above the low 24.
pub fn unpack_rgb(color: u32) -> (u8, u8, u8) {
    (
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
    )
}

fn check_dimensions(width: u32, height: u32, len: usize) -> Result<(), StructureError> {
    if height == 0 {
        return Err(StructureError::Invalid("raster has no rows".into()));
    }
    if width == 0 {
        return Err(StructureError::Invalid("raster rows are empty".into()));
    }
    if len != width as usize * height as usize {
        return Err(StructureError::Invalid(format!(
            "expected {} cells for {}x{}, found {}",
            width as usize * height as usize,
            width,
            height,
            len
        )));
    }
    Ok(())
}

/// A rectangular grid of packed RGB colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Raster {
    /// Builds a raster from row-major packed pixels. High bits are masked off.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, StructureError> {
        check_dimensions(width, height, pixels.len())?;
        let pixels = pixels.into_iter().map(|p| p & RGB_MASK).collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A raster where every cell holds `color`.
    pub fn filled(width: u32, height: u32, color: u32) -> Result<Self, StructureError> {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed color at `(x, y)`, or `None` outside the grid.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Converts back into an `image` buffer, mostly for diagnostics.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let (r, g, b) = unpack_rgb(self.pixels[(y * self.width + x) as usize]);
            Rgb([r, g, b])
        })
    }

    pub(crate) fn from_valid_parts(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }
}

impl TryFrom<&RgbImage> for Raster {
    type Error = StructureError;

    fn try_from(image: &RgbImage) -> Result<Self, Self::Error> {
        let pixels = image.pixels().map(|p| pack_rgb(p[0], p[1], p[2])).collect();
        Raster::new(image.width(), image.height(), pixels)
    }
}

impl TryFrom<&RgbaImage> for Raster {
    type Error = StructureError;

    /// Alpha is discarded.
    fn try_from(image: &RgbaImage) -> Result<Self, Self::Error> {
        let pixels = image.pixels().map(|p| pack_rgb(p[0], p[1], p[2])).collect();
        Raster::new(image.width(), image.height(), pixels)
    }
}

impl TryFrom<&DynamicImage> for Raster {
    type Error = StructureError;

    fn try_from(image: &DynamicImage) -> Result<Self, Self::Error> {
        Raster::try_from(&image.to_rgb8())
    }
}

/// A rectangular grid of 0 (background) and 1 (foreground) cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRaster {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl BinaryRaster {
    /// Builds a binary raster from rows of 0/1 values.
    ///
    /// Fails with `StructureError::Invalid` when there are no rows, the first row
    /// is empty, the rows are ragged, or a cell is neither 0 nor 1.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, StructureError> {
        if rows.is_empty() {
            return Err(StructureError::Invalid("raster has no rows".into()));
        }
        let width = rows[0].len();
        if width == 0 {
            return Err(StructureError::Invalid("raster rows are empty".into()));
        }

        let mut cells = Vec::with_capacity(width * rows.len());
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(StructureError::Invalid(format!(
                    "row {} has length {}, expected {}",
                    row_index,
                    row.len(),
                    width
                )));
            }
            if let Some(bad) = row.iter().find(|&&cell| cell > 1) {
                return Err(StructureError::Invalid(format!(
                    "row {} contains non-binary value {}",
                    row_index, bad
                )));
            }
            cells.extend(row);
        }

        let height = cells.len() / width;
        Ok(Self {
            width: width as u32,
            height: height as u32,
            cells,
        })
    }

    /// Builds a binary raster from a grid whose outer structure or rows may be
    /// absent, as happens when the grid arrives from a loosely typed boundary.
    ///
    /// An absent grid or absent row yields `StructureError::Null`; the remaining
    /// checks are those of [`BinaryRaster::from_rows`].
    pub fn from_optional_rows(rows: Option<Vec<Option<Vec<u8>>>>) -> Result<Self, StructureError> {
        let rows = rows.ok_or(StructureError::Null)?;
        if rows.is_empty() {
            return Err(StructureError::Invalid("raster has no rows".into()));
        }
        let rows = rows
            .into_iter()
            .collect::<Option<Vec<Vec<u8>>>>()
            .ok_or(StructureError::Null)?;
        Self::from_rows(rows)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `(x, y)` is a foreground cell. Out-of-grid positions are background.
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.cells[(y * self.width + x) as usize] == 1
    }

    pub fn foreground_count(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell == 1).count()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Copies the grid back into rows.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.to_vec())
            .collect()
    }

    pub(crate) fn from_valid_parts(width: u32, height: u32, cells: Vec<u8>) -> Self {
        debug_assert_eq!(cells.len(), width as usize * height as usize);
        Self {
            width,
            height,
            cells,
        }
    }
}
