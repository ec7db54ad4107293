// THEORY:
// The `Binarizer` is the first stage of the engine. It collapses a full color
// frame into a yes/no mask: "is this pixel close enough to the color we are
// tracking?" All later stages work on that mask and never see a color again.
//
// Key architectural principles:
// 1.  **Configured Once**: The metric, target color and threshold are fixed at
//     construction. A binarizer is then a stateless function of its input and can
//     be shared freely between frames and threads.
// 2.  **Inclusive Boundary**: A pixel whose distance equals the threshold exactly
//     is foreground.
// 3.  **Reversible for Diagnostics**: `to_raster` paints a mask back as white on
//     black so it can be inspected with ordinary image tooling.

use crate::core_modules::color_distance::color_distance::ColorDistance;
use crate::core_modules::raster::{BLACK, BinaryRaster, RGB_MASK, Raster, WHITE};

/// Converts color rasters into binary masks and back.
pub trait ImageBinarizer {
    /// Marks every pixel as foreground (1) or background (0).
    fn to_binary(&self, raster: &Raster) -> BinaryRaster;

    /// Paints a mask as a color raster: 1 becomes white, 0 becomes black.
    fn to_raster(&self, binary: &BinaryRaster) -> Raster {
        let pixels = binary
            .cells()
            .iter()
            .map(|&cell| if cell == 1 { WHITE } else { BLACK })
            .collect();
        Raster::from_valid_parts(binary.width(), binary.height(), pixels)
    }
}

/// Binarizes by distance to a target color.
#[derive(Debug, Clone)]
pub struct DistanceImageBinarizer<D: ColorDistance> {
    metric: D,
    target_color: u32,
    threshold: u32,
}

impl<D: ColorDistance> DistanceImageBinarizer<D> {
    /// `target_color` is a packed `0xRRGGBB`; higher bits are dropped.
    pub fn new(metric: D, target_color: u32, threshold: u32) -> Self {
        Self {
            metric,
            target_color: target_color & RGB_MASK,
            threshold,
        }
    }

    pub fn target_color(&self) -> u32 {
        self.target_color
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    fn classify(&self, color: u32) -> u8 {
        let distance = self.metric.distance(color & RGB_MASK, self.target_color);
        if distance <= self.threshold as f64 { 1 } else { 0 }
    }
}

impl<D: ColorDistance> ImageBinarizer for DistanceImageBinarizer<D> {
    fn to_binary(&self, raster: &Raster) -> BinaryRaster {
        let cells = raster.pixels().iter().map(|&p| self.classify(p)).collect();
        BinaryRaster::from_valid_parts(raster.width(), raster.height(), cells)
    }
}
