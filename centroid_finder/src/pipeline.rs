// THEORY:
// The `pipeline` module is the top-level API of the engine. It chains the two
// stages (color raster -> binary mask -> ranked groups) behind one call, so a
// caller hands in a frame and gets back the ranked regions of the target color.
//
// The two stages stay independent: any `ImageBinarizer` can be paired with any
// `BinaryGroupFinder`. `VisionPipeline` is the stock pairing (Euclidean distance
// binarizer + flood fill) built from a `PipelineConfig`.

use crate::core_modules::binarizer::{DistanceImageBinarizer, ImageBinarizer};
use crate::core_modules::color_distance::color_distance::EuclideanColorDistance;
use crate::core_modules::group::GroupList;
use crate::core_modules::group_finder::{BinaryGroupFinder, Connectivity, FloodFillGroupFinder};
use crate::core_modules::raster::{BinaryRaster, Coordinate, Raster};

/// Configuration for the stock `VisionPipeline`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// The tracked color as `0xRRGGBB`.
    pub target_color: u32,
    /// Maximum color distance (inclusive) for a pixel to count as the target.
    pub threshold: u32,
    /// Neighbor rule used when growing regions.
    pub connectivity: Connectivity,
}

/// Finds ranked regions of interest directly in a color raster.
pub trait ImageGroupFinder {
    fn find_connected_groups(&self, raster: &Raster) -> GroupList;

    /// Centroid of the highest ranked region, or `None` when nothing matched.
    fn locate(&self, raster: &Raster) -> Option<Coordinate> {
        self.find_connected_groups(raster).top().map(|group| group.centroid)
    }
}

/// Binarizes a raster, then groups the resulting mask.
#[derive(Debug, Clone)]
pub struct BinarizingImageGroupFinder<B, F> {
    binarizer: B,
    group_finder: F,
}

impl<B: ImageBinarizer, F: BinaryGroupFinder> BinarizingImageGroupFinder<B, F> {
    pub fn new(binarizer: B, group_finder: F) -> Self {
        Self {
            binarizer,
            group_finder,
        }
    }

    pub fn binarizer(&self) -> &B {
        &self.binarizer
    }

    pub fn group_finder(&self) -> &F {
        &self.group_finder
    }
}

impl<B: ImageBinarizer, F: BinaryGroupFinder> ImageGroupFinder for BinarizingImageGroupFinder<B, F> {
    fn find_connected_groups(&self, raster: &Raster) -> GroupList {
        let binary = self.binarizer.to_binary(raster);
        self.group_finder.find_connected_groups(&binary)
    }
}

/// The stock pipeline: Euclidean RGB distance + iterative flood fill.
pub type VisionPipeline =
    BinarizingImageGroupFinder<DistanceImageBinarizer<EuclideanColorDistance>, FloodFillGroupFinder>;

impl BinarizingImageGroupFinder<DistanceImageBinarizer<EuclideanColorDistance>, FloodFillGroupFinder> {
    pub fn from_config(config: PipelineConfig) -> Self {
        Self::new(
            DistanceImageBinarizer::new(EuclideanColorDistance, config.target_color, config.threshold),
            FloodFillGroupFinder::new(config.connectivity),
        )
    }
}

/// Marks pixels within `threshold` of `target_color` using Euclidean distance.
pub fn binarize(raster: &Raster, target_color: u32, threshold: u32) -> BinaryRaster {
    DistanceImageBinarizer::new(EuclideanColorDistance, target_color, threshold).to_binary(raster)
}

/// Four-connected regions of a binary mask, largest first.
pub fn find_groups(binary: &BinaryRaster) -> GroupList {
    FloodFillGroupFinder::default().find_connected_groups(binary)
}

/// Regions of `target_color` in a color raster, largest first.
pub fn find_groups_in_image(raster: &Raster, target_color: u32, threshold: u32) -> GroupList {
    VisionPipeline::from_config(PipelineConfig {
        target_color,
        threshold,
        connectivity: Connectivity::Four,
    })
    .find_connected_groups(raster)
}
