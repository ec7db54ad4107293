pub mod binarizer;
pub mod color_distance;
pub mod error;
pub mod group;
pub mod group_finder;
pub mod raster;
