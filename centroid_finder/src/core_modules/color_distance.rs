// THEORY:
// The `ColorDistance` module is the smallest analytical unit of the engine. It
// answers one question: "how different are these two colors?" Everything above
// it (the binarizer, the pipeline) only ever sees a single number.
//
// Key architectural principles:
// 1.  **Single-Method Capability**: The metric is a trait with one method, so a
//     weighted or perceptual metric can replace the Euclidean one without
//     touching the binarizer or the pipeline.
// 2.  **Pure and Total**: Every pair of 24-bit colors has a distance. The result
//     is non-negative and zero only for identical colors.
// 3.  **Packed Input**: Colors arrive as `0xRRGGBB`. Bits above the low 24 are
//     ignored, so callers may pass ARGB values straight through.

pub mod color_distance {
    use crate::core_modules::raster::unpack_rgb;

    pub type Distance = f64;

    /// Measures the dissimilarity of two packed `0xRRGGBB` colors.
    pub trait ColorDistance {
        fn distance(&self, color_a: u32, color_b: u32) -> Distance;
    }

    /// Straight-line distance between two colors in RGB space:
    /// `sqrt(dR^2 + dG^2 + dB^2)`, ranging from 0 to about 441.67.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct EuclideanColorDistance;

    impl ColorDistance for EuclideanColorDistance {
        fn distance(&self, color_a: u32, color_b: u32) -> Distance {
            let (red_a, green_a, blue_a) = unpack_rgb(color_a);
            let (red_b, green_b, blue_b) = unpack_rgb(color_b);

            let red_difference = red_a as i32 - red_b as i32;
            let green_difference = green_a as i32 - green_b as i32;
            let blue_difference = blue_a as i32 - blue_b as i32;

            // Max squared sum is 3 * 255^2, well inside i32.
            let squared = red_difference * red_difference
                + green_difference * green_difference
                + blue_difference * blue_difference;
            (squared as Distance).sqrt()
        }
    }

    impl<F> ColorDistance for F
    where
        F: Fn(u32, u32) -> Distance,
    {
        fn distance(&self, color_a: u32, color_b: u32) -> Distance {
            self(color_a, color_b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::color_distance::*;

    #[test]
    fn test_identical_colors_have_zero_distance() {
        let metric = EuclideanColorDistance;
        assert_eq!(metric.distance(0x123456, 0x123456), 0.0);
        assert_eq!(metric.distance(0x000000, 0x000000), 0.0);
    }

    #[test]
    fn test_black_to_white_is_the_maximum() {
        let metric = EuclideanColorDistance;
        let expected = (3.0f64 * 255.0 * 255.0).sqrt();
        assert!((metric.distance(0x000000, 0xFFFFFF) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_single_channel_difference() {
        let metric = EuclideanColorDistance;
        assert_eq!(metric.distance(0xFF0000, 0x000000), 255.0);
        assert_eq!(metric.distance(0x00FF00, 0x000000), 255.0);
        assert_eq!(metric.distance(0x0000FF, 0x000000), 255.0);
    }

    #[test]
    fn test_pythagorean_triple() {
        // dR = 3, dG = 4, dB = 0
        let metric = EuclideanColorDistance;
        assert_eq!(metric.distance(0x030400, 0x000000), 5.0);
    }

    #[test]
    fn test_symmetric_and_ignores_alpha() {
        let metric = EuclideanColorDistance;
        assert_eq!(
            metric.distance(0x102030, 0x405060),
            metric.distance(0x405060, 0x102030)
        );
        assert_eq!(metric.distance(0xFF102030, 0x00102030), 0.0);
    }

    #[test]
    fn test_closures_are_metrics() {
        let red_only = |a: u32, b: u32| ((a >> 16) as f64 - (b >> 16) as f64).abs();
        assert_eq!(red_only.distance(0x100000, 0x050000), 11.0);
    }
}
