use crate::color::hsl_sort_key;
use image::Rgb;

/// Padding color for palettes that came up short.
pub const FILL: Rgb<u8> = Rgb([0, 0, 0]);

/// Orders `palette` by hue, saturation, then lightness and forces its length
/// to exactly `color_count`: extra entries are dropped, missing ones are
/// filled with black.
pub fn normalize(mut palette: Vec<Rgb<u8>>, color_count: usize) -> Vec<Rgb<u8>> {
    palette.sort_by_cached_key(|&c| hsl_sort_key(c));
    palette.truncate(color_count);
    palette.resize(color_count, FILL);
    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_hue() {
        let palette = vec![Rgb([0, 0, 255]), Rgb([0, 255, 0]), Rgb([255, 0, 0])];
        assert_eq!(
            normalize(palette, 3),
            vec![Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])]
        );
    }

    #[test]
    fn grays_order_by_lightness() {
        let palette = vec![Rgb([200, 200, 200]), Rgb([10, 10, 10]), Rgb([90, 90, 90])];
        assert_eq!(
            normalize(palette, 3),
            vec![Rgb([10, 10, 10]), Rgb([90, 90, 90]), Rgb([200, 200, 200])]
        );
    }

    #[test]
    fn pads_with_black() {
        let palette = normalize(vec![Rgb([255, 0, 0])], 3);
        assert_eq!(palette.len(), 3);
        assert_eq!(palette.iter().filter(|&&c| c == FILL).count(), 2);
    }

    #[test]
    fn truncates_after_sorting() {
        let palette = vec![Rgb([0, 0, 255]), Rgb([255, 0, 0])];
        assert_eq!(normalize(palette, 1), vec![Rgb([255, 0, 0])]);
    }
}
