//! Color space conversions and distance metrics.

use image::Rgb;
use palette::white_point::D65;
use palette::{FromColor, Hsl, Lab, Srgb};

pub type Vec3 = [f32; 3];

#[inline]
pub fn dist_sq<const D: usize>(a: &[f32; D], b: &[f32; D]) -> f32 {
    let mut sum = 0.0;
    for i in 0..D {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

#[inline]
pub fn manhattan(a: &Vec3, b: &Vec3) -> f32 {
    (a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs()
}

#[inline]
pub fn to_vec3(color: Rgb<u8>) -> Vec3 {
    color.0.map(|c| c as f32)
}

/// Rounds and clamps a vector back into an 8-bit color.
#[inline]
pub fn to_rgb(v: Vec3) -> Rgb<u8> {
    Rgb(v.map(|c| c.round().clamp(0.0, 255.0) as u8))
}

#[inline]
fn srgb(rgb: Vec3) -> Srgb {
    Srgb::new(rgb[0] / 255.0, rgb[1] / 255.0, rgb[2] / 255.0)
}

/// sRGB (0-255 per channel) to CIE Lab under D65. L is 0-100, a and b
/// roughly -128..128.
pub fn rgb_to_lab(rgb: Vec3) -> Vec3 {
    let lab = Lab::<D65, f32>::from_color(srgb(rgb));
    [lab.l, lab.a, lab.b]
}

/// CIE Lab back to sRGB in 0-255. Out-of-gamut channels are clamped.
pub fn lab_to_rgb(lab: Vec3) -> Vec3 {
    let rgb: Srgb = Srgb::from_color(Lab::<D65, f32>::new(lab[0], lab[1], lab[2]));
    [rgb.red, rgb.green, rgb.blue].map(|c| c.clamp(0.0, 1.0) * 255.0)
}

/// Hue (degrees, `0..360`), saturation and lightness (both 0-1).
pub fn rgb_to_hsl(color: Rgb<u8>) -> (f32, f32, f32) {
    let hsl: Hsl = Hsl::from_color(srgb(to_vec3(color)));
    let hue = hsl.hue.into_positive_degrees();
    (
        if hue >= 360.0 { 0.0 } else { hue },
        hsl.saturation.clamp(0.0, 1.0),
        hsl.lightness.clamp(0.0, 1.0),
    )
}

/// Single sortable scalar: whole hue degrees first, then saturation, then
/// lightness, each of the latter in 1/1000 steps.
pub fn hsl_sort_key(color: Rgb<u8>) -> u64 {
    let (h, s, l) = rgb_to_hsl(color);
    let h = ((h + 1e-3).floor() as u64).min(359);
    let s = ((s * 999.0).round() as u64).min(999);
    let l = ((l * 999.0).round() as u64).min(999);
    h * 1_000_000 + s * 1_000 + l
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_round_trip_primaries() {
        for c in [[0.0, 0.0, 0.0], [255.0, 0.0, 0.0], [12.0, 200.0, 99.0], [255.0; 3]] {
            let back = lab_to_rgb(rgb_to_lab(c));
            for i in 0..3 {
                assert!((back[i] - c[i]).abs() < 0.5, "{c:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn lab_white_and_black() {
        let white = rgb_to_lab([255.0; 3]);
        assert!((white[0] - 100.0).abs() < 0.1);
        assert!(white[1].abs() < 0.5 && white[2].abs() < 0.5);
        assert!(rgb_to_lab([0.0; 3])[0].abs() < 1e-3);
    }

    #[test]
    fn hsl_primaries() {
        let close = |a: (f32, f32, f32), b: (f32, f32, f32)| {
            (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-4 && (a.2 - b.2).abs() < 1e-3
        };
        assert!(close(rgb_to_hsl(Rgb([255, 0, 0])), (0.0, 1.0, 0.5)));
        assert!(close(rgb_to_hsl(Rgb([0, 0, 255])), (240.0, 1.0, 0.5)));
        assert_eq!(rgb_to_hsl(Rgb([128, 128, 128])).1, 0.0);
    }

    #[test]
    fn sort_key_orders_hue_first() {
        let red = hsl_sort_key(Rgb([255, 0, 0]));
        let green = hsl_sort_key(Rgb([0, 255, 0]));
        let blue = hsl_sort_key(Rgb([0, 0, 255]));
        assert!(red < green && green < blue);
        let dark_gray = hsl_sort_key(Rgb([40, 40, 40]));
        let light_gray = hsl_sort_key(Rgb([200, 200, 200]));
        assert!(dark_gray < light_gray && light_gray < red);
    }

    #[test]
    fn distances() {
        assert_eq!(dist_sq(&[0.0, 3.0, 4.0], &[0.0; 3]), 25.0);
        assert_eq!(manhattan(&[1.0, -2.0, 3.0], &[0.0; 3]), 6.0);
        assert_eq!(to_rgb([-4.0, 127.6, 300.0]), Rgb([0, 128, 255]));
    }
}
