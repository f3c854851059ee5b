//! Image-independent palettes for a given bit depth.

use crate::error::QuantError;
use crate::options::FixedOptions;
use image::Rgb;

const MONO: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

/// CGA palette 1, high intensity.
const CGA: [[u8; 3]; 4] = [[0, 0, 0], [85, 255, 255], [255, 85, 255], [255, 255, 255]];

const EGA: [[u8; 3]; 16] = [
    [0x00, 0x00, 0x00],
    [0x00, 0x00, 0xaa],
    [0x00, 0xaa, 0x00],
    [0x00, 0xaa, 0xaa],
    [0xaa, 0x00, 0x00],
    [0xaa, 0x00, 0xaa],
    [0xaa, 0x55, 0x00],
    [0xaa, 0xaa, 0xaa],
    [0x55, 0x55, 0x55],
    [0x55, 0x55, 0xff],
    [0x55, 0xff, 0x55],
    [0x55, 0xff, 0xff],
    [0xff, 0x55, 0x55],
    [0xff, 0x55, 0xff],
    [0xff, 0xff, 0x55],
    [0xff, 0xff, 0xff],
];

/// Channel indices in the order they receive bits: green, red, blue.
const PRIORITY: [usize; 3] = [1, 0, 2];

fn levels(count: usize) -> Vec<u8> {
    if count <= 1 {
        return vec![0];
    }
    (0..count).map(|i| (i * 255 / (count - 1)) as u8).collect()
}

/// Bits per channel, `[r, g, b]`.
pub fn allocate_bits(bit_depth: u8) -> [u8; 3] {
    let mut bits = [0u8; 3];
    for i in 0..bit_depth as usize {
        bits[PRIORITY[i % 3]] += 1;
    }
    bits
}

fn grid(bit_depth: u8) -> Vec<Rgb<u8>> {
    let [r, g, b] = allocate_bits(bit_depth).map(|bits| levels(1 << bits));
    let mut palette = Vec::with_capacity(r.len() * g.len() * b.len());
    for &rv in &r {
        for &gv in &g {
            for &bv in &b {
                palette.push(Rgb([rv, gv, bv]));
            }
        }
    }
    palette
}

pub fn generate(options: &FixedOptions) -> Result<Vec<Rgb<u8>>, QuantError> {
    let depth = options.bit_depth;
    if !(1..=8).contains(&depth) {
        return Err(QuantError::InvalidConfiguration(format!(
            "bit depth must be within 1..=8, got {depth}"
        )));
    }
    if options.grayscale {
        return Ok(levels(1 << depth).into_iter().map(|v| Rgb([v, v, v])).collect());
    }
    let curated: Option<&[[u8; 3]]> = match depth {
        1 => Some(&MONO),
        2 => Some(&CGA),
        4 => Some(&EGA),
        _ => None,
    };
    Ok(match curated {
        Some(colors) => colors.iter().map(|&c| Rgb(c)).collect(),
        None => grid(depth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(bit_depth: u8, grayscale: bool) -> Result<Vec<Rgb<u8>>, QuantError> {
        generate(&FixedOptions {
            bit_depth,
            grayscale,
        })
    }

    #[test]
    fn curated_sizes() {
        assert_eq!(fixed(1, false).unwrap().len(), 2);
        assert_eq!(fixed(2, false).unwrap().len(), 4);
        assert_eq!(fixed(4, false).unwrap().len(), 16);
    }

    #[test]
    fn bit_allocation_favours_green() {
        assert_eq!(allocate_bits(3), [1, 1, 1]);
        assert_eq!(allocate_bits(5), [2, 2, 1]);
        assert_eq!(allocate_bits(8), [3, 3, 2]);
    }

    #[test]
    fn three_three_two() {
        let palette = fixed(8, false).unwrap();
        assert_eq!(palette.len(), 256);
        assert_eq!(palette[0], Rgb([0, 0, 0]));
        assert_eq!(palette[1], Rgb([0, 0, 85]));
        assert_eq!(palette[255], Rgb([255, 255, 255]));
    }

    #[test]
    fn grayscale_ramp() {
        let palette = fixed(2, true).unwrap();
        assert_eq!(
            palette,
            vec![Rgb([0, 0, 0]), Rgb([85, 85, 85]), Rgb([170, 170, 170]), Rgb([255, 255, 255])]
        );
    }

    #[test]
    fn rejects_depth() {
        assert!(matches!(fixed(0, false), Err(QuantError::InvalidConfiguration(_))));
        assert!(matches!(fixed(9, true), Err(QuantError::InvalidConfiguration(_))));
    }
}
