//! Mapping pixels onto a palette: plain nearest color, Floyd–Steinberg error
//! diffusion, and ordered (Bayer) dithering.
//!
//! Every mapping returns a copy of the input bytes with the same stride.
//! Only the RGB channels of opaque pixels are rewritten; alpha, transparent
//! pixels and row padding pass through untouched.

use crate::buffer::{PixelBuffer, OPACITY_THRESHOLD};
use crate::color::{to_vec3, Vec3};
use crate::error::QuantError;
use crate::kmeans;
use image::Rgb;
use rayon::prelude::*;
use std::collections::HashMap;

/// Nearest palette entry per 8-bit color, memoized. Callers holding a
/// fractional color round it first.
struct NearestCache {
    palette: Vec<Vec3>,
    hits: HashMap<[u8; 3], usize>,
}

impl NearestCache {
    fn new(palette: &[Rgb<u8>]) -> Self {
        Self {
            palette: palette.iter().map(|&c| to_vec3(c)).collect(),
            hits: HashMap::new(),
        }
    }

    fn index(&mut self, rgb: [u8; 3]) -> usize {
        let palette = &self.palette;
        *self
            .hits
            .entry(rgb)
            .or_insert_with(|| kmeans::nearest(&rgb.map(f32::from), palette.as_slice()).0)
    }
}

fn check_palette(palette: &[Rgb<u8>]) -> Result<(), QuantError> {
    if palette.is_empty() {
        return Err(QuantError::InvalidConfiguration("palette is empty".into()));
    }
    Ok(())
}

fn check_strength(strength: f32) -> Result<f32, QuantError> {
    if !strength.is_finite() {
        return Err(QuantError::InvalidConfiguration(format!(
            "dither strength must be finite, got {strength}"
        )));
    }
    Ok(strength.clamp(0.0, 1.0))
}

fn quantize(value: Vec3) -> [u8; 3] {
    value.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Applies `map` to every opaque pixel, one row per work item. `map`
/// receives the pixel coordinates and its RGB, and returns the RGB to store.
fn map_rows<F>(image: &PixelBuffer, palette: &[Rgb<u8>], map: F) -> Vec<u8>
where
    F: Fn(u32, u32, [u8; 3], &mut NearestCache) -> [u8; 3] + Sync,
{
    let mut out = image.data().to_vec();
    let width = image.width() as usize;
    let height = image.height() as usize;
    out.par_chunks_mut(image.stride())
        .take(height)
        .enumerate()
        .for_each(|(y, row)| {
            let mut cache = NearestCache::new(palette);
            for (x, px) in row[..width * 4].chunks_exact_mut(4).enumerate() {
                if px[3] <= OPACITY_THRESHOLD {
                    continue;
                }
                let rgb = map(x as u32, y as u32, [px[0], px[1], px[2]], &mut cache);
                px[..3].copy_from_slice(&rgb);
            }
        });
    out
}

/// Replaces every opaque pixel by its nearest palette color.
pub fn remap(image: &PixelBuffer, palette: &[Rgb<u8>]) -> Result<Vec<u8>, QuantError> {
    check_palette(palette)?;
    Ok(map_rows(image, palette, |_, _, rgb, cache| {
        palette[cache.index(rgb)].0
    }))
}

/// Palette index of every pixel in row-major order; `None` where the pixel
/// is transparent.
pub fn index_map(image: &PixelBuffer, palette: &[Rgb<u8>]) -> Result<Vec<Option<u8>>, QuantError> {
    check_palette(palette)?;
    if palette.len() > 256 {
        return Err(QuantError::InvalidConfiguration(format!(
            "index map holds at most 256 colors, palette has {}",
            palette.len()
        )));
    }
    let width = image.width() as usize;
    let rows: Vec<Vec<Option<u8>>> = (0..image.height())
        .into_par_iter()
        .map(|y| {
            let mut cache = NearestCache::new(palette);
            image.row(y)[..width * 4]
                .chunks_exact(4)
                .map(|px| {
                    (px[3] > OPACITY_THRESHOLD)
                        .then(|| cache.index([px[0], px[1], px[2]]) as u8)
                })
                .collect()
        })
        .collect();
    Ok(rows.concat())
}

/// Floyd–Steinberg error diffusion. `strength` scales the diffused error
/// and is clamped to `0..=1`; with `serpentine` odd rows run right to left.
///
/// The palette color is chosen for the error-adjusted value rounded to
/// 8 bits. The diffused error is taken from the unrounded value, so rounding
/// never accumulates.
pub fn floyd_steinberg(
    image: &PixelBuffer,
    palette: &[Rgb<u8>],
    strength: f32,
    serpentine: bool,
) -> Result<Vec<u8>, QuantError> {
    check_palette(palette)?;
    let strength = check_strength(strength)?;
    let width = image.width() as usize;
    let mut out = image.data().to_vec();
    let mut cache = NearestCache::new(palette);
    let mut current = vec![[0f32; 3]; width];
    let mut next = vec![[0f32; 3]; width];

    for y in 0..image.height() {
        let reverse = serpentine && y % 2 == 1;
        for step in 0..width {
            let x = if reverse { width - 1 - step } else { step };
            let offset = image.offset(x as u32, y);
            if !image.is_opaque(offset) {
                continue;
            }
            let raw = image.vec3(offset);
            let value: Vec3 = std::array::from_fn(|c| (raw[c] + current[x][c]).clamp(0.0, 255.0));
            let index = cache.index(quantize(value));
            let chosen = palette[index];
            out[offset..offset + 3].copy_from_slice(&chosen.0);

            let error: Vec3 = std::array::from_fn(|c| (value[c] - chosen[c] as f32) * strength);
            let ahead = if reverse { x.checked_sub(1) } else { Some(x + 1).filter(|&a| a < width) };
            let behind = if reverse { Some(x + 1).filter(|&b| b < width) } else { x.checked_sub(1) };
            for c in 0..3 {
                if let Some(a) = ahead {
                    current[a][c] += error[c] * 7.0 / 16.0;
                    next[a][c] += error[c] * 1.0 / 16.0;
                }
                if let Some(b) = behind {
                    next[b][c] += error[c] * 3.0 / 16.0;
                }
                next[x][c] += error[c] * 5.0 / 16.0;
            }
        }
        std::mem::swap(&mut current, &mut next);
        next.iter_mut().for_each(|e| *e = [0.0; 3]);
    }
    Ok(out)
}

/// Bayer index matrix of side `size` (a power of two), row-major.
pub fn bayer(size: usize) -> Vec<u32> {
    let mut matrix = vec![0u32];
    let mut side = 1;
    while side < size {
        let grown = side * 2;
        let mut bigger = vec![0u32; grown * grown];
        for y in 0..side {
            for x in 0..side {
                let m = 4 * matrix[y * side + x];
                bigger[y * grown + x] = m;
                bigger[y * grown + x + side] = m + 2;
                bigger[(y + side) * grown + x] = m + 3;
                bigger[(y + side) * grown + x + side] = m + 1;
            }
        }
        matrix = bigger;
        side = grown;
    }
    matrix
}

/// Ordered dithering against a Bayer matrix of side 2, 4 or 8. Each pixel
/// is offset by `(threshold - 0.5) * strength * 255` on every channel before
/// the nearest color lookup.
pub fn ordered(
    image: &PixelBuffer,
    palette: &[Rgb<u8>],
    strength: f32,
    matrix_size: u8,
) -> Result<Vec<u8>, QuantError> {
    check_palette(palette)?;
    let strength = check_strength(strength)?;
    if !matches!(matrix_size, 2 | 4 | 8) {
        return Err(QuantError::InvalidConfiguration(format!(
            "Bayer matrix size must be 2, 4 or 8, got {matrix_size}"
        )));
    }
    let n = matrix_size as usize;
    let cells = (n * n) as f32;
    let offsets: Vec<f32> = bayer(n)
        .into_iter()
        .map(|m| ((m as f32 + 0.5) / cells - 0.5) * strength * 255.0)
        .collect();
    Ok(map_rows(image, palette, |x, y, rgb, cache| {
        let offset = offsets[(y as usize % n) * n + x as usize % n];
        let value = rgb.map(|v| (v as f32 + offset).clamp(0.0, 255.0));
        palette[cache.index(quantize(value))].0
    }))
}
