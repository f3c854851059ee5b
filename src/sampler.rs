//! Bounded, reproducible selection of opaque pixels.

use crate::buffer::PixelBuffer;
use crate::color::Vec3;
use crate::error::QuantError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Random draws attempted per requested sample before giving up on a
/// mostly transparent image.
const DRAWS_PER_SAMPLE: usize = 4;

/// Returns byte offsets of at most `max_samples` distinct opaque pixels.
///
/// Images with no more pixels than `max_samples` are enumerated
/// exhaustively. Larger images are sampled with a generator seeded from
/// `seed`; if the random draws hit nothing opaque, a strided scan over the
/// whole image takes over. Offsets are returned in ascending order.
pub fn sample(image: &PixelBuffer, max_samples: usize, seed: u64) -> Result<Vec<usize>, QuantError> {
    if max_samples == 0 {
        return Err(QuantError::InvalidConfiguration(
            "sample cap must be at least 1".into(),
        ));
    }
    let total = image.pixel_count();
    let mut offsets = if total <= max_samples {
        strided(image, 1, max_samples)
    } else {
        let drawn = random_draws(image, max_samples, seed);
        if drawn.is_empty() {
            strided(image, total.div_ceil(max_samples), max_samples)
        } else {
            drawn
        }
    };
    if offsets.is_empty() {
        // stride may have skipped the only opaque pixels
        offsets = strided(image, 1, max_samples);
    }
    if offsets.is_empty() {
        return Err(QuantError::EmptyInput);
    }
    offsets.sort_unstable();
    tracing::debug!(samples = offsets.len(), total, "sampled opaque pixels");
    Ok(offsets)
}

/// Gathers the sampled colors as vectors.
pub fn colors(image: &PixelBuffer, offsets: &[usize]) -> Vec<Vec3> {
    offsets.iter().map(|&o| image.vec3(o)).collect()
}

/// Convenience for strategies: sample and return the colors directly.
pub fn sample_colors(
    image: &PixelBuffer,
    max_samples: usize,
    seed: u64,
) -> Result<Vec<Vec3>, QuantError> {
    let offsets = sample(image, max_samples, seed)?;
    Ok(colors(image, &offsets))
}

fn strided(image: &PixelBuffer, step: usize, max_samples: usize) -> Vec<usize> {
    (0..image.pixel_count())
        .step_by(step.max(1))
        .map(|i| image.offset_of_index(i))
        .filter(|&o| image.is_opaque(o))
        .take(max_samples)
        .collect()
}

fn random_draws(image: &PixelBuffer, max_samples: usize, seed: u64) -> Vec<usize> {
    let total = image.pixel_count();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(max_samples);
    let mut offsets = Vec::with_capacity(max_samples);
    for _ in 0..max_samples * DRAWS_PER_SAMPLE {
        if offsets.len() == max_samples {
            break;
        }
        let offset = image.offset_of_index(rng.gen_range(0..total));
        if image.is_opaque(offset) && seen.insert(offset) {
            offsets.push(offset);
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let a = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[x as u8, y as u8, 7, a]);
            }
        }
        data
    }

    #[test]
    fn small_image_is_exhaustive() {
        let data = checker(4, 4);
        let img = PixelBuffer::packed(&data, 4, 4).unwrap();
        let offsets = sample(&img, 100, 0).unwrap();
        assert_eq!(offsets.len(), 8);
        assert!(offsets.iter().all(|&o| img.is_opaque(o)));
    }

    #[test]
    fn large_image_is_capped_unique_and_reproducible() {
        let data = checker(64, 64);
        let img = PixelBuffer::packed(&data, 64, 64).unwrap();
        let a = sample(&img, 500, 42).unwrap();
        let b = sample(&img, 500, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= 500 && !a.is_empty());
        assert!(a.iter().all(|&o| img.is_opaque(o)));
        let unique: HashSet<_> = a.iter().collect();
        assert_eq!(unique.len(), a.len());
    }

    #[test]
    fn single_opaque_pixel_is_found() {
        let mut data = vec![0u8; 100 * 100 * 4];
        data[4 * 4321 + 3] = 255;
        let img = PixelBuffer::packed(&data, 100, 100).unwrap();
        assert_eq!(sample(&img, 10, 3).unwrap(), vec![4 * 4321]);
    }

    #[test]
    fn transparent_image_fails() {
        let data = vec![0u8; 10 * 10 * 4];
        let img = PixelBuffer::packed(&data, 10, 10).unwrap();
        assert!(matches!(sample(&img, 50, 0), Err(QuantError::EmptyInput)));
    }
}
