//! Gaussian mean shift over sampled colors, accelerated by a bucket grid.

use crate::buffer::PixelBuffer;
use crate::color::{dist_sq, to_rgb, Vec3};
use crate::error::QuantError;
use crate::grid::Grid;
use crate::options::MeanShiftOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use rayon::prelude::*;

/// Moves `point` to the kernel-weighted mean of the original samples within
/// `bandwidth`. Returns the point unchanged if no neighbor carries weight.
fn shift(point: &Vec3, samples: &[Vec3], grid: &Grid, bandwidth: f32) -> Vec3 {
    let h2 = bandwidth * bandwidth;
    let mut sum = [0f64; 3];
    let mut weight = 0f64;
    grid.for_each_near(point, |i| {
        let d2 = dist_sq(point, &samples[i]);
        if d2 <= h2 {
            let w = (-(d2 / (2.0 * h2)) as f64).exp();
            for c in 0..3 {
                sum[c] += w * samples[i][c] as f64;
            }
            weight += w;
        }
    });
    if weight <= 0.0 {
        return *point;
    }
    sum.map(|s| (s / weight) as f32)
}

struct Mode {
    /// Converged position of the first member.
    center: Vec3,
    /// Sum of the members' original colors.
    sum: [f64; 3],
    count: usize,
}

/// Greedily groups converged points whose modes lie within half the
/// bandwidth of an existing group.
fn group_modes(shifted: &[Vec3], samples: &[Vec3], bandwidth: f32) -> Vec<Mode> {
    let merge2 = (bandwidth / 2.0) * (bandwidth / 2.0);
    let mut modes: Vec<Mode> = Vec::new();
    for (p, original) in shifted.iter().zip(samples) {
        let index = match modes.iter().position(|m| dist_sq(&m.center, p) <= merge2) {
            Some(index) => index,
            None => {
                modes.push(Mode {
                    center: *p,
                    sum: [0.0; 3],
                    count: 0,
                });
                modes.len() - 1
            }
        };
        let mode = &mut modes[index];
        for c in 0..3 {
            mode.sum[c] += original[c] as f64;
        }
        mode.count += 1;
    }
    modes
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &MeanShiftOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    if !(options.bandwidth > 0.0) {
        return Err(QuantError::InvalidConfiguration(format!(
            "mean shift bandwidth must be positive, got {}",
            options.bandwidth
        )));
    }
    let samples = sampler::sample_colors(image, options.max_samples, seed)?;
    let grid = Grid::new(&samples, options.bandwidth);
    let mut shifted = samples.clone();
    for iteration in 0..options.iterations {
        shifted
            .par_iter_mut()
            .for_each(|p| *p = shift(p, &samples, &grid, options.bandwidth));
        progress.step(iteration + 1, options.iterations + 1);
    }
    let mut modes = group_modes(&shifted, &samples, options.bandwidth);
    // stable: equal counts keep discovery order
    modes.sort_by(|a, b| b.count.cmp(&a.count));
    tracing::debug!(modes = modes.len(), "mean shift converged");
    progress.report(1.0);
    Ok(modes
        .iter()
        .take(color_count)
        .map(|m| to_rgb(m.sum.map(|s| (s / m.count as f64) as f32)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..30u8 {
            data.extend_from_slice(&[20 + i % 3, 20, 20, 255]);
        }
        for i in 0..10u8 {
            data.extend_from_slice(&[200 + i % 3, 200, 200, 255]);
        }
        data
    }

    #[test]
    fn finds_blobs_ranked_by_size() {
        let data = blobs();
        let img = PixelBuffer::packed(&data, 40, 1).unwrap();
        let palette = generate(&img, 4, &MeanShiftOptions::default(), 0, &mut Progress::none())
            .unwrap();
        assert_eq!(palette, vec![Rgb([21, 20, 20]), Rgb([201, 200, 200])]);
    }

    #[test]
    fn truncates_to_largest_modes() {
        let data = blobs();
        let img = PixelBuffer::packed(&data, 40, 1).unwrap();
        let palette = generate(&img, 1, &MeanShiftOptions::default(), 0, &mut Progress::none())
            .unwrap();
        assert_eq!(palette, vec![Rgb([21, 20, 20])]);
    }

    #[test]
    fn rejects_zero_bandwidth() {
        let data = blobs();
        let img = PixelBuffer::packed(&data, 40, 1).unwrap();
        let options = MeanShiftOptions {
            bandwidth: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            generate(&img, 2, &options, 0, &mut Progress::none()),
            Err(QuantError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn tiny_bandwidth_keeps_every_color() {
        let data = blobs();
        let img = PixelBuffer::packed(&data, 40, 1).unwrap();
        let options = MeanShiftOptions {
            bandwidth: 1e-9,
            ..Default::default()
        };
        let palette = generate(&img, 10, &options, 0, &mut Progress::none()).unwrap();
        assert_eq!(palette.len(), 6);
    }
}
