//! Colors picked at even ranks along the principal axis of the samples.

use crate::buffer::PixelBuffer;
use crate::color::{to_rgb, Vec3};
use crate::error::QuantError;
use crate::options::SampleOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;

const POWER_ITERATIONS: usize = 64;

fn covariance(colors: &[Vec3]) -> [[f64; 3]; 3] {
    let n = colors.len() as f64;
    let mut mean = [0f64; 3];
    for c in colors {
        for i in 0..3 {
            mean[i] += c[i] as f64 / n;
        }
    }
    let mut cov = [[0f64; 3]; 3];
    for c in colors {
        let d = [0, 1, 2].map(|i| c[i] as f64 - mean[i]);
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += d[i] * d[j] / n;
            }
        }
    }
    cov
}

/// Dominant eigenvector by power iteration. A zero matrix yields the red axis.
pub fn principal_axis(cov: &[[f64; 3]; 3]) -> [f64; 3] {
    let mut v = [1.0, 1.0, 1.0].map(|x: f64| x / 3f64.sqrt());
    for _ in 0..POWER_ITERATIONS {
        let next = [0, 1, 2].map(|i| cov[i][0] * v[0] + cov[i][1] * v[1] + cov[i][2] * v[2]);
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-12 {
            return [1.0, 0.0, 0.0];
        }
        v = next.map(|x| x / norm);
    }
    v
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &SampleOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let colors = sampler::sample_colors(image, options.max_samples, seed)?;
    let axis = principal_axis(&covariance(&colors));
    progress.report(0.5);

    let mut ranked: Vec<(f64, usize)> = colors
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let p = c[0] as f64 * axis[0] + c[1] as f64 * axis[1] + c[2] as f64 * axis[2];
            (p, i)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let n = ranked.len();
    let mut palette: Vec<Rgb<u8>> = Vec::with_capacity(color_count);
    for k in 0..color_count {
        let rank = if color_count == 1 {
            n / 2
        } else {
            k * (n - 1) / (color_count - 1)
        };
        let color = to_rgb(colors[ranked[rank].1]);
        if palette.last() != Some(&color) {
            palette.push(color);
        }
    }
    progress.report(1.0);
    tracing::debug!(axis = ?axis, colors = palette.len(), "pca projection picked");
    Ok(palette)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_of_gray_ramp_is_diagonal() {
        let colors: Vec<Vec3> = (0..=255).map(|i| [i as f32; 3]).collect();
        let axis = principal_axis(&covariance(&colors));
        for a in axis {
            assert!((a.abs() - 1.0 / 3f64.sqrt()).abs() < 1e-6);
        }
    }

    #[test]
    fn picks_ends_of_ramp() {
        let data: Vec<u8> = (0..=255u8).flat_map(|i| [i, 0, 0, 255]).collect();
        let img = PixelBuffer::packed(&data, 256, 1).unwrap();
        let palette = generate(&img, 3, &SampleOptions::default(), 0, &mut Progress::none())
            .unwrap();
        assert_eq!(palette.len(), 3);
        let mut reds: Vec<u8> = palette.iter().map(|c| c[0]).collect();
        reds.sort();
        assert_eq!(reds, vec![0, 127, 255]);
    }

    #[test]
    fn duplicates_collapse() {
        let data: Vec<u8> = [[5u8, 5, 5, 255]; 6].concat();
        let img = PixelBuffer::packed(&data, 6, 1).unwrap();
        let palette = generate(&img, 4, &SampleOptions::default(), 0, &mut Progress::none())
            .unwrap();
        assert_eq!(palette, vec![Rgb([5, 5, 5])]);
    }
}
