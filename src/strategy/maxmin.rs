//! Weighted farthest-point selection followed by a few Lloyd passes.

use crate::buffer::PixelBuffer;
use crate::color::{dist_sq, to_rgb, Vec3};
use crate::error::QuantError;
use crate::kmeans::{self, Lloyd, Reseed, Update};
use crate::options::MaxMinOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use std::collections::HashMap;

/// Distinct sample colors with their frequencies, most frequent first.
fn weighted_colors(colors: &[Vec3]) -> Vec<(Vec3, u32)> {
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for c in colors {
        *counts.entry(to_rgb(*c).0).or_default() += 1;
    }
    let mut weighted: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    weighted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    weighted
        .into_iter()
        .map(|(c, n)| (c.map(|v| v as f32), n))
        .collect()
}

/// Starts at the most frequent color; each next center maximizes the
/// distance to its nearest chosen center, preferring frequent colors on ties.
fn farthest_points(weighted: &[(Vec3, u32)], k: usize, progress: &mut Progress) -> Vec<Vec3> {
    let Some(&(first, _)) = weighted.first() else {
        return vec![];
    };
    let mut centers = vec![first];
    let mut min_dist: Vec<f32> = weighted.iter().map(|(c, _)| dist_sq(c, &first)).collect();
    while centers.len() < k {
        let mut best: Option<(usize, f32, u32)> = None;
        for (i, (&d, &(_, n))) in min_dist.iter().zip(weighted).enumerate() {
            let better = match best {
                None => true,
                Some((_, bd, bn)) => d > bd || (d == bd && n > bn),
            };
            if better {
                best = Some((i, d, n));
            }
        }
        let Some((index, distance, _)) = best else {
            break;
        };
        if distance <= 0.0 {
            break;
        }
        let center = weighted[index].0;
        centers.push(center);
        for (d, (c, _)) in min_dist.iter_mut().zip(weighted) {
            *d = d.min(dist_sq(c, &center));
        }
        progress.step(centers.len(), k);
    }
    centers
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &MaxMinOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let colors = sampler::sample_colors(image, options.max_samples, seed)?;
    let weighted = weighted_colors(&colors);
    let mut centers = farthest_points(&weighted, color_count, progress);
    kmeans::lloyd(
        &colors,
        &mut centers,
        Lloyd {
            max_iterations: options.refine_iterations,
            threshold: 0.5,
        },
        Update::Replace,
        Reseed::Farthest,
        &mut Progress::none(),
    );
    Ok(centers.into_iter().map(to_rgb).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_most_frequent_then_farthest() {
        let colors = vec![
            [100.0, 100.0, 100.0],
            [100.0, 100.0, 100.0],
            [100.0, 100.0, 100.0],
            [0.0, 0.0, 0.0],
            [255.0, 255.0, 255.0],
            [110.0, 100.0, 100.0],
        ];
        let weighted = weighted_colors(&colors);
        let centers = farthest_points(&weighted, 3, &mut Progress::none());
        assert_eq!(centers[0], [100.0, 100.0, 100.0]);
        assert_eq!(centers[1], [255.0, 255.0, 255.0]);
        assert_eq!(centers[2], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn ties_prefer_frequent_colors() {
        let colors = vec![
            [50.0, 50.0, 50.0],
            [50.0, 50.0, 50.0],
            [50.0, 50.0, 50.0],
            [0.0, 50.0, 50.0],
            [100.0, 50.0, 50.0],
            [100.0, 50.0, 50.0],
        ];
        let weighted = weighted_colors(&colors);
        let centers = farthest_points(&weighted, 2, &mut Progress::none());
        assert_eq!(centers[1], [100.0, 50.0, 50.0]);
    }

    #[test]
    fn stops_at_distinct_color_count() {
        let colors = vec![[1.0, 1.0, 1.0]; 4];
        let weighted = weighted_colors(&colors);
        assert_eq!(farthest_points(&weighted, 5, &mut Progress::none()).len(), 1);
    }
}
