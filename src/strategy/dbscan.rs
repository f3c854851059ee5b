use crate::buffer::PixelBuffer;
use crate::color::{dist_sq, to_rgb, Vec3};
use crate::error::QuantError;
use crate::grid::Grid;
use crate::options::DbscanOptions;
use crate::progress::Progress;
use crate::queue::Queue;
use crate::sampler;
use image::Rgb;
use rayon::prelude::*;

/// Used when every sample is identical and the estimate collapses to zero.
const MIN_EPSILON: f32 = 1.0;

/// Median over all points of the distance to their `k`-th nearest neighbor.
pub fn estimate_epsilon(points: &[Vec3], k: usize) -> f32 {
    if points.len() < 2 {
        return MIN_EPSILON;
    }
    let mut kth: Vec<f32> = (0..points.len())
        .into_par_iter()
        .map(|i| {
            let mut d: Vec<f32> = points
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, q)| dist_sq(&points[i], q))
                .collect();
            let nth = k.clamp(1, d.len()) - 1;
            let (_, value, _) = d.select_nth_unstable_by(nth, f32::total_cmp);
            value.sqrt()
        })
        .collect();
    kth.sort_by(f32::total_cmp);
    let median = kth[kth.len() / 2];
    if median > 0.0 {
        median
    } else {
        MIN_EPSILON
    }
}

/// Cluster label per point; `None` marks noise.
fn cluster(points: &[Vec3], epsilon: f32, min_pts: usize, progress: &mut Progress) -> Vec<Option<usize>> {
    let n = points.len();
    let grid = Grid::new(points, epsilon);
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut frontier = Queue::new(n);
    let mut clusters = 0;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let neighbors = grid.within(points, &points[i], epsilon);
        if neighbors.len() < min_pts {
            continue;
        }
        let id = clusters;
        clusters += 1;
        labels[i] = Some(id);
        frontier.mark(i);
        for j in neighbors {
            frontier.push(j);
        }
        while let Some(j) = frontier.pop() {
            if labels[j].is_none() {
                labels[j] = Some(id);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = grid.within(points, &points[j], epsilon);
            if reach.len() >= min_pts {
                for q in reach {
                    frontier.push(q);
                }
            }
        }
        progress.step(visited.iter().filter(|&&v| v).count(), n);
    }
    labels
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &DbscanOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    if options.min_pts == 0 {
        return Err(QuantError::InvalidConfiguration("min_pts must be at least 1".into()));
    }
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    let epsilon = match options.epsilon {
        Some(e) if e > 0.0 => e,
        Some(e) => {
            return Err(QuantError::InvalidConfiguration(format!(
                "epsilon must be positive, got {e}"
            )))
        }
        None => estimate_epsilon(&points, options.min_pts),
    };
    let labels = cluster(&points, epsilon, options.min_pts, progress);

    let count = labels.iter().flatten().map(|&l| l + 1).max().unwrap_or(0);
    let mut sums = vec![([0f64; 3], 0usize); count];
    for (p, label) in points.iter().zip(&labels) {
        if let Some(l) = *label {
            for c in 0..3 {
                sums[l].0[c] += p[c] as f64;
            }
            sums[l].1 += 1;
        }
    }
    let mut clusters: Vec<_> = sums.into_iter().filter(|(_, n)| *n >= options.min_pts).collect();
    clusters.sort_by(|a, b| b.1.cmp(&a.1));
    tracing::debug!(epsilon, clusters = clusters.len(), "dbscan finished");
    Ok(clusters
        .into_iter()
        .take(color_count)
        .map(|(sum, n)| to_rgb(sum.map(|s| (s / n as f64) as f32)))
        .collect())
}
