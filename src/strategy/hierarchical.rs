//! Agglomerative clustering over a triangular distance matrix.
//!
//! Candidate merges live in a min-heap that is never cleaned up: when two
//! clusters merge, fresh distances are pushed and the superseded entries
//! stay behind. A popped entry is skipped when either side is inactive or
//! has merged since the entry was pushed (its generation moved on).

use crate::buffer::PixelBuffer;
use crate::color::{dist_sq, manhattan, to_rgb, Vec3};
use crate::error::QuantError;
use crate::options::{HierarchicalOptions, Linkage, Metric};
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Index of the pair `(i, j)`, `i > j`, in the packed lower triangle.
#[inline]
fn tri(i: usize, j: usize) -> usize {
    let (i, j) = if i > j { (i, j) } else { (j, i) };
    i * (i - 1) / 2 + j
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    a: usize,
    b: usize,
    gen_a: u32,
    gen_b: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.a.cmp(&other.a))
            .then(self.b.cmp(&other.b))
    }
}

struct Clusters {
    active: Vec<bool>,
    generation: Vec<u32>,
    size: Vec<usize>,
    sum: Vec<[f64; 3]>,
}

fn distance(metric: Metric, a: &Vec3, b: &Vec3) -> f32 {
    match metric {
        Metric::Euclidean => dist_sq(a, b).sqrt(),
        Metric::Manhattan => manhattan(a, b),
    }
}

fn pairwise(points: &[Vec3], metric: Metric) -> Vec<f32> {
    (1..points.len())
        .into_par_iter()
        .flat_map_iter(|i| (0..i).map(move |j| (i, j)))
        .map(|(i, j)| distance(metric, &points[i], &points[j]))
        .collect()
}

/// Merges clusters until `target` remain; returns the surviving means.
pub fn agglomerate(
    points: &[Vec3],
    target: usize,
    linkage: Linkage,
    metric: Metric,
    progress: &mut Progress,
) -> Vec<Rgb<u8>> {
    let n = points.len();
    let mut dist = pairwise(points, metric);
    let mut clusters = Clusters {
        active: vec![true; n],
        generation: vec![0; n],
        size: vec![1; n],
        sum: points.iter().map(|p| p.map(|c| c as f64)).collect(),
    };
    let mut heap = BinaryHeap::with_capacity(dist.len());
    for i in 1..n {
        for j in 0..i {
            heap.push(Reverse(Candidate {
                distance: dist[tri(i, j)],
                a: i,
                b: j,
                gen_a: 0,
                gen_b: 0,
            }));
        }
    }

    let mut remaining = n;
    let merges = n.saturating_sub(target);
    while remaining > target.max(1) {
        let Some(Reverse(c)) = heap.pop() else {
            break;
        };
        let stale = !clusters.active[c.a]
            || !clusters.active[c.b]
            || clusters.generation[c.a] != c.gen_a
            || clusters.generation[c.b] != c.gen_b;
        if stale {
            continue;
        }
        // fold b into a
        let (a, b) = (c.a, c.b);
        let (size_a, size_b) = (clusters.size[a], clusters.size[b]);
        for k in 0..n {
            if k == a || k == b || !clusters.active[k] {
                continue;
            }
            let (da, db) = (dist[tri(a, k)], dist[tri(b, k)]);
            dist[tri(a, k)] = match linkage {
                Linkage::Single => da.min(db),
                Linkage::Complete => da.max(db),
                Linkage::Average => {
                    (da * size_a as f32 + db * size_b as f32) / (size_a + size_b) as f32
                }
            };
        }
        clusters.active[b] = false;
        clusters.size[a] += size_b;
        let sum_b = clusters.sum[b];
        for ch in 0..3 {
            clusters.sum[a][ch] += sum_b[ch];
        }
        clusters.generation[a] += 1;
        remaining -= 1;
        for k in 0..n {
            if k == a || !clusters.active[k] {
                continue;
            }
            heap.push(Reverse(Candidate {
                distance: dist[tri(a, k)],
                a,
                b: k,
                gen_a: clusters.generation[a],
                gen_b: clusters.generation[k],
            }));
        }
        progress.step(n - remaining, merges);
    }
    tracing::debug!(clusters = remaining, stale_left = heap.len(), "agglomeration finished");

    (0..n)
        .filter(|&i| clusters.active[i])
        .map(|i| {
            let size = clusters.size[i] as f64;
            to_rgb(clusters.sum[i].map(|s| (s / size) as f32))
        })
        .collect()
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &HierarchicalOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    Ok(agglomerate(
        &points,
        color_count,
        options.linkage,
        options.metric,
        progress,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<Vec3> {
        // gaps: 1, 2, 10, 1
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [13.0, 0.0, 0.0],
            [14.0, 0.0, 0.0],
        ]
    }

    #[test]
    fn triangular_index_is_dense() {
        let mut seen = Vec::new();
        for i in 1..5 {
            for j in 0..i {
                seen.push(tri(i, j));
            }
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(tri(1, 3), tri(3, 1));
    }

    #[test]
    fn single_linkage_chains() {
        let mut palette = agglomerate(&line(), 2, Linkage::Single, Metric::Euclidean, &mut Progress::none());
        palette.sort_by_key(|c| c.0);
        assert_eq!(palette, vec![Rgb([1, 0, 0]), Rgb([14, 0, 0])]);
    }

    #[test]
    fn every_linkage_reaches_target() {
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average] {
            for metric in [Metric::Euclidean, Metric::Manhattan] {
                for target in 1..=5 {
                    let palette = agglomerate(&line(), target, linkage, metric, &mut Progress::none());
                    assert_eq!(palette.len(), target, "{linkage:?} {metric:?}");
                }
            }
        }
    }

    #[test]
    fn complete_linkage_prefers_compact_groups() {
        // single linkage would chain 0..=3 together first
        let points = vec![
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            [8.0, 0.0, 0.0],
            [12.0, 0.0, 0.0],
        ];
        let mut palette = agglomerate(&points, 2, Linkage::Complete, Metric::Euclidean, &mut Progress::none());
        palette.sort_by_key(|c| c.0);
        assert_eq!(palette, vec![Rgb([2, 0, 0]), Rgb([10, 0, 0])]);
    }

    #[test]
    fn more_clusters_than_points() {
        let palette = agglomerate(&line()[..2], 4, Linkage::Average, Metric::Euclidean, &mut Progress::none());
        assert_eq!(palette.len(), 2);
    }
}
