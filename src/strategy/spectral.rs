//! Spectral clustering: k-nearest-neighbor similarity graph in Lab space,
//! leading non-trivial eigenvectors of the normalized affinity by
//! orthogonalized power iteration, K-Means++ on the resulting embedding with
//! a few seeded restarts.

use crate::buffer::PixelBuffer;
use crate::color::{dist_sq, rgb_to_lab, to_rgb, Vec3};
use crate::error::QuantError;
use crate::kmeans::{self, Lloyd, Reseed, Update};
use crate::options::SpectralOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Upper bound on the eigenvectors kept for the embedding.
pub const EMBEDDING_DIM: usize = 4;

type Graph = Vec<Vec<(usize, f32)>>;

/// Symmetric Gaussian-weighted kNN graph.
fn knn_graph(points: &[Vec3], k: usize) -> Graph {
    let knn: Vec<Vec<(usize, f32)>> = (0..points.len())
        .into_par_iter()
        .map(|i| {
            let mut d: Vec<(usize, f32)> = points
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, q)| (j, dist_sq(&points[i], q)))
                .collect();
            d.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            d.truncate(k);
            d
        })
        .collect();

    let mut scale: Vec<f32> = knn.iter().flatten().map(|&(_, d2)| d2.sqrt()).collect();
    scale.sort_by(f32::total_cmp);
    let sigma = scale.get(scale.len() / 2).copied().filter(|&s| s > 0.0).unwrap_or(1.0);
    let denom = 2.0 * sigma * sigma;

    let mut graph: Graph = vec![Vec::new(); points.len()];
    for (i, row) in knn.iter().enumerate() {
        for &(j, d2) in row {
            let w = (-d2 / denom).exp();
            graph[i].push((j, w));
            graph[j].push((i, w));
        }
    }
    for row in graph.iter_mut() {
        row.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.total_cmp(&a.1)));
        row.dedup_by_key(|e| e.0);
    }
    graph
}

fn normalize(v: &mut [f64]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return false;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    true
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let dot: f64 = v.iter().zip(b).map(|(x, y)| x * y).sum();
        v.iter_mut().zip(b).for_each(|(x, y)| *x -= dot * y);
    }
}

/// Power iteration stops once a step moves the unit vector less than this.
const CONVERGENCE: f64 = 1e-7;

/// Leading eigenvectors of `(I + D^-1/2 W D^-1/2) / 2`, which are the
/// smallest ones of the normalized Laplacian. The first is the trivial
/// `sqrt(degree)` vector; `count` more follow it. The operator is applied
/// implicitly through the sparse graph.
fn eigenvectors(graph: &Graph, count: usize, iterations: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = graph.len();
    let degree: Vec<f64> = graph
        .iter()
        .map(|row| row.iter().map(|&(_, w)| w as f64).sum::<f64>().max(1e-12))
        .collect();
    let inv_sqrt: Vec<f64> = degree.iter().map(|d| 1.0 / d.sqrt()).collect();

    let mut trivial: Vec<f64> = degree.iter().map(|d| d.sqrt()).collect();
    normalize(&mut trivial);
    let mut basis = vec![trivial];

    let apply = |v: &[f64]| -> Vec<f64> {
        (0..n)
            .into_par_iter()
            .map(|i| {
                let mv: f64 = graph[i]
                    .iter()
                    .map(|&(j, w)| w as f64 * inv_sqrt[j] * v[j])
                    .sum::<f64>()
                    * inv_sqrt[i];
                0.5 * (v[i] + mv)
            })
            .collect()
    };

    for _ in 0..count {
        let mut v: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
        orthogonalize(&mut v, &basis);
        if !normalize(&mut v) {
            break;
        }
        for _ in 0..iterations {
            let mut next = apply(&v);
            orthogonalize(&mut next, &basis);
            if !normalize(&mut next) {
                break;
            }
            let moved = next.iter().zip(&v).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt();
            v = next;
            if moved < CONVERGENCE {
                break;
            }
        }
        basis.push(v);
    }
    basis
}

/// One row per point from the non-trivial vectors, mapped back to the
/// random-walk form `D^-1/2 v` and scaled to unit root mean square per
/// column. Unused trailing dimensions stay zero.
fn embed(graph: &Graph, vectors: &[Vec<f64>]) -> Vec<[f32; EMBEDDING_DIM]> {
    let n = graph.len();
    let mut rows = vec![[0f32; EMBEDDING_DIM]; n];
    for (d, v) in vectors.iter().skip(1).take(EMBEDDING_DIM).enumerate() {
        let mut column: Vec<f64> = v
            .iter()
            .zip(graph)
            .map(|(x, row)| x / row.iter().map(|&(_, w)| w as f64).sum::<f64>().max(1e-12).sqrt())
            .collect();
        if !normalize(&mut column) {
            continue;
        }
        let scale = (n as f64).sqrt();
        for (row, x) in rows.iter_mut().zip(column) {
            row[d] = (x * scale) as f32;
        }
    }
    rows
}

/// Sum of squared distances from every point to its nearest center.
fn inertia<const D: usize>(points: &[[f32; D]], centers: &[[f32; D]]) -> f64 {
    points
        .par_iter()
        .map(|p| kmeans::nearest(p, centers).1 as f64)
        .sum()
}

fn distinct_colors(colors: &[Vec3]) -> Vec<Rgb<u8>> {
    let mut palette: Vec<Rgb<u8>> = colors.iter().map(|&c| to_rgb(c)).collect();
    palette.sort_by_key(|c| c.0);
    palette.dedup();
    palette
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &SpectralOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let colors = sampler::sample_colors(image, options.max_samples, seed)?;
    if color_count == 0 {
        return Ok(Vec::new());
    }
    let n = colors.len();
    if n <= color_count.max(EMBEDDING_DIM + 1) {
        return Ok(distinct_colors(&colors));
    }
    let lab: Vec<Vec3> = colors.iter().copied().map(rgb_to_lab).collect();
    let graph = knn_graph(&lab, options.neighbors.clamp(1, n - 1));
    progress.report(0.2);

    let mut rng = StdRng::seed_from_u64(seed);
    let dims = (color_count - 1).clamp(1, EMBEDDING_DIM);
    let vectors = eigenvectors(&graph, dims, options.power_iterations, &mut rng);
    let embedding = embed(&graph, &vectors);
    progress.report(0.7);

    let mut best: Option<(f64, Vec<[f32; EMBEDDING_DIM]>)> = None;
    for _ in 0..options.restarts.max(1) {
        let mut centers = kmeans::plus_plus_init(&embedding, color_count, &mut rng, &mut Progress::none());
        kmeans::lloyd(
            &embedding,
            &mut centers,
            Lloyd {
                max_iterations: options.max_iterations,
                threshold: 1e-4,
            },
            Update::Replace,
            Reseed::Farthest,
            &mut Progress::none(),
        );
        let score = inertia(&embedding, &centers);
        if best.as_ref().map_or(true, |(lowest, _)| score < *lowest) {
            best = Some((score, centers));
        }
    }
    let centers = best.map(|(_, centers)| centers).unwrap_or_default();
    let labels = kmeans::assignments(&embedding, &centers);

    let mut sums = vec![([0f64; 3], 0usize); centers.len()];
    for (c, &l) in colors.iter().zip(&labels) {
        for ch in 0..3 {
            sums[l].0[ch] += c[ch] as f64;
        }
        sums[l].1 += 1;
    }
    progress.report(1.0);
    tracing::debug!(vectors = vectors.len(), clusters = centers.len(), "spectral embedding clustered");
    Ok(sums
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(sum, count)| to_rgb(sum.map(|s| (s / count as f64) as f32)))
        .collect())
}
