//! Gaussian mixture with diagonal covariances, fitted by EM.

use crate::buffer::PixelBuffer;
use crate::color::{to_rgb, Vec3};
use crate::error::QuantError;
use crate::kmeans::{self, CHUNK};
use crate::options::GmmOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::f64::consts::PI;

#[derive(Debug, Clone)]
struct Component {
    mean: [f64; 3],
    var: [f64; 3],
    weight: f64,
}

impl Component {
    fn log_density(&self, x: &Vec3) -> f64 {
        let mut acc = self.weight.ln();
        for c in 0..3 {
            let d = x[c] as f64 - self.mean[c];
            acc -= 0.5 * ((2.0 * PI * self.var[c]).ln() + d * d / self.var[c]);
        }
        acc
    }
}

/// Sufficient statistics gathered by the E-step.
struct Stats {
    resp: Vec<f64>,
    sum: Vec<[f64; 3]>,
    sum_sq: Vec<[f64; 3]>,
    log_likelihood: f64,
}

impl Stats {
    fn new(k: usize) -> Self {
        Self {
            resp: vec![0.0; k],
            sum: vec![[0.0; 3]; k],
            sum_sq: vec![[0.0; 3]; k],
            log_likelihood: 0.0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for j in 0..self.resp.len() {
            self.resp[j] += other.resp[j];
            for c in 0..3 {
                self.sum[j][c] += other.sum[j][c];
                self.sum_sq[j][c] += other.sum_sq[j][c];
            }
        }
        self.log_likelihood += other.log_likelihood;
        self
    }
}

fn expectation(points: &[Vec3], components: &[Component]) -> Stats {
    let k = components.len();
    points
        .par_chunks(CHUNK)
        .map(|chunk| {
            let mut stats = Stats::new(k);
            let mut log_p = vec![0f64; k];
            for x in chunk {
                for (lp, comp) in log_p.iter_mut().zip(components) {
                    *lp = comp.log_density(x);
                }
                let max = log_p.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let lse = max + log_p.iter().map(|lp| (lp - max).exp()).sum::<f64>().ln();
                stats.log_likelihood += lse;
                for j in 0..k {
                    let r = (log_p[j] - lse).exp();
                    stats.resp[j] += r;
                    for c in 0..3 {
                        let v = x[c] as f64;
                        stats.sum[j][c] += r * v;
                        stats.sum_sq[j][c] += r * v * v;
                    }
                }
            }
            stats
        })
        .collect::<Vec<_>>()
        .into_iter()
        .fold(Stats::new(k), Stats::merge)
}

fn maximization(components: &mut [Component], stats: &Stats, n: f64, floor: f64) {
    for (j, comp) in components.iter_mut().enumerate() {
        let nk = stats.resp[j];
        if nk < 1e-9 {
            // no support this round; leave the component where it was
            continue;
        }
        for c in 0..3 {
            let mean = stats.sum[j][c] / nk;
            comp.mean[c] = mean;
            comp.var[c] = (stats.sum_sq[j][c] / nk - mean * mean).max(floor);
        }
        comp.weight = nk / n;
    }
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &GmmOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    if !(options.variance_floor > 0.0 && options.initial_variance > 0.0) {
        return Err(QuantError::InvalidConfiguration(
            "GMM variances must be positive".into(),
        ));
    }
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let centers = kmeans::plus_plus_init(&points, color_count, &mut rng, &mut Progress::none());
    let k = centers.len();
    let mut components: Vec<Component> = centers
        .into_iter()
        .map(|c| Component {
            mean: c.map(|v| v as f64),
            var: [options.initial_variance; 3],
            weight: 1.0 / k as f64,
        })
        .collect();

    let n = points.len() as f64;
    let mut previous = f64::NEG_INFINITY;
    for iteration in 0..options.max_iterations {
        let stats = expectation(&points, &components);
        maximization(&mut components, &stats, n, options.variance_floor);
        let mean_ll = stats.log_likelihood / n;
        tracing::trace!(iteration, mean_ll, "gmm step");
        progress.step(iteration + 1, options.max_iterations);
        if (mean_ll - previous).abs() < options.tol {
            break;
        }
        previous = mean_ll;
    }
    Ok(components
        .iter()
        .map(|c| to_rgb(c.mean.map(|m| m as f32)))
        .collect())
}
