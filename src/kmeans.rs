//! Lloyd iteration shared by every strategy that refines cluster centers.
//!
//! Points are fixed-size `f32` arrays so the same loop serves RGB, Lab and
//! spectral embeddings. Parallel phases split the points into fixed-size
//! chunks, give each chunk its own accumulator and fold the accumulators in
//! chunk order, so the result never depends on the thread count.

use crate::color::dist_sq;
use crate::progress::Progress;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;

/// Points handled by one parallel work item.
pub const CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct Lloyd {
    pub max_iterations: usize,
    /// Largest per-channel center movement still considered "moving".
    pub threshold: f32,
}

#[derive(Debug, Clone, Copy)]
pub enum Update {
    /// Center becomes the mean of its members.
    Replace,
    /// `center * (1 - rate) + mean * rate`.
    Ema(f32),
}

/// What happens to a center that attracted no points.
pub enum Reseed<'r> {
    /// Move it onto the point farthest from its nearest center.
    Farthest,
    /// Move it onto a uniformly drawn point.
    Random(&'r mut StdRng),
}

struct Partial<const D: usize> {
    sums: Vec<[f64; D]>,
    counts: Vec<u64>,
}

impl<const D: usize> Partial<D> {
    fn new(k: usize) -> Self {
        Self {
            sums: vec![[0.0; D]; k],
            counts: vec![0; k],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.sums.iter_mut().zip(&other.sums) {
            for i in 0..D {
                a[i] += b[i];
            }
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self
    }
}

/// Index of the nearest center and its squared distance. Ties keep the
/// first center found.
#[inline]
pub fn nearest<const D: usize>(point: &[f32; D], centers: &[[f32; D]]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, c) in centers.iter().enumerate() {
        let d = dist_sq(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Nearest center index for every point.
pub fn assignments<const D: usize>(points: &[[f32; D]], centers: &[[f32; D]]) -> Vec<usize> {
    points.par_iter().map(|p| nearest(p, centers).0).collect()
}

fn accumulate<const D: usize>(points: &[[f32; D]], centers: &[[f32; D]]) -> Partial<D> {
    let k = centers.len();
    points
        .par_chunks(CHUNK)
        .map(|chunk| {
            let mut partial = Partial::new(k);
            for p in chunk {
                let (c, _) = nearest(p, centers);
                partial.counts[c] += 1;
                for i in 0..D {
                    partial.sums[c][i] += p[i] as f64;
                }
            }
            partial
        })
        .collect::<Vec<_>>()
        .into_iter()
        .fold(Partial::new(k), Partial::merge)
}

fn nearest_distances<const D: usize>(points: &[[f32; D]], centers: &[[f32; D]]) -> Vec<f32> {
    points.par_iter().map(|p| nearest(p, centers).1).collect()
}

/// Runs Lloyd's algorithm in place and returns the number of iterations.
pub fn lloyd<const D: usize>(
    points: &[[f32; D]],
    centers: &mut [[f32; D]],
    config: Lloyd,
    update: Update,
    mut reseed: Reseed<'_>,
    progress: &mut Progress,
) -> usize {
    if points.is_empty() || centers.is_empty() {
        return 0;
    }
    let mut iterations = 0;
    while iterations < config.max_iterations {
        iterations += 1;
        let partial = accumulate(points, centers);
        let mut movement = 0f32;
        let mut empty = Vec::new();
        for (c, center) in centers.iter_mut().enumerate() {
            let count = partial.counts[c];
            if count == 0 {
                empty.push(c);
                continue;
            }
            let mut next = [0f32; D];
            for i in 0..D {
                let mean = (partial.sums[c][i] / count as f64) as f32;
                next[i] = match update {
                    Update::Replace => mean,
                    Update::Ema(rate) => center[i] * (1.0 - rate) + mean * rate,
                };
                movement = movement.max((next[i] - center[i]).abs());
            }
            *center = next;
        }
        if !empty.is_empty() {
            movement = movement.max(reseed_empty(points, centers, &empty, &mut reseed));
        }
        tracing::trace!(iteration = iterations, movement, empty = empty.len(), "lloyd step");
        progress.step(iterations, config.max_iterations);
        if movement < config.threshold {
            break;
        }
    }
    tracing::debug!(iterations, centers = centers.len(), "lloyd finished");
    iterations
}

/// Returns the largest channel displacement caused by reseeding.
fn reseed_empty<const D: usize>(
    points: &[[f32; D]],
    centers: &mut [[f32; D]],
    empty: &[usize],
    reseed: &mut Reseed<'_>,
) -> f32 {
    let mut movement = 0f32;
    let mut moved = |old: &[f32; D], new: &[f32; D]| {
        for i in 0..D {
            movement = movement.max((old[i] - new[i]).abs());
        }
    };
    match reseed {
        Reseed::Farthest => {
            let mut distances = nearest_distances(points, centers);
            for &c in empty {
                let (far, d) = distances
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, -1.0f32), |best, (i, d)| if d > best.1 { (i, d) } else { best });
                if d <= 0.0 {
                    break;
                }
                moved(&centers[c], &points[far]);
                centers[c] = points[far];
                for (dist, p) in distances.iter_mut().zip(points) {
                    *dist = dist.min(dist_sq(p, &centers[c]));
                }
            }
        }
        Reseed::Random(rng) => {
            for &c in empty {
                let p = points[rng.gen_range(0..points.len())];
                moved(&centers[c], &p);
                centers[c] = p;
            }
        }
    }
    movement
}

/// `k` distinct points drawn uniformly (fewer if there are fewer points).
pub fn random_init<const D: usize>(points: &[[f32; D]], k: usize, rng: &mut StdRng) -> Vec<[f32; D]> {
    let amount = k.min(points.len());
    let mut picks = index::sample(rng, points.len(), amount).into_vec();
    picks.sort_unstable();
    picks.into_iter().map(|i| points[i]).collect()
}

/// K-Means++ seeding: each new center is drawn with probability
/// proportional to its squared distance from the nearest chosen center.
/// Stops early when every point coincides with a center.
pub fn plus_plus_init<const D: usize>(
    points: &[[f32; D]],
    k: usize,
    rng: &mut StdRng,
    progress: &mut Progress,
) -> Vec<[f32; D]> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);
    let mut distances: Vec<f32> = points.par_iter().map(|p| dist_sq(p, &centers[0])).collect();
    progress.step(1, k);
    while centers.len() < k {
        let total: f64 = distances
            .par_chunks(CHUNK)
            .map(|chunk| chunk.iter().map(|&d| d as f64).sum::<f64>())
            .collect::<Vec<_>>()
            .into_iter()
            .sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut pick = points.len() - 1;
        for (i, &d) in distances.iter().enumerate() {
            target -= d as f64;
            if target < 0.0 && d > 0.0 {
                pick = i;
                break;
            }
        }
        if distances[pick] <= 0.0 {
            // rounding ran past the end; take the last point with weight
            match distances.iter().rposition(|&d| d > 0.0) {
                Some(i) => pick = i,
                None => break,
            }
        }
        let center = points[pick];
        centers.push(center);
        distances
            .par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(d, p)| *d = d.min(dist_sq(p, &center)));
        progress.step(centers.len(), k);
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn two_blobs() -> Vec<[f32; 3]> {
        let mut points = Vec::new();
        for i in 0..50 {
            let j = (i % 5) as f32;
            points.push([10.0 + j, 10.0, 10.0 - j]);
            points.push([200.0 - j, 190.0, 180.0 + j]);
        }
        points
    }

    #[test]
    fn nearest_keeps_first_on_tie() {
        let centers = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert_eq!(nearest(&[1.0, 0.0, 0.0], &centers), (0, 1.0));
    }

    #[test]
    fn lloyd_separates_blobs() {
        let points = two_blobs();
        let mut centers = vec![[0.0; 3], [255.0; 3]];
        let config = Lloyd {
            max_iterations: 20,
            threshold: 0.01,
        };
        let iterations = lloyd(
            &points,
            &mut centers,
            config,
            Update::Replace,
            Reseed::Farthest,
            &mut Progress::none(),
        );
        assert!(iterations <= 20);
        assert_eq!(centers[0], [12.0, 10.0, 8.0]);
        assert_eq!(centers[1], [198.0, 190.0, 182.0]);
    }

    #[test]
    fn lloyd_respects_iteration_cap() {
        let points = two_blobs();
        let mut centers = vec![[0.0; 3], [1.0; 3]];
        let config = Lloyd {
            max_iterations: 1,
            threshold: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let iterations = lloyd(
            &points,
            &mut centers,
            config,
            Update::Ema(0.5),
            Reseed::Random(&mut rng),
            &mut Progress::none(),
        );
        assert_eq!(iterations, 1);
    }

    #[test]
    fn empty_cluster_moves_to_farthest_point() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [100.0, 0.0, 0.0]];
        // second center sits on top of the first and attracts nothing
        let mut centers = vec![[0.0; 3], [0.0; 3]];
        let config = Lloyd {
            max_iterations: 10,
            threshold: 0.01,
        };
        lloyd(
            &points,
            &mut centers,
            config,
            Update::Replace,
            Reseed::Farthest,
            &mut Progress::none(),
        );
        assert_eq!(centers[0], [0.5, 0.0, 0.0]);
        assert_eq!(centers[1], [100.0, 0.0, 0.0]);
    }

    #[test]
    fn plus_plus_picks_distinct_points_and_is_seeded() {
        let points = two_blobs();
        let a = plus_plus_init(&points, 2, &mut StdRng::seed_from_u64(5), &mut Progress::none());
        let b = plus_plus_init(&points, 2, &mut StdRng::seed_from_u64(5), &mut Progress::none());
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        // the second pick must land in the other blob
        assert!(dist_sq(&a[0], &a[1]) > 100.0 * 100.0);
    }

    #[test]
    fn plus_plus_stops_when_points_run_out() {
        let points = vec![[5.0f32; 3]; 10];
        let centers = plus_plus_init(&points, 4, &mut StdRng::seed_from_u64(0), &mut Progress::none());
        assert_eq!(centers, vec![[5.0; 3]]);
    }
}
