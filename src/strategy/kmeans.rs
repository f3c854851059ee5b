//! K-Means variants built on the shared Lloyd loop.

use crate::buffer::PixelBuffer;
use crate::color::{lab_to_rgb, rgb_to_lab, to_rgb, Vec3};
use crate::error::QuantError;
use crate::kmeans::{self, Lloyd, Reseed, Update};
use crate::options::{KMeansOptions, NativeKMeansOptions, SampleOptions};
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn lloyd_config(options: &KMeansOptions) -> Lloyd {
    Lloyd {
        max_iterations: options.max_iterations,
        threshold: options.threshold,
    }
}

/// Random initial centers, Lloyd refinement, farthest-point reseeding.
pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &KMeansOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = kmeans::random_init(&points, color_count, &mut rng);
    kmeans::lloyd(
        &points,
        &mut centers,
        lloyd_config(options),
        Update::Replace,
        Reseed::Farthest,
        progress,
    );
    Ok(centers.into_iter().map(to_rgb).collect())
}

/// K-Means++ seeding alone.
pub fn generate_plus_plus_init(
    image: &PixelBuffer,
    color_count: usize,
    options: &SampleOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let centers = kmeans::plus_plus_init(&points, color_count, &mut rng, progress);
    Ok(centers.into_iter().map(to_rgb).collect())
}

/// K-Means++ seeding followed by Lloyd refinement.
pub fn generate_plus_plus(
    image: &PixelBuffer,
    color_count: usize,
    options: &KMeansOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = kmeans::plus_plus_init(&points, color_count, &mut rng, &mut Progress::none());
    kmeans::lloyd(
        &points,
        &mut centers,
        lloyd_config(options),
        Update::Replace,
        Reseed::Farthest,
        progress,
    );
    Ok(centers.into_iter().map(to_rgb).collect())
}

/// Lloyd assignment with an EMA center update; empty clusters jump to a
/// random sample.
pub fn generate_native(
    image: &PixelBuffer,
    color_count: usize,
    options: &NativeKMeansOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    if !(options.rate > 0.0 && options.rate <= 1.0) {
        return Err(QuantError::InvalidConfiguration(format!(
            "EMA rate must be within (0, 1], got {}",
            options.rate
        )));
    }
    let points = sampler::sample_colors(image, options.max_samples, seed)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = kmeans::random_init(&points, color_count, &mut rng);
    kmeans::lloyd(
        &points,
        &mut centers,
        Lloyd {
            max_iterations: options.max_iterations,
            threshold: options.threshold,
        },
        Update::Ema(options.rate),
        Reseed::Random(&mut rng),
        progress,
    );
    Ok(centers.into_iter().map(to_rgb).collect())
}

/// K-Means++ and Lloyd in CIE Lab, converted back to RGB at the end.
pub fn generate_lab(
    image: &PixelBuffer,
    color_count: usize,
    options: &KMeansOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let points: Vec<Vec3> = sampler::sample_colors(image, options.max_samples, seed)?
        .into_iter()
        .map(rgb_to_lab)
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = kmeans::plus_plus_init(&points, color_count, &mut rng, &mut Progress::none());
    kmeans::lloyd(
        &points,
        &mut centers,
        lloyd_config(options),
        Update::Replace,
        Reseed::Farthest,
        progress,
    );
    Ok(centers.into_iter().map(|c| to_rgb(lab_to_rgb(c))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corners() -> Vec<u8> {
        [[0u8, 0, 0, 255], [10, 10, 10, 255], [250, 250, 250, 255], [255, 255, 255, 255]].concat()
    }

    fn sorted(mut palette: Vec<Rgb<u8>>) -> Vec<Rgb<u8>> {
        palette.sort_by_key(|c| c.0);
        palette
    }

    #[test]
    fn kmeans_groups_near_colors() {
        let data = corners();
        let img = PixelBuffer::packed(&data, 2, 2).unwrap();
        let options = KMeansOptions::default();
        for seed in 0..4 {
            let palette = generate(&img, 2, &options, seed, &mut Progress::none()).unwrap();
            assert_eq!(sorted(palette), vec![Rgb([5, 5, 5]), Rgb([253, 253, 253])]);
        }
    }

    #[test]
    fn plus_plus_variants_agree_on_separated_data() {
        let data = corners();
        let img = PixelBuffer::packed(&data, 2, 2).unwrap();
        let refined =
            generate_plus_plus(&img, 2, &KMeansOptions::default(), 3, &mut Progress::none())
                .unwrap();
        assert_eq!(sorted(refined), vec![Rgb([5, 5, 5]), Rgb([253, 253, 253])]);
        let init = generate_plus_plus_init(&img, 2, &SampleOptions::default(), 3, &mut Progress::none())
            .unwrap();
        assert_eq!(init.len(), 2);
        assert!(init[0][0].abs_diff(init[1][0]) > 200);
    }

    #[test]
    fn native_converges_near_means() {
        let data = corners();
        let img = PixelBuffer::packed(&data, 2, 2).unwrap();
        let options = NativeKMeansOptions {
            threshold: 0.01,
            max_iterations: 200,
            ..Default::default()
        };
        let palette = sorted(generate_native(&img, 2, &options, 1, &mut Progress::none()).unwrap());
        assert!(palette[0][0] <= 10);
        assert!(palette[1][0] >= 250);
    }

    #[test]
    fn native_rejects_bad_rate() {
        let data = corners();
        let img = PixelBuffer::packed(&data, 2, 2).unwrap();
        let options = NativeKMeansOptions {
            rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            generate_native(&img, 2, &options, 0, &mut Progress::none()),
            Err(QuantError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn lab_round_trips_cluster_means() {
        let data = [[200u8, 0, 0, 255], [200, 0, 0, 255], [0, 0, 200, 255], [0, 0, 200, 255]].concat();
        let img = PixelBuffer::packed(&data, 2, 2).unwrap();
        let palette = sorted(generate_lab(&img, 2, &KMeansOptions::default(), 0, &mut Progress::none()).unwrap());
        for (got, want) in palette.iter().zip([[0u8, 0, 200], [200, 0, 0]]) {
            for i in 0..3 {
                assert!(got[i].abs_diff(want[i]) <= 1, "{got:?} vs {want:?}");
            }
        }
    }

    #[test]
    fn seeded_runs_repeat() {
        let data: Vec<u8> = (0..400u32)
            .flat_map(|i| [(i * 37 % 256) as u8, (i * 91 % 256) as u8, (i * 13 % 256) as u8, 255])
            .collect();
        let img = PixelBuffer::packed(&data, 20, 20).unwrap();
        let options = KMeansOptions::default();
        let a = generate(&img, 6, &options, 11, &mut Progress::none()).unwrap();
        let b = generate(&img, 6, &options, 11, &mut Progress::none()).unwrap();
        assert_eq!(a, b);
    }
}
