use crate::buffer::PixelBuffer;
use crate::color::{to_rgb, Vec3};
use crate::error::QuantError;
use crate::options::SampleOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;

/// A box of samples together with its worst channel.
struct ColorBox {
    colors: Vec<Vec3>,
    axis: usize,
    variance: f64,
}

impl ColorBox {
    fn new(colors: Vec<Vec3>) -> Self {
        let n = colors.len() as f64;
        let mut mean = [0f64; 3];
        for c in &colors {
            for i in 0..3 {
                mean[i] += c[i] as f64;
            }
        }
        mean = mean.map(|m| m / n);
        let mut var = [0f64; 3];
        for c in &colors {
            for i in 0..3 {
                let d = c[i] as f64 - mean[i];
                var[i] += d * d;
            }
        }
        var = var.map(|v| v / n);
        // ties prefer red, then green
        let axis = if var[0] >= var[1] && var[0] >= var[2] {
            0
        } else if var[1] >= var[2] {
            1
        } else {
            2
        };
        Self {
            colors,
            axis,
            variance: var[axis],
        }
    }

    fn splittable(&self) -> bool {
        self.colors.len() > 1 && self.variance > 0.0
    }

    /// Sorts along the worst axis and cuts at the median.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let axis = self.axis;
        self.colors.sort_by(|a, b| a[axis].total_cmp(&b[axis]));
        let right = self.colors.split_off(self.colors.len() / 2);
        (ColorBox::new(self.colors), ColorBox::new(right))
    }

    fn mean(&self) -> Rgb<u8> {
        let n = self.colors.len() as f64;
        let mut sum = [0f64; 3];
        for c in &self.colors {
            for i in 0..3 {
                sum[i] += c[i] as f64;
            }
        }
        to_rgb(sum.map(|s| (s / n) as f32))
    }
}

/// Splits the box with the largest single-channel variance until
/// `color_count` boxes exist or nothing is left to split.
pub fn median_cut(colors: Vec<Vec3>, color_count: usize, progress: &mut Progress) -> Vec<Rgb<u8>> {
    if colors.is_empty() {
        return vec![];
    }
    let mut boxes = vec![ColorBox::new(colors)];
    while boxes.len() < color_count {
        let worst = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.splittable())
            .fold(None, |best: Option<(usize, f64)>, (i, b)| match best {
                Some((_, v)) if v >= b.variance => best,
                _ => Some((i, b.variance)),
            });
        let Some((index, _)) = worst else {
            break;
        };
        let (left, right) = boxes.swap_remove(index).split();
        boxes.push(left);
        boxes.push(right);
        progress.step(boxes.len(), color_count);
    }
    tracing::debug!(boxes = boxes.len(), "median cut finished");
    boxes.iter().map(ColorBox::mean).collect()
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &SampleOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let colors = sampler::sample_colors(image, options.max_samples, seed)?;
    Ok(median_cut(colors, color_count, progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert!(median_cut(vec![], 4, &mut Progress::none()).is_empty());
    }

    #[test]
    fn splits_along_widest_channel() {
        let colors = vec![
            [0.0, 100.0, 100.0],
            [10.0, 100.0, 100.0],
            [240.0, 101.0, 100.0],
            [250.0, 101.0, 100.0],
        ];
        let mut palette = median_cut(colors, 2, &mut Progress::none());
        palette.sort_by_key(|c| c.0);
        assert_eq!(palette, vec![Rgb([5, 100, 100]), Rgb([245, 101, 100])]);
    }

    #[test]
    fn stops_when_colors_run_out() {
        let colors = vec![[1.0, 2.0, 3.0]; 10];
        assert_eq!(median_cut(colors, 8, &mut Progress::none()), vec![Rgb([1, 2, 3])]);
    }

    #[test]
    fn produces_requested_count() {
        let colors: Vec<Vec3> = (0..200)
            .map(|i| [(i % 256) as f32, ((i * 7) % 256) as f32, ((i * 13) % 256) as f32])
            .collect();
        assert_eq!(median_cut(colors, 16, &mut Progress::none()).len(), 16);
    }
}
