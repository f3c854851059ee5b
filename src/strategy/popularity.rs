//! Most frequent exact colors over the entire image.

use crate::buffer::{PixelBuffer, OPACITY_THRESHOLD};
use crate::error::QuantError;
use crate::progress::Progress;
use image::Rgb;
use rayon::prelude::*;
use std::collections::HashMap;

/// Rows handled by one parallel work item.
const ROWS_PER_CHUNK: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    /// Row-major index of the first pixel seen with this color.
    first: usize,
}

type ColorHist = HashMap<[u8; 3], Entry>;

fn merge(mut into: ColorHist, from: ColorHist) -> ColorHist {
    for (color, entry) in from {
        into.entry(color)
            .and_modify(|e| {
                e.count += entry.count;
                e.first = e.first.min(entry.first);
            })
            .or_insert(entry);
    }
    into
}

fn histogram(image: &PixelBuffer) -> ColorHist {
    let height = image.height() as usize;
    let width = image.width() as usize;
    (0..height.div_ceil(ROWS_PER_CHUNK))
        .into_par_iter()
        .map(|chunk| {
            let mut hist = ColorHist::new();
            let rows = chunk * ROWS_PER_CHUNK..((chunk + 1) * ROWS_PER_CHUNK).min(height);
            for y in rows {
                for (x, px) in image.row(y as u32).chunks_exact(4).enumerate() {
                    if px[3] <= OPACITY_THRESHOLD {
                        continue;
                    }
                    let index = y * width + x;
                    hist.entry([px[0], px[1], px[2]])
                        .and_modify(|e| e.count += 1)
                        .or_insert(Entry { count: 1, first: index });
                }
            }
            hist
        })
        .collect::<Vec<_>>()
        .into_iter()
        .fold(ColorHist::new(), merge)
}

/// Returns up to `color_count` colors ordered by descending frequency,
/// ties going to the color seen first in scan order.
pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let hist = histogram(image);
    if hist.is_empty() {
        return Err(QuantError::EmptyInput);
    }
    progress.report(0.5);
    tracing::debug!(distinct = hist.len(), "popularity histogram built");
    let mut colors: Vec<_> = hist.into_iter().collect();
    colors.sort_unstable_by(|a, b| b.1.count.cmp(&a.1.count).then(a.1.first.cmp(&b.1.first)));
    progress.report(1.0);
    Ok(colors
        .into_iter()
        .take(color_count)
        .map(|(color, _)| Rgb(color))
        .collect())
}
