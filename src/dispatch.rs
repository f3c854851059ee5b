//! One generation call: pick the strategy for a [`Method`], normalize its
//! palette, and dither when the method asks for it.

use crate::buffer::PixelBuffer;
use crate::dither;
use crate::error::QuantError;
use crate::normalize::normalize;
use crate::options::{Method, Options};
use crate::progress::Progress;
use crate::strategy::{
    dbscan, fixed, gmm, hierarchical, kmeans, maxmin, mean_shift, median_cut, octree, pca,
    popularity, spectral,
};
use image::Rgb;

/// Supplies the palette for [`Method::Baseline`] from a reference image the
/// caller holds; the pixel buffer alone is not enough for it.
pub trait BaselinePalette: Sync {
    fn baseline_palette(&self, color_count: usize) -> Result<Vec<Rgb<u8>>, QuantError>;
}

pub struct Request<'a> {
    pub image: PixelBuffer<'a>,
    pub color_count: usize,
    pub options: Options,
    pub baseline: Option<&'a dyn BaselinePalette>,
}

impl<'a> Request<'a> {
    pub fn new(image: PixelBuffer<'a>, color_count: usize, options: Options) -> Self {
        Self {
            image,
            color_count,
            options,
            baseline: None,
        }
    }

    pub fn baseline(mut self, provider: &'a dyn BaselinePalette) -> Self {
        self.baseline = Some(provider);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Exactly `color_count` colors.
    pub palette: Vec<Rgb<u8>>,
    /// Set for dithering methods only. Same shape and stride as the input.
    pub dithered: Option<Vec<u8>>,
}

fn raw_palette(
    request: &Request,
    method: &Method,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    let image = &request.image;
    let count = request.color_count;
    let seed = request.options.seed;
    match method {
        Method::Popularity => popularity::generate(image, count, progress),
        Method::Octree(o) => octree::generate(image, count, o, seed, progress),
        Method::MedianCut(o) => median_cut::generate(image, count, o, seed, progress),
        Method::Pca(o) => pca::generate(image, count, o, seed, progress),
        Method::MaxMin(o) => maxmin::generate(image, count, o, seed, progress),
        Method::KMeans(o) => kmeans::generate(image, count, o, seed, progress),
        Method::KMeansPlusPlusInit(o) => {
            kmeans::generate_plus_plus_init(image, count, o, seed, progress)
        }
        Method::KMeansPlusPlus(o) => kmeans::generate_plus_plus(image, count, o, seed, progress),
        Method::NativeKMeans(o) => kmeans::generate_native(image, count, o, seed, progress),
        Method::LabKMeans(o) => kmeans::generate_lab(image, count, o, seed, progress),
        Method::MeanShift(o) => mean_shift::generate(image, count, o, seed, progress),
        Method::Dbscan(o) => dbscan::generate(image, count, o, seed, progress),
        Method::Gmm(o) => gmm::generate(image, count, o, seed, progress),
        Method::Hierarchical(o) => hierarchical::generate(image, count, o, seed, progress),
        Method::Spectral(o) => spectral::generate(image, count, o, seed, progress),
        Method::FixedBitDepth(o) => fixed::generate(o),
        Method::Baseline => match request.baseline {
            Some(provider) => provider.baseline_palette(count),
            None => Err(QuantError::MissingSource {
                method: method.name(),
            }),
        },
        Method::FloydSteinberg(o) => raw_palette(request, &o.base, progress),
        Method::Ordered(o) => raw_palette(request, &o.base, progress),
    }
}

/// Runs the requested method and returns a palette of exactly
/// `color_count` colors, plus the dithered pixels for dithering methods.
///
/// Fails with [`QuantError::EmptyInput`] when the image has no opaque pixel,
/// whatever the method.
pub fn generate(request: &Request, progress: &mut Progress) -> Result<Generation, QuantError> {
    if request.color_count == 0 {
        return Err(QuantError::InvalidConfiguration(
            "color count must be at least 1".into(),
        ));
    }
    if !request.image.has_opaque() {
        return Err(QuantError::EmptyInput);
    }
    let method = &request.options.method;
    tracing::debug!(
        method = method.name(),
        color_count = request.color_count,
        width = request.image.width(),
        height = request.image.height(),
        "generating palette"
    );

    let raw = raw_palette(request, method, progress)?;
    let produced = raw.len();
    let palette = normalize(raw, request.color_count);
    tracing::debug!(produced, "palette normalized");

    let dithered = match method {
        Method::FloydSteinberg(o) => Some(dither::floyd_steinberg(
            &request.image,
            &palette,
            o.strength,
            o.serpentine,
        )?),
        Method::Ordered(o) => Some(dither::ordered(
            &request.image,
            &palette,
            o.strength,
            o.matrix_size,
        )?),
        _ => None,
    };
    progress.report(1.0);
    Ok(Generation { palette, dithered })
}
