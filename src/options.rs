//! Generation options. One [`Method`] variant per strategy, each carrying
//! its own tunables, so a single `match` in the dispatcher selects the
//! strategy and its configuration together.

use crate::error::QuantError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    #[serde(flatten)]
    pub method: Method,
    /// Seed for every randomized step (sampling included).
    pub seed: u64,
}

impl Options {
    pub fn new(method: Method) -> Self {
        Self { method, seed: 0 }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parses options from JSON, e.g. `{"method":"octree","max_depth":6}`.
    pub fn from_json(json: &str) -> Result<Self, QuantError> {
        serde_json::from_str(json).map_err(|e| QuantError::InvalidConfiguration(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    /// Most frequent exact colors over the whole image.
    Popularity,
    Octree(OctreeOptions),
    /// Variance-driven median cut.
    MedianCut(SampleOptions),
    Pca(SampleOptions),
    /// Frequency-weighted farthest-point selection, then a few Lloyd passes.
    MaxMin(MaxMinOptions),
    KMeans(KMeansOptions),
    /// K-Means++ seeding only, no refinement.
    KMeansPlusPlusInit(SampleOptions),
    KMeansPlusPlus(KMeansOptions),
    /// Lloyd assignment with an exponential moving average center update.
    NativeKMeans(NativeKMeansOptions),
    LabKMeans(KMeansOptions),
    MeanShift(MeanShiftOptions),
    Dbscan(DbscanOptions),
    Gmm(GmmOptions),
    Hierarchical(HierarchicalOptions),
    Spectral(SpectralOptions),
    FixedBitDepth(FixedOptions),
    /// Palette from an injected [`BaselinePalette`](crate::BaselinePalette).
    Baseline,
    FloydSteinberg(ErrorDiffusionOptions),
    Ordered(OrderedOptions),
}

impl Default for Method {
    fn default() -> Self {
        Self::KMeans(KMeansOptions::default())
    }
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Popularity => "popularity",
            Self::Octree(_) => "octree",
            Self::MedianCut(_) => "median_cut",
            Self::Pca(_) => "pca",
            Self::MaxMin(_) => "max_min",
            Self::KMeans(_) => "k_means",
            Self::KMeansPlusPlusInit(_) => "k_means_plus_plus_init",
            Self::KMeansPlusPlus(_) => "k_means_plus_plus",
            Self::NativeKMeans(_) => "native_k_means",
            Self::LabKMeans(_) => "lab_k_means",
            Self::MeanShift(_) => "mean_shift",
            Self::Dbscan(_) => "dbscan",
            Self::Gmm(_) => "gmm",
            Self::Hierarchical(_) => "hierarchical",
            Self::Spectral(_) => "spectral",
            Self::FixedBitDepth(_) => "fixed_bit_depth",
            Self::Baseline => "baseline",
            Self::FloydSteinberg(_) => "floyd_steinberg",
            Self::Ordered(_) => "ordered",
        }
    }

    pub fn is_dithering(&self) -> bool {
        matches!(self, Self::FloydSteinberg(_) | Self::Ordered(_))
    }
}

/// Method with default tunables, by its snake_case tag.
impl FromStr for Method {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "popularity" => Self::Popularity,
            "octree" => Self::Octree(Default::default()),
            "median_cut" => Self::MedianCut(Default::default()),
            "pca" => Self::Pca(Default::default()),
            "max_min" => Self::MaxMin(Default::default()),
            "k_means" => Self::KMeans(Default::default()),
            "k_means_plus_plus_init" => Self::KMeansPlusPlusInit(Default::default()),
            "k_means_plus_plus" => Self::KMeansPlusPlus(Default::default()),
            "native_k_means" => Self::NativeKMeans(Default::default()),
            "lab_k_means" => Self::LabKMeans(Default::default()),
            "mean_shift" => Self::MeanShift(Default::default()),
            "dbscan" => Self::Dbscan(Default::default()),
            "gmm" => Self::Gmm(Default::default()),
            "hierarchical" => Self::Hierarchical(Default::default()),
            "spectral" => Self::Spectral(Default::default()),
            "fixed_bit_depth" => Self::FixedBitDepth(Default::default()),
            "baseline" => Self::Baseline,
            "floyd_steinberg" => Self::FloydSteinberg(Default::default()),
            "ordered" => Self::Ordered(Default::default()),
            other => {
                return Err(QuantError::InvalidConfiguration(format!(
                    "unknown method {other:?}"
                )))
            }
        };
        Ok(method)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleOptions {
    pub max_samples: usize,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self { max_samples: 20_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeOptions {
    /// Tree depth, 1..=8. Each level consumes one bit per channel.
    pub max_depth: u8,
    pub max_samples: usize,
}

impl Default for OctreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_samples: 20_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxMinOptions {
    pub max_samples: usize,
    pub refine_iterations: usize,
}

impl Default for MaxMinOptions {
    fn default() -> Self {
        Self {
            max_samples: 20_000,
            refine_iterations: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansOptions {
    pub max_samples: usize,
    pub max_iterations: usize,
    /// Stop once no center channel moves by this much, in working-space units.
    pub threshold: f32,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            max_iterations: 50,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeKMeansOptions {
    pub max_samples: usize,
    pub max_iterations: usize,
    pub threshold: f32,
    /// Weight of the new cluster mean in each center update.
    pub rate: f32,
}

impl Default for NativeKMeansOptions {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            max_iterations: 50,
            threshold: 0.5,
            rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanShiftOptions {
    pub max_samples: usize,
    pub bandwidth: f32,
    pub iterations: usize,
}

impl Default for MeanShiftOptions {
    fn default() -> Self {
        Self {
            max_samples: 4_000,
            bandwidth: 32.0,
            iterations: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanOptions {
    pub max_samples: usize,
    /// Neighborhood radius; `None` estimates it from the data.
    pub epsilon: Option<f32>,
    pub min_pts: usize,
}

impl Default for DbscanOptions {
    fn default() -> Self {
        Self {
            max_samples: 2_000,
            epsilon: None,
            min_pts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmmOptions {
    pub max_samples: usize,
    pub max_iterations: usize,
    /// Stop when the mean log-likelihood per sample changes less than this.
    pub tol: f64,
    pub initial_variance: f64,
    pub variance_floor: f64,
}

impl Default for GmmOptions {
    fn default() -> Self {
        Self {
            max_samples: 5_000,
            max_iterations: 100,
            tol: 1e-3,
            initial_variance: 400.0,
            variance_floor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    Single,
    Complete,
    #[default]
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalOptions {
    pub max_samples: usize,
    pub linkage: Linkage,
    pub metric: Metric,
}

impl Default for HierarchicalOptions {
    fn default() -> Self {
        Self {
            max_samples: 500,
            linkage: Linkage::Average,
            metric: Metric::Euclidean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralOptions {
    pub max_samples: usize,
    /// Neighbors per point in the similarity graph.
    pub neighbors: usize,
    /// Cap on power iteration steps per eigenvector.
    pub power_iterations: usize,
    pub max_iterations: usize,
    /// K-Means++ starts on the embedding; the lowest inertia wins.
    pub restarts: usize,
}

impl Default for SpectralOptions {
    fn default() -> Self {
        Self {
            max_samples: 400,
            neighbors: 10,
            power_iterations: 1_000,
            max_iterations: 50,
            restarts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedOptions {
    /// 1..=8 bits per pixel.
    pub bit_depth: u8,
    pub grayscale: bool,
}

impl Default for FixedOptions {
    fn default() -> Self {
        Self {
            bit_depth: 4,
            grayscale: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDiffusionOptions {
    /// Method producing the palette to dither against.
    pub base: Box<Method>,
    /// Fraction of the quantization error diffused, 0..=1.
    pub strength: f32,
    /// Alternate scan direction on every row.
    pub serpentine: bool,
}

impl Default for ErrorDiffusionOptions {
    fn default() -> Self {
        Self {
            base: Box::default(),
            strength: 1.0,
            serpentine: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderedOptions {
    pub base: Box<Method>,
    /// Offset amplitude as a fraction of the full channel range, 0..=1.
    pub strength: f32,
    /// Bayer matrix side: 2, 4 or 8.
    pub matrix_size: u8,
}

impl Default for OrderedOptions {
    fn default() -> Self {
        Self {
            base: Box::default(),
            strength: 1.0,
            matrix_size: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_method_tag_and_defaults() {
        let options = Options::from_json(r#"{"method":"octree","max_depth":6,"seed":9}"#).unwrap();
        assert_eq!(options.seed, 9);
        assert_eq!(
            options.method,
            Method::Octree(OctreeOptions {
                max_depth: 6,
                max_samples: 20_000
            })
        );
        let options = Options::from_json(r#"{"method":"popularity"}"#).unwrap();
        assert_eq!(options.method, Method::Popularity);
        assert_eq!(options.seed, 0);
    }

    #[test]
    fn json_nested_base_method() {
        let options = Options::from_json(
            r#"{"method":"ordered","matrix_size":2,"base":{"method":"dbscan","epsilon":12.5}}"#,
        )
        .unwrap();
        let Method::Ordered(ordered) = options.method else {
            panic!("expected ordered dithering");
        };
        assert_eq!(ordered.matrix_size, 2);
        assert_eq!(
            *ordered.base,
            Method::Dbscan(DbscanOptions {
                epsilon: Some(12.5),
                ..Default::default()
            })
        );
    }

    #[test]
    fn unknown_method_is_a_configuration_error() {
        assert!(matches!(
            Options::from_json(r#"{"method":"voronoi"}"#),
            Err(QuantError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            "voronoi".parse::<Method>(),
            Err(QuantError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn names_parse_back() {
        for name in ["popularity", "lab_k_means", "spectral", "floyd_steinberg"] {
            assert_eq!(name.parse::<Method>().unwrap().name(), name);
        }
    }
}
