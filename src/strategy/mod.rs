//! Palette generation strategies. Every `generate` returns at most the
//! requested number of colors; exact length is the normalizer's job.

pub mod dbscan;
pub mod fixed;
pub mod gmm;
pub mod hierarchical;
pub mod kmeans;
pub mod maxmin;
pub mod mean_shift;
pub mod median_cut;
pub mod octree;
pub mod pca;
pub mod popularity;
pub mod spectral;
