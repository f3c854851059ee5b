//! Palette generation and dithering for RGBA images.
//!
//! ```no_run
//! use rquant::{generate, Method, Options, PixelBuffer, Progress, Request};
//!
//! # fn main() -> Result<(), rquant::QuantError> {
//! let pixels = vec![255u8; 8 * 8 * 4];
//! let image = PixelBuffer::packed(&pixels, 8, 8)?;
//! let options = Options::new("octree".parse::<Method>()?).seed(7);
//! let out = generate(&Request::new(image, 16, options), &mut Progress::none())?;
//! assert_eq!(out.palette.len(), 16);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod color;
pub mod dispatch;
pub mod dither;
pub mod error;
pub mod grid;
pub mod kmeans;
pub mod normalize;
pub mod options;
pub mod progress;
pub mod queue;
pub mod sampler;
pub mod strategy;

pub use buffer::PixelBuffer;
pub use dispatch::{generate, BaselinePalette, Generation, Request};
pub use error::QuantError;
pub use options::{Method, Options};
pub use progress::Progress;
