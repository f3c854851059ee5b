use crate::error::QuantError;
use image::{Rgb, RgbaImage};

/// Pixels with alpha at or below this value are treated as transparent.
pub const OPACITY_THRESHOLD: u8 = 128;

/// Borrowed view of a row-major RGBA8 pixel buffer.
///
/// Offsets handed around the crate are byte offsets of a pixel's first
/// channel, so they can index `data()` directly.
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> PixelBuffer<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize) -> Result<Self, QuantError> {
        if width == 0 || height == 0 {
            return Err(QuantError::ZeroDimension);
        }
        if stride < width as usize * 4 {
            return Err(QuantError::InvalidStride { stride, width });
        }
        let required = stride * (height as usize - 1) + width as usize * 4;
        if data.len() < required {
            return Err(QuantError::BufferTooSmall {
                len: data.len(),
                required,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Tightly packed buffer, `stride == width * 4`.
    pub fn packed(data: &'a [u8], width: u32, height: u32) -> Result<Self, QuantError> {
        Self::new(data, width, height, width as usize * 4)
    }

    pub fn from_image(img: &'a RgbaImage) -> Result<Self, QuantError> {
        Self::packed(img.as_raw(), img.width(), img.height())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize * 4
    }

    /// Byte offset of the `index`-th pixel in row-major order.
    #[inline]
    pub fn offset_of_index(&self, index: usize) -> usize {
        let w = self.width as usize;
        (index / w) * self.stride + (index % w) * 4
    }

    #[inline]
    pub fn is_opaque(&self, offset: usize) -> bool {
        self.data[offset + 3] > OPACITY_THRESHOLD
    }

    #[inline]
    pub fn rgb(&self, offset: usize) -> Rgb<u8> {
        Rgb([self.data[offset], self.data[offset + 1], self.data[offset + 2]])
    }

    /// Color of the pixel at `offset` as an `f32` vector.
    #[inline]
    pub fn vec3(&self, offset: usize) -> [f32; 3] {
        [
            self.data[offset] as f32,
            self.data[offset + 1] as f32,
            self.data[offset + 2] as f32,
        ]
    }

    /// Bytes of row `y` that belong to pixels (stride padding excluded).
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * 4]
    }

    pub fn has_opaque(&self) -> bool {
        (0..self.height).any(|y| {
            self.row(y)
                .chunks_exact(4)
                .any(|px| px[3] > OPACITY_THRESHOLD)
        })
    }
}
