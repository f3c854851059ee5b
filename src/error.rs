use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuantError {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("row stride {stride} is shorter than width {width} x 4")]
    InvalidStride { stride: usize, width: u32 },

    #[error("pixel buffer of {len} bytes is smaller than the {required} bytes the dimensions require")]
    BufferTooSmall { len: usize, required: usize },

    #[error("image has no opaque pixels")]
    EmptyInput,

    #[error("method {method} needs a baseline palette source but none was provided")]
    MissingSource { method: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
