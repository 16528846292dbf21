//! Error taxonomy shared by every imaging operation.
//!
//! All variants are terminal for the operation that raised them: nothing
//! retries, and no operation silently substitutes another format or size.
//! Out-of-bounds crop windows and enlarge-disabled requests are *not* errors,
//! they produce padded or clamped results.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Resource limit exceeded: {area} pixels is above the limit of {limit}")]
    ResourceLimitExceeded { area: u64, limit: u64 },
}

impl ImagingError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}

/// Result type for imaging operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Largest canvas an operation may allocate: 2^28 pixels, 1 GiB as RGBA.
pub(crate) const MAX_CANVAS_AREA: u64 = 1 << 28;

/// Reject non-positive target dimensions.
pub(crate) fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ImagingError::geometry(format!(
            "dimensions must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}
