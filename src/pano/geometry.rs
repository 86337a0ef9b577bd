//! Pure canvas geometry.
//!
//! Nothing here touches pixels or I/O, so every rule can be tested with plain
//! numbers.

use super::opts::{Alignment, PanoOpts};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("image has zero area ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },
    #[error("canvas for a {width}x{height} image does not fit in 32-bit dimensions")]
    TooLarge { width: u32, height: u32 },
}

/// Smallest canvas height `H` with `H >= height`, `2H >= width`, and `H` a
/// multiple of `alignment`.
///
/// Computed in `u64`; returns `None` when `2H` would not fit in a `u32`.
///
/// # Examples
/// ```
/// # use streetsphere::pano::{Alignment, canvas_height};
/// // 4:3 photo: the height already covers half the width
/// assert_eq!(canvas_height(4000, 3000, Alignment::default()), Some(3000));
///
/// // Wide strip: half the width (rounded up) wins
/// assert_eq!(canvas_height(5001, 100, Alignment::default()), Some(2501));
/// assert_eq!(canvas_height(5001, 100, Alignment::new(2)), Some(2502));
/// ```
pub fn canvas_height(width: u32, height: u32, alignment: Alignment) -> Option<u32> {
    let half_width = u64::from(width).div_ceil(2);
    let base = u64::from(height).max(half_width);
    let align = u64::from(alignment.value());
    let aligned = base.div_ceil(align) * align;

    if aligned * 2 > u64::from(u32::MAX) {
        return None;
    }
    u32::try_from(aligned).ok()
}

/// Plan the full canvas for a `width × height` source.
///
/// Offsets truncate, so an odd pixel of slack ends up on the right or bottom
/// edge. Rejects zero-area sources before anything is allocated.
pub fn plan_canvas(
    width: u32,
    height: u32,
    alignment: Alignment,
) -> Result<PanoOpts, GeometryError> {
    if width == 0 || height == 0 {
        return Err(GeometryError::ZeroArea { width, height });
    }

    let full_height =
        canvas_height(width, height, alignment).ok_or(GeometryError::TooLarge { width, height })?;
    let full_width = full_height * 2;

    Ok(PanoOpts {
        full_width,
        full_height,
        cropped_width: width,
        cropped_height: height,
        cropped_left: (full_width - width) / 2,
        cropped_top: (full_height - height) / 2,
    })
}
