//! Value types shared by the geometry and padding code.
//!
//! - [`PanoOpts`]: where the source pixels sit inside the full canvas. This is
//!   the record panorama viewers read, so its serialized field names are the
//!   exact PascalCase names they expect.
//! - [`Alignment`]: rounding rule for the canvas height (1 = plain `ceil`,
//!   2 = even heights, ...). Clamped to at least 1 on construction.

use serde::{Deserialize, Serialize};

/// Placement of the source image inside an equirectangular canvas.
///
/// Invariants (upheld by [`plan_canvas`](crate::pano::plan_canvas)):
/// - `full_width == 2 * full_height`
/// - `cropped_left + cropped_width <= full_width`
/// - `cropped_top + cropped_height <= full_height`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PanoOpts {
    pub full_width: u32,
    pub full_height: u32,
    pub cropped_width: u32,
    pub cropped_height: u32,
    pub cropped_left: u32,
    pub cropped_top: u32,
}

impl PanoOpts {
    /// The source already had the 2:1 shape, nothing was padded.
    pub fn is_identity(&self) -> bool {
        self.full_width == self.cropped_width && self.full_height == self.cropped_height
    }

    /// Total canvas area in pixels.
    pub fn canvas_pixels(&self) -> u64 {
        u64::from(self.full_width) * u64::from(self.full_height)
    }

    /// Padding columns to the right of the source region.
    pub fn padding_right(&self) -> u32 {
        self.full_width - self.cropped_left - self.cropped_width
    }

    /// Padding rows below the source region.
    pub fn padding_bottom(&self) -> u32 {
        self.full_height - self.cropped_top - self.cropped_height
    }
}

/// Multiple the canvas height is rounded up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alignment(u32);

impl Alignment {
    pub fn new(value: u32) -> Self {
        Self(value.max(1))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> PanoOpts {
        PanoOpts {
            full_width: 6000,
            full_height: 3000,
            cropped_width: 4000,
            cropped_height: 3000,
            cropped_left: 1000,
            cropped_top: 0,
        }
    }

    #[test]
    fn alignment_clamps_zero_to_one() {
        assert_eq!(Alignment::new(0).value(), 1);
        assert_eq!(Alignment::new(2).value(), 2);
    }

    #[test]
    fn alignment_default_is_plain_ceil() {
        assert_eq!(Alignment::default().value(), 1);
    }

    #[test]
    fn serializes_with_viewer_field_names() {
        let json = serde_json::to_value(opts()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "FullWidth": 6000,
                "FullHeight": 3000,
                "CroppedWidth": 4000,
                "CroppedHeight": 3000,
                "CroppedLeft": 1000,
                "CroppedTop": 0,
            })
        );
    }

    #[test]
    fn padding_edges() {
        let o = opts();
        assert_eq!(o.padding_right(), 1000);
        assert_eq!(o.padding_bottom(), 0);
        assert_eq!(o.canvas_pixels(), 18_000_000);
        assert!(!o.is_identity());
    }
}
