//! Panorama padding: pure Rust, no system dependencies.
//!
//! | Step | Where |
//! |---|---|
//! | **Geometry** | [`plan_canvas`]: canvas size + crop offsets, no pixels |
//! | **Decode** | `image` crate, format sniffed from magic bytes |
//! | **Compose** | [`PanoramaPadder::pad`]: zeroed canvas + pixel copy |
//! | **Encode** | [`Padded::write_to`], same format as the source |
//!
//! The module is split into:
//! - **Opts**: [`PanoOpts`] and [`Alignment`] value types
//! - **Geometry**: Pure functions for canvas math (unit testable)
//! - **Pad**: [`PanoramaPadder`] and the [`Padded`] canvas/metadata pair

mod geometry;
mod opts;
mod pad;

pub use geometry::{GeometryError, canvas_height, plan_canvas};
pub use opts::{Alignment, PanoOpts};
pub use pad::{
    PadError, Padded, PanoramaPadder, format_supports_alpha, read_dimensions,
    supported_input_extensions,
};
