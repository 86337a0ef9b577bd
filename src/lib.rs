//! # streetsphere
//!
//! Turns ordinary photos into images that Street View and Photo Sphere
//! viewers accept. Those viewers want an equirectangular canvas exactly twice
//! as wide as it is tall; a photo of any other shape is centered on such a
//! canvas and described with the six GPano crop fields.
//!
//! ```text
//! photo.jpg (4000x3000)  →  photosphere-streetview-photo/
//!                              ├── photo.jpg         6000x3000 canvas
//!                              ├── streetview.html   fields + exiftool command
//!                              └── photo.xmp         GPano sidecar
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pano`] | Canvas geometry and the `PanoramaPadder` that pads pixels onto it |
//! | [`render`] | Metadata documents (HTML, XMP, JSON) for a padded image |
//! | [`bundle`] | Writes one padded image plus its documents to a directory |
//! | [`process`] | Batch conversion: input expansion, limits, parallel jobs |
//! | [`cache`] | Content-addressed cache that skips re-padding unchanged sources |
//! | [`config`] | `streetsphere.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Geometry Is Pure
//!
//! [`pano::plan_canvas`] is a pure function of the source dimensions and
//! alignment. Batch limits, `inspect`, and the padder all call it, so a
//! preview always matches the canvas later written.
//!
//! ## One Pass Feeds Pixels And Metadata
//!
//! A [`pano::Padded`] carries the canvas together with the [`pano::PanoOpts`]
//! that produced it. Bundles are written from that single value, and the
//! cache records the same `PanoOpts` next to the image it describes.
//!
//! ## Output Keeps The Source Format
//!
//! A JPEG comes out as a JPEG, a PNG as a PNG. Formats with an alpha channel
//! get transparent padding; JPEG padding is black.

pub mod bundle;
pub mod cache;
pub mod config;
pub mod output;
pub mod pano;
pub mod process;
pub mod render;

#[cfg(test)]
pub(crate) mod test_helpers;
