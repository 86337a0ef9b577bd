//! Shared test utilities: synthetic images built in memory.
//!
//! Every test image is a deterministic gradient, so pixel assertions can
//! compare against [`gradient_rgb`] directly.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Deterministic RGB gradient with no two neighbouring pixels equal.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Encode a gradient of the given size in `format`.
pub fn encode_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(gradient_rgb(width, height));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Write an encoded gradient to `path`, format inferred from the extension.
pub fn write_test_image(path: &Path, width: u32, height: u32) {
    let format = ImageFormat::from_path(path).unwrap();
    std::fs::write(path, encode_test_image(width, height, format)).unwrap();
}
