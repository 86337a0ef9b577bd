//! Decode, plan, compose: the padding pass itself.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Format sniffing | `image::ImageReader::with_guessed_format` (magic bytes) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Geometry | [`plan_canvas`](super::geometry::plan_canvas) |
//! | Compose | `image::ImageBuffer::new` (zeroed) + `image::imageops::replace` |
//! | Encode | `DynamicImage::write_to` in the source format |
//!
//! ## Background
//!
//! The canvas starts with every channel at zero. Formats that carry alpha
//! (PNG, TIFF, WebP) get the source widened to RGBA at its own bit depth first,
//! so the padding is fully transparent. JPEG keeps the source color type and
//! the padding is opaque black. Source samples are never altered.

use super::geometry::{GeometryError, plan_canvas};
use super::opts::{Alignment, PanoOpts};
use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader, Pixel};
use std::io::{Cursor, Seek, Write};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PadError {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("invalid image geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),
    #[error("could not encode padded image: {0}")]
    Encode(String),
}

/// Formats with both a decoder and an encoder compiled in.
const FORMAT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    FORMAT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// File extensions the padder can both read and write back.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

fn is_supported_format(format: ImageFormat) -> bool {
    FORMAT_CANDIDATES.iter().any(|(_, f)| *f == format)
        && format.reading_enabled()
        && format.writing_enabled()
}

/// Whether padding in `format` can be transparent.
pub fn format_supports_alpha(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Tiff | ImageFormat::WebP
    )
}

/// Sniff the format of an in-memory image.
fn guess_format(bytes: &[u8]) -> Result<(ImageReader<Cursor<&[u8]>>, ImageFormat), PadError> {
    if bytes.is_empty() {
        return Err(PadError::Decode("input is empty".into()));
    }
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PadError::Decode(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| PadError::Decode("unrecognized image format".into()))?;
    if !is_supported_format(format) {
        return Err(PadError::Decode(format!(
            "unsupported image format: {format:?}"
        )));
    }
    Ok((reader, format))
}

/// Read width and height from the image header without decoding pixels.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), PadError> {
    let (reader, _) = guess_format(bytes)?;
    reader
        .into_dimensions()
        .map_err(|e| PadError::Decode(e.to_string()))
}

/// A padded canvas and the metadata describing it.
///
/// The two are produced by the same pass and only handed out together, so the
/// offsets in [`opts`](Self::opts) always match where the pixels were placed.
#[derive(Debug, Clone)]
pub struct Padded {
    canvas: DynamicImage,
    opts: PanoOpts,
    format: ImageFormat,
}

impl Padded {
    pub fn canvas(&self) -> &DynamicImage {
        &self.canvas
    }

    pub fn opts(&self) -> &PanoOpts {
        &self.opts
    }

    /// Encoding used by [`write_to`](Self::write_to); same as the source.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Stream the canvas to `writer` in the source format.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<(), PadError> {
        self.canvas
            .write_to(writer, self.format)
            .map_err(|e| PadError::Encode(e.to_string()))
    }

    /// Encode the canvas into a fresh buffer.
    #[cfg(test)]
    pub(crate) fn encode(&self) -> Result<Vec<u8>, PadError> {
        let mut buf = Cursor::new(Vec::new());
        self.write_to(&mut buf)?;
        Ok(buf.into_inner())
    }
}

/// Pads photos onto equirectangular canvases.
///
/// Stateless apart from the alignment rule, so one instance can be shared
/// across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanoramaPadder {
    alignment: Alignment,
}

impl PanoramaPadder {
    pub fn new(alignment: Alignment) -> Self {
        Self { alignment }
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Geometry for a `width × height` source, without touching pixels.
    pub fn plan(&self, width: u32, height: u32) -> Result<PanoOpts, PadError> {
        Ok(plan_canvas(width, height, self.alignment)?)
    }

    /// Decode `bytes` and pad the result.
    ///
    /// Fails with [`PadError::Decode`] for empty, truncated, or unsupported
    /// input and [`PadError::InvalidGeometry`] for zero-area images.
    pub fn pad(&self, bytes: &[u8]) -> Result<Padded, PadError> {
        let (reader, format) = guess_format(bytes)?;
        let source = reader
            .decode()
            .map_err(|e| PadError::Decode(e.to_string()))?;
        self.pad_image(&source, format)
    }

    /// Pad an already decoded image that will be written back as `format`.
    pub fn pad_image(
        &self,
        source: &DynamicImage,
        format: ImageFormat,
    ) -> Result<Padded, PadError> {
        let opts = self.plan(source.width(), source.height())?;
        log::debug!(
            "canvas {}x{} for {}x{} source at ({}, {})",
            opts.full_width,
            opts.full_height,
            opts.cropped_width,
            opts.cropped_height,
            opts.cropped_left,
            opts.cropped_top
        );

        let canvas = if format_supports_alpha(format) {
            compose_dynamic(&with_alpha(source), &opts)
        } else {
            compose_dynamic(source, &opts)
        };

        Ok(Padded {
            canvas,
            opts,
            format,
        })
    }
}

/// Widen to RGBA at the source's bit depth. Lossless for every variant.
fn with_alpha(source: &DynamicImage) -> DynamicImage {
    match source {
        DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgba32F(_) => source.clone(),
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_) => DynamicImage::ImageRgba16(source.to_rgba16()),
        DynamicImage::ImageRgb32F(_) => DynamicImage::ImageRgba32F(source.to_rgba32f()),
        _ => DynamicImage::ImageRgba8(source.to_rgba8()),
    }
}

fn compose_dynamic(source: &DynamicImage, opts: &PanoOpts) -> DynamicImage {
    match source {
        DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(compose(img, opts)),
        DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(compose(img, opts)),
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(compose(img, opts)),
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(compose(img, opts)),
        DynamicImage::ImageLuma16(img) => DynamicImage::ImageLuma16(compose(img, opts)),
        DynamicImage::ImageLumaA16(img) => DynamicImage::ImageLumaA16(compose(img, opts)),
        DynamicImage::ImageRgb16(img) => DynamicImage::ImageRgb16(compose(img, opts)),
        DynamicImage::ImageRgba16(img) => DynamicImage::ImageRgba16(compose(img, opts)),
        DynamicImage::ImageRgb32F(img) => DynamicImage::ImageRgb32F(compose(img, opts)),
        DynamicImage::ImageRgba32F(img) => DynamicImage::ImageRgba32F(compose(img, opts)),
        other => DynamicImage::ImageRgba8(compose(&other.to_rgba8(), opts)),
    }
}

/// Copy `source` onto a zeroed `full_width × full_height` canvas at the crop
/// offsets.
fn compose<P: Pixel>(
    source: &ImageBuffer<P, Vec<P::Subpixel>>,
    opts: &PanoOpts,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let mut canvas = ImageBuffer::new(opts.full_width, opts.full_height);
    image::imageops::replace(
        &mut canvas,
        source,
        i64::from(opts.cropped_left),
        i64::from(opts.cropped_top),
    );
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_test_image, gradient_rgb};
    use image::{GenericImageView, Rgb, Rgba};

    fn padder() -> PanoramaPadder {
        PanoramaPadder::default()
    }

    #[test]
    fn supported_extensions_cover_common_photo_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(exts.contains(expected), "expected {expected} in {exts:?}");
        }
    }

    #[test]
    fn empty_input_is_decode_error() {
        assert!(matches!(padder().pad(&[]), Err(PadError::Decode(_))));
    }

    #[test]
    fn garbage_input_is_decode_error() {
        let result = padder().pad(b"definitely not an image");
        assert!(matches!(result, Err(PadError::Decode(_))));
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let bytes = encode_test_image(40, 30, ImageFormat::Png);
        let result = padder().pad(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(PadError::Decode(_))));
    }

    #[test]
    fn read_dimensions_from_header() {
        let bytes = encode_test_image(64, 20, ImageFormat::Png);
        assert_eq!(read_dimensions(&bytes).unwrap(), (64, 20));
    }

    #[test]
    fn zero_area_image_rejected() {
        let empty = DynamicImage::ImageRgb8(image::RgbImage::new(0, 5));
        let result = padder().pad_image(&empty, ImageFormat::Png);
        assert!(matches!(
            result,
            Err(PadError::InvalidGeometry(GeometryError::ZeroArea { .. }))
        ));
    }

    #[test]
    fn png_four_by_three_is_centered_with_transparent_padding() {
        let bytes = encode_test_image(40, 30, ImageFormat::Png);
        let padded = padder().pad(&bytes).unwrap();
        let opts = *padded.opts();

        assert_eq!((opts.full_width, opts.full_height), (60, 30));
        assert_eq!((opts.cropped_left, opts.cropped_top), (10, 0));
        assert_eq!(padded.format(), ImageFormat::Png);

        let canvas = padded.canvas();
        assert_eq!(canvas.dimensions(), (60, 30));
        assert_eq!(canvas.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(canvas.get_pixel(59, 29), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn every_source_pixel_lands_at_offset() {
        let source = gradient_rgb(21, 13);
        let padded = padder()
            .pad_image(&DynamicImage::ImageRgb8(source.clone()), ImageFormat::Png)
            .unwrap();
        let opts = padded.opts();
        let canvas = padded.canvas().to_rgba8();

        for (x, y, Rgb([r, g, b])) in source.enumerate_pixels() {
            let out = canvas.get_pixel(opts.cropped_left + x, opts.cropped_top + y);
            assert_eq!(*out, Rgba([*r, *g, *b, 255]), "pixel ({x}, {y})");
        }
    }

    #[test]
    fn padding_outside_crop_is_background() {
        let source = DynamicImage::ImageRgb8(gradient_rgb(3, 3));
        let padded = padder().pad_image(&source, ImageFormat::Png).unwrap();
        let opts = padded.opts();
        let canvas = padded.canvas().to_rgba8();

        for (x, y, px) in canvas.enumerate_pixels() {
            let inside = x >= opts.cropped_left
                && x < opts.cropped_left + opts.cropped_width
                && y >= opts.cropped_top
                && y < opts.cropped_top + opts.cropped_height;
            if !inside {
                assert_eq!(*px, Rgba([0, 0, 0, 0]), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn jpeg_padding_is_opaque_black_without_alpha() {
        let source = DynamicImage::ImageRgb8(gradient_rgb(8, 6));
        let padded = padder().pad_image(&source, ImageFormat::Jpeg).unwrap();
        assert!(matches!(padded.canvas(), DynamicImage::ImageRgb8(_)));
        assert_eq!(padded.canvas().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn sixteen_bit_source_keeps_depth() {
        let source = DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(
            4,
            4,
            Rgb([1000u16, 2000, 65535]),
        ));
        let padded = padder().pad_image(&source, ImageFormat::Png).unwrap();
        let DynamicImage::ImageRgba16(canvas) = padded.canvas() else {
            panic!("expected rgba16 canvas, got {:?}", padded.canvas().color());
        };
        let opts = padded.opts();
        assert_eq!(
            *canvas.get_pixel(opts.cropped_left, opts.cropped_top),
            Rgba([1000, 2000, 65535, 65535])
        );
    }

    #[test]
    fn two_to_one_source_is_identity() {
        let bytes = encode_test_image(64, 32, ImageFormat::Png);
        let padded = padder().pad(&bytes).unwrap();
        assert!(padded.opts().is_identity());
        assert_eq!((padded.opts().cropped_left, padded.opts().cropped_top), (0, 0));
        assert_eq!(padded.canvas().dimensions(), (64, 32));
    }

    #[test]
    fn single_pixel_source() {
        let bytes = encode_test_image(1, 1, ImageFormat::Png);
        let padded = padder().pad(&bytes).unwrap();
        assert_eq!(padded.canvas().dimensions(), (2, 1));
        assert_eq!((padded.opts().cropped_left, padded.opts().cropped_top), (0, 0));
    }

    #[test]
    fn alignment_applies_to_canvas() {
        let bytes = encode_test_image(1, 1, ImageFormat::Png);
        let padded = PanoramaPadder::new(Alignment::new(2)).pad(&bytes).unwrap();
        assert_eq!(padded.canvas().dimensions(), (4, 2));
        assert_eq!(padded.opts().cropped_left, 1);
    }

    #[test]
    fn padding_twice_is_byte_identical() {
        let bytes = encode_test_image(37, 19, ImageFormat::Png);
        let first = padder().pad(&bytes).unwrap();
        let second = padder().pad(&bytes).unwrap();
        assert_eq!(first.opts(), second.opts());
        assert_eq!(first.encode().unwrap(), second.encode().unwrap());
    }

    #[test]
    fn png_round_trip_preserves_canvas() {
        let bytes = encode_test_image(30, 10, ImageFormat::Png);
        let padded = padder().pad(&bytes).unwrap();
        let encoded = padded.encode().unwrap();
        let decoded = image::load_from_memory(&encoded).unwrap();
        assert_eq!(decoded.to_rgba8(), padded.canvas().to_rgba8());
    }

    #[test]
    fn jpeg_input_encodes_back_to_jpeg() {
        let bytes = encode_test_image(40, 30, ImageFormat::Jpeg);
        let padded = padder().pad(&bytes).unwrap();
        assert_eq!(padded.format(), ImageFormat::Jpeg);
        let encoded = padded.encode().unwrap();
        assert_eq!(
            image::guess_format(&encoded).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(read_dimensions(&encoded).unwrap(), (60, 30));
    }
}
