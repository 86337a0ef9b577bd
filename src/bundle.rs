//! Bundle directories: one padded image plus its metadata documents.
//!
//! ```text
//! dist/
//! └── photosphere-streetview-IMG_0042/
//!     ├── IMG_0042.jpg          # padded canvas, original file name and format
//!     ├── streetview.html       # HtmlRenderer
//!     └── IMG_0042.xmp          # XmpRenderer
//! ```
//!
//! The image and every document come from the same [`Padded`] value (or, on
//! a cache hit, the [`PanoOpts`] recorded alongside the cached canvas).

use crate::pano::{PadError, Padded, PanoOpts};
use crate::render::{MetadataRenderer, PanoDocument, RenderError};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] PadError),
    #[error("could not render metadata: {0}")]
    Render(#[from] RenderError),
}

/// Files written for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBundle {
    pub dir: PathBuf,
    pub image: PathBuf,
    pub documents: Vec<PathBuf>,
}

/// Bundle directory name for an image: `<prefix>-<stem>`.
///
/// ```
/// # use streetsphere::bundle::bundle_name;
/// assert_eq!(
///     bundle_name("photosphere-streetview", "IMG_0042.jpg"),
///     "photosphere-streetview-IMG_0042"
/// );
/// ```
pub fn bundle_name(prefix: &str, image_filename: &str) -> String {
    let stem = Path::new(image_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_filename.to_string());
    format!("{prefix}-{stem}")
}

/// Encode the canvas to `path` in its source format.
///
/// The image is encoded next to `path` and renamed into place, so a failed
/// write leaves any previous file untouched.
pub fn write_image(padded: &Padded, path: &Path) -> Result<(), BundleError> {
    let tmp = partial_path(path);
    let written =
        encode_into(padded, &tmp).and_then(|()| fs::rename(&tmp, path).map_err(BundleError::from));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

fn encode_into(padded: &Padded, path: &Path) -> Result<(), BundleError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    padded.write_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Render every document for `pano` into `dir`.
pub fn write_documents(
    dir: &Path,
    image_filename: &str,
    pano: &PanoOpts,
    generator: Option<&str>,
    renderers: &[Box<dyn MetadataRenderer>],
) -> Result<Vec<PathBuf>, BundleError> {
    let doc = PanoDocument {
        image_filename,
        pano,
        generator,
    };
    renderers
        .iter()
        .map(|renderer| -> Result<PathBuf, BundleError> {
            let path = dir.join(renderer.file_name(&doc));
            fs::write(&path, renderer.render(&doc)?)?;
            Ok(path)
        })
        .collect()
}

/// Write the padded image and its documents into `dir`.
pub fn write_bundle(
    padded: &Padded,
    dir: &Path,
    image_filename: &str,
    generator: Option<&str>,
    renderers: &[Box<dyn MetadataRenderer>],
) -> Result<WrittenBundle, BundleError> {
    fs::create_dir_all(dir)?;
    let image = dir.join(image_filename);
    write_image(padded, &image)?;
    let documents = write_documents(dir, image_filename, padded.opts(), generator, renderers)?;
    log::info!(
        "wrote bundle {} ({:?} {}x{})",
        dir.display(),
        padded.format(),
        padded.canvas().width(),
        padded.canvas().height()
    );
    Ok(WrittenBundle {
        dir: dir.to_path_buf(),
        image,
        documents,
    })
}
