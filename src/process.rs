//! Batch conversion of source photos into bundles.
//!
//! ## Flow
//!
//! ```text
//! inputs (files / dirs) → expand → name bundles → pad in parallel → cache update
//! ```
//!
//! Each source is an independent job. A failing image is reported and the
//! rest of the batch carries on; only problems with the batch itself (missing
//! inputs, two sources claiming the same bundle) abort the run.
//!
//! ## Guards
//!
//! Before any pixel is decoded, a source is rejected if its file exceeds
//! `limits.max_input_bytes` or if the canvas planned from its header exceeds
//! `limits.max_canvas_pixels`.
//!
//! ## Parallel Processing
//!
//! Jobs run on the global [rayon](https://docs.rs/rayon) pool. Progress
//! events go out over an optional channel as each job finishes, so their order
//! follows completion, not input order.

use crate::bundle::{self, BundleError, WrittenBundle};
use crate::cache::{self, CacheManifest, CacheStats};
use crate::config::Config;
use crate::pano::{
    PadError, PanoOpts, PanoramaPadder, read_dimensions, supported_input_extensions,
};
use crate::render::{self, MetadataRenderer};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source image not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("{} is {size} bytes, over the {limit} byte limit", path.display())]
    InputTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("{} needs a {width}x{height} canvas, over the {limit} pixel limit", path.display())]
    CanvasTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        limit: u64,
    },
    #[error("{} and {} both map to bundle {name}", first.display(), second.display())]
    DuplicateBundle {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("could not convert image to street view format: {0}")]
    Pad(#[from] PadError),
    #[error("could not write bundle: {0}")]
    Bundle(#[from] BundleError),
}

/// Who is at fault for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The source itself is unusable: undecodable, empty, oversized.
    Input,
    /// Something went wrong on our side: disk, encoding, rendering.
    Internal,
}

impl ProcessError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProcessError::SourceNotFound(_)
            | ProcessError::InputTooLarge { .. }
            | ProcessError::CanvasTooLarge { .. }
            | ProcessError::DuplicateBundle { .. }
            | ProcessError::Pad(PadError::Decode(_))
            | ProcessError::Pad(PadError::InvalidGeometry(_)) => ErrorClass::Input,
            ProcessError::Io(_)
            | ProcessError::Pad(PadError::Encode(_))
            | ProcessError::Bundle(_) => ErrorClass::Internal,
        }
    }
}

/// How a bundle's canvas was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// Already on disk from an earlier run.
    Cached,
    /// Reused from another path in the cache.
    Copied,
    /// Decoded, padded, and encoded in this run.
    Padded,
}

/// Progress event emitted as each job finishes.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Converted {
        index: usize,
        source: PathBuf,
        bundle_dir: PathBuf,
        pano: PanoOpts,
        status: ImageStatus,
    },
    Failed {
        index: usize,
        source: PathBuf,
        message: String,
        class: ErrorClass,
    },
}

/// A successfully converted source.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    /// 1-based position in the expanded input list.
    pub index: usize,
    pub source: PathBuf,
    pub bundle: WrittenBundle,
    pub pano: PanoOpts,
    pub status: ImageStatus,
}

/// A source that could not be converted.
#[derive(Debug)]
pub struct FailedImage {
    pub index: usize,
    pub source: PathBuf,
    pub error: ProcessError,
}

/// Outcome of a batch, both lists in input order.
#[derive(Debug)]
pub struct ProcessResult {
    pub converted: Vec<ConvertedImage>,
    pub failed: Vec<FailedImage>,
    pub cache_stats: CacheStats,
}

impl ProcessResult {
    /// Worst failure class in the batch, if any job failed.
    pub fn worst_failure(&self) -> Option<ErrorClass> {
        let classes = self.failed.iter().map(|f| f.error.class());
        let mut worst = None;
        for class in classes {
            if class == ErrorClass::Internal {
                return Some(ErrorClass::Internal);
            }
            worst = Some(class);
        }
        worst
    }
}

/// Per-run settings shared by every job.
pub struct ProcessOptions<'a> {
    pub output_dir: &'a Path,
    pub use_cache: bool,
    /// Tool identification embedded in metadata documents.
    pub generator: Option<&'a str>,
}

/// One planned conversion.
#[derive(Debug, Clone)]
struct Job {
    index: usize,
    source: PathBuf,
    image_filename: String,
    bundle_name: String,
}

/// Read-only state shared across workers.
struct JobContext<'a> {
    padder: PanoramaPadder,
    params_hash: String,
    cache: &'a CacheManifest,
    /// Image paths (relative to the output dir) this run writes.
    targets: HashSet<String>,
    renderers: &'a [Box<dyn MetadataRenderer>],
    config: &'a Config,
    options: &'a ProcessOptions<'a>,
}

impl Job {
    fn relative_image(&self) -> String {
        format!("{}/{}", self.bundle_name, self.image_filename)
    }
}

/// Worker result, kept until the cache is updated on the calling thread.
struct JobOutput {
    converted: ConvertedImage,
    source_hash: String,
    relative_image: String,
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Expand files and directories into a flat list of sources.
///
/// Files are taken as given, whatever their extension; the decoder decides.
/// Directories are walked recursively for supported extensions in file-name
/// order, skipping anything under `exclude` (the output directory).
///
/// Directories are compared by canonical path, so `.` and `dist` still
/// recognize `./dist` as the output directory.
pub fn expand_inputs(inputs: &[PathBuf], exclude: &Path) -> Result<Vec<PathBuf>, ProcessError> {
    // An output directory that does not exist yet cannot hold any images.
    let exclude = fs::canonicalize(exclude).ok();
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let walker = walkdir::WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !is_excluded(e, exclude.as_deref()));
            for entry in walker {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                    sources.push(entry.into_path());
                }
            }
        } else if input.is_file() {
            sources.push(input.clone());
        } else {
            return Err(ProcessError::SourceNotFound(input.clone()));
        }
    }
    Ok(sources)
}

fn is_excluded(entry: &walkdir::DirEntry, exclude: Option<&Path>) -> bool {
    match exclude {
        Some(exclude) if entry.file_type().is_dir() => {
            fs::canonicalize(entry.path()).is_ok_and(|p| p == exclude)
        }
        _ => false,
    }
}

/// Assign bundle names, rejecting collisions.
fn plan_jobs(sources: Vec<PathBuf>, prefix: &str) -> Result<Vec<Job>, ProcessError> {
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    let mut jobs = Vec::with_capacity(sources.len());

    for (i, source) in sources.into_iter().enumerate() {
        let image_filename = source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| ProcessError::SourceNotFound(source.clone()))?;
        let bundle_name = bundle::bundle_name(prefix, &image_filename);

        if let Some(first) = claimed.get(&bundle_name) {
            return Err(ProcessError::DuplicateBundle {
                name: bundle_name,
                first: first.clone(),
                second: source,
            });
        }
        claimed.insert(bundle_name.clone(), source.clone());

        jobs.push(Job {
            index: i + 1,
            source,
            image_filename,
            bundle_name,
        });
    }
    Ok(jobs)
}

/// Convert every input into a bundle under `options.output_dir`.
pub fn process(
    inputs: &[PathBuf],
    config: &Config,
    options: &ProcessOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let sources = expand_inputs(inputs, options.output_dir)?;
    let jobs = plan_jobs(sources, &config.output.bundle_prefix)?;

    fs::create_dir_all(options.output_dir)?;

    let mut cache_manifest = if options.use_cache {
        CacheManifest::load(options.output_dir)
    } else {
        CacheManifest::empty()
    };
    let renderers = render::renderers(&config.output.metadata, &config.output.html_file);
    let padder = PanoramaPadder::new(config.padding.alignment());

    let ctx = JobContext {
        padder,
        params_hash: cache::hash_pad_params(padder.alignment()),
        cache: &cache_manifest,
        targets: jobs.iter().map(Job::relative_image).collect(),
        renderers: &renderers,
        config,
        options,
    };

    let outcomes: Vec<(Job, Result<JobOutput, ProcessError>)> = jobs
        .into_par_iter()
        .map(|job| {
            let outcome = convert_one(&job, &ctx);
            if let Some(tx) = &events {
                let event = match &outcome {
                    Ok(out) => ProcessEvent::Converted {
                        index: job.index,
                        source: job.source.clone(),
                        bundle_dir: out.converted.bundle.dir.clone(),
                        pano: out.converted.pano,
                        status: out.converted.status,
                    },
                    Err(e) => ProcessEvent::Failed {
                        index: job.index,
                        source: job.source.clone(),
                        message: e.to_string(),
                        class: e.class(),
                    },
                };
                // A closed receiver only means nobody is listening.
                let _ = tx.send(event);
            }
            (job, outcome)
        })
        .collect();

    let mut result = ProcessResult {
        converted: Vec::new(),
        failed: Vec::new(),
        cache_stats: CacheStats::default(),
    };
    let params_hash = ctx.params_hash.clone();
    drop(ctx);

    for (job, outcome) in outcomes {
        match outcome {
            Ok(out) => {
                match out.converted.status {
                    ImageStatus::Cached => result.cache_stats.hit(),
                    ImageStatus::Copied => result.cache_stats.copy(),
                    ImageStatus::Padded => result.cache_stats.miss(),
                }
                cache_manifest.insert(
                    out.relative_image,
                    out.source_hash,
                    params_hash.clone(),
                    out.converted.pano,
                );
                result.converted.push(out.converted);
            }
            Err(error) => {
                log::warn!("{}: {error}", job.source.display());
                result.failed.push(FailedImage {
                    index: job.index,
                    source: job.source,
                    error,
                });
            }
        }
    }

    if let Err(e) = cache_manifest.save(options.output_dir) {
        log::warn!("could not save cache: {e}");
    }

    Ok(result)
}

fn convert_one(job: &Job, ctx: &JobContext) -> Result<JobOutput, ProcessError> {
    let limits = &ctx.config.limits;
    let output_dir = ctx.options.output_dir;

    let size = fs::metadata(&job.source)?.len();
    if size > limits.max_input_bytes {
        return Err(ProcessError::InputTooLarge {
            path: job.source.clone(),
            size,
            limit: limits.max_input_bytes,
        });
    }
    let bytes = fs::read(&job.source)?;
    let source_hash = cache::hash_bytes(&bytes);

    let dir = output_dir.join(&job.bundle_name);
    let relative_image = job.relative_image();

    // A cached canvas that another job in this run overwrites cannot be
    // copied safely; pad from the source instead.
    let hit = ctx
        .cache
        .find_cached(&source_hash, &ctx.params_hash, output_dir)
        .filter(|hit| hit.path == relative_image || !ctx.targets.contains(&hit.path));

    if let Some(hit) = hit {
        fs::create_dir_all(&dir)?;
        let image = dir.join(&job.image_filename);
        let status = if hit.path == relative_image {
            ImageStatus::Cached
        } else {
            fs::copy(output_dir.join(&hit.path), &image)?;
            ImageStatus::Copied
        };
        log::debug!("{}: cache {:?}", job.source.display(), status);

        let documents = bundle::write_documents(
            &dir,
            &job.image_filename,
            &hit.pano,
            ctx.options.generator,
            ctx.renderers,
        )?;
        return Ok(JobOutput {
            converted: ConvertedImage {
                index: job.index,
                source: job.source.clone(),
                bundle: WrittenBundle {
                    dir,
                    image,
                    documents,
                },
                pano: hit.pano,
                status,
            },
            source_hash,
            relative_image,
        });
    }

    let (width, height) = read_dimensions(&bytes)?;
    let planned = ctx.padder.plan(width, height)?;
    if planned.canvas_pixels() > limits.max_canvas_pixels {
        return Err(ProcessError::CanvasTooLarge {
            path: job.source.clone(),
            width: planned.full_width,
            height: planned.full_height,
            limit: limits.max_canvas_pixels,
        });
    }

    let padded = ctx.padder.pad(&bytes)?;
    let written = bundle::write_bundle(
        &padded,
        &dir,
        &job.image_filename,
        ctx.options.generator,
        ctx.renderers,
    )?;

    Ok(JobOutput {
        converted: ConvertedImage {
            index: job.index,
            source: job.source.clone(),
            bundle: written,
            pano: *padded.opts(),
            status: ImageStatus::Padded,
        },
        source_hash,
        relative_image,
    })
}

/// Header-only geometry preview of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pano: PanoOpts,
}

/// Plan the canvas for `source` without decoding its pixels.
pub fn inspect(source: &Path, config: &Config) -> Result<Inspection, ProcessError> {
    if !source.is_file() {
        return Err(ProcessError::SourceNotFound(source.to_path_buf()));
    }
    let bytes = fs::read(source)?;
    let (width, height) = read_dimensions(&bytes)?;
    let pano = PanoramaPadder::new(config.padding.alignment()).plan(width, height)?;
    Ok(Inspection {
        source: source.to_path_buf(),
        width,
        height,
        pano,
    })
}
