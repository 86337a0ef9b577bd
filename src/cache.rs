//! Padding cache for repeated conversions.
//!
//! Decoding a large photo and re-encoding a canvas twice its size dominates a
//! conversion. This module lets the batch skip both when the source bytes
//! and padding parameters are unchanged since the last run.
//!
//! # Design
//!
//! Only the pixel pass is cached. Metadata documents are always re-rendered,
//! from the [`PanoOpts`] recorded in the same pass that wrote the cached
//! image, so the two never drift apart.
//!
//! ## Cache keys
//!
//! Lookups are by `source_hash` + `params_hash`, not by output path, so
//! renaming a source or changing `bundle_prefix` copies the cached canvas
//! instead of re-encoding it.
//!
//! - **`source_hash`**: SHA-256 of the source bytes.
//! - **`params_hash`**: SHA-256 of the padding parameters (alignment).
//!
//! A hit requires a matching entry **and** the previously written image still
//! on disk.
//!
//! ## Storage
//!
//! JSON at `<output_dir>/.streetsphere-cache.json`. A missing, corrupt, or
//! outdated file is treated as an empty cache.

use crate::pano::{Alignment, PanoOpts};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

const MANIFEST_FILENAME: &str = ".streetsphere-cache.json";

/// Bump to invalidate all existing caches when the format or key changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
    pub pano: PanoOpts,
}

/// Cached canvas found by [`CacheManifest::find_cached`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    /// Image path relative to the output directory.
    pub path: String,
    pub pano: PanoOpts,
}

/// On-disk cache manifest mapping image paths (relative to the output
/// directory) to their entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` → image path. Rebuilt on load.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

impl CacheManifest {
    /// Empty manifest, used for `--no-cache` or a first run.
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the output directory, falling back to an empty manifest.
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("ignoring unreadable cache {}: {e}", path.display());
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            log::debug!(
                "cache version {} != {MANIFEST_VERSION}, starting fresh",
                manifest.version
            );
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Look up a cached canvas by content hashes.
    ///
    /// The returned path may differ from the caller's target (e.g. after a
    /// rename); copying it into place is the caller's job.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<CacheHit> {
        let content_key = format!("{}:{}", source_hash, params_hash);
        let stored_path = self.content_index.get(&content_key)?;
        let entry = self
            .entries
            .get(stored_path)
            .filter(|e| e.source_hash == source_hash && e.params_hash == params_hash)?;
        if output_dir.join(stored_path).exists() {
            Some(CacheHit {
                path: stored_path.clone(),
                pano: entry.pano,
            })
        } else {
            None
        }
    }

    /// Record the canvas written at `output_path`.
    ///
    /// An older entry with the same content under another path is dropped,
    /// as is the index key of whatever `output_path` held before.
    pub fn insert(
        &mut self,
        output_path: String,
        source_hash: String,
        params_hash: String,
        pano: PanoOpts,
    ) {
        let content_key = format!("{}:{}", source_hash, params_hash);

        if let Some(old_path) = self.content_index.get(&content_key) {
            let still_same_content = self
                .entries
                .get(old_path)
                .is_some_and(|e| e.source_hash == source_hash && e.params_hash == params_hash);
            if *old_path != output_path && still_same_content {
                self.entries.remove(old_path.as_str());
            }
        }

        if let Some(previous) = self.entries.get(&output_path) {
            let previous_key = format!("{}:{}", previous.source_hash, previous.params_hash);
            if previous_key != content_key
                && self.content_index.get(&previous_key) == Some(&output_path)
            {
                self.content_index.remove(&previous_key);
            }
        }

        self.content_index.insert(content_key, output_path.clone());
        self.entries.insert(
            output_path,
            CacheEntry {
                source_hash,
                params_hash,
                pano,
            },
        );
    }
}

fn build_content_index(entries: &HashMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_path, entry)| {
            let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (content_key, output_path.clone())
        })
        .collect()
}

/// SHA-256 of source bytes as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of the padding parameters.
pub fn hash_pad_params(alignment: Alignment) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"pad\0");
    hasher.update(alignment.value().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits == 0 && self.copies == 0 {
            return write!(f, "{} padded", self.misses);
        }
        if self.copies > 0 {
            write!(
                f,
                "{} cached, {} copied, {} padded ({} total)",
                self.hits,
                self.copies,
                self.misses,
                self.total()
            )
        } else {
            write!(
                f,
                "{} cached, {} padded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        }
    }
}
