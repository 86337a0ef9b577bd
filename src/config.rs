//! Tool configuration.
//!
//! Handles loading, validating, and merging `streetsphere.toml`. User files are
//! sparse: stock defaults are the base layer and the file only overrides the
//! keys it names. Command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [padding]
//! alignment = 1             # Canvas height rounds up to a multiple of this
//!
//! [output]
//! bundle_prefix = "photosphere-streetview"
//! metadata = ["html", "xmp"]   # any of "html", "xmp", "json"
//! html_file = "streetview.html"
//!
//! [limits]
//! max_input_bytes = 10485760       # 10 MiB per source file
//! max_canvas_pixels = 134217728    # 16384 x 8192
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::pano::Alignment;
use crate::render::MetadataFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "streetsphere.toml";

/// Full tool configuration.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Canvas geometry rules.
    pub padding: PaddingConfig,
    /// Bundle layout and metadata documents.
    pub output: OutputConfig,
    /// Size guards applied before any decoding.
    pub limits: LimitsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.padding.alignment == 0 {
            return Err(ConfigError::Validation(
                "padding.alignment must be at least 1".into(),
            ));
        }
        if self.output.metadata.is_empty() {
            return Err(ConfigError::Validation(
                "output.metadata must list at least one format".into(),
            ));
        }
        for (key, value) in [
            ("output.html_file", &self.output.html_file),
            ("output.bundle_prefix", &self.output.bundle_prefix),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) || value == ".." {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a plain file name, got {value:?}"
                )));
            }
        }
        if self.limits.max_input_bytes == 0 || self.limits.max_canvas_pixels == 0 {
            return Err(ConfigError::Validation(
                "limits must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Canvas geometry rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaddingConfig {
    /// Canvas height is rounded up to a multiple of this value.
    /// 1 keeps the plain `max(h, ceil(w / 2))` rule; 2 forces even heights.
    pub alignment: u32,
}

impl PaddingConfig {
    pub fn alignment(&self) -> Alignment {
        Alignment::new(self.alignment)
    }
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self { alignment: 1 }
    }
}

/// Bundle layout and metadata documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Bundle directories are named `<prefix>-<image stem>`.
    pub bundle_prefix: String,
    /// Metadata documents written next to each padded image.
    pub metadata: Vec<MetadataFormat>,
    /// File name of the HTML page.
    pub html_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bundle_prefix: "photosphere-streetview".to_string(),
            metadata: vec![MetadataFormat::Html, MetadataFormat::Xmp],
            html_file: "streetview.html".to_string(),
        }
    }
}

/// Size guards. Peak memory grows with the canvas, so oversized inputs are
/// rejected from their header before any pixel is decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted source file, in bytes.
    pub max_input_bytes: u64,
    /// Largest accepted canvas, `FullWidth * FullHeight`.
    pub max_canvas_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 10 << 20,
            max_canvas_pixels: 16384 * 8192,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the TOML file at `path`.
///
/// A missing file yields the stock defaults; a malformed one is an error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    log::debug!("loaded config from {}", path.display());
    resolve_config(Some(value))
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# streetsphere configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Canvas geometry
# ---------------------------------------------------------------------------
[padding]
# Canvas height = max(height, ceil(width / 2)), rounded up to a multiple of
# this value. Width is always twice the height.
# 1 = tightest canvas; 2 = even dimensions for viewers that require them.
alignment = 1

# ---------------------------------------------------------------------------
# Output bundles
# ---------------------------------------------------------------------------
[output]
# Each source gets a directory named "<bundle_prefix>-<image stem>".
bundle_prefix = "photosphere-streetview"

# Metadata documents written next to the padded image:
#   "html" - preview page with the field table and XMP snippet
#   "xmp"  - GPano XMP sidecar (<image stem>.xmp)
#   "json" - pano.json with the raw field values
metadata = ["html", "xmp"]

# File name of the HTML page.
html_file = "streetview.html"

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted source file, in bytes (10 MiB).
max_input_bytes = 10485760

# Largest accepted canvas in pixels (16384 x 8192).
max_canvas_pixels = 134217728

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.padding.alignment, 1);
        assert_eq!(config.output.bundle_prefix, "photosphere-streetview");
        assert_eq!(
            config.output.metadata,
            vec![MetadataFormat::Html, MetadataFormat::Xmp]
        );
        assert_eq!(config.output.html_file, "streetview.html");
        assert_eq!(config.limits.max_input_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.max_canvas_pixels, 134_217_728);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn parse_partial_config() {
        let config: Config = toml::from_str("[padding]\nalignment = 2\n").unwrap();
        assert_eq!(config.padding.alignment, 2);
        assert_eq!(config.padding.alignment().value(), 2);
        // Defaults preserved
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn parse_metadata_formats() {
        let config: Config = toml::from_str("[output]\nmetadata = [\"json\"]\n").unwrap();
        assert_eq!(config.output.metadata, vec![MetadataFormat::Json]);
    }

    #[test]
    fn unknown_metadata_format_rejected() {
        let result: Result<Config, _> = toml::from_str("[output]\nmetadata = [\"pdf\"]\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[output]
bundle_prefix = "pano"

[limits]
max_input_bytes = 2048
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output.bundle_prefix, "pano");
        assert_eq!(config.limits.max_input_bytes, 2048);
        // Sibling keys keep their defaults
        assert_eq!(config.output.html_file, "streetview.html");
        assert_eq!(config.limits.max_canvas_pixels, 134_217_728);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[padding]\nalignment = 0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<Config, _> = toml::from_str("[padding]\nalignmnet = 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result = resolve_config(Some(toml::from_str("[zip]\nlevel = 9\n").unwrap()));
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_empty_metadata() {
        let mut config = Config::default();
        config.output.metadata.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_html_file_with_separator() {
        let mut config = Config::default();
        config.output.html_file = "../escape.html".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_limits() {
        let mut config = Config::default();
        config.limits.max_canvas_pixels = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 5").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(5));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str("m = [\"html\", \"xmp\"]").unwrap();
        let overlay: toml::Value = toml::from_str("m = [\"json\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["m"].as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Threads
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value();
        let table = value.as_table().unwrap();
        for section in ["padding", "output", "limits", "processing"] {
            assert!(table.contains_key(section), "missing [{section}]");
        }
    }
}
