//! Metadata documents for padded panoramas.
//!
//! A [`PanoOpts`] is useless to a viewer until it is written down somewhere
//! the viewer looks. Each [`MetadataRenderer`] turns the same record into one
//! document:
//!
//! | Renderer | File | Contents |
//! |---|---|---|
//! | [`HtmlRenderer`] | `streetview.html` | Preview page, field table, XMP packet, `exiftool` command |
//! | [`XmpRenderer`] | `<image stem>.xmp` | GPano XMP sidecar |
//! | [`JsonRenderer`] | `pano.json` | `PanoOpts` with viewer field names |
//!
//! Numbers are written exactly as computed. No renderer rounds, rescales, or
//! recomputes any field.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! All interpolated values are escaped.

use crate::pano::PanoOpts;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a renderer needs to describe one padded image.
#[derive(Debug, Clone, Copy)]
pub struct PanoDocument<'a> {
    /// File name of the padded image, relative to the document.
    pub image_filename: &'a str,
    pub pano: &'a PanoOpts,
    /// Tool identification, e.g. `streetsphere 0.1.0`.
    pub generator: Option<&'a str>,
}

/// Turns a [`PanoDocument`] into a file.
///
/// Implementations must be pure: the same document always renders to the
/// same bytes.
pub trait MetadataRenderer: Sync {
    /// Name of the file this renderer writes next to the image.
    fn file_name(&self, doc: &PanoDocument) -> String;

    fn render(&self, doc: &PanoDocument) -> Result<String, RenderError>;
}

/// Document formats selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFormat {
    Html,
    Xmp,
    Json,
}

impl MetadataFormat {
    pub fn renderer(self, html_file: &str) -> Box<dyn MetadataRenderer> {
        match self {
            MetadataFormat::Html => Box::new(HtmlRenderer::new(html_file)),
            MetadataFormat::Xmp => Box::new(XmpRenderer),
            MetadataFormat::Json => Box::new(JsonRenderer),
        }
    }
}

/// Build the renderer set for a list of formats, skipping duplicates.
pub fn renderers(formats: &[MetadataFormat], html_file: &str) -> Vec<Box<dyn MetadataRenderer>> {
    let mut seen = Vec::new();
    formats
        .iter()
        .filter(|f| {
            if seen.contains(*f) {
                false
            } else {
                seen.push(**f);
                true
            }
        })
        .map(|f| f.renderer(html_file))
        .collect()
}

// ============================================================================
// XMP
// ============================================================================

const GPANO_NS: &str = "http://ns.google.com/photos/1.0/panorama/";

/// GPano tag names paired with their values, in the order viewers document them.
fn gpano_fields(pano: &PanoOpts) -> [(&'static str, u32); 6] {
    [
        ("CroppedAreaImageWidthPixels", pano.cropped_width),
        ("CroppedAreaImageHeightPixels", pano.cropped_height),
        ("FullPanoWidthPixels", pano.full_width),
        ("FullPanoHeightPixels", pano.full_height),
        ("CroppedAreaLeftPixels", pano.cropped_left),
        ("CroppedAreaTopPixels", pano.cropped_top),
    ]
}

/// Full XMP packet carrying the GPano description of `pano`.
pub fn xmp_packet(pano: &PanoOpts) -> String {
    let mut xmp = String::new();
    xmp.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    xmp.push_str(" <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    xmp.push_str(&format!(
        "  <rdf:Description rdf:about=\"\" xmlns:GPano=\"{GPANO_NS}\">\n"
    ));
    xmp.push_str("   <GPano:ProjectionType>equirectangular</GPano:ProjectionType>\n");
    xmp.push_str("   <GPano:UsePanoramaViewer>True</GPano:UsePanoramaViewer>\n");
    for (tag, value) in gpano_fields(pano) {
        xmp.push_str(&format!("   <GPano:{tag}>{value}</GPano:{tag}>\n"));
    }
    xmp.push_str("  </rdf:Description>\n");
    xmp.push_str(" </rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>\n");
    xmp
}

/// `exiftool` invocation that writes the GPano tags into the image itself.
pub fn exiftool_command(image_filename: &str, pano: &PanoOpts) -> String {
    let mut cmd = String::from(
        "exiftool -overwrite_original \
         -XMP-GPano:ProjectionType=equirectangular \
         -XMP-GPano:UsePanoramaViewer=True",
    );
    for (tag, value) in gpano_fields(pano) {
        cmd.push_str(&format!(" -XMP-GPano:{tag}={value}"));
    }
    cmd.push_str(&format!(" \"{image_filename}\""));
    cmd
}

/// Writes a `<image stem>.xmp` sidecar.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmpRenderer;

impl MetadataRenderer for XmpRenderer {
    fn file_name(&self, doc: &PanoDocument) -> String {
        let stem = Path::new(doc.image_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| doc.image_filename.to_string());
        format!("{stem}.xmp")
    }

    fn render(&self, doc: &PanoDocument) -> Result<String, RenderError> {
        Ok(xmp_packet(doc.pano))
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Serialize)]
struct JsonDocument<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generator: Option<&'a str>,
    pano: &'a PanoOpts,
}

/// Writes `pano.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl MetadataRenderer for JsonRenderer {
    fn file_name(&self, _doc: &PanoDocument) -> String {
        "pano.json".to_string()
    }

    fn render(&self, doc: &PanoDocument) -> Result<String, RenderError> {
        let mut json = serde_json::to_string_pretty(&JsonDocument {
            image: doc.image_filename,
            generator: doc.generator,
            pano: doc.pano,
        })?;
        json.push('\n');
        Ok(json)
    }
}

// ============================================================================
// HTML
// ============================================================================

const CSS: &str = "\
body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:60rem;padding:0 1rem;color:#111}\
figure{margin:0 0 2rem}\
figure img{width:100%;height:auto;background:repeating-conic-gradient(#ddd 0 25%,#fff 0 50%) 0 0/16px 16px}\
table{border-collapse:collapse;margin-bottom:2rem}\
th,td{border:1px solid #e0e0e0;padding:.25rem .75rem;text-align:left}\
td{font-variant-numeric:tabular-nums}\
pre{background:#f5f5f5;padding:1rem;overflow-x:auto}";

/// Writes the human-facing page, `streetview.html` unless configured otherwise.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    file_name: String,
}

impl HtmlRenderer {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new("streetview.html")
    }
}

impl MetadataRenderer for HtmlRenderer {
    fn file_name(&self, _doc: &PanoDocument) -> String {
        self.file_name.clone()
    }

    fn render(&self, doc: &PanoDocument) -> Result<String, RenderError> {
        Ok(render_page(doc).into_string())
    }
}

/// HTML comment naming the tool. `--` is stripped so the comment cannot close early.
fn generator_comment(generator: &str) -> PreEscaped<String> {
    let safe = generator.replace("--", "-").replace(['<', '>'], "");
    PreEscaped(format!("<!-- Generated by {safe} -->\n"))
}

fn field_table(pano: &PanoOpts) -> Markup {
    let rows = [
        ("FullWidth", pano.full_width),
        ("FullHeight", pano.full_height),
        ("CroppedWidth", pano.cropped_width),
        ("CroppedHeight", pano.cropped_height),
        ("CroppedLeft", pano.cropped_left),
        ("CroppedTop", pano.cropped_top),
    ];
    html! {
        table.pano-fields {
            thead { tr { th { "Field" } th { "Pixels" } } }
            tbody {
                @for (name, value) in rows {
                    tr { th scope="row" { (name) } td data-field=(name) { (value) } }
                }
            }
        }
    }
}

fn render_page(doc: &PanoDocument) -> Markup {
    let pano = doc.pano;
    html! {
        @if let Some(generator) = doc.generator {
            (generator_comment(generator))
        }
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Photo Sphere: " (doc.image_filename) }
                style { (PreEscaped(CSS)) }
            }
            body {
                h1 { (doc.image_filename) }
                figure {
                    img src=(doc.image_filename)
                        alt="Padded equirectangular canvas"
                        width=(pano.full_width)
                        height=(pano.full_height);
                    figcaption {
                        @if pano.is_identity() {
                            "Already 2:1, no padding added."
                        } @else {
                            "Original " (pano.cropped_width) "\u{00d7}" (pano.cropped_height)
                            " placed at (" (pano.cropped_left) ", " (pano.cropped_top) ") on a "
                            (pano.full_width) "\u{00d7}" (pano.full_height) " canvas."
                        }
                    }
                }
                h2 { "Panorama metadata" }
                (field_table(pano))
                h2 { "XMP" }
                p { "Embed these GPano tags in the image before uploading it to a panorama viewer." }
                pre.xmp { (xmp_packet(pano)) }
                pre.exiftool { (exiftool_command(doc.image_filename, pano)) }
            }
        }
    }
}
