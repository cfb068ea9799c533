//! Template System - Enforceable Contracts
//!
//! A template fixes the badge canvas and where the photo sits on it.
//! All placement is fractional so the same template renders at any width.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::RasterizationError;

pub type TemplateId = String;

pub const DEFAULT_TEMPLATE_ID: &str = "EventPoster";

/// Largest canvas side, in pixels, the compositor will allocate.
pub const MAX_CANVAS_SIDE: u32 = 8192;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template_version: String,
    pub engine_min_version: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub superseded_by: Option<String>,
    pub aspect_ratio: [u32; 2],
    pub canonical_size: [u32; 2],
    pub overlay: OverlayRect,
    /// Fraction of canvas width.
    #[serde(default)]
    pub corner_radius: f64,
    /// Fraction of canvas width.
    #[serde(default)]
    pub overlay_corner_radius: f64,
    #[serde(default = "default_white")]
    pub background: [u8; 4],
    #[serde(default = "default_white")]
    pub overlay_backing: [u8; 4],
    #[serde(default)]
    pub poster: PosterSource,
    #[serde(default)]
    pub export: ExportSpec,
}

fn default_white() -> [u8; 4] { [255, 255, 255, 255] }

/// Where a template's poster artwork comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterSource {
    /// Event poster artwork shipped with the crate.
    #[default]
    Bundled,
    /// Image file; relative paths resolve against the template file's directory.
    File(PathBuf),
}

/// Photo placement as fractions of the canvas width (`left`, `width`)
/// and height (`top`, `height`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl OverlayRect {
    /// Pixel rectangle `(x, y, w, h)` on a canvas of the given size.
    pub fn to_pixels(&self, canvas_w: u32, canvas_h: u32) -> (u32, u32, u32, u32) {
        let x = (self.left * canvas_w as f64).round() as u32;
        let y = (self.top * canvas_h as f64).round() as u32;
        let w = (self.width * canvas_w as f64).round() as u32;
        let h = (self.height * canvas_h as f64).round() as u32;
        (x, y, w.min(canvas_w.saturating_sub(x)), h.min(canvas_h.saturating_sub(y)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpec {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_jpeg_quality() -> u8 { 92 }

impl Default for ExportSpec {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }
}

impl Template {
    /// The built-in event poster layout: 27:31 canvas, photo in the right-hand panel.
    pub fn event_poster() -> Self {
        Self {
            id: DEFAULT_TEMPLATE_ID.to_string(),
            name: "Event Poster".to_string(),
            description: "Event poster with the registrant photo in the right-hand panel".to_string(),
            template_version: "1.0.0".to_string(),
            engine_min_version: "1.0.0".to_string(),
            deprecated: false,
            superseded_by: None,
            aspect_ratio: [27, 31],
            canonical_size: [540, 620],
            overlay: OverlayRect { top: 0.36, left: 0.67, width: 0.31, height: 0.32 },
            corner_radius: 12.0 / 540.0,
            overlay_corner_radius: 10.0 / 540.0,
            background: default_white(),
            overlay_backing: default_white(),
            poster: PosterSource::Bundled,
            export: ExportSpec::default(),
        }
    }

    /// Canvas size for a given output width, keeping the template aspect ratio.
    pub fn canvas_for_width(&self, width: u32) -> (u32, u32) {
        let [aw, ah] = self.aspect_ratio;
        let height = (width as f64 * ah as f64 / aw as f64).round() as u32;
        (width, height.max(1))
    }

    pub fn check_layout(&self) -> Result<(), RasterizationError> {
        let o = &self.overlay;
        let fractions = [o.top, o.left, o.width, o.height, self.corner_radius, self.overlay_corner_radius];
        if fractions.iter().any(|f| !f.is_finite() || *f < 0.0 || *f > 1.0) {
            return Err(RasterizationError::Layout(format!(
                "{}: fractional values must lie in [0, 1]",
                self.id
            )));
        }
        if o.left + o.width > 1.0 + f64::EPSILON || o.top + o.height > 1.0 + f64::EPSILON {
            return Err(RasterizationError::Layout(format!("{}: overlay exceeds canvas", self.id)));
        }
        if self.aspect_ratio.contains(&0) || self.canonical_size.contains(&0) {
            return Err(RasterizationError::Layout(format!("{}: zero canvas dimension", self.id)));
        }
        if self.canonical_size.iter().any(|side| *side > MAX_CANVAS_SIDE) {
            return Err(RasterizationError::Layout(format!(
                "{}: canvas side exceeds {} pixels",
                self.id, MAX_CANVAS_SIDE
            )));
        }
        Ok(())
    }
}

/// Template registry - loads and caches templates
pub struct TemplateRegistry {
    templates: BTreeMap<TemplateId, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: BTreeMap::new() }
    }

    /// Registry holding only the built-in event poster template.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Template::event_poster());
        registry
    }

    /// Built-ins plus every `*.json` template in `dir`. Unreadable files are skipped.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::builtin();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    match load_template(&path, dir) {
                        Ok(template) => {
                            debug!(id = %template.id, path = %path.display(), "template loaded");
                            registry.register(template);
                        }
                        Err(e) => warn!(path = %path.display(), error = %e, "skipping template"),
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Templates in id order.
    pub fn list(&self) -> Vec<&Template> {
        self.templates.values().collect()
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Template after `id`, wrapping around.
    pub fn next(&self, id: &str) -> Option<&Template> {
        self.step(id, 1)
    }

    /// Template before `id`, wrapping around.
    pub fn previous(&self, id: &str) -> Option<&Template> {
        self.step(id, -1)
    }

    fn step(&self, id: &str, delta: isize) -> Option<&Template> {
        let ids: Vec<&TemplateId> = self.templates.keys().collect();
        let pos = ids.iter().position(|k| k.as_str() == id)? as isize;
        let len = ids.len() as isize;
        let target = ids[(pos + delta).rem_euclid(len) as usize];
        self.templates.get(target)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn load_template(path: &Path, dir: &Path) -> Result<Template, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut template: Template = serde_json::from_str(&content).map_err(|e| e.to_string())?;
    template.check_layout().map_err(|e| e.to_string())?;
    if let PosterSource::File(poster) = &mut template.poster {
        if poster.is_relative() {
            *poster = dir.join(&*poster);
        }
    }
    Ok(template)
}
