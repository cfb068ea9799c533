//! Badge Compositor
//!
//! Renders poster + photo into a single encoded image. Inputs are already
//! decoded buffers, so nothing is sampled before it has finished loading.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde::Serialize;
use tracing::debug;
use vello_cpu::kurbo::{RoundedRect, Shape};
use vello_cpu::peniko::Color;
use vello_cpu::{Pixmap, RenderContext};

use crate::error::RasterizationError;
use crate::hashing::sha256_hex;
use crate::photo::PhotoReference;
use crate::templates::{ExportFormat, ExportSpec, PosterSource, Template, MAX_CANVAS_SIDE};

static EVENT_POSTER_PNG: &[u8] = include_bytes!("../assets/event-poster.png");
static EVENT_POSTER: OnceLock<Result<Poster, String>> = OnceLock::new();

/// Decoded poster background.
#[derive(Debug, Clone)]
pub struct Poster {
    image: Arc<RgbaImage>,
}

impl Poster {
    pub fn decode(bytes: &[u8]) -> Result<Self, RasterizationError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RasterizationError::PosterDecode(e.to_string()))?
            .to_rgba8();
        Ok(Self { image: Arc::new(image) })
    }

    pub fn from_path(path: &Path) -> Result<Self, RasterizationError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RasterizationError::PosterDecode(format!("{}: {}", path.display(), e)))?;
        Self::decode(&bytes)
    }

    /// The event poster artwork shipped with the crate, decoded on first use.
    pub fn bundled() -> Result<Self, RasterizationError> {
        EVENT_POSTER
            .get_or_init(|| Self::decode(EVENT_POSTER_PNG).map_err(|e| e.to_string()))
            .clone()
            .map_err(RasterizationError::PosterDecode)
    }

    pub fn load(source: &PosterSource) -> Result<Self, RasterizationError> {
        match source {
            PosterSource::Bundled => Self::bundled(),
            PosterSource::File(path) => Self::from_path(path),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image: Arc::new(image) }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// A rendered badge. Regenerated on every compose, never patched.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeArtifact {
    #[serde(skip)]
    bytes: Vec<u8>,
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
    pub template_id: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl BadgeArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

pub struct Compositor {
    output_width: Option<u32>,
}

impl Compositor {
    /// Renders at each template's canonical size.
    pub fn new() -> Self {
        Self { output_width: None }
    }

    /// Renders at a fixed width; height follows the template aspect ratio.
    pub fn with_width(width: u32) -> Self {
        Self { output_width: Some(width) }
    }

    /// Compose a badge. On error nothing is produced.
    #[tracing::instrument(skip(self, template, poster, photo), fields(template = %template.id))]
    pub fn compose(
        &self,
        template: &Template,
        poster: &Poster,
        photo: &PhotoReference,
    ) -> Result<BadgeArtifact, RasterizationError> {
        template.check_layout()?;

        let width = self.output_width.unwrap_or(template.canonical_size[0]);
        if width == 0 {
            return Err(RasterizationError::Layout("output width must be positive".into()));
        }
        let (w, h) = template.canvas_for_width(width);
        if w > MAX_CANVAS_SIDE || h > MAX_CANVAS_SIDE {
            return Err(RasterizationError::Layout(format!(
                "canvas {}x{} exceeds {} pixels per side",
                w, h, MAX_CANVAS_SIDE
            )));
        }

        let mut canvas = RgbaImage::from_pixel(w, h, Rgba(template.background));
        imageops::overlay(&mut canvas, &cover(poster.image(), w, h)?, 0, 0);

        let (x, y, ow, oh) = template.overlay.to_pixels(w, h);
        if ow > 0 && oh > 0 {
            let mut panel = RgbaImage::from_pixel(ow, oh, Rgba(template.overlay_backing));
            imageops::overlay(&mut panel, &cover(photo.image(), ow, oh)?, 0, 0);
            round_corners(&mut panel, template.overlay_corner_radius * w as f64)?;
            imageops::overlay(&mut canvas, &panel, i64::from(x), i64::from(y));
        }

        round_corners(&mut canvas, template.corner_radius * w as f64)?;

        let bytes = encode(&canvas, &template.export)?;
        if bytes.is_empty() {
            return Err(RasterizationError::Encode("encoder produced no bytes".into()));
        }
        debug!(width = w, height = h, len = bytes.len(), "badge composed");

        Ok(BadgeArtifact {
            fingerprint: sha256_hex(&bytes),
            bytes,
            format: template.export.format,
            width: w,
            height: h,
            template_id: template.id.clone(),
            created_at: Utc::now(),
        })
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale to fill `w`x`h`, cropping the overflow around the centre.
fn cover(src: &RgbaImage, w: u32, h: u32) -> Result<RgbaImage, RasterizationError> {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 {
        return Err(RasterizationError::Layout("source image has no pixels".into()));
    }
    let scale = f64::max(w as f64 / sw as f64, h as f64 / sh as f64);
    // Clamped to the source size, so the centring offsets below cannot underflow.
    let cw = ((w as f64 / scale).round() as u32).clamp(1, sw);
    let ch = ((h as f64 / scale).round() as u32).clamp(1, sh);
    let cropped = imageops::crop_imm(src, (sw - cw) / 2, (sh - ch) / 2, cw, ch).to_image();
    Ok(imageops::resize(&cropped, w, h, FilterType::Triangle))
}

/// Multiply alpha by the coverage of a rounded rectangle filling `img`.
fn round_corners(img: &mut RgbaImage, radius: f64) -> Result<(), RasterizationError> {
    let (w, h) = img.dimensions();
    let r = radius.min(f64::from(w) / 2.0).min(f64::from(h) / 2.0);
    if r <= 0.0 {
        return Ok(());
    }
    let (Ok(mw), Ok(mh)) = (u16::try_from(w), u16::try_from(h)) else {
        return Err(RasterizationError::Layout(format!("{}x{} is too large to mask", w, h)));
    };

    let mut ctx = RenderContext::new(mw, mh);
    ctx.set_paint(Color::from_rgba8(255, 255, 255, 255));
    ctx.fill_path(&RoundedRect::new(0.0, 0.0, f64::from(w), f64::from(h), r).to_path(0.1));
    ctx.flush();
    let mut mask = Pixmap::new(mw, mh);
    ctx.render_to_pixmap(&mut mask);

    for (px, m) in img.pixels_mut().zip(mask.data_as_u8_slice().chunks_exact(4)) {
        let coverage = u16::from(m[3]);
        if coverage < 255 {
            px[3] = ((u16::from(px[3]) * coverage + 127) / 255) as u8;
        }
    }
    Ok(())
}

fn encode(canvas: &RgbaImage, spec: &ExportSpec) -> Result<Vec<u8>, RasterizationError> {
    let mut buf = Cursor::new(Vec::new());
    match spec.format {
        ExportFormat::Png => canvas
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| RasterizationError::Encode(e.to_string()))?,
        ExportFormat::Jpeg => {
            let flat = flatten_onto_white(canvas);
            JpegEncoder::new_with_quality(&mut buf, spec.jpeg_quality.clamp(1, 100))
                .encode_image(&flat)
                .map_err(|e| RasterizationError::Encode(e.to_string()))?
        }
    }
    Ok(buf.into_inner())
}

fn flatten_onto_white(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let Rgba([r, g, b, a]) = *canvas.get_pixel(x, y);
        let a = u16::from(a);
        let mix = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([mix(r), mix(g), mix(b)])
    })
}
