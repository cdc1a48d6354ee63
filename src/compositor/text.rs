use std::path::Path;

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use super::raster::allocate_surface;
use crate::config::FontFaceConfig;
use crate::geometry::CanvasSize;
use crate::layer::TextContent;

const BLOCK_ADVANCE_EM: f32 = 0.62;
const BLOCK_LINE_HEIGHT_EM: f32 = 1.3;
const BLOCK_GLYPH_LEFT_EM: f32 = 0.06;
const BLOCK_GLYPH_RIGHT_EM: f32 = 0.56;
const BLOCK_GLYPH_TOP_EM: f32 = 0.15;
const BLOCK_GLYPH_BOTTOM_EM: f32 = 1.0;

/// Rasterizes a text layer into a tile whose top-left corner is the text anchor.
pub trait TextRenderer: Send + Sync {
    /// `None` when there is nothing to draw or the tile would exceed `max_pixels`.
    fn render(&self, content: &TextContent, font_px: f32, max_pixels: u64) -> Option<RgbaImage>;
}

/// Transparent tile covering a `width`×`height` text box.
fn blank_tile(width: f32, height: f32, max_pixels: u64) -> Option<RgbaImage> {
    let width = width.ceil().max(1.0);
    let height = height.ceil().max(1.0);
    let limit = u32::MAX as f32;
    if !(width.is_finite() && height.is_finite() && width <= limit && height <= limit) {
        tracing::warn!(width, height, "text tile size is out of range");
        return None;
    }
    allocate_surface(CanvasSize::new(width as u32, height as u32), max_pixels)
        .map_err(|err| tracing::warn!(error = %err, "skipping oversized text tile"))
        .ok()
}

/// Font-less renderer that draws every visible character as a solid box.
///
/// Metrics are fixed fractions of the font size, so output depends only on the
/// text, the size and the color.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTextRenderer;

impl TextRenderer for BlockTextRenderer {
    fn render(&self, content: &TextContent, font_px: f32, max_pixels: u64) -> Option<RgbaImage> {
        if !(font_px.is_finite() && font_px > 0.0) {
            return None;
        }
        let lines = content.lines();
        let longest = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        if longest == 0 {
            return None;
        }

        let advance = font_px * BLOCK_ADVANCE_EM;
        let line_height = font_px * BLOCK_LINE_HEIGHT_EM;
        let mut tile = blank_tile(
            longest as f32 * advance,
            lines.len() as f32 * line_height,
            max_pixels,
        )?;
        let color = Rgba(content.color.to_rgba8());

        for (line_index, line) in lines.iter().enumerate() {
            let top = line_index as f32 * line_height;
            for (column, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let left = column as f32 * advance;
                fill_box(
                    &mut tile,
                    (
                        left + font_px * BLOCK_GLYPH_LEFT_EM,
                        top + font_px * BLOCK_GLYPH_TOP_EM,
                    ),
                    (
                        left + font_px * BLOCK_GLYPH_RIGHT_EM,
                        top + font_px * BLOCK_GLYPH_BOTTOM_EM,
                    ),
                    color,
                );
            }
        }
        Some(tile)
    }
}

fn fill_box(tile: &mut RgbaImage, min: (f32, f32), max: (f32, f32), color: Rgba<u8>) {
    let x0 = min.0.floor().max(0.0) as u32;
    let y0 = min.1.floor().max(0.0) as u32;
    let x1 = (max.0.ceil() as u32).min(tile.width());
    let y1 = (max.1.ceil() as u32).min(tile.height());
    for y in y0..y1 {
        let cy = y as f32 + 0.5;
        if cy < min.1 || cy >= max.1 {
            continue;
        }
        for x in x0..x1 {
            let cx = x as f32 + 0.5;
            if cx >= min.0 && cx < max.0 {
                tile.put_pixel(x, y, color);
            }
        }
    }
}

#[derive(Clone)]
struct LoadedFace {
    family: String,
    weight: u16,
    font: FontArc,
}

/// Glyph rasterizer over a set of loaded font faces.
///
/// Faces are matched by family (case-insensitive) and nearest weight. With no
/// matching family the first loaded face is used; with no faces at all the
/// block renderer takes over.
#[derive(Clone, Default)]
pub struct GlyphTextRenderer {
    faces: Vec<LoadedFace>,
    fallback: BlockTextRenderer,
}

impl std::fmt::Debug for GlyphTextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphTextRenderer")
            .field(
                "faces",
                &self
                    .faces
                    .iter()
                    .map(|face| (face.family.as_str(), face.weight))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl GlyphTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every configured face, skipping (with a warning) files that can't be read.
    pub fn from_faces(faces: &[FontFaceConfig]) -> Self {
        let mut renderer = Self::new();
        for face in faces {
            match load_font(&face.path) {
                Ok(font) => renderer.add_face(&face.family, face.weight, font),
                Err(message) => {
                    tracing::warn!(path = ?face.path, family = %face.family, "{message}");
                }
            }
        }
        renderer
    }

    pub fn add_face(&mut self, family: &str, weight: u16, font: FontArc) {
        self.faces.push(LoadedFace {
            family: family.to_ascii_lowercase(),
            weight,
            font,
        });
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn select(&self, family: &str, weight: u16) -> Option<&FontArc> {
        let family = family.to_ascii_lowercase();
        self.faces
            .iter()
            .filter(|face| face.family == family)
            .min_by_key(|face| face.weight.abs_diff(weight))
            .or_else(|| self.faces.first())
            .map(|face| &face.font)
    }
}

fn load_font(path: &Path) -> Result<FontArc, String> {
    let bytes =
        std::fs::read(path).map_err(|err| format!("failed to read font file: {err}"))?;
    FontArc::try_from_vec(bytes).map_err(|err| format!("failed to parse font file: {err}"))
}

impl TextRenderer for GlyphTextRenderer {
    fn render(&self, content: &TextContent, font_px: f32, max_pixels: u64) -> Option<RgbaImage> {
        let Some(font) = self.select(&content.font_family, content.font_weight) else {
            return self.fallback.render(content, font_px, max_pixels);
        };
        if !(font_px.is_finite() && font_px > 0.0) || content.text.trim().is_empty() {
            return None;
        }

        let scale = PxScale::from(font_px);
        let scaled = font.as_scaled(scale);
        let line_height = scaled.height() + scaled.line_gap();
        let lines = content.lines();

        let mut glyphs = Vec::new();
        let mut widest = 0.0_f32;
        for (line_index, line) in lines.iter().enumerate() {
            let baseline = scaled.ascent() + line_index as f32 * line_height;
            let mut caret = 0.0_f32;
            let mut previous: Option<GlyphId> = None;
            for ch in line.chars() {
                let id = font.glyph_id(ch);
                if let Some(previous) = previous {
                    caret += scaled.kern(previous, id);
                }
                glyphs.push(id.with_scale_and_position(scale, point(caret, baseline)));
                caret += scaled.h_advance(id);
                previous = Some(id);
            }
            widest = widest.max(caret);
        }

        let mut tile = blank_tile(widest, lines.len() as f32 * line_height, max_pixels)?;
        let (width, height) = tile.dimensions();
        let [r, g, b, a] = content.color.to_rgba8();

        for glyph in glyphs {
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x + gx as f32;
                let y = bounds.min.y + gy as f32;
                if x < 0.0 || y < 0.0 {
                    return;
                }
                let (x, y) = (x as u32, y as u32);
                if x >= width || y >= height {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * f32::from(a)).round() as u8;
                let pixel = tile.get_pixel_mut(x, y);
                if alpha > pixel.0[3] {
                    *pixel = Rgba([r, g, b, alpha]);
                }
            });
        }
        Some(tile)
    }
}
