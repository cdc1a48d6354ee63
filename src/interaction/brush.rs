use image::{Rgba, RgbaImage};

use crate::config::BrushConfig;
use crate::geometry::{CanvasSize, Color, DisplaySize, Point};

const BRUSH_SIZE_MIN: f32 = 1.0;
const BRUSH_SIZE_MAX: f32 = 512.0;
/// Upper bound on stamps laid down for one pointer segment.
const MAX_SEGMENT_STAMPS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushOptions {
    pub color: Color,
    pub size: f32,
    pub opacity: u8,
}

impl Default for BrushOptions {
    fn default() -> Self {
        Self::from(&BrushConfig::default())
    }
}

impl From<&BrushConfig> for BrushOptions {
    fn from(config: &BrushConfig) -> Self {
        let mut options = Self {
            color: config.color,
            size: BRUSH_SIZE_MIN,
            opacity: 100,
        };
        options.set_size(config.size);
        options.set_opacity(config.opacity);
        options
    }
}

impl BrushOptions {
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_size(&mut self, size: f32) {
        if size.is_finite() {
            self.size = size.clamp(BRUSH_SIZE_MIN, BRUSH_SIZE_MAX);
        }
    }

    pub fn set_opacity(&mut self, opacity: u8) {
        self.opacity = opacity.clamp(1, 100);
    }
}

/// Scratch raster that freehand strokes are stamped into, at native canvas resolution.
#[derive(Debug, Clone)]
pub struct BrushCanvas {
    scratch: RgbaImage,
    last: Option<Point>,
    dirty: bool,
}

impl BrushCanvas {
    pub fn new(canvas: CanvasSize) -> Self {
        Self {
            scratch: RgbaImage::new(canvas.width, canvas.height),
            last: None,
            dirty: false,
        }
    }

    pub fn native_size(&self) -> CanvasSize {
        CanvasSize::new(self.scratch.width(), self.scratch.height())
    }

    /// Maps a displayed-canvas position into native raster space.
    pub fn map_point(&self, position: Point, displayed: DisplaySize) -> Option<Point> {
        if displayed.is_degenerate() {
            return None;
        }
        let native = self.native_size();
        Some(Point::new(
            position.x * native.width as f32 / displayed.width,
            position.y * native.height as f32 / displayed.height,
        ))
    }

    pub fn begin_stroke(&mut self, at: Point, options: &BrushOptions) {
        self.stamp(at, options);
        self.last = Some(at);
    }

    /// Extends the current stroke; ignored when no stroke is in progress.
    pub fn extend_stroke(&mut self, to: Point, options: &BrushOptions) -> bool {
        let Some(from) = self.last else {
            return false;
        };
        let (dx, dy) = from.delta_to(to);
        let distance = dx.hypot(dy);
        let spacing = (options.size / 4.0).max(0.5);
        let steps = ((distance / spacing).ceil().max(1.0) as u32).min(MAX_SEGMENT_STAMPS);
        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            self.stamp(Point::new(from.x + dx * t, from.y + dy * t), options);
        }
        self.last = Some(to);
        true
    }

    pub fn end_stroke(&mut self) {
        self.last = None;
    }

    pub const fn is_empty(&self) -> bool {
        !self.dirty
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.scratch
    }

    /// Hands over the painted raster and leaves a blank scratch behind.
    pub fn take_raster(&mut self) -> Option<RgbaImage> {
        if !self.dirty {
            return None;
        }
        let blank = RgbaImage::new(self.scratch.width(), self.scratch.height());
        self.last = None;
        self.dirty = false;
        Some(std::mem::replace(&mut self.scratch, blank))
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.native_size());
    }

    fn stamp(&mut self, center: Point, options: &BrushOptions) {
        let radius = options.size / 2.0;
        let (width, height) = self.scratch.dimensions();
        let x0 = (center.x - radius).floor().max(0.0);
        let y0 = (center.y - radius).floor().max(0.0);
        let x1 = (center.x + radius).ceil().min(width as f32);
        let y1 = (center.y + radius).ceil().min(height as f32);
        if !(x0 < x1 && y0 < y1) {
            return;
        }

        let color = Rgba(options.color.to_rgba8());
        let radius_sq = radius * radius;
        for y in y0 as u32..y1 as u32 {
            for x in x0 as u32..x1 as u32 {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= radius_sq {
                    self.scratch.put_pixel(x, y, color);
                    self.dirty = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(size: f32) -> BrushOptions {
        BrushOptions {
            color: Color::rgb(0, 0, 255),
            size,
            opacity: 60,
        }
    }

    #[test]
    fn map_point_scales_by_native_over_displayed() {
        let canvas = BrushCanvas::new(CanvasSize::new(400, 200));
        let mapped = canvas
            .map_point(Point::new(50.0, 25.0), DisplaySize::new(200.0, 100.0))
            .expect("mapped");
        assert_eq!(mapped, Point::new(100.0, 50.0));
        assert!(canvas
            .map_point(Point::new(1.0, 1.0), DisplaySize::new(0.0, 100.0))
            .is_none());
    }

    #[test]
    fn stroke_paints_a_continuous_line() {
        let mut canvas = BrushCanvas::new(CanvasSize::new(40, 10));
        let brush = options(4.0);
        canvas.begin_stroke(Point::new(2.0, 5.0), &brush);
        assert!(canvas.extend_stroke(Point::new(38.0, 5.0), &brush));
        canvas.end_stroke();

        for x in 2..38 {
            assert_eq!(canvas.raster().get_pixel(x, 5).0, [0, 0, 255, 255], "gap at x={x}");
        }
        assert_eq!(canvas.raster().get_pixel(20, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn far_off_canvas_segment_is_bounded() {
        let mut canvas = BrushCanvas::new(CanvasSize::new(10, 10));
        let brush = options(1.0);
        canvas.begin_stroke(Point::new(5.5, 5.5), &brush);
        assert!(canvas.extend_stroke(Point::new(1.0e12, 5.5), &brush));
        assert_eq!(canvas.raster().get_pixel(5, 5).0, [0, 0, 255, 255]);
        assert!(canvas.extend_stroke(Point::new(f32::NAN, f32::NAN), &brush));
    }

    #[test]
    fn extend_without_begin_is_ignored() {
        let mut canvas = BrushCanvas::new(CanvasSize::new(10, 10));
        assert!(!canvas.extend_stroke(Point::new(5.0, 5.0), &options(2.0)));
        assert!(canvas.is_empty());
    }

    #[test]
    fn take_raster_returns_strokes_once_and_clears_scratch() {
        let mut canvas = BrushCanvas::new(CanvasSize::new(10, 10));
        assert!(canvas.take_raster().is_none());

        canvas.begin_stroke(Point::new(5.0, 5.0), &options(3.0));
        let raster = canvas.take_raster().expect("raster");
        assert_eq!(raster.get_pixel(5, 5).0, [0, 0, 255, 255]);
        assert!(canvas.is_empty());
        assert!(canvas.raster().pixels().all(|pixel| pixel.0[3] == 0));
        assert!(canvas.take_raster().is_none());
    }

    #[test]
    fn options_clamp_size_and_opacity() {
        let mut brush = BrushOptions::default();
        brush.set_size(0.0);
        assert_eq!(brush.size, BRUSH_SIZE_MIN);
        brush.set_size(f32::INFINITY);
        assert_eq!(brush.size, BRUSH_SIZE_MIN);
        brush.set_opacity(0);
        assert_eq!(brush.opacity, 1);
        brush.set_opacity(250);
        assert_eq!(brush.opacity, 100);
    }
}
