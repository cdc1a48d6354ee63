use crate::geometry::{CanvasSize, DisplaySize, PixelRect, Point};

/// Rectangle in displayed canvas coordinates. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSelection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropSelection {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Spans two corners; the smaller coordinate on each axis becomes the origin.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Maps into natural pixel space of an image shown at `displayed` size.
    ///
    /// Each axis scales by `natural / displayed`. The result is clipped to the
    /// image; `None` when nothing is left.
    pub fn to_natural(&self, displayed: DisplaySize, natural: CanvasSize) -> Option<PixelRect> {
        if self.is_empty() || displayed.is_degenerate() || natural.is_empty() {
            return None;
        }
        let sx = natural.width as f32 / displayed.width;
        let sy = natural.height as f32 / displayed.height;

        let x0 = (self.x * sx).round().max(0.0);
        let y0 = (self.y * sy).round().max(0.0);
        let x1 = ((self.x + self.width) * sx).round().min(natural.width as f32);
        let y1 = ((self.y + self.height) * sy).round().min(natural.height as f32);
        if !(x1 > x0 && y1 > y0) {
            return None;
        }
        PixelRect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32).clamp_to(natural)
    }
}

/// Anchor-and-drag selection state for the crop tool.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropTool {
    anchor: Option<Point>,
    selection: Option<CropSelection>,
}

impl CropTool {
    pub const fn new() -> Self {
        Self {
            anchor: None,
            selection: None,
        }
    }

    pub fn begin(&mut self, at: Point) {
        self.anchor = Some(at);
        self.selection = Some(CropSelection::from_corners(at, at));
    }

    pub fn update(&mut self, to: Point) -> Option<CropSelection> {
        let anchor = self.anchor?;
        let selection = CropSelection::from_corners(anchor, to);
        self.selection = Some(selection);
        Some(selection)
    }

    /// Ends the drag but keeps the selection for apply.
    pub fn finish(&mut self) {
        self.anchor = None;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub const fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn selection(&self) -> Option<CropSelection> {
        self.selection.filter(|selection| !selection.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dragging_in_any_direction_normalizes_the_rectangle() {
        let anchor = Point::new(50.0, 40.0);
        for corner in [
            Point::new(80.0, 70.0),
            Point::new(20.0, 70.0),
            Point::new(80.0, 10.0),
            Point::new(20.0, 10.0),
        ] {
            let selection = CropSelection::from_corners(anchor, corner);
            assert!(selection.width == 30.0 && selection.height == 30.0);
            assert_eq!(selection.x, anchor.x.min(corner.x));
            assert_eq!(selection.y, anchor.y.min(corner.y));
        }
    }

    #[test]
    fn half_size_display_doubles_natural_rectangle() {
        let selection = CropSelection::new(10.0, 10.0, 50.0, 50.0);
        let rect = selection
            .to_natural(DisplaySize::new(100.0, 100.0), CanvasSize::new(200, 200))
            .expect("rect");
        assert_eq!(rect, PixelRect::new(20, 20, 100, 100));
    }

    #[test]
    fn natural_rectangle_is_clipped_to_the_image() {
        let selection = CropSelection::new(-5.0, 90.0, 30.0, 30.0);
        let rect = selection
            .to_natural(DisplaySize::new(100.0, 100.0), CanvasSize::new(100, 100))
            .expect("rect");
        assert_eq!(rect, PixelRect::new(0, 90, 25, 10));

        let outside = CropSelection::new(150.0, 150.0, 10.0, 10.0);
        assert!(outside
            .to_natural(DisplaySize::new(100.0, 100.0), CanvasSize::new(100, 100))
            .is_none());
    }

    #[test]
    fn tool_tracks_anchor_until_finished() {
        let mut tool = CropTool::new();
        assert!(tool.update(Point::new(1.0, 1.0)).is_none());

        tool.begin(Point::new(10.0, 10.0));
        assert!(tool.selection().is_none());
        tool.update(Point::new(4.0, 30.0));
        tool.finish();
        assert!(!tool.is_dragging());
        assert_eq!(tool.selection(), Some(CropSelection::new(4.0, 10.0, 6.0, 20.0)));

        tool.reset();
        assert!(tool.selection().is_none());
    }
}
