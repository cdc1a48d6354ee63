//! Pointer and keyboard interpretation: tool modes, drag-move, pan, zoom, brush and crop.

mod brush;
mod crop;
mod view;

use crate::config::{BrushConfig, ViewConfig};
use crate::geometry::{CanvasSize, DisplaySize, Point};
use crate::layer::{Layer, LayerId};

pub use brush::{BrushCanvas, BrushOptions};
pub use crop::{CropSelection, CropTool};
pub use view::{PanDirection, ViewTransform, ZOOM_MAX, ZOOM_MIN};

/// Mutually exclusive tool modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    None,
    Brush,
    Crop,
    TextEditing,
}

impl ToolMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Brush => "brush",
            Self::Crop => "crop",
            Self::TextEditing => "text-editing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    DragLayer { id: LayerId, last: Point, moved: bool },
    Pan { last: Point },
    Stroke,
    Select,
}

/// What a pointer event asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    Ignored,
    /// Content-space offset to add to the layer position.
    LayerMoved { id: LayerId, dx: f32, dy: f32 },
    /// Drag gesture ended; `moved` is whether any movement happened.
    DragFinished { id: LayerId, moved: bool },
    Panned,
    StrokeUpdated,
    StrokeFinished,
    SelectionUpdated(CropSelection),
    SelectionFinished(Option<CropSelection>),
}

#[derive(Debug, Clone)]
pub struct InteractionEngine {
    mode: ToolMode,
    view: ViewTransform,
    gesture: Option<Gesture>,
    crop: CropTool,
    brush: BrushCanvas,
    brush_options: BrushOptions,
    view_config: ViewConfig,
}

impl InteractionEngine {
    pub fn new(canvas: CanvasSize, brush: &BrushConfig, view: ViewConfig) -> Self {
        Self {
            mode: ToolMode::None,
            view: ViewTransform::new(),
            gesture: None,
            crop: CropTool::new(),
            brush: BrushCanvas::new(canvas),
            brush_options: BrushOptions::from(brush),
            view_config: view,
        }
    }

    pub const fn mode(&self) -> ToolMode {
        self.mode
    }

    /// Switches tool, cancelling any gesture in flight.
    ///
    /// Entering brush mode drops a pending crop selection; entering crop mode
    /// starts a fresh selection.
    pub fn set_mode(&mut self, mode: ToolMode) {
        if self.gesture.take().is_some() {
            self.brush.end_stroke();
            self.crop.finish();
        }
        match mode {
            ToolMode::Brush | ToolMode::Crop => self.crop.reset(),
            ToolMode::None | ToolMode::TextEditing => {}
        }
        if self.mode != mode {
            tracing::debug!(from = self.mode.label(), to = mode.label(), "tool mode changed");
        }
        self.mode = mode;
    }

    pub const fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn zoom_in(&mut self) {
        self.view.zoom_in(self.view_config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom_out(self.view_config.zoom_step);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.view.set_zoom(zoom);
    }

    pub fn pan_with_key(&mut self, direction: PanDirection) {
        self.view.pan_step(direction, self.view_config.pan_step);
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    pub const fn brush_options(&self) -> &BrushOptions {
        &self.brush_options
    }

    pub fn brush_options_mut(&mut self) -> &mut BrushOptions {
        &mut self.brush_options
    }

    pub const fn brush_canvas(&self) -> &BrushCanvas {
        &self.brush
    }

    /// Hands the painted strokes over for a commit.
    pub fn take_brush_raster(&mut self) -> Option<image::RgbaImage> {
        self.brush.take_raster()
    }

    pub fn clear_brush(&mut self) {
        self.brush.clear();
    }

    pub fn crop_selection(&self) -> Option<CropSelection> {
        self.crop.selection()
    }

    pub fn clear_crop(&mut self) {
        self.crop.reset();
    }

    /// Drops gestures and scratch state after the canvas changed under them.
    pub fn reset_for_canvas(&mut self, canvas: CanvasSize) {
        self.gesture = None;
        self.crop.reset();
        self.brush = BrushCanvas::new(canvas);
    }

    /// `position` is in displayed canvas coordinates; `displayed` is the on-screen canvas size.
    pub fn pointer_down(
        &mut self,
        position: Point,
        displayed: DisplaySize,
        active: Option<&Layer>,
    ) -> PointerOutcome {
        self.gesture = None;
        match self.mode {
            ToolMode::Brush => {
                let Some(native) = self.brush.map_point(position, displayed) else {
                    return PointerOutcome::Ignored;
                };
                self.brush.begin_stroke(native, &self.brush_options);
                self.gesture = Some(Gesture::Stroke);
                PointerOutcome::StrokeUpdated
            }
            ToolMode::Crop => {
                self.crop.begin(position);
                self.gesture = Some(Gesture::Select);
                PointerOutcome::Ignored
            }
            ToolMode::None | ToolMode::TextEditing => match active {
                Some(layer) if layer.locked => {
                    tracing::debug!(layer = %layer.id, "locked layer can't be dragged");
                    PointerOutcome::Ignored
                }
                Some(layer) => {
                    self.gesture = Some(Gesture::DragLayer {
                        id: layer.id,
                        last: position,
                        moved: false,
                    });
                    PointerOutcome::Ignored
                }
                None if self.view.zoom() >= 1.0 => {
                    self.gesture = Some(Gesture::Pan { last: position });
                    PointerOutcome::Ignored
                }
                None => PointerOutcome::Ignored,
            },
        }
    }

    pub fn pointer_move(&mut self, position: Point, displayed: DisplaySize) -> PointerOutcome {
        let Some(gesture) = self.gesture.as_mut() else {
            return PointerOutcome::Ignored;
        };
        match gesture {
            Gesture::DragLayer { id, last, moved } => {
                let (sx, sy) = last.delta_to(position);
                *last = position;
                if sx == 0.0 && sy == 0.0 {
                    return PointerOutcome::Ignored;
                }
                *moved = true;
                let zoom = self.view.zoom();
                PointerOutcome::LayerMoved {
                    id: *id,
                    dx: sx / zoom,
                    dy: sy / zoom,
                }
            }
            Gesture::Pan { last } => {
                let (dx, dy) = last.delta_to(position);
                *last = position;
                self.view.pan_by(dx, dy);
                PointerOutcome::Panned
            }
            Gesture::Stroke => {
                let extended = self
                    .brush
                    .map_point(position, displayed)
                    .is_some_and(|native| self.brush.extend_stroke(native, &self.brush_options));
                if extended {
                    PointerOutcome::StrokeUpdated
                } else {
                    PointerOutcome::Ignored
                }
            }
            Gesture::Select => match self.crop.update(position) {
                Some(selection) => PointerOutcome::SelectionUpdated(selection),
                None => PointerOutcome::Ignored,
            },
        }
    }

    pub fn pointer_up(&mut self) -> PointerOutcome {
        match self.gesture.take() {
            Some(Gesture::DragLayer { id, moved, .. }) => PointerOutcome::DragFinished { id, moved },
            Some(Gesture::Pan { .. }) => PointerOutcome::Panned,
            Some(Gesture::Stroke) => {
                self.brush.end_stroke();
                PointerOutcome::StrokeFinished
            }
            Some(Gesture::Select) => {
                self.crop.finish();
                PointerOutcome::SelectionFinished(self.crop.selection())
            }
            None => PointerOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRef;
    use crate::layer::LayerContent;

    const DISPLAY: DisplaySize = DisplaySize::new(100.0, 100.0);

    fn engine() -> InteractionEngine {
        InteractionEngine::new(
            CanvasSize::new(100, 100),
            &BrushConfig::default(),
            ViewConfig::default(),
        )
    }

    fn layer(id: u64, locked: bool) -> Layer {
        let mut layer = Layer::new(
            LayerId::new(id),
            "L",
            LayerContent::Image {
                source: AssetRef::from_bytes(vec![1]),
            },
        );
        layer.locked = locked;
        layer
    }

    #[test]
    fn drag_delta_is_divided_by_zoom() {
        let mut engine = engine();
        engine.set_zoom(2.0);
        let target = layer(3, false);

        engine.pointer_down(Point::new(10.0, 10.0), DISPLAY, Some(&target));
        let outcome = engine.pointer_move(Point::new(30.0, 16.0), DISPLAY);
        assert_eq!(
            outcome,
            PointerOutcome::LayerMoved {
                id: LayerId::new(3),
                dx: 10.0,
                dy: 3.0
            }
        );
        assert_eq!(
            engine.pointer_up(),
            PointerOutcome::DragFinished {
                id: LayerId::new(3),
                moved: true
            }
        );
    }

    #[test]
    fn drag_without_movement_reports_not_moved() {
        let mut engine = engine();
        let target = layer(1, false);
        engine.pointer_down(Point::new(5.0, 5.0), DISPLAY, Some(&target));
        assert_eq!(engine.pointer_move(Point::new(5.0, 5.0), DISPLAY), PointerOutcome::Ignored);
        assert_eq!(
            engine.pointer_up(),
            PointerOutcome::DragFinished {
                id: LayerId::new(1),
                moved: false
            }
        );
    }

    #[test]
    fn locked_layer_drag_is_a_no_op() {
        let mut engine = engine();
        let target = layer(1, true);
        engine.pointer_down(Point::new(0.0, 0.0), DISPLAY, Some(&target));
        assert_eq!(engine.pointer_move(Point::new(9.0, 9.0), DISPLAY), PointerOutcome::Ignored);
        assert_eq!(engine.pointer_up(), PointerOutcome::Ignored);
        assert_eq!(engine.view().pan(), Point::new(0.0, 0.0));
    }

    #[test]
    fn pan_uses_screen_delta_only_at_or_above_unit_zoom() {
        let mut engine = engine();
        engine.set_zoom(2.0);
        engine.pointer_down(Point::new(0.0, 0.0), DISPLAY, None);
        assert_eq!(engine.pointer_move(Point::new(8.0, -4.0), DISPLAY), PointerOutcome::Panned);
        engine.pointer_up();
        assert_eq!(engine.view().pan(), Point::new(8.0, -4.0));

        engine.set_zoom(0.5);
        engine.pointer_down(Point::new(0.0, 0.0), DISPLAY, None);
        assert_eq!(engine.pointer_move(Point::new(8.0, 8.0), DISPLAY), PointerOutcome::Ignored);
        assert_eq!(engine.view().pan(), Point::new(8.0, -4.0));
    }

    #[test]
    fn entering_brush_clears_crop_selection() {
        let mut engine = engine();
        engine.set_mode(ToolMode::Crop);
        engine.pointer_down(Point::new(10.0, 10.0), DISPLAY, None);
        engine.pointer_move(Point::new(40.0, 30.0), DISPLAY);
        assert_eq!(
            engine.pointer_up(),
            PointerOutcome::SelectionFinished(Some(CropSelection::new(10.0, 10.0, 30.0, 20.0)))
        );

        engine.set_mode(ToolMode::Brush);
        assert_eq!(engine.mode(), ToolMode::Brush);
        assert!(engine.crop_selection().is_none());
    }

    #[test]
    fn entering_crop_resets_previous_selection() {
        let mut engine = engine();
        engine.set_mode(ToolMode::Crop);
        engine.pointer_down(Point::new(0.0, 0.0), DISPLAY, None);
        engine.pointer_move(Point::new(20.0, 20.0), DISPLAY);
        engine.pointer_up();
        engine.set_mode(ToolMode::Crop);
        assert!(engine.crop_selection().is_none());
    }

    #[test]
    fn brush_strokes_land_in_native_space() {
        let mut engine = InteractionEngine::new(
            CanvasSize::new(200, 200),
            &BrushConfig::default(),
            ViewConfig::default(),
        );
        engine.set_mode(ToolMode::Brush);
        engine.pointer_down(Point::new(10.0, 10.0), DISPLAY, None);
        engine.pointer_move(Point::new(20.0, 10.0), DISPLAY);
        assert_eq!(engine.pointer_up(), PointerOutcome::StrokeFinished);

        let raster = engine.take_brush_raster().expect("strokes");
        assert_eq!(raster.dimensions(), (200, 200));
        assert_eq!(raster.get_pixel(30, 20).0[3], 255);
        assert_eq!(raster.get_pixel(15, 10).0[3], 0);
        assert!(engine.take_brush_raster().is_none());
    }

    #[test]
    fn keyboard_pan_and_reset_follow_view_config() {
        let mut engine = engine();
        engine.set_zoom(2.0);
        engine.pan_with_key(PanDirection::Down);
        assert_eq!(engine.view().pan(), Point::new(0.0, 20.0));
        engine.zoom_in();
        assert_eq!(engine.view().zoom(), 2.25);
        engine.reset_view();
        assert_eq!(engine.view().zoom(), 1.0);
        assert_eq!(engine.view().pan(), Point::new(0.0, 0.0));
    }

    #[test]
    fn text_editing_still_drags_the_active_layer() {
        let mut engine = engine();
        engine.set_mode(ToolMode::TextEditing);
        let target = layer(1, false);
        engine.pointer_down(Point::new(1.0, 1.0), DISPLAY, Some(&target));
        assert_eq!(
            engine.pointer_move(Point::new(4.0, 1.0), DISPLAY),
            PointerOutcome::LayerMoved {
                id: LayerId::new(1),
                dx: 3.0,
                dy: 0.0
            }
        );
        assert_eq!(engine.mode(), ToolMode::TextEditing);
    }
}
