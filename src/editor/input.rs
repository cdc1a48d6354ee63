use image::imageops;

use super::{display_for, Editor, EditorError};
use crate::assets::{encode_png, AssetRef};
use crate::geometry::{CanvasSize, Point};
use crate::input::{resolve_shortcut, InputContext, ShortcutAction, ShortcutKey, ShortcutModifiers};
use crate::interaction::{PointerOutcome, ToolMode};
use crate::layer::{Layer, LayerContent, LayerPatch, LayerSize, LayerStack};

impl Editor {
    /// `position` is in displayed canvas coordinates.
    pub fn pointer_down(&mut self, position: Point) -> Result<PointerOutcome, EditorError> {
        let session = self.session_mut()?;
        let active = session.active.and_then(|id| session.layers.get(id));
        Ok(session
            .engine
            .pointer_down(position, session.display, active))
    }

    /// Applies live drag movement without recording history.
    pub fn pointer_move(&mut self, position: Point) -> Result<PointerOutcome, EditorError> {
        let session = self.session_mut()?;
        let outcome = session.engine.pointer_move(position, session.display);
        match outcome {
            PointerOutcome::LayerMoved { id, dx, dy } => {
                if let Some(layer) = session.layers.get(id) {
                    let patch =
                        LayerPatch::position(layer.transform.x + dx, layer.transform.y + dy);
                    session.layers.update_layer(id, &patch);
                    self.touch();
                }
            }
            PointerOutcome::StrokeUpdated | PointerOutcome::Panned => self.touch(),
            _ => {}
        }
        Ok(outcome)
    }

    /// Ends the gesture. A drag that moved its layer becomes one history step.
    pub async fn pointer_up(&mut self) -> Result<PointerOutcome, EditorError> {
        let outcome = self.session_mut()?.engine.pointer_up();
        if let PointerOutcome::DragFinished { id, moved: true } = outcome {
            tracing::debug!(layer = %id, "drag finished");
            self.record_live("Move layer").await?;
        }
        Ok(outcome)
    }

    /// Resolves a key press against the current tool and runs the matching action.
    pub async fn handle_key(
        &mut self,
        key: ShortcutKey,
        modifiers: ShortcutModifiers,
    ) -> Result<Option<ShortcutAction>, EditorError> {
        let context = InputContext::for_mode(self.tool_mode());
        let Some(action) = resolve_shortcut(key, modifiers, context) else {
            return Ok(None);
        };
        self.session_ref()?;

        match action {
            ShortcutAction::Undo => {
                self.undo()?;
            }
            ShortcutAction::Redo => {
                self.redo()?;
            }
            ShortcutAction::DeleteLayer => {
                if let Some(id) = self.active_layer() {
                    self.delete_layer(id).await?;
                }
            }
            ShortcutAction::Pan(direction) => {
                self.session_mut()?.engine.pan_with_key(direction);
                self.touch();
            }
            ShortcutAction::ResetView => {
                self.session_mut()?.engine.reset_view();
                self.touch();
            }
            ShortcutAction::ZoomIn => {
                self.session_mut()?.engine.zoom_in();
                self.touch();
            }
            ShortcutAction::ZoomOut => {
                self.session_mut()?.engine.zoom_out();
                self.touch();
            }
            ShortcutAction::CropApply => {
                self.apply_crop().await?;
            }
            ShortcutAction::CropCancel => self.cancel_crop()?,
            ShortcutAction::BrushCommit => {
                self.commit_brush().await?;
            }
            ShortcutAction::ExitTool => {
                let session = self.session_mut()?;
                if session.engine.mode() == ToolMode::Brush {
                    session.engine.clear_brush();
                }
                session.engine.set_mode(ToolMode::None);
            }
            ShortcutAction::EnterBrush => self.set_tool(ToolMode::Brush)?,
            ShortcutAction::EnterCrop => self.set_tool(ToolMode::Crop)?,
        }
        Ok(Some(action))
    }

    /// Turns everything drawn since the last commit into a new drawing layer.
    pub async fn commit_brush(&mut self) -> Result<crate::layer::LayerId, EditorError> {
        let session = self.session_mut()?;
        let opacity = session.engine.brush_options().opacity;
        let raster = session
            .engine
            .take_brush_raster()
            .ok_or(EditorError::EmptyBrushStroke)?;
        let canvas = session.canvas;

        let id = self.ids.allocate();
        let mut layer = Layer::new(
            id,
            format!("Drawing {}", id.get()),
            LayerContent::Drawing {
                source: AssetRef::from_bytes(encode_png(&raster)?),
            },
        );
        layer.opacity = opacity;
        layer.size = Some(LayerSize::new(canvas.width as f32, canvas.height as f32));

        let mut next = self.next_stack()?;
        next.push(layer);
        self.commit(next, "Brush stroke").await?;
        Ok(id)
    }

    pub fn cancel_crop(&mut self) -> Result<(), EditorError> {
        let session = self.session_mut()?;
        session.engine.clear_crop();
        session.engine.set_mode(ToolMode::None);
        Ok(())
    }

    /// Crops the base image to the pending selection.
    ///
    /// Destructive: the cropped image becomes the only layer, the canvas takes
    /// its size and history restarts from it.
    pub async fn apply_crop(&mut self) -> Result<CanvasSize, EditorError> {
        let session = self.session_ref()?;
        let selection = session
            .engine
            .crop_selection()
            .ok_or(EditorError::EmptyCropSelection)?;
        let display = session.display;
        let source = session
            .layers
            .get(session.base)
            .and_then(|base| base.content.raster_source())
            .cloned()
            .ok_or(EditorError::NoBaseLayer)?;

        let decoded = self.compositor.decode(&source).await?;
        let natural = CanvasSize::new(decoded.width(), decoded.height());
        let rect = selection
            .to_natural(display, natural)
            .ok_or(EditorError::EmptyCropSelection)?;
        let cropped =
            imageops::crop_imm(&*decoded.pixels, rect.x, rect.y, rect.width, rect.height)
                .to_image();

        let canvas = CanvasSize::new(rect.width, rect.height);
        let base = Layer::base(
            self.ids.allocate(),
            AssetRef::from_bytes(encode_png(&cropped)?),
            canvas.width,
            canvas.height,
        );
        let layers = LayerStack::from_layers(vec![base.clone()]);
        let preview = self.compositor.compose(layers.as_slice(), canvas).await?;

        let session = self.session_mut()?;
        session.base = base.id;
        session.timeline.reset(canvas, base, preview);
        session.layers = layers;
        session.canvas = canvas;
        session.display = display_for(canvas);
        session.active = None;
        session.engine.reset_for_canvas(canvas);
        session.engine.set_mode(ToolMode::None);
        self.touch();
        self.release_unreferenced_assets();
        tracing::info!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "crop applied"
        );
        Ok(canvas)
    }
}
