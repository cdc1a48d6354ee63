//! Session state and the operations that drive layers, history and tools together.

mod ai;
mod input;
mod render;

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::adjust::Adjustment;
use crate::assets::{encode_png, AssetId, AssetRef, DecodeError, EncodeError, ImageDecoder};
use crate::compositor::{Compositor, CompositorError, GlyphTextRenderer, RenderSurfaceError};
use crate::config::EditorConfig;
use crate::geometry::{CanvasSize, DisplaySize};
use crate::history::{HistoryStep, Timeline};
use crate::interaction::{InteractionEngine, ToolMode};
use crate::layer::{
    Layer, LayerContent, LayerId, LayerIdAllocator, LayerKind, LayerPatch, LayerSize, LayerStack,
    TextPatch, Transform,
};
use crate::notification::ToastQueue;
use crate::service::{ImageService, ServiceError};

pub use render::RenderTicket;

/// Offset applied to a duplicated layer so the copy is visible.
const DUPLICATE_OFFSET: f32 = 10.0;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no image is loaded")]
    NoDocument,
    #[error("{0} does not exist")]
    LayerNotFound(LayerId),
    #[error("{0} is locked")]
    LayerLocked(LayerId),
    #[error("{0} has no raster source")]
    NotRaster(LayerId),
    #[error("the composition has no base layer")]
    NoBaseLayer,
    #[error("crop selection is empty")]
    EmptyCropSelection,
    #[error("nothing has been drawn")]
    EmptyBrushStroke,
    #[error("no image service is configured")]
    NoService,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Compose(#[from] CompositorError),
    #[error(transparent)]
    Render(#[from] RenderSurfaceError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Everything that exists only while an image is open.
#[derive(Debug)]
pub struct Session {
    canvas: CanvasSize,
    display: DisplaySize,
    layers: LayerStack,
    /// The opened image. Crop always samples this layer.
    base: LayerId,
    active: Option<LayerId>,
    timeline: Timeline,
    engine: InteractionEngine,
}

impl Session {
    pub const fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub const fn display_size(&self) -> DisplaySize {
        self.display
    }

    pub const fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub const fn base_layer(&self) -> LayerId {
        self.base
    }

    pub const fn active_layer(&self) -> Option<LayerId> {
        self.active
    }

    /// Assets drawn by the live stack or by any snapshot.
    fn referenced_assets(&self) -> HashSet<AssetId> {
        self.timeline
            .entries()
            .iter()
            .flat_map(|snapshot| snapshot.layers.asset_ids())
            .chain(self.layers.asset_ids())
            .collect()
    }

    /// The base image stays at the bottom while it is in the stack.
    fn pins_bottom(&self, from: usize, to: usize) -> bool {
        (from == 0 || to == 0)
            && self
                .layers
                .as_slice()
                .first()
                .is_some_and(|layer| layer.id == self.base)
    }

    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub const fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    /// Drops the active layer once it is gone from the stack.
    fn clear_dangling_active(&mut self) {
        if let Some(id) = self.active {
            if !self.layers.contains(id) {
                tracing::debug!(layer = %id, "active layer no longer exists");
                self.active = None;
                if self.engine.mode() == ToolMode::TextEditing {
                    self.engine.set_mode(ToolMode::None);
                }
            }
        }
    }
}

fn display_for(canvas: CanvasSize) -> DisplaySize {
    DisplaySize::new(canvas.width as f32, canvas.height as f32)
}

pub struct Editor {
    compositor: Compositor,
    service: Option<Arc<dyn ImageService>>,
    config: EditorConfig,
    session: Option<Session>,
    ids: LayerIdAllocator,
    toasts: ToastQueue,
    revision: u64,
    frame: Option<Arc<image::RgbaImage>>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("compositor", &self.compositor)
            .field("has_service", &self.service.is_some())
            .field("session", &self.session)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub fn new(compositor: Compositor, config: EditorConfig) -> Self {
        Self {
            compositor,
            service: None,
            config,
            session: None,
            ids: LayerIdAllocator::new(),
            toasts: ToastQueue::new(),
            revision: 0,
            frame: None,
        }
    }

    /// Editor backed by the `image` decoder and glyph text rendering from the configured fonts.
    pub fn from_config(config: EditorConfig) -> Self {
        let text = GlyphTextRenderer::from_faces(&config.fonts);
        let compositor = Compositor::new(Arc::new(ImageDecoder::new()), Arc::new(text))
            .with_limits(config.render.limits());
        Self::new(compositor, config)
    }

    pub fn with_service(mut self, service: Arc<dyn ImageService>) -> Self {
        self.service = Some(service);
        self
    }

    pub const fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn layers(&self) -> Option<&LayerStack> {
        self.session.as_ref().map(Session::layers)
    }

    pub fn canvas(&self) -> Option<CanvasSize> {
        self.session.as_ref().map(Session::canvas)
    }

    pub fn active_layer(&self) -> Option<LayerId> {
        self.session.as_ref().and_then(Session::active_layer)
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.session.as_ref().map(Session::timeline)
    }

    pub fn tool_mode(&self) -> ToolMode {
        self.session
            .as_ref()
            .map_or(ToolMode::None, |session| session.engine.mode())
    }

    pub const fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn toasts_mut(&mut self) -> &mut ToastQueue {
        &mut self.toasts
    }

    /// Bumped on every change that affects the rendered output.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    fn session_ref(&self) -> Result<&Session, EditorError> {
        self.session.as_ref().ok_or(EditorError::NoDocument)
    }

    fn session_mut(&mut self) -> Result<&mut Session, EditorError> {
        self.session.as_mut().ok_or(EditorError::NoDocument)
    }

    fn layer(&self, id: LayerId) -> Result<&Layer, EditorError> {
        self.session_ref()?
            .layers
            .get(id)
            .ok_or(EditorError::LayerNotFound(id))
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Lets the decoder forget rasters no layer or snapshot can reach anymore.
    fn release_unreferenced_assets(&self) {
        if let Some(session) = &self.session {
            self.compositor.retain_assets(&session.referenced_assets());
        }
    }

    /// Opens `bytes` as the new base image, replacing any open composition.
    pub async fn load_base_image(&mut self, bytes: Vec<u8>) -> Result<LayerId, EditorError> {
        self.load_base_asset(AssetRef::from_bytes(bytes)).await
    }

    pub async fn load_base_asset(&mut self, asset: AssetRef) -> Result<LayerId, EditorError> {
        let decoded = self.compositor.decode(&asset).await?;
        let canvas = CanvasSize::new(decoded.width(), decoded.height());
        let base = Layer::base(self.ids.allocate(), asset, canvas.width, canvas.height);
        let id = base.id;
        let layers = LayerStack::from_layers(vec![base]);
        let preview = self.compositor.compose(layers.as_slice(), canvas).await?;

        let timeline = Timeline::new(canvas, &layers, preview, "Open image");
        let engine = InteractionEngine::new(canvas, &self.config.brush, self.config.view);
        self.session = Some(Session {
            canvas,
            display: display_for(canvas),
            layers,
            base: id,
            active: None,
            timeline,
            engine,
        });
        self.touch();
        self.release_unreferenced_assets();
        tracing::info!(width = canvas.width, height = canvas.height, "base image loaded");
        Ok(id)
    }

    /// Tells the editor how large the canvas currently appears on screen.
    pub fn set_display_size(&mut self, display_size: DisplaySize) -> Result<(), EditorError> {
        let session = self.session_mut()?;
        if display_size.is_degenerate() {
            tracing::debug!(size = ?display_size, "ignoring degenerate display size");
            return Ok(());
        }
        session.display = display_size;
        Ok(())
    }

    /// Composes `next` and, on success, makes it the live stack and records a snapshot.
    ///
    /// On failure the live stack and history are left exactly as they were.
    async fn commit(&mut self, next: LayerStack, label: &str) -> Result<(), EditorError> {
        let canvas = self.session_ref()?.canvas;
        let preview = self.compositor.compose(next.as_slice(), canvas).await?;
        let session = self.session_mut()?;
        session.timeline.push(&next, preview, label);
        session.layers = next;
        session.clear_dangling_active();
        self.touch();
        self.release_unreferenced_assets();
        Ok(())
    }

    /// Records the live stack as it is, for changes already applied in place.
    async fn record_live(&mut self, label: &str) -> Result<(), EditorError> {
        let next = self.session_ref()?.layers.clone();
        self.commit(next, label).await
    }

    fn next_stack(&self) -> Result<LayerStack, EditorError> {
        Ok(self.session_ref()?.layers.clone())
    }

    /// Adds an image layer scaled down to fit the canvas and centered on it.
    pub async fn add_image_layer(&mut self, bytes: Vec<u8>) -> Result<LayerId, EditorError> {
        let canvas = self.session_ref()?.canvas;
        let source = AssetRef::from_bytes(bytes);
        let decoded = self.compositor.decode(&source).await?;

        let (natural_w, natural_h) = (decoded.width() as f32, decoded.height() as f32);
        let fit = (canvas.width as f32 / natural_w)
            .min(canvas.height as f32 / natural_h)
            .min(1.0);
        let size = LayerSize::new(natural_w * fit, natural_h * fit);

        let id = self.ids.allocate();
        let mut layer = Layer::new(id, format!("Image {}", id.get()), LayerContent::Image { source });
        layer.size = Some(size);
        layer.transform = Transform::at(
            (canvas.width as f32 - size.width) / 2.0,
            (canvas.height as f32 - size.height) / 2.0,
        );

        let mut next = self.next_stack()?;
        next.push(layer);
        self.commit(next, "Add image").await?;
        self.select_layer(Some(id))?;
        Ok(id)
    }

    /// Adds a text layer with the configured defaults and starts editing it.
    pub async fn add_text_layer(&mut self, text: &str) -> Result<LayerId, EditorError> {
        let canvas = self.session_ref()?.canvas;
        let id = self.ids.allocate();
        let mut layer = Layer::new(
            id,
            format!("Text {}", id.get()),
            LayerContent::Text(self.config.text.content(text)),
        );
        layer.transform = Transform::at(canvas.width as f32 * 0.1, canvas.height as f32 * 0.1);

        let mut next = self.next_stack()?;
        next.push(layer);
        self.commit(next, "Add text").await?;
        self.select_layer(Some(id))?;
        Ok(id)
    }

    pub async fn delete_layer(&mut self, id: LayerId) -> Result<(), EditorError> {
        if self.layer(id)?.locked {
            return Err(EditorError::LayerLocked(id));
        }
        let mut next = self.next_stack()?;
        next.remove(id);
        self.commit(next, "Delete layer").await
    }

    /// Merges `patch` into a layer. Unknown ids and no-op patches record nothing.
    pub async fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> Result<bool, EditorError> {
        let next = self.session_ref()?.layers.with_update(id, patch);
        if next == self.session_ref()?.layers {
            return Ok(false);
        }
        self.commit(next, "Update layer").await?;
        Ok(true)
    }

    pub async fn update_text(&mut self, id: LayerId, patch: TextPatch) -> Result<bool, EditorError> {
        self.update_layer(id, &LayerPatch::text(patch)).await
    }

    pub async fn toggle_visibility(&mut self, id: LayerId) -> Result<bool, EditorError> {
        let visible = self.layer(id)?.visible;
        self.update_layer(id, &LayerPatch::visibility(!visible)).await
    }

    pub async fn toggle_lock(&mut self, id: LayerId) -> Result<bool, EditorError> {
        let locked = self.layer(id)?.locked;
        let patch = LayerPatch {
            locked: Some(!locked),
            ..LayerPatch::default()
        };
        self.update_layer(id, &patch).await
    }

    /// Positional reorder; out-of-range indices and moves across the base image do nothing.
    pub async fn move_layer(&mut self, from: usize, to: usize) -> Result<bool, EditorError> {
        if self.session_ref()?.pins_bottom(from, to) {
            tracing::debug!(from, to, "base image stays at the bottom");
            return Ok(false);
        }
        let mut next = self.next_stack()?;
        if !next.move_layer(from, to) {
            return Ok(false);
        }
        self.commit(next, "Reorder layers").await?;
        Ok(true)
    }

    pub async fn move_layer_by_id(&mut self, id: LayerId, to: usize) -> Result<bool, EditorError> {
        let from = self
            .session_ref()?
            .layers
            .index_of(id)
            .ok_or(EditorError::LayerNotFound(id))?;
        self.move_layer(from, to).await
    }

    pub async fn raise_layer(&mut self, id: LayerId) -> Result<bool, EditorError> {
        let from = self
            .session_ref()?
            .layers
            .index_of(id)
            .ok_or(EditorError::LayerNotFound(id))?;
        self.move_layer(from, from + 1).await
    }

    pub async fn lower_layer(&mut self, id: LayerId) -> Result<bool, EditorError> {
        let from = self
            .session_ref()?
            .layers
            .index_of(id)
            .ok_or(EditorError::LayerNotFound(id))?;
        match from.checked_sub(1) {
            Some(to) => self.move_layer(from, to).await,
            None => Ok(false),
        }
    }

    /// Copies a layer directly above the original, slightly offset and unlocked.
    pub async fn duplicate_layer(&mut self, id: LayerId) -> Result<LayerId, EditorError> {
        let index = self
            .session_ref()?
            .layers
            .index_of(id)
            .ok_or(EditorError::LayerNotFound(id))?;
        let mut copy = self.layer(id)?.clone();
        copy.id = self.ids.allocate();
        copy.name = format!("{} copy", copy.name);
        copy.locked = false;
        copy.transform.x += DUPLICATE_OFFSET;
        copy.transform.y += DUPLICATE_OFFSET;
        let copy_id = copy.id;

        let mut next = self.next_stack()?;
        next.insert(index + 1, copy);
        self.commit(next, "Duplicate layer").await?;
        self.select_layer(Some(copy_id))?;
        Ok(copy_id)
    }

    /// Selecting a text layer enters text editing; selecting anything else leaves it.
    pub fn select_layer(&mut self, id: Option<LayerId>) -> Result<(), EditorError> {
        let session = self.session_mut()?;
        let is_text = match id {
            Some(id) => {
                let layer = session.layers.get(id).ok_or(EditorError::LayerNotFound(id))?;
                layer.kind() == LayerKind::Text
            }
            None => false,
        };
        session.active = id;
        if is_text {
            session.engine.set_mode(ToolMode::TextEditing);
        } else if session.engine.mode() == ToolMode::TextEditing {
            session.engine.set_mode(ToolMode::None);
        }
        Ok(())
    }

    pub fn set_tool(&mut self, mode: ToolMode) -> Result<(), EditorError> {
        self.session_mut()?.engine.set_mode(mode);
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        self.step_history(HistoryStep::Undo)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        self.step_history(HistoryStep::Redo)
    }

    fn step_history(&mut self, step: HistoryStep) -> Result<bool, EditorError> {
        let session = self.session_mut()?;
        let Some(restored) = session.timeline.step(step) else {
            tracing::debug!("{}", step.empty_message());
            return Ok(false);
        };
        session.layers = restored;
        session.clear_dangling_active();
        self.touch();
        Ok(true)
    }

    /// Runs `adjustment` over a raster layer's pixels and swaps in the result.
    pub async fn apply_adjustment(
        &mut self,
        id: LayerId,
        adjustment: Adjustment,
    ) -> Result<(), EditorError> {
        let source = self
            .layer(id)?
            .content
            .raster_source()
            .cloned()
            .ok_or(EditorError::NotRaster(id))?;
        let pixels = self.compositor.compose_single(&source).await?;
        let adjusted = adjustment.apply(&pixels);
        let patch = LayerPatch {
            source: Some(AssetRef::from_bytes(encode_png(&adjusted)?)),
            ..LayerPatch::default()
        };
        let next = self.session_ref()?.layers.with_update(id, &patch);
        self.commit(next, adjustment.label()).await
    }
}
