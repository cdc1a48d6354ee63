use std::sync::Arc;

use image::RgbaImage;

use super::{Editor, EditorError};
use crate::assets::{encode_raster, ExportFormat};
use crate::compositor::{Compositor, RenderSurfaceError};
use crate::geometry::CanvasSize;
use crate::layer::LayerStack;

/// Everything needed to compose one frame away from the editor.
///
/// Carries the revision it was cut at so a slow render finishing after newer
/// edits can be recognised and dropped.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    pub revision: u64,
    pub canvas: CanvasSize,
    pub layers: LayerStack,
}

impl RenderTicket {
    pub async fn compose(&self, compositor: &Compositor) -> Result<RgbaImage, RenderSurfaceError> {
        compositor.compose(self.layers.as_slice(), self.canvas).await
    }
}

impl Editor {
    /// Composes the live stack at canvas resolution.
    pub async fn render(&self) -> Result<RgbaImage, EditorError> {
        let session = self.session_ref()?;
        Ok(self
            .compositor
            .compose(session.layers.as_slice(), session.canvas)
            .await?)
    }

    pub fn render_ticket(&self) -> Option<RenderTicket> {
        self.session.as_ref().map(|session| RenderTicket {
            revision: self.revision,
            canvas: session.canvas,
            layers: session.layers.clone(),
        })
    }

    /// Stores a finished frame unless the editor has moved on since its ticket was cut.
    pub fn accept_render(&mut self, revision: u64, frame: RgbaImage) -> bool {
        if revision != self.revision {
            tracing::debug!(
                ticket = revision,
                current = self.revision,
                "discarding stale render"
            );
            return false;
        }
        self.frame = Some(Arc::new(frame));
        true
    }

    /// Last accepted frame. May lag behind the live stack until the next render lands.
    pub fn frame(&self) -> Option<&Arc<RgbaImage>> {
        self.frame.as_ref()
    }

    /// Composes the live stack and encodes it for download.
    pub async fn export(&self, format: ExportFormat) -> Result<Vec<u8>, EditorError> {
        let flattened = self.render().await?;
        let bytes = encode_raster(&flattened, format)?;
        tracing::info!(
            format = format.extension(),
            bytes = bytes.len(),
            "composition exported"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::super::tests::{editor_with_base, png};
    use super::*;
    use crate::layer::LayerPatch;

    #[test]
    fn stale_render_is_discarded() {
        let (mut editor, _) = editor_with_base(10, 10);
        let stale = editor.render_ticket().expect("ticket");
        let id = block_on(editor.add_text_layer("newer")).expect("text");
        let fresh = editor.render_ticket().expect("ticket");
        assert!(fresh.revision > stale.revision);
        assert!(fresh.layers.contains(id));

        let stale_frame = block_on(stale.compose(editor.compositor())).expect("compose");
        assert!(!editor.accept_render(stale.revision, stale_frame));
        assert!(editor.frame().is_none());

        let fresh_frame = block_on(fresh.compose(editor.compositor())).expect("compose");
        assert!(editor.accept_render(fresh.revision, fresh_frame));
        assert!(editor.frame().is_some());
    }

    #[test]
    fn render_reflects_live_edits_and_visibility() {
        let (mut editor, _) = editor_with_base(10, 10);
        let id = block_on(editor.add_image_layer(png(10, 10, [0, 0, 255, 255]))).expect("add");
        let out = block_on(editor.render()).expect("render");
        assert_eq!(out.get_pixel(5, 5).0, [0, 0, 255, 255]);

        block_on(editor.update_layer(id, &LayerPatch::visibility(false))).expect("hide");
        let out = block_on(editor.render()).expect("render");
        assert_eq!(out.get_pixel(5, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn export_encodes_the_flattened_composition() {
        let (editor, _) = editor_with_base(6, 4);
        let bytes = block_on(editor.export(ExportFormat::Png)).expect("export");
        let decoded = image::load_from_memory(&bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (6, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
