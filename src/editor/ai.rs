use std::sync::Arc;

use super::{Editor, EditorError};
use crate::assets::{encode_png, AssetRef};
use crate::layer::{Layer, LayerContent, LayerId, LayerSize};
use crate::service::{AspectRatio, ImageService, QualityTier, ServiceError};

impl Editor {
    fn service(&self) -> Result<Arc<dyn ImageService>, EditorError> {
        self.service.clone().ok_or(EditorError::NoService)
    }

    fn service_failed(&mut self, action: &str, err: ServiceError) -> EditorError {
        self.toasts.error(format!("{action} failed: {}", err.message));
        EditorError::Service(err)
    }

    async fn flattened_png(&self) -> Result<Vec<u8>, EditorError> {
        let flattened = self.render().await?;
        Ok(encode_png(&flattened)?)
    }

    /// Generates an image from `prompt` and opens it as a new base image.
    pub async fn ai_generate(
        &mut self,
        prompt: &str,
        aspect: AspectRatio,
        quality: QualityTier,
    ) -> Result<LayerId, EditorError> {
        let service = self.service()?;
        let bytes = match service.generate(prompt, aspect, quality).await {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.service_failed("Generate", err)),
        };
        let id = self.load_base_image(bytes).await?;
        self.toasts.info("Image generated");
        Ok(id)
    }

    /// Sends the flattened composition with `instruction` and adds the result as a
    /// full-canvas layer on top.
    pub async fn ai_edit(&mut self, instruction: &str) -> Result<LayerId, EditorError> {
        let service = self.service()?;
        let canvas = self.session_ref()?.canvas;
        let flattened = self.flattened_png().await?;
        let bytes = match service.edit(&flattened, instruction).await {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.service_failed("Edit", err)),
        };
        let source = AssetRef::from_bytes(bytes);
        self.compositor.decode(&source).await?;

        let id = self.ids.allocate();
        let mut layer = Layer::new(id, "AI edit", LayerContent::Image { source });
        layer.size = Some(LayerSize::new(canvas.width as f32, canvas.height as f32));

        let mut next = self.next_stack()?;
        next.push(layer);
        self.commit(next, "AI edit").await?;
        self.select_layer(Some(id))?;
        self.toasts.info("Edit applied");
        Ok(id)
    }

    /// Asks the service to describe the flattened composition.
    pub async fn ai_analyze(&mut self, prompt: &str) -> Result<String, EditorError> {
        let service = self.service()?;
        let flattened = self.flattened_png().await?;
        match service.analyze(&flattened, prompt).await {
            Ok(text) => Ok(text),
            Err(err) => Err(self.service_failed("Analyze", err)),
        }
    }
}
