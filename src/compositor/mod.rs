//! Flattens a layer stack into a single raster.

mod raster;
mod text;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use image::RgbaImage;
use thiserror::Error;

use crate::assets::{AssetDecoder, AssetId, AssetRef, DecodeError, DecodedAsset};
use crate::geometry::CanvasSize;
use crate::layer::{Layer, LayerContent};

use raster::{allocate_surface, draw_transformed, opacity_to_alpha, Placement};

pub use text::{BlockTextRenderer, GlyphTextRenderer, TextRenderer};

pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 100_000_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderSurfaceError {
    #[error("canvas has no area")]
    EmptyCanvas,
    #[error("canvas {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },
    #[error("failed to allocate a {width}x{height} render surface")]
    Allocation { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Surface(#[from] RenderSurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    pub max_canvas_pixels: u64,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

pub struct Compositor {
    decoder: Arc<dyn AssetDecoder>,
    text: Arc<dyn TextRenderer>,
    limits: RenderLimits,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(decoder: Arc<dyn AssetDecoder>, text: Arc<dyn TextRenderer>) -> Self {
        Self {
            decoder,
            text,
            limits: RenderLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RenderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub const fn limits(&self) -> RenderLimits {
        self.limits
    }

    /// Lets the decoder drop cached rasters for assets outside `live`.
    pub fn retain_assets(&self, live: &HashSet<AssetId>) {
        self.decoder.retain(live);
    }

    pub async fn decode(&self, asset: &AssetRef) -> Result<DecodedAsset, DecodeError> {
        self.decoder.decode(asset).await
    }

    /// Draws `layers` bottom to top onto a transparent `canvas`-sized surface.
    ///
    /// Raster sources are decoded concurrently; drawing still happens strictly
    /// in stack order. A layer whose source fails to decode is skipped and the
    /// rest of the stack is still drawn.
    pub async fn compose(
        &self,
        layers: &[Layer],
        canvas: CanvasSize,
    ) -> Result<RgbaImage, RenderSurfaceError> {
        let mut surface = self.allocate(canvas)?;

        let decodes = join_all(layers.iter().map(|layer| async move {
            match layer.content.raster_source() {
                Some(source) if is_drawn(layer) => Some(self.decoder.decode(source).await),
                _ => None,
            }
        }))
        .await;

        let mut drawn = 0_usize;
        for (layer, decoded) in layers.iter().zip(decodes) {
            if !is_drawn(layer) {
                continue;
            }
            let opacity = opacity_to_alpha(layer.opacity);
            match (&layer.content, decoded) {
                (LayerContent::Text(content), _) => {
                    let font_px = content.font_size * layer.transform.scale;
                    let max_pixels = self.limits.max_canvas_pixels;
                    let Some(tile) = self.text.render(content, font_px, max_pixels) else {
                        continue;
                    };
                    let origin = (f64::from(layer.transform.x), f64::from(layer.transform.y));
                    // Text turns around its anchor.
                    let placement = Placement::rotated(
                        origin,
                        (f64::from(tile.width()), f64::from(tile.height())),
                        origin,
                        f64::from(layer.transform.rotation),
                    );
                    draw_transformed(&mut surface, &tile, &placement, opacity);
                    drawn += 1;
                }
                (_, Some(Ok(asset))) => {
                    let placement = raster_placement(layer, &asset);
                    draw_transformed(&mut surface, &asset.pixels, &placement, opacity);
                    drawn += 1;
                }
                (_, Some(Err(err))) => {
                    tracing::warn!(layer = %layer.id, error = %err, "skipping layer that failed to decode");
                }
                (_, None) => {}
            }
        }

        tracing::debug!(
            width = canvas.width,
            height = canvas.height,
            layers = layers.len(),
            drawn,
            "composed layer stack"
        );
        Ok(surface)
    }

    /// Decodes one asset and renders it alone at its natural size.
    pub async fn compose_single(&self, asset: &AssetRef) -> Result<RgbaImage, CompositorError> {
        let decoded = self.decoder.decode(asset).await?;
        let canvas = CanvasSize::new(decoded.width(), decoded.height());
        let mut surface = self.allocate(canvas)?;
        let placement = Placement::at(
            (0.0, 0.0),
            (f64::from(canvas.width), f64::from(canvas.height)),
        );
        draw_transformed(&mut surface, &decoded.pixels, &placement, u8::MAX);
        Ok(surface)
    }

    fn allocate(&self, canvas: CanvasSize) -> Result<RgbaImage, RenderSurfaceError> {
        allocate_surface(canvas, self.limits.max_canvas_pixels)
    }
}

fn is_drawn(layer: &Layer) -> bool {
    layer.visible && layer.opacity > 0
}

/// Raster layers scale from their explicit size (or natural size) and rotate about the box center.
fn raster_placement(layer: &Layer, asset: &DecodedAsset) -> Placement {
    let (base_w, base_h) = match layer.size {
        Some(size) => (f64::from(size.width), f64::from(size.height)),
        None => (f64::from(asset.width()), f64::from(asset.height())),
    };
    let scale = f64::from(layer.transform.scale);
    let (w, h) = (base_w * scale, base_h * scale);
    let (x, y) = (f64::from(layer.transform.x), f64::from(layer.transform.y));
    Placement::rotated(
        (x, y),
        (w, h),
        (x + w / 2.0, y + h / 2.0),
        f64::from(layer.transform.rotation),
    )
}
