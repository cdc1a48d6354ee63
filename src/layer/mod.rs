//! Layer records and the ordered layer stack.

mod stack;

use std::fmt;

use crate::assets::AssetRef;
use crate::geometry::Color;

pub use stack::LayerStack;

pub const OPACITY_MAX: u8 = 100;
pub const MIN_LAYER_SCALE: f32 = 0.01;
const TEXT_WEIGHT_MIN: u16 = 100;
const TEXT_WEIGHT_MAX: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Hands out layer ids for a whole editing session. Never rewound by undo, so a
/// restored snapshot can't collide with a freshly created layer.
#[derive(Debug, Clone)]
pub struct LayerIdAllocator {
    next: u64,
}

impl Default for LayerIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerIdAllocator {
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> LayerId {
        let id = LayerId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Moves the counter past every id in `stack`.
    pub fn observe(&mut self, stack: &LayerStack) {
        if let Some(max) = stack.iter().map(|layer| layer.id.0).max() {
            self.next = self.next.max(max.saturating_add(1));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    /// Degrees, clockwise on screen.
    pub rotation: f32,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        scale: 1.0,
    };

    pub const fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation.rem_euclid(360.0) != 0.0
    }
}

/// Explicit pre-scale pixel size of a raster layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSize {
    pub width: f32,
    pub height: f32,
}

impl LayerSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextContent {
    pub text: String,
    pub font_size: f32,
    pub color: Color,
    pub font_family: String,
    pub font_weight: u16,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 32.0,
            color: Color::WHITE,
            font_family: "sans-serif".to_string(),
            font_weight: 400,
        }
    }

    pub fn lines(&self) -> Vec<&str> {
        self.text.split('\n').collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    Image { source: AssetRef },
    /// Produced by committing freehand brush strokes; composited like an image.
    Drawing { source: AssetRef },
    Text(TextContent),
}

impl LayerContent {
    pub const fn kind(&self) -> LayerKind {
        match self {
            Self::Image { .. } => LayerKind::Image,
            Self::Drawing { .. } => LayerKind::Drawing,
            Self::Text(_) => LayerKind::Text,
        }
    }

    pub const fn raster_source(&self) -> Option<&AssetRef> {
        match self {
            Self::Image { source } | Self::Drawing { source } => Some(source),
            Self::Text(_) => None,
        }
    }

    pub const fn as_text(&self) -> Option<&TextContent> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Image,
    Drawing,
    Text,
}

impl LayerKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Drawing => "Drawing",
            Self::Text => "Text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    /// Percent, 0..=100.
    pub opacity: u8,
    pub transform: Transform,
    pub size: Option<LayerSize>,
    pub content: LayerContent,
}

impl Layer {
    pub fn new(id: LayerId, name: impl Into<String>, content: LayerContent) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            locked: false,
            opacity: OPACITY_MAX,
            transform: Transform::IDENTITY,
            size: None,
            content,
        }
    }

    /// Locked, untransformed bottom layer whose size matches the canvas.
    pub fn base(id: LayerId, source: AssetRef, width: u32, height: u32) -> Self {
        let mut layer = Self::new(id, "Background", LayerContent::Image { source });
        layer.locked = true;
        layer.size = Some(LayerSize::new(width as f32, height as f32));
        layer
    }

    pub const fn kind(&self) -> LayerKind {
        self.content.kind()
    }

    pub fn opacity_fraction(&self) -> f32 {
        f32::from(self.opacity.min(OPACITY_MAX)) / f32::from(OPACITY_MAX)
    }

    /// Merges `patch` into this layer. Returns whether any field changed.
    pub fn apply_patch(&mut self, patch: &LayerPatch) -> bool {
        let before = self.clone();

        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.min(OPACITY_MAX);
        }
        if let Some(x) = patch.x.filter(|value| value.is_finite()) {
            self.transform.x = x;
        }
        if let Some(y) = patch.y.filter(|value| value.is_finite()) {
            self.transform.y = y;
        }
        if let Some(rotation) = patch.rotation.filter(|value| value.is_finite()) {
            self.transform.rotation = rotation;
        }
        if let Some(scale) = patch.scale {
            if scale.is_finite() && scale > 0.0 {
                self.transform.scale = scale.max(MIN_LAYER_SCALE);
            } else {
                tracing::debug!(layer = %self.id, scale, "ignoring non-positive layer scale");
            }
        }
        if let Some(size) = patch.size {
            self.size = size.filter(|size| size.width > 0.0 && size.height > 0.0);
        }

        match (&mut self.content, &patch.source, &patch.text) {
            (LayerContent::Image { source } | LayerContent::Drawing { source }, Some(next), _) => {
                *source = next.clone();
            }
            (LayerContent::Text(text), _, Some(text_patch)) => text_patch.apply(text),
            (_, None, None) => {}
            (content, _, _) => {
                tracing::debug!(
                    layer = %self.id,
                    kind = content.kind().label(),
                    "ignoring content fields that do not apply to this layer kind"
                );
            }
        }

        *self != before
    }
}

/// Partial field update for [`Layer`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub opacity: Option<u8>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub rotation: Option<f32>,
    pub scale: Option<f32>,
    /// `Some(None)` clears an explicit size.
    pub size: Option<Option<LayerSize>>,
    pub source: Option<AssetRef>,
    pub text: Option<TextPatch>,
}

impl LayerPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn visibility(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }

    pub fn opacity(opacity: u8) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    pub fn text(patch: TextPatch) -> Self {
        Self {
            text: Some(patch),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPatch {
    pub text: Option<String>,
    pub font_size: Option<f32>,
    pub color: Option<Color>,
    pub font_family: Option<String>,
    pub font_weight: Option<u16>,
}

impl TextPatch {
    fn apply(&self, content: &mut TextContent) {
        if let Some(text) = &self.text {
            content.text.clone_from(text);
        }
        if let Some(size) = self
            .font_size
            .filter(|size| size.is_finite() && *size > 0.0)
        {
            content.font_size = size;
        }
        if let Some(color) = self.color {
            content.color = color;
        }
        if let Some(family) = self.font_family.as_ref().filter(|family| !family.is_empty()) {
            content.font_family.clone_from(family);
        }
        if let Some(weight) = self.font_weight {
            content.font_weight = weight.clamp(TEXT_WEIGHT_MIN, TEXT_WEIGHT_MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_layer(id: u64) -> Layer {
        Layer::new(
            LayerId::new(id),
            format!("Image {id}"),
            LayerContent::Image {
                source: AssetRef::from_bytes(vec![id as u8]),
            },
        )
    }

    #[test]
    fn allocator_is_monotonic_and_skips_observed_ids() {
        let mut ids = LayerIdAllocator::new();
        assert_eq!(ids.allocate(), LayerId::new(1));
        assert_eq!(ids.allocate(), LayerId::new(2));

        let stack = LayerStack::from_layers(vec![image_layer(40)]);
        ids.observe(&stack);
        assert_eq!(ids.allocate(), LayerId::new(41));
    }

    #[test]
    fn base_layer_is_locked_unscaled_and_sized() {
        let layer = Layer::base(LayerId::new(1), AssetRef::from_bytes(vec![1]), 640, 480);
        assert!(layer.locked);
        assert_eq!(layer.transform, Transform::IDENTITY);
        assert_eq!(layer.size, Some(LayerSize::new(640.0, 480.0)));
        assert_eq!(layer.kind(), LayerKind::Image);
    }

    #[test]
    fn patch_merges_only_given_fields_and_clamps_opacity() {
        let mut layer = image_layer(1);
        let changed = layer.apply_patch(&LayerPatch {
            opacity: Some(180),
            x: Some(12.5),
            ..LayerPatch::default()
        });
        assert!(changed);
        assert_eq!(layer.opacity, 100);
        assert_eq!(layer.transform.x, 12.5);
        assert_eq!(layer.transform.y, 0.0);
        assert_eq!(layer.name, "Image 1");

        layer.apply_patch(&LayerPatch::opacity(40));
        assert!((layer.opacity_fraction() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn patch_rejects_non_positive_scale_and_non_finite_positions() {
        let mut layer = image_layer(1);
        let changed = layer.apply_patch(&LayerPatch {
            scale: Some(0.0),
            x: Some(f32::NAN),
            ..LayerPatch::default()
        });
        assert!(!changed);
        assert_eq!(layer.transform.scale, 1.0);
        assert_eq!(layer.transform.x, 0.0);

        layer.apply_patch(&LayerPatch {
            scale: Some(2.5),
            ..LayerPatch::default()
        });
        assert_eq!(layer.transform.scale, 2.5);
    }

    #[test]
    fn text_fields_apply_only_to_text_layers() {
        let mut image = image_layer(1);
        let patch = LayerPatch::text(TextPatch {
            text: Some("ignored".to_string()),
            ..TextPatch::default()
        });
        assert!(!image.apply_patch(&patch));

        let mut text = Layer::new(
            LayerId::new(2),
            "Title",
            LayerContent::Text(TextContent::new("hello")),
        );
        assert!(text.apply_patch(&LayerPatch::text(TextPatch {
            text: Some("world".to_string()),
            font_weight: Some(5000),
            font_size: Some(-3.0),
            ..TextPatch::default()
        })));
        let content = text.content.as_text().expect("text content");
        assert_eq!(content.text, "world");
        assert_eq!(content.font_weight, 1000);
        assert_eq!(content.font_size, 32.0);
    }

    #[test]
    fn source_replacement_applies_to_raster_layers_only() {
        let replacement = AssetRef::from_bytes(vec![9, 9]);
        let mut image = image_layer(1);
        assert!(image.apply_patch(&LayerPatch {
            source: Some(replacement.clone()),
            ..LayerPatch::default()
        }));
        assert_eq!(image.content.raster_source(), Some(&replacement));

        let mut text = Layer::new(
            LayerId::new(2),
            "Caption",
            LayerContent::Text(TextContent::new("caption")),
        );
        assert!(!text.apply_patch(&LayerPatch {
            source: Some(replacement),
            ..LayerPatch::default()
        }));
    }

    #[test]
    fn clearing_size_falls_back_to_natural_dimensions() {
        let mut layer = image_layer(1);
        layer.size = Some(LayerSize::new(10.0, 10.0));
        assert!(layer.apply_patch(&LayerPatch {
            size: Some(None),
            ..LayerPatch::default()
        }));
        assert_eq!(layer.size, None);
    }
}
