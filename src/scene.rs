//! JSON scene files for headless rendering.
//!
//! A scene names a base image and the layers stacked over it. Relative image
//! paths resolve against the scene file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::assets::{AssetRef, ExportFormat};
use crate::editor::{Editor, EditorError};
use crate::geometry::Color;
use crate::layer::{LayerId, LayerPatch, LayerSize, TextPatch};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid color {0:?}")]
    Color(String),
    #[error(transparent)]
    Editor(#[from] EditorError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub base: PathBuf,
    #[serde(default)]
    pub layers: Vec<SceneLayer>,
    #[serde(default)]
    pub export: Option<ExportFormat>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneLayer {
    Image {
        path: PathBuf,
        #[serde(flatten)]
        placement: ScenePlacement,
        #[serde(default)]
        width: Option<f32>,
        #[serde(default)]
        height: Option<f32>,
    },
    Text {
        text: String,
        #[serde(flatten)]
        placement: ScenePlacement,
        #[serde(default)]
        font_size: Option<f32>,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        font_family: Option<String>,
        #[serde(default)]
        font_weight: Option<u16>,
    },
}

/// Fields shared by every scene layer. Unset fields keep the editor's defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScenePlacement {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub opacity: Option<u8>,
    #[serde(default)]
    pub visible: Option<bool>,
}

impl ScenePlacement {
    fn patch(&self) -> LayerPatch {
        LayerPatch {
            name: self.name.clone(),
            visible: self.visible,
            opacity: self.opacity,
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale: self.scale,
            ..LayerPatch::default()
        }
    }
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let raw = fs::read_to_string(path).map_err(|source| SceneError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Opens the base image in `editor` and stacks every scene layer over it.
    pub async fn apply(&self, editor: &mut Editor, root: &Path) -> Result<(), SceneError> {
        editor.load_base_asset(read_asset(root, &self.base)?).await?;
        for layer in &self.layers {
            let id = add_layer(editor, root, layer).await?;
            tracing::debug!(layer = %id, "scene layer added");
        }
        editor.select_layer(None)?;
        Ok(())
    }
}

async fn add_layer(
    editor: &mut Editor,
    root: &Path,
    layer: &SceneLayer,
) -> Result<LayerId, SceneError> {
    match layer {
        SceneLayer::Image {
            path,
            placement,
            width,
            height,
        } => {
            let asset = read_asset(root, path)?;
            let id = editor.add_image_layer(asset.bytes().to_vec()).await?;
            let mut patch = placement.patch();
            if let (Some(width), Some(height)) = (width, height) {
                patch.size = Some(Some(LayerSize::new(*width, *height)));
            }
            editor.update_layer(id, &patch).await?;
            Ok(id)
        }
        SceneLayer::Text {
            text,
            placement,
            font_size,
            color,
            font_family,
            font_weight,
        } => {
            let id = editor.add_text_layer(text).await?;
            let color = color
                .as_deref()
                .map(|value| {
                    Color::parse_hex(value).ok_or_else(|| SceneError::Color(value.to_string()))
                })
                .transpose()?;
            let mut patch = placement.patch();
            patch.text = Some(TextPatch {
                font_size: *font_size,
                color,
                font_family: font_family.clone(),
                font_weight: *font_weight,
                ..TextPatch::default()
            });
            editor.update_layer(id, &patch).await?;
            Ok(id)
        }
    }
}

fn read_asset(root: &Path, path: &Path) -> Result<AssetRef, SceneError> {
    let full = root.join(path);
    let bytes = fs::read(&full).map_err(|source| SceneError::Read { path: full, source })?;
    Ok(AssetRef::from_bytes(bytes))
}
