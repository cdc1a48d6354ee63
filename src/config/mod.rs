use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::assets::ExportFormat;
use crate::compositor::{RenderLimits, DEFAULT_MAX_CANVAS_PIXELS};
use crate::geometry::Color;
use crate::layer::TextContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigPathError {
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    MissingHomeDirectory,
}

const APP_DIR: &str = "stackpaint";
const APP_CONFIG_FILE: &str = "config.json";

/// Settings read from `config.json`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub brush: BrushConfig,
    pub text: TextDefaults,
    pub fonts: Vec<FontFaceConfig>,
    pub view: ViewConfig,
    pub render: RenderConfig,
    pub export: ExportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub color: Color,
    /// Stroke diameter in native canvas pixels.
    pub size: f32,
    /// Opacity of the committed drawing layer, 0..=100.
    pub opacity: u8,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            color: Color::rgb(0xff, 0x3b, 0x30),
            size: 8.0,
            opacity: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub font_size: f32,
    pub color: Color,
    pub font_family: String,
    pub font_weight: u16,
}

impl Default for TextDefaults {
    fn default() -> Self {
        let content = TextContent::new("");
        Self {
            font_size: content.font_size,
            color: content.color,
            font_family: content.font_family,
            font_weight: content.font_weight,
        }
    }
}

impl TextDefaults {
    pub fn content(&self, text: impl Into<String>) -> TextContent {
        TextContent {
            text: text.into(),
            font_size: self.font_size,
            color: self.color,
            font_family: self.font_family.clone(),
            font_weight: self.font_weight,
        }
    }
}

/// A font file registered under a family name and weight.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FontFaceConfig {
    pub family: String,
    #[serde(default = "default_font_weight")]
    pub weight: u16,
    pub path: PathBuf,
}

fn default_font_weight() -> u16 {
    400
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub zoom_step: f32,
    /// Screen pixels per arrow key press at zoom 1.
    pub pan_step: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_step: 0.25,
            pan_step: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub max_canvas_pixels: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

impl RenderConfig {
    pub const fn limits(&self) -> RenderLimits {
        RenderLimits {
            max_canvas_pixels: self.max_canvas_pixels,
        }
    }
}

pub fn load_config() -> EditorConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> EditorConfig {
    match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(path) => load_config_from(&path),
        Err(err) => {
            tracing::debug!(%err, "no config directory; using defaults");
            EditorConfig::default()
        }
    }
}

/// Reads `path`, falling back to defaults when it is missing or invalid.
pub fn load_config_from(path: &Path) -> EditorConfig {
    if !path.exists() {
        return EditorConfig::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            EditorConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            EditorConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "stackpaint",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/stackpaint/config.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("stackpaint", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/stackpaint/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("stackpaint", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app_dir = dir.path().join(APP_DIR);
        std::fs::create_dir_all(&app_dir).expect("mkdir");
        std::fs::write(
            app_dir.join(APP_CONFIG_FILE),
            r##"{
                "brush": { "color": "#00ff00", "size": 12 },
                "fonts": [{ "family": "Inter", "path": "/fonts/Inter.ttf" }],
                "export": { "format": "jpeg", "quality": 85 }
            }"##,
        )
        .expect("write config");

        let config = load_config_with(Some(dir.path()), None);
        assert_eq!(config.brush.color, Color::rgb(0, 255, 0));
        assert_eq!(config.brush.size, 12.0);
        assert_eq!(config.brush.opacity, 100);
        assert_eq!(config.fonts[0].weight, 400);
        assert_eq!(config.export, ExportFormat::Jpeg { quality: 85 });
        assert_eq!(config.view, ViewConfig::default());
        assert_eq!(config.render.limits().max_canvas_pixels, DEFAULT_MAX_CANVAS_PIXELS);
    }

    #[test]
    fn malformed_or_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_config_with(Some(dir.path()), None), EditorConfig::default());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert_eq!(load_config_from(&path), EditorConfig::default());
    }

    #[test]
    fn text_defaults_build_text_content() {
        let defaults = TextDefaults {
            font_size: 18.0,
            ..TextDefaults::default()
        };
        let content = defaults.content("hello");
        assert_eq!(content.text, "hello");
        assert_eq!(content.font_size, 18.0);
        assert_eq!(content.font_weight, 400);
    }
}
