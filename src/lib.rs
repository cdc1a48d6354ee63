pub mod adjust;
pub mod assets;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod layer;
pub mod logging;
pub mod notification;
pub mod scene;
pub mod service;

use std::path::Path;

use futures::executor::block_on;

pub use editor::{Editor, EditorError};
pub use error::{AppError, AppResult};

use assets::ExportFormat;
use scene::Scene;

/// Renders a scene file headless and writes the encoded result to `output`.
///
/// `format` overrides the scene's own export setting, which in turn overrides
/// the configured default.
pub fn render_scene(
    scene_path: &Path,
    output: &Path,
    format: Option<ExportFormat>,
) -> AppResult<()> {
    let config = config::load_config();
    let scene = Scene::load(scene_path)?;
    let format = format.or(scene.export).unwrap_or(config.export);
    let root = scene_path.parent().unwrap_or_else(|| Path::new("."));

    let mut editor = Editor::from_config(config);
    block_on(scene.apply(&mut editor, root))?;
    let bytes = block_on(editor.export(format))?;
    std::fs::write(output, &bytes).map_err(|source| AppError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    tracing::info!(
        scene = %scene_path.display(),
        output = %output.display(),
        layers = editor.layers().map_or(0, |layers| layers.len()),
        "scene rendered"
    );
    Ok(())
}
