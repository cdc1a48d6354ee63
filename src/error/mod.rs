use thiserror::Error;

use crate::assets::{DecodeError, EncodeError};
use crate::config::ConfigPathError;
use crate::editor::EditorError;
use crate::scene::SceneError;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    ConfigPath(#[from] ConfigPathError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
