use robot_config::RegistryError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = EngineError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to load episode {}: {reason}", .path.display())]
    EpisodeLoad { path: PathBuf, reason: String },
    #[error("dataset sink error: {0}")]
    Sink(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl EngineError {
    pub(crate) fn load(path: &Path, reason: impl ToString) -> Self {
        Self::EpisodeLoad {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
