use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no site file found at {path}")]
    NotFound { path: PathBuf },

    #[error("HAB_PATHS is not set and no explicit site paths were given")]
    NoSitePaths,

    #[error(transparent)]
    Core(#[from] rig_core::Error),
}
