use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinderError>;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("could not determine a version for distro at {path}")]
    InvalidVersion { path: PathBuf },

    #[error("installation destination already exists: {path}")]
    InstallDestinationExists { path: PathBuf },

    #[error("archive member '{member}' not found in {archive}")]
    MissingArchiveMember { archive: PathBuf, member: String },

    #[error("request to {url} failed: {message}")]
    Remote { url: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Core(#[from] rig_core::Error),
}
