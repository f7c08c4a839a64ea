use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The aggregate error type for the `rig` workspace. Every crate-local error
/// enum converts into this one via `#[from]` so callers at the edges (the
/// CLI, tests) only need to match on one type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{context}/{name} is already defined by {first_root}; ignoring redefinition from {second_root}")]
    DuplicateDefinition {
        context: String,
        name: String,
        first_root: PathBuf,
        second_root: PathBuf,
    },

    #[error("no distro family named '{name}'")]
    InvalidRequirementNoFamily { name: String },

    #[error("no version of '{name}' matches {requirement}")]
    InvalidRequirementNoMatch { name: String, requirement: String },

    #[error("solver exceeded its redirect budget of {max_redirects}")]
    MaxRedirectsExceeded { max_redirects: u32 },

    #[error("could not determine a version for distro at {path}")]
    InvalidVersion { path: PathBuf },

    #[error("directory {path} is in the ignored list, skipping")]
    IgnoredVersion { path: PathBuf },

    #[error("no alias named '{name}' in this configuration")]
    InvalidAlias { name: String },

    #[error("'{name}' is a reserved variable name and cannot be declared")]
    ReservedVariableName { name: String },

    #[error("environment rule violation: {reason}")]
    EnvironmentRuleViolation { reason: String },

    #[error("installation destination already exists: {path}")]
    InstallDestinationExists { path: PathBuf },

    #[error("could not decode frozen configuration: {reason}")]
    FreezeDecode { reason: String },

    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    External(String),
}
