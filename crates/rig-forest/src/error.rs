pub use rig_core::{Error, Result};

pub(crate) fn from_config(e: rig_config::ConfigError) -> Error {
    match e {
        rig_config::ConfigError::Core(core) => core,
        other => Error::External(other.to_string()),
    }
}

pub(crate) fn from_finder(e: rig_finder::FinderError) -> Error {
    match e {
        rig_finder::FinderError::Core(core) => core,
        other => Error::External(other.to_string()),
    }
}
