//! Site descriptor loading and validation. A site is the set of JSON files
//! an operator points `HAB_PATHS` (or an explicit path list) at; it
//! declares where config and distro descriptors live and the handful of
//! resolver-wide knobs listed in this crate's `Site`.

mod error;
mod site;

pub use error::{ConfigError, Result};
pub use site::{RawSite, Site};
