//! Shared types used across the `rig` workspace: the error enum, the `Uri`
//! newtype, the `NotSet` sentinel distinguishing "absent" from "explicitly
//! null", and the requirement/version algebra used by the solver.

mod descriptor;
mod error;
mod json;
mod notset;
mod requirement;
mod uri;

pub use descriptor::{AliasMods, AliasTable, AliasValue, EnvConfig, EnvOps};
pub use error::{Error, Result};
pub use json::load_json_with_comments;
pub use notset::NotSet;
pub use requirement::{Requirement, RequirementSpec};
pub use uri::{Uri, DEFAULT_ROOT};

pub use ahash::{AHashMap, AHashSet};
