//! Components B, C, F, I, K, and the composition root (H): value
//! formatting, environment merge, the config-node forest, flat
//! configuration assembly, the freeze codec, and `Resolver`.

mod environment;
mod error;
mod flat;
mod forest;
mod freeze;
mod node;
mod resolver;

pub use environment::{format_value, validate_variables, EnvState, EnvValue, FormatContext, RESERVED_VARIABLE_NAMES};
pub use flat::{AliasScript, FlatConfig};
pub use forest::{ClosestMatch, Forest};
pub use freeze::{decode, encode, FrozenAlias, FrozenConfig};
pub use node::{ConfigNode, RawConfigDescriptor};
pub use resolver::{load_distro_forest, load_forest, Resolver};
