//! Component J: turns a resolved `FlatConfig` into the shell scripts a
//! site's users actually source or execute.

mod emitter;
mod escape;

pub use emitter::{config_script, launch_script, write_scripts};
pub use escape::{escape_value, join_args};
