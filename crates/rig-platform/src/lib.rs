//! Component A: platform identification, path separators, and translation
//! of paths between platforms via a site's "platform path map" table.

mod pathmap;
mod platform;
mod shell;

pub use pathmap::PathMapTable;
pub use platform::{path_forward_slash, Platform};
pub use shell::{path_separator, ShellKind};
