//! Components D and E: pluggable distro finders and the on-disk index
//! cache that lets a resolver skip live filesystem enumeration.

mod distro;
mod error;
mod finder;
mod index;

pub use distro::{DistroDescriptor, DistroFamily, DistroForest, DistroVersion};
pub use error::{FinderError, Result};
pub use finder::{
    resolve_version, ArchiveInlineFinder, ArchiveSidecarFinder, DirectoryFinder, DistroFinder,
    DistroLocation, RemoteObjectStoreFinder, VersionOutcome,
};
pub use index::{CacheRecord, FlatIndex, IndexCache, SUPPORTED_VERSION};
