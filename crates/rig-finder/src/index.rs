use std::path::{Path, PathBuf};

use rig_core::AHashMap;
use rig_platform::{PathMapTable, Platform};
use serde::{Deserialize, Serialize};

use crate::distro::DistroDescriptor;
use crate::error::{FinderError, Result};

pub const SUPPORTED_VERSION: u32 = 1;

/// A single descriptor record as persisted in the index cache: enough to
/// reconstruct a `DistroLocation` and its parsed descriptor without a
/// filesystem walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub descriptor: DistroDescriptor,
}

/// The on-disk structure of one site file's cache (component E). Keyed by
/// a root directory (posix-style, platform-path-mapped so the same cache
/// file is usable from more than one platform), then by descriptor path
/// beneath that root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexCache {
    pub version: u32,
    #[serde(default)]
    pub config_paths: AHashMap<String, AHashMap<String, CacheRecord>>,
    #[serde(default)]
    pub distro_paths: AHashMap<String, AHashMap<String, CacheRecord>>,
}

impl IndexCache {
    pub fn new() -> Self {
        IndexCache {
            version: SUPPORTED_VERSION,
            config_paths: AHashMap::new(),
            distro_paths: AHashMap::new(),
        }
    }

    /// Loads a cache file, translating its platform-agnostic directory
    /// tokens back into paths for `current_platform` via `path_maps`. A
    /// cache whose `version` exceeds what this crate supports is ignored
    /// with a warning rather than treated as an error — the spec requires
    /// caches to be strictly optional.
    pub fn load(path: &Path, path_maps: &PathMapTable, current_platform: Platform) -> Result<Option<IndexCache>> {
        if !path.is_file() {
            return Ok(None);
        }
        let raw: IndexCache = rig_core::load_json_with_comments(path).map_err(FinderError::Core)?;
        if raw.version > SUPPORTED_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = raw.version,
                supported = SUPPORTED_VERSION,
                "ignoring index cache with unsupported version"
            );
            return Ok(None);
        }
        let translate = |dir: &str| -> String {
            for source_platform in [Platform::Windows, Platform::Osx, Platform::Linux] {
                if source_platform == current_platform {
                    continue;
                }
                if let Some(translated) = path_maps.translate(dir, source_platform, current_platform) {
                    return translated;
                }
            }
            dir.to_string()
        };
        let retoken = |map: AHashMap<String, AHashMap<String, CacheRecord>>| {
            map.into_iter().map(|(dir, entries)| (translate(&dir), entries)).collect()
        };
        Ok(Some(IndexCache {
            version: raw.version,
            config_paths: retoken(raw.config_paths),
            distro_paths: retoken(raw.distro_paths),
        }))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            FinderError::Core(rig_core::Error::Json {
                path: path.to_path_buf(),
                source,
            })
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// A flattened, dir-less view of every site's caches layered right-to-left
/// so the left-most site's entries win on a duplicate directory key.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    configs: AHashMap<String, CacheRecord>,
    distros: AHashMap<String, CacheRecord>,
}

impl FlatIndex {
    /// `site_cache_paths` must be given in the site's own left-to-right
    /// precedence order; this function applies them right-to-left so the
    /// first (left-most) site's entries end up winning.
    pub fn build(
        site_cache_paths: &[PathBuf],
        path_maps: &PathMapTable,
        current_platform: Platform,
    ) -> Result<FlatIndex> {
        let mut flat = FlatIndex::default();
        for path in site_cache_paths.iter().rev() {
            let Some(cache) = IndexCache::load(path, path_maps, current_platform)? else {
                continue;
            };
            for (_dir, entries) in cache.config_paths {
                for (descriptor_path, record) in entries {
                    flat.configs.insert(descriptor_path, record);
                }
            }
            for (_dir, entries) in cache.distro_paths {
                for (descriptor_path, record) in entries {
                    flat.distros.insert(descriptor_path, record);
                }
            }
        }
        Ok(flat)
    }

    pub fn config(&self, descriptor_path: &str) -> Option<&CacheRecord> {
        self.configs.get(descriptor_path)
    }

    pub fn distro(&self, descriptor_path: &str) -> Option<&CacheRecord> {
        self.distros.get(descriptor_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_is_ignored_not_errored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.cache.json");
        std::fs::write(&path, r#"{"version": 99}"#).unwrap();
        let result = IndexCache::load(&path, &PathMapTable::new(), Platform::Linux).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_cache_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.cache.json");
        let result = IndexCache::load(&path, &PathMapTable::new(), Platform::Linux).unwrap();
        assert!(result.is_none());
    }
}
