use std::env;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use rig_core::load_json_with_comments;
use rig_platform::{PathMapTable, Platform};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

const HAB_PATHS_VAR: &str = "HAB_PATHS";
const DEFAULT_IGNORED_DISTROS: &[&str] = &["release", "pre"];
const DEFAULT_SITE_CACHE_TEMPLATE: &str = "{stem}.cache.json";

/// One site file's contents as written on disk. Every key is optional:
/// a site is built by layering zero or more of these over the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSite {
    #[serde(default)]
    pub config_paths: Vec<String>,
    #[serde(default)]
    pub distro_paths: Vec<String>,
    #[serde(default)]
    pub ignored_distros: Option<Vec<String>>,
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
    #[serde(default)]
    pub prereleases: Option<bool>,
    #[serde(default)]
    pub platform_path_maps: Option<AHashMap<String, AHashMap<String, String>>>,
    #[serde(default)]
    pub site_cache_file_template: Option<String>,
    #[serde(default)]
    pub colorize: Option<bool>,
    #[serde(default)]
    pub prefs_default: Option<String>,
    #[serde(default)]
    pub prefs_uri_timeout: Option<f64>,
    #[serde(default)]
    pub entry_points: Option<AHashMap<String, String>>,
}

/// A fully resolved site: the layered result of every site file an operator
/// pointed `HAB_PATHS` at, plus this crate's defaults for anything no file
/// set.
///
/// Layering is leftmost-wins for scalars (the first file in `paths` that
/// sets a key keeps it) and append-in-order for the two search-path lists,
/// matching the source site loader's "left-most wins" framing while keeping
/// `config_paths`/`distro_paths` a simple concatenation — those are search
/// order lists, not values to merge with unset/set/prepend/append
/// semantics. The full operation-block merge engine (component C) is
/// reserved for environment composition in `rig-forest`; a site file's keys
/// are plain JSON values, not operation blocks.
#[derive(Debug, Clone)]
pub struct Site {
    pub paths: Vec<PathBuf>,
    pub config_paths: Vec<PathBuf>,
    pub distro_paths: Vec<PathBuf>,
    pub ignored_distros: Vec<String>,
    pub platforms: Vec<Platform>,
    pub prereleases: bool,
    pub platform_path_maps: PathMapTable,
    pub site_cache_file_template: String,
    pub colorize: bool,
    pub prefs_default: Option<String>,
    pub prefs_uri_timeout: Option<f64>,
    pub entry_points: AHashMap<String, String>,
}

impl Default for Site {
    fn default() -> Self {
        Site {
            paths: Vec::new(),
            config_paths: Vec::new(),
            distro_paths: Vec::new(),
            ignored_distros: DEFAULT_IGNORED_DISTROS.iter().map(|s| s.to_string()).collect(),
            platforms: vec![Platform::Windows, Platform::Osx, Platform::Linux],
            prereleases: false,
            platform_path_maps: PathMapTable::new(),
            site_cache_file_template: DEFAULT_SITE_CACHE_TEMPLATE.to_string(),
            colorize: false,
            prefs_default: None,
            prefs_uri_timeout: None,
            entry_points: AHashMap::new(),
        }
    }
}

impl Site {
    /// Builds a site from `HAB_PATHS` (a `PATH`-separator delimited list of
    /// site JSON files), the way the source `Site.__init__` falls back to
    /// the environment when no explicit paths are given.
    pub fn from_env() -> Result<Site> {
        let raw = env::var(HAB_PATHS_VAR).map_err(|_| ConfigError::NoSitePaths)?;
        let paths: Vec<PathBuf> = env::split_paths(&raw).collect();
        if paths.is_empty() {
            return Err(ConfigError::NoSitePaths);
        }
        Site::load(&paths)
    }

    /// Loads and layers the given site files in order; `paths[0]` wins any
    /// conflict over scalar keys.
    pub fn load(paths: &[PathBuf]) -> Result<Site> {
        let mut site = Site {
            paths: paths.to_vec(),
            ignored_distros: Vec::new(),
            platforms: Vec::new(),
            ..Site::default()
        };
        let mut ignored_distros_set = false;
        let mut platforms_set = false;
        let mut prereleases_set = false;
        let mut template_set = false;
        let mut colorize_set = false;

        for path in paths {
            if !path.is_file() {
                return Err(ConfigError::NotFound { path: path.clone() });
            }
            let raw: RawSite = load_json_with_comments(path).map_err(ConfigError::Core)?;

            site.config_paths
                .extend(raw.config_paths.iter().map(PathBuf::from));
            site.distro_paths
                .extend(raw.distro_paths.iter().map(PathBuf::from));

            if !ignored_distros_set {
                if let Some(v) = raw.ignored_distros {
                    site.ignored_distros = v;
                    ignored_distros_set = true;
                }
            }
            if !platforms_set {
                if let Some(names) = raw.platforms {
                    site.platforms = names
                        .iter()
                        .filter_map(|n| match Platform::from_name(n) {
                            Some(p) => Some(p),
                            None => {
                                tracing::warn!(platform = %n, "unrecognized platform name in site file, ignoring");
                                None
                            }
                        })
                        .collect();
                    platforms_set = true;
                }
            }
            if !prereleases_set {
                if let Some(v) = raw.prereleases {
                    site.prereleases = v;
                    prereleases_set = true;
                }
            }
            if !template_set {
                if let Some(v) = raw.site_cache_file_template {
                    site.site_cache_file_template = v;
                    template_set = true;
                }
            }
            if !colorize_set {
                if let Some(v) = raw.colorize {
                    site.colorize = v;
                    colorize_set = true;
                }
            }
            if site.prefs_default.is_none() {
                site.prefs_default = raw.prefs_default;
            }
            if site.prefs_uri_timeout.is_none() {
                site.prefs_uri_timeout = raw.prefs_uri_timeout;
            }
            if let Some(maps) = raw.platform_path_maps {
                for (label, per_platform) in maps {
                    for (platform_name, prefix) in per_platform {
                        if let Some(platform) = Platform::from_name(&platform_name) {
                            site.platform_path_maps.insert(label.clone(), platform, prefix);
                        }
                    }
                }
            }
            if let Some(entry_points) = raw.entry_points {
                for (name, target) in entry_points {
                    site.entry_points.entry(name).or_insert(target);
                }
            }
        }

        if !ignored_distros_set {
            site.ignored_distros = DEFAULT_IGNORED_DISTROS.iter().map(|s| s.to_string()).collect();
        }
        if !platforms_set {
            site.platforms = vec![Platform::Windows, Platform::Osx, Platform::Linux];
        }

        Ok(site)
    }

    pub fn is_ignored_distro(&self, dir_name: &str) -> bool {
        self.ignored_distros.iter().any(|d| d == dir_name)
    }

    /// The sibling cache file path for a given site file, per this site's
    /// `site_cache_file_template` (must contain `{stem}`).
    pub fn cache_path_for(&self, site_file: &Path) -> PathBuf {
        let stem = site_file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let name = self.site_cache_file_template.replace("{stem}", stem);
        site_file
            .parent()
            .map(|p| p.join(&name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_site(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn leftmost_file_wins_scalar_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_site(&dir, "a.json", r#"{"colorize": true}"#);
        let b = write_site(&dir, "b.json", r#"{"colorize": false}"#);
        let site = Site::load(&[a, b]).unwrap();
        assert!(site.colorize);
    }

    #[test]
    fn config_paths_are_concatenated_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_site(&dir, "a.json", r#"{"config_paths": ["/a/configs"]}"#);
        let b = write_site(&dir, "b.json", r#"{"config_paths": ["/b/configs"]}"#);
        let site = Site::load(&[a, b]).unwrap();
        assert_eq!(
            site.config_paths,
            vec![PathBuf::from("/a/configs"), PathBuf::from("/b/configs")]
        );
    }

    #[test]
    fn defaults_apply_when_no_file_sets_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_site(&dir, "a.json", r#"{}"#);
        let site = Site::load(&[a]).unwrap();
        assert_eq!(site.ignored_distros, vec!["release".to_string(), "pre".to_string()]);
        assert_eq!(site.platforms.len(), 3);
        assert!(!site.prereleases);
    }

    #[test]
    fn comments_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_site(
            &dir,
            "a.json",
            "{\n  // a comment\n  \"prereleases\": true\n}",
        );
        let site = Site::load(&[a]).unwrap();
        assert!(site.prereleases);
    }

    #[test]
    fn cache_path_uses_template_and_sibling_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_site(&dir, "studio.json", "{}");
        let site = Site::load(&[a.clone()]).unwrap();
        let cache = site.cache_path_for(&a);
        assert_eq!(cache, dir.path().join("studio.cache.json"));
    }
}
