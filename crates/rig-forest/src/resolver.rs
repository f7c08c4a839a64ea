//! Component H: the composition root. Loads a site's config and distro
//! trees once, then serves `resolve(uri)` against the in-memory forests.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rig_config::Site;
use rig_core::{AHashMap, Result, Uri};
use rig_finder::{resolve_version, DirectoryFinder, DistroFinder, DistroForest, DistroVersion, VersionOutcome};
use rig_platform::Platform;

use crate::error::from_finder;
use crate::flat::{build_flat_config, FlatConfig};
use crate::forest::Forest;
use crate::node::{ConfigNode, RawConfigDescriptor};

const CONFIG_DESCRIPTOR_FILENAME: &str = "config.json";

thread_local! {
    static REGISTRY: RefCell<AHashMap<String, Rc<Resolver>>> = RefCell::new(AHashMap::new());
}

/// Walks every `config_paths` root, treating each directory holding a
/// `config.json` as one forest node; directories with no descriptor of
/// their own still get walked (and register as forest placeholders via
/// `Forest::insert`) so a deeper node's context chain stays intact.
pub fn load_forest(config_paths: &[PathBuf]) -> Result<Forest> {
    let mut forest = Forest::new();
    for root in config_paths {
        if root.is_dir() {
            walk_config_dir(root, root, &[], &mut forest)?;
        }
    }
    Ok(forest)
}

fn walk_config_dir(site_root: &Path, dir: &Path, context: &[String], forest: &mut Forest) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let child_dir = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let descriptor_path = child_dir.join(CONFIG_DESCRIPTOR_FILENAME);
        if descriptor_path.is_file() {
            let raw: RawConfigDescriptor = rig_core::load_json_with_comments(&descriptor_path)?;
            let relative_root = child_dir.to_string_lossy().into_owned();
            let node = ConfigNode::from_raw(raw, name.clone(), context.to_vec(), site_root.to_path_buf(), relative_root);
            forest.insert(context, &name, node, site_root)?;
        }
        let mut child_context = context.to_vec();
        child_context.push(name);
        walk_config_dir(site_root, &child_dir, &child_context, forest)?;
    }
    Ok(())
}

/// Enumerates every `distro_paths` root with a plain directory finder
/// (component D's default variant) and builds the distro forest used by
/// the solver. A distro whose version can't be determined is skipped with
/// a warning rather than failing the whole load (spec §7's propagation
/// policy: loader errors are caught per-descriptor).
pub fn load_distro_forest(distro_paths: &[PathBuf], ignored_distros: &[String]) -> Result<DistroForest> {
    let mut forest = DistroForest::new();
    for root in distro_paths {
        let finder: Rc<dyn DistroFinder> = Rc::new(DirectoryFinder::new(root.clone()));
        let locations = finder.enumerate().map_err(from_finder)?;
        for location in locations {
            let content_dir = finder.content(&location);
            let descriptor = match finder.load_descriptor(&location.path) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(path = %location.path.display(), error = %e, "skipping unreadable distro descriptor");
                    continue;
                }
            };
            match resolve_version(descriptor.version.as_deref(), &content_dir, ignored_distros) {
                VersionOutcome::Found(version) => {
                    let name = descriptor.name.clone().unwrap_or_else(|| {
                        content_dir
                            .parent()
                            .and_then(|p| p.file_name())
                            .and_then(|n| n.to_str())
                            .unwrap_or_default()
                            .to_string()
                    });
                    forest.insert(DistroVersion::new(name, version, location.path.clone(), Rc::clone(&finder)));
                }
                VersionOutcome::Ignored => {
                    tracing::debug!(path = %content_dir.display(), "distro directory is on the ignore list");
                }
                VersionOutcome::Invalid => {
                    tracing::warn!(path = %content_dir.display(), "could not determine a version for this distro, skipping");
                }
            }
        }
    }
    Ok(forest)
}

/// One loaded site's config forest, distro forest, and the knobs (platform
/// list, prerelease default) `resolve` needs. Not `Sync`/`Send`: the core
/// is single-threaded cooperative (spec §5).
pub struct Resolver {
    pub site: Site,
    pub forest: Forest,
    pub distro_forest: DistroForest,
    pub current_platform: Platform,
}

impl Resolver {
    pub fn new(site: Site) -> Result<Resolver> {
        let forest = load_forest(&site.config_paths)?;
        let distro_forest = load_distro_forest(&site.distro_paths, &site.ignored_distros)?;
        Ok(Resolver {
            site,
            forest,
            distro_forest,
            current_platform: Platform::current(),
        })
    }

    /// The process-wide named-instance registry (spec §5): the first call
    /// for a given `name` builds the resolver from `build_site`; later calls
    /// return the existing instance and ignore `build_site` entirely.
    pub fn named(name: &str, build_site: impl FnOnce() -> Result<Site>) -> Result<Rc<Resolver>> {
        if let Some(existing) = REGISTRY.with(|registry| registry.borrow().get(name).cloned()) {
            return Ok(existing);
        }
        let resolver = Rc::new(Resolver::new(build_site()?)?);
        REGISTRY.with(|registry| registry.borrow_mut().insert(name.to_string(), Rc::clone(&resolver)));
        Ok(resolver)
    }

    /// Drops every entry from the named-instance registry. Distinct from a
    /// single resolver's own cache state (this crate holds no persistent
    /// index-cache handle to release; `rig-finder`'s `IndexCache` is loaded
    /// fresh per `Resolver::new`).
    pub fn clear_registry() {
        REGISTRY.with(|registry| registry.borrow_mut().clear());
    }

    /// Resolves a URI string into a flat configuration. URI validators
    /// (spec §4.8's "any registered URI validators") are not implemented —
    /// the `entry_points` site key that would name them is recorded on
    /// `Site` but not invoked, matching SPEC_FULL's non-goal on dynamic
    /// plugin loading.
    pub fn resolve(&self, uri_str: &str) -> Result<FlatConfig> {
        let uri = Uri::parse(uri_str)?;
        build_flat_config(
            &self.forest,
            &self.distro_forest,
            &self.site.platforms,
            self.current_platform.name(),
            self.site.prereleases,
            &uri,
        )
    }

    pub fn dump_forest(&self) -> String {
        self.forest.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_a_simple_config_tree_and_resolves_a_uri() {
        let dir = tempfile::tempdir().unwrap();
        let config_root = dir.path().join("configs");
        write_file(&config_root.join("default").join(CONFIG_DESCRIPTOR_FILENAME), r#"{"variables": {"tool": "maya"}}"#);

        let mut site = Site::default();
        site.config_paths = vec![config_root];
        site.distro_paths = vec![];

        let resolver = Resolver::new(site).unwrap();
        let config = resolver.resolve("default").unwrap();
        assert_eq!(config.variables["tool"], "maya");
    }

    #[test]
    fn named_registry_returns_the_same_instance() {
        Resolver::clear_registry();
        let dir = tempfile::tempdir().unwrap();
        let config_root = dir.path().join("configs");
        write_file(&config_root.join("default").join(CONFIG_DESCRIPTOR_FILENAME), "{}");

        let mut site = Site::default();
        site.config_paths = vec![config_root];

        let first = Resolver::named("studio", || Ok(site)).unwrap();
        let second = Resolver::named("studio", || panic!("should not rebuild")).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        Resolver::clear_registry();
    }
}
