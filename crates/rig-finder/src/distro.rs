use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use rig_core::{AliasMods, AliasTable, EnvConfig, Requirement};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::finder::DistroFinder;

/// A distro descriptor as read from disk: the JSON body of a directory
/// finder's `descriptor.json` or an archive's inline/sidecar descriptor
/// file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DistroDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub distros: Vec<Requirement>,
    #[serde(default)]
    pub environment: Option<EnvConfig>,
    #[serde(default)]
    pub aliases: Option<AliasTable>,
    #[serde(default)]
    pub alias_mods: Option<AliasMods>,
}

/// A distro version that defers parsing its descriptor until something
/// beyond `name`/`version` is needed, so the solver can match requirements
/// against many versions of a family without touching disk for each one.
#[derive(Debug, Clone)]
pub struct DistroVersion {
    pub name: String,
    pub version: Version,
    pub location: PathBuf,
    finder: Rc<dyn DistroFinder>,
    descriptor: RefCell<Option<Rc<DistroDescriptor>>>,
}

impl DistroVersion {
    pub fn new(name: String, version: Version, location: PathBuf, finder: Rc<dyn DistroFinder>) -> Self {
        DistroVersion {
            name,
            version,
            location,
            finder,
            descriptor: RefCell::new(None),
        }
    }

    /// Loads (once) and returns the parsed descriptor for this version.
    pub fn descriptor(&self) -> Result<Rc<DistroDescriptor>> {
        if let Some(existing) = self.descriptor.borrow().as_ref() {
            return Ok(Rc::clone(existing));
        }
        let loaded = Rc::new(self.finder.load_descriptor(&self.location)?);
        *self.descriptor.borrow_mut() = Some(Rc::clone(&loaded));
        Ok(loaded)
    }

    pub fn requirements(&self) -> Result<Vec<Requirement>> {
        Ok(self.descriptor()?.distros.clone())
    }
}

/// All known versions of a single distro name.
#[derive(Debug, Clone, Default)]
pub struct DistroFamily {
    pub name: String,
    pub versions: Vec<DistroVersion>,
}

impl DistroFamily {
    /// The maximum version matching `spec`, honoring `allow_prereleases`.
    pub fn latest_version(
        &self,
        spec: &rig_core::RequirementSpec,
        allow_prereleases: bool,
    ) -> Option<&DistroVersion> {
        self.versions
            .iter()
            .filter(|v| spec.matches(&v.version, allow_prereleases))
            .max_by(|a, b| a.version.cmp(&b.version))
    }
}

/// The set of distro families discovered across every configured finder.
#[derive(Debug, Clone, Default)]
pub struct DistroForest {
    pub families: rig_core::AHashMap<String, DistroFamily>,
}

impl DistroForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, version: DistroVersion) {
        self.families
            .entry(version.name.clone())
            .or_insert_with(|| DistroFamily {
                name: version.name.clone(),
                versions: Vec::new(),
            })
            .versions
            .push(version);
    }

    pub fn family(&self, name: &str) -> Option<&DistroFamily> {
        self.families.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_distros_deserializes_from_a_plain_string_array() {
        let descriptor: DistroDescriptor = serde_json::from_str(r#"{"name": "the_dcc", "distros": ["the_dcc_plugin_a", "the_dcc_plugin_b==0.9"]}"#).unwrap();
        assert_eq!(descriptor.distros[0].name, "the_dcc_plugin_a");
        assert!(descriptor.distros[0].spec.is_any());
        assert_eq!(descriptor.distros[1].name, "the_dcc_plugin_b");
        assert!(!descriptor.distros[1].spec.is_any());
    }
}
