//! Component F's node model: the inheritable unit stored in a forest tree.

use std::path::PathBuf;

use rig_core::{AHashMap, AHashSet, AliasMods, AliasTable, EnvConfig, NotSet, Requirement};
use serde::Deserialize;

/// A config node's JSON body as written on disk. Every field uses `NotSet`
/// so the inheritance walker in `flat.rs` can distinguish "not declared
/// here, fall through to the parent" from "declared null, stop inheriting".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inherits: Option<bool>,
    #[serde(default)]
    pub distros: NotSet<Vec<Requirement>>,
    #[serde(default)]
    pub environment: NotSet<EnvConfig>,
    #[serde(default)]
    pub aliases: NotSet<AliasTable>,
    #[serde(default)]
    pub alias_mods: NotSet<AliasMods>,
    #[serde(default)]
    pub min_verbosity: NotSet<u32>,
    #[serde(default)]
    pub variables: NotSet<AHashMap<String, String>>,
    #[serde(default)]
    pub optional_distros: NotSet<Vec<String>>,
}

/// A loaded config node, attached to exactly one parent in its forest (the
/// tree root has none). Mutated only while loading; read-only once inserted
/// (spec §3's "Lifecycle").
#[derive(Debug, Clone)]
pub struct ConfigNode {
    pub name: String,
    pub context: Vec<String>,
    pub source_root: PathBuf,
    pub inherits: bool,
    pub relative_root: String,
    pub distros: NotSet<Vec<Requirement>>,
    pub environment_config: NotSet<EnvConfig>,
    pub aliases: NotSet<AliasTable>,
    pub alias_mods: NotSet<AliasMods>,
    pub min_verbosity: NotSet<u32>,
    pub variables: NotSet<AHashMap<String, String>>,
    pub optional_distros: NotSet<AHashSet<String>>,
}

impl ConfigNode {
    pub fn from_raw(
        raw: RawConfigDescriptor,
        name: String,
        context: Vec<String>,
        source_root: PathBuf,
        relative_root: String,
    ) -> ConfigNode {
        ConfigNode {
            name,
            context,
            source_root,
            inherits: raw.inherits.unwrap_or(true),
            relative_root,
            distros: raw.distros,
            environment_config: raw.environment,
            aliases: raw.aliases,
            alias_mods: raw.alias_mods,
            min_verbosity: raw.min_verbosity,
            variables: raw.variables,
            optional_distros: match raw.optional_distros {
                NotSet::NotSet => NotSet::NotSet,
                NotSet::Null => NotSet::Null,
                NotSet::Value(names) => NotSet::Value(names.into_iter().collect()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distros_deserializes_from_a_plain_string_array() {
        let raw: RawConfigDescriptor = serde_json::from_str(r#"{"distros": ["maya2020", "aliased", "the_dcc_plugin_b==0.9"]}"#).unwrap();
        let distros = match raw.distros {
            NotSet::Value(v) => v,
            _ => panic!("expected a declared distros list"),
        };
        assert_eq!(distros[0].name, "maya2020");
        assert!(distros[0].spec.is_any());
        assert_eq!(distros[2].name, "the_dcc_plugin_b");
        assert!(!distros[2].spec.is_any());
    }
}
