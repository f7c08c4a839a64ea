//! Component I: flattening a forest node plus its solved distros into one
//! concrete configuration ready for script emission.

use std::path::Path;

use rig_core::{AHashMap, AHashSet, AliasTable, EnvOps, Error, Requirement, Result, Uri, DEFAULT_ROOT};
use rig_finder::{DistroForest, DistroVersion};
use rig_platform::Platform;
use rig_solver::Solver;

use crate::environment::{format_value, validate_variables, EnvState, FormatContext};
use crate::error::from_finder;
use crate::forest::{ClosestMatch, Forest};
use crate::node::ConfigNode;

const HAB_URI_VAR: &str = "HAB_URI";

/// One composed alias: its command (still possibly containing unformatted
/// `{key}` templates the script emitter resolves against the flat
/// configuration's variables) plus the environment it carries as an overlay.
#[derive(Debug, Clone)]
pub struct AliasScript {
    pub cmd: serde_json::Value,
    pub environment: AHashMap<String, Option<Vec<String>>>,
}

/// The fully flattened result of resolving one URI (component I).
#[derive(Debug, Clone)]
pub struct FlatConfig {
    pub uri: Uri,
    pub name: String,
    pub distros: AHashMap<String, DistroVersion>,
    pub distro_order: Vec<String>,
    pub environment: AHashMap<String, Option<Vec<String>>>,
    pub aliases: AHashMap<Platform, AHashMap<String, AliasScript>>,
    pub variables: AHashMap<String, String>,
    pub min_verbosity: u32,
}

/// The ordered sequence of nodes consulted for a single-value property walk
/// (declaration order wins): the origin node, its real ancestors, and — once,
/// only if the chain runs out without an `inherits=false` node stopping it —
/// the corresponding chain under the `default` tree (spec §4.8).
fn candidate_chain<'a>(forest: &'a Forest, closest: &ClosestMatch) -> Vec<&'a ConfigNode> {
    let mut chain = Vec::new();
    let mut stopped = false;
    for node in forest.ancestors(&closest.tree_root, &closest.matched_segments) {
        let keep_climbing = node.inherits;
        chain.push(node);
        if !keep_climbing {
            stopped = true;
            break;
        }
    }
    if !stopped && closest.tree_root != DEFAULT_ROOT {
        if let Some(default_closest) = forest.closest_in_default(&closest.matched_segments[1..]) {
            for node in forest.ancestors(&default_closest.tree_root, &default_closest.matched_segments) {
                let keep_climbing = node.inherits;
                chain.push(node);
                if !keep_climbing {
                    break;
                }
            }
        }
    }
    chain
}

fn first_value<'a, T>(chain: &[&'a ConfigNode], pick: impl Fn(&'a ConfigNode) -> &'a rig_core::NotSet<T>) -> Option<&'a T> {
    for node in chain {
        match pick(node) {
            rig_core::NotSet::Value(v) => return Some(v),
            rig_core::NotSet::Null => return None,
            rig_core::NotSet::NotSet => continue,
        }
    }
    None
}

fn blocks_for<'a, T>(mods: &'a AHashMap<String, Vec<T>>, platform_name: &str) -> Vec<&'a T> {
    let mut out = Vec::new();
    if let Some(wildcard) = mods.get("*") {
        out.extend(wildcard.iter());
    }
    if let Some(specific) = mods.get(platform_name) {
        out.extend(specific.iter());
    }
    out
}

/// Builds the flat configuration for `uri` (spec §4.8).
pub fn build_flat_config(
    forest: &Forest,
    distro_forest: &DistroForest,
    platforms: &[Platform],
    current_platform: &str,
    allow_prereleases: bool,
    uri: &Uri,
) -> Result<FlatConfig> {
    let closest = forest.closest(uri).ok_or_else(|| Error::InvalidUri {
        uri: uri.to_string(),
        reason: "no forest tree matches this URI and no 'default' tree exists".to_string(),
    })?;
    let chain = candidate_chain(forest, &closest);
    let origin = *chain.first().ok_or_else(|| Error::InvalidUri {
        uri: uri.to_string(),
        reason: "closest match resolved to an empty node chain".to_string(),
    })?;

    let variables: AHashMap<String, String> = first_value(&chain, |n| &n.variables).cloned().unwrap_or_default();
    validate_variables(&variables)?;

    let min_verbosity = first_value(&chain, |n| &n.min_verbosity).copied().unwrap_or(0);

    let omittable: AHashSet<String> = first_value(&chain, |n| &n.optional_distros).cloned().unwrap_or_default();

    let distro_requirements: Vec<Requirement> = first_value(&chain, |n| &n.distros).cloned().unwrap_or_default();

    let node_aliases: AliasTable = first_value(&chain, |n| &n.aliases).cloned().unwrap_or_default();

    let node_alias_mods = first_value(&chain, |n| &n.alias_mods).cloned().unwrap_or_default();

    // Environment composes across the *entire* chain, ancestor before child
    // (§5's ordering guarantee), unlike the single-value properties above.
    let mut env_state = EnvState::new();
    for node in chain.iter().rev() {
        let env_config = match &node.environment_config {
            rig_core::NotSet::Value(cfg) => cfg,
            _ => continue,
        };
        let ctx = FormatContext::new(&variables, &node.relative_root);
        for ops in env_config.blocks_for(current_platform) {
            env_state.apply_ops(ops, &ctx)?;
        }
    }

    let solver = Solver::new(distro_forest, distro_requirements, current_platform).with_omittable(omittable).with_prereleases(allow_prereleases);
    let solved = solver.resolve()?;

    for name in &solved.order {
        let version = &solved.resolved[name];
        let descriptor = version.descriptor().map_err(from_finder)?;
        if let Some(env_config) = &descriptor.environment {
            let relative_root = version.location.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
            let ctx = FormatContext::new(&variables, &relative_root);
            for ops in env_config.blocks_for(current_platform) {
                env_state.apply_ops(ops, &ctx)?;
            }
        }
    }

    env_state.seed(HAB_URI_VAR, Some(vec![uri.to_string()]));
    let environment = env_state.into_map();

    let mut aliases = AHashMap::new();
    for &platform in platforms {
        let table = compose_platform_aliases(
            platform,
            &node_aliases,
            &node_alias_mods,
            &origin.relative_root,
            &solved.order,
            &solved.resolved,
            &variables,
            &environment,
        )?;
        aliases.insert(platform, table);
    }

    Ok(FlatConfig {
        uri: uri.clone(),
        name: origin.name.clone(),
        distros: solved.resolved,
        distro_order: solved.order,
        environment,
        aliases,
        variables,
        min_verbosity,
    })
}

/// Builds one platform's alias table: the node's own aliases first (local
/// scope takes priority), then each solved distro's aliases in dependency
/// order; a name already claimed is skipped with a warning (spec §8
/// scenario "duplicate alias on same platform").
fn compose_platform_aliases(
    platform: Platform,
    node_aliases: &AliasTable,
    node_alias_mods: &rig_core::AliasMods,
    node_relative_root: &str,
    distro_order: &[String],
    distros: &AHashMap<String, DistroVersion>,
    variables: &AHashMap<String, String>,
    global_env: &AHashMap<String, Option<Vec<String>>>,
) -> Result<AHashMap<String, AliasScript>> {
    let platform_name = platform.name();

    struct Source<'a> {
        entries: Vec<&'a (String, rig_core::AliasValue)>,
        relative_root: String,
    }

    let mut sources: Vec<Source> = Vec::new();
    sources.push(Source {
        entries: blocks_for(node_aliases, platform_name),
        relative_root: node_relative_root.to_string(),
    });

    let mut distro_descriptors = Vec::new();
    for name in distro_order {
        let version = &distros[name];
        let descriptor = version.descriptor().map_err(from_finder)?;
        distro_descriptors.push((name.clone(), descriptor));
    }
    for (_name, descriptor) in &distro_descriptors {
        if let Some(table) = &descriptor.aliases {
            sources.push(Source {
                entries: blocks_for(table, platform_name),
                relative_root: String::new(),
            });
        } else {
            sources.push(Source {
                entries: Vec::new(),
                relative_root: String::new(),
            });
        }
    }

    // Accumulate every alias_mod (node-level first, then each distro's, in
    // dependency order) keyed by the alias name it targets.
    let mut mods_by_alias: AHashMap<String, Vec<(EnvOps, String)>> = AHashMap::new();
    for (name, ops) in blocks_for(node_alias_mods, platform_name) {
        mods_by_alias.entry(name.clone()).or_default().push((ops.clone(), node_relative_root.to_string()));
    }
    for (_name, descriptor) in &distro_descriptors {
        if let Some(mods) = &descriptor.alias_mods {
            for (alias_name, ops) in blocks_for(mods, platform_name) {
                mods_by_alias.entry(alias_name.clone()).or_default().push((ops.clone(), String::new()));
            }
        }
    }

    let mut claimed: AHashSet<String> = AHashSet::new();
    let mut out = AHashMap::new();

    for source in &sources {
        for (name, value) in &source.entries {
            if claimed.contains(name) {
                tracing::warn!(alias = %name, platform = %platform_name, "duplicate alias; keeping first definition");
                continue;
            }
            claimed.insert(name.clone());

            let mut state = EnvState::new();
            for (var, value) in global_env {
                state.seed(var, value.clone());
            }
            let own_ctx = FormatContext::new(variables, &source.relative_root);
            if let Some(ops) = value.environment() {
                state.apply_ops(ops, &own_ctx)?;
            }
            if let Some(mods) = mods_by_alias.get(name.as_str()) {
                for (ops, relative_root) in mods {
                    let ctx = FormatContext::new(variables, relative_root);
                    state.apply_ops(ops, &ctx)?;
                }
            }

            let cmd = format_alias_cmd(value.cmd(), &source.relative_root, variables)?;
            out.insert(
                name.clone(),
                AliasScript {
                    cmd,
                    environment: state.into_map(),
                },
            );
        }
    }

    Ok(out)
}

fn format_alias_cmd(cmd: &serde_json::Value, relative_root: &str, variables: &AHashMap<String, String>) -> Result<serde_json::Value> {
    let ctx = FormatContext::new(variables, relative_root);
    match cmd {
        serde_json::Value::String(s) => Ok(serde_json::Value::String(format_value(s, "cmd", &ctx)?)),
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(format_alias_cmd(item, relative_root, variables)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

impl FlatConfig {
    /// A plain-text property dump analogous to the source project's
    /// `dump_object`/`dump_title`; colorization is dropped.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("uri: {}\n", self.uri));
        out.push_str(&format!("name: {}\n", self.name));
        out.push_str("distros:\n");
        for name in &self.distro_order {
            out.push_str(&format!("  {} == {}\n", name, self.distros[name].version));
        }
        out.push_str("environment:\n");
        let mut keys: Vec<&String> = self.environment.keys().collect();
        keys.sort();
        for key in keys {
            match &self.environment[key] {
                Some(list) => out.push_str(&format!("  {key} = {}\n", list.join(", "))),
                None => out.push_str(&format!("  {key} (unset)\n")),
            }
        }
        out
    }

    /// The serializable snapshot the freeze codec (component K) round-trips.
    pub fn to_frozen(&self) -> crate::freeze::FrozenConfig {
        let versions = self.distros.iter().map(|(name, v)| (name.clone(), v.version.to_string())).collect();
        let aliases = self
            .aliases
            .iter()
            .map(|(platform, table)| {
                let entries = table
                    .iter()
                    .map(|(name, alias)| {
                        (
                            name.clone(),
                            crate::freeze::FrozenAlias {
                                cmd: alias.cmd.clone(),
                                environment: alias.environment.clone(),
                            },
                        )
                    })
                    .collect();
                (platform.name().to_string(), entries)
            })
            .collect();
        crate::freeze::FrozenConfig {
            uri: self.uri.to_string(),
            versions,
            environment: self.environment.clone(),
            aliases,
        }
    }

    pub fn alias_names(&self, platform: Platform) -> Vec<String> {
        self.aliases.get(&platform).map(|t| t.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn alias(&self, platform: Platform, name: &str) -> Result<&AliasScript> {
        self.aliases
            .get(&platform)
            .and_then(|t| t.get(name))
            .ok_or_else(|| Error::InvalidAlias { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_core::NotSet;
    use std::path::PathBuf;

    fn bare_node(name: &str, context: Vec<String>, inherits: bool) -> ConfigNode {
        ConfigNode {
            name: name.to_string(),
            context,
            source_root: PathBuf::from("/site"),
            inherits,
            relative_root: "/site".to_string(),
            distros: NotSet::NotSet,
            environment_config: NotSet::NotSet,
            aliases: NotSet::NotSet,
            alias_mods: NotSet::NotSet,
            min_verbosity: NotSet::NotSet,
            variables: NotSet::NotSet,
            optional_distros: NotSet::NotSet,
        }
    }

    #[test]
    fn inheritance_falls_through_to_parent_distros() {
        let mut forest = Forest::new();
        let mut parent = bare_node("not_set", vec![], true);
        parent.distros = NotSet::Value(vec![Requirement::parse("maya2020").unwrap()]);
        forest.insert(&[], "not_set", parent, Path::new("/site")).unwrap();
        let child = bare_node("child", vec!["not_set".to_string()], true);
        forest
            .insert(&["not_set".to_string()], "child", child, Path::new("/site"))
            .unwrap();

        let distro_forest = DistroForest::new();
        let uri = Uri::parse("not_set/child").unwrap();
        let config = build_flat_config(&forest, &distro_forest, &[Platform::Linux], "linux", false, &uri).unwrap();
        assert_eq!(config.name, "child");
        assert_eq!(config.environment[HAB_URI_VAR], Some(vec![uri.to_string()]));
    }

    #[test]
    fn missing_root_without_default_tree_errors() {
        let forest = Forest::new();
        let distro_forest = DistroForest::new();
        let uri = Uri::parse("nowhere").unwrap();
        assert!(build_flat_config(&forest, &distro_forest, &[Platform::Linux], "linux", false, &uri).is_err());
    }
}
