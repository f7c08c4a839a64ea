//! Component F: the keyed map of tree roots and the `closest(uri)` lookup.

use std::path::{Path, PathBuf};

use rig_core::{AHashMap, Error, Result, Uri, DEFAULT_ROOT};

use crate::node::ConfigNode;

#[derive(Debug, Default)]
struct TreeNode {
    /// `None` is a placeholder created to stitch an intermediate path;
    /// replaced in-place (preserving children) once its descriptor loads.
    config: Option<ConfigNode>,
    source_root: Option<PathBuf>,
    children: AHashMap<String, TreeNode>,
}

#[derive(Debug, Default)]
struct Tree {
    root: TreeNode,
}

/// The set of named trees of nodes (the GLOSSARY's "Forest").
#[derive(Debug, Default)]
pub struct Forest {
    trees: AHashMap<String, Tree>,
}

/// The result of a `closest` lookup: which tree matched, and the segment
/// path (relative to that tree's root) that was actually walked — may be
/// shorter than the queried URI when a segment failed to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosestMatch {
    pub tree_root: String,
    pub matched_segments: Vec<String>,
}

impl Forest {
    pub fn new() -> Self {
        Forest::default()
    }

    /// Inserts a node at `context/name`, creating placeholder ancestors as
    /// needed. A real node already occupying that slot triggers the
    /// duplicate-source rule: fatal if redefined by the *same* source root,
    /// a logged warning (first-wins) if redefined by a different one.
    pub fn insert(&mut self, context: &[String], name: &str, node: ConfigNode, source_root: &Path) -> Result<()> {
        let mut segments: Vec<String> = context.to_vec();
        segments.push(name.to_string());
        let root_name = segments[0].clone();

        let tree = self.trees.entry(root_name).or_default();
        let mut current = &mut tree.root;
        for segment in segments.iter().skip(1) {
            current = current.children.entry(segment.clone()).or_default();
        }

        if let (Some(_), Some(existing_root)) = (&current.config, &current.source_root) {
            if existing_root == source_root {
                return Err(Error::DuplicateDefinition {
                    context: context.join("/"),
                    name: name.to_string(),
                    first_root: existing_root.clone(),
                    second_root: source_root.to_path_buf(),
                });
            }
            tracing::warn!(
                context = %context.join("/"),
                name,
                first_root = %existing_root.display(),
                second_root = %source_root.display(),
                "node redefined from a different source root; keeping the first definition"
            );
            return Ok(());
        }

        current.config = Some(node);
        current.source_root = Some(source_root.to_path_buf());
        Ok(())
    }

    /// Walks from `tree_root`'s root through `segments[1..]` (`segments[0]`
    /// must equal `tree_root`), returning the node at that exact path.
    pub fn node_at(&self, tree_root: &str, segments: &[String]) -> Option<&ConfigNode> {
        let tree = self.trees.get(tree_root)?;
        let mut current = &tree.root;
        for segment in segments.iter().skip(1) {
            current = current.children.get(segment)?;
        }
        current.config.as_ref()
    }

    /// The node chain from the full matched path up to (and including) the
    /// tree root, innermost first — skipping placeholders, since they carry
    /// no properties to inherit from.
    pub fn ancestors(&self, tree_root: &str, matched_segments: &[String]) -> Vec<&ConfigNode> {
        (1..=matched_segments.len())
            .rev()
            .filter_map(|len| self.node_at(tree_root, &matched_segments[..len]))
            .collect()
    }

    /// Finds the deepest node matching `uri` (spec §4.6): an exact
    /// segment-by-segment walk if the root is known, otherwise a
    /// longest-prefix-per-level walk through the `default` tree.
    pub fn closest(&self, uri: &Uri) -> Option<ClosestMatch> {
        let segments = uri.segments();
        if self.trees.contains_key(&segments[0]) {
            return Some(self.walk_exact(&segments[0], &segments[1..]));
        }
        self.closest_in_default(&segments[1..])
    }

    /// Runs the `default`-tree prefix walk directly over `remaining`
    /// segments (i.e. a URI's segments *after* its unmatched would-be
    /// root). Also used by the flat-configuration inheritance walk when a
    /// node's own tree is exhausted and it falls back to its counterpart
    /// under `default` (spec §4.8).
    pub fn closest_in_default(&self, remaining: &[String]) -> Option<ClosestMatch> {
        if !self.trees.contains_key(DEFAULT_ROOT) {
            return None;
        }
        Some(self.walk_prefix(DEFAULT_ROOT, remaining))
    }

    fn walk_exact(&self, root_name: &str, remaining: &[String]) -> ClosestMatch {
        let tree = self.trees.get(root_name).expect("caller checked root exists");
        let mut matched = vec![root_name.to_string()];
        let mut current = &tree.root;
        for segment in remaining {
            match current.children.get(segment) {
                Some(child) => {
                    current = child;
                    matched.push(segment.clone());
                }
                None => break,
            }
        }
        ClosestMatch {
            tree_root: root_name.to_string(),
            matched_segments: matched,
        }
    }

    /// An indented text dump of every tree, children visited in natural
    /// order (so `Sc1`, `Sc2`, `Sc10` rather than `Sc1`, `Sc10`, `Sc2`) —
    /// analogous to the source project's forest dump, colorization dropped.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut roots: Vec<&String> = self.trees.keys().collect();
        roots.sort_by(|a, b| natural_cmp(a, b));
        for root_name in roots {
            out.push_str(root_name);
            out.push('\n');
            let tree = &self.trees[root_name];
            render_children(&tree.root, 1, &mut out);
        }
        out
    }

    fn walk_prefix(&self, root_name: &str, remaining: &[String]) -> ClosestMatch {
        let tree = self.trees.get(root_name).expect("caller checked root exists");
        let mut matched = vec![root_name.to_string()];
        let mut current = &tree.root;
        for wanted in remaining {
            let best = current
                .children
                .iter()
                .filter(|(child_name, _)| wanted.starts_with(child_name.as_str()))
                .max_by_key(|(child_name, _)| child_name.len());
            match best {
                Some((child_name, child)) => {
                    current = child;
                    matched.push(child_name.clone());
                }
                None => break,
            }
        }
        ClosestMatch {
            tree_root: root_name.to_string(),
            matched_segments: matched,
        }
    }
}

fn render_children(node: &TreeNode, depth: usize, out: &mut String) {
    let mut names: Vec<&String> = node.children.keys().collect();
    names.sort_by(|a, b| natural_cmp(a, b));
    for name in names {
        out.push_str(&"  ".repeat(depth));
        out.push_str(name);
        if node.children[name].config.is_none() {
            out.push_str(" (placeholder)");
        }
        out.push('\n');
        render_children(&node.children[name], depth + 1, out);
    }
}

/// Compares strings treating runs of ASCII digits as numbers, so `Sc2` sorts
/// before `Sc10`.
fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek(), b.peek()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let take_number = |chars: &mut std::iter::Peekable<std::str::Chars>| {
                    let mut s = String::new();
                    while let Some(c) = chars.peek() {
                        if c.is_ascii_digit() {
                            s.push(*c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    s
                };
                let na: u64 = take_number(&mut a).parse().unwrap_or(0);
                let nb: u64 = take_number(&mut b).parse().unwrap_or(0);
                match na.cmp(&nb) {
                    std::cmp::Ordering::Equal => continue,
                    other => return other,
                }
            }
            (Some(ca), Some(cb)) => match ca.cmp(cb) {
                std::cmp::Ordering::Equal => {
                    a.next();
                    b.next();
                    continue;
                }
                other => return other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, context: &[&str]) -> ConfigNode {
        ConfigNode {
            name: name.to_string(),
            context: context.iter().map(|s| s.to_string()).collect(),
            source_root: PathBuf::from("/site-a"),
            inherits: true,
            relative_root: String::new(),
            distros: rig_core::NotSet::NotSet,
            environment_config: rig_core::NotSet::NotSet,
            aliases: rig_core::NotSet::NotSet,
            alias_mods: rig_core::NotSet::NotSet,
            min_verbosity: rig_core::NotSet::NotSet,
            variables: rig_core::NotSet::NotSet,
            optional_distros: rig_core::NotSet::NotSet,
        }
    }

    fn sample_forest() -> Forest {
        let mut forest = Forest::new();
        forest.insert(&[], "default", node("default", &[]), Path::new("/site-a")).unwrap();
        forest
            .insert(&["default".to_string()], "Sc1", node("Sc1", &["default"]), Path::new("/site-a"))
            .unwrap();
        forest
            .insert(&["default".to_string()], "Sc11", node("Sc11", &["default"]), Path::new("/site-a"))
            .unwrap();
        forest
    }

    #[test]
    fn default_fallback_picks_longest_prefix_match() {
        let forest = sample_forest();
        let uri = Uri::parse("project_z/Sc110").unwrap();
        let closest = forest.closest(&uri).unwrap();
        assert_eq!(closest.tree_root, "default");
        assert_eq!(closest.matched_segments, vec!["default".to_string(), "Sc11".to_string()]);
    }

    #[test]
    fn default_fallback_stops_at_root_when_nothing_prefixes() {
        let forest = sample_forest();
        let uri = Uri::parse("project_z/Sc001").unwrap();
        let closest = forest.closest(&uri).unwrap();
        assert_eq!(closest.tree_root, "default");
        assert_eq!(closest.matched_segments, vec!["default".to_string()]);
    }

    #[test]
    fn known_root_uses_exact_match() {
        let mut forest = sample_forest();
        forest
            .insert(&[], "project_a", node("project_a", &[]), Path::new("/site-a"))
            .unwrap();
        forest
            .insert(
                &["project_a".to_string()],
                "Sc001",
                node("Sc001", &["project_a"]),
                Path::new("/site-a"),
            )
            .unwrap();

        let uri = Uri::parse("project_a/Sc001").unwrap();
        let closest = forest.closest(&uri).unwrap();
        assert_eq!(closest.matched_segments, vec!["project_a".to_string(), "Sc001".to_string()]);

        let uri = Uri::parse("project_a/Sc999").unwrap();
        let closest = forest.closest(&uri).unwrap();
        assert_eq!(closest.matched_segments, vec!["project_a".to_string()]);
    }

    #[test]
    fn redefinition_from_same_root_is_an_error() {
        let mut forest = Forest::new();
        forest.insert(&[], "default", node("default", &[]), Path::new("/site-a")).unwrap();
        let err = forest
            .insert(&[], "default", node("default", &[]), Path::new("/site-a"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { .. }));
    }

    #[test]
    fn natural_sort_orders_numeric_suffixes_by_value() {
        let mut names = vec!["Sc10", "Sc1", "Sc2"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Sc1", "Sc2", "Sc10"]);
    }

    #[test]
    fn redefinition_from_different_root_keeps_first_and_warns() {
        let mut forest = Forest::new();
        forest.insert(&[], "default", node("default", &[]), Path::new("/site-a")).unwrap();
        forest
            .insert(&[], "default", node("default", &[]), Path::new("/site-b"))
            .unwrap();
        let uri = Uri::parse("default").unwrap();
        let closest = forest.closest(&uri).unwrap();
        let found = forest.node_at(&closest.tree_root, &closest.matched_segments).unwrap();
        assert_eq!(found.source_root, PathBuf::from("/site-a"));
    }
}
