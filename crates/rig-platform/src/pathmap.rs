use ahash::AHashMap;

use crate::platform::{path_forward_slash, Platform};

/// A site's "platform path maps" table: each opaque label names a location
/// (e.g. a studio's shared-tools mount) and maps it to a per-platform
/// prefix, so a path baked into one platform's descriptor can be translated
/// for another.
#[derive(Debug, Clone, Default)]
pub struct PathMapTable {
    entries: AHashMap<String, AHashMap<Platform, String>>,
}

impl PathMapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, platform: Platform, prefix: impl Into<String>) {
        self.entries
            .entry(label.into())
            .or_default()
            .insert(platform, path_forward_slash(&prefix.into()));
    }

    /// Translates `path` from `from`'s prefix convention to `to`'s.
    ///
    /// Exact match against a source prefix replaces it wholesale; a path
    /// relative to a source prefix has just the prefix portion replaced,
    /// leaving the remainder (including its leading separator) intact.
    pub fn translate(&self, path: &str, from: Platform, to: Platform) -> Option<String> {
        if from == to {
            return Some(path.to_string());
        }
        let normalized = path_forward_slash(path);
        for prefixes in self.entries.values() {
            let src = prefixes.get(&from)?;
            let dst = prefixes.get(&to)?;
            if normalized == *src {
                return Some(dst.clone());
            }
            if let Some(rest) = normalized.strip_prefix(src.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    return Some(format!("{dst}{rest}"));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PathMapTable {
        let mut table = PathMapTable::new();
        table.insert("tools", Platform::Windows, "P:/tools");
        table.insert("tools", Platform::Linux, "/mnt/tools");
        table
    }

    #[test]
    fn exact_prefix_match_replaces_wholesale() {
        let table = sample();
        assert_eq!(
            table.translate("P:/tools", Platform::Windows, Platform::Linux),
            Some("/mnt/tools".to_string())
        );
    }

    #[test]
    fn relative_path_replaces_prefix_only() {
        let table = sample();
        assert_eq!(
            table.translate("P:/tools/maya/2020", Platform::Windows, Platform::Linux),
            Some("/mnt/tools/maya/2020".to_string())
        );
    }

    #[test]
    fn unrelated_path_is_not_translated() {
        let table = sample();
        assert_eq!(table.translate("C:/other", Platform::Windows, Platform::Linux), None);
    }

    #[test]
    fn same_platform_is_identity() {
        let table = sample();
        assert_eq!(
            table.translate("P:/tools/x", Platform::Windows, Platform::Windows),
            Some("P:/tools/x".to_string())
        );
    }
}
