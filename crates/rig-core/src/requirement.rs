use std::fmt;

use semver::{Comparator, Version};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A version specifier, e.g. `>=1.0,<2`. Wraps `semver`'s comparator list
/// rather than `VersionReq` directly so that two specifiers on the same
/// distro name can be intersected by simple concatenation, matching the
/// source solver's `specifier &= req.specifier`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequirementSpec {
    comparators: Vec<Comparator>,
    raw: Vec<String>,
}

impl RequirementSpec {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }
        // `semver::VersionReq` only recognizes a single `=` for an exact
        // match; this spec's own examples (and the PEP440-flavored source
        // descriptors it was distilled from) write `==` instead, so treat a
        // doubled `=` as the single-`=` operator before handing the rest to
        // `semver`.
        let normalized = trimmed.replace("==", "=");
        let req = semver::VersionReq::parse(&normalized).map_err(|e| Error::InvalidUri {
            uri: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            comparators: req.comparators,
            raw: vec![trimmed.to_string()],
        })
    }

    /// Intersects `other` into `self`, the way the solver combines two
    /// requirements declared against the same distro family.
    pub fn intersect(&mut self, other: &RequirementSpec) {
        self.comparators.extend(other.comparators.iter().cloned());
        self.raw.extend(other.raw.iter().cloned());
    }

    pub fn is_any(&self) -> bool {
        self.comparators.is_empty()
    }

    /// Matches `version` against every comparator, honoring `allow_prereleases`.
    ///
    /// `semver::Comparator::matches` only accepts a pre-release version when
    /// the comparator itself pins that exact `major.minor.patch` with a
    /// pre-release component, which is too strict for a resolver flag that
    /// says "prereleases are acceptable for this family". When prereleases
    /// are allowed, the pre-release tag is stripped before comparing so an
    /// unadorned comparator like `>=1.0` still matches `1.1.0-rc.1`.
    pub fn matches(&self, version: &Version, allow_prereleases: bool) -> bool {
        if self.comparators.is_empty() {
            return allow_prereleases || version.pre.is_empty();
        }
        if allow_prereleases && !version.pre.is_empty() {
            let stripped = Version::new(version.major, version.minor, version.patch);
            self.comparators.iter().all(|c| c.matches(&stripped))
        } else {
            self.comparators.iter().all(|c| c.matches(version))
        }
    }
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", self.raw.join(","))
        }
    }
}

impl Serialize for RequirementSpec {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequirementSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RequirementSpec::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A dependency on a distro family, as declared in a node's `distros` list
/// or produced by a distro version's own requirements on other distros.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub name: String,
    pub spec: RequirementSpec,
    /// An environment marker gating this requirement (e.g. a platform name).
    /// Evaluated by the solver, not by this crate. The plain-string
    /// declaration grammar this type (de)serializes has no marker syntax,
    /// so a `Requirement` round-tripped through JSON always carries `None`
    /// here.
    pub marker: Option<String>,
}

impl Requirement {
    pub fn parse(declaration: &str) -> Result<Self> {
        let declaration = declaration.trim();
        let split_at = declaration
            .find(|c: char| "<>=!~^,".contains(c))
            .unwrap_or(declaration.len());
        let (name, spec) = declaration.split_at(split_at);
        Ok(Requirement {
            name: name.trim().to_string(),
            spec: RequirementSpec::parse(spec)?,
            marker: None,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spec.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}", self.name, self.spec)
        }
    }
}

/// `distros` lists (spec.md's `distros=[maya2020, aliased]`) are plain
/// arrays of requirement-declaration strings, not JSON objects — matching
/// `original_source/hab/parsers/hab_base.py`'s `distros.setter`, which feeds
/// `Solver.simplify_requirements` the raw string list straight from
/// `data.get("distros", NotSet)`. So `Requirement` (de)serializes as a
/// string via `parse`/`Display`, the same pattern `RequirementSpec` already
/// uses.
impl Serialize for Requirement {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Requirement::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_name_is_any_version() {
        let req = Requirement::parse("the_dcc").unwrap();
        assert_eq!(req.name, "the_dcc");
        assert!(req.spec.is_any());
    }

    #[test]
    fn parse_with_specifier() {
        let req = Requirement::parse("the_dcc_plugin_b==0.9").unwrap();
        assert_eq!(req.name, "the_dcc_plugin_b");
        assert!(req.spec.matches(&Version::parse("0.9.0").unwrap(), false));
        assert!(!req.spec.matches(&Version::parse("1.0.0").unwrap(), false));
    }

    #[test]
    fn intersect_combines_comparators() {
        let mut a = RequirementSpec::parse(">=1.0").unwrap();
        let b = RequirementSpec::parse("<2.0").unwrap();
        a.intersect(&b);
        assert!(a.matches(&Version::parse("1.5.0").unwrap(), false));
        assert!(!a.matches(&Version::parse("2.0.0").unwrap(), false));
    }

    #[test]
    fn prereleases_excluded_by_default() {
        let spec = RequirementSpec::parse(">=1.0").unwrap();
        let pre = Version::parse("1.1.0-rc.1").unwrap();
        assert!(!spec.matches(&pre, false));
        assert!(spec.matches(&pre, true));
    }
}
