use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The reserved forest root used as the fallback tree when no tree matches
/// a URI's first segment.
pub const DEFAULT_ROOT: &str = "default";

/// A `/`-separated path addressing a node in a config forest. The first
/// segment names a forest root; the rest navigate that tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri {
    segments: Vec<String>,
}

impl Uri {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<String> = raw
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            return Err(Error::InvalidUri {
                uri: raw.to_string(),
                reason: "a URI must have at least one segment".to_string(),
            });
        }
        Ok(Uri { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn is_default_root(&self) -> bool {
        self.root() == DEFAULT_ROOT
    }

    pub fn name(&self) -> &str {
        self.segments.last().expect("segments is never empty")
    }

    /// The ancestor segments, excluding the leaf name.
    pub fn context(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn parent(&self) -> Option<Uri> {
        if self.segments.len() <= 1 {
            None
        } else {
            Some(Uri {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    pub fn join(&self, segment: &str) -> Uri {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Uri { segments }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl std::str::FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_empty_leading_segment() {
        let uri = Uri::parse("/project_a/Sc001/Animation").unwrap();
        assert_eq!(uri.segments(), &["project_a", "Sc001", "Animation"]);
        assert_eq!(uri.root(), "project_a");
        assert_eq!(uri.name(), "Animation");
        assert_eq!(uri.context(), &["project_a", "Sc001"]);
    }

    #[test]
    fn single_segment_has_no_parent() {
        let uri = Uri::parse("default").unwrap();
        assert!(uri.parent().is_none());
        assert!(uri.is_default_root());
    }

    #[test]
    fn empty_uri_is_rejected() {
        assert!(Uri::parse("///").is_err());
    }

    #[test]
    fn join_appends_a_segment() {
        let uri = Uri::parse("project_a/Sc001").unwrap();
        let child = uri.join("Animation");
        assert_eq!(child.to_string(), "project_a/Sc001/Animation");
    }
}
