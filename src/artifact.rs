//! Artifact, anchor, and component scope types for artifact collection.
//!
//! Provides type-safe wrappers for the two source trees (anchors), the kinds
//! of file the collector looks for, and the set of component directories a
//! run is allowed to scan.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Directory segment a discovered file is re-rooted at when staged.
/// Each source tree has exactly one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Anchor {
    /// Server-side component tree
    EjbServer,
    /// Client-side component tree
    WebClient,
}

impl Anchor {
    /// Both anchors, server first
    pub const ALL: [Anchor; 2] = [Anchor::EjbServer, Anchor::WebClient];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::EjbServer => "EJBServer",
            Anchor::WebClient => "webclient",
        }
    }

    #[inline]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EJBServer" => Some(Anchor::EjbServer),
            "webclient" => Some(Anchor::WebClient),
            _ => None,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of file a search looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Style sheets (`*.css`)
    Css,
    /// Scripts (`*.js`)
    Script,
    /// Domain descriptors (`DomainsConfig.xml`)
    DomainDescriptor,
    /// Renderer sources (`*.java` under a `javasource` directory)
    JavaSource,
}

impl ArtifactKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Css => "css",
            ArtifactKind::Script => "script",
            ArtifactKind::DomainDescriptor => "descriptor",
            ArtifactKind::JavaSource => "java",
        }
    }

    /// Final path segment pattern for this kind
    #[inline]
    pub fn file_glob(&self) -> &'static str {
        match self {
            ArtifactKind::Css => "*.css",
            ArtifactKind::Script => "*.js",
            ArtifactKind::DomainDescriptor => DOMAINS_CONFIG_FILE,
            ArtifactKind::JavaSource => "*.java",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File name of a domain descriptor
pub const DOMAINS_CONFIG_FILE: &str = "DomainsConfig.xml";

/// Directory every renderer source lives under
pub const JAVA_SOURCE_DIR: &str = "javasource";

/// A discovered file waiting to be staged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Absolute path of the discovered file
    pub path: PathBuf,
    /// Segment the staged copy is re-rooted at
    pub anchor: Anchor,
}

impl ArtifactRecord {
    pub fn new(path: impl Into<PathBuf>, anchor: Anchor) -> Self {
        Self {
            path: path.into(),
            anchor,
        }
    }
}

/// Component directory names eligible for scanning.
/// An empty scope means "no restriction", never "nothing to scan".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentScope(BTreeSet<String>);

impl ComponentScope {
    /// Scope that does not restrict the first path segment
    pub fn unrestricted() -> Self {
        Self(BTreeSet::new())
    }

    #[inline]
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn contains(&self, component: &str) -> bool {
        self.0.contains(component)
    }

    /// Component names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ComponentScope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anchor tests
    #[test]
    fn test_anchor_as_str() {
        assert_eq!(Anchor::EjbServer.as_str(), "EJBServer");
        assert_eq!(Anchor::WebClient.as_str(), "webclient");
    }

    #[test]
    fn test_anchor_parse_is_case_sensitive() {
        assert_eq!(Anchor::parse("EJBServer"), Some(Anchor::EjbServer));
        assert_eq!(Anchor::parse("webclient"), Some(Anchor::WebClient));
        assert_eq!(Anchor::parse("WebClient"), None);
        assert_eq!(Anchor::parse(""), None);
    }

    #[test]
    fn test_anchor_display() {
        assert_eq!(format!("{}", Anchor::WebClient), "webclient");
    }

    // ArtifactKind tests
    #[test]
    fn test_artifact_kind_file_glob() {
        assert_eq!(ArtifactKind::Css.file_glob(), "*.css");
        assert_eq!(ArtifactKind::Script.file_glob(), "*.js");
        assert_eq!(ArtifactKind::DomainDescriptor.file_glob(), "DomainsConfig.xml");
        assert_eq!(ArtifactKind::JavaSource.file_glob(), "*.java");
    }

    // ComponentScope tests
    #[test]
    fn test_component_scope_deduplicates_and_sorts() {
        let scope: ComponentScope = ["Core", "Appeals", "Core"].into_iter().collect();
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.iter().collect::<Vec<_>>(), vec!["Appeals", "Core"]);
    }

    #[test]
    fn test_component_scope_unrestricted() {
        let scope = ComponentScope::unrestricted();
        assert!(scope.is_unrestricted());
        assert!(!scope.contains("Core"));
    }

    #[test]
    fn test_artifact_record_new() {
        let record = ArtifactRecord::new("/src/webclient/a.js", Anchor::WebClient);
        assert_eq!(record.path, PathBuf::from("/src/webclient/a.js"));
        assert_eq!(record.anchor, Anchor::WebClient);
    }
}
