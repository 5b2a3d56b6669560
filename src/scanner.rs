use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::artifact::{ArtifactKind, ComponentScope, JAVA_SOURCE_DIR};
use crate::error::CollectError;

/// List the names of the immediate subdirectories of `root`
fn component_dirs(root: &Path) -> Result<Vec<String>, CollectError> {
    let entries = fs::read_dir(root).map_err(|e| CollectError::DirectoryAccess {
        path: root.to_path_buf(),
        source: e,
    })?;

    Ok(entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect())
}

/// Resolve the components eligible for scanning: the immediate subdirectories
/// of both roots, minus the skipped ones.
#[must_use = "this returns the scope every search pattern is built from"]
pub fn resolve_scope(
    server_root: &Path,
    client_root: &Path,
    skip_components: &BTreeSet<String>,
) -> Result<ComponentScope, CollectError> {
    let mut components = component_dirs(server_root)?;
    components.extend(component_dirs(client_root)?);

    let scope: ComponentScope = components
        .into_iter()
        .filter(|name| !skip_components.contains(name))
        .collect();

    if scope.is_unrestricted() {
        debug!("component scope is empty, scanning roots without restriction");
    }

    Ok(scope)
}

/// A glob expression rooted at a base directory.
/// The glob is matched against paths relative to the base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchPattern {
    base: PathBuf,
    glob: String,
}

impl SearchPattern {
    /// Build a raw pattern; no validation happens until it is compiled
    pub fn new(base: impl Into<PathBuf>, glob: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            glob: glob.into(),
        }
    }

    /// Pattern for every file of `kind` under the scoped components of `base`
    pub fn for_kind(base: &Path, kind: ArtifactKind, scope: &ComponentScope) -> Self {
        let mut glob = String::new();

        match scope.len() {
            0 => glob.push_str("**"),
            1 => {
                glob.push_str(&escape_segment(scope.iter().next().unwrap_or_default()));
                glob.push_str("/**");
            }
            _ => {
                let members: Vec<String> = scope.iter().map(escape_segment).collect();
                glob.push('{');
                glob.push_str(&members.join(","));
                glob.push_str("}/**");
            }
        }

        if kind == ArtifactKind::JavaSource {
            glob.push('/');
            glob.push_str(JAVA_SOURCE_DIR);
            glob.push_str("/**");
        }

        glob.push('/');
        glob.push_str(kind.file_glob());

        Self::new(base, glob)
    }

    /// Pattern for the source file of a fully qualified class name,
    /// e.g. `com.acme.FooRenderer` -> `**/javasource/com/acme/FooRenderer.java`
    pub fn for_java_class(base: &Path, class_name: &str) -> Self {
        let segments: Vec<String> = class_name
            .split('.')
            .map(|segment| escape_segment(segment.trim()))
            .collect();

        Self::new(
            base,
            format!("**/{}/{}.java", JAVA_SOURCE_DIR, segments.join("/")),
        )
    }

    #[inline]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[inline]
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// Compile the glob; `*` never crosses a path separator
    pub fn compile(&self) -> Result<Glob, CollectError> {
        GlobBuilder::new(&self.glob)
            .literal_separator(true)
            .build()
            .map_err(|e| CollectError::Search {
                pattern: self.glob.clone(),
                source: e,
            })
    }
}

/// Escape a literal path segment for use inside a glob alternation
fn escape_segment(segment: &str) -> String {
    globset::escape(segment).replace(',', "[,]")
}

/// Iterate over every regular file under `base` (missing base yields nothing)
fn walk_files(base: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(base)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
}

/// Execute a search pattern, returning absolute paths of the matching files
pub fn collect(pattern: &SearchPattern) -> Result<Vec<PathBuf>, CollectError> {
    let matcher = pattern.compile()?.compile_matcher();
    let base = pattern.base();

    let files: Vec<PathBuf> = walk_files(base)
        .filter(|entry| {
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            matcher.is_match(relative)
        })
        .map(|entry| entry.into_path())
        .collect();

    debug!(pattern = %pattern.glob(), base = %base.display(), found = files.len(), "search complete");

    Ok(files)
}

/// Execute several patterns sharing one base in a single walk.
/// Patterns rooted elsewhere, or that fail to compile, are logged and ignored.
pub fn collect_any(base: &Path, patterns: &[SearchPattern]) -> Vec<PathBuf> {
    let mut builder = GlobSetBuilder::new();
    let mut valid = 0usize;

    for pattern in patterns {
        if pattern.base() != base {
            warn!(
                pattern = %pattern.glob(),
                pattern_base = %pattern.base().display(),
                base = %base.display(),
                "skipping search pattern rooted elsewhere"
            );
            continue;
        }
        match pattern.compile() {
            Ok(glob) => {
                builder.add(glob);
                valid += 1;
            }
            Err(e) => warn!(error = %e, "skipping search pattern"),
        }
    }

    if valid == 0 {
        return Vec::new();
    }

    let set = match builder.build() {
        Ok(set) => set,
        Err(e) => {
            warn!(error = %e, base = %base.display(), "failed to build search set");
            return Vec::new();
        }
    };

    walk_files(base)
        .filter(|entry| {
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            set.is_match(relative)
        })
        .map(|entry| entry.into_path())
        .collect()
}
