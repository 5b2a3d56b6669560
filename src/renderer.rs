//! Renderer discovery from `DomainsConfig.xml` descriptors.
//!
//! Domain descriptors declare plug-ins as `<dc:plug-in name=".." class=".."/>`.
//! Plug-ins whose name mentions `renderer` are backed by a Java class whose
//! source file is staged alongside the client artifacts.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::aggregator::RunStats;
use crate::artifact::Anchor;
use crate::copier::{stage_files, StageSummary};
use crate::error::CollectError;
use crate::scanner::{collect_any, SearchPattern};

/// Qualified tag name of a plug-in declaration, matched literally
pub const PLUGIN_TAG: &[u8] = b"dc:plug-in";

/// Substring of a plug-in name that marks it as a renderer (case-sensitive)
pub const RENDERER_MARKER: &str = "renderer";

/// A renderer plug-in with a backing class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererDeclaration {
    /// Value of the `name` attribute
    pub plugin_name: String,
    /// Dot-separated class name from the `class` attribute
    pub implementing_class: String,
}

impl RendererDeclaration {
    /// Relative source path of the implementing class, e.g. `com/acme/Foo.java`
    pub fn source_path(&self) -> PathBuf {
        let mut path: PathBuf = self.implementing_class.split('.').collect();
        path.set_extension("java");
        path
    }

    /// Search for the implementing class under `client_root`
    pub fn search_pattern(&self, client_root: &Path) -> SearchPattern {
        SearchPattern::for_java_class(client_root, &self.implementing_class)
    }
}

/// Extract renderer declarations from descriptor content.
/// Plug-ins without "renderer" in their name, or without a class, are skipped.
pub fn parse_renderer_declarations(xml: &str) -> Result<Vec<RendererDeclaration>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut declarations = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == PLUGIN_TAG => {
                let mut name = None;
                let mut class = None;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(attr.unescape_value()?.to_string()),
                        b"class" => class = Some(attr.unescape_value()?.trim().to_string()),
                        _ => {}
                    }
                }

                let Some(plugin_name) = name.filter(|n| n.contains(RENDERER_MARKER)) else {
                    continue;
                };

                match class.filter(|c| !c.is_empty()) {
                    Some(implementing_class) => declarations.push(RendererDeclaration {
                        plugin_name,
                        implementing_class,
                    }),
                    None => debug!(plugin = %plugin_name, "renderer plug-in declares no class"),
                }
            }
            Event::Eof => return Ok(declarations),
            _ => {}
        }
    }
}

/// Read and parse a descriptor file. Bytes that are not valid UTF-8 (legacy
/// single-byte encodings) are replaced; plug-in names and classes are ASCII.
pub fn read_descriptor(path: &Path) -> Result<Vec<RendererDeclaration>, CollectError> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    parse_renderer_declarations(&content).map_err(|e| CollectError::XmlParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Renderer declarations across a set of descriptors.
/// Unreadable or malformed descriptors are logged and skipped.
pub fn gather_declarations(descriptors: &[PathBuf], stats: &RunStats) -> BTreeSet<RendererDeclaration> {
    descriptors
        .par_iter()
        .flat_map_iter(|path| match read_descriptor(path) {
            Ok(declarations) => {
                debug!(descriptor = %path.display(), renderers = declarations.len(), "parsed");
                declarations
            }
            Err(e) => {
                stats.errors.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                warn!(error = %e, descriptor = %path.display(), "skipping descriptor");
                Vec::new()
            }
        })
        .collect()
}

/// Stage the Java source of every renderer declared in `descriptors`.
/// All class searches share a single walk of the client tree.
pub fn resolve_renderers(
    descriptors: &[PathBuf],
    client_root: &Path,
    staging_root: &Path,
    stats: &RunStats,
) -> Result<StageSummary, CollectError> {
    let declarations = gather_declarations(descriptors, stats);
    if declarations.is_empty() {
        return Ok(StageSummary::default());
    }

    let patterns: Vec<SearchPattern> = declarations
        .iter()
        .map(|d| d.search_pattern(client_root))
        .collect();

    let sources = collect_any(client_root, &patterns);
    debug!(
        renderers = declarations.len(),
        sources = sources.len(),
        "resolved renderer sources"
    );

    stage_files(&sources, Anchor::WebClient, staging_root, stats)
}
