//! CLI configuration and runtime settings for artifact collection.

use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::artifact::Anchor;
use crate::error::CollectError;

/// Collect Curam style sheets, scripts and renderer sources into one archive
#[derive(Parser, Debug)]
#[command(name = "curam-artifact-collector")]
#[command(version)]
#[command(about = "Collect Curam style sheets, scripts and renderer sources into one archive")]
pub struct Cli {
    /// Configuration file naming the component trees
    #[arg(short, long, default_value = "configuration.json")]
    pub config: PathBuf,

    /// Directory files are assembled in before archiving
    #[arg(long, default_value = "results")]
    pub staging_dir: PathBuf,

    /// Archive to write
    #[arg(short, long, default_value = "results.zip")]
    pub output: PathBuf,

    /// Number of parallel workers
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub jobs: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Leave the staging directory in place after archiving
    #[arg(long)]
    pub keep_staging: bool,

    /// Only follow DomainsConfig.xml descriptors, do not archive them
    #[arg(long)]
    pub no_descriptors: bool,
}

/// Configuration file as written on disk. Fields stay untyped until
/// validation so every problem can be reported at once.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(alias = "serverRoot")]
    ejb_server_components: Option<Value>,
    #[serde(alias = "clientRoot")]
    web_client_components: Option<Value>,
    skip_components: Option<Value>,
}

/// The two component trees and the components to leave out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Server-side component tree (anchored at `EJBServer`)
    pub server_root: PathBuf,
    /// Client-side component tree (anchored at `webclient`)
    pub client_root: PathBuf,
    /// Component directory names excluded from scanning
    pub skip_components: BTreeSet<String>,
}

impl SourceConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, CollectError> {
        if !path.exists() {
            return Err(CollectError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        let raw: RawConfig =
            serde_json::from_str(&content).map_err(|e| CollectError::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, CollectError> {
        let mut problems = Vec::new();

        let server_root = root_field(
            raw.ejb_server_components,
            "ejbServerComponents",
            &mut problems,
        );
        let client_root = root_field(
            raw.web_client_components,
            "webClientComponents",
            &mut problems,
        );

        let mut skip_components = BTreeSet::new();
        match raw.skip_components {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::String(name) => {
                            skip_components.insert(name);
                        }
                        other => problems.push(format!(
                            "The field \"skipComponents\" must be an array of strings, found {other}"
                        )),
                    }
                }
            }
            Some(_) => problems.push(
                "The field \"skipComponents\" must be an array of strings".to_string(),
            ),
        }

        match (server_root, client_root) {
            (Some(server_root), Some(client_root)) if problems.is_empty() => Ok(Self {
                server_root,
                client_root,
                skip_components,
            }),
            _ => Err(CollectError::ConfigInvalid { problems }),
        }
    }

    /// Root directory of the tree anchored at `anchor`
    #[inline]
    pub fn root_for(&self, anchor: Anchor) -> &Path {
        match anchor {
            Anchor::EjbServer => &self.server_root,
            Anchor::WebClient => &self.client_root,
        }
    }
}

/// Validate a root path field, recording any problem
fn root_field(value: Option<Value>, field: &str, problems: &mut Vec<String>) -> Option<PathBuf> {
    let path = match value {
        None | Some(Value::Null) => {
            problems.push(format!("The field \"{field}\" is missing"));
            return None;
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            problems.push(format!("The field \"{field}\" is missing"));
            return None;
        }
        Some(Value::String(s)) => PathBuf::from(s),
        Some(_) => {
            problems.push(format!("The field \"{field}\" must be a string"));
            return None;
        }
    };

    if !path.exists() {
        problems.push(format!(
            "The path in \"{field}\" does not exist: {}",
            path.display()
        ));
        return None;
    }

    if !path.is_dir() {
        problems.push(format!(
            "The path in \"{field}\" is not a directory: {}",
            path.display()
        ));
        return None;
    }

    // Symlinks stay unresolved so the anchor segment survives
    match absolute_path(&path) {
        Ok(path) => Some(path),
        Err(e) => {
            problems.push(format!(
                "The path in \"{field}\" cannot be resolved: {}: {e}",
                path.display()
            ));
            None
        }
    }
}

/// Make `path` absolute against the working directory and fold away `.` and
/// `..` components without touching the filesystem
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Runtime configuration parsed from CLI and configuration file
#[derive(Debug, Clone)]
pub struct Config {
    /// Component trees to scan
    pub sources: SourceConfig,
    /// Staging directory
    pub staging_dir: PathBuf,
    /// Output archive
    pub archive_path: PathBuf,
    /// Number of parallel workers
    pub jobs: usize,
    /// Enable verbose output
    pub verbose: bool,
    /// Keep staging directory after archiving
    pub keep_staging: bool,
    /// Stage domain descriptors alongside the renderers they declare
    pub stage_descriptors: bool,
}

impl Config {
    /// Create Config from CLI arguments, loading the configuration file
    pub fn from_cli(cli: Cli) -> Result<Self, CollectError> {
        // Removing the staging directory would take the archive with it
        if absolute_path(&cli.output)?.starts_with(absolute_path(&cli.staging_dir)?) {
            return Err(CollectError::ConfigInvalid {
                problems: vec![format!(
                    "The output archive {} must not be inside the staging directory {}",
                    cli.output.display(),
                    cli.staging_dir.display()
                )],
            });
        }

        let sources = SourceConfig::load(&cli.config)?;

        Ok(Config {
            sources,
            staging_dir: cli.staging_dir,
            archive_path: cli.output,
            jobs: cli.jobs.max(1),
            verbose: cli.verbose,
            keep_staging: cli.keep_staging,
            stage_descriptors: !cli.no_descriptors,
        })
    }
}
