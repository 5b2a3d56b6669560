use std::path::PathBuf;
use thiserror::Error;

/// Collection error types
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to parse configuration file: {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration:\n* {}", problems.join("\n* "))]
    ConfigInvalid { problems: Vec<String> },

    #[error("Cannot list components in {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid search pattern `{pattern}`")]
    Search {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Anchor directory {anchor} not found in {path}")]
    AnchorNotFound { path: PathBuf, anchor: &'static str },

    #[error("Invalid DomainsConfig.xml: {path}")]
    XmlParse {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Failed to copy {src} to {dst}")]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Failed to write archive {path}")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// ENOSPC on Unix
const ENOSPC: i32 = 28;

/// Whether an I/O error means the target device is out of space
pub(crate) fn is_disk_full(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(ENOSPC)
}
