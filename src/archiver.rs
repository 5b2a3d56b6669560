use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::CollectError;

/// What ended up in the archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: u64,
    pub bytes: u64,
}

/// Compress every file under `staging_dir` into `archive_path`, with entry
/// names relative to the staging root.
pub fn write_archive(staging_dir: &Path, archive_path: &Path) -> Result<ArchiveSummary, CollectError> {
    let archive_err = |source: ZipError| CollectError::ArchiveWrite {
        path: archive_path.to_path_buf(),
        source,
    };

    if let Some(parent) = archive_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| archive_err(ZipError::Io(e)))?;
        }
    }

    let file = File::create(archive_path).map_err(|e| archive_err(ZipError::Io(e)))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    // The archive itself may live under the staging directory
    let archive_abs = archive_path.canonicalize().ok();
    let mut summary = ArchiveSummary::default();

    for entry in WalkDir::new(staging_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if archive_abs.is_some() && path.canonicalize().ok() == archive_abs {
            continue;
        }

        let relative = path.strip_prefix(staging_dir).unwrap_or(path);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name.as_str(), options).map_err(archive_err)?;
        let mut reader = File::open(path).map_err(|e| archive_err(ZipError::Io(e)))?;
        let bytes = io::copy(&mut reader, &mut zip).map_err(|e| archive_err(ZipError::Io(e)))?;

        debug!(entry = %name, bytes, "archived");
        summary.entries += 1;
        summary.bytes += bytes;
    }

    zip.finish()
        .map_err(archive_err)?
        .into_inner()
        .map_err(|e| archive_err(ZipError::Io(e.into_error())))?
        .sync_all()
        .map_err(|e| archive_err(ZipError::Io(e)))?;

    info!(
        archive = %archive_path.display(),
        entries = summary.entries,
        "archive written"
    );

    Ok(summary)
}

/// Remove the staging directory; a failure only leaves clutter behind
pub fn remove_staging(staging_dir: &Path) {
    if !staging_dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(staging_dir) {
        warn!(error = %e, dir = %staging_dir.display(), "failed to remove staging directory");
    }
}

/// Resolve `path` through its nearest existing ancestor, so a file that is
/// not written yet still gets a comparable location
fn resolved_location(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        let candidate = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if let Ok(resolved) = candidate.canonicalize() {
            return Some(missing.iter().rev().fold(resolved, |acc, name| acc.join(name)));
        }
        missing.push(existing.file_name()?);
        existing = existing.parent()?;
    }
}

/// Archive the staging directory, then remove it unless asked to keep it.
/// An archive located inside the staging directory is refused, since
/// removing the staging directory would delete it.
pub fn archive_and_clean(
    staging_dir: &Path,
    archive_path: &Path,
    keep_staging: bool,
) -> Result<ArchiveSummary, CollectError> {
    if !keep_staging {
        if let (Some(archive), Ok(staging)) =
            (resolved_location(archive_path), staging_dir.canonicalize())
        {
            if archive.starts_with(&staging) {
                return Err(CollectError::ArchiveWrite {
                    path: archive_path.to_path_buf(),
                    source: ZipError::Io(io::Error::other(format!(
                        "archive is inside the staging directory {}",
                        staging_dir.display()
                    ))),
                });
            }
        }
    }

    let summary = write_archive(staging_dir, archive_path)?;
    if !keep_staging {
        remove_staging(staging_dir);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn touch(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    // ==================== write_archive tests ====================

    #[test]
    fn test_write_archive_relative_entries() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "EJBServer/components/Core/a.css", "a{}");
        touch(&staging, "webclient/components/Core/b.js", "var b;");
        let archive = temp.path().join("results.zip");

        let summary = write_archive(&staging, &archive).unwrap();

        assert_eq!(summary.entries, 2);
        assert_eq!(summary.bytes, 9);
        assert_eq!(
            entry_names(&archive),
            vec![
                "EJBServer/components/Core/a.css",
                "webclient/components/Core/b.js"
            ]
        );
    }

    #[test]
    fn test_write_archive_content_and_compression() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        let content = "body { color: red; }\n".repeat(100);
        touch(&staging, "webclient/a.css", &content);
        let archive = temp.path().join("out.zip");

        write_archive(&staging, &archive).unwrap();

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut file = zip.by_name("webclient/a.css").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        let mut read_back = String::new();
        file.read_to_string(&mut read_back).unwrap();
        assert_eq!(read_back, content);
    }

    #[test]
    fn test_write_archive_empty_staging() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        fs::create_dir_all(&staging).unwrap();
        let archive = temp.path().join("results.zip");

        let summary = write_archive(&staging, &archive).unwrap();

        assert_eq!(summary.entries, 0);
        assert!(entry_names(&archive).is_empty());
    }

    #[test]
    fn test_write_archive_creates_parent() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        let archive = temp.path().join("dist").join("out.zip");

        write_archive(&staging, &archive).unwrap();

        assert!(archive.exists());
    }

    #[test]
    fn test_write_archive_skips_itself() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        let archive = staging.join("results.zip");

        let summary = write_archive(&staging, &archive).unwrap();

        assert_eq!(summary.entries, 1);
    }

    #[test]
    fn test_write_archive_unwritable_location() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        // A regular file where the archive's parent directory should be
        let blocker = touch(temp.path(), "blocker", "x");

        let result = write_archive(&staging, &blocker.join("out.zip"));

        assert!(matches!(result, Err(CollectError::ArchiveWrite { .. })));
    }

    // ==================== archive_and_clean tests ====================

    #[test]
    fn test_archive_and_clean_removes_staging() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        let archive = temp.path().join("results.zip");

        archive_and_clean(&staging, &archive, false).unwrap();

        assert!(archive.exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_archive_and_clean_keeps_staging() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");

        archive_and_clean(&staging, &temp.path().join("results.zip"), true).unwrap();

        assert!(staging.join("webclient/a.js").exists());
    }

    #[test]
    fn test_archive_and_clean_refuses_archive_inside_staging() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        fs::create_dir_all(temp.path().join("x")).unwrap();
        let archive = temp.path().join("x").join("..").join("results").join("out.zip");

        let result = archive_and_clean(&staging, &archive, false);

        assert!(matches!(result, Err(CollectError::ArchiveWrite { .. })));
        assert!(staging.join("webclient/a.js").exists());
        assert!(!staging.join("out.zip").exists());
    }

    #[test]
    fn test_archive_and_clean_refuses_archive_in_missing_staging_subdir() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");

        let result = archive_and_clean(&staging, &staging.join("dist").join("out.zip"), false);

        assert!(matches!(result, Err(CollectError::ArchiveWrite { .. })));
        assert!(staging.exists());
    }

    #[test]
    fn test_archive_and_clean_archive_inside_kept_staging() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        let archive = staging.join("out.zip");

        let summary = archive_and_clean(&staging, &archive, true).unwrap();

        assert_eq!(summary.entries, 1);
        assert!(archive.exists());
    }

    #[test]
    fn test_archive_failure_keeps_staging() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("results");
        touch(&staging, "webclient/a.js", "a");
        let blocker = touch(temp.path(), "blocker", "x");

        assert!(archive_and_clean(&staging, &blocker.join("out.zip"), false).is_err());
        assert!(staging.exists());
    }
}
