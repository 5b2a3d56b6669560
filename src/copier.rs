use std::fs::{self, File, OpenOptions};
use std::io;
use std::ops::Add;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::Ordering;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::aggregator::RunStats;
use crate::artifact::{Anchor, ArtifactRecord};
use crate::error::{is_disk_full, CollectError};

/// Outcome of staging a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// File was copied, with the number of bytes written
    Copied(u64),
    /// Destination already existed, nothing was written
    AlreadyStaged,
}

/// Per-step staging tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub staged: u64,
    pub bytes: u64,
    pub already_staged: u64,
    pub failed: u64,
}

impl Add for StageSummary {
    type Output = StageSummary;

    fn add(self, other: StageSummary) -> StageSummary {
        StageSummary {
            staged: self.staged + other.staged,
            bytes: self.bytes + other.bytes,
            already_staged: self.already_staged + other.already_staged,
            failed: self.failed + other.failed,
        }
    }
}

/// Compute where `src` lands under `staging_root`: everything from the first
/// path segment equal to the anchor onward.
pub fn staged_path(src: &Path, anchor: Anchor, staging_root: &Path) -> Result<PathBuf, CollectError> {
    let components: Vec<Component<'_>> = src.components().collect();

    let position = components
        .iter()
        .position(|c| matches!(c, Component::Normal(name) if *name == anchor.as_str()))
        .ok_or_else(|| CollectError::AnchorNotFound {
            path: src.to_path_buf(),
            anchor: anchor.as_str(),
        })?;

    let mut dst = staging_root.to_path_buf();
    for component in &components[position..] {
        dst.push(component.as_os_str());
    }
    Ok(dst)
}

/// Copy `src` to `dst` unless `dst` already exists.
/// The destination is opened with create-if-absent semantics, so concurrent
/// writers racing for the same destination copy it at most once.
pub fn copy_file_if_absent(src: &Path, dst: &Path) -> Result<CopyOutcome, CollectError> {
    if dst.exists() {
        return Ok(CopyOutcome::AlreadyStaged);
    }

    // Create parent directory if needed
    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                if is_disk_full(&e) {
                    return CollectError::DiskFull {
                        path: parent.to_path_buf(),
                    };
                }
                CollectError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    let copy_err = |e: io::Error| {
        if is_disk_full(&e) {
            return CollectError::DiskFull {
                path: dst.to_path_buf(),
            };
        }
        CollectError::CopyFailed {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source: e,
        }
    };

    let mut reader = File::open(src).map_err(copy_err)?;
    let permissions = reader.metadata().map_err(copy_err)?.permissions();

    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Ok(CopyOutcome::AlreadyStaged);
        }
        Err(e) => return Err(copy_err(e)),
    };

    let result = io::copy(&mut reader, &mut writer)
        .and_then(|bytes| writer.set_permissions(permissions).map(|()| bytes));

    match result {
        Ok(bytes) => Ok(CopyOutcome::Copied(bytes)),
        Err(e) => {
            // Never leave a truncated file behind: it would satisfy the next existence check
            drop(writer);
            let _ = fs::remove_file(dst);
            Err(copy_err(e))
        }
    }
}

/// Stage a single discovered file under `staging_root`
pub fn stage_file(record: &ArtifactRecord, staging_root: &Path) -> Result<CopyOutcome, CollectError> {
    let dst = staged_path(&record.path, record.anchor, staging_root)?;
    copy_file_if_absent(&record.path, &dst)
}

/// Stage every file in parallel. Per-file failures are logged and counted;
/// a full disk aborts the batch since no further copy can succeed.
pub fn stage_files(
    files: &[PathBuf],
    anchor: Anchor,
    staging_root: &Path,
    stats: &RunStats,
) -> Result<StageSummary, CollectError> {
    files
        .par_iter()
        .map(|src| {
            let record = ArtifactRecord::new(src.as_path(), anchor);
            match stage_file(&record, staging_root) {
                Ok(CopyOutcome::Copied(bytes)) => {
                    stats.files_staged.0.fetch_add(1, Ordering::Relaxed);
                    stats.bytes_staged.0.fetch_add(bytes, Ordering::Relaxed);
                    debug!(file = %src.display(), "staged");
                    Ok(StageSummary {
                        staged: 1,
                        bytes,
                        ..StageSummary::default()
                    })
                }
                Ok(CopyOutcome::AlreadyStaged) => {
                    stats.already_staged.0.fetch_add(1, Ordering::Relaxed);
                    Ok(StageSummary {
                        already_staged: 1,
                        ..StageSummary::default()
                    })
                }
                Err(e @ CollectError::DiskFull { .. }) => {
                    stats.errors.0.fetch_add(1, Ordering::Relaxed);
                    Err(e)
                }
                Err(e) => {
                    stats.errors.0.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, file = %src.display(), "skipping file");
                    Ok(StageSummary {
                        failed: 1,
                        ..StageSummary::default()
                    })
                }
            }
        })
        .try_reduce(StageSummary::default, |a, b| Ok(a + b))
}
