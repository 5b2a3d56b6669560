//! Run orchestration for artifact collection.
//!
//! Handles the concurrent collection steps of a run, with support for:
//! - Style sheet and script copying from both source trees
//! - Renderer source resolution from domain descriptors
//! - Progress tracking with cache-aligned atomic counters

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::artifact::{Anchor, ArtifactKind, ComponentScope};
use crate::config::Config;
use crate::copier::{stage_files, StageSummary};
use crate::error::{is_disk_full, CollectError};
use crate::renderer::resolve_renderers;
use crate::scanner::{collect, resolve_scope, SearchPattern};

/// Cache-line aligned atomic counter to prevent false sharing
/// Each counter is on its own 64-byte cache line
#[repr(align(64))]
pub struct CacheAlignedAtomic(pub AtomicU64);

impl CacheAlignedAtomic {
    pub const fn new(val: u64) -> Self {
        Self(AtomicU64::new(val))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run-wide counters, only ever incremented
pub struct RunStats {
    pub files_staged: CacheAlignedAtomic,
    pub bytes_staged: CacheAlignedAtomic,
    pub already_staged: CacheAlignedAtomic,
    pub errors: CacheAlignedAtomic,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            files_staged: CacheAlignedAtomic::new(0),
            bytes_staged: CacheAlignedAtomic::new(0),
            already_staged: CacheAlignedAtomic::new(0),
            errors: CacheAlignedAtomic::new(0),
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a run needs, built once and passed to every step
pub struct RunContext {
    pub config: Config,
    pub stats: RunStats,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stats: RunStats::new(),
        }
    }
}

/// One top-level unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Copy every file of a kind from one source tree
    Copy { anchor: Anchor, kind: ArtifactKind },
    /// Stage descriptors and the renderer sources they declare
    Renderers,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Copy { anchor, kind } => write!(f, "{kind} {anchor}"),
            Step::Renderers => f.write_str("renderers"),
        }
    }
}

/// The five steps of a run: four copy steps and renderer resolution
pub fn step_plan() -> Vec<Step> {
    let mut steps = Vec::with_capacity(5);
    for anchor in Anchor::ALL {
        for kind in [ArtifactKind::Css, ArtifactKind::Script] {
            steps.push(Step::Copy { anchor, kind });
        }
    }
    steps.push(Step::Renderers);
    steps
}

/// Step outcome
#[derive(Debug)]
pub enum StepStatus {
    /// Ran to completion (individual files may still have been skipped)
    Success,
    /// Aborted with error
    Failed(CollectError),
}

/// Result of one step
#[derive(Debug)]
pub struct StepReport {
    pub step: Step,
    pub status: StepStatus,
    pub summary: StageSummary,
    pub duration: Duration,
}

/// Notified as steps settle; purely observational
pub trait ProgressObserver: Sync {
    fn step_finished(&self, report: &StepReport);
}

/// Observer that ignores all progress
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn step_finished(&self, _report: &StepReport) {}
}

impl ProgressObserver for ProgressBar {
    fn step_finished(&self, report: &StepReport) {
        self.set_message(report.step.to_string());
        self.inc(1);
    }
}

/// Search one tree for a kind and stage the matches. A bad pattern counts as
/// zero matches.
fn copy_step(
    ctx: &RunContext,
    scope: &ComponentScope,
    anchor: Anchor,
    kind: ArtifactKind,
) -> Result<StageSummary, CollectError> {
    let root = ctx.config.sources.root_for(anchor);
    let pattern = SearchPattern::for_kind(root, kind, scope);

    let files = collect(&pattern).unwrap_or_else(|e| {
        ctx.stats.errors.0.fetch_add(1, Ordering::Relaxed);
        warn!(error = %e, "search failed, treating as no matches");
        Vec::new()
    });

    stage_files(&files, anchor, &ctx.config.staging_dir, &ctx.stats)
}

/// Stage every domain descriptor of the client tree (unless disabled), then
/// the renderer sources they declare.
fn renderer_step(ctx: &RunContext, scope: &ComponentScope) -> Result<StageSummary, CollectError> {
    let client_root = &ctx.config.sources.client_root;
    let pattern = SearchPattern::for_kind(client_root, ArtifactKind::DomainDescriptor, scope);

    let descriptors = collect(&pattern).unwrap_or_else(|e| {
        ctx.stats.errors.0.fetch_add(1, Ordering::Relaxed);
        warn!(error = %e, "descriptor search failed, treating as no matches");
        Vec::new()
    });

    let staged_descriptors = if ctx.config.stage_descriptors {
        stage_files(
            &descriptors,
            Anchor::WebClient,
            &ctx.config.staging_dir,
            &ctx.stats,
        )?
    } else {
        StageSummary::default()
    };
    let renderers = resolve_renderers(
        &descriptors,
        client_root,
        &ctx.config.staging_dir,
        &ctx.stats,
    )?;

    Ok(staged_descriptors + renderers)
}

/// Run a single step and report how it settled
pub fn run_step(step: Step, ctx: &RunContext, scope: &ComponentScope) -> StepReport {
    let start = Instant::now();

    let result = match step {
        Step::Copy { anchor, kind } => copy_step(ctx, scope, anchor, kind),
        Step::Renderers => renderer_step(ctx, scope),
    };

    let (status, summary) = match result {
        Ok(summary) => (StepStatus::Success, summary),
        Err(e) => {
            warn!(step = %step, error = %e, "step failed");
            (StepStatus::Failed(e), StageSummary::default())
        }
    };

    StepReport {
        step,
        status,
        summary,
        duration: start.elapsed(),
    }
}

/// Run every step concurrently; returns once all of them have settled
pub fn run_steps(
    steps: &[Step],
    ctx: &RunContext,
    scope: &ComponentScope,
    progress: &dyn ProgressObserver,
) -> Vec<StepReport> {
    steps
        .par_iter()
        .map(|step| {
            let report = run_step(*step, ctx, scope);
            progress.step_finished(&report);
            report
        })
        .collect()
}

/// Collect step results, returning (reports, has_failure)
pub fn collect_results(reports: Vec<StepReport>) -> (Vec<StepReport>, bool) {
    let has_failure = reports
        .iter()
        .any(|r| matches!(r.status, StepStatus::Failed(_)));
    (reports, has_failure)
}

/// Create the staging directory if needed
pub fn prepare_staging(staging_dir: &Path) -> Result<(), CollectError> {
    fs::create_dir_all(staging_dir).map_err(|e| {
        if is_disk_full(&e) {
            return CollectError::DiskFull {
                path: staging_dir.to_path_buf(),
            };
        }
        CollectError::CreateDirFailed {
            path: staging_dir.to_path_buf(),
            source: e,
        }
    })
}

/// Outcome of the collection phase of a run
#[derive(Debug)]
pub struct CollectionSummary {
    pub scope: ComponentScope,
    pub reports: Vec<StepReport>,
    pub has_failure: bool,
}

/// Resolve the component scope, prepare staging, and run all steps.
/// Only scope resolution and staging preparation are fatal.
pub fn aggregate(
    ctx: &RunContext,
    progress: &dyn ProgressObserver,
) -> Result<CollectionSummary, CollectError> {
    let sources = &ctx.config.sources;
    let scope = resolve_scope(
        &sources.server_root,
        &sources.client_root,
        &sources.skip_components,
    )?;
    info!(components = scope.len(), "resolved component scope");

    prepare_staging(&ctx.config.staging_dir)?;

    let reports = run_steps(&step_plan(), ctx, &scope, progress);
    let (reports, has_failure) = collect_results(reports);

    Ok(CollectionSummary {
        scope,
        reports,
        has_failure,
    })
}
