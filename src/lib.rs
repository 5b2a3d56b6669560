//! # Curam Artifact Collector
//!
//! Collects the client-facing artifacts of a Curam installation into a
//! single archive for delivery.
//!
//! This library scans a server-side (`EJBServer`) and a client-side
//! (`webclient`) component tree for style sheets and scripts, follows the
//! renderer plug-ins declared in `DomainsConfig.xml` descriptors to their Java
//! sources, stages everything under a shared directory and zips it up.
//!
//! ## Features
//!
//! - Component skip list with unrestricted fallback
//! - Parallel discovery and copying using Rayon
//! - Create-if-absent staging, safe under concurrent writers
//! - Renderer resolution from domain descriptors
//! - Progress tracking with atomic counters
//!
//! ## Usage
//!
//! ```ignore
//! use curam_artifact_collector::aggregator::{aggregate, NoProgress, RunContext};
//! use curam_artifact_collector::archiver::archive_and_clean;
//!
//! let ctx = RunContext::new(config);
//! let summary = aggregate(&ctx, &NoProgress)?;
//! archive_and_clean(&ctx.config.staging_dir, &ctx.config.archive_path, false)?;
//! ```

/// Run orchestration
pub mod aggregator;

/// Archive creation and staging cleanup
pub mod archiver;

/// Anchor, artifact kind, and component scope types
pub mod artifact;

/// CLI configuration and configuration file loading
pub mod config;

/// File staging with create-if-absent copies
pub mod copier;

/// Error types for collection operations
pub mod error;

/// Domain descriptor parsing and renderer source resolution
pub mod renderer;

/// Component scope resolution and file search
pub mod scanner;
