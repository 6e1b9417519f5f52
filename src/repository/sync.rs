// src/repository/sync.rs

//! Repository synchronization
//!
//! Every sync target runs the same pipeline:
//!
//! 1. fetch `repodata/repomd.xml` and compare its revision with the cache
//! 2. fetch, verify and parse the primary document
//! 3. optionally fetch the filelists document and attach file lists
//! 4. store the raw documents in the mirror
//!
//! Targets run concurrently on a bounded thread pool. Their outcomes are
//! merged into the cache afterwards, on the calling thread. A failing target
//! keeps its previous cache entry and never aborts the others.

use super::client::{Fetcher, RetryPolicy, fetch_with_retry};
use super::mirror::Mirror;
use super::parsers::{FileListMerger, FileListReader, DataFile, open_document, parse_primary, parse_repomd};
use super::verify_checksum;
use crate::cache::{ArchEntry, RepoCache, Repository};
use crate::config::SyncTarget;
use crate::error::{Error, Result};
use crate::packages::Package;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

const REPOMD_LOCATION: &str = "repodata/repomd.xml";

/// Default number of concurrent sync targets
pub const DEFAULT_JOBS: usize = 4;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Refetch even when the revision is unchanged
    pub force: bool,
    /// Fetch filelists and attach file paths
    pub with_files: bool,
    pub jobs: usize,
    pub retry: RetryPolicy,
    /// Architectures kept from whole-repository targets; empty keeps all
    pub arches: BTreeSet<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            with_files: true,
            jobs: DEFAULT_JOBS,
            retry: RetryPolicy::default(),
            arches: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Updated { packages: usize, files: usize },
    UpToDate,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: SyncTarget,
    /// Remote revision, when repomd.xml could be read
    pub revision: Option<String>,
    pub status: TargetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchStatus::Success => "success",
            BatchStatus::Partial => "partial",
            BatchStatus::Failed => "failed",
        })
    }
}

/// Per-target outcomes of one sync run, in target order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub targets: Vec<TargetReport>,
}

impl SyncReport {
    pub fn status(&self) -> BatchStatus {
        let failed = self.failures().count();
        if failed == 0 {
            BatchStatus::Success
        } else if failed == self.targets.len() {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets
            .iter()
            .filter(|t| matches!(t.status, TargetStatus::Failed { .. }))
    }

    pub fn updated(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| matches!(t.status, TargetStatus::Updated { .. }))
            .count()
    }
}

enum Fetched {
    UpToDate {
        revision: String,
    },
    Updated {
        revision: String,
        packages: Vec<Package>,
        files: usize,
    },
}

/// Fetch a data file and check it against the manifest
fn fetch_data(fetcher: &dyn Fetcher, target: &SyncTarget, data: &DataFile, retry: &RetryPolicy) -> Result<Vec<u8>> {
    let bytes = fetch_with_retry(fetcher, &target.join(&data.location), retry)?;

    if let Some(size) = data.size {
        if size != bytes.len() as u64 {
            return Err(Error::ParseError(format!(
                "{}: size {} does not match announced {}",
                data.location,
                bytes.len(),
                size
            )));
        }
    }
    if let Some(checksum) = &data.checksum {
        if !verify_checksum(&bytes, checksum)? {
            debug!("{}: {} checksum not verified", data.location, checksum.kind.as_str());
        }
    }
    Ok(bytes)
}

fn sync_target(
    fetcher: &dyn Fetcher,
    target: &SyncTarget,
    cache: &RepoCache,
    options: &SyncOptions,
    mirror: Option<&Mirror>,
) -> Result<Fetched> {
    let label = target.label();
    let repomd_bytes = fetch_with_retry(fetcher, &target.join(REPOMD_LOCATION), &options.retry)?;
    let repomd = parse_repomd(&repomd_bytes[..])?;

    let fresh = match &target.arch {
        Some(arch) => cache.is_fresh(&target.repo, arch, &repomd.revision),
        None if !options.arches.is_empty() => options
            .arches
            .iter()
            .all(|arch| cache.is_fresh(&target.repo, arch, &repomd.revision)),
        None => cache.is_repo_fresh(&target.repo, &repomd.revision),
    };
    if fresh && !options.force {
        info!("{} is up to date (revision {})", label, repomd.revision);
        return Ok(Fetched::UpToDate {
            revision: repomd.revision,
        });
    }

    info!("Fetching {} revision {}", label, repomd.revision);
    let primary_bytes = fetch_data(fetcher, target, &repomd.primary, &options.retry)?;
    let mut packages = parse_primary(
        open_document(&primary_bytes, &repomd.primary.location)?,
        &target.repo,
    )?;

    if target.arch.is_none() && !options.arches.is_empty() {
        packages.retain(|p| options.arches.contains(&p.arch));
    }

    let mut files = 0;
    let mut filelists_bytes = None;
    if options.with_files {
        if let Some(filelists) = &repomd.filelists {
            let bytes = fetch_data(fetcher, target, filelists, &options.retry)?;
            let merger = FileListMerger::new(&packages);
            for list in FileListReader::new(open_document(&bytes, &filelists.location)?) {
                if merger.attach(&mut packages, list?) {
                    files += 1;
                }
            }
            debug!("{}: attached file lists to {} of {} packages", label, files, packages.len());
            filelists_bytes = Some((filelists.location.clone(), bytes));
        } else {
            warn!("{} has no filelists document", label);
        }
    }

    if let Some(mirror) = mirror {
        mirror.store(target, REPOMD_LOCATION, &repomd_bytes)?;
        mirror.store(target, &repomd.primary.location, &primary_bytes)?;
        if let Some((location, bytes)) = &filelists_bytes {
            mirror.store(target, location, bytes)?;
        }
    }

    Ok(Fetched::Updated {
        revision: repomd.revision,
        packages,
        files,
    })
}

/// Sync every target into `cache`
///
/// Failed targets are reported, their cached entries are left untouched.
pub fn sync_repositories(
    fetcher: &dyn Fetcher,
    targets: &[SyncTarget],
    cache: &mut RepoCache,
    options: &SyncOptions,
    mirror: Option<&Mirror>,
) -> Result<SyncReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()
        .map_err(|e| Error::ConfigError(format!("Failed to create sync pool: {}", e)))?;

    info!("Synchronizing {} targets with {} jobs", targets.len(), options.jobs.max(1));

    let snapshot: &RepoCache = cache;
    let outcomes: Vec<Result<Fetched>> = pool.install(|| {
        targets
            .par_iter()
            .map(|target| sync_target(fetcher, target, snapshot, options, mirror))
            .collect()
    });

    let mut report = SyncReport::default();
    for (target, outcome) in targets.iter().zip(outcomes) {
        let (revision, status) = match outcome {
            Ok(Fetched::UpToDate { revision }) => (Some(revision), TargetStatus::UpToDate),
            Ok(Fetched::Updated {
                revision,
                packages,
                files,
            }) => {
                let count = packages.len();
                match &target.arch {
                    Some(arch) => {
                        cache.replace_entry(&target.repo, arch, ArchEntry::new(revision.as_str(), packages))
                    }
                    None => cache.replace_repository(Repository::partition(&target.repo, &revision, packages)),
                }
                info!("[OK] {}: {} packages", target.label(), count);
                (
                    Some(revision),
                    TargetStatus::Updated {
                        packages: count,
                        files,
                    },
                )
            }
            Err(e) => {
                warn!("[FAILED] {}: {}", target.label(), e);
                (None, TargetStatus::Failed { error: e.to_string() })
            }
        };

        report.targets.push(TargetReport {
            target: target.clone(),
            revision,
            status,
        });
    }

    info!("Sync finished: {}", report.status());
    Ok(report)
}
