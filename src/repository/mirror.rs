// src/repository/mirror.rs

//! On-disk mirror of repositories
//!
//! Layout below the mirror root:
//!
//! ```text
//! <repo>[/<arch>]/repodata/repomd.xml
//! <repo>[/<arch>]/repodata/<hash>-primary.xml.gz
//! <repo>[/<arch>]/<location of every downloaded package>
//! ```
//!
//! Every file is written to a temporary file in the destination directory
//! and renamed into place.

use super::client::{Fetcher, RetryPolicy, fetch_with_retry};
use super::verify_checksum;
use crate::config::SyncTarget;
use crate::error::{Error, Result};
use crate::packages::Package;
use crate::render::format_size;
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Root directory of a mirror
#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

/// Outcome of a package download batch
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: usize,
    /// Already present with the expected size
    pub kept: usize,
    pub bytes: u64,
    /// Package and the reason it could not be mirrored
    pub failed: Vec<(String, Error)>,
}

impl DownloadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

enum PackageOutcome {
    Downloaded(u64),
    Kept,
}

/// Reject locations that would escape the repository directory
fn relative_path(location: &str) -> Result<PathBuf> {
    let path = Path::new(location.trim_start_matches('/'));
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || path.as_os_str().is_empty() {
        return Err(Error::ParseError(format!("Unsafe location in metadata: {}", location)));
    }
    Ok(path.to_path_buf())
}

impl Mirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one repository, or one architecture of it
    pub fn target_dir(&self, repo: &str, arch: Option<&str>) -> PathBuf {
        let dir = self.root.join(repo);
        match arch {
            Some(arch) => dir.join(arch),
            None => dir,
        }
    }

    /// Destination of a file given by its location in the repository
    pub fn path_of(&self, target: &SyncTarget, location: &str) -> Result<PathBuf> {
        Ok(self
            .target_dir(&target.repo, target.arch.as_deref())
            .join(relative_path(location)?))
    }

    /// Atomically store raw bytes at `location` inside the target directory
    pub fn store(&self, target: &SyncTarget, location: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(target, location)?;
        write_atomic(&path, data)?;
        debug!("Stored {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    /// Download binary packages, skipping files already present with the right size
    ///
    /// Each package is fetched from the first target serving its repository
    /// (and architecture, for per-architecture targets). Failures are
    /// collected in the report and do not stop the batch.
    pub fn download_packages(
        &self,
        fetcher: &dyn Fetcher,
        packages: &[&Package],
        targets: &[SyncTarget],
        retry: &RetryPolicy,
        jobs: usize,
    ) -> Result<DownloadReport> {
        let total: u64 = packages.iter().map(|p| p.size).sum();
        info!("Downloading {} packages ({})", packages.len(), format_size(total));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create download pool: {}", e)))?;

        let results: Vec<(String, Result<PackageOutcome>)> = pool.install(|| {
            packages
                .par_iter()
                .map(|package| {
                    let result = self.download_package(fetcher, package, targets, retry);
                    (package.nevra(), result)
                })
                .collect()
        });

        let mut report = DownloadReport::default();
        for (nevra, result) in results {
            match result {
                Ok(PackageOutcome::Downloaded(bytes)) => {
                    report.downloaded += 1;
                    report.bytes += bytes;
                }
                Ok(PackageOutcome::Kept) => report.kept += 1,
                Err(e) => {
                    warn!("Failed to download {}: {}", nevra, e);
                    report.failed.push((nevra, e));
                }
            }
        }

        info!(
            "Downloaded {} packages ({}), kept {}, failed {}",
            report.downloaded,
            format_size(report.bytes),
            report.kept,
            report.failed.len()
        );
        Ok(report)
    }

    fn download_package(
        &self,
        fetcher: &dyn Fetcher,
        package: &Package,
        targets: &[SyncTarget],
        retry: &RetryPolicy,
    ) -> Result<PackageOutcome> {
        if package.location.is_empty() {
            return Err(Error::NotFoundError(format!("{} has no location", package.nevra())));
        }

        let target = targets
            .iter()
            .find(|t| t.repo == package.repo && t.arch.as_deref().is_none_or(|a| a == package.arch))
            .or_else(|| targets.iter().find(|t| t.repo == package.repo))
            .ok_or_else(|| {
                Error::NotFoundError(format!("No repository URL for {}", package))
            })?;

        let path = self.path_of(target, &package.location)?;
        if let Ok(metadata) = fs::metadata(&path) {
            if metadata.len() == package.size {
                debug!("Keeping {}", path.display());
                return Ok(PackageOutcome::Kept);
            }
            warn!(
                "File corrupted (size {} != expected {}): {}",
                metadata.len(),
                package.size,
                path.display()
            );
        }

        let url = target.join(&package.location);
        info!("Downloading {} to {}", url, path.display());
        let data = fetch_with_retry(fetcher, &url, retry)?;
        if !package.checksum.value.is_empty() {
            verify_checksum(&data, &package.checksum)?;
        }

        write_atomic(&path, &data)?;
        Ok(PackageOutcome::Downloaded(data.len() as u64))
    }
}

/// Write to a temporary file beside `path`, then rename over it
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::NotFoundError(format!("No parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
