// src/cache/mod.rs

//! Persistent package cache
//!
//! Packages are stored per repository and per architecture together with the
//! revision marker of the metadata they were parsed from:
//!
//! ```text
//! repo -> arch -> (revision, [Package])
//! ```
//!
//! The store is a zstd-compressed JSON document written with
//! write-temp-then-rename, so an interrupted save never damages the previous
//! cache. A missing or unreadable store loads as an empty cache.

use crate::error::{Error, Result};
use crate::filter::FilterSpec;
use crate::packages::Package;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File name of the cache store inside the repos path
pub const CACHE_FILE_NAME: &str = ".packages.cache";

const CACHE_MAGIC: &str = "reposcope-cache";
const CACHE_FORMAT_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

/// Packages of one architecture of one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchEntry {
    pub revision: String,
    pub packages: Vec<Package>,
}

impl ArchEntry {
    /// Build an entry, dropping packages that repeat a (name, version, release)
    pub fn new(revision: impl Into<String>, packages: Vec<Package>) -> Self {
        let mut seen = HashSet::with_capacity(packages.len());
        let total = packages.len();
        let packages: Vec<Package> = packages
            .into_iter()
            .filter(|p| seen.insert((p.name.clone(), p.version.clone(), p.release.clone())))
            .collect();

        if packages.len() != total {
            warn!("Dropped {} duplicate package entries", total - packages.len());
        }

        Self {
            revision: revision.into(),
            packages,
        }
    }
}

/// A repository with its per-architecture package lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub arches: BTreeMap<String, ArchEntry>,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arches: BTreeMap::new(),
        }
    }

    /// Split one repository document into per-architecture entries
    ///
    /// Document order is kept inside every architecture.
    pub fn partition(name: impl Into<String>, revision: &str, packages: Vec<Package>) -> Self {
        let mut by_arch: BTreeMap<String, Vec<Package>> = BTreeMap::new();
        for package in packages {
            by_arch.entry(package.arch.clone()).or_default().push(package);
        }

        Self {
            name: name.into(),
            arches: by_arch
                .into_iter()
                .map(|(arch, packages)| (arch, ArchEntry::new(revision, packages)))
                .collect(),
        }
    }

    pub fn package_count(&self) -> usize {
        self.arches.values().map(|e| e.packages.len()).sum()
    }
}

/// In-memory cache mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoCache {
    repos: BTreeMap<String, Repository>,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    magic: &'a str,
    version: u32,
    saved_at: DateTime<Utc>,
    repos: &'a BTreeMap<String, Repository>,
}

#[derive(Deserialize)]
struct CacheFile {
    magic: String,
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    repos: BTreeMap<String, Repository>,
}

impl RepoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache, degrading to an empty cache when absent or unreadable
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(cache) => cache,
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache at {}, starting cold", path.display());
                Self::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Load the cache, reporting why it could not be read
    pub fn try_load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let decoder = zstd::stream::read::Decoder::new(BufReader::new(file))
            .map_err(|e| Error::CacheError(format!("{}: {}", path.display(), e)))?;

        let stored: CacheFile = serde_json::from_reader(decoder)
            .map_err(|e| Error::CacheError(format!("{}: {}", path.display(), e)))?;

        if stored.magic != CACHE_MAGIC || stored.version != CACHE_FORMAT_VERSION {
            return Err(Error::CacheError(format!(
                "{}: unsupported cache format {} v{}",
                path.display(),
                stored.magic,
                stored.version
            )));
        }

        let cache = Self { repos: stored.repos };
        info!(
            "Loaded cache {} ({} repositories, {} packages, saved {})",
            path.display(),
            cache.repos.len(),
            cache.package_count(),
            stored
                .saved_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "at unknown time".to_string())
        );
        Ok(cache)
    }

    /// Persist atomically: write a temporary file beside `path`, then rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let temp = NamedTempFile::new_in(dir)?;
        let mut encoder = zstd::stream::write::Encoder::new(temp, ZSTD_LEVEL)
            .map_err(|e| Error::CacheError(format!("Failed to start compression: {}", e)))?;

        let stored = CacheFileRef {
            magic: CACHE_MAGIC,
            version: CACHE_FORMAT_VERSION,
            saved_at: Utc::now(),
            repos: &self.repos,
        };
        serde_json::to_writer(&mut encoder, &stored)
            .map_err(|e| Error::CacheError(format!("Failed to serialize cache: {}", e)))?;

        let mut temp = encoder.finish()?;
        temp.flush()?;
        temp.as_file().sync_all()?;

        temp.persist(path).map_err(|e| {
            Error::CacheError(format!("Failed to replace {}: {}", path.display(), e.error))
        })?;

        debug!("Saved cache with {} packages to {}", self.package_count(), path.display());
        Ok(())
    }

    /// Whether the stored revision of (repo, arch) equals the remote one
    pub fn is_fresh(&self, repo: &str, arch: &str, remote_revision: &str) -> bool {
        self.entry(repo, arch)
            .is_some_and(|entry| entry.revision == remote_revision)
    }

    /// Whether every stored architecture of `repo` carries the remote revision
    pub fn is_repo_fresh(&self, repo: &str, remote_revision: &str) -> bool {
        self.repos.get(repo).is_some_and(|r| {
            !r.arches.is_empty() && r.arches.values().all(|e| e.revision == remote_revision)
        })
    }

    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repos.get(name)
    }

    pub fn entry(&self, repo: &str, arch: &str) -> Option<&ArchEntry> {
        self.repos.get(repo).and_then(|r| r.arches.get(arch))
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Repository> {
        self.repos.values()
    }

    /// Replace a whole repository, dropping architectures it no longer has
    pub fn replace_repository(&mut self, repository: Repository) {
        self.repos.insert(repository.name.clone(), repository);
    }

    /// Replace the entry of one architecture of a repository
    pub fn replace_entry(&mut self, repo: &str, arch: &str, entry: ArchEntry) {
        self.repos
            .entry(repo.to_string())
            .or_insert_with(|| Repository::new(repo))
            .arches
            .insert(arch.to_string(), entry);
    }

    /// All cached packages: repository order, then architecture, then document order
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.repos
            .values()
            .flat_map(|r| r.arches.values())
            .flat_map(|e| e.packages.iter())
    }

    /// Packages of the repositories and architectures chosen by `selection`
    ///
    /// Only the selection predicates of the filter are applied, so the
    /// result is the unfiltered universe dependencies are resolved against.
    pub fn universe(&self, selection: &FilterSpec) -> Vec<&Package> {
        selection.selection().apply(self.packages())
    }

    /// Revision of every cached (repo, arch)
    pub fn revisions(&self) -> Vec<(&str, &str, &str)> {
        self.repos
            .values()
            .flat_map(|r| {
                r.arches
                    .iter()
                    .map(move |(arch, e)| (r.name.as_str(), arch.as_str(), e.revision.as_str()))
            })
            .collect()
    }

    pub fn package_count(&self) -> usize {
        self.repos.values().map(Repository::package_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}
