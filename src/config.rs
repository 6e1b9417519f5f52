// src/config.rs

//! Mirror configuration stored beside the cache
//!
//! ```toml
//! url = "https://repo.example.org/obs/{repo}/"
//! repos = ["oss", "non-oss"]
//! arches = ["aarch64", "noarch"]
//! ```
//!
//! Values given on the command line override the stored ones.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// File name of the configuration inside the repos path
pub const CONF_FILE_NAME: &str = ".conf.toml";

const REPO_PLACEHOLDER: &str = "{repo}";
const ARCH_PLACEHOLDER: &str = "{arch}";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// URL template containing `{repo}` and optionally `{arch}`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub repos: Vec<String>,

    /// Architectures to keep; empty keeps all
    #[serde(default)]
    pub arches: Vec<String>,
}

/// One unit of work for the sync pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub repo: String,
    /// Set when the URL template is per architecture
    pub arch: Option<String>,
    /// Repository base URL, always ending with `/`
    pub url: String,
}

impl SyncTarget {
    /// `repo` or `repo/arch`, used for logs and the mirror layout
    pub fn label(&self) -> String {
        match &self.arch {
            Some(arch) => format!("{}/{}", self.repo, arch),
            None => self.repo.clone(),
        }
    }

    /// Absolute URL of a path relative to the repository root
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.url, path.trim_start_matches('/'))
    }
}

/// Split space separated values, dropping empty ones
pub fn space_separated(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl MirrorConfig {
    /// Load the configuration, or an empty one when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Config file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Override stored values with the ones given explicitly
    pub fn merge(mut self, url: Option<&str>, repos: Option<&str>, arches: Option<&str>) -> Self {
        if let Some(url) = url {
            self.url = url.to_string();
        }
        if let Some(repos) = repos.map(space_separated).filter(|r| !r.is_empty()) {
            self.repos = repos;
        }
        if let Some(arches) = arches.map(space_separated).filter(|a| !a.is_empty()) {
            self.arches = arches;
        }
        self
    }

    /// Check that a sync can be started from this configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::ConfigError("missing repository URL (--url)".to_string()));
        }
        if self.repos.is_empty() {
            return Err(Error::ConfigError("missing repository names (--repos)".to_string()));
        }
        if !self.url.contains(REPO_PLACEHOLDER) && self.repos.len() > 1 {
            return Err(Error::ConfigError(format!(
                "URL template {} has no {} placeholder but {} repositories are configured",
                self.url,
                REPO_PLACEHOLDER,
                self.repos.len()
            )));
        }
        if self.is_per_arch() && self.arches.is_empty() {
            return Err(Error::ConfigError(format!(
                "URL template {} needs at least one architecture (--arch)",
                self.url
            )));
        }
        Ok(())
    }

    /// Whether the URL template selects one architecture per target
    pub fn is_per_arch(&self) -> bool {
        self.url.contains(ARCH_PLACEHOLDER)
    }

    /// Expand the URL template into sync targets, in configuration order
    pub fn targets(&self) -> Result<Vec<SyncTarget>> {
        self.validate()?;

        let expand = |repo: &str, arch: Option<&str>| {
            let mut url = self.url.replace(REPO_PLACEHOLDER, repo);
            if let Some(arch) = arch {
                url = url.replace(ARCH_PLACEHOLDER, arch);
            }
            if !url.ends_with('/') {
                url.push('/');
            }
            SyncTarget {
                repo: repo.to_string(),
                arch: arch.map(str::to_string),
                url,
            }
        };

        let targets = if self.is_per_arch() {
            self.repos
                .iter()
                .flat_map(|repo| self.arches.iter().map(move |arch| (repo, arch)))
                .map(|(repo, arch)| expand(repo.as_str(), Some(arch.as_str())))
                .collect()
        } else {
            self.repos.iter().map(|repo| expand(repo.as_str(), None)).collect()
        };

        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(url: &str) -> MirrorConfig {
        MirrorConfig {
            url: url.to_string(),
            repos: vec!["oss".to_string(), "non-oss".to_string()],
            arches: vec!["aarch64".to_string(), "noarch".to_string()],
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let loaded = MirrorConfig::load(&dir.path().join(CONF_FILE_NAME)).unwrap();
        assert_eq!(loaded, MirrorConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONF_FILE_NAME);
        let conf = config("https://example.org/{repo}/");

        conf.save(&path).unwrap();
        assert_eq!(MirrorConfig::load(&path).unwrap(), conf);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONF_FILE_NAME);
        fs::write(&path, "url = [").unwrap();
        assert!(matches!(MirrorConfig::load(&path), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_merge_overrides() {
        let merged = config("https://old/{repo}").merge(Some("https://new/{repo}"), Some("  "), Some("x86_64"));
        assert_eq!(merged.url, "https://new/{repo}");
        assert_eq!(merged.repos, vec!["oss", "non-oss"]);
        assert_eq!(merged.arches, vec!["x86_64"]);
    }

    #[test]
    fn test_validate() {
        assert!(MirrorConfig::default().validate().is_err());
        assert!(config("https://example.org/single/").validate().is_err());
        assert!(config("https://example.org/{repo}/").validate().is_ok());

        let mut per_arch = config("https://example.org/{repo}/{arch}");
        per_arch.arches.clear();
        assert!(matches!(per_arch.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_targets_per_repo() {
        let targets = config("https://example.org/{repo}").targets().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].url, "https://example.org/oss/");
        assert_eq!(targets[1].label(), "non-oss");
        assert_eq!(targets[0].join("repodata/repomd.xml"), "https://example.org/oss/repodata/repomd.xml");
    }

    #[test]
    fn test_targets_per_arch() {
        let targets = config("https://example.org/{repo}/{arch}/").targets().unwrap();
        let labels: Vec<String> = targets.iter().map(SyncTarget::label).collect();
        assert_eq!(labels, vec!["oss/aarch64", "oss/noarch", "non-oss/aarch64", "non-oss/noarch"]);
        assert_eq!(targets[3].url, "https://example.org/non-oss/noarch/");
    }
}
