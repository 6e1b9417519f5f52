// src/packages/mod.rs

//! Package records parsed from repository metadata
//!
//! A [`Package`] is created once by the primary parser and is read-only
//! afterwards, except for its file list which is attached at most once by
//! [`attach_files`](crate::repository::parsers::attach_files).

mod capability;

pub use capability::{Capability, CapabilityOp};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    /// MD5 (legacy, not for security)
    Md5,

    /// SHA-1, spelled `sha` in older repodata
    Sha1,

    Sha224,

    /// SHA-256 (default for current repodata)
    Sha256,

    Sha384,

    Sha512,
}

impl ChecksumType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumType::Md5 => "md5",
            ChecksumType::Sha1 => "sha1",
            ChecksumType::Sha224 => "sha224",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha384 => "sha384",
            ChecksumType::Sha512 => "sha512",
        }
    }
}

impl FromStr for ChecksumType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumType::Md5),
            "sha" | "sha1" => Ok(ChecksumType::Sha1),
            "sha224" => Ok(ChecksumType::Sha224),
            "sha256" => Ok(ChecksumType::Sha256),
            "sha384" => Ok(ChecksumType::Sha384),
            "sha512" => Ok(ChecksumType::Sha512),
            other => Err(format!("Unknown checksum type: {}", other)),
        }
    }
}

/// Integrity checksum as announced by the metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub kind: ChecksumType,
    /// Lowercase hex digest
    pub value: String,
}

impl Checksum {
    pub fn new(kind: ChecksumType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into().trim().to_ascii_lowercase(),
        }
    }
}

/// Identity used to deduplicate packages and to match file lists
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

/// A binary package described by a repository's primary metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub epoch: u32,
    pub version: String,
    pub release: String,

    /// Architecture (x86_64, aarch64, armv7hl, noarch, src, ...)
    pub arch: String,

    /// Name of the repository the package was read from
    pub repo: String,

    pub summary: Option<String>,
    pub description: Option<String>,

    /// Compressed package size in bytes
    pub size: u64,

    /// Installed size in bytes
    pub installed_size: u64,

    pub checksum: Checksum,

    /// Path of the binary package relative to the repository root
    pub location: String,

    pub provides: Vec<Capability>,
    pub requires: Vec<Capability>,

    /// File paths; `None` until a file list has been attached
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

impl Package {
    /// Create minimal package metadata for testing and tooling
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            epoch: 0,
            version: version.into(),
            release: release.into(),
            arch: arch.into(),
            repo: String::new(),
            summary: None,
            description: None,
            size: 0,
            installed_size: 0,
            checksum: Checksum::new(ChecksumType::Sha256, ""),
            location: String::new(),
            provides: Vec::new(),
            requires: Vec::new(),
            files: None,
        }
    }

    /// `[epoch:]version-release`
    pub fn evr(&self) -> String {
        format_evr(self.epoch, &self.version, Some(&self.release))
    }

    /// `name-[epoch:]version-release.arch`
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr(), self.arch)
    }

    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            version: self.version.clone(),
            release: self.release.clone(),
            arch: self.arch.clone(),
        }
    }

    /// Attached file paths, empty when no file list was merged
    pub fn files(&self) -> &[String] {
        self.files.as_deref().unwrap_or(&[])
    }

    /// Attach a file list; returns false when one was attached already
    pub fn attach_files(&mut self, files: Vec<String>) -> bool {
        if self.files.is_some() {
            return false;
        }
        self.files = Some(files);
        true
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repo.is_empty() {
            f.write_str(&self.nevra())
        } else {
            write!(f, "{} {}", self.repo, self.nevra())
        }
    }
}

/// Build an rpm version string, omitting a zero epoch
pub fn format_evr(epoch: u32, version: &str, release: Option<&str>) -> String {
    let mut evr = if epoch == 0 {
        version.to_string()
    } else {
        format!("{}:{}", epoch, version)
    };
    if let Some(release) = release.filter(|r| !r.is_empty()) {
        evr.push('-');
        evr.push_str(release);
    }
    evr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_creation() {
        let mut pkg = Package::new("timed", "3.6.1", "1.1", "armv7hl");
        pkg.epoch = 2;
        assert_eq!(pkg.evr(), "2:3.6.1-1.1");
        assert_eq!(pkg.nevra(), "timed-2:3.6.1-1.1.armv7hl");
        assert!(pkg.files().is_empty());
    }

    #[test]
    fn test_attach_files_once() {
        let mut pkg = Package::new("timed", "3.6.1", "1.1", "armv7hl");
        assert!(pkg.attach_files(vec!["/usr/bin/timed".to_string()]));
        assert!(!pkg.attach_files(vec!["/other".to_string()]));
        assert_eq!(pkg.files(), ["/usr/bin/timed".to_string()]);
    }

    #[test]
    fn test_checksum_type_parsing() {
        assert_eq!("sha".parse::<ChecksumType>().unwrap(), ChecksumType::Sha1);
        assert_eq!("SHA256".parse::<ChecksumType>().unwrap(), ChecksumType::Sha256);
        assert!("crc32".parse::<ChecksumType>().is_err());
    }

    #[test]
    fn test_format_evr() {
        assert_eq!(format_evr(0, "1.0", Some("1")), "1.0-1");
        assert_eq!(format_evr(1, "1.0", None), "1:1.0");
        assert_eq!(format_evr(0, "1.0", Some("")), "1.0");
    }
}
