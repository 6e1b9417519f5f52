// src/repository/mod.rs

//! Remote rpm-md repositories
//!
//! This module provides functionality for:
//! - Fetching documents over HTTP with bounded retries ([`client`])
//! - Parsing repomd, primary and filelists documents ([`parsers`])
//! - Synchronizing many repositories into the cache ([`sync`])
//! - Mirroring repodata and binary packages on disk ([`mirror`])
//! - Verifying checksums announced by the metadata

pub mod client;
pub mod mirror;
pub mod parsers;
pub mod sync;

pub use client::{Fetcher, HTTP_TIMEOUT, HttpFetcher, RetryPolicy, fetch_with_retry};
pub use mirror::{DownloadReport, Mirror};
pub use sync::{BatchStatus, SyncOptions, SyncReport, TargetReport, TargetStatus, sync_repositories};

use crate::error::{Error, Result};
use crate::packages::{Checksum, ChecksumType};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// Hex digest of everything `reader` yields, for the SHA-2 family only
///
/// Returns `None` for algorithms that cannot be checked locally (md5, sha1).
pub fn digest(kind: ChecksumType, reader: &mut impl Read) -> Result<Option<String>> {
    fn hex<D: Digest + io::Write>(mut hasher: D, reader: &mut impl Read) -> Result<String> {
        io::copy(reader, &mut hasher)?;
        Ok(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
    }

    let value = match kind {
        ChecksumType::Sha224 => hex(Sha224::new(), reader)?,
        ChecksumType::Sha256 => hex(Sha256::new(), reader)?,
        ChecksumType::Sha384 => hex(Sha384::new(), reader)?,
        ChecksumType::Sha512 => hex(Sha512::new(), reader)?,
        ChecksumType::Md5 | ChecksumType::Sha1 => return Ok(None),
    };
    Ok(Some(value))
}

/// Verify data against the checksum announced by the metadata
///
/// Returns `Ok(false)` when the algorithm cannot be verified locally.
pub fn verify_checksum(data: &[u8], expected: &Checksum) -> Result<bool> {
    verify_reader(&mut &data[..], expected)
}

/// Verify a file on disk against an announced checksum
pub fn verify_file(path: &Path, expected: &Checksum) -> Result<bool> {
    debug!("Verifying checksum for {}", path.display());
    let mut file = File::open(path)?;
    verify_reader(&mut file, expected)
}

fn verify_reader(reader: &mut impl Read, expected: &Checksum) -> Result<bool> {
    let Some(actual) = digest(expected.kind, reader)? else {
        debug!("Cannot verify {} checksum {}", expected.kind.as_str(), expected.value);
        return Ok(false);
    };

    if actual != expected.value {
        return Err(Error::ChecksumMismatch {
            expected: expected.value.clone(),
            actual,
        });
    }

    debug!("Checksum verified: {}", expected.value);
    Ok(true)
}
