// src/lib.rs

//! Reposcope
//!
//! Mirrors RPM repositories (openSUSE/OBS, Sailfish, Fedora-style
//! `repodata/`) and analyses their metadata offline.
//!
//! # Architecture
//!
//! - Parsers: streaming repomd/primary/filelists readers
//! - Cache: per repository and architecture, refreshed by revision
//! - Filter: stateless predicates over packages, order preserving
//! - Resolver: capability index and dependency edges over a full universe
//! - Tree: forward and reverse dependency trees with an ancestor-path guard

pub mod cache;
pub mod config;
mod error;
pub mod filter;
pub mod packages;
pub mod render;
pub mod repository;
pub mod resolver;
pub mod tree;

pub use error::{Error, FetchError, Result};
