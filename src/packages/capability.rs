// src/packages/capability.rs

//! Provides/requires entries attached to packages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a versioned capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CapabilityOp {
    /// Map the `flags` attribute used by rpm-md (`EQ`, `LT`, `LE`, `GT`, `GE`)
    pub fn from_flags(flags: &str) -> Option<Self> {
        match flags {
            "EQ" => Some(CapabilityOp::Eq),
            "LT" => Some(CapabilityOp::Lt),
            "LE" => Some(CapabilityOp::Le),
            "GT" => Some(CapabilityOp::Gt),
            "GE" => Some(CapabilityOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CapabilityOp::Eq => "=",
            CapabilityOp::Lt => "<",
            CapabilityOp::Le => "<=",
            CapabilityOp::Gt => ">",
            CapabilityOp::Ge => ">=",
        }
    }
}

/// A named feature a package provides or requires
///
/// Names are opaque strings: `libc.so.6(GLIBC_2.34)(64bit)`, `perl(Carp)`,
/// `rpmlib(PayloadIsZstd)` and plain package names are all matched by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<CapabilityOp>,

    /// `[epoch:]ver[-rel]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Capability {
    /// Unversioned capability
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: None,
            version: None,
        }
    }

    /// Capability constrained by an operator and version
    pub fn versioned(name: impl Into<String>, op: CapabilityOp, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: Some(op),
            version: Some(version.into()),
        }
    }

    /// Requirement on a path rather than a named feature
    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }

    /// Internal rpm feature marker such as `rpmlib(CompressedFileNames)`
    pub fn is_rpmlib(&self) -> bool {
        self.name.starts_with("rpmlib(")
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.op, &self.version) {
            (Some(op), Some(version)) => write!(f, "{} {} {}", self.name, op.symbol(), version),
            _ => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_mapping() {
        assert_eq!(CapabilityOp::from_flags("GE"), Some(CapabilityOp::Ge));
        assert_eq!(CapabilityOp::from_flags("LT"), Some(CapabilityOp::Lt));
        assert_eq!(CapabilityOp::from_flags("XX"), None);
        assert_eq!(CapabilityOp::Le.symbol(), "<=");
    }

    #[test]
    fn test_display() {
        assert_eq!(Capability::new("libbar").to_string(), "libbar");
        let cap = Capability::versioned("glibc", CapabilityOp::Ge, "2.34-1");
        assert_eq!(cap.to_string(), "glibc >= 2.34-1");
    }

    #[test]
    fn test_kinds() {
        assert!(Capability::new("/bin/sh").is_file());
        assert!(Capability::new("rpmlib(PayloadIsXz)").is_rpmlib());
        assert!(!Capability::new("perl(Carp)").is_file());
    }
}
