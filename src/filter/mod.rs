// src/filter/mod.rs

//! Package filter engine
//!
//! A [`FilterSpec`] is a set of independent predicates that are ANDed
//! together. Filtering never reorders packages and never mutates them.

mod pattern;

pub use pattern::{MatchMode, Pattern, PatternSet};

use crate::error::{Error, Result};
use crate::packages::Package;
use std::collections::BTreeSet;

/// Name fragments identifying development, test and debug packages
pub const DEVEL_PACKAGE_NAMES: &[&str] = &[
    "-devel",
    "-test",
    "-tests",
    "-debuginfo",
    "-debugsource",
    "linux-headers",
    "-sysroot",
];

/// Whether a package name looks like a devel/test/debug package
pub fn is_devel_name(name: &str) -> bool {
    DEVEL_PACKAGE_NAMES.iter().any(|fragment| name.contains(fragment))
}

/// Substring match over summary and description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFilter {
    needles: Vec<(String, bool)>,
}

impl SummaryFilter {
    /// Each token is one needle; a leading `~` makes it case-insensitive
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut needles = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            let (text, case_insensitive) = match token.strip_prefix('~') {
                Some(text) => (text.to_lowercase(), true),
                None => (token.to_string(), false),
            };
            if text.is_empty() {
                return Err(Error::filter_spec(token, "empty summary pattern"));
            }
            needles.push((text, case_insensitive));
        }
        Ok(Self { needles })
    }

    pub fn matches(&self, package: &Package) -> bool {
        let texts = [package.summary.as_deref(), package.description.as_deref()];
        self.needles.iter().any(|(needle, case_insensitive)| {
            texts.iter().flatten().any(|text| {
                if *case_insensitive {
                    text.to_lowercase().contains(needle.as_str())
                } else {
                    text.contains(needle.as_str())
                }
            })
        })
    }
}

/// Set of ANDed predicates over packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub names: Option<PatternSet>,
    /// Keep only these architectures (when non-empty)
    pub arches: BTreeSet<String>,
    pub exclude_arches: BTreeSet<String>,
    /// Keep only these repositories (when non-empty)
    pub repos: BTreeSet<String>,
    pub exclude_devel: bool,
    pub provides: Option<PatternSet>,
    pub requires: Option<PatternSet>,
    pub files: Option<PatternSet>,
    pub summary: Option<SummaryFilter>,
    /// Inclusive download size bounds in bytes
    pub size_min: Option<u64>,
    pub size_max: Option<u64>,
}

fn space_separated<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|v| {
            v.as_ref()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(mut self, tokens: &str) -> Result<Self> {
        self.names = Some(PatternSet::parse(tokens)?);
        Ok(self)
    }

    pub fn with_provides(mut self, tokens: &str) -> Result<Self> {
        self.provides = Some(PatternSet::parse(tokens)?);
        Ok(self)
    }

    pub fn with_requires(mut self, tokens: &str) -> Result<Self> {
        self.requires = Some(PatternSet::parse(tokens)?);
        Ok(self)
    }

    pub fn with_files(mut self, tokens: &str) -> Result<Self> {
        self.files = Some(PatternSet::parse(tokens)?);
        Ok(self)
    }

    /// Summary text is a single needle, spaces included
    pub fn with_summary(mut self, text: &str) -> Result<Self> {
        self.summary = Some(SummaryFilter::from_tokens([text])?);
        Ok(self)
    }

    pub fn with_arches<I, S>(mut self, arches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.arches = space_separated(arches);
        self
    }

    pub fn without_arches<I, S>(mut self, arches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_arches = space_separated(arches);
        self
    }

    pub fn with_repos<I, S>(mut self, repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.repos = space_separated(repos);
        self
    }

    pub fn exclude_devel(mut self, exclude: bool) -> Self {
        self.exclude_devel = exclude;
        self
    }

    pub fn with_size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.size_min = min;
        self.size_max = max;
        self
    }

    /// Only the repository and architecture predicates
    ///
    /// This selects the resolution universe: the display predicates (name,
    /// relations, files, summary, size, devel) must never shrink it.
    pub fn selection(&self) -> Self {
        Self {
            arches: self.arches.clone(),
            exclude_arches: self.exclude_arches.clone(),
            repos: self.repos.clone(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate every predicate against one package
    pub fn matches(&self, package: &Package) -> bool {
        if !self.arches.is_empty() && !self.arches.contains(&package.arch) {
            return false;
        }
        if self.exclude_arches.contains(&package.arch) {
            return false;
        }
        if !self.repos.is_empty() && !self.repos.contains(&package.repo) {
            return false;
        }
        if self.exclude_devel && is_devel_name(&package.name) {
            return false;
        }
        if self.size_min.is_some_and(|min| package.size < min)
            || self.size_max.is_some_and(|max| package.size > max)
        {
            return false;
        }
        if let Some(names) = &self.names {
            if !names.matches(&package.name) {
                return false;
            }
        }
        if let Some(summary) = &self.summary {
            if !summary.matches(package) {
                return false;
            }
        }
        if let Some(requires) = &self.requires {
            if !requires.matches_any(package.requires.iter().map(|c| c.name.as_str())) {
                return false;
            }
        }
        if let Some(provides) = &self.provides {
            if !provides.matches_any(package.provides.iter().map(|c| c.name.as_str())) {
                return false;
            }
        }
        if let Some(files) = &self.files {
            match &package.files {
                Some(paths) => {
                    if !files.matches_any(paths.iter().map(String::as_str)) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// Keep matching packages in their original order
    pub fn apply<'a, I>(&self, packages: I) -> Vec<&'a Package>
    where
        I: IntoIterator<Item = &'a Package>,
    {
        packages.into_iter().filter(|p| self.matches(p)).collect()
    }
}

/// Filter `packages` by `spec`, preserving order
pub fn apply<'a, I>(packages: I, spec: &FilterSpec) -> Vec<&'a Package>
where
    I: IntoIterator<Item = &'a Package>,
{
    spec.apply(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::Capability;

    fn package(name: &str, arch: &str) -> Package {
        let mut p = Package::new(name, "1", "1", arch);
        p.repo = "oss".to_string();
        p
    }

    fn universe() -> Vec<Package> {
        let mut timed = package("timed", "armv7hl");
        timed.summary = Some("Time daemon".to_string());
        timed.description = Some("Keeps the MDM clock in sync".to_string());
        timed.provides = vec![Capability::new("libtimed.so.3"), Capability::new("timed")];
        timed.requires = vec![Capability::new("libc.so.6(GLIBC_2.34)")];
        timed.size = 500;
        timed.attach_files(vec!["/usr/bin/timed".to_string()]);

        let mut devel = package("timed-devel", "armv7hl");
        devel.requires = vec![Capability::new("timed")];
        devel.size = 50;
        devel.attach_files(vec!["/usr/include/timed.h".to_string()]);

        let mut connman = package("connman", "aarch64");
        connman.size = 5_000;
        connman.attach_files(vec!["/usr/sbin/connmand".to_string(), "/usr/bin/connmanctl".to_string()]);

        let libfoo = package("libfoo", "noarch");
        let foo = package("foo", "noarch");

        vec![timed, devel, connman, libfoo, foo]
    }

    fn names(packages: &[&Package]) -> Vec<String> {
        packages.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_empty_spec_is_identity() {
        let all = universe();
        let spec = FilterSpec::new();
        assert!(spec.is_empty());
        let result = apply(&all, &spec);
        assert_eq!(result.len(), all.len());
        assert!(result.iter().zip(&all).all(|(a, b)| std::ptr::eq(*a, b)));
    }

    #[test]
    fn test_name_prefix_or_suffix() {
        let all = universe();
        let spec = FilterSpec::new().with_names("^lib #-devel").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed-devel", "libfoo"]);
    }

    #[test]
    fn test_negation_precedence() {
        let all = universe();
        let spec = FilterSpec::new().with_names("foo =foo !=foo").unwrap();
        let result = apply(&all, &spec);
        assert!(result.iter().all(|p| p.name != "foo"));
        assert_eq!(names(&result), vec!["libfoo"]);

        let spec = FilterSpec::new().with_names("!foo").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed", "timed-devel", "connman"]);
    }

    #[test]
    fn test_idempotence() {
        let all = universe();
        let spec = FilterSpec::new()
            .with_names("timed connman")
            .unwrap()
            .exclude_devel(true);
        let once = apply(&all, &spec);
        let twice = apply(once.iter().copied(), &spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_arch_filters() {
        let all = universe();
        let spec = FilterSpec::new().with_arches(["armv7hl noarch"]).without_arches(["noarch"]);
        assert_eq!(names(&apply(&all, &spec)), vec!["timed", "timed-devel"]);
    }

    #[test]
    fn test_exclude_devel() {
        assert!(is_devel_name("glibc-debuginfo"));
        assert!(is_devel_name("kernel-linux-headers"));
        assert!(!is_devel_name("timed"));

        let all = universe();
        let spec = FilterSpec::new().exclude_devel(true);
        assert!(!names(&apply(&all, &spec)).contains(&"timed-devel".to_string()));
    }

    #[test]
    fn test_relation_filters() {
        let all = universe();
        let spec = FilterSpec::new().with_provides("^libtimed").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed"]);

        let spec = FilterSpec::new().with_requires("=timed").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed-devel"]);

        let spec = FilterSpec::new().with_requires("GLIBC").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed"]);
    }

    #[test]
    fn test_files_filter() {
        let all = universe();
        let spec = FilterSpec::new().with_files("^/usr/bin/ ^/bin/").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed", "connman"]);

        // packages without a file list never pass
        let spec = FilterSpec::new().with_files("!nothing").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed", "timed-devel", "connman"]);
    }

    #[test]
    fn test_summary_filter() {
        let all = universe();
        let spec = FilterSpec::new().with_summary("MDM").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed"]);

        let spec = FilterSpec::new().with_summary("mdm").unwrap();
        assert!(apply(&all, &spec).is_empty());

        let spec = FilterSpec::new().with_summary("~mdm").unwrap();
        assert_eq!(names(&apply(&all, &spec)), vec!["timed"]);

        assert!(FilterSpec::new().with_summary("~").is_err());
    }

    #[test]
    fn test_size_and_repo() {
        let all = universe();
        let spec = FilterSpec::new().with_size_range(Some(50), Some(500));
        assert_eq!(names(&apply(&all, &spec)), vec!["timed", "timed-devel"]);

        let spec = FilterSpec::new().with_repos(["other"]);
        assert!(apply(&all, &spec).is_empty());
    }

    #[test]
    fn test_selection_drops_display_predicates() {
        let spec = FilterSpec::new()
            .with_names("timed")
            .unwrap()
            .with_arches(["armv7hl"])
            .exclude_devel(true);
        let selection = spec.selection();
        assert!(selection.names.is_none());
        assert!(!selection.exclude_devel);
        assert_eq!(selection.arches, spec.arches);
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(matches!(
            FilterSpec::new().with_names("ok =!"),
            Err(Error::FilterSpecError { .. })
        ));
    }
}
