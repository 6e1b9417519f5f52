// src/resolver/mod.rs

//! Relation resolver
//!
//! Builds a capability index over a package universe and turns each
//! requirement into edges towards the packages providing it. Matching is by
//! capability name; version constraints are kept for display only.
//!
//! The universe must be the complete package set of the active
//! repository/architecture selection. Display filters are applied to the
//! output, never to the universe, otherwise dependencies vanish.

use crate::packages::{Capability, Package};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Capability name to owning packages, positions into the universe
pub struct CapabilityIndex<'a> {
    universe: Vec<&'a Package>,
    positions: PositionMap,
    owners: HashMap<&'a str, Vec<usize>>,
}

/// Package address to universe position
type PositionMap = HashMap<usize, usize>;

fn address(package: &Package) -> usize {
    package as *const Package as usize
}

impl<'a> CapabilityIndex<'a> {
    /// Index provides and the attached files required by some package
    pub fn new(universe: &[&'a Package]) -> Self {
        let required_files: HashSet<&str> = universe
            .iter()
            .flat_map(|p| p.requires.iter())
            .filter(|c| c.is_file())
            .map(|c| c.name.as_str())
            .collect();

        let mut owners: HashMap<&'a str, Vec<usize>> = HashMap::new();
        let mut add = |name: &'a str, index: usize| {
            let list = owners.entry(name).or_default();
            // packages are visited in order, so a repeat can only be the last entry
            if list.last() != Some(&index) {
                list.push(index);
            }
        };

        for (index, package) in universe.iter().copied().enumerate() {
            for provide in &package.provides {
                add(provide.name.as_str(), index);
            }
            for file in package.files() {
                if required_files.contains(file.as_str()) {
                    add(file.as_str(), index);
                }
            }
        }

        debug!(
            "Indexed {} capabilities over {} packages",
            owners.len(),
            universe.len()
        );

        Self {
            universe: universe.to_vec(),
            positions: universe.iter().enumerate().rev().map(|(i, p)| (address(p), i)).collect(),
            owners,
        }
    }

    pub fn universe(&self) -> &[&'a Package] {
        &self.universe
    }

    /// Universe positions of the packages providing `name`
    pub fn owner_positions(&self, name: &str) -> &[usize] {
        self.owners.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Packages providing `name`, in universe order
    pub fn owners(&self, name: &str) -> Vec<&'a Package> {
        self.owner_positions(name)
            .iter()
            .map(|&i| self.universe[i])
            .collect()
    }

    /// Position of a package (by identity) in the universe
    pub fn position(&self, package: &Package) -> Option<usize> {
        self.positions.get(&address(package)).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Build the capability index of a universe
pub fn build_index<'a>(universe: &[&'a Package]) -> CapabilityIndex<'a> {
    CapabilityIndex::new(universe)
}

/// One requirement of a package and the packages satisfying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub requirement: &'a Capability,
    /// Empty when nothing in the universe provides the requirement
    pub owners: Vec<&'a Package>,
}

/// Resolve every requirement of `package`, in declaration order
pub fn resolve<'a>(package: &'a Package, index: &CapabilityIndex<'a>) -> Vec<Resolution<'a>> {
    package
        .requires
        .iter()
        .map(|requirement| Resolution {
            requirement,
            owners: index.owners(&requirement.name),
        })
        .collect()
}

/// Outgoing edge: a requirement and the package satisfying it, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardEdge<'a> {
    pub requirement: &'a Capability,
    pub target: Option<usize>,
}

/// Incoming edge: a dependent package and the requirement linking it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseEdge<'a> {
    pub requirement: &'a Capability,
    pub dependent: usize,
}

/// Forward and reverse dependency edges derived from one capability index
pub struct DependencyGraph<'a> {
    universe: Vec<&'a Package>,
    positions: PositionMap,
    edges: Vec<Vec<ForwardEdge<'a>>>,
    reverse_edges: Vec<Vec<ReverseEdge<'a>>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(index: &CapabilityIndex<'a>) -> Self {
        let universe = index.universe().to_vec();
        let mut edges = Vec::with_capacity(universe.len());
        let mut reverse_edges: Vec<Vec<ReverseEdge<'a>>> = vec![Vec::new(); universe.len()];

        for (from, package) in universe.iter().copied().enumerate() {
            let mut forward = Vec::new();
            for requirement in &package.requires {
                let owners = index.owner_positions(&requirement.name);
                if owners.is_empty() {
                    forward.push(ForwardEdge {
                        requirement,
                        target: None,
                    });
                    continue;
                }
                for &to in owners {
                    forward.push(ForwardEdge {
                        requirement,
                        target: Some(to),
                    });
                    reverse_edges[to].push(ReverseEdge {
                        requirement,
                        dependent: from,
                    });
                }
            }
            edges.push(forward);
        }

        Self {
            universe,
            positions: index.positions.clone(),
            edges,
            reverse_edges,
        }
    }

    /// Build the index and the graph in one step
    pub fn build(universe: &[&'a Package]) -> Self {
        Self::new(&build_index(universe))
    }

    pub fn package(&self, position: usize) -> &'a Package {
        self.universe[position]
    }

    pub fn universe(&self) -> &[&'a Package] {
        &self.universe
    }

    pub fn position(&self, package: &Package) -> Option<usize> {
        self.positions.get(&address(package)).copied()
    }

    /// Requirement edges of a package, in declaration order
    pub fn get_dependencies(&self, position: usize) -> &[ForwardEdge<'a>] {
        self.edges.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Packages requiring this package, in universe order of the dependents
    pub fn get_dependents(&self, position: usize) -> &[ReverseEdge<'a>] {
        self.reverse_edges
            .get(position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.universe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universe.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use crate::packages::CapabilityOp;

    fn package(name: &str, provides: &[&str], requires: &[&str]) -> Package {
        let mut p = Package::new(name, "1", "1", "noarch");
        p.repo = "oss".to_string();
        p.provides = provides.iter().map(|c| Capability::new(*c)).collect();
        p.requires = requires.iter().map(|c| Capability::new(*c)).collect();
        p
    }

    fn libfoo_universe() -> Vec<Package> {
        let mut libfoo = package("libfoo", &["libfoo.so.1"], &["libbar >= 2"]);
        libfoo.requires = vec![Capability::versioned("libbar", CapabilityOp::Ge, "2")];
        vec![
            libfoo,
            package("libbar", &["libbar"], &[]),
            package("app", &["app"], &["libfoo.so.1"]),
        ]
    }

    #[test]
    fn test_resolve_libfoo() {
        let packages = libfoo_universe();
        let universe: Vec<&Package> = packages.iter().collect();
        let index = build_index(&universe);

        let resolved = resolve(&packages[0], &index);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].requirement.to_string(), "libbar >= 2");
        assert_eq!(resolved[0].owners, vec![&packages[1]]);
    }

    #[test]
    fn test_unresolved_requirement_kept() {
        let packages = vec![package("a", &[], &["missing", "a-extra"])];
        let universe: Vec<&Package> = packages.iter().collect();
        let index = build_index(&universe);

        let resolved = resolve(&packages[0], &index);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|r| r.owners.is_empty()));
    }

    #[test]
    fn test_multiple_owners_in_universe_order() {
        let packages = vec![
            package("sh-a", &["/bin/sh", "sh"], &[]),
            package("user", &[], &["sh"]),
            package("sh-b", &["sh", "sh"], &[]),
        ];
        let universe: Vec<&Package> = packages.iter().collect();
        let index = build_index(&universe);
        assert_eq!(index.owner_positions("sh"), &[0, 2]);
    }

    #[test]
    fn test_file_requirements_use_file_lists() {
        let mut bash = package("bash", &["bash"], &[]);
        bash.attach_files(vec!["/bin/bash".to_string(), "/usr/share/doc/bash".to_string()]);
        let script = package("script", &[], &["/bin/bash"]);
        let packages = vec![bash, script];
        let universe: Vec<&Package> = packages.iter().collect();
        let index = build_index(&universe);

        assert_eq!(index.owners("/bin/bash"), vec![&packages[0]]);
        // only required paths are indexed
        assert!(index.owners("/usr/share/doc/bash").is_empty());
    }

    #[test]
    fn test_reverse_edges() {
        let packages = libfoo_universe();
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);

        let dependents: Vec<&str> = graph
            .get_dependents(1)
            .iter()
            .map(|e| graph.package(e.dependent).name.as_str())
            .collect();
        assert_eq!(dependents, vec!["libfoo"]);

        let app_deps = graph.get_dependencies(2);
        assert_eq!(app_deps.len(), 1);
        assert_eq!(app_deps[0].target, Some(0));
    }

    #[test]
    fn test_position_by_identity() {
        let packages = libfoo_universe();
        let universe: Vec<&Package> = packages.iter().collect();
        let index = build_index(&universe);
        let graph = DependencyGraph::new(&index);

        for (i, package) in packages.iter().enumerate() {
            assert_eq!(graph.position(package), Some(i));
            assert_eq!(index.position(package), Some(i));
        }

        // an equal package outside the universe has no position
        let copy = packages[0].clone();
        assert_eq!(graph.position(&copy), None);
        assert_eq!(index.position(&copy), None);
    }

    #[test]
    fn test_display_filter_does_not_shrink_resolution() {
        let packages = libfoo_universe();
        let spec = FilterSpec::new().with_names("=libfoo").unwrap();

        // resolving against the full selection finds libbar
        let universe = spec.selection().apply(&packages);
        let index = build_index(&universe);
        let shown = spec.apply(&packages);
        assert_eq!(shown.len(), 1);
        let resolved = resolve(shown[0], &index);
        assert_eq!(resolved[0].owners.len(), 1);
        assert_eq!(resolved[0].owners[0].name, "libbar");
    }
}
