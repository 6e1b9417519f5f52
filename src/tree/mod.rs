// src/tree/mod.rs

//! Dependency trees
//!
//! A tree is grown from one root package over a [`DependencyGraph`], either
//! along requirements (forward) or along dependents (reverse). Recursion
//! carries the root-to-node ancestor path; a package already on that path
//! becomes a [`Occurrence::Cycle`] leaf and is never re-entered, so every
//! tree is finite.

use crate::packages::{Capability, Package};
use crate::resolver::DependencyGraph;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// What the root requires
    #[default]
    Forward,
    /// What requires the root
    Reverse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expansion {
    /// Expand each package once per tree; later occurrences are leaves
    #[default]
    Deduplicated,
    /// Expand every occurrence that is not on the ancestor path
    Full,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Grouping {
    /// One child per distinct package, carrying every linking relation
    #[default]
    Package,
    /// One child per requirement edge
    Relation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeOptions {
    pub direction: Direction,
    pub expansion: Expansion,
    pub grouping: Grouping,
    /// Children deeper than this are not expanded
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTarget<'a> {
    Package(&'a Package),
    /// Requirement nobody in the universe provides
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    Expanded,
    /// Already expanded elsewhere in this tree
    Repeat,
    /// Already on the path from the root
    Cycle,
    /// Not expanded because of the depth limit
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode<'a> {
    pub target: NodeTarget<'a>,
    /// Relations linking this node to its parent; empty for the root
    pub via: Vec<&'a Capability>,
    pub occurrence: Occurrence,
    pub children: Vec<TreeNode<'a>>,
}

impl<'a> TreeNode<'a> {
    pub fn package(&self) -> Option<&'a Package> {
        match self.target {
            NodeTarget::Package(p) => Some(p),
            NodeTarget::Unresolved => None,
        }
    }

    /// Number of nodes in the tree, root included
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth of the deepest node below the root
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }
}

struct TreeBuilder<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    options: TreeOptions,
    path: Vec<usize>,
    expanded: HashSet<usize>,
}

impl<'a> TreeBuilder<'_, 'a> {
    /// Links of a node in declaration (or universe) order, self-edges dropped
    fn links(&self, position: usize) -> Vec<(Option<usize>, &'a Capability)> {
        match self.options.direction {
            Direction::Forward => self
                .graph
                .get_dependencies(position)
                .iter()
                .filter(|e| e.target != Some(position))
                .map(|e| (e.target, e.requirement))
                .collect(),
            Direction::Reverse => self
                .graph
                .get_dependents(position)
                .iter()
                .filter(|e| e.dependent != position)
                .map(|e| (Some(e.dependent), e.requirement))
                .collect(),
        }
    }

    fn grouped(&self, position: usize) -> Vec<(Option<usize>, Vec<&'a Capability>)> {
        let links = self.links(position);
        match self.options.grouping {
            Grouping::Relation => links.into_iter().map(|(t, c)| (t, vec![c])).collect(),
            Grouping::Package => {
                let mut groups: Vec<(Option<usize>, Vec<&'a Capability>)> = Vec::new();
                for (target, capability) in links {
                    let existing = target
                        .and_then(|t| groups.iter_mut().find(|(other, _)| *other == Some(t)));
                    match existing {
                        Some((_, via)) => via.push(capability),
                        None => groups.push((target, vec![capability])),
                    }
                }
                groups
            }
        }
    }

    fn children(&mut self, position: usize, depth: usize) -> Vec<TreeNode<'a>> {
        let mut children = Vec::new();

        for (target, via) in self.grouped(position) {
            let Some(child) = target else {
                children.push(TreeNode {
                    target: NodeTarget::Unresolved,
                    via,
                    occurrence: Occurrence::Expanded,
                    children: Vec::new(),
                });
                continue;
            };

            let package = NodeTarget::Package(self.graph.package(child));
            let leaf = |occurrence| TreeNode {
                target: package,
                via: via.clone(),
                occurrence,
                children: Vec::new(),
            };

            if self.path.contains(&child) {
                children.push(leaf(Occurrence::Cycle));
            } else if self.options.expansion == Expansion::Deduplicated
                && self.expanded.contains(&child)
            {
                children.push(leaf(Occurrence::Repeat));
            } else if self.options.max_depth.is_some_and(|max| depth + 1 >= max) {
                if self.links(child).is_empty() {
                    children.push(leaf(Occurrence::Expanded));
                } else {
                    children.push(leaf(Occurrence::Truncated));
                }
            } else {
                self.expanded.insert(child);
                self.path.push(child);
                let grandchildren = self.children(child, depth + 1);
                self.path.pop();
                children.push(TreeNode {
                    target: package,
                    via,
                    occurrence: Occurrence::Expanded,
                    children: grandchildren,
                });
            }
        }

        children
    }
}

/// Build the tree rooted at the package at `root` in the graph universe
pub fn build_tree<'a>(graph: &DependencyGraph<'a>, root: usize, options: &TreeOptions) -> TreeNode<'a> {
    let mut builder = TreeBuilder {
        graph,
        options: *options,
        path: vec![root],
        expanded: HashSet::from([root]),
    };

    let children = if options.max_depth == Some(0) {
        Vec::new()
    } else {
        builder.children(root, 0)
    };

    TreeNode {
        target: NodeTarget::Package(graph.package(root)),
        via: Vec::new(),
        occurrence: Occurrence::Expanded,
        children,
    }
}

/// One tree per root package; roots absent from the universe are skipped
pub fn build_trees<'a>(
    graph: &DependencyGraph<'a>,
    roots: &[&Package],
    options: &TreeOptions,
) -> Vec<TreeNode<'a>> {
    roots
        .iter()
        .filter_map(|root| graph.position(root))
        .map(|position| build_tree(graph, position, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, provides: &[&str], requires: &[&str]) -> Package {
        let mut p = Package::new(name, "1", "1", "noarch");
        p.provides = provides.iter().map(|c| Capability::new(*c)).collect();
        p.requires = requires.iter().map(|c| Capability::new(*c)).collect();
        p
    }

    fn names(nodes: &[TreeNode<'_>]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n.package().map(|p| p.name.clone()).unwrap_or_else(|| "?".to_string()))
            .collect()
    }

    fn all_options() -> Vec<TreeOptions> {
        let mut options = Vec::new();
        for direction in [Direction::Forward, Direction::Reverse] {
            for expansion in [Expansion::Deduplicated, Expansion::Full] {
                for grouping in [Grouping::Package, Grouping::Relation] {
                    options.push(TreeOptions {
                        direction,
                        expansion,
                        grouping,
                        max_depth: None,
                    });
                }
            }
        }
        options
    }

    #[test]
    fn test_cycle_terminates_in_every_mode() {
        let packages = vec![
            package("a", &["a", "a-cap"], &["b", "b-cap"]),
            package("b", &["b", "b-cap"], &["a", "a-cap"]),
        ];
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);

        for options in all_options() {
            let tree = build_tree(&graph, 0, &options);
            let first = &tree.children[0];
            assert_eq!(first.package().unwrap().name, "b");
            let back = &first.children[0];
            assert_eq!(back.package().unwrap().name, "a");
            assert_eq!(back.occurrence, Occurrence::Cycle, "{:?}", options);
            assert!(back.is_leaf());
        }
    }

    #[test]
    fn test_grouping() {
        let packages = vec![
            package("a", &["a", "a-cap"], &["b", "b-cap"]),
            package("b", &["b", "b-cap"], &[]),
        ];
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);

        let by_package = build_tree(&graph, 0, &TreeOptions::default());
        assert_eq!(by_package.children.len(), 1);
        assert_eq!(by_package.children[0].via.len(), 2);

        let options = TreeOptions {
            grouping: Grouping::Relation,
            ..TreeOptions::default()
        };
        let by_relation = build_tree(&graph, 0, &options);
        assert_eq!(names(&by_relation.children), vec!["b", "b"]);
        assert_eq!(by_relation.children[1].occurrence, Occurrence::Repeat);
    }

    #[test]
    fn test_reverse_tree() {
        let packages = vec![
            package("libfoo", &["libfoo.so.1"], &["libbar"]),
            package("libbar", &["libbar"], &[]),
            package("app", &["app"], &["libfoo.so.1"]),
        ];
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);
        let options = TreeOptions {
            direction: Direction::Reverse,
            ..TreeOptions::default()
        };

        let tree = build_tree(&graph, 1, &options);
        assert_eq!(names(&tree.children), vec!["libfoo"]);
        assert_eq!(names(&tree.children[0].children), vec!["app"]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_deduplicated_versus_full() {
        // diamond: top -> left, right; left -> base; right -> base
        let packages = vec![
            package("top", &[], &["left", "right"]),
            package("left", &["left"], &["base"]),
            package("right", &["right"], &["base"]),
            package("base", &["base"], &["core"]),
            package("core", &["core"], &[]),
        ];
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);

        let dedup = build_tree(&graph, 0, &TreeOptions::default());
        let right_base = &dedup.children[1].children[0];
        assert_eq!(right_base.occurrence, Occurrence::Repeat);
        assert!(right_base.is_leaf());

        let options = TreeOptions {
            expansion: Expansion::Full,
            ..TreeOptions::default()
        };
        let full = build_tree(&graph, 0, &options);
        let right_base = &full.children[1].children[0];
        assert_eq!(right_base.occurrence, Occurrence::Expanded);
        assert_eq!(names(&right_base.children), vec!["core"]);
        assert!(full.len() > dedup.len());
    }

    #[test]
    fn test_unresolved_and_self_edges() {
        let packages = vec![package("a", &["a"], &["a", "ghost"])];
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);

        let tree = build_tree(&graph, 0, &TreeOptions::default());
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].target, NodeTarget::Unresolved);
        assert_eq!(tree.children[0].via[0].name, "ghost");
    }

    #[test]
    fn test_max_depth_truncates() {
        let packages = vec![
            package("a", &["a"], &["b"]),
            package("b", &["b"], &["c"]),
            package("c", &["c"], &[]),
        ];
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);
        let options = TreeOptions {
            max_depth: Some(1),
            ..TreeOptions::default()
        };

        let tree = build_tree(&graph, 0, &options);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.children[0].occurrence, Occurrence::Truncated);
    }

    #[test]
    fn test_build_trees_skips_foreign_roots() {
        let packages = vec![package("a", &["a"], &[])];
        let stranger = package("x", &[], &[]);
        let universe: Vec<&Package> = packages.iter().collect();
        let graph = DependencyGraph::build(&universe);

        let trees = build_trees(&graph, &[&packages[0], &stranger], &TreeOptions::default());
        assert_eq!(trees.len(), 1);
    }
}
