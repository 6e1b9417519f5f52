// src/render.rs

//! Text output
//!
//! Everything here formats values produced by the filter engine, resolver
//! and tree builder. Nothing in this module decides which packages are shown.

use crate::filter::PatternSet;
use crate::packages::Package;
use crate::tree::{NodeTarget, Occurrence, TreeNode};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Human readable size with decimal multipliers: `1.5 MB`, `320 B`
pub fn format_size(bytes: u64) -> String {
    const MULTIPLIERS: [(&str, u32); 3] = [("GB", 9), ("MB", 6), ("kB", 3)];

    for (suffix, power) in MULTIPLIERS {
        let unit = 10u64.pow(power);
        if bytes >= unit {
            return format!("{:.1} {}", bytes as f64 / unit as f64, suffix);
        }
    }
    format!("{} B", bytes)
}

/// Which package fields the text view shows
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    /// Prefix every package with its 1-based position
    pub counter: bool,
    pub repo: bool,
    pub arch: bool,
    pub version: bool,
    /// Location of the binary package
    pub location: bool,
    /// Summary and description
    pub summary: bool,
    /// Provides and requires
    pub relations: bool,
    pub files: bool,
    /// Only show files matching these patterns
    pub files_filter: Option<PatternSet>,
    pub size: bool,
}

/// One package as a (possibly multi-line) string
pub fn package_text(package: &Package, options: &DisplayOptions) -> String {
    let mut fields: Vec<String> = Vec::new();
    if options.repo && !package.repo.is_empty() {
        fields.push(package.repo.clone());
    }
    fields.push(package.name.clone());
    if options.arch {
        fields.push(package.arch.clone());
    }
    if options.version {
        fields.push(package.evr());
    }
    if options.location && !package.location.is_empty() {
        fields.push(package.location.clone());
    }
    if options.size {
        fields.push(format!("({})", format_size(package.size)));
    }

    let mut text = fields.join(" ");

    if options.summary {
        for line in [&package.summary, &package.description].into_iter().flatten() {
            text.push_str("\n\t");
            text.push_str(line);
        }
    }

    if options.files {
        for file in package.files() {
            if options.files_filter.as_ref().is_none_or(|f| f.matches(file)) {
                text.push_str("\n\t");
                text.push_str(file);
            }
        }
    }

    if options.relations {
        for (title, capabilities) in [("PROVIDES:", &package.provides), ("REQUIRES:", &package.requires)] {
            if capabilities.is_empty() {
                continue;
            }
            text.push_str("\n\t");
            text.push_str(title);
            for capability in capabilities {
                text.push_str("\n\t");
                text.push_str(&capability.to_string());
            }
        }
    }

    text
}

/// Print packages one per entry, in the given order
pub fn write_packages(out: &mut impl Write, packages: &[&Package], options: &DisplayOptions) -> io::Result<()> {
    for (i, package) in packages.iter().enumerate() {
        let text = package_text(package, options);
        if options.counter {
            writeln!(out, "{} {}", i + 1, text)?;
        } else {
            writeln!(out, "{}", text)?;
        }
    }
    Ok(())
}

/// Table keyed by file path or by provided capability name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Files,
    Provides,
}

/// Sorted key/package table
///
/// Rows are ordered by key, then package name, then architecture. `full`
/// adds the architecture and version columns.
pub fn write_table(
    out: &mut impl Write,
    packages: &[&Package],
    kind: TableKind,
    filter: Option<&PatternSet>,
    full: bool,
) -> io::Result<()> {
    let mut rows: Vec<(&str, &Package)> = Vec::new();
    for package in packages.iter().copied() {
        let keys: Vec<&str> = match kind {
            TableKind::Files => package.files().iter().map(String::as_str).collect(),
            TableKind::Provides => package.provides.iter().map(|c| c.name.as_str()).collect(),
        };
        for key in keys {
            if filter.is_none_or(|f| f.matches(key)) {
                rows.push((key, package));
            }
        }
    }

    rows.sort_by(|(a, p), (b, q)| {
        a.cmp(b)
            .then_with(|| p.name.cmp(&q.name))
            .then_with(|| p.arch.cmp(&q.arch))
    });
    // a package listing one key twice gets one row
    rows.dedup_by(|(a, p), (b, q)| a == b && std::ptr::eq(*p, *q));

    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let repo_width = rows.iter().map(|(_, p)| p.repo.len()).max().unwrap_or(0);
    let name_width = rows.iter().map(|(_, p)| p.name.len()).max().unwrap_or(0);

    for (key, package) in rows {
        if full {
            writeln!(
                out,
                "{:key_width$}\t{:repo_width$} {:name_width$}\t{}\t{}",
                key,
                package.repo,
                package.name,
                package.arch,
                package.evr()
            )?;
        } else {
            writeln!(out, "{:key_width$}\t{:repo_width$} {}", key, package.repo, package.name)?;
        }
    }
    Ok(())
}

fn node_label(node: &TreeNode<'_>) -> String {
    let mut label = match node.target {
        NodeTarget::Package(package) => {
            format!("{} {} {} {}", package.repo, package.name, package.arch, package.evr())
                .trim_start()
                .to_string()
        }
        NodeTarget::Unresolved => "<UNRESOLVED>".to_string(),
    };

    if !node.via.is_empty() {
        let via: Vec<String> = node.via.iter().map(|c| c.to_string()).collect();
        label.push_str(" = ");
        label.push_str(&via.join(", "));
    }

    match node.occurrence {
        Occurrence::Expanded => {}
        Occurrence::Repeat => label.push_str(" <ALREADY>"),
        Occurrence::Cycle => label.push_str(" <CYCLE>"),
        Occurrence::Truncated => label.push_str(" <...>"),
    }
    label
}

fn write_node(out: &mut impl Write, node: &TreeNode<'_>, depth: usize) -> io::Result<()> {
    writeln!(out, "{}{}", "\t".repeat(depth), node_label(node))?;
    for child in &node.children {
        write_node(out, child, depth + 1)?;
    }
    Ok(())
}

/// Print a tree, one tab of indentation per level
pub fn write_tree(out: &mut impl Write, tree: &TreeNode<'_>) -> io::Result<()> {
    write_node(out, tree, 0)
}

/// Architectures with their package counts, sorted by architecture
pub fn arch_counts<'a>(packages: impl IntoIterator<Item = &'a Package>) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for package in packages {
        *counts.entry(package.arch.as_str()).or_insert(0) += 1;
    }
    counts
}

pub fn write_arch_counts(out: &mut impl Write, counts: &BTreeMap<&str, usize>, show_count: bool) -> io::Result<()> {
    for (arch, count) in counts {
        if show_count {
            writeln!(out, "{}\t{}", arch, count)?;
        } else {
            writeln!(out, "{}", arch)?;
        }
    }
    Ok(())
}

/// `repo/arch: revision` lines, names right-aligned
pub fn write_revisions(out: &mut impl Write, revisions: &[(&str, &str, &str)]) -> io::Result<()> {
    let labels: Vec<String> = revisions
        .iter()
        .map(|(repo, arch, _)| format!("{}/{}", repo, arch))
        .collect();
    let width = labels.iter().map(String::len).max().unwrap_or(0);

    for (label, (_, _, revision)) in labels.iter().zip(revisions) {
        writeln!(out, "{:>width$}: {}", label, revision)?;
    }
    Ok(())
}
