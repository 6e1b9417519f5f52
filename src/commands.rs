// src/commands.rs

//! Command handlers for the reposcope CLI

use crate::{DownloadArgs, FilterArgs, GlobalArgs, OutputFormat};
use anyhow::{Context, Result, bail};
use reposcope::cache::{CACHE_FILE_NAME, RepoCache};
use reposcope::config::{CONF_FILE_NAME, MirrorConfig};
use reposcope::filter::{FilterSpec, PatternSet};
use reposcope::packages::Package;
use reposcope::render::{
    self, DisplayOptions, TableKind, arch_counts, format_size, write_arch_counts, write_packages,
    write_revisions, write_table, write_tree,
};
use reposcope::repository::parsers::{FileListReader, PrimaryReader, open_document};
use reposcope::repository::{
    BatchStatus, HttpFetcher, Mirror, RetryPolicy, SyncOptions, TargetStatus, sync_repositories,
};
use reposcope::resolver::DependencyGraph;
use reposcope::tree::{Direction, Expansion, Grouping, TreeOptions, build_trees};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Filters shared by every command reading the cache
fn base_filter(global: &GlobalArgs) -> Result<FilterSpec> {
    let mut spec = FilterSpec::new().exclude_devel(global.exclude_devel);
    if let Some(names) = &global.package {
        spec = spec.with_names(names)?;
    }
    if let Some(arches) = &global.arch {
        spec = spec.with_arches(arches.split_whitespace());
    }
    if let Some(arches) = &global.exclude_arch {
        spec = spec.without_arches(arches.split_whitespace());
    }
    Ok(spec)
}

fn cache_path(global: &GlobalArgs) -> PathBuf {
    global.repos_path.join(CACHE_FILE_NAME)
}

/// Load the cache, failing with a hint when nothing was downloaded yet
fn load_cache(global: &GlobalArgs) -> Result<RepoCache> {
    let path = cache_path(global);
    let cache = RepoCache::load(&path);
    if cache.is_empty() {
        bail!(
            "No cached repositories in {}, run 'reposcope download' first",
            global.repos_path.display()
        );
    }
    Ok(cache)
}

/// Download repository metadata, and packages with `--packages`
pub fn cmd_download(global: &GlobalArgs, args: &DownloadArgs) -> Result<()> {
    let conf_path = global.repos_path.join(CONF_FILE_NAME);
    let config = MirrorConfig::load(&conf_path)?.merge(
        args.url.as_deref(),
        args.repos.as_deref(),
        global.arch.as_deref(),
    );
    config.validate()?;
    let targets = config.targets()?;

    // Package selection is validated before anything is fetched
    let selection = if args.packages {
        Some(
            base_filter(global)?
                .with_repos(&config.repos)
                .with_size_range(args.size_min, args.size_max),
        )
    } else {
        None
    };

    let fetcher = HttpFetcher::new(Duration::from_secs(args.timeout))?;
    let retry = RetryPolicy {
        max_attempts: args.retries.max(1),
        ..RetryPolicy::default()
    };
    let options = SyncOptions {
        force: args.force,
        with_files: !args.no_files,
        jobs: args.jobs,
        retry,
        arches: config.arches.iter().cloned().collect(),
    };

    let mirror = Mirror::new(&global.repos_path);
    let cache_file = cache_path(global);
    let mut cache = RepoCache::load(&cache_file);

    let report = sync_repositories(&fetcher, &targets, &mut cache, &options, Some(&mirror))?;

    for target in &report.targets {
        let revision = target.revision.as_deref().unwrap_or("-");
        match &target.status {
            TargetStatus::Updated { packages, files } => {
                println!("{} {}: {} packages, {} with files", target.target.label(), revision, packages, files)
            }
            TargetStatus::UpToDate => println!("{} {}: up to date", target.target.label(), revision),
            TargetStatus::Failed { error } => println!("{}: FAILED: {}", target.target.label(), error),
        }
    }

    let status = report.status();
    if status == BatchStatus::Failed {
        bail!("All {} repositories failed to synchronize", report.targets.len());
    }

    if report.updated() > 0 {
        cache
            .save(&cache_file)
            .with_context(|| format!("Failed to save cache {}", cache_file.display()))?;
    }
    if !args.keep_conf {
        config.save(&conf_path)?;
    }

    println!(
        "Sync {}: {} repositories, {} packages cached",
        status,
        cache.repositories().count(),
        cache.package_count()
    );
    if status == BatchStatus::Partial {
        warn!(
            "{} of {} repositories failed, analysis uses the remaining ones",
            report.failures().count(),
            report.targets.len()
        );
    }

    if let Some(selection) = selection {
        let packages = selection.apply(cache.packages());
        let downloads = mirror.download_packages(&fetcher, &packages, &targets, &retry, args.jobs)?;
        println!(
            "Packages: {} downloaded ({}), {} kept, {} failed",
            downloads.downloaded,
            format_size(downloads.bytes),
            downloads.kept,
            downloads.failed.len()
        );
        for (nevra, error) in &downloads.failed {
            println!("  {}: {}", nevra, error);
        }
        if !downloads.is_success() {
            bail!("{} packages could not be downloaded", downloads.failed.len());
        }
    }

    Ok(())
}

/// Show the architectures present in the cache
pub fn cmd_architectures(global: &GlobalArgs, count: bool, revisions: bool) -> Result<()> {
    let spec = base_filter(global)?;
    let cache = load_cache(global)?;
    let packages = spec.apply(cache.packages());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if revisions {
        write_revisions(&mut out, &cache.revisions())?;
    }
    write_arch_counts(&mut out, &arch_counts(packages), count)?;
    Ok(())
}

fn tree_options(args: &FilterArgs) -> Option<TreeOptions> {
    let (direction, grouping) = match args.out {
        OutputFormat::Tree => (Direction::Forward, Grouping::Package),
        OutputFormat::TreeFull => (Direction::Forward, Grouping::Relation),
        OutputFormat::Rtree => (Direction::Reverse, Grouping::Package),
        OutputFormat::RtreeFull => (Direction::Reverse, Grouping::Relation),
        _ => return None,
    };
    Some(TreeOptions {
        direction,
        grouping,
        expansion: if args.expand_all { Expansion::Full } else { Expansion::Deduplicated },
        max_depth: args.max_depth,
    })
}

fn display_options(args: &FilterArgs, files: Option<&PatternSet>) -> DisplayOptions {
    DisplayOptions {
        counter: !args.no_counter,
        repo: !args.no_repo,
        arch: args.show_arch,
        version: args.show_version,
        location: args.show_location,
        summary: args.show_summary,
        relations: args.show_relations,
        files: args.show_files || args.show_matching_files,
        files_filter: if args.show_matching_files { files.cloned() } else { None },
        size: args.show_size,
    }
}

fn filter_spec(global: &GlobalArgs, args: &FilterArgs) -> Result<FilterSpec> {
    let mut spec = base_filter(global)?;
    if let Some(tokens) = &args.provides {
        spec = spec.with_provides(tokens)?;
    }
    if let Some(tokens) = &args.requires {
        spec = spec.with_requires(tokens)?;
    }
    if let Some(tokens) = &args.files {
        spec = spec.with_files(tokens)?;
    }
    if let Some(text) = &args.summary {
        spec = spec.with_summary(text)?;
    }
    Ok(spec)
}

/// Filter cached packages and print them in the requested layout
pub fn cmd_filter(global: &GlobalArgs, args: &FilterArgs) -> Result<()> {
    let spec = filter_spec(global, args)?;
    let cache = load_cache(global)?;

    let universe = cache.universe(&spec);
    let shown = spec.apply(universe.iter().copied());
    info!("{} of {} packages match", shown.len(), universe.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let files = spec.files.as_ref();

    match args.out {
        OutputFormat::Text => write_packages(&mut out, &shown, &display_options(args, files))?,
        OutputFormat::Files | OutputFormat::FilesFull => write_table(
            &mut out,
            &shown,
            TableKind::Files,
            files,
            args.out == OutputFormat::FilesFull,
        )?,
        OutputFormat::Provides | OutputFormat::ProvidesFull => write_table(
            &mut out,
            &shown,
            TableKind::Provides,
            spec.provides.as_ref(),
            args.out == OutputFormat::ProvidesFull,
        )?,
        OutputFormat::Tree | OutputFormat::TreeFull | OutputFormat::Rtree | OutputFormat::RtreeFull => {
            let options = tree_options(args).context("Not a tree output")?;
            let graph = DependencyGraph::build(&universe);
            for tree in build_trees(&graph, &shown, &options) {
                write_tree(&mut out, &tree)?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn read_document(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Print the packages of primary documents
pub fn cmd_primary(paths: &[PathBuf]) -> Result<()> {
    let options = DisplayOptions {
        arch: true,
        version: true,
        ..DisplayOptions::default()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for path in paths {
        let data = read_document(path)?;
        let source = open_document(&data, &path.to_string_lossy())?;
        let mut reader = PrimaryReader::new(source, "");
        while let Some(package) = reader.next_package()? {
            writeln!(out, "{}", render::package_text(&package, &options))?;
        }
        info!("{}: {} packages", path.display(), reader.parsed());
    }
    Ok(())
}

/// Print the file lists of filelists documents
pub fn cmd_filelists(paths: &[PathBuf]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for path in paths {
        let data = read_document(path)?;
        let source = open_document(&data, &path.to_string_lossy())?;
        let mut reader = FileListReader::new(source);
        let mut count = 0;
        while let Some(entry) = reader.next_package()? {
            let key = &entry.key;
            let package = Package::new(&key.name, &key.version, &key.release, &key.arch);
            writeln!(out, "{}", package.nevra())?;
            for file in &entry.files {
                writeln!(out, "\t{}", file)?;
            }
            count += 1;
        }
        info!("{}: {} packages", path.display(), count);
    }
    Ok(())
}
