// src/main.rs

mod commands;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default directory holding the cache, the configuration and the mirror
const DEFAULT_REPOS_PATH: &str = ".repos_cache";

#[derive(Parser)]
#[command(name = "reposcope")]
#[command(author, version, about = "Mirror RPM repositories and analyse their metadata offline", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Repositories path holding the cache, config and mirrored files
    #[arg(short, long, global = true, default_value = DEFAULT_REPOS_PATH)]
    pub repos_path: PathBuf,

    /// Package name filter, space separated; = exact, ~ substring, ^ prefix, # suffix, ! not.
    /// Examples: "timed", "^timed #!-doc", "=!timed"
    #[arg(short, long, global = true, value_name = "NAMES")]
    pub package: Option<String>,

    /// Keep only these architectures, space separated: "aarch64 armv7hl noarch"
    #[arg(short, long, global = true, value_name = "ARCHES")]
    pub arch: Option<String>,

    /// Drop these architectures, space separated
    #[arg(short = 'x', long, global = true, value_name = "ARCHES")]
    pub exclude_arch: Option<String>,

    /// Drop test/debug/devel packages
    #[arg(short = 'd', long, global = true)]
    pub exclude_devel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download repository metadata into the cache (and packages with --packages)
    #[command(visible_alias = "d")]
    Download(DownloadArgs),

    /// Show architectures of cached packages
    #[command(visible_alias = "a")]
    Architectures {
        /// Show the package count of each architecture
        #[arg(short, long)]
        count: bool,

        /// Show the cached revision of every repository
        #[arg(long)]
        revisions: bool,
    },

    /// Filter cached packages and show them as text, tables or trees
    #[command(visible_alias = "f")]
    Filter(FilterArgs),

    /// Show packages of a primary.xml[.gz|.zst|.xz] file
    #[command(visible_alias = "pr")]
    Primary {
        /// Document paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show file lists of a filelists.xml[.gz|.zst|.xz] file
    #[command(visible_alias = "fl")]
    Filelists {
        /// Document paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// URL template with {repo} and optionally {arch}: https://example.org/{repo}:/15.6/
    #[arg(short, long)]
    pub url: Option<String>,

    /// Repository names, space separated: "apps system games"
    #[arg(short = 'e', long, value_name = "NAMES")]
    pub repos: Option<String>,

    /// Refetch metadata even when the revision did not change
    #[arg(long)]
    pub force: bool,

    /// Skip filelists documents
    #[arg(long)]
    pub no_files: bool,

    /// Concurrent downloads
    #[arg(short, long, default_value_t = reposcope::repository::sync::DEFAULT_JOBS)]
    pub jobs: usize,

    /// Attempts per URL
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Do not update the stored configuration
    #[arg(long)]
    pub keep_conf: bool,

    /// Also download binary packages passing the filters
    #[arg(long)]
    pub packages: bool,

    /// Package download size limit in bytes
    #[arg(short = 's', long, value_name = "BYTES")]
    pub size_max: Option<u64>,

    /// Package download size minimum in bytes
    #[arg(short = 'S', long, value_name = "BYTES")]
    pub size_min: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Files,
    FilesFull,
    Provides,
    ProvidesFull,
    /// Dependency tree, one child per package
    Tree,
    /// Dependency tree, one child per relation
    TreeFull,
    /// Reverse tree, one child per package
    Rtree,
    /// Reverse tree, one child per relation
    RtreeFull,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Provides filter, space separated: "libtimed", "libc.so.6(GLIBC_2.34) libtimed"
    #[arg(long, value_name = "NAMES")]
    pub provides: Option<String>,

    /// Requires filter, space separated
    #[arg(long, value_name = "NAMES")]
    pub requires: Option<String>,

    /// Files filter, space separated: "connmand", "^/bin/ ^/usr/bin/"
    #[arg(long, value_name = "PATHS")]
    pub files: Option<String>,

    /// Summary/description filter: "MDM", case insensitive "~mdm"
    #[arg(long, value_name = "TEXT")]
    pub summary: Option<String>,

    /// Hide the package counter
    #[arg(short = 'C')]
    pub no_counter: bool,

    /// Hide the repository name
    #[arg(short = 'N')]
    pub no_repo: bool,

    /// Show architecture
    #[arg(short = 'A')]
    pub show_arch: bool,

    /// Show package file location
    #[arg(short = 'F')]
    pub show_location: bool,

    /// Show version
    #[arg(short = 'V')]
    pub show_version: bool,

    /// Show summary and description
    #[arg(short = 'D')]
    pub show_summary: bool,

    /// Show provides and requires
    #[arg(short = 'R')]
    pub show_relations: bool,

    /// Show files
    #[arg(short = 'L')]
    pub show_files: bool,

    /// Show files matching --files only
    #[arg(short = 'M')]
    pub show_matching_files: bool,

    /// Show download size
    #[arg(short = 'Z')]
    pub show_size: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub out: OutputFormat,

    /// Expand every occurrence in trees, not only the first
    #[arg(long)]
    pub expand_all: bool,

    /// Maximum tree depth
    #[arg(long, value_name = "LEVELS")]
    pub max_depth: Option<usize>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Download(args) => commands::cmd_download(&cli.global, &args),
        Commands::Architectures { count, revisions } => {
            commands::cmd_architectures(&cli.global, count, revisions)
        }
        Commands::Filter(args) => commands::cmd_filter(&cli.global, &args),
        Commands::Primary { paths } => commands::cmd_primary(&paths),
        Commands::Filelists { paths } => commands::cmd_filelists(&paths),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "reposcope", &mut std::io::stdout());
            Ok(())
        }
    }
}
