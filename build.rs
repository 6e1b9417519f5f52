// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn flag(id: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(id).short(short).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("reposcope")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Reposcope Contributors")
        .about("Mirror RPM repositories and analyse their metadata offline")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            Arg::new("repos_path")
                .short('r')
                .long("repos-path")
                .value_name("PATH")
                .default_value(".repos_cache")
                .global(true)
                .help("Repositories path holding the cache, config and mirrored files"),
        )
        .arg(
            Arg::new("package")
                .short('p')
                .long("package")
                .value_name("NAMES")
                .global(true)
                .help("Package name filter; = exact, ~ substring, ^ prefix, # suffix, ! not"),
        )
        .arg(
            Arg::new("arch")
                .short('a')
                .long("arch")
                .value_name("ARCHES")
                .global(true)
                .help("Keep only these architectures"),
        )
        .arg(
            Arg::new("exclude_arch")
                .short('x')
                .long("exclude-arch")
                .value_name("ARCHES")
                .global(true)
                .help("Drop these architectures"),
        )
        .arg(
            Arg::new("exclude_devel")
                .short('d')
                .long("exclude-devel")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Drop test/debug/devel packages"),
        )
        .subcommand(
            Command::new("download")
                .visible_alias("d")
                .about("Download repository metadata into the cache")
                .arg(Arg::new("url").short('u').long("url").help("URL template with {repo} and optionally {arch}"))
                .arg(Arg::new("repos").short('e').long("repos").value_name("NAMES").help("Repository names"))
                .arg(Arg::new("force").long("force").action(ArgAction::SetTrue).help("Refetch unchanged revisions"))
                .arg(Arg::new("no_files").long("no-files").action(ArgAction::SetTrue).help("Skip filelists documents"))
                .arg(Arg::new("jobs").short('j').long("jobs").default_value("4").help("Concurrent downloads"))
                .arg(Arg::new("retries").long("retries").default_value("3").help("Attempts per URL"))
                .arg(Arg::new("timeout").long("timeout").default_value("30").help("HTTP timeout in seconds"))
                .arg(Arg::new("keep_conf").long("keep-conf").action(ArgAction::SetTrue).help("Do not update the stored configuration"))
                .arg(Arg::new("packages").long("packages").action(ArgAction::SetTrue).help("Also download binary packages passing the filters"))
                .arg(Arg::new("size_max").short('s').long("size-max").value_name("BYTES").help("Package download size limit"))
                .arg(Arg::new("size_min").short('S').long("size-min").value_name("BYTES").help("Package download size minimum")),
        )
        .subcommand(
            Command::new("architectures")
                .visible_alias("a")
                .about("Show architectures of cached packages")
                .arg(Arg::new("count").short('c').long("count").action(ArgAction::SetTrue).help("Show package counts"))
                .arg(Arg::new("revisions").long("revisions").action(ArgAction::SetTrue).help("Show cached revisions")),
        )
        .subcommand(
            Command::new("filter")
                .visible_alias("f")
                .about("Filter cached packages and show them as text, tables or trees")
                .arg(Arg::new("provides").long("provides").value_name("NAMES").help("Provides filter"))
                .arg(Arg::new("requires").long("requires").value_name("NAMES").help("Requires filter"))
                .arg(Arg::new("files").long("files").value_name("PATHS").help("Files filter"))
                .arg(Arg::new("summary").long("summary").value_name("TEXT").help("Summary/description filter, ~ for case insensitive"))
                .arg(flag("no_counter", 'C', "Hide the package counter"))
                .arg(flag("no_repo", 'N', "Hide the repository name"))
                .arg(flag("show_arch", 'A', "Show architecture"))
                .arg(flag("show_location", 'F', "Show package file location"))
                .arg(flag("show_version", 'V', "Show version"))
                .arg(flag("show_summary", 'D', "Show summary and description"))
                .arg(flag("show_relations", 'R', "Show provides and requires"))
                .arg(flag("show_files", 'L', "Show files"))
                .arg(flag("show_matching_files", 'M', "Show files matching --files only"))
                .arg(flag("show_size", 'Z', "Show download size"))
                .arg(
                    Arg::new("out")
                        .long("out")
                        .default_value("text")
                        .value_parser([
                            "text",
                            "files",
                            "files-full",
                            "provides",
                            "provides-full",
                            "tree",
                            "tree-full",
                            "rtree",
                            "rtree-full",
                        ])
                        .help("Output format"),
                )
                .arg(Arg::new("expand_all").long("expand-all").action(ArgAction::SetTrue).help("Expand every tree occurrence"))
                .arg(Arg::new("max_depth").long("max-depth").value_name("LEVELS").help("Maximum tree depth")),
        )
        .subcommand(
            Command::new("primary")
                .visible_alias("pr")
                .about("Show packages of a primary.xml[.gz|.zst|.xz] file")
                .arg(Arg::new("paths").required(true).num_args(1..).help("Document paths")),
        )
        .subcommand(
            Command::new("filelists")
                .visible_alias("fl")
                .about("Show file lists of a filelists.xml[.gz|.zst|.xz] file")
                .arg(Arg::new("paths").required(true).num_args(1..).help("Document paths")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("reposcope.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
