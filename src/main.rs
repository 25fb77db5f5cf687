use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dce_probe::config::{load_from_path, Passes, ToolConfig};
use dce_probe::driver::{discover, run, Pipeline, RunReport};
use dce_probe::edit::{atomic_write, read_source};
use dce_probe::markers::{alive_markers, dead_markers, declared_marker_count, is_valid_prefix};
use dce_probe::ts::SourceLang;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dce-probe")]
#[command(about = "Canonicalize C/C++ sources and instrument them with dead-code probes", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// Source files or directories to rewrite
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,

    /// Skip re-parsing the rewritten sources
    #[arg(long)]
    no_verify: bool,

    /// Parse every file as this language (c or cpp) instead of by extension
    #[arg(long, value_parser = parse_lang)]
    lang: Option<SourceLang>,
}

fn parse_lang(name: &str) -> Result<SourceLang, String> {
    SourceLang::parse(name).ok_or_else(|| format!("unknown language '{name}', expected c or cpp"))
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize and insert probes
    Instrument {
        #[command(flatten)]
        run: RunArgs,

        /// Probe name prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Give file-scope definitions internal linkage before instrumenting
        #[arg(long)]
        make_static: bool,

        /// Write the probe sites of every file as JSON
        #[arg(long)]
        sites: Option<PathBuf>,
    },

    /// Turn every control-flow body into a block
    Canonicalize {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Give file-scope definitions internal linkage
    MakeStatic {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the number of probes declared in an instrumented file
    Count {
        file: PathBuf,

        #[arg(long)]
        prefix: Option<String>,
    },

    /// List probes still referenced in compiler assembly output
    Alive {
        asm: PathBuf,

        #[arg(long)]
        prefix: Option<String>,

        /// Number of declared probes; also lists the dead ones
        #[arg(long)]
        total: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_from_path(path)?,
        None => ToolConfig::default(),
    };

    match cli.command {
        Commands::Instrument {
            run,
            prefix,
            make_static,
            sites,
        } => {
            let passes = Passes {
                canonicalize: config.passes.canonicalize,
                make_static: make_static || config.passes.make_static,
                instrument: true,
            };
            let prefix = resolve_prefix(&config, prefix)?;
            cmd_run(&config, passes, prefix, &run, sites.as_deref())
        }
        Commands::Canonicalize { run } => {
            let prefix = config.marker_prefix.clone();
            cmd_run(&config, Passes::only_canonicalize(), prefix, &run, None)
        }
        Commands::MakeStatic { run } => {
            let prefix = config.marker_prefix.clone();
            cmd_run(&config, Passes::only_make_static(), prefix, &run, None)
        }
        Commands::Count { file, prefix } => {
            let prefix = resolve_prefix(&config, prefix)?;
            let source = read_source(&file).with_context(|| format!("reading {}", file.display()))?;
            println!("{}", declared_marker_count(&source, &prefix));
            Ok(())
        }
        Commands::Alive { asm, prefix, total } => {
            let prefix = resolve_prefix(&config, prefix)?;
            cmd_alive(&asm, &prefix, total)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dce_probe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_prefix(config: &ToolConfig, prefix: Option<String>) -> Result<String> {
    let prefix = prefix.unwrap_or_else(|| config.marker_prefix.clone());
    if !is_valid_prefix(&prefix) {
        anyhow::bail!("probe prefix '{prefix}' is not a valid C identifier");
    }
    Ok(prefix)
}

fn cmd_run(
    config: &ToolConfig,
    passes: Passes,
    prefix: String,
    args: &RunArgs,
    sites: Option<&Path>,
) -> Result<()> {
    let units = discover(&args.paths);
    if units.is_empty() {
        anyhow::bail!("no C or C++ sources found");
    }

    let pipeline = Pipeline {
        passes,
        prefix,
        language: args.lang.or(config.language),
        verify_syntax: config.verify_syntax && !args.no_verify,
        dry_run: args.dry_run,
    };
    let report = run(&units, &pipeline);

    if args.dry_run {
        println!("{}", "[DRY RUN - no files modified]".cyan());
    }
    for file in &report.files {
        let probes = if passes.instrument {
            format!(" ({} probes)", file.sites.len())
        } else {
            String::new()
        };
        if file.changed() {
            println!("{} {}{}", "✓".green(), file.path.display(), probes);
        } else {
            println!("{} {}: unchanged{}", "⊙".yellow(), file.path.display(), probes);
        }
        for diagnostic in &file.diagnostics {
            println!("  {} {}:{}", "⊘".cyan(), file.path.display(), diagnostic);
        }
        if args.diff && file.changed() {
            display_diff(&file.path, &file.original, &file.rewritten);
        }
    }
    for failure in &report.failures {
        eprintln!("{} {}: {}", "✗".red(), failure.path.display(), failure.error);
    }

    if let Some(sites_path) = sites {
        write_sites(sites_path, &report)?;
    }

    print_summary(&report);
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn write_sites(path: &Path, report: &RunReport) -> Result<()> {
    let by_file: BTreeMap<String, _> = report
        .files
        .iter()
        .map(|file| (file.path.display().to_string(), &file.sites))
        .collect();
    let json = serde_json::to_string_pretty(&by_file)?;
    atomic_write(path, json.as_bytes())
        .with_context(|| format!("writing probe sites to {}", path.display()))?;
    Ok(())
}

fn print_summary(report: &RunReport) {
    let changed = report.files.iter().filter(|file| file.changed()).count();
    let unchanged = report.files.len() - changed;
    let skipped: usize = report.files.iter().map(|file| file.diagnostics.len()).sum();

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} rewritten", format!("{}", changed).green());
    println!("  {} unchanged", format!("{}", unchanged).yellow());
    println!("  {} sites skipped", format!("{}", skipped).cyan());
    println!("  {} failed", format!("{}", report.failures.len()).red());
}

/// Helper: Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_alive(asm_path: &Path, prefix: &str, total: Option<usize>) -> Result<()> {
    let asm = read_source(asm_path).with_context(|| format!("reading {}", asm_path.display()))?;
    let alive = alive_markers(&asm, prefix);

    let ids: Vec<String> = alive.iter().map(ToString::to_string).collect();
    println!("{} {}", "alive:".green().bold(), ids.join(" "));
    if let Some(total) = total {
        let dead: Vec<String> = dead_markers(total, &alive)
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("{} {}", "dead:".red().bold(), dead.join(" "));
    }
    Ok(())
}
