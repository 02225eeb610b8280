//! sbom-binscan: SBOM generation from linked binaries
//!
//! Scans objects, archives, executables and shared libraries, and writes
//! SPDX or CycloneDX documents describing them.

#![allow(clippy::needless_pass_by_value)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use sbom_binscan::{
    cli::{self, OutputTarget, ScanInputs},
    config::{load_or_default, ConfigError, ScanConfig, Validatable},
    formats::FormatFamily,
    graph::ResolutionMode,
    reports::ReportFormat,
};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build long version string with format support info
const fn build_long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\n\nInput Formats:",
        "\n  ELF (32/64-bit, LE/BE), Mach-O, PE/COFF, ar archives",
        "\n\nSBOM Formats:",
        "\n  SPDX:      2.3 (tag-value), 3.0.0, 3.0.1 (JSON-LD)",
        "\n  CycloneDX: 1.4, 1.5, 1.6 (JSON)",
        "\n\nReport Formats:",
        "\n  text, json, csv"
    )
}

#[derive(Parser)]
#[command(name = "sbom-binscan")]
#[command(version, long_version = build_long_version())]
#[command(about = "Generate, validate and compare SBOMs for linked binaries", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  Success
    1  Invalid document / changes detected with --fail-on-change
    3  Error occurred

EXAMPLES:
    # SBOM for an executable and the libraries it links against
    sbom-binscan scan target/release/app -l /usr/lib/libz.so.1 -o app.spdx

    # CycloneDX 1.5 without touching the host's library directories
    sbom-binscan scan app --format cyclonedx-1.5 --resolution-mode declared-only

    # What changed between two builds
    sbom-binscan diff old.spdx new.spdx -r csv")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

// ============================================================================
// Command argument structs
// ============================================================================

/// Arguments for the `scan` subcommand
#[derive(Parser)]
struct ScanArgs {
    /// Objects, archives or executables to scan
    inputs: Vec<PathBuf>,

    /// Shared libraries the artifact links against (repeatable)
    #[arg(short = 'l', long = "library", value_name = "PATH")]
    libraries: Vec<PathBuf>,

    /// Output document path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Document format: spdx, cyclonedx, or an alias with a version such as spdx-3.0.1
    #[arg(short, long)]
    format: Option<String>,

    /// Version of the selected family
    #[arg(long)]
    format_version: Option<String>,

    /// How dependency names are resolved (live-filesystem, declared-only)
    #[arg(long)]
    resolution_mode: Option<ResolutionMode>,

    /// Extra library search directory (repeatable, searched first)
    #[arg(short = 'L', long = "search-path", value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// Directory holding spdx-<version>.json node-shape schemas
    #[arg(long, env = "SBOM_BINSCAN_SCHEMA_DIR")]
    schema_dir: Option<PathBuf>,

    /// Skip inputs whose path matches this regex (repeatable)
    #[arg(long = "exclude", value_name = "REGEX")]
    exclude: Vec<String>,

    /// Do not read DWARF debug information
    #[arg(long)]
    no_debug_info: bool,

    /// Do not compute SHA-256 checksums
    #[arg(long)]
    no_checksums: bool,

    /// Include components from system library directories
    #[arg(long)]
    include_system_libraries: bool,

    /// Only resolve direct dependencies
    #[arg(long)]
    no_transitive: bool,

    /// Scan inputs on several threads (lightweight debug info only)
    #[arg(long)]
    parallel: bool,

    /// Print session statistics as JSON
    #[arg(long)]
    stats: bool,
}

/// Arguments for the `validate` subcommand
#[derive(Parser)]
struct ValidateArgs {
    /// SBOM document to validate
    sbom: PathBuf,

    /// Document format (detected from content when omitted)
    #[arg(short, long)]
    format: Option<String>,

    /// Result format
    #[arg(short, long, default_value = "text")]
    output: ReportFormat,

    /// Result file (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

/// Arguments for the `diff` subcommand
#[derive(Parser)]
struct DiffArgs {
    /// Path to the old/baseline SBOM
    old: PathBuf,

    /// Path to the new SBOM
    new: PathBuf,

    /// Format of both documents (detected from content when omitted)
    #[arg(short, long)]
    format: Option<String>,

    /// Report renderer
    #[arg(short, long, default_value = "text")]
    report: ReportFormat,

    /// Report file (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,

    /// Include unchanged components in the report
    #[arg(long)]
    include_unchanged: bool,

    /// Exit with code 1 if any component changed
    #[arg(long)]
    fail_on_change: bool,
}

/// Arguments for the `merge` subcommand
#[derive(Parser)]
struct MergeArgs {
    /// SBOM documents to merge
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Format of the inputs (detected per file when omitted)
    #[arg(long)]
    input_format: Option<String>,

    /// Output document format or alias
    #[arg(short, long, default_value = "spdx")]
    format: String,

    /// Document name
    #[arg(long)]
    name: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan binaries and write an SBOM
    Scan(ScanArgs),

    /// Validate an SBOM document
    Validate(ValidateArgs),

    /// Compare two SBOMs
    Diff(DiffArgs),

    /// Merge several SBOMs into one, keeping the highest version per component
    Merge(MergeArgs),

    /// List supported SBOM formats and their features
    Formats {
        #[arg(short, long, default_value = "text")]
        output: ReportFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate JSON Schema for the config file format
    ConfigSchema {
        /// Write schema to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show, discover, or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Sub-subcommands for the `config` command
#[derive(Subcommand)]
enum ConfigAction {
    /// Print current effective configuration (merged from defaults + file)
    Show,
    /// Print config file search paths and discovered config file
    Path,
    /// Generate an example .sbom-binscan.yaml in the current directory
    Init,
}

/// Layer scan flags over the file configuration.
fn scan_config(base: ScanConfig, args: &ScanArgs) -> Result<ScanConfig> {
    let mut config = base;
    if let Some(format) = &args.format {
        let (family, version) = format
            .to_ascii_lowercase()
            .split_once('-')
            .map(|(f, v)| (f.to_string(), Some(v.to_string())))
            .unwrap_or_else(|| (format.to_ascii_lowercase(), None));
        config.format = family
            .parse::<FormatFamily>()
            .map_err(anyhow::Error::msg)?;
        if let Some(version) = version {
            config.set_format_version(version);
        }
    }
    if let Some(version) = &args.format_version {
        config.set_format_version(version.clone());
    }
    if let Some(output) = &args.output {
        config.output_path.clone_from(output);
    }
    if let Some(mode) = args.resolution_mode {
        config.resolution_mode = mode;
    }
    if !args.search_paths.is_empty() {
        let mut paths = args.search_paths.clone();
        paths.extend(config.library_search_paths.drain(..));
        config.library_search_paths = paths;
    }
    if args.schema_dir.is_some() {
        config.schema_dir.clone_from(&args.schema_dir);
    }
    config.exclude_patterns.extend(args.exclude.iter().cloned());
    if args.no_debug_info {
        config.extract_debug_info = false;
    }
    if args.no_checksums {
        config.generate_checksums = false;
    }
    if args.include_system_libraries {
        config.include_system_libraries = true;
    }
    if args.no_transitive {
        config.transitive_dependencies = false;
    }

    let errors: Vec<ConfigError> = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration:\n  {}", messages.join("\n  "));
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    match cli.command {
        Commands::Scan(args) => {
            let (file_config, _) = load_or_default(cli.config.as_deref());
            let config = scan_config(file_config, &args)?;
            let inputs = ScanInputs {
                files: args.inputs,
                libraries: args.libraries,
                parallel: args.parallel,
            };
            if let Err(err) = cli::run_scan(config, &inputs, args.stats) {
                eprintln!("Error: {err:#}");
                std::process::exit(3);
            }
            Ok(())
        }

        Commands::Validate(args) => {
            match cli::run_validate(args.sbom, args.format, args.output, args.output_file) {
                Ok(true) => Ok(()),
                Ok(false) => std::process::exit(1),
                Err(err) => {
                    eprintln!("Error: {err:#}");
                    std::process::exit(3);
                }
            }
        }

        Commands::Diff(args) => {
            let changes = match cli::run_diff(
                args.old,
                args.new,
                args.format,
                args.report,
                args.output_file,
                args.include_unchanged,
            ) {
                Ok(changes) => changes,
                Err(err) => {
                    eprintln!("Error: {err:#}");
                    std::process::exit(3);
                }
            };
            if args.fail_on_change && changes > 0 {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Merge(args) => {
            cli::run_merge(
                args.inputs,
                args.input_format,
                &args.format,
                args.name,
                args.output_file,
            )?;
            Ok(())
        }

        Commands::Formats { output } => {
            let listing = cli::run_formats(output)?;
            cli::write_output(&listing, &OutputTarget::Stdout)
        }

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sbom-binscan", &mut io::stdout());
            Ok(())
        }

        Commands::ConfigSchema { output } => {
            let schema = sbom_binscan::config::generate_json_schema();
            match output {
                Some(path) => {
                    std::fs::write(&path, &schema)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Schema written to {}", path.display());
                }
                None => println!("{schema}"),
            }
            Ok(())
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let (config, loaded_from) = load_or_default(cli.config.as_deref());
                if let Some(path) = &loaded_from {
                    eprintln!("# Loaded from: {}", path.display());
                } else {
                    eprintln!("# No config file found; showing defaults");
                }
                let yaml =
                    serde_yaml_ng::to_string(&config).context("failed to serialize config")?;
                print!("{yaml}");
                Ok(())
            }
            ConfigAction::Path => {
                match sbom_binscan::config::discover_config_file(cli.config.as_deref()) {
                    Some(path) => println!("{}", path.display()),
                    None => {
                        eprintln!("No config file found. Searched for:");
                        for name in sbom_binscan::config::CONFIG_FILE_NAMES {
                            eprintln!("  ./{name}");
                        }
                        if let Some(dir) = dirs::config_dir() {
                            eprintln!("  {}/sbom-binscan/", dir.display());
                        }
                        if let Some(home) = dirs::home_dir() {
                            eprintln!("  {}/", home.display());
                        }
                    }
                }
                Ok(())
            }
            ConfigAction::Init => {
                let path = PathBuf::from(".sbom-binscan.yaml");
                if path.exists() {
                    anyhow::bail!("{} already exists", path.display());
                }
                std::fs::write(&path, sbom_binscan::config::generate_example_config())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!("Created {}", path.display());
                Ok(())
            }
        },
    }
}
