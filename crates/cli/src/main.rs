// polecheck - pole design QC and fiber-map reconciliation (headless)

mod commands;
mod config_cmd;
mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use polecheck_recon::{QcConfig, QcError};
use tracing_subscriber::EnvFilter;

use config_cmd::ConfigCommands;
use exit_codes::{EXIT_CONFIG, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "polecheck")]
#[command(about = "Quality control for utility pole design exports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Verbose logging on stderr (-v debug, -vv trace). POLECHECK_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every QC rule on every pole (exit 1 = at least one pole FAILs)
    #[command(after_help = "\
Examples:
  polecheck check project.json
  polecheck check project.json --kmz fiber-map.json --json
  polecheck check project.json --overlay edits.json --output report.json")]
    Check {
        /// Pole/design JSON export
        input: PathBuf,

        /// Fiber map as GeoJSON features (converted from KMZ/KML)
        #[arg(long)]
        kmz: Option<PathBuf>,

        /// Separate export holding the remedy design
        #[arg(long)]
        remedy: Option<PathBuf>,

        /// Edit overlay applied before checking
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Thresholds config (.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON report to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON report to file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Infer spans and diff PROPOSED against REMEDY wires
    #[command(after_help = "\
Examples:
  polecheck spans project.json
  polecheck spans proposed.json --remedy remedy.json --strict")]
    Spans {
        /// Pole/design JSON export
        input: PathBuf,

        /// Separate export holding the remedy design
        #[arg(long)]
        remedy: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        /// Exit 1 when any span or wire differs
        #[arg(long)]
        strict: bool,
    },

    /// Reconcile fiber counts against a fiber map
    #[command(after_help = "\
Examples:
  polecheck fiber project.json --kmz fiber-map.json
  polecheck fiber project.json --kmz fiber-map.json --by-pole --json")]
    Fiber {
        /// Pole/design JSON export
        input: PathBuf,

        /// Fiber map as GeoJSON features
        #[arg(long)]
        kmz: Option<PathBuf>,

        /// Match fiber map samples to poles instead of spans
        #[arg(long)]
        by_pole: bool,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        /// Exit 1 when any span count disagrees with the map
        #[arg(long)]
        strict: bool,
    },

    /// Write a corrected copy of the input with overlay edits applied
    #[command(after_help = "\
Examples:
  polecheck export project.json --overlay edits.json
  polecheck export project.json --overlay edits.json --output fixed.json")]
    Export {
        /// Pole/design JSON export
        input: PathBuf,

        /// Edit overlay (environments, fiber sizes, WEP reorder)
        #[arg(long)]
        overlay: PathBuf,

        /// Output path [default: updated-spidacalc-data.json]
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Inspect or validate thresholds config
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("POLECHECK_COMMIT"), ")",
        "\nengine:  polecheck-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("POLECHECK_TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("POLECHECK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // Stdout is reserved for JSON output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check { input, kmz, remedy, overlay, config, json, output } => {
            commands::cmd_check(input, kmz, remedy, overlay, config, json, output)
        }
        Commands::Spans { input, remedy, config, json, strict } => {
            commands::cmd_spans(input, remedy, config, json, strict)
        }
        Commands::Fiber { input, kmz, by_pole, config, json, strict } => {
            commands::cmd_fiber(input, kmz, by_pole, config, json, strict)
        }
        Commands::Export { input, overlay, output, config } => {
            commands::cmd_export(input, overlay, output, config)
        }
        Commands::Config { command } => config_cmd::cmd_config(command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<QcError> for CliError {
    fn from(err: QcError) -> Self {
        let code = match err {
            QcError::ConfigParse(_) | QcError::ConfigValidation(_) => EXIT_CONFIG,
            QcError::InputParse { .. } | QcError::OverlayParse(_) => EXIT_PARSE,
        };
        Self::new(code, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Shared file helpers
// ---------------------------------------------------------------------------

pub fn read_text(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))
}

pub fn write_text(path: &Path, text: &str) -> Result<(), CliError> {
    std::fs::write(path, text).map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))
}

/// Defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<QcConfig, CliError> {
    match path {
        Some(path) => {
            let text = read_text(path)?;
            QcConfig::from_toml(&text).map_err(|e| {
                CliError::from(e).with_hint(format!("see `polecheck config defaults` ({})", path.display()))
            })
        }
        None => Ok(QcConfig::default()),
    }
}

pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
