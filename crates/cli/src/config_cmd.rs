//! `polecheck config`: print or validate the thresholds config.

use std::path::PathBuf;

use clap::Subcommand;
use polecheck_recon::QcConfig;

use crate::{load_config, CliError};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the default config as TOML
    #[command(after_help = "\
Examples:
  polecheck config defaults > polecheck.toml")]
    Defaults,

    /// Validate a config without running
    #[command(after_help = "\
Examples:
  polecheck config validate polecheck.toml")]
    Validate {
        /// Path to the .toml config file
        config: PathBuf,
    },
}

pub fn cmd_config(cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Defaults => {
            print!("{}", QcConfig::default().to_toml()?);
            Ok(())
        }
        ConfigCommands::Validate { config } => {
            let parsed = load_config(Some(&config))?;
            eprintln!(
                "valid: config '{}' (span radius {} m, load case '{}')",
                parsed.name, parsed.kmz.span_radius_m, parsed.rules.required_load_case,
            );
            Ok(())
        }
    }
}
