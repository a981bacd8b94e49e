//! Config command - show and initialize settings

use anyhow::Result;
use clap::Subcommand;
use tally_core::config::Config;

use super::get_tally_dir;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Write the built-in alias table into settings.json for editing
    Init,
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let tally_dir = get_tally_dir();

    match command {
        ConfigCommands::Show => {
            let config = Config::load(&tally_dir)?;
            println!("{}", config.to_json_pretty()?);
        }
        ConfigCommands::Path => {
            println!("{}", Config::settings_path(&tally_dir).display());
        }
        ConfigCommands::Init => {
            let config = Config::load(&tally_dir)?.with_default_aliases();
            let path = config.save(&tally_dir)?;
            output::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}
