use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::OutputFormat;
use etymos::config::{Config, ConfigUpdate};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write values to the config file
    Set {
        /// Database URL or file path (empty string restores the default)
        #[arg(long)]
        database_url: Option<String>,

        /// Offline store file
        #[arg(long)]
        offline_path: Option<PathBuf>,

        /// Maximum number of offline records
        #[arg(long)]
        max_local_items: Option<usize>,
    },
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_url: {}", config.database_url.value);
                        println!("  source: {}", config.database_url.source);
                        println!();

                        println!("offline_path: {}", config.offline_path.value.display());
                        println!("  source: {}", config.offline_path.source);
                        println!();

                        println!("max_local_items: {}", config.max_local_items.value);
                        println!("  source: {}", config.max_local_items.source);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Set {
                database_url,
                offline_path,
                max_local_items,
            } => {
                if database_url.is_none() && offline_path.is_none() && max_local_items.is_none() {
                    return Err("Nothing to set. Provide at least one option.".into());
                }

                let update = ConfigUpdate {
                    database_url: database_url.clone(),
                    offline_path: offline_path.clone(),
                    max_local_items: *max_local_items,
                };
                let path = config_path.unwrap_or_else(Config::default_config_path);
                Config::update(Some(path.clone()), update)?;
                println!("Updated {}", path.display());
                Ok(())
            }
        }
    }
}
