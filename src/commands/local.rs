use clap::{Args, Subcommand};
use chrono::{TimeZone, Utc};
use std::path::PathBuf;

use super::word::report_local;
use super::{read_document, OutputFormat};
use etymos::offline::OfflineStore;

#[derive(Args)]
pub struct LocalCommand {
    #[command(subcommand)]
    pub command: LocalSubcommand,
}

#[derive(Subcommand)]
pub enum LocalSubcommand {
    /// List documents waiting in the offline store
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Save a YAML document to the offline store
    Save {
        /// Document file, or `-` for stdin
        file: PathBuf,

        /// Replace this offline record instead of matching by lemma
        #[arg(long)]
        id: Option<String>,

        /// Overwrite a differing offline record
        #[arg(long)]
        force: bool,
    },

    /// Delete an offline record
    Delete {
        /// Offline record ID
        id: String,
    },

    /// Remove every offline record
    Clear,
}

impl LocalCommand {
    pub fn run(&self, store: &OfflineStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            LocalSubcommand::List { format } => {
                let records = store.list()?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                    OutputFormat::Text => {
                        if records.is_empty() {
                            println!("Offline store is empty");
                            return Ok(());
                        }
                        println!("{:<36}  {:<24}  UPDATED", "ID", "LEMMA");
                        println!("{}", "-".repeat(80));
                        for record in &records {
                            let updated = Utc
                                .timestamp_millis_opt(record.updated_at)
                                .single()
                                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                                .unwrap_or_default();
                            println!(
                                "{:<36}  {:<24}  {}",
                                record.id,
                                record.lemma().unwrap_or_else(|| "(unknown)".to_string()),
                                updated
                            );
                        }
                        println!("\nTotal: {} of {} record(s)", records.len(), store.limit());
                    }
                }
                Ok(())
            }

            LocalSubcommand::Save { file, id, force } => {
                let raw = read_document(file)?;
                report_local(store.save_checked(&raw, id.as_deref(), *force)?);
                Ok(())
            }

            LocalSubcommand::Delete { id } => {
                if store.delete(id)? {
                    println!("Deleted offline record: {}", id);
                    Ok(())
                } else {
                    Err(format!("Offline record not found: {}", id).into())
                }
            }

            LocalSubcommand::Clear => {
                store.clear()?;
                println!("Offline store cleared.");
                Ok(())
            }
        }
    }
}
