//! Sync CLI commands for pushing offline documents to the database.

use clap::{Args, Subcommand};
use std::collections::HashMap;

use super::{print_diff, OutputFormat};
use etymos::db::WordRepository;
use etymos::offline::OfflineStore;
use etymos::sync::{
    BatchSummary, CheckStatus, ItemState, Resolution, SyncCoordinator, SyncItem,
};

/// Sync offline documents with the database
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: SyncSubcommand,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Compare every offline document with the database without writing
    Check {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Sync every offline document
    Run {
        /// Overwrite every conflicting stored record
        #[arg(long, conflicts_with_all = ["overwrite", "skip"])]
        force: bool,

        /// Overwrite the stored record for this offline ID (repeatable)
        #[arg(long, value_name = "ID")]
        overwrite: Vec<String>,

        /// Leave this offline ID untouched (repeatable)
        #[arg(long, value_name = "ID")]
        skip: Vec<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Sync a single offline document
    One {
        /// Offline record ID
        id: String,

        /// Overwrite a conflicting stored record
        #[arg(long)]
        force: bool,
    },
}

impl SyncCommand {
    pub async fn run(
        &self,
        repo: &WordRepository,
        store: &OfflineStore,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let coordinator = SyncCoordinator::new(repo, store);
        let items: Vec<SyncItem> = store.list()?.into_iter().map(SyncItem::from).collect();

        match &self.command {
            SyncSubcommand::Check { format } => {
                let checks = coordinator.check_many(&items).await;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&checks)?);
                    }
                    OutputFormat::Text => {
                        if checks.is_empty() {
                            println!("Nothing to sync");
                            return Ok(());
                        }
                        for check in &checks {
                            let result = &check.result;
                            let label = match result.status {
                                CheckStatus::Created => "new",
                                CheckStatus::Ok => "unchanged",
                                CheckStatus::Conflict => "conflict",
                                CheckStatus::Error => "error",
                            };
                            println!(
                                "{:<10} {} {}",
                                label,
                                check.id,
                                result
                                    .lemma
                                    .as_deref()
                                    .or(result.error.as_deref())
                                    .unwrap_or("")
                            );
                            if let Some(diff) = &result.diff {
                                print_diff(diff);
                            }
                        }
                    }
                }
                Ok(())
            }

            SyncSubcommand::Run {
                force,
                overwrite,
                skip,
                format,
            } => {
                if items.is_empty() {
                    println!("Nothing to sync");
                    return Ok(());
                }

                let summary = if overwrite.is_empty() && skip.is_empty() {
                    coordinator.execute_many(&items, *force).await
                } else {
                    let mut decisions = HashMap::new();
                    for id in overwrite {
                        decisions.insert(id.clone(), Resolution::Overwrite);
                    }
                    for id in skip {
                        decisions.insert(id.clone(), Resolution::Skip);
                    }
                    coordinator.apply_decisions(&items, &decisions).await
                };

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&summary)?);
                    }
                    OutputFormat::Text => print_summary(&summary),
                }
                Ok(())
            }

            SyncSubcommand::One { id, force } => {
                let item = items
                    .into_iter()
                    .find(|item| &item.id == id)
                    .ok_or_else(|| format!("Offline record not found: {}", id))?;

                let outcome = coordinator.execute_one(&item, *force).await;
                match &outcome.state {
                    ItemState::Synced { status, word_id } => {
                        println!("✓ {} {} -> {}", status, item.id, word_id);
                        Ok(())
                    }
                    ItemState::Conflict { diff } => {
                        println!("Conflict for {}:", item.id);
                        print_diff(diff);
                        println!("\nRe-run with --force to overwrite.");
                        Ok(())
                    }
                    ItemState::Failed { reason } => Err(reason.clone().into()),
                    other => Err(format!("Unexpected sync state '{}'", other.name()).into()),
                }
            }
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    for outcome in &summary.outcomes {
        match &outcome.state {
            ItemState::Synced { status, .. } => {
                println!("  ✓ {} {}", status, outcome.item_id)
            }
            ItemState::Conflict { diff } => {
                println!("  ! conflict {} ({} change(s))", outcome.item_id, diff.len())
            }
            ItemState::Failed { reason } => {
                println!("  ✗ failed {}: {}", outcome.item_id, reason)
            }
            other => println!("  - {} {}", other.name(), outcome.item_id),
        }
    }

    println!();
    println!(
        "Synced: {}  Failed: {}  Conflicts: {}  Skipped: {}",
        summary.success_count,
        summary.failed_count,
        summary.conflict_count,
        summary.skipped_count
    );
    if summary.conflict_count > 0 {
        println!("Conflicting items stay offline. Use --overwrite/--skip or --force.");
    }
}
