use clap::{Args, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use uuid::Uuid;

use super::{print_diff, read_document, OutputFormat};
use etymos::config::Config;
use etymos::db::{open_pool, ConnectionError, SaveOutcome, WordRepository};
use etymos::models::{ListQuery, SortOrder, WordDocument, WordRecord};
use etymos::offline::{LocalSaveOutcome, OfflineStore};

#[derive(Args)]
pub struct WordCommand {
    #[command(subcommand)]
    pub command: WordSubcommand,
}

#[derive(Subcommand)]
pub enum WordSubcommand {
    /// List stored words
    List {
        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Items per page
        #[arg(long, default_value_t = 50)]
        limit: i64,

        /// Case-insensitive lemma substring
        #[arg(long)]
        search: Option<String>,

        /// Sort order: newest, oldest, az, za
        #[arg(long, default_value = "newest")]
        sort: SortOrder,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a word's details
    Show {
        /// Word ID (UUID) or lemma
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Save a YAML word document
    Save {
        /// Document file, or `-` for stdin
        file: PathBuf,

        /// Overwrite a differing stored record
        #[arg(long)]
        force: bool,

        /// Save to the offline store without contacting the database
        #[arg(long)]
        local: bool,
    },

    /// Delete a word
    Delete {
        /// Word ID (UUID) or lemma
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl WordCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            WordSubcommand::List {
                page,
                limit,
                search,
                sort,
                format,
            } => {
                let repo = repository(config).await?;
                let mut query = ListQuery::new(*page, *limit).with_sort(*sort);
                if let Some(search) = search {
                    query = query.with_search(search);
                }
                let page = repo.list(&query).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&page)?);
                    }
                    OutputFormat::Text => {
                        if page.items.is_empty() {
                            println!("No words found");
                            return Ok(());
                        }
                        println!("{:<36}  {:<24}  PART OF SPEECH", "ID", "LEMMA");
                        println!("{}", "-".repeat(80));
                        for word in &page.items {
                            println!(
                                "{:<36}  {:<24}  {}",
                                word.id,
                                word.lemma,
                                word.part_of_speech.as_deref().unwrap_or("")
                            );
                        }
                        println!(
                            "\nPage {} of {} ({} word(s))",
                            page.page,
                            page.total_pages.max(1),
                            page.total
                        );
                    }
                }
                Ok(())
            }

            WordSubcommand::Show { identifier, format } => {
                let repo = repository(config).await?;
                let word = find(&repo, identifier)
                    .await?
                    .ok_or_else(|| format!("Word not found: {}", identifier))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&word)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", word);
                    }
                }
                Ok(())
            }

            WordSubcommand::Save { file, force, local } => {
                let raw = read_document(file)?;
                let doc = WordDocument::parse(&raw)?;

                if *local {
                    return save_local(config, &raw, *force);
                }

                let pool = match open_pool(&config.database_url.value).await {
                    Ok(pool) => pool,
                    Err(e @ ConnectionError::Connect { .. })
                    | Err(e @ ConnectionError::Io(..))
                    | Err(e @ ConnectionError::NotConfigured) => {
                        tracing::warn!(error = %e, "Database unreachable, saving locally");
                        println!("Database unreachable; saving to the offline store.");
                        return save_local(config, &raw, *force);
                    }
                    Err(e) => return Err(e.into()),
                };

                let repo = WordRepository::new(pool);
                match repo.save(&doc, *force).await? {
                    SaveOutcome::Saved { id, lemma, status } => {
                        println!("Saved '{}' ({}): {}", lemma, status, id);
                    }
                    SaveOutcome::Conflict {
                        existing_id,
                        report,
                        ..
                    } => {
                        println!(
                            "Conflict with stored '{}' ({}):",
                            doc.lemma(),
                            existing_id
                        );
                        print_diff(&report.diff);
                        println!("\nRe-run with --force to overwrite.");
                    }
                }
                Ok(())
            }

            WordSubcommand::Delete { identifier, force } => {
                let repo = repository(config).await?;
                let word = find(&repo, identifier)
                    .await?
                    .ok_or_else(|| format!("Word not found: {}", identifier))?;

                if !force {
                    print!("Delete word '{}'? [y/N] ", word.lemma);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                repo.delete(word.id).await?;
                println!("Deleted word: {}", word.lemma);
                Ok(())
            }
        }
    }
}

async fn repository(config: &Config) -> Result<WordRepository, ConnectionError> {
    Ok(WordRepository::new(
        open_pool(&config.database_url.value).await?,
    ))
}

async fn find(
    repo: &WordRepository,
    identifier: &str,
) -> Result<Option<WordRecord>, Box<dyn std::error::Error>> {
    // Try to parse as UUID first, then fall back to lemma lookup
    let word = if let Ok(uuid) = Uuid::parse_str(identifier) {
        repo.get_by_id(uuid).await?
    } else {
        repo.find_by_lemma(identifier).await?
    };
    Ok(word)
}

fn save_local(config: &Config, raw: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = OfflineStore::new(
        config.offline_path.value.clone(),
        config.max_local_items.value,
    );
    report_local(store.save_checked(raw, None, force)?);
    Ok(())
}

pub(super) fn report_local(outcome: LocalSaveOutcome) {
    match outcome {
        LocalSaveOutcome::Conflict { id, report, .. } => {
            println!("Conflict with offline record {}:", id);
            print_diff(&report.diff);
            println!("\nRe-run with --force to overwrite.");
        }
        other => println!("Offline record {} ({})", other.id(), other.status()),
    }
}
