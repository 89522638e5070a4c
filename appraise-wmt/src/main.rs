//! appraise-wmt - command-line front end for the WMT HIT pipeline
//!
//! Stores HITs in `<root>/appraise.db` and uploaded XML in `<root>/xml`.
//! Exports are written to stdout, logs to stderr.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use appraise_common::config::{resolve_root_folder, RootFolderInitializer, TomlConfig, ROOT_FOLDER_ENV};
use appraise_common::db::init_database;
use appraise_common::LanguagePair;
use appraise_wmt::agreement::agreement_report;
use appraise_wmt::export;
use appraise_wmt::store::{DirectoryBlobStore, SqliteStore};
use appraise_wmt::xml::{self, DocumentForm};
use appraise_wmt::{HitService, NewResult, TaskType};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Service = HitService<SqliteStore, DirectoryBlobStore>;

/// Command-line arguments for appraise-wmt
#[derive(Parser, Debug)]
#[command(name = "appraise-wmt")]
#[command(about = "WMT human evaluation HIT pipeline")]
#[command(version)]
struct Args {
    /// Root folder holding the database and uploaded XML
    #[arg(long, global = true)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a HIT XML file against the schema
    Validate {
        file: PathBuf,
        /// Require the single-task form (`<hit>` on top-level)
        #[arg(long)]
        task: bool,
    },
    /// Create one HIT per `<hit>` of a batch file
    Import {
        file: PathBuf,
        /// Override the language pair of every HIT, e.g. eng2deu
        #[arg(long)]
        language_pair: Option<LanguagePair>,
        #[arg(long, default_value = "ranking")]
        task_type: TaskType,
    },
    /// List all HITs
    List {
        #[arg(long)]
        json: bool,
    },
    /// Assign a judge to a HIT
    Assign { hit: String, user: String },
    /// Remove a judge from a HIT
    Unassign { hit: String, user: String },
    /// Mark a HIT active or inactive
    SetActive {
        hit: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Store a judge's raw result for a segment
    Submit {
        hit: String,
        segment: i64,
        user: String,
        raw_result: String,
        /// Time spent on the segment, in seconds
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Completion status of a HIT
    Status {
        hit: String,
        /// Status for one judge instead of all assigned judges
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a HIT with its segments and results
    Delete { hit: String },
    /// Export HITs with their results as XML (all HITs when none given)
    ExportXml { hits: Vec<String> },
    /// Export HIT ids with their language pair as CSV
    ExportIds { hits: Vec<String> },
    /// Export ranking results as CSV
    ExportResults { hits: Vec<String> },
    /// Export ranking triples in Artstein & Poesio format
    ExportApf { hits: Vec<String> },
    /// Agreement scores per HIT and their average
    Agreement { hits: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Appraise WMT (appraise-wmt) v{}", env!("CARGO_PKG_VERSION"));

    // Validation needs no database
    if let Command::Validate { file, task } = &args.command {
        return validate(file, *task);
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path(&config);
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let service = HitService::new(SqliteStore::new(pool), DirectoryBlobStore::new(initializer.xml_folder()));
    run(&service, args.command).await
}

fn validate(file: &Path, task_only: bool) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let outcome = if task_only {
        xml::validate_task(&text)
    } else {
        match xml::detect_form(&text)? {
            DocumentForm::Batch => xml::validate_batch(&text),
            DocumentForm::Task => xml::validate_task(&text),
        }
    };
    outcome?;
    println!("{}: valid", file.display());
    Ok(())
}

fn parse_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid duration: {}", secs))
}

async fn run(service: &Service, command: Command) -> Result<()> {
    match command {
        Command::Validate { file, task } => validate(&file, task)?,
        Command::Import {
            file,
            language_pair,
            task_type,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("Import file has no usable name")?;

            let hits = service
                .import_batch(&text, language_pair, task_type, Some(name))
                .await?;
            if let Some(key) = hits.first().and_then(|h| h.source_file.as_deref()) {
                info!("Kept {} as source file {}", file.display(), key);
            }
            for hit in hits {
                println!("{}\t{}\t{}", hit.id, hit.block_id, hit.language_pair);
            }
        }
        Command::List { json } => {
            let hits = service.list_hits().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
                return Ok(());
            }
            for hit in hits {
                let users: Vec<&str> = hit.users.iter().map(String::as_str).collect();
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    hit.id,
                    hit.block_id,
                    hit.language_pair,
                    hit.task_type.slug(),
                    if hit.active { "active" } else { "inactive" },
                    users.join(",")
                );
            }
        }
        Command::Assign { hit, user } => {
            service.assign_user(&hit, &user).await?;
        }
        Command::Unassign { hit, user } => {
            service.unassign_user(&hit, &user).await?;
        }
        Command::SetActive { hit, active } => {
            service.set_active(&hit, active).await?;
        }
        Command::Submit {
            hit,
            segment,
            user,
            raw_result,
            duration,
        } => {
            let owner = service.get_hit(&hit).await?;
            if owner.segment(segment).is_none() {
                bail!("Segment {} does not belong to HIT {}", segment, hit);
            }
            let mut result = NewResult::new(segment, user, raw_result);
            if let Some(secs) = duration {
                result = result.with_duration(parse_duration(secs)?);
            }
            let record = service.submit_result(result).await?;
            println!("{}", record.id);
        }
        Command::Status { hit, user, json } => {
            let status = match user {
                Some(user) => service.status_for_user(&hit, &user).await?,
                None => service.status_for_all_users(&hit).await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            println!(
                "{}\t{:.2}%\t{}\t{}",
                status.completion(),
                status.percentage,
                status.band,
                status.duration_label()
            );
        }
        Command::Delete { hit } => {
            if !service.delete_hit(&hit).await? {
                bail!("No such HIT: {}", hit);
            }
        }
        Command::ExportXml { hits } => {
            let snapshots = service.snapshots(&hits).await?;
            print!("{}", export::export_hits_xml(&snapshots));
        }
        Command::ExportIds { hits } => {
            let snapshots = service.snapshots(&hits).await?;
            println!("{}", export::export_task_ids_csv(snapshots.iter().map(|s| &s.hit)));
        }
        Command::ExportResults { hits } => {
            let snapshots = service.snapshots(&hits).await?;
            println!("{}", export::export_results_csv(&snapshots));
        }
        Command::ExportApf { hits } => {
            let snapshots = service.snapshots(&hits).await?;
            println!("{}", export::export_hits_apf(&snapshots));
        }
        Command::Agreement { hits } => {
            let snapshots = service.snapshots(&hits).await?;
            println!("{}", agreement_report(&snapshots).to_text());
        }
    }
    Ok(())
}
