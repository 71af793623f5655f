use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use citesync_core::{AppConfig, CoreError, ExitCode, load_documents, load_entries, save_entries};
use citesync_resolver::{
    EnrichmentCoordinator, EnrichmentStatus, ReconcileReport, Reconciler, RequiredFields,
    build_sources, normalize_identifier, normalize_title,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "citesync",
    about = "Reconcile research notes with a bibliography and fill in missing metadata",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting CITESYNC_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Match notes to library entries and enrich incomplete entries.
    Reconcile {
        /// Notes directory (overrides config).
        #[arg(long)]
        notes: Option<PathBuf>,
        /// Entry library file (overrides config).
        #[arg(long)]
        entries: Option<PathBuf>,
        /// Minimum title similarity for a title match, 0.0 to 1.0.
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        no_title_fallback: bool,
        /// Match only; never query sources.
        #[arg(long)]
        no_enrich: bool,
        /// Save enriched entries back to the library file.
        #[arg(long)]
        write: bool,
    },

    /// Fetch metadata for one identifier from the configured sources.
    Enrich { identifier: String },

    /// Print the canonical form of an identifier or title.
    Normalize {
        value: String,
        #[arg(long)]
        title: bool,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config values.
    List,
    /// Print the config file path.
    Path,
    /// Write a default config file if none exists.
    Init,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing();

    let json_output = cli.json || std::env::var("CITESYNC_JSON").as_deref() == Ok("1");
    let mut config = AppConfig::load()?;

    match cli.command {
        Commands::Reconcile {
            notes,
            entries,
            threshold,
            no_title_fallback,
            no_enrich,
            write,
        } => {
            if let Some(dir) = notes {
                config.library.notes_dir = dir.to_string_lossy().to_string();
            }
            if let Some(file) = entries {
                config.library.entries_file = file.to_string_lossy().to_string();
            }
            if let Some(t) = threshold {
                if !(0.0..=1.0).contains(&t) {
                    fail(json_output, ExitCode::InvalidArgs, "invalid_args", &format!("threshold must be within 0..1, got {t}"), &start);
                }
                config.matching.title_threshold = t;
            }
            if no_title_fallback {
                config.matching.title_fallback = false;
            }
            if no_enrich {
                config.enrichment.enabled = false;
            }
            if let Err(e) = config.validate() {
                fail(json_output, ExitCode::InvalidArgs, "invalid_config", &e.to_string(), &start);
            }

            let documents = match load_documents(&config.notes_dir()) {
                Ok(docs) => docs,
                Err(CoreError::DirectoryNotFound(dir)) => {
                    fail(json_output, ExitCode::NotFound, "not_found", &format!("Notes directory not found: {dir}"), &start);
                }
                Err(e) => return Err(e.into()),
            };
            let entries_path = config.entries_path();
            let mut library = load_entries(&entries_path)?;

            let sources = build_sources(
                &config.enrichment.sources,
                &config.sources,
                Duration::from_secs(config.enrichment.request_timeout_secs),
            )?;
            let reconciler = Reconciler::from_config(&config, sources)?;

            let cancel = cancel_on_ctrl_c();
            let report = reconciler.reconcile(&documents, &library, &cancel).await?;

            let mut written = 0;
            if write && !report.updated_entries.is_empty() {
                written = report.apply(&mut library);
                save_entries(&entries_path, &library)?;
            }
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "report": report, "written": written },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_report(&report);
                if written > 0 {
                    println!("Saved {written} updated entries to {}", entries_path.display());
                } else if !report.updated_entries.is_empty() {
                    println!("{} entries can be updated; rerun with --write to save.", report.updated_entries.len());
                }
            }
        }

        Commands::Enrich { identifier } => {
            let id = match normalize_identifier(&identifier) {
                Ok(id) => id,
                Err(e) => fail(json_output, ExitCode::InvalidArgs, "invalid_identifier", &e.to_string(), &start),
            };
            if let Err(e) = config.validate() {
                fail(json_output, ExitCode::InvalidArgs, "invalid_config", &e.to_string(), &start);
            }

            let sources = build_sources(
                &config.enrichment.sources,
                &config.sources,
                Duration::from_secs(config.enrichment.request_timeout_secs),
            )?;
            let coordinator = EnrichmentCoordinator::from_config(&config.enrichment);
            let result = coordinator.enrich(&id, &sources, &RequiredFields).await?;
            let dur = start.elapsed().as_millis();

            if result.merged_entry.fields.is_empty() {
                fail(json_output, ExitCode::NotFound, "not_found", &format!("No source knows {id}"), &start);
            }

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":result,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("{}", serde_json::to_string_pretty(&result.merged_entry)?);
                for report in &result.per_source {
                    let fields: Vec<&str> = report.fields_contributed.iter().map(|f| f.as_str()).collect();
                    println!(
                        "  {source:<18} attempts={attempts}  {outcome}  {fields}",
                        source = report.source,
                        attempts = report.attempts,
                        outcome = outcome_label(&report.outcome),
                        fields = fields.join(","),
                    );
                }
                println!("Completeness: {:.0}%", result.completeness_score * 100.0);
            }
        }

        Commands::Normalize { value, title } => {
            let dur = start.elapsed().as_millis();
            let normalized = if title {
                normalize_title(&value).to_string()
            } else {
                match normalize_identifier(&value) {
                    Ok(id) => id.into_string(),
                    Err(e) => fail(json_output, ExitCode::InvalidArgs, "invalid_identifier", &e.to_string(), &start),
                }
            };
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"input":value,"normalized":normalized},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("{normalized}");
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::List => {
                    let kv = config_key_values(&config);
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":kv,"meta":{"duration_ms":dur}}))?;
                    } else {
                        for (k, v) in &kv {
                            println!("{k} = {v}");
                        }
                    }
                }
                ConfigAction::Path => {
                    let path = AppConfig::config_path();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path,"exists":path.exists()},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", path.display());
                    }
                }
                ConfigAction::Init => {
                    let path = AppConfig::config_path();
                    let created = !path.exists();
                    if created {
                        AppConfig::default().save_to(&path)?;
                    }
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path,"created":created},"meta":{"duration_ms":dur}}))?;
                    } else if created {
                        println!("Wrote default config to {}", path.display());
                    } else {
                        println!("Config already exists: {}", path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,citesync_resolver=info,citesync_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling pending enrichments");
            child.cancel();
        }
    });
    token
}

fn fail(json_output: bool, code: ExitCode, kind: &str, message: &str, start: &Instant) -> ! {
    let dur = start.elapsed().as_millis();
    if json_output {
        let _ = print_json(&serde_json::json!({"status":"error","error":kind,"message":message,"meta":{"duration_ms":dur}}));
    } else {
        eprintln!("{message}");
    }
    std::process::exit(code as i32);
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    for outcome in &report.outcomes {
        let title = outcome
            .entry
            .as_ref()
            .and_then(|e| e.title())
            .unwrap_or("");
        let enrichment = match &outcome.enrichment {
            Some(EnrichmentStatus::Enriched { fields_added, .. }) if !fields_added.is_empty() => {
                format!("+{}", fields_added.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(","))
            }
            Some(EnrichmentStatus::Enriched { .. }) => "no new fields".to_string(),
            Some(EnrichmentStatus::NoIdentifier) => "no identifier".to_string(),
            Some(EnrichmentStatus::Cancelled) => "cancelled".to_string(),
            Some(EnrichmentStatus::NotNeeded | EnrichmentStatus::Skipped) | None => String::new(),
        };
        let detail = if outcome.contenders.is_empty() {
            enrichment
        } else {
            format!("candidates {:?}", outcome.contenders)
        };
        println!(
            "{state:<22}  {doc:<40}  {title:<40}  {detail}",
            state = outcome.match_state.as_str(),
            doc = outcome.document.id,
        );
    }

    let s = &report.stats;
    println!();
    println!("Documents:             {}", s.documents);
    println!("  by identifier:       {}", s.matched_by_identifier);
    println!("  by title:            {}", s.matched_by_title);
    println!("  ambiguous:           {}", s.ambiguous);
    println!("  unmatched:           {}", s.unmatched);
    println!("Entries enriched:      {}", s.enriched);
    if s.cancelled > 0 {
        println!("Enrichments cancelled: {}", s.cancelled);
    }
    for (name, source) in &s.sources {
        println!(
            "  {name:<18} {:>5.1}% ok  ({} found, {} not found, {} failed, {} calls)",
            source.success_rate() * 100.0,
            source.succeeded,
            source.not_found,
            source.failed,
            source.attempts,
        );
    }
}

fn outcome_label(outcome: &citesync_resolver::FetchOutcome) -> String {
    use citesync_resolver::FetchOutcome;
    match outcome {
        FetchOutcome::Found(_) => "found".to_string(),
        FetchOutcome::NotFound => "not found".to_string(),
        FetchOutcome::TransientError(e) => format!("transient error: {e}"),
        FetchOutcome::PermanentError(e) => format!("error: {e}"),
    }
}

fn config_key_values(config: &AppConfig) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("library.notes_dir", config.library.notes_dir.clone());
    map.insert("library.entries_file", config.library.entries_file.clone());
    map.insert("matching.title_fallback", config.matching.title_fallback.to_string());
    map.insert("matching.title_threshold", config.matching.title_threshold.to_string());
    map.insert("enrichment.enabled", config.enrichment.enabled.to_string());
    map.insert("enrichment.min_completeness", config.enrichment.min_completeness.to_string());
    map.insert("enrichment.max_attempts_per_source", config.enrichment.max_attempts_per_source.to_string());
    map.insert("enrichment.backoff_ms", config.enrichment.backoff_ms.to_string());
    map.insert("enrichment.request_timeout_secs", config.enrichment.request_timeout_secs.to_string());
    map.insert("enrichment.concurrency", config.enrichment.concurrency.to_string());
    map.insert("enrichment.sources", config.enrichment.sources.join(","));
    map.insert("sources.polite_email", config.sources.polite_email.clone().unwrap_or_default());
    map.insert(
        "sources.semantic_scholar_api_key",
        if config.sources.semantic_scholar_api_key.is_some() { "(set)".to_string() } else { String::new() },
    );
    map.insert("sources.cache_enabled", config.sources.cache_enabled.to_string());
    map.insert("sources.cache_ttl_hours", config.sources.cache_ttl_hours.to_string());
    map
}
