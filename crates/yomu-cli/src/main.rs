use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use yomu_core::error::ExitCode;
use yomu_core::{
    AppConfig, Database, FeedScope, MigrationFlags, NewFeedSavedSearch, NewSavedSearch, YomuError,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "yomu",
    about = "Saved searches, feeds and source metadata for your manga library",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting YOMU_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Saved search management.
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },

    /// Feed management.
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },

    /// Indexed source metadata.
    Metadata {
        #[command(subcommand)]
        action: MetadataAction,
    },

    /// Inspect migration flag bitmasks.
    Flags {
        #[command(subcommand)]
        action: FlagsAction,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run diagnostics.
    Doctor,

    /// Show version information.
    Version,
}

// ─── Saved Search Actions ───────────────────────────────────────────────────

#[derive(Subcommand)]
enum SavedAction {
    /// List saved searches, optionally of one source.
    List {
        #[arg(long)]
        source: Option<i64>,
    },
    /// Show one saved search.
    Show { id: i64 },
    /// Save a search for a source.
    Add {
        source: i64,
        name: String,
        #[arg(long)]
        query: Option<String>,
        /// Serialized filter list (JSON).
        #[arg(long)]
        filters: Option<String>,
    },
    /// Delete a saved search and its feed entries.
    Delete { id: i64 },
}

// ─── Feed Actions ───────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum FeedAction {
    /// List a feed. Without --source, the global feed.
    List {
        #[arg(long)]
        source: Option<i64>,
    },
    /// Add an entry. Without --search, the source's latest list.
    Add {
        source: i64,
        #[arg(long)]
        search: Option<i64>,
        /// Add to the global feed instead of the source feed.
        #[arg(long)]
        global: bool,
    },
    /// Delete a feed entry.
    Delete { id: i64 },
    /// Swap the positions of two entries.
    Swap { first: i64, second: i64 },
    /// Move an entry to the bottom of its feed.
    Bottom { id: i64 },
    /// Put entries in the given order, using the positions they hold.
    Reorder {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}

// ─── Metadata Actions ───────────────────────────────────────────────────────

#[derive(Subcommand)]
enum MetadataAction {
    /// Show stored metadata rows of a manga.
    Show { manga_id: i64 },
    /// Find manga by their indexed extra (gallery id, uuid, ...).
    Find { indexed_extra: String },
    /// Delete stored metadata of a manga.
    Delete { manga_id: i64 },
}

// ─── Flags Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum FlagsAction {
    /// Decode a bitmask. Without a value, the configured default.
    Show { bits: Option<u32> },
    /// Flags offered for an entry, with the ones set in the bitmask.
    Available {
        #[arg(long)]
        custom_cover: bool,
        #[arg(long)]
        downloads: bool,
        #[arg(long)]
        bits: Option<u32>,
    },
}

// ─── Config Actions ─────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config values.
    List,
    /// Get a specific config key.
    Get { key: String },
    /// Print the config file path.
    Path,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("YOMU_JSON").as_deref() == Ok("1");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => fail(&e.into(), json_output),
    };
    init_tracing(&config);

    if let Err(e) = run(cli.command, &config, json_output) {
        fail(&e, json_output);
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(err: &anyhow::Error, json_output: bool) -> ! {
    let (code, kind) = match err.downcast_ref::<YomuError>() {
        Some(e) if e.is_not_found() => (ExitCode::NotFound, "not_found"),
        Some(YomuError::ValidationError(_)) => (ExitCode::InvalidArgs, "invalid"),
        Some(YomuError::FeedLimitReached { .. }) => (ExitCode::Conflict, "feed_limit"),
        _ => (ExitCode::GeneralError, "error"),
    };
    if json_output {
        let body = serde_json::json!({"status":"error","error":kind,"message":err.to_string()});
        println!("{body}");
    } else {
        eprintln!("error: {err:#}");
    }
    std::process::exit(code as i32);
}

fn run(command: Commands, config: &AppConfig, json_output: bool) -> Result<()> {
    let start = Instant::now();

    match command {
        // ── Saved searches ─────────────────────────────────────────────────
        Commands::Saved { action } => {
            let db = Database::from_config(config)?;
            match action {
                SavedAction::List { source } => {
                    let searches = match source {
                        Some(source) => db.list_saved_searches(source)?,
                        None => db.list_all_saved_searches()?,
                    };
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"items":searches,"total":searches.len()},"meta":{"duration_ms":dur}}))?;
                    } else if searches.is_empty() {
                        println!("No saved searches.");
                    } else {
                        for s in &searches {
                            let query = s.query.as_deref().unwrap_or("");
                            println!("{:>6}  {:>20}  {:<30}  {query}", s.id, s.source, s.name);
                        }
                    }
                }
                SavedAction::Show { id } => {
                    let search = db.get_saved_search(id)?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":search,"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", serde_json::to_string_pretty(&search)?);
                    }
                }
                SavedAction::Add { source, name, query, filters } => {
                    let mut search = NewSavedSearch::new(source, name);
                    search.query = query;
                    search.filters_json = filters;
                    let id = db.insert_saved_search(&search)?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"id":id,"name":search.name},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Saved search '{}' ({id}).", search.name);
                    }
                }
                SavedAction::Delete { id } => {
                    db.delete_saved_search(id)?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"deleted":id},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Deleted saved search: {id}");
                    }
                }
            }
        }

        // ── Feed ───────────────────────────────────────────────────────────
        Commands::Feed { action } => {
            let db = Database::from_config(config)?;
            match action {
                FeedAction::List { source } => {
                    let scope = source.map_or(FeedScope::Global, FeedScope::Source);
                    let entries = db.list_feed(scope)?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"scope":scope,"items":entries},"meta":{"duration_ms":dur}}))?;
                    } else if entries.is_empty() {
                        println!("Feed is empty.");
                    } else {
                        for entry in &entries {
                            println!(
                                "{:>6}  {:>20}  {}",
                                entry.feed.id,
                                entry.feed.source,
                                entry.display_name()
                            );
                        }
                    }
                }
                FeedAction::Add { source, search, global } => {
                    let feed = if global {
                        NewFeedSavedSearch::global(source, search)
                    } else {
                        NewFeedSavedSearch::for_source(source, search)
                    };
                    let id = db.insert_feed(&feed)?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"id":id},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Added feed entry {id}.");
                    }
                }
                FeedAction::Delete { id } => {
                    db.delete_feed(id)?;
                    print_done(json_output, start, serde_json::json!({"deleted":id}), &format!("Deleted feed entry: {id}"))?;
                }
                FeedAction::Swap { first, second } => {
                    db.swap_feed(first, second)?;
                    print_done(json_output, start, serde_json::json!({"swapped":[first, second]}), "Swapped.")?;
                }
                FeedAction::Bottom { id } => {
                    db.move_feed_to_bottom(id)?;
                    print_done(json_output, start, serde_json::json!({"moved":id}), "Moved to bottom.")?;
                }
                FeedAction::Reorder { ids } => {
                    db.reorder_feed(&ids)?;
                    print_done(json_output, start, serde_json::json!({"order":ids}), "Reordered.")?;
                }
            }
        }

        // ── Metadata ───────────────────────────────────────────────────────
        Commands::Metadata { action } => {
            let db = Database::from_config(config)?;
            match action {
                MetadataAction::Show { manga_id } => {
                    let flat = db
                        .get_flat_metadata(manga_id)?
                        .ok_or(YomuError::MetadataNotFound(manga_id))?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":flat,"meta":{"duration_ms":dur}}))?;
                    } else {
                        let meta = &flat.metadata;
                        println!("manga:     {}", meta.manga_id);
                        println!("uploader:  {}", meta.uploader.as_deref().unwrap_or("-"));
                        println!("indexed:   {}", meta.indexed_extra.as_deref().unwrap_or("-"));
                        println!("version:   {}", meta.extra_version);
                        println!("extra:     {}", meta.extra);
                        for title in &flat.titles {
                            println!("title[{}]:  {}", title.title_type, title.title);
                        }
                        for tag in &flat.tags {
                            match &tag.namespace {
                                Some(ns) => println!("tag[{}]:    {ns}:{}", tag.tag_type, tag.name),
                                None => println!("tag[{}]:    {}", tag.tag_type, tag.name),
                            }
                        }
                    }
                }
                MetadataAction::Find { indexed_extra } => {
                    let ids = db.find_manga_by_indexed_extra(&indexed_extra)?;
                    let dur = start.elapsed().as_millis();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"items":ids},"meta":{"duration_ms":dur}}))?;
                    } else if ids.is_empty() {
                        println!("No manga indexed as: {indexed_extra}");
                    } else {
                        for id in ids {
                            println!("{id}");
                        }
                    }
                }
                MetadataAction::Delete { manga_id } => {
                    db.delete_metadata(manga_id)?;
                    print_done(json_output, start, serde_json::json!({"deleted":manga_id}), &format!("Deleted metadata of manga {manga_id}"))?;
                }
            }
        }

        // ── Flags ──────────────────────────────────────────────────────────
        Commands::Flags { action } => match action {
            FlagsAction::Show { bits } => {
                let flags = bits.map_or_else(|| config.default_migration_flags(), MigrationFlags::from_bits);
                let dur = start.elapsed().as_millis();
                if json_output {
                    let names: Vec<_> = flags.iter().collect();
                    print_json(&serde_json::json!({"status":"ok","data":{"bits":flags.bits(),"flags":names},"meta":{"duration_ms":dur}}))?;
                } else {
                    println!("{:#08b}  {flags}", flags.bits());
                }
            }
            FlagsAction::Available { custom_cover, downloads, bits } => {
                let flags = bits.map_or_else(|| config.default_migration_flags(), MigrationFlags::from_bits);
                let available = MigrationFlags::available_for(custom_cover, downloads);
                let enabled = flags.enabled_positions(&available);
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":{"available":available,"enabled_positions":enabled},"meta":{"duration_ms":dur}}))?;
                } else {
                    for (i, flag) in available.iter().enumerate() {
                        let mark = if enabled.contains(&i) { "x" } else { " " };
                        println!("[{mark}] {}", flag.label());
                    }
                }
            }
        },

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::List => {
                    let kv = config_key_values(config);
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":kv,"meta":{"duration_ms":dur}}))?;
                    } else {
                        for (k, v) in &kv {
                            println!("{k} = {v}");
                        }
                    }
                }
                ConfigAction::Get { key } => {
                    let kv = config_key_values(config);
                    let Some(val) = kv.get(key.as_str()) else {
                        anyhow::bail!(YomuError::ValidationError(format!("unknown config key: {key}")));
                    };
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"key":key,"value":val},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{val}");
                    }
                }
                ConfigAction::Path => {
                    let path = AppConfig::config_path();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", path.display());
                    }
                }
            }
        }

        // ── Doctor ─────────────────────────────────────────────────────────
        Commands::Doctor => {
            let config_path = AppConfig::config_path();
            if config_path.exists() {
                println!("✓ Config: {}", config_path.display());
            } else {
                println!("○ Config: not found (using defaults)");
            }

            let db_path = config.database_path();
            let mut issues = 0;
            match database_summary(config) {
                Ok(summary) => {
                    println!(
                        "✓ Database: {} (schema v{}, {} saved searches, {} indexed manga)",
                        db_path.display(),
                        summary.schema_version,
                        summary.saved_searches,
                        summary.indexed_manga,
                    );
                }
                Err(e) => {
                    issues += 1;
                    println!("✗ Database: {e}");
                }
            }

            if issues == 0 {
                println!("\nAll checks passed ✓");
            } else {
                println!("\n{issues} issues found");
                std::process::exit(ExitCode::GeneralError as i32);
            }
        }

        // ── Version ────────────────────────────────────────────────────────
        Commands::Version => {
            let version = env!("CARGO_PKG_VERSION");
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"version":version},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("yomu v{version}");
            }
        }
    }

    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "command finished");
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_done(json_output: bool, start: Instant, data: serde_json::Value, message: &str) -> Result<()> {
    if json_output {
        let dur = start.elapsed().as_millis();
        print_json(&serde_json::json!({"status":"ok","data":data,"meta":{"duration_ms":dur}}))
    } else {
        println!("{message}");
        Ok(())
    }
}

struct DatabaseSummary {
    schema_version: u32,
    saved_searches: usize,
    indexed_manga: usize,
}

/// Open the store and read the counts `doctor` reports. Any storage error
/// fails the whole check.
fn database_summary(config: &AppConfig) -> yomu_core::Result<DatabaseSummary> {
    let db = Database::from_config(config)?;
    let versions = db.schema_versions()?;
    Ok(DatabaseSummary {
        schema_version: versions.last().copied().unwrap_or(0),
        saved_searches: db.list_all_saved_searches()?.len(),
        indexed_manga: db.count_metadata()?,
    })
}

fn config_key_values(config: &AppConfig) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("core.data_dir", config.core.data_dir.clone());
    map.insert("database_path", config.database_path().to_string_lossy().to_string());
    map.insert("feed.max_global_entries", config.feed.max_global_entries.to_string());
    map.insert("feed.max_source_entries", config.feed.max_source_entries.to_string());
    map.insert("migration.default_flags", config.migration.default_flags.to_string());
    map.insert("log.filter", config.log.filter.clone());
    map
}
