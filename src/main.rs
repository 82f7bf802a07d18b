//! # Intel Hub CLI (`ihub`)
//!
//! Manage configuration sets, generate intelligence reports and browse the
//! report archive.
//!
//! ## Usage
//!
//! ```bash
//! ihub --config ./config/hub.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ihub init` | Create the database and seed the default configuration set |
//! | `ihub configs ...` | List, show, create, select, edit, delete, export sets |
//! | `ihub sources ...` | Add, remove, enable/disable sources of a set |
//! | `ihub areas ...` | Add, remove, enable/disable or suggest focus keywords |
//! | `ihub import <set> <file>` | Import sources from JSON, CSV, XLSX or XLS |
//! | `ihub generate [set]` | Generate and archive a report |
//! | `ihub reports ...` | List, show, send archived reports |
//! | `ihub serve` | Start the JSON HTTP API |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use intel_hub::citation::extract_inline_links;
use intel_hub::config::{self, Config};
use intel_hub::hub::{EntryKind, Hub};
use intel_hub::models::{IntelConfig, Report};
use intel_hub::{migrate, server};

/// Intel Hub: AI-assisted industry intelligence reports with reconciled
/// citations.
#[derive(Parser)]
#[command(name = "ihub", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/hub.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and seed the default configuration set.
    ///
    /// Idempotent: an existing configuration list is left untouched.
    Init,

    /// Manage configuration sets.
    Configs {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Edit the sources of a configuration set.
    Sources {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Edit the focus keywords of a configuration set.
    Areas {
        #[command(subcommand)]
        action: AreaAction,
    },

    /// Import sources from a `.json`, `.csv`, `.xlsx` or `.xls` file.
    ///
    /// Recognized columns: name / 名称 / Name, url / 网址 / URL,
    /// target / 目标 / 检索目标 / Target. Rows without a URL are skipped.
    Import {
        /// Configuration set id.
        config_id: String,
        file: PathBuf,
        /// Suggest focus keywords from the merged source list afterwards.
        #[arg(long)]
        suggest: bool,
    },

    /// Generate a report for a configuration set (the active one by default).
    ///
    /// The report is archived; use `ihub reports send <id>` to deliver it.
    Generate {
        config_id: Option<String>,
    },

    /// Browse and deliver archived reports.
    Reports {
        #[command(subcommand)]
        action: ReportAction,
    },

    /// Start the JSON HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List configuration sets (`*` marks the active one).
    List,
    /// Print a configuration set as JSON (the active one by default).
    Show { id: Option<String> },
    /// Create a blank configuration set and select it.
    Create,
    /// Make a configuration set active.
    Select { id: String },
    /// Delete a configuration set. The last set cannot be deleted.
    Delete { id: String },
    /// Change fields of a configuration set.
    Set {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        lookback_days: Option<u32>,
        /// 0 = Sunday .. 6 = Saturday.
        #[arg(long)]
        update_day: Option<u8>,
        /// `HH:MM`, 24-hour clock.
        #[arg(long)]
        update_time: Option<String>,
        #[arg(long, conflicts_with = "clear_webhook")]
        webhook_url: Option<String>,
        #[arg(long)]
        clear_webhook: bool,
        #[arg(long)]
        auto_send: Option<bool>,
    },
    /// Write all configuration sets as a JSON array.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    Add {
        config_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        target: String,
    },
    Remove { config_id: String, id: String },
    /// Enable or disable a source.
    Toggle { config_id: String, id: String },
}

#[derive(Subcommand)]
enum AreaAction {
    Add { config_id: String, keyword: String },
    Remove { config_id: String, id: String },
    /// Enable or disable a keyword.
    Toggle { config_id: String, id: String },
    /// Ask the provider for focus keywords based on the sources.
    Suggest { config_id: String },
}

#[derive(Subcommand)]
enum ReportAction {
    /// List archived reports, newest first.
    List {
        #[arg(long)]
        config: Option<String>,
    },
    /// Print a report with its reference list.
    Show {
        id: String,
        /// Also list the inline links found in the body.
        #[arg(long)]
        links: bool,
    },
    /// Print the newest report of a set (falls back to the newest overall).
    Latest { config_id: Option<String> },
    /// Send an archived report to its configuration's webhook.
    Send { id: String },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            let hub = Hub::open(&cfg).await?;
            if hub.seed_defaults().await? {
                println!("Seeded default configuration set.");
            }
            println!("Database initialized successfully.");
        }
        Commands::Configs { action } => run_configs(&cfg, action).await?,
        Commands::Sources { action } => {
            let hub = Hub::open(&cfg).await?;
            match action {
                SourceAction::Add {
                    config_id,
                    name,
                    url,
                    target,
                } => {
                    let source = hub.add_source(&config_id, &name, &url, &target).await?;
                    println!("Added source {} ({})", source.name, source.id);
                }
                SourceAction::Remove { config_id, id } => {
                    let removed = hub.remove_entry(&config_id, EntryKind::Source, &id).await?;
                    report_removed(removed, &id);
                }
                SourceAction::Toggle { config_id, id } => {
                    let state = hub.toggle_entry(&config_id, EntryKind::Source, &id).await?;
                    report_toggled(state, &id);
                }
            }
        }
        Commands::Areas { action } => {
            let hub = Hub::open(&cfg).await?;
            match action {
                AreaAction::Add { config_id, keyword } => {
                    let kw = hub.add_keyword(&config_id, &keyword).await?;
                    println!("Added keyword {} ({})", kw.keyword, kw.id);
                }
                AreaAction::Remove { config_id, id } => {
                    let removed = hub.remove_entry(&config_id, EntryKind::Keyword, &id).await?;
                    report_removed(removed, &id);
                }
                AreaAction::Toggle { config_id, id } => {
                    let state = hub.toggle_entry(&config_id, EntryKind::Keyword, &id).await?;
                    report_toggled(state, &id);
                }
                AreaAction::Suggest { config_id } => {
                    let added = hub.suggest_areas(&config_id).await?;
                    if added.is_empty() {
                        println!("No new keywords suggested.");
                    }
                    for kw in added {
                        println!("+ {} ({})", kw.keyword, kw.id);
                    }
                }
            }
        }
        Commands::Import {
            config_id,
            file,
            suggest,
        } => {
            let hub = Hub::open(&cfg).await?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file.to_string_lossy();
            let imported = hub
                .import_sources(&config_id, &file_name, &bytes, suggest)
                .await?;
            println!("Imported {} sources.", imported.added.len());
            for s in &imported.added {
                println!("  {:<24} {}", s.name, s.url);
            }
            if suggest {
                println!("Suggested {} new keywords.", imported.suggested);
            }
        }
        Commands::Generate { config_id } => {
            let hub = Hub::open(&cfg).await?;
            let config = hub.resolve_config(config_id.as_deref()).await?;
            let report = hub.generate(&config.id).await?;
            print_report(&report, false);
        }
        Commands::Reports { action } => {
            let hub = Hub::open(&cfg).await?;
            match action {
                ReportAction::List { config } => {
                    let reports = hub.reports(config.as_deref()).await?;
                    println!("{:<38} {:<27} {:>5}  CONFIG", "ID", "TIMESTAMP", "REFS");
                    for r in reports {
                        println!(
                            "{:<38} {:<27} {:>5}  {}",
                            r.id,
                            r.timestamp,
                            r.sources.len(),
                            r.config_name
                        );
                    }
                }
                ReportAction::Show { id, links } => {
                    print_report(&hub.report(&id).await?, links);
                }
                ReportAction::Latest { config_id } => {
                    let config = hub.resolve_config(config_id.as_deref()).await?;
                    match hub.latest_report(&config.id).await? {
                        Some(r) => print_report(&r, false),
                        None => println!("No reports yet."),
                    }
                }
                ReportAction::Send { id } => {
                    hub.send_report(&id).await?;
                    println!("Report {} delivered.", id);
                }
            }
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

async fn run_configs(cfg: &Config, action: ConfigAction) -> Result<()> {
    let hub = Hub::open(cfg).await?;
    match action {
        ConfigAction::List => {
            let active = hub.active_config().await?.id;
            println!("  {:<38} {:<28} {:>7} {:>8}", "ID", "NAME", "SOURCES", "KEYWORDS");
            for c in hub.configs().await? {
                let marker = if c.id == active { "*" } else { " " };
                println!(
                    "{} {:<38} {:<28} {:>7} {:>8}",
                    marker,
                    c.id,
                    c.name,
                    c.sources.len(),
                    c.areas.len()
                );
            }
        }
        ConfigAction::Show { id } => {
            let config = hub.resolve_config(id.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Create => {
            let config = hub.create_config().await?;
            println!("Created {} ({})", config.name, config.id);
        }
        ConfigAction::Select { id } => {
            hub.select_config(&id).await?;
            println!("Active configuration: {}", id);
        }
        ConfigAction::Delete { id } => {
            hub.delete_config(&id).await?;
            println!("Deleted configuration {}", id);
        }
        ConfigAction::Set {
            id,
            name,
            lookback_days,
            update_day,
            update_time,
            webhook_url,
            clear_webhook,
            auto_send,
        } => {
            let updated = hub
                .update_config(&id, |c: &mut IntelConfig| {
                    if let Some(v) = name {
                        c.name = v;
                    }
                    if let Some(v) = lookback_days {
                        c.lookback_days = v;
                    }
                    if let Some(v) = update_day {
                        c.update_day = v;
                    }
                    if let Some(v) = update_time {
                        c.update_time = v;
                    }
                    if let Some(v) = webhook_url {
                        c.webhook_url = Some(v);
                    }
                    if clear_webhook {
                        c.webhook_url = None;
                    }
                    if let Some(v) = auto_send {
                        c.auto_send = v;
                    }
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        ConfigAction::Export { output } => {
            let json = hub.export_configs().await?;
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &json)?;
                    eprintln!("Exported configurations to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}

fn report_removed(removed: bool, id: &str) {
    if removed {
        println!("Removed {}", id);
    } else {
        println!("No entry with id {}", id);
    }
}

fn report_toggled(state: Option<bool>, id: &str) {
    match state {
        Some(true) => println!("Enabled {}", id),
        Some(false) => println!("Disabled {}", id),
        None => println!("No entry with id {}", id),
    }
}

fn print_report(report: &Report, with_links: bool) {
    println!("# {} ({})", report.config_name, report.timestamp);
    println!("id: {}", report.id);
    if !report.areas_covered.is_empty() {
        println!("areas: {}", report.areas_covered.join(", "));
    }
    println!();
    println!("{}", report.summary);
    println!();
    println!("References ({}):", report.sources.len());
    for (i, c) in report.sources.iter().enumerate() {
        println!("  [{}] {} <{}>", i + 1, c.title, c.url);
    }
    if with_links {
        let links = extract_inline_links(&report.summary);
        println!();
        println!("Inline links ({}):", links.len());
        for l in links {
            println!("  {} <{}>", l.label, l.url);
        }
    }
}
