mod classifier;
mod db;
mod error;
mod parser;
mod pipeline;
mod resolver;
mod settings;
mod source;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use parser::tables::PatternTables;
use pipeline::Pipeline;
use settings::{parse_channel_list, Settings, SourceKind};
use source::export::ExportSource;
use source::feed::FeedSource;
use source::{MessageSource, RawMessage};

#[derive(Parser)]
#[command(name = "tg_vacancy_scraper", about = "Telegram vacancy scraper and company resolver")]
struct Cli {
    /// SQLite file (overrides VACANCY_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Comma-separated channel usernames (overrides VACANCY_CHANNELS)
    #[arg(long, global = true)]
    channels: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the companies and vacancies tables
    Init,
    /// Fetch vacancy-like messages from every channel into a JSON file
    Collect {
        #[arg(short, long, default_value = "data/messages.json")]
        output: PathBuf,
    },
    /// Extract, train and store vacancies from a collected JSON file
    Process {
        #[arg(short, long, default_value = "data/messages.json")]
        input: PathBuf,
    },
    /// Collect + process in one go
    Run,
    /// Print the fields extracted from one message file
    Extract { file: PathBuf },
    /// Show store statistics
    Stats,
    /// Latest vacancies table
    Overview {
        /// Filter by location (case-insensitive)
        #[arg(short, long)]
        city: Option<String>,
        /// Filter by channel
        #[arg(long)]
        channel: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// List stored companies
    Companies {
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(raw) = cli.channels.as_deref() {
        settings.channels = parse_channel_list(raw);
    }

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.db_path)?;
            db::ensure_tables(&conn)?;
            println!("Tables ready in {}", settings.db_path.display());
            Ok(())
        }
        Commands::Collect { output } => {
            let source = build_source(&settings)?;
            let channels = require_channels(&settings)?;
            let (messages, stats) =
                source::collect_all(source.as_ref(), channels, settings.fetch_limit).await;
            println!(
                "Collected {} messages from {} channels ({} rate limited, {} failed)",
                stats.messages, stats.channels, stats.rate_limited, stats.failed
            );
            write_messages(&output, &messages)?;
            println!("Wrote {}", output.display());
            Ok(())
        }
        Commands::Process { input } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let messages: Vec<RawMessage> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid message file {}", input.display()))?;
            if messages.is_empty() {
                println!("No messages found. Run 'collect' first.");
                return Ok(());
            }
            let pipeline = Pipeline::new(&load_tables(&settings)?)?;
            let conn = db::connect(&settings.db_path)?;
            println!("Processing {} messages...", messages.len());
            pipeline.process_and_store(&conn, &messages, settings.min_training_rows);
            Ok(())
        }
        Commands::Run => {
            let source = build_source(&settings)?;
            let channels = require_channels(&settings)?;
            let pipeline = Pipeline::new(&load_tables(&settings)?)?;
            let conn = db::connect(&settings.db_path)?;
            pipeline::run(
                &pipeline,
                &conn,
                source.as_ref(),
                channels,
                settings.fetch_limit,
                settings.min_training_rows,
            )
            .await
        }
        Commands::Extract { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let (fields, about) = if settings.tables_path.is_some() {
                let pipeline = Pipeline::new(&load_tables(&settings)?)?;
                (
                    pipeline.extractor().extract(&text),
                    pipeline.heuristics().company_description(&text),
                )
            } else {
                (
                    parser::extract_fields(&text),
                    resolver::extract_company_description(&text),
                )
            };
            println!("{}", serde_json::to_string_pretty(&fields)?);
            if let Some(about) = about {
                println!("\n--- About the company ---\n{}", about);
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::ensure_tables(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Companies: {}", s.companies);
            println!("Vacancies: {}", s.vacancies);
            println!("Linked:    {}", s.linked);
            println!("Unlinked:  {}", s.unlinked);
            println!("Channels:  {}", s.channels);
            Ok(())
        }
        Commands::Overview { city, channel, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::ensure_tables(&conn)?;
            let rows = db::fetch_overview(&conn, city.as_deref(), channel.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No vacancies found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:<20} | {:<14} | {:<18} | {:<16} | {:<16}",
                "#", "Position", "Company", "Location", "Salary", "Channel", "Date"
            );
            println!("{}", "-".repeat(130));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<28} | {:<20} | {:<14} | {:<18} | {:<16} | {:<16}",
                    i + 1,
                    truncate(&r.position, 28),
                    truncate(&r.company, 20),
                    truncate(&r.location, 14),
                    truncate(&r.salary, 18),
                    truncate(&r.channel, 16),
                    r.date
                );
            }
            println!("\n{} vacancies", rows.len());
            Ok(())
        }
        Commands::Companies { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::ensure_tables(&conn)?;
            let companies = db::fetch_companies(&conn)?;
            if companies.is_empty() {
                println!("No companies stored.");
                return Ok(());
            }

            println!("{:>5} | {:<28} | {:<14} | {:<32}", "id", "Company", "City", "URL");
            println!("{}", "-".repeat(88));
            for c in companies.iter().take(limit) {
                println!(
                    "{:>5} | {:<28} | {:<14} | {:<32}",
                    c.id,
                    truncate(&c.name, 28),
                    truncate(c.city.as_deref().unwrap_or("-"), 14),
                    truncate(c.url.as_deref().unwrap_or("-"), 32),
                );
            }

            let described: Vec<_> = companies
                .iter()
                .take(limit)
                .filter_map(|c| c.description.as_deref().map(|d| (c, d)))
                .collect();
            if !described.is_empty() {
                println!("\n--- About ---");
                for (c, d) in described {
                    println!("  {}: {}", truncate(&c.name, 28), truncate(&d.replace('\n', " "), 100));
                }
            }

            println!("\n{} companies", companies.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_source(settings: &Settings) -> anyhow::Result<Box<dyn MessageSource>> {
    Ok(match settings.source {
        SourceKind::Export => Box::new(ExportSource::new(&settings.export_dir)),
        SourceKind::Feed => {
            let url = settings
                .feed_url
                .as_deref()
                .context("VACANCY_FEED_URL must be set for the feed source")?;
            Box::new(FeedSource::new(url, settings.feed_token.clone()))
        }
    })
}

fn require_channels(settings: &Settings) -> anyhow::Result<&[String]> {
    if settings.channels.is_empty() {
        anyhow::bail!("No channels configured. Set VACANCY_CHANNELS or pass --channels.");
    }
    Ok(&settings.channels)
}

fn load_tables(settings: &Settings) -> anyhow::Result<PatternTables> {
    match &settings.tables_path {
        Some(path) => PatternTables::from_json_file(path),
        None => Ok(PatternTables::default()),
    }
}

fn write_messages(path: &Path, messages: &[RawMessage]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(messages)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
