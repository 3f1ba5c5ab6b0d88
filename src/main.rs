use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tldr_sync::api::ApiClient;
use tldr_sync::config::Config;
use tldr_sync::machine::LifecycleState;
use tldr_sync::merge::{group_by_section, sort_articles_by_state};
use tldr_sync::model::{ContentKind, ContentStatus, Effort};
use tldr_sync::storage::{Database, KeyedStore, RemoteStore};
use tldr_sync::sync::SyncContext;
use tldr_sync::util::{normalize_iso_date, parse_base_url};
use tldr_sync::{Reader, ReaderError};

/// Get the config directory path (~/.config/tldr-sync/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("tldr-sync"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    normalize_iso_date(s).ok_or_else(|| format!("not a date: {s}"))
}

#[derive(Parser, Debug)]
#[command(name = "tldr-sync", about = "Newsletter reader with synced read state and summaries")]
struct Args {
    /// Config file (defaults to ~/.config/tldr-sync/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape and merge an inclusive date range (defaults to today)
    Scrape {
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },
    /// Show the stored articles for a day, grouped by section
    List {
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },
    /// Mark an article read
    Read(ArticleArgs),
    /// Mark an article unread
    Unread(ArticleArgs),
    /// Hide an article
    Remove(ArticleArgs),
    /// Bring back a removed article
    Restore(ArticleArgs),
    /// Fetch an article summary
    Summary(ContentArgs),
    /// Fetch an article TLDR
    Tldr(ContentArgs),
    /// Show or change the scrape cache setting
    Cache {
        #[arg(value_enum)]
        action: Option<CacheAction>,
    },
}

#[derive(clap::Args, Debug)]
struct ArticleArgs {
    #[arg(value_parser = parse_date)]
    date: NaiveDate,
    url: String,
}

#[derive(clap::Args, Debug)]
struct ContentArgs {
    #[command(flatten)]
    article: ArticleArgs,
    /// minimal, low, medium or high (defaults to the configured effort)
    #[arg(long)]
    effort: Option<Effort>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CacheAction {
    On,
    Off,
}

async fn build_reader(config: &Config, config_dir: &std::path::Path) -> Result<Reader> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    let client = builder.build().context("Failed to build HTTP client")?;
    let base_url = parse_base_url(&config.api_base_url)
        .with_context(|| format!("Invalid api_base_url '{}'", config.api_base_url))?;

    let db_path = config.database_path_in(config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = Database::open(db_path_str)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let remote = RemoteStore::new(client.clone(), base_url.clone());
    let store = KeyedStore::with_mode(config.storage_mode, db, remote);
    let ctx = SyncContext::new(store);
    let api = ApiClient::new(client, base_url);

    Ok(Reader::new(ctx, api)
        .with_default_effort(config.default_effort)
        .with_suppress_window_ms(config.suppress_window_ms))
}

/// Lifecycle actions on stale references are reported, not fatal.
fn report_update(
    what: &str,
    args: &ArticleArgs,
    result: std::result::Result<Option<tldr_sync::model::DayPayload>, ReaderError>,
) -> Result<()> {
    match result {
        Ok(Some(_)) => println!("{what}: {}", args.url),
        Ok(None) => println!("No article {} on {}", args.url, args.date),
        Err(ReaderError::InvalidTransition(e)) => {
            tracing::warn!(url = %args.url, error = %e, "Ignoring invalid transition");
            println!("Nothing to do: {e}");
        }
        Err(e) => return Err(e).with_context(|| format!("{what} failed for {}", args.url)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let reader = build_reader(&config, &config_dir).await?;

    match args.command {
        Command::Scrape { start, end } => {
            let today = Local::now().date_naive();
            let end = end.unwrap_or(today);
            let start = start.unwrap_or(end);
            let days = reader
                .scrape_range(start, end)
                .await
                .context("Scrape failed")?;
            for day in &days {
                let unread = day
                    .articles
                    .iter()
                    .filter(|a| LifecycleState::of(a) == LifecycleState::Unread)
                    .count();
                println!(
                    "{}  {} articles ({} unread)",
                    day.date,
                    day.articles.len(),
                    unread
                );
            }
        }
        Command::List { date } => {
            let Some(day) = reader.load_day(date).await else {
                println!("Nothing stored for {date}; run `tldr-sync scrape --start {date} --end {date}`");
                return Ok(());
            };
            for group in group_by_section(&day.articles) {
                let emoji = group.section_emoji.as_deref().unwrap_or("");
                let section = group.section.as_deref().unwrap_or("Other");
                println!("\n{} / {emoji} {section}", group.category);
                for article in sort_articles_by_state(&group.articles) {
                    let marker = match LifecycleState::of(&article) {
                        LifecycleState::Unread => "*",
                        LifecycleState::Read => " ",
                        LifecycleState::Removed => "x",
                    };
                    let summary = if article.summary.status == ContentStatus::Available {
                        " [summary]"
                    } else {
                        ""
                    };
                    println!("  {marker} {}{summary}\n    {}", article.title, article.url);
                }
            }
        }
        Command::Read(a) => report_update("Marked read", &a, reader.mark_read(a.date, &a.url).await)?,
        Command::Unread(a) => {
            report_update("Marked unread", &a, reader.mark_unread(a.date, &a.url).await)?
        }
        Command::Remove(a) => report_update("Removed", &a, reader.remove(a.date, &a.url).await)?,
        Command::Restore(a) => report_update("Restored", &a, reader.restore(a.date, &a.url).await)?,
        Command::Summary(c) => fetch_content(&reader, c, ContentKind::Summary).await?,
        Command::Tldr(c) => fetch_content(&reader, c, ContentKind::Tldr).await?,
        Command::Cache { action } => {
            match action {
                Some(CacheAction::On) => reader.set_cache_enabled(true).await?,
                Some(CacheAction::Off) => reader.set_cache_enabled(false).await?,
                None => {}
            }
            let state = if reader.cache_enabled().await { "on" } else { "off" };
            println!("Cache: {state}");
        }
    }

    Ok(())
}

async fn fetch_content(reader: &Reader, args: ContentArgs, kind: ContentKind) -> Result<()> {
    let effort = args.effort.unwrap_or(reader.default_effort());
    let a = &args.article;
    let state = reader
        .request_content(a.date, &a.url, kind, effort)
        .await
        .with_context(|| format!("Failed to fetch {kind} for {}", a.url))?;

    match state {
        None => println!("No article {} on {}", a.url, a.date),
        Some(state) if state.status == ContentStatus::Error => {
            anyhow::bail!(
                "{kind} failed: {}",
                state.error_message.unwrap_or_default()
            );
        }
        Some(state) => println!("{}", state.markdown),
    }
    Ok(())
}
