// watchlog CLI: the client surface for tracking series pages.
//
// Fetches a series page, scans it, and drives the same controls the page
// overlay exposes: favorite toggle, per-episode completion, range marking,
// progress. Local state is the source of truth; a configured sync server is
// mirrored opportunistically.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchlog::config::AppConfig;
use watchlog::scanner::{self, ScannedPage};
use watchlog::store::LocalStore;
use watchlog::sync::{FlushOutcome, Synchronizer, AUTH_KEY};
use watchlog::tracker::SeriesTracker;

#[derive(Parser)]
#[command(name = "watchlog", about = "Personal anime episode tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tracked state for a series page
    Show {
        /// URL of the series detail page
        page_url: String,
    },
    /// Toggle the favorite flag for a series
    Favorite { page_url: String },
    /// Mark one episode as completed
    Done {
        page_url: String,
        /// Episode number as shown in the list
        episode: u32,
    },
    /// Unmark one episode
    Undone { page_url: String, episode: u32 },
    /// Mark every episode in a closed range
    Mark {
        page_url: String,
        /// First episode number
        start: String,
        /// Last episode number
        end: String,
    },
    /// List locally tracked series
    List,
    /// Show or set the sync API token
    Token {
        /// New token value; omit to print the current one
        value: Option<String>,
    },
    /// Flush queued writes to the sync server
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchlog=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load();
    config.paths.ensure_dirs().await?;

    let store = LocalStore::on_disk(config.paths.store_path());
    let sync = Synchronizer::from_store(store.clone(), config.api_base.as_deref()).await;

    match cli.command {
        Commands::Show { page_url } => {
            let (tracker, page) = open_page(&sync, &page_url).await?;
            print_series(&tracker, &page);
        }
        Commands::Favorite { page_url } => {
            let (mut tracker, _page) = open_page(&sync, &page_url).await?;
            let label = tracker.toggle_favorite(&sync).await;
            println!("{}: {}", tracker.record().title, label);
        }
        Commands::Done { page_url, episode } => {
            set_episode(&sync, &page_url, episode, true).await?;
        }
        Commands::Undone { page_url, episode } => {
            set_episode(&sync, &page_url, episode, false).await?;
        }
        Commands::Mark {
            page_url,
            start,
            end,
        } => {
            let (mut tracker, _page) = open_page(&sync, &page_url).await?;
            let outcome = tracker.mark_range(&sync, &start, &end).await;
            println!("{}", outcome.message());
            println!("{}", tracker.progress_text());
        }
        Commands::List => {
            list_series(&sync).await;
        }
        Commands::Token { value } => match value {
            Some(value) => {
                store.set(AUTH_KEY, &value.trim()).await;
                println!("Saved");
            }
            None => match store.get_as::<String>(AUTH_KEY).await {
                Some(token) if !token.is_empty() => println!("{token}"),
                _ => println!("(not set)"),
            },
        },
        Commands::Sync => {
            match sync.flush_pending().await {
                FlushOutcome::NoRemote => {
                    println!("No sync server configured (set client.api_base and a token).")
                }
                FlushOutcome::Empty => println!("Nothing queued."),
                FlushOutcome::Flushed(n) => println!("Flushed {n} queued record(s)."),
                FlushOutcome::Failed => println!("Sync failed; queue kept for retry."),
            }
        }
    }

    Ok(())
}

/// Fetch and scan a series page, then load its record and bind controls.
/// Flushes any queued writes first, the once-per-page-load retry.
async fn open_page(sync: &Synchronizer, page_url: &str) -> Result<(SeriesTracker, ScannedPage)> {
    sync.flush_pending().await;

    let html = reqwest::get(page_url)
        .await
        .with_context(|| format!("fetching {page_url}"))?
        .error_for_status()?
        .text()
        .await?;

    let page = scanner::scan(&html, page_url);
    if page.is_empty() {
        bail!("no series found at {page_url}");
    }

    let record = sync
        .load(&page.info)
        .await
        .context("loading series record")?;

    let mut tracker = SeriesTracker::new(record);
    tracker.bind(&page.episodes);
    Ok((tracker, page))
}

async fn set_episode(sync: &Synchronizer, page_url: &str, episode: u32, done: bool) -> Result<()> {
    let (mut tracker, _page) = open_page(sync, page_url).await?;

    let Some(url) = tracker
        .controls()
        .iter()
        .find(|c| c.number == Some(episode))
        .map(|c| c.url.clone())
    else {
        bail!("episode {episode} not found on the page");
    };

    tracker.set_completed(sync, &url, done).await;
    println!("{}", tracker.progress_text());
    Ok(())
}

fn print_series(tracker: &SeriesTracker, page: &ScannedPage) {
    let record = tracker.record();
    let title = if record.title.is_empty() {
        record.series_url.as_str()
    } else {
        record.title.as_str()
    };

    println!("{title} [{}]", tracker.favorite_label());
    println!("{}", tracker.progress_text());

    for control in tracker.controls() {
        let mark = if control.checked { "x" } else { " " };
        match control.number {
            Some(n) => println!("  [{mark}] Eps {n}  {}", control.url),
            None => println!("  [{mark}]        {}", control.url),
        }
    }

    let unlinked = page.episodes.iter().filter(|e| e.url.is_none()).count();
    if unlinked > 0 {
        println!("  ({unlinked} item(s) without a link were skipped)");
    }
}

async fn list_series(sync: &Synchronizer) {
    let keys = sync.store().keys_with_prefix("anime::").await;
    if keys.is_empty() {
        println!("No series tracked yet.");
        return;
    }

    for key in keys {
        let Some(record) = sync
            .store()
            .get_as::<watchlog::models::SeriesRecord>(&key)
            .await
        else {
            continue;
        };
        let fav = if record.is_favorite { "*" } else { " " };
        let total = record
            .total_episodes
            .map(|n| format!("/{n}"))
            .unwrap_or_default();
        println!(
            "{fav} {}  ({}{})  {}",
            record.title,
            record.completed_count(),
            total,
            record.series_url
        );
    }
}
