use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reltrack::config::LoggingConfig;
use reltrack::sync::RepoSyncStatus;
use reltrack::{
    Config, GitHubClient, RepoStore, RepositoryView, TrackedRepository, Tracker, TrackerError,
    TrackerOptions,
};

#[derive(Parser)]
#[command(name = "reltrack")]
#[command(about = "Track GitHub repositories and their latest releases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file path (overrides the configured one)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a repository
    Add {
        /// GitHub URL or owner/name
        reference: String,

        /// Skip the upstream existence check
        #[arg(long)]
        no_verify: bool,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop tracking a repository
    Remove {
        /// Repository id
        id: i64,
    },

    /// List tracked repositories
    List {
        /// Only repositories with an unseen release
        #[arg(long)]
        unseen: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single tracked repository
    Show {
        /// Repository id
        id: i64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch the latest release of one repository, or of all of them
    Sync {
        /// Repository id (all repositories when omitted)
        id: Option<i64>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark the latest release of a repository as seen
    Seen {
        /// Repository id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    // An explicit --database is taken literally, without variable expansion
    let db_path = match cli.database {
        Some(path) => path,
        None => config.database_path()?,
    };

    init_logging(cli.verbose, &config.logging)?;
    debug!("Starting reltrack v{}", env!("CARGO_PKG_VERSION"));

    if let Commands::Add {
        no_verify: true, ..
    } = cli.command
    {
        config.github.verify_on_add = false;
    }
    let tracker = open_tracker(&config, &db_path)?;

    match cli.command {
        Commands::Add {
            reference, json, ..
        } => cmd_add(&tracker, &reference, json).await,
        Commands::Remove { id } => cmd_remove(&tracker, id),
        Commands::List { unseen, json } => cmd_list(&tracker, unseen, json),
        Commands::Show { id, json } => cmd_show(&tracker, id, json),
        Commands::Sync { id: Some(id), json } => cmd_sync(&tracker, id, json).await,
        Commands::Sync { id: None, json } => cmd_sync_all(&tracker, json).await,
        Commands::Seen { id } => cmd_seen(&tracker, id),
    }
}

/// Initialize logging; output goes to stderr so stdout stays machine-readable
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        "full" => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to initialize logging")?;

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

fn open_tracker(config: &Config, db_path: &Path) -> Result<Tracker> {
    let store = RepoStore::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let client = GitHubClient::new(&config.github)?;

    Ok(Tracker::new(
        Arc::new(store),
        Arc::new(client),
        TrackerOptions::from(config),
    ))
}

async fn cmd_add(tracker: &Tracker, reference: &str, json: bool) -> Result<()> {
    let repo = tracker.add(reference).await?;

    if json {
        print_json(&RepositoryView::from(&repo))?;
    } else {
        println!("✅ Tracking {} (id {})", repo.full_name(), repo.id);
        println!("   Run 'reltrack sync {}' to fetch its latest release", repo.id);
    }
    Ok(())
}

fn cmd_remove(tracker: &Tracker, id: i64) -> Result<()> {
    if tracker.remove(id)? {
        println!("🗑️  Stopped tracking repository {}", id);
        Ok(())
    } else {
        Err(TrackerError::NotFound(id).into())
    }
}

fn cmd_list(tracker: &Tracker, unseen: bool, json: bool) -> Result<()> {
    let repos: Vec<TrackedRepository> = tracker
        .list()?
        .into_iter()
        .filter(|repo| !unseen || repo.has_unseen_release())
        .collect();

    if json {
        let views: Vec<RepositoryView> = repos.iter().map(RepositoryView::from).collect();
        return print_json(&views);
    }

    if repos.is_empty() {
        println!("No tracked repositories. Add one with: reltrack add <owner/name>");
        return Ok(());
    }

    for repo in &repos {
        print_repo_line(repo);
    }
    Ok(())
}

fn cmd_show(tracker: &Tracker, id: i64, json: bool) -> Result<()> {
    let repo = tracker.get(id)?.ok_or(TrackerError::NotFound(id))?;

    if json {
        return print_json(&RepositoryView::from(&repo));
    }

    println!("{} (id {})", repo.full_name(), repo.id);
    println!("   URL: {}", repo.url);
    match &repo.latest_release {
        Some(release) => {
            println!("   Latest release: {}", release.tag);
            if let Some(name) = &release.display_name {
                println!("   Name: {}", name);
            }
            if let Some(published_at) = release.published_at {
                println!("   Published: {}", published_at.format("%Y-%m-%d %H:%M UTC"));
            }
            println!("   Release URL: {}", release.release_url);
            println!("   Seen: {}", if repo.seen_by_user { "yes" } else { "no" });
        }
        None => println!("   Latest release: not synced yet"),
    }
    Ok(())
}

async fn cmd_sync(tracker: &Tracker, id: i64, json: bool) -> Result<()> {
    let outcome = match tracker.sync(id).await {
        Ok(outcome) => outcome,
        Err(TrackerError::NoReleaseFound(name)) => {
            // Not an error: the repository simply has nothing to track yet
            println!("ℹ️  {} has no published release yet", name);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        return print_json(&RepositoryView::from(&outcome.repository));
    }

    let repo = &outcome.repository;
    let tag = repo
        .latest_release
        .as_ref()
        .map(|release| release.tag.as_str())
        .unwrap_or("-");

    if outcome.change.is_change() {
        println!("🆕 {}: new release {}", repo.full_name(), tag);
    } else {
        println!("✅ {}: up to date ({})", repo.full_name(), tag);
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResultView {
    id: String,
    repository: String,
    status: &'static str,
    tag: Option<String>,
    error: Option<String>,
}

async fn cmd_sync_all(tracker: &Tracker, json: bool) -> Result<()> {
    let summary = tracker.sync_all().await?;

    if json {
        let views: Vec<SyncResultView> = summary
            .results
            .iter()
            .map(|result| {
                let (status, tag, error) = match &result.status {
                    RepoSyncStatus::Updated { tag } => ("updated", Some(tag.clone()), None),
                    RepoSyncStatus::Unchanged => ("unchanged", None, None),
                    RepoSyncStatus::NoRelease => ("no_release", None, None),
                    RepoSyncStatus::Failed { error, .. } => ("failed", None, Some(error.clone())),
                };
                SyncResultView {
                    id: result.id.to_string(),
                    repository: result.full_name.clone(),
                    status,
                    tag,
                    error,
                }
            })
            .collect();
        print_json(&views)?;
    } else {
        for result in &summary.results {
            match &result.status {
                RepoSyncStatus::Updated { tag } => {
                    println!("   🆕 {}: new release {}", result.full_name, tag)
                }
                RepoSyncStatus::Unchanged => println!("   ✅ {}: up to date", result.full_name),
                RepoSyncStatus::NoRelease => {
                    println!("   ℹ️  {}: no release yet", result.full_name)
                }
                RepoSyncStatus::Failed { error, retryable } => println!(
                    "   ❌ {}: {}{}",
                    result.full_name,
                    error,
                    if *retryable { " (retry later)" } else { "" }
                ),
            }
        }

        println!("\n📈 Summary:");
        println!("   🆕 New releases: {}", summary.updated);
        println!("   ✅ Up to date: {}", summary.unchanged);
        println!("   ℹ️  Without release: {}", summary.no_release);
        println!("   ❌ Failed: {}", summary.failed);
        println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());
    }

    if summary.failed > 0 {
        return Err(anyhow!(
            "{} of {} repositories failed to sync",
            summary.failed,
            summary.total_repositories
        ));
    }
    Ok(())
}

fn cmd_seen(tracker: &Tracker, id: i64) -> Result<()> {
    tracker.acknowledge(id)?;
    println!("👀 Marked repository {} as seen", id);
    Ok(())
}

fn print_repo_line(repo: &TrackedRepository) {
    let (tag, marker) = match &repo.latest_release {
        Some(release) if !repo.seen_by_user => (release.tag.as_str(), "● new"),
        Some(release) => (release.tag.as_str(), ""),
        None => ("-", ""),
    };
    println!(
        "{:>4}  {:<40} {:<16} {}",
        repo.id,
        repo.full_name(),
        tag,
        marker
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
