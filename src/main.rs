mod cache;
mod config;
mod github;
mod stats;
mod sync;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::{CacheStorage, DirStorage, Project};
use config::{Config, FileConfig, Overrides};
use github::GitHubClient;
use sync::{SyncOptions, Syncer};

#[derive(Parser, Debug)]
#[command(name = "ghpulse")]
#[command(about = "Mirror a GitHub project's issues locally and report pull-request age")]
#[command(version)]
struct Args {
  /// Cache directory for project data (default: $HOME/.ghpulse)
  #[arg(short, long)]
  cache: Option<PathBuf>,

  /// Refresh cached project data from GitHub
  #[arg(short, long)]
  update: bool,

  /// GitHub owner/repo name (default: cockroachdb/cockroach)
  #[arg(short, long)]
  project: Option<String>,

  /// Read the GitHub personal access token from this file (default: $HOME/.github-issue-token)
  #[arg(long, value_name = "FILE")]
  token: Option<PathBuf>,

  /// Path to config file (default: ./ghpulse.yaml or $XDG_CONFIG_HOME/ghpulse/config.yaml)
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Also write logs to this file
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// More logging (-v debug, -vv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

/// Progress goes to stderr at info level. RUST_LOG overrides `-v`.
fn init_tracing(verbosity: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let level = match verbosity {
    0 => tracing::Level::INFO,
    1 => tracing::Level::DEBUG,
    _ => tracing::Level::TRACE,
  };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

  let (file_layer, guard) = match log_file {
    Some(path) => {
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
      };
      let appender = tracing_appender::rolling::never(dir, name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false),
    )
    .with(file_layer)
    .init();

  Ok(guard)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.verbose, args.log_file.as_deref())?;

  let file = FileConfig::load(args.config.as_deref())?;
  let config = Config::resolve(
    file,
    Overrides {
      project: args.project,
      cache_dir: args.cache,
      token_file: args.token,
      refresh: args.update,
    },
  )?;

  let storage = DirStorage::open(&config.cache_dir)?;
  let mut project = Project::new(config.project.clone());
  storage.load(&mut project)?;

  if config.refresh {
    let token = config.load_token()?;
    let client = GitHubClient::new(&token)?;
    let report = Syncer::new(&client, &storage, SyncOptions::from(&config))
      .refresh(&mut project)
      .await?;
    info!(
      listed = report.listed,
      created = report.created,
      backfilled = report.backfilled,
      events = report.events,
      commits = report.commits,
      "refresh complete"
    );
  } else if project.store.is_empty() {
    warn!(
      "no cached issues for {} in {}; run with -u to fetch them",
      config.project,
      config.cache_dir.display()
    );
  }

  let counts = stats::EntityCounts::of(&project.store);
  info!(
    users = counts.users,
    milestones = counts.milestones,
    repos = counts.repos,
    issues = counts.issues,
    pull_requests = counts.pull_requests,
    "cache contents"
  );

  println!();
  println!("{}", stats::closed_pr_ages(project.store.issues()));

  Ok(())
}
