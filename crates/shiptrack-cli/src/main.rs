//! `shiptrack` — batch tracking sync runner.
//!
//! # Usage
//!
//! ```
//! shiptrack --config ~/.config/shiptrack/config.toml
//! shiptrack --shipments 5f4e...,91ab... --force
//! shiptrack --dry-run
//! ```
//!
//! Exit codes: `0` when every targeted shipment synced, `1` when at least
//! one shipment failed, `2` when the run could not start at all (bad
//! config, no adapter, store unavailable).

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use shiptrack_core::{shipment::Shipment, store::ShipmentStore};
use shiptrack_store_sqlite::SqliteStore;
use shiptrack_sync::{
  SyncConfig, SyncEngine,
  adapter::CarrierAdapter,
  http::HttpCarrierAdapter,
  ratelimit::RateLimiter,
  retry::RetryPolicy,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "shiptrack", about = "Sync shipment tracking from carriers")]
struct Args {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Sync even shipments that were synced recently.
  #[arg(long)]
  force: bool,

  /// List the shipments that would be synced and exit without syncing.
  #[arg(long)]
  dry_run: bool,

  /// Comma-separated shipment ids to sync instead of the due candidates.
  #[arg(long, value_delimiter = ',', value_name = "ID,...")]
  shipments: Option<Vec<Uuid>>,

  /// Override the configured concurrency group size.
  #[arg(long, value_name = "N")]
  concurrent: Option<usize>,

  /// Log at debug level.
  #[arg(short, long)]
  verbose: bool,
}

// ─── Config file ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Clone)]
struct CliConfig {
  store_path: PathBuf,
  adapter:    Option<AdapterConfig>,
  #[serde(default)]
  sync:       SyncSection,
}

#[derive(Deserialize, Clone)]
struct AdapterConfig {
  base_url: String,
  #[serde(default = "default_provider")]
  provider: String,
  #[serde(default)]
  api_key:  Option<String>,
}

fn default_provider() -> String { "carrier".into() }

#[derive(Deserialize, Clone)]
#[serde(default)]
struct SyncSection {
  max_concurrency:     usize,
  requests_per_minute: usize,
  freshness_secs:      u64,
  batch_ceiling:       usize,
}

impl Default for SyncSection {
  fn default() -> Self {
    Self {
      max_concurrency:     5,
      requests_per_minute: 60,
      freshness_secs:      60 * 60,
      batch_ceiling:       500,
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
  let args = Args::parse();

  let default_level =
    if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();

  match run(args).await {
    Ok(all_succeeded) => {
      if all_succeeded {
        ExitCode::SUCCESS
      } else {
        ExitCode::from(1)
      }
    }
    Err(e) => {
      tracing::error!("{e:#}");
      ExitCode::from(2)
    }
  }
}

/// Returns `Ok(true)` when every targeted shipment synced cleanly.
async fn run(args: Args) -> anyhow::Result<bool> {
  let settings = config::Config::builder()
    .add_source(config::File::from(args.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("SHIPTRACK").separator("__"))
    .build()
    .context("failed to read config file")?;
  let cfg: CliConfig =
    settings.try_deserialize().context("failed to deserialise config")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let adapter = cfg.adapter.as_ref().map(|a| {
    HttpCarrierAdapter::new(&a.base_url, &a.provider, a.api_key.clone())
  });
  let sync_config = SyncConfig {
    max_concurrency: args.concurrent.unwrap_or(cfg.sync.max_concurrency),
    freshness: std::time::Duration::from_secs(cfg.sync.freshness_secs),
    batch_ceiling: cfg.sync.batch_ceiling,
    ..SyncConfig::default()
  };
  let engine = SyncEngine::new(
    store.clone(),
    adapter,
    RateLimiter::per_minute(cfg.sync.requests_per_minute),
    RetryPolicy::default(),
    sync_config,
  );

  if args.dry_run {
    let targets =
      resolve_targets(&store, &engine, args.shipments.as_deref(), args.force)
        .await
        .context("failed to select candidates")?;
    println!("would sync {} shipment(s):", targets.len());
    for shipment in targets {
      println!(
        "  {}  {}  {}",
        shipment.shipment_id, shipment.tracking_code, shipment.status
      );
    }
    return Ok(true);
  }

  let report = engine
    .sync_batch(args.shipments.clone(), args.force)
    .await
    .context("sync batch aborted")?;

  for sync in &report.successful {
    println!(
      "synced {}: {} new event(s), {} duplicate(s)",
      sync.shipment_id, sync.outcome.accepted, sync.outcome.duplicates
    );
  }
  for failed in &report.failed {
    eprintln!("failed {}: {}", failed.shipment_id, failed.error);
  }
  println!(
    "{} synced, {} failed",
    report.successful.len(),
    report.failed.len()
  );

  Ok(report.all_succeeded())
}

/// Which shipments a run would touch: explicit targets when given, otherwise
/// the engine's staleness-based candidates. Unknown explicit ids are
/// reported and skipped.
async fn resolve_targets<S, A>(
  store: &S,
  engine: &SyncEngine<S, A>,
  targets: Option<&[Uuid]>,
  force: bool,
) -> anyhow::Result<Vec<Shipment>>
where
  S: ShipmentStore + Clone + 'static,
  A: CarrierAdapter + 'static,
{
  match targets {
    Some(ids) => {
      let mut shipments = Vec::with_capacity(ids.len());
      for id in ids {
        match store.get_shipment(*id).await? {
          Some(shipment) => shipments.push(shipment),
          None => eprintln!("unknown shipment {id}"),
        }
      }
      Ok(shipments)
    }
    None => Ok(engine.select_candidates(force).await?),
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
