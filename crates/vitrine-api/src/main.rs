//! Vitrine admin API server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `VITRINE_*` environment variables, opens the SQLite store and the upload
//! directory, and serves the API over HTTP.
//!
//! # Bootstrapping an administrator
//!
//! Self-registration always creates plain users. Register the first account
//! through `/register`, then promote it:
//!
//! ```
//! cargo run -p vitrine-api --bin server -- --promote alice
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vitrine_api::{AppState, ServerConfig};
use vitrine_artifacts::LocalArtifactStore;
use vitrine_auth::spawn_revocation_sweeper;
use vitrine_core::principal::Role;
use vitrine_store_sqlite::SqliteStore;

/// Shorter HMAC keys are rejected at startup.
const MIN_SECRET_LEN: usize = 32;

#[derive(Parser)]
#[command(author, version, about = "Vitrine admin API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Give the named account the admin role and exit.
  #[arg(long, value_name = "USERNAME")]
  promote: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VITRINE"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.jwt_secret.len() < MIN_SECRET_LEN {
    anyhow::bail!("jwt_secret must be at least {MIN_SECRET_LEN} bytes");
  }
  server_cfg.database_path = expand_tilde(&server_cfg.database_path);
  server_cfg.artifact_root = expand_tilde(&server_cfg.artifact_root);

  let store = SqliteStore::open(&server_cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.database_path))?;
  // SQLite gives up on a held lock before the engine gives up on SQLite.
  store
    .set_busy_timeout(server_cfg.store_timeout() / 2)
    .await
    .context("failed to configure store")?;

  // Helper mode: promote an account and exit.
  if let Some(username) = cli.promote {
    let found = store
      .assign_role(username.clone(), Role::Admin)
      .await
      .context("failed to update role")?;
    anyhow::ensure!(found, "no live account named {username:?}");
    println!("{username} is now an admin");
    return Ok(());
  }

  let artifacts = LocalArtifactStore::new(&server_cfg.artifact_root)
    .await
    .with_context(|| format!("failed to open upload directory {:?}", server_cfg.artifact_root))?;

  let store = Arc::new(store);
  let _sweeper = spawn_revocation_sweeper(store.clone(), server_cfg.purge_interval());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let uploads = ServeDir::new(&server_cfg.artifact_root);
  let state = AppState::new(store, Arc::new(artifacts), server_cfg);
  let app = vitrine_api::router(state).nest_service("/uploads", uploads);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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
