pub mod cli;
pub mod config;
pub mod controllers;
pub mod datastore;
pub mod error;
pub mod events;
pub mod filter;
pub mod preferences;
pub mod render;
pub mod scope;
pub mod seed;
pub mod session;
pub mod shell;
pub mod task;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  error,
  info
};

use crate::datastore::{
  DataStore,
  TaskStore
};
use crate::preferences::{
  PreferencesManager,
  PreferencesStore
};
use crate::scope::AppScope;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting todo"
  );

  let mut cfg = config::Config::load(
    cli.todorc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(?cfg, "configuration loaded");

  let data_dir = cfg
    .data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let result = runtime.block_on(
    run_app(cfg, data_dir)
  );
  // A stdin read may still be parked on
  // a blocking worker thread.
  runtime.shutdown_background();
  result?;

  info!("done");
  Ok(())
}

async fn run_app(
  cfg: config::Config,
  data_dir: std::path::PathBuf
) -> anyhow::Result<()> {
  let store = DataStore::open(&data_dir)
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let first_run = store.created();
  let store: Arc<dyn TaskStore> =
    Arc::new(store);

  let preferences: Arc<
    dyn PreferencesStore
  > = Arc::new(
    PreferencesManager::open(
      &data_dir
        .join("preferences.json")
    )
  );

  let scope = AppScope::new();
  if first_run && cfg.seed {
    let store = Arc::clone(&store);
    scope.spawn("seed", async move {
      if let Err(err) =
        seed::populate(store).await
      {
        error!(error = %err, "seeding demo tasks failed");
      }
    });
  }

  let renderer =
    render::Renderer::new(cfg.color);
  let result = shell::Shell::new(
    store,
    preferences,
    scope.clone(),
    renderer
  )
  .run()
  .await;

  scope.shutdown().await;
  result
}
