pub mod card;
pub mod db;
mod host;
pub mod models;
pub mod schedule;
pub mod settings;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;

use card::{CardConfig, CardController, PngCardRenderer, RefreshPipeline, SystemClock};
use db::Database;
use settings::SettingsStore;

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn data_dir() -> PathBuf {
    std::env::var_os("READINGCARD_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("readingcard-data"))
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if env_flag("READINGCARD_DEBUG") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("readingcard starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(data_dir()))
}

async fn serve(data_dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("readingcard.sqlite3"))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);

    let pipeline = RefreshPipeline::new(
        database.clone(),
        database.clone(),
        Arc::new(PngCardRenderer),
        Arc::new(SystemClock),
        settings.clone(),
        CardConfig::default(),
    );
    let controller = CardController::new(pipeline);

    if env_flag("READINGCARD_DELETE_RECORD") {
        let deleted = controller
            .delete_managed_record()
            .await
            .map_err(|err| anyhow!(err).context("failed to delete managed record"))?;
        log::info!("delete requested; record removed: {deleted}");
        return Ok(());
    }

    let watcher = controller.watch_settings(settings.subscribe());
    controller.on_refresh_trigger();

    let cancel_token = CancellationToken::new();
    let poller = tokio::spawn(host::poll_loop(
        database.clone(),
        settings.clone(),
        controller.clone(),
        cancel_token.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    log::info!("shutdown requested");
    cancel_token.cancel();
    controller.shutdown();

    poller.await.context("poll loop task failed to join")?;
    watcher.await.context("settings watcher failed to join")?;
    Ok(())
}
