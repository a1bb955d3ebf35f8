mod app;
mod markdown;
mod prompt;
mod view;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use elbatui_core::{
    config::{self, AppConfig},
    RegistryClient, Route, SessionStore,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir)?;
    info!(api_base = %config.api_base, "starting elbatui");

    let client = RegistryClient::new(&config).context("failed to build registry client")?;
    let session = Arc::new(SessionStore::new(Arc::new(client.clone())));
    let start_route = Route::parse(&config.start_route);

    let mut app = app::ElbaApp::new(client, session, start_route);
    app.run().await
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("elbatui.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The alternate screen owns stdout, so only the file layer is installed.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
