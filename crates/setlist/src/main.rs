//! # setlist
//!
//! Setlist server binary: loads settings, wires the chart store into the
//! HTTP/WebSocket server and runs until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use setlist_core::logging::{LogFormat, init_subscriber};
use setlist_server::SetlistServer;
use setlist_settings::SetlistSettings;
use setlist_store::DirSongStore;

/// Shared chart session server.
#[derive(Parser, Debug)]
#[command(name = "setlist", about = "Shared chart session server")]
struct Cli {
    /// Settings file (defaults to `~/.setlist/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Leader PIN.
    #[arg(long)]
    pin: Option<String>,

    /// Directory holding `.pro` / `.cho` charts.
    #[arg(long)]
    songs_dir: Option<PathBuf>,

    /// Static asset root served at `/`.
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `setlist_server=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format (`compact` or `json`).
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

fn parse_log_format(val: &str) -> Result<LogFormat, String> {
    LogFormat::parse(val).ok_or_else(|| format!("unknown log format: {val}"))
}

impl Cli {
    /// Layer CLI flags over loaded settings. Flags win.
    fn apply(self, settings: &mut SetlistSettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(pin) = self.pin.filter(|p| !p.is_empty()) {
            settings.leader_pin = pin;
        }
        if let Some(dir) = self.songs_dir {
            settings.storage.songs_dir = dir;
        }
        if let Some(dir) = self.public_dir {
            settings.storage.public_dir = dir;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

fn load(cli: Cli) -> Result<SetlistSettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(setlist_settings::settings_path);
    let mut settings =
        setlist_settings::load_settings_from_path(&path).context("Failed to load settings")?;
    cli.apply(&mut settings);
    Ok(settings)
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(load(Cli::parse())?);
    init_subscriber(&settings.logging.level, settings.logging.format);

    ensure_dir(&settings.storage.songs_dir)?;
    let store = DirSongStore::new(&settings.storage.songs_dir)
        .context("Failed to open songs directory")?;
    tracing::info!(songs_dir = %store.root().display(), "chart store ready");

    let mut server = SetlistServer::new(settings.clone(), Arc::new(store));
    match setlist_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(%addr, "setlist listening");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let _ = server.shutdown().drain(handle, None).await;
    Ok(())
}
