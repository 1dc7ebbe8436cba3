#![forbid(unsafe_code)]

//! HTTP entry point: serves the downloader page and its two JSON endpoints.
//!
//! Video lookups and downloads shell out to `yt-dlp`; audio conversion
//! shells out to `ffmpeg`. Both paths are configurable through `.env`, the
//! environment or the command line.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tubegrab::{
    api::{AppState, router},
    config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config},
    process::ensure_program_available,
    provider::{StreamProvider, YtDlpProvider},
    service::Downloader,
    transcoder::{AudioTranscoder, FfmpegTranscoder},
};

#[derive(Debug, Parser)]
#[command(name = "backend", about = "Paste a video URL, pick a format, download it")]
struct BackendArgs {
    /// Directory receiving downloaded and converted files.
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Directory holding index.html and its assets.
    #[arg(long)]
    www_root: Option<PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    /// IPv4 or IPv6 address to bind.
    #[arg(long)]
    host: Option<String>,
    /// Alternative to the `.env` file in the working directory.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl BackendArgs {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            download_dir: self.download_dir,
            www_root: self.www_root,
            port: self.port,
            host: self.host,
            env_path: self.env_file,
        }
    }
}

fn parse_host(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/TUBEGRAB_HOST")
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Missing tools only disable the endpoints that need them, so they are
/// reported instead of aborting startup.
fn check_tools(config: &RuntimeConfig) {
    if let Err(err) = ensure_program_available(&config.yt_dlp_bin, "--version") {
        warn!("{err}; /api/info and /api/download will fail");
    }
    if let Err(err) = ensure_program_available(&config.ffmpeg_bin, "-version") {
        warn!("{err}; audio conversion will fail");
    }
}

fn build_state(config: &RuntimeConfig) -> AppState {
    let provider: Arc<dyn StreamProvider> = Arc::new(YtDlpProvider::new(&config.yt_dlp_bin));
    let transcoder: Arc<dyn AudioTranscoder> =
        Arc::new(FfmpegTranscoder::new(&config.ffmpeg_bin));
    AppState {
        downloader: Downloader::new(provider.clone(), transcoder, &config.download_dir),
        provider,
        www_root: Arc::new(config.www_root.clone()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = resolve_runtime_config(BackendArgs::parse().into_overrides())?;
    let host = parse_host(&config.host)?;

    std::fs::create_dir_all(&config.download_dir)
        .with_context(|| format!("creating {}", config.download_dir.display()))?;
    check_tools(&config);

    let state = build_state(&config);
    info!(
        "saving downloads to {}",
        state.downloader.output_dir().display()
    );
    let app = router(state);

    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still terminates.
    if let Err(err) = signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {}", err);
    }
}
