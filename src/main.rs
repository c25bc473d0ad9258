//! AxoPortal server binary.
//!
//! A small upload/download portal: browsers post files into the uploads
//! directory, browse them as a gallery, and fetch read-only files from the
//! downloads directory. The main entry point prepares both directories, builds
//! the Axum router, and starts the HTTP (and optionally HTTPS) listeners.

mod app;
mod atomic;
mod config;
mod error;
mod files;
mod frontend;
mod http;
mod intake;
mod listing;
mod logging;
mod naming;
mod storage;
mod tls;
mod upload;
mod version;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::config::{Args, SHUTDOWN_GRACE_SECS};
use crate::http::build_cors_layer;
use crate::intake::UploadConfig;
use crate::storage::{LocalStore, Roots};

shadow!(build);

/// Starts the portal and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let uploads = LocalStore::new(PathBuf::from(&args.uploads_dir));
    let downloads = LocalStore::new(PathBuf::from(&args.downloads_dir));
    uploads.ensure_root().await?;
    downloads.ensure_root().await?;
    info!(
        uploads = %uploads.root_path().display(),
        downloads = %downloads.root_path().display(),
        "storage roots ready"
    );

    let roots = Arc::new(Roots::new(Arc::new(uploads), Arc::new(downloads)));
    let upload_config = Arc::new(UploadConfig {
        max_name_attempts: args.name_max_attempts,
    });

    let mut app = app::build_router(roots, upload_config, args.upload_max_size);
    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let tls_config = tls::load_rustls_config(&args).await?;
    let handle = Handle::new();

    info!("🚀 Starting HTTP server at {}", http_addr);
    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(app.clone().into_make_service_with_connect_info::<SocketAddr>());

    match tls_config {
        Some(tls_config) => {
            let https_addr = SocketAddr::new(host, args.https_port);
            info!("🔒 Starting HTTPS server at {}", https_addr);
            let https_server = axum_server::bind_rustls(https_addr, tls_config)
                .handle(handle.clone())
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());
            tokio::select! {
                result = http_server => result?,
                result = https_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
        None => {
            tokio::select! {
                result = http_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}
