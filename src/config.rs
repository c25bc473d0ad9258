//! CLI arguments and portal configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "pdf", "txt", "docx", "zip", "mp4", "mp3", "wav",
    "avi", "mov",
];
pub const UPLOAD_FIELD_NAME: &str = "files";
pub const TEMP_FILE_PREFIX: &str = ".axo-upload.";
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 512 * 1024 * 1024;
pub const DEFAULT_NAME_MAX_ATTEMPTS: u32 = 64;
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the portal.
#[derive(Parser, Debug)]
#[command(name = "axo-portal", version = VERSION_INFO, about = "AxoPortal file upload portal")]
pub struct Args {
    #[arg(
        short = 'u',
        long,
        env = "AXO_UPLOADS_DIR",
        default_value = DEFAULT_UPLOADS_DIR,
        help = "Directory receiving uploaded files"
    )]
    pub uploads_dir: String,
    #[arg(
        short = 'd',
        long,
        env = "AXO_DOWNLOADS_DIR",
        default_value = DEFAULT_DOWNLOADS_DIR,
        help = "Read-only directory offered for download"
    )]
    pub downloads_dir: String,
    #[arg(
        short = 'b',
        long,
        env = "AXO_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "AXO_HTTP_PORT",
        default_value_t = 5000,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "AXO_HTTPS_PORT",
        default_value_t = 5001,
        help = "HTTPS port (used only when cert and key are given)"
    )]
    pub https_port: u16,
    #[arg(short = 'c', long, env = "AXO_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "AXO_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
    #[arg(long, env = "AXO_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "AXO_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload request size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(
        long,
        env = "AXO_NAME_MAX_ATTEMPTS",
        default_value_t = DEFAULT_NAME_MAX_ATTEMPTS,
        help = "Max exclusive-create attempts per file before giving up"
    )]
    pub name_max_attempts: u32,
}
