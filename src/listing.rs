//! 目录列举与预览分类。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::SystemTime;
use tracing::debug;

use crate::naming::extension_of;
use crate::storage::{FileStore, Root, StorageError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub const PDF_ICON: &str = "/static/pdf-icon.svg";
pub const FILE_ICON: &str = "/static/file-icon.svg";
pub const VIDEO_ICON: &str = "/static/video-icon.svg";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Image,
    Pdf,
    Document,
    Video,
    Default,
}

impl PreviewKind {
    /// 根据扩展名分类；无扩展名或未知扩展名归为 `Default`。
    pub fn classify(name: &str) -> Self {
        match extension_of(name).as_deref() {
            Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp") => PreviewKind::Image,
            Some("pdf") => PreviewKind::Pdf,
            Some("txt" | "docx" | "zip") => PreviewKind::Document,
            Some("mp4") => PreviewKind::Video,
            _ => PreviewKind::Default,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
    pub size_mb: String,
    pub preview: PreviewKind,
    pub preview_url: String,
    pub url: String,
    pub modified: Option<String>,
}

/// 列出根目录中的文件并附带大小与预览信息。
pub async fn list_with_previews(
    store: &dyn FileStore,
    root: Root,
) -> Result<Vec<ListedFile>, StorageError> {
    let entries = store.list().await?;
    debug!(root = root.url_prefix(), count = entries.len(), "list directory");
    Ok(entries
        .into_iter()
        .map(|entry| {
            let preview = PreviewKind::classify(&entry.name);
            let url = file_url(root, &entry.name);
            ListedFile {
                size_mb: format_size_mb(entry.size),
                preview_url: preview_url(preview, &url),
                modified: entry.modified.map(format_timestamp),
                name: entry.name,
                size: entry.size,
                preview,
                url,
            }
        })
        .collect())
}

/// 以 MB 为单位保留两位小数。
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB)
}

pub fn file_url(root: Root, name: &str) -> String {
    format!("/{}/{}", root.url_prefix(), urlencoding::encode(name))
}

fn preview_url(kind: PreviewKind, url: &str) -> String {
    match kind {
        PreviewKind::Image => url.to_string(),
        PreviewKind::Pdf => PDF_ICON.to_string(),
        PreviewKind::Video => VIDEO_ICON.to_string(),
        PreviewKind::Document | PreviewKind::Default => FILE_ICON.to_string(),
    }
}

fn format_timestamp(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}
