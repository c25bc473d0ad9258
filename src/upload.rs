//! 多文件表单上传处理器。

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::http::StatusCode;
use axum::response::Json as JsonResponse;
use futures_util::stream::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::UPLOAD_FIELD_NAME;
use crate::error::ApiError;
use crate::intake::{IntakeError, UploadBatch, UploadConfig, ingest};
use crate::storage::{Root, Roots};

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    message: &'static str,
    files: Vec<String>,
}

/// 接收 `files` 字段中的所有文件并写入上传目录。
pub async fn upload_files(
    Extension(roots): Extension<Arc<Roots>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    // 缺少表单体或 boundary 时与没有 `files` 字段同样处理
    let multipart = multipart.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "upload without multipart body");
        ApiError::from(IntakeError::NoFilePart)
    })?;

    let mut batch = UploadBatch::new(roots.store(Root::Uploads));
    read_batch(multipart, &mut batch)
        .await
        .inspect_err(|err| warn!(error = ?err, "upload rejected"))?;
    info!(count = batch.len(), "upload received");

    let report = ingest(batch, &upload)
        .await
        .inspect_err(|err| warn!(error = %err, "upload rejected"))?;

    Ok(JsonResponse(UploadResponse {
        message: "Files uploaded successfully",
        files: report.stored,
    }))
}

/// 读取表单中所有 `files` 字段并逐块暂存；其他字段忽略。
async fn read_batch(
    mut multipart: Multipart,
    batch: &mut UploadBatch<'_>,
) -> Result<(), ApiError> {
    let mut saw_field = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        saw_field = true;
        let raw_name = field.file_name().unwrap_or_default().to_string();
        let Some(staged) = batch.admit(&raw_name).await? else {
            continue;
        };

        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(multipart_error)?;
            if chunk.is_empty() {
                continue;
            }
            staged
                .write(&chunk)
                .await
                .map_err(|source| IntakeError::StorageFailure {
                    name: raw_name.clone(),
                    source,
                    stored: Vec::new(),
                })?;
        }
    }

    if !saw_field {
        return Err(IntakeError::NoFilePart.into());
    }
    Ok(())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
