//! 统一的 API 错误类型与转换（JSON 错误体）。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::io::ErrorKind;

use crate::intake::IntakeError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    Internal(String),
    /// 写入中途失败：附带已成功写入的文件名。
    PartialUpload { message: String, files: Vec<String> },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    files: Vec<String>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) | ApiError::PartialUpload { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(error)
            | ApiError::NotFound(error)
            | ApiError::Conflict(error)
            | ApiError::PayloadTooLarge(error)
            | ApiError::Internal(error) => ErrorBody {
                error,
                files: Vec::new(),
            },
            ApiError::PartialUpload { message, files } => ErrorBody {
                error: message,
                files,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidName | StorageError::NotFound => {
                ApiError::NotFound("not found".into())
            }
            StorageError::AlreadyExists => ApiError::Conflict("file already exists".into()),
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound("not found".into()),
                _ => ApiError::Internal(err.to_string()),
            },
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(error: IntakeError) -> Self {
        match error {
            IntakeError::StorageFailure { ref stored, .. } => ApiError::PartialUpload {
                files: stored.clone(),
                message: error.to_string(),
            },
            _ => ApiError::BadRequest(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn disallowed_extension_is_bad_request_with_message() {
        let error: ApiError = IntakeError::DisallowedExtension("virus.exe".into()).into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "File type not allowed: virus.exe");
        assert!(body.get("files").is_none());
    }

    #[tokio::test]
    async fn storage_failure_reports_partial_files() {
        let error: ApiError = IntakeError::StorageFailure {
            name: "b.txt".into(),
            source: StorageError::Io(io::Error::other("disk full")),
            stored: vec!["a.txt".into()],
        }
        .into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to store b.txt: disk full");
        assert_eq!(body["files"], serde_json::json!(["a.txt"]));
    }

    #[test]
    fn invalid_names_map_to_not_found() {
        let error: ApiError = StorageError::InvalidName.into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }
}
