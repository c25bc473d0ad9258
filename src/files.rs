//! 文件列表与下载处理器。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use httpdate::fmt_http_date;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::listing::{ListedFile, list_with_previews};
use crate::storage::{FileStore, Root, Roots, single_component};

#[derive(Deserialize)]
pub(crate) struct ListQuery {
    root: Option<Root>,
}

/// 以 JSON 返回指定根目录（默认上传目录）的文件列表。
pub async fn list_files(
    Query(query): Query<ListQuery>,
    Extension(roots): Extension<Arc<Roots>>,
) -> Result<JsonResponse<Vec<ListedFile>>, ApiError> {
    let root = query.root.unwrap_or(Root::Uploads);
    let files = list_with_previews(roots.store(root), root).await?;
    info!(root = root.url_prefix(), count = files.len(), "list files");
    Ok(JsonResponse(files))
}

pub async fn serve_upload(
    Path(name): Path<String>,
    Extension(roots): Extension<Arc<Roots>>,
) -> Result<Response, ApiError> {
    serve_file(roots.store(Root::Uploads), &name).await
}

pub async fn serve_download(
    Path(name): Path<String>,
    Extension(roots): Extension<Arc<Roots>>,
) -> Result<Response, ApiError> {
    serve_file(roots.store(Root::Downloads), &name).await
}

/// 流式返回根目录下的单个文件；名称必须是单级路径分量。
pub async fn serve_file(store: &dyn FileStore, name: &str) -> Result<Response, ApiError> {
    let name = single_component(name).inspect_err(|_| debug!(name, "rejected file name"))?;
    let file = store.open(name).await?;
    let mime = mime_guess::from_path(name).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size));
    if let Some(modified) = file.modified
        && let Ok(value) = HeaderValue::from_str(&fmt_http_date(modified))
    {
        headers.insert(header::LAST_MODIFIED, value);
    }

    info!(name, size = file.size, "serve file");
    let stream = ReaderStream::new(file.reader);
    Ok((StatusCode::OK, headers, AxumBody::from_stream(stream)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use http_body_util::BodyExt;

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn serve_file_streams_content_with_headers() {
        let store = MemoryStore::new();
        store.insert("doc.pdf", b"%PDF-1.7").await;

        let response = serve_file(&store, "doc.pdf").await.expect("serve");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "8");
        assert_eq!(body_bytes(response).await, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn serve_file_rejects_paths_outside_root() {
        let store = MemoryStore::new();
        store.insert("passwd", b"root:x").await;

        for name in ["../../etc/passwd", "a/b", "..", "..\\passwd"] {
            let result = serve_file(&store, name).await;
            assert!(
                matches!(result, Err(ApiError::NotFound(_))),
                "{name} should not be served"
            );
        }
    }

    #[tokio::test]
    async fn serve_file_missing_is_not_found() {
        let store = MemoryStore::new();
        let result = serve_file(&store, "missing.txt").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
