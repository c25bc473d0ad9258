//! 路由组装：门户页面、上传、列表与文件下载。

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::intake::UploadConfig;
use crate::storage::Roots;
use crate::{files, frontend, http, upload, version};

/// 构建完整路由；CORS 由调用方按配置追加。
///
/// `max_body_size` 限制单次上传请求体，`0` 表示不限制。
pub fn build_router(
    roots: Arc<Roots>,
    upload_config: Arc<UploadConfig>,
    max_body_size: u64,
) -> Router {
    let body_limit = match usize::try_from(max_body_size) {
        Ok(0) => DefaultBodyLimit::disable(),
        Ok(limit) => DefaultBodyLimit::max(limit),
        Err(_) => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(frontend::index_page))
        .route("/upload", post(upload::upload_files).layer(body_limit))
        .route("/get_downloadable_files", get(frontend::downloadable_files))
        .route("/uploads/{name}", get(files::serve_upload))
        .route("/downloads/{name}", get(files::serve_download))
        .route("/api/files/list", get(files::list_files))
        .route("/api/version", get(version::get_version_info))
        .route("/static/{*path}", get(frontend::serve_static))
        .fallback(frontend::not_found)
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip = http::client_ip(request),
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(roots))
        .layer(Extension(upload_config))
}
