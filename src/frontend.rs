//! 页面渲染与嵌入式静态资源服务。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{Html, IntoResponse, Response};
use rust_embed::RustEmbed;
use std::sync::Arc;

use crate::error::ApiError;
use crate::listing::{ListedFile, list_with_previews};
use crate::storage::{Root, Roots};

const INDEX_TEMPLATE: &str = "index.html";
const FILE_LIST_MARKER: &str = "<!-- file-list -->";

#[derive(RustEmbed)]
#[folder = "frontend/"]
/// 嵌入式页面模板与图标。
pub struct FrontendAssets;

/// 首页：上传表单与当前上传目录的文件卡片。
pub async fn index_page(
    Extension(roots): Extension<Arc<Roots>>,
) -> Result<Html<String>, ApiError> {
    let files = list_with_previews(roots.store(Root::Uploads), Root::Uploads).await?;
    let template = FrontendAssets::get(INDEX_TEMPLATE)
        .ok_or_else(|| ApiError::Internal("page template missing".into()))?;
    let template = std::str::from_utf8(&template.data)
        .map_err(|_| ApiError::Internal("page template is not utf-8".into()))?;
    Ok(Html(render_page(template, &files)))
}

/// 下载目录的文件卡片片段。
pub async fn downloadable_files(
    Extension(roots): Extension<Arc<Roots>>,
) -> Result<Html<String>, ApiError> {
    let files = list_with_previews(roots.store(Root::Downloads), Root::Downloads).await?;
    Ok(Html(render_cards(&files)))
}

/// 返回 `static/` 下的嵌入式资源。
pub async fn serve_static(Path(path): Path<String>) -> Result<Response, ApiError> {
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(ApiError::NotFound("not found".into()));
    }
    load_embedded_asset(&format!("static/{path}"))?
        .ok_or_else(|| ApiError::NotFound("not found".into()))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("not found".into())
}

/// 加载指定路径的嵌入式资源。
fn load_embedded_asset(path: &str) -> Result<Option<Response>, ApiError> {
    let Some(asset) = FrontendAssets::get(path) else {
        return Ok(None);
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    Ok(Some(
        (headers, AxumBody::from(asset.data.into_owned())).into_response(),
    ))
}

pub fn render_page(template: &str, files: &[ListedFile]) -> String {
    template.replacen(FILE_LIST_MARKER, &render_cards(files), 1)
}

pub fn render_cards(files: &[ListedFile]) -> String {
    let mut html = String::new();
    for file in files {
        let url = escape_html(&file.url);
        html.push_str(&format!(
            "<div class='file-card'>\
             <div class='file-preview'>\
             <img src='{preview}' alt='Preview' class='preview-image'>\
             </div>\
             <div class='file-info'>\
             <p class='file-name'><a href='{url}'>{name}</a></p>\
             <p class='file-size'>{size} MB</p>\
             </div>\
             <a href='{url}' download><button class='btn-download'>Download</button></a>\
             </div>",
            preview = escape_html(&file.preview_url),
            name = escape_html(&file.name),
            size = file.size_mb,
        ));
    }
    html
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
