use axum::{
    Router,
    extract::{
        DefaultBodyLimit, State,
        multipart::{Field, Multipart},
    },
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use tracing::{info, warn};

use crate::{error::AppError, state::AppState};

use super::encoder;

/// 上传表单（仅用于 OpenAPI 文档）
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct RemoveBgForm {
    /// 待处理的图片文件（常见格式均可，由解码器识别）
    #[schema(value_type = String, format = Binary)]
    file: String,
}

/// 一次请求中取出的上传文件
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/remove-bg/",
    summary = "去除图片背景",
    description = "上传一张图片，调用预训练分割模型去除背景，返回带透明通道的 PNG。\
        超过大小上限（默认 5 MB）返回 413；无法解码或推理失败统一返回 500。",
    request_body(content = RemoveBgForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "PNG bytes (RGBA)"),
        (status = 413, description = "Payload too large", body = AppError),
        (status = 422, description = "Invalid multipart form", body = AppError),
        (status = 500, description = "Decode/inference/encode failure", body = AppError),
        (status = 504, description = "Inference timeout", body = AppError)
    ),
    tag = "Cutout"
)]
pub async fn remove_background(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let Upload { filename, bytes } = read_upload(multipart, state.upload_max_bytes).await?;
    info!(filename = %filename, size = bytes.len(), "收到上传文件");

    // 推理与重编码都是阻塞的 CPU 密集操作，必须移出 tokio worker。
    // 许可随闭包走：超时提前返回后，遗留线程跑完才释放，并发上限不被放大。
    let permit = state
        .infer_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| AppError::Internal(format!("failed to acquire inference permit: {e}")))?;
    let remover = state.remover.clone();
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let cut = remover.remove(&bytes)?;
        encoder::to_rgba_png(&cut)
    });

    let joined = match state.infer_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    filename = %filename,
                    timeout_secs = limit.as_secs(),
                    "推理超时，放弃等待（遗留线程将在后台跑完）"
                );
                return Err(AppError::InferenceTimeout(limit.as_secs()));
            }
        },
        None => task.await,
    };
    let png = joined
        .map_err(AppError::from)?
        .map_err(|e| {
            tracing::error!(filename = %filename, error = %e, "处理上传文件失败");
            AppError::from(e)
        })?;

    info!(filename = %filename, bytes = png.len(), "背景去除完成");

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
        (header::CONTENT_LENGTH, HeaderValue::from(png.len() as u64)),
    ];
    Ok((StatusCode::OK, headers, png))
}

/// 从 multipart 表单中取出文件字段
///
/// 优先名为 `file` 的字段，否则取第一个带文件名的字段；都没有则拒绝。
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown").to_string();
        let bytes = read_field_limited(field, max_bytes, &filename).await?;
        return Ok(Upload { filename, bytes });
    }
    Err(AppError::Validation(
        "missing file field in multipart form".to_string(),
    ))
}

/// 边读边校验大小：一旦累计超过上限立即拒绝，不再缓冲剩余请求体
async fn read_field_limited(
    mut field: Field<'_>,
    max_bytes: usize,
    filename: &str,
) -> Result<Vec<u8>, AppError> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if exceeds_limit(buf.len() + chunk.len(), max_bytes) {
            warn!(
                filename = %filename,
                received = buf.len() + chunk.len(),
                max_bytes,
                "上传文件过大，已拒绝"
            );
            return Err(AppError::PayloadTooLarge(limit_in_mb(max_bytes)));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// 大小护栏：字节数与固定上限的纯比较（上限本身可通过）
fn exceeds_limit(len: usize, max_bytes: usize) -> bool {
    len > max_bytes
}

fn limit_in_mb(max_bytes: usize) -> u64 {
    (max_bytes / 1_000_000) as u64
}

pub fn create_cutout_router() -> Router<AppState> {
    // 本路由自行流式校验大小并返回固定 413 文案，
    // axum 默认的请求体上限必须让位，否则会先一步截断。
    Router::new().route(
        "/remove-bg/",
        post(remove_background).layer(DefaultBodyLimit::disable()),
    )
}

#[cfg(test)]
mod tests {
    use super::{exceeds_limit, limit_in_mb};

    #[test]
    fn size_guard_boundary_is_inclusive() {
        assert!(!exceeds_limit(5_000_000, 5_000_000));
        assert!(exceeds_limit(5_000_001, 5_000_000));
        assert!(!exceeds_limit(0, 5_000_000));
    }

    #[test]
    fn limit_renders_as_whole_megabytes() {
        assert_eq!(limit_in_mb(5_000_000), 5);
        assert_eq!(limit_in_mb(10_000_000), 10);
    }
}
