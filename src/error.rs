use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
///
/// 对外契约刻意保持粗粒度：除大小超限与表单校验外，解码、推理、编码
/// 的一切失败都折叠为同一个 500 响应，仅通过稳定错误码区分阶段。
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 上传文件超过大小上限（携带以 MB 计的上限，用于固定文案）
    #[error("File too large. Max {0} MB allowed.")]
    PayloadTooLarge(u64),

    /// 上传表单校验错误（multipart 解析失败、缺少文件字段等）
    #[error("Invalid upload: {0}")]
    Validation(String),

    /// 图像处理错误（解码 / 推理 / 编码）
    #[error("Internal server error: {0}")]
    Processing(String),

    /// 内部服务器错误（运行时层面：阻塞任务 join 失败、信号量关闭等）
    #[error("Internal server error: {0}")]
    Internal(String),

    /// 推理超时
    #[error("Inference timed out after {0}s")]
    InferenceTimeout(u64),
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 设计目标：
/// - 让所有 API 错误返回结构化 JSON，便于调用方稳定处理
/// - 与 OpenAPI 一致（content-type = application/problem+json）
/// - 允许在不破坏主结构的前提下扩展字段（如 requestId）
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Payload Too Large")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 413)]
    pub status: u16,

    /// 人类可读的详细信息（大小超限与内部错误的文案为稳定契约）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "PAYLOAD_TOO_LARGE")]
    pub code: String,

    /// 可选：请求追踪 ID（由 request-id middleware 回填）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Processing(_) => "PROCESSING_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::InferenceTimeout(_) => "INFERENCE_TIMEOUT",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::PAYLOAD_TOO_LARGE => "Payload Too Large",
            StatusCode::UNPROCESSABLE_ENTITY => "Validation Failed",
            StatusCode::GATEWAY_TIMEOUT => "Gateway Timeout",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

// =============== Error conversions for common external errors ===============

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("multipart read failed: {err}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}
