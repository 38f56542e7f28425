use imgly_bgremove::{ModelCache, ModelDownloader};

use crate::config::AppConfig;
use crate::error::AppError;

/// 执行启动检查
///
/// 1. 校验推理模型是否已在本地缓存，缺失时从模型仓库下载
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("开始执行启动检查...");

    ensure_model_available(config).await?;

    tracing::info!("启动检查完成");
    Ok(())
}

/// 确保推理模型可用
///
/// 模型下载只发生在启动期，请求路径上不再有首次下载的长尾延迟。
async fn ensure_model_available(config: &AppConfig) -> Result<(), AppError> {
    let model_url = &config.inference.model_url;
    let model_id = ModelCache::url_to_model_id(model_url);

    let cache = ModelCache::new()
        .map_err(|e| AppError::Internal(format!("failed to open model cache: {e}")))?;
    if cache.is_model_cached(&model_id) {
        tracing::info!("推理模型已缓存: {}", model_id);
        return Ok(());
    }

    tracing::info!("未找到推理模型，正在下载: {}", model_url);
    let downloader = ModelDownloader::new()
        .map_err(|e| AppError::Internal(format!("failed to init model downloader: {e}")))?;
    let downloaded_id = downloader
        .download_model(model_url, false)
        .await
        .map_err(|e| AppError::Internal(format!("model download failed: {e}")))?;
    tracing::info!("推理模型下载完成: {}", downloaded_id);

    Ok(())
}
