use imgly_bgremove::{
    BackendType, BackgroundRemovalProcessor, ExecutionProvider, ModelCache, ModelSource, ModelSpec,
    OutputFormat, ProcessorConfig,
};
use thiserror::Error;

use crate::config::InferenceConfig;
use crate::error::AppError;

/// 推理阶段错误类型
///
/// 对外统一折叠为 500（见 `AppError::Processing`），此处的区分只服务于
/// 日志与阶段定位。
#[derive(Error, Debug)]
pub enum RemoverError {
    /// 输入字节无法解码为图像
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// 模型推理失败
    #[error("background removal failed: {0}")]
    Inference(String),

    /// 结果重编码失败
    #[error("failed to encode PNG: {0}")]
    Encode(String),

    /// 推理会话构建失败
    #[error("inference session unavailable: {0}")]
    Session(String),
}

impl From<RemoverError> for AppError {
    fn from(err: RemoverError) -> Self {
        AppError::Processing(err.to_string())
    }
}

/// 背景去除能力的接缝：字节进、字节出
///
/// `remove` 是阻塞调用（模型推理为 CPU/GPU 密集操作），调用方必须通过
/// `tokio::task::spawn_blocking` 调度，避免阻塞异步运行时。
pub trait BackgroundRemover: Send + Sync {
    /// 对输入图像字节执行背景去除，返回带透明通道的图像字节。
    fn remove(&self, image_bytes: &[u8]) -> Result<Vec<u8>, RemoverError>;
}

/// 基于 imgly-bgremove 的生产实现
///
/// 处理器对象不是 `Send`，不能跨线程共享，因此这里只持有纯数据的
/// `ProcessorConfig`，在每次调用的阻塞线程内构建处理器；模型会话由库内部
/// 的 SessionCache 复用，重复构建不会重复加载权重。
pub struct ImglyRemover {
    processor_config: ProcessorConfig,
}

impl ImglyRemover {
    /// 按配置装配处理器参数（模型须已存在于本地缓存，见启动检查）
    pub fn new(config: &InferenceConfig) -> Result<Self, RemoverError> {
        let model_spec = ModelSpec {
            source: ModelSource::Downloaded(ModelCache::url_to_model_id(&config.model_url)),
            variant: config.variant.clone(),
        };
        let processor_config = ProcessorConfig::builder()
            .model_spec(model_spec)
            .backend_type(parse_backend(&config.backend))
            .execution_provider(parse_execution_provider(&config.execution_provider))
            .output_format(OutputFormat::Png)
            .build()
            .map_err(|e| RemoverError::Session(e.to_string()))?;

        tracing::info!(
            backend = %config.backend,
            execution_provider = %config.execution_provider,
            model_url = %config.model_url,
            "推理配置装配完成"
        );

        Ok(Self { processor_config })
    }
}

impl BackgroundRemover for ImglyRemover {
    fn remove(&self, image_bytes: &[u8]) -> Result<Vec<u8>, RemoverError> {
        let mut processor = BackgroundRemovalProcessor::new(self.processor_config.clone())
            .map_err(|e| RemoverError::Session(e.to_string()))?;
        let result = processor
            .process_bytes(image_bytes)
            .map_err(|e| RemoverError::Inference(e.to_string()))?;
        result
            .to_bytes(OutputFormat::Png, 100)
            .map_err(|e| RemoverError::Encode(e.to_string()))
    }
}

fn parse_backend(name: &str) -> BackendType {
    match name.to_ascii_lowercase().as_str() {
        "tract" => BackendType::Tract,
        "onnx" => BackendType::Onnx,
        other => {
            tracing::warn!("未知推理后端 {}，回退到 onnx", other);
            BackendType::Onnx
        }
    }
}

fn parse_execution_provider(name: &str) -> ExecutionProvider {
    match name.to_ascii_lowercase().as_str() {
        "cpu" => ExecutionProvider::Cpu,
        "cuda" => ExecutionProvider::Cuda,
        "coreml" => ExecutionProvider::CoreMl,
        "auto" => ExecutionProvider::Auto,
        other => {
            tracing::warn!("未知执行提供方 {}，回退到 auto", other);
            ExecutionProvider::Auto
        }
    }
}
