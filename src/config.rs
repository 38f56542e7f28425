use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        8000
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// API 路由前缀（空字符串表示挂在根路径）
    #[serde(default)]
    pub prefix: String,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default)]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 单次上传的字节上限（边界含等于）
    #[serde(default = "UploadConfig::default_max_bytes")]
    pub max_bytes: u64,
}

impl UploadConfig {
    fn default_max_bytes() -> u64 {
        5_000_000
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: Self::default_max_bytes(),
        }
    }
}

/// 推理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// 模型仓库 URL（HuggingFace），启动时校验缓存、缺失则下载
    #[serde(default = "InferenceConfig::default_model_url")]
    pub model_url: String,
    /// 模型变体（fp16/fp32 等，None 表示自动选择）
    #[serde(default)]
    pub variant: Option<String>,
    /// 推理后端：onnx 或 tract
    #[serde(default = "InferenceConfig::default_backend")]
    pub backend: String,
    /// 执行提供方：auto、cpu、cuda 或 coreml
    #[serde(default = "InferenceConfig::default_execution_provider")]
    pub execution_provider: String,
    /// 单次推理超时（秒，0 表示不限制）
    #[serde(default = "InferenceConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// 并发推理许可数（0=自动，取 CPU 核心数）。每个许可对应一个
    /// 阻塞线程上的独立推理调用，内存占用随许可数增长。
    #[serde(default = "InferenceConfig::default_max_parallel")]
    pub max_parallel: u32,
}

impl InferenceConfig {
    fn default_model_url() -> String {
        "https://huggingface.co/imgly/isnet-general-onnx".to_string()
    }
    fn default_backend() -> String {
        "onnx".to_string()
    }
    fn default_execution_provider() -> String {
        "auto".to_string()
    }
    fn default_timeout_secs() -> u64 {
        60
    }
    fn default_max_parallel() -> u32 {
        1
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_url: Self::default_model_url(),
            variant: None,
            backend: Self::default_backend(),
            execution_provider: Self::default_execution_provider(),
            timeout_secs: Self::default_timeout_secs(),
            max_parallel: Self::default_max_parallel(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
    /// 超时后是否强制退出
    #[serde(default = "ShutdownConfig::default_force")]
    pub force_quit: bool,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }
    fn default_force() -> bool {
        true
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
            force_quit: Self::default_force(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// CORS 配置
    #[serde(default)]
    pub cors: CorsConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 推理配置
    #[serde(default)]
    pub inference: InferenceConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    ///
    /// 配置文件允许缺省：所有字段均有默认值，零配置即可启动。
    pub fn load() -> Result<Self, ConfigError> {
        tracing::info!("正在加载配置（config.toml + APP_* 环境变量）");

        let builder = ConfigBuilder::builder()
            // 加载配置文件（可选）
            .add_source(File::with_name("config.toml").required(false))
            // 支持环境变量覆盖，例如：APP_SERVER_PORT
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
