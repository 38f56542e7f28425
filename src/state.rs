use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::features::cutout::remover::BackgroundRemover;

/// 聚合的应用共享状态
///
/// 上传与超时阈值在此持有请求期副本，而不是让 handler 回读全局配置：
/// 集成测试可以据此注入假推理实现与任意阈值。
#[derive(Clone)]
pub struct AppState {
    /// 背景去除推理实现（生产为 ImglyRemover，测试可注入假实现）
    pub remover: Arc<dyn BackgroundRemover>,
    /// 控制并发推理的信号量（限制 CPU 密集型任务数量）
    pub infer_semaphore: Arc<Semaphore>,
    /// 单次上传的字节上限（边界含等于）
    pub upload_max_bytes: usize,
    /// 推理超时（None 表示不限制）
    pub infer_timeout: Option<Duration>,
}

impl AppState {
    /// 由配置与推理实现装配应用状态
    pub fn from_config(config: &AppConfig, remover: Arc<dyn BackgroundRemover>) -> Self {
        let permits = {
            let m = config.inference.max_parallel as usize;
            if m == 0 { num_cpus::get() } else { m }
        };
        let infer_timeout = if config.inference.timeout_secs > 0 {
            Some(Duration::from_secs(config.inference.timeout_secs))
        } else {
            None
        };

        Self {
            remover,
            infer_semaphore: Arc::new(Semaphore::new(permits)),
            upload_max_bytes: config.upload.max_bytes as usize,
            infer_timeout,
        }
    }
}
