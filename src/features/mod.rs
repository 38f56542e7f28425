/// 背景去除功能
pub mod cutout;

/// 健康检查功能
pub mod health;
