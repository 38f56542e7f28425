/// PNG 重编码（RGBA 归一化）
pub mod encoder;
/// HTTP 入口
pub mod handler;
/// 推理委托（trait 接缝 + imgly-bgremove 实现）
pub mod remover;

pub use handler::create_cutout_router;
pub use remover::{BackgroundRemover, ImglyRemover};
