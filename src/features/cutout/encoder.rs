use std::io::Cursor;

use image::ImageFormat;

use super::remover::RemoverError;

/// 将任意可解码的图像字节归一化为带透明通道的 PNG
///
/// 不缩放、不做色彩空间协商，仅强制 RGBA；尺寸原样透传。
pub fn to_rgba_png(bytes: &[u8]) -> Result<Vec<u8>, RemoverError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| RemoverError::Decode(e.to_string()))?;
    let rgba = image::DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut out = Cursor::new(Vec::new());
    rgba.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| RemoverError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
