//! 快照: 以采集分辨率重新变换并烧入标注, 编码保存

use crate::error::{CamError, CamResult};
use crate::overlay::{paint_overlays, Overlay};
use crate::pipeline::{self, TransformParams};
use image::codecs::jpeg::JpegEncoder as JpegCodec;
use image::RgbImage;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// 图像编码器
pub trait ImageEncoder: Send {
    fn extension(&self) -> &'static str;
    fn encode(&self, image: &RgbImage, path: &Path) -> CamResult<()>;
}

/// JPEG编码
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    pub quality: u8,
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self { quality: 95 }
    }
}

impl ImageEncoder for JpegEncoder {
    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn encode(&self, image: &RgbImage, path: &Path) -> CamResult<()> {
        let file = File::create(path).map_err(|e| CamError::Snapshot(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        JpegCodec::new_with_quality(&mut writer, self.quality.clamp(1, 100)).encode_image(image)?;
        Ok(())
    }
}

/// 完整分辨率变换 + 标注 (标注坐标乘以采集尺寸)
pub fn render_snapshot(
    frame: &RgbImage,
    params: &TransformParams,
    overlays: &[Overlay],
    thickness: u32,
) -> RgbImage {
    let mut image = pipeline::apply(frame, params);
    paint_overlays(&mut image, overlays, thickness);
    image
}

/// snapshot_YYYYmmdd_HHMMSS.<ext>
pub fn snapshot_file_name(stamp: &str, extension: &str) -> String {
    format!("snapshot_{}.{}", stamp, extension)
}

/// 编码写入目录, 同一秒内重名时追加序号
pub fn save_snapshot(
    encoder: &dyn ImageEncoder,
    dir: &Path,
    stamp: &str,
    image: &RgbImage,
) -> CamResult<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| CamError::Snapshot(e.to_string()))?;
    let mut path = dir.join(snapshot_file_name(stamp, encoder.extension()));
    let mut n = 1;
    while path.exists() {
        path = dir.join(snapshot_file_name(&format!("{}_{}", stamp, n), encoder.extension()));
        n += 1;
    }
    encoder.encode(image, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{NormPoint, OverlayKind};
    use image::Rgb;

    #[test]
    fn test_overlays_scaled_by_capture_size() {
        let frame = RgbImage::from_pixel(400, 200, Rgb([0, 0, 0]));
        let overlay = Overlay::new(
            OverlayKind::Rectangle,
            NormPoint::new(0.5, 0.5),
            NormPoint::new(1.0, 1.0),
            Rgb([0, 200, 120]),
        );
        let out = render_snapshot(&frame, &TransformParams::default(), &[overlay], 3);
        assert_eq!(out.dimensions(), (400, 200));
        assert_eq!(out.get_pixel(200, 150), &Rgb([0, 200, 120]));
    }

    #[test]
    fn test_save_snapshot_unique_names() {
        let dir = std::env::temp_dir().join(format!("usbcam-snap-{}", std::process::id()));
        let image = RgbImage::from_pixel(32, 16, Rgb([10, 20, 30]));
        let first = save_snapshot(&JpegEncoder::default(), &dir, "20240101_120000", &image).unwrap();
        let second = save_snapshot(&JpegEncoder::default(), &dir, "20240101_120000", &image).unwrap();
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "snapshot_20240101_120000.jpg"
        );
        assert_ne!(first, second);
        let decoded = image::open(&second).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
        let _ = fs::remove_dir_all(&dir);
    }
}
