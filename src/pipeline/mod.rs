// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 帧变换流水线 (Transform Pipeline)
///
/// 纯函数, 固定顺序: 调整 → 旋转 → 镜像 → 缩放裁剪
/// 输入帧不被修改, 每次都在拷贝上处理
pub mod adjust;
pub mod geometry;

pub use adjust::{adjust, BRIGHTNESS_RANGE, CONTRAST_RANGE};
pub use geometry::{clamp_pan, mirror, rotate, zoom, zoom_window, Rotation, ZoomWindow, ZOOM_RANGE};

use image::RgbImage;

/// 变换参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub brightness: i32,
    pub contrast: f64,
    pub rotation: Rotation,
    pub mirror: bool,
    pub zoom: f64,
    pub pan: (i32, i32),
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 1.0,
            rotation: Rotation::None,
            mirror: false,
            zoom: 1.0,
            pan: (0, 0),
        }
    }
}

impl TransformParams {
    /// 变换后的输出尺寸
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// 对帧应用完整变换
pub fn apply(frame: &RgbImage, params: &TransformParams) -> RgbImage {
    let adjusted = adjust(frame, params.contrast, params.brightness);
    let rotated = rotate(adjusted, params.rotation);
    let mirrored = mirror(rotated, params.mirror);
    zoom(mirrored, params.zoom, params.pan)
}
