/// 几何变换: 旋转 → 水平镜像 → 缩放裁剪
use crate::utils::{resize_rgb, Interpolation};
use image::{imageops, RgbImage};

pub const ZOOM_RANGE: (f64, f64) = (1.0, 3.0);
/// 低于该倍率视为不缩放
const ZOOM_EPSILON: f64 = 1.01;

/// 顺时针旋转角度 (只允许90的整数倍)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// 非90整数倍的角度返回 None
    pub fn from_degrees(deg: i32) -> Option<Self> {
        match deg.rem_euclid(360) {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// 再转90度
    pub fn next(&self) -> Self {
        Self::from_degrees(self.degrees() + 90).unwrap_or_default()
    }

    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

pub fn rotate(image: RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::None => image,
        Rotation::Cw90 => imageops::rotate90(&image),
        Rotation::Cw180 => imageops::rotate180(&image),
        Rotation::Cw270 => imageops::rotate270(&image),
    }
}

pub fn mirror(mut image: RgbImage, enabled: bool) -> RgbImage {
    if enabled {
        imageops::flip_horizontal_in_place(&mut image);
    }
    image
}

/// 缩放裁剪窗口 (始终完整落在帧内)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn crop_extent(len: u32, zoom: f64) -> u32 {
    ((len as f64 / zoom) as u32).clamp(1, len.max(1))
}

/// 平移限制在 ±(w-cw)/2 内
pub fn clamp_pan(width: u32, height: u32, zoom: f64, pan: (i32, i32)) -> (i32, i32) {
    if zoom <= ZOOM_EPSILON {
        return (0, 0);
    }
    let max_x = ((width - crop_extent(width, zoom)) / 2) as i32;
    let max_y = ((height - crop_extent(height, zoom)) / 2) as i32;
    (pan.0.clamp(-max_x, max_x), pan.1.clamp(-max_y, max_y))
}

/// 计算裁剪窗口, 不缩放时返回 None
pub fn zoom_window(width: u32, height: u32, zoom: f64, pan: (i32, i32)) -> Option<ZoomWindow> {
    if zoom <= ZOOM_EPSILON || width == 0 || height == 0 {
        return None;
    }
    let cw = crop_extent(width, zoom);
    let ch = crop_extent(height, zoom);
    let cx = width as i64 / 2 + pan.0 as i64;
    let cy = height as i64 / 2 + pan.1 as i64;
    let x = (cx - cw as i64 / 2).clamp(0, (width - cw) as i64) as u32;
    let y = (cy - ch as i64 / 2).clamp(0, (height - ch) as i64) as u32;
    Some(ZoomWindow {
        x,
        y,
        width: cw,
        height: ch,
    })
}

/// 裁剪后缩放回原尺寸
pub fn zoom(image: RgbImage, zoom: f64, pan: (i32, i32)) -> RgbImage {
    let (w, h) = image.dimensions();
    match zoom_window(w, h, zoom, pan) {
        None => image,
        Some(win) => {
            let crop = imageops::crop_imm(&image, win.x, win.y, win.width, win.height).to_image();
            resize_rgb(&crop, w, h, Interpolation::Linear)
        }
    }
}
