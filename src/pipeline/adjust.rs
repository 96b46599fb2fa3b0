/// 亮度/对比度调整: out = clamp(p * contrast + brightness), 逐通道查表
use image::RgbImage;

pub const BRIGHTNESS_RANGE: (i32, i32) = (-100, 100);
pub const CONTRAST_RANGE: (f64, f64) = (0.1, 2.0);

/// 默认参数下为恒等变换
pub fn is_identity(contrast: f64, brightness: i32) -> bool {
    brightness == 0 && (contrast - 1.0).abs() < f64::EPSILON
}

fn build_lut(contrast: f64, brightness: i32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let v = (i as f64 * contrast + brightness as f64).round();
        *slot = v.clamp(0.0, 255.0) as u8;
    }
    lut
}

/// 返回调整后的新图像 (输入不变)
pub fn adjust(frame: &RgbImage, contrast: f64, brightness: i32) -> RgbImage {
    let mut out = frame.clone();
    if is_identity(contrast, brightness) {
        return out;
    }
    let lut = build_lut(contrast, brightness);
    for v in out.iter_mut() {
        *v = lut[*v as usize];
    }
    out
}
