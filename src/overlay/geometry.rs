/// 显示几何: 适配缩放 + 居中原点 + 归一化坐标换算
///
/// 每次合成时记录一次, 命中测试和拖动都必须使用最近一次记录的值
use super::NormPoint;

/// 标签尺寸不可用时的回退值
pub const FALLBACK_LABEL: (u32, u32) = (640, 480);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub disp_w: u32,
    pub disp_h: u32,
    pub origin_x: i32,
    pub origin_y: i32,
    pub scale: f64,
}

impl DisplayGeometry {
    /// 保持宽高比的适配 (fit-inside)
    pub fn fit(frame_w: u32, frame_h: u32, label_w: u32, label_h: u32) -> Self {
        let (label_w, label_h) = if label_w <= 1 || label_h <= 1 {
            FALLBACK_LABEL
        } else {
            (label_w, label_h)
        };
        let (frame_w, frame_h) = (frame_w.max(1), frame_h.max(1));
        let scale = (label_w as f64 / frame_w as f64).min(label_h as f64 / frame_h as f64);
        let disp_w = ((frame_w as f64 * scale) as u32).max(1);
        let disp_h = ((frame_h as f64 * scale) as u32).max(1);
        Self {
            disp_w,
            disp_h,
            origin_x: (label_w.saturating_sub(disp_w) / 2) as i32,
            origin_y: (label_h.saturating_sub(disp_h) / 2) as i32,
            scale,
        }
    }

    /// 标签坐标 → 图像坐标
    pub fn to_image_space(&self, point: (f32, f32)) -> (f32, f32) {
        (
            point.0 - self.origin_x as f32,
            point.1 - self.origin_y as f32,
        )
    }

    /// 标签坐标是否落在显示图像内 (含右/下边缘)
    pub fn contains(&self, point: (f32, f32)) -> bool {
        let (x, y) = self.to_image_space(point);
        x >= 0.0 && y >= 0.0 && x <= self.disp_w as f32 && y <= self.disp_h as f32
    }

    /// 标签坐标 → 归一化坐标 (夹到 [0,1])
    pub fn to_norm(&self, point: (f32, f32)) -> NormPoint {
        let (x, y) = self.to_image_space(point);
        NormPoint::new(x / self.disp_w as f32, y / self.disp_h as f32)
    }

    /// 归一化坐标 → 显示图像像素 (不含原点偏移)
    pub fn from_norm(&self, p: NormPoint) -> (i32, i32) {
        to_pixels(p, self.disp_w, self.disp_h)
    }

    /// 像素位移 → 归一化位移
    pub fn delta_to_norm(&self, delta: (f32, f32)) -> (f32, f32) {
        (delta.0 / self.disp_w as f32, delta.1 / self.disp_h as f32)
    }
}

/// 归一化坐标按任意尺寸换算成像素 (快照按采集分辨率)
pub fn to_pixels(p: NormPoint, width: u32, height: u32) -> (i32, i32) {
    (
        (p.x * width as f32).round() as i32,
        (p.y * height as f32).round() as i32,
    )
}
