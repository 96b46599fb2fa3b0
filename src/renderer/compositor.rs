/// 显示合成: 适配缩放 → 标注 → HUD
use super::hud::{Hud, HudInfo, TextLabel};
use crate::overlay::{paint_overlays, DisplayGeometry, OverlayModel};
use crate::utils::{resize_rgb, Interpolation};
use image::{Rgb, RgbImage};

const PLACEHOLDER_SIZE: (u32, u32) = (640, 480);
const PLACEHOLDER_BG: Rgb<u8> = Rgb([20, 20, 20]);
const PLACEHOLDER_TEXT: &str = "Waiting for camera...";

/// 合成结果, 附带本次刷新确定的显示几何
pub struct Composite {
    pub image: RgbImage,
    pub geometry: DisplayGeometry,
    /// 需要显示层补画的文字 (显示图像坐标)
    pub labels: Vec<TextLabel>,
}

pub struct Compositor {
    hud: Hud,
    overlay_thickness: u32,
}

impl Compositor {
    pub fn new(hud: Hud, overlay_thickness: u32) -> Self {
        Self {
            hud,
            overlay_thickness: overlay_thickness.max(1),
        }
    }

    pub fn compose(
        &self,
        frame: &RgbImage,
        label: (u32, u32),
        overlays: &OverlayModel,
        info: &HudInfo,
    ) -> Composite {
        let geometry = DisplayGeometry::fit(frame.width(), frame.height(), label.0, label.1);
        let interp = Interpolation::for_scale(frame.width(), geometry.disp_w);
        let mut image = resize_rgb(frame, geometry.disp_w, geometry.disp_h, interp);

        paint_overlays(&mut image, overlays.visible(), self.overlay_thickness);
        let labels = self.hud.draw(&mut image, info);

        Composite {
            image,
            geometry,
            labels,
        }
    }

    /// 会话已打开但还没有帧时显示
    pub fn placeholder(&self, label: (u32, u32)) -> Composite {
        let (w, h) = PLACEHOLDER_SIZE;
        let mut frame = RgbImage::from_pixel(w, h, PLACEHOLDER_BG);
        let text = self
            .hud
            .text(&mut frame, 20, h as i32 / 2 - 8, PLACEHOLDER_TEXT, Rgb([200, 200, 200]));

        let geometry = DisplayGeometry::fit(w, h, label.0, label.1);
        let image = resize_rgb(
            &frame,
            geometry.disp_w,
            geometry.disp_h,
            Interpolation::for_scale(w, geometry.disp_w),
        );
        // 文字位置随占位图一起缩放
        let labels = text
            .map(|t| TextLabel {
                x: t.x * geometry.disp_w as i32 / w as i32,
                y: t.y * geometry.disp_h as i32 / h as i32,
                ..t
            })
            .into_iter()
            .collect();
        Composite {
            image,
            geometry,
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Resolution;
    use crate::overlay::{NormPoint, Overlay, OverlayKind};
    use crate::renderer::FocusIndicator;

    fn hud_info() -> HudInfo {
        HudInfo {
            zoom: 1.0,
            resolution: Resolution::new(640, 480),
            fps: 30.0,
            focus: FocusIndicator::Hidden,
        }
    }

    #[test]
    fn test_compose_fits_and_records_geometry() {
        let compositor = Compositor::new(Hud::default(), 2);
        let frame = RgbImage::from_pixel(640, 480, Rgb([50, 50, 50]));
        let mut overlays = OverlayModel::default();
        overlays.push(Overlay::new(
            OverlayKind::Rectangle,
            NormPoint::new(0.5, 0.5),
            NormPoint::new(0.75, 0.75),
            Rgb([255, 0, 0]),
        ));

        let out = compose_with(&compositor, &frame, (960, 360), &overlays);
        assert_eq!(out.image.dimensions(), (480, 360));
        assert_eq!((out.geometry.origin_x, out.geometry.origin_y), (240, 0));
        // 标注按显示尺寸换算, 不含原点偏移
        assert_eq!(out.image.get_pixel(240, 200), &Rgb([255, 0, 0]));
    }

    fn compose_with(
        c: &Compositor,
        frame: &RgbImage,
        label: (u32, u32),
        overlays: &OverlayModel,
    ) -> Composite {
        c.compose(frame, label, overlays, &hud_info())
    }

    #[test]
    fn test_placeholder() {
        let compositor = Compositor::new(Hud::default(), 2);
        let out = compositor.placeholder((640, 480));
        assert_eq!(out.image.dimensions(), (640, 480));
        assert_eq!(out.image.get_pixel(5, 5), &PLACEHOLDER_BG);
        assert_eq!(out.labels.len(), 1);
        assert_eq!(out.labels[0].text, PLACEHOLDER_TEXT);

        // 缩小一半显示时文字位置同比缩放
        let half = compositor.placeholder((320, 240));
        assert_eq!((half.labels[0].x, half.labels[0].y), (10, 116));
    }
}
