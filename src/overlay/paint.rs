/// 标注绘制 (imageproc)
use super::geometry::to_pixels;
use super::{Overlay, OverlayKind};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::f32::consts::FRAC_PI_4;

/// 箭头尖长度占线段长度的比例
const ARROW_TIP_RATIO: f32 = 0.15;

/// 按图像尺寸绘制全部标注
pub fn paint_overlays<'a>(
    image: &mut RgbImage,
    overlays: impl IntoIterator<Item = &'a Overlay>,
    thickness: u32,
) {
    for overlay in overlays {
        paint_overlay(image, overlay, thickness);
    }
}

/// 归一化坐标乘以图像尺寸后绘制, 不加原点偏移
pub fn paint_overlay(image: &mut RgbImage, overlay: &Overlay, thickness: u32) {
    let (w, h) = image.dimensions();
    let a = to_pixels(overlay.p1, w, h);
    let b = to_pixels(overlay.p2, w, h);
    let thickness = thickness.max(1);
    match overlay.kind {
        OverlayKind::Rectangle => draw_rect(image, a, b, thickness, overlay.color),
        OverlayKind::Arrow => draw_arrow(image, a, b, thickness, overlay.color),
    }
}

fn draw_rect(image: &mut RgbImage, a: (i32, i32), b: (i32, i32), thickness: u32, color: Rgb<u8>) {
    let (left, right) = (a.0.min(b.0), a.0.max(b.0));
    let (top, bottom) = (a.1.min(b.1), a.1.max(b.1));
    let half = (thickness as i32 - 1) / 2;

    for k in 0..thickness as i32 {
        let inset = k - half;
        let w = right - left - 2 * inset + 1;
        let h = bottom - top - 2 * inset + 1;
        if w <= 0 || h <= 0 {
            break;
        }
        let r = Rect::at(left + inset, top + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, r, color);
    }
}

fn draw_thick_line(
    image: &mut RgbImage,
    a: (f32, f32),
    b: (f32, f32),
    thickness: u32,
    color: Rgb<u8>,
) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < f32::EPSILON {
        let t = thickness as i32;
        let r = Rect::at(a.0 as i32 - t / 2, a.1 as i32 - t / 2).of_size(thickness, thickness);
        draw_filled_rect_mut(image, r, color);
        return;
    }
    // 沿法线方向平移多条线
    let (nx, ny) = (-dy / len, dx / len);
    let center = (thickness as f32 - 1.0) / 2.0;
    for i in 0..thickness {
        let off = i as f32 - center;
        draw_line_segment_mut(
            image,
            (a.0 + nx * off, a.1 + ny * off),
            (b.0 + nx * off, b.1 + ny * off),
            color,
        );
    }
}

fn draw_arrow(image: &mut RgbImage, a: (i32, i32), b: (i32, i32), thickness: u32, color: Rgb<u8>) {
    let a = (a.0 as f32, a.1 as f32);
    let b = (b.0 as f32, b.1 as f32);
    draw_thick_line(image, a, b, thickness, color);

    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < f32::EPSILON {
        return;
    }
    // 箭头两翼与反向线段成45度
    let tip = len * ARROW_TIP_RATIO;
    let back = (-dy).atan2(-dx);
    for angle in [back + FRAC_PI_4, back - FRAC_PI_4] {
        let wing = (b.0 + tip * angle.cos(), b.1 + tip * angle.sin());
        draw_thick_line(image, b, wing, thickness, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{NormPoint, DEFAULT_COLOR};

    #[test]
    fn test_rect_outline_only() {
        let mut img = RgbImage::new(100, 100);
        let ov = Overlay::new(
            OverlayKind::Rectangle,
            NormPoint::new(0.2, 0.2),
            NormPoint::new(0.6, 0.6),
            DEFAULT_COLOR,
        );
        paint_overlay(&mut img, &ov, 2);
        assert_eq!(img.get_pixel(20, 40), &DEFAULT_COLOR);
        assert_eq!(img.get_pixel(21, 40), &DEFAULT_COLOR);
        assert_eq!(img.get_pixel(60, 20), &DEFAULT_COLOR);
        // 内部不填充
        assert_eq!(img.get_pixel(40, 40), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_arrow_and_degenerate_shapes() {
        let mut img = RgbImage::new(100, 100);
        let arrow = Overlay::new(
            OverlayKind::Arrow,
            NormPoint::new(0.1, 0.5),
            NormPoint::new(0.9, 0.5),
            Rgb([255, 0, 0]),
        );
        paint_overlay(&mut img, &arrow, 3);
        assert_eq!(img.get_pixel(50, 50), &Rgb([255, 0, 0]));
        // 箭头翼沿对角线回到终点左上/左下
        assert_eq!(img.get_pixel(86, 46), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(86, 54), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(50, 40), &Rgb([0, 0, 0]));

        // 零尺寸与越界形状不会 panic
        let dot = Overlay::new(
            OverlayKind::Arrow,
            NormPoint::new(1.0, 1.0),
            NormPoint::new(1.0, 1.0),
            DEFAULT_COLOR,
        );
        paint_overlays(&mut img, [&dot, &dot], 3);
        let flat = Overlay::new(
            OverlayKind::Rectangle,
            NormPoint::new(0.0, 0.3),
            NormPoint::new(1.0, 0.3),
            DEFAULT_COLOR,
        );
        paint_overlay(&mut img, &flat, 3);
    }
}
