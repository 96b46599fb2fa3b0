//! 状态HUD: 缩放倍率 / 请求分辨率 / FPS / 对焦指示条
//!
//! 有TTF字体时用 ab_glyph 把文字画进图像, 没有时把文字交给显示层绘制

use crate::input::Resolution;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{info, warn};

const TEXT_COLOR: Rgb<u8> = Rgb([220, 220, 220]);
const BAR_COLOR: Rgb<u8> = Rgb([180, 180, 180]);
const TICK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_HEIGHT: i32 = 16;
const BAR_X: i32 = 8;
const BAR_W: u32 = 140;
const BAR_H: u32 = 6;

/// 常见系统字体位置
const SYSTEM_FONTS: [&str; 5] = [
    "assets/font/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 未能画进图像的文字 (图像坐标, 左上角)
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub color: Rgb<u8>,
}

/// 对焦指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusIndicator {
    /// 设备不支持对焦
    Hidden,
    /// 自动对焦, 附带读回值
    Auto(Option<i32>),
    /// 手动对焦位置 0..=255
    Manual(u8),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HudInfo {
    pub zoom: f64,
    pub resolution: Resolution,
    pub fps: f64,
    pub focus: FocusIndicator,
}

impl HudInfo {
    pub fn lines(&self) -> [String; 3] {
        [
            format!("Zoom: {:.1}x", self.zoom),
            format!("Res: {}", self.resolution),
            format!("FPS: {:.0}", self.fps),
        ]
    }
}

pub struct Hud {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Default for Hud {
    fn default() -> Self {
        Self {
            font: None,
            scale: PxScale::from(14.0),
        }
    }
}

impl Hud {
    /// 加载字体: 优先指定路径, 其次系统字体
    pub fn load(path: Option<&Path>) -> Self {
        let candidates = path
            .into_iter()
            .map(Path::to_path_buf)
            .chain(SYSTEM_FONTS.iter().map(|p| Path::new(p).to_path_buf()));

        for candidate in candidates {
            let Ok(bytes) = std::fs::read(&candidate) else {
                continue;
            };
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    info!("✅ HUD字体加载成功: {}", candidate.display());
                    return Self {
                        font: Some(font),
                        ..Self::default()
                    };
                }
                Err(e) => warn!("⚠️ 字体解析失败 {}: {}", candidate.display(), e),
            }
        }
        warn!("⚠️ 未找到HUD字体, 文字交给窗口绘制");
        Self::default()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 画HUD, 返回没有字体时未画出的文字
    pub fn draw(&self, image: &mut RgbImage, info: &HudInfo) -> Vec<TextLabel> {
        let mut labels = Vec::new();
        for (i, line) in info.lines().iter().enumerate() {
            let y = 4 + LINE_HEIGHT * i as i32;
            labels.extend(self.text(image, 8, y, line, TEXT_COLOR));
        }
        labels.extend(self.draw_focus(image, info.focus));
        labels
    }

    fn draw_focus(&self, image: &mut RgbImage, focus: FocusIndicator) -> Option<TextLabel> {
        if focus == FocusIndicator::Hidden {
            return None;
        }
        let by = image.height() as i32 - 12;
        draw_hollow_rect_mut(
            image,
            Rect::at(BAR_X, by - BAR_H as i32).of_size(BAR_W, BAR_H),
            BAR_COLOR,
        );

        match focus {
            FocusIndicator::Auto(value) => {
                let label = match value {
                    Some(v) => format!("AF:{}", v),
                    None => "AF".to_string(),
                };
                let x = BAR_X + BAR_W as i32 + 6;
                self.text(image, x, by - 10, &label, TEXT_COLOR)
            }
            FocusIndicator::Manual(value) => {
                let x = BAR_X + (value as f32 / 255.0 * BAR_W as f32) as i32;
                let top = by - BAR_H as i32 - 3;
                let height = (by + 3 - top) as u32;
                draw_filled_rect_mut(image, Rect::at(x - 1, top).of_size(2, height), TICK_COLOR);
                None
            }
            FocusIndicator::Hidden => None,
        }
    }

    /// 文字左上角在 (x, y); 没有字体时原样返回
    pub fn text(
        &self,
        image: &mut RgbImage,
        x: i32,
        y: i32,
        text: &str,
        color: Rgb<u8>,
    ) -> Option<TextLabel> {
        match &self.font {
            Some(font) => {
                draw_text_mut(image, color, x, y, self.scale, font, text);
                None
            }
            None => Some(TextLabel {
                x,
                y,
                text: text.to_string(),
                color,
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn info(focus: FocusIndicator) -> HudInfo {
        HudInfo {
            zoom: 1.5,
            resolution: Resolution::new(1280, 720),
            fps: 29.7,
            focus,
        }
    }

    #[test]
    fn test_hud_lines() {
        let lines = info(FocusIndicator::Hidden).lines();
        assert_eq!(lines[0], "Zoom: 1.5x");
        assert_eq!(lines[1], "Res: 1280x720");
        assert_eq!(lines[2], "FPS: 30");
    }

    #[test]
    fn test_manual_focus_tick() {
        let hud = Hud::default();
        let mut img = RgbImage::new(320, 240);
        hud.draw(&mut img, &info(FocusIndicator::Manual(255)));
        // 满值刻度在条的右端
        let by = 240 - 12;
        assert_eq!(img.get_pixel((BAR_X + BAR_W as i32) as u32, by as u32), &TICK_COLOR);
    }

    #[test]
    fn test_text_without_font_is_handed_back() {
        let hud = Hud::default();
        assert!(!hud.has_font());
        let mut img = RgbImage::new(320, 240);
        let labels = hud.draw(&mut img, &info(FocusIndicator::Auto(Some(12))));

        let texts: Vec<&str> = labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["Zoom: 1.5x", "Res: 1280x720", "FPS: 30", "AF:12"]);
        assert_eq!((labels[1].x, labels[1].y), (8, 4 + LINE_HEIGHT));
        // 文字没有画进图像
        assert!(img.enumerate_pixels().all(|(_, _, p)| *p != TEXT_COLOR));
    }

    #[test]
    fn test_hidden_focus_draws_no_bar() {
        let hud = Hud::default();
        let mut img = RgbImage::new(320, 240);
        hud.draw(&mut img, &info(FocusIndicator::Hidden));
        assert!(img.enumerate_pixels().all(|(_, _, p)| *p != BAR_COLOR));

        let mut tiny = RgbImage::new(4, 4);
        let labels = hud.draw(&mut tiny, &info(FocusIndicator::Auto(Some(12))));
        assert_eq!(labels.len(), 4);
    }
}
