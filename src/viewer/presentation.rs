//! 显示层接口: 窗口/控件由实现方负责, 控制器只通过这几个调用与之交互

use crate::renderer::TextLabel;
use image::RgbImage;

/// 指针事件的修饰键
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift (或中键) 拖动 = 平移
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true };
}

pub trait Presentation {
    /// 显示区域像素尺寸
    fn label_size(&self) -> (u32, u32);

    /// 显示合成后的图像, origin 为居中偏移
    fn render_frame(&mut self, image: &RgbImage, origin: (i32, i32));

    /// 没有HUD字体时由显示层绘制的文字, 坐标相对于图像左上角
    fn render_labels(&mut self, _labels: &[TextLabel]) {}

    fn set_status_text(&mut self, text: &str);

    fn set_busy_indicator(&mut self, busy: bool);
}
