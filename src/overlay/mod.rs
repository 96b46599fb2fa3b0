// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 叠加标注模型 (Overlay Model)
///
/// 标注以归一化坐标 [0,1]² 存储, 相对于变换后的显示图像,
/// 因此缩放/平移/窗口大小变化时位置保持稳定.
/// - geometry: 显示几何与坐标换算
/// - paint: 把标注画进图像
pub mod geometry;
pub mod paint;

pub use geometry::{to_pixels, DisplayGeometry};
pub use paint::{paint_overlay, paint_overlays};

use image::Rgb;

/// 默认标注颜色
pub const DEFAULT_COLOR: Rgb<u8> = Rgb([0, 200, 120]);
/// 默认抓取边距(像素)
pub const DEFAULT_GRAB_MARGIN: i32 = 8;

// ========== 数据结构 ==========

/// 归一化坐标点 (始终在 [0,1] 内)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormPoint {
    pub x: f32,
    pub y: f32,
}

impl NormPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Rectangle,
    Arrow,
}

impl OverlayKind {
    pub fn label(&self) -> &'static str {
        match self {
            OverlayKind::Rectangle => "rect",
            OverlayKind::Arrow => "arrow",
        }
    }
}

/// 标注形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub kind: OverlayKind,
    pub p1: NormPoint,
    pub p2: NormPoint,
    pub color: Rgb<u8>,
}

impl Overlay {
    pub fn new(kind: OverlayKind, p1: NormPoint, p2: NormPoint, color: Rgb<u8>) -> Self {
        Self {
            kind,
            p1,
            p2,
            color,
        }
    }

    /// 显示像素下的包围盒 (x1, y1, x2, y2)
    pub fn bounds(&self, geom: &DisplayGeometry) -> (i32, i32, i32, i32) {
        let (ax, ay) = geom.from_norm(self.p1);
        let (bx, by) = geom.from_norm(self.p2);
        (ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }
}

/// 绘制模式 (一次性: 提交后回到 None)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    None,
    Rectangle,
    Arrow,
}

impl DrawMode {
    pub fn kind(&self) -> Option<OverlayKind> {
        match self {
            DrawMode::None => None,
            DrawMode::Rectangle => Some(OverlayKind::Rectangle),
            DrawMode::Arrow => Some(OverlayKind::Arrow),
        }
    }
}

/// 进行中的拖动
#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Drawing,
    Moving { index: usize, last: (f32, f32) },
}

// ========== 标注模型 ==========

#[derive(Debug, Clone)]
pub struct OverlayModel {
    overlays: Vec<Overlay>,
    selected: Option<usize>,
    preview: Option<Overlay>,
    drag: Option<Drag>,
    mode: DrawMode,
    color: Rgb<u8>,
    grab_margin: i32,
}

impl Default for OverlayModel {
    fn default() -> Self {
        Self::new(DEFAULT_GRAB_MARGIN)
    }
}

impl OverlayModel {
    pub fn new(grab_margin: i32) -> Self {
        Self {
            overlays: Vec::new(),
            selected: None,
            preview: None,
            drag: None,
            mode: DrawMode::None,
            color: DEFAULT_COLOR,
            grab_margin: grab_margin.max(0),
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn preview(&self) -> Option<&Overlay> {
        self.preview.as_ref()
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    pub fn color(&self) -> Rgb<u8> {
        self.color
    }

    /// 新标注使用的颜色
    pub fn set_color(&mut self, color: Rgb<u8>) {
        self.color = color;
    }

    pub fn push(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
    }

    /// 从最上层往下找, 返回第一个包围盒(含边距)包含该点的标注
    pub fn hit_test(&self, point: (f32, f32), geom: &DisplayGeometry) -> Option<usize> {
        if !geom.contains(point) {
            return None;
        }
        let (px, py) = geom.to_image_space(point);
        let (px, py) = (px as i32, py as i32);
        let m = self.grab_margin;
        self.overlays
            .iter()
            .enumerate()
            .rev()
            .find(|(_, ov)| {
                let (x1, y1, x2, y2) = ov.bounds(geom);
                px >= x1 - m && px <= x2 + m && py >= y1 - m && py <= y2 + m
            })
            .map(|(i, _)| i)
    }

    /// 按显示像素位移移动标注, 位移被限制在可见区域内
    pub fn move_by(&mut self, index: usize, delta: (f32, f32), geom: &DisplayGeometry) -> bool {
        let Some(ov) = self.overlays.get_mut(index) else {
            return false;
        };
        let (dx, dy) = geom.delta_to_norm(delta);
        let dx = dx.clamp(-ov.p1.x.min(ov.p2.x), 1.0 - ov.p1.x.max(ov.p2.x));
        let dy = dy.clamp(-ov.p1.y.min(ov.p2.y), 1.0 - ov.p1.y.max(ov.p2.y));
        ov.p1 = NormPoint::new(ov.p1.x + dx, ov.p1.y + dy);
        ov.p2 = NormPoint::new(ov.p2.x + dx, ov.p2.y + dy);
        true
    }

    pub fn recolor(&mut self, index: usize, color: Rgb<u8>) -> bool {
        match self.overlays.get_mut(index) {
            Some(ov) => {
                ov.color = color;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, index: usize) -> Option<Overlay> {
        if index >= self.overlays.len() {
            return None;
        }
        let removed = self.overlays.remove(index);
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        self.cancel_drag();
        Some(removed)
    }

    /// 移到最上层 (列表末尾), 保持选中
    pub fn bring_to_front(&mut self, index: usize) -> bool {
        if index >= self.overlays.len() {
            return false;
        }
        let ov = self.overlays.remove(index);
        self.overlays.push(ov);
        self.selected = Some(self.overlays.len() - 1);
        true
    }

    /// 移到最底层 (列表开头), 取消选中
    pub fn send_to_back(&mut self, index: usize) -> bool {
        if index >= self.overlays.len() {
            return false;
        }
        let ov = self.overlays.remove(index);
        self.overlays.insert(0, ov);
        self.selected = None;
        true
    }

    pub fn clear(&mut self) {
        self.overlays.clear();
        self.selected = None;
        self.preview = None;
        self.drag = None;
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|i| *i < self.overlays.len());
    }

    fn cancel_drag(&mut self) {
        if matches!(self.drag, Some(Drag::Moving { .. })) {
            self.drag = None;
        }
    }

    // ========== 交互 ==========

    /// 按下: 有绘制模式时开始绘制 (图像外的起点夹到边缘), 否则尝试选中并开始拖动.
    /// 返回是否需要重绘
    pub fn pointer_down(&mut self, point: (f32, f32), geom: &DisplayGeometry) -> bool {
        if let Some(kind) = self.mode.kind() {
            let start = geom.to_norm(point);
            self.preview = Some(Overlay::new(kind, start, start, self.color));
            self.drag = Some(Drag::Drawing);
            return true;
        }

        self.selected = self.hit_test(point, geom);
        match self.selected {
            Some(index) => {
                self.drag = Some(Drag::Moving { index, last: point });
                true
            }
            None => false,
        }
    }

    pub fn pointer_move(&mut self, point: (f32, f32), geom: &DisplayGeometry) -> bool {
        match self.drag {
            Some(Drag::Drawing) => {
                let p2 = geom.to_norm(point);
                if let Some(preview) = self.preview.as_mut() {
                    preview.p2 = p2;
                }
                true
            }
            Some(Drag::Moving { index, last }) => {
                let delta = (point.0 - last.0, point.1 - last.1);
                self.drag = Some(Drag::Moving { index, last: point });
                self.move_by(index, delta, geom)
            }
            None => false,
        }
    }

    /// 松开: 提交预览形状并重置绘制模式, 返回新提交的标注
    pub fn pointer_up(&mut self, point: (f32, f32), geom: &DisplayGeometry) -> Option<Overlay> {
        match self.drag.take() {
            Some(Drag::Drawing) => {
                let mut overlay = self.preview.take()?;
                overlay.p2 = geom.to_norm(point);
                self.overlays.push(overlay);
                self.mode = DrawMode::None;
                Some(overlay)
            }
            _ => None,
        }
    }

    /// 右键: 选中命中的标注 (用于上下文菜单)
    pub fn secondary_click(&mut self, point: (f32, f32), geom: &DisplayGeometry) -> Option<usize> {
        self.selected = self.hit_test(point, geom);
        self.selected
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// 需要绘制的全部形状 (已提交 + 预览)
    pub fn visible(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter().chain(self.preview.iter())
    }
}
