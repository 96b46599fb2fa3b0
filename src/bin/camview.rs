/// USB摄像头实时预览 (macroquad GPU渲染)
///
/// 主程序入口 - 直接运行: cargo run --bin camview --release
///
/// 快捷键:
///   O 打开/关闭   Tab 下一个摄像头   V 下一个分辨率   P 探测分辨率   F5 重新扫描
///   [ ] 亮度   ; ' 对比度   M 镜像   R 旋转   + - 缩放   Z 复位
///   F 自动对焦   , . 手动对焦
///   1 矩形   2 箭头   0 取消   C 换颜色   右键选中标注
///   Delete 删除   K 重新着色   Home 置顶   End 置底   X 清空
///   S 快照   L 日志   Shift/中键拖动 平移
use ::image::{Rgb, RgbImage};
use clap::Parser;
use macroquad::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use usbcam_rs::config::{window_size, Args};
use usbcam_rs::input::backend_for;
use usbcam_rs::overlay::{DrawMode, DEFAULT_COLOR};
use usbcam_rs::renderer::TextLabel;
use usbcam_rs::{Modifiers, Presentation, Viewer, ViewerConfig};

const STATUS_BAR_H: f32 = 24.0;
const LOG_LINES: usize = 12;
const LABEL_FONT_SIZE: f32 = 16.0;

/// 标注颜色轮换
const PALETTE: [[u8; 3]; 6] = [
    [0, 200, 120],
    [255, 64, 64],
    [255, 200, 0],
    [64, 160, 255],
    [255, 255, 255],
    [200, 80, 255],
];

fn window_conf() -> Conf {
    let args = Args::parse();
    let size = window_size(&args);
    Conf {
        window_title: "USB Camera Viewer".to_owned(),
        window_width: size.width as i32,
        window_height: size.height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

/// macroquad 窗口实现的显示层
struct WindowSurface {
    texture: Option<Texture2D>,
    origin: (f32, f32),
    labels: Vec<TextLabel>,
    status: String,
    busy: bool,
}

impl WindowSurface {
    fn new() -> Self {
        Self {
            texture: None,
            origin: (0.0, 0.0),
            labels: Vec::new(),
            status: String::new(),
            busy: false,
        }
    }

    fn draw(&self, log: &[&str]) {
        clear_background(BLACK);

        if let Some(texture) = &self.texture {
            draw_texture_ex(
                texture,
                self.origin.0,
                self.origin.1,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(texture.width(), texture.height())),
                    ..Default::default()
                },
            );
        }

        // HUD文字 (没有TTF字体时用macroquad内置字体)
        for label in &self.labels {
            let [r, g, b] = label.color.0;
            draw_text(
                &label.text,
                self.origin.0 + label.x as f32,
                self.origin.1 + label.y as f32 + LABEL_FONT_SIZE * 0.75,
                LABEL_FONT_SIZE,
                Color::from_rgba(r, g, b, 255),
            );
        }

        // 日志面板
        if !log.is_empty() {
            let h = log.len() as f32 * 18.0 + 8.0;
            let top = screen_height() - STATUS_BAR_H - h;
            draw_rectangle(0.0, top, screen_width(), h, Color::new(0.0, 0.0, 0.0, 0.7));
            for (i, line) in log.iter().enumerate() {
                draw_text(line, 8.0, top + 18.0 * (i as f32 + 1.0), 18.0, LIGHTGRAY);
            }
        }

        // 状态栏
        let bar_y = screen_height() - STATUS_BAR_H;
        draw_rectangle(0.0, bar_y, screen_width(), STATUS_BAR_H, Color::new(0.1, 0.1, 0.1, 1.0));
        draw_text(&self.status, 8.0, bar_y + 17.0, 18.0, WHITE);
        if self.busy {
            // 忙碌指示 (旋转的点)
            let t = get_time() as f32 * 6.0;
            let cx = screen_width() - 16.0;
            let cy = bar_y + STATUS_BAR_H / 2.0;
            draw_circle(cx + t.cos() * 6.0, cy + t.sin() * 6.0, 3.0, YELLOW);
        }
    }
}

impl Presentation for WindowSurface {
    fn label_size(&self) -> (u32, u32) {
        (
            screen_width().max(1.0) as u32,
            (screen_height() - STATUS_BAR_H).max(1.0) as u32,
        )
    }

    fn render_frame(&mut self, image: &RgbImage, origin: (i32, i32)) {
        let (w, h) = image.dimensions();
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for p in image.pixels() {
            rgba.extend_from_slice(&[p.0[0], p.0[1], p.0[2], 255]);
        }

        // 只在尺寸变化时重建纹理, 否则更新像素
        let needs_rebuild = self
            .texture
            .as_ref()
            .map_or(true, |tex| tex.width() != w as f32 || tex.height() != h as f32);
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, &rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes: rgba,
                width: w as u16,
                height: h as u16,
            });
        }
        self.origin = (origin.0 as f32, origin.1 as f32);
    }

    fn render_labels(&mut self, labels: &[TextLabel]) {
        self.labels = labels.to_vec();
    }

    fn set_status_text(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn set_busy_indicator(&mut self, busy: bool) {
        self.busy = busy;
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ViewerConfig::from_args(&args);
    info!("🚀 USB摄像头预览启动");
    info!("📄 配置文件: {}", config.settings_path.display());
    info!("📷 快照目录: {}", config.snapshot_dir.display());

    let backend = match backend_for(args.source, args.test_devices) {
        Ok(backend) => backend,
        Err(e) => {
            error!("❌ {}", e);
            return;
        }
    };
    info!("🎥 帧源: {}", backend.name());

    let mut viewer = match Viewer::new(backend, config) {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("❌ 启动失败: {}", e);
            return;
        }
    };
    let mut surface = WindowSurface::new();
    let mut show_log = false;
    let mut palette_index = 0usize;
    viewer.set_draw_color(DEFAULT_COLOR);
    viewer.rescan();

    prevent_quit();
    loop {
        if is_quit_requested() {
            break;
        }

        handle_keys(&mut viewer, &mut show_log, &mut palette_index);
        handle_pointer(&mut viewer);
        viewer.pump(&mut surface);

        let log = if show_log {
            viewer.log().tail(LOG_LINES)
        } else {
            Vec::new()
        };
        surface.draw(&log);

        next_frame().await;
    }

    viewer.shutdown();
    info!("👋 已退出");
}

fn handle_keys(viewer: &mut Viewer, show_log: &mut bool, palette_index: &mut usize) {
    let profile = *viewer.profile();

    // 设备
    if is_key_pressed(KeyCode::O) {
        viewer.toggle_camera();
    }
    if is_key_pressed(KeyCode::Tab) {
        let count = viewer.devices().len().max(1);
        viewer.select_camera((viewer.selected_camera() + 1) % count);
    }
    if is_key_pressed(KeyCode::V) {
        let known = viewer.known_resolutions().to_vec();
        if !known.is_empty() {
            let next = known
                .iter()
                .position(|r| *r == viewer.resolution())
                .map_or(0, |i| (i + 1) % known.len());
            viewer.select_resolution(known[next]);
        }
    }
    if is_key_pressed(KeyCode::P) {
        viewer.probe_resolutions();
    }
    if is_key_pressed(KeyCode::F5) {
        viewer.rescan();
    }

    // 调整参数
    if is_key_pressed(KeyCode::LeftBracket) {
        viewer.set_brightness(profile.brightness - 5);
    }
    if is_key_pressed(KeyCode::RightBracket) {
        viewer.set_brightness(profile.brightness + 5);
    }
    if is_key_pressed(KeyCode::Semicolon) {
        viewer.set_contrast(profile.contrast - 0.05);
    }
    if is_key_pressed(KeyCode::Apostrophe) {
        viewer.set_contrast(profile.contrast + 0.05);
    }
    if is_key_pressed(KeyCode::M) {
        viewer.set_mirror(!profile.mirror);
    }
    if is_key_pressed(KeyCode::R) {
        viewer.set_rotation(profile.rotation().next());
    }
    if is_key_pressed(KeyCode::Equal) || is_key_pressed(KeyCode::KpAdd) {
        viewer.set_zoom(profile.zoom + 0.1);
    }
    if is_key_pressed(KeyCode::Minus) || is_key_pressed(KeyCode::KpSubtract) {
        viewer.set_zoom(profile.zoom - 0.1);
    }
    if is_key_pressed(KeyCode::Z) {
        viewer.reset_adjustments();
    }

    // 对焦
    if is_key_pressed(KeyCode::F) {
        viewer.set_autofocus(!profile.autofocus);
    }
    if is_key_pressed(KeyCode::Comma) {
        viewer.set_focus(profile.focus_value.saturating_sub(5));
    }
    if is_key_pressed(KeyCode::Period) {
        viewer.set_focus(profile.focus_value.saturating_add(5));
    }

    // 标注
    if is_key_pressed(KeyCode::Key1) {
        viewer.set_draw_mode(DrawMode::Rectangle);
    }
    if is_key_pressed(KeyCode::Key2) {
        viewer.set_draw_mode(DrawMode::Arrow);
    }
    if is_key_pressed(KeyCode::Key0) || is_key_pressed(KeyCode::Escape) {
        viewer.set_draw_mode(DrawMode::None);
    }
    if is_key_pressed(KeyCode::C) {
        *palette_index = (*palette_index + 1) % PALETTE.len();
        viewer.set_draw_color(Rgb(PALETTE[*palette_index]));
    }
    if is_key_pressed(KeyCode::K) {
        viewer.recolor_selected(Rgb(PALETTE[*palette_index]));
    }
    if is_key_pressed(KeyCode::Delete) || is_key_pressed(KeyCode::Backspace) {
        viewer.delete_selected();
    }
    if is_key_pressed(KeyCode::Home) {
        viewer.bring_selected_to_front();
    }
    if is_key_pressed(KeyCode::End) {
        viewer.send_selected_to_back();
    }
    if is_key_pressed(KeyCode::X) {
        viewer.clear_overlays();
    }

    // 其它
    if is_key_pressed(KeyCode::S) {
        // 失败已写入状态栏
        let _ = viewer.snapshot();
    }
    if is_key_pressed(KeyCode::L) {
        *show_log = !*show_log;
    }
}

fn handle_pointer(viewer: &mut Viewer) {
    let point = mouse_position();
    let shift = is_key_down(KeyCode::LeftShift) || is_key_down(KeyCode::RightShift);
    let left = if shift { Modifiers::SHIFT } else { Modifiers::NONE };

    if is_mouse_button_pressed(MouseButton::Left) {
        viewer.pointer_down(point, left);
    }
    if is_mouse_button_pressed(MouseButton::Middle) {
        viewer.pointer_down(point, Modifiers::SHIFT);
    }
    if is_mouse_button_down(MouseButton::Left) || is_mouse_button_down(MouseButton::Middle) {
        viewer.pointer_move(point, left);
    }
    if is_mouse_button_released(MouseButton::Left) {
        viewer.pointer_up(point, left);
    }
    if is_mouse_button_released(MouseButton::Middle) {
        viewer.pointer_up(point, Modifiers::SHIFT);
    }
    if is_mouse_button_pressed(MouseButton::Right) {
        if let Some(index) = viewer.secondary_click(point) {
            info!("🖱️ 选中标注 {} (Delete/K/Home/End)", index);
        }
    }
}
