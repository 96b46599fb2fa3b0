//! 控制器场景: 配置重载后自动应用摄像头参数 / 快照按采集分辨率烧入标注

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use usbcam_rs::input::{CameraIdentity, Resolution, TestDevice, TestPatternBackend};
use usbcam_rs::overlay::DrawMode;
use usbcam_rs::renderer::ImageEncoder;
use usbcam_rs::settings::{CameraProfile, Settings};
use usbcam_rs::{CamResult, Modifiers, Presentation, Viewer, ViewerConfig};

const WAIT: Duration = Duration::from_secs(5);

struct Surface {
    label: (u32, u32),
    frames: usize,
    status: Vec<String>,
}

impl Surface {
    fn new(label: (u32, u32)) -> Self {
        Self {
            label,
            frames: 0,
            status: Vec::new(),
        }
    }
}

impl Presentation for Surface {
    fn label_size(&self) -> (u32, u32) {
        self.label
    }
    fn render_frame(&mut self, _image: &RgbImage, _origin: (i32, i32)) {
        self.frames += 1;
    }
    fn set_status_text(&mut self, text: &str) {
        self.status.push(text.to_string());
    }
    fn set_busy_indicator(&mut self, _busy: bool) {}
}

/// 只记录收到的图像, 不写文件
#[derive(Clone, Default)]
struct RecordingEncoder {
    images: Arc<Mutex<Vec<RgbImage>>>,
}

impl ImageEncoder for RecordingEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }
    fn encode(&self, image: &RgbImage, _path: &Path) -> CamResult<()> {
        self.images.lock().unwrap().push(image.clone());
        Ok(())
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("usbcam-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 等到真实帧 (而不是占位图) 合成出指定显示尺寸
fn wait_for_display(viewer: &mut Viewer, surface: &mut Surface, size: (u32, u32)) {
    let deadline = Instant::now() + WAIT;
    let shown = |v: &Viewer| v.geometry().map(|g| (g.disp_w, g.disp_h)) == Some(size);
    while !(surface.frames > 0 && shown(viewer)) && Instant::now() < deadline {
        viewer.pump(surface);
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn stored_profile_is_applied_after_reload() {
    let dir = temp_dir("profile");
    let path = dir.join("settings.json");

    let mut settings = Settings::default();
    settings.store_profile(
        &CameraIdentity::from_index(0),
        CameraProfile {
            brightness: 20,
            ..CameraProfile::default()
        },
    );
    // 顶层字段保持默认, 确认是按摄像头取值
    settings.adjustments = CameraProfile::default();
    settings.camera_index = Some(1);
    settings.save(&path).unwrap();

    let reloaded = Settings::load(&path);
    assert_eq!(
        reloaded
            .profile_for(&CameraIdentity::from_index(0))
            .map(|p| p.brightness),
        Some(20)
    );

    let backend = Arc::new(TestPatternBackend::with_count(2));
    let mut viewer = Viewer::new(backend, ViewerConfig::fast(path)).unwrap();
    assert_eq!(viewer.selected_camera(), 1);
    assert_eq!(viewer.profile().brightness, 0);
    viewer.select_camera(0);
    assert_eq!(viewer.profile().brightness, 20);
    viewer.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn snapshot_burns_overlays_at_capture_resolution() {
    let dir = temp_dir("snapshot");
    let mut config = ViewerConfig::fast(dir.join("settings.json"));
    config.snapshot_dir = dir.join("shots");
    let backend = Arc::new(TestPatternBackend::new(vec![TestDevice::new("HD")]));
    let mut viewer = Viewer::new(backend, config).unwrap();
    let encoder = RecordingEncoder::default();
    viewer.set_encoder(Box::new(encoder.clone()));

    // 1280x720 显示在 640x480 标签里: 640x360, 原点 (0, 60)
    viewer.select_resolution(Resolution::new(1280, 720));
    viewer.set_draw_color(Rgb([255, 0, 0]));
    let mut surface = Surface::new((640, 480));
    viewer.open_camera();
    assert!(viewer.pump_until_idle(&mut surface, WAIT));
    assert_eq!(
        viewer.binding().map(|b| b.actual),
        Some(Resolution::new(1280, 720))
    );
    wait_for_display(&mut viewer, &mut surface, (640, 360));
    let geom = *viewer.geometry().unwrap();
    assert_eq!((geom.disp_w, geom.disp_h), (640, 360));
    assert_eq!((geom.origin_x, geom.origin_y), (0, 60));

    // 从显示区域 (160,150) 拖到 (480,330): 归一化 (0.25,0.25)-(0.75,0.75)
    viewer.set_draw_mode(DrawMode::Rectangle);
    viewer.pointer_down((160.0, 150.0), Modifiers::NONE);
    viewer.pointer_move((480.0, 330.0), Modifiers::NONE);
    viewer.pointer_up((480.0, 330.0), Modifiers::NONE);
    assert_eq!(viewer.overlays().len(), 1);

    let path = viewer.snapshot().unwrap();
    assert!(path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with("snapshot_") && n.ends_with(".png")));

    let images = encoder.images.lock().unwrap();
    let image = &images[0];
    assert_eq!(image.dimensions(), (1280, 720));
    // 左边框在 x=320, 线宽3
    assert_eq!(image.get_pixel(320, 360), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(321, 360), &Rgb([255, 0, 0]));
    drop(images);
    viewer.pump(&mut surface);
    assert!(surface
        .status
        .last()
        .map_or(false, |s| s.starts_with("Snapshot saved:")));

    viewer.close_camera();
    assert!(viewer.pump_until_idle(&mut surface, WAIT));
    assert!(!viewer.is_open());
    viewer.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupt_settings_fall_back_to_defaults() {
    let dir = temp_dir("corrupt");
    let path = dir.join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    let backend = Arc::new(TestPatternBackend::with_count(1));
    let mut viewer = Viewer::new(backend, ViewerConfig::fast(path.clone())).unwrap();
    assert_eq!(viewer.profile(), &CameraProfile::default());
    assert_eq!(viewer.resolution(), Resolution::new(640, 480));

    // 下一次保存覆盖损坏的文件
    viewer.set_mirror(true);
    let reloaded = Settings::load(&path);
    assert!(reloaded.adjustments.mirror);
    viewer.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}
