//! 会话场景: 分辨率不匹配 / 切换失败恢复 / 采集线程刷新节流

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use usbcam_rs::input::{
    CameraIdentity, Resolution, TestDevice, TestPatternBackend, DEFAULT_RESOLUTION,
};
use usbcam_rs::session::{FocusSettings, OpenRequest, SessionConfig, SessionManager, SessionPhase};
use usbcam_rs::CamError;

fn config() -> SessionConfig {
    SessionConfig {
        refresh_interval: Duration::from_millis(10),
        read_retry_delay: Duration::from_millis(1),
        open_settle: Duration::from_millis(1),
        reopen_settle: Duration::from_millis(1),
        live_resize_settle: Duration::from_millis(1),
        ..SessionConfig::default()
    }
}

fn request(index: usize, resolution: Resolution) -> OpenRequest {
    OpenRequest {
        index,
        identity: CameraIdentity::from_index(index),
        resolution,
        focus: FocusSettings::default(),
    }
}

#[test]
fn requested_720p_on_vga_only_device_records_actual_size() {
    let backend = Arc::new(TestPatternBackend::new(vec![TestDevice::new("VGA cam")
        .with_supported(&[DEFAULT_RESOLUTION])
        .with_live_resize(false)]));
    let mut manager = SessionManager::new(backend, config());

    let report = manager.open(request(0, Resolution::new(1280, 720))).unwrap();
    assert!(manager.phase().is_open());
    assert_eq!(report.binding.requested, Resolution::new(1280, 720));
    assert_eq!(report.binding.actual, Resolution::new(640, 480));
    assert!(report.status.contains("640x480"));
    assert!(report.status.contains("requested 1280x720"));

    // 帧确实按实际分辨率到达
    let mailbox = manager.mailbox();
    let deadline = Instant::now() + Duration::from_secs(5);
    while mailbox.is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    let frame = mailbox.latest().expect("capture produced a frame");
    assert_eq!(frame.resolution(), Resolution::new(640, 480));
    manager.close();
}

#[test]
fn failed_switch_keeps_previous_session() {
    let backend = Arc::new(TestPatternBackend::new(vec![
        TestDevice::new("Only"),
        TestDevice::new("Gone").unavailable(),
    ]));
    let mut manager = SessionManager::new(backend, config());
    manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();

    // 切到不可用设备失败后恢复到原设备
    let err = manager.switch_camera(request(1, DEFAULT_RESOLUTION)).unwrap_err();
    assert!(matches!(err, CamError::ReopenFailed { .. }));
    assert_eq!(manager.phase(), &SessionPhase::Open);

    // 不存在的设备: 打开失败, 原会话仍在
    let err = manager.switch_camera(request(9, DEFAULT_RESOLUTION)).unwrap_err();
    assert!(matches!(err, CamError::ReopenFailed { index: 9, .. }));
    assert_eq!(manager.binding().map(|b| b.camera_index), Some(0));
}

#[test]
fn refresh_requests_are_capped_while_frames_keep_flowing() {
    let backend = Arc::new(TestPatternBackend::new(vec![TestDevice::new("Fast").with_fps(200.0)]));
    let mut cfg = config();
    cfg.refresh_interval = Duration::from_millis(50);
    let mut manager = SessionManager::new(backend, cfg);
    let refresh_rx = manager.refresh_receiver();
    let stats = manager.stats();

    manager.open(request(0, Resolution::new(320, 240))).unwrap();
    let started = Instant::now();
    let mut refreshes = 0;
    while started.elapsed() < Duration::from_millis(500) {
        if refresh_rx.recv_timeout(Duration::from_millis(10)).is_ok() {
            refreshes += 1;
        }
    }
    let frames = stats.frames();
    manager.close();

    // 500ms 内最多约 10 次刷新, 但帧数远多于刷新数
    assert!(refreshes >= 2, "refreshes = {}", refreshes);
    assert!(refreshes <= 12, "refreshes = {}", refreshes);
    assert!(frames > refreshes as u64, "frames = {}", frames);
}
