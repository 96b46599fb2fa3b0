/// 预览控制器 (Viewer)
///
/// 运行在UI线程, 持有全部可变的界面状态:
/// - 当前摄像头的调整参数 (CameraProfile) 与平移
/// - 标注模型与最近一次合成的显示几何
/// - 会话状态镜像 (由后台 worker 的事件更新)
/// - 配置持久化与操作日志
///
/// 设备相关操作全部发给 SessionWorker, 不阻塞UI线程
pub mod presentation;

pub use crate::utils::OperatorLog;
pub use presentation::{Modifiers, Presentation};

use crate::config::ViewerConfig;
use crate::error::{CamError, CamResult};
use crate::input::{
    identity_for, CameraBackend, CameraIdentity, CaptureStats, DeviceInfo, LatestFrame,
    RefreshGate, RefreshRequest, Resolution,
};
use crate::overlay::{DisplayGeometry, DrawMode, OverlayModel};
use crate::pipeline::{self, clamp_pan, Rotation, BRIGHTNESS_RANGE, CONTRAST_RANGE, ZOOM_RANGE};
use crate::renderer::{
    render_snapshot, save_snapshot, Compositor, FocusIndicator, Hud, HudInfo, ImageEncoder,
    JpegEncoder,
};
use crate::session::{
    FocusSettings, OpenRequest, SessionBinding, SessionCommand, SessionConfig, SessionEvent,
    SessionManager, SessionPhase, SessionReport, SessionWorker,
};
use crate::settings::{CameraProfile, Settings};
use crossbeam_channel::Receiver;
use image::Rgb;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct Viewer {
    config: ViewerConfig,
    settings: Settings,

    // 调整参数
    profile: CameraProfile,
    pan: (i32, i32),
    pan_anchor: Option<(f32, f32)>,

    // 标注与显示
    overlays: OverlayModel,
    geometry: Option<DisplayGeometry>,
    compositor: Compositor,
    encoder: Box<dyn ImageEncoder>,
    needs_redraw: bool,

    // 会话
    worker: Option<SessionWorker>,
    mailbox: LatestFrame,
    stats: Arc<CaptureStats>,
    gate: Arc<RefreshGate>,
    refresh_rx: Receiver<RefreshRequest>,
    phase: SessionPhase,
    binding: Option<SessionBinding>,

    // 设备选择
    devices: Vec<DeviceInfo>,
    selected_camera: usize,
    resolution: Resolution,
    known_resolutions: Vec<Resolution>,

    // 忙碌计数与状态栏
    busy: usize,
    busy_shown: bool,
    log: OperatorLog,
    status: Option<String>,
    last_status: String,
}

impl Viewer {
    /// 加载配置并启动会话线程
    pub fn new(backend: Arc<dyn CameraBackend>, config: ViewerConfig) -> CamResult<Self> {
        let settings = Settings::load(&config.settings_path);
        let manager = SessionManager::new(backend, SessionConfig::from(&config));
        let mailbox = manager.mailbox();
        let stats = manager.stats();
        let gate = manager.gate();
        let refresh_rx = manager.refresh_receiver();
        let worker = SessionWorker::spawn(manager).map_err(|e| CamError::DeviceOpen {
            index: 0,
            reason: format!("session worker: {}", e),
        })?;

        let hud = Hud::load(config.font_path.as_deref());
        let compositor = Compositor::new(hud, config.display_thickness);
        let devices = settings.cameras.clone();
        let selected_camera = initial_camera(&settings, &devices);
        let identity = identity_for(&devices, selected_camera);
        let profile = settings.profile_for(&identity).unwrap_or(settings.adjustments);
        let resolution = settings.requested_resolution();
        let known_resolutions = settings.known_resolutions_for(&identity);

        Ok(Self {
            overlays: OverlayModel::new(config.grab_margin),
            config,
            settings,
            profile,
            pan: (0, 0),
            pan_anchor: None,
            geometry: None,
            compositor,
            encoder: Box::new(JpegEncoder::default()),
            needs_redraw: true,
            worker: Some(worker),
            mailbox,
            stats,
            gate,
            refresh_rx,
            phase: SessionPhase::Closed { error: None },
            binding: None,
            devices,
            selected_camera,
            resolution,
            known_resolutions,
            busy: 0,
            busy_shown: false,
            log: OperatorLog::default(),
            status: None,
            last_status: String::new(),
        })
    }

    /// 替换快照编码器
    pub fn set_encoder(&mut self, encoder: Box<dyn ImageEncoder>) {
        self.encoder = encoder;
    }

    // ========== 只读状态 ==========

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn binding(&self) -> Option<&SessionBinding> {
        self.binding.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.binding.is_some()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn profile(&self) -> &CameraProfile {
        &self.profile
    }

    pub fn pan(&self) -> (i32, i32) {
        self.pan
    }

    pub fn overlays(&self) -> &OverlayModel {
        &self.overlays
    }

    pub fn geometry(&self) -> Option<&DisplayGeometry> {
        self.geometry.as_ref()
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn device_labels(&self) -> Vec<String> {
        self.devices.iter().map(DeviceInfo::display_label).collect()
    }

    pub fn selected_camera(&self) -> usize {
        self.selected_camera
    }

    pub fn identity(&self) -> CameraIdentity {
        identity_for(&self.devices, self.selected_camera)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn known_resolutions(&self) -> &[Resolution] {
        &self.known_resolutions
    }

    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    pub fn log(&self) -> &OperatorLog {
        &self.log
    }

    pub fn status_text(&self) -> &str {
        &self.last_status
    }

    pub fn fps(&self) -> f64 {
        self.stats.fps()
    }

    // ========== 主循环 ==========

    /// 处理后台事件与刷新请求, 每个UI帧调用一次
    pub fn pump(&mut self, presentation: &mut dyn Presentation) {
        while let Some(event) = self.worker.as_ref().and_then(SessionWorker::try_recv) {
            self.handle_event(event);
        }

        let mut refresh = self.needs_redraw;
        while self.refresh_rx.try_recv().is_ok() {
            refresh = true;
        }
        if refresh {
            self.refresh(presentation);
        }

        if let Some(status) = self.status.take() {
            presentation.set_status_text(&status);
        }
        let busy = self.is_busy();
        if busy != self.busy_shown {
            self.busy_shown = busy;
            presentation.set_busy_indicator(busy);
        }
    }

    /// 反复 pump 直到没有进行中的后台操作
    pub fn pump_until_idle(
        &mut self,
        presentation: &mut dyn Presentation,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump(presentation);
            if !self.is_busy() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// 取最新帧 → 变换 → 合成 → 显示; 上一次刷新未结束时直接丢弃
    fn refresh(&mut self, presentation: &mut dyn Presentation) {
        let gate = self.gate.clone();
        let Some(_guard) = gate.try_begin() else {
            return;
        };
        self.needs_redraw = false;
        let label = presentation.label_size();

        let composite = match self.mailbox.latest() {
            Some(frame) => {
                let params = self.profile.transform(self.pan);
                let transformed = pipeline::apply(&frame.image, &params);
                self.compositor
                    .compose(&transformed, label, &self.overlays, &self.hud_info())
            }
            None if self.binding.is_some() => self.compositor.placeholder(label),
            None => return,
        };

        self.geometry = Some(composite.geometry);
        presentation.render_frame(
            &composite.image,
            (composite.geometry.origin_x, composite.geometry.origin_y),
        );
        presentation.render_labels(&composite.labels);
    }

    fn hud_info(&self) -> HudInfo {
        let focus = match &self.binding {
            Some(b) if b.focus_supported && self.profile.autofocus => {
                FocusIndicator::Auto(self.stats.focus_readback())
            }
            Some(b) if b.focus_supported => FocusIndicator::Manual(self.profile.focus_value),
            _ => FocusIndicator::Hidden,
        };
        HudInfo {
            zoom: self.profile.zoom,
            resolution: self.resolution,
            fps: self.stats.fps(),
            focus,
        }
    }

    // ========== 后台事件 ==========

    fn handle_event(&mut self, event: SessionEvent) {
        debug!("会话事件: {:?}", event);
        match event {
            SessionEvent::Opened(report) | SessionEvent::ResolutionChanged(report) => {
                self.busy_end();
                self.apply_report(report);
            }
            SessionEvent::Closed { status } => {
                self.busy_end();
                self.binding = None;
                self.phase = SessionPhase::Closed { error: None };
                self.needs_redraw = true;
                self.set_status(&status);
            }
            SessionEvent::Failed {
                status,
                phase,
                binding,
            } => {
                self.busy_end();
                self.phase = phase;
                self.binding = binding;
                self.needs_redraw = true;
                self.set_status(&status);
            }
            SessionEvent::Focus { notes } => {
                for note in notes {
                    self.set_status(&note);
                }
            }
            SessionEvent::Probed {
                identity,
                resolutions,
            } => {
                self.busy_end();
                self.apply_probe(identity, resolutions);
            }
            SessionEvent::Scanned(devices) => {
                self.busy_end();
                self.apply_scan(devices);
            }
        }
    }

    fn apply_report(&mut self, report: SessionReport) {
        let SessionReport {
            binding,
            status,
            notes,
        } = report;
        let identity = binding.identity.clone();
        self.settings.remember_camera(binding.camera_index, &identity);
        self.phase = SessionPhase::Open;
        self.binding = Some(binding);
        self.pan = self.clamped_pan(self.pan);
        self.needs_redraw = true;
        for note in notes {
            self.log.push(&note);
        }
        self.set_status(&status);
        self.save_settings();
    }

    fn apply_probe(&mut self, identity: CameraIdentity, mut resolutions: Vec<Resolution>) {
        if resolutions.is_empty() {
            // 探测不到时保留当前请求的分辨率
            resolutions.push(self.resolution);
            self.set_status("No resolutions detected; keeping the current size.");
        } else {
            self.set_status(&format!(
                "Found {} supported resolution(s) for {}.",
                resolutions.len(),
                identity
            ));
        }
        self.settings.set_known_resolutions(&identity, &resolutions);
        if identity == self.identity() {
            self.known_resolutions = resolutions;
        }
        self.save_settings();
    }

    /// 扫描结果: 优先按 uid 重新定位之前选中的摄像头
    fn apply_scan(&mut self, devices: Vec<DeviceInfo>) {
        let previous = self.identity();
        self.settings.cameras = devices.clone();
        self.devices = devices;

        let by_uid = self
            .devices
            .iter()
            .find(|d| d.identity() == previous)
            .map(|d| d.index);
        let index = by_uid
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.index == self.selected_camera)
                    .map(|d| d.index)
            })
            .or_else(|| self.devices.first().map(|d| d.index))
            .unwrap_or(0);
        self.selected_camera = index;

        let identity = self.identity();
        if let Some(profile) = self.settings.profile_for(&identity) {
            self.profile = profile;
        }
        self.known_resolutions = self.settings.known_resolutions_for(&identity);
        self.set_status(&format!("Found {} camera(s).", self.devices.len()));
        self.save_settings();
    }

    // ========== 设备操作 ==========

    fn send(&mut self, cmd: SessionCommand, busy: bool) {
        let sent = self.worker.as_ref().map_or(false, |w| w.send(cmd));
        if !sent {
            warn!("❌ 会话线程不可用");
            self.set_status("Camera worker is not running.");
            return;
        }
        if busy {
            self.busy += 1;
        }
    }

    fn busy_end(&mut self) {
        self.busy = self.busy.saturating_sub(1);
    }

    fn open_request(&self) -> OpenRequest {
        OpenRequest {
            index: self.selected_camera,
            identity: self.identity(),
            resolution: self.resolution,
            focus: self.focus_settings(),
        }
    }

    fn focus_settings(&self) -> FocusSettings {
        FocusSettings {
            autofocus: self.profile.autofocus,
            focus_value: self.profile.focus_value,
        }
    }

    pub fn open_camera(&mut self) {
        if self.is_open() {
            self.set_status("Camera already open.");
            return;
        }
        self.set_status(&format!(
            "Opening camera {} at {}...",
            self.selected_camera, self.resolution
        ));
        self.phase = SessionPhase::Opening;
        let req = self.open_request();
        self.send(SessionCommand::Open(req), true);
    }

    pub fn close_camera(&mut self) {
        self.send(SessionCommand::Close, true);
    }

    pub fn toggle_camera(&mut self) {
        if self.is_open() {
            self.close_camera();
        } else {
            self.open_camera();
        }
    }

    /// 选择摄像头: 载入其已保存的调整参数与分辨率列表, 已打开时切换过去
    pub fn select_camera(&mut self, index: usize) {
        self.selected_camera = index;
        let identity = self.identity();
        self.known_resolutions = self.settings.known_resolutions_for(&identity);
        if let Some(profile) = self.settings.profile_for(&identity) {
            self.profile = profile;
            self.pan = (0, 0);
        }
        self.settings.remember_camera(index, &identity);
        self.save_settings();
        self.needs_redraw = true;

        let switching = self
            .binding
            .as_ref()
            .map_or(false, |b| b.camera_index != index);
        if switching {
            self.phase = SessionPhase::Switching;
            let req = self.open_request();
            self.send(SessionCommand::SwitchCamera(req), true);
        }
    }

    /// 选择分辨率: 已打开时在线应用, 否则只记录
    pub fn select_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
        self.settings.set_resolution(resolution);
        self.save_settings();
        if self.is_open() {
            self.send(SessionCommand::ChangeResolution(resolution), true);
        } else {
            self.set_status(&format!("Resolution set to {}.", resolution));
        }
    }

    pub fn probe_resolutions(&mut self) {
        self.set_status(&format!(
            "Probing resolutions for camera {}...",
            self.selected_camera
        ));
        let cmd = SessionCommand::ProbeResolutions {
            index: self.selected_camera,
            identity: self.identity(),
        };
        self.send(cmd, true);
    }

    pub fn rescan(&mut self) {
        self.set_status("Scanning cameras...");
        self.send(SessionCommand::Scan, true);
    }

    // ========== 调整参数 ==========

    pub fn set_brightness(&mut self, value: i32) {
        self.profile.brightness = value.clamp(BRIGHTNESS_RANGE.0, BRIGHTNESS_RANGE.1);
        self.profile_changed();
    }

    pub fn set_contrast(&mut self, value: f64) {
        self.profile.contrast = value.clamp(CONTRAST_RANGE.0, CONTRAST_RANGE.1);
        self.profile_changed();
    }

    pub fn set_mirror(&mut self, on: bool) {
        self.profile.mirror = on;
        self.profile_changed();
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.profile.rotate = rotation.degrees();
        self.pan = self.clamped_pan(self.pan);
        self.profile_changed();
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.profile.zoom = zoom.clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);
        self.pan = self.clamped_pan(self.pan);
        self.profile_changed();
    }

    pub fn set_autofocus(&mut self, on: bool) {
        self.profile.autofocus = on;
        self.profile_changed();
        if self.is_open() {
            self.send(SessionCommand::SetAutofocus(on), false);
        }
    }

    pub fn set_focus(&mut self, value: u8) {
        self.profile.focus_value = value;
        self.profile_changed();
        if self.is_open() {
            self.send(SessionCommand::SetFocus(value), false);
        }
    }

    /// 亮度/对比度/镜像/旋转/缩放/平移复位, 对焦设置保留
    pub fn reset_adjustments(&mut self) {
        self.profile = CameraProfile {
            autofocus: self.profile.autofocus,
            focus_value: self.profile.focus_value,
            ..CameraProfile::default()
        };
        self.pan = (0, 0);
        self.profile_changed();
        self.set_status("Adjustments reset.");
    }

    fn profile_changed(&mut self) {
        let identity = self.identity();
        self.settings.store_profile(&identity, self.profile);
        self.save_settings();
        self.needs_redraw = true;
    }

    fn save_settings(&mut self) {
        if let Err(e) = self.settings.save(&self.config.settings_path) {
            warn!("⚠️ 保存配置失败: {}", e);
        }
    }

    /// 按当前帧 (旋转后) 尺寸限制平移
    fn clamped_pan(&self, pan: (i32, i32)) -> (i32, i32) {
        let Some(frame) = self.mailbox.latest() else {
            return pan;
        };
        let params = self.profile.transform(pan);
        let (w, h) = params.output_size(frame.width(), frame.height());
        clamp_pan(w, h, self.profile.zoom, pan)
    }

    // ========== 指针交互 ==========

    pub fn pointer_down(&mut self, point: (f32, f32), modifiers: Modifiers) {
        if modifiers.shift {
            if self.profile.zoom > 1.0 {
                self.pan_anchor = Some(point);
            }
            return;
        }
        let Some(geom) = self.geometry else {
            return;
        };
        let drawing = self.overlays.mode() != DrawMode::None;
        if self.overlays.pointer_down(point, &geom) {
            self.needs_redraw = true;
            match self.overlays.selected() {
                Some(index) if !drawing => self.set_status(&format!("Selected overlay {}", index)),
                _ => {}
            }
        }
    }

    pub fn pointer_move(&mut self, point: (f32, f32), _modifiers: Modifiers) {
        if let Some(anchor) = self.pan_anchor {
            // 拖动方向取反: 画面跟着指针走
            let dx = (point.0 - anchor.0).round() as i32;
            let dy = (point.1 - anchor.1).round() as i32;
            self.pan_anchor = Some(point);
            self.pan = self.clamped_pan((self.pan.0 - dx, self.pan.1 - dy));
            self.needs_redraw = true;
            return;
        }
        let Some(geom) = self.geometry else {
            return;
        };
        if self.overlays.pointer_move(point, &geom) {
            self.needs_redraw = true;
        }
    }

    pub fn pointer_up(&mut self, point: (f32, f32), _modifiers: Modifiers) {
        if self.pan_anchor.take().is_some() {
            return;
        }
        let Some(geom) = self.geometry else {
            return;
        };
        if let Some(overlay) = self.overlays.pointer_up(point, &geom) {
            self.set_status(&format!("Added {}", overlay.kind.label()));
            self.needs_redraw = true;
        }
    }

    /// 右键命中标注时返回其序号, 由显示层弹出菜单
    pub fn secondary_click(&mut self, point: (f32, f32)) -> Option<usize> {
        let geom = self.geometry?;
        self.overlays.secondary_click(point, &geom)
    }

    // ========== 标注操作 ==========

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.overlays.set_mode(mode);
    }

    pub fn set_draw_color(&mut self, color: Rgb<u8>) {
        self.overlays.set_color(color);
    }

    pub fn delete_selected(&mut self) -> bool {
        let Some(index) = self.overlays.selected() else {
            return false;
        };
        self.needs_redraw = true;
        self.overlays.delete(index).is_some()
    }

    pub fn recolor_selected(&mut self, color: Rgb<u8>) -> bool {
        let Some(index) = self.overlays.selected() else {
            return false;
        };
        self.needs_redraw = true;
        self.overlays.recolor(index, color)
    }

    pub fn bring_selected_to_front(&mut self) -> bool {
        let Some(index) = self.overlays.selected() else {
            return false;
        };
        self.needs_redraw = true;
        self.overlays.bring_to_front(index)
    }

    pub fn send_selected_to_back(&mut self) -> bool {
        let Some(index) = self.overlays.selected() else {
            return false;
        };
        self.needs_redraw = true;
        self.overlays.send_to_back(index)
    }

    pub fn clear_overlays(&mut self) {
        self.overlays.clear();
        self.needs_redraw = true;
        self.set_status("Overlays cleared.");
    }

    // ========== 快照 ==========

    /// 以采集分辨率保存当前画面 (含标注), 之后重新下发对焦设置
    pub fn snapshot(&mut self) -> CamResult<PathBuf> {
        let Some(binding) = self.binding.clone() else {
            self.set_status("No camera open.");
            return Err(CamError::NotOpen);
        };
        let Some(frame) = self.mailbox.latest() else {
            self.set_status("No frame available for snapshot.");
            return Err(CamError::Snapshot("no frame available".to_string()));
        };

        let image = render_snapshot(
            &frame.image,
            &self.profile.transform(self.pan),
            self.overlays.overlays(),
            self.config.snapshot_thickness,
        );
        let result = save_snapshot(
            self.encoder.as_ref(),
            &self.config.snapshot_dir,
            &crate::gen_time_string(),
            &image,
        );
        match &result {
            Ok(path) => self.set_status(&format!("Snapshot saved: {}", path.display())),
            Err(e) => {
                warn!("❌ {}", e);
                self.set_status("Failed to save snapshot.");
            }
        }

        if binding.focus_supported {
            let focus = self.focus_settings();
            self.send(SessionCommand::ApplyFocus(focus), false);
        }
        result
    }

    // ========== 状态栏 ==========

    fn set_status(&mut self, text: &str) {
        self.log.push(text);
        self.last_status = text.to_string();
        self.status = Some(text.to_string());
    }

    /// 保存配置, 关闭摄像头并等待会话线程退出
    pub fn shutdown(&mut self) {
        self.save_settings();
        if let Some(worker) = self.worker.take() {
            let timeout = self.config.close_join_timeout + Duration::from_secs(1);
            if !worker.shutdown(timeout) {
                warn!("⚠️ 会话线程未及时退出");
            }
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 启动时选中的摄像头: uid 匹配优先, 其次上次的序号
fn initial_camera(settings: &Settings, devices: &[DeviceInfo]) -> usize {
    settings
        .camera_uid
        .as_deref()
        .and_then(|uid| devices.iter().find(|d| d.identity().as_str() == uid))
        .map(|d| d.index)
        .or(settings.camera_index)
        .unwrap_or(0)
}
