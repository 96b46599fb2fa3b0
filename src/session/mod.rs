// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 摄像头会话管理 (Session Manager)
///
/// 状态机: Closed → Opening → Open → Switching → Open | Closed(error)
/// - 打开/关闭/切换摄像头/切换分辨率
/// - 对焦能力探测与对焦参数下发
/// - 采集线程的启动与有界等待停止
///
/// 所有方法都可能阻塞数百毫秒, 只在后台 worker 线程调用
pub mod worker;

pub use worker::{SessionCommand, SessionEvent, SessionWorker};

use crate::config::ViewerConfig;
use crate::error::{CamError, CamResult};
use crate::input::{
    fourcc, lock_source, probe_resolutions, release_detached, scan_devices, share_source,
    CameraBackend,
    CameraIdentity, CaptureContext, CaptureLoop, CaptureStats, Clock, DeviceInfo, FrameProperty,
    FrameSource, LatestFrame, PropertyStatus, RefreshGate, RefreshRequest, Resolution,
    SharedSource, SystemClock,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

// ========== 配置 ==========

/// 会话时序参数
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub refresh_interval: Duration,
    pub read_retry_delay: Duration,
    pub close_join_timeout: Duration,
    pub switch_join_timeout: Duration,
    pub open_settle: Duration,
    pub reopen_settle: Duration,
    pub live_resize_settle: Duration,
    pub max_reopen_attempts: u32,
}

impl From<&ViewerConfig> for SessionConfig {
    fn from(c: &ViewerConfig) -> Self {
        Self {
            refresh_interval: c.refresh_interval,
            read_retry_delay: c.read_retry_delay,
            close_join_timeout: c.close_join_timeout,
            switch_join_timeout: c.switch_join_timeout,
            open_settle: c.open_settle,
            reopen_settle: c.reopen_settle,
            live_resize_settle: c.live_resize_settle,
            max_reopen_attempts: c.max_reopen_attempts.max(1),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

// ========== 状态 ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Closed { error: Option<String> },
    Opening,
    Open,
    Switching,
}

impl SessionPhase {
    pub fn is_open(&self) -> bool {
        matches!(self, SessionPhase::Open)
    }
}

/// 当前打开的会话
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBinding {
    pub camera_index: usize,
    pub identity: CameraIdentity,
    pub requested: Resolution,
    pub actual: Resolution,
    pub focus_supported: bool,
}

impl SessionBinding {
    pub fn resolution_mismatch(&self) -> bool {
        self.requested != self.actual
    }
}

/// 对焦设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusSettings {
    pub autofocus: bool,
    pub focus_value: u8,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            autofocus: true,
            focus_value: 0,
        }
    }
}

/// 打开请求
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub index: usize,
    pub identity: CameraIdentity,
    pub resolution: Resolution,
    pub focus: FocusSettings,
}

/// 操作结果: 会话信息 + 状态栏文字 + 附加提示
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub binding: SessionBinding,
    pub status: String,
    pub notes: Vec<String>,
}

struct ActiveSession {
    source: SharedSource,
    capture: Option<CaptureLoop>,
}

/// 已获取但尚未启动采集的句柄
struct Acquired {
    source: Box<dyn FrameSource>,
    actual: Resolution,
    notes: Vec<String>,
}

// ========== 会话管理器 ==========

pub struct SessionManager {
    backend: Arc<dyn CameraBackend>,
    config: SessionConfig,
    phase: SessionPhase,
    binding: Option<SessionBinding>,
    active: Option<ActiveSession>,
    focus: FocusSettings,
    mailbox: LatestFrame,
    stats: Arc<CaptureStats>,
    gate: Arc<RefreshGate>,
    refresh_tx: Sender<RefreshRequest>,
    refresh_rx: Receiver<RefreshRequest>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn CameraBackend>, config: SessionConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn CameraBackend>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // 容量1: 最多一个待处理刷新
        let (refresh_tx, refresh_rx) = bounded(1);
        Self {
            backend,
            config,
            phase: SessionPhase::Closed { error: None },
            binding: None,
            active: None,
            focus: FocusSettings::default(),
            mailbox: LatestFrame::new(),
            stats: Arc::new(CaptureStats::default()),
            gate: Arc::new(RefreshGate::new()),
            refresh_tx,
            refresh_rx,
            clock,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn binding(&self) -> Option<&SessionBinding> {
        self.binding.as_ref()
    }

    pub fn mailbox(&self) -> LatestFrame {
        self.mailbox.clone()
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    pub fn gate(&self) -> Arc<RefreshGate> {
        self.gate.clone()
    }

    pub fn refresh_receiver(&self) -> Receiver<RefreshRequest> {
        self.refresh_rx.clone()
    }

    pub fn focus(&self) -> FocusSettings {
        self.focus
    }

    fn capture_context(&self) -> CaptureContext {
        CaptureContext {
            mailbox: self.mailbox.clone(),
            stats: self.stats.clone(),
            gate: self.gate.clone(),
            refresh_tx: self.refresh_tx.clone(),
            clock: self.clock.clone(),
            refresh_interval: self.config.refresh_interval,
            read_retry_delay: self.config.read_retry_delay,
        }
    }

    // ========== 打开 / 关闭 ==========

    /// Closed → Opening → Open, 失败回到 Closed (不重试)
    pub fn open(&mut self, req: OpenRequest) -> CamResult<SessionReport> {
        if self.active.is_some() {
            return self.switch_camera(req);
        }
        info!("🎥 打开摄像头 {} @ {}", req.index, req.resolution);
        self.phase = SessionPhase::Opening;
        self.focus = req.focus;

        match self.acquire(req.index, req.resolution, self.config.open_settle) {
            Ok(acquired) => self.start(&req, acquired),
            Err(e) => {
                warn!("❌ 打开摄像头失败: {}", e);
                self.phase = SessionPhase::Closed {
                    error: Some(e.to_string()),
                };
                Err(e)
            }
        }
    }

    /// Open → Closed
    pub fn close(&mut self) -> String {
        if self.active.is_none() {
            self.phase = SessionPhase::Closed { error: None };
            return "Camera is not open.".to_string();
        }
        self.teardown(self.config.close_join_timeout);
        self.binding = None;
        self.phase = SessionPhase::Closed { error: None };
        info!("🛑 摄像头已关闭");
        "Camera closed.".to_string()
    }

    /// 停止采集线程 (有界等待) 并释放句柄
    fn teardown(&mut self, join_timeout: Duration) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        self.stats.set_poll_focus(false);
        let stopped = active
            .capture
            .take()
            .map_or(true, |capture| capture.stop(join_timeout));
        if stopped {
            lock_source(&active.source).release();
        } else {
            // 不等卡住的读帧返回
            warn!("⚠️ 采集线程未及时退出, 直接释放设备");
            release_detached(active.source);
        }
        self.mailbox.clear();
        self.stats.reset();
    }

    /// 打开设备, 请求分辨率, 下发提示参数, 校验 isOpened, 读回实际分辨率
    fn acquire(&self, index: usize, resolution: Resolution, settle: Duration) -> CamResult<Acquired> {
        let mut source = self.backend.open(index, resolution)?;
        let mut notes = Vec::new();

        source.set_property(FrameProperty::Width, resolution.width as f64);
        source.set_property(FrameProperty::Height, resolution.height as f64);
        for (prop, value) in [
            (FrameProperty::Fourcc, fourcc(b"MJPG")),
            (FrameProperty::BufferDepth, 1.0),
            (FrameProperty::FpsHint, 30.0),
        ] {
            match source.set_property(prop, value) {
                PropertyStatus::Supported(_) => {}
                PropertyStatus::Unsupported => debug!("属性 {} 不受支持", prop.name()),
                PropertyStatus::Failed(reason) => {
                    notes.push(format!("Could not set {}: {}", prop.name(), reason))
                }
            }
        }

        thread::sleep(settle);
        if !source.is_opened() {
            source.release();
            return Err(CamError::DeviceOpen {
                index,
                reason: "device did not report opened".to_string(),
            });
        }

        let actual = source.resolution().unwrap_or(resolution);
        Ok(Acquired {
            source,
            actual,
            notes,
        })
    }

    /// Opening/Switching → Open: 启动采集线程, 探测对焦, 下发对焦设置
    fn start(&mut self, req: &OpenRequest, acquired: Acquired) -> CamResult<SessionReport> {
        let Acquired {
            source,
            actual,
            mut notes,
        } = acquired;
        let shared = share_source(source);

        let capture = match CaptureLoop::spawn(shared.clone(), self.capture_context()) {
            Ok(capture) => capture,
            Err(e) => {
                lock_source(&shared).release();
                let err = CamError::DeviceOpen {
                    index: req.index,
                    reason: format!("capture thread: {}", e),
                };
                self.binding = None;
                self.phase = SessionPhase::Closed {
                    error: Some(err.to_string()),
                };
                return Err(err);
            }
        };

        let focus_supported = probe_focus(&shared);
        self.active = Some(ActiveSession {
            source: shared,
            capture: Some(capture),
        });

        let binding = SessionBinding {
            camera_index: req.index,
            identity: req.identity.clone(),
            requested: req.resolution,
            actual,
            focus_supported,
        };
        self.binding = Some(binding.clone());
        self.phase = SessionPhase::Open;

        if focus_supported {
            notes.extend(self.push_focus());
        } else {
            notes.push("Auto-focus not supported by this camera.".to_string());
        }

        let status = if binding.resolution_mismatch() {
            warn!(
                "⚠️ 请求分辨率 {} 但设备实际为 {}",
                binding.requested, binding.actual
            );
            format!(
                "Camera {} opened at {} (requested {}).",
                req.index, binding.actual, binding.requested
            )
        } else {
            format!("Camera {} opened at {}.", req.index, binding.actual)
        };
        info!("✅ {}", status);

        Ok(SessionReport {
            binding,
            status,
            notes,
        })
    }

    // ========== 切换 ==========

    /// Open → Switching → Open: 停止旧采集, 释放旧句柄, 打开新设备
    pub fn switch_camera(&mut self, req: OpenRequest) -> CamResult<SessionReport> {
        let Some(previous) = self.binding.clone() else {
            self.teardown(self.config.close_join_timeout);
            return self.open(req);
        };
        info!("🔄 切换摄像头 {} → {}", previous.camera_index, req.index);
        self.phase = SessionPhase::Switching;
        self.focus = req.focus;
        self.teardown(self.config.switch_join_timeout);

        match self.acquire(req.index, req.resolution, self.config.reopen_settle) {
            Ok(acquired) => self.start(&req, acquired),
            Err(e) => {
                let err = CamError::ReopenFailed {
                    index: req.index,
                    width: req.resolution.width,
                    height: req.resolution.height,
                    reason: e.to_string(),
                };
                self.restore(previous, err)
            }
        }
    }

    /// 切换分辨率: 先尝试在线设置, 设备不认时有限次重开
    pub fn change_resolution(&mut self, resolution: Resolution) -> CamResult<SessionReport> {
        let previous = self.binding.clone().ok_or(CamError::NotOpen)?;
        if let Some(report) = self.try_live_resize(&previous, resolution) {
            return Ok(report);
        }

        info!("🔄 在线设置未生效, 重开设备 @ {}", resolution);
        self.phase = SessionPhase::Switching;
        self.teardown(self.config.switch_join_timeout);

        let req = OpenRequest {
            index: previous.camera_index,
            identity: previous.identity.clone(),
            resolution,
            focus: self.focus,
        };
        let attempts = self.config.max_reopen_attempts.max(1);
        let mut last_error = String::from("device did not honor the requested size");

        for attempt in 1..=attempts {
            match self.acquire(req.index, resolution, self.config.reopen_settle) {
                Ok(acquired) if acquired.actual == resolution || attempt == attempts => {
                    // 最后一次仍不匹配时接受实际分辨率
                    let mut report = self.start(&req, acquired)?;
                    if report.binding.resolution_mismatch() {
                        report.notes.push(format!(
                            "Device kept {} after {} attempts.",
                            report.binding.actual, attempts
                        ));
                    }
                    return Ok(report);
                }
                Ok(mut acquired) => {
                    debug!(
                        "第{}次重开得到 {}, 期望 {}",
                        attempt, acquired.actual, resolution
                    );
                    acquired.source.release();
                    thread::sleep(self.config.reopen_settle);
                }
                Err(e) => {
                    warn!("⚠️ 第{}次重开失败: {}", attempt, e);
                    last_error = e.to_string();
                    thread::sleep(self.config.reopen_settle);
                }
            }
        }

        let err = CamError::ReopenFailed {
            index: req.index,
            width: resolution.width,
            height: resolution.height,
            reason: last_error,
        };
        self.restore(previous, err)
    }

    /// 在线设置宽高, 读回一致才算成功
    fn try_live_resize(
        &mut self,
        previous: &SessionBinding,
        resolution: Resolution,
    ) -> Option<SessionReport> {
        let active = self.active.as_ref()?;
        let actual = {
            let mut source = lock_source(&active.source);
            source.set_property(FrameProperty::Width, resolution.width as f64);
            source.set_property(FrameProperty::Height, resolution.height as f64);
            drop(source);
            thread::sleep(self.config.live_resize_settle);
            lock_source(&active.source).resolution()
        };
        if actual != Some(resolution) {
            return None;
        }

        let binding = SessionBinding {
            requested: resolution,
            actual: resolution,
            ..previous.clone()
        };
        self.binding = Some(binding.clone());
        info!("✅ 分辨率在线切换为 {}", resolution);
        Some(SessionReport {
            binding,
            status: format!("Resolution set to {}.", resolution),
            notes: Vec::new(),
        })
    }

    /// 恢复之前的会话; 也失败时进入 Closed(error)
    fn restore(&mut self, previous: SessionBinding, err: CamError) -> CamResult<SessionReport> {
        warn!("❌ {}", err);
        let req = OpenRequest {
            index: previous.camera_index,
            identity: previous.identity.clone(),
            resolution: previous.requested,
            focus: self.focus,
        };
        let restored = self
            .acquire(req.index, req.resolution, self.config.reopen_settle)
            .and_then(|acquired| self.start(&req, acquired));

        match restored {
            Ok(_) => info!("↩️ 已恢复摄像头 {}", previous.camera_index),
            Err(e) => {
                warn!("❌ 恢复之前的会话失败: {}", e);
                self.teardown(self.config.close_join_timeout);
                self.binding = None;
                self.phase = SessionPhase::Closed {
                    error: Some(err.to_string()),
                };
            }
        }
        Err(err)
    }

    // ========== 对焦 ==========

    /// 按当前设置下发对焦参数, 返回失败提示
    fn push_focus(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        let Some(active) = self.active.as_ref() else {
            return notes;
        };
        let mut source = lock_source(&active.source);
        let af = source.set_property(
            FrameProperty::Autofocus,
            if self.focus.autofocus { 1.0 } else { 0.0 },
        );
        if !af.is_supported() {
            notes.push("Auto-focus toggle was rejected by the driver.".to_string());
        }
        if !self.focus.autofocus {
            let f = source.set_property(FrameProperty::Focus, self.focus.focus_value as f64);
            if !f.is_supported() {
                notes.push("Manual focus was rejected by the driver.".to_string());
            }
        }
        drop(source);
        self.stats.set_poll_focus(self.focus.autofocus);
        notes
    }

    fn focus_supported(&self) -> bool {
        self.binding.as_ref().map_or(false, |b| b.focus_supported)
    }

    pub fn set_autofocus(&mut self, on: bool) -> PropertyStatus {
        self.focus.autofocus = on;
        if !self.focus_supported() {
            return PropertyStatus::Unsupported;
        }
        match self.push_focus().into_iter().next() {
            None => PropertyStatus::Supported(if on { 1.0 } else { 0.0 }),
            Some(note) => PropertyStatus::Failed(note),
        }
    }

    /// 手动对焦值只在自动对焦关闭时下发
    pub fn set_focus(&mut self, value: u8) -> PropertyStatus {
        self.focus.focus_value = value;
        if !self.focus_supported() {
            return PropertyStatus::Unsupported;
        }
        if self.focus.autofocus {
            return PropertyStatus::Supported(value as f64);
        }
        let Some(active) = self.active.as_ref() else {
            return PropertyStatus::Unsupported;
        };
        lock_source(&active.source).set_property(FrameProperty::Focus, value as f64)
    }

    pub fn apply_focus(&mut self, focus: FocusSettings) -> Vec<String> {
        self.focus = focus;
        if !self.focus_supported() {
            return Vec::new();
        }
        self.push_focus()
    }

    // ========== 探测 ==========

    /// 用临时句柄探测分辨率
    pub fn probe_resolutions(&self, index: usize) -> Vec<Resolution> {
        probe_resolutions(self.backend.as_ref(), index)
    }

    pub fn scan_devices(&self) -> Vec<DeviceInfo> {
        let live = self.binding.as_ref().map(|b| b.camera_index);
        scan_devices(self.backend.as_ref(), live)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown(self.config.close_join_timeout);
    }
}

/// 读回 AUTOFOCUS 成功即视为支持对焦
fn probe_focus(source: &SharedSource) -> bool {
    match lock_source(source).get_property(FrameProperty::Autofocus) {
        PropertyStatus::Supported(v) => v != -1.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{TestDevice, TestPatternBackend, DEFAULT_RESOLUTION};
    use std::time::Instant;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            refresh_interval: Duration::from_millis(5),
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
    fn test_open_and_close() {
        let backend = Arc::new(TestPatternBackend::with_count(1));
        let mut manager = SessionManager::new(backend, fast_config());
        assert_eq!(manager.phase(), &SessionPhase::Closed { error: None });

        let report = manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();
        assert!(manager.phase().is_open());
        assert!(report.binding.focus_supported);
        assert_eq!(report.status, "Camera 0 opened at 640x480.");

        let closed = manager.close();
        assert_eq!(closed, "Camera closed.");
        assert!(manager.binding().is_none());
        assert!(manager.mailbox().is_empty());
    }

    #[test]
    fn test_open_failure_returns_to_closed() {
        let backend = Arc::new(TestPatternBackend::new(vec![TestDevice::new("Busy").unavailable()]));
        let mut manager = SessionManager::new(backend, fast_config());
        let err = manager.open(request(0, DEFAULT_RESOLUTION)).unwrap_err();
        assert!(matches!(err, CamError::DeviceOpen { index: 0, .. }));
        assert!(matches!(
            manager.phase(),
            SessionPhase::Closed { error: Some(_) }
        ));
    }

    #[test]
    fn test_switch_failure_restores_previous() {
        let backend = Arc::new(TestPatternBackend::new(vec![
            TestDevice::new("Good"),
            TestDevice::new("Busy").unavailable(),
        ]));
        let mut manager = SessionManager::new(backend.clone(), fast_config());
        manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();

        let err = manager.switch_camera(request(1, DEFAULT_RESOLUTION)).unwrap_err();
        assert!(matches!(err, CamError::ReopenFailed { index: 1, .. }));
        assert!(manager.phase().is_open());
        assert_eq!(manager.binding().unwrap().camera_index, 0);
        // 初次打开 + 恢复
        assert_eq!(backend.open_count(), 2);
    }

    #[test]
    fn test_live_resize_and_reopen_fallback() {
        let backend = Arc::new(TestPatternBackend::new(vec![
            TestDevice::new("Live"),
            TestDevice::new("Fixed").with_live_resize(false),
        ]));
        let mut manager = SessionManager::new(backend.clone(), fast_config());

        manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();
        let report = manager.change_resolution(Resolution::new(1280, 720)).unwrap();
        assert_eq!(report.status, "Resolution set to 1280x720.");
        assert_eq!(backend.open_count(), 1);

        manager.switch_camera(request(1, DEFAULT_RESOLUTION)).unwrap();
        let report = manager.change_resolution(Resolution::new(320, 240)).unwrap();
        assert_eq!(report.binding.actual, Resolution::new(320, 240));
        assert_eq!(report.binding.camera_index, 1);
        assert_eq!(backend.open_count(), 3);
    }

    #[test]
    fn test_reopen_retries_are_bounded() {
        let backend = Arc::new(TestPatternBackend::new(vec![TestDevice::new("VGA only")
            .with_supported(&[DEFAULT_RESOLUTION])
            .with_live_resize(false)]));
        let mut manager = SessionManager::new(backend.clone(), fast_config());
        manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();

        let report = manager.change_resolution(Resolution::new(1920, 1080)).unwrap();
        assert_eq!(report.binding.actual, DEFAULT_RESOLUTION);
        assert!(report.binding.resolution_mismatch());
        assert!(!report.notes.is_empty());
        // 初次打开 + 2次重开
        assert_eq!(backend.open_count(), 3);
    }

    #[test]
    fn test_focus_unsupported() {
        let backend = Arc::new(TestPatternBackend::new(vec![TestDevice::new("Fixed").with_focus(false)]));
        let mut manager = SessionManager::new(backend, fast_config());
        let report = manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();
        assert!(!report.binding.focus_supported);
        assert!(report.notes.iter().any(|n| n.contains("Auto-focus")));
        assert_eq!(manager.set_autofocus(false), PropertyStatus::Unsupported);
        assert_eq!(manager.set_focus(40), PropertyStatus::Unsupported);
    }

    #[test]
    fn test_close_does_not_wait_for_stalled_read() {
        let backend = Arc::new(TestPatternBackend::new(vec![
            TestDevice::new("Stuck").with_stall(3, Duration::from_secs(2))
        ]));
        let mut config = fast_config();
        config.close_join_timeout = Duration::from_millis(200);
        let mut manager = SessionManager::new(backend.clone(), config);
        manager.open(request(0, DEFAULT_RESOLUTION)).unwrap();

        // 等采集线程进入第3次读帧
        let stats = manager.stats();
        let deadline = Instant::now() + Duration::from_secs(2);
        while stats.frames() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        assert_eq!(manager.close(), "Camera closed.");
        let took = started.elapsed();
        assert!(took < Duration::from_secs(1), "close took {:?}", took);
        assert_eq!(manager.phase(), &SessionPhase::Closed { error: None });

        // 读帧返回后设备仍被释放, 卡住的帧不会留在邮箱里
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.release_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(backend.release_count(), 1);
        assert!(manager.mailbox().latest().is_none());
    }

    #[test]
    fn test_change_resolution_requires_session() {
        let backend = Arc::new(TestPatternBackend::with_count(1));
        let mut manager = SessionManager::new(backend, fast_config());
        assert!(matches!(
            manager.change_resolution(DEFAULT_RESOLUTION),
            Err(CamError::NotOpen)
        ));
    }
}
