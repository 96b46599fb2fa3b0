/// 测试图案后端 (Test Pattern Backend)
///
/// 不依赖硬件的合成摄像头: 渐变背景 + 移动竖条, 可配置支持的分辨率、
/// 对焦能力、是否支持在线改分辨率, 以及打开失败/丢帧/读帧卡住等故障.
use super::devices::DeviceInfo;
use super::source::{CameraBackend, FrameSource};
use super::types::{Frame, FrameProperty, PropertyStatus, Resolution, DEFAULT_RESOLUTION};
use crate::error::{CamError, CamResult};
use image::{Rgb, RgbImage};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// 合成设备配置
#[derive(Debug, Clone)]
pub struct TestDevice {
    pub name: String,
    pub uid: Option<String>,
    pub supported: Vec<Resolution>,
    pub default_resolution: Resolution,
    pub focus_supported: bool,
    pub live_resize: bool,
    pub available: bool,
    pub noise: bool,
    pub miss_every: u64, // 每N次读帧丢一次, 0表示不丢
    pub stall: Option<(u64, Duration)>, // 第N次读帧卡住一段时间
    pub fps: f64,
}

impl TestDevice {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uid: None,
            supported: vec![
                Resolution::new(1280, 720),
                DEFAULT_RESOLUTION,
                Resolution::new(320, 240),
            ],
            default_resolution: DEFAULT_RESOLUTION,
            focus_supported: true,
            live_resize: true,
            available: true,
            noise: false,
            miss_every: 0,
            stall: None,
            fps: 30.0,
        }
    }

    pub fn with_uid(mut self, uid: &str) -> Self {
        self.uid = Some(uid.to_string());
        self
    }

    pub fn with_supported(mut self, supported: &[Resolution]) -> Self {
        self.supported = supported.to_vec();
        if let Some(first) = supported.first() {
            if !supported.contains(&self.default_resolution) {
                self.default_resolution = *first;
            }
        }
        self
    }

    pub fn with_focus(mut self, supported: bool) -> Self {
        self.focus_supported = supported;
        self
    }

    pub fn with_live_resize(mut self, live: bool) -> Self {
        self.live_resize = live;
        self
    }

    pub fn with_noise(mut self, noise: bool) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps.max(1.0);
        self
    }

    pub fn with_misses(mut self, every: u64) -> Self {
        self.miss_every = every;
        self
    }

    /// 第 at_read 次读帧阻塞 duration (模拟驱动卡死)
    pub fn with_stall(mut self, at_read: u64, duration: Duration) -> Self {
        self.stall = Some((at_read, duration));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

/// 合成摄像头后端
#[derive(Debug, Clone)]
pub struct TestPatternBackend {
    devices: Vec<TestDevice>,
    opens: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl TestPatternBackend {
    pub fn new(devices: Vec<TestDevice>) -> Self {
        Self {
            devices,
            opens: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// N个默认合成设备
    pub fn with_count(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| TestDevice::new(&format!("Test Pattern {}", i)))
                .collect(),
        )
    }

    /// 成功打开的次数
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// 已释放的句柄数
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::Relaxed)
    }
}

impl CameraBackend for TestPatternBackend {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn open(&self, index: usize, requested: Resolution) -> CamResult<Box<dyn FrameSource>> {
        let device = self.devices.get(index).ok_or_else(|| CamError::DeviceOpen {
            index,
            reason: "no such device".to_string(),
        })?;
        if !device.available {
            return Err(CamError::DeviceOpen {
                index,
                reason: "device busy".to_string(),
            });
        }

        // 不支持的分辨率回落到设备默认值
        let resolution = if device.supported.contains(&requested) {
            requested
        } else {
            device.default_resolution
        };
        self.opens.fetch_add(1, Ordering::Relaxed);
        debug!("🎥 打开合成设备 [{}] {} @ {}", index, device.name, resolution);

        let mut source = TestPatternSource::new(device.clone(), resolution);
        source.releases = Some(self.releases.clone());
        Ok(Box::new(source))
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, d)| DeviceInfo {
                index,
                uid: d.uid.clone().unwrap_or_default(),
                name: d.name.clone(),
                available: d.available,
                manual_focus: false,
            })
            .collect()
    }
}

/// 合成摄像头句柄
pub struct TestPatternSource {
    device: TestDevice,
    resolution: Resolution,
    pending: Resolution,
    opened: bool,
    counter: u64,
    autofocus: f64,
    focus: f64,
    fps_hint: f64,
    buffer_depth: f64,
    fourcc: f64,
    last_read: Option<Instant>,
    releases: Option<Arc<AtomicUsize>>,
}

impl TestPatternSource {
    pub fn new(device: TestDevice, resolution: Resolution) -> Self {
        let fps_hint = device.fps;
        Self {
            device,
            resolution,
            pending: resolution,
            opened: true,
            counter: 0,
            autofocus: 1.0,
            focus: 0.0,
            fps_hint,
            buffer_depth: 4.0,
            fourcc: 0.0,
            last_read: None,
            releases: None,
        }
    }

    fn try_apply_pending(&mut self) {
        if self.device.live_resize && self.device.supported.contains(&self.pending) {
            self.resolution = self.pending;
        }
    }

    /// 模拟设备帧间隔 (真实摄像头在 read 中阻塞到下一帧)
    fn pace(&mut self) {
        let interval = Duration::from_secs_f64(1.0 / self.device.fps);
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }

    fn render(&self) -> RgbImage {
        let Resolution { width, height } = self.resolution;
        let bar_x = (self.counter * 4) % width as u64;
        let bar_w = (width as u64 / 8).max(1);
        let mut image = RgbImage::from_fn(width, height, |x, y| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let in_bar = (x as u64 + width as u64 - bar_x) % width as u64 <= bar_w;
            Rgb([r, g, if in_bar { 255 } else { 40 }])
        });
        if self.device.noise {
            let mut rng = rand::thread_rng();
            for p in image.pixels_mut() {
                let n: u8 = rng.gen_range(0..8);
                p.0[0] = p.0[0].saturating_add(n);
            }
        }
        image
    }
}

impl FrameSource for TestPatternSource {
    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.opened {
            return None;
        }
        self.pace();
        self.counter += 1;
        if let Some((at, duration)) = self.device.stall {
            if self.counter == at {
                thread::sleep(duration);
            }
        }
        if self.device.miss_every > 0 && self.counter % self.device.miss_every == 0 {
            return None;
        }
        Some(Frame::new(self.render(), self.counter))
    }

    fn get_property(&mut self, prop: FrameProperty) -> PropertyStatus {
        match prop {
            FrameProperty::Width => PropertyStatus::Supported(self.resolution.width as f64),
            FrameProperty::Height => PropertyStatus::Supported(self.resolution.height as f64),
            FrameProperty::Autofocus if self.device.focus_supported => {
                PropertyStatus::Supported(self.autofocus)
            }
            FrameProperty::Focus if self.device.focus_supported => {
                PropertyStatus::Supported(self.focus)
            }
            FrameProperty::Autofocus | FrameProperty::Focus => PropertyStatus::Unsupported,
            FrameProperty::FpsHint => PropertyStatus::Supported(self.fps_hint),
            FrameProperty::BufferDepth => PropertyStatus::Supported(self.buffer_depth),
            FrameProperty::Fourcc => PropertyStatus::Supported(self.fourcc),
        }
    }

    fn set_property(&mut self, prop: FrameProperty, value: f64) -> PropertyStatus {
        if !self.opened {
            return PropertyStatus::Failed("device released".to_string());
        }
        match prop {
            FrameProperty::Width | FrameProperty::Height if !self.device.live_resize => {
                PropertyStatus::Unsupported
            }
            FrameProperty::Width => {
                self.pending.width = value.max(1.0) as u32;
                self.try_apply_pending();
                PropertyStatus::Supported(value)
            }
            FrameProperty::Height => {
                self.pending.height = value.max(1.0) as u32;
                self.try_apply_pending();
                PropertyStatus::Supported(value)
            }
            FrameProperty::Autofocus | FrameProperty::Focus if !self.device.focus_supported => {
                PropertyStatus::Unsupported
            }
            FrameProperty::Autofocus => {
                self.autofocus = if value != 0.0 { 1.0 } else { 0.0 };
                PropertyStatus::Supported(self.autofocus)
            }
            FrameProperty::Focus => {
                self.focus = value.clamp(0.0, 255.0);
                PropertyStatus::Supported(self.focus)
            }
            FrameProperty::FpsHint => {
                self.fps_hint = value;
                PropertyStatus::Supported(value)
            }
            FrameProperty::BufferDepth => {
                self.buffer_depth = value;
                PropertyStatus::Supported(value)
            }
            FrameProperty::Fourcc => {
                self.fourcc = value;
                PropertyStatus::Supported(value)
            }
        }
    }

    fn release(&mut self) {
        if self.opened {
            if let Some(releases) = &self.releases {
                releases.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_falls_back_to_default() {
        let backend = TestPatternBackend::new(vec![
            TestDevice::new("Only VGA").with_supported(&[DEFAULT_RESOLUTION])
        ]);
        let mut source = backend.open(0, Resolution::new(1280, 720)).unwrap();
        assert_eq!(source.resolution(), Some(DEFAULT_RESOLUTION));
        let frame = source.read_frame().unwrap();
        assert_eq!(frame.resolution(), DEFAULT_RESOLUTION);
    }

    #[test]
    fn test_unavailable_and_missing_devices() {
        let backend = TestPatternBackend::new(vec![TestDevice::new("Busy").unavailable()]);
        assert!(matches!(
            backend.open(0, DEFAULT_RESOLUTION),
            Err(CamError::DeviceOpen { index: 0, .. })
        ));
        assert!(backend.open(3, DEFAULT_RESOLUTION).is_err());
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_live_resize_and_release() {
        let backend = TestPatternBackend::with_count(1);
        let mut source = backend.open(0, DEFAULT_RESOLUTION).unwrap();
        source.set_property(FrameProperty::Width, 1280.0);
        source.set_property(FrameProperty::Height, 720.0);
        assert_eq!(source.resolution(), Some(Resolution::new(1280, 720)));

        source.release();
        source.release();
        assert!(!source.is_opened());
        assert!(source.read_frame().is_none());
        assert_eq!(backend.release_count(), 1);
    }

    #[test]
    fn test_noise_stays_close_to_pattern() {
        let backend = TestPatternBackend::new(vec![
            TestDevice::new("Clean"),
            TestDevice::new("Noisy").with_noise(true),
        ]);
        let res = Resolution::new(320, 240);
        let clean = backend.open(0, res).unwrap().read_frame();
        let noisy = backend.open(1, res).unwrap().read_frame();
        let (clean, noisy) = (clean.unwrap().image, noisy.unwrap().image);

        for (c, n) in clean.pixels().zip(noisy.pixels()) {
            assert!(n.0[0] >= c.0[0] && n.0[0] - c.0[0] < 8);
            assert_eq!((c.0[1], c.0[2]), (n.0[1], n.0[2]));
        }
    }

    #[test]
    fn test_focus_unsupported() {
        let backend = TestPatternBackend::new(vec![TestDevice::new("Fixed").with_focus(false)]);
        let mut source = backend.open(0, DEFAULT_RESOLUTION).unwrap();
        assert_eq!(
            source.get_property(FrameProperty::Autofocus),
            PropertyStatus::Unsupported
        );
        assert_eq!(
            source.set_property(FrameProperty::Focus, 40.0),
            PropertyStatus::Unsupported
        );
    }
}
