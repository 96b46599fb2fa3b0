/// 设备枚举与能力探测
///
/// 探测总是打开一个临时句柄, 用完立即释放, 从不触碰正在采集的句柄
use super::source::CameraBackend;
use super::types::{FrameProperty, PropertyStatus, Resolution, COMMON_RESOLUTIONS, DEFAULT_RESOLUTION};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// 设备列表条目 (同时也是配置文件 cameras 数组的元素)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub index: usize,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub manual_focus: bool,
}

fn default_true() -> bool {
    true
}

impl DeviceInfo {
    pub fn identity(&self) -> CameraIdentity {
        CameraIdentity::new(Some(&self.uid), self.index)
    }

    /// 下拉列表显示文本, 如 "0 - HD Webcam (available) [MF]"
    pub fn display_label(&self) -> String {
        let mut label = self.index.to_string();
        if !self.name.is_empty() {
            label.push_str(" - ");
            label.push_str(&self.name);
        }
        label.push_str(if self.available {
            " (available)"
        } else {
            " (unavailable)"
        });
        if self.manual_focus {
            label.push_str(" [MF]");
        }
        label
    }
}

/// 摄像头身份: 有唯一ID时用唯一ID, 否则 "idx:N"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraIdentity(String);

impl CameraIdentity {
    pub fn new(uid: Option<&str>, index: usize) -> Self {
        match uid.map(str::trim) {
            Some(uid) if !uid.is_empty() => Self(uid.to_string()),
            _ => Self::from_index(index),
        }
    }

    pub fn from_index(index: usize) -> Self {
        Self(format!("idx:{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 在设备列表中查找身份, 找不到时按索引生成
pub fn identity_for(devices: &[DeviceInfo], index: usize) -> CameraIdentity {
    devices
        .iter()
        .find(|d| d.index == index)
        .map(DeviceInfo::identity)
        .unwrap_or_else(|| CameraIdentity::from_index(index))
}

/// 逐个候选分辨率设置 + 读一帧 + 读回比对, 返回读回一致的候选
pub fn probe_resolutions(backend: &dyn CameraBackend, index: usize) -> Vec<Resolution> {
    let mut source = match backend.open(index, DEFAULT_RESOLUTION) {
        Ok(source) => source,
        Err(e) => {
            warn!("⚠️ 分辨率探测失败: {}", e);
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for candidate in COMMON_RESOLUTIONS {
        source.set_property(FrameProperty::Width, candidate.width as f64);
        source.set_property(FrameProperty::Height, candidate.height as f64);
        if source.read_frame().is_none() {
            continue;
        }
        if source.resolution() == Some(candidate) {
            found.push(candidate);
        }
    }
    source.release();

    info!(
        "🔍 摄像头 {} 支持的分辨率: {}",
        index,
        found
            .iter()
            .map(Resolution::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    found
}

/// 手动对焦探测: 读到非 {-1, 0} 的对焦值, 或写入对焦值成功
pub fn probe_manual_focus(backend: &dyn CameraBackend, index: usize) -> bool {
    let mut source = match backend.open(index, DEFAULT_RESOLUTION) {
        Ok(source) => source,
        Err(_) => return false,
    };
    let supported = match source.get_property(FrameProperty::Focus) {
        PropertyStatus::Supported(v) if v != -1.0 && v != 0.0 => true,
        _ => source.set_property(FrameProperty::Focus, 10.0).is_supported(),
    };
    source.release();
    supported
}

/// 设备是否能打开
pub fn is_available(backend: &dyn CameraBackend, index: usize) -> bool {
    match backend.open(index, DEFAULT_RESOLUTION) {
        Ok(mut source) => {
            let opened = source.is_opened();
            source.release();
            opened
        }
        Err(_) => false,
    }
}

/// 重新扫描设备: 枚举 + 可用性 + 手动对焦能力
///
/// `skip_index` 为正在采集的设备, 直接视为可用且不重复打开
pub fn scan_devices(backend: &dyn CameraBackend, skip_index: Option<usize>) -> Vec<DeviceInfo> {
    info!("🔍 正在扫描视频设备...");
    let mut devices = backend.enumerate();
    for device in devices.iter_mut() {
        if device.uid.trim().is_empty() {
            device.uid = CameraIdentity::from_index(device.index).as_str().to_string();
        }
        if Some(device.index) == skip_index {
            device.available = true;
            continue;
        }
        device.available = is_available(backend, device.index);
        if device.available {
            device.manual_focus = probe_manual_focus(backend, device.index);
        }
        debug!("   {}", device.display_label());
    }
    info!("✅ 找到 {} 个视频设备", devices.len());
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::test_pattern::{TestDevice, TestPatternBackend};

    #[test]
    fn test_display_label() {
        let info = DeviceInfo {
            index: 1,
            uid: "usb-1".into(),
            name: "HD Webcam".into(),
            available: true,
            manual_focus: true,
        };
        assert_eq!(info.display_label(), "1 - HD Webcam (available) [MF]");

        let bare = DeviceInfo {
            index: 0,
            uid: String::new(),
            name: String::new(),
            available: false,
            manual_focus: false,
        };
        assert_eq!(bare.display_label(), "0 (unavailable)");
        assert_eq!(bare.identity().as_str(), "idx:0");
    }

    #[test]
    fn test_identity_for() {
        let devices = vec![DeviceInfo {
            index: 2,
            uid: "cam-xyz".into(),
            name: "Cam".into(),
            available: true,
            manual_focus: false,
        }];
        assert_eq!(identity_for(&devices, 2).as_str(), "cam-xyz");
        assert_eq!(identity_for(&devices, 0).as_str(), "idx:0");
        assert_eq!(CameraIdentity::new(Some("  "), 4).as_str(), "idx:4");
    }

    #[test]
    fn test_probe_resolutions() {
        let backend = TestPatternBackend::new(vec![TestDevice::new("Cam").with_fps(1000.0)]);
        let found = probe_resolutions(&backend, 0);
        assert_eq!(
            found,
            vec![
                Resolution::new(1280, 720),
                Resolution::new(640, 480),
                Resolution::new(320, 240)
            ]
        );
        assert!(probe_resolutions(&backend, 9).is_empty());
    }

    #[test]
    fn test_scan_devices() {
        let backend = TestPatternBackend::new(vec![
            TestDevice::new("Focus").with_fps(1000.0),
            TestDevice::new("Fixed").with_focus(false).with_uid("fixed-1"),
            TestDevice::new("Busy").unavailable(),
        ]);
        let devices = scan_devices(&backend, None);
        assert_eq!(devices.len(), 3);
        assert!(devices[0].manual_focus);
        assert_eq!(devices[0].uid, "idx:0");
        assert!(!devices[1].manual_focus);
        assert_eq!(devices[1].identity().as_str(), "fixed-1");
        assert!(!devices[2].available);
    }
}
