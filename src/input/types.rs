/// 视频输入系统数据结构定义
/// Data structures for the video input system
use crate::error::{CamError, CamResult};
use image::RgbImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

// ========== 公共常量 ==========

/// 分辨率探测候选列表 (从高到低)
pub const COMMON_RESOLUTIONS: [Resolution; 8] = [
    Resolution::new(3840, 2160),
    Resolution::new(2560, 1440),
    Resolution::new(1920, 1080),
    Resolution::new(1280, 720),
    Resolution::new(1024, 768),
    Resolution::new(800, 600),
    Resolution::new(640, 480),
    Resolution::new(320, 240),
];

/// 默认采集分辨率
pub const DEFAULT_RESOLUTION: Resolution = Resolution::new(640, 480);

static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,5})\s*[xX×]\s*(\d{1,5})").expect("static regex"));

// ========== 数据结构 ==========

/// 分辨率 (宽x高)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 解析 "WxH" 字符串, 允许后缀 (如 "1280x720 (MJPG)")
    pub fn parse(s: &str) -> CamResult<Self> {
        let caps = RESOLUTION_RE
            .captures(s)
            .ok_or_else(|| CamError::InvalidResolution(s.to_string()))?;
        let width: u32 = caps[1]
            .parse()
            .map_err(|_| CamError::InvalidResolution(s.to_string()))?;
        let height: u32 = caps[2]
            .parse()
            .map_err(|_| CamError::InvalidResolution(s.to_string()))?;
        if width == 0 || height == 0 {
            return Err(CamError::InvalidResolution(s.to_string()));
        }
        Ok(Self { width, height })
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = CamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 采集帧 (采集线程 → 共享槽 → 渲染)
///
/// 发布到共享槽后不再修改, 变换前总是先拷贝
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub seq: u64, // 帧序号
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self {
            image,
            seq,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }
}

/// 设备属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameProperty {
    Width,
    Height,
    Autofocus,
    Focus,
    FpsHint,
    BufferDepth,
    Fourcc,
}

impl FrameProperty {
    pub fn name(&self) -> &'static str {
        match self {
            FrameProperty::Width => "frame-width",
            FrameProperty::Height => "frame-height",
            FrameProperty::Autofocus => "autofocus",
            FrameProperty::Focus => "focus",
            FrameProperty::FpsHint => "fps-hint",
            FrameProperty::BufferDepth => "buffer-depth",
            FrameProperty::Fourcc => "fourcc",
        }
    }
}

/// 属性读写结果 (尽力而为, 从不返回错误)
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyStatus {
    Supported(f64),
    Unsupported,
    Failed(String),
}

impl PropertyStatus {
    pub fn is_supported(&self) -> bool {
        matches!(self, PropertyStatus::Supported(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PropertyStatus::Supported(v) => Some(*v),
            _ => None,
        }
    }
}

/// FOURCC编码 (如 b"MJPG")
pub fn fourcc(code: &[u8; 4]) -> f64 {
    u32::from_le_bytes(*code) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(Resolution::parse("1280x720").unwrap(), Resolution::new(1280, 720));
        assert_eq!(Resolution::parse(" 640X480 ").unwrap(), Resolution::new(640, 480));
        assert_eq!(
            Resolution::parse("1920x1080 (MJPG)").unwrap(),
            Resolution::new(1920, 1080)
        );
        assert!(Resolution::parse("wide").is_err());
        assert!(Resolution::parse("0x480").is_err());
        assert_eq!(Resolution::new(800, 600).to_string(), "800x600");
    }

    #[test]
    fn test_property_status() {
        assert_eq!(PropertyStatus::Supported(1.0).value(), Some(1.0));
        assert!(!PropertyStatus::Unsupported.is_supported());
        assert_eq!(PropertyStatus::Failed("x".into()).value(), None);
    }
}
