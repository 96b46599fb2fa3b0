/// 视频输入系统 (Video Input System)
///
/// 独立工作线程,负责摄像头取帧与帧分发
/// - FrameSource / CameraBackend: 设备句柄与后端抽象
/// - CaptureLoop: 采集线程 (读帧 → 最新帧槽 → 节流刷新)
/// - LatestFrame: 单槽最新帧邮箱
/// - TestPatternBackend: 合成测试图案
/// - FfmpegBackend: 本地摄像头 (DirectShow/AVFoundation/V4L2, 需启用 ffmpeg 特性)
pub mod capture;
pub mod clock;
pub mod devices;
pub mod mailbox;
pub mod source;
pub mod test_pattern;
pub mod types;

#[cfg(feature = "ffmpeg")]
pub mod camera;

pub use capture::{
    BoundedJoin, CaptureContext, CaptureLoop, CaptureStats, FpsCounter, RefreshGate, RefreshRequest,
    RefreshThrottle,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use devices::{identity_for, probe_manual_focus, probe_resolutions, scan_devices, CameraIdentity, DeviceInfo};
pub use mailbox::LatestFrame;
pub use source::{
    lock_source, release_detached, share_source, CameraBackend, FrameSource, SharedSource,
};
pub use test_pattern::{TestDevice, TestPatternBackend};
pub use types::{
    fourcc, Frame, FrameProperty, PropertyStatus, Resolution, COMMON_RESOLUTIONS,
    DEFAULT_RESOLUTION,
};

#[cfg(feature = "ffmpeg")]
pub use camera::FfmpegBackend;

use crate::config::SourceKind;
use crate::error::CamResult;
use std::sync::Arc;

/// 按命令行选择创建后端
pub fn backend_for(kind: SourceKind, test_devices: usize) -> CamResult<Arc<dyn CameraBackend>> {
    match kind {
        SourceKind::Test => Ok(Arc::new(TestPatternBackend::with_count(test_devices.max(1)))),
        #[cfg(feature = "ffmpeg")]
        SourceKind::Ffmpeg => Ok(Arc::new(FfmpegBackend::new())),
        #[cfg(not(feature = "ffmpeg"))]
        SourceKind::Ffmpeg => Err(crate::error::CamError::DeviceOpen {
            index: 0,
            reason: "built without the `ffmpeg` feature".to_string(),
        }),
    }
}
