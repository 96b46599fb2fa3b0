/// 错误类型定义
/// Error taxonomy for device, session and persistence failures
use thiserror::Error;

/// 摄像头/会话相关错误
///
/// 驱动不支持某个属性不算错误, 由 `PropertyStatus::Unsupported` 表示
#[derive(Debug, Error)]
pub enum CamError {
    /// 设备打开失败 (占用/不存在/无权限)
    #[error("failed to open camera {index}: {reason}")]
    DeviceOpen { index: usize, reason: String },

    /// 切换摄像头或分辨率时重新打开失败
    #[error("reopen of camera {index} at {width}x{height} failed: {reason}")]
    ReopenFailed {
        index: usize,
        width: u32,
        height: u32,
        reason: String,
    },

    /// 配置文件读写失败
    #[error("settings persistence failed: {0}")]
    Persistence(String),

    /// 快照编码/写入失败
    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("invalid resolution string {0:?} (expected WxH)")]
    InvalidResolution(String),

    #[error("no camera session is open")]
    NotOpen,
}

pub type CamResult<T> = Result<T, CamError>;

impl From<std::io::Error> for CamError {
    fn from(e: std::io::Error) -> Self {
        CamError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CamError {
    fn from(e: serde_json::Error) -> Self {
        CamError::Persistence(e.to_string())
    }
}

impl From<image::ImageError> for CamError {
    fn from(e: image::ImageError) -> Self {
        CamError::Snapshot(e.to_string())
    }
}
