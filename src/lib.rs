// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
// USB摄像头实时预览 + 标注
pub mod config; // 命令行与运行参数
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod overlay; // 叠加标注
pub mod pipeline; // 帧变换流水线
pub mod renderer; // 显示合成与快照
pub mod session; // 摄像头会话状态机
pub mod settings; // 配置持久化
pub mod utils; // 缩放与日志工具
pub mod viewer; // UI线程控制器

pub use crate::config::{Args, SourceKind, ViewerConfig};
pub use crate::error::{CamError, CamResult};
pub use crate::input::{CameraBackend, Frame, FrameSource, Resolution};
pub use crate::session::{SessionManager, SessionPhase, SessionWorker};
pub use crate::settings::{CameraProfile, Settings};
pub use crate::viewer::{Modifiers, Presentation, Viewer};

/// 本地时间戳, 用于快照文件名
pub fn gen_time_string() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
