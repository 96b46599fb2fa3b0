//! 运行参数 - 命令行 + 时序常量

use crate::input::Resolution;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// 配置文件名 (放在可执行文件旁边)
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// 帧源类型
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// 合成测试图案 (无需硬件)
    Test,
    /// FFmpeg 本地摄像头
    Ffmpeg,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "USB摄像头实时预览", long_about = None)]
pub struct Args {
    /// 帧源: test 或 ffmpeg
    #[arg(short, long, value_enum, default_value_t = SourceKind::Test)]
    pub source: SourceKind,

    /// 配置文件路径 (默认: 可执行文件旁的 settings.json)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// 快照保存目录
    #[arg(long, default_value = "snapshots")]
    pub snapshot_dir: PathBuf,

    /// HUD字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 刷新节流间隔(毫秒)
    #[arg(long, default_value_t = 33)]
    pub refresh_ms: u64,

    /// 窗口尺寸 WxH
    #[arg(long, default_value = "1024x720")]
    pub window: String,

    /// 合成设备数量 (仅 test 帧源)
    #[arg(long, default_value_t = 2)]
    pub test_devices: usize,
}

/// 运行时参数
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub refresh_interval: Duration,
    pub read_retry_delay: Duration,
    pub close_join_timeout: Duration,
    pub switch_join_timeout: Duration,
    pub open_settle: Duration,
    pub reopen_settle: Duration,
    pub live_resize_settle: Duration,
    pub max_reopen_attempts: u32,
    pub grab_margin: i32,
    pub display_thickness: u32,
    pub snapshot_thickness: u32,
    pub settings_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub font_path: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(33),
            read_retry_delay: Duration::from_millis(5),
            close_join_timeout: Duration::from_millis(500),
            switch_join_timeout: Duration::from_millis(400),
            open_settle: Duration::from_millis(100),
            reopen_settle: Duration::from_millis(80),
            live_resize_settle: Duration::from_millis(50),
            max_reopen_attempts: 2,
            grab_margin: 8,
            display_thickness: 2,
            snapshot_thickness: 3,
            settings_path: default_settings_path(),
            snapshot_dir: PathBuf::from("snapshots"),
            font_path: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            refresh_interval: Duration::from_millis(args.refresh_ms.max(1)),
            settings_path: args.settings.clone().unwrap_or_else(default_settings_path),
            snapshot_dir: args.snapshot_dir.clone(),
            font_path: args.font.clone(),
            ..Self::default()
        }
    }

    /// 所有等待都缩短到几毫秒 (测试用)
    pub fn fast(settings_path: PathBuf) -> Self {
        Self {
            refresh_interval: Duration::from_millis(5),
            read_retry_delay: Duration::from_millis(1),
            open_settle: Duration::from_millis(1),
            reopen_settle: Duration::from_millis(1),
            live_resize_settle: Duration::from_millis(1),
            settings_path,
            ..Self::default()
        }
    }
}

/// 解析窗口尺寸, 失败时使用默认值
pub fn window_size(args: &Args) -> Resolution {
    Resolution::parse(&args.window).unwrap_or(Resolution::new(1024, 720))
}

/// 可执行文件旁的 settings.json, 取不到时退到用户配置目录
pub fn default_settings_path() -> PathBuf {
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        return dir.join(SETTINGS_FILE_NAME);
    }
    dirs::config_dir()
        .map(|d| d.join("usbcam-rs").join(SETTINGS_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
}
