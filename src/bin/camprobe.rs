/// 摄像头探测工具
///
/// 列出设备、探测支持的分辨率与手动对焦能力, 可选写回 settings.json
///
/// cargo run --bin camprobe -- --probe 0 --save
use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use usbcam_rs::config::{default_settings_path, SourceKind};
use usbcam_rs::input::{backend_for, probe_manual_focus, probe_resolutions, scan_devices};
use usbcam_rs::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about = "摄像头设备探测", long_about = None)]
struct Args {
    /// 帧源: test 或 ffmpeg
    #[arg(short, long, value_enum, default_value_t = SourceKind::Test)]
    source: SourceKind,

    /// 探测指定序号摄像头的分辨率
    #[arg(short, long)]
    probe: Option<usize>,

    /// 把扫描/探测结果写入配置文件
    #[arg(long)]
    save: bool,

    /// 配置文件路径
    #[arg(long)]
    settings: Option<std::path::PathBuf>,

    /// 合成设备数量 (仅 test 帧源)
    #[arg(long, default_value_t = 2)]
    test_devices: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let backend = backend_for(args.source, args.test_devices)?;
    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = Settings::load(&settings_path);

    println!("🔍 帧源: {}", backend.name());
    let devices = scan_devices(backend.as_ref(), None);
    if devices.is_empty() {
        println!("⚠️ 没有找到视频设备");
    }
    for device in &devices {
        println!("  {}  [{}]", device.display_label(), device.identity());
    }
    settings.cameras = devices.clone();

    if let Some(index) = args.probe {
        let Some(device) = devices.iter().find(|d| d.index == index) else {
            bail!("no camera with index {}", index);
        };
        let resolutions = probe_resolutions(backend.as_ref(), index);
        let manual_focus = probe_manual_focus(backend.as_ref(), index);
        println!("📐 摄像头 {} 支持的分辨率:", index);
        if resolutions.is_empty() {
            println!("  (无)");
        }
        for r in &resolutions {
            println!("  {}", r);
        }
        println!("🎯 手动对焦: {}", if manual_focus { "支持" } else { "不支持" });
        settings.set_known_resolutions(&device.identity(), &resolutions);
    }

    if args.save {
        settings.save(&settings_path)?;
        println!("💾 已写入 {}", settings_path.display());
    }
    Ok(())
}
