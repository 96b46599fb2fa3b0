/// 显示渲染 (Display Compositor)
///
/// - compositor: 适配缩放 + 居中 + 标注 + HUD
/// - hud: 状态文字与对焦指示条
/// - snapshot: 完整分辨率快照
mod compositor;
mod hud;
mod snapshot;

pub use compositor::{Composite, Compositor};
pub use hud::{FocusIndicator, Hud, HudInfo, TextLabel};
pub use snapshot::{render_snapshot, save_snapshot, snapshot_file_name, ImageEncoder, JpegEncoder};
