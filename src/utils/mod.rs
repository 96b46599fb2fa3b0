/// 工具模块
/// Utility modules
pub mod log;
pub mod resize;

pub use log::OperatorLog;
pub use resize::{resize_rgb, Interpolation};
