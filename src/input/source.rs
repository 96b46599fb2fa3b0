/// 帧源接口 (Frame Source)
///
/// 一个打开的设备句柄: 读帧 + 属性读写 + 释放
use super::devices::DeviceInfo;
use super::types::{Frame, FrameProperty, PropertyStatus, Resolution};
use crate::error::CamResult;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use tracing::{debug, warn};

/// 已打开的设备句柄
///
/// 属性读写都是尽力而为: 驱动不支持时返回 `PropertyStatus::Unsupported`, 从不 panic
pub trait FrameSource: Send {
    /// 设备是否处于打开状态
    fn is_opened(&self) -> bool;

    /// 读取下一帧, 没有就绪的帧时返回 None (不会无限阻塞)
    fn read_frame(&mut self) -> Option<Frame>;

    fn get_property(&mut self, prop: FrameProperty) -> PropertyStatus;

    fn set_property(&mut self, prop: FrameProperty, value: f64) -> PropertyStatus;

    /// 释放设备, 之后 read_frame 只返回 None
    fn release(&mut self);

    /// 设备上报的实际分辨率
    fn resolution(&mut self) -> Option<Resolution> {
        let w = self.get_property(FrameProperty::Width).value()?;
        let h = self.get_property(FrameProperty::Height).value()?;
        if w < 1.0 || h < 1.0 {
            return None;
        }
        Some(Resolution::new(w as u32, h as u32))
    }
}

/// 摄像头后端: 打开设备 + 枚举设备
pub trait CameraBackend: Send + Sync {
    fn name(&self) -> &str;

    /// 打开设备并请求分辨率, 获取句柄可能需要数十到数百毫秒
    fn open(&self, index: usize, requested: Resolution) -> CamResult<Box<dyn FrameSource>>;

    /// 列出候选设备 (不保证已探测手动对焦能力)
    fn enumerate(&self) -> Vec<DeviceInfo>;
}

/// 采集线程与会话共享的设备句柄
pub type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

pub fn share_source(source: Box<dyn FrameSource>) -> SharedSource {
    Arc::new(Mutex::new(source))
}

/// 加锁 (锁中毒时直接取回内部值, 读帧线程的 panic 不应拖垮会话)
pub fn lock_source(source: &SharedSource) -> MutexGuard<'_, Box<dyn FrameSource>> {
    source.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 释放设备而不等待句柄锁
///
/// 采集线程卡在 read_frame 里时锁一直被占用, 此时交给后台线程在读帧返回后释放
pub fn release_detached(source: SharedSource) {
    let released = match source.try_lock() {
        Ok(mut guard) => {
            guard.release();
            true
        }
        Err(TryLockError::Poisoned(poisoned)) => {
            poisoned.into_inner().release();
            true
        }
        Err(TryLockError::WouldBlock) => false,
    };
    if released {
        return;
    }

    debug!("⏳ 设备句柄仍被读帧占用, 后台释放");
    let spawned = thread::Builder::new()
        .name("release".to_string())
        .spawn(move || lock_source(&source).release());
    if let Err(e) = spawned {
        warn!("❌ 无法启动释放线程: {}", e);
    }
}
