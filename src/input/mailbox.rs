/// 单槽最新帧邮箱 (Latest-frame mailbox)
///
/// 发布即覆盖, 读取即拷贝: 读者只会看到 "还没有帧" 或 "最新的一帧",
/// 旧帧直接丢弃, 没有队列也没有积压.
use super::types::Frame;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Arc<Frame>>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<Arc<Frame>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 发布新帧, 覆盖槽内旧帧
    pub fn publish(&self, frame: Frame) {
        let frame = Arc::new(frame);
        *self.guard() = Some(frame);
    }

    /// 取出最新帧的引用 (锁内只克隆Arc, 立即释放)
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.guard().clone()
    }

    pub fn latest_seq(&self) -> Option<u64> {
        self.guard().as_ref().map(|f| f.seq)
    }

    pub fn clear(&self) {
        *self.guard() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn uniform_frame(seq: u64) -> Frame {
        let v = (seq % 251) as u8;
        Frame::new(RgbImage::from_pixel(64, 48, Rgb([v, v, v])), seq)
    }

    #[test]
    fn test_overwrite_semantics() {
        let mailbox = LatestFrame::new();
        assert!(mailbox.latest().is_none());

        mailbox.publish(uniform_frame(1));
        mailbox.publish(uniform_frame(2));
        mailbox.publish(uniform_frame(3));

        // 只保留最新一帧
        assert_eq!(mailbox.latest_seq(), Some(3));
        assert_eq!(mailbox.latest_seq(), Some(3));

        mailbox.clear();
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_no_torn_frames_under_contention() {
        let mailbox = LatestFrame::new();
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let mailbox = mailbox.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seq = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    seq += 1;
                    mailbox.publish(uniform_frame(seq));
                }
                seq
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let mailbox = mailbox.clone();
                thread::spawn(move || {
                    let mut last_seq = 0u64;
                    for _ in 0..2_000 {
                        if let Some(frame) = mailbox.latest() {
                            // 整帧像素必须一致, 不允许新旧帧混合
                            let expected = (frame.seq % 251) as u8;
                            assert!(frame.image.pixels().all(|p| p.0 == [expected; 3]));
                            // 同一读者看到的序号单调不减
                            assert!(frame.seq >= last_seq);
                            last_seq = frame.seq;
                        }
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        let written = writer.join().unwrap();
        assert!(written > 0);
        assert_eq!(mailbox.latest_seq(), Some(written));
    }
}
