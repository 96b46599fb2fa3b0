/// 采集循环 (Capture Loop)
///
/// 独立工作线程: 读帧 → 发布到共享槽 → 统计FPS → 节流请求刷新
/// - FpsCounter: ≥1秒窗口计算帧率
/// - RefreshThrottle: 刷新请求节流 (间隔 + 忙碌时合并)
/// - RefreshGate: 渲染进行中标志
use super::clock::Clock;
use super::mailbox::LatestFrame;
use super::source::{lock_source, SharedSource};
use super::types::FrameProperty;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ========== FPS统计 ==========

/// 每个≥1秒的窗口结束时更新一次帧率
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
    fps: f64,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            fps: 0.0,
        }
    }

    /// 记录一帧, 窗口结束时返回新的帧率
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f64 / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
            Some(self.fps)
        } else {
            None
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

// ========== 刷新节流 ==========

/// 刷新请求节流: 与上次请求间隔不足 interval 时不发, 渲染忙时不发
#[derive(Debug, Clone)]
pub struct RefreshThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl RefreshThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn should_emit(&mut self, now: Instant, busy: bool) -> bool {
        if busy {
            return false;
        }
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// 渲染进行中标志
#[derive(Debug, Default)]
pub struct RefreshGate {
    busy: AtomicBool,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 抢占渲染权, 已有渲染进行中返回 None
    pub fn try_begin(&self) -> Option<RefreshGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard { gate: self })
    }
}

/// 离开作用域时清除忙碌标志
pub struct RefreshGuard<'a> {
    gate: &'a RefreshGate,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// 刷新请求 (携带触发时的帧序号)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    pub seq: u64,
}

// ========== 采集统计 ==========

/// 采集线程写入, UI线程读取
#[derive(Debug)]
pub struct CaptureStats {
    fps_bits: AtomicU64,
    frames: AtomicU64,
    focus_readback: AtomicI32,
    poll_focus: AtomicBool,
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self {
            fps_bits: AtomicU64::new(0f64.to_bits()),
            frames: AtomicU64::new(0),
            focus_readback: AtomicI32::new(-1),
            poll_focus: AtomicBool::new(false),
        }
    }
}

impl CaptureStats {
    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }

    pub fn set_fps(&self, fps: f64) {
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// 自动对焦时读回的对焦值, 未读到时为 None
    pub fn focus_readback(&self) -> Option<i32> {
        let v = self.focus_readback.load(Ordering::Relaxed);
        (v >= 0).then_some(v)
    }

    /// 自动对焦开启时采集线程每秒读一次对焦值
    pub fn set_poll_focus(&self, on: bool) {
        self.poll_focus.store(on, Ordering::Relaxed);
        if !on {
            self.focus_readback.store(-1, Ordering::Relaxed);
        }
    }

    pub fn reset(&self) {
        self.set_fps(0.0);
        self.frames.store(0, Ordering::Relaxed);
        self.focus_readback.store(-1, Ordering::Relaxed);
    }
}

// ========== 采集线程 ==========

/// 采集线程所需的共享资源
#[derive(Clone)]
pub struct CaptureContext {
    pub mailbox: LatestFrame,
    pub stats: Arc<CaptureStats>,
    pub gate: Arc<RefreshGate>,
    pub refresh_tx: Sender<RefreshRequest>,
    pub clock: Arc<dyn Clock>,
    pub refresh_interval: Duration,
    pub read_retry_delay: Duration,
}

/// 带退出信号的线程句柄, 支持有界等待
pub struct BoundedJoin {
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl BoundedJoin {
    /// 在命名线程里运行 f, 返回 (包括 panic) 时发出退出信号
    pub fn spawn<F>(name: String, f: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = bounded::<()>(1);
        let handle = thread::Builder::new().name(name).spawn(move || {
            f();
            let _ = done_tx.send(());
        })?;
        Ok(Self {
            done_rx,
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// 等待至多 timeout, 超时则放弃句柄 (线程自行退出)
    pub fn join_within(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// 采集线程句柄
pub struct CaptureLoop {
    stop: Arc<AtomicBool>,
    worker: BoundedJoin,
}

impl CaptureLoop {
    /// 启动采集线程
    pub fn spawn(source: SharedSource, ctx: CaptureContext) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let worker = BoundedJoin::spawn("capture".to_string(), move || {
            info!("✅ 采集线程启动");
            run_capture(&source, &ctx, &thread_stop);
            info!("✅ 采集线程退出");
        })?;

        Ok(Self { stop, worker })
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// 请求停止并等待至多 timeout, 超时则放弃等待 (线程自行退出)
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::Release);
        let joined = self.worker.join_within(timeout);
        if !joined {
            warn!("⚠️ 采集线程未在 {:?} 内退出, 放弃等待", timeout);
        }
        joined
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn run_capture(source: &SharedSource, ctx: &CaptureContext, stop: &AtomicBool) {
    let mut fps = FpsCounter::new(ctx.clock.now());
    let mut throttle = RefreshThrottle::new(ctx.refresh_interval);
    let mut seq = 0u64;
    let mut misses = 0u64;

    while !stop.load(Ordering::Acquire) {
        // 单次读帧的 panic 不应终止线程
        let read = panic::catch_unwind(AssertUnwindSafe(|| lock_source(source).read_frame()));

        let mut frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                misses += 1;
                if misses % 200 == 1 {
                    debug!("⏳ 暂无可用帧 (累计 {} 次)", misses);
                }
                thread::sleep(ctx.read_retry_delay);
                continue;
            }
            Err(_) => {
                warn!("❌ 读帧时发生异常, 已跳过");
                thread::sleep(ctx.read_retry_delay);
                continue;
            }
        };

        // 停止后才返回的帧 (例如卡住的读帧) 不再发布
        if stop.load(Ordering::Acquire) {
            break;
        }

        seq += 1;
        frame.seq = seq;
        ctx.mailbox.publish(frame);
        ctx.stats.frames.fetch_add(1, Ordering::Relaxed);

        let now = ctx.clock.now();
        if let Some(current) = fps.tick(now) {
            ctx.stats.set_fps(current);
            debug!("📺 采集统计: {:.1}fps | 累计{}帧", current, seq);

            if ctx.stats.poll_focus.load(Ordering::Relaxed) {
                let focus = lock_source(source).get_property(FrameProperty::Focus);
                if let Some(v) = focus.value() {
                    ctx.stats.focus_readback.store(v as i32, Ordering::Relaxed);
                }
            }
        }

        if throttle.should_emit(now, ctx.gate.is_busy()) {
            // 满了说明已有待处理的刷新, 直接合并
            match ctx.refresh_tx.try_send(RefreshRequest { seq }) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    debug!("🛑 刷新通道已关闭");
                }
            }
        }
    }
}
