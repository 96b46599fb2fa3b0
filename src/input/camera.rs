//! 摄像头输入模块 - 基于 FFmpeg 的本地摄像头帧源
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use super::capture::BoundedJoin;
use super::devices::DeviceInfo;
use super::source::{CameraBackend, FrameSource};
use super::types::{Frame, FrameProperty, PropertyStatus, Resolution};
use crate::error::{CamError, CamResult};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 首帧等待时间
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(3);
/// 单次读帧最长等待
const READ_TIMEOUT: Duration = Duration::from_millis(200);
/// 释放时等待解码线程关闭设备的最长时间
const RELEASE_TIMEOUT: Duration = Duration::from_secs(1);
const FRAMERATE: &str = "30";

/// 获取可用的摄像头设备名称
pub fn camera_device_names() -> Vec<String> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}

/// FFmpeg 摄像头后端
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, index: usize, requested: Resolution) -> CamResult<Box<dyn FrameSource>> {
        let names = camera_device_names();
        let name = names.get(index).cloned().ok_or_else(|| CamError::DeviceOpen {
            index,
            reason: "no such device".to_string(),
        })?;
        let camera = FfmpegCamera::start(index, &name, requested)?;
        Ok(Box::new(camera))
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        camera_device_names()
            .into_iter()
            .enumerate()
            .map(|(index, name)| DeviceInfo {
                index,
                uid: String::new(),
                name,
                available: true,
                manual_focus: false,
            })
            .collect()
    }
}

/// 格式化摄像头URL - 根据平台选择
fn format_camera_url(index: usize, name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        let _ = index;
        format!("video={}", name)
    }
    #[cfg(target_os = "linux")]
    {
        let _ = name;
        format!("/dev/video{}", index)
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        let _ = name;
        format!("{}", index)
    }
}

fn input_format() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dshow" // DirectShow
    }
    #[cfg(target_os = "macos")]
    {
        "avfoundation" // AVFoundation
    }
    #[cfg(target_os = "linux")]
    {
        "v4l2" // Video4Linux2
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "video4linux2"
    }
}

/// FFmpeg 摄像头句柄
///
/// 解码线程持续把最新帧塞进容量为1的通道, read_frame 从通道取帧
pub struct FfmpegCamera {
    index: usize,
    frames: Receiver<RgbImage>,
    abort: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    size: Arc<Mutex<Option<Resolution>>>,
    decoder: Option<BoundedJoin>,
    seq: u64,
}

impl FfmpegCamera {
    pub fn start(index: usize, name: &str, requested: Resolution) -> CamResult<Self> {
        let url = format_camera_url(index, name);
        info!("📷 打开摄像头 [{}] {} ({}) @ {}", index, name, url, requested);

        let (frame_tx, frame_rx) = bounded::<RgbImage>(1);
        let (status_tx, status_rx) = bounded::<Result<(), String>>(1);
        let abort = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let size = Arc::new(Mutex::new(None));

        let filter = RgbFrameFilter {
            tx: frame_tx,
            drain: frame_rx.clone(),
            abort: abort.clone(),
            size: size.clone(),
            total_frames: 0,
            dropped_frames: 0,
        };
        let thread_finished = finished.clone();
        let video_size = requested.to_string();

        let decoder = BoundedJoin::spawn(format!("ffmpeg-camera-{}", index), move || {
            let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
            let pipe = pipe.filter("rgb", Box::new(filter));
            let out = create_null_output().add_frame_pipeline(pipe);

            let input = Input::new(url.as_str())
                .set_format(input_format())
                .set_input_opts(
                    [("framerate", FRAMERATE), ("video_size", video_size.as_str())].into(),
                );

            let ctx = match FfmpegContext::builder()
                .input(input)
                .filter_desc("format=yuv420p")
                .output(out)
                .build()
            {
                Ok(c) => c,
                Err(e) => {
                    let _ = status_tx.send(Err(format!("构建失败: {}", e)));
                    thread_finished.store(true, Ordering::Release);
                    return;
                }
            };

            let sch = match ctx.start() {
                Ok(s) => s,
                Err(e) => {
                    let _ = status_tx.send(Err(format!("启动失败: {}", e)));
                    thread_finished.store(true, Ordering::Release);
                    return;
                }
            };
            let _ = status_tx.send(Ok(()));
            let _ = sch.wait();
            debug!("📹 摄像头解码循环结束");
            thread_finished.store(true, Ordering::Release);
        })
        .map_err(|e| CamError::DeviceOpen {
            index,
            reason: e.to_string(),
        })?;

        let mut camera = Self {
            index,
            frames: frame_rx,
            abort,
            finished,
            size,
            decoder: Some(decoder),
            seq: 0,
        };

        // 构建/启动失败立即返回
        match status_rx.recv_timeout(FIRST_FRAME_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                camera.release();
                return Err(CamError::DeviceOpen { index, reason });
            }
            Err(_) => {
                camera.release();
                return Err(CamError::DeviceOpen {
                    index,
                    reason: "timed out starting capture".to_string(),
                });
            }
        }

        // 等首帧确定实际分辨率
        let mut waited = Duration::ZERO;
        while camera.current_size().is_none() && waited < FIRST_FRAME_TIMEOUT {
            if camera.finished.load(Ordering::Acquire) {
                camera.release();
                return Err(CamError::DeviceOpen {
                    index,
                    reason: "capture ended before first frame".to_string(),
                });
            }
            thread::sleep(Duration::from_millis(10));
            waited += Duration::from_millis(10);
        }
        info!("✅ 摄像头连接成功, 实际分辨率: {:?}", camera.current_size());
        Ok(camera)
    }

    fn current_size(&self) -> Option<Resolution> {
        *self.size.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl FrameSource for FfmpegCamera {
    fn is_opened(&self) -> bool {
        !self.abort.load(Ordering::Acquire) && !self.finished.load(Ordering::Acquire)
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.is_opened() {
            return None;
        }
        let image = self.frames.recv_timeout(READ_TIMEOUT).ok()?;
        self.seq += 1;
        Some(Frame::new(image, self.seq))
    }

    fn get_property(&mut self, prop: FrameProperty) -> PropertyStatus {
        match prop {
            FrameProperty::Width => self
                .current_size()
                .map(|s| PropertyStatus::Supported(s.width as f64))
                .unwrap_or(PropertyStatus::Failed("no frame yet".to_string())),
            FrameProperty::Height => self
                .current_size()
                .map(|s| PropertyStatus::Supported(s.height as f64))
                .unwrap_or(PropertyStatus::Failed("no frame yet".to_string())),
            FrameProperty::FpsHint => PropertyStatus::Supported(30.0),
            _ => PropertyStatus::Unsupported,
        }
    }

    /// 输入参数在打开时固定, 运行中不可修改
    fn set_property(&mut self, _prop: FrameProperty, _value: f64) -> PropertyStatus {
        PropertyStatus::Unsupported
    }

    fn release(&mut self) {
        if self.abort.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("🛑 释放摄像头 {}", self.index);
        // 解码线程在下一帧时退出并关闭设备, 等它结束后同一设备才能重新打开
        if let Some(mut decoder) = self.decoder.take() {
            if !decoder.join_within(RELEASE_TIMEOUT) {
                warn!(
                    "⚠️ 摄像头 {} 解码线程未在 {:?} 内退出, 设备可能仍被占用",
                    self.index, RELEASE_TIMEOUT
                );
            }
        }
    }
}

impl Drop for FfmpegCamera {
    fn drop(&mut self) {
        self.release();
    }
}

// ========== 帧过滤器 ==========

/// YUV420P → RGB 帧过滤器
struct RgbFrameFilter {
    tx: Sender<RgbImage>,
    drain: Receiver<RgbImage>,
    abort: Arc<AtomicBool>,
    size: Arc<Mutex<Option<Resolution>>>,
    total_frames: usize,
    dropped_frames: usize,
}

impl FrameFilter for RgbFrameFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: ez_ffmpeg::Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<ez_ffmpeg::Frame>, String> {
        if self.abort.load(Ordering::Acquire) {
            return Err("camera released".to_string());
        }

        unsafe {
            self.total_frames += 1;

            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 || w > 8192 || h > 8192 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize).div_ceil(2) {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut buffer = vec![0u8; (w * h * 3) as usize];
            yuv420p_to_rgb(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut buffer,
                w as usize,
                h as usize,
            );

            let Some(image) = RgbImage::from_raw(w, h, buffer) else {
                self.dropped_frames += 1;
                return Ok(None);
            };

            *self.size.lock().unwrap_or_else(|p| p.into_inner()) = Some(Resolution::new(w, h));

            // 通道已满时丢掉旧帧, 只保留最新
            if let Err(TrySendError::Full(image)) = self.tx.try_send(image) {
                let _ = self.drain.try_recv();
                let _ = self.tx.try_send(image);
            }
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!(
            "✅ 解码线程退出 (总帧{} | 丢弃{})",
            self.total_frames, self.dropped_frames
        );
    }
}

/// 标量YUV转换 (BT.601, 定点系数×128)
#[inline]
#[allow(clippy::too_many_arguments)]
unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}
