//! 会话后台线程: 设备打开/关闭/切换/探测都在这里执行, 结果以事件发回UI线程

use super::{
    FocusSettings, OpenRequest, SessionBinding, SessionManager, SessionPhase, SessionReport,
};
use crate::error::CamError;
use crate::input::{CameraIdentity, DeviceInfo, PropertyStatus, Resolution};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// UI → worker
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Open(OpenRequest),
    Close,
    SwitchCamera(OpenRequest),
    ChangeResolution(Resolution),
    SetAutofocus(bool),
    SetFocus(u8),
    /// 重新下发对焦设置 (快照后)
    ApplyFocus(FocusSettings),
    ProbeResolutions {
        index: usize,
        identity: CameraIdentity,
    },
    Scan,
    Shutdown,
}

/// worker → UI, 每条命令恰好对应一个事件 (Shutdown 除外)
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Opened(SessionReport),
    ResolutionChanged(SessionReport),
    Closed {
        status: String,
    },
    Failed {
        status: String,
        phase: SessionPhase,
        binding: Option<SessionBinding>,
    },
    Focus {
        notes: Vec<String>,
    },
    Probed {
        identity: CameraIdentity,
        resolutions: Vec<Resolution>,
    },
    Scanned(Vec<DeviceInfo>),
}

pub struct SessionWorker {
    cmd_tx: Sender<SessionCommand>,
    event_rx: Receiver<SessionEvent>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// 把会话管理器移交给后台线程
    pub fn spawn(manager: SessionManager) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || {
                run_worker(manager, &cmd_rx, &event_tx);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            cmd_tx,
            event_rx,
            done_rx,
            handle: Some(handle),
        })
    }

    /// 线程已退出时返回 false
    pub fn send(&self, cmd: SessionCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// 关闭会话并等待线程退出 (有界)
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.stop(timeout)
    }

    fn stop(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let _ = self.cmd_tx.send(SessionCommand::Shutdown);
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("⚠️ 会话线程未在 {:?} 内退出", timeout);
                false
            }
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.cmd_tx.send(SessionCommand::Shutdown);
        }
    }
}

fn run_worker(
    mut manager: SessionManager,
    cmd_rx: &Receiver<SessionCommand>,
    event_tx: &Sender<SessionEvent>,
) {
    info!("✅ 会话线程启动");
    while let Ok(cmd) = cmd_rx.recv() {
        let event = match cmd {
            SessionCommand::Shutdown => break,
            SessionCommand::Open(req) => {
                let result = manager.open(req);
                report_event(&manager, result)
            }
            SessionCommand::SwitchCamera(req) => {
                let result = manager.switch_camera(req);
                report_event(&manager, result)
            }
            SessionCommand::ChangeResolution(res) => match manager.change_resolution(res) {
                Ok(report) => SessionEvent::ResolutionChanged(report),
                Err(e) => failed(&manager, e),
            },
            SessionCommand::Close => SessionEvent::Closed {
                status: manager.close(),
            },
            SessionCommand::SetAutofocus(on) => SessionEvent::Focus {
                notes: status_note("Auto-focus", manager.set_autofocus(on)),
            },
            SessionCommand::SetFocus(value) => SessionEvent::Focus {
                notes: status_note("Manual focus", manager.set_focus(value)),
            },
            SessionCommand::ApplyFocus(focus) => SessionEvent::Focus {
                notes: manager.apply_focus(focus),
            },
            SessionCommand::ProbeResolutions { index, identity } => SessionEvent::Probed {
                resolutions: manager.probe_resolutions(index),
                identity,
            },
            SessionCommand::Scan => SessionEvent::Scanned(manager.scan_devices()),
        };
        if event_tx.send(event).is_err() {
            break;
        }
    }
    manager.close();
    info!("✅ 会话线程退出");
}

fn report_event(manager: &SessionManager, result: Result<SessionReport, CamError>) -> SessionEvent {
    match result {
        Ok(report) => SessionEvent::Opened(report),
        Err(e) => failed(manager, e),
    }
}

fn failed(manager: &SessionManager, err: CamError) -> SessionEvent {
    SessionEvent::Failed {
        status: err.to_string(),
        phase: manager.phase().clone(),
        binding: manager.binding().cloned(),
    }
}

/// 不支持/失败时给出一条状态提示
fn status_note(what: &str, status: PropertyStatus) -> Vec<String> {
    match status {
        PropertyStatus::Supported(_) => Vec::new(),
        PropertyStatus::Unsupported => vec![format!("{} not supported by this camera.", what)],
        PropertyStatus::Failed(reason) => vec![format!("{} failed: {}", what, reason)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{TestPatternBackend, DEFAULT_RESOLUTION};
    use crate::session::SessionConfig;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    fn worker() -> SessionWorker {
        let config = SessionConfig {
            open_settle: Duration::from_millis(1),
            reopen_settle: Duration::from_millis(1),
            live_resize_settle: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let manager = SessionManager::new(Arc::new(TestPatternBackend::with_count(2)), config);
        SessionWorker::spawn(manager).unwrap()
    }

    #[test]
    fn test_open_switch_close_events() {
        let worker = worker();
        worker.send(SessionCommand::Open(OpenRequest {
            index: 0,
            identity: CameraIdentity::from_index(0),
            resolution: DEFAULT_RESOLUTION,
            focus: FocusSettings::default(),
        }));
        match worker.recv_timeout(WAIT) {
            Some(SessionEvent::Opened(report)) => assert_eq!(report.binding.camera_index, 0),
            other => panic!("unexpected event: {:?}", other),
        }

        worker.send(SessionCommand::SwitchCamera(OpenRequest {
            index: 1,
            identity: CameraIdentity::from_index(1),
            resolution: DEFAULT_RESOLUTION,
            focus: FocusSettings::default(),
        }));
        match worker.recv_timeout(WAIT) {
            Some(SessionEvent::Opened(report)) => assert_eq!(report.binding.camera_index, 1),
            other => panic!("unexpected event: {:?}", other),
        }

        worker.send(SessionCommand::Close);
        assert!(matches!(
            worker.recv_timeout(WAIT),
            Some(SessionEvent::Closed { .. })
        ));
        assert!(worker.shutdown(WAIT));
    }

    #[test]
    fn test_failed_open_reports_phase() {
        let worker = worker();
        worker.send(SessionCommand::Open(OpenRequest {
            index: 7,
            identity: CameraIdentity::from_index(7),
            resolution: DEFAULT_RESOLUTION,
            focus: FocusSettings::default(),
        }));
        match worker.recv_timeout(WAIT) {
            Some(SessionEvent::Failed { phase, binding, .. }) => {
                assert!(matches!(phase, SessionPhase::Closed { error: Some(_) }));
                assert!(binding.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_scan_and_probe() {
        let worker = worker();
        worker.send(SessionCommand::Scan);
        match worker.recv_timeout(WAIT) {
            Some(SessionEvent::Scanned(devices)) => {
                assert_eq!(devices.len(), 2);
                assert_eq!(devices[1].uid, "idx:1");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        worker.send(SessionCommand::ProbeResolutions {
            index: 0,
            identity: CameraIdentity::from_index(0),
        });
        match worker.recv_timeout(WAIT) {
            Some(SessionEvent::Probed { resolutions, .. }) => {
                assert!(resolutions.contains(&DEFAULT_RESOLUTION));
                assert!(resolutions.contains(&Resolution::new(1280, 720)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
