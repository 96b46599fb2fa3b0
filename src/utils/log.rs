/// 操作日志 (状态栏历史)
///
/// 最多保留500行, 每行 "[HH:MM:SS] 消息", 同时写入 tracing
use std::collections::VecDeque;
use tracing::info;

pub const MAX_LOG_LINES: usize = 500;

#[derive(Debug, Clone)]
pub struct OperatorLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for OperatorLog {
    fn default() -> Self {
        Self::new(MAX_LOG_LINES)
    }
}

impl OperatorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(MAX_LOG_LINES)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.push_line(format!("[{}] {}", stamp, message));
        info!("{}", message);
    }

    fn push_line(&mut self, line: String) {
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// 最近 n 行 (旧 → 新)
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
