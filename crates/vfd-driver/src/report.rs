//! 报告出口
//!
//! 通信线程与门面的所有告警文本都经过 [`ReportSink`]。
//! 默认实现 [`TracingReporter`] 转发到 `tracing`（target `vfd::report`）。

use parking_lot::Mutex;

/// 消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MsgLevel {
    /// 不输出
    None,
    Error,
    Warning,
    Info,
    Debug,
    Verbose,
}

/// 报告出口
pub trait ReportSink: Send + Sync {
    fn report(&self, level: MsgLevel, message: &str);
}

/// 转发到 tracing 的报告出口
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ReportSink for TracingReporter {
    fn report(&self, level: MsgLevel, message: &str) {
        match level {
            MsgLevel::None => {},
            MsgLevel::Error => tracing::error!(target: "vfd::report", "{}", message),
            MsgLevel::Warning => tracing::warn!(target: "vfd::report", "{}", message),
            MsgLevel::Info => tracing::info!(target: "vfd::report", "{}", message),
            MsgLevel::Debug => tracing::debug!(target: "vfd::report", "{}", message),
            MsgLevel::Verbose => tracing::trace!(target: "vfd::report", "{}", message),
        }
    }
}

/// 记录到内存的报告出口
///
/// 用于测试与 CLI 汇总输出。
#[derive(Debug, Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<(MsgLevel, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有已记录的消息
    pub fn messages(&self) -> Vec<(MsgLevel, String)> {
        self.messages.lock().clone()
    }

    /// 包含 `needle` 的消息数量
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count_containing(needle) > 0
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl ReportSink for MemoryReporter {
    fn report(&self, level: MsgLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}

/// 把帧格式化为 `"<prefix> 01 06 20 00"`
pub fn hex_frame(prefix: &str, bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return prefix.to_string();
    }
    let octets: Vec<String> = bytes.chunks(1).map(hex::encode_upper).collect();
    format!("{} {}", prefix, octets.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_frame() {
        assert_eq!(
            hex_frame("RS485 Tx:", &[0x01, 0x06, 0x20, 0x00]),
            "RS485 Tx: 01 06 20 00"
        );
        assert_eq!(hex_frame("RS485 Rx:", &[]), "RS485 Rx:");
        assert_eq!(hex_frame("RS485 Rx:", &[0xAB, 0x0F]), "RS485 Rx: AB 0F");
    }

    #[test]
    fn test_memory_reporter() {
        let reporter = MemoryReporter::new();
        reporter.report(MsgLevel::Warning, "VFD Queue Full");
        reporter.report(MsgLevel::Info, "VFD Queue Full");
        reporter.report(MsgLevel::Error, "Critical Spindle RS485 Unresponsive");

        assert_eq!(reporter.count_containing("Queue Full"), 2);
        assert!(reporter.contains("Critical"));
        assert_eq!(reporter.messages()[2].0, MsgLevel::Error);

        reporter.clear();
        assert!(reporter.messages().is_empty());
    }

    #[test]
    fn test_level_order() {
        assert!(MsgLevel::Error < MsgLevel::Warning);
        assert!(MsgLevel::Info < MsgLevel::Verbose);
    }

    #[test]
    fn test_tracing_reporter_without_subscriber() {
        // 没有安装 subscriber 时只是丢弃
        TracingReporter.report(MsgLevel::Info, "VFD RS485  Tx:17 Rx:4 RTS:16");
        TracingReporter.report(MsgLevel::None, "ignored");
    }
}
