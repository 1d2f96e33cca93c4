//! 总线指标
//!
//! 通信线程与门面更新、任意线程读取的原子计数器，不涉及总线访问。

use std::sync::atomic::{AtomicU64, Ordering};

/// RS-485 总线实时指标
///
/// # 使用示例
///
/// ```rust
/// use vfd_driver::BusMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BusMetrics::new();
/// metrics.transactions_total.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().transactions_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 开始的事务数（每个事务可能包含多次尝试）
    pub transactions_total: AtomicU64,
    /// 收到有效响应的事务数
    pub transactions_ok: AtomicU64,
    /// 重试次数（不含首次尝试）
    pub retries: AtomicU64,
    /// 超时未收到任何字节的尝试数
    pub no_response: AtomicU64,
    /// CRC 校验失败的尝试数
    pub crc_errors: AtomicU64,
    /// 收到其他从站报文的尝试数
    pub foreign_frames: AtomicU64,
    /// 长度不符的尝试数
    pub length_errors: AtomicU64,
    /// Modbus 异常响应数
    pub exception_responses: AtomicU64,
    /// 串口读写错误次数
    pub transport_errors: AtomicU64,
    /// 帧有效但内容不符合预期的次数
    pub parse_failures: AtomicU64,
    /// 所有重试失败的事务数
    pub transactions_failed: AtomicU64,
    /// 队列满导致丢弃的命令数
    pub queue_drops: AtomicU64,
    /// 触发的系统报警数
    pub alarms_raised: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 各计数器之间可能有微小的时间差，适合监控场景。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_total: self.transactions_total.load(Ordering::Relaxed),
            transactions_ok: self.transactions_ok.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            no_response: self.no_response.load(Ordering::Relaxed),
            crc_errors: self.crc_errors.load(Ordering::Relaxed),
            foreign_frames: self.foreign_frames.load(Ordering::Relaxed),
            length_errors: self.length_errors.load(Ordering::Relaxed),
            exception_responses: self.exception_responses.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            transactions_failed: self.transactions_failed.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            alarms_raised: self.alarms_raised.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.transactions_total,
            &self.transactions_ok,
            &self.retries,
            &self.no_response,
            &self.crc_errors,
            &self.foreign_frames,
            &self.length_errors,
            &self.exception_responses,
            &self.transport_errors,
            &self.parse_failures,
            &self.transactions_failed,
            &self.queue_drops,
            &self.alarms_raised,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub transactions_total: u64,
    pub transactions_ok: u64,
    pub retries: u64,
    pub no_response: u64,
    pub crc_errors: u64,
    pub foreign_frames: u64,
    pub length_errors: u64,
    pub exception_responses: u64,
    pub transport_errors: u64,
    pub parse_failures: u64,
    pub transactions_failed: u64,
    pub queue_drops: u64,
    pub alarms_raised: u64,
}

impl MetricsSnapshot {
    /// 事务成功率（百分比），没有事务时为 100
    pub fn success_rate(&self) -> f64 {
        if self.transactions_total == 0 {
            return 100.0;
        }
        self.transactions_ok as f64 / self.transactions_total as f64 * 100.0
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transactions {}/{} ok ({:.1}%), retries {}, no response {}, crc {}, foreign {}, length {}, exception {}, parse {}, queue drops {}, alarms {}",
            self.transactions_ok,
            self.transactions_total,
            self.success_rate(),
            self.retries,
            self.no_response,
            self.crc_errors,
            self.foreign_frames,
            self.length_errors,
            self.exception_responses,
            self.parse_failures,
            self.queue_drops,
            self.alarms_raised,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BusMetrics::new();
        BusMetrics::bump(&metrics.transactions_total);
        BusMetrics::bump(&metrics.transactions_total);
        BusMetrics::bump(&metrics.transactions_ok);
        BusMetrics::bump(&metrics.crc_errors);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_total, 2);
        assert_eq!(snapshot.crc_errors, 1);
        assert!((snapshot.success_rate() - 50.0).abs() < f64::EPSILON);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_success_rate_without_transactions() {
        assert!((MetricsSnapshot::default().success_rate() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        let snapshot = MetricsSnapshot {
            transactions_total: 4,
            transactions_ok: 3,
            ..Default::default()
        };
        assert!(snapshot.to_string().starts_with("transactions 3/4 ok (75.0%)"));
    }
}
