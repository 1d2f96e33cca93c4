//! 驱动层错误类型定义

use crate::config::ConfigError;
use thiserror::Error;
use vfd_transport::TransportError;

/// 驱动层错误类型
///
/// 这些错误不会穿过命令队列：队列里只有纯数据的 `ModbusCommand`，
/// 通信线程内的失败只通过 `ReportSink` / `AlarmSink` / `BusMetrics` 向外体现。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 命令队列已满
    #[error("Command queue full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// 命令通道已关闭（主轴门面已释放）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 主轴未就绪（初始化失败）
    #[error("VFD spindle not ready")]
    NotReady,

    /// 通信线程创建失败
    #[error("Failed to spawn VFD comm thread: {0}")]
    WorkerSpawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::QueueFull { capacity: 10 };
        assert_eq!(format!("{}", err), "Command queue full (capacity: 10)");

        let err = DriverError::ChannelClosed;
        assert_eq!(format!("{}", err), "Command channel closed");

        let err = DriverError::WorkerSpawn("out of threads".to_string());
        assert!(format!("{}", err).contains("out of threads"));
    }

    #[test]
    fn test_driver_error_from_transport() {
        let err: DriverError = TransportError::Closed.into();
        assert!(matches!(err, DriverError::Transport(TransportError::Closed)));
    }

    #[test]
    fn test_driver_error_from_config() {
        let err: DriverError = ConfigError::Invalid {
            problems: vec!["Undefined VFD_RS485_TXD_PIN".to_string()],
        }
        .into();
        assert!(format!("{}", err).contains("VFD_RS485_TXD_PIN"));
    }
}
