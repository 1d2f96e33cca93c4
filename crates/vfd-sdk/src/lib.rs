//! VFD SDK - RS-485 Modbus 变频器主轴 Rust SDK
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): CRC16、命令帧、响应校验、VFD 型号
//! - **传输层** (`transport`): 半双工 RS-485 字节流（serialport / mock）
//! - **驱动层** (`driver`): 通信线程、命令队列、状态同步、主轴门面
//!
//! # 快速开始
//!
//! ```no_run
//! use vfd_sdk::prelude::*;
//!
//! vfd_sdk::init_logger();
//! let config = VfdConfig::load("vfd.toml").unwrap();
//! let spindle = VfdSpindleBuilder::new().config(config).build();
//! spindle.set_state(SpindleState::Clockwise, 12000);
//! spindle.stop();
//! ```

pub use vfd_driver as driver;
pub use vfd_protocol as protocol;
pub use vfd_transport as transport;

pub mod prelude;

// --- 公共 API ---

pub use vfd_protocol::{H2a, ModbusCommand, ProtocolError, SpindleState, VfdProtocol};
pub use vfd_transport::{RtuTransport, SerialSettings, TransportError};

#[cfg(feature = "serial")]
pub use vfd_transport::SerialRtuTransport;

pub use vfd_driver::{
    AlarmSink, ConfigError, DriverError, MachineContext, MachineState, MetricsSnapshot, MsgLevel,
    ReportSink, SystemAlarm, TracingReporter, VfdConfig, VfdSpindle, VfdSpindleBuilder,
};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: Once = Once::new();

/// 初始化日志
///
/// 由 `RUST_LOG` 控制（默认 `info`），同时把 `log` 记录转发到 tracing。
/// 重复调用无副作用；已有全局 subscriber 时保留原有的。
pub fn init_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = tracing_log::LogTracer::init();

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_is_idempotent() {
        init_logger();
        init_logger();
        tracing::info!("logger ready");
    }
}
