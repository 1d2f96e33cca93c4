//! # VFD Transport Layer
//!
//! RS-485 半双工传输抽象层，提供统一的字节流接口。
//!
//! 通信线程独占一个 [`RtuTransport`]，按 flush → write → read 的顺序
//! 串行完成每个事务；总线是半双工的，任何时刻只有一个事务在进行。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialRtuTransport;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBusHandle, MockReply, MockTransport, mock_bus};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("Transport closed")]
    Closed,
}

/// 半双工 Modbus-RTU 字节流
///
/// # 契约
///
/// - `flush()`: 丢弃收发缓冲区中残留的字节（上一次事务的迟到响应、总线噪声）
/// - `write()`: 完整写出一帧，返回前保证数据已交给硬件
/// - `read()`: 在 `timeout` 内尽量读满 `buf`，返回实际读到的字节数；
///   超时不是错误，返回已读到的部分（可能为 0）
pub trait RtuTransport: Send {
    fn flush(&mut self) -> Result<(), TransportError>;
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}

impl<T: RtuTransport + ?Sized> RtuTransport for Box<T> {
    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read(buf, timeout)
    }
}

/// 校验位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// 串口参数
///
/// 默认 9600 8N1，适用于绝大多数变频器。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// 波特率
    pub baud_rate: u32,
    /// 数据位（5-8）
    pub data_bits: u8,
    /// 校验位
    pub parity: Parity,
    /// 停止位（1 或 2）
    pub stop_bits: u8,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl SerialSettings {
    /// 列出所有不合法的参数
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.baud_rate == 0 {
            problems.push("RS485 baud rate must be non-zero".to_string());
        }
        if !(5..=8).contains(&self.data_bits) {
            problems.push(format!(
                "RS485 data bits must be 5-8, got {}",
                self.data_bits
            ));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            problems.push(format!(
                "RS485 stop bits must be 1 or 2, got {}",
                self.stop_bits
            ));
        }
        problems
    }

    /// 简写（如 `9600 8N1`）
    pub fn describe(&self) -> String {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        format!(
            "{} {}{}{}",
            self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}
