//! # VFD Protocol
//!
//! RS-485 变频器（VFD）主轴的 Modbus-RTU 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `crc`: Modbus-RTU CRC16 校验
//! - `frame`: 命令帧（`ModbusCommand`）与响应校验
//! - `spindle`: 主轴状态定义
//! - `model`: VFD 能力模型（`VfdProtocol` trait、查询类型、反馈类型）
//! - `h2a`: H2A 系列变频器的具体实现
//!
//! ## 帧格式
//!
//! ```text
//! [address:1][function + payload:N][CRC-lo:1][CRC-hi:1]
//! ```
//!
//! 帧边界依赖串口的时间间隔，没有起止符。

pub mod crc;
pub mod frame;
pub mod h2a;
pub mod model;
pub mod spindle;

pub use crc::{crc16, verify_crc};
pub use frame::{MAX_MSG_SIZE, ModbusCommand, ResponseError, validate_response};
pub use h2a::H2a;
pub use model::{QueryKind, ResponseParser, VfdFeedback, VfdProtocol};
pub use spindle::SpindleState;

use thiserror::Error;

/// 默认 Modbus 从站地址
pub const DEFAULT_ADDRESS: u8 = 0x01;

/// Modbus 功能码：读保持寄存器
pub const FN_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Modbus 功能码：写单个寄存器
pub const FN_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 帧超出固定容量
    #[error("Frame overflow: {needed} bytes needed, capacity {capacity}")]
    FrameOverflow { needed: usize, capacity: usize },

    /// 响应功能码与请求不符
    #[error("Unexpected function code: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedFunction { expected: u8, actual: u8 },

    /// 响应长度不足以解析
    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 响应内容无法识别
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),
}
