//! 命令帧定义
//!
//! `ModbusCommand` 是控制线程与通信线程之间交换的工作单元：
//! 固定容量的字节缓冲区 + 发送/期望接收长度 + 关键性标志。

use crate::ProtocolError;
use crate::crc::{crc16, verify_crc};
use thiserror::Error;

/// 单帧最大字节数（含 CRC）
pub const MAX_MSG_SIZE: usize = 16;

/// Modbus 异常响应长度：地址 + 功能码|0x80 + 异常码 + CRC(2)
const EXCEPTION_RESPONSE_LEN: usize = 5;

/// Modbus-RTU 命令帧
///
/// # 长度约定
///
/// 由命令构建函数（见 [`VfdProtocol`](crate::VfdProtocol)）设置 `tx_length` / `rx_length`，
/// 二者都 **不含** 末尾 2 字节 CRC。通信线程在发送前调用 [`seal()`](Self::seal)，
/// 追加 CRC 并将两个长度各加 2。构建函数永远不写 CRC。
///
/// # 设计特性
///
/// - **Copy**：固定大小，放进有界队列时无堆分配
/// - **地址在前**：`msg[0]` 始终是从站地址
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusCommand {
    /// 帧数据（地址字节在前）
    pub msg: [u8; MAX_MSG_SIZE],
    /// 发送长度
    pub tx_length: usize,
    /// 期望响应长度
    pub rx_length: usize,
    /// 关键命令：重试耗尽后需要触发系统报警
    pub critical: bool,
}

impl ModbusCommand {
    /// 创建只含地址字节的空帧
    pub fn new(address: u8) -> Self {
        let mut msg = [0u8; MAX_MSG_SIZE];
        msg[0] = address;
        Self {
            msg,
            tx_length: 1,
            rx_length: 0,
            critical: false,
        }
    }

    /// 从站地址
    #[inline]
    pub fn address(&self) -> u8 {
        self.msg[0]
    }

    /// 写入请求体（功能码 + 数据，位于地址字节之后）并设置期望响应长度
    ///
    /// 超出容量的部分不会写入缓冲区，但长度会如实记录，
    /// 由 [`seal()`](Self::seal) 报告 [`ProtocolError::FrameOverflow`]。
    pub fn set_request(&mut self, body: &[u8], rx_length: usize) {
        let copy_len = body.len().min(MAX_MSG_SIZE - 1);
        self.msg[1..1 + copy_len].copy_from_slice(&body[..copy_len]);
        self.tx_length = 1 + body.len();
        self.rx_length = rx_length;
    }

    /// 追加 CRC（低字节在前），`tx_length` / `rx_length` 各加 2
    ///
    /// # Errors
    /// - `ProtocolError::FrameOverflow`: 请求或响应加上 CRC 后超出 [`MAX_MSG_SIZE`]
    pub fn seal(&mut self) -> Result<(), ProtocolError> {
        let needed = self.tx_length.max(self.rx_length) + 2;
        if needed > MAX_MSG_SIZE {
            return Err(ProtocolError::FrameOverflow {
                needed,
                capacity: MAX_MSG_SIZE,
            });
        }

        let [lo, hi] = crc16(&self.msg[..self.tx_length]).to_le_bytes();
        self.msg[self.tx_length] = lo;
        self.msg[self.tx_length + 1] = hi;
        self.tx_length += 2;
        self.rx_length += 2;
        Ok(())
    }

    /// 待发送的字节
    #[inline]
    pub fn tx_bytes(&self) -> &[u8] {
        &self.msg[..self.tx_length.min(MAX_MSG_SIZE)]
    }
}

/// 响应校验失败原因
///
/// 均属于瞬态传输错误：通信线程会在同一事务内重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// 超时内未收到任何字节
    #[error("RS485 No response")]
    NoResponse,

    /// 总线上其他设备的报文
    #[error("RS485 received message from other modbus device (address 0x{address:02X})")]
    ForeignAddress { address: u8 },

    /// 长度不符
    #[error("RS485 received message of unexpected length; expected {expected}, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },

    /// Modbus 异常响应（功能码最高位置 1）
    #[error("RS485 exception response: function 0x{function:02X}, code 0x{code:02X}")]
    Exception { function: u8, code: u8 },

    /// CRC 校验失败
    #[error("RS485 CRC check failed")]
    CrcMismatch,
}

/// 校验一个响应帧
///
/// 检查顺序：非空 → 地址 → 长度（识别异常响应）→ CRC。
///
/// # 参数
/// - `response`: 实际读到的字节
/// - `expected_len`: 期望长度（含 CRC）
/// - `address`: 配置的从站地址
pub fn validate_response(
    response: &[u8],
    expected_len: usize,
    address: u8,
) -> Result<(), ResponseError> {
    let Some(&first) = response.first() else {
        return Err(ResponseError::NoResponse);
    };

    if first != address {
        return Err(ResponseError::ForeignAddress { address: first });
    }

    if response.len() != expected_len {
        if response.len() == EXCEPTION_RESPONSE_LEN
            && response[1] & 0x80 != 0
            && verify_crc(response)
        {
            return Err(ResponseError::Exception {
                function: response[1] & 0x7F,
                code: response[2],
            });
        }
        return Err(ResponseError::UnexpectedLength {
            expected: expected_len,
            actual: response.len(),
        });
    }

    if !verify_crc(response) {
        return Err(ResponseError::CrcMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_command_has_address_only() {
        let cmd = ModbusCommand::new(0x07);
        assert_eq!(cmd.address(), 0x07);
        assert_eq!(cmd.tx_bytes(), &[0x07]);
        assert!(!cmd.critical);
    }

    #[test]
    fn test_seal_appends_crc_and_grows_lengths() {
        let mut cmd = ModbusCommand::new(0x01);
        cmd.set_request(&[0x03, 0x00, 0x00, 0x00, 0x0A], 5);
        assert_eq!(cmd.tx_length, 6);
        assert_eq!(cmd.rx_length, 5);

        cmd.seal().unwrap();
        assert_eq!(cmd.tx_length, 8);
        assert_eq!(cmd.rx_length, 7);
        assert_eq!(
            cmd.tx_bytes(),
            &[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]
        );
    }

    #[test]
    fn test_seal_rejects_oversized_request() {
        let mut cmd = ModbusCommand::new(0x01);
        cmd.set_request(&[0u8; MAX_MSG_SIZE], 4);
        let err = cmd.seal().unwrap_err();
        assert!(matches!(err, ProtocolError::FrameOverflow { .. }));
    }

    #[test]
    fn test_seal_rejects_oversized_response() {
        let mut cmd = ModbusCommand::new(0x01);
        cmd.set_request(&[0x03, 0x00, 0x00, 0x00, 0x01], MAX_MSG_SIZE);
        assert!(cmd.seal().is_err());
    }

    fn sealed(bytes: &[u8]) -> Vec<u8> {
        let mut out = bytes.to_vec();
        out.extend_from_slice(&crc16(bytes).to_le_bytes());
        out
    }

    #[test]
    fn test_validate_ok() {
        let resp = sealed(&[0x01, 0x06, 0x20, 0x00, 0x00, 0x01]);
        assert_eq!(validate_response(&resp, 8, 0x01), Ok(()));
    }

    #[test]
    fn test_validate_no_response() {
        assert_eq!(
            validate_response(&[], 8, 0x01),
            Err(ResponseError::NoResponse)
        );
    }

    #[test]
    fn test_validate_foreign_address() {
        let resp = sealed(&[0x02, 0x06, 0x20, 0x00, 0x00, 0x01]);
        assert_eq!(
            validate_response(&resp, 8, 0x01),
            Err(ResponseError::ForeignAddress { address: 0x02 })
        );
    }

    #[test]
    fn test_validate_short_read() {
        let resp = sealed(&[0x01, 0x06, 0x20, 0x00, 0x00, 0x01]);
        assert_eq!(
            validate_response(&resp[..5], 8, 0x01),
            Err(ResponseError::UnexpectedLength {
                expected: 8,
                actual: 5
            })
        );
    }

    #[test]
    fn test_validate_exception_response() {
        let resp = sealed(&[0x01, 0x83, 0x02]);
        assert_eq!(
            validate_response(&resp, 9, 0x01),
            Err(ResponseError::Exception {
                function: 0x03,
                code: 0x02
            })
        );
    }

    #[test]
    fn test_validate_crc_mismatch() {
        let mut resp = sealed(&[0x01, 0x06, 0x20, 0x00, 0x00, 0x01]);
        resp[7] ^= 0xFF;
        assert_eq!(
            validate_response(&resp, 8, 0x01),
            Err(ResponseError::CrcMismatch)
        );
    }
}
