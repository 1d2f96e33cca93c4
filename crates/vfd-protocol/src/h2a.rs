//! H2A 系列变频器
//!
//! 使用标准 Modbus 功能码：
//!
//! | 功能 | 功能码 | 寄存器 | 说明 |
//! |---|---|---|---|
//! | 运行/停止 | 0x06 | 0x2000 | 1 = 正转, 2 = 反转, 6 = 停止 |
//! | 频率给定 | 0x06 | 0x1000 | 最大转速的万分比（10000 = 100%） |
//! | 最大转速 | 0x03 | 0xB005 | 2 个寄存器（32 bit，大端） |
//! | 当前转速 | 0x03 | 0x700C | 2 个寄存器（32 bit，大端） |
//! | 运行状态 | 0x03 | 0x3000 | 1 = 正转, 2 = 反转, 3 = 停止 |
//!
//! 该型号没有单独的健康查询（`StatusOk` 不支持）。

use crate::frame::ModbusCommand;
use crate::model::{QueryKind, ResponseParser, VfdFeedback, VfdProtocol, expect_frame};
use crate::spindle::SpindleState;
use crate::{FN_READ_HOLDING_REGISTERS, FN_WRITE_SINGLE_REGISTER, ProtocolError};

/// 写单寄存器的回显长度（不含 CRC）
const WRITE_ECHO_LEN: usize = 6;

/// 读 2 个寄存器的响应长度（不含 CRC）
const READ_U32_LEN: usize = 7;

/// 读 1 个寄存器的响应长度（不含 CRC）
const READ_U16_LEN: usize = 5;

/// 频率给定的满量程
const SPEED_FULL_SCALE: u64 = 10_000;

/// H2A 变频器
#[derive(Debug, Clone, Copy, Default)]
pub struct H2a;

impl H2a {
    /// 创建 H2A 协议实例
    pub fn new() -> Self {
        Self
    }
}

impl VfdProtocol for H2a {
    fn name(&self) -> &'static str {
        "H2A"
    }

    fn direction_command(&self, state: SpindleState, cmd: &mut ModbusCommand) {
        let code = match state {
            SpindleState::Clockwise => 0x01,
            SpindleState::CounterClockwise => 0x02,
            SpindleState::Disabled => 0x06,
        };
        cmd.set_request(
            &[FN_WRITE_SINGLE_REGISTER, 0x20, 0x00, 0x00, code],
            WRITE_ECHO_LEN,
        );
    }

    fn speed_command(&self, rpm: u32, max_rpm: u32, cmd: &mut ModbusCommand) {
        let scaled = if max_rpm == 0 {
            0
        } else {
            (u64::from(rpm) * SPEED_FULL_SCALE / u64::from(max_rpm)).min(SPEED_FULL_SCALE)
        };
        let [hi, lo] = (scaled as u16).to_be_bytes();
        cmd.set_request(
            &[FN_WRITE_SINGLE_REGISTER, 0x10, 0x00, hi, lo],
            WRITE_ECHO_LEN,
        );
    }

    fn query(&self, kind: QueryKind, cmd: &mut ModbusCommand) -> Option<ResponseParser> {
        match kind {
            QueryKind::MaxRpm => {
                cmd.set_request(
                    &[FN_READ_HOLDING_REGISTERS, 0xB0, 0x05, 0x00, 0x02],
                    READ_U32_LEN,
                );
                Some(parse_max_rpm as ResponseParser)
            },
            QueryKind::CurrentRpm => {
                cmd.set_request(
                    &[FN_READ_HOLDING_REGISTERS, 0x70, 0x0C, 0x00, 0x02],
                    READ_U32_LEN,
                );
                Some(parse_current_rpm as ResponseParser)
            },
            QueryKind::CurrentDirection => {
                cmd.set_request(
                    &[FN_READ_HOLDING_REGISTERS, 0x30, 0x00, 0x00, 0x01],
                    READ_U16_LEN,
                );
                Some(parse_direction as ResponseParser)
            },
            QueryKind::StatusOk => None,
        }
    }
}

/// 读取响应中的寄存器数据（跳过地址、功能码、字节数）
fn register_data(response: &[u8], data_len: usize) -> Result<&[u8], ProtocolError> {
    expect_frame(response, FN_READ_HOLDING_REGISTERS, 3 + data_len + 2)?;
    if usize::from(response[2]) != data_len {
        return Err(ProtocolError::InvalidLength {
            expected: data_len,
            actual: usize::from(response[2]),
        });
    }
    Ok(&response[3..3 + data_len])
}

fn read_u32(response: &[u8]) -> Result<u32, ProtocolError> {
    let data = register_data(response, 4)?;
    Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
}

fn parse_max_rpm(response: &[u8]) -> Result<VfdFeedback, ProtocolError> {
    match read_u32(response)? {
        0 => Err(ProtocolError::UnexpectedPayload(
            "VFD reported a max RPM of zero".to_string(),
        )),
        rpm => Ok(VfdFeedback::MaxRpm(rpm)),
    }
}

fn parse_current_rpm(response: &[u8]) -> Result<VfdFeedback, ProtocolError> {
    read_u32(response).map(VfdFeedback::CurrentRpm)
}

fn parse_direction(response: &[u8]) -> Result<VfdFeedback, ProtocolError> {
    let data = register_data(response, 2)?;
    match u16::from_be_bytes([data[0], data[1]]) {
        1 => Ok(VfdFeedback::Direction(SpindleState::Clockwise)),
        2 => Ok(VfdFeedback::Direction(SpindleState::CounterClockwise)),
        3 => Ok(VfdFeedback::Direction(SpindleState::Disabled)),
        other => Err(ProtocolError::UnexpectedPayload(format!(
            "unknown run state 0x{other:04X}"
        ))),
    }
}
