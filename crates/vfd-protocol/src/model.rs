//! VFD 能力模型
//!
//! 不同型号的变频器支持的查询各不相同。每种型号实现 [`VfdProtocol`]，
//! 对不支持的查询返回 `None`，通信线程会跳过它而不视为错误。

use crate::ProtocolError;
use crate::frame::ModbusCommand;
use crate::spindle::SpindleState;

/// 查询类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// 读取最大转速（初始化时强制执行）
    MaxRpm,
    /// 读取当前转速
    CurrentRpm,
    /// 读取当前转向
    CurrentDirection,
    /// 读取健康状态
    StatusOk,
}

impl QueryKind {
    /// 空闲轮询顺序
    pub const POLL_CYCLE: [QueryKind; 3] = [
        QueryKind::CurrentRpm,
        QueryKind::CurrentDirection,
        QueryKind::StatusOk,
    ];
}

/// 解析后的设备反馈
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfdFeedback {
    /// 设备报告的最大转速
    MaxRpm(u32),
    /// 设备报告的当前转速
    CurrentRpm(u32),
    /// 设备报告的当前转向
    Direction(SpindleState),
    /// 设备健康
    StatusOk,
}

/// 响应解析函数
///
/// 输入为已通过地址/长度/CRC 校验的完整响应（含 CRC）。
/// 返回 `Err` 表示帧有效但内容不符合预期（语义错误，不重试、不报警）。
pub type ResponseParser = fn(&[u8]) -> Result<VfdFeedback, ProtocolError>;

/// VFD 型号协议
///
/// 命令构建函数只负责写入请求体与期望长度（不含 CRC），
/// 地址字节已由调用方在 `ModbusCommand::new()` 中写好。
pub trait VfdProtocol: Send + Sync {
    /// 型号名称（用于日志）
    fn name(&self) -> &'static str;

    /// 构建运行/转向/停止命令
    fn direction_command(&self, state: SpindleState, cmd: &mut ModbusCommand);

    /// 构建转速命令
    ///
    /// `max_rpm` 为当前已知的最大转速，部分型号以其百分比表示速度。
    fn speed_command(&self, rpm: u32, max_rpm: u32, cmd: &mut ModbusCommand);

    /// 构建查询命令
    ///
    /// 不支持的查询返回 `None`，且不得修改 `cmd`。
    fn query(&self, kind: QueryKind, cmd: &mut ModbusCommand) -> Option<ResponseParser>;
}

/// 检查响应的功能码与最小长度（含 CRC）
pub(crate) fn expect_frame(
    response: &[u8],
    function: u8,
    min_len: usize,
) -> Result<(), ProtocolError> {
    if response.len() < min_len {
        return Err(ProtocolError::InvalidLength {
            expected: min_len,
            actual: response.len(),
        });
    }
    if response[1] != function {
        return Err(ProtocolError::UnexpectedFunction {
            expected: function,
            actual: response[1],
        });
    }
    Ok(())
}
