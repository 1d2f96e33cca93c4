//! 集成测试公共设施
//!
//! 模拟一台 H2A 变频器挂在 mock 总线上，并提供直接驱动 `CommWorker::step()` 的测试台。

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use vfd_driver::{
    BusMetrics, CommWorker, CommandQueue, MachineContext, MemoryReporter, SpindleContext,
    WorkerConfig, WorkerShared,
};
use vfd_protocol::{
    ModbusCommand, ProtocolError, QueryKind, ResponseParser, SpindleState, VfdFeedback,
    VfdProtocol, crc16,
};
use vfd_transport::{MockBusHandle, MockReply, MockTransport, mock_bus};

pub const ADDRESS: u8 = 0x01;
pub const MAX_RETRIES: u32 = 5;

/// 追加 CRC（低字节在前）
pub fn with_crc(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.extend_from_slice(&crc16(bytes).to_le_bytes());
    out
}

/// 模拟变频器的寄存器
#[derive(Debug, Clone, Copy)]
pub struct FakeVfd {
    pub max_rpm: u32,
    pub current_rpm: u32,
    /// 1 = 正转, 2 = 反转, 3 = 停止
    pub run_state: u16,
}

impl Default for FakeVfd {
    fn default() -> Self {
        Self {
            max_rpm: 24000,
            current_rpm: 0,
            run_state: 3,
        }
    }
}

impl FakeVfd {
    /// 按 H2A 协议应答
    pub fn reply(&self, request: &[u8]) -> MockReply {
        let address = request[0];
        match request[1] {
            // 写单个寄存器：回显请求
            0x06 => MockReply::Bytes(request.to_vec()),
            0x03 => match (request[2], request[3]) {
                (0xB0, 0x05) => reply_u32(address, self.max_rpm),
                (0x70, 0x0C) => reply_u32(address, self.current_rpm),
                (0x30, 0x00) => reply_u16(address, self.run_state),
                _ => exception(address, 0x03, 0x02),
            },
            _ => MockReply::Silence,
        }
    }

    pub fn responder(self) -> impl FnMut(&[u8]) -> MockReply + Send + 'static {
        move |request| self.reply(request)
    }
}

pub fn reply_u32(address: u8, value: u32) -> MockReply {
    let [a, b, c, d] = value.to_be_bytes();
    MockReply::Bytes(with_crc(&[address, 0x03, 0x04, a, b, c, d]))
}

pub fn reply_u16(address: u8, value: u16) -> MockReply {
    let [hi, lo] = value.to_be_bytes();
    MockReply::Bytes(with_crc(&[address, 0x03, 0x02, hi, lo]))
}

/// Modbus 异常响应
pub fn exception(address: u8, function: u8, code: u8) -> MockReply {
    MockReply::Bytes(with_crc(&[address, function | 0x80, code]))
}

/// 请求是否为最大转速查询
pub fn is_max_rpm_query(request: &[u8]) -> bool {
    request[1] == 0x03 && request[2] == 0xB0 && request[3] == 0x05
}

/// 只支持健康状态查询的型号
pub struct StatusOnlyVfd;

fn parse_status(response: &[u8]) -> Result<VfdFeedback, ProtocolError> {
    match response[3..5] {
        [0x00, 0x00] => Ok(VfdFeedback::StatusOk),
        _ => Err(ProtocolError::UnexpectedPayload(format!(
            "status 0x{:02X}{:02X}",
            response[3], response[4]
        ))),
    }
}

impl VfdProtocol for StatusOnlyVfd {
    fn name(&self) -> &'static str {
        "status-only"
    }

    fn direction_command(&self, state: SpindleState, cmd: &mut ModbusCommand) {
        let code = u8::from(state);
        cmd.set_request(&[0x06, 0x00, 0x01, 0x00, code], 6);
    }

    fn speed_command(&self, rpm: u32, _max_rpm: u32, cmd: &mut ModbusCommand) {
        let [hi, lo] = (rpm.min(u32::from(u16::MAX)) as u16).to_be_bytes();
        cmd.set_request(&[0x06, 0x00, 0x02, hi, lo], 6);
    }

    fn query(&self, kind: QueryKind, cmd: &mut ModbusCommand) -> Option<ResponseParser> {
        match kind {
            QueryKind::StatusOk => {
                cmd.set_request(&[0x03, 0x00, 0x10, 0x00, 0x01], 5);
                Some(parse_status as ResponseParser)
            },
            _ => None,
        }
    }
}

/// 不支持任何查询的型号
pub struct WriteOnlyVfd;

impl VfdProtocol for WriteOnlyVfd {
    fn name(&self) -> &'static str {
        "write-only"
    }

    fn direction_command(&self, state: SpindleState, cmd: &mut ModbusCommand) {
        cmd.set_request(&[0x06, 0x00, 0x01, 0x00, u8::from(state)], 6);
    }

    fn speed_command(&self, _rpm: u32, _max_rpm: u32, cmd: &mut ModbusCommand) {
        cmd.set_request(&[0x06, 0x00, 0x02, 0x00, 0x00], 6);
    }

    fn query(&self, _kind: QueryKind, _cmd: &mut ModbusCommand) -> Option<ResponseParser> {
        None
    }
}

/// 通信线程测试台
pub struct Harness {
    pub worker: CommWorker<MockTransport>,
    pub queue: CommandQueue,
    pub bus: MockBusHandle,
    pub ctx: Arc<SpindleContext>,
    pub machine: Arc<MachineContext>,
    pub reporter: Arc<MemoryReporter>,
    pub metrics: Arc<BusMetrics>,
}

/// 零间隔、零超时的测试配置
pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        address: ADDRESS,
        poll_interval: Duration::ZERO,
        response_timeout: Duration::ZERO,
        max_retries: MAX_RETRIES,
        debug_frames: false,
    }
}

pub fn harness(protocol: Arc<dyn VfdProtocol>, max_rpm: u32) -> Harness {
    harness_with_config(protocol, max_rpm, fast_config())
}

pub fn harness_with_config(
    protocol: Arc<dyn VfdProtocol>,
    max_rpm: u32,
    config: WorkerConfig,
) -> Harness {
    let (transport, bus) = mock_bus();
    let (queue, commands) = CommandQueue::bounded(10);
    let ctx = Arc::new(SpindleContext::new(0, max_rpm));
    let machine = Arc::new(MachineContext::new());
    let reporter = Arc::new(MemoryReporter::new());
    let metrics = Arc::new(BusMetrics::new());

    let shared = WorkerShared {
        ctx: ctx.clone(),
        reporter: reporter.clone(),
        alarm: machine.clone(),
        metrics: metrics.clone(),
    };
    let worker = CommWorker::new(transport, commands, protocol, shared, config);

    Harness {
        worker,
        queue,
        bus,
        ctx,
        machine,
        reporter,
        metrics,
    }
}

/// H2A 速度命令（未加 CRC）
pub fn h2a_speed_command(rpm: u32, max_rpm: u32) -> ModbusCommand {
    let mut cmd = ModbusCommand::new(ADDRESS);
    vfd_protocol::H2a::new().speed_command(rpm, max_rpm, &mut cmd);
    cmd
}
