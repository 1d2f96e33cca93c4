//! Pipeline 通信循环模块
//!
//! 负责后台通信线程的帧选择、收发重试、响应校验与失败升级。
//!
//! # 每轮循环
//!
//! 1. 帧选择：首轮或最大转速未知时强制查询最大转速（关键帧），
//!    否则先取命令队列，队列为空时按 [`QueryKind::POLL_CYCLE`] 轮询
//! 2. 追加 CRC（`tx_length` / `rx_length` 各加 2）
//! 3. flush → write → read，校验失败等待一个轮询间隔后重试
//! 4. 重试耗尽：链路标记为无响应（只在状态转换时告警），关键帧触发系统报警
//!    （每次断链最多一次）
//! 5. 无论结果如何，等待一个轮询间隔

use crate::command::CommandReceiver;
use crate::error::DriverError;
use crate::machine::{AlarmSink, SystemAlarm};
use crate::metrics::BusMetrics;
use crate::report::{MsgLevel, ReportSink, hex_frame};
use crate::state::SpindleContext;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use vfd_protocol::{
    DEFAULT_ADDRESS, MAX_MSG_SIZE, ModbusCommand, QueryKind, ResponseError, ResponseParser,
    VfdFeedback, VfdProtocol, validate_response,
};
use vfd_transport::{RtuTransport, TransportError};

/// 通信线程配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Modbus 从站地址
    pub address: u8,
    /// 轮询间隔（同时是重试间隔）；测试中可设为 0
    pub poll_interval: Duration,
    /// 单次读取超时
    pub response_timeout: Duration,
    /// 每个事务的最大尝试次数
    pub max_retries: u32,
    /// 失败时报告原始收发字节
    pub debug_frames: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            poll_interval: Duration::from_millis(200),
            response_timeout: Duration::from_millis(50),
            max_retries: 5,
            debug_frames: false,
        }
    }
}

/// 链路健康状态（两态锁存）
///
/// 告警只在 Responsive → Unresponsive 转换时发出一次，
/// 直到下一次成功的事务把它拉回 Responsive。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkHealth {
    #[default]
    Responsive,
    Unresponsive,
}

impl LinkHealth {
    /// 标记为有响应，返回是否发生了状态转换
    pub fn mark_responsive(&mut self) -> bool {
        let changed = *self == Self::Unresponsive;
        *self = Self::Responsive;
        changed
    }

    /// 标记为无响应，返回是否发生了状态转换
    pub fn mark_unresponsive(&mut self) -> bool {
        let changed = *self == Self::Responsive;
        *self = Self::Unresponsive;
        changed
    }

    pub fn is_responsive(self) -> bool {
        self == Self::Responsive
    }
}

/// 空闲轮询游标
///
/// 在 [`QueryKind::POLL_CYCLE`] 上循环，跳过型号不支持的查询。
#[derive(Debug, Clone, Default)]
pub struct PollCycle {
    index: usize,
}

impl PollCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一个要尝试的槽位
    pub fn index(&self) -> usize {
        self.index
    }

    /// 构建下一个轮询查询
    ///
    /// 从当前槽位开始最多检查一整圈；全部不支持时返回 `None`，游标不动。
    pub fn next(
        &mut self,
        protocol: &dyn VfdProtocol,
        cmd: &mut ModbusCommand,
    ) -> Option<(QueryKind, ResponseParser)> {
        let len = QueryKind::POLL_CYCLE.len();
        for offset in 0..len {
            let slot = (self.index + offset) % len;
            let kind = QueryKind::POLL_CYCLE[slot];
            if let Some(parser) = protocol.query(kind, cmd) {
                self.index = (slot + 1) % len;
                return Some((kind, parser));
            }
        }
        None
    }
}

/// 事务来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOrigin {
    /// 最大转速初始化查询
    Bootstrap,
    /// 命令队列
    Queued,
    /// 空闲轮询
    Poll(QueryKind),
}

/// 单轮循环的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 没有可执行的事务（队列为空且型号不支持任何轮询查询）
    Idle,
    /// 收到有效响应（且内容解析成功）
    Completed {
        origin: TransactionOrigin,
        attempts: u32,
    },
    /// 帧有效但内容不符合预期；不重试、不报警
    ParseFailed {
        origin: TransactionOrigin,
        attempts: u32,
    },
    /// 重试耗尽
    Failed {
        origin: TransactionOrigin,
        alarm_raised: bool,
    },
    /// 命令帧超出容量，被丢弃
    Dropped { origin: TransactionOrigin },
    /// 命令通道已断开，线程应退出
    Shutdown,
}

/// 通信线程与外界共享的句柄
#[derive(Clone)]
pub struct WorkerShared {
    pub ctx: Arc<SpindleContext>,
    pub reporter: Arc<dyn ReportSink>,
    pub alarm: Arc<dyn AlarmSink>,
    pub metrics: Arc<BusMetrics>,
}

struct Transaction {
    cmd: ModbusCommand,
    parser: Option<ResponseParser>,
    origin: TransactionOrigin,
}

/// 通信线程
///
/// 独占传输层；所有收发都在这里串行完成。
pub struct CommWorker<T: RtuTransport> {
    transport: T,
    commands: CommandReceiver,
    protocol: Arc<dyn VfdProtocol>,
    shared: WorkerShared,
    config: WorkerConfig,
    poll: PollCycle,
    health: LinkHealth,
    /// 本次断链期间已触发过报警
    alarm_latched: bool,
    first_iteration: bool,
    rx_buf: [u8; MAX_MSG_SIZE],
}

impl<T: RtuTransport> CommWorker<T> {
    pub fn new(
        transport: T,
        commands: CommandReceiver,
        protocol: Arc<dyn VfdProtocol>,
        shared: WorkerShared,
        config: WorkerConfig,
    ) -> Self {
        Self {
            transport,
            commands,
            protocol,
            shared,
            config,
            poll: PollCycle::new(),
            health: LinkHealth::Responsive,
            alarm_latched: false,
            first_iteration: true,
            rx_buf: [0; MAX_MSG_SIZE],
        }
    }

    pub fn health(&self) -> LinkHealth {
        self.health
    }

    /// 通信线程主循环
    ///
    /// `is_running` 变为 false 或命令通道断开时退出。
    pub fn run(mut self, is_running: Arc<AtomicBool>) {
        #[cfg(feature = "realtime")]
        {
            use thread_priority::*;

            match set_current_thread_priority(ThreadPriority::Max) {
                Ok(_) => {
                    info!("VFD comm thread priority set to MAX (realtime)");
                },
                Err(e) => {
                    warn!(
                        "Failed to set VFD comm thread priority: {}. \
                        On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                        e
                    );
                },
            }
        }

        info!(
            "VFD comm thread started ({}, address 0x{:02X})",
            self.protocol.name(),
            self.config.address
        );

        // Acquire: 看到 false 时必须看到门面在此之前的全部写入
        while is_running.load(Ordering::Acquire) {
            if self.step() == StepOutcome::Shutdown {
                trace!("VFD comm thread: command channel closed, exiting");
                break;
            }
            self.pace();
        }

        info!("VFD comm thread exited");
    }

    /// 执行一轮循环（不含末尾的轮询间隔等待）
    pub fn step(&mut self) -> StepOutcome {
        let transaction = match self.select() {
            Ok(Some(transaction)) => transaction,
            Ok(None) => return StepOutcome::Idle,
            Err(_) => return StepOutcome::Shutdown,
        };
        self.execute(transaction)
    }

    /// 帧选择
    ///
    /// 最大转速查询优先于队列和轮询；型号不支持该查询时不强制。
    fn select(&mut self) -> Result<Option<Transaction>, DriverError> {
        let first = std::mem::replace(&mut self.first_iteration, false);

        if first || self.shared.ctx.max_rpm() == 0 {
            let mut cmd = ModbusCommand::new(self.config.address);
            if let Some(parser) = self.protocol.query(QueryKind::MaxRpm, &mut cmd) {
                cmd.critical = true;
                return Ok(Some(Transaction {
                    cmd,
                    parser: Some(parser),
                    origin: TransactionOrigin::Bootstrap,
                }));
            }
        }

        if let Some(cmd) = self.commands.try_dequeue()? {
            return Ok(Some(Transaction {
                cmd,
                parser: None,
                origin: TransactionOrigin::Queued,
            }));
        }

        let mut cmd = ModbusCommand::new(self.config.address);
        Ok(self
            .poll
            .next(self.protocol.as_ref(), &mut cmd)
            .map(|(kind, parser)| Transaction {
                cmd,
                parser: Some(parser),
                origin: TransactionOrigin::Poll(kind),
            }))
    }

    fn execute(&mut self, mut transaction: Transaction) -> StepOutcome {
        let origin = transaction.origin;

        if let Err(e) = transaction.cmd.seal() {
            self.report(MsgLevel::Error, &format!("VFD command dropped: {}", e));
            return StepOutcome::Dropped { origin };
        }

        BusMetrics::bump(&self.shared.metrics.transactions_total);
        let max_retries = self.config.max_retries.max(1);

        for attempt in 1..=max_retries {
            if attempt > 1 {
                BusMetrics::bump(&self.shared.metrics.retries);
                debug!("RS485 retry {}/{} ({:?})", attempt, max_retries, origin);
            }

            match self.exchange(&transaction.cmd) {
                Ok(received) => {
                    let response = self.rx_buf;
                    let response = &response[..received.min(transaction.cmd.rx_length)];
                    match validate_response(
                        response,
                        transaction.cmd.rx_length,
                        self.config.address,
                    ) {
                        Ok(()) => return self.complete(&transaction, response, attempt),
                        Err(e) => self.note_invalid(&transaction.cmd, response, &e),
                    }
                },
                Err(e) => {
                    BusMetrics::bump(&self.shared.metrics.transport_errors);
                    warn!("RS485 transport error: {}", e);
                },
            }

            if attempt < max_retries {
                self.pace();
            }
        }

        self.escalate(&transaction)
    }

    /// 一次完整的半双工收发，返回读到的字节数
    fn exchange(&mut self, cmd: &ModbusCommand) -> Result<usize, TransportError> {
        self.transport.flush()?;
        self.transport.write(cmd.tx_bytes())?;
        self.transport
            .read(&mut self.rx_buf[..cmd.rx_length], self.config.response_timeout)
    }

    fn complete(
        &mut self,
        transaction: &Transaction,
        response: &[u8],
        attempts: u32,
    ) -> StepOutcome {
        let origin = transaction.origin;
        BusMetrics::bump(&self.shared.metrics.transactions_ok);
        if self.health.mark_responsive() {
            info!("Spindle RS485 responsive again");
        }
        self.alarm_latched = false;

        let Some(parser) = transaction.parser else {
            return StepOutcome::Completed { origin, attempts };
        };

        match parser(response) {
            Ok(feedback) => {
                if let VfdFeedback::MaxRpm(rpm) = feedback {
                    debug!("VFD reports max RPM {}", rpm);
                }
                self.shared.ctx.apply_feedback(feedback);
                StepOutcome::Completed { origin, attempts }
            },
            Err(e) => {
                BusMetrics::bump(&self.shared.metrics.parse_failures);
                debug!("VFD response rejected by parser ({:?}): {}", origin, e);
                self.report(
                    MsgLevel::Warning,
                    "Spindle RS485 did not give a satisfying response",
                );
                StepOutcome::ParseFailed { origin, attempts }
            },
        }
    }

    fn note_invalid(&self, cmd: &ModbusCommand, response: &[u8], error: &ResponseError) {
        let metrics = &self.shared.metrics;
        let counter = match error {
            ResponseError::NoResponse => &metrics.no_response,
            ResponseError::ForeignAddress { .. } => &metrics.foreign_frames,
            ResponseError::UnexpectedLength { .. } => &metrics.length_errors,
            ResponseError::Exception { .. } => &metrics.exception_responses,
            ResponseError::CrcMismatch => &metrics.crc_errors,
        };
        BusMetrics::bump(counter);
        debug!("RS485 attempt failed: {}", error);

        if self.config.debug_frames {
            self.report(MsgLevel::Info, &hex_frame("RS485 Tx:", cmd.tx_bytes()));
            self.report(MsgLevel::Info, &hex_frame("RS485 Rx:", response));
            self.report(MsgLevel::Info, &error.to_string());
        }
    }

    fn escalate(&mut self, transaction: &Transaction) -> StepOutcome {
        BusMetrics::bump(&self.shared.metrics.transactions_failed);
        let mut alarm_raised = false;

        if self.health.mark_unresponsive() {
            self.report(
                MsgLevel::Warning,
                &format!("Spindle RS485 Unresponsive {}", transaction.cmd.rx_length),
            );
        }

        // 链路已因轮询失败锁存为无响应时，关键帧失败仍然要报警；每次断链只报一次
        if transaction.cmd.critical && !self.alarm_latched {
            self.report(MsgLevel::Error, "Critical Spindle RS485 Unresponsive");
            self.shared.alarm.raise(SystemAlarm::SpindleControl);
            BusMetrics::bump(&self.shared.metrics.alarms_raised);
            self.alarm_latched = true;
            alarm_raised = true;
        }

        StepOutcome::Failed {
            origin: transaction.origin,
            alarm_raised,
        }
    }

    fn report(&self, level: MsgLevel, message: &str) {
        self.shared.reporter.report(level, message);
    }

    fn pace(&self) {
        if !self.config.poll_interval.is_zero() {
            spin_sleep::sleep(self.config.poll_interval);
        }
    }
}
