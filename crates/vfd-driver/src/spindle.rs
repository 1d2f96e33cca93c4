//! VFD 主轴门面
//!
//! 运动控制层唯一调用的接口。所有方法只构建命令帧并入队，从不访问总线；
//! 只有启停时的转速稳定等待会阻塞调用线程。

use crate::command::{CommandQueue, CommandReceiver};
use crate::config::VfdConfig;
use crate::error::DriverError;
use crate::machine::{AlarmSink, MachineContext, MachineState};
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::pipeline::{CommWorker, WorkerConfig, WorkerShared};
use crate::report::{MsgLevel, ReportSink};
use crate::state::SpindleContext;
use crate::status::StatusReport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};
use vfd_protocol::{ModbusCommand, SpindleState, VfdProtocol};
use vfd_transport::RtuTransport;

/// 通信线程未能正常退出的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinFailure {
    TimedOut,
    Panicked,
}

/// 在 `timeout` 内等待线程结束
///
/// 超时后放弃等待，线程被分离。
fn join_within(handle: JoinHandle<()>, timeout: Duration) -> Result<(), JoinFailure> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(JoinFailure::TimedOut);
        }
        std::thread::sleep(JOIN_POLL_INTERVAL);
    }
    handle.join().map_err(|_| JoinFailure::Panicked)
}

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// 计算实际下发的转速
///
/// 先按倍率缩放，再限幅：
/// - `min_rpm >= max_rpm`（退化配置）或缩放后 `>= max_rpm`：取 `max_rpm`
/// - 非零且 `<= min_rpm`：取 `min_rpm`（非零请求不会变成低于下限的堵转转速）
/// - 0 保持为 0
pub fn clamp_rpm(requested: u32, override_percent: u8, min_rpm: u32, max_rpm: u32) -> u32 {
    let scaled = u64::from(requested) * u64::from(override_percent) / 100;
    let scaled = u32::try_from(scaled).unwrap_or(u32::MAX);

    if min_rpm >= max_rpm || scaled >= max_rpm {
        max_rpm
    } else if scaled != 0 && scaled <= min_rpm {
        min_rpm
    } else {
        scaled
    }
}

/// 通信线程等待退出的上限
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// RS-485 VFD 主轴
///
/// 除 `reinit()` 外所有方法都只需要 `&self`，可以放进 `Arc` 在线程间共享。
///
/// 由 [`VfdSpindleBuilder`](crate::VfdSpindleBuilder) 创建。
pub struct VfdSpindle {
    protocol: Arc<dyn VfdProtocol>,
    queue: CommandQueue,
    ctx: Arc<SpindleContext>,
    machine: Arc<MachineContext>,
    reporter: Arc<dyn ReportSink>,
    alarm: Arc<dyn AlarmSink>,
    metrics: Arc<BusMetrics>,
    address: u8,
    spinup_delay: Duration,
    spindown_delay: Duration,
    /// 尚未交给通信线程的传输层与消费端
    parked: Mutex<Option<(Box<dyn RtuTransport>, CommandReceiver)>>,
    worker: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

/// 组装 `VfdSpindle` 所需的部件（由 builder 填写）
pub(crate) struct SpindleParts {
    pub protocol: Arc<dyn VfdProtocol>,
    pub machine: Arc<MachineContext>,
    pub reporter: Arc<dyn ReportSink>,
    pub alarm: Arc<dyn AlarmSink>,
    pub queue_capacity: usize,
}

impl VfdSpindle {
    /// 组装一个未就绪的主轴，不启动通信线程
    pub(crate) fn assemble(parts: SpindleParts, transport: Option<Box<dyn RtuTransport>>) -> Self {
        let (queue, commands) = CommandQueue::bounded(parts.queue_capacity);
        Self {
            protocol: parts.protocol,
            queue,
            ctx: Arc::new(SpindleContext::default()),
            machine: parts.machine,
            reporter: parts.reporter,
            alarm: parts.alarm,
            metrics: Arc::new(BusMetrics::new()),
            address: vfd_protocol::DEFAULT_ADDRESS,
            spinup_delay: Duration::ZERO,
            spindown_delay: Duration::ZERO,
            parked: Mutex::new(transport.map(|t| (t, commands))),
            worker: None,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// （重新）初始化
    ///
    /// 检查配置、刷新转速上下限与等待时间、报告引脚分配。
    /// 通信线程只在尚未运行时启动，重复调用不会创建第二个线程。
    /// 返回主轴是否就绪。
    pub fn reinit(&mut self, config: &VfdConfig) -> bool {
        self.report(MsgLevel::Info, "Initializing RS485 VFD spindle");

        let problems = config.problems();
        if !problems.is_empty() {
            for problem in &problems {
                self.report(MsgLevel::Info, problem);
            }
            self.report(MsgLevel::Info, "RS485 VFD spindle errors");
            self.ctx.set_ready(false);
            return false;
        }

        if self.worker.is_some() && config.rs485.address != self.address {
            self.report(
                MsgLevel::Warning,
                "VFD RS485 address change requires a restart",
            );
        } else {
            self.address = config.rs485.address;
        }

        self.ctx
            .set_rpm_bounds(config.spindle.min_rpm, config.spindle.max_rpm);
        self.ctx.set_current_rpm(0);
        self.ctx.set_current_state(SpindleState::Disabled);
        self.spinup_delay = config.spinup_delay();
        self.spindown_delay = config.spindown_delay();

        if let Err(e) = self.ensure_worker(config.worker_config()) {
            self.report(MsgLevel::Error, &format!("RS485 VFD spindle errors: {}", e));
            self.ctx.set_ready(false);
            return false;
        }

        self.report(MsgLevel::Info, &config.pin_message());
        self.ctx.set_ready(true);
        true
    }

    /// 通信线程未运行时启动它
    fn ensure_worker(&mut self, config: WorkerConfig) -> Result<(), DriverError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let Some((transport, commands)) = self.parked.get_mut().take() else {
            return Err(DriverError::NotReady);
        };

        let worker = CommWorker::new(
            transport,
            commands,
            self.protocol.clone(),
            WorkerShared {
                ctx: self.ctx.clone(),
                reporter: self.reporter.clone(),
                alarm: self.alarm.clone(),
                metrics: self.metrics.clone(),
            },
            config,
        );

        self.is_running.store(true, Ordering::Release);
        let is_running = self.is_running.clone();
        let handle = std::thread::Builder::new()
            .name("vfd-comm".into())
            .spawn(move || worker.run(is_running))
            .map_err(|e| {
                self.is_running.store(false, Ordering::Release);
                DriverError::WorkerSpawn(e.to_string())
            })?;

        self.worker = Some(handle);
        Ok(())
    }

    /// 设置主轴状态与转速
    ///
    /// 未就绪或机器已中止时什么也不做。状态变化时下发启停/转向命令
    /// （程序运行中或目标为启用状态时为关键帧），然后下发转速；
    /// 真正发生状态转换时阻塞等待启动/停止稳定时间。
    pub fn set_state(&self, state: SpindleState, rpm: u32) {
        if !self.is_ready() || self.machine.is_aborted() {
            return;
        }

        let previous = self.ctx.current_state();
        if previous != state {
            let critical = self.machine.state() == MachineState::Cycle || state.is_enabled();
            self.set_mode(state, critical);
            self.set_rpm(rpm);

            if state == SpindleState::Disabled {
                self.zero_speed();
                dwell(self.spindown_delay);
            } else {
                dwell(self.spinup_delay);
            }
        } else {
            // 状态不变：只在转速变化时下发
            self.set_rpm(rpm);
        }

        self.ctx.set_current_state(state);
        self.machine.reset_report_ovr_counter();
    }

    /// 设置转速，返回实际下发的值
    ///
    /// 未就绪时返回 0。结果与缓存的转速相同时不下发。
    pub fn set_rpm(&self, rpm: u32) -> u32 {
        if !self.is_ready() {
            return 0;
        }

        let applied = clamp_rpm(
            rpm,
            self.machine.spindle_override(),
            self.ctx.min_rpm(),
            self.ctx.max_rpm(),
        );
        self.machine.set_spindle_speed(applied);

        if applied == self.ctx.current_rpm() {
            return applied;
        }
        self.ctx.set_current_rpm(applied);

        let mut cmd = ModbusCommand::new(self.address);
        self.protocol
            .speed_command(applied, self.ctx.max_rpm(), &mut cmd);
        cmd.critical = false;
        self.enqueue(cmd);

        applied
    }

    /// 停止主轴（非关键帧）
    pub fn stop(&self) {
        if self.set_mode(SpindleState::Disabled, false) {
            self.zero_speed();
            self.machine.reset_report_ovr_counter();
        }
    }

    /// 缓存的主轴状态（不访问总线）
    pub fn get_state(&self) -> SpindleState {
        self.ctx.current_state()
    }

    pub fn is_ready(&self) -> bool {
        self.ctx.is_ready()
    }

    pub fn current_rpm(&self) -> u32 {
        self.ctx.current_rpm()
    }

    /// 最大转速（0 表示尚未从设备读到）
    pub fn max_rpm(&self) -> u32 {
        self.ctx.max_rpm()
    }

    pub fn min_rpm(&self) -> u32 {
        self.ctx.min_rpm()
    }

    pub fn protocol_name(&self) -> &'static str {
        self.protocol.name()
    }

    pub fn machine(&self) -> &Arc<MachineContext> {
        &self.machine
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 待发命令数量
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// 通信线程是否在运行
    pub fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 状态报告中的主轴字段
    pub fn status_fields(&self) -> String {
        StatusReport::spindle_fields(&self.machine, self.get_state())
    }

    /// 下发启停/转向命令，返回是否已入队尝试
    ///
    /// 停止时先清空队列，停止前排队的启动/转速命令不会在停止之后发出。
    fn set_mode(&self, state: SpindleState, critical: bool) -> bool {
        if !self.is_ready() {
            return false;
        }

        let mut cmd = ModbusCommand::new(self.address);
        self.protocol.direction_command(state, &mut cmd);
        cmd.critical = critical;

        if state == SpindleState::Disabled {
            let dropped = self.queue.reset();
            if dropped > 0 {
                debug!("Discarded {} pending VFD commands", dropped);
            }
        }

        self.ctx.set_current_state(state);
        self.enqueue(cmd);
        true
    }

    fn zero_speed(&self) {
        self.ctx.set_current_rpm(0);
        self.machine.set_spindle_speed(0);
    }

    fn enqueue(&self, cmd: ModbusCommand) {
        if !self.queue.enqueue(cmd) {
            BusMetrics::bump(&self.metrics.queue_drops);
            self.report(MsgLevel::Warning, "VFD Queue Full");
        }
    }

    fn report(&self, level: MsgLevel, message: &str) {
        self.reporter.report(level, message);
    }
}

fn dwell(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

impl Drop for VfdSpindle {
    fn drop(&mut self) {
        // Release: 通信线程看到 false 时也能看到此前的全部写入
        self.is_running.store(false, Ordering::Release);

        // 换掉生产端，让通信线程的接收端立即 Disconnected
        let (detached, _) = CommandQueue::bounded(1);
        drop(std::mem::replace(&mut self.queue, detached));

        if let Some(handle) = self.worker.take() {
            match join_within(handle, WORKER_JOIN_TIMEOUT) {
                Ok(()) => {},
                Err(JoinFailure::TimedOut) => error!(
                    "VFD comm thread failed to shut down within {:?}",
                    WORKER_JOIN_TIMEOUT
                ),
                Err(JoinFailure::Panicked) => error!("VFD comm thread panicked"),
            }
        }
    }
}

#[cfg(test)]
impl VfdSpindle {
    /// 不启动通信线程的就绪主轴，消费端交给测试直接检查
    pub(crate) fn detached(
        config: &VfdConfig,
        machine: Arc<MachineContext>,
        reporter: Arc<dyn ReportSink>,
    ) -> (Self, CommandReceiver) {
        let parts = SpindleParts {
            protocol: Arc::new(vfd_protocol::H2a::new()),
            machine: machine.clone(),
            reporter,
            alarm: machine,
            queue_capacity: config.link.queue_capacity,
        };
        let mut spindle = Self::assemble(parts, None);
        let (queue, commands) = CommandQueue::bounded(config.link.queue_capacity);
        spindle.queue = queue;
        spindle.address = config.rs485.address;
        spindle
            .ctx
            .set_rpm_bounds(config.spindle.min_rpm, config.spindle.max_rpm);
        spindle.spinup_delay = config.spinup_delay();
        spindle.spindown_delay = config.spindown_delay();
        spindle.ctx.set_ready(true);
        (spindle, commands)
    }
}
