//! # VFD Driver
//!
//! RS-485 变频器主轴的驱动层，包括：
//! - 通信线程（独占串口，串行完成所有 Modbus 事务）
//! - 命令队列（非阻塞入队、停机时清空）
//! - 状态同步（原子字段，控制线程无锁读取）
//! - 主轴门面（`set_state` / `set_rpm` / `stop` / `get_state`）
//! - 报告与报警出口（`ReportSink` / `AlarmSink`）
//!
//! # 线程模型
//!
//! ```text
//! 控制线程 ──► VfdSpindle ──► CommandQueue ──► CommWorker ──► RtuTransport ──► VFD
//!                  ▲                               │
//!                  └──── SpindleContext (原子) ◄───┘
//! ```

mod builder;
pub mod command;
pub mod config;
mod error;
pub mod machine;
pub mod metrics;
pub mod pipeline;
pub mod report;
mod spindle;
pub mod state;
pub mod status;

pub use builder::VfdSpindleBuilder;
pub use command::{CommandQueue, CommandReceiver, DEFAULT_QUEUE_CAPACITY};
pub use config::{ConfigError, LinkConfig, Rs485Config, SpindleConfig, VfdConfig};
pub use error::DriverError;
pub use machine::{AlarmSink, MachineContext, MachineState, SystemAlarm};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use pipeline::{
    CommWorker, LinkHealth, PollCycle, StepOutcome, TransactionOrigin, WorkerConfig,
    WorkerShared,
};
pub use report::{MemoryReporter, MsgLevel, ReportSink, TracingReporter, hex_frame};
pub use spindle::{VfdSpindle, clamp_rpm};
pub use state::{AtomicSpindleState, SpindleContext};
pub use status::StatusReport;
