//! Builder 模式实现
//!
//! 提供链式构造 `VfdSpindle` 实例的便捷方式。

use crate::config::VfdConfig;
#[cfg(feature = "serial")]
use crate::error::DriverError;
use crate::machine::{AlarmSink, MachineContext};
#[cfg(feature = "serial")]
use crate::report::MsgLevel;
use crate::report::{ReportSink, TracingReporter};
use crate::spindle::{SpindleParts, VfdSpindle};
use std::sync::Arc;
use vfd_protocol::{H2a, VfdProtocol};
use vfd_transport::RtuTransport;

/// VfdSpindle Builder（链式构造）
///
/// 默认使用 H2A 型号、[`TracingReporter`] 与一个新的 [`MachineContext`]
/// （同时作为报警出口）。
///
/// # Example
///
/// ```no_run
/// use vfd_driver::{VfdConfig, VfdSpindleBuilder};
///
/// let config = VfdConfig::load("vfd.toml").unwrap();
/// let spindle = VfdSpindleBuilder::new().config(config).build();
/// if !spindle.is_ready() {
///     eprintln!("VFD spindle not ready");
/// }
/// ```
pub struct VfdSpindleBuilder {
    config: VfdConfig,
    protocol: Option<Arc<dyn VfdProtocol>>,
    machine: Option<Arc<MachineContext>>,
    reporter: Option<Arc<dyn ReportSink>>,
    alarm: Option<Arc<dyn AlarmSink>>,
}

impl VfdSpindleBuilder {
    pub fn new() -> Self {
        Self {
            config: VfdConfig::default(),
            protocol: None,
            machine: None,
            reporter: None,
            alarm: None,
        }
    }

    /// 设置配置
    pub fn config(mut self, config: VfdConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置 VFD 型号（默认 H2A）
    pub fn protocol(mut self, protocol: Arc<dyn VfdProtocol>) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// 共享机器上下文
    pub fn machine(mut self, machine: Arc<MachineContext>) -> Self {
        self.machine = Some(machine);
        self
    }

    /// 报告出口（默认转发到 tracing）
    pub fn reporter(mut self, reporter: Arc<dyn ReportSink>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// 报警出口（默认为机器上下文本身）
    pub fn alarm_sink(mut self, alarm: Arc<dyn AlarmSink>) -> Self {
        self.alarm = Some(alarm);
        self
    }

    /// 使用给定传输层构建
    ///
    /// 构建本身不会失败：配置错误或线程创建失败时得到一个未就绪的主轴，
    /// 所有操作都是空操作，原因已通过报告出口输出。
    pub fn build_with_transport<T: RtuTransport + 'static>(self, transport: T) -> VfdSpindle {
        self.finish(Some(Box::new(transport)))
    }

    /// 打开配置中的串口并构建
    ///
    /// 配置有问题时不会尝试打开串口。
    #[cfg(feature = "serial")]
    pub fn build(self) -> VfdSpindle {
        if !self.config.problems().is_empty() {
            return self.finish(None);
        }
        match self.open_serial() {
            Ok(transport) => self.finish(Some(Box::new(transport))),
            Err(e) => {
                let reporter = self.resolved_reporter();
                reporter.report(
                    MsgLevel::Error,
                    &format!("RS485 VFD uart open failed: {}", e),
                );
                self.finish(None)
            },
        }
    }

    /// 打开串口并构建，任何问题都作为错误返回
    ///
    /// # Errors
    /// - `DriverError::Config`: 配置不合法
    /// - `DriverError::Transport`: 串口打开失败
    /// - `DriverError::NotReady`: 通信线程未能启动
    #[cfg(feature = "serial")]
    pub fn try_build(self) -> Result<VfdSpindle, DriverError> {
        self.config.validate()?;
        let transport = self.open_serial()?;
        let spindle = self.finish(Some(Box::new(transport)));
        if spindle.is_ready() {
            Ok(spindle)
        } else {
            Err(DriverError::NotReady)
        }
    }

    #[cfg(feature = "serial")]
    fn open_serial(&self) -> Result<vfd_transport::SerialRtuTransport, DriverError> {
        Ok(vfd_transport::SerialRtuTransport::open(
            &self.config.rs485.port,
            &self.config.rs485.serial,
        )?)
    }

    fn resolved_reporter(&self) -> Arc<dyn ReportSink> {
        self.reporter
            .clone()
            .unwrap_or_else(|| Arc::new(TracingReporter))
    }

    fn finish(self, transport: Option<Box<dyn RtuTransport>>) -> VfdSpindle {
        let reporter = self.resolved_reporter();
        let machine = self
            .machine
            .unwrap_or_else(|| Arc::new(MachineContext::new()));
        let alarm = self
            .alarm
            .unwrap_or_else(|| machine.clone() as Arc<dyn AlarmSink>);
        let protocol = self
            .protocol
            .unwrap_or_else(|| Arc::new(H2a::new()) as Arc<dyn VfdProtocol>);

        let parts = SpindleParts {
            protocol,
            machine,
            reporter,
            alarm,
            queue_capacity: self.config.link.queue_capacity,
        };
        let mut spindle = VfdSpindle::assemble(parts, transport);
        spindle.reinit(&self.config);
        spindle
    }
}

impl Default for VfdSpindleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
