//! 命令定义和实现

pub mod config;
pub mod probe;
pub mod spin;
pub mod stop;

pub use config::ConfigCommand;
pub use probe::ProbeCommand;
pub use spin::SpinCommand;
pub use stop::StopCommand;

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::time::{Duration, Instant};
use vfd_sdk::{VfdConfig, VfdSpindle, VfdSpindleBuilder};

/// 加载配置并打开主轴
pub fn open_spindle(path: &Path) -> Result<VfdSpindle> {
    let config = VfdConfig::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    println!("🔌 Opening {} ({})", config.rs485.port, config.rs485.serial.describe());
    let spindle = VfdSpindleBuilder::new()
        .config(config)
        .try_build()
        .context("Failed to initialize VFD spindle")?;
    Ok(spindle)
}

/// 等待最大转速初始化查询完成
///
/// 链路报警或超时返回错误。
pub fn wait_for_bootstrap(spindle: &VfdSpindle, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(alarm) = spindle.machine().active_alarm() {
            bail!("VFD did not answer: alarm {}", alarm);
        }
        if spindle.metrics().transactions_ok > 0 && spindle.max_rpm() > 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("Timed out waiting for VFD after {:?}", timeout);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// 等待队列中的命令全部发出
pub fn wait_for_drain(spindle: &VfdSpindle, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while spindle.pending_commands() > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    true
}
