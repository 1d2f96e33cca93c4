//! 启动主轴命令
//!
//! 启动后保持转速，到时或 Ctrl-C 时停止

use super::{open_spindle, wait_for_bootstrap, wait_for_drain};
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;
use vfd_sdk::SpindleState;

/// 启动命令参数
#[derive(Args, Debug)]
pub struct SpinCommand {
    /// 目标转速（RPM）
    #[arg(short, long)]
    pub rpm: u32,

    /// 反转
    #[arg(long)]
    pub ccw: bool,

    /// 持续时间（秒），不指定则运行到 Ctrl-C
    #[arg(short, long)]
    pub seconds: Option<u64>,
}

impl SpinCommand {
    pub fn direction(&self) -> SpindleState {
        if self.ccw {
            SpindleState::CounterClockwise
        } else {
            SpindleState::Clockwise
        }
    }

    pub fn execute(&self, config: &Path) -> Result<()> {
        let spindle = open_spindle(config)?;
        wait_for_bootstrap(&spindle, Duration::from_secs(5))?;

        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;

        println!(
            "🌀 Spinning {:?} at {} RPM (max {})",
            self.direction(),
            self.rpm,
            spindle.max_rpm()
        );
        spindle.set_state(self.direction(), self.rpm);

        let deadline = self.seconds.map(|s| Instant::now() + Duration::from_secs(s));
        let mut last_print = Instant::now();
        while !interrupted.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if let Some(alarm) = spindle.machine().active_alarm() {
                warn!("Spindle alarm: {}", alarm);
                break;
            }
            if last_print.elapsed() >= Duration::from_secs(1) {
                println!("   {} RPM, {:?}", spindle.current_rpm(), spindle.get_state());
                last_print = Instant::now();
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        println!("🛑 Stopping spindle...");
        spindle.stop();
        if !wait_for_drain(&spindle, Duration::from_secs(2)) {
            warn!("Stop command still queued on exit");
        }
        println!("✅ Done ({})", spindle.metrics());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        let mut cmd = SpinCommand {
            rpm: 12000,
            ccw: false,
            seconds: None,
        };
        assert_eq!(cmd.direction(), SpindleState::Clockwise);
        cmd.ccw = true;
        assert_eq!(cmd.direction(), SpindleState::CounterClockwise);
    }
}
