//! 停止命令

use super::{open_spindle, wait_for_bootstrap, wait_for_drain};
use anyhow::{Result, bail};
use clap::Args;
use std::path::Path;
use std::time::Duration;

/// 停止命令参数
#[derive(Args, Debug)]
pub struct StopCommand {
    /// 等待设备应答的时间（秒）
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}

impl StopCommand {
    pub fn execute(&self, config: &Path) -> Result<()> {
        let spindle = open_spindle(config)?;
        wait_for_bootstrap(&spindle, Duration::from_secs(self.timeout))?;

        println!("🛑 Stopping spindle...");
        spindle.stop();

        if !wait_for_drain(&spindle, Duration::from_secs(self.timeout)) {
            bail!("Stop command was not sent within {}s", self.timeout);
        }
        println!("✅ Stop sent ({})", spindle.metrics());
        Ok(())
    }
}
