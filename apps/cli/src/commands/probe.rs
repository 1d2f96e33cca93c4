//! 探测命令
//!
//! 初始化链路，等待最大转速查询完成，打印设备信息

use super::{open_spindle, wait_for_bootstrap};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::time::Duration;

/// 探测命令参数
#[derive(Args, Debug)]
pub struct ProbeCommand {
    /// 等待设备应答的时间（秒）
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}

impl ProbeCommand {
    pub fn execute(&self, config: &Path) -> Result<()> {
        let spindle = open_spindle(config)?;
        wait_for_bootstrap(&spindle, Duration::from_secs(self.timeout))?;

        // 留一点时间给空闲轮询读回转速与转向
        std::thread::sleep(Duration::from_millis(500));

        println!("✅ VFD model:   {}", spindle.protocol_name());
        println!("   Max RPM:     {}", spindle.max_rpm());
        println!("   Min RPM:     {}", spindle.min_rpm());
        println!("   Current RPM: {}", spindle.current_rpm());
        println!("   State:       {:?}", spindle.get_state());
        println!("   Bus:         {}", spindle.metrics());
        Ok(())
    }
}
