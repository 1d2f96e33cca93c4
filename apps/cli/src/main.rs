//! # VFD CLI
//!
//! RS-485 变频器主轴命令行工具。
//!
//! ```bash
//! # 生成配置模板并检查
//! vfd-cli --config vfd.toml config init
//! vfd-cli --config vfd.toml config check
//!
//! # 读取最大转速与链路状态
//! vfd-cli --config vfd.toml probe
//!
//! # 正转 12000 RPM 持续 10 秒（Ctrl-C 提前停止）
//! vfd-cli --config vfd.toml spin --rpm 12000 --seconds 10
//!
//! # 停止主轴
//! vfd-cli --config vfd.toml stop
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, ProbeCommand, SpinCommand, StopCommand};

/// VFD CLI - 变频器主轴命令行工具
#[derive(Parser, Debug)]
#[command(name = "vfd-cli")]
#[command(about = "Command-line interface for RS-485 VFD spindle control", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true, default_value = "vfd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 初始化链路并读取设备信息
    Probe {
        #[command(flatten)]
        args: ProbeCommand,
    },

    /// 启动主轴并保持转速
    Spin {
        #[command(flatten)]
        args: SpinCommand,
    },

    /// 停止主轴
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },

    /// 配置文件管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    vfd_sdk::init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { args } => args.execute(&cli.config),
        Commands::Spin { args } => args.execute(&cli.config),
        Commands::Stop { args } => args.execute(&cli.config),
        Commands::Config(cmd) => cmd.execute(&cli.config),
    }
}
