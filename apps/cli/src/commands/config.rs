//! 配置文件管理命令

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::Path;
use vfd_sdk::VfdConfig;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 解析并检查配置文件
    Check,

    /// 写出一份带默认值的配置模板
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Check => {
                let problems = check(path)?;
                if problems.is_empty() {
                    println!("✅ {} is valid", path.display());
                    return Ok(());
                }
                for problem in &problems {
                    println!("❌ {}", problem);
                }
                bail!("{} problem(s) in {}", problems.len(), path.display());
            },
            ConfigCommand::Init { force } => {
                init(path, *force)?;
                println!("✅ Wrote {}", path.display());
                Ok(())
            },
        }
    }
}

/// 返回配置中的全部问题
pub fn check(path: &Path) -> Result<Vec<String>> {
    let config = VfdConfig::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Ok(config.problems())
}

/// 写出配置模板
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let mut config = VfdConfig::default();
    config.rs485.txd_pin = Some("17".to_string());
    config.rs485.rxd_pin = Some("4".to_string());
    config.rs485.rts_pin = Some("16".to_string());
    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
