//! # VFD 配置
//!
//! TOML 配置文件，所有字段都有默认值：
//!
//! ```toml
//! [rs485]
//! port = "/dev/ttyUSB0"
//! address = 1
//! txd_pin = "GPIO17"
//! rxd_pin = "GPIO4"
//! rts_pin = "GPIO16"
//! baud_rate = 9600
//! parity = "none"
//!
//! [spindle]
//! min_rpm = 6000
//! max_rpm = 24000
//! spinup_delay_ms = 2000
//! spindown_delay_ms = 2000
//!
//! [link]
//! poll_interval_ms = 200
//! response_timeout_ms = 50
//! max_retries = 5
//! ```

use crate::command::DEFAULT_QUEUE_CAPACITY;
use crate::pipeline::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use vfd_protocol::DEFAULT_ADDRESS;
use vfd_transport::SerialSettings;

/// Modbus 从站地址上限（248-255 为保留地址）
const MAX_SLAVE_ADDRESS: u8 = 247;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid VFD configuration: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VfdConfig {
    pub rs485: Rs485Config,
    pub spindle: SpindleConfig,
    pub link: LinkConfig,
}

/// RS-485 链路配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rs485Config {
    /// 串口设备路径
    pub port: String,
    /// Modbus 从站地址
    pub address: u8,
    pub txd_pin: Option<String>,
    pub rxd_pin: Option<String>,
    pub rts_pin: Option<String>,
    #[serde(flatten)]
    pub serial: SerialSettings,
}

impl Default for Rs485Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            address: DEFAULT_ADDRESS,
            txd_pin: None,
            rxd_pin: None,
            rts_pin: None,
            serial: SerialSettings::default(),
        }
    }
}

/// 主轴配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpindleConfig {
    pub min_rpm: u32,
    /// 设备查询到的最大转速会覆盖此值
    pub max_rpm: u32,
    /// 启动后等待转速稳定（毫秒）
    pub spinup_delay_ms: u64,
    /// 停止后等待主轴停稳（毫秒）
    pub spindown_delay_ms: u64,
    /// 激光模式下不允许启用 VFD 主轴
    pub laser_mode: bool,
}

impl Default for SpindleConfig {
    fn default() -> Self {
        Self {
            min_rpm: 0,
            max_rpm: 24000,
            spinup_delay_ms: 0,
            spindown_delay_ms: 0,
            laser_mode: false,
        }
    }
}

/// 通信参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// 轮询间隔（也是重试间隔）
    pub poll_interval_ms: u64,
    /// 单次读取超时
    pub response_timeout_ms: u64,
    /// 每个事务的最大尝试次数
    pub max_retries: u32,
    /// 命令队列容量
    pub queue_capacity: usize,
    /// 失败事务输出原始收发字节
    pub debug_frames: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            response_timeout_ms: 50,
            max_retries: 5,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            debug_frames: false,
        }
    }
}

impl VfdConfig {
    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 从文件加载（不做合法性检查，见 [`VfdConfig::validate`]）
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 列出所有配置问题
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.rs485.txd_pin.is_none() {
            problems.push("Undefined VFD_RS485_TXD_PIN".to_string());
        }
        if self.rs485.rxd_pin.is_none() {
            problems.push("Undefined VFD_RS485_RXD_PIN".to_string());
        }
        if self.rs485.rts_pin.is_none() {
            problems.push("Undefined VFD_RS485_RTS_PIN".to_string());
        }
        if self.spindle.laser_mode {
            problems.push(
                "VFD spindle disabled in laser mode. Set $GCode/LaserMode=Off and restart"
                    .to_string(),
            );
        }
        if self.rs485.address == 0 || self.rs485.address > MAX_SLAVE_ADDRESS {
            problems.push(format!(
                "Invalid VFD RS485 address {} (must be 1-{})",
                self.rs485.address, MAX_SLAVE_ADDRESS
            ));
        }
        problems.extend(self.rs485.serial.problems());
        if self.link.max_retries == 0 {
            problems.push("VFD max_retries must be at least 1".to_string());
        }
        if self.link.queue_capacity == 0 {
            problems.push("VFD queue_capacity must be at least 1".to_string());
        }

        problems
    }

    /// 检查配置
    ///
    /// # Errors
    /// - `ConfigError::Invalid`: 携带全部问题
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    /// 引脚分配描述
    pub fn pin_message(&self) -> String {
        let pin = |p: &Option<String>| p.clone().unwrap_or_else(|| "None".to_string());
        format!(
            "VFD RS485  Tx:{} Rx:{} RTS:{}",
            pin(&self.rs485.txd_pin),
            pin(&self.rs485.rxd_pin),
            pin(&self.rs485.rts_pin)
        )
    }

    /// 通信线程参数
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            address: self.rs485.address,
            poll_interval: Duration::from_millis(self.link.poll_interval_ms),
            response_timeout: Duration::from_millis(self.link.response_timeout_ms),
            max_retries: self.link.max_retries,
            debug_frames: self.link.debug_frames,
        }
    }

    pub fn spinup_delay(&self) -> Duration {
        Duration::from_millis(self.spindle.spinup_delay_ms)
    }

    pub fn spindown_delay(&self) -> Duration {
        Duration::from_millis(self.spindle.spindown_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> VfdConfig {
        let mut config = VfdConfig::default();
        config.rs485.txd_pin = Some("17".to_string());
        config.rs485.rxd_pin = Some("4".to_string());
        config.rs485.rts_pin = Some("16".to_string());
        config
    }

    #[test]
    fn test_default_config_lacks_pins() {
        let problems = VfdConfig::default().problems();
        assert_eq!(
            problems,
            vec![
                "Undefined VFD_RS485_TXD_PIN".to_string(),
                "Undefined VFD_RS485_RXD_PIN".to_string(),
                "Undefined VFD_RS485_RTS_PIN".to_string(),
            ]
        );
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.pin_message(), "VFD RS485  Tx:17 Rx:4 RTS:16");
    }

    #[test]
    fn test_laser_mode_rejected() {
        let mut config = valid_config();
        config.spindle.laser_mode = true;
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("laser mode"));
    }

    #[test]
    fn test_zero_retries_and_capacity_rejected() {
        let mut config = valid_config();
        config.link.max_retries = 0;
        config.link.queue_capacity = 0;
        config.rs485.address = 0;
        match config.validate() {
            Err(ConfigError::Invalid { problems }) => assert_eq!(problems.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = VfdConfig::from_toml_str(
            r#"
            [rs485]
            port = "/dev/ttyAMA0"
            txd_pin = "17"
            rxd_pin = "4"
            rts_pin = "16"
            baud_rate = 19200
            parity = "even"

            [spindle]
            min_rpm = 6000
            spinup_delay_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.rs485.port, "/dev/ttyAMA0");
        assert_eq!(config.rs485.address, 1);
        assert_eq!(config.rs485.serial.describe(), "19200 8E1");
        assert_eq!(config.spindle.min_rpm, 6000);
        assert_eq!(config.spindle.max_rpm, 24000);
        assert_eq!(config.spinup_delay(), Duration::from_millis(1500));
        assert_eq!(config.link, LinkConfig::default());
        assert!(config.problems().is_empty());
    }

    #[test]
    fn test_worker_config_mapping() {
        let mut config = valid_config();
        config.rs485.address = 7;
        config.link.poll_interval_ms = 0;
        let worker = config.worker_config();
        assert_eq!(worker.address, 7);
        assert_eq!(worker.poll_interval, Duration::ZERO);
        assert_eq!(worker.response_timeout, Duration::from_millis(50));
        assert_eq!(worker.max_retries, 5);
    }

    #[test]
    fn test_toml_round_trip_keeps_values() {
        let mut config = valid_config();
        config.spindle.min_rpm = 3000;
        let text = config.to_toml_string().unwrap();
        assert_eq!(VfdConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_error() {
        let err = VfdConfig::from_toml_str("[spindle]\nmax_rpm = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
