//! serialport 后端
//!
//! 适用于带自动收发切换的 USB-RS485 转换器：方向控制（RTS/DE）由转换器硬件完成，
//! 这里只需按半双工顺序读写。

use crate::{Parity, RtuTransport, SerialSettings, TransportError};
use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 打开串口时的初始读超时
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// RS-485 串口传输
pub struct SerialRtuTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialRtuTransport {
    /// 按给定参数打开串口
    ///
    /// # Errors
    /// - `TransportError::Serial`: 设备不存在、无权限或参数不被支持
    pub fn open(path: &str, settings: &SerialSettings) -> Result<Self, TransportError> {
        let data_bits = match settings.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let parity = match settings.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };
        let stop_bits = if settings.stop_bits == 2 {
            StopBits::Two
        } else {
            StopBits::One
        };

        let port = serialport::new(path, settings.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()?;

        debug!("Opened RS485 port {} ({})", path, settings.describe());

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// 设备路径
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RtuTransport for SerialRtuTransport {
    fn flush(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        // 等待发送完成，之后才轮到从站应答
        self.port.flush()?;
        trace!("RS485 wrote {} bytes", bytes.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;

        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port.set_timeout(remaining)?;

            match self.port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!("RS485 read {}/{} bytes", filled, buf.len());
        Ok(filled)
    }
}
