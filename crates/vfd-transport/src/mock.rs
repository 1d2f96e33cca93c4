//! Mock RS-485 总线
//!
//! 用于测试的脚本化总线：每次 `write()` 把请求帧交给应答函数，
//! 应答函数返回的字节会在下一次 `read()` 时交付。

use crate::{RtuTransport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// 模拟从站的应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// 原样交付的字节（调用方负责 CRC）
    Bytes(Vec<u8>),
    /// 不应答（模拟掉线）
    Silence,
}

type Responder = Box<dyn FnMut(&[u8]) -> MockReply + Send>;

struct MockBusState {
    /// 已写出的帧（含 CRC）
    written: Vec<Vec<u8>>,
    /// 等待被读取的应答字节
    pending: Vec<u8>,
    /// flush 次数
    flushes: usize,
    /// 模拟串口被拔出
    closed: bool,
    responder: Option<Responder>,
}

/// Mock 传输端（交给通信线程）
pub struct MockTransport {
    state: Arc<Mutex<MockBusState>>,
}

/// Mock 总线控制句柄（留在测试线程）
#[derive(Clone)]
pub struct MockBusHandle {
    state: Arc<Mutex<MockBusState>>,
}

/// 创建一条 mock 总线，默认不应答
pub fn mock_bus() -> (MockTransport, MockBusHandle) {
    let state = Arc::new(Mutex::new(MockBusState {
        written: Vec::new(),
        pending: Vec::new(),
        flushes: 0,
        closed: false,
        responder: None,
    }));
    (
        MockTransport {
            state: state.clone(),
        },
        MockBusHandle { state },
    )
}

impl MockBusHandle {
    /// 设置应答函数（线程安全，可在运行中替换）
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> MockReply + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// 之后的请求全部不应答
    pub fn go_silent(&self) {
        self.state.lock().responder = None;
    }

    /// 模拟设备断开：之后所有收发都返回 `TransportError::Closed`
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// 获取所有已写出的帧
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// 取走所有已写出的帧
    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().written)
    }

    /// 已写出的帧数量
    pub fn write_count(&self) -> usize {
        self.state.lock().written.len()
    }

    /// flush 次数
    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }
}

impl MockBusState {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl RtuTransport for MockTransport {
    fn flush(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.flushes += 1;
        state.pending.clear();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.written.push(bytes.to_vec());
        let reply = match state.responder.as_mut() {
            Some(responder) => responder(bytes),
            None => MockReply::Silence,
        };
        if let MockReply::Bytes(reply) = reply {
            state.pending.extend_from_slice(&reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let n = buf.len().min(state.pending.len());
        buf[..n].copy_from_slice(&state.pending[..n]);
        state.pending.drain(..n);
        Ok(n)
    }
}
