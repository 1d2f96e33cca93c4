//! 命令队列
//!
//! 控制线程与通信线程之间唯一的通道。容量有界，入队永不阻塞；
//! 队列满时命令被丢弃（过时的转速命令重发没有意义）。

use crate::error::DriverError;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use vfd_protocol::ModbusCommand;

/// 默认队列容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// 命令队列（生产端）
///
/// 同时持有一个接收端克隆，用于 `reset()` 时丢弃所有待发命令。
pub struct CommandQueue {
    tx: Sender<ModbusCommand>,
    rx: Receiver<ModbusCommand>,
    capacity: usize,
}

/// 命令队列（消费端，交给通信线程）
pub struct CommandReceiver {
    rx: Receiver<ModbusCommand>,
}

impl CommandQueue {
    /// 创建有界队列，返回 (生产端, 消费端)
    ///
    /// 容量为 0 时按 1 处理（crossbeam 的 0 容量通道是同步交接，会阻塞）。
    pub fn bounded(capacity: usize) -> (Self, CommandReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                rx: rx.clone(),
                capacity,
            },
            CommandReceiver { rx },
        )
    }

    /// 入队（非阻塞）
    ///
    /// # Errors
    /// - `DriverError::QueueFull`: 队列已满，命令被丢弃
    /// - `DriverError::ChannelClosed`: 消费端已全部释放
    pub fn try_enqueue(&self, cmd: ModbusCommand) -> Result<(), DriverError> {
        self.tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 入队（非阻塞），成功返回 `true`
    pub fn enqueue(&self, cmd: ModbusCommand) -> bool {
        self.try_enqueue(cmd).is_ok()
    }

    /// 丢弃所有待发命令，返回丢弃的数量
    ///
    /// 已经在总线上的事务不受影响。
    pub fn reset(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// 待发命令数量
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl CommandReceiver {
    /// 非阻塞出队
    ///
    /// # Errors
    /// - `DriverError::ChannelClosed`: 生产端已全部释放，通信线程应退出
    pub fn try_dequeue(&self) -> Result<Option<ModbusCommand>, DriverError> {
        match self.rx.try_recv() {
            Ok(cmd) => Ok(Some(cmd)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DriverError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed_cmd(value: u8) -> ModbusCommand {
        let mut cmd = ModbusCommand::new(0x01);
        cmd.set_request(&[0x06, 0x10, 0x00, 0x00, value], 6);
        cmd
    }

    #[test]
    fn test_fifo_order() {
        let (queue, rx) = CommandQueue::bounded(4);
        for i in 0..3 {
            assert!(queue.enqueue(speed_cmd(i)));
        }
        for i in 0..3 {
            let cmd = rx.try_dequeue().unwrap().unwrap();
            assert_eq!(cmd.msg[5], i);
        }
        assert!(rx.try_dequeue().unwrap().is_none());
    }

    #[test]
    fn test_full_queue_never_blocks_and_keeps_oldest() {
        let (queue, rx) = CommandQueue::bounded(DEFAULT_QUEUE_CAPACITY);
        for i in 0..DEFAULT_QUEUE_CAPACITY as u8 {
            assert!(queue.enqueue(speed_cmd(i)));
        }
        // 超出容量：立即返回 false，已有条目不受影响
        assert!(!queue.enqueue(speed_cmd(0xFF)));
        assert!(matches!(
            queue.try_enqueue(speed_cmd(0xFE)),
            Err(DriverError::QueueFull { capacity: 10 })
        ));
        assert_eq!(queue.len(), DEFAULT_QUEUE_CAPACITY);

        for i in 0..DEFAULT_QUEUE_CAPACITY as u8 {
            assert_eq!(rx.try_dequeue().unwrap().unwrap().msg[5], i);
        }
    }

    #[test]
    fn test_reset_drops_pending() {
        let (queue, rx) = CommandQueue::bounded(4);
        queue.enqueue(speed_cmd(1));
        queue.enqueue(speed_cmd(2));
        assert_eq!(queue.reset(), 2);
        assert!(queue.is_empty());
        assert!(rx.try_dequeue().unwrap().is_none());
    }

    #[test]
    fn test_disconnect_detected() {
        let (queue, rx) = CommandQueue::bounded(2);
        drop(queue);
        assert!(matches!(rx.try_dequeue(), Err(DriverError::ChannelClosed)));
    }

    #[test]
    fn test_zero_capacity_is_promoted() {
        let (queue, _rx) = CommandQueue::bounded(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.enqueue(speed_cmd(0)));
    }
}
