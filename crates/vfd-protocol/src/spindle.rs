//! 主轴状态定义

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 主轴状态
///
/// 使用 `#[repr(u8)]`，便于在驱动层用 `AtomicU8` 无锁共享。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SpindleState {
    /// 停止
    #[default]
    Disabled = 0,
    /// 正转使能（M3）
    Clockwise = 1,
    /// 反转使能（M4）
    CounterClockwise = 2,
}

impl SpindleState {
    /// 是否处于使能状态（任意方向）
    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }
}
