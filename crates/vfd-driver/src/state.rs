//! 主轴共享状态
//!
//! 控制线程与通信线程共享的字段全部是原子类型，读取方永远不会看到撕裂的写入。
//! `current_rpm` / `current_state` 由门面写入请求值，由通信线程写入设备反馈。

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use vfd_protocol::{SpindleState, VfdFeedback};

/// 主轴状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicSpindleState {
    inner: AtomicU8,
}

impl AtomicSpindleState {
    pub fn new(state: SpindleState) -> Self {
        Self {
            inner: AtomicU8::new(state.into()),
        }
    }

    /// 读取状态，无效值按 Disabled 处理
    pub fn get(&self, ordering: Ordering) -> SpindleState {
        SpindleState::try_from(self.inner.load(ordering)).unwrap_or_default()
    }

    pub fn set(&self, state: SpindleState, ordering: Ordering) {
        self.inner.store(state.into(), ordering);
    }
}

impl Default for AtomicSpindleState {
    fn default() -> Self {
        Self::new(SpindleState::Disabled)
    }
}

/// 主轴驱动状态
#[derive(Debug, Default)]
pub struct SpindleContext {
    min_rpm: AtomicU32,
    /// 0 表示尚未从设备读到（通信线程会强制查询）
    max_rpm: AtomicU32,
    current_rpm: AtomicU32,
    current_state: AtomicSpindleState,
    ready: AtomicBool,
}

impl SpindleContext {
    pub fn new(min_rpm: u32, max_rpm: u32) -> Self {
        Self {
            min_rpm: AtomicU32::new(min_rpm),
            max_rpm: AtomicU32::new(max_rpm),
            ..Self::default()
        }
    }

    pub fn min_rpm(&self) -> u32 {
        self.min_rpm.load(Ordering::Relaxed)
    }

    pub fn max_rpm(&self) -> u32 {
        self.max_rpm.load(Ordering::Relaxed)
    }

    pub fn set_rpm_bounds(&self, min_rpm: u32, max_rpm: u32) {
        self.min_rpm.store(min_rpm, Ordering::Relaxed);
        self.max_rpm.store(max_rpm, Ordering::Relaxed);
    }

    pub fn current_rpm(&self) -> u32 {
        self.current_rpm.load(Ordering::Relaxed)
    }

    pub fn set_current_rpm(&self, rpm: u32) {
        self.current_rpm.store(rpm, Ordering::Relaxed);
    }

    pub fn current_state(&self) -> SpindleState {
        self.current_state.get(Ordering::Relaxed)
    }

    pub fn set_current_state(&self, state: SpindleState) {
        self.current_state.set(state, Ordering::Relaxed);
    }

    /// 初始化是否成功
    ///
    /// 使用 Acquire，保证看到 `true` 时初始化期间的写入都已可见。
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// 把设备反馈写入共享状态
    pub fn apply_feedback(&self, feedback: VfdFeedback) {
        match feedback {
            VfdFeedback::MaxRpm(rpm) => self.max_rpm.store(rpm, Ordering::Relaxed),
            VfdFeedback::CurrentRpm(rpm) => self.set_current_rpm(rpm),
            VfdFeedback::Direction(state) => self.set_current_state(state),
            VfdFeedback::StatusOk => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_spindle_state() {
        let state = AtomicSpindleState::default();
        assert_eq!(state.get(Ordering::Relaxed), SpindleState::Disabled);

        state.set(SpindleState::CounterClockwise, Ordering::Relaxed);
        assert_eq!(state.get(Ordering::Relaxed), SpindleState::CounterClockwise);
    }

    #[test]
    fn test_new_context_not_ready() {
        let ctx = SpindleContext::new(1000, 24000);
        assert!(!ctx.is_ready());
        assert_eq!(ctx.min_rpm(), 1000);
        assert_eq!(ctx.max_rpm(), 24000);
        assert_eq!(ctx.current_rpm(), 0);
        assert_eq!(ctx.current_state(), SpindleState::Disabled);
    }

    #[test]
    fn test_apply_feedback() {
        let ctx = SpindleContext::new(0, 0);

        ctx.apply_feedback(VfdFeedback::MaxRpm(24000));
        assert_eq!(ctx.max_rpm(), 24000);

        ctx.apply_feedback(VfdFeedback::CurrentRpm(11990));
        assert_eq!(ctx.current_rpm(), 11990);

        ctx.apply_feedback(VfdFeedback::Direction(SpindleState::Clockwise));
        assert_eq!(ctx.current_state(), SpindleState::Clockwise);

        ctx.apply_feedback(VfdFeedback::StatusOk);
        assert_eq!(ctx.current_rpm(), 11990);
    }
}
