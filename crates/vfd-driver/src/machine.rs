//! 机器上下文
//!
//! 主轴驱动需要读取的全局机器状态（中止标志、运行状态、倍率），
//! 以及向外报告报警的出口。以显式句柄传入门面，便于单独测试。

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// 倍率百分比下限
pub const MIN_OVERRIDE_PERCENT: u8 = 10;
/// 倍率百分比上限
pub const MAX_OVERRIDE_PERCENT: u8 = 200;
/// 默认倍率
pub const DEFAULT_OVERRIDE_PERCENT: u8 = 100;

/// 机器运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MachineState {
    #[default]
    Idle = 0,
    Alarm = 1,
    CheckMode = 2,
    Homing = 3,
    /// 正在执行程序
    Cycle = 4,
    Hold = 5,
    Jog = 6,
    SafetyDoor = 7,
    Sleep = 8,
}

impl MachineState {
    /// 机器是否在运动相关的忙碌状态（影响状态报告的倍率刷新频率）
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Homing | Self::Cycle | Self::Hold | Self::Jog | Self::SafetyDoor
        )
    }
}

/// 系统报警
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum SystemAlarm {
    /// 主轴控制失效，需要安全停机
    SpindleControl = 10,
}

impl std::fmt::Display for SystemAlarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpindleControl => write!(f, "Spindle Control"),
        }
    }
}

/// 报警出口
///
/// 通信线程只会调用 `raise()`；报警的清除属于机器控制层，不在主轴驱动内部。
pub trait AlarmSink: Send + Sync {
    fn raise(&self, alarm: SystemAlarm);
}

/// 机器上下文（原子字段，线程安全）
#[derive(Debug)]
pub struct MachineContext {
    abort: AtomicBool,
    state: AtomicU8,
    feed_override: AtomicU8,
    rapid_override: AtomicU8,
    spindle_override: AtomicU8,
    /// 实际下发的主轴转速（倍率与限幅之后）
    spindle_speed: AtomicU32,
    /// 距离下一次在状态报告中输出倍率还剩几次
    report_ovr_counter: AtomicU8,
    /// 0 表示无报警
    alarm: AtomicU8,
}

impl Default for MachineContext {
    fn default() -> Self {
        Self {
            abort: AtomicBool::new(false),
            state: AtomicU8::new(MachineState::Idle.into()),
            feed_override: AtomicU8::new(DEFAULT_OVERRIDE_PERCENT),
            rapid_override: AtomicU8::new(DEFAULT_OVERRIDE_PERCENT),
            spindle_override: AtomicU8::new(DEFAULT_OVERRIDE_PERCENT),
            spindle_speed: AtomicU32::new(0),
            report_ovr_counter: AtomicU8::new(0),
            alarm: AtomicU8::new(0),
        }
    }
}

impl MachineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub fn set_abort(&self, abort: bool) {
        self.abort.store(abort, Ordering::Release);
    }

    pub fn state(&self) -> MachineState {
        MachineState::try_from(self.state.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_state(&self, state: MachineState) {
        self.state.store(state.into(), Ordering::Relaxed);
    }

    pub fn feed_override(&self) -> u8 {
        self.feed_override.load(Ordering::Relaxed)
    }

    pub fn rapid_override(&self) -> u8 {
        self.rapid_override.load(Ordering::Relaxed)
    }

    pub fn spindle_override(&self) -> u8 {
        self.spindle_override.load(Ordering::Relaxed)
    }

    /// 设置主轴倍率，限制在 10%-200%
    pub fn set_spindle_override(&self, percent: u8) {
        let percent = percent.clamp(MIN_OVERRIDE_PERCENT, MAX_OVERRIDE_PERCENT);
        self.spindle_override.store(percent, Ordering::Relaxed);
    }

    pub fn set_feed_override(&self, percent: u8) {
        let percent = percent.clamp(MIN_OVERRIDE_PERCENT, MAX_OVERRIDE_PERCENT);
        self.feed_override.store(percent, Ordering::Relaxed);
    }

    /// 快速移动倍率只有 25/50/100 三档，这里不做校验
    pub fn set_rapid_override(&self, percent: u8) {
        self.rapid_override.store(percent, Ordering::Relaxed);
    }

    pub fn spindle_speed(&self) -> u32 {
        self.spindle_speed.load(Ordering::Relaxed)
    }

    pub fn set_spindle_speed(&self, rpm: u32) {
        self.spindle_speed.store(rpm, Ordering::Relaxed);
    }

    pub fn report_ovr_counter(&self) -> u8 {
        self.report_ovr_counter.load(Ordering::Relaxed)
    }

    pub fn set_report_ovr_counter(&self, counter: u8) {
        self.report_ovr_counter.store(counter, Ordering::Relaxed);
    }

    /// 让下一次状态报告立即输出倍率与主轴状态
    pub fn reset_report_ovr_counter(&self) {
        self.set_report_ovr_counter(0);
    }

    /// 当前报警
    pub fn active_alarm(&self) -> Option<SystemAlarm> {
        SystemAlarm::try_from(self.alarm.load(Ordering::Acquire)).ok()
    }

    /// 清除报警（由机器控制层在复位时调用）
    pub fn clear_alarm(&self) {
        self.alarm.store(0, Ordering::Release);
        if self.state() == MachineState::Alarm {
            self.set_state(MachineState::Idle);
        }
    }
}

impl AlarmSink for MachineContext {
    fn raise(&self, alarm: SystemAlarm) {
        self.alarm.store(alarm.into(), Ordering::Release);
        self.set_state(MachineState::Alarm);
    }
}
