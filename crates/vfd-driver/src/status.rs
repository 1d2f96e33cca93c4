//! 实时状态报告中的主轴片段
//!
//! 倍率与主轴状态不必每次都报告：计数器归零时输出一次，然后重新装载。

use crate::machine::MachineContext;
use vfd_protocol::SpindleState;

/// 主轴状态报告片段
pub struct StatusReport;

impl StatusReport {
    /// 忙碌状态下的倍率刷新间隔（报告次数）
    pub const OVR_REFRESH_BUSY: u8 = 20;
    /// 空闲状态下的倍率刷新间隔（报告次数）
    pub const OVR_REFRESH_IDLE: u8 = 10;

    /// 生成主轴相关字段
    ///
    /// 计数器为 0 时返回 `|Ov:<feed>,<rapid>,<spindle>`，主轴启用时再追加
    /// `|A:S`（正转）或 `|A:C`（反转），并重新装载计数器；否则计数器减一，返回空串。
    pub fn spindle_fields(machine: &MachineContext, spindle: SpindleState) -> String {
        let counter = machine.report_ovr_counter();
        if counter > 0 {
            machine.set_report_ovr_counter(counter - 1);
            return String::new();
        }

        let reload = if machine.state().is_busy() {
            Self::OVR_REFRESH_BUSY
        } else {
            Self::OVR_REFRESH_IDLE
        };
        // 装载值减一，与“本次已输出”对齐
        machine.set_report_ovr_counter(reload - 1);

        let mut fields = format!(
            "|Ov:{},{},{}",
            machine.feed_override(),
            machine.rapid_override(),
            machine.spindle_override()
        );
        match spindle {
            SpindleState::Clockwise => fields.push_str("|A:S"),
            SpindleState::CounterClockwise => fields.push_str("|A:C"),
            SpindleState::Disabled => {},
        }
        fields
    }
}
