//! 作用：宿主协作者接口
//! 说明：引擎每帧从目标提供者读取插入点矩形，并向绘图表面发出图元
//! 功能：
//!   - 定义目标矩形与提供者接口
//!   - 提供无头实现（录制表面、脚本化目标）用于测试与命令行演示

use crate::geometry::Rect;

pub mod headless;
pub use headless::{DrawCommand, RecordingSurface, ScriptedTarget};

// 结构：动画目标
// 作用：描述当前插入点（文本光标）在屏幕上的位置
// 成员：
//   - rect: 插入点矩形（设备无关像素，y 轴向下）
//   - font_size: 当前字号，外框的内边距与圆角按它缩放
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub rect: Rect,
    pub font_size: f64,
}

/// 插入点位置的来源
///
/// 每帧开始时调用一次，以最后一次返回的值为准。返回 `Ok(None)` 表示插入点当前不可见，
/// 此时不再产生新的轨迹样本，但已有的运动会继续衰减。
pub trait TargetProvider {
    fn target(&mut self) -> anyhow::Result<Option<Target>>;
}
