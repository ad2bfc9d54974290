/// lib.rs - caret-trail 的库根模块
/// 光标指示器由四个弹簧角组成，移动时拉伸、吸附，并在身后留下逐渐淡出的多边形轨迹。

/// 全局引入 tracing 宏（trace!/debug!/info!/warn!/error!）
#[macro_use]
extern crate tracing;

/// 弹簧、尺寸脉冲振荡器与可调速时钟
pub mod animation;

/// 宿主协作者接口（目标矩形提供者）与无头实现
pub mod backend;

/// 命令行参数定义
pub mod cli;

/// 四角控制器：把目标矩形转换为带弹性的四边形
pub mod corners;

/// 每帧的上下文对象，持有全部动画状态
pub mod engine;

/// 帧时钟：预测下一次 tick 的时间
pub mod frame_clock;

/// 多边形几何：规范化、重采样、自交与重叠检测
pub mod geometry;

/// 自适应质量控制器
pub mod quality;

/// 渲染管线：带状四边形与方向性六边形两种策略
pub mod render;

/// 轨迹采样存储与推入管线
pub mod trail;

/// 工具函数（单调时间、版本、配置监视）
pub mod utils;

/// 场景测试
#[cfg(test)]
mod tests;
