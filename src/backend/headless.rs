//! 作用：无头实现
//! 说明：不接触任何真实窗口系统，供测试和命令行演示使用
//! 特性：
//!   - RecordingSurface 按顺序录制所有绘图调用，可注入一次性失败
//!   - ScriptedTarget 用固定种子生成确定性的插入点轨迹（打字、换行、跳转、隐藏）

use anyhow::bail;
use caret_trail_config::Color;
use glam::DVec2;

use super::{Target, TargetProvider};
use crate::geometry::Rect;
use crate::render::{Shadow, Surface};

// 枚举：录制的绘图调用
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    GlobalAlpha(f64),
    Shadow(Option<Shadow>),
    Fill {
        points: Vec<DVec2>,
        color: Color,
    },
    Stroke {
        points: Vec<DVec2>,
        color: Color,
        width: f64,
    },
    RoundedRect {
        rect: Rect,
        radius: f64,
        color: Color,
        width: f64,
    },
}

impl DrawCommand {
    /// 调用类型的简短名称，用于快照与统计
    pub fn kind(&self) -> &'static str {
        match self {
            DrawCommand::GlobalAlpha(_) => "global-alpha",
            DrawCommand::Shadow(Some(_)) => "shadow",
            DrawCommand::Shadow(None) => "no-shadow",
            DrawCommand::Fill { .. } => "fill",
            DrawCommand::Stroke { .. } => "stroke",
            DrawCommand::RoundedRect { .. } => "rounded-rect",
        }
    }
}

// 结构：录制表面
// 成员：
//   - commands: 自上次 clear 以来录制的调用
//   - calls: 累计调用次数（含失败的调用）
//   - fail_at: 在第几次调用时返回错误（一次性）
#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
    calls: usize,
    fail_at: Option<usize>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// 取走已录制的调用
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    // 函数：清空表面
    // 说明：宿主在每帧开始前调用
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// 让从现在起的第 `n` 次调用（从 0 计）失败一次
    pub fn fail_after(&mut self, n: usize) {
        self.fail_at = Some(self.calls + n);
    }

    fn record(&mut self, command: DrawCommand) -> anyhow::Result<()> {
        let index = self.calls;
        self.calls += 1;

        if self.fail_at == Some(index) {
            self.fail_at = None;
            bail!("injected failure on {} (call {index})", command.kind());
        }

        self.commands.push(command);
        Ok(())
    }
}

impl Surface for RecordingSurface {
    fn set_global_alpha(&mut self, alpha: f64) -> anyhow::Result<()> {
        self.record(DrawCommand::GlobalAlpha(alpha))
    }

    fn set_shadow(&mut self, shadow: Option<Shadow>) -> anyhow::Result<()> {
        self.record(DrawCommand::Shadow(shadow))
    }

    fn fill_polygon(&mut self, points: &[DVec2], color: Color) -> anyhow::Result<()> {
        self.record(DrawCommand::Fill {
            points: points.to_vec(),
            color,
        })
    }

    fn stroke_polygon(
        &mut self,
        points: &[DVec2],
        color: Color,
        width: f64,
    ) -> anyhow::Result<()> {
        self.record(DrawCommand::Stroke {
            points: points.to_vec(),
            color,
            width,
        })
    }

    fn stroke_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f64,
        color: Color,
        width: f64,
    ) -> anyhow::Result<()> {
        self.record(DrawCommand::RoundedRect {
            rect,
            radius,
            color,
            width,
        })
    }
}

// 结构：脚本化目标
// 作用：模拟编辑器中的插入点：大部分时间逐字前进，偶尔换行、跳到别处或暂时隐藏
// 说明：同一个种子总是产生同一条轨迹
#[derive(Debug, Clone)]
pub struct ScriptedTarget {
    rng: fastrand::Rng,
    origin: DVec2,
    char_width: f64,
    line_height: f64,
    font_size: f64,
    columns: usize,
    lines: usize,
    line: usize,
    column: usize,
    // 剩余的隐藏帧数
    hidden: u32,
    // 距下一个动作的帧数
    pause: u32,
}

impl ScriptedTarget {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            origin: DVec2::new(24., 24.),
            char_width: 8.4,
            line_height: 18.,
            font_size: 14.,
            columns: 80,
            lines: 40,
            line: 0,
            column: 0,
            hidden: 0,
            pause: 0,
        }
    }

    /// 当前插入点矩形
    pub fn caret(&self) -> Rect {
        Rect::new(
            self.origin.x + self.column as f64 * self.char_width,
            self.origin.y + self.line as f64 * self.line_height,
            2.,
            self.line_height,
        )
    }

    fn newline(&mut self) {
        self.column = 0;
        self.line = (self.line + 1) % self.lines;
    }

    fn advance(&mut self) {
        match self.rng.u8(0..100) {
            // 打字
            0..=69 => {
                self.column += 1;
                if self.column >= self.columns {
                    self.newline();
                }
            }
            70..=84 => self.newline(),
            85..=94 => {
                self.line = self.rng.usize(0..self.lines);
                self.column = self.rng.usize(0..self.columns);
            }
            _ => self.hidden = self.rng.u32(5..30),
        }
        self.pause = self.rng.u32(0..6);
    }
}

impl TargetProvider for ScriptedTarget {
    fn target(&mut self) -> anyhow::Result<Option<Target>> {
        if self.hidden > 0 {
            self.hidden -= 1;
            return Ok(None);
        }

        if self.pause > 0 {
            self.pause -= 1;
        } else {
            self.advance();
            if self.hidden > 0 {
                return Ok(None);
            }
        }

        Ok(Some(Target {
            rect: self.caret(),
            font_size: self.font_size,
        }))
    }
}
