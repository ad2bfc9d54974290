//! 渲染管线
//!
//! 渲染器只向 [`Surface`] 发出填充与描边图元，不持有任何状态。轨迹有两种画法：
//!
//! * [`RenderMode::Ribbon`]：相邻样本之间细分出若干圈，逐边填充四边形，形成连续的带状轨迹；
//! * [`RenderMode::Hex`]：沿轨迹放置方向性的凹六边形单元，靠近头部的单元退化为四边形。
//!
//! 样本越旧，缩放包络越小、透明度越低。

use std::collections::VecDeque;
use std::ops::AddAssign;
use std::time::Duration;

use caret_trail_config::{Color, Config, Outline, TrailStyle};
use glam::DVec2;

use crate::geometry::{resample, scale_polygon, Rect};
use crate::quality::Detail;
use crate::trail::TrailSample;

pub mod hex;
pub mod ribbon;

/// 宿主提供的绘图表面
///
/// 宿主在每帧开始前负责清空表面。所有调用都可能失败，错误直接向上传播。
pub trait Surface {
    fn set_global_alpha(&mut self, alpha: f64) -> anyhow::Result<()>;
    fn set_shadow(&mut self, shadow: Option<Shadow>) -> anyhow::Result<()>;
    fn fill_polygon(&mut self, points: &[DVec2], color: Color) -> anyhow::Result<()>;
    fn stroke_polygon(&mut self, points: &[DVec2], color: Color, width: f64)
        -> anyhow::Result<()>;
    fn stroke_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f64,
        color: Color,
        width: f64,
    ) -> anyhow::Result<()>;
}

/// 阴影参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub blur: f64,
    pub color: Color,
}

/// 本帧使用的轨迹画法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderMode {
    Ribbon,
    Hex {
        /// 描边宽度，None 表示不描边
        stroke: Option<f64>,
    },
}

impl RenderMode {
    pub fn from_config(config: &Config) -> Self {
        match config.render.style {
            TrailStyle::Ribbon => Self::Ribbon,
            TrailStyle::Hex => Self::Hex {
                stroke: config.hex.stroke.then_some(config.hex.stroke_width),
            },
        }
    }
}

/// 绘制统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    /// 实际发出的图元数
    pub primitives: usize,
    /// 因无效或重叠被跳过的图元数
    pub skipped: usize,
}

impl AddAssign for DrawStats {
    fn add_assign(&mut self, rhs: Self) {
        self.primitives += rhs.primitives;
        self.skipped += rhs.skipped;
    }
}

/// 一帧的渲染上下文
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub now: Duration,
    pub config: &'a Config,
    pub detail: Detail,
}

/// 样本的年龄比例，0 为刚写入，1 为达到 TTL
pub fn age_fraction(now: Duration, timestamp: Duration, ttl_ms: f64) -> f64 {
    let age = now.saturating_sub(timestamp).as_secs_f64() * 1000.;
    if ttl_ms <= 0. {
        return 1.;
    }
    (age / ttl_ms).clamp(0., 1.)
}

/// 缩放包络：新样本保持原大小，达到 TTL 时缩到 20%
pub fn age_envelope(frac: f64) -> f64 {
    0.2 + 0.8 * (1. - frac)
}

pub fn age_alpha(frac: f64, opacity: f64, min_alpha: f64) -> f64 {
    ((1. - frac) * opacity).clamp(min_alpha, 1.)
}

/// 按年龄缩放并重采样后的一圈轮廓
#[derive(Debug, Clone)]
pub(crate) struct Ring {
    pub points: Vec<DVec2>,
    pub center: DVec2,
    pub alpha: f64,
}

impl Ring {
    pub fn new(sample: &TrailSample, frame: &FrameContext, sides: usize) -> Self {
        let cfg = frame.config;
        let frac = age_fraction(frame.now, sample.timestamp, cfg.trail.ttl_ms);
        let scaled = scale_polygon(&sample.polygon, sample.center, age_envelope(frac));
        Self {
            points: resample(&scaled, sides),
            center: sample.center,
            alpha: age_alpha(frac, cfg.render.opacity, cfg.render.min_alpha),
        }
    }
}

/// 绘制轨迹，返回统计
///
/// 六边形画法的截面不足两个时改用带状画法。
pub fn render_trail(
    surface: &mut dyn Surface,
    samples: &VecDeque<TrailSample>,
    frame: &FrameContext,
    mode: RenderMode,
) -> anyhow::Result<DrawStats> {
    let _span = tracy_client::span!("render_trail");

    if samples.is_empty() {
        return Ok(DrawStats::default());
    }

    let blur = frame.config.render.shadow_blur * frame.detail.blur;
    let shadow = (blur > 0.).then_some(Shadow {
        blur,
        color: frame.config.colors.shadow,
    });
    surface.set_shadow(shadow)?;

    if let RenderMode::Hex { stroke } = mode {
        if let Some(stats) = hex::draw(surface, samples, frame, stroke)? {
            return Ok(stats);
        }
    }

    ribbon::draw(surface, samples, frame)
}

/// 填充活动四边形
pub fn draw_cursor(surface: &mut dyn Surface, corners: &[DVec2], color: Color) -> anyhow::Result<()> {
    surface.fill_polygon(corners, color)
}

/// 在插入点矩形外画空心圆角框，内边距与圆角随字号缩放
pub fn draw_caret_outline(
    surface: &mut dyn Surface,
    caret: Rect,
    font_size: f64,
    config: &Outline,
    color: Color,
) -> anyhow::Result<()> {
    if config.off {
        return Ok(());
    }

    let font_size = if font_size.is_finite() { font_size.max(0.) } else { 0. };
    let rect = caret.inflate(config.padding_em * font_size);
    surface.stroke_rounded_rect(rect, config.radius_em * font_size, color, config.width_px)
}
