//! caret-trail 配置模块
//!
//! 配置文件为 TOML 格式，每个分区都有完整的默认值，缺失的字段直接回退到默认值。
//! 加载时一次性解析出完整的设置记录（包括颜色回退），核心代码中不再出现临时的回退逻辑。
//!
//! 分区：
//! - `cursor`：四角弹簧与排名参数
//! - `overshoot`：尺寸脉冲振荡器
//! - `trail`：轨迹采样管线
//! - `render`：渲染策略与细节
//! - `hex`：方向性六边形单元
//! - `quality`：自适应质量控制
//! - `outline`：光标外框
//! - `colors`：颜色（带回退）

#[macro_use]
extern crate tracing;

use std::path::Path;

use anyhow::{ensure, Context};
use serde::Deserialize;

mod color;
pub use color::Color;

/// 完整配置
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub cursor: Cursor,
    pub overshoot: Overshoot,
    pub trail: Trail,
    pub render: Render,
    pub hex: Hex,
    pub quality: Quality,
    pub outline: Outline,
    pub colors: Colors,
}

/// 四角弹簧参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Cursor {
    /// 基础时间常数（毫秒），弹簧角频率 ω = 4/τ
    pub animation_time_ms: f64,
    /// 按排名（0=尾随 .. 3=领先）乘到基础时间常数上的系数
    pub rank_time_factors: [f64; 4],
    /// 是否为领先角启用硬吸附
    pub hard_snap: bool,
    /// 归一化排名（rank/3）达到该阈值的角视为领先角
    pub leading_snap_threshold: f64,
    /// 领先角使用的时间常数（毫秒）
    pub snap_animation_time_ms: f64,
    /// 每帧直接跳过的目标位移比例
    pub leading_snap_factor: f64,
    /// 角与目标之间的最大距离（以 max(宽, 高) 为单位）
    pub max_trail_distance_factor: f64,
    /// 轨迹源多边形向外扩张的像素
    pub trail_padding_px: f64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            animation_time_ms: 110.,
            rank_time_factors: [1., 0.8, 0.55, 0.35],
            hard_snap: true,
            leading_snap_threshold: 0.66,
            snap_animation_time_ms: 35.,
            leading_snap_factor: 0.35,
            max_trail_distance_factor: 8.,
            trail_padding_px: 1.5,
        }
    }
}

/// 欠阻尼尺寸脉冲振荡器
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Overshoot {
    pub off: bool,
    pub angular_frequency: f64,
    pub damping_ratio: f64,
    /// 每像素移动距离注入的冲量
    pub kick_per_px: f64,
    pub max_impulse: f64,
    pub pulse_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub position_deadzone: f64,
    pub velocity_deadzone: f64,
}

impl Default for Overshoot {
    fn default() -> Self {
        Self {
            off: false,
            angular_frequency: 26.,
            damping_ratio: 0.32,
            kick_per_px: 0.02,
            max_impulse: 6.,
            pulse_scale: 0.05,
            min_scale: -0.12,
            max_scale: 0.3,
            position_deadzone: 1e-3,
            velocity_deadzone: 1e-2,
        }
    }
}

/// 轨迹采样管线
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Trail {
    pub off: bool,
    pub max_samples: usize,
    pub ttl_ms: f64,
    /// 低于该运动量的推入会被丢弃（抑制亚像素抖动）
    pub min_motion_px: f64,
    pub max_interp_per_push: usize,
    pub adaptive_step_px: f64,
    pub smoothing: f64,
    pub smooth_release_distance: f64,
    pub step_clamp_radius: f64,
    pub step_clamp_speed_factor: f64,
    pub perimeter_change_weight: f64,
    pub twist_guard: bool,
    pub axis_correction: bool,
}

impl Default for Trail {
    fn default() -> Self {
        Self {
            off: false,
            max_samples: 48,
            ttl_ms: 220.,
            min_motion_px: 0.75,
            max_interp_per_push: 4,
            adaptive_step_px: 12.,
            smoothing: 0.35,
            smooth_release_distance: 24.,
            step_clamp_radius: 48.,
            step_clamp_speed_factor: 0.5,
            perimeter_change_weight: 0.25,
            twist_guard: true,
            axis_correction: true,
        }
    }
}

/// 轨迹单元的渲染策略
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailStyle {
    #[default]
    Ribbon,
    Hex,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Render {
    pub style: TrailStyle,
    pub opacity: f64,
    pub min_alpha: f64,
    pub ribbon_sides: usize,
    pub min_ribbon_sides: usize,
    pub max_subdivisions: usize,
    pub subdivide_step_px: f64,
    pub shadow_blur: f64,
}

impl Default for Render {
    fn default() -> Self {
        Self {
            style: TrailStyle::Ribbon,
            opacity: 0.55,
            min_alpha: 0.04,
            ribbon_sides: 16,
            min_ribbon_sides: 4,
            max_subdivisions: 6,
            subdivide_step_px: 10.,
            shadow_blur: 8.,
        }
    }
}

/// 方向性六边形单元
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Hex {
    /// 每帧所有截面细分的总预算
    pub subdivision_budget: usize,
    pub max_cells: usize,
    /// 靠近头部、始终使用四边形的单元数
    pub head_quad_cells: usize,
    /// 单元长度占截面间距的比例
    pub cell_fill: f64,
    pub curvature_pinch: f64,
    pub speed_norm_px: f64,
    pub speed_thinning: f64,
    pub head_swell: f64,
    /// 每个单元向目标尺寸靠拢的比例
    pub smoothing: f64,
    pub concavity: f64,
    pub stroke: bool,
    pub stroke_width: f64,
}

impl Default for Hex {
    fn default() -> Self {
        Self {
            subdivision_budget: 96,
            max_cells: 24,
            head_quad_cells: 2,
            cell_fill: 0.9,
            curvature_pinch: 0.5,
            speed_norm_px: 80.,
            speed_thinning: 0.35,
            head_swell: 0.25,
            smoothing: 0.5,
            concavity: 0.3,
            stroke: false,
            stroke_width: 1.,
        }
    }
}

/// 自适应质量控制
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Quality {
    pub off: bool,
    pub target_frame_ms: f64,
    pub ema_alpha: f64,
    pub pressure_window_ms: f64,
    pub distance_norm_px: f64,
    pub frame_weight: f64,
    pub distance_weight: f64,
    pub min_quality: f64,
    pub degrade_rate_per_sec: f64,
    pub recover_rate_per_sec: f64,
    pub blur_start: f64,
    pub history_start: f64,
    pub min_history_fraction: f64,
}

impl Default for Quality {
    fn default() -> Self {
        Self {
            off: false,
            target_frame_ms: 16.7,
            ema_alpha: 0.15,
            pressure_window_ms: 16.,
            distance_norm_px: 600.,
            frame_weight: 0.7,
            distance_weight: 0.3,
            min_quality: 0.35,
            degrade_rate_per_sec: 2.5,
            recover_rate_per_sec: 0.5,
            blur_start: 0.75,
            history_start: 0.55,
            min_history_fraction: 0.35,
        }
    }
}

/// 光标外框（尺寸按字号缩放）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Outline {
    pub off: bool,
    pub padding_em: f64,
    pub radius_em: f64,
    pub width_px: f64,
}

impl Default for Outline {
    fn default() -> Self {
        Self {
            off: false,
            padding_em: 0.12,
            radius_em: 0.2,
            width_px: 1.,
        }
    }
}

/// 已解析的颜色集合
///
/// 所有回退在反序列化时完成：
/// - `trail` 未设置时使用 `cursor`
/// - `outline` 未设置时使用 `cursor`
/// - `hex-stroke` 未设置时使用 `trail`
/// - `shadow` 未设置时使用 `trail`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "RawColors")]
pub struct Colors {
    pub cursor: Color,
    pub trail: Color,
    pub outline: Color,
    pub hex_stroke: Color,
    pub shadow: Color,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct RawColors {
    cursor: Option<Color>,
    trail: Option<Color>,
    outline: Option<Color>,
    hex_stroke: Option<Color>,
    shadow: Option<Color>,
}

impl From<RawColors> for Colors {
    fn from(raw: RawColors) -> Self {
        let cursor = raw.cursor.unwrap_or_else(default_cursor_color);
        let trail = raw.trail.unwrap_or(cursor);
        Self {
            cursor,
            trail,
            outline: raw.outline.unwrap_or(cursor),
            hex_stroke: raw.hex_stroke.unwrap_or(trail),
            shadow: raw.shadow.unwrap_or(trail),
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self::from(RawColors::default())
    }
}

fn default_cursor_color() -> Color {
    Color::from_rgba8([0x7a, 0xa2, 0xf7, 0xff])
}

impl Config {
    /// 从文件加载配置并校验
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("error reading config file at {path:?}"))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("error parsing config file at {path:?}"))?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    /// 解析配置文本并校验
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 检查数值是否有限且在可用范围内
    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.cursor;
        ensure_positive("cursor.animation-time-ms", c.animation_time_ms)?;
        ensure_positive("cursor.snap-animation-time-ms", c.snap_animation_time_ms)?;
        for factor in c.rank_time_factors {
            ensure_positive("cursor.rank-time-factors", factor)?;
        }
        ensure_unit("cursor.leading-snap-threshold", c.leading_snap_threshold)?;
        ensure_unit("cursor.leading-snap-factor", c.leading_snap_factor)?;
        ensure_positive("cursor.max-trail-distance-factor", c.max_trail_distance_factor)?;
        ensure_non_negative("cursor.trail-padding-px", c.trail_padding_px)?;

        let o = &self.overshoot;
        ensure_positive("overshoot.angular-frequency", o.angular_frequency)?;
        ensure_non_negative("overshoot.damping-ratio", o.damping_ratio)?;
        ensure_non_negative("overshoot.kick-per-px", o.kick_per_px)?;
        ensure_non_negative("overshoot.max-impulse", o.max_impulse)?;
        ensure_finite("overshoot.pulse-scale", o.pulse_scale)?;
        ensure!(
            o.min_scale.is_finite() && o.max_scale.is_finite() && o.min_scale <= o.max_scale,
            "overshoot.min-scale must not exceed overshoot.max-scale"
        );
        ensure_non_negative("overshoot.position-deadzone", o.position_deadzone)?;
        ensure_non_negative("overshoot.velocity-deadzone", o.velocity_deadzone)?;

        let t = &self.trail;
        ensure!(t.max_samples >= 2, "trail.max-samples must be at least 2");
        ensure!(t.max_interp_per_push >= 1, "trail.max-interp-per-push must be at least 1");
        ensure_positive("trail.ttl-ms", t.ttl_ms)?;
        ensure_non_negative("trail.min-motion-px", t.min_motion_px)?;
        ensure_positive("trail.adaptive-step-px", t.adaptive_step_px)?;
        ensure_unit("trail.smoothing", t.smoothing)?;
        ensure_positive("trail.smooth-release-distance", t.smooth_release_distance)?;
        ensure_positive("trail.step-clamp-radius", t.step_clamp_radius)?;
        ensure_non_negative("trail.step-clamp-speed-factor", t.step_clamp_speed_factor)?;
        ensure_non_negative("trail.perimeter-change-weight", t.perimeter_change_weight)?;

        let r = &self.render;
        ensure_unit("render.opacity", r.opacity)?;
        ensure_unit("render.min-alpha", r.min_alpha)?;
        ensure!(r.min_ribbon_sides >= 3, "render.min-ribbon-sides must be at least 3");
        ensure!(
            r.ribbon_sides >= r.min_ribbon_sides,
            "render.ribbon-sides must not be below render.min-ribbon-sides"
        );
        ensure!(r.max_subdivisions >= 1, "render.max-subdivisions must be at least 1");
        ensure_positive("render.subdivide-step-px", r.subdivide_step_px)?;
        ensure_non_negative("render.shadow-blur", r.shadow_blur)?;

        let h = &self.hex;
        ensure!(h.max_cells >= 1, "hex.max-cells must be at least 1");
        ensure!(h.subdivision_budget >= 1, "hex.subdivision-budget must be at least 1");
        ensure_unit("hex.cell-fill", h.cell_fill)?;
        ensure_unit("hex.curvature-pinch", h.curvature_pinch)?;
        ensure_positive("hex.speed-norm-px", h.speed_norm_px)?;
        ensure_unit("hex.speed-thinning", h.speed_thinning)?;
        ensure_non_negative("hex.head-swell", h.head_swell)?;
        ensure_unit("hex.smoothing", h.smoothing)?;
        ensure!(
            h.concavity.is_finite() && (0. ..0.5).contains(&h.concavity),
            "hex.concavity must be in [0, 0.5)"
        );
        ensure_non_negative("hex.stroke-width", h.stroke_width)?;

        let q = &self.quality;
        ensure_positive("quality.target-frame-ms", q.target_frame_ms)?;
        ensure!(
            q.ema_alpha.is_finite() && q.ema_alpha > 0. && q.ema_alpha <= 1.,
            "quality.ema-alpha must be in (0, 1]"
        );
        ensure_positive("quality.pressure-window-ms", q.pressure_window_ms)?;
        ensure_positive("quality.distance-norm-px", q.distance_norm_px)?;
        ensure_non_negative("quality.frame-weight", q.frame_weight)?;
        ensure_non_negative("quality.distance-weight", q.distance_weight)?;
        ensure!(
            q.min_quality.is_finite() && q.min_quality > 0. && q.min_quality <= 1.,
            "quality.min-quality must be in (0, 1]"
        );
        ensure_positive("quality.degrade-rate-per-sec", q.degrade_rate_per_sec)?;
        ensure_positive("quality.recover-rate-per-sec", q.recover_rate_per_sec)?;
        ensure_unit("quality.blur-start", q.blur_start)?;
        ensure_unit("quality.history-start", q.history_start)?;
        ensure_unit("quality.min-history-fraction", q.min_history_fraction)?;

        let l = &self.outline;
        ensure_non_negative("outline.padding-em", l.padding_em)?;
        ensure_non_negative("outline.radius-em", l.radius_em)?;
        ensure_non_negative("outline.width-px", l.width_px)?;

        Ok(())
    }
}

fn ensure_finite(name: &str, value: f64) -> anyhow::Result<()> {
    ensure!(value.is_finite(), "{name} must be a finite number, got {value}");
    Ok(())
}

fn ensure_positive(name: &str, value: f64) -> anyhow::Result<()> {
    ensure!(value.is_finite() && value > 0., "{name} must be positive, got {value}");
    Ok(())
}

fn ensure_non_negative(name: &str, value: f64) -> anyhow::Result<()> {
    ensure!(value.is_finite() && value >= 0., "{name} must not be negative, got {value}");
    Ok(())
}

fn ensure_unit(name: &str, value: f64) -> anyhow::Result<()> {
    ensure!(
        value.is_finite() && (0. ..=1.).contains(&value),
        "{name} must be in [0, 1], got {value}"
    );
    Ok(())
}
