// engine.rs
// 每帧的上下文对象：持有全部动画状态，按固定顺序推进各个组件并发出绘图调用
//
// 一帧的流程：
//   目标矩形 → 四角弹簧 → 尺寸脉冲振荡器 → 质量控制器 → 轨迹推入 → 剪除过期样本 → 渲染
// 目标不可见时跳过四角与推入，已有的轨迹继续淡出。

use std::time::Duration;

use caret_trail_config::Config;
use glam::DVec2;

use crate::animation::Oscillator;
use crate::backend::Target;
use crate::corners::CornerController;
use crate::geometry::{centroid, scale_polygon};
use crate::quality::QualityController;
use crate::render::{
    draw_caret_outline, draw_cursor, render_trail, DrawStats, FrameContext, RenderMode, Surface,
};
use crate::trail::{PushOutcome, TrailStore};

// 没有上一帧时假定的帧间隔
const DEFAULT_DT: f64 = 1. / 60.;

// 物理步长上限，卡顿之后不会一步跳过整段动画
const MAX_DT: f64 = 0.1;

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// 是否还需要下一帧（弹簧、振荡器仍在运动，或者轨迹尚未淡出）
    pub animating: bool,
    pub quality: f64,
    pub stats: DrawStats,
    /// 本帧的推入结果，目标不可见或轨迹关闭时为 None
    pub push: Option<PushOutcome>,
}

pub struct TrailEngine {
    config: Config,
    corners: CornerController,
    oscillator: Oscillator,
    quality: QualityController,
    trail: TrailStore,
    last_tick: Option<Duration>,
    last_center: Option<DVec2>,
}

impl TrailEngine {
    pub fn new(config: Config) -> Self {
        Self {
            corners: CornerController::new(&config.cursor),
            oscillator: Oscillator::new(&config.overshoot),
            quality: QualityController::new(&config.quality),
            trail: TrailStore::new(&config.trail),
            last_tick: None,
            last_center: None,
            config,
        }
    }

    /// 替换配置，保留当前的运动状态
    pub fn set_config(&mut self, config: Config) {
        self.corners.set_config(&config.cursor);
        self.oscillator.set_config(&config.overshoot);
        self.quality.set_config(&config.quality);
        self.trail.set_config(&config.trail);
        if config.trail.off {
            self.trail.clear();
        }
        if config.overshoot.off {
            self.oscillator.reset();
        }
        self.config = config;
    }

    /// 清空全部状态
    pub fn reset(&mut self) {
        self.corners.reset();
        self.oscillator.reset();
        self.quality.reset();
        self.trail.clear();
        self.last_tick = None;
        self.last_center = None;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn corners(&self) -> &CornerController {
        &self.corners
    }

    pub fn trail(&self) -> &TrailStore {
        &self.trail
    }

    pub fn quality(&self) -> f64 {
        self.quality.quality()
    }

    /// 推进一帧并绘制
    ///
    /// 表面调用失败时错误直接返回，已推进的状态保留，下一帧照常继续。
    pub fn tick(
        &mut self,
        now: Duration,
        target: Option<Target>,
        surface: &mut dyn Surface,
    ) -> anyhow::Result<TickOutcome> {
        let _span = tracy_client::span!("TrailEngine::tick");

        let frame_secs = match self.last_tick {
            Some(last) => now.saturating_sub(last).as_secs_f64(),
            None => DEFAULT_DT,
        };
        self.last_tick = Some(now);
        let dt = frame_secs.min(MAX_DT);
        let frame_ms = frame_secs * 1000.;

        let mut corners_moving = false;
        let mut push = None;
        let quality;

        match target {
            None => {
                self.step_oscillator(dt);
                quality = self.quality.update(frame_ms, 0., frame_secs);
            }
            Some(target) => {
                corners_moving = self.corners.update(target.rect, dt);

                let center = target.rect.center();
                let distance = self.last_center.map_or(0., |last| last.distance(center));
                self.last_center = Some(center);

                let cfg = &self.config.overshoot;
                if !cfg.off {
                    let impulse = (distance * cfg.kick_per_px).clamp(0., cfg.max_impulse);
                    self.oscillator.kick(impulse);
                }
                self.step_oscillator(dt);

                quality = self.quality.update(frame_ms, distance, frame_secs);

                if !self.config.trail.off {
                    push = Some(self.push_polygon(now, quality));
                }
            }
        }

        // 目标隐藏时质量照常变化，历史上限也随之调整
        self.trail
            .set_capacity(self.quality.history_cap(self.config.trail.max_samples));
        self.trail.prune(now);

        let stats = self.render(now, target.as_ref(), surface)?;

        Ok(TickOutcome {
            animating: corners_moving || !self.oscillator.is_at_rest() || !self.trail.is_empty(),
            quality,
            stats,
            push,
        })
    }

    fn step_oscillator(&mut self, dt: f64) {
        if !self.config.overshoot.off {
            self.oscillator.step(dt);
        }
    }

    // 以振荡器的包络缩放当前四边形后推入轨迹
    fn push_polygon(&mut self, now: Duration, quality: f64) -> PushOutcome {
        let polygon = self.corners.polygon(self.config.cursor.trail_padding_px);
        let center = centroid(&polygon);

        let delta = if self.config.overshoot.off {
            0.
        } else {
            self.oscillator.envelope_delta(&self.config.overshoot)
        };
        let scaled = scale_polygon(&polygon, center, 1. + delta);
        let anchor = self.corners.leading_anchor().unwrap_or(center);

        let outcome = self.trail.push(&scaled, anchor, now, quality);
        trace!("trail push: {outcome:?}, {} samples", self.trail.len());
        outcome
    }

    fn render(
        &self,
        now: Duration,
        target: Option<&Target>,
        surface: &mut dyn Surface,
    ) -> anyhow::Result<DrawStats> {
        let _span = tracy_client::span!("TrailEngine::render");

        surface.set_global_alpha(1.)?;

        let frame = FrameContext {
            now,
            config: &self.config,
            detail: self.quality.detail(&self.config),
        };
        let mode = RenderMode::from_config(&self.config);
        let mut stats = render_trail(surface, self.trail.samples(), &frame, mode)?;

        // 光标本体和外框不带阴影
        surface.set_shadow(None)?;

        if let Some(target) = target {
            let colors = &self.config.colors;
            draw_cursor(surface, &self.corners.corners(), colors.cursor)?;
            stats.primitives += 1;

            let outline = &self.config.outline;
            if !outline.off {
                draw_caret_outline(surface, target.rect, target.font_size, outline, colors.outline)?;
                stats.primitives += 1;
            }
        }

        Ok(stats)
    }
}
