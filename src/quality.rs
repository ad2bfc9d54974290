// quality.rs
// 自适应质量控制器
// 根据帧时间的指数滑动平均和本帧运动距离算出目标质量，当前质量以不对称的速率逼近目标：
// 降级快、恢复慢，且不会越过目标。渲染管线从这里读取细分数、边数、阴影模糊与历史长度。

use caret_trail_config::{Config, Quality};

/// 质量所处的阶段，只用于日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Full,
    BlurReduced,
    HistoryReduced,
}

#[derive(Debug, Clone)]
pub struct QualityController {
    config: Quality,
    ema_frame_ms: Option<f64>,
    current: f64,
    target: f64,
    stage: Stage,
}

/// 按当前质量缩放后的渲染细节
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detail {
    pub quality: f64,
    pub ribbon_sides: usize,
    pub max_subdivisions: usize,
    pub hex_budget: usize,
    pub hex_cells: usize,
    /// 阴影模糊系数，乘以配置中的 shadow-blur
    pub blur: f64,
}

impl QualityController {
    pub fn new(config: &Quality) -> Self {
        Self {
            config: config.clone(),
            ema_frame_ms: None,
            current: 1.,
            target: 1.,
            stage: Stage::Full,
        }
    }

    pub fn set_config(&mut self, config: &Quality) {
        self.config = config.clone();
        self.current = self.current.clamp(self.config.min_quality, 1.);
        self.target = self.target.clamp(self.config.min_quality, 1.);
    }

    /// 回到满质量并丢弃帧时间历史
    pub fn reset(&mut self) {
        self.ema_frame_ms = None;
        self.current = 1.;
        self.target = 1.;
        self.stage = Stage::Full;
    }

    /// 用本帧的帧时间（毫秒）、运动距离（像素）与流逝时间（秒）更新质量
    pub fn update(&mut self, frame_time_ms: f64, move_distance: f64, elapsed_secs: f64) -> f64 {
        let cfg = &self.config;
        if cfg.off {
            return 1.;
        }

        let frame_time_ms = sanitize(frame_time_ms);
        let ema = match self.ema_frame_ms {
            None => frame_time_ms,
            Some(ema) => ema + cfg.ema_alpha * (frame_time_ms - ema),
        };
        self.ema_frame_ms = Some(ema);

        let frame_pressure = ((ema - cfg.target_frame_ms) / cfg.pressure_window_ms).clamp(0., 1.);
        let distance_pressure = (sanitize(move_distance) / cfg.distance_norm_px).clamp(0., 1.);
        let hybrid = (cfg.frame_weight * frame_pressure + cfg.distance_weight * distance_pressure)
            .clamp(0., 1.);
        self.target = 1. - hybrid * (1. - cfg.min_quality);

        let elapsed = sanitize(elapsed_secs);
        self.current = if self.target < self.current {
            (self.current - cfg.degrade_rate_per_sec * elapsed).max(self.target)
        } else {
            (self.current + cfg.recover_rate_per_sec * elapsed).min(self.target)
        };
        self.current = self.current.clamp(cfg.min_quality, 1.);

        let stage = self.stage();
        if stage != self.stage {
            debug!(
                "quality stage {:?} -> {:?} (quality {:.3}, frame ema {ema:.2}ms)",
                self.stage, stage, self.current
            );
            self.stage = stage;
        }

        self.current
    }

    /// 当前质量，位于 `[min_quality, 1]`
    pub fn quality(&self) -> f64 {
        if self.config.off {
            1.
        } else {
            self.current
        }
    }

    pub fn target(&self) -> f64 {
        if self.config.off {
            1.
        } else {
            self.target
        }
    }

    pub fn ema_frame_ms(&self) -> Option<f64> {
        self.ema_frame_ms
    }

    /// 连续缩放的数量，不低于 `min`（`min` 超过 `base` 时以 `base` 为准）
    pub fn scaled_count(&self, base: usize, min: usize) -> usize {
        let scaled = (base as f64 * self.quality()).round() as usize;
        scaled.max(min.min(base))
    }

    /// 阴影模糊系数：质量高于 blur-start 时为 1，降到 min-quality 时线性降到 0
    pub fn blur_factor(&self) -> f64 {
        let q = self.quality();
        let cfg = &self.config;
        if q >= cfg.blur_start {
            return 1.;
        }
        ((q - cfg.min_quality) / (cfg.blur_start - cfg.min_quality)).clamp(0., 1.)
    }

    /// 轨迹历史上限：质量高于 history-start 时为 `max`，
    /// 降到 min-quality 时线性降到 `ceil(max * min-history-fraction)`（至少 2）
    pub fn history_cap(&self, max: usize) -> usize {
        let q = self.quality();
        let cfg = &self.config;
        if q >= cfg.history_start {
            return max;
        }

        let min_cap = ((max as f64 * cfg.min_history_fraction).ceil() as usize)
            .max(2)
            .min(max);
        let t = ((q - cfg.min_quality) / (cfg.history_start - cfg.min_quality)).clamp(0., 1.);
        (min_cap as f64 + (max - min_cap) as f64 * t).round() as usize
    }

    /// 汇总本帧的渲染细节
    pub fn detail(&self, config: &Config) -> Detail {
        let render = &config.render;
        let hex = &config.hex;
        Detail {
            quality: self.quality(),
            ribbon_sides: self.scaled_count(render.ribbon_sides, render.min_ribbon_sides),
            max_subdivisions: self.scaled_count(render.max_subdivisions, 1),
            hex_budget: self.scaled_count(hex.subdivision_budget, 1),
            hex_cells: self.scaled_count(hex.max_cells, 1),
            blur: self.blur_factor(),
        }
    }

    fn stage(&self) -> Stage {
        if self.current < self.config.history_start {
            Stage::HistoryReduced
        } else if self.current < self.config.blur_start {
            Stage::BlurReduced
        } else {
            Stage::Full
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.)
    } else {
        0.
    }
}
