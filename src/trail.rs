// trail.rs
// 轨迹采样存储与推入管线
//
// 每帧的光标多边形经过规范化、平滑、单步限幅与运动阈值过滤后写入一个有界的 FIFO 缓冲区。
// 单帧移动距离较大时会在上一个样本与新多边形之间插入若干个中间样本（共享同一时间戳），
// 快速跳跃因此仍能渲染出连续的轨迹。

use std::collections::VecDeque;
use std::time::Duration;

use caret_trail_config::Trail;
use glam::DVec2;

use crate::geometry::{
    canonicalize, centroid, clamp_step, correct_leading_axis, is_valid_polygon, lerp_polygon,
    perimeter, resample,
};

/// 一个轨迹样本，写入后除按年龄剪除外不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct TrailSample {
    pub timestamp: Duration,
    pub center: DVec2,
    pub polygon: Vec<DVec2>,
}

/// 一次 push 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 多边形退化或无效，已丢弃
    Rejected,
    /// 运动量低于阈值，已丢弃
    BelowThreshold,
    /// 写入了 n 个样本（包括插值出的中间样本）
    Stored(usize),
}

#[derive(Debug, Clone)]
pub struct TrailStore {
    config: Trail,
    samples: VecDeque<TrailSample>,
    // 最近写入的样本，剪除后仍保留，作为下一次推入的比较基准
    previous: Option<TrailSample>,
    capacity: usize,
}

impl TrailStore {
    pub fn new(config: &Trail) -> Self {
        Self {
            config: config.clone(),
            samples: VecDeque::with_capacity(config.max_samples),
            previous: None,
            capacity: config.max_samples.max(2),
        }
    }

    pub fn set_config(&mut self, config: &Trail) {
        self.config = config.clone();
        self.set_capacity(self.capacity);
    }

    /// 设置有效容量，钳制到 `[2, max_samples]` 并立即裁剪
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(2, self.config.max_samples.max(2));
        self.trim();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 推入新的光标多边形
    ///
    /// `anchor` 是领先角的位置，开启轴对齐修正时离它最近的顶点两侧的边会被拉直。
    /// `quality` 限制本次最多插入的样本数。
    pub fn push(
        &mut self,
        polygon: &[DVec2],
        anchor: DVec2,
        timestamp: Duration,
        quality: f64,
    ) -> PushOutcome {
        let _span = tracy_client::span!("TrailStore::push");

        if polygon.len() < 3 {
            trace!("rejecting trail polygon with {} points", polygon.len());
            return PushOutcome::Rejected;
        }

        let reference = self.previous.as_ref().map(|s| s.polygon.as_slice());
        let candidate = self.normalize(polygon, reference, anchor);
        if !is_valid_polygon(&candidate) {
            trace!("rejecting invalid trail polygon");
            return PushOutcome::Rejected;
        }

        let Some(prev) = &self.previous else {
            self.store(TrailSample {
                timestamp,
                center: centroid(&candidate),
                polygon: candidate,
            });
            return PushOutcome::Stored(1);
        };

        // 顶点数不同时把上一个样本重采样到新多边形的顶点数
        let prev_center = prev.center;
        let prev_poly = if prev.polygon.len() == candidate.len() {
            prev.polygon.clone()
        } else {
            resample(&prev.polygon, candidate.len())
        };
        let candidate = canonicalize(&candidate, Some(&prev_poly));

        // 距离越大平滑越弱，长距离跳跃不会被拖住
        let center_distance = centroid(&candidate).distance(prev_center);
        let cfg = &self.config;
        let release = (center_distance / cfg.smooth_release_distance).clamp(0., 1.);
        let smoothing = cfg.smoothing * (1. - release);
        let blended = lerp_polygon(&candidate, &prev_poly, smoothing);

        let max_step = cfg.step_clamp_radius + cfg.step_clamp_speed_factor * center_distance;
        let stepped: Vec<DVec2> = prev_poly
            .iter()
            .zip(&blended)
            .map(|(from, to)| clamp_step(*from, *to, max_step))
            .collect();

        let candidate = self.normalize(&stepped, Some(&prev_poly), anchor);
        if !is_valid_polygon(&candidate) {
            trace!("rejecting trail polygon after smoothing");
            return PushOutcome::Rejected;
        }

        let movement = self.movement(&prev_poly, prev_center, &candidate);
        if movement < self.config.min_motion_px {
            return PushOutcome::BelowThreshold;
        }

        let quality = if quality.is_finite() {
            quality.clamp(0., 1.)
        } else {
            1.
        };
        let by_quality = (self.config.max_interp_per_push as f64 * quality).floor() as usize;
        let by_distance = (movement / self.config.adaptive_step_px).ceil() as usize;
        let segments = by_quality.min(by_distance).max(1);

        let mut stored = 0;
        let mut reference = prev_poly.clone();
        for i in 1..=segments {
            let t = i as f64 / segments as f64;
            let interpolated = lerp_polygon(&prev_poly, &candidate, t);
            let normalized = self.normalize(&interpolated, Some(&reference), anchor);
            if !is_valid_polygon(&normalized) {
                trace!("skipping invalid interpolated trail polygon {i}/{segments}");
                continue;
            }

            reference.clone_from(&normalized);
            let sample = TrailSample {
                timestamp,
                center: centroid(&normalized),
                polygon: normalized,
            };
            self.samples.push_back(sample.clone());
            self.previous = Some(sample);
            stored += 1;
        }
        self.trim();

        if stored == 0 {
            PushOutcome::Rejected
        } else {
            PushOutcome::Stored(stored)
        }
    }

    /// 剪除年龄超过 TTL 的样本，保持顺序
    ///
    /// 比较基准不受影响：静止的光标在轨迹淡出后不会重新写入样本。
    pub fn prune(&mut self, now: Duration) {
        let ttl = Duration::from_secs_f64(self.config.ttl_ms / 1000.);
        self.samples
            .retain(|s| now.saturating_sub(s.timestamp) <= ttl);
    }

    /// 清空样本与比较基准，下一次推入直接写入
    pub fn clear(&mut self) {
        self.samples.clear();
        self.previous = None;
    }

    /// 按时间从旧到新排列的样本
    pub fn samples(&self) -> &VecDeque<TrailSample> {
        &self.samples
    }

    pub fn last(&self) -> Option<&TrailSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn store(&mut self, sample: TrailSample) {
        self.samples.push_back(sample.clone());
        self.previous = Some(sample);
        self.trim();
    }

    fn trim(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    fn normalize(&self, poly: &[DVec2], reference: Option<&[DVec2]>, anchor: DVec2) -> Vec<DVec2> {
        let reference = reference.filter(|_| self.config.twist_guard);
        let poly = canonicalize(poly, reference);
        if self.config.axis_correction {
            correct_leading_axis(&poly, anchor)
        } else {
            poly
        }
    }

    // 运动量取中心位移、最大/平均顶点位移与加权周长变化中的最大者
    fn movement(&self, prev: &[DVec2], prev_center: DVec2, next: &[DVec2]) -> f64 {
        let center_delta = centroid(next).distance(prev_center);

        let deltas: Vec<f64> = prev.iter().zip(next).map(|(a, b)| a.distance(*b)).collect();
        let max_delta = deltas.iter().copied().fold(0., f64::max);
        let mean_delta = if deltas.is_empty() {
            0.
        } else {
            deltas.iter().sum::<f64>() / deltas.len() as f64
        };

        let perimeter_delta =
            self.config.perimeter_change_weight * (perimeter(next) - perimeter(prev)).abs();

        center_delta.max(max_delta).max(mean_delta).max(perimeter_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{polygon_self_intersects, Rect};

    fn store() -> TrailStore {
        TrailStore::new(&Trail::default())
    }

    fn rect(x: f64, y: f64) -> Vec<DVec2> {
        Rect::new(x, y, 8., 16.).corners().to_vec()
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn rejects_degenerate_input() {
        let mut trail = store();
        let line = [DVec2::ZERO, DVec2::X];
        assert_eq!(trail.push(&line, DVec2::ZERO, ms(0), 1.), PushOutcome::Rejected);

        let flat = [DVec2::ZERO, DVec2::X, DVec2::new(2., 0.)];
        assert_eq!(trail.push(&flat, DVec2::ZERO, ms(0), 1.), PushOutcome::Rejected);
        assert!(trail.is_empty());
    }

    #[test]
    fn first_push_is_stored_directly() {
        let mut trail = store();
        let outcome = trail.push(&rect(0., 0.), DVec2::new(8., 0.), ms(5), 1.);
        assert_eq!(outcome, PushOutcome::Stored(1));

        let sample = trail.last().unwrap();
        assert_eq!(sample.timestamp, ms(5));
        assert_eq!(sample.center, DVec2::new(4., 8.));
    }

    #[test]
    fn small_motion_is_discarded() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::ZERO, ms(0), 1.);
        let outcome = trail.push(&rect(0.2, 0.), DVec2::ZERO, ms(16), 1.);
        assert_eq!(outcome, PushOutcome::BelowThreshold);
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn long_jump_is_interpolated() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::new(8., 0.), ms(0), 1.);

        let outcome = trail.push(&rect(200., 0.), DVec2::new(208., 0.), ms(16), 1.);
        assert_eq!(outcome, PushOutcome::Stored(4));
        assert_eq!(trail.len(), 5);

        let new: Vec<_> = trail.samples().iter().skip(1).collect();
        assert!(new.iter().all(|s| s.timestamp == ms(16)));
        for pair in new.windows(2) {
            assert!(pair[1].center.x > pair[0].center.x);
        }
    }

    #[test]
    fn low_quality_limits_interpolation() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::ZERO, ms(0), 1.);
        let outcome = trail.push(&rect(200., 0.), DVec2::ZERO, ms(16), 0.5);
        assert_eq!(outcome, PushOutcome::Stored(2));

        // floor(4 * 0.1) = 0，至少写入 1 个
        let outcome = trail.push(&rect(400., 0.), DVec2::ZERO, ms(32), 0.1);
        assert_eq!(outcome, PushOutcome::Stored(1));
    }

    #[test]
    fn short_step_uses_distance_segments() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::ZERO, ms(0), 1.);
        // 运动 10 像素，adaptive-step 为 12，只需一段
        let outcome = trail.push(&rect(10., 0.), DVec2::ZERO, ms(16), 1.);
        assert_eq!(outcome, PushOutcome::Stored(1));
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut trail = store();
        for i in 0..100 {
            trail.push(&rect(i as f64 * 30., 0.), DVec2::ZERO, ms(i * 16), 1.);
            assert!(trail.len() <= Trail::default().max_samples);
        }

        trail.set_capacity(5);
        assert_eq!(trail.len(), 5);
        assert_eq!(trail.last().unwrap().timestamp, ms(99 * 16));

        trail.set_capacity(0);
        assert_eq!(trail.capacity(), 2);
        trail.set_capacity(10_000);
        assert_eq!(trail.capacity(), Trail::default().max_samples);
    }

    #[test]
    fn prune_drops_expired_samples() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::ZERO, ms(0), 1.);
        trail.push(&rect(30., 0.), DVec2::ZERO, ms(100), 1.);
        trail.push(&rect(60., 0.), DVec2::ZERO, ms(200), 1.);

        trail.prune(ms(300));
        assert!(trail
            .samples()
            .iter()
            .all(|s| ms(300) - s.timestamp <= ms(220)));
        assert_eq!(trail.samples().front().unwrap().timestamp, ms(100));

        trail.prune(ms(1000));
        assert!(trail.is_empty());

        // 剪空之后原地推入不会重新写入
        let outcome = trail.push(&rect(60., 0.), DVec2::ZERO, ms(1016), 1.);
        assert_eq!(outcome, PushOutcome::BelowThreshold);
        assert!(trail.is_empty());
    }

    #[test]
    fn stored_polygons_keep_orientation() {
        let mut trail = store();
        // 输入顶点顺序每次都不同
        let a = rect(0., 0.);
        let b = rect(40., 10.);
        let b = vec![b[2], b[0], b[3], b[1]];
        trail.push(&a, DVec2::ZERO, ms(0), 1.);
        trail.push(&b, DVec2::ZERO, ms(16), 1.);

        for s in trail.samples() {
            assert!(!polygon_self_intersects(&s.polygon));
            assert!(is_valid_polygon(&s.polygon));
        }
    }

    #[test]
    fn different_vertex_count() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::ZERO, ms(0), 1.);
        let octagon = resample(&rect(30., 0.), 8);
        let outcome = trail.push(&octagon, DVec2::ZERO, ms(16), 1.);
        assert!(matches!(outcome, PushOutcome::Stored(_)));
        assert_eq!(trail.last().unwrap().polygon.len(), 8);
    }

    #[test]
    fn clear_empties() {
        let mut trail = store();
        trail.push(&rect(0., 0.), DVec2::ZERO, ms(0), 1.);
        trail.clear();
        assert!(trail.is_empty());
        assert_eq!(trail.last(), None);
    }
}
