// ribbon.rs
// 带状轨迹：从最新的样本开始两两配对，在每对之间细分出若干圈轮廓，
// 相邻两圈的对应边围成一个四边形并填充。扭转或零面积的四边形直接跳过。
// 最后单独填充最新的样本作为轨迹头部。

use std::collections::VecDeque;

use caret_trail_config::Color;
use glam::DVec2;

use super::{DrawStats, FrameContext, Ring, Surface};
use crate::geometry::{is_valid_polygon, lerp_polygon};
use crate::trail::TrailSample;

pub fn draw(
    surface: &mut dyn Surface,
    samples: &VecDeque<TrailSample>,
    frame: &FrameContext,
) -> anyhow::Result<DrawStats> {
    let _span = tracy_client::span!("ribbon::draw");

    let mut stats = DrawStats::default();
    let sides = frame.detail.ribbon_sides.max(3);
    let max_subdivisions = frame.detail.max_subdivisions.max(1);
    let step = frame.config.render.subdivide_step_px;
    let color = frame.config.colors.trail;

    // 从新到旧
    let rings: Vec<Ring> = samples
        .iter()
        .rev()
        .map(|s| Ring::new(s, frame, sides))
        .collect();

    for pair in rings.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);

        let max_delta = newer
            .points
            .iter()
            .zip(&older.points)
            .map(|(a, b)| a.distance(*b))
            .fold(0., f64::max);
        let subdivisions = ((max_delta / step).ceil() as usize).clamp(1, max_subdivisions);

        for k in 0..subdivisions {
            let t0 = k as f64 / subdivisions as f64;
            let t1 = (k + 1) as f64 / subdivisions as f64;
            let a = lerp_polygon(&newer.points, &older.points, t0);
            let b = lerp_polygon(&newer.points, &older.points, t1);

            let alpha = newer.alpha + (older.alpha - newer.alpha) * (t0 + t1) / 2.;
            stats += fill_band(surface, &a, &b, color.with_alpha_scaled(alpha))?;
        }
    }

    // 头部
    if let Some(head) = rings.first() {
        if is_valid_polygon(&head.points) {
            surface.fill_polygon(&head.points, color.with_alpha_scaled(head.alpha))?;
            stats.primitives += 1;
        } else {
            stats.skipped += 1;
        }
    }

    Ok(stats)
}

// 两圈之间逐边填充
fn fill_band(
    surface: &mut dyn Surface,
    a: &[DVec2],
    b: &[DVec2],
    color: Color,
) -> anyhow::Result<DrawStats> {
    let mut stats = DrawStats::default();
    let n = a.len().min(b.len());

    for j in 0..n {
        let j1 = (j + 1) % n;
        let quad = [a[j], a[j1], b[j1], b[j]];
        if !is_valid_polygon(&quad) {
            stats.skipped += 1;
            continue;
        }

        surface.fill_polygon(&quad, color)?;
        stats.primitives += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use caret_trail_config::Config;

    use super::*;
    use crate::backend::headless::{DrawCommand, RecordingSurface};
    use crate::geometry::{centroid, Rect};
    use crate::quality::QualityController;

    fn sample(x: f64, timestamp: Duration) -> TrailSample {
        let polygon = Rect::new(x, 0., 10., 10.).corners().to_vec();
        TrailSample {
            timestamp,
            center: centroid(&polygon),
            polygon,
        }
    }

    fn frame(config: &Config, now: Duration, sides: usize) -> FrameContext<'_> {
        let mut detail = QualityController::new(&config.quality).detail(config);
        detail.ribbon_sides = sides;
        FrameContext {
            now,
            config,
            detail,
        }
    }

    #[test]
    fn translated_squares() {
        let config = Config::default();
        let now = Duration::from_millis(100);
        let samples = VecDeque::from([sample(0., now), sample(30., now)]);

        let mut surface = RecordingSurface::new();
        let stats = draw(&mut surface, &samples, &frame(&config, now, 4)).unwrap();

        // 30 像素 / 10 像素步长 = 3 段；每段上下两条边与运动方向平行，面积为零被跳过
        assert_eq!(
            stats,
            DrawStats {
                primitives: 7,
                skipped: 6
            }
        );

        // 最后一个图元是头部，即最新的样本
        let Some(DrawCommand::Fill { points, .. }) = surface.commands().last() else {
            panic!("expected a fill");
        };
        assert_eq!(points, &samples[1].polygon);
    }

    #[test]
    fn subdivisions_are_capped() {
        let config = Config::default();
        let now = Duration::from_millis(100);
        let samples = VecDeque::from([sample(0., now), sample(500., now)]);

        let mut surface = RecordingSurface::new();
        let stats = draw(&mut surface, &samples, &frame(&config, now, 4)).unwrap();
        let max = config.render.max_subdivisions;
        assert_eq!(stats.primitives, max * 2 + 1);
    }

    #[test]
    fn old_samples_fade() {
        let config = Config::default();
        let now = Duration::from_millis(1000);
        let samples = VecDeque::from([
            sample(0., Duration::ZERO),
            sample(30., now),
        ]);

        let mut surface = RecordingSurface::new();
        draw(&mut surface, &samples, &frame(&config, now, 4)).unwrap();

        let alphas: Vec<f64> = surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Fill { color, .. } => Some(color.a),
                _ => None,
            })
            .collect();

        // 从头部向尾部逐段变淡，但不低于 min-alpha
        let head = *alphas.last().unwrap();
        assert!(alphas[0] > alphas[alphas.len() - 2]);
        assert!(alphas.iter().all(|a| *a >= config.render.min_alpha - 1e-9));
        assert!(alphas.iter().all(|a| *a <= head + 1e-9));
    }

    #[test]
    fn single_sample_draws_head_only() {
        let config = Config::default();
        let now = Duration::from_millis(5);
        let samples = VecDeque::from([sample(0., now)]);

        let mut surface = RecordingSurface::new();
        let stats = draw(&mut surface, &samples, &frame(&config, now, 16)).unwrap();
        assert_eq!(stats.primitives, 1);
        assert_eq!(surface.commands().len(), 1);
    }
}
