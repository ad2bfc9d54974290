// hex.rs
// 方向性六边形轨迹
//
// 沿轨迹的截面序列（样本圈加上细分出的中间圈）两两配对，每对放置一个单元：
// 靠近头部的单元是四边形，其余是尖端朝前、尾部内凹的 V 形六边形。
// 单元的长度随曲率收窄、宽度随速度变细并在头部膨胀，两者在相邻单元间做指数平滑。
// 非头部单元如果自交或与已接受的单元重叠，先退回四边形，仍然重叠则跳过。

use std::collections::VecDeque;

use arrayvec::ArrayVec;
use caret_trail_config::Hex;
use glam::DVec2;

use super::{DrawStats, FrameContext, Ring, Surface};
use crate::geometry::{is_valid_polygon, lerp_polygon, polygons_overlap, EPSILON};
use crate::trail::TrailSample;

/// 一个单元的轮廓，四边形或六边形
pub type Cell = ArrayVec<DVec2, 6>;

// 单元的最小半宽
const MIN_HALF_WIDTH: f64 = 0.5;

/// 截面：中心、所在圈的轮廓与透明度
#[derive(Debug, Clone)]
struct Section {
    center: DVec2,
    points: Vec<DVec2>,
    alpha: f64,
}

impl From<Ring> for Section {
    fn from(ring: Ring) -> Self {
        Self {
            center: ring.center,
            points: ring.points,
            alpha: ring.alpha,
        }
    }
}

/// 绘制六边形轨迹；截面不足两个时返回 None，由调用方改用带状画法
pub fn draw(
    surface: &mut dyn Surface,
    samples: &VecDeque<TrailSample>,
    frame: &FrameContext,
    stroke: Option<f64>,
) -> anyhow::Result<Option<DrawStats>> {
    let _span = tracy_client::span!("hex::draw");

    let sections = build_sections(samples, frame);
    if sections.len() < 2 {
        return Ok(None);
    }

    let (cells, mut stats) = build_cells(&sections, &frame.config.hex);
    let colors = &frame.config.colors;

    // 从尾部画到头部，头部在最上层
    for (cell, alpha) in cells.iter().rev() {
        surface.fill_polygon(cell, colors.trail.with_alpha_scaled(*alpha))?;
        stats.primitives += 1;

        if let Some(width) = stroke {
            surface.stroke_polygon(cell, colors.hex_stroke.with_alpha_scaled(*alpha), width)?;
            stats.primitives += 1;
        }
    }

    Ok(Some(stats))
}

// 从新到旧的截面序列，细分总数受每帧预算限制，最后按步长抽样到 max-cells + 1 个
fn build_sections(samples: &VecDeque<TrailSample>, frame: &FrameContext) -> Vec<Section> {
    let sides = frame.detail.ribbon_sides.max(3);
    let step = frame.config.render.subdivide_step_px;
    let rings: Vec<Ring> = samples
        .iter()
        .rev()
        .map(|s| Ring::new(s, frame, sides))
        .collect();

    let pairs = rings.len().saturating_sub(1);
    let per_pair = if pairs == 0 {
        1
    } else {
        (frame.detail.hex_budget / pairs).max(1)
    };

    let mut sections = Vec::new();
    for pair in rings.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        sections.push(Section::from(newer.clone()));

        let max_delta = newer
            .points
            .iter()
            .zip(&older.points)
            .map(|(a, b)| a.distance(*b))
            .fold(0., f64::max);
        let subdivisions = ((max_delta / step).ceil() as usize).clamp(1, per_pair);

        for k in 1..subdivisions {
            let t = k as f64 / subdivisions as f64;
            sections.push(Section {
                center: newer.center.lerp(older.center, t),
                points: lerp_polygon(&newer.points, &older.points, t),
                alpha: newer.alpha + (older.alpha - newer.alpha) * t,
            });
        }
    }
    if let Some(last) = rings.last() {
        sections.push(Section::from(last.clone()));
    }

    stride_sample(sections, frame.detail.hex_cells + 1)
}

// 等步长抽样，总是保留第一个和最后一个
fn stride_sample<T>(items: Vec<T>, max: usize) -> Vec<T> {
    let len = items.len();
    if len <= max || max < 2 {
        return items;
    }

    let stride = (len - 1).div_ceil(max - 1);
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % stride == 0 || *i == len - 1)
        .map(|(_, item)| item)
        .collect()
}

fn build_cells(sections: &[Section], config: &Hex) -> (Vec<(Cell, f64)>, DrawStats) {
    let mut stats = DrawStats::default();
    let mut accepted: Vec<Cell> = Vec::new();
    let mut alphas = Vec::new();

    let count = sections.len() - 1;
    let mut prev_forward: Option<DVec2> = None;
    let mut smoothed: Option<(f64, f64)> = None;

    for (i, pair) in sections.windows(2).enumerate() {
        let (front_section, back_section) = (&pair[0], &pair[1]);
        let (front, back) = (front_section.center, back_section.center);
        let segment = front - back;
        let seg_len = segment.length();
        if seg_len <= EPSILON {
            stats.skipped += 1;
            continue;
        }

        let forward = segment / seg_len;
        let perp = forward.perp();
        let mid = (front + back) / 2.;

        let half_width = front_section
            .points
            .iter()
            .chain(&back_section.points)
            .map(|p| (*p - mid).dot(perp).abs())
            .fold(0., f64::max);

        // 与前一个（更靠近头部的）单元方向的夹角，归一化到 [0, 1]
        let curvature = prev_forward.map_or(0., |prev| {
            prev.perp_dot(forward).atan2(prev.dot(forward)).abs() / std::f64::consts::PI
        });
        prev_forward = Some(forward);

        let speed = (seg_len / config.speed_norm_px).clamp(0., 1.);
        let head = 1. - i as f64 / count as f64;

        let target_len = seg_len * config.cell_fill * (1. - config.curvature_pinch * curvature);
        let target_width = half_width
            * (1. - config.speed_thinning * speed)
            * (1. + config.head_swell * head);

        let (len, width) = match smoothed {
            None => (target_len, target_width),
            Some((len, width)) => {
                let k = 1. - config.smoothing;
                (len + (target_len - len) * k, width + (target_width - width) * k)
            }
        };
        smoothed = Some((len, width));
        let len = len.min(seg_len);
        let width = width.max(MIN_HALF_WIDTH);

        let cell_back = mid - forward * len / 2.;
        let cell_front = mid + forward * len / 2.;
        let (quad, hex) = cell_shapes(cell_back, cell_front, width, config.concavity * len);

        // 头部只用四边形，同样不能与已接受的单元重叠
        let hex = (i >= config.head_quad_cells).then_some(hex);
        let placed = place_cell(&accepted, hex, quad);

        match placed {
            Some(cell) => {
                accepted.push(cell);
                alphas.push((front_section.alpha + back_section.alpha) / 2.);
            }
            None => stats.skipped += 1,
        }
    }

    (accepted.into_iter().zip(alphas).collect(), stats)
}

/// 由单元的后端点、前端点、半宽与凹陷深度构造四边形和 V 形六边形
pub(crate) fn cell_shapes(back: DVec2, front: DVec2, half_width: f64, concavity: f64) -> (Cell, Cell) {
    let forward = (front - back).normalize_or_zero();
    let pw = forward.perp() * half_width;
    let dent = forward * concavity;

    let quad = Cell::from_iter([back - pw, front - pw, front + pw, back + pw]);
    let hex = Cell::from_iter([
        back + dent,
        back - pw,
        front - pw,
        front + dent,
        front + pw,
        back + pw,
    ]);
    (quad, hex)
}

/// 依次尝试六边形和四边形：有效且不与任何已接受单元重叠的第一个被采用
pub(crate) fn place_cell(accepted: &[Cell], hex: Option<Cell>, quad: Cell) -> Option<Cell> {
    let fits = |cell: &Cell| {
        is_valid_polygon(cell) && !accepted.iter().any(|other| polygons_overlap(cell, other))
    };

    if let Some(hex) = hex.filter(|hex| fits(hex)) {
        return Some(hex);
    }
    fits(&quad).then_some(quad)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use caret_trail_config::Config;

    use super::*;
    use crate::backend::headless::{DrawCommand, RecordingSurface};
    use crate::geometry::{centroid, Rect};
    use crate::quality::QualityController;

    fn sample(x: f64, y: f64, timestamp: Duration) -> TrailSample {
        let polygon = Rect::new(x, y, 10., 10.).corners().to_vec();
        TrailSample {
            timestamp,
            center: centroid(&polygon),
            polygon,
        }
    }

    fn frame(config: &Config, now: Duration) -> FrameContext<'_> {
        FrameContext {
            now,
            config,
            detail: QualityController::new(&config.quality).detail(config),
        }
    }

    fn fills(surface: &RecordingSurface) -> Vec<Vec<DVec2>> {
        surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Fill { points, .. } => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn hex_falls_back_to_quad_on_overlap() {
        let accepted = [Cell::from_iter([
            DVec2::new(10., -5.),
            DVec2::new(20., -5.),
            DVec2::new(20., 5.),
            DVec2::new(10., 5.),
        ])];

        let (quad, hex) = cell_shapes(DVec2::ZERO, DVec2::new(10., 0.), 5., 3.);
        // 六边形的尖端 (13, 0) 伸进了已接受的单元
        assert!(polygons_overlap(&hex, &accepted[0]));
        // 四边形只与它共享一条边
        assert!(!polygons_overlap(&quad, &accepted[0]));

        assert_eq!(place_cell(&accepted, Some(hex), quad.clone()), Some(quad));
    }

    #[test]
    fn overlapping_quad_is_skipped() {
        let (quad, hex) = cell_shapes(DVec2::ZERO, DVec2::new(10., 0.), 5., 3.);
        let accepted = [quad.clone()];
        assert_eq!(place_cell(&accepted, Some(hex), quad), None);
    }

    #[test]
    fn free_space_takes_the_hexagon() {
        let (quad, hex) = cell_shapes(DVec2::ZERO, DVec2::new(10., 0.), 5., 3.);
        assert!(is_valid_polygon(&hex));
        assert_eq!(place_cell(&[], Some(hex.clone()), quad), Some(hex));
    }

    #[test]
    fn stride_keeps_endpoints() {
        let items: Vec<usize> = (0..10).collect();
        assert_eq!(stride_sample(items.clone(), 4), vec![0, 3, 6, 9]);
        assert_eq!(stride_sample(items.clone(), 20), items);

        let sampled = stride_sample((0..11).collect::<Vec<usize>>(), 4);
        assert_eq!(sampled.first(), Some(&0));
        assert_eq!(sampled.last(), Some(&10));
        assert!(sampled.len() <= 5);
    }

    #[test]
    fn too_few_sections_report_no_draw() {
        let config = Config::default();
        let now = Duration::from_millis(10);
        let samples = VecDeque::from([sample(0., 0., now)]);

        let mut surface = RecordingSurface::new();
        let drawn = draw(&mut surface, &samples, &frame(&config, now), None).unwrap();
        assert_eq!(drawn, None);
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn accepted_cells_never_overlap() {
        let mut config = Config::default();
        config.hex.head_quad_cells = 0;

        let now = Duration::from_millis(100);
        // 先向右再向下拐弯
        let mut samples = VecDeque::new();
        for i in 0..8 {
            samples.push_back(sample(i as f64 * 12., 0., now));
        }
        for i in 1..6 {
            samples.push_back(sample(84., i as f64 * 12., now));
        }

        let mut surface = RecordingSurface::new();
        let stats = draw(&mut surface, &samples, &frame(&config, now), None)
            .unwrap()
            .unwrap();
        assert!(stats.primitives > 0);

        let cells = fills(&surface);
        assert_eq!(cells.len(), stats.primitives);
        assert!(cells.len() <= config.hex.max_cells);
        for (i, a) in cells.iter().enumerate() {
            assert!(is_valid_polygon(a));
            for b in &cells[i + 1..] {
                assert!(!polygons_overlap(a, b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn head_quads_do_not_overlap_on_reversal() {
        let config = Config::default();
        assert!(config.hex.head_quad_cells >= 2);

        let now = Duration::from_millis(100);
        // 向右走之后原路折返，头部附近的截面彼此交叠
        let mut samples = VecDeque::new();
        for i in 0..6 {
            samples.push_back(sample(i as f64 * 12., 0., now));
        }
        for i in (2..5).rev() {
            samples.push_back(sample(i as f64 * 12. + 3., 2., now));
        }

        let mut surface = RecordingSurface::new();
        let stats = draw(&mut surface, &samples, &frame(&config, now), None)
            .unwrap()
            .unwrap();

        let cells = fills(&surface);
        assert_eq!(cells.len(), stats.primitives);
        for (i, a) in cells.iter().enumerate() {
            for b in &cells[i + 1..] {
                assert!(!polygons_overlap(a, b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn head_quad_checked_against_accepted() {
        let (quad, _) = cell_shapes(DVec2::ZERO, DVec2::new(10., 0.), 5., 3.);
        let (shifted, _) = cell_shapes(DVec2::new(4., 1.), DVec2::new(14., 1.), 5., 3.);
        assert_eq!(place_cell(&[quad], None, shifted), None);
    }

    #[test]
    fn stroke_follows_fill() {
        let config = Config::default();
        let now = Duration::from_millis(100);
        let samples = VecDeque::from([sample(0., 0., now), sample(40., 0., now)]);

        let mut surface = RecordingSurface::new();
        let stats = draw(&mut surface, &samples, &frame(&config, now), Some(1.5))
            .unwrap()
            .unwrap();

        let commands = surface.commands();
        assert_eq!(commands.len(), stats.primitives);
        assert!(matches!(commands[0], DrawCommand::Fill { .. }));
        assert!(matches!(
            commands[1],
            DrawCommand::Stroke { width, .. } if width == 1.5
        ));
    }
}
