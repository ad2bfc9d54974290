// corners.rs
// 四角控制器：把每帧的目标矩形变成一个带弹性的四边形
//
// 四个角各自带两根临界阻尼弹簧（x、y 各一根）。移动时按各角相对运动方向的对齐程度排名，
// 落后的角用较长的时间常数、领先的角用较短的时间常数，光标因此沿运动方向被拉伸。
// 开启硬吸附时，领先的角在步进前直接跳过目标位移的一部分。

use caret_trail_config::Cursor;
use glam::DVec2;
use ordered_float::OrderedFloat;

use crate::animation::CornerSpring;
use crate::geometry::{pad_polygon, Rect};

/// 四个角相对于矩形中心的固定布局（以宽高为单位），顺时针：左上、右上、右下、左下
pub const LAYOUT: [DVec2; 4] = [
    DVec2::new(-0.5, -0.5),
    DVec2::new(0.5, -0.5),
    DVec2::new(0.5, 0.5),
    DVec2::new(-0.5, 0.5),
];

// 目标中心位移低于该值时视为没有方向
const DIRECTION_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Corner {
    relative: DVec2,
    position: DVec2,
    springs: [CornerSpring; 2],
    previous_destination: Option<DVec2>,
}

impl Corner {
    fn new(relative: DVec2) -> Self {
        Self {
            relative,
            position: DVec2::ZERO,
            springs: [CornerSpring::default(); 2],
            previous_destination: None,
        }
    }

    fn destination(&self, target: &Rect) -> DVec2 {
        target.center() + self.relative * target.size
    }

    fn snap_to(&mut self, destination: DVec2) {
        self.position = destination;
        self.springs.iter_mut().for_each(CornerSpring::reset);
        self.previous_destination = Some(destination);
    }
}

/// 四角弹簧控制器
#[derive(Debug, Clone)]
pub struct CornerController {
    config: Cursor,
    corners: [Corner; 4],
    target: Option<Rect>,
    /// 最近一次非零的运动方向
    direction: DVec2,
}

impl CornerController {
    pub fn new(config: &Cursor) -> Self {
        Self {
            config: config.clone(),
            corners: LAYOUT.map(Corner::new),
            target: None,
            direction: DVec2::ZERO,
        }
    }

    pub fn set_config(&mut self, config: &Cursor) {
        self.config = config.clone();
    }

    /// 忘记所有观测，下次 update 会直接吸附
    pub fn reset(&mut self) {
        self.corners = LAYOUT.map(Corner::new);
        self.target = None;
        self.direction = DVec2::ZERO;
    }

    /// 朝新的目标矩形推进 `dt` 秒，返回是否还有角在运动
    pub fn update(&mut self, target: Rect, dt: f64) -> bool {
        let _span = tracy_client::span!("CornerController::update");

        let Some(previous) = self.target.replace(target) else {
            // 第一次观测：直接吸附到目标
            for corner in &mut self.corners {
                let destination = corner.destination(&target);
                corner.snap_to(destination);
            }
            return false;
        };

        let delta = target.center() - previous.center();
        let distance = delta.length();
        let dir = if distance < DIRECTION_EPSILON {
            DVec2::ZERO
        } else {
            delta / distance
        };
        if dir != DVec2::ZERO {
            self.direction = dir;
        }

        let ranks = if dir == DVec2::ZERO {
            None
        } else {
            Some(rank_corners(dir))
        };

        let cfg = &self.config;
        let base_tau = cfg.animation_time_ms / 1000.;
        let snap_tau = cfg.snap_animation_time_ms / 1000.;
        let max_offset = cfg.max_trail_distance_factor * target.size.x.max(target.size.y).max(1.);

        let mut moving = false;
        for (i, corner) in self.corners.iter_mut().enumerate() {
            let destination = corner.destination(&target);

            // 没有方向时所有角都用基础时间常数，也不做硬吸附
            let mut tau = base_tau;
            if let Some(ranks) = ranks {
                let rank = ranks[i];
                tau = base_tau * cfg.rank_time_factors[rank];

                if cfg.hard_snap && rank as f64 / 3. >= cfg.leading_snap_threshold {
                    tau = snap_tau;
                    if let Some(prev) = corner.previous_destination {
                        corner.position += (destination - prev) * cfg.leading_snap_factor;
                    }
                }
            }

            for axis in 0..2 {
                let spring = &mut corner.springs[axis];
                spring.time_constant = tau;
                // 每一步都相对当前目标重新设置偏移
                spring.offset = corner.position[axis] - destination[axis];
                moving |= spring.step(dt);

                if spring.offset.abs() > max_offset {
                    spring.offset = spring.offset.signum() * max_offset;
                    spring.velocity = 0.;
                }
                corner.position[axis] = destination[axis] + spring.offset;
            }

            corner.previous_destination = Some(destination);
        }

        moving
    }

    /// 当前四个角的位置，顺序与 [`LAYOUT`] 相同
    pub fn corners(&self) -> [DVec2; 4] {
        self.corners.map(|c| c.position)
    }

    /// 四个角沿质心径向外推 `padding` 像素后的多边形
    pub fn polygon(&self, padding: f64) -> Vec<DVec2> {
        pad_polygon(&self.corners(), padding)
    }

    /// 活动四边形的包围盒，尚无观测时为 None
    pub fn bounding_box(&self) -> Option<Rect> {
        self.target?;
        Rect::bounding(&self.corners())
    }

    pub fn target_rect(&self) -> Option<Rect> {
        self.target
    }

    /// 领先角的锚点：目标矩形上与最近运动方向最一致的角，没有方向时取中心
    pub fn leading_anchor(&self) -> Option<DVec2> {
        let target = self.target?;
        if self.direction == DVec2::ZERO {
            return Some(target.center());
        }

        self.corners
            .iter()
            .max_by_key(|c| OrderedFloat(c.relative.dot(self.direction)))
            .map(|c| c.destination(&target))
    }
}

/// 按与运动方向的点积升序排名：0 为最落后，3 为最领先
///
/// 稳定排序，点积相同的角保持布局顺序。
fn rank_corners(dir: DVec2) -> [usize; 4] {
    let mut order = [0, 1, 2, 3];
    order.sort_by_key(|&i| OrderedFloat(LAYOUT[i].dot(dir)));

    let mut ranks = [0; 4];
    for (rank, &i) in order.iter().enumerate() {
        ranks[i] = rank;
    }
    ranks
}
