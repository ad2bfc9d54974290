//! 多边形几何工具
//!
//! 坐标为设备无关像素，y 轴向下。多边形用 `Vec<DVec2>` 表示，首尾隐式相连。
//! 所有函数都不会 panic：零长度向量、零周长等退化情况都有明确的回退值。

use glam::DVec2;

mod canonical;
mod intersect;
mod resample;

pub use canonical::{canonicalize, correct_leading_axis};
pub use intersect::{
    point_in_polygon_strict, polygon_self_intersects, polygons_overlap, segments_intersect,
};
pub use resample::resample;

/// 通用浮点容差
pub const EPSILON: f64 = 1e-9;

/// 有效多边形的最小面积
pub const MIN_AREA: f64 = 1e-6;

/// 轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub loc: DVec2,
    pub size: DVec2,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            loc: DVec2::new(x, y),
            size: DVec2::new(w, h),
        }
    }

    /// 包含所有点的最小矩形，空输入返回 None
    pub fn bounding(points: &[DVec2]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self {
            loc: min,
            size: max - min,
        })
    }

    pub fn center(&self) -> DVec2 {
        self.loc + self.size / 2.
    }

    pub fn max(&self) -> DVec2 {
        self.loc + self.size
    }

    /// 四个角，顺序为左上、右上、右下、左下
    pub fn corners(&self) -> [DVec2; 4] {
        let min = self.loc;
        let max = self.max();
        [
            min,
            DVec2::new(max.x, min.y),
            max,
            DVec2::new(min.x, max.y),
        ]
    }

    /// 同时包含两个矩形的最小矩形
    pub fn union(&self, other: &Self) -> Self {
        let loc = self.loc.min(other.loc);
        Self {
            loc,
            size: self.max().max(other.max()) - loc,
        }
    }

    /// 向四周扩张 `by` 像素
    pub fn inflate(&self, by: f64) -> Self {
        Self {
            loc: self.loc - DVec2::splat(by),
            size: (self.size + DVec2::splat(2. * by)).max(DVec2::ZERO),
        }
    }

    /// 两个矩形是否有正面积的交集（仅共享边界不算）
    pub fn overlaps(&self, other: &Self, eps: f64) -> bool {
        let a_max = self.max();
        let b_max = other.max();
        self.loc.x < b_max.x - eps
            && other.loc.x < a_max.x - eps
            && self.loc.y < b_max.y - eps
            && other.loc.y < a_max.y - eps
    }
}

/// 有向面积（鞋带公式）
pub fn signed_area(poly: &[DVec2]) -> f64 {
    if poly.len() < 3 {
        return 0.;
    }

    let mut sum = 0.;
    for (i, a) in poly.iter().enumerate() {
        let b = poly[(i + 1) % poly.len()];
        sum += a.perp_dot(b);
    }
    sum / 2.
}

/// 顶点均值
pub fn centroid(poly: &[DVec2]) -> DVec2 {
    if poly.is_empty() {
        return DVec2::ZERO;
    }
    poly.iter().copied().sum::<DVec2>() / poly.len() as f64
}

pub fn perimeter(poly: &[DVec2]) -> f64 {
    if poly.len() < 2 {
        return 0.;
    }
    (0..poly.len())
        .map(|i| poly[i].distance(poly[(i + 1) % poly.len()]))
        .sum()
}

/// 逐顶点线性插值，t=0 得到 `a`，t=1 得到 `b`
///
/// 顶点数不同时按较短的一方截断，调用方应先重采样到相同的顶点数。
pub fn lerp_polygon(a: &[DVec2], b: &[DVec2], t: f64) -> Vec<DVec2> {
    a.iter().zip(b).map(|(p, q)| p.lerp(*q, t)).collect()
}

/// 以 `center` 为原点缩放
pub fn scale_polygon(poly: &[DVec2], center: DVec2, factor: f64) -> Vec<DVec2> {
    poly.iter().map(|p| center + (*p - center) * factor).collect()
}

/// 从质心出发沿径向把每个顶点向外推 `padding` 像素
pub fn pad_polygon(poly: &[DVec2], padding: f64) -> Vec<DVec2> {
    let c = centroid(poly);
    poly.iter()
        .map(|p| *p + (*p - c).normalize_or_zero() * padding)
        .collect()
}

/// 限制单次更新的位移：超过 `max_radius` 时只沿直线走一部分
pub fn clamp_step(from: DVec2, to: DVec2, max_radius: f64) -> DVec2 {
    let distance = from.distance(to);
    if distance <= max_radius || distance <= EPSILON {
        return to;
    }
    from.lerp(to, max_radius.max(0.) / distance)
}

/// 至少 3 个有限顶点、非零面积且不自交
pub fn is_valid_polygon(poly: &[DVec2]) -> bool {
    poly.len() >= 3
        && poly.iter().all(|p| p.is_finite())
        && signed_area(poly).abs() > MIN_AREA
        && !polygon_self_intersects(poly)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn square() -> Vec<DVec2> {
        Rect::new(0., 0., 10., 10.).corners().to_vec()
    }

    #[test]
    fn area_and_perimeter() {
        let sq = square();
        assert_abs_diff_eq!(signed_area(&sq), 100.);
        assert_abs_diff_eq!(perimeter(&sq), 40.);
        assert_eq!(centroid(&sq), DVec2::new(5., 5.));

        let mut reversed = sq.clone();
        reversed.reverse();
        assert_abs_diff_eq!(signed_area(&reversed), -100.);
    }

    #[test]
    fn degenerate_inputs_do_not_panic() {
        assert_eq!(centroid(&[]), DVec2::ZERO);
        assert_eq!(perimeter(&[DVec2::ONE]), 0.);
        assert_eq!(signed_area(&[DVec2::ONE, DVec2::X]), 0.);
        assert_eq!(Rect::bounding(&[]), None);
        assert_eq!(pad_polygon(&[DVec2::ONE], 3.), vec![DVec2::ONE]);
    }

    #[test]
    fn clamp_step_limits_distance() {
        let from = DVec2::ZERO;
        let to = DVec2::new(100., 0.);
        assert_eq!(clamp_step(from, to, 25.), DVec2::new(25., 0.));
        assert_eq!(clamp_step(from, to, 200.), to);
        assert_eq!(clamp_step(from, from, 0.), from);
    }

    #[test]
    fn pad_pushes_corners_outward() {
        let padded = pad_polygon(&square(), 2f64.sqrt());
        assert_abs_diff_eq!(padded[0].x, -1., epsilon = 1e-9);
        assert_abs_diff_eq!(padded[0].y, -1., epsilon = 1e-9);
        assert_abs_diff_eq!(padded[2].x, 11., epsilon = 1e-9);
    }

    #[test]
    fn validity() {
        assert!(is_valid_polygon(&square()));

        let bow_tie = [
            DVec2::new(0., 0.),
            DVec2::new(10., 10.),
            DVec2::new(10., 0.),
            DVec2::new(0., 10.),
        ];
        assert!(!is_valid_polygon(&bow_tie));

        let flat = [DVec2::ZERO, DVec2::X, DVec2::new(2., 0.)];
        assert!(!is_valid_polygon(&flat));

        let nan = [DVec2::ZERO, DVec2::X, DVec2::new(f64::NAN, 1.)];
        assert!(!is_valid_polygon(&nan));
    }

    #[test]
    fn rect_overlap_ignores_shared_edges() {
        let a = Rect::new(0., 0., 10., 10.);
        let b = Rect::new(10., 0., 10., 10.);
        let c = Rect::new(5., 5., 10., 10.);
        assert!(!a.overlaps(&b, EPSILON));
        assert!(a.overlaps(&c, EPSILON));
        assert_eq!(a.union(&c), Rect::new(0., 0., 15., 15.));
    }
}
