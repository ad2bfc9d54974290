// resample.rs
// 按等弧长把多边形重新分布到固定的顶点数，用于在顶点数不同的轨迹多边形之间插值

use glam::DVec2;

use super::EPSILON;

/// 从顶点 0 开始沿周长等距取 `count` 个点
///
/// 周长为零时返回 `count` 个首顶点的副本。
pub fn resample(poly: &[DVec2], count: usize) -> Vec<DVec2> {
    let Some(&first) = poly.first() else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    let n = poly.len();
    let lengths: Vec<f64> = (0..n)
        .map(|i| poly[i].distance(poly[(i + 1) % n]))
        .collect();
    let total: f64 = lengths.iter().sum();
    if total <= EPSILON {
        return vec![first; count];
    }

    let step = total / count as f64;
    let mut out = Vec::with_capacity(count);
    let mut edge = 0;
    let mut walked = 0.;

    for k in 0..count {
        let target = step * k as f64;
        while edge < n - 1 && walked + lengths[edge] < target {
            walked += lengths[edge];
            edge += 1;
        }

        let a = poly[edge];
        let b = poly[(edge + 1) % n];
        let t = if lengths[edge] <= EPSILON {
            0.
        } else {
            ((target - walked) / lengths[edge]).clamp(0., 1.)
        };
        out.push(a.lerp(b, t));
    }

    out
}
