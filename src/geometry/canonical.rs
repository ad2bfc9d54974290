// canonical.rs
// 多边形规范化（防扭转）与领先角的轴对齐修正
//
// 相邻两帧的多边形如果直接按下标对应，某个物理角可能映射到另一个顶点，
// 渲染出来的带状轨迹就会出现蝴蝶结式的扭转。这里先按质心极角排序得到与输入顺序无关的
// 顶点顺序，再在两种绕向和所有旋转偏移中寻找与参考多边形位移最小的对应关系。

use std::borrow::Cow;

use glam::DVec2;
use ordered_float::OrderedFloat;

use super::{centroid, is_valid_polygon, resample, signed_area, EPSILON};

/// 规范化顶点顺序
///
/// 无参考多边形时按质心极角排序（依次以半径、y、x 打破平局）。
/// 有参考多边形时，在两种绕向和全部旋转偏移中选取总位移平方和最小的一种；
/// 参考多边形面积非零时只考虑与其有向面积同号的绕向。
pub fn canonicalize(poly: &[DVec2], reference: Option<&[DVec2]>) -> Vec<DVec2> {
    let n = poly.len();
    if n < 3 {
        return poly.to_vec();
    }

    let c = centroid(poly);
    let mut sorted = poly.to_vec();
    sorted.sort_by_key(|p| {
        let d = *p - c;
        (
            OrderedFloat(d.y.atan2(d.x)),
            OrderedFloat(d.length()),
            OrderedFloat(p.y),
            OrderedFloat(p.x),
        )
    });

    let Some(reference) = reference.filter(|r| r.len() >= 3) else {
        return sorted;
    };
    let reference = if reference.len() == n {
        Cow::Borrowed(reference)
    } else {
        Cow::Owned(resample(reference, n))
    };

    let ref_area = signed_area(&reference);
    let mut reversed = sorted.clone();
    reversed.reverse();

    let mut best: Option<(f64, usize, bool)> = None;
    for (is_reversed, winding) in [(false, &sorted), (true, &reversed)] {
        let area = signed_area(winding);
        if ref_area.abs() > EPSILON && area.abs() > EPSILON && area.signum() != ref_area.signum()
        {
            continue;
        }

        for offset in 0..n {
            let cost: f64 = reference
                .iter()
                .enumerate()
                .map(|(i, r)| winding[(i + offset) % n].distance_squared(*r))
                .sum();
            if best.map_or(true, |(best_cost, _, _)| cost < best_cost) {
                best = Some((cost, offset, is_reversed));
            }
        }
    }

    let Some((_, offset, is_reversed)) = best else {
        return sorted;
    };
    let winding = if is_reversed { reversed } else { sorted };
    (0..n).map(|i| winding[(i + offset) % n]).collect()
}

/// 把离 `anchor` 最近的顶点两侧的边修正为水平/竖直
///
/// 两种直角构型中选取邻点位移较小的一种；修正后的多边形无效时原样返回。
pub fn correct_leading_axis(poly: &[DVec2], anchor: DVec2) -> Vec<DVec2> {
    let n = poly.len();
    if n < 3 {
        return poly.to_vec();
    }

    let Some(i) = (0..n).min_by_key(|&i| OrderedFloat(poly[i].distance_squared(anchor))) else {
        return poly.to_vec();
    };
    let prev = (i + n - 1) % n;
    let next = (i + 1) % n;
    let v = poly[i];
    let (p, q) = (poly[prev], poly[next]);

    // 构型 A：前一条边水平，后一条边竖直；构型 B 相反
    let a = (DVec2::new(p.x, v.y), DVec2::new(v.x, q.y));
    let b = (DVec2::new(v.x, p.y), DVec2::new(q.x, v.y));
    let cost = |(p2, q2): (DVec2, DVec2)| p2.distance(p) + q2.distance(q);
    let (new_prev, new_next) = if cost(a) <= cost(b) { a } else { b };

    let mut corrected = poly.to_vec();
    corrected[prev] = new_prev;
    corrected[next] = new_next;

    if is_valid_polygon(&corrected) {
        corrected
    } else {
        poly.to_vec()
    }
}
