// intersect.rs
// 线段相交、多边形自交以及两个多边形之间的重叠检测

use glam::DVec2;

use super::{centroid, Rect, EPSILON};

// 点到边界的距离小于该值时视为在边界上
const BOUNDARY_EPSILON: f64 = 1e-6;

fn orientation(a: DVec2, b: DVec2, c: DVec2) -> i8 {
    let v = (b - a).perp_dot(c - a);
    if v > EPSILON {
        1
    } else if v < -EPSILON {
        -1
    } else {
        0
    }
}

// 已知 p 与 ab 共线时，判断 p 是否落在 ab 的包围盒内
fn on_segment(a: DVec2, b: DVec2, p: DVec2) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// 线段 ab 与 cd 是否相交（真正穿越、端点接触或共线重叠都算）
pub fn segments_intersect(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if o1 * o2 < 0 && o3 * o4 < 0 {
        return true;
    }

    (o1 == 0 && on_segment(a, b, c))
        || (o2 == 0 && on_segment(a, b, d))
        || (o3 == 0 && on_segment(c, d, a))
        || (o4 == 0 && on_segment(c, d, b))
}

/// 仅在两条线段真正穿越对方时返回 true（接触和共线都不算）
fn segments_cross_strictly(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    orientation(a, b, c) * orientation(a, b, d) < 0 && orientation(c, d, a) * orientation(c, d, b) < 0
}

/// O(n²) 检查所有不相邻的边对
pub fn polygon_self_intersects(poly: &[DVec2]) -> bool {
    let n = poly.len();
    if n < 4 {
        // 三角形没有不相邻的边
        return false;
    }

    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + 1) % n]);
        for j in i + 2..n {
            // 首边和末边相邻
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (poly[j], poly[(j + 1) % n]);
            if segments_intersect(a, b, c, d) {
                return true;
            }
        }
    }

    false
}

fn distance_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0., 1.);
    p.distance(a + ab * t)
}

/// 点是否严格位于多边形内部（落在边界附近的点返回 false）
pub fn point_in_polygon_strict(p: DVec2, poly: &[DVec2]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        if distance_to_segment(p, a, b) < BOUNDARY_EPSILON {
            return false;
        }
        // 射线法（奇偶规则）
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// 两个多边形是否有正面积的重叠
///
/// 先做包围盒预检，再检查严格穿越的边和严格包含的顶点。
/// 质心检查用于捕获完全重合的多边形（此时所有顶点都在对方边界上）。
pub fn polygons_overlap(a: &[DVec2], b: &[DVec2]) -> bool {
    let (Some(box_a), Some(box_b)) = (Rect::bounding(a), Rect::bounding(b)) else {
        return false;
    };
    if !box_a.overlaps(&box_b, BOUNDARY_EPSILON) {
        return false;
    }

    for i in 0..a.len() {
        let (p, q) = (a[i], a[(i + 1) % a.len()]);
        for j in 0..b.len() {
            let (r, s) = (b[j], b[(j + 1) % b.len()]);
            if segments_cross_strictly(p, q, r, s) {
                return true;
            }
        }
    }

    a.iter().any(|p| point_in_polygon_strict(*p, b))
        || b.iter().any(|p| point_in_polygon_strict(*p, a))
        || point_in_polygon_strict(centroid(a), b)
        || point_in_polygon_strict(centroid(b), a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Vec<DVec2> {
        Rect::new(x, y, w, h).corners().to_vec()
    }

    #[test]
    fn crossing_and_touching_segments() {
        let o = DVec2::ZERO;
        assert!(segments_intersect(o, DVec2::new(2., 2.), DVec2::new(0., 2.), DVec2::new(2., 0.)));
        // 端点接触
        assert!(segments_intersect(o, DVec2::X, DVec2::X, DVec2::new(1., 1.)));
        // 共线重叠
        assert!(segments_intersect(o, DVec2::new(2., 0.), DVec2::X, DVec2::new(3., 0.)));
        // 共线但分离
        assert!(!segments_intersect(o, DVec2::X, DVec2::new(2., 0.), DVec2::new(3., 0.)));
        // 平行
        assert!(!segments_intersect(o, DVec2::X, DVec2::Y, DVec2::new(1., 1.)));
    }

    #[test]
    fn self_intersection() {
        assert!(!polygon_self_intersects(&rect(0., 0., 4., 4.)));

        let bow_tie = [
            DVec2::new(0., 0.),
            DVec2::new(4., 4.),
            DVec2::new(4., 0.),
            DVec2::new(0., 4.),
        ];
        assert!(polygon_self_intersects(&bow_tie));

        // 凹多边形但不自交
        let concave = [
            DVec2::new(0., 0.),
            DVec2::new(4., 0.),
            DVec2::new(2., 1.),
            DVec2::new(4., 4.),
            DVec2::new(0., 4.),
        ];
        assert!(!polygon_self_intersects(&concave));
    }

    #[test]
    fn point_in_polygon_excludes_boundary() {
        let sq = rect(0., 0., 10., 10.);
        assert!(point_in_polygon_strict(DVec2::new(5., 5.), &sq));
        assert!(!point_in_polygon_strict(DVec2::new(10., 5.), &sq));
        assert!(!point_in_polygon_strict(DVec2::new(0., 0.), &sq));
        assert!(!point_in_polygon_strict(DVec2::new(15., 5.), &sq));
    }

    #[test]
    fn overlap() {
        let a = rect(0., 0., 10., 10.);
        // 共享一条边
        assert!(!polygons_overlap(&a, &rect(10., 0., 10., 10.)));
        // 部分重叠
        assert!(polygons_overlap(&a, &rect(5., 5., 10., 10.)));
        // 完全包含
        assert!(polygons_overlap(&a, &rect(2., 2., 2., 2.)));
        // 完全重合
        assert!(polygons_overlap(&a, &a));
        // 十字形：没有顶点在对方内部，但边互相穿越
        assert!(polygons_overlap(&rect(4., -5., 2., 20.), &rect(-5., 4., 20., 2.)));
        // 远离
        assert!(!polygons_overlap(&a, &rect(50., 50., 1., 1.)));
    }
}
