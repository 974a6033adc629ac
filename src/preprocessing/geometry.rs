//! Minimum-area enclosing rectangle for contour analysis.

use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use serde::Serialize;

/// Rotated rectangle enclosing a point set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotatedRect {
    pub center: (f64, f64),
    pub width: f64,
    pub height: f64,
    /// Edge orientation in image coordinates (y down), reduced to [-90, 0)
    pub angle_deg: f64,
}

impl RotatedRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Convex hull of `points` with duplicates removed first; contours that
/// double back over one-pixel strokes repeat points
pub fn distinct_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.cmp(&b.x).then(a.y.cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    convex_hull(pts)
}

/// Smallest-area rectangle enclosing `points`, found with rotating calipers
/// over the convex hull. `None` when fewer than two distinct points exist.
pub fn min_area_rect(points: &[Point<i32>]) -> Option<RotatedRect> {
    let hull = distinct_hull(points);
    if hull.len() < 2 {
        return None;
    }

    let hull: Vec<(f64, f64)> = hull.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let mut best: Option<(f64, RotatedRect)> = None;

    for i in 0..hull.len() {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % hull.len()];
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = ((x1 - x0) / len, (y1 - y0) / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(px, py) in &hull {
            let u = px * ux + py * uy;
            let v = px * vx + py * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;
        if best.as_ref().is_some_and(|(a, _)| *a <= area) {
            continue;
        }

        let cu = (min_u + max_u) / 2.0;
        let cv = (min_v + max_v) / 2.0;
        let center = (cu * ux + cv * vx, cu * uy + cv * vy);
        best = Some((
            area,
            RotatedRect {
                center,
                width,
                height,
                angle_deg: reduce_rect_angle(uy.atan2(ux).to_degrees()),
            },
        ));
    }

    best.map(|(_, rect)| rect)
}

/// A rectangle looks identical every quarter turn, so any edge direction
/// reduces to one representative in [-90, 0).
fn reduce_rect_angle(deg: f64) -> f64 {
    let reduced = deg % 90.0;
    if reduced >= 0.0 {
        reduced - 90.0
    } else {
        reduced
    }
}
