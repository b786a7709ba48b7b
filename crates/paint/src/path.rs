//! # Path Flattening
//!
//! Turns [`PathCommand`]s into directed line segments ([`Edge`]s) for the
//! coverage rasterizer. Curves are bisected a bounded number of times, so the
//! work per curve is fixed regardless of its size.

use common::{PathCommand, Vec2};

/// A curve segment is flat enough once its midpoint lies within this many
/// pixels of its chord's midpoint.
pub const FLATNESS: f32 = 0.125;
/// Maximum bisection depth for quadratic Béziers.
pub const QUAD_MAX_DEPTH: u32 = 3;
/// Maximum bisection depth for cubic Béziers.
pub const CUBIC_MAX_DEPTH: u32 = 4;
/// Fixed bisection depth for elliptical arcs (16 chords).
pub const ARC_DEPTH: u32 = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Edge
// ─────────────────────────────────────────────────────────────────────────────

/// A line segment with `y0 < y1`.
///
/// `positive` records whether the original segment ran toward increasing y;
/// the rasterizer uses it as the sign of the edge's coverage contribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub positive: bool,
}

impl Edge {
    /// Orient a segment; horizontal segments produce no edge.
    pub fn new(from: Vec2, to: Vec2) -> Option<Self> {
        if from.y == to.y || from.y.is_nan() || to.y.is_nan() {
            return None;
        }
        Some(if from.y < to.y {
            Self { x0: from.x, y0: from.y, x1: to.x, y1: to.y, positive: true }
        } else {
            Self { x0: to.x, y0: to.y, x1: from.x, y1: from.y, positive: false }
        })
    }

    /// x coordinate of the edge at height `y`.
    #[inline]
    pub fn x_at(&self, y: f32) -> f32 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }

    #[inline]
    pub fn min_x(&self) -> f32 {
        self.x0.min(self.x1)
    }

    #[inline]
    pub fn max_x(&self) -> f32 {
        self.x0.max(self.x1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flattener
// ─────────────────────────────────────────────────────────────────────────────

/// Incremental path flattener.
///
/// Subpaths are filled, so an open subpath is closed back to its start when
/// the next `MoveTo` arrives or the path ends.
#[derive(Debug, Default)]
pub struct Flattener {
    edges: Vec<Edge>,
    start: Vec2,
    current: Vec2,
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: &PathCommand) {
        match *cmd {
            PathCommand::MoveTo(p) => {
                self.close();
                self.start = p;
                self.current = p;
            }
            PathCommand::LineTo(p) => self.line_to(p),
            PathCommand::QuadraticCurveTo { ctrl, to } => {
                self.quad(self.current, ctrl, to, QUAD_MAX_DEPTH);
                self.current = to;
            }
            PathCommand::CubicCurveTo { ctrl1, ctrl2, to } => {
                self.cubic(self.current, ctrl1, ctrl2, to, CUBIC_MAX_DEPTH);
                self.current = to;
            }
            PathCommand::ArcTo { radii, x_rotation, large_arc, sweep, to } => {
                self.arc(self.current, radii, x_rotation, large_arc, sweep, to);
                self.current = to;
            }
            PathCommand::ClosePath => {
                self.close();
                self.current = self.start;
            }
        }
    }

    /// Close the last subpath and return the edges.
    pub fn finish(mut self) -> Vec<Edge> {
        self.close();
        self.edges
    }

    fn close(&mut self) {
        if self.current != self.start {
            self.segment(self.current, self.start);
        }
    }

    fn line_to(&mut self, p: Vec2) {
        self.segment(self.current, p);
        self.current = p;
    }

    #[inline]
    fn segment(&mut self, from: Vec2, to: Vec2) {
        if let Some(edge) = Edge::new(from, to) {
            self.edges.push(edge);
        }
    }

    fn quad(&mut self, p0: Vec2, p1: Vec2, p2: Vec2, depth: u32) {
        let curve_mid = (p0 + p1 * 2.0 + p2) * 0.25;
        let chord_mid = p0.midpoint(p2);
        if depth == 0 || (curve_mid - chord_mid).length_sq() <= FLATNESS * FLATNESS {
            self.segment(p0, p2);
            return;
        }
        let p01 = p0.midpoint(p1);
        let p12 = p1.midpoint(p2);
        let mid = p01.midpoint(p12);
        self.quad(p0, p01, mid, depth - 1);
        self.quad(mid, p12, p2, depth - 1);
    }

    fn cubic(&mut self, p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, depth: u32) {
        let curve_mid = (p0 + (p1 + p2) * 3.0 + p3) * 0.125;
        let chord_mid = p0.midpoint(p3);
        if depth == 0 || (curve_mid - chord_mid).length_sq() <= FLATNESS * FLATNESS {
            self.segment(p0, p3);
            return;
        }
        let p01 = p0.midpoint(p1);
        let p12 = p1.midpoint(p2);
        let p23 = p2.midpoint(p3);
        let p012 = p01.midpoint(p12);
        let p123 = p12.midpoint(p23);
        let mid = p012.midpoint(p123);
        self.cubic(p0, p01, p012, mid, depth - 1);
        self.cubic(mid, p123, p23, p3, depth - 1);
    }

    /// SVG endpoint arc: convert to center parameterization, then bisect the
    /// angular span into chords.
    fn arc(&mut self, from: Vec2, radii: Vec2, x_rotation: f32, large_arc: bool, sweep: bool, to: Vec2) {
        if from == to {
            return;
        }
        let (mut rx, mut ry) = (radii.x.abs(), radii.y.abs());
        if rx == 0.0 || ry == 0.0 {
            self.segment(from, to);
            return;
        }

        let (sin, cos) = x_rotation.sin_cos();
        let half = (from - to) * 0.5;
        let x1p = cos * half.x + sin * half.y;
        let y1p = -sin * half.x + cos * half.y;

        // Scale radii up when the endpoints cannot both lie on the ellipse.
        let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
        if lambda > 1.0 {
            let s = lambda.sqrt();
            rx *= s;
            ry *= s;
        }

        let (rx2, ry2) = (rx * rx, ry * ry);
        let num = rx2 * ry2 - rx2 * y1p * y1p - ry2 * x1p * x1p;
        let den = rx2 * y1p * y1p + ry2 * x1p * x1p;
        let mut coef = (num / den).max(0.0).sqrt();
        if large_arc == sweep {
            coef = -coef;
        }
        let cxp = coef * rx * y1p / ry;
        let cyp = -coef * ry * x1p / rx;

        let mid = from.midpoint(to);
        let center = Vec2::new(cos * cxp - sin * cyp + mid.x, sin * cxp + cos * cyp + mid.y);

        let u = Vec2::new((x1p - cxp) / rx, (y1p - cyp) / ry);
        let v = Vec2::new((-x1p - cxp) / rx, (-y1p - cyp) / ry);
        let theta1 = u.y.atan2(u.x);
        let mut delta = (u.x * v.y - u.y * v.x).atan2(u.dot(v));
        if !sweep && delta > 0.0 {
            delta -= std::f32::consts::TAU;
        } else if sweep && delta < 0.0 {
            delta += std::f32::consts::TAU;
        }

        let ellipse = EllipseArc { center, rx, ry, sin, cos };
        self.arc_span(&ellipse, from, theta1, to, theta1 + delta, ARC_DEPTH);
    }

    fn arc_span(&mut self, e: &EllipseArc, a: Vec2, ta: f32, b: Vec2, tb: f32, depth: u32) {
        if depth == 0 {
            self.segment(a, b);
            return;
        }
        let tm = (ta + tb) * 0.5;
        let m = e.point(tm);
        self.arc_span(e, a, ta, m, tm, depth - 1);
        self.arc_span(e, m, tm, b, tb, depth - 1);
    }
}

struct EllipseArc {
    center: Vec2,
    rx: f32,
    ry: f32,
    sin: f32,
    cos: f32,
}

impl EllipseArc {
    fn point(&self, theta: f32) -> Vec2 {
        let (st, ct) = theta.sin_cos();
        Vec2::new(
            self.center.x + self.rx * self.cos * ct - self.ry * self.sin * st,
            self.center.y + self.rx * self.sin * ct + self.ry * self.cos * st,
        )
    }
}

/// Flatten a whole path.
pub fn flatten(commands: &[PathCommand]) -> Vec<Edge> {
    let mut f = Flattener::new();
    for cmd in commands {
        f.push(cmd);
    }
    f.finish()
}

/// Smallest box containing every edge, as `(min, max)` corners.
pub fn edge_bounds(edges: &[Edge]) -> Option<(Vec2, Vec2)> {
    edges.iter().fold(None, |acc, e| {
        let lo = Vec2::new(e.min_x(), e.y0);
        let hi = Vec2::new(e.max_x(), e.y1);
        Some(match acc {
            None => (lo, hi),
            Some((min, max)) => (
                Vec2::new(min.x.min(lo.x), min.y.min(lo.y)),
                Vec2::new(max.x.max(hi.x), max.y.max(hi.y)),
            ),
        })
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    #[test]
    fn edge_orientation() {
        let down = Edge::new(v(0.0, 0.0), v(1.0, 4.0)).unwrap();
        assert!(down.positive);
        assert_eq!((down.y0, down.y1), (0.0, 4.0));

        let up = Edge::new(v(1.0, 4.0), v(0.0, 0.0)).unwrap();
        assert!(!up.positive);
        assert_eq!((up.x0, up.y0, up.x1, up.y1), (0.0, 0.0, 1.0, 4.0));

        assert!(Edge::new(v(0.0, 2.0), v(5.0, 2.0)).is_none());
        assert_eq!(down.x_at(2.0), 0.5);
    }

    #[test]
    fn square_closes_and_drops_horizontals() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(1.0, 1.0)),
            PathCommand::LineTo(v(3.0, 1.0)),
            PathCommand::LineTo(v(3.0, 3.0)),
            PathCommand::LineTo(v(1.0, 3.0)),
            PathCommand::ClosePath,
        ]);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges.iter().filter(|e| e.positive).count(), 1);
    }

    #[test]
    fn open_subpath_closes_implicitly() {
        let explicit = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::LineTo(v(4.0, 2.0)),
            PathCommand::LineTo(v(0.0, 4.0)),
            PathCommand::ClosePath,
        ]);
        let implicit = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::LineTo(v(4.0, 2.0)),
            PathCommand::LineTo(v(0.0, 4.0)),
        ]);
        assert_eq!(explicit, implicit);

        let two = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::LineTo(v(4.0, 2.0)),
            PathCommand::LineTo(v(0.0, 4.0)),
            PathCommand::MoveTo(v(10.0, 0.0)),
            PathCommand::LineTo(v(14.0, 2.0)),
            PathCommand::LineTo(v(10.0, 4.0)),
        ]);
        assert_eq!(two.len(), 6);
    }

    #[test]
    fn flat_quad_is_one_segment() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::QuadraticCurveTo { ctrl: v(0.0, 5.0), to: v(0.0, 10.0) },
        ]);
        // Curve plus the closing segment, which is collinear.
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn quad_subdivision_is_bounded() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::QuadraticCurveTo { ctrl: v(500.0, 250.0), to: v(0.0, 500.0) },
        ]);
        // 2^3 chords plus the closing edge.
        assert_eq!(edges.len(), 9);
    }

    #[test]
    fn cubic_subdivision_is_bounded() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::CubicCurveTo { ctrl1: v(900.0, 100.0), ctrl2: v(-900.0, 200.0), to: v(0.0, 300.0) },
        ]);
        assert!(edges.len() <= 17);
        assert!(edges.len() > 4);
    }

    #[test]
    fn curve_endpoints_are_exact() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::QuadraticCurveTo { ctrl: v(40.0, 20.0), to: v(0.0, 40.0) },
            PathCommand::ClosePath,
        ]);
        let (min, max) = edge_bounds(&edges).unwrap();
        assert_eq!(min.y, 0.0);
        assert_eq!(max.y, 40.0);
        assert!(max.x <= 20.0 + 1e-4);
        assert!(max.x > 19.0);
    }

    #[test]
    fn half_circle_arc() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::ArcTo { radii: v(10.0, 10.0), x_rotation: 0.0, large_arc: false, sweep: true, to: v(0.0, 20.0) },
            PathCommand::ClosePath,
        ]);
        // 16 chords plus the vertical closing edge.
        assert_eq!(edges.len(), 17);
        let (min, max) = edge_bounds(&edges).unwrap();
        assert!((max.x - 10.0).abs() < 1e-3, "max.x = {}", max.x);
        assert!(min.x.abs() < 1e-3);
        for e in &edges[..16] {
            for (x, y) in [(e.x0, e.y0), (e.x1, e.y1)] {
                let r = ((x - 0.0).powi(2) + (y - 10.0).powi(2)).sqrt();
                assert!((r - 10.0).abs() < 1e-3, "point ({x}, {y}) off circle");
            }
        }
    }

    #[test]
    fn arc_sweep_flag_picks_side() {
        let right = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::ArcTo { radii: v(10.0, 10.0), x_rotation: 0.0, large_arc: false, sweep: true, to: v(0.0, 20.0) },
        ]);
        let left = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::ArcTo { radii: v(10.0, 10.0), x_rotation: 0.0, large_arc: false, sweep: false, to: v(0.0, 20.0) },
        ]);
        assert!(edge_bounds(&right).unwrap().1.x > 9.0);
        assert!(edge_bounds(&left).unwrap().0.x < -9.0);
    }

    #[test]
    fn arc_radius_is_corrected_when_too_small() {
        let edges = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::ArcTo { radii: v(1.0, 1.0), x_rotation: 0.0, large_arc: false, sweep: true, to: v(0.0, 20.0) },
        ]);
        let (_, max) = edge_bounds(&edges).unwrap();
        assert!((max.x - 10.0).abs() < 1e-2);
    }

    #[test]
    fn degenerate_arcs() {
        let zero_radius = flatten(&[
            PathCommand::MoveTo(v(0.0, 0.0)),
            PathCommand::ArcTo { radii: v(0.0, 5.0), x_rotation: 0.0, large_arc: false, sweep: true, to: v(3.0, 4.0) },
        ]);
        // Straight line there and the closing edge back.
        assert_eq!(zero_radius.len(), 2);

        let same_point = flatten(&[
            PathCommand::MoveTo(v(2.0, 2.0)),
            PathCommand::ArcTo { radii: v(5.0, 5.0), x_rotation: 0.0, large_arc: true, sweep: true, to: v(2.0, 2.0) },
        ]);
        assert!(same_point.is_empty());
    }
}
