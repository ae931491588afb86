//! Point location in deformed quads and the inverse bilinear map
//!
//! Quads are given by their corners `[a, b, c, d]` where the bilinear map is
//!
//! ```text
//! P(u, v) = a + u·(b - a) + v·(d - a) + u·v·(a - b + c - d)
//! ```
//!
//! so `a = P(0,0)`, `b = P(1,0)`, `c = P(1,1)` and `d = P(0,1)`.

use geo::Coord;

/// Tolerance on the unit interval when accepting a root
const ROOT_TOLERANCE: f64 = 1e-9;

/// Roots closer than this are the same root
const ROOT_MERGE: f64 = 1e-12;

/// Double-parity point-in-polygon test.
///
/// A horizontal and a vertical probe are cast through `p`; the point is
/// inside only when each probe crosses the boundary an odd number of times
/// on both sides. Crossings are half-open, so a point on an edge shared by
/// two quads belongs to exactly one of them.
pub fn point_in_quad(p: Coord<f64>, quad: &[Coord<f64>; 4]) -> bool {
    if !in_bounding_box(p, quad) {
        return false;
    }

    let (mut left, mut right, mut below, mut above) = (0u32, 0u32, 0u32, 0u32);
    for i in 0..4 {
        let (s, e) = (quad[i], quad[(i + 1) % 4]);

        if (s.y <= p.y) != (e.y <= p.y) {
            let cx = s.x + (p.y - s.y) * (e.x - s.x) / (e.y - s.y);
            if cx > p.x {
                right += 1;
            } else {
                left += 1;
            }
        }

        if (s.x <= p.x) != (e.x <= p.x) {
            let cy = s.y + (p.x - s.x) * (e.y - s.y) / (e.x - s.x);
            if cy > p.y {
                above += 1;
            } else {
                below += 1;
            }
        }
    }

    left % 2 == 1 && right % 2 == 1 && below % 2 == 1 && above % 2 == 1
}

#[inline]
fn in_bounding_box(p: Coord<f64>, quad: &[Coord<f64>; 4]) -> bool {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for c in quad {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }
    p.x >= min_x && p.x <= max_x && p.y >= min_y && p.y <= max_y
}

/// Forward bilinear map of `(u, v)` through a quad
#[inline]
pub fn bilinear(quad: &[Coord<f64>; 4], u: f64, v: f64) -> Coord<f64> {
    let [a, b, c, d] = *quad;
    a * ((1.0 - u) * (1.0 - v)) + b * (u * (1.0 - v)) + c * (u * v) + d * ((1.0 - u) * v)
}

/// Axis on which the inverse bilinear solve found no admissible root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootFailure {
    /// No root for the `u` (column) parameter
    U,
    /// No root for the `v` (row) parameter
    V,
}

impl RootFailure {
    pub fn reason(self) -> &'static str {
        match self {
            RootFailure::U => "no root in [0, 1] for the column parameter",
            RootFailure::V => "no root in [0, 1] for the row parameter",
        }
    }
}

/// Solution of the inverse bilinear map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseBilinear {
    /// Local column parameter in `[0, 1]`
    pub u: f64,
    /// Local row parameter in `[0, 1]`
    pub v: f64,
    /// Number of admissible `(u, v)` pairs the choice was made from
    pub candidates: usize,
}

/// Local `(u, v)` of `p` inside a quad.
///
/// Both parameters solve independent quadratics. When an axis has two
/// admissible roots the pair whose forward image lands closest to `p` wins.
pub fn inverse_bilinear(
    p: Coord<f64>,
    quad: &[Coord<f64>; 4],
) -> Result<InverseBilinear, RootFailure> {
    let [a, b, c, d] = *quad;
    let e = b - a;
    let f = d - a;
    let g = a - b + c - d;
    let h = p - a;

    let ef = cross(e, f);
    let hg = cross(h, g);

    let us = unit_roots(cross(e, g), ef - hg, -cross(h, f));
    let vs = unit_roots(cross(g, f), ef + hg, cross(h, e));
    if us.is_empty() {
        return Err(RootFailure::U);
    }
    if vs.is_empty() {
        return Err(RootFailure::V);
    }

    let mut best = (f64::INFINITY, us[0], vs[0]);
    for &u in &us {
        for &v in &vs {
            let q = bilinear(quad, u, v) - p;
            let residual = q.x * q.x + q.y * q.y;
            if residual < best.0 {
                best = (residual, u, v);
            }
        }
    }

    Ok(InverseBilinear {
        u: best.1,
        v: best.2,
        candidates: us.len() * vs.len(),
    })
}

#[inline]
fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Real roots of `a·x² + b·x + c` inside `[0, 1]`, clamped and deduplicated.
///
/// Uses the cancellation-free form `q = -(b + sign(b)·√disc) / 2`,
/// `x = q / a` and `x = c / q`, which also covers the linear case `a = 0`.
fn unit_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let mut disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        // Tangent roots may come out slightly negative
        if disc > -ROOT_MERGE * (b * b + (4.0 * a * c).abs()) {
            disc = 0.0;
        } else {
            return Vec::new();
        }
    }

    let sign = if b < 0.0 { -1.0 } else { 1.0 };
    let q = -0.5 * (b + sign * disc.sqrt());

    let mut roots: Vec<f64> = Vec::with_capacity(2);
    for r in [q / a, c / q] {
        if !r.is_finite() || r < -ROOT_TOLERANCE || r > 1.0 + ROOT_TOLERANCE {
            continue;
        }
        let r = r.clamp(0.0, 1.0);
        if roots.iter().all(|&x| (x - r).abs() > ROOT_MERGE) {
            roots.push(r);
        }
    }
    roots
}
