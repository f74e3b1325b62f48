use foundation::math::RenderPoint;
use formats::Geometry;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    /// Hit radius for points and lines, in render units (meters).
    pub tolerance: f64,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self { tolerance: 5.0 }
    }
}

/// Whether `point` hits `geometry`.
///
/// Areas use the even-odd rule over all rings, so holes are excluded. Points
/// and lines hit within `opts.tolerance`.
pub fn hit_test(geometry: &Geometry, point: RenderPoint, opts: PickOptions) -> bool {
    let tol = opts.tolerance.max(0.0);
    if !geometry.bounds().expanded(tol).contains([point.x, point.y]) {
        return false;
    }
    match geometry {
        Geometry::Point(p) => dist2(*p, point) <= tol * tol,
        Geometry::MultiPoint(ps) => ps.iter().any(|p| dist2(*p, point) <= tol * tol),
        Geometry::LineString(line) => near_line(line, point, tol),
        Geometry::MultiLineString(lines) => lines.iter().any(|l| near_line(l, point, tol)),
        Geometry::Polygon(rings) => in_rings(rings, point),
        Geometry::MultiPolygon(polys) => polys.iter().any(|rings| in_rings(rings, point)),
    }
}

fn dist2(a: RenderPoint, b: RenderPoint) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn near_line(line: &[RenderPoint], p: RenderPoint, tol: f64) -> bool {
    match line {
        [] => false,
        [only] => dist2(*only, p) <= tol * tol,
        _ => line
            .windows(2)
            .any(|w| segment_dist2(w[0], w[1], p) <= tol * tol),
    }
}

fn segment_dist2(a: RenderPoint, b: RenderPoint, p: RenderPoint) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 <= 0.0 {
        return dist2(a, p);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    dist2(RenderPoint::new(a.x + t * dx, a.y + t * dy), p)
}

fn in_rings(rings: &[Vec<RenderPoint>], p: RenderPoint) -> bool {
    rings.iter().filter(|r| ring_contains(r, p)).count() % 2 == 1
}

// Crossing-number test; the ring need not be explicitly closed.
fn ring_contains(ring: &[RenderPoint], p: RenderPoint) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
