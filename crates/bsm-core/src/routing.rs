//! Transition routing geometry.
//!
//! Pure functions from endpoint rectangles plus a control-point offset to a
//! drawable curve. Paths are derived state: they are recomputed from current
//! positions on demand and never stored or persisted, so moving a state can
//! never leave a stale arrow behind.

// ─── Primitives ──────────────────────────────────────────────────────────

/// A point in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// An axis-aligned rectangle: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the two rectangles overlap (shared edges count).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn united(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let r = self.right().max(other.right());
        let b = self.bottom().max(other.bottom());
        Rect::new(x, y, r - x, b - y)
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }
}

/// Snap a coordinate to the nearest multiple of `grid`.
pub fn snap(value: f64, grid: f64) -> f64 {
    (value / grid).round() * grid
}

// ─── Boundary intersection ───────────────────────────────────────────────

/// Intersect the directed segment `from → to` with the boundary of `rect`,
/// returning the crossing nearest `from`. `None` when the segment never
/// crosses an edge (e.g. both endpoints inside the rect) — callers fall
/// back to the rect center.
pub fn boundary_intersection(rect: &Rect, from: Point, to: Point) -> Option<Point> {
    let [tl, tr, br, bl] = rect.corners();
    let edges = [(tl, tr), (tr, br), (br, bl), (bl, tl)];

    let mut best: Option<(f64, Point)> = None;
    for (a, b) in edges {
        if let Some(p) = segment_intersection(from, to, a, b) {
            let d = from.distance_to(p);
            if best.is_none_or(|(bd, _)| d < bd) {
                best = Some((d, p));
            }
        }
    }
    best.map(|(_, p)| p)
}

/// Bounded segment/segment intersection. Parallel segments yield `None`.
fn segment_intersection(p1: Point, p2: Point, q1: Point, q2: Point) -> Option<Point> {
    let rx = p2.x - p1.x;
    let ry = p2.y - p1.y;
    let sx = q2.x - q1.x;
    let sy = q2.y - q1.y;

    let denom = rx * sy - ry * sx;
    if denom.abs() < 1e-12 {
        return None;
    }

    let qpx = q1.x - p1.x;
    let qpy = q1.y - p1.y;
    let t = (qpx * sy - qpy * sx) / denom;
    let u = (qpx * ry - qpy * rx) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(p1.x + t * rx, p1.y + t * ry))
    } else {
        None
    }
}

// ─── Curve routing ───────────────────────────────────────────────────────

/// Self-loop anchors sit this fraction of the width either side of center,
/// on the top edge.
const LOOP_ANCHOR_SPREAD: f64 = 0.2;
/// Vertical radius of the default loop, as a fraction of the node height.
const LOOP_RADIUS_FACTOR: f64 = 0.55;
/// The default control point sits `radius * LOOP_LIFT` above the anchors.
const LOOP_LIFT: f64 = 1.5;

/// A routed transition curve, ready for stroking or hit-testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurvePath {
    /// Straight segment between the two boundary points.
    Line { from: Point, to: Point },
    /// Quadratic bezier displaced by the control-point offset.
    Quad { from: Point, ctrl: Point, to: Point },
    /// Self-loop: cubic bezier arching over the top of the node.
    Loop {
        from: Point,
        ctrl1: Point,
        ctrl2: Point,
        to: Point,
    },
}

impl CurvePath {
    pub fn from_point(&self) -> Point {
        match *self {
            CurvePath::Line { from, .. }
            | CurvePath::Quad { from, .. }
            | CurvePath::Loop { from, .. } => from,
        }
    }

    pub fn to_point(&self) -> Point {
        match *self {
            CurvePath::Line { to, .. } | CurvePath::Quad { to, .. } | CurvePath::Loop { to, .. } => {
                to
            }
        }
    }

    /// Evaluate the curve at parameter `t` in [0, 1].
    pub fn point_at(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        let mt = 1.0 - t;
        match *self {
            CurvePath::Line { from, to } => {
                Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
            }
            CurvePath::Quad { from, ctrl, to } => {
                let a = mt * mt;
                let b = 2.0 * mt * t;
                let c = t * t;
                Point::new(
                    a * from.x + b * ctrl.x + c * to.x,
                    a * from.y + b * ctrl.y + c * to.y,
                )
            }
            CurvePath::Loop {
                from,
                ctrl1,
                ctrl2,
                to,
            } => {
                let a = mt * mt * mt;
                let b = 3.0 * mt * mt * t;
                let c = 3.0 * mt * t * t;
                let d = t * t * t;
                Point::new(
                    a * from.x + b * ctrl1.x + c * ctrl2.x + d * to.x,
                    a * from.y + b * ctrl1.y + c * ctrl2.y + d * to.y,
                )
            }
        }
    }

    /// The label anchor — the curve's midpoint.
    pub fn midpoint(&self) -> Point {
        self.point_at(0.5)
    }
}

/// Route a transition between two distinct states.
///
/// Endpoints are where the center→center segment crosses each boundary
/// (falling back to the centers for overlapping rects). A zero offset gives
/// a straight line; otherwise the curve's control point is the midpoint of
/// the endpoint segment displaced by `offset_x` along the perpendicular
/// `(-dy, dx)/len` and `offset_y` along the tangent.
pub fn route_between(source: &Rect, target: &Rect, offset_x: f64, offset_y: f64) -> CurvePath {
    let sc = source.center();
    let tc = target.center();

    let from = boundary_intersection(source, sc, tc).unwrap_or(sc);
    let to = boundary_intersection(target, tc, sc).unwrap_or(tc);

    if offset_x == 0.0 && offset_y == 0.0 {
        return CurvePath::Line { from, to };
    }

    let mid_x = (from.x + to.x) / 2.0;
    let mid_y = (from.y + to.y) / 2.0;
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = dx.hypot(dy).max(1e-6);

    let perp_x = -dy / length;
    let perp_y = dx / length;

    let ctrl = Point::new(
        mid_x + perp_x * offset_x + (dx / length) * offset_y,
        mid_y + perp_y * offset_x + (dy / length) * offset_y,
    );
    CurvePath::Quad { from, ctrl, to }
}

/// Route a self-loop on one state.
///
/// The loop leaves the top edge right of center and re-enters left of
/// center; by default it arches `height * 0.55 * 1.5` above the node, and
/// the user offset displaces that apex. The two cubic control points sit at
/// the apex height, halfway between the apex and each anchor — offset or
/// not, the result is never a degenerate straight segment.
pub fn route_self_loop(rect: &Rect, offset_x: f64, offset_y: f64) -> CurvePath {
    let c = rect.center();
    let from = Point::new(c.x + rect.width * LOOP_ANCHOR_SPREAD, rect.top());
    let to = Point::new(c.x - rect.width * LOOP_ANCHOR_SPREAD, rect.top());

    let loop_radius_y = rect.height * LOOP_RADIUS_FACTOR;
    let apex = Point::new(
        from.x + offset_x,
        from.y - loop_radius_y * LOOP_LIFT + offset_y,
    );

    let ctrl1 = Point::new(apex.x - (apex.x - from.x) * 0.5, apex.y);
    let ctrl2 = Point::new(apex.x + (to.x - apex.x) * 0.5, apex.y);

    CurvePath::Loop {
        from,
        ctrl1,
        ctrl2,
        to,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_intersection_hits_each_side() {
        let rect = Rect::new(0.0, 0.0, 100.0, 60.0);
        let c = rect.center();

        let right = boundary_intersection(&rect, c, Point::new(300.0, 30.0)).unwrap();
        assert!((right.x - 100.0).abs() < 1e-9);

        let left = boundary_intersection(&rect, c, Point::new(-300.0, 30.0)).unwrap();
        assert!((left.x - 0.0).abs() < 1e-9);

        let top = boundary_intersection(&rect, c, Point::new(50.0, -300.0)).unwrap();
        assert!((top.y - 0.0).abs() < 1e-9);

        let bottom = boundary_intersection(&rect, c, Point::new(50.0, 300.0)).unwrap();
        assert!((bottom.y - 60.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_intersection_none_when_segment_stays_inside() {
        let rect = Rect::new(0.0, 0.0, 100.0, 60.0);
        let inside = boundary_intersection(&rect, rect.center(), Point::new(60.0, 40.0));
        assert_eq!(inside, None);
    }

    #[test]
    fn zero_offset_routes_a_straight_line() {
        let a = Rect::new(0.0, 0.0, 120.0, 60.0);
        let b = Rect::new(300.0, 0.0, 120.0, 60.0);
        match route_between(&a, &b, 0.0, 0.0) {
            CurvePath::Line { from, to } => {
                // exits a's right edge, enters b's left edge
                assert!((from.x - 120.0).abs() < 1e-9);
                assert!((to.x - 300.0).abs() < 1e-9);
                assert!((from.y - 30.0).abs() < 1e-9);
            }
            other => panic!("expected Line, got {other:?}"),
        }
    }

    #[test]
    fn perpendicular_offset_bends_the_curve() {
        // Horizontal center line: perp unit is (0, 1), so offset_x moves
        // the control point straight down.
        let a = Rect::new(0.0, 0.0, 120.0, 60.0);
        let b = Rect::new(300.0, 0.0, 120.0, 60.0);
        match route_between(&a, &b, 40.0, 0.0) {
            CurvePath::Quad { from, ctrl, to } => {
                let mid_x = (from.x + to.x) / 2.0;
                assert!((ctrl.x - mid_x).abs() < 1e-9);
                assert!((ctrl.y - (30.0 + 40.0)).abs() < 1e-9);
            }
            other => panic!("expected Quad, got {other:?}"),
        }
    }

    #[test]
    fn tangential_offset_slides_along_the_line() {
        let a = Rect::new(0.0, 0.0, 120.0, 60.0);
        let b = Rect::new(300.0, 0.0, 120.0, 60.0);
        match route_between(&a, &b, 0.0, 25.0) {
            CurvePath::Quad { from, ctrl, to } => {
                let mid_x = (from.x + to.x) / 2.0;
                assert!((ctrl.x - (mid_x + 25.0)).abs() < 1e-9);
                assert!((ctrl.y - 30.0).abs() < 1e-9);
            }
            other => panic!("expected Quad, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_arches_over_the_top() {
        let rect = Rect::new(100.0, 100.0, 120.0, 60.0);
        let path = route_self_loop(&rect, 0.0, 0.0);
        match path {
            CurvePath::Loop {
                from,
                ctrl1,
                ctrl2,
                to,
            } => {
                // anchors on the top edge, straddling the center
                assert!((from.y - 100.0).abs() < 1e-9);
                assert!((to.y - 100.0).abs() < 1e-9);
                assert!(from.x > to.x);
                // control points above the node
                assert!(ctrl1.y < 100.0);
                assert_eq!(ctrl1.y, ctrl2.y);
            }
            other => panic!("expected Loop, got {other:?}"),
        }
        // the apex really is above the anchors
        assert!(path.midpoint().y < 100.0);
    }

    #[test]
    fn point_at_endpoints_and_midpoint() {
        let line = CurvePath::Line {
            from: Point::new(0.0, 0.0),
            to: Point::new(10.0, 0.0),
        };
        assert_eq!(line.point_at(0.0), Point::new(0.0, 0.0));
        assert_eq!(line.point_at(1.0), Point::new(10.0, 0.0));
        assert_eq!(line.midpoint(), Point::new(5.0, 0.0));

        let quad = CurvePath::Quad {
            from: Point::new(0.0, 0.0),
            ctrl: Point::new(5.0, 10.0),
            to: Point::new(10.0, 0.0),
        };
        assert_eq!(quad.point_at(0.0), Point::new(0.0, 0.0));
        assert_eq!(quad.point_at(1.0), Point::new(10.0, 0.0));
        // quad midpoint is pulled halfway toward the control point
        assert!((quad.midpoint().y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn snap_rounds_to_grid() {
        assert_eq!(snap(33.0, 20.0), 40.0);
        assert_eq!(snap(47.0, 20.0), 40.0);
        assert_eq!(snap(51.0, 20.0), 60.0);
        assert_eq!(snap(0.0, 20.0), 0.0);
    }

    #[test]
    fn united_covers_both_rects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(50.0, 20.0, 10.0, 10.0);
        let u = a.united(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 60.0, 30.0));
    }
}
