//! Hit testing: point → item lookup.
//!
//! States and comments sit above transition curves; within a kind the most
//! recently added item is topmost. So the scan runs rectangles in reverse
//! insertion order first, then falls back to sampled distance against each
//! routed curve.

use bsm_core::ItemId;
use bsm_core::model::Diagram;
use bsm_core::routing::{CurvePath, Point, Rect};

/// How close (scene units) a click must land to a transition curve. This
/// matches the fat stroke used for selecting thin curves.
pub const CURVE_TOLERANCE: f64 = 8.0;
const CURVE_SAMPLES: u32 = 32;

/// The topmost item at `p`, or `None` for empty canvas.
pub fn item_at(diagram: &Diagram, p: Point) -> Option<ItemId> {
    for (id, state) in diagram.states().rev() {
        if state.rect().contains(p) {
            return Some(id);
        }
    }
    for (id, comment) in diagram.comments().rev() {
        if comment.rect().contains(p) {
            return Some(id);
        }
    }
    for (id, _) in diagram.transitions().rev() {
        if let Some(path) = diagram.transition_path(id)
            && curve_distance(&path, p) <= CURVE_TOLERANCE
        {
            return Some(id);
        }
    }
    None
}

/// Everything whose extent touches `rect` — marquee selection.
pub fn items_in_rect(diagram: &Diagram, rect: &Rect) -> Vec<ItemId> {
    let mut out = Vec::new();
    for (id, state) in diagram.states() {
        if rect.intersects(&state.rect()) {
            out.push(id);
        }
    }
    for (id, comment) in diagram.comments() {
        if rect.intersects(&comment.rect()) {
            out.push(id);
        }
    }
    for (id, _) in diagram.transitions() {
        if let Some(path) = diagram.transition_path(id)
            && sampled_points(&path).any(|p| rect.contains(p))
        {
            out.push(id);
        }
    }
    out
}

/// Minimum distance from `p` to the sampled curve.
fn curve_distance(path: &CurvePath, p: Point) -> f64 {
    sampled_points(path)
        .map(|q| q.distance_to(p))
        .fold(f64::INFINITY, f64::min)
}

fn sampled_points(path: &CurvePath) -> impl Iterator<Item = Point> + '_ {
    (0..=CURVE_SAMPLES).map(move |i| path.point_at(f64::from(i) / f64::from(CURVE_SAMPLES)))
}

// ─── Tests ────────────────────────────────────────────────────────────────
