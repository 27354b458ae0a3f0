use polycrop_shared::Point;

pub const SIMPLIFY_TOLERANCE: f64 = 1.5;

pub fn distance_to_segment(point: Point, start: Point, end: Point) -> f64 {
    let px = point.x as f64;
    let py = point.y as f64;
    let x1 = start.x as f64;
    let y1 = start.y as f64;
    let dx = end.x as f64 - x1;
    let dy = end.y as f64 - y1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((px - x1).powi(2) + (py - y1).powi(2)).sqrt();
    }
    let t = ((px - x1) * dx + (py - y1) * dy) / len_sq;
    let t = t.clamp(0.0, 1.0);
    let proj_x = x1 + t * dx;
    let proj_y = y1 + t * dy;
    ((px - proj_x).powi(2) + (py - proj_y).powi(2)).sqrt()
}

/// Single-pass filter over a freehand stroke: an interior point survives when
/// it lies farther than `tolerance` from the segment joining its neighbours
/// in the input. Not a recursive Douglas-Peucker; runs of gently curving
/// points can all survive.
pub fn simplify_path(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut simplified = Vec::with_capacity(points.len());
    simplified.push(points[0]);
    for window in points.windows(3) {
        let (prev, curr, next) = (window[0], window[1], window[2]);
        if distance_to_segment(curr, prev, next) > tolerance {
            simplified.push(curr);
        }
    }
    simplified.push(points[points.len() - 1]);
    simplified
}
