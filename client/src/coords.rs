use polycrop_shared::Point;

/// On-screen bounding box of the canvas element, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Maps viewport coordinates to canvas pixels. Each axis is scaled by
/// `intrinsic / display` independently. The result is not clamped to the
/// canvas, so a pointer just outside the element maps outside the image.
pub fn display_to_image(
    client_x: f64,
    client_y: f64,
    rect: DisplayRect,
    intrinsic_width: u32,
    intrinsic_height: u32,
) -> Point {
    let scale_x = axis_scale(intrinsic_width, rect.width);
    let scale_y = axis_scale(intrinsic_height, rect.height);
    Point {
        x: round_px((client_x - rect.left) * scale_x),
        y: round_px((client_y - rect.top) * scale_y),
    }
}

// A collapsed element (display: none, zero-size layout) has no meaningful
// ratio; treat it as unscaled.
fn axis_scale(intrinsic: u32, display: f64) -> f64 {
    if display > 0.0 && display.is_finite() {
        intrinsic as f64 / display
    } else {
        1.0
    }
}

// Halves round up, matching the browser's Math.round.
fn round_px(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Only the primary pointer's main button draws; extra touches and other
/// buttons would restart the stroke under the first finger.
pub fn is_drawing_pointer(is_primary: bool, button: i16) -> bool {
    is_primary && button == 0
}
