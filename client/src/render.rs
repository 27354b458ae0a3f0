use polycrop_shared::{DrawingMode, Point};

use crate::state::{CropPath, PathModel, MIN_REGION_POINTS};

pub const LINE_WIDTH: f64 = 2.0;
pub const PATH_STROKE: &str = "#00ff00";
pub const PATH_FILL: &str = "rgba(0, 255, 0, 0.2)";
pub const VERTEX_FILL: &str = "#ff0000";
pub const VERTEX_MARKER_RADIUS: f64 = 4.0;
pub const VERTEX_MARKER_LIMIT: usize = 100;
pub const STROKE_PREVIEW: &str = "#ffff00";

/// The subset of a 2D canvas context the overlay needs.
pub trait Surface {
    type Snapshot;

    fn clear(&mut self, width: f64, height: f64);
    fn draw_snapshot(&mut self, snapshot: &Self::Snapshot);
    fn set_smoothing(&mut self, enabled: bool);
    fn set_round_joins(&mut self);
    fn set_stroke_color(&mut self, color: &str);
    fn set_fill_color(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn close_path(&mut self);
    fn circle(&mut self, x: f64, y: f64, radius: f64);
    fn fill(&mut self);
    fn stroke(&mut self);
}

pub struct FrameView<'a, S> {
    pub model: &'a PathModel,
    pub snapshot: Option<&'a S>,
    pub width: u32,
    pub height: u32,
}

/// Coalesces redraw requests into one pending frame.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    pending: bool,
}

impl RedrawScheduler {
    /// Returns `true` when no frame was pending yet, i.e. the caller has to
    /// ask the host for an animation frame.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }
}

/// Free-draw previews the enclosed region before the path is closed.
pub fn should_fill_preview(mode: DrawingMode, path: &CropPath) -> bool {
    path.is_closed() || (mode == DrawingMode::FreeDraw && path.len() >= MIN_REGION_POINTS)
}

pub fn should_draw_vertices(mode: DrawingMode, path: &CropPath) -> bool {
    mode == DrawingMode::Polygon && path.len() < VERTEX_MARKER_LIMIT
}

pub fn render_frame<S: Surface>(surface: &mut S, view: &FrameView<'_, S::Snapshot>) {
    surface.clear(view.width as f64, view.height as f64);
    if let Some(snapshot) = view.snapshot {
        surface.draw_snapshot(snapshot);
    }

    // Clearing can reset context state, so the pen is configured every frame.
    surface.set_smoothing(true);
    surface.set_round_joins();

    let model = view.model;
    if !model.path.is_empty() {
        draw_path(surface, model);
    }
    let stroke = model.stroke();
    if !stroke.is_empty() {
        surface.set_stroke_color(STROKE_PREVIEW);
        surface.set_line_width(LINE_WIDTH);
        surface.set_round_joins();
        trace(surface, stroke);
        surface.stroke();
    }
}

fn draw_path<S: Surface>(surface: &mut S, model: &PathModel) {
    let path = &model.path;
    surface.set_stroke_color(PATH_STROKE);
    surface.set_fill_color(PATH_FILL);
    surface.set_line_width(LINE_WIDTH);
    trace(surface, path.points());
    if should_fill_preview(model.mode, path) {
        surface.close_path();
        surface.fill();
    }
    surface.stroke();

    if should_draw_vertices(model.mode, path) {
        surface.set_fill_color(VERTEX_FILL);
        for point in path.points() {
            surface.begin_path();
            surface.circle(point.x as f64, point.y as f64, VERTEX_MARKER_RADIUS);
            surface.fill();
        }
    }
}

fn trace<S: Surface>(surface: &mut S, points: &[Point]) {
    surface.begin_path();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        surface.move_to(first.x as f64, first.y as f64);
    }
    for point in iter {
        surface.line_to(point.x as f64, point.y as f64);
    }
}
