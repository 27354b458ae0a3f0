use polycrop_shared::{DrawingMode, Point};

pub const MAX_STROKE_POINTS: usize = 8000;
pub const REDRAW_EVERY_N_POINTS: usize = 4;
pub use polycrop_shared::MIN_REGION_POINTS;

/// The committed selection boundary. `closed` can only be set once the path
/// has enough points to enclose a region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CropPath {
    points: Vec<Point>,
    closed: bool,
}

impl CropPath {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = Point>) {
        self.points.extend(points);
    }

    pub fn pop(&mut self) -> Option<Point> {
        let popped = self.points.pop();
        if popped.is_some() {
            self.closed = false;
        }
        popped
    }

    pub fn close(&mut self) -> bool {
        if self.closed || self.points.len() < MIN_REGION_POINTS {
            return false;
        }
        self.closed = true;
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.closed = false;
    }
}

pub enum DragState {
    Idle,
    Freehand { stroke: Vec<Point> },
}

pub struct PathModel {
    pub path: CropPath,
    pub mode: DrawingMode,
    pub drag: DragState,
}

impl PathModel {
    pub fn new(mode: DrawingMode) -> Self {
        Self {
            path: CropPath::default(),
            mode,
            drag: DragState::Idle,
        }
    }

    pub fn stroke(&self) -> &[Point] {
        match &self.drag {
            DragState::Freehand { stroke } => stroke,
            DragState::Idle => &[],
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Freehand { .. })
    }

    pub fn reset(&mut self) {
        self.path.clear();
        self.drag = DragState::Idle;
    }
}

impl Default for PathModel {
    fn default() -> Self {
        Self::new(DrawingMode::default())
    }
}
