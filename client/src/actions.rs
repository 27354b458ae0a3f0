//! Pointer and command handling for the path model. Every function returns
//! `true` when the change should be redrawn.

use polycrop_shared::{DrawingMode, Point};

use crate::geometry::{simplify_path, SIMPLIFY_TOLERANCE};
use crate::state::{DragState, PathModel, MAX_STROKE_POINTS, REDRAW_EVERY_N_POINTS};

pub fn press(model: &mut PathModel, point: Point) -> bool {
    match model.mode {
        DrawingMode::Polygon => {
            if model.path.is_closed() {
                return false;
            }
            model.path.push(point);
            true
        }
        DrawingMode::FreeDraw => {
            model.drag = DragState::Freehand {
                stroke: vec![point],
            };
            true
        }
    }
}

pub fn drag_to(model: &mut PathModel, point: Point) -> bool {
    if model.mode != DrawingMode::FreeDraw {
        return false;
    }
    let DragState::Freehand { stroke } = &mut model.drag else {
        return false;
    };
    if stroke.len() >= MAX_STROKE_POINTS {
        return false;
    }
    stroke.push(point);
    stroke.len() % REDRAW_EVERY_N_POINTS == 0
}

pub fn release(model: &mut PathModel) -> bool {
    if model.mode != DrawingMode::FreeDraw {
        return false;
    }
    let DragState::Freehand { stroke } = std::mem::replace(&mut model.drag, DragState::Idle)
    else {
        return false;
    };
    model
        .path
        .extend(simplify_path(&stroke, SIMPLIFY_TOLERANCE));
    true
}

pub fn double_press(model: &mut PathModel) -> bool {
    if model.mode != DrawingMode::Polygon {
        return false;
    }
    close_path(model)
}

pub fn close_path(model: &mut PathModel) -> bool {
    model.path.close()
}

pub fn undo_last_point(model: &mut PathModel) -> bool {
    model.path.pop().is_some()
}

pub fn clear_path(model: &mut PathModel) -> bool {
    model.reset();
    true
}

pub fn set_mode(model: &mut PathModel, mode: DrawingMode) -> bool {
    model.mode = mode;
    clear_path(model)
}
