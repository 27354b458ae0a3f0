use std::cell::{Cell, RefCell, RefMut};
use std::collections::VecDeque;
use std::future::Future;

use async_trait::async_trait;
use polycrop_shared::{Ack, ApplyRequest, CancelRequest, DrawingMode};

use crate::error::CropError;
use crate::host::{CropApi, Host};
use crate::render::Surface;

pub fn block_on<F: Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Clear(f64, f64),
    Snapshot(u32),
    Smoothing(bool),
    RoundJoins,
    StrokeColor(String),
    FillColor(String),
    LineWidth(f64),
    BeginPath,
    MoveTo(f64, f64),
    LineTo(f64, f64),
    ClosePath,
    Circle(f64, f64, f64),
    Fill,
    Stroke,
}

#[derive(Default)]
pub struct RecordingSurface {
    pub ops: Vec<Op>,
}

impl Surface for RecordingSurface {
    type Snapshot = Snapshot;

    fn clear(&mut self, width: f64, height: f64) {
        self.ops.push(Op::Clear(width, height));
    }

    fn draw_snapshot(&mut self, snapshot: &Snapshot) {
        self.ops.push(Op::Snapshot(snapshot.0));
    }

    fn set_smoothing(&mut self, enabled: bool) {
        self.ops.push(Op::Smoothing(enabled));
    }

    fn set_round_joins(&mut self) {
        self.ops.push(Op::RoundJoins);
    }

    fn set_stroke_color(&mut self, color: &str) {
        self.ops.push(Op::StrokeColor(color.to_string()));
    }

    fn set_fill_color(&mut self, color: &str) {
        self.ops.push(Op::FillColor(color.to_string()));
    }

    fn set_line_width(&mut self, width: f64) {
        self.ops.push(Op::LineWidth(width));
    }

    fn begin_path(&mut self) {
        self.ops.push(Op::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ops.push(Op::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ops.push(Op::LineTo(x, y));
    }

    fn close_path(&mut self) {
        self.ops.push(Op::ClosePath);
    }

    fn circle(&mut self, x: f64, y: f64, radius: f64) {
        self.ops.push(Op::Circle(x, y, radius));
    }

    fn fill(&mut self) {
        self.ops.push(Op::Fill);
    }

    fn stroke(&mut self) {
        self.ops.push(Op::Stroke);
    }
}

pub struct TestImage {
    width: u32,
    height: u32,
}

/// Decodes sources of the form `"<width>x<height>"`; anything else fails.
/// Animation frames queue up until `run_frames`.
#[derive(Default)]
pub struct TestHost {
    pub surface: RefCell<RecordingSurface>,
    pub frames: RefCell<Vec<Box<dyn FnOnce()>>>,
    pub alerts: RefCell<Vec<String>>,
    pub presented: RefCell<Vec<DrawingMode>>,
    pub dismissed: Cell<usize>,
    pub captures: Cell<usize>,
}

impl TestHost {
    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn run_frames(&self) -> usize {
        let frames = std::mem::take(&mut *self.frames.borrow_mut());
        let count = frames.len();
        for frame in frames {
            frame();
        }
        count
    }
}

#[async_trait(?Send)]
impl Host for TestHost {
    type Image = TestImage;
    type Surface = RecordingSurface;

    async fn decode_image(&self, source: &str) -> Result<TestImage, CropError> {
        let parsed = source
            .split_once('x')
            .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)));
        match parsed {
            Some((width, height)) => Ok(TestImage { width, height }),
            None => Err(CropError::AssetLoad(format!("cannot decode {source}"))),
        }
    }

    fn image_size(&self, image: &TestImage) -> (u32, u32) {
        (image.width, image.height)
    }

    fn capture(&self, image: &TestImage) -> Result<Snapshot, CropError> {
        self.captures.set(self.captures.get() + 1);
        Ok(Snapshot(image.width * image.height))
    }

    fn surface(&self) -> RefMut<'_, RecordingSurface> {
        self.surface.borrow_mut()
    }

    fn request_frame(&self, on_frame: Box<dyn FnOnce()>) {
        self.frames.borrow_mut().push(on_frame);
    }

    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }

    fn present(&self, mode: DrawingMode) {
        self.presented.borrow_mut().push(mode);
    }

    fn dismiss(&self) {
        self.dismissed.set(self.dismissed.get() + 1);
    }
}

pub enum Reply {
    Ack(Ack),
    Fail(String),
    Hang,
}

#[derive(Default)]
pub struct ScriptedApi {
    pub apply_replies: RefCell<VecDeque<Reply>>,
    pub apply_calls: RefCell<Vec<ApplyRequest>>,
    pub cancel_calls: RefCell<Vec<CancelRequest>>,
    pub fail_cancel: Cell<bool>,
}

impl ScriptedApi {
    pub fn push_apply(&self, reply: Reply) {
        self.apply_replies.borrow_mut().push_back(reply);
    }
}

#[async_trait(?Send)]
impl CropApi for ScriptedApi {
    async fn apply(&self, request: &ApplyRequest) -> Result<Ack, CropError> {
        self.apply_calls.borrow_mut().push(request.clone());
        let reply = self.apply_replies.borrow_mut().pop_front();
        match reply {
            Some(Reply::Ack(ack)) => Ok(ack),
            Some(Reply::Fail(message)) => Err(CropError::Transport(message)),
            Some(Reply::Hang) => futures::future::pending().await,
            None => Ok(Ack::ok()),
        }
    }

    async fn cancel(&self, request: &CancelRequest) -> Result<Ack, CropError> {
        self.cancel_calls.borrow_mut().push(request.clone());
        if self.fail_cancel.get() {
            Err(CropError::Transport("cancel endpoint unreachable".into()))
        } else {
            Ok(Ack::ok())
        }
    }
}
