use std::cell::{Ref, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};
use polycrop_shared::{
    Ack, ApplyRequest, CancelRequest, CropConfig, DrawingMode, Point, MAX_IMAGE_AREA,
    MAX_SUBMIT_POINTS,
};

use crate::actions;
use crate::error::CropError;
use crate::host::{CropApi, Host, SnapshotOf};
use crate::render::{render_frame, FrameView, RedrawScheduler, Surface};
use crate::state::{PathModel, MIN_REGION_POINTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    Loading,
    Open,
    Submitting,
    Cancelling,
    Closed,
}

impl Phase {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Phase::Loading | Phase::Open | Phase::Submitting | Phase::Cancelling
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Opened {
    Ready { frame: bool },
    Superseded,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitResolution {
    Done,
    Retry,
    Superseded,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Applied(Ack),
    Ignored,
    Superseded,
}

/// State of one cropping session. Mutating methods return `true` when the
/// caller has to schedule an animation frame; requests made while a frame
/// is already pending fold into it.
pub struct Cropper<S> {
    phase: Phase,
    generation: u64,
    session_id: Option<String>,
    config: CropConfig,
    model: PathModel,
    snapshot: Option<S>,
    width: u32,
    height: u32,
    redraw: RedrawScheduler,
}

impl<S> Default for Cropper<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Cropper<S> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            generation: 0,
            session_id: None,
            config: CropConfig::default(),
            model: PathModel::default(),
            snapshot: None,
            width: 0,
            height: 0,
            redraw: RedrawScheduler::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn model(&self) -> &PathModel {
        &self.model
    }

    pub fn mode(&self) -> DrawingMode {
        self.model.mode
    }

    pub fn snapshot(&self) -> Option<&S> {
        self.snapshot.as_ref()
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn initialize(&mut self) {
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::Ready;
        }
    }

    fn touch(&mut self, changed: bool) -> bool {
        changed && self.redraw.request()
    }

    fn accepts_input(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Starts loading a new session. Returns the generation the load belongs
    /// to and whether a previous session had to be torn down first.
    pub fn begin_open(&mut self, session_id: String, config: CropConfig) -> (u64, bool) {
        self.initialize();
        let replaced = self.cleanup();
        if replaced {
            warn!("Replacing active crop session with {session_id}");
        }
        self.session_id = Some(session_id);
        self.config = config;
        self.phase = Phase::Loading;
        (self.generation, replaced)
    }

    pub fn finish_open(
        &mut self,
        generation: u64,
        width: u32,
        height: u32,
        capture: impl FnOnce() -> Result<S, CropError>,
    ) -> Result<Opened, CropError> {
        if generation != self.generation || self.phase != Phase::Loading {
            return Ok(Opened::Superseded);
        }
        if u64::from(width) * u64::from(height) > MAX_IMAGE_AREA {
            warn!("Rejecting {width}x{height} image: pixel area over limit");
            self.abort_open(generation);
            return Err(CropError::ResourceLimit { width, height });
        }
        let snapshot = match capture() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.abort_open(generation);
                return Err(error);
            }
        };
        self.width = width;
        self.height = height;
        self.snapshot = Some(snapshot);
        let mode = self.config.crop_mode;
        actions::set_mode(&mut self.model, mode);
        self.phase = Phase::Open;
        info!(
            "Crop session {} open ({width}x{height}, {mode})",
            self.session_id.as_deref().unwrap_or_default()
        );
        Ok(Opened::Ready {
            frame: self.touch(true),
        })
    }

    /// Drops a load that failed before the session became visible. Returns
    /// `false` when the load was already superseded.
    pub fn abort_open(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.phase != Phase::Loading {
            return false;
        }
        self.session_id = None;
        self.generation += 1;
        self.phase = Phase::Closed;
        true
    }

    pub fn press(&mut self, point: Point) -> bool {
        let changed = self.accepts_input() && actions::press(&mut self.model, point);
        self.touch(changed)
    }

    pub fn drag_to(&mut self, point: Point) -> bool {
        let changed = self.accepts_input() && actions::drag_to(&mut self.model, point);
        self.touch(changed)
    }

    pub fn release(&mut self) -> bool {
        let changed = self.accepts_input() && actions::release(&mut self.model);
        self.touch(changed)
    }

    pub fn double_press(&mut self) -> bool {
        let changed = self.accepts_input() && actions::double_press(&mut self.model);
        self.touch(changed)
    }

    pub fn close_path(&mut self) -> bool {
        let changed = self.accepts_input() && actions::close_path(&mut self.model);
        self.touch(changed)
    }

    pub fn undo_last_point(&mut self) -> bool {
        let changed = self.accepts_input() && actions::undo_last_point(&mut self.model);
        self.touch(changed)
    }

    pub fn clear_path(&mut self) -> bool {
        let changed = self.accepts_input() && actions::clear_path(&mut self.model);
        self.touch(changed)
    }

    pub fn set_mode(&mut self, mode: DrawingMode) -> bool {
        let changed = self.accepts_input() && actions::set_mode(&mut self.model, mode);
        self.touch(changed)
    }

    /// `Ok(None)` when there is no open session to submit (for example while
    /// a previous submit is still in flight).
    pub fn begin_submit(&mut self) -> Result<Option<(u64, ApplyRequest)>, CropError> {
        if self.phase != Phase::Open {
            return Ok(None);
        }
        let Some(session_id) = self.session_id.clone() else {
            return Ok(None);
        };
        let points = self.model.path.points();
        if points.len() < MIN_REGION_POINTS {
            return Err(CropError::not_enough_points());
        }
        if points.len() > MAX_SUBMIT_POINTS {
            debug!(
                "Submitting first {MAX_SUBMIT_POINTS} of {} path points",
                points.len()
            );
        }
        let request = ApplyRequest {
            session_id,
            path_points: points.iter().take(MAX_SUBMIT_POINTS).copied().collect(),
            image_width: self.width,
            image_height: self.height,
            drawing_mode: self.model.mode,
        };
        self.phase = Phase::Submitting;
        Ok(Some((self.generation, request)))
    }

    pub fn finish_submit(
        &mut self,
        generation: u64,
        reply: &Result<Ack, CropError>,
    ) -> SubmitResolution {
        if generation != self.generation || self.phase != Phase::Submitting {
            return SubmitResolution::Superseded;
        }
        match reply {
            Ok(ack) => {
                if !ack.success {
                    warn!(
                        "Crop backend reported failure: {}",
                        ack.error.as_deref().unwrap_or("unknown error")
                    );
                }
                SubmitResolution::Done
            }
            Err(_) => {
                self.phase = Phase::Open;
                SubmitResolution::Retry
            }
        }
    }

    /// Moves an active session into `Cancelling`. `None` when there is
    /// nothing to notify, including a cancel that is already under way.
    pub fn begin_cancel(&mut self) -> Option<(u64, CancelRequest)> {
        if !self.phase.is_active() || self.phase == Phase::Cancelling {
            return None;
        }
        let session_id = self.session_id.clone()?;
        self.phase = Phase::Cancelling;
        Some((self.generation, CancelRequest { session_id }))
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn matches_session(&self, session_id: &str) -> bool {
        self.phase.is_active() && self.session_id.as_deref() == Some(session_id)
    }

    /// Resets everything the session owns. Returns whether there was an
    /// active session; calling it again is a no-op.
    pub fn cleanup(&mut self) -> bool {
        let was_active = self.phase.is_active();
        self.model.reset();
        self.snapshot = None;
        self.session_id = None;
        if was_active {
            self.generation += 1;
            self.phase = Phase::Closed;
        }
        was_active
    }

    /// Paints the current state if a frame was requested.
    pub fn render<Su: Surface<Snapshot = S>>(&mut self, surface: &mut Su) -> bool {
        if !self.redraw.take() {
            return false;
        }
        render_frame(
            surface,
            &FrameView {
                model: &self.model,
                snapshot: self.snapshot.as_ref(),
                width: self.width,
                height: self.height,
            },
        );
        true
    }
}

/// Drives a [`Cropper`] against the page and the crop backend. Lives in an
/// `Rc`; no `RefCell` borrow is held across an await point.
pub struct SessionManager<H: Host, A: CropApi> {
    cropper: RefCell<Cropper<SnapshotOf<H>>>,
    host: H,
    api: A,
}

impl<H, A> SessionManager<H, A>
where
    H: Host + 'static,
    A: CropApi + 'static,
{
    pub fn new(host: H, api: A) -> Rc<Self> {
        let mut cropper = Cropper::new();
        cropper.initialize();
        Rc::new(Self {
            cropper: RefCell::new(cropper),
            host,
            api,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cropper(&self) -> Ref<'_, Cropper<SnapshotOf<H>>> {
        self.cropper.borrow()
    }

    fn schedule(self: &Rc<Self>, needed: bool) {
        if !needed {
            return;
        }
        let manager = Rc::downgrade(self);
        self.host.request_frame(Box::new(move || {
            if let Some(manager) = manager.upgrade() {
                manager.render_frame();
            }
        }));
    }

    pub fn render_frame(&self) -> bool {
        let mut surface = self.host.surface();
        self.cropper.borrow_mut().render(&mut *surface)
    }

    pub fn press(self: &Rc<Self>, point: Point) {
        let needed = self.cropper.borrow_mut().press(point);
        self.schedule(needed);
    }

    pub fn drag_to(self: &Rc<Self>, point: Point) {
        let needed = self.cropper.borrow_mut().drag_to(point);
        self.schedule(needed);
    }

    pub fn release(self: &Rc<Self>) {
        let needed = self.cropper.borrow_mut().release();
        self.schedule(needed);
    }

    pub fn double_press(self: &Rc<Self>) {
        let needed = self.cropper.borrow_mut().double_press();
        self.schedule(needed);
    }

    pub fn close_path(self: &Rc<Self>) {
        let needed = self.cropper.borrow_mut().close_path();
        self.schedule(needed);
    }

    pub fn undo_last_point(self: &Rc<Self>) {
        let needed = self.cropper.borrow_mut().undo_last_point();
        self.schedule(needed);
    }

    pub fn clear_path(self: &Rc<Self>) {
        let needed = self.cropper.borrow_mut().clear_path();
        self.schedule(needed);
    }

    pub fn set_mode(self: &Rc<Self>, mode: DrawingMode) {
        let needed = self.cropper.borrow_mut().set_mode(mode);
        self.schedule(needed);
    }

    pub async fn open(
        self: &Rc<Self>,
        session_id: String,
        image_source: &str,
        config: CropConfig,
    ) -> Result<(), CropError> {
        let (generation, replaced) = self.cropper.borrow_mut().begin_open(session_id, config);
        if replaced {
            self.host.dismiss();
        }

        let image = match self.host.decode_image(image_source).await {
            Ok(image) => image,
            Err(error) => {
                if self.cropper.borrow_mut().abort_open(generation) {
                    warn!("{error}");
                    self.host.alert(&error.to_string());
                }
                return Err(error);
            }
        };

        let (width, height) = self.host.image_size(&image);
        let opened = self
            .cropper
            .borrow_mut()
            .finish_open(generation, width, height, || self.host.capture(&image));
        match opened {
            Ok(Opened::Ready { frame }) => {
                let mode = self.cropper.borrow().mode();
                self.host.present(mode);
                self.schedule(frame);
                Ok(())
            }
            Ok(Opened::Superseded) => Ok(()),
            Err(error) => {
                self.host.alert(&error.to_string());
                Err(error)
            }
        }
    }

    pub async fn submit(self: &Rc<Self>) -> Result<SubmitOutcome, CropError> {
        let begun = self.cropper.borrow_mut().begin_submit();
        let (generation, request) = match begun {
            Ok(Some(begun)) => begun,
            Ok(None) => return Ok(SubmitOutcome::Ignored),
            Err(error) => {
                self.host.alert(&error.to_string());
                return Err(error);
            }
        };
        info!(
            "Submitting {} points for session {}",
            request.path_points.len(),
            request.session_id
        );

        let reply = self.api.apply(&request).await;
        let resolution = self.cropper.borrow_mut().finish_submit(generation, &reply);
        match (resolution, reply) {
            (SubmitResolution::Done, Ok(ack)) => {
                self.teardown();
                Ok(SubmitOutcome::Applied(ack))
            }
            (SubmitResolution::Retry, Err(error)) => {
                warn!("Apply request failed: {error}");
                self.host.alert(&error.to_string());
                Err(error)
            }
            _ => Ok(SubmitOutcome::Superseded),
        }
    }

    /// Best-effort cancel: the endpoint is notified when a session is
    /// active, failures are only logged, and local state is torn down either
    /// way.
    pub async fn cancel(self: &Rc<Self>) {
        let begun = self.cropper.borrow_mut().begin_cancel();
        let Some((generation, request)) = begun else {
            self.teardown();
            return;
        };
        if let Err(error) = self.api.cancel(&request).await {
            warn!(
                "Failed to notify cancel for session {}: {error}",
                request.session_id
            );
        }
        if self.cropper.borrow().is_current(generation) {
            self.teardown();
        }
    }

    /// Closes the session locally when the backend has already given up on
    /// it.
    pub fn expire(self: &Rc<Self>, session_id: &str) {
        if !self.cropper.borrow().matches_session(session_id) {
            return;
        }
        info!("Crop session {session_id} expired");
        self.teardown();
    }

    fn teardown(&self) {
        let was_active = self.cropper.borrow_mut().cleanup();
        if was_active {
            self.host.dismiss();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block_on, Op, Reply, ScriptedApi, Snapshot, TestHost};
    use polycrop_shared::BackgroundFill;

    type Manager = Rc<SessionManager<TestHost, ScriptedApi>>;

    fn manager() -> Manager {
        SessionManager::new(TestHost::default(), ScriptedApi::default())
    }

    fn config(mode: DrawingMode) -> CropConfig {
        CropConfig {
            crop_mode: mode,
            ..CropConfig::default()
        }
    }

    fn opened(mode: DrawingMode) -> Manager {
        let manager = manager();
        block_on(manager.open("node-7".into(), "64x48", config(mode))).unwrap();
        manager.host().run_frames();
        manager
    }

    fn triangle(manager: &Manager) {
        for point in [Point::new(10, 10), Point::new(50, 10), Point::new(50, 40)] {
            manager.press(point);
        }
    }

    #[test]
    fn starts_uninitialized_until_initialized() {
        let mut cropper: Cropper<Snapshot> = Cropper::new();
        assert_eq!(cropper.phase(), Phase::Uninitialized);
        cropper.initialize();
        assert_eq!(cropper.phase(), Phase::Ready);
        cropper.initialize();
        assert_eq!(cropper.phase(), Phase::Ready);
    }

    #[test]
    fn open_sizes_canvas_captures_and_presents() {
        let manager = opened(DrawingMode::FreeDraw);
        let cropper = manager.cropper();
        assert_eq!(cropper.phase(), Phase::Open);
        assert_eq!(cropper.canvas_size(), (64, 48));
        assert_eq!(cropper.snapshot(), Some(&Snapshot(64 * 48)));
        assert_eq!(cropper.mode(), DrawingMode::FreeDraw);
        assert_eq!(cropper.session_id(), Some("node-7"));
        assert_eq!(*manager.host().presented.borrow(), vec![DrawingMode::FreeDraw]);
        let ops = manager.host().surface.borrow().ops.clone();
        assert_eq!(ops[..2], [Op::Clear(64.0, 48.0), Op::Snapshot(64 * 48)]);
    }

    #[test]
    fn open_keeps_remaining_config() {
        let manager = manager();
        let config = CropConfig {
            crop_mode: DrawingMode::Polygon,
            background_fill: BackgroundFill::Blur,
            edge_smooth: 4,
            auto_crop: false,
            crop_padding: 0,
        };
        block_on(manager.open("n".into(), "8x8", config.clone())).unwrap();
        assert_eq!(manager.cropper().config(), &config);
    }

    #[test]
    fn oversized_image_is_rejected_before_touching_the_canvas() {
        let manager = manager();
        let result = block_on(manager.open("n".into(), "5000x5000", CropConfig::default()));
        assert_eq!(
            result,
            Err(CropError::ResourceLimit {
                width: 5000,
                height: 5000
            })
        );
        let cropper = manager.cropper();
        assert_eq!(cropper.canvas_size(), (0, 0));
        assert!(cropper.snapshot().is_none());
        assert_ne!(cropper.phase(), Phase::Open);
        assert_eq!(manager.host().captures.get(), 0);
        assert!(manager.host().presented.borrow().is_empty());
        assert_eq!(manager.host().alerts.borrow().len(), 1);
    }

    #[test]
    fn area_at_the_ceiling_is_accepted() {
        let manager = manager();
        block_on(manager.open("n".into(), "4096x4096", CropConfig::default())).unwrap();
        assert_eq!(manager.cropper().phase(), Phase::Open);
    }

    #[test]
    fn undecodable_image_reports_and_stays_closed() {
        let manager = manager();
        let result = block_on(manager.open("n".into(), "broken", CropConfig::default()));
        assert!(matches!(result, Err(CropError::AssetLoad(_))));
        assert_eq!(manager.cropper().phase(), Phase::Closed);
        assert_eq!(manager.host().alerts.borrow().len(), 1);
        assert!(manager.host().presented.borrow().is_empty());
    }

    #[test]
    fn input_is_ignored_until_open() {
        let manager = manager();
        manager.press(Point::new(1, 1));
        manager.set_mode(DrawingMode::FreeDraw);
        assert!(manager.cropper().model().path.is_empty());
        assert_eq!(manager.host().pending_frames(), 0);
    }

    #[test]
    fn polygon_scenario_renders_closed_fill() {
        let manager = opened(DrawingMode::Polygon);
        triangle(&manager);
        manager.close_path();
        manager.host().run_frames();
        let cropper = manager.cropper();
        assert_eq!(
            cropper.model().path.points(),
            &[Point::new(10, 10), Point::new(50, 10), Point::new(50, 40)]
        );
        assert!(cropper.model().path.is_closed());
        let ops = manager.host().surface.borrow().ops.clone();
        assert!(ops.contains(&Op::ClosePath));
        assert!(ops.contains(&Op::FillColor(crate::render::PATH_FILL.into())));
    }

    #[test]
    fn mutations_between_frames_render_once_with_last_state() {
        let manager = opened(DrawingMode::Polygon);
        manager.host().surface.borrow_mut().ops.clear();
        triangle(&manager);
        manager.undo_last_point();
        manager.press(Point::new(30, 30));
        assert_eq!(manager.host().pending_frames(), 1);
        assert_eq!(manager.host().run_frames(), 1);

        let ops = manager.host().surface.borrow().ops.clone();
        assert_eq!(ops.iter().filter(|op| matches!(op, Op::Clear(..))).count(), 1);
        assert!(ops.contains(&Op::LineTo(30.0, 30.0)));
        assert!(!ops.contains(&Op::LineTo(50.0, 40.0)));
    }

    #[test]
    fn frame_after_cleanup_draws_nothing_stale() {
        let manager = opened(DrawingMode::Polygon);
        triangle(&manager);
        block_on(manager.cancel());
        manager.host().surface.borrow_mut().ops.clear();
        manager.host().run_frames();
        let ops = manager.host().surface.borrow().ops.clone();
        assert!(!ops.iter().any(|op| matches!(op, Op::Snapshot(_) | Op::LineTo(..))));
    }

    #[test]
    fn switching_mode_clears_path() {
        let manager = opened(DrawingMode::Polygon);
        triangle(&manager);
        manager.close_path();
        manager.set_mode(DrawingMode::FreeDraw);
        let cropper = manager.cropper();
        assert!(cropper.model().path.is_empty());
        assert!(!cropper.model().path.is_closed());
        assert_eq!(cropper.mode(), DrawingMode::FreeDraw);
    }

    #[test]
    fn free_draw_drag_is_simplified_into_path() {
        let manager = opened(DrawingMode::FreeDraw);
        manager.press(Point::new(0, 20));
        for i in 1..20 {
            manager.drag_to(Point::new(i * 3, 20));
        }
        manager.release();
        let cropper = manager.cropper();
        assert_eq!(
            cropper.model().path.points(),
            &[Point::new(0, 20), Point::new(57, 20)]
        );
        assert!(cropper.model().stroke().is_empty());
    }

    #[test]
    fn submit_with_two_points_is_a_validation_error_without_network() {
        let manager = opened(DrawingMode::Polygon);
        manager.press(Point::new(1, 1));
        manager.press(Point::new(5, 5));
        let result = block_on(manager.submit());
        assert!(matches!(result, Err(CropError::Validation(_))));
        assert!(manager.api().apply_calls.borrow().is_empty());
        assert_eq!(manager.cropper().phase(), Phase::Open);
        assert_eq!(manager.cropper().model().path.len(), 2);
        assert_eq!(manager.host().alerts.borrow().len(), 1);
    }

    #[test]
    fn submit_sends_path_and_tears_down() {
        let manager = opened(DrawingMode::Polygon);
        manager.api().push_apply(Reply::Ack(Ack::ok()));
        triangle(&manager);
        let outcome = block_on(manager.submit()).unwrap();
        assert_eq!(outcome, SubmitOutcome::Applied(Ack::ok()));

        let calls = manager.api().apply_calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].session_id, "node-7");
        assert_eq!(calls[0].path_points.len(), 3);
        assert_eq!((calls[0].image_width, calls[0].image_height), (64, 48));
        assert_eq!(calls[0].drawing_mode, DrawingMode::Polygon);

        let cropper = manager.cropper();
        assert_eq!(cropper.phase(), Phase::Closed);
        assert!(cropper.model().path.is_empty());
        assert!(cropper.snapshot().is_none());
        assert_eq!(manager.host().dismissed.get(), 1);
    }

    #[test]
    fn submit_truncates_to_first_two_thousand_points() {
        let manager = opened(DrawingMode::Polygon);
        manager.api().push_apply(Reply::Ack(Ack::ok()));
        for i in 0..2500 {
            manager.press(Point::new(i % 64, i / 64));
        }
        block_on(manager.submit()).unwrap();
        let calls = manager.api().apply_calls.borrow();
        assert_eq!(calls[0].path_points.len(), MAX_SUBMIT_POINTS);
        assert_eq!(calls[0].path_points[1999], Point::new(1999 % 64, 1999 / 64));
    }

    #[test]
    fn backend_refusal_still_closes_the_session() {
        let manager = opened(DrawingMode::Polygon);
        manager.api().push_apply(Reply::Ack(Ack::failed("node data not found")));
        triangle(&manager);
        let outcome = block_on(manager.submit()).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Applied(Ack { success: false, .. })));
        assert_eq!(manager.cropper().phase(), Phase::Closed);
        assert!(manager.host().alerts.borrow().is_empty());
    }

    #[test]
    fn transport_failure_keeps_session_open_for_retry() {
        let manager = opened(DrawingMode::Polygon);
        manager.api().push_apply(Reply::Fail("connection reset".into()));
        manager.api().push_apply(Reply::Ack(Ack::ok()));
        triangle(&manager);

        let first = block_on(manager.submit());
        assert_eq!(first, Err(CropError::Transport("connection reset".into())));
        assert_eq!(manager.cropper().phase(), Phase::Open);
        assert_eq!(manager.cropper().model().path.len(), 3);
        assert_eq!(manager.host().alerts.borrow().len(), 1);

        let second = block_on(manager.submit()).unwrap();
        assert_eq!(second, SubmitOutcome::Applied(Ack::ok()));
        assert_eq!(manager.api().apply_calls.borrow().len(), 2);
    }

    #[test]
    fn unanswered_submit_stays_submitting_until_cancelled() {
        // No timeout is applied to the apply request; only an explicit
        // cancel gets the user out.
        let manager = opened(DrawingMode::Polygon);
        manager.api().push_apply(Reply::Hang);
        triangle(&manager);
        block_on(async {
            let mut submit = Box::pin(manager.submit());
            assert!(futures::poll!(submit.as_mut()).is_pending());
            assert_eq!(manager.cropper().phase(), Phase::Submitting);

            // A second submit while one is in flight does nothing.
            assert_eq!(manager.submit().await, Ok(SubmitOutcome::Ignored));
            assert_eq!(manager.api().apply_calls.borrow().len(), 1);

            manager.cancel().await;
            assert_eq!(manager.cropper().phase(), Phase::Closed);
            assert!(futures::poll!(submit.as_mut()).is_pending());
        });
        assert_eq!(manager.api().cancel_calls.borrow().len(), 1);
    }

    #[test]
    fn late_submit_reply_after_cancel_is_ignored() {
        let mut cropper: Cropper<Snapshot> = Cropper::new();
        let (generation, _) = cropper.begin_open("n".into(), CropConfig::default());
        cropper
            .finish_open(generation, 10, 10, || Ok(Snapshot(1)))
            .unwrap();
        for point in [Point::new(0, 0), Point::new(5, 0), Point::new(5, 5)] {
            cropper.press(point);
        }
        let (submit_generation, _) = cropper.begin_submit().unwrap().unwrap();
        assert!(cropper.begin_cancel().is_some());
        cropper.cleanup();
        assert_eq!(
            cropper.finish_submit(submit_generation, &Ok(Ack::ok())),
            SubmitResolution::Superseded
        );
        assert_eq!(cropper.phase(), Phase::Closed);
    }

    #[test]
    fn cancel_notifies_then_cleans_up() {
        let manager = opened(DrawingMode::FreeDraw);
        manager.press(Point::new(2, 2));
        block_on(manager.cancel());
        let calls = manager.api().cancel_calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].session_id, "node-7");
        let cropper = manager.cropper();
        assert_eq!(cropper.phase(), Phase::Closed);
        assert!(cropper.model().stroke().is_empty());
        assert!(!cropper.model().is_dragging());
        assert!(cropper.session_id().is_none());
        assert_eq!(manager.host().dismissed.get(), 1);
    }

    #[test]
    fn failed_cancel_is_swallowed() {
        let manager = opened(DrawingMode::Polygon);
        manager.api().fail_cancel.set(true);
        block_on(manager.cancel());
        assert_eq!(manager.cropper().phase(), Phase::Closed);
        assert!(manager.host().alerts.borrow().is_empty());
        assert_eq!(manager.host().dismissed.get(), 1);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let manager = opened(DrawingMode::Polygon);
        block_on(manager.cancel());
        block_on(manager.cancel());
        block_on(manager.cancel());
        assert_eq!(manager.api().cancel_calls.borrow().len(), 1);
        assert_eq!(manager.host().dismissed.get(), 1);
    }

    #[test]
    fn cancel_without_session_sends_nothing() {
        let manager = manager();
        block_on(manager.cancel());
        assert!(manager.api().cancel_calls.borrow().is_empty());
        assert_eq!(manager.host().dismissed.get(), 0);
    }

    #[test]
    fn expiry_closes_only_the_matching_session() {
        let manager = opened(DrawingMode::Polygon);
        manager.expire("other");
        assert_eq!(manager.cropper().phase(), Phase::Open);
        manager.expire("node-7");
        assert_eq!(manager.cropper().phase(), Phase::Closed);
        assert!(manager.api().cancel_calls.borrow().is_empty());
    }

    #[test]
    fn reopen_replaces_previous_session() {
        let manager = opened(DrawingMode::Polygon);
        triangle(&manager);
        block_on(manager.open("node-8".into(), "32x32", config(DrawingMode::FreeDraw))).unwrap();
        let cropper = manager.cropper();
        assert_eq!(cropper.session_id(), Some("node-8"));
        assert_eq!(cropper.canvas_size(), (32, 32));
        assert!(cropper.model().path.is_empty());
        assert_eq!(manager.host().dismissed.get(), 1);
    }

    #[test]
    fn superseded_image_load_is_dropped() {
        let mut cropper: Cropper<Snapshot> = Cropper::new();
        let (first, _) = cropper.begin_open("a".into(), CropConfig::default());
        let (second, replaced) = cropper.begin_open("b".into(), CropConfig::default());
        assert!(replaced);
        assert_eq!(
            cropper.finish_open(first, 10, 10, || Ok(Snapshot(1))),
            Ok(Opened::Superseded)
        );
        assert!(cropper.snapshot().is_none());
        assert!(matches!(
            cropper.finish_open(second, 10, 10, || Ok(Snapshot(2))),
            Ok(Opened::Ready { .. })
        ));
        assert_eq!(cropper.snapshot(), Some(&Snapshot(2)));
    }
}
