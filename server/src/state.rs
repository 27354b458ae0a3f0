use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use polycrop_shared::{CropConfig, DrawingMode, Point, ServerMessage};
use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};

pub const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, PendingSession>>>,
    pub events: broadcast::Sender<ServerMessage>,
    pub session_ttl: Duration,
    pub result_timeout: Duration,
}

impl AppState {
    pub fn new(session_ttl: Duration, result_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events,
            session_ttl,
            result_timeout,
        }
    }
}

/// The region the user committed, as handed to whatever applies the crop.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Selection {
    pub path_points: Vec<Point>,
    pub image_width: u32,
    pub image_height: u32,
    pub drawing_mode: DrawingMode,
    pub config: CropConfig,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Applied { selection: Selection },
    Cancelled,
    Rejected { reason: String },
    Timeout,
}

/// A crop request waiting for the browser to answer.
pub struct PendingSession {
    pub created_at: Instant,
    pub config: CropConfig,
    pub outcome: watch::Sender<Option<Outcome>>,
}

impl PendingSession {
    pub fn new(config: CropConfig) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            created_at: Instant::now(),
            config,
            outcome,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Records the first outcome; later ones are ignored.
    pub fn resolve(&self, outcome: Outcome) -> bool {
        self.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}
