use std::collections::HashMap;
use std::time::Instant;

use log::{debug, info, warn};
use polycrop_shared::{
    Ack, ApplyRequest, CancelRequest, CropConfig, ServerMessage, MAX_SUBMIT_POINTS,
    MIN_REGION_POINTS,
};

use crate::sessions::{new_session_id, normalize_session_id};
use crate::state::{AppState, Outcome, PendingSession, Selection};

pub fn broadcast(state: &AppState, message: ServerMessage) {
    if state.events.send(message).is_err() {
        debug!("No browser connected; event dropped");
    }
}

/// Registers a new crop request and asks every connected page to show it.
pub async fn open_session(state: &AppState, image_data: String, config: CropConfig) -> String {
    let session_id = new_session_id();
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), PendingSession::new(config.clone()));
    info!("Opened crop session {session_id} ({})", config.crop_mode);
    broadcast(
        state,
        ServerMessage::SessionOpen {
            session_id: session_id.clone(),
            image_data,
            config,
        },
    );
    session_id
}

/// Finds a session by any spelling of its id.
fn lookup<'a>(
    sessions: &'a HashMap<String, PendingSession>,
    session_id: &str,
) -> Option<(String, &'a PendingSession)> {
    let session_id = normalize_session_id(session_id)?;
    let session = sessions.get(&session_id)?;
    Some((session_id, session))
}

pub async fn apply_selection(state: &AppState, request: ApplyRequest) -> Ack {
    let ApplyRequest {
        session_id,
        mut path_points,
        image_width,
        image_height,
        drawing_mode,
    } = request;
    if path_points.len() > MAX_SUBMIT_POINTS {
        info!(
            "Truncating selection for {session_id} from {} to {MAX_SUBMIT_POINTS} points",
            path_points.len()
        );
        path_points.truncate(MAX_SUBMIT_POINTS);
    }

    let sessions = state.sessions.read().await;
    let Some((session_id, session)) = lookup(&sessions, &session_id) else {
        warn!("Apply for unknown session {session_id}");
        return Ack::failed(format!("unknown session {session_id}"));
    };
    if session.is_resolved() {
        return Ack::failed(format!("session {session_id} is already resolved"));
    }
    if path_points.len() < MIN_REGION_POINTS {
        let reason = format!(
            "a selection needs at least {MIN_REGION_POINTS} points, got {}",
            path_points.len()
        );
        warn!("Rejecting selection for {session_id}: {reason}");
        session.resolve(Outcome::Rejected {
            reason: reason.clone(),
        });
        return Ack::failed(reason);
    }

    info!(
        "Applied {} point {drawing_mode} selection to session {session_id}",
        path_points.len()
    );
    session.resolve(Outcome::Applied {
        selection: Selection {
            path_points,
            image_width,
            image_height,
            drawing_mode,
            config: session.config.clone(),
        },
    });
    Ack::ok()
}

pub async fn cancel_session(state: &AppState, request: CancelRequest) -> Ack {
    let sessions = state.sessions.read().await;
    let Some((session_id, session)) = lookup(&sessions, &request.session_id) else {
        warn!("Cancel for unknown session {}", request.session_id);
        return Ack::failed(format!("unknown session {}", request.session_id));
    };
    if session.resolve(Outcome::Cancelled) {
        info!("Crop session {session_id} cancelled");
    }
    Ack::ok()
}

/// Waits for the browser's answer. `None` for unknown sessions. The session
/// is forgotten once an outcome has been handed out; a requester that gives
/// up also closes the dialog.
pub async fn await_outcome(state: &AppState, session_id: &str) -> Option<Outcome> {
    let session_id = &normalize_session_id(session_id)?;
    let mut receiver = {
        let sessions = state.sessions.read().await;
        sessions.get(session_id)?.outcome.subscribe()
    };
    let outcome = match tokio::time::timeout(
        state.result_timeout,
        receiver.wait_for(Option::is_some),
    )
    .await
    {
        Ok(Ok(value)) => value.clone().unwrap_or(Outcome::Timeout),
        Ok(Err(_)) | Err(_) => Outcome::Timeout,
    };

    let removed = state.sessions.write().await.remove(session_id);
    if outcome == Outcome::Timeout {
        warn!("Crop session {session_id} timed out waiting for a selection");
        if removed.is_some_and(|session| !session.is_resolved()) {
            broadcast(
                state,
                ServerMessage::SessionExpired {
                    session_id: session_id.to_string(),
                },
            );
        }
    }
    Some(outcome)
}

/// Drops sessions older than the TTL. Pages still showing one of them are
/// told to close it.
pub async fn expire_sessions(state: &AppState, now: Instant) -> Vec<String> {
    let expired = {
        let mut sessions = state.sessions.write().await;
        let ids = sessions
            .iter()
            .filter(|(_, session)| session.is_expired(now, state.session_ttl))
            .map(|(session_id, _)| session_id.clone())
            .collect::<Vec<_>>();
        ids.into_iter()
            .filter_map(|session_id| {
                let session = sessions.remove(&session_id)?;
                Some((session_id, session.is_resolved()))
            })
            .collect::<Vec<_>>()
    };
    let mut notified = Vec::new();
    for (session_id, resolved) in expired {
        info!("Crop session {session_id} expired");
        if !resolved {
            broadcast(
                state,
                ServerMessage::SessionExpired {
                    session_id: session_id.clone(),
                },
            );
            notified.push(session_id);
        }
    }
    notified
}
