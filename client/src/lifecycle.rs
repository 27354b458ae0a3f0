//! Page transitions as seen by the crop dialog and the event socket. A page
//! that goes into the back/forward cache comes back later, so only a real
//! unload may discard anything.

/// `persisted` of a `pagehide`/`pageshow` event; unknown counts as a real
/// unload.
pub fn discards_page(persisted: Option<bool>) -> bool {
    !persisted.unwrap_or(false)
}

/// Decides when the event socket reconnects.
#[derive(Debug, Default)]
pub struct SocketLifecycle {
    leaving: bool,
}

impl SocketLifecycle {
    /// The page is navigating away; closes from here on are expected.
    pub fn leave(&mut self) {
        self.leaving = true;
    }

    pub fn is_leaving(&self) -> bool {
        self.leaving
    }

    /// Whether a socket that just closed should be reopened.
    pub fn reconnect_after_close(&self) -> bool {
        !self.leaving
    }

    /// Called on `pageshow`. Returns `true` when a new socket is needed.
    pub fn on_show(&mut self, persisted: Option<bool>, socket_live: bool) -> bool {
        let restored = !discards_page(persisted);
        if restored {
            self.leaving = false;
        }
        restored && !socket_live
    }
}
