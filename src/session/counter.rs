//! Process-wide tally of open sessions.
//!
//! The tally and the `brokerwire_sessions_active` gauge move together. A
//! session holds one [`OpenSession`] from construction until it closes or
//! its last handle is dropped, whichever comes first.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::id::SessionId;

static OPEN: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
pub(super) struct OpenSession {
    id: SessionId,
}

impl OpenSession {
    pub(super) fn register(id: SessionId) -> Self {
        let open = OPEN.fetch_add(1, Ordering::Relaxed) + 1;
        crate::metrics::inc_sessions();
        debug!(session = %id, open, "session counted");
        Self { id }
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        let open = OPEN.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        crate::metrics::dec_sessions();
        debug!(session = %self.id, open, "session released");
    }
}

/// Sessions currently open in this process, across every connection.
#[must_use]
pub fn active_session_count() -> usize { OPEN.load(Ordering::Relaxed) }
