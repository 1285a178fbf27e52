use runtime::{SessionEvent, SessionHandle};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub struct AppState {
    session: SessionHandle,
    snapshot_window: Option<usize>,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            snapshot_window: None,
        }
    }

    /// Trailing sample count used by `/snapshot` and the first WebSocket
    /// frame when the client does not ask for one.
    pub fn with_snapshot_window(mut self, window: Option<usize>) -> Self {
        self.snapshot_window = window;
        self
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn snapshot_window(&self) -> Option<usize> {
        self.snapshot_window
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }
}
