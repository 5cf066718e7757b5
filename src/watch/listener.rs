use bytes::Bytes;

use crate::BoxError;
use crate::SessionState;

/// Kind of change reported to a [`Listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A child appeared under a watched parent
    Created,
    /// A child disappeared from a watched parent
    Deleted,
    /// The data of a watched node was (re)read after a fire
    DataChanged,
}

/// Immutable change notification handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Full path of the node the event is about
    pub path: String,
    pub kind: EventKind,
    /// Node data (empty for `Deleted`)
    pub data: Bytes,
}

impl WatchEvent {
    pub fn created(
        path: String,
        data: Bytes,
    ) -> Self {
        Self {
            path,
            kind: EventKind::Created,
            data,
        }
    }

    pub fn deleted(path: String) -> Self {
        Self {
            path,
            kind: EventKind::Deleted,
            data: Bytes::new(),
        }
    }

    pub fn data_changed(
        path: String,
        data: Bytes,
    ) -> Self {
        Self {
            path,
            kind: EventKind::DataChanged,
            data,
        }
    }
}

pub type ListenerResult = std::result::Result<(), BoxError>;

/// Application callback for watch events.
///
/// Errors and panics are caught and logged by the dispatcher worker that
/// invoked the listener.
pub trait Listener: Send + Sync + 'static {
    fn on_event(
        &self,
        event: &WatchEvent,
    ) -> ListenerResult;
}

impl<F> Listener for F
where
    F: Fn(&WatchEvent) -> ListenerResult + Send + Sync + 'static,
{
    fn on_event(
        &self,
        event: &WatchEvent,
    ) -> ListenerResult {
        self(event)
    }
}

/// Application callback for session state transitions.
pub trait StateListener: Send + Sync + 'static {
    fn on_state(
        &self,
        state: SessionState,
    );
}

impl<F> StateListener for F
where
    F: Fn(SessionState) + Send + Sync + 'static,
{
    fn on_state(
        &self,
        state: SessionState,
    ) {
        self(state)
    }
}
