//! Contract of the coordination service the watch layer sits on.
//!
//! The service itself (wire protocol, consensus, session handshake) lives
//! outside this crate. [`CoordinationClient`] lists the operations the
//! watch coordinator needs, and [`Notification`] is what the client pushes
//! back on its single, sequential notification channel.

mod session;
pub use session::*;


use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Node lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateMode {
    /// Survives the session that created it
    Persistent,
    /// Deleted by the service when the creating session ends
    Ephemeral,
}

/// Coarse connectivity signal reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    SyncConnected,
    ConnectedReadOnly,
    Disconnected,
    Expired,
    AuthFailed,
    Closed,
}

impl SessionState {
    /// Only these states accept a [`StateListener`](crate::StateListener).
    pub fn is_listenable(&self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Expired)
    }
}

/// Which one-shot watch fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// Data watch armed by `get_data(path, true)`
    Data,
    /// Child watch armed by `get_children(path, true)`
    Children,
}

/// Item of the client's notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Watch { path: String, kind: WatchKind },
    State(SessionState),
}

/// Operations the watch coordinator requires from the coordination service.
///
/// Every call with `watch = true` atomically returns the current state and
/// arms exactly one future notification for that path.
#[cfg_attr(test, automock)]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Whether the session is established and usable
    fn is_alive(&self) -> bool;

    fn exists(
        &self,
        path: &str,
    ) -> Result<bool>;

    fn get_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Bytes>;

    fn set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<()>;

    fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>>;

    /// Returns the path actually created.
    fn create(
        &self,
        path: &str,
        data: Bytes,
        mode: CreateMode,
    ) -> Result<String>;

    fn delete(
        &self,
        path: &str,
    ) -> Result<()>;

    /// Cancels an outstanding data watch on `path`.
    ///
    /// The default issues a final unwatched read; clients with a real
    /// unwatch primitive should override it.
    fn remove_data_watch(
        &self,
        path: &str,
    ) -> Result<()> {
        self.get_data(path, false).map(|_| ())
    }

    /// Establishes a new session after the previous one was lost.
    fn reconnect(&self) -> Result<()>;
}
