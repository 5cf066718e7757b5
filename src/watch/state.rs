//! Session state listeners

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use tracing::trace;

use super::StateListener;
use crate::Error;
use crate::Result;
use crate::SessionState;

/// One listener per listenable session state
#[derive(Default)]
pub(crate) struct StateRegistry {
    listeners: DashMap<SessionState, Arc<dyn StateListener>>,
}

impl std::fmt::Debug for StateRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let states: Vec<SessionState> = self.listeners.iter().map(|e| *e.key()).collect();
        f.debug_struct("StateRegistry").field("states", &states).finish()
    }
}

impl StateRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Binds `listener` to `state`, replacing any previous one.
    pub(crate) fn bind(
        &self,
        state: SessionState,
        listener: Arc<dyn StateListener>,
    ) -> Result<()> {
        ensure_listenable(state)?;
        self.listeners.insert(state, listener);
        debug!(?state, "state listener bound");
        Ok(())
    }

    pub(crate) fn unbind(
        &self,
        state: SessionState,
    ) -> Result<()> {
        ensure_listenable(state)?;
        self.listeners.remove(&state);
        Ok(())
    }

    /// Invokes the listener bound to `state`, if any.
    pub(crate) fn notify(
        &self,
        state: SessionState,
    ) {
        // Clone out so the map shard is not locked while the listener runs.
        let listener = self.listeners.get(&state).map(|l| l.value().clone());
        match listener {
            Some(listener) => {
                debug!(?state, "notifying state listener");
                listener.on_state(state);
            }
            None => trace!(?state, "no state listener bound"),
        }
    }

    pub(crate) fn is_bound(
        &self,
        state: SessionState,
    ) -> bool {
        self.listeners.contains_key(&state)
    }
}

fn ensure_listenable(state: SessionState) -> Result<()> {
    if state.is_listenable() {
        Ok(())
    } else {
        Err(Error::UnsupportedState(state))
    }
}
