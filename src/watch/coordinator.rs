//! Watch Coordinator
//!
//! Turns the service's one-shot watches into durable subscriptions. Owns
//! the watch registry, the stubborn-node registry, the session-state
//! registry and the dispatcher, and drives them from three directions:
//!
//! ```text
//! application ── listen / unlisten / mark_stubborn / listen_state
//!                      │
//! notification ── on_notification ─┬─ data_change(path)    ── get_data(watch)     ─┐
//!   channel                        ├─ child_change(path)   ── get_children(watch) ─┤ diff
//!                                  └─ notify_state(state)                          │
//!                                                                                  ▼
//! reconnection ── relisten ── re-arm all + recreate stubborn nodes         Dispatcher ─► Listener
//! ```
//!
//! Fire handlers block only for the round-trip that re-arms the watch;
//! listeners always run on the dispatcher, except the creations of the very
//! first pass after `listen`, which are delivered on the caller's thread.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::diff::diff_children;
use super::diff::Delivery;
use super::registry::Subscription;
use super::registry::WatchRegistry;
use super::state::StateRegistry;
use super::stubborn::StubbornNode;
use super::stubborn::StubbornRegistry;
use super::Dispatcher;
use super::Listener;
use super::StateListener;
use super::WatchEvent;
use crate::utils::child_path;
use crate::CoordinationClient;
use crate::CreateMode;
use crate::Error;
use crate::Notification;
use crate::Result;
use crate::SessionState;
use crate::WatchKeeperConfig;
use crate::WatchKind;

/// Events produced by one child pass, ready for delivery
#[derive(Debug, Default)]
struct PassEvents {
    created: Vec<WatchEvent>,
    deleted: Vec<WatchEvent>,
}

pub struct WatchCoordinator<C: CoordinationClient> {
    client: Arc<C>,
    registry: WatchRegistry,
    stubborn: StubbornRegistry,
    states: StateRegistry,
    dispatcher: Dispatcher,
    fail_fast: bool,
}

impl<C: CoordinationClient> std::fmt::Debug for WatchCoordinator<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("child_watches", &self.registry.child_watch_count())
            .field("data_watches", &self.registry.data_watch_count())
            .field("stubborn_nodes", &self.stubborn.len())
            .field("states", &self.states)
            .field("dispatcher", &self.dispatcher)
            .field("fail_fast", &self.fail_fast)
            .finish_non_exhaustive()
    }
}

impl<C: CoordinationClient> WatchCoordinator<C> {
    pub fn new(
        client: Arc<C>,
        config: &WatchKeeperConfig,
    ) -> Self {
        Self {
            client,
            registry: WatchRegistry::new(),
            stubborn: StubbornRegistry::new(),
            states: StateRegistry::new(),
            dispatcher: Dispatcher::new(config.dispatcher.worker_pool_size),
            fail_fast: config.recovery.fail_fast,
        }
    }

    /// Coordinator with default settings (two dispatcher workers).
    pub fn with_defaults(client: Arc<C>) -> Self {
        Self::new(client, &WatchKeeperConfig::default())
    }

    /// Subscribes `listener` to `path`.
    ///
    /// With `watch_children` or `watch_child_data` set, the current children
    /// are reported as `Created` events on this thread before returning, and
    /// later child creations/deletions are dispatched. With
    /// `watch_child_data`, every child's data changes are reported as well.
    /// With neither flag the node's own data is watched and its current value
    /// is dispatched as a first `DataChanged`.
    pub fn listen(
        &self,
        path: &str,
        listener: Arc<dyn Listener>,
        watch_children: bool,
        watch_child_data: bool,
    ) -> Result<()> {
        self.ensure_alive()?;
        if !self.client.exists(path).map_err(|e| Error::operation("exists", path, e))? {
            return Err(Error::PathNotFound(path.to_string()));
        }

        if watch_children || watch_child_data {
            let subscription = self.registry.register_children(
                path,
                Subscription::children(listener, watch_children, watch_child_data),
            );
            if let Err(e) = self.child_change(path, true) {
                self.registry.remove_children_if_same(path, &subscription);
                return Err(e);
            }
        } else {
            let subscription = self.registry.register_data(path, Subscription::data(listener));
            if let Err(e) = self.data_change(path) {
                self.registry.remove_data_if_same(path, &subscription);
                return Err(e);
            }
        }

        info!(path, watch_children, watch_child_data, "listening");
        Ok(())
    }

    /// Drops the subscription of `path` and cancels its outstanding watches.
    ///
    /// The registry is cleaned up before any round-trip, so the subscription
    /// is gone even when cancelling the watches fails; the first such failure
    /// is returned afterwards. Missing paths only clean up the registry.
    pub fn unlisten(
        &self,
        path: &str,
        watch_children: bool,
        watch_child_data: bool,
    ) -> Result<()> {
        if watch_children || watch_child_data {
            let mut child_data = watch_child_data;
            if let Some(subscription) = self.registry.remove_children(path) {
                child_data |= subscription.watches_child_data();
                if child_data {
                    // Waits for an in-flight pass, whose registrations land in the known set.
                    let known: Vec<String> = subscription.known_children().lock().iter().cloned().collect();
                    for name in known {
                        self.registry.remove_data(&child_path(path, &name));
                    }
                }
            }
            if child_data {
                self.cancel_child_data_watches(path)?;
            }
        } else {
            self.registry.remove_data(path);
            if self.client.exists(path).map_err(|e| Error::operation("exists", path, e))? {
                self.client
                    .remove_data_watch(path)
                    .map_err(|e| Error::operation("remove_data_watch", path, e))?;
            }
        }

        info!(path, watch_children, watch_child_data, "unlistened");
        Ok(())
    }

    fn cancel_child_data_watches(
        &self,
        path: &str,
    ) -> Result<()> {
        if !self.client.exists(path).map_err(|e| Error::operation("exists", path, e))? {
            return Ok(());
        }
        let children = self
            .client
            .get_children(path, false)
            .map_err(|e| Error::operation("get_children", path, e))?;

        let mut first_error = None;
        for name in children {
            let child = child_path(path, &name);
            self.registry.remove_data(&child);
            if let Err(e) = self.client.remove_data_watch(&child) {
                warn!(path = %child, "cannot cancel child data watch: {e}");
                first_error.get_or_insert(Error::operation("remove_data_watch", &child, e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Handles a data watch fire: re-arms the watch and dispatches the new data.
    ///
    /// When the node itself is gone, a plain data subscription receives a
    /// final `Deleted` event and is dropped; a child's data subscription is
    /// left to its parent's diff.
    pub fn data_change(
        &self,
        path: &str,
    ) -> Result<()> {
        let Some(subscription) = self.registry.data(path) else {
            trace!(path, "data fire without subscription, ignored");
            return Ok(());
        };

        let data = match self.client.get_data(path, true) {
            Ok(data) => data,
            Err(e) if e.is_not_found() && subscription.parent_managed() => {
                debug!(path, "watched child is gone, left to the parent diff");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                // No watch can be armed on a missing node: the subscription ends here.
                self.registry.remove_data_if_same(path, &subscription);
                self.dispatcher
                    .submit(subscription.listener().clone(), WatchEvent::deleted(path.to_string()));
                info!(path, "watched node deleted, subscription dropped");
                return Ok(());
            }
            Err(e) => return Err(Error::operation("get_data", path, e)),
        };

        self.dispatcher
            .submit(subscription.listener().clone(), WatchEvent::data_changed(path.to_string(), data));
        debug!(path, "node data change");
        Ok(())
    }

    /// Handles a child watch fire: re-arms the watch, diffs the new child list
    /// against the known one and delivers the resulting events.
    ///
    /// `initial` is true only for the pass run by `listen`.
    pub fn child_change(
        &self,
        path: &str,
        initial: bool,
    ) -> Result<()> {
        let Some(subscription) = self.registry.children(path) else {
            trace!(path, "child fire without subscription, ignored");
            return Ok(());
        };

        let events = {
            let mut known = subscription.known_children().lock();
            if !self.registry.is_current_children(path, &subscription) {
                trace!(path, "child subscription removed meanwhile, pass skipped");
                return Ok(());
            }
            let snapshot = self
                .client
                .get_children(path, true)
                .map_err(|e| Error::operation("get_children", path, e))?;
            let diff = diff_children(&mut known, &snapshot);
            if diff.is_empty() {
                trace!(path, "child list unchanged");
                return Ok(());
            }

            let mut events = PassEvents::default();
            for name in diff.created {
                let child = child_path(path, &name);
                match self.client.get_data(&child, subscription.watches_child_data()) {
                    Ok(data) => {
                        if subscription.watches_child_data() {
                            self.registry
                                .register_data(&child, Subscription::child_data(subscription.listener().clone()));
                        }
                        debug!(path, child = %name, "child change, type: node-create");
                        events.created.push(WatchEvent::created(child, data));
                    }
                    Err(e) => {
                        // Vanished between the list and the read; the next pass sees it again.
                        warn!(path, child = %name, "cannot read created child, skipped: {e}");
                        known.remove(&name);
                    }
                }
            }
            for name in diff.deleted {
                let child = child_path(path, &name);
                if subscription.watches_child_data() {
                    self.registry.remove_data(&child);
                }
                debug!(path, child = %name, "child change, type: node-delete");
                events.deleted.push(WatchEvent::deleted(child));
            }
            events
        };

        self.deliver(subscription.listener(), events, Delivery::for_pass(initial));
        Ok(())
    }

    fn deliver(
        &self,
        listener: &Arc<dyn Listener>,
        events: PassEvents,
        delivery: Delivery,
    ) {
        for event in events.created {
            match delivery {
                Delivery::Inline => {
                    if let Err(e) = listener.on_event(&event) {
                        warn!(path = %event.path, "listener failed on initial event: {e}");
                    }
                }
                Delivery::Dispatched => self.dispatcher.submit(listener.clone(), event),
            }
        }
        for event in events.deleted {
            self.dispatcher.submit(listener.clone(), event);
        }
    }

    /// Re-arms every subscription and recreates every stubborn node.
    ///
    /// Call once after each successful reconnection. Child subscriptions are
    /// re-diffed against their retained known set, so only changes that
    /// happened while disconnected produce events.
    pub fn relisten(&self) -> Result<()> {
        let mut failed = Vec::new();

        for path in self.registry.data_paths() {
            match self.data_change(&path) {
                Ok(()) => debug!(path = %path, "relisten data node"),
                Err(e) => self.recovery_failure(&path, e, &mut failed)?,
            }
        }

        for path in self.registry.child_paths() {
            match self.child_change(&path, false) {
                Ok(()) => debug!(path = %path, "relisten child node"),
                Err(e) => self.recovery_failure(&path, e, &mut failed)?,
            }
        }

        for node in self.stubborn.nodes() {
            match self.recreate(&node) {
                Ok(()) => debug!(path = node.path(), "recreate stubborn node"),
                Err(e) => self.recovery_failure(node.path(), e, &mut failed)?,
            }
        }

        if failed.is_empty() {
            info!("relisten completed");
            Ok(())
        } else {
            warn!(?failed, "relisten completed with failures");
            Err(Error::RecoveryIncomplete { failed })
        }
    }

    fn recreate(
        &self,
        node: &StubbornNode,
    ) -> Result<()> {
        match self.client.create(node.path(), node.data().clone(), CreateMode::Ephemeral) {
            Ok(_) => Ok(()),
            // The old session may still be alive server side.
            Err(e) if e.is_node_exists() => {
                debug!(path = node.path(), "stubborn node still present");
                Ok(())
            }
            Err(e) => Err(Error::operation("create", node.path(), e)),
        }
    }

    fn recovery_failure(
        &self,
        path: &str,
        error: Error,
        failed: &mut Vec<String>,
    ) -> Result<()> {
        if self.fail_fast {
            return Err(error);
        }
        warn!(path, "relisten failed: {error}");
        failed.push(path.to_string());
        Ok(())
    }

    /// Remembers an ephemeral node to recreate after every reconnection.
    pub fn mark_stubborn(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<()> {
        self.stubborn.mark(path, data)
    }

    /// Stops recreating `path`; returns whether it was marked.
    pub fn unmark_stubborn(
        &self,
        path: &str,
    ) -> bool {
        self.stubborn.unmark(path).is_some()
    }

    pub fn stubborn_nodes(&self) -> Vec<StubbornNode> {
        self.stubborn.nodes()
    }

    pub fn stubborn_node(
        &self,
        path: &str,
    ) -> Option<StubbornNode> {
        self.stubborn.get(path)
    }

    /// Binds `listener` to `state` (`Disconnected` or `Expired` only).
    pub fn listen_state(
        &self,
        state: SessionState,
        listener: Arc<dyn StateListener>,
    ) -> Result<()> {
        self.states.bind(state, listener)
    }

    pub fn unlisten_state(
        &self,
        state: SessionState,
    ) -> Result<()> {
        self.states.unbind(state)
    }

    pub fn is_listening_state(
        &self,
        state: SessionState,
    ) -> bool {
        self.states.is_bound(state)
    }

    /// Invokes the listener bound to `state`, if any.
    pub fn notify_state(
        &self,
        state: SessionState,
    ) {
        self.states.notify(state);
    }

    /// Entry point for the client's notification channel.
    ///
    /// Errors are logged; there is no caller to surface them to.
    pub fn on_notification(
        &self,
        notification: Notification,
    ) {
        match notification {
            Notification::Watch { path, kind: WatchKind::Data } => {
                if let Err(e) = self.data_change(&path) {
                    warn!(path = %path, "listener data change error: {e}");
                }
            }
            Notification::Watch {
                path,
                kind: WatchKind::Children,
            } => {
                if let Err(e) = self.child_change(&path, false) {
                    warn!(path = %path, "listener child change error: {e}");
                }
            }
            Notification::State(state) => self.notify_state(state),
        }
    }

    pub fn is_listening_children(
        &self,
        path: &str,
    ) -> bool {
        self.registry.children(path).is_some()
    }

    pub fn is_listening_data(
        &self,
        path: &str,
    ) -> bool {
        self.registry.data(path).is_some()
    }

    /// Number of child and data subscriptions, in that order
    pub fn watch_counts(&self) -> (usize, usize) {
        (self.registry.child_watch_count(), self.registry.data_watch_count())
    }

    /// Children the last diff pass of `path` observed, sorted
    pub fn known_children(
        &self,
        path: &str,
    ) -> Option<Vec<String>> {
        self.registry.children(path).map(|s| {
            let mut names: Vec<String> = s.known_children().lock().iter().cloned().collect();
            names.sort();
            names
        })
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.client.is_alive() {
            Ok(())
        } else {
            Err(Error::NotConnected("session is not alive".into()))
        }
    }
}
