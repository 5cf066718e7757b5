//! Per-path subscription state
//!
//! Two disjoint keyspaces: the child pool (subscriptions that watch a node's
//! child list, optionally with per-child data) and the data pool (single node
//! data subscriptions, including the ones auto-created for children). A path
//! may live in both.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use super::Listener;

/// Subscription state for one watched path
pub(crate) struct Subscription {
    listener: Arc<dyn Listener>,
    watches_children: bool,
    watches_child_data: bool,
    /// Data subscription created by a parent's child-data watch
    parent_managed: bool,
    /// Children observed by the last diff pass
    ///
    /// Held across fetch + diff so that passes on one path never interleave.
    known_children: Mutex<HashSet<String>>,
}

impl Subscription {
    pub(crate) fn children(
        listener: Arc<dyn Listener>,
        watches_children: bool,
        watches_child_data: bool,
    ) -> Self {
        Self {
            listener,
            watches_children,
            watches_child_data,
            parent_managed: false,
            known_children: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn data(listener: Arc<dyn Listener>) -> Self {
        Self::children(listener, false, false)
    }

    /// Data subscription of a child, owned by the parent's subscription
    pub(crate) fn child_data(listener: Arc<dyn Listener>) -> Self {
        Self {
            parent_managed: true,
            ..Self::data(listener)
        }
    }

    pub(crate) fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    #[cfg(test)]
    pub(crate) fn watches_children(&self) -> bool {
        self.watches_children
    }

    pub(crate) fn watches_child_data(&self) -> bool {
        self.watches_child_data
    }

    pub(crate) fn parent_managed(&self) -> bool {
        self.parent_managed
    }

    pub(crate) fn known_children(&self) -> &Mutex<HashSet<String>> {
        &self.known_children
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("watches_children", &self.watches_children)
            .field("watches_child_data", &self.watches_child_data)
            .field("parent_managed", &self.parent_managed)
            .field("known_children", &self.known_children.lock().len())
            .finish_non_exhaustive()
    }
}

/// Concurrent subscription store owned by the coordinator
#[derive(Debug, Default)]
pub(crate) struct WatchRegistry {
    child_watches: DashMap<String, Arc<Subscription>>,
    data_watches: DashMap<String, Arc<Subscription>>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the child subscription of `path`.
    pub(crate) fn register_children(
        &self,
        path: &str,
        subscription: Subscription,
    ) -> Arc<Subscription> {
        let subscription = Arc::new(subscription);
        self.child_watches.insert(path.to_string(), subscription.clone());
        trace!(path, "child subscription registered");
        subscription
    }

    /// Creates or replaces the data subscription of `path`.
    pub(crate) fn register_data(
        &self,
        path: &str,
        subscription: Subscription,
    ) -> Arc<Subscription> {
        let subscription = Arc::new(subscription);
        self.data_watches.insert(path.to_string(), subscription.clone());
        trace!(path, "data subscription registered");
        subscription
    }

    pub(crate) fn remove_children(
        &self,
        path: &str,
    ) -> Option<Arc<Subscription>> {
        self.child_watches.remove(path).map(|(_, s)| s)
    }

    pub(crate) fn remove_data(
        &self,
        path: &str,
    ) -> Option<Arc<Subscription>> {
        self.data_watches.remove(path).map(|(_, s)| s)
    }

    /// Removes `subscription` from the child pool only if it is still the
    /// registered one. Used to roll back a failed listen without clobbering
    /// a concurrent re-registration.
    pub(crate) fn remove_children_if_same(
        &self,
        path: &str,
        subscription: &Arc<Subscription>,
    ) {
        self.child_watches.remove_if(path, |_, current| Arc::ptr_eq(current, subscription));
    }

    pub(crate) fn remove_data_if_same(
        &self,
        path: &str,
        subscription: &Arc<Subscription>,
    ) {
        self.data_watches.remove_if(path, |_, current| Arc::ptr_eq(current, subscription));
    }

    /// Whether `subscription` is still the one registered for `path`.
    pub(crate) fn is_current_children(
        &self,
        path: &str,
        subscription: &Arc<Subscription>,
    ) -> bool {
        self.child_watches
            .get(path)
            .map(|current| Arc::ptr_eq(current.value(), subscription))
            .unwrap_or(false)
    }

    pub(crate) fn children(
        &self,
        path: &str,
    ) -> Option<Arc<Subscription>> {
        self.child_watches.get(path).map(|s| s.value().clone())
    }

    pub(crate) fn data(
        &self,
        path: &str,
    ) -> Option<Arc<Subscription>> {
        self.data_watches.get(path).map(|s| s.value().clone())
    }

    /// Snapshot of the child pool keys
    pub(crate) fn child_paths(&self) -> Vec<String> {
        self.child_watches.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of the data pool keys
    pub(crate) fn data_paths(&self) -> Vec<String> {
        self.data_watches.iter().map(|e| e.key().clone()).collect()
    }

    pub(crate) fn child_watch_count(&self) -> usize {
        self.child_watches.len()
    }

    pub(crate) fn data_watch_count(&self) -> usize {
        self.data_watches.len()
    }
}
