//! Client facade bundling a coordination client with its watch coordinator.
//!
//! [`WatchSession`] exposes the three subscription flavours under their own
//! names, the node creation helpers (recursive, ephemeral, stubborn) and the
//! reconnection sequence: re-establish the session, then re-arm everything.

use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use tracing::debug;
use tracing::info;

use crate::utils::ancestors;
use crate::utils::validate_path;
use crate::CoordinationClient;
use crate::CreateMode;
use crate::Error;
use crate::Listener;
use crate::Notification;
use crate::Result;
use crate::SessionState;
use crate::StateListener;
use crate::WatchCoordinator;
use crate::WatchKeeperConfig;

pub struct WatchSession<C: CoordinationClient> {
    client: Arc<C>,
    coordinator: Arc<WatchCoordinator<C>>,
}

impl<C: CoordinationClient> std::fmt::Debug for WatchSession<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl<C: CoordinationClient> WatchSession<C> {
    pub fn new(
        client: Arc<C>,
        config: &WatchKeeperConfig,
    ) -> Self {
        let coordinator = Arc::new(WatchCoordinator::new(client.clone(), config));
        Self { client, coordinator }
    }

    /// Watches the data of `path` itself.
    pub fn listen_data(
        &self,
        path: &str,
        listener: Arc<dyn Listener>,
    ) -> Result<()> {
        self.coordinator.listen(path, listener, false, false)
    }

    pub fn unlisten_data(
        &self,
        path: &str,
    ) -> Result<()> {
        self.coordinator.unlisten(path, false, false)
    }

    /// Watches creations and deletions of the children of `path`.
    pub fn listen_children(
        &self,
        path: &str,
        listener: Arc<dyn Listener>,
    ) -> Result<()> {
        self.coordinator.listen(path, listener, true, false)
    }

    pub fn unlisten_children(
        &self,
        path: &str,
    ) -> Result<()> {
        self.coordinator.unlisten(path, true, false)
    }

    /// Watches the children of `path` and the data of each of them.
    pub fn listen_child_data(
        &self,
        path: &str,
        listener: Arc<dyn Listener>,
    ) -> Result<()> {
        self.coordinator.listen(path, listener, true, true)
    }

    pub fn unlisten_child_data(
        &self,
        path: &str,
    ) -> Result<()> {
        self.coordinator.unlisten(path, true, true)
    }

    pub fn listen_state(
        &self,
        state: SessionState,
        listener: Arc<dyn StateListener>,
    ) -> Result<()> {
        self.coordinator.listen_state(state, listener)
    }

    pub fn unlisten_state(
        &self,
        state: SessionState,
    ) -> Result<()> {
        self.coordinator.unlisten_state(state)
    }

    pub fn create(
        &self,
        path: &str,
        data: Bytes,
        mode: CreateMode,
    ) -> Result<String> {
        self.ensure_alive()?;
        validate_path(path)?;
        self.client.create(path, data, mode)
    }

    /// Creates an ephemeral node; with `recreate` it is also recreated after
    /// every reconnection.
    pub fn create_ephemeral(
        &self,
        path: &str,
        data: Bytes,
        recreate: bool,
    ) -> Result<String> {
        if recreate && data.is_empty() {
            return Err(Error::InvalidArgument(format!("stubborn node {path} needs data")));
        }
        let created = self.create(path, data.clone(), CreateMode::Ephemeral)?;
        if recreate {
            self.coordinator.mark_stubborn(&created, data)?;
        }
        Ok(created)
    }

    /// Creates `path` and any missing ancestor, all with empty data.
    ///
    /// Ancestors are persistent; the leaf uses `mode`. Fails with
    /// `NodeExists` when the leaf is already there.
    pub fn create_recursive(
        &self,
        path: &str,
        mode: CreateMode,
    ) -> Result<String> {
        self.ensure_alive()?;
        validate_path(path)?;
        if self.client.exists(path)? {
            return Err(Error::NodeExists(path.to_string()));
        }
        self.create_ancestors(path)?;
        self.client.create(path, Bytes::new(), mode)
    }

    /// Replaces `path` with an ephemeral node owned by this session and marks
    /// it for recreation after every reconnection.
    pub fn create_stubborn(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<String> {
        self.ensure_alive()?;
        validate_path(path)?;
        if data.is_empty() {
            return Err(Error::InvalidArgument(format!("stubborn node {path} needs data")));
        }

        if self.client.exists(path)? {
            match self.client.delete(path) {
                Ok(()) => debug!(path, "replaced existing node"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.create_ancestors(path)?;
        let created = self.client.create(path, data.clone(), CreateMode::Ephemeral)?;
        self.coordinator.mark_stubborn(&created, data)?;
        info!(path = %created, "stubborn node created");
        Ok(created)
    }

    /// Stops recreating `path` (if it was stubborn) and deletes it.
    ///
    /// A failed delete leaves the node stubborn.
    pub fn delete(
        &self,
        path: &str,
    ) -> Result<()> {
        self.ensure_alive()?;
        let stubborn = self.coordinator.stubborn_node(path);
        self.coordinator.unmark_stubborn(path);

        if let Err(e) = self.client.delete(path) {
            if let Some(node) = stubborn {
                self.coordinator.mark_stubborn(node.path(), node.data().clone())?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Re-establishes the session, then re-arms every subscription and
    /// recreates every stubborn node.
    pub fn reconnect(&self) -> Result<()> {
        self.client.reconnect()?;
        self.coordinator.relisten()
    }

    /// Feeds the client's notifications to the coordinator on a background
    /// thread until the channel closes or the session is dropped.
    ///
    /// The thread holds the coordinator weakly: the client owns the sending
    /// half, so a strong reference would keep the channel open forever.
    pub fn spawn_notification_loop(
        &self,
        receiver: Receiver<Notification>,
    ) -> Result<JoinHandle<()>> {
        let coordinator = Arc::downgrade(&self.coordinator);
        std::thread::Builder::new()
            .name("watch-notifications".to_string())
            .spawn(move || {
                for notification in receiver.iter() {
                    let Some(coordinator) = coordinator.upgrade() else {
                        break;
                    };
                    coordinator.on_notification(notification);
                }
                debug!("notification loop stopped");
            })
            .map_err(|e| Error::OperationFailed {
                operation: "spawn",
                path: String::new(),
                source: Box::new(e),
            })
    }

    pub fn coordinator(&self) -> &Arc<WatchCoordinator<C>> {
        &self.coordinator
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    fn create_ancestors(
        &self,
        path: &str,
    ) -> Result<()> {
        for ancestor in ancestors(path) {
            if self.client.exists(&ancestor)? {
                continue;
            }
            match self.client.create(&ancestor, Bytes::new(), CreateMode::Persistent) {
                Ok(_) => debug!(path = %ancestor, "created ancestor"),
                Err(e) if e.is_node_exists() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.client.is_alive() {
            Ok(())
        } else {
            Err(Error::NotConnected("session is not alive".into()))
        }
    }
}
