//! In-process coordination service
//!
//! A single-session tree with the watch and session semantics the coordinator
//! relies on: one-shot data and child watches, ephemeral nodes owned by the
//! session, and session transitions reported on the notification channel.
//! `external_*` methods mutate the tree as another client would, which is how
//! tests simulate changes made by the rest of the cluster.

use std::collections::BTreeMap;
use std::collections::HashSet;

use bytes::Bytes;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use crate::utils::parent_path;
use crate::utils::validate_path;
use crate::CoordinationClient;
use crate::CreateMode;
use crate::Error;
use crate::Notification;
use crate::Result;
use crate::SessionState;
use crate::WatchKind;

/// Owner id of nodes created through `external_*`
const EXTERNAL_OWNER: u64 = 0;

#[derive(Debug, Clone)]
struct MemNode {
    data: Bytes,
    mode: CreateMode,
    owner: u64,
}

#[derive(Debug)]
struct MemState {
    nodes: BTreeMap<String, MemNode>,
    data_watches: HashSet<String>,
    child_watches: HashSet<String>,
    session_id: u64,
    alive: bool,
    expired: bool,
    /// Fires that happened while disconnected, delivered on reconnect
    pending: Vec<Notification>,
}

#[derive(Debug)]
pub struct MemCoordinationClient {
    state: Mutex<MemState>,
    notifier: Sender<Notification>,
}

impl MemCoordinationClient {
    /// Connected client with an empty tree (only `/`) and the receiving end
    /// of its notification channel.
    pub fn new() -> (Self, Receiver<Notification>) {
        let (notifier, receiver) = unbounded();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            MemNode {
                data: Bytes::new(),
                mode: CreateMode::Persistent,
                owner: EXTERNAL_OWNER,
            },
        );
        let client = Self {
            state: Mutex::new(MemState {
                nodes,
                data_watches: HashSet::new(),
                child_watches: HashSet::new(),
                session_id: 1,
                alive: true,
                expired: false,
                pending: Vec::new(),
            }),
            notifier,
        };
        (client, receiver)
    }

    pub fn session_id(&self) -> u64 {
        self.state.lock().session_id
    }

    /// Connection lost; the session (and its ephemeral nodes) survives.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.alive = false;
        debug!(session_id = state.session_id, "session disconnected");
        self.send(Notification::State(SessionState::Disconnected));
    }

    /// Session ended server side: its ephemeral nodes and watches are gone.
    pub fn expire_session(&self) {
        let mut state = self.state.lock();
        let session_id = state.session_id;
        state.alive = false;
        state.expired = true;
        state.data_watches.clear();
        state.child_watches.clear();
        state.pending.clear();

        let ephemerals: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.mode == CreateMode::Ephemeral && node.owner == session_id)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ephemerals {
            state.nodes.remove(path);
        }
        debug!(session_id, dropped = ephemerals.len(), "session expired");
        self.send(Notification::State(SessionState::Expired));
    }

    /// Creates `path` as another client would, firing watches.
    pub fn external_create(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.create_locked(&mut state, path, data, CreateMode::Persistent, EXTERNAL_OWNER)
            .map(|_| ())
    }

    pub fn external_set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.set_data_locked(&mut state, path, data)
    }

    pub fn external_delete(
        &self,
        path: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.delete_locked(&mut state, path)
    }

    pub fn node_data(
        &self,
        path: &str,
    ) -> Option<Bytes> {
        self.state.lock().nodes.get(path).map(|n| n.data.clone())
    }

    pub fn node_mode(
        &self,
        path: &str,
    ) -> Option<CreateMode> {
        self.state.lock().nodes.get(path).map(|n| n.mode)
    }

    pub fn has_data_watch(
        &self,
        path: &str,
    ) -> bool {
        self.state.lock().data_watches.contains(path)
    }

    pub fn has_child_watch(
        &self,
        path: &str,
    ) -> bool {
        self.state.lock().child_watches.contains(path)
    }

    fn send(
        &self,
        notification: Notification,
    ) {
        // The receiver may be gone when the session is being torn down.
        let _ = self.notifier.send(notification);
    }

    fn fire(
        &self,
        state: &mut MemState,
        path: &str,
        kind: WatchKind,
    ) {
        let armed = match kind {
            WatchKind::Data => state.data_watches.remove(path),
            WatchKind::Children => state.child_watches.remove(path),
        };
        if !armed {
            return;
        }
        let notification = Notification::Watch {
            path: path.to_string(),
            kind,
        };
        trace!(path, ?kind, "watch fired");
        if state.alive {
            self.send(notification);
        } else {
            state.pending.push(notification);
        }
    }

    fn ensure_alive(state: &MemState) -> Result<()> {
        if state.alive {
            Ok(())
        } else {
            Err(Error::NotConnected(format!("session {} is not alive", state.session_id)))
        }
    }

    fn children_of(
        state: &MemState,
        path: &str,
    ) -> Vec<String> {
        state
            .nodes
            .keys()
            .filter(|key| key.as_str() != "/" && parent_path(key) == Some(path))
            .filter_map(|key| key.rsplit('/').next().map(str::to_string))
            .collect()
    }

    fn create_locked(
        &self,
        state: &mut MemState,
        path: &str,
        data: Bytes,
        mode: CreateMode,
        owner: u64,
    ) -> Result<String> {
        validate_path(path)?;
        if state.nodes.contains_key(path) {
            return Err(Error::NodeExists(path.to_string()));
        }
        let parent = parent_path(path).ok_or_else(|| Error::NodeExists(path.to_string()))?;
        match state.nodes.get(parent) {
            None => return Err(Error::PathNotFound(parent.to_string())),
            Some(node) if node.mode == CreateMode::Ephemeral => {
                return Err(Error::InvalidArgument(format!(
                    "ephemeral node {parent} cannot have children"
                )));
            }
            Some(_) => {}
        }

        state.nodes.insert(path.to_string(), MemNode { data, mode, owner });
        let parent = parent.to_string();
        self.fire(state, &parent, WatchKind::Children);
        Ok(path.to_string())
    }

    fn set_data_locked(
        &self,
        state: &mut MemState,
        path: &str,
        data: Bytes,
    ) -> Result<()> {
        let node = state
            .nodes
            .get_mut(path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        node.data = data;
        self.fire(state, path, WatchKind::Data);
        Ok(())
    }

    fn delete_locked(
        &self,
        state: &mut MemState,
        path: &str,
    ) -> Result<()> {
        if path == "/" {
            return Err(Error::InvalidArgument("cannot delete the root node".into()));
        }
        if !state.nodes.contains_key(path) {
            return Err(Error::PathNotFound(path.to_string()));
        }
        if !Self::children_of(state, path).is_empty() {
            return Err(Error::InvalidArgument(format!("node {path} has children")));
        }

        state.nodes.remove(path);
        self.fire(state, path, WatchKind::Data);
        self.fire(state, path, WatchKind::Children);
        if let Some(parent) = parent_path(path) {
            let parent = parent.to_string();
            self.fire(state, &parent, WatchKind::Children);
        }
        Ok(())
    }
}

impl CoordinationClient for MemCoordinationClient {
    fn is_alive(&self) -> bool {
        self.state.lock().alive
    }

    fn exists(
        &self,
        path: &str,
    ) -> Result<bool> {
        let state = self.state.lock();
        Self::ensure_alive(&state)?;
        Ok(state.nodes.contains_key(path))
    }

    fn get_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Bytes> {
        let mut state = self.state.lock();
        Self::ensure_alive(&state)?;
        let data = state
            .nodes
            .get(path)
            .map(|n| n.data.clone())
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        if watch {
            state.data_watches.insert(path.to_string());
        }
        Ok(data)
    }

    fn set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<()> {
        let mut state = self.state.lock();
        Self::ensure_alive(&state)?;
        self.set_data_locked(&mut state, path, data)
    }

    fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        Self::ensure_alive(&state)?;
        if !state.nodes.contains_key(path) {
            return Err(Error::PathNotFound(path.to_string()));
        }
        if watch {
            state.child_watches.insert(path.to_string());
        }
        Ok(Self::children_of(&state, path))
    }

    fn create(
        &self,
        path: &str,
        data: Bytes,
        mode: CreateMode,
    ) -> Result<String> {
        let mut state = self.state.lock();
        Self::ensure_alive(&state)?;
        let owner = state.session_id;
        self.create_locked(&mut state, path, data, mode, owner)
    }

    fn delete(
        &self,
        path: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        Self::ensure_alive(&state)?;
        self.delete_locked(&mut state, path)
    }

    fn remove_data_watch(
        &self,
        path: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        Self::ensure_alive(&state)?;
        state.data_watches.remove(path);
        Ok(())
    }

    fn reconnect(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.alive {
            return Ok(());
        }
        if state.expired {
            state.session_id += 1;
            state.expired = false;
        }
        state.alive = true;
        debug!(session_id = state.session_id, "session connected");

        self.send(Notification::State(SessionState::SyncConnected));
        for notification in std::mem::take(&mut state.pending) {
            self.send(notification);
        }
        Ok(())
    }
}
