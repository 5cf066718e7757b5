//! Ephemeral nodes recreated after every reconnection

use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::Error;
use crate::Result;

/// An ephemeral node the owner wants back after each new session.
///
/// The data is fixed when the node is marked; recreation never refreshes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubbornNode {
    path: String,
    data: Bytes,
}

impl StubbornNode {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[derive(Debug, Default)]
pub(crate) struct StubbornRegistry {
    nodes: DashMap<String, StubbornNode>,
}

impl StubbornRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark(
        &self,
        path: &str,
        data: Bytes,
    ) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("stubborn node path must not be empty".into()));
        }
        if data.is_empty() {
            return Err(Error::InvalidArgument(format!("stubborn node {path} needs non-empty data")));
        }

        let node = StubbornNode {
            path: path.to_string(),
            data,
        };
        debug!(path, "stubborn node registered");
        self.nodes.insert(node.path.clone(), node);
        Ok(())
    }

    pub(crate) fn unmark(
        &self,
        path: &str,
    ) -> Option<StubbornNode> {
        self.nodes.remove(path).map(|(_, node)| node)
    }

    pub(crate) fn get(
        &self,
        path: &str,
    ) -> Option<StubbornNode> {
        self.nodes.get(path).map(|n| n.value().clone())
    }

    /// Snapshot of every stored node
    pub(crate) fn nodes(&self) -> Vec<StubbornNode> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
