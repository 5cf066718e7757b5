//! Child-list diff
//!
//! Converts the previously known children of a node and a freshly fetched
//! snapshot into the exact set of creations and deletions, updating the known
//! set in place. The transient "present in this snapshot" marking is a local
//! set rebuilt on every pass; the known set is the only state that survives
//! between passes.

use std::collections::HashSet;

/// Result of one diff pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChildDiff {
    /// `snapshot \ known`, in snapshot order
    pub created: Vec<String>,
    /// `known \ snapshot`, sorted
    pub deleted: Vec<String>,
}

impl ChildDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// How the creations of a pass reach the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// On the calling thread before the call returns (first pass after listen)
    Inline,
    /// Through the dispatcher's ordered workers
    Dispatched,
}

impl Delivery {
    pub fn for_pass(initial: bool) -> Self {
        if initial {
            Delivery::Inline
        } else {
            Delivery::Dispatched
        }
    }
}

/// Diffs `snapshot` against `known` and makes `known` equal to the snapshot.
pub fn diff_children(
    known: &mut HashSet<String>,
    snapshot: &[String],
) -> ChildDiff {
    let present: HashSet<&str> = snapshot.iter().map(String::as_str).collect();

    let mut created = Vec::new();
    for name in snapshot {
        if known.insert(name.clone()) {
            created.push(name.clone());
        }
    }

    let mut deleted: Vec<String> = known
        .iter()
        .filter(|name| !present.contains(name.as_str()))
        .cloned()
        .collect();
    deleted.sort();
    for name in &deleted {
        known.remove(name);
    }

    ChildDiff { created, deleted }
}
