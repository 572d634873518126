//! Path interning.
//!
//! Deduplicates ordered label sequences (root-most label first) into a shared
//! tree and hands out stable sequential ids. Nodes live in a flat `Vec`
//! indexed by `PathId`, with parent/first-child/next-sibling links stored as
//! indices, so creation order is simply `Vec` order and teardown is a single
//! drop.
//!
//! ```text
//! (root)
//! +-- main            id 0
//!     +-- solve       id 1
//!     +-- write       id 2
//! ```
//!
//! The sentinel root is implicit: `PathId::INVALID` stands for it, and nodes
//! directly under it have no parent in the node table.
//!
//! One mutex covers the whole search-then-insert walk. Two callers interning
//! the same new path therefore cannot create duplicate siblings.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::id::PathId;

/// One node of the interned tree.
#[derive(Debug, Clone)]
struct PathNode {
    label: String,
    column: String,
    /// `PathId::INVALID` for nodes under the sentinel root.
    parent: PathId,
    first_child: PathId,
    next_sibling: PathId,
}

/// Node table entry, as written to the `nodes` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNodeRecord {
    pub label: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<PathId>,
}

#[derive(Debug, Default)]
struct PathArena {
    nodes: Vec<PathNode>,
    /// First child of the sentinel root.
    root_first_child: PathId,
}

impl PathArena {
    fn first_child(&self, parent: PathId) -> PathId {
        if parent.is_valid() {
            self.nodes[parent.index()].first_child
        } else {
            self.root_first_child
        }
    }

    /// Return the child of `parent` labelled `label`, creating it if needed.
    fn find_or_insert(&mut self, parent: PathId, label: &str, column: &str) -> PathId {
        let mut last = PathId::INVALID;
        let mut cur = self.first_child(parent);
        while cur.is_valid() {
            let node = &self.nodes[cur.index()];
            if node.label == label {
                return cur;
            }
            last = cur;
            cur = node.next_sibling;
        }

        let id = self.next_id();
        self.nodes.push(PathNode {
            label: label.to_string(),
            column: column.to_string(),
            parent,
            first_child: PathId::INVALID,
            next_sibling: PathId::INVALID,
        });

        // Link at the end of the sibling chain
        if last.is_valid() {
            self.nodes[last.index()].next_sibling = id;
        } else if parent.is_valid() {
            self.nodes[parent.index()].first_child = id;
        } else {
            self.root_first_child = id;
        }

        id
    }

    fn next_id(&self) -> PathId {
        match u32::try_from(self.nodes.len()) {
            Ok(id) if id != PathId::INVALID.0 => PathId(id),
            _ => id_space_exhausted(self.nodes.len()),
        }
    }
}

#[cold]
fn id_space_exhausted(len: usize) -> ! {
    panic!("path interner id space exhausted after {} nodes", len)
}

/// Thread-safe path interner. One instance per export session.
#[derive(Debug, Default)]
pub struct PathInterner {
    arena: Mutex<PathArena>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PathArena> {
        // Every mutation leaves the arena consistent, so a poisoned lock is
        // still safe to use.
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Intern `path` (root-most label first) and return the id of its last
    /// node. Nodes created on the way are tagged with `column`. An empty path
    /// returns `PathId::INVALID`.
    pub fn get_id<S: AsRef<str>>(&self, path: &[S], column: &str) -> PathId {
        if path.is_empty() {
            return PathId::INVALID;
        }

        let mut arena = self.lock();
        path.iter().fold(PathId::INVALID, |parent, label| {
            arena.find_or_insert(parent, label.as_ref(), column)
        })
    }

    /// All interned nodes in creation order.
    pub fn write_nodes(&self) -> Vec<PathNodeRecord> {
        self.lock()
            .nodes
            .iter()
            .map(|node| PathNodeRecord {
                label: node.label.clone(),
                column: node.column.clone(),
                parent: node.parent.is_valid().then_some(node.parent),
            })
            .collect()
    }

    /// Labels from the root down to `id`. Empty for unknown ids.
    pub fn path_of(&self, id: PathId) -> Vec<String> {
        let arena = self.lock();
        let mut labels = Vec::new();
        let mut cur = id;
        while cur.is_valid() {
            let Some(node) = arena.nodes.get(cur.index()) else {
                return Vec::new();
            };
            labels.push(node.label.clone());
            cur = node.parent;
        }
        labels.reverse();
        labels
    }

    /// Number of interned nodes.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
