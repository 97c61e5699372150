use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle into the node heap.
///
/// A `NodeId` is a lightweight, copyable slot index plus the generation the
/// slot had when the node was allocated. Every reference between nodes is a
/// `NodeId`, so cycles never form ownership cycles. A handle whose generation
/// no longer matches its slot refers to a reclaimed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the raw heap slot index backing this handle.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    #[cfg(test)]
    pub fn new_for_test(index: u32) -> Self {
        Self::new(index, 0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.index)
    }
}
