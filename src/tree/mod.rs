//! Call tree built from a trace.
//!
//! Nodes live in a single arena owned by [`CallTree`] and refer to each other
//! by [`NodeId`]. Ids are handed out in pre-order (a parent is always created
//! before its children), which the aggregator relies on.

mod aggregate;
mod builder;
pub mod rows;

pub use aggregate::aggregate;
pub use builder::{TreeBuilder, build_tree};

use crate::parser::{EventKind, SubCategory};
use serde::{Deserialize, Serialize};

/// Index of a node inside its [`CallTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Total and self time in nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub total: u64,
    /// Time not spent in children
    pub own: u64,
}

/// Rows touched by DML/SOQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub total: u64,
    pub own: u64,
}

/// Counters rolled up over a subtree, inclusive of the node itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub dml: u64,
    pub soql: u64,
    pub thrown: u64,
}

impl AggregateCounts {
    pub fn add(&mut self, other: &AggregateCounts) {
        self.dml += other.dml;
        self.soql += other.soql;
        self.thrown += other.thrown;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Lookup only; `None` for top-level nodes
    pub parent: Option<NodeId>,
    /// 0 for top-level nodes
    pub depth: usize,
    pub event_type: String,
    pub kind: EventKind,
    pub text: String,
    pub category: String,
    pub sub_category: SubCategory,
    pub namespace: Option<String>,
    pub line_number: Option<u32>,
    pub timestamp: u64,
    pub exit_timestamp: Option<u64>,
    pub duration: Timing,
    pub row_count: RowCount,
    pub counts: AggregateCounts,
    pub children: Vec<NodeId>,
}

impl Node {
    /// End of the node's interval; instant nodes end where they start
    pub fn end(&self) -> u64 {
        self.exit_timestamp.unwrap_or(self.timestamp).max(self.timestamp)
    }

    pub fn is_zero_width(&self) -> bool {
        self.duration.total == 0
    }

    /// Counters this node contributes on its own
    pub fn own_counts(&self) -> AggregateCounts {
        AggregateCounts {
            dml: u64::from(self.sub_category == SubCategory::Dml),
            soql: u64::from(self.sub_category == SubCategory::Soql),
            thrown: u64::from(self.event_type == "EXCEPTION_THROWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Exit without a matching entry, or an entry closed by someone else's exit
    Unexpected,
    /// The runtime announced it dropped detail
    Skip,
    /// Abnormal end: fatal error or stream ending with open calls
    Error,
}

/// An anomaly found while building the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub start_time: u64,
    pub summary: String,
}

/// The synthetic node above every top-level call
#[derive(Debug, Clone, Default)]
pub struct Root {
    pub children: Vec<NodeId>,
    /// First event time
    pub timestamp: u64,
    /// Trace end time, upper bound for all spatial math
    pub exit_timestamp: u64,
    pub duration: Timing,
    pub row_count: RowCount,
    pub counts: AggregateCounts,
    /// Time-ordered issue ledger
    pub issues: Vec<Issue>,
}

/// An immutable, aggregated call tree
#[derive(Debug, Clone, Default)]
pub struct CallTree {
    nodes: Vec<Node>,
    root: Root,
}

impl CallTree {
    pub(crate) fn from_parts(nodes: Vec<Node>, root: Root) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn issues(&self) -> &[Issue] {
        &self.root.issues
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order (chronological entry order)
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Children of `parent`, or the top-level nodes for `None`
    pub fn children_of(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => &self.nodes[id.0].children,
            None => &self.root.children,
        }
    }

    /// Walk from `id` up to its top-level ancestor, starting with `id` itself
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        std::iter::successors(self.get(id), move |n| n.parent.map(|p| self.node(p)))
    }

    /// Number of depth levels (0 for an empty tree)
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth + 1).max().unwrap_or(0)
    }

    /// Total trace extent used by the timeline
    pub fn total_duration(&self) -> u64 {
        self.root.exit_timestamp
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Vec<Node>, &mut Root) {
        (&mut self.nodes, &mut self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogEvent;

    fn enter(ts: u64, text: &str) -> LogEvent {
        LogEvent::new("ENTER", EventKind::Entry, ts)
            .with_text(text)
            .closing("EXIT")
    }

    fn exit(ts: u64) -> LogEvent {
        LogEvent::new("EXIT", EventKind::Exit, ts)
    }

    #[test]
    fn test_ancestors_walk_up() {
        let tree = build_tree([enter(0, "a"), enter(10, "b"), enter(20, "c"), exit(30), exit(40), exit(50)]);
        let deepest = tree.iter().find(|n| n.text == "c").unwrap();

        let names: Vec<&str> = tree.ancestors(deepest.id).map(|n| n.text.as_str()).collect();
        assert_eq!(names, ["c", "b", "a"]);
        assert_eq!(tree.max_depth(), 3);
    }

    #[test]
    fn test_children_of_root() {
        let tree = build_tree([enter(0, "a"), exit(5), enter(6, "b"), exit(9)]);
        assert_eq!(tree.children_of(None).len(), 2);
        assert_eq!(tree.total_duration(), 9);
        assert!(tree.node(tree.children_of(None)[0]).parent.is_none());
    }
}
