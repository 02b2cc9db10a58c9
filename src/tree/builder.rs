use super::{AggregateCounts, CallTree, Issue, IssueKind, Node, NodeId, Root, RowCount, Timing};
use crate::parser::{EventKind, LogEvent};

/// An open call waiting for its exit event
#[derive(Debug)]
struct OpenCall {
    id: NodeId,
    closes_with: Option<String>,
}

/// Builds a [`CallTree`] from events delivered in trace order.
///
/// The builder never fails: malformed sequences are recovered from and noted
/// in the issue ledger.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    stack: Vec<OpenCall>,
    issues: Vec<Issue>,
    first_timestamp: Option<u64>,
    /// Latest event start seen; later events are clamped to it
    last_timestamp: u64,
    /// First explicit truncation marker: (time, reason)
    truncation: Option<(u64, String)>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls currently open
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, event: LogEvent) {
        let timestamp = self.clamp(event.timestamp);

        match event.kind {
            EventKind::Entry => {
                let closes_with = event.closes_with.clone();
                let id = self.add_node(event, timestamp, None);
                self.stack.push(OpenCall { id, closes_with });
            }
            EventKind::Exit => self.close_matching(&event, timestamp),
            EventKind::Standalone => {
                let exit = event.exit_timestamp.map(|e| e.max(timestamp));
                self.add_node(event, timestamp, exit);
            }
            EventKind::Fatal => {
                self.issues.push(Issue {
                    kind: IssueKind::Error,
                    start_time: timestamp,
                    summary: format!("FATAL ERROR! cause={}", event.text),
                });
                self.add_node(event, timestamp, None);
            }
            EventKind::Truncated => {
                log::debug!("Truncation marker '{}' at {}", event.event_type, timestamp);
                if self.truncation.is_none() {
                    self.truncation = Some((timestamp, event.event_type));
                }
            }
        }
    }

    /// Close every open call and aggregate
    pub fn finish(mut self) -> CallTree {
        let end = self
            .nodes
            .iter()
            .filter_map(|n| n.exit_timestamp)
            .fold(self.last_timestamp, u64::max);

        if let Some(outermost) = self.stack.first().map(|open| open.id) {
            let open = self.stack.len();
            let text = self.nodes[outermost.index()].text.clone();
            let issue = match &self.truncation {
                Some((time, reason)) => Issue {
                    kind: IssueKind::Skip,
                    start_time: *time,
                    summary: format!("{}: {} open call(s) cut short in {}", reason, open, text),
                },
                None => Issue {
                    kind: IssueKind::Error,
                    start_time: self.last_timestamp,
                    summary: format!("Unexpected-End: {} open call(s) never exited in {}", open, text),
                },
            };
            log::warn!("{}", issue.summary);
            self.issues.push(issue);

            while let Some(open) = self.stack.pop() {
                self.close(open.id, end);
            }
        } else if let Some((time, reason)) = self.truncation.take() {
            self.issues.push(Issue {
                kind: IssueKind::Skip,
                start_time: time,
                summary: reason,
            });
        }

        self.issues.sort_by_key(|issue| issue.start_time);

        let root = Root {
            children: self.roots,
            timestamp: self.first_timestamp.unwrap_or(0),
            exit_timestamp: end,
            duration: Timing::default(),
            row_count: RowCount::default(),
            counts: AggregateCounts::default(),
            issues: self.issues,
        };

        let mut tree = CallTree::from_parts(self.nodes, root);
        super::aggregate(&mut tree);
        tree
    }

    /// Keep timestamps monotonic so sibling order holds by construction
    fn clamp(&mut self, timestamp: u64) -> u64 {
        if timestamp < self.last_timestamp {
            log::debug!(
                "Out of order timestamp {} clamped to {}",
                timestamp,
                self.last_timestamp
            );
        }
        let timestamp = timestamp.max(self.last_timestamp);
        self.first_timestamp.get_or_insert(timestamp);
        self.last_timestamp = timestamp;
        timestamp
    }

    fn add_node(&mut self, event: LogEvent, timestamp: u64, exit: Option<u64>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.stack.last().map(|open| open.id);

        // A self-timed previous sibling must not run past this one
        let siblings = match parent {
            Some(p) => &self.nodes[p.index()].children,
            None => &self.roots,
        };
        if let Some(&prev) = siblings.last() {
            clip_exit(&mut self.nodes[prev.index()], timestamp);
        }

        self.nodes.push(Node {
            id,
            parent,
            depth: self.stack.len(),
            event_type: event.event_type,
            kind: event.kind,
            text: event.text,
            category: event.category,
            sub_category: event.sub_category,
            namespace: event.namespace,
            line_number: event.line_number,
            timestamp,
            exit_timestamp: exit,
            duration: Timing::default(),
            row_count: RowCount {
                total: 0,
                own: event.row_count.unwrap_or(0),
            },
            counts: AggregateCounts::default(),
            children: Vec::new(),
        });

        match parent {
            Some(p) => self.nodes[p.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn close_matching(&mut self, exit: &LogEvent, timestamp: u64) {
        let position = self
            .stack
            .iter()
            .rposition(|open| exit.closes(open.closes_with.as_deref()));

        match position {
            Some(pos) if pos + 1 == self.stack.len() => {
                if let Some(open) = self.stack.pop() {
                    self.close(open.id, timestamp);
                    self.attach_rows(open.id, exit);
                }
            }
            Some(pos) => {
                let unclosed = self.stack.len() - pos - 1;
                let target = self.stack[pos].id;
                self.issues.push(Issue {
                    kind: IssueKind::Unexpected,
                    start_time: timestamp,
                    summary: format!(
                        "Unexpected-Exit: {} closed {} with {} call(s) still open",
                        exit.event_type,
                        self.nodes[target.index()].text,
                        unclosed
                    ),
                });
                while self.stack.len() > pos {
                    if let Some(open) = self.stack.pop() {
                        self.close(open.id, timestamp);
                    }
                }
                self.attach_rows(target, exit);
            }
            None => {
                log::debug!(
                    "Unmatched {} at {} (line {})",
                    exit.event_type,
                    timestamp,
                    exit.input_line
                );
                self.issues.push(Issue {
                    kind: IssueKind::Unexpected,
                    start_time: timestamp,
                    summary: format!("Unexpected-Exit: {} has no matching entry", exit.event_type),
                });
            }
        }
    }

    fn close(&mut self, id: NodeId, timestamp: u64) {
        if let Some(&last) = self.nodes[id.index()].children.last() {
            clip_exit(&mut self.nodes[last.index()], timestamp);
        }
        self.nodes[id.index()].exit_timestamp = Some(timestamp);
    }

    fn attach_rows(&mut self, id: NodeId, exit: &LogEvent) {
        if let Some(rows) = exit.row_count {
            let node = &mut self.nodes[id.index()];
            if node.row_count.own == 0 {
                node.row_count.own = rows;
            }
        }
    }
}

fn clip_exit(node: &mut Node, limit: u64) {
    if let Some(exit) = node.exit_timestamp
        && exit > limit
    {
        node.exit_timestamp = Some(limit.max(node.timestamp));
    }
}

/// Build and aggregate a tree from a complete event sequence
pub fn build_tree<I>(events: I) -> CallTree
where
    I: IntoIterator<Item = LogEvent>,
{
    let mut builder = TreeBuilder::new();
    for event in events {
        builder.push(event);
    }
    builder.finish()
}
