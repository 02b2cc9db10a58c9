//! Flat and nested row views over a [`CallTree`], for grids and JSON output.

use super::{CallTree, Issue, NodeId};
use crate::parser::{LoadedTrace, ParseErrorInfo, SubCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output format of the `parse` subcommand
#[derive(Debug, Serialize, Deserialize)]
pub struct TraceOutput {
    /// Summary statistics
    pub summary: TraceSummary,

    /// Anomalies found while building the tree
    pub issues: Vec<Issue>,

    /// Top-level calls with their nested children
    pub call_tree: Vec<CallTreeRow>,

    /// Per-method metrics, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Vec<Metric>>,

    /// DML and SOQL operations
    pub database: Vec<DatabaseRow>,

    /// Lines that could not be parsed
    pub errors: Vec<ParseErrorInfo>,
}

impl TraceOutput {
    pub fn from_loaded(loaded: &LoadedTrace, with_analysis: bool) -> Self {
        let tree = &loaded.tree;
        Self {
            summary: TraceSummary::from_tree(tree),
            issues: tree.issues().to_vec(),
            call_tree: call_tree_rows(tree),
            analysis: with_analysis.then(|| analysis_metrics(tree)),
            database: database_rows(tree),
            errors: loaded.error_info(),
        }
    }
}

/// Summary statistics about the trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    /// Number of nodes in the tree
    pub total_nodes: usize,

    /// Deepest nesting level (levels, not edges)
    pub max_depth: usize,

    /// Trace duration in nanoseconds
    pub duration: u64,

    pub dml_count: u64,
    pub soql_count: u64,
    pub thrown_count: u64,
    pub issue_count: usize,
}

impl TraceSummary {
    pub fn from_tree(tree: &CallTree) -> Self {
        let root = tree.root();
        Self {
            total_nodes: tree.len(),
            max_depth: tree.max_depth(),
            duration: root.duration.total,
            dml_count: root.counts.dml,
            soql_count: root.counts.soql,
            thrown_count: root.counts.thrown,
            issue_count: root.issues.len(),
        }
    }
}

/// One call with its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTreeRow {
    pub text: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub timestamp: u64,
    pub duration: u64,
    pub self_time: u64,
    pub row_count: u64,
    pub dml_count: u64,
    pub soql_count: u64,
    pub thrown_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CallTreeRow>,
}

/// Nested rows for the whole tree.
///
/// Built bottom-up over the arena so deep traces don't recurse.
pub fn call_tree_rows(tree: &CallTree) -> Vec<CallTreeRow> {
    let mut built: Vec<Option<CallTreeRow>> = vec![None; tree.len()];

    for node in tree.iter().rev() {
        let children = node
            .children
            .iter()
            .filter_map(|child| built[child.index()].take())
            .collect();

        built[node.id.index()] = Some(CallTreeRow {
            text: node.text.clone(),
            event_type: node.event_type.clone(),
            namespace: node.namespace.clone(),
            timestamp: node.timestamp,
            duration: node.duration.total,
            self_time: node.duration.own,
            row_count: node.row_count.total,
            dml_count: node.counts.dml,
            soql_count: node.counts.soql,
            thrown_count: node.counts.thrown,
            children,
        });
    }

    tree.children_of(None)
        .iter()
        .filter_map(|id| built[id.index()].take())
        .collect()
}

/// Aggregated timings for every call sharing a namespace and text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub count: u64,
    pub total_time: u64,
    pub self_time: u64,
}

/// Per-method metrics, heaviest self time first
pub fn analysis_metrics(tree: &CallTree) -> Vec<Metric> {
    let mut by_key: HashMap<(Option<&str>, &str), Metric> = HashMap::new();

    for node in tree.iter() {
        let key = (node.namespace.as_deref(), node.text.as_str());
        let metric = by_key.entry(key).or_insert_with(|| Metric {
            name: node.text.clone(),
            event_type: node.event_type.clone(),
            namespace: node.namespace.clone(),
            count: 0,
            total_time: 0,
            self_time: 0,
        });

        metric.count += 1;
        metric.self_time = metric.self_time.saturating_add(node.duration.own);
        // Recursive calls would otherwise count their time twice
        let nested = tree
            .ancestors(node.id)
            .skip(1)
            .any(|a| a.namespace == node.namespace && a.text == node.text);
        if !nested {
            metric.total_time = metric.total_time.saturating_add(node.duration.total);
        }
    }

    let mut metrics: Vec<Metric> = by_key.into_values().collect();
    metrics.sort_by(|a, b| {
        b.self_time
            .cmp(&a.self_time)
            .then_with(|| a.name.cmp(&b.name))
    });
    metrics
}

/// A single DML or SOQL operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRow {
    pub id: NodeId,
    pub event_type: String,
    pub text: String,
    pub timestamp: u64,
    pub row_count: u64,
    pub duration: u64,
}

pub fn database_rows(tree: &CallTree) -> Vec<DatabaseRow> {
    tree.iter()
        .filter(|n| matches!(n.sub_category, SubCategory::Dml | SubCategory::Soql))
        .map(|n| DatabaseRow {
            id: n.id,
            event_type: n.event_type.clone(),
            text: n.text.clone(),
            timestamp: n.timestamp,
            row_count: n.row_count.own,
            duration: n.duration.total,
        })
        .collect()
}

/// Render nanoseconds as `millis.micros ms`, e.g. `1.234ms`
pub fn format_duration(nanos: u64) -> String {
    let micros = nanos / 1_000;
    format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{EventKind, LogEvent};
    use crate::tree::build_tree;

    fn enter(ts: u64, text: &str) -> LogEvent {
        LogEvent::new("METHOD_ENTRY", EventKind::Entry, ts)
            .with_text(text)
            .closing("METHOD_EXIT")
    }

    fn exit(ts: u64) -> LogEvent {
        LogEvent::new("METHOD_EXIT", EventKind::Exit, ts)
    }

    fn sample() -> CallTree {
        let mut insert = LogEvent::new("DML_BEGIN", EventKind::Entry, 20)
            .with_sub_category(SubCategory::Dml)
            .with_text("DML Op:Insert Type:Account")
            .closing("DML_END");
        insert.row_count = Some(3);

        build_tree([
            enter(0, "A.run()"),
            enter(10, "A.helper()"),
            exit(15),
            insert,
            LogEvent::new("DML_END", EventKind::Exit, 50),
            enter(60, "A.helper()"),
            exit(80),
            exit(100),
        ])
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0.000ms");
        assert_eq!(format_duration(999), "0.000ms");
        assert_eq!(format_duration(1_234_567), "1.234ms");
        assert_eq!(format_duration(12_000_000_000), "12000.000ms");
    }

    #[test]
    fn test_call_tree_rows_nest() {
        let rows = call_tree_rows(&sample());

        assert_eq!(rows.len(), 1);
        let run = &rows[0];
        assert_eq!(run.text, "A.run()");
        assert_eq!(run.duration, 100);
        assert_eq!(run.self_time, 100 - 5 - 30 - 20);
        assert_eq!(run.row_count, 3);
        assert_eq!(run.dml_count, 1);
        assert_eq!(run.children.len(), 3);
        assert_eq!(run.children[1].event_type, "DML_BEGIN");
    }

    #[test]
    fn test_analysis_groups_and_sorts() {
        let metrics = analysis_metrics(&sample());

        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].name, "A.run()");
        let helper = metrics.iter().find(|m| m.name == "A.helper()").unwrap();
        assert_eq!(helper.count, 2);
        assert_eq!(helper.total_time, 25);
        assert_eq!(helper.self_time, 25);

        for pair in metrics.windows(2) {
            assert!(pair[0].self_time >= pair[1].self_time);
        }
    }

    #[test]
    fn test_analysis_recursion_counts_total_once() {
        let tree = build_tree([enter(0, "R.f()"), enter(10, "R.f()"), exit(20), exit(40)]);
        let metrics = analysis_metrics(&tree);

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].count, 2);
        assert_eq!(metrics[0].total_time, 40);
        assert_eq!(metrics[0].self_time, 40);
    }

    #[test]
    fn test_database_rows() {
        let rows = database_rows(&sample());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_count, 3);
        assert_eq!(rows[0].duration, 30);
        assert_eq!(rows[0].timestamp, 20);
    }

    #[test]
    fn test_summary() {
        let tree = sample();
        let summary = TraceSummary::from_tree(&tree);

        assert_eq!(summary.total_nodes, 4);
        assert_eq!(summary.max_depth, 2);
        assert_eq!(summary.duration, 100);
        assert_eq!(summary.dml_count, 1);
        assert_eq!(summary.issue_count, 0);
    }
}
