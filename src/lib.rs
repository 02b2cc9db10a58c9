//! Turn linear enter/exit execution traces into an aggregated call tree and
//! explore it on a zoomable terminal timeline.

pub mod config;
pub mod parser;
pub mod timeline;
pub mod tree;
pub mod tui;

pub use config::{ConfigError, ConfigResult, TimelineConfig};
pub use parser::{
    EventKind, LoadedTrace, LogEvent, ParseError, ParseErrorInfo, ParseResult, SubCategory,
    TraceLoader, TraceParser, load_trace,
};
pub use timeline::{Command, Notification, TraceSession};
pub use tree::rows::{TraceOutput, TraceSummary};
pub use tree::{CallTree, Issue, IssueKind, Node, NodeId, TreeBuilder, build_tree};
