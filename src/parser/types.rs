use serde::{Deserialize, Serialize};

/// How an event participates in tree construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Opens a timed node that a later exit event closes
    Entry,
    /// Closes the innermost open node expecting this event type
    Exit,
    /// A single leaf event (statement, debug output, DML/SOQL call...)
    Standalone,
    /// Explicit marker that the runtime stopped emitting detail
    Truncated,
    /// A fatal error; recorded as a leaf and as an error issue
    Fatal,
}

/// Timeline grouping used for color and batching
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SubCategory {
    #[serde(rename = "Code Unit")]
    CodeUnit,
    Workflow,
    Method,
    Flow,
    #[serde(rename = "DML")]
    Dml,
    #[serde(rename = "SOQL")]
    Soql,
    #[serde(rename = "System Method")]
    SystemMethod,
    #[default]
    Other,
}

impl SubCategory {
    pub const ALL: [SubCategory; 8] = [
        SubCategory::CodeUnit,
        SubCategory::Workflow,
        SubCategory::Method,
        SubCategory::Flow,
        SubCategory::Dml,
        SubCategory::Soql,
        SubCategory::SystemMethod,
        SubCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SubCategory::CodeUnit => "Code Unit",
            SubCategory::Workflow => "Workflow",
            SubCategory::Method => "Method",
            SubCategory::Flow => "Flow",
            SubCategory::Dml => "DML",
            SubCategory::Soql => "SOQL",
            SubCategory::SystemMethod => "System Method",
            SubCategory::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

/// A single parsed trace record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Raw event type tag (e.g. "METHOD_ENTRY")
    pub event_type: String,

    pub kind: EventKind,

    /// Trace-time in nanoseconds
    pub timestamp: u64,

    /// End time carried by the event itself (standalone events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_timestamp: Option<u64>,

    /// Display text / payload
    #[serde(default)]
    pub text: String,

    /// Log category (e.g. "Apex Code", "Database")
    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub sub_category: SubCategory,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Exit event type that closes this entry. `None` on an entry accepts any exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closes_with: Option<String>,

    /// Source line number reported by the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    /// Rows affected / returned (DML and SOQL events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// 1-based line in the input this event came from
    #[serde(default)]
    pub input_line: usize,
}

impl LogEvent {
    /// Create an event with only the required fields set
    pub fn new(event_type: impl Into<String>, kind: EventKind, timestamp: u64) -> Self {
        Self {
            event_type: event_type.into(),
            kind,
            timestamp,
            exit_timestamp: None,
            text: String::new(),
            category: String::new(),
            sub_category: SubCategory::Other,
            namespace: None,
            closes_with: None,
            line_number: None,
            row_count: None,
            input_line: 0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_sub_category(mut self, sub_category: SubCategory) -> Self {
        self.sub_category = sub_category;
        self
    }

    pub fn closing(mut self, exit_type: impl Into<String>) -> Self {
        self.closes_with = Some(exit_type.into());
        self
    }

    /// Whether this exit event closes a node expecting `expected` as its exit type
    pub fn closes(&self, expected: Option<&str>) -> bool {
        self.kind == EventKind::Exit && expected.is_none_or(|t| t == self.event_type)
    }
}

/// Information about a malformed line
#[derive(Debug, Serialize, Deserialize)]
pub struct ParseErrorInfo {
    /// Line number where error occurred
    pub line_number: usize,

    /// Error message
    pub message: String,
}
