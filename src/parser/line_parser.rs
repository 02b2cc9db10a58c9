use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, digit1, space1},
    combinator::{opt, recognize},
    sequence::{delimited, terminated},
};

use super::event_types::classify;
use super::{EventKind, LogEvent, ParseError, ParseResult, SubCategory};

const SKIPPED_MARKER: &str = "*** Skipped";
const MAX_SIZE_MARKER: &str = "MAXIMUM DEBUG LOG SIZE REACHED";

/// Parse a complete trace line.
///
/// Lines starting with `{` are JSON-encoded [`LogEvent`]s; everything else is
/// read as a pipe-delimited debug-log line. Raw truncation lines carry no
/// timestamp of their own and are stamped with `last_timestamp`.
pub fn parse_log_line(line: &str, last_timestamp: u64) -> ParseResult<LogEvent> {
    let trimmed = line.trim();

    if trimmed.starts_with('{') {
        return parse_json_line(trimmed);
    }
    if trimmed.starts_with(SKIPPED_MARKER) {
        return Ok(truncation_event("Skipped-Lines", trimmed, last_timestamp));
    }
    if trimmed.contains(MAX_SIZE_MARKER) {
        return Ok(truncation_event("Max-Size-reached", trimmed, last_timestamp));
    }

    let (rest, timestamp) = parse_header(trimmed)
        .map_err(|e| ParseError::InvalidFormat(format!("Failed to parse timestamp: {}", e)))?;

    let (rest, event_type) = parse_event_type(rest)
        .map_err(|e| ParseError::InvalidEvent(format!("Failed to parse event type: {}", e)))?;

    let fields: Vec<&str> = match rest.strip_prefix('|') {
        Some(fields) => fields.split('|').collect(),
        None if rest.is_empty() => Vec::new(),
        None => {
            return Err(ParseError::InvalidEvent(format!(
                "Unexpected text after event type: {}",
                rest
            )));
        }
    };

    let spec = classify(event_type);
    let mut event = LogEvent::new(event_type, spec.kind, timestamp);
    event.category = spec.category.to_string();
    event.sub_category = spec.sub_category;
    event.closes_with = spec.closes_with.map(str::to_string);
    event.line_number = fields.first().and_then(|f| parse_line_number(f));
    event.row_count = fields.iter().find_map(|f| parse_rows(f));
    event.text = event_text(event_type, &fields);

    Ok(event)
}

fn parse_json_line(line: &str) -> ParseResult<LogEvent> {
    serde_json::from_str(line).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

fn truncation_event(reason: &str, line: &str, timestamp: u64) -> LogEvent {
    let mut event = LogEvent::new(reason, EventKind::Truncated, timestamp);
    event.text = line.to_string();
    event.sub_category = SubCategory::Other;
    event
}

/// Parse `HH:MM:SS.f (NANOS)|` and return the nanosecond timestamp
fn parse_header(input: &str) -> IResult<&str, u64> {
    let (rest, _) = terminated(parse_clock, space1).parse(input)?;
    let (rest, nanos) = terminated(delimited(char('('), digit1, char(')')), char('|')).parse(rest)?;

    // digit1 only yields ASCII digits; overflow saturates rather than failing the line
    let nanos = nanos.parse().unwrap_or(u64::MAX);
    Ok((rest, nanos))
}

/// Parse wall clock in HH:MM:SS[.fff] format
fn parse_clock(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        char(':'),
        digit1,
        char(':'),
        digit1,
        opt((char('.'), digit1)),
    ))
    .parse(input)
}

fn parse_event_type(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')(input)
}

/// `[42]` → 42; `[EXTERNAL]` and anything else → None
fn parse_line_number(field: &str) -> Option<u32> {
    field
        .strip_prefix('[')
        .and_then(|f| f.strip_suffix(']'))
        .and_then(|n| n.parse().ok())
}

fn parse_rows(field: &str) -> Option<u64> {
    field.strip_prefix("Rows:").and_then(|n| n.trim().parse().ok())
}

fn is_bracketed(field: &str) -> bool {
    field.starts_with('[') && field.ends_with(']')
}

fn event_text(event_type: &str, fields: &[&str]) -> String {
    match event_type {
        "DML_BEGIN" => {
            let parts: Vec<&str> = fields
                .iter()
                .copied()
                .filter(|f| f.starts_with("Op:") || f.starts_with("Type:"))
                .collect();
            format!("DML {}", parts.join(" "))
        }
        _ => fields
            .iter()
            .rev()
            .copied()
            .find(|f| !f.is_empty() && !is_bracketed(f) && parse_rows(f).is_none())
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_entry() {
        let line = "12:47:43.3 (3369713)|METHOD_ENTRY|[7]|01p4J00000FpS6t|MyClass.doWork()";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.event_type, "METHOD_ENTRY");
        assert_eq!(event.kind, EventKind::Entry);
        assert_eq!(event.timestamp, 3369713);
        assert_eq!(event.line_number, Some(7));
        assert_eq!(event.text, "MyClass.doWork()");
        assert_eq!(event.sub_category, SubCategory::Method);
        assert_eq!(event.closes_with.as_deref(), Some("METHOD_EXIT"));
    }

    #[test]
    fn test_parse_code_unit_external() {
        let line = "12:47:43.0 (1000)|CODE_UNIT_STARTED|[EXTERNAL]|066xx|execute_anonymous_apex";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.kind, EventKind::Entry);
        assert_eq!(event.line_number, None);
        assert_eq!(event.text, "execute_anonymous_apex");
        assert_eq!(event.sub_category, SubCategory::CodeUnit);
    }

    #[test]
    fn test_parse_dml_begin() {
        let line = "12:47:43.5 (5000000)|DML_BEGIN|[10]|Op:Insert|Type:Account|Rows:2";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.sub_category, SubCategory::Dml);
        assert_eq!(event.text, "DML Op:Insert Type:Account");
        assert_eq!(event.row_count, Some(2));
    }

    #[test]
    fn test_parse_soql_end_rows() {
        let line = "12:47:43.5 (6000000)|SOQL_EXECUTE_END|[5]|Rows:3";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.kind, EventKind::Exit);
        assert_eq!(event.row_count, Some(3));
        assert_eq!(event.text, "");
    }

    #[test]
    fn test_parse_soql_begin_query_text() {
        let line = "12:47:43.5 (5500000)|SOQL_EXECUTE_BEGIN|[5]|Aggregations:0|SELECT Id FROM Account";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.text, "SELECT Id FROM Account");
        assert_eq!(event.sub_category, SubCategory::Soql);
    }

    #[test]
    fn test_parse_event_without_fields() {
        let line = "12:47:43.5 (42)|EXECUTION_STARTED";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.kind, EventKind::Entry);
        assert_eq!(event.timestamp, 42);
        assert!(event.text.is_empty());
    }

    #[test]
    fn test_parse_fatal_error() {
        let line = "12:47:44.0 (9000000)|FATAL_ERROR|System.LimitException: Too many SOQL queries: 101";
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.kind, EventKind::Fatal);
        assert_eq!(event.text, "System.LimitException: Too many SOQL queries: 101");
    }

    #[test]
    fn test_parse_skipped_marker_uses_last_timestamp() {
        let event = parse_log_line("*** Skipped 22606 bytes of detailed log", 777).unwrap();

        assert_eq!(event.kind, EventKind::Truncated);
        assert_eq!(event.timestamp, 777);
        assert_eq!(event.event_type, "Skipped-Lines");
    }

    #[test]
    fn test_parse_max_size_marker() {
        let event = parse_log_line("MAXIMUM DEBUG LOG SIZE REACHED", 5).unwrap();
        assert_eq!(event.kind, EventKind::Truncated);
        assert_eq!(event.event_type, "Max-Size-reached");
    }

    #[test]
    fn test_parse_json_event() {
        let line = r#"{"event_type":"CALL","kind":"entry","timestamp":10,"text":"outer","sub_category":"Method"}"#;
        let event = parse_log_line(line, 0).unwrap();

        assert_eq!(event.kind, EventKind::Entry);
        assert_eq!(event.timestamp, 10);
        assert_eq!(event.text, "outer");
        assert_eq!(event.sub_category, SubCategory::Method);
        assert_eq!(event.closes_with, None);
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_log_line("{not json", 0);
        assert!(matches!(result, Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_header_line_is_malformed() {
        let result = parse_log_line("59.0 APEX_CODE,FINEST;APEX_PROFILING,INFO", 0);
        assert!(matches!(result, Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_lowercase_type_is_malformed() {
        let result = parse_log_line("12:00:00.0 (1)|lowercase|x", 0);
        assert!(matches!(result, Err(ParseError::InvalidEvent(_))));
    }
}
