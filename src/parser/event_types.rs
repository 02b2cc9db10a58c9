use super::{EventKind, SubCategory};

/// How a debug-log event type is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSpec {
    pub kind: EventKind,
    /// Exit type that closes an entry
    pub closes_with: Option<&'static str>,
    pub category: &'static str,
    pub sub_category: SubCategory,
}

const fn entry(
    closes_with: &'static str,
    category: &'static str,
    sub_category: SubCategory,
) -> EventSpec {
    EventSpec {
        kind: EventKind::Entry,
        closes_with: Some(closes_with),
        category,
        sub_category,
    }
}

const fn exit(category: &'static str, sub_category: SubCategory) -> EventSpec {
    EventSpec {
        kind: EventKind::Exit,
        closes_with: None,
        category,
        sub_category,
    }
}

const fn leaf(category: &'static str, sub_category: SubCategory) -> EventSpec {
    EventSpec {
        kind: EventKind::Standalone,
        closes_with: None,
        category,
        sub_category,
    }
}

/// Returns how an event type takes part in the call tree
pub fn classify(event_type: &str) -> EventSpec {
    use SubCategory::*;

    match event_type {
        // Code units - outermost frames of an execution
        "EXECUTION_STARTED" => entry("EXECUTION_FINISHED", "Apex Code", CodeUnit),
        "EXECUTION_FINISHED" => exit("Apex Code", CodeUnit),
        "CODE_UNIT_STARTED" => entry("CODE_UNIT_FINISHED", "Apex Code", CodeUnit),
        "CODE_UNIT_FINISHED" => exit("Apex Code", CodeUnit),

        // User methods and constructors
        "METHOD_ENTRY" => entry("METHOD_EXIT", "Apex Code", Method),
        "METHOD_EXIT" => exit("Apex Code", Method),
        "CONSTRUCTOR_ENTRY" => entry("CONSTRUCTOR_EXIT", "Apex Code", Method),
        "CONSTRUCTOR_EXIT" => exit("Apex Code", Method),

        // Platform methods
        "SYSTEM_METHOD_ENTRY" => entry("SYSTEM_METHOD_EXIT", "System", SystemMethod),
        "SYSTEM_METHOD_EXIT" => exit("System", SystemMethod),
        "SYSTEM_CONSTRUCTOR_ENTRY" => entry("SYSTEM_CONSTRUCTOR_EXIT", "System", SystemMethod),
        "SYSTEM_CONSTRUCTOR_EXIT" => exit("System", SystemMethod),
        "SYSTEM_MODE_ENTER" => entry("SYSTEM_MODE_EXIT", "System", SystemMethod),
        "SYSTEM_MODE_EXIT" => exit("System", SystemMethod),

        // Database
        "DML_BEGIN" => entry("DML_END", "DML", Dml),
        "DML_END" => exit("DML", Dml),
        "SOQL_EXECUTE_BEGIN" => entry("SOQL_EXECUTE_END", "SOQL", Soql),
        "SOQL_EXECUTE_END" => exit("SOQL", Soql),
        "SOSL_EXECUTE_BEGIN" => entry("SOSL_EXECUTE_END", "SOQL", Soql),
        "SOSL_EXECUTE_END" => exit("SOQL", Soql),

        // Flows
        "FLOW_START_INTERVIEW_BEGIN" => entry("FLOW_START_INTERVIEW_END", "Workflow", Flow),
        "FLOW_START_INTERVIEW_END" => exit("Workflow", Flow),
        "FLOW_ELEMENT_BEGIN" => entry("FLOW_ELEMENT_END", "Workflow", Flow),
        "FLOW_ELEMENT_END" => exit("Workflow", Flow),

        // Workflow rules
        "WF_RULE_EVAL_BEGIN" => entry("WF_RULE_EVAL_END", "Workflow", Workflow),
        "WF_RULE_EVAL_END" => exit("Workflow", Workflow),
        "WF_CRITERIA_BEGIN" => entry("WF_CRITERIA_END", "Workflow", Workflow),
        "WF_CRITERIA_END" => exit("Workflow", Workflow),

        "FATAL_ERROR" => EventSpec {
            kind: EventKind::Fatal,
            closes_with: None,
            category: "Apex Code",
            sub_category: Other,
        },

        "EXCEPTION_THROWN" | "USER_DEBUG" | "STATEMENT_EXECUTE" | "VARIABLE_ASSIGNMENT"
        | "HEAP_ALLOCATE" => leaf("Apex Code", Other),

        "DML_ROWS" | "QUERY_MORE_BEGIN" => leaf("DML", Other),

        _ => leaf("", Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_name_their_exit() {
        for event_type in ["METHOD_ENTRY", "DML_BEGIN", "SOQL_EXECUTE_BEGIN", "CODE_UNIT_STARTED"] {
            let spec = classify(event_type);
            assert_eq!(spec.kind, EventKind::Entry);
            let exit_type = spec.closes_with.unwrap();
            assert_eq!(classify(exit_type).kind, EventKind::Exit);
            assert_eq!(classify(exit_type).sub_category, spec.sub_category);
        }
    }

    #[test]
    fn test_unknown_type_is_leaf() {
        let spec = classify("SOMETHING_NEW");
        assert_eq!(spec.kind, EventKind::Standalone);
        assert_eq!(spec.sub_category, SubCategory::Other);
    }
}
