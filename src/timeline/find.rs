use crate::tree::{CallTree, Node, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub match_case: bool,
}

/// Inbound search protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindMessage {
    /// Search for `text`, selecting the 1-based `match_index` (0 = none)
    Find {
        text: String,
        match_index: usize,
        options: FindOptions,
    },
    Next,
    Previous,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindResults {
    pub total_matches: usize,
}

/// What a [`FindMessage`] changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindUpdate {
    /// Set when the match list was rebuilt
    pub results: Option<FindResults>,
    /// Set when highlighting changed and needs a redraw
    pub highlight_changed: bool,
}

/// Substring search over node type tags and display text
#[derive(Debug, Clone, Default)]
pub struct FindEngine {
    query: String,
    options: FindOptions,
    /// Ascending ids, i.e. chronological
    matches: Vec<NodeId>,
    /// 1-based position in `matches`, 0 when nothing is selected
    current: usize,
}

impl FindEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn options(&self) -> FindOptions {
        self.options
    }

    pub fn matches(&self) -> &[NodeId] {
        &self.matches
    }

    pub fn total(&self) -> usize {
        self.matches.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
            .checked_sub(1)
            .and_then(|i| self.matches.get(i))
            .copied()
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn is_match(&self, id: NodeId) -> bool {
        self.matches.binary_search(&id).is_ok()
    }

    /// Run a fresh search, selecting the first match
    pub fn find(&mut self, tree: &CallTree, text: &str, options: FindOptions) -> FindResults {
        self.query = text.to_string();
        self.options = options;
        self.rescan(tree);
        self.current = usize::from(!self.matches.is_empty());
        FindResults {
            total_matches: self.matches.len(),
        }
    }

    pub fn handle(&mut self, tree: &CallTree, message: FindMessage) -> FindUpdate {
        match message {
            FindMessage::Find {
                text,
                match_index,
                options,
            } => {
                let mut update = FindUpdate::default();
                if text != self.query || options != self.options {
                    self.query = text;
                    self.options = options;
                    self.rescan(tree);
                    update.results = Some(FindResults {
                        total_matches: self.matches.len(),
                    });
                    update.highlight_changed = true;
                }
                let index = match_index.min(self.matches.len());
                if index != self.current {
                    self.current = index;
                    update.highlight_changed = true;
                }
                update
            }
            FindMessage::Next => FindUpdate {
                results: None,
                highlight_changed: self.next().is_some(),
            },
            FindMessage::Previous => FindUpdate {
                results: None,
                highlight_changed: self.previous().is_some(),
            },
            FindMessage::Close => {
                let had_matches = self.is_active();
                self.close();
                FindUpdate {
                    results: None,
                    highlight_changed: had_matches,
                }
            }
        }
    }

    /// Advance to the next match, wrapping from the last to the first
    pub fn next(&mut self) -> Option<NodeId> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        self.current = self.current % total + 1;
        self.current()
    }

    /// Step back, wrapping from the first to the last
    pub fn previous(&mut self) -> Option<NodeId> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        self.current = if self.current <= 1 { total } else { self.current - 1 };
        self.current()
    }

    pub fn close(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.current = 0;
    }

    fn rescan(&mut self, tree: &CallTree) {
        self.matches.clear();
        if self.query.is_empty() {
            return;
        }

        let needle = if self.options.match_case {
            self.query.clone()
        } else {
            self.query.to_lowercase()
        };
        let match_case = self.options.match_case;
        self.matches.extend(
            tree.iter()
                .filter(|node| node_matches(node, &needle, match_case))
                .map(|node| node.id),
        );
        log::debug!("Find '{}': {} matches", self.query, self.matches.len());
    }
}

fn node_matches(node: &Node, needle: &str, match_case: bool) -> bool {
    if match_case {
        node.event_type.contains(needle) || node.text.contains(needle)
    } else {
        node.event_type.to_lowercase().contains(needle) || node.text.to_lowercase().contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{EventKind, LogEvent};
    use crate::tree::build_tree;
    use proptest::prelude::*;

    fn tree() -> CallTree {
        build_tree([
            LogEvent::new("METHOD_ENTRY", EventKind::Entry, 0)
                .with_text("Account.save()")
                .closing("METHOD_EXIT"),
            LogEvent::new("SOQL_EXECUTE_BEGIN", EventKind::Entry, 5)
                .with_text("SELECT Id FROM Account")
                .closing("SOQL_EXECUTE_END"),
            LogEvent::new("SOQL_EXECUTE_END", EventKind::Exit, 8),
            LogEvent::new("USER_DEBUG", EventKind::Standalone, 9).with_text("account saved"),
            LogEvent::new("METHOD_EXIT", EventKind::Exit, 10),
        ])
    }

    #[test]
    fn test_case_insensitive_default() {
        let tree = tree();
        let mut find = FindEngine::new();

        let results = find.find(&tree, "account", FindOptions::default());
        assert_eq!(results.total_matches, 3);
        assert_eq!(find.current_index(), 1);
        assert_eq!(find.current(), Some(find.matches()[0]));
    }

    #[test]
    fn test_match_case() {
        let tree = tree();
        let mut find = FindEngine::new();

        let results = find.find(&tree, "Account", FindOptions { match_case: true });
        assert_eq!(results.total_matches, 2);
    }

    #[test]
    fn test_matches_type_tag() {
        let tree = tree();
        let mut find = FindEngine::new();

        assert_eq!(find.find(&tree, "soql", FindOptions::default()).total_matches, 1);
    }

    #[test]
    fn test_navigation_does_not_rescan() {
        let tree = tree();
        let mut find = FindEngine::new();

        let update = find.handle(
            &tree,
            FindMessage::Find {
                text: "account".into(),
                match_index: 1,
                options: FindOptions::default(),
            },
        );
        assert_eq!(update.results, Some(FindResults { total_matches: 3 }));

        let update = find.handle(
            &tree,
            FindMessage::Find {
                text: "account".into(),
                match_index: 2,
                options: FindOptions::default(),
            },
        );
        assert_eq!(update.results, None);
        assert!(update.highlight_changed);
        assert_eq!(find.current_index(), 2);

        let update = find.handle(&tree, FindMessage::Next);
        assert_eq!(update.results, None);
        assert_eq!(find.current_index(), 3);
    }

    #[test]
    fn test_close_clears() {
        let tree = tree();
        let mut find = FindEngine::new();
        find.find(&tree, "account", FindOptions::default());

        let update = find.handle(&tree, FindMessage::Close);
        assert!(update.highlight_changed);
        assert_eq!(find.total(), 0);
        assert_eq!(find.current(), None);
        assert!(!find.is_active());
    }

    #[test]
    fn test_empty_results_navigation() {
        let tree = tree();
        let mut find = FindEngine::new();
        find.find(&tree, "nothing", FindOptions::default());

        assert_eq!(find.current_index(), 0);
        assert_eq!(find.next(), None);
        assert_eq!(find.previous(), None);
    }

    proptest! {
        #[test]
        fn prop_navigation_wraps(total in 1usize..30, steps in 0usize..100) {
            let events: Vec<LogEvent> = (0..total as u64)
                .map(|i| LogEvent::new("HIT", EventKind::Standalone, i))
                .collect();
            let tree = build_tree(events);
            let mut find = FindEngine::new();
            find.find(&tree, "hit", FindOptions::default());

            for _ in 0..steps {
                find.next();
            }
            prop_assert_eq!(find.current_index(), steps % total + 1);

            // Walking to the last and one further lands on the first
            while find.current_index() != total {
                find.next();
            }
            prop_assert_eq!(find.next(), Some(find.matches()[0]));
            prop_assert_eq!(find.previous(), Some(find.matches()[total - 1]));
        }
    }
}
