use crate::tree::{CallTree, Node, NodeId};
use std::sync::Arc;

/// How strictly a node must cover a point to be hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitMode {
    /// Any node whose closed interval contains the time, zero-width included,
    /// regardless of how wide it is on screen
    Exact,
    /// Only nodes at least `min_px` wide at `zoom` pixels per nanosecond
    MinWidth { zoom: f64, min_px: f64 },
}

impl HitMode {
    pub fn hits(self, node: &Node, time: u64) -> bool {
        let covers = node.timestamp <= time && time <= node.end();
        match self {
            HitMode::Exact => covers,
            HitMode::MinWidth { zoom, min_px } => {
                covers && node.duration.total > 0 && node.duration.total as f64 * zoom >= min_px
            }
        }
    }
}

/// Time-sorted lookup structures over an immutable tree.
///
/// Siblings never overlap, and neither do nodes at the same depth, so both
/// the sibling lists and the per-depth levels are sorted by start and by end.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: Arc<CallTree>,
    levels: Vec<Vec<NodeId>>,
}

impl SpatialIndex {
    pub fn new(tree: Arc<CallTree>) -> Self {
        let mut levels: Vec<Vec<NodeId>> = vec![Vec::new(); tree.max_depth()];
        // Pre-order keeps each level in time order
        for node in tree.iter() {
            levels[node.depth].push(node.id);
        }
        log::debug!("Indexed {} nodes over {} levels", tree.len(), levels.len());
        Self { tree, levels }
    }

    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    pub fn shared_tree(&self) -> Arc<CallTree> {
        Arc::clone(&self.tree)
    }

    /// Number of depth levels
    pub fn depth_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, depth: usize) -> &[NodeId] {
        self.levels.get(depth).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes at `depth` whose interval touches `[start, end]`
    pub fn visible(&self, depth: usize, start: u64, end: u64) -> &[NodeId] {
        let level = self.level(depth);
        let first = level.partition_point(|id| self.tree.node(*id).end() < start);
        let last = level.partition_point(|id| self.tree.node(*id).timestamp <= end);
        if first >= last {
            return &[];
        }
        &level[first..last]
    }

    /// Find the node at `depth` covering `time`.
    ///
    /// Bisects each sibling list instead of scanning. Where several nodes
    /// qualify (touching intervals) the latest-starting one wins.
    pub fn locate(&self, time: u64, depth: usize, mode: HitMode) -> Option<NodeId> {
        if depth >= self.levels.len() {
            return None;
        }

        let mut stack = vec![self.candidates(self.tree.children_of(None), time, mode)];
        while let Some(frame) = stack.last_mut() {
            match frame.next() {
                Some(node) if node.depth == depth => return Some(node.id),
                Some(node) => stack.push(self.candidates(&node.children, time, mode)),
                None => {
                    stack.pop();
                }
            }
        }
        None
    }

    /// Siblings that may contain `time`, latest first.
    ///
    /// Ends are sorted too, so once a sibling ends before `time` every
    /// earlier one does as well.
    fn candidates<'a>(
        &'a self,
        siblings: &'a [NodeId],
        time: u64,
        mode: HitMode,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        let tree = &*self.tree;
        let upper = siblings.partition_point(|id| tree.node(*id).timestamp <= time);
        siblings[..upper]
            .iter()
            .rev()
            .map(move |id| tree.node(*id))
            .take_while(move |node| node.end() >= time)
            .filter(move |node| mode.hits(node, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{EventKind, LogEvent};
    use crate::tree::build_tree;
    use proptest::prelude::*;

    fn linear_locate(tree: &CallTree, time: u64, depth: usize, mode: HitMode) -> Option<NodeId> {
        tree.iter()
            .filter(|n| n.depth == depth && mode.hits(n, time))
            .map(|n| n.id)
            .last()
    }

    fn enter(ts: u64, text: &str) -> LogEvent {
        LogEvent::new("ENTER", EventKind::Entry, ts)
            .with_text(text)
            .closing("EXIT")
    }

    fn exit(ts: u64) -> LogEvent {
        LogEvent::new("EXIT", EventKind::Exit, ts)
    }

    fn sample() -> SpatialIndex {
        SpatialIndex::new(Arc::new(build_tree([
            enter(0, "a"),
            enter(10, "a1"),
            exit(20),
            LogEvent::new("MARK", EventKind::Standalone, 30).with_text("mark"),
            enter(40, "a2"),
            exit(60),
            exit(100),
            enter(200, "b"),
            exit(300),
        ])))
    }

    fn text_at(index: &SpatialIndex, time: u64, depth: usize, mode: HitMode) -> Option<&str> {
        index
            .locate(time, depth, mode)
            .map(|id| index.tree().node(id).text.as_str())
    }

    #[test]
    fn test_locate_descends() {
        let index = sample();
        let wide = HitMode::MinWidth { zoom: 1.0, min_px: 1.0 };

        assert_eq!(text_at(&index, 15, 0, wide), Some("a"));
        assert_eq!(text_at(&index, 15, 1, wide), Some("a1"));
        assert_eq!(text_at(&index, 50, 1, wide), Some("a2"));
        assert_eq!(text_at(&index, 250, 0, wide), Some("b"));
    }

    #[test]
    fn test_locate_gaps_return_none() {
        let index = sample();
        let wide = HitMode::MinWidth { zoom: 1.0, min_px: 1.0 };

        assert_eq!(text_at(&index, 150, 0, wide), None);
        assert_eq!(text_at(&index, 25, 1, wide), None);
        assert_eq!(text_at(&index, 5000, 0, wide), None);
        assert_eq!(text_at(&index, 15, 4, wide), None);
    }

    #[test]
    fn test_zero_width_only_exact() {
        let index = sample();

        assert_eq!(text_at(&index, 30, 1, HitMode::MinWidth { zoom: 1.0, min_px: 0.0 }), None);
        assert_eq!(text_at(&index, 30, 1, HitMode::Exact), Some("mark"));
    }

    #[test]
    fn test_narrow_nodes_need_zoom() {
        let index = sample();

        let far = HitMode::MinWidth { zoom: 0.01, min_px: 0.5 };
        assert_eq!(text_at(&index, 15, 1, far), None);
        assert_eq!(text_at(&index, 15, 0, far), Some("a"));
    }

    #[test]
    fn test_visible_range() {
        let index = sample();

        let ids: Vec<&str> = index
            .visible(1, 15, 45)
            .iter()
            .map(|id| index.tree().node(*id).text.as_str())
            .collect();
        assert_eq!(ids, ["a1", "mark", "a2"]);
        assert!(index.visible(0, 120, 180).is_empty());
        assert!(index.visible(7, 0, 1000).is_empty());
    }

    fn arb_events() -> impl Strategy<Value = Vec<LogEvent>> {
        prop::collection::vec((0u8..4, 0u64..20), 0..120).prop_map(|script| {
            let mut ts = 0;
            let mut open = 0;
            let mut events = Vec::new();
            for (op, gap) in script {
                ts += gap;
                match op {
                    0 | 1 => {
                        events.push(enter(ts, "n"));
                        open += 1;
                    }
                    2 if open > 0 => {
                        events.push(exit(ts));
                        open -= 1;
                    }
                    _ => events.push(LogEvent::new("MARK", EventKind::Standalone, ts)),
                }
            }
            events
        })
    }

    proptest! {
        #[test]
        fn prop_locate_matches_linear_scan(
            events in arb_events(),
            queries in prop::collection::vec((0u64..1200, 0usize..8, 0.0f64..2.0), 1..40),
        ) {
            let index = SpatialIndex::new(Arc::new(build_tree(events)));
            for (time, depth, zoom) in queries {
                for mode in [HitMode::Exact, HitMode::MinWidth { zoom, min_px: 1.0 }] {
                    prop_assert_eq!(
                        index.locate(time, depth, mode),
                        linear_locate(index.tree(), time, depth, mode)
                    );
                }
            }
        }
    }
}
