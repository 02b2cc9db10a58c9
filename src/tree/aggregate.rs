use super::{AggregateCounts, CallTree, RowCount, Timing};

/// Compute total/self durations, row counts and rolled-up counters.
///
/// Ids are assigned in pre-order, so walking the arena backwards visits every
/// child before its parent and one pass suffices.
pub fn aggregate(tree: &mut CallTree) {
    let (nodes, root) = tree.parts_mut();

    for node in nodes.iter_mut() {
        node.duration.total = node.end() - node.timestamp;
        node.row_count.total = node.row_count.own;
        node.counts = node.own_counts();
    }

    for i in (0..nodes.len()).rev() {
        let (head, tail) = nodes.split_at_mut(i + 1);
        let node = &mut head[i];

        let mut child_time = 0u64;
        for child in &node.children {
            // Children always have larger ids than their parent
            let child = &tail[child.index() - i - 1];
            child_time = child_time.saturating_add(child.duration.total);
            // Row counts come straight from the input and may be arbitrarily large
            node.row_count.total = node.row_count.total.saturating_add(child.row_count.total);
            node.counts.add(&child.counts);
        }

        if child_time > node.duration.total {
            log::debug!(
                "Children of {} ({}) exceed its duration by {}ns",
                node.event_type,
                node.text,
                child_time - node.duration.total
            );
        }
        node.duration.own = node.duration.total.saturating_sub(child_time);
    }

    let mut child_time = 0u64;
    let mut rows = RowCount::default();
    let mut counts = AggregateCounts::default();
    for child in &root.children {
        let child = &nodes[child.index()];
        child_time = child_time.saturating_add(child.duration.total);
        rows.total = rows.total.saturating_add(child.row_count.total);
        counts.add(&child.counts);
    }

    let total = root.exit_timestamp.saturating_sub(root.timestamp);
    root.duration = Timing {
        total,
        own: total.saturating_sub(child_time),
    };
    root.row_count = rows;
    root.counts = counts;
}
