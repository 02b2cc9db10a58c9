use super::colors::Palette;
use super::find::{FindEngine, FindMessage, FindResults};
use super::index::{HitMode, SpatialIndex};
use super::redraw::RedrawScheduler;
use super::render::{DrawSurface, FrameInput, FrameStats, Renderer};
use super::viewport::Viewport;
use crate::config::{ConfigResult, TimelineConfig};
use crate::tree::rows::format_duration;
use crate::tree::{CallTree, Issue, IssueKind, Node, NodeId};
use std::sync::Arc;

/// Input to a [`TraceSession`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Resize { width: f64, height: f64 },
    Wheel { delta_x: f64, delta_y: f64, pointer_x: f64 },
    Drag { delta_x: f64, delta_y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerLeave,
    Click { x: f64, y: f64 },
    ResetZoom,
    Find(FindMessage),
}

/// Output of a [`TraceSession`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    FindResults(FindResults),
    NodeActivated(NodeActivated),
    Hover(Option<Tooltip>),
}

/// Emitted when the user clicks a node (or an issue band)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeActivated {
    pub category: String,
    pub text: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    /// Anchor in surface units
    pub x: f64,
    pub y: f64,
    pub lines: Vec<String>,
}

/// Everything that belongs to one loaded trace.
///
/// Input goes through [`TraceSession::handle`]; state changes only schedule a
/// frame, which [`TraceSession::render`] performs later.
pub struct TraceSession {
    index: SpatialIndex,
    viewport: Viewport,
    find: FindEngine,
    palette: Palette,
    config: TimelineConfig,
    redraw: RedrawScheduler,
    renderer: Renderer,
    last_stats: FrameStats,
}

impl TraceSession {
    pub fn new(tree: Arc<CallTree>, config: TimelineConfig) -> ConfigResult<Self> {
        let palette = config.palette()?;
        let index = SpatialIndex::new(tree);
        let viewport = Viewport::new(
            index.tree().total_duration(),
            index.depth_count(),
            config.row_height,
            config.min_visible_ns,
        );

        Ok(Self {
            index,
            viewport,
            find: FindEngine::new(),
            palette,
            config,
            redraw: RedrawScheduler::new(),
            renderer: Renderer::new(),
            last_stats: FrameStats::default(),
        })
    }

    pub fn tree(&self) -> &CallTree {
        self.index.tree()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn find(&self) -> &FindEngine {
        &self.find
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn is_redraw_pending(&self) -> bool {
        self.redraw.is_pending()
    }

    /// Ask for a frame without changing timeline state
    pub fn request_redraw(&mut self) {
        self.redraw.request();
    }

    pub fn handle(&mut self, command: Command) -> Vec<Notification> {
        let mut notifications = Vec::new();

        match command {
            Command::Resize { width, height } => {
                let changed = self.viewport.resize(width, height);
                self.mark(changed);
            }
            Command::Wheel {
                delta_x,
                delta_y,
                pointer_x,
            } => {
                let step = self.config.wheel_step;
                let changed = self.viewport.wheel(delta_x, delta_y, pointer_x, step);
                self.mark(changed);
            }
            Command::Drag { delta_x, delta_y } => {
                let changed = self.viewport.pan_by(delta_x, delta_y);
                self.mark(changed);
                notifications.push(Notification::Hover(None));
            }
            Command::PointerMove { x, y } => {
                notifications.push(Notification::Hover(self.tooltip_at(x, y)));
            }
            Command::PointerLeave => {
                notifications.push(Notification::Hover(None));
            }
            Command::Click { x, y } => {
                if let Some(activated) = self.activate_at(x, y) {
                    log::debug!("Activated {} at {}", activated.text, activated.timestamp);
                    notifications.push(Notification::NodeActivated(activated));
                }
            }
            Command::ResetZoom => {
                let changed = self.viewport.reset();
                self.mark(changed);
            }
            Command::Find(message) => self.handle_find(message, &mut notifications),
        }

        notifications
    }

    fn handle_find(&mut self, message: FindMessage, notifications: &mut Vec<Notification>) {
        let update = self.find.handle(self.index.tree(), message);

        if let Some(results) = update.results {
            notifications.push(Notification::FindResults(results));
        }
        if !update.highlight_changed {
            return;
        }
        self.redraw.request();

        match self.find.current() {
            Some(id) => {
                let node = self.index.tree().node(id);
                let (timestamp, duration, depth) = (node.timestamp, node.duration.total, node.depth);
                let changed = self.viewport.reveal(timestamp, duration, depth);
                self.mark(changed);

                let x = self.viewport.time_to_x(timestamp)
                    + duration as f64 * self.viewport.zoom() / 3.0;
                let y = self.viewport.depth_to_y(depth);
                let tooltip = node_tooltip(self.index.tree().node(id), x.max(0.0), y);
                notifications.push(Notification::Hover(Some(tooltip)));
            }
            None => notifications.push(Notification::Hover(None)),
        }
    }

    fn mark(&mut self, changed: bool) {
        if changed {
            self.redraw.request();
        }
    }

    fn width_mode(&self) -> HitMode {
        HitMode::MinWidth {
            zoom: self.viewport.zoom(),
            min_px: self.config.min_rect_width,
        }
    }

    /// Node under a screen position, if wide enough to be seen
    pub fn node_at(&self, x: f64, y: f64) -> Option<NodeId> {
        let time = self.viewport.x_to_time(x)?;
        let depth = self.viewport.y_to_depth(y)?;
        self.index.locate(time, depth, self.width_mode())
    }

    /// Issue whose band covers screen column `x`
    pub fn issue_at(&self, x: f64) -> Option<&Issue> {
        let time = self.viewport.x_to_time(x)?;
        let issues = self.tree().issues();
        let trace_end = self.tree().root().exit_timestamp;

        // Bands run from one issue's start to the next one's
        let i = issues.partition_point(|issue| issue.start_time <= time);
        let issue = issues.get(i.checked_sub(1)?)?;
        let end = issues.get(i).map_or(trace_end, |next| next.start_time);
        (time <= end).then_some(issue)
    }

    fn tooltip_at(&self, x: f64, y: f64) -> Option<Tooltip> {
        if let Some(id) = self.node_at(x, y) {
            return Some(node_tooltip(self.tree().node(id), x, y));
        }
        self.issue_at(x).map(|issue| Tooltip {
            x,
            y,
            lines: vec![issue.summary.clone()],
        })
    }

    fn activate_at(&self, x: f64, y: f64) -> Option<NodeActivated> {
        if let Some(id) = self.node_at(x, y) {
            let node = self.tree().node(id);
            return Some(NodeActivated {
                category: node.category.clone(),
                text: node.text.clone(),
                timestamp: node.timestamp,
            });
        }
        self.issue_at(x).map(|issue| NodeActivated {
            category: issue_label(issue.kind).to_string(),
            text: issue.summary.clone(),
            timestamp: issue.start_time,
        })
    }

    /// Draw the pending frame, if there is one
    pub fn render(&mut self, surface: &mut dyn DrawSurface) -> bool {
        if !self.redraw.take() {
            return false;
        }
        self.last_stats = self.renderer.draw(
            surface,
            &FrameInput {
                index: &self.index,
                viewport: &self.viewport,
                palette: &self.palette,
                find: &self.find,
                min_rect_width: self.config.min_rect_width,
                label_min_width: self.config.label_min_width,
            },
        );
        log::trace!("Frame drawn: {:?}", self.last_stats);
        true
    }

    /// Cancel pending redraws; the session draws nothing afterwards
    pub fn teardown(&mut self) {
        self.redraw.cancel();
        log::debug!(
            "Session closed after {} frames ({} coalesced requests)",
            self.redraw.frames_drawn(),
            self.redraw.coalesced()
        );
    }
}

fn issue_label(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::Unexpected => "Unexpected",
        IssueKind::Skip => "Skipped",
        IssueKind::Error => "Error",
    }
}

fn node_tooltip(node: &Node, x: f64, y: f64) -> Tooltip {
    let mut lines = vec![node.event_type.clone(), node.text.clone()];

    let mut timing = format!("timestamp: {}", node.timestamp);
    if let Some(exit) = node.exit_timestamp {
        timing.push_str(&format!(" => {}", exit));
    }
    lines.push(timing);

    if node.duration.total > 0 {
        let mut total = format!("total: {}", format_duration(node.duration.total));
        if node.duration.own > 0 {
            total.push_str(&format!(" (self {})", format_duration(node.duration.own)));
        }
        lines.push(total);
    }
    if node.row_count.total > 0 {
        lines.push(format!(
            "rows: {} (self {})",
            node.row_count.total, node.row_count.own
        ));
    }

    Tooltip { x, y, lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{EventKind, LogEvent};
    use crate::timeline::render::RecordingSurface;
    use crate::timeline::FindOptions;
    use crate::tree::build_tree;

    fn session() -> TraceSession {
        let tree = build_tree([
            LogEvent::new("METHOD_ENTRY", EventKind::Entry, 0)
                .with_text("Outer.run()")
                .closing("METHOD_EXIT"),
            LogEvent::new("METHOD_ENTRY", EventKind::Entry, 100)
                .with_text("Inner.work()")
                .closing("METHOD_EXIT"),
            LogEvent::new("METHOD_EXIT", EventKind::Exit, 400),
            LogEvent::new("METHOD_EXIT", EventKind::Exit, 500),
            LogEvent::new("DML_END", EventKind::Exit, 700),
            LogEvent::new("USER_DEBUG", EventKind::Standalone, 1_000).with_text("done"),
        ]);
        let config = TimelineConfig {
            min_visible_ns: 1,
            ..TimelineConfig::default()
        };
        let mut session = TraceSession::new(Arc::new(tree), config).unwrap();
        session.handle(Command::Resize {
            width: 100.0,
            height: 4.0,
        });
        session
    }

    fn find(text: &str, match_index: usize) -> Command {
        Command::Find(FindMessage::Find {
            text: text.into(),
            match_index,
            options: FindOptions::default(),
        })
    }

    #[test]
    fn test_click_activates_node() {
        let mut session = session();

        // 10 ns per column; depth 0 is the bottom row (y 3..4)
        let out = session.handle(Command::Click { x: 20.5, y: 2.5 });
        assert_eq!(
            out,
            vec![Notification::NodeActivated(NodeActivated {
                category: String::new(),
                text: "Inner.work()".into(),
                timestamp: 100,
            })]
        );
    }

    #[test]
    fn test_click_falls_back_to_issue() {
        let mut session = session();

        let out = session.handle(Command::Click { x: 80.5, y: 3.5 });
        match &out[..] {
            [Notification::NodeActivated(activated)] => {
                assert_eq!(activated.category, "Unexpected");
                assert_eq!(activated.timestamp, 700);
            }
            other => panic!("unexpected notifications: {:?}", other),
        }
    }

    #[test]
    fn test_click_in_gap_is_silent() {
        let mut session = session();
        assert!(session.handle(Command::Click { x: 60.5, y: 3.5 }).is_empty());
    }

    #[test]
    fn test_hover_tooltip() {
        let mut session = session();

        let out = session.handle(Command::PointerMove { x: 10.5, y: 3.5 });
        let [Notification::Hover(Some(tooltip))] = &out[..] else {
            panic!("expected a tooltip, got {:?}", out);
        };
        assert_eq!(tooltip.lines[1], "Outer.run()");
        assert_eq!(tooltip.lines[2], "timestamp: 0 => 500");
        assert!(tooltip.lines[3].starts_with("total: 0.000ms"));
    }

    #[test]
    fn test_redraws_are_coalesced() {
        let mut session = session();
        let mut surface = RecordingSurface::default();

        assert!(session.render(&mut surface));
        assert!(!session.render(&mut surface));

        for _ in 0..5 {
            session.handle(Command::Wheel {
                delta_x: 0.0,
                delta_y: -1.0,
                pointer_x: 50.0,
            });
        }
        assert!(session.render(&mut surface));
        assert!(!session.render(&mut surface));
        assert_eq!(surface.clears, 2);
    }

    #[test]
    fn test_pointer_move_does_not_redraw() {
        let mut session = session();
        let mut surface = RecordingSurface::default();
        session.render(&mut surface);

        session.handle(Command::PointerMove { x: 10.5, y: 3.5 });
        assert!(!session.is_redraw_pending());
    }

    #[test]
    fn test_find_reports_once_and_navigates() {
        let mut session = session();

        let out = session.handle(find("work", 1));
        assert!(out.contains(&Notification::FindResults(FindResults { total_matches: 1 })));
        assert!(session.is_redraw_pending());

        let out = session.handle(find("method", 1));
        assert!(out.contains(&Notification::FindResults(FindResults { total_matches: 2 })));

        let out = session.handle(Command::Find(FindMessage::Next));
        assert!(!out.iter().any(|n| matches!(n, Notification::FindResults(_))));
        assert_eq!(session.find().current_index(), 2);
    }

    #[test]
    fn test_find_reveals_match() {
        let mut session = session();
        session.handle(Command::Wheel {
            delta_x: 0.0,
            delta_y: -100.0,
            pointer_x: 0.0,
        });
        session.handle(find("done", 1));

        let x = session.viewport().time_to_x(1_000);
        assert!((0.0..=100.0).contains(&x));
    }

    #[test]
    fn test_teardown_cancels() {
        let mut session = session();
        session.teardown();

        let mut surface = RecordingSurface::default();
        assert!(!session.render(&mut surface));
        session.handle(Command::ResetZoom);
        assert!(!session.is_redraw_pending());
    }
}
