use crate::timeline::{
    Command, FindMessage, FindOptions, NodeActivated, Notification, Tooltip, TraceSession,
};
use crate::tree::rows::{TraceSummary, format_duration};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

/// Fraction of the timeline width moved by one pan key press
const PAN_KEY_FRACTION: f64 = 0.1;

pub struct SearchState {
    pub active: bool,
    pub query: String,
    pub match_case: bool,
    pub total_matches: usize,
}

impl SearchState {
    fn new() -> Self {
        Self {
            active: false,
            query: String::new(),
            match_case: false,
            total_matches: 0,
        }
    }
}

/// Left-button drag in progress: last pointer cell and whether it moved
#[derive(Debug, Clone, Copy)]
struct DragState {
    column: u16,
    row: u16,
    moved: bool,
}

pub struct App {
    // Data
    pub session: TraceSession,
    pub summary: TraceSummary,
    pub file_path: Option<String>,
    pub skipped_lines: usize,

    // UI State
    pub timeline_area: Rect,
    pub tooltip: Option<Tooltip>,
    pub activated: Option<NodeActivated>,
    drag: Option<DragState>,

    // Search state
    pub search_state: SearchState,

    // Flags
    pub should_quit: bool,
    pub show_help: bool,
    /// UI outside the timeline changed and the frame must be redrawn
    pub dirty: bool,
}

impl App {
    pub fn new(
        session: TraceSession,
        summary: TraceSummary,
        file_path: Option<String>,
        skipped_lines: usize,
    ) -> Self {
        Self {
            session,
            summary,
            file_path,
            skipped_lines,
            timeline_area: Rect::default(),
            tooltip: None,
            activated: None,
            drag: None,
            search_state: SearchState::new(),
            should_quit: false,
            show_help: false,
            dirty: true,
        }
    }

    pub fn needs_draw(&self) -> bool {
        self.dirty || self.session.is_redraw_pending()
    }

    /// Called once the frame is on screen
    pub fn frame_drawn(&mut self) {
        self.dirty = false;
    }

    /// Keep the session viewport in sync with the layout
    pub fn update_timeline_area(&mut self, area: Rect) {
        if area != self.timeline_area {
            self.timeline_area = area;
            self.dispatch(Command::Resize {
                width: area.width as f64,
                height: area.height as f64,
            });
        }
    }

    fn dispatch(&mut self, command: Command) {
        for notification in self.session.handle(command) {
            match notification {
                Notification::FindResults(results) => {
                    self.search_state.total_matches = results.total_matches;
                    self.dirty = true;
                }
                Notification::NodeActivated(activated) => {
                    log::info!(
                        "Activated {} '{}' at {}",
                        activated.category,
                        activated.text,
                        activated.timestamp
                    );
                    self.activated = Some(activated);
                    self.dirty = true;
                }
                Notification::Hover(tooltip) => {
                    if tooltip != self.tooltip {
                        self.tooltip = tooltip;
                        self.dirty = true;
                    }
                }
            }
        }
    }

    pub fn handle_event(&mut self, event: KeyEvent) {
        // Priority 1: Search mode
        if self.search_state.active {
            self.handle_search_event(event);
            return;
        }

        // Priority 2: Help screen
        if self.show_help {
            if matches!(event.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
                self.dirty = true;
            }
            return;
        }

        let width = self.timeline_area.width as f64;
        let center = width / 2.0;

        match event.code {
            // Quit
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }

            // Help
            KeyCode::Char('?') => {
                self.show_help = true;
                self.dirty = true;
            }

            // Zoom
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.dispatch(Command::Wheel {
                    delta_x: 0.0,
                    delta_y: -1.0,
                    pointer_x: center,
                });
            }
            KeyCode::Char('-') | KeyCode::Char('_') => {
                self.dispatch(Command::Wheel {
                    delta_x: 0.0,
                    delta_y: 1.0,
                    pointer_x: center,
                });
            }
            KeyCode::Char('0') | KeyCode::Home => {
                self.dispatch(Command::ResetZoom);
            }

            // Pan
            KeyCode::Left | KeyCode::Char('h') => {
                self.dispatch(Command::Drag {
                    delta_x: width * PAN_KEY_FRACTION,
                    delta_y: 0.0,
                });
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.dispatch(Command::Drag {
                    delta_x: -width * PAN_KEY_FRACTION,
                    delta_y: 0.0,
                });
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.dispatch(Command::Drag {
                    delta_x: 0.0,
                    delta_y: 1.0,
                });
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.dispatch(Command::Drag {
                    delta_x: 0.0,
                    delta_y: -1.0,
                });
            }

            // Search controls
            KeyCode::Char('/') => {
                self.start_search();
            }
            KeyCode::Char('n') if !self.search_state.query.is_empty() => {
                self.dispatch(Command::Find(FindMessage::Next));
            }
            KeyCode::Char('N') if !self.search_state.query.is_empty() => {
                self.dispatch(Command::Find(FindMessage::Previous));
            }
            KeyCode::Esc if !self.search_state.query.is_empty() => {
                self.close_search();
            }

            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        let Some((x, y)) = self.to_timeline(event.column, event.row) else {
            if self.drag.is_none() {
                self.dispatch(Command::PointerLeave);
            }
            if matches!(event.kind, MouseEventKind::Up(_)) {
                self.drag = None;
            }
            return;
        };

        let shift = event.modifiers.contains(KeyModifiers::SHIFT);
        match event.kind {
            MouseEventKind::ScrollLeft => self.dispatch(Command::Wheel {
                delta_x: -1.0,
                delta_y: 0.0,
                pointer_x: x,
            }),
            MouseEventKind::ScrollRight => self.dispatch(Command::Wheel {
                delta_x: 1.0,
                delta_y: 0.0,
                pointer_x: x,
            }),
            MouseEventKind::ScrollUp if shift => self.dispatch(Command::Wheel {
                delta_x: -1.0,
                delta_y: 0.0,
                pointer_x: x,
            }),
            MouseEventKind::ScrollDown if shift => self.dispatch(Command::Wheel {
                delta_x: 1.0,
                delta_y: 0.0,
                pointer_x: x,
            }),
            MouseEventKind::ScrollUp => self.dispatch(Command::Wheel {
                delta_x: 0.0,
                delta_y: -1.0,
                pointer_x: x,
            }),
            MouseEventKind::ScrollDown => self.dispatch(Command::Wheel {
                delta_x: 0.0,
                delta_y: 1.0,
                pointer_x: x,
            }),
            MouseEventKind::Down(MouseButton::Left) => {
                self.drag = Some(DragState {
                    column: event.column,
                    row: event.row,
                    moved: false,
                });
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(drag) = &mut self.drag {
                    let delta_x = event.column as f64 - drag.column as f64;
                    let delta_y = event.row as f64 - drag.row as f64;
                    *drag = DragState {
                        column: event.column,
                        row: event.row,
                        moved: drag.moved || delta_x != 0.0 || delta_y != 0.0,
                    };
                    self.dispatch(Command::Drag { delta_x, delta_y });
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(drag) = self.drag.take()
                    && !drag.moved
                {
                    self.dispatch(Command::Click { x, y });
                }
            }
            MouseEventKind::Moved => self.dispatch(Command::PointerMove { x, y }),
            _ => {}
        }
    }

    /// Cell center in timeline coordinates, if the cell is inside the timeline
    fn to_timeline(&self, column: u16, row: u16) -> Option<(f64, f64)> {
        let area = self.timeline_area;
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        inside.then(|| {
            (
                (column - area.x) as f64 + 0.5,
                (row - area.y) as f64 + 0.5,
            )
        })
    }

    // Search methods
    pub fn start_search(&mut self) {
        self.search_state.active = true;
        self.dirty = true;
    }

    fn update_search(&mut self) {
        let text = self.search_state.query.clone();
        let options = FindOptions {
            match_case: self.search_state.match_case,
        };
        self.dispatch(Command::Find(FindMessage::Find {
            text,
            match_index: 1,
            options,
        }));
        self.dirty = true;
    }

    fn close_search(&mut self) {
        self.search_state.active = false;
        self.search_state.query.clear();
        self.search_state.total_matches = 0;
        self.dispatch(Command::Find(FindMessage::Close));
        self.dirty = true;
    }

    pub fn handle_search_event(&mut self, event: KeyEvent) {
        match event.code {
            KeyCode::Char('n') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(Command::Find(FindMessage::Next));
            }
            KeyCode::Char('p') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(Command::Find(FindMessage::Previous));
            }
            KeyCode::Char(c) if !event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search_state.query.push(c);
                self.update_search();
            }
            KeyCode::Backspace => {
                self.search_state.query.pop();
                self.update_search();
            }
            KeyCode::Tab => {
                self.search_state.match_case = !self.search_state.match_case;
                self.update_search();
            }
            KeyCode::Enter => {
                // Accept search, keep the highlights
                self.search_state.active = false;
                self.dirty = true;
            }
            KeyCode::Esc => {
                self.close_search();
            }
            _ => {}
        }
    }

    /// Status text for the footer
    pub fn status_line(&self) -> Option<String> {
        self.activated.as_ref().map(|activated| {
            let category = if activated.category.is_empty() {
                String::new()
            } else {
                format!("{}: ", activated.category)
            };
            format!(
                "{}{} @ {}",
                category,
                activated.text,
                format_duration(activated.timestamp)
            )
        })
    }

    /// Current magnification relative to the whole-trace view
    pub fn zoom_factor(&self) -> f64 {
        let viewport = self.session.viewport();
        if viewport.default_zoom() > 0.0 {
            viewport.zoom() / viewport.default_zoom()
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::parser::{EventKind, LogEvent};
    use crate::tree::build_tree;
    use std::sync::Arc;

    fn app() -> App {
        let tree = build_tree([
            LogEvent::new("METHOD_ENTRY", EventKind::Entry, 0)
                .with_text("Outer.run()")
                .closing("METHOD_EXIT"),
            LogEvent::new("METHOD_ENTRY", EventKind::Entry, 100)
                .with_text("Inner.work()")
                .closing("METHOD_EXIT"),
            LogEvent::new("METHOD_EXIT", EventKind::Exit, 400),
            LogEvent::new("METHOD_EXIT", EventKind::Exit, 1_000),
        ]);
        let summary = TraceSummary::from_tree(&tree);
        let config = TimelineConfig {
            min_visible_ns: 1,
            ..TimelineConfig::default()
        };
        let session = TraceSession::new(Arc::new(tree), config).unwrap();
        let mut app = App::new(session, summary, None, 0);
        app.update_timeline_area(Rect::new(0, 2, 100, 4));
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_zoom_keys() {
        let mut app = app();
        app.handle_event(key(KeyCode::Char('+')));
        assert!(app.zoom_factor() > 1.0);

        app.handle_event(key(KeyCode::Char('0')));
        assert_eq!(app.zoom_factor(), 1.0);
    }

    #[test]
    fn test_search_flow() {
        let mut app = app();
        app.handle_event(key(KeyCode::Char('/')));
        assert!(app.search_state.active);

        for c in "work".chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
        assert_eq!(app.search_state.total_matches, 1);
        assert!(app.tooltip.is_some());

        app.handle_event(key(KeyCode::Enter));
        assert!(!app.search_state.active);
        assert_eq!(app.session.find().current_index(), 1);

        app.handle_event(key(KeyCode::Esc));
        assert!(app.search_state.query.is_empty());
        assert!(!app.session.find().is_active());
    }

    #[test]
    fn test_click_sets_status() {
        let mut app = app();

        // Bottom timeline row is depth 0; column 50 is at 500ns
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 50, 5));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 50, 5));
        let status = app.status_line().unwrap();
        assert!(status.starts_with("Outer.run()"));
    }

    #[test]
    fn test_drag_does_not_click() {
        let mut app = app();
        app.handle_event(key(KeyCode::Char('+')));

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 50, 5));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 40, 5));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 40, 5));
        assert!(app.activated.is_none());
        assert!(app.session.viewport().pan_x() < 0.0);
    }

    #[test]
    fn test_hover_outside_timeline_clears_tooltip() {
        let mut app = app();
        app.handle_mouse(mouse(MouseEventKind::Moved, 10, 5));
        assert!(app.tooltip.is_some());

        app.handle_mouse(mouse(MouseEventKind::Moved, 10, 0));
        assert!(app.tooltip.is_none());
    }
}
